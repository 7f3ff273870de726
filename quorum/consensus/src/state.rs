// This file is part of Gear.
//
// Copyright (C) 2025 Gear Technologies Inc.
// SPDX-License-Identifier: GPL-3.0-or-later WITH Classpath-exception-2.0
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Round-scoped state shared by all subrounds.
//!
//! The job-done ledger keeps, for every member of the consensus group, whether
//! that member finished its job in each subround. The local job writes only the
//! entries of the local validator, message handlers write entries of remote
//! validators. Every ledger access takes the ledger lock on its own, so reading the
//! whole group is a sequence of point reads rather than one consistent snapshot.

use crate::config::ConfigError;
use parking_lot::RwLock;
use quorum_common::{ConsensusMessage, Digest, PublicKey, SubroundId, SubroundStatus};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Validator {0} is not in the consensus group")]
    NotInConsensusGroup(PublicKey),
}

/// Byzantine threshold for a consensus group of `group_size` validators.
pub fn pbft_threshold(group_size: usize) -> usize {
    group_size * 2 / 3 + 1
}

/// Round parameters provided by the round scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundData {
    pub index: i64,
    /// Consensus group of the round, the leader goes first
    pub consensus_group: Vec<PublicKey>,
}

#[derive(Debug, Default)]
struct RoundInfo {
    index: i64,
    consensus_group: Vec<PublicKey>,
    data: Option<Digest>,
    statuses: BTreeMap<SubroundId, SubroundStatus>,
    thresholds: BTreeMap<SubroundId, usize>,
    canceled: bool,
}

type JobDoneLedger = BTreeMap<PublicKey, BTreeMap<SubroundId, bool>>;

/// State of the current consensus round.
#[derive(Debug)]
pub struct ConsensusState {
    self_pub_key: PublicKey,
    round: RwLock<RoundInfo>,
    ledger: RwLock<JobDoneLedger>,
}

impl ConsensusState {
    pub fn new(self_pub_key: PublicKey) -> Self {
        Self {
            self_pub_key,
            round: RwLock::new(RoundInfo {
                index: -1,
                ..Default::default()
            }),
            ledger: RwLock::new(BTreeMap::new()),
        }
    }

    /// Resets the state for a new round.
    ///
    /// Clears the agreed data, the ledger, subround statuses and the canceled flag,
    /// and sets the PBFT threshold for every subround.
    pub fn start_round(&self, round: RoundData) -> Result<(), ConfigError> {
        let RoundData {
            index,
            consensus_group,
        } = round;

        if consensus_group.is_empty() {
            return Err(ConfigError::EmptyConsensusGroup);
        }

        let mut members = BTreeSet::new();
        if let Some(duplicate) = consensus_group.iter().find(|key| !members.insert(**key)) {
            return Err(ConfigError::DuplicateMember(*duplicate));
        }

        let threshold = pbft_threshold(consensus_group.len());
        let ledger: JobDoneLedger = consensus_group
            .iter()
            .map(|key| (*key, SubroundId::ALL.map(|id| (id, false)).into()))
            .collect();

        let mut info = self.round.write();
        *info = RoundInfo {
            index,
            consensus_group,
            data: None,
            statuses: SubroundId::ALL
                .map(|id| (id, SubroundStatus::NotFinished))
                .into(),
            thresholds: SubroundId::ALL.map(|id| (id, threshold)).into(),
            canceled: false,
        };
        *self.ledger.write() = ledger;

        tracing::debug!(
            round = index,
            group_size = info.consensus_group.len(),
            threshold,
            "consensus state reset for a new round"
        );

        Ok(())
    }

    pub fn round_index(&self) -> i64 {
        self.round.read().index
    }

    pub fn self_pub_key(&self) -> PublicKey {
        self.self_pub_key
    }

    pub fn is_node_self(&self, key: &PublicKey) -> bool {
        self.self_pub_key == *key
    }

    pub fn consensus_group(&self) -> Vec<PublicKey> {
        self.round.read().consensus_group.clone()
    }

    pub fn consensus_group_size(&self) -> usize {
        self.round.read().consensus_group.len()
    }

    pub fn is_node_in_consensus_group(&self, key: &PublicKey) -> bool {
        self.round.read().consensus_group.contains(key)
    }

    pub fn consensus_group_index(&self, key: &PublicKey) -> Result<usize, StateError> {
        self.round
            .read()
            .consensus_group
            .iter()
            .position(|member| member == key)
            .ok_or(StateError::NotInConsensusGroup(*key))
    }

    /// Leader of the current round, the first member of the consensus group.
    pub fn leader(&self) -> Option<PublicKey> {
        self.round.read().consensus_group.first().copied()
    }

    pub fn is_self_leader_in_current_round(&self) -> bool {
        self.leader() == Some(self.self_pub_key)
    }

    /// Sets the digest validators agree on in this round.
    pub fn set_data(&self, data: Digest) {
        self.round.write().data = Some(data);
    }

    pub fn data(&self) -> Option<Digest> {
        self.round.read().data
    }

    pub fn is_consensus_data_set(&self) -> bool {
        self.round.read().data.is_some()
    }

    pub fn is_data_equal(&self, data: &Digest) -> bool {
        self.round.read().data.as_ref() == Some(data)
    }

    pub fn set_job_done(
        &self,
        key: &PublicKey,
        subround: SubroundId,
        done: bool,
    ) -> Result<(), StateError> {
        let mut ledger = self.ledger.write();
        let jobs = ledger
            .get_mut(key)
            .ok_or(StateError::NotInConsensusGroup(*key))?;
        jobs.insert(subround, done);
        Ok(())
    }

    pub fn job_done(&self, key: &PublicKey, subround: SubroundId) -> Result<bool, StateError> {
        self.ledger
            .read()
            .get(key)
            .map(|jobs| jobs.get(&subround).copied().unwrap_or(false))
            .ok_or(StateError::NotInConsensusGroup(*key))
    }

    pub fn set_self_job_done(&self, subround: SubroundId, done: bool) -> Result<(), StateError> {
        self.set_job_done(&self.self_pub_key, subround, done)
    }

    /// Returns `false` if the local validator is not in the consensus group.
    pub fn is_self_job_done(&self, subround: SubroundId) -> bool {
        self.job_done(&self.self_pub_key, subround).unwrap_or(false)
    }

    /// Sets subround status. A finished subround stays finished until the next round.
    pub fn set_status(&self, subround: SubroundId, status: SubroundStatus) {
        let mut info = self.round.write();
        let current = info.statuses.entry(subround).or_default();
        if *current == SubroundStatus::Finished {
            if status != SubroundStatus::Finished {
                tracing::trace!(%subround, "ignore status downgrade of a finished subround");
            }
            return;
        }
        *current = status;
    }

    pub fn status(&self, subround: SubroundId) -> SubroundStatus {
        self.round
            .read()
            .statuses
            .get(&subround)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_subround_finished(&self, subround: SubroundId) -> bool {
        self.status(subround) == SubroundStatus::Finished
    }

    pub fn threshold(&self, subround: SubroundId) -> usize {
        let info = self.round.read();
        info.thresholds
            .get(&subround)
            .copied()
            .unwrap_or_else(|| pbft_threshold(info.consensus_group.len()))
    }

    pub fn set_threshold(&self, subround: SubroundId, threshold: usize) -> Result<(), ConfigError> {
        let mut info = self.round.write();
        let group_size = info.consensus_group.len();
        if threshold == 0 || threshold > group_size {
            return Err(ConfigError::InvalidThreshold {
                threshold,
                group_size,
            });
        }

        info.thresholds.insert(subround, threshold);
        Ok(())
    }

    pub fn set_round_canceled(&self, canceled: bool) {
        self.round.write().canceled = canceled;
    }

    pub fn round_canceled(&self) -> bool {
        self.round.read().canceled
    }

    /// Whether the local validator may run its job for `subround` now.
    pub fn can_do_subround_job(&self, subround: SubroundId) -> bool {
        if !self.is_consensus_data_set() {
            return false;
        }

        if !self.is_node_in_consensus_group(&self.self_pub_key) {
            return false;
        }

        if self.is_self_job_done(subround) {
            return false;
        }

        !self.is_subround_finished(subround)
    }

    /// Whether `message` may still change the state of `subround` in round `round_index`.
    ///
    /// Rejects own messages, senders outside of the consensus group, messages of
    /// other rounds, senders whose job is already done and finished subrounds.
    pub fn can_process_received_message(
        &self,
        message: &ConsensusMessage,
        round_index: i64,
        subround: SubroundId,
    ) -> bool {
        let sender = &message.pub_key;

        if self.is_node_self(sender) {
            return false;
        }

        if message.round_index != round_index {
            tracing::trace!(
                message_round = message.round_index,
                round_index,
                "message of another round"
            );
            return false;
        }

        match self.job_done(sender, subround) {
            Ok(false) => {}
            Ok(true) => return false,
            Err(err) => {
                tracing::trace!(%err, "message from outside of the consensus group");
                return false;
            }
        }

        !self.is_subround_finished(subround)
    }
}
