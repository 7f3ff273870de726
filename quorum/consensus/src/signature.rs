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

//! Signature subround.
//!
//! Every member of the consensus group signs the agreed digest. Followers send
//! their share to the network, the leader keeps its own share locally and collects
//! shares of the others until the threshold of the subround is reached.
//!
//! Completion criteria differ by role:
//! - a validator outside of the consensus group has nothing to do;
//! - a follower is done once its own share is sent;
//! - the leader is done once enough shares, its own included, are collected.

use crate::{
    ROUND_STATE_SIGNED,
    config::ConfigError,
    subround::{Phase, Subround},
};
use derive_more::Debug;
use parking_lot::Mutex;
use quorum_common::{
    ConsensusMessage, METRIC_CONSENSUS_ROUND_STATE, MessageKind, NoopStatusHandler,
    StatusHandler, SubroundId, SubroundStatus,
};
use std::sync::Arc;

#[derive(Clone, metrics_derive::Metrics)]
#[metrics(scope = "quorum_signature_subround")]
struct Metrics {
    /// Signature shares accepted from other validators
    shares_accepted: metrics::Counter,
    /// Signature messages ignored or rejected
    shares_rejected: metrics::Counter,
    /// Own signature shares sent to the network
    shares_broadcast: metrics::Counter,
    /// Members of the consensus group with a collected signature
    signatures_collected: metrics::Gauge,
    /// Rounds in which the subround finished
    finished: metrics::Counter,
}

#[derive(Debug)]
pub struct SignatureSubround {
    base: Subround,
    #[debug(skip)]
    status_handler: Arc<dyn StatusHandler>,
    /// Serializes acceptance of shares from all senders, not only duplicates of one
    /// sender, so the threshold check and the share store happen under one lock.
    #[debug(skip)]
    ingest: Mutex<()>,
    #[debug(skip)]
    metrics: Metrics,
}

impl SignatureSubround {
    pub fn new(base: Subround) -> Result<Self, ConfigError> {
        if base.id() != SubroundId::Signature {
            return Err(ConfigError::WrongSubround {
                expected: SubroundId::Signature,
                actual: base.id(),
            });
        }

        Ok(Self {
            base,
            status_handler: Arc::new(NoopStatusHandler),
            ingest: Mutex::new(()),
            metrics: Metrics::default(),
        })
    }

    pub fn with_status_handler(mut self, status_handler: Arc<dyn StatusHandler>) -> Self {
        self.status_handler = status_handler;
        self
    }

    pub fn base(&self) -> &Subround {
        &self.base
    }

    /// Signs the agreed digest and, unless this validator leads the round,
    /// sends the share to the network.
    pub fn do_signature_job(&self) -> bool {
        let state = self.base.state();
        let subround = self.base.id();
        let self_pub_key = state.self_pub_key();

        if !state.is_node_in_consensus_group(&self_pub_key) {
            return true;
        }

        if !state.can_do_subround_job(subround) {
            return false;
        }

        let Some(data) = state.data() else {
            return false;
        };

        let core = self.base.core();
        let share = match core.signer.create_share(&data) {
            Ok(share) => share,
            Err(err) => {
                tracing::debug!(subround = self.base.name(), %err, "failed to create signature share");
                return false;
            }
        };

        if !state.is_self_leader_in_current_round() {
            let message = ConsensusMessage::new(
                data,
                share,
                self_pub_key,
                MessageKind::Signature,
                core.round_handler.index(),
                core.round_handler.chain_id(),
            );

            if let Err(err) = core.messenger.broadcast_consensus_message(message) {
                tracing::debug!(subround = self.base.name(), %err, "failed to broadcast signature share");
                return false;
            }

            self.metrics.shares_broadcast.increment(1);
            tracing::debug!(subround = self.base.name(), "signature has been sent");
        }

        if let Err(err) = state.set_self_job_done(subround, true) {
            tracing::debug!(subround = self.base.name(), %err, "failed to mark own job done");
            return false;
        }

        true
    }

    /// Accepts a signature share sent to the leader.
    ///
    /// Returns `true` only if the share was stored and the sender marked done.
    pub fn received_signature(&self, message: &ConsensusMessage) -> bool {
        let state = self.base.state();
        let subround = self.base.id();

        if !state.is_self_leader_in_current_round() {
            return false;
        }

        if !state.is_consensus_data_set() || !state.is_data_equal(&message.digest) {
            tracing::trace!(sender = %message.pub_key, digest = %message.digest, "signature over unexpected data");
            return false;
        }

        let _guard = self.ingest.lock();

        let round_index = self.base.core().round_handler.index();
        if !state.can_process_received_message(message, round_index, subround) {
            return false;
        }

        let threshold = state.threshold(subround);
        if self.signatures_collected(threshold).0 {
            tracing::trace!(sender = %message.pub_key, "late signature, threshold already reached");
            return false;
        }

        let index = match state
            .consensus_group_index(&message.pub_key)
            .map(u16::try_from)
        {
            Ok(Ok(index)) => index,
            Ok(Err(err)) => {
                tracing::debug!(sender = %message.pub_key, %err, "consensus group index overflow");
                return false;
            }
            Err(err) => {
                tracing::debug!(sender = %message.pub_key, %err, "failed to resolve sender index");
                return false;
            }
        };

        if let Err(err) = self
            .base
            .core()
            .signer
            .store_share(index, &message.payload)
        {
            tracing::debug!(index, %err, "failed to store signature share");
            return false;
        }

        if let Err(err) = state.set_job_done(&message.pub_key, subround, true) {
            tracing::debug!(sender = %message.pub_key, subround = self.base.name(), %err, "failed to mark job done");
            return false;
        }

        let (reached, collected) = self.signatures_collected(threshold);
        self.metrics.signatures_collected.set(collected as f64);
        if reached {
            tracing::debug!(
                received = collected,
                total = state.consensus_group_size(),
                "signatures collected"
            );
        }

        self.status_handler
            .set_string_value(METRIC_CONSENSUS_ROUND_STATE, ROUND_STATE_SIGNED);

        true
    }

    /// Counts members of the consensus group, in group order, whose signature job is
    /// done. Members whose ledger entry can't be read are not counted.
    pub fn signatures_collected(&self, threshold: usize) -> (bool, usize) {
        let state = self.base.state();
        let subround = self.base.id();

        let collected = state
            .consensus_group()
            .iter()
            .filter(|member| match state.job_done(member, subround) {
                Ok(done) => done,
                Err(err) => {
                    tracing::debug!(subround = self.base.name(), %err, "failed to read job done flag");
                    false
                }
            })
            .count();

        (collected >= threshold, collected)
    }

    /// Decides whether the subround is finished for the local validator.
    pub fn do_signature_consensus_check(&self) -> bool {
        let state = self.base.state();
        let subround = self.base.id();

        if state.round_canceled() {
            return false;
        }

        if state.is_subround_finished(subround) {
            return true;
        }

        let is_self_leader = state.is_self_leader_in_current_round();
        let is_self_in_consensus_group = state.is_node_in_consensus_group(&state.self_pub_key());
        let (signatures_collected, _) = self.signatures_collected(state.threshold(subround));

        let is_job_done_by_leader = is_self_leader && signatures_collected;
        let is_job_done_by_consensus_node =
            !is_self_leader && is_self_in_consensus_group && state.is_self_job_done(subround);

        if !is_self_in_consensus_group || is_job_done_by_consensus_node || is_job_done_by_leader {
            tracing::debug!(subround = self.base.name(), "subround has been finished");
            state.set_status(subround, SubroundStatus::Finished);
            self.metrics.finished.increment(1);
            self.status_handler
                .set_string_value(METRIC_CONSENSUS_ROUND_STATE, ROUND_STATE_SIGNED);
            return true;
        }

        false
    }
}

impl Phase for SignatureSubround {
    fn id(&self) -> SubroundId {
        self.base.id()
    }

    fn job(&self) -> bool {
        self.do_signature_job()
    }

    fn check(&self) -> bool {
        self.do_signature_consensus_check()
    }

    fn extend(&self) {
        self.base.extend()
    }

    fn on_message(&self, message: &ConsensusMessage) -> bool {
        let accepted = self.received_signature(message);
        if accepted {
            self.metrics.shares_accepted.increment(1);
        } else {
            self.metrics.shares_rejected.increment(1);
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ConsensusCore, SubroundConfig,
        mock::{
            CHAIN_ID, MockMessenger, MockRound, MockSigner, TestNode, init_logger, mock_digest,
            mock_key, mock_round, signature_message,
        },
        state::ConsensusState,
    };
    use proptest::prelude::*;
    use quorum_common::Digest;
    use std::{sync::atomic::Ordering, time::Duration};

    fn leader(group_size: u8) -> TestNode {
        TestNode::new(mock_key(0), group_size)
    }

    fn follower(group_size: u8) -> TestNode {
        TestNode::new(mock_key(1), group_size)
    }

    #[test]
    fn only_signature_subround_is_accepted() {
        let id = SubroundId::Block;
        let config = SubroundConfig {
            id,
            previous: id.previous(),
            next: id.next(),
            start_time: Duration::ZERO,
            end_time: Duration::from_secs(1),
            name: "(BLOCK)".into(),
        };
        let core = ConsensusCore {
            signer: Arc::new(MockSigner::default()),
            messenger: Arc::new(MockMessenger::default()),
            round_handler: Arc::new(MockRound::new(0)),
        };
        let state = Arc::new(ConsensusState::new(mock_key(0)));
        let base = Subround::new(config, state, core, |_| {}).unwrap();

        assert!(matches!(
            SignatureSubround::new(base),
            Err(ConfigError::WrongSubround {
                expected: SubroundId::Signature,
                actual: SubroundId::Block,
            })
        ));
    }

    #[test]
    fn non_member_has_nothing_to_do() {
        init_logger();

        let node = TestNode::new(mock_key(9), 4);

        assert!(node.subround.job());
        assert!(node.signer.created.lock().is_empty());
        assert!(node.messenger.sent.lock().is_empty());

        assert!(node.subround.check());
        assert!(node.state.is_subround_finished(SubroundId::Signature));
    }

    #[test]
    fn follower_broadcasts_share_once() {
        init_logger();

        let node = follower(4);

        assert!(node.subround.job());
        assert!(node.state.is_self_job_done(SubroundId::Signature));

        {
            let sent = node.messenger.sent.lock();
            assert_eq!(sent.len(), 1);
            let message = &sent[0];
            assert_eq!(message.kind, MessageKind::Signature);
            assert_eq!(message.digest, mock_digest());
            assert_eq!(message.payload, mock_digest().as_bytes());
            assert_eq!(message.pub_key, mock_key(1));
            assert_eq!(message.round_index, 1);
            assert_eq!(message.chain_id, CHAIN_ID);
        }

        // Job is done, scheduler retries are refused without side effects.
        assert!(!node.subround.job());
        assert_eq!(node.messenger.sent.lock().len(), 1);
        assert_eq!(node.signer.created.lock().len(), 1);

        assert!(node.subround.check());
        assert_eq!(
            node.status.get(METRIC_CONSENSUS_ROUND_STATE).as_deref(),
            Some(ROUND_STATE_SIGNED)
        );
    }

    #[test]
    fn follower_is_not_finished_before_own_job() {
        let node = follower(4);
        assert!(!node.subround.check());
        assert!(!node.state.is_subround_finished(SubroundId::Signature));
    }

    #[test]
    fn leader_keeps_share_locally() {
        init_logger();

        let node = leader(4);

        assert!(node.subround.job());
        assert_eq!(node.signer.created.lock().as_slice(), &[mock_digest()]);
        assert!(node.messenger.sent.lock().is_empty());
        assert!(node.state.is_self_job_done(SubroundId::Signature));
    }

    #[test]
    fn leader_share_creation_failure() {
        init_logger();

        let node = leader(4);
        node.signer.fail_create.store(true, Ordering::SeqCst);

        assert!(!node.subround.job());
        assert!(node.messenger.sent.lock().is_empty());
        assert!(!node.state.is_self_job_done(SubroundId::Signature));

        node.signer.fail_create.store(false, Ordering::SeqCst);
        assert!(node.subround.job());
        assert!(node.state.is_self_job_done(SubroundId::Signature));
    }

    #[test]
    fn broadcast_failure_leaves_job_undone() {
        init_logger();

        let node = follower(4);
        node.messenger.fail.store(true, Ordering::SeqCst);

        assert!(!node.subround.job());
        assert!(!node.state.is_self_job_done(SubroundId::Signature));
        assert!(!node.subround.check());

        node.messenger.fail.store(false, Ordering::SeqCst);
        assert!(node.subround.job());
        assert_eq!(node.messenger.sent.lock().len(), 1);
        assert!(node.subround.check());
    }

    #[test]
    fn job_waits_for_agreed_data() {
        let node = TestNode::without_data(mock_key(1), 4);

        assert!(!node.subround.job());
        assert!(node.signer.created.lock().is_empty());
        assert!(node.messenger.sent.lock().is_empty());
    }

    #[test]
    fn follower_does_not_collect_signatures() {
        let node = follower(4);

        assert!(!node.subround.on_message(&signature_message(2, mock_digest(), 1)));
        assert!(node.signer.stored.lock().is_empty());
        assert_eq!(
            node.state.job_done(&mock_key(2), SubroundId::Signature),
            Ok(false)
        );
    }

    #[test]
    fn signature_over_other_data_is_rejected() {
        init_logger();

        let node = leader(4);
        let message = signature_message(1, Digest::from([0xbb; 32]), 1);

        assert!(!node.subround.on_message(&message));
        assert!(node.signer.stored.lock().is_empty());
        assert_eq!(
            node.state.job_done(&mock_key(1), SubroundId::Signature),
            Ok(false)
        );
    }

    #[test]
    fn signature_before_data_is_rejected() {
        let node = TestNode::without_data(mock_key(0), 4);

        assert!(!node.subround.on_message(&signature_message(1, mock_digest(), 1)));
        assert!(node.signer.stored.lock().is_empty());
    }

    #[test]
    fn inadmissible_senders_are_rejected() {
        init_logger();

        let node = leader(4);

        // stale round
        assert!(!node.subround.on_message(&signature_message(1, mock_digest(), 0)));
        // outside of the group
        assert!(!node.subround.on_message(&signature_message(7, mock_digest(), 1)));
        // own message
        assert!(!node.subround.on_message(&signature_message(0, mock_digest(), 1)));

        assert!(node.signer.stored.lock().is_empty());

        // duplicate
        assert!(node.subround.on_message(&signature_message(1, mock_digest(), 1)));
        assert!(!node.subround.on_message(&signature_message(1, mock_digest(), 1)));
        assert_eq!(node.signer.stored.lock().len(), 1);
    }

    #[test]
    fn storage_failure_leaves_sender_undone() {
        init_logger();

        let node = leader(4);
        node.signer.fail_store.store(true, Ordering::SeqCst);

        assert!(!node.subround.on_message(&signature_message(2, mock_digest(), 1)));
        assert_eq!(
            node.state.job_done(&mock_key(2), SubroundId::Signature),
            Ok(false)
        );
        assert_eq!(node.status.updates(METRIC_CONSENSUS_ROUND_STATE), 0);

        // Sender may deliver again once storage recovers.
        node.signer.fail_store.store(false, Ordering::SeqCst);
        assert!(node.subround.on_message(&signature_message(2, mock_digest(), 1)));
        assert_eq!(
            node.state.job_done(&mock_key(2), SubroundId::Signature),
            Ok(true)
        );
        assert_eq!(node.status.updates(METRIC_CONSENSUS_ROUND_STATE), 1);
    }

    #[test]
    fn leader_collects_until_threshold() {
        init_logger();

        // group [A(leader), B, C, D], threshold 3
        let node = leader(4);
        assert_eq!(node.state.threshold(SubroundId::Signature), 3);

        assert!(node.subround.job());
        assert!(!node.subround.check());

        assert!(node.subround.on_message(&signature_message(1, mock_digest(), 1)));
        assert_eq!(node.subround.signatures_collected(3), (false, 2));
        assert!(!node.subround.check());

        assert!(node.subround.on_message(&signature_message(2, mock_digest(), 1)));
        assert_eq!(node.subround.signatures_collected(3), (true, 3));
        assert!(node.subround.check());

        // Late share after the threshold.
        assert!(!node.subround.on_message(&signature_message(3, mock_digest(), 1)));
        assert_eq!(
            node.signer.stored.lock().keys().copied().collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(
            node.state.job_done(&mock_key(3), SubroundId::Signature),
            Ok(false)
        );
    }

    #[test]
    fn leader_finishes_without_status_handler() {
        init_logger();

        let state = Arc::new(ConsensusState::new(mock_key(0)));
        state.start_round(mock_round(1, 4)).unwrap();
        state.set_data(mock_digest());

        let signer = Arc::new(MockSigner::default());
        let messenger = Arc::new(MockMessenger::default());
        let core = ConsensusCore {
            signer: signer.clone(),
            messenger: messenger.clone(),
            round_handler: Arc::new(MockRound::new(1)),
        };
        let base = Subround::new(
            SubroundConfig::signature(Duration::from_secs(4)),
            state.clone(),
            core,
            |_| {},
        )
        .unwrap();
        let subround = SignatureSubround::new(base).unwrap();

        assert!(subround.job());
        assert!(messenger.sent.lock().is_empty());
        assert!(!subround.check());

        assert!(subround.on_message(&signature_message(1, mock_digest(), 1)));
        assert!(subround.on_message(&signature_message(2, mock_digest(), 1)));
        assert!(subround.check());

        assert_eq!(
            state.status(SubroundId::Signature),
            SubroundStatus::Finished
        );
        assert_eq!(
            signer.stored.lock().keys().copied().collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn leader_waits_for_own_share() {
        let node = leader(4);
        node.state.set_threshold(SubroundId::Signature, 3).unwrap();

        assert!(node.subround.on_message(&signature_message(1, mock_digest(), 1)));
        assert!(node.subround.on_message(&signature_message(2, mock_digest(), 1)));
        assert!(!node.subround.check());

        assert!(node.subround.job());
        assert!(node.subround.check());
    }

    #[test]
    fn finished_check_is_idempotent() {
        let node = follower(4);
        assert!(node.subround.job());

        assert!(node.subround.check());
        let updates = node.status.updates(METRIC_CONSENSUS_ROUND_STATE);
        assert_eq!(updates, 1);

        for _ in 0..3 {
            assert!(node.subround.check());
        }
        assert_eq!(node.status.updates(METRIC_CONSENSUS_ROUND_STATE), updates);
    }

    #[test]
    fn canceled_round_is_never_finished() {
        let node = TestNode::new(mock_key(9), 4);
        node.state.set_round_canceled(true);

        assert!(!node.subround.check());
        assert!(!node.state.is_subround_finished(SubroundId::Signature));

        node.state.set_round_canceled(false);
        assert!(node.subround.check());
    }

    #[test]
    fn done_flags_are_counted_once() {
        let node = leader(5);
        node.state
            .set_job_done(&mock_key(3), SubroundId::Signature, true)
            .unwrap();
        node.state
            .set_job_done(&mock_key(3), SubroundId::Signature, true)
            .unwrap();

        for _ in 0..3 {
            assert_eq!(node.subround.signatures_collected(2), (false, 1));
        }
    }

    #[test]
    fn concurrent_duplicates_store_one_share() {
        init_logger();

        let node = leader(7);
        let message = signature_message(4, mock_digest(), 1);

        let accepted = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| node.subround.on_message(&message)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|accepted| *accepted)
                .count()
        });

        assert_eq!(accepted, 1);
        assert_eq!(node.signer.stored.lock().len(), 1);
    }

    fn done_flags() -> impl Strategy<Value = (Vec<bool>, usize)> {
        proptest::collection::vec(any::<bool>(), 1..=16).prop_flat_map(|flags| {
            let size = flags.len();
            (Just(flags), 1..=size)
        })
    }

    proptest! {
        #[test]
        fn signatures_collected_matches_ledger((flags, threshold) in done_flags()) {
            let node = leader(flags.len() as u8);
            for (seed, done) in flags.iter().enumerate() {
                node.state
                    .set_job_done(&mock_key(seed as u8), SubroundId::Signature, *done)
                    .unwrap();
            }

            let expected = flags.iter().filter(|done| **done).count();
            prop_assert_eq!(
                node.subround.signatures_collected(threshold),
                (expected >= threshold, expected)
            );
        }
    }
}
