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

use quorum_common::{MessageKind, PublicKey, SubroundId};
use std::time::Duration;
use thiserror::Error;

/// Errors in how a subround or a round is set up.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Subround {id} must end after it starts, got {start:?}..{end:?}")]
    InvalidTiming {
        id: SubroundId,
        start: Duration,
        end: Duration,
    },
    #[error("Subround {id} can't follow {previous}")]
    InvalidPrevious {
        id: SubroundId,
        previous: SubroundId,
    },
    #[error("Subround {id} can't precede {next}")]
    InvalidNext { id: SubroundId, next: SubroundId },
    #[error("Expected {expected} subround, got {actual}")]
    WrongSubround {
        expected: SubroundId,
        actual: SubroundId,
    },
    #[error("Messages of kind {kind} can't be handled by {subround} subround")]
    KindMismatch {
        kind: MessageKind,
        subround: SubroundId,
    },
    #[error("Consensus group is empty")]
    EmptyConsensusGroup,
    #[error("Validator {0} appears in the consensus group more than once")]
    DuplicateMember(PublicKey),
    #[error("Threshold {threshold} is out of range 1..={group_size}")]
    InvalidThreshold { threshold: usize, group_size: usize },
}

/// Placement of a subround inside a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubroundConfig {
    pub id: SubroundId,
    pub previous: Option<SubroundId>,
    pub next: Option<SubroundId>,
    /// Offset of the subround start from the round start
    pub start_time: Duration,
    /// Offset of the subround deadline from the round start
    pub end_time: Duration,
    pub name: String,
}

impl SubroundConfig {
    /// Share of the round elapsed when signature collection starts.
    pub const SIGNATURE_START_RATIO: f64 = 0.25;
    /// Share of the round elapsed when signature collection must be done.
    pub const SIGNATURE_END_RATIO: f64 = 0.65;

    /// Default signature subround window for rounds of `round_duration`.
    pub fn signature(round_duration: Duration) -> Self {
        let id = SubroundId::Signature;
        Self {
            id,
            previous: id.previous(),
            next: id.next(),
            start_time: round_duration.mul_f64(Self::SIGNATURE_START_RATIO),
            end_time: round_duration.mul_f64(Self::SIGNATURE_END_RATIO),
            name: format!("({id})"),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let Self {
            id,
            previous,
            next,
            start_time,
            end_time,
            name: _,
        } = self;

        if end_time <= start_time {
            return Err(ConfigError::InvalidTiming {
                id: *id,
                start: *start_time,
                end: *end_time,
            });
        }

        if let Some(previous) = previous.filter(|previous| previous >= id) {
            return Err(ConfigError::InvalidPrevious { id: *id, previous });
        }

        if let Some(next) = next.filter(|next| next <= id) {
            return Err(ConfigError::InvalidNext { id: *id, next });
        }

        Ok(())
    }
}
