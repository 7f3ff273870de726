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

//! Interfaces of the services a subround depends on.
//!
//! All of them are process-lifetime singletons shared between rounds, so every
//! method takes `&self` and implementations are expected to be `Send + Sync`.

use crate::{ConsensusMessage, Digest};
use anyhow::Result;

/// Status key updated by the subrounds while a round progresses.
pub const METRIC_CONSENSUS_ROUND_STATE: &str = "consensus_round_state";

/// Threshold multi-signature capability.
pub trait ThresholdSigner: Send + Sync {
    /// Creates this validator's signature share over `digest`.
    fn create_share(&self, digest: &Digest) -> Result<Vec<u8>>;

    /// Stores a share received from the validator at `index` in the consensus group.
    fn store_share(&self, index: u16, share: &[u8]) -> Result<()>;
}

/// Outbound side of the consensus network.
pub trait BroadcastMessenger: Send + Sync {
    fn broadcast_consensus_message(&self, message: ConsensusMessage) -> Result<()>;
}

/// Round clock, owned by the round scheduler.
pub trait RoundHandler: Send + Sync {
    /// Index of the current round.
    fn index(&self) -> i64;

    /// Identifier of the chain, included into outgoing messages.
    fn chain_id(&self) -> Vec<u8>;
}

/// Best-effort sink for human readable node status.
pub trait StatusHandler: Send + Sync {
    fn set_string_value(&self, key: &str, value: &str);
}

/// [`StatusHandler`] which drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStatusHandler;

impl StatusHandler for NoopStatusHandler {
    fn set_string_value(&self, _key: &str, _value: &str) {}
}
