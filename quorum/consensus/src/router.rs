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

use crate::{config::ConfigError, subround::Phase};
use parking_lot::RwLock;
use quorum_common::{ConsensusMessage, MessageKind};
use std::{collections::BTreeMap, sync::Arc};

/// Delivers inbound consensus messages to the subround registered for their kind.
pub struct MessageRouter {
    chain_id: Vec<u8>,
    receivers: RwLock<BTreeMap<MessageKind, Arc<dyn Phase>>>,
}

impl MessageRouter {
    pub fn new(chain_id: Vec<u8>) -> Self {
        Self {
            chain_id,
            receivers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers `phase` as the receiver of `kind` messages, replacing the previous one.
    pub fn register(&self, kind: MessageKind, phase: Arc<dyn Phase>) -> Result<(), ConfigError> {
        if kind.subround() != phase.id() {
            return Err(ConfigError::KindMismatch {
                kind,
                subround: phase.id(),
            });
        }

        self.receivers.write().insert(kind, phase);
        Ok(())
    }

    pub fn unregister(&self, kind: MessageKind) {
        self.receivers.write().remove(&kind);
    }

    /// Returns `true` if the receiving subround accepted the message.
    pub fn route(&self, message: &ConsensusMessage) -> bool {
        if message.chain_id != self.chain_id {
            tracing::trace!(
                sender = %message.pub_key,
                chain_id = %hex::encode(&message.chain_id),
                "message of another chain"
            );
            return false;
        }

        let Some(phase) = self.receivers.read().get(&message.kind).cloned() else {
            tracing::trace!(kind = %message.kind, "no receiver for message");
            return false;
        };

        phase.on_message(message)
    }
}
