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

use crate::{Digest, PublicKey, SubroundId};
use derive_more::Display;
use parity_scale_codec::{Decode, Encode};

/// Marker telling which subround a [`ConsensusMessage`] belongs to.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub enum MessageKind {
    #[codec(index = 0)]
    BlockBody,
    #[codec(index = 1)]
    BlockHeader,
    #[codec(index = 2)]
    Signature,
    #[codec(index = 3)]
    BlockHeaderFinalInfo,
}

impl MessageKind {
    /// Subround that handles messages of this kind.
    pub fn subround(self) -> SubroundId {
        match self {
            MessageKind::BlockBody | MessageKind::BlockHeader => SubroundId::Block,
            MessageKind::Signature => SubroundId::Signature,
            MessageKind::BlockHeaderFinalInfo => SubroundId::EndRound,
        }
    }
}

/// Envelope exchanged between validators during a consensus round.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ConsensusMessage {
    /// Digest of the block header the round agrees on
    pub digest: Digest,
    /// Subround specific payload, e.g. a signature share
    pub payload: Vec<u8>,
    /// Sender identity
    pub pub_key: PublicKey,
    /// Sender signature over the envelope, filled by the network layer
    pub signature: Vec<u8>,
    pub kind: MessageKind,
    pub round_index: i64,
    /// Protects against replaying messages across chains
    pub chain_id: Vec<u8>,
    pub pub_keys_bitmap: Vec<u8>,
    pub aggregate_signature: Vec<u8>,
    pub leader_signature: Vec<u8>,
}

impl ConsensusMessage {
    pub fn new(
        digest: Digest,
        payload: Vec<u8>,
        pub_key: PublicKey,
        kind: MessageKind,
        round_index: i64,
        chain_id: Vec<u8>,
    ) -> Self {
        Self {
            digest,
            payload,
            pub_key,
            signature: Vec::new(),
            kind,
            round_index,
            chain_id,
            pub_keys_bitmap: Vec::new(),
            aggregate_signature: Vec::new(),
            leader_signature: Vec::new(),
        }
    }
}
