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

//! # Quorum common types
//!
//! Foundation layer shared by the consensus subrounds and the signers:
//!
//! - primitives: [`Digest`], [`PublicKey`] and the [`ToDigest`] hashing helper;
//! - [`ConsensusMessage`], the wire envelope exchanged between validators;
//! - [`SubroundId`] and [`SubroundStatus`], the phases of a consensus round;
//! - the collaborator traits consumed by the subrounds
//!   ([`ThresholdSigner`], [`BroadcastMessenger`], [`RoundHandler`], [`StatusHandler`]).

mod collaborators;
mod message;
mod primitives;
mod subround;

pub use collaborators::{
    BroadcastMessenger, METRIC_CONSENSUS_ROUND_STATE, NoopStatusHandler, RoundHandler,
    StatusHandler, ThresholdSigner,
};
pub use message::{ConsensusMessage, MessageKind};
pub use primitives::{Digest, PUBLIC_KEY_LEN, PublicKey, ToDigest};
pub use subround::{SubroundId, SubroundStatus};

pub use sha3;
