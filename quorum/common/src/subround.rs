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

use derive_more::Display;
use parity_scale_codec::{Decode, Encode};

/// Phases of a consensus round, in execution order.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub enum SubroundId {
    #[display("START_ROUND")]
    StartRound,
    #[display("BLOCK")]
    Block,
    #[display("SIGNATURE")]
    Signature,
    #[display("END_ROUND")]
    EndRound,
}

impl SubroundId {
    pub const ALL: [SubroundId; 4] = [
        SubroundId::StartRound,
        SubroundId::Block,
        SubroundId::Signature,
        SubroundId::EndRound,
    ];

    pub fn previous(self) -> Option<SubroundId> {
        match self {
            SubroundId::StartRound => None,
            SubroundId::Block => Some(SubroundId::StartRound),
            SubroundId::Signature => Some(SubroundId::Block),
            SubroundId::EndRound => Some(SubroundId::Signature),
        }
    }

    pub fn next(self) -> Option<SubroundId> {
        match self {
            SubroundId::StartRound => Some(SubroundId::Block),
            SubroundId::Block => Some(SubroundId::Signature),
            SubroundId::Signature => Some(SubroundId::EndRound),
            SubroundId::EndRound => None,
        }
    }
}

/// Status of a subround inside the current round.
///
/// Only moves from `NotFinished` to `Finished`; reset when a new round starts.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SubroundStatus {
    #[default]
    NotFinished,
    Finished,
}
