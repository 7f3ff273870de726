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

//! # Quorum consensus subrounds
//!
//! A consensus round is split into ordered subrounds ([`SubroundId`]). The round
//! scheduler drives every subround through the [`Phase`] trait:
//!
//! - [`Phase::job`] is invoked for the local validator, once per round;
//! - [`Phase::on_message`] receives inbound messages of the subround (see [`MessageRouter`]);
//! - [`Phase::check`] is polled until it reports the subround finished.
//!
//! All subrounds of a round share one [`ConsensusState`], which holds the consensus
//! group, the agreed data and the job-done ledger.
//!
//! [`SignatureSubround`] implements signature collection: group members sign the
//! agreed digest, followers send their share to the network and the leader collects
//! shares until the Byzantine threshold is reached.
//!
//! [`SubroundId`]: quorum_common::SubroundId

mod config;
mod router;
mod signature;
mod state;
mod status;
mod subround;

#[cfg(test)]
mod mock;

pub use config::{ConfigError, SubroundConfig};
pub use router::MessageRouter;
pub use signature::SignatureSubround;
pub use state::{ConsensusState, RoundData, StateError, pbft_threshold};
pub use status::StatusRegistry;
pub use subround::{ConsensusCore, Phase, Subround};

/// Value of the round state status once the signature subround made progress.
pub const ROUND_STATE_SIGNED: &str = "signed";
