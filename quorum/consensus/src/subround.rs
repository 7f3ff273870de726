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

use crate::{
    config::{ConfigError, SubroundConfig},
    state::ConsensusState,
};
use derive_more::Debug;
use quorum_common::{
    BroadcastMessenger, ConsensusMessage, RoundHandler, SubroundId, ThresholdSigner,
};
use std::{sync::Arc, time::Duration};

/// A subround as seen by the round scheduler.
pub trait Phase: Send + Sync {
    fn id(&self) -> SubroundId;

    /// Runs the job of the local validator. Returns `false` if it should be retried.
    fn job(&self) -> bool;

    /// Returns `true` once the subround is finished for the local validator.
    fn check(&self) -> bool;

    /// Called by the scheduler when the subround deadline passed unfinished.
    fn extend(&self);

    /// Handles an inbound message of this subround. Returns `true` if it changed the state.
    fn on_message(&self, message: &ConsensusMessage) -> bool;
}

/// Services a subround uses to act on the outer world.
#[derive(Clone, Debug)]
pub struct ConsensusCore {
    #[debug(skip)]
    pub signer: Arc<dyn ThresholdSigner>,
    #[debug(skip)]
    pub messenger: Arc<dyn BroadcastMessenger>,
    #[debug(skip)]
    pub round_handler: Arc<dyn RoundHandler>,
}

/// Parts common to all subrounds: placement in the round, shared round state
/// and the services of the [`ConsensusCore`].
#[derive(Debug)]
pub struct Subround {
    config: SubroundConfig,
    state: Arc<ConsensusState>,
    core: ConsensusCore,
    #[debug(skip)]
    extend: Box<dyn Fn(SubroundId) + Send + Sync>,
}

impl Subround {
    pub fn new(
        config: SubroundConfig,
        state: Arc<ConsensusState>,
        core: ConsensusCore,
        extend: impl Fn(SubroundId) + Send + Sync + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            config,
            state,
            core,
            extend: Box::new(extend),
        })
    }

    pub fn id(&self) -> SubroundId {
        self.config.id
    }

    pub fn previous(&self) -> Option<SubroundId> {
        self.config.previous
    }

    pub fn next(&self) -> Option<SubroundId> {
        self.config.next
    }

    pub fn start_time(&self) -> Duration {
        self.config.start_time
    }

    pub fn end_time(&self) -> Duration {
        self.config.end_time
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn state(&self) -> &ConsensusState {
        &self.state
    }

    pub fn core(&self) -> &ConsensusCore {
        &self.core
    }

    pub fn extend(&self) {
        (self.extend)(self.config.id)
    }
}
