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
    ConsensusCore, ConsensusState, RoundData, SignatureSubround, StatusRegistry, Subround,
    SubroundConfig,
};
use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use quorum_common::{
    BroadcastMessenger, ConsensusMessage, Digest, MessageKind, PUBLIC_KEY_LEN, PublicKey,
    RoundHandler, ThresholdSigner,
};
use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
    time::Duration,
};

pub const CHAIN_ID: &[u8] = b"quorum-test";

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn mock_key(seed: u8) -> PublicKey {
    PublicKey([seed; PUBLIC_KEY_LEN])
}

pub fn mock_round(index: i64, group_size: u8) -> RoundData {
    RoundData {
        index,
        consensus_group: (0..group_size).map(mock_key).collect(),
    }
}

pub fn mock_digest() -> Digest {
    Digest::from([0xaa; 32])
}

pub fn signature_message(sender: u8, digest: Digest, round_index: i64) -> ConsensusMessage {
    ConsensusMessage::new(
        digest,
        vec![sender; 64],
        mock_key(sender),
        MessageKind::Signature,
        round_index,
        CHAIN_ID.to_vec(),
    )
}

#[derive(Debug, Default)]
pub struct MockSigner {
    pub fail_create: AtomicBool,
    pub fail_store: AtomicBool,
    pub created: Mutex<Vec<Digest>>,
    pub stored: Mutex<BTreeMap<u16, Vec<u8>>>,
}

impl ThresholdSigner for MockSigner {
    fn create_share(&self, digest: &Digest) -> Result<Vec<u8>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(anyhow!("share creation failed"));
        }

        self.created.lock().push(*digest);
        Ok(digest.as_bytes().to_vec())
    }

    fn store_share(&self, index: u16, share: &[u8]) -> Result<()> {
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(anyhow!("share storage failed"));
        }

        let mut stored = self.stored.lock();
        anyhow::ensure!(!stored.contains_key(&index), "slot {index} is occupied");
        stored.insert(index, share.to_vec());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockMessenger {
    pub fail: AtomicBool,
    pub sent: Mutex<Vec<ConsensusMessage>>,
}

impl BroadcastMessenger for MockMessenger {
    fn broadcast_consensus_message(&self, message: ConsensusMessage) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("network is down"));
        }

        self.sent.lock().push(message);
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockRound {
    index: AtomicI64,
}

impl MockRound {
    pub fn new(index: i64) -> Self {
        Self {
            index: AtomicI64::new(index),
        }
    }
}

impl RoundHandler for MockRound {
    fn index(&self) -> i64 {
        self.index.load(Ordering::SeqCst)
    }

    fn chain_id(&self) -> Vec<u8> {
        CHAIN_ID.to_vec()
    }
}

/// Validator with the signature subround wired to mocks, in round 1 of a
/// group `mock_key(0..group_size)` with [`mock_digest`] agreed.
pub struct TestNode {
    pub state: Arc<ConsensusState>,
    pub signer: Arc<MockSigner>,
    pub messenger: Arc<MockMessenger>,
    pub status: Arc<StatusRegistry>,
    pub subround: SignatureSubround,
}

impl TestNode {
    pub fn new(self_key: PublicKey, group_size: u8) -> Self {
        let node = Self::without_data(self_key, group_size);
        node.state.set_data(mock_digest());
        node
    }

    pub fn without_data(self_key: PublicKey, group_size: u8) -> Self {
        let state = Arc::new(ConsensusState::new(self_key));
        state.start_round(mock_round(1, group_size)).unwrap();

        let signer = Arc::new(MockSigner::default());
        let messenger = Arc::new(MockMessenger::default());
        let status = Arc::new(StatusRegistry::new());

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

        let subround = SignatureSubround::new(base)
            .unwrap()
            .with_status_handler(status.clone());

        Self {
            state,
            signer,
            messenger,
            status,
            subround,
        }
    }
}
