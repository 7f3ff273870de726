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

//! # Quorum multi-signer
//!
//! [`MultiSigner`] is the [`ThresholdSigner`] used by validators in production.
//! Each validator signs the agreed digest with its own secp256k1 key, and the leader
//! collects the shares of the consensus group indexed by group position. The
//! aggregate is the set of verified shares together with the bitmap of signers.

use k256::ecdsa::{
    Signature, SigningKey, VerifyingKey,
    signature::{Signer as _, Verifier as _},
};
use parking_lot::Mutex;
use quorum_common::{Digest, PublicKey, ThresholdSigner};
use std::collections::BTreeMap;
use thiserror::Error;

pub use k256::ecdsa::SigningKey as PrivateKey;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(#[source] k256::ecdsa::Error),
    #[error("Invalid public key of validator {index}: {source}")]
    InvalidPublicKey {
        index: usize,
        #[source]
        source: k256::ecdsa::Error,
    },
    #[error("Consensus group of {0} validators doesn't fit into u16 indexes")]
    GroupTooLarge(usize),
    #[error("Index {index} is out of consensus group of {size} validators")]
    IndexOutOfBounds { index: u16, size: usize },
    #[error("Malformed signature share of validator {index}: {source}")]
    MalformedShare {
        index: u16,
        #[source]
        source: k256::ecdsa::Error,
    },
    #[error("Signature share of validator {0} is already stored")]
    ShareAlreadyStored(u16),
    #[error("Signature share of validator {0} does not match the digest")]
    InvalidShare(u16),
    #[error("Failed to sign digest: {0}")]
    Signing(#[source] k256::ecdsa::Error),
    #[error("No signature shares collected")]
    NoShares,
}

/// Shares of a consensus group over one digest, ordered by group index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedSignature {
    /// Bit `i` is set if validator `i` of the group signed
    pub bitmap: Vec<u8>,
    /// 64-byte compact signatures by group index
    pub signatures: BTreeMap<u16, Vec<u8>>,
}

impl AggregatedSignature {
    pub fn signers(&self) -> usize {
        self.signatures.len()
    }
}

#[derive(Debug, Default)]
struct Session {
    group: Vec<VerifyingKey>,
    self_index: Option<u16>,
    shares: BTreeMap<u16, Signature>,
}

impl Session {
    fn check_index(&self, index: u16) -> Result<(), SignerError> {
        if usize::from(index) < self.group.len() {
            Ok(())
        } else {
            Err(SignerError::IndexOutOfBounds {
                index,
                size: self.group.len(),
            })
        }
    }
}

/// secp256k1 multi-signer bound to one validator key.
///
/// Must be [`reset`](MultiSigner::reset) with the consensus group at the start of
/// every round; shares of the previous round are dropped.
#[derive(Debug)]
pub struct MultiSigner {
    key: SigningKey,
    session: Mutex<Session>,
}

impl MultiSigner {
    pub fn new(key: SigningKey) -> Self {
        Self {
            key,
            session: Mutex::new(Session::default()),
        }
    }

    pub fn from_seed(seed: [u8; 32]) -> Result<Self, SignerError> {
        SigningKey::from_slice(&seed)
            .map(Self::new)
            .map_err(SignerError::InvalidPrivateKey)
    }

    pub fn public_key(&self) -> PublicKey {
        to_public_key(self.key.verifying_key())
    }

    /// Starts a new signing session for `group`.
    pub fn reset(&self, group: &[PublicKey]) -> Result<(), SignerError> {
        if group.len() > usize::from(u16::MAX) {
            return Err(SignerError::GroupTooLarge(group.len()));
        }

        let keys = group
            .iter()
            .enumerate()
            .map(|(index, key)| {
                VerifyingKey::from_sec1_bytes(key.as_bytes())
                    .map_err(|source| SignerError::InvalidPublicKey { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let own = self.public_key();
        let self_index = group
            .iter()
            .position(|key| *key == own)
            .map(|index| index as u16);

        *self.session.lock() = Session {
            group: keys,
            self_index,
            shares: BTreeMap::new(),
        };

        Ok(())
    }

    /// Signs `digest`, storing the share at own index when this validator is in the group.
    pub fn sign(&self, digest: &Digest) -> Result<Vec<u8>, SignerError> {
        let signature: Signature = self
            .key
            .try_sign(digest.as_bytes())
            .map_err(SignerError::Signing)?;

        let mut session = self.session.lock();
        if let Some(index) = session.self_index {
            session.shares.insert(index, signature);
        }

        Ok(signature.to_bytes().to_vec())
    }

    /// Stores share of the validator at `index`, refusing to overwrite an occupied slot.
    pub fn store(&self, index: u16, share: &[u8]) -> Result<(), SignerError> {
        let signature = Signature::from_slice(share)
            .map_err(|source| SignerError::MalformedShare { index, source })?;

        let mut session = self.session.lock();
        session.check_index(index)?;

        if session.shares.contains_key(&index) {
            return Err(SignerError::ShareAlreadyStored(index));
        }

        session.shares.insert(index, signature);
        tracing::trace!(index, "signature share stored");

        Ok(())
    }

    /// Checks that `share` is a signature of validator `index` over `digest`.
    pub fn verify_share(&self, index: u16, digest: &Digest, share: &[u8]) -> Result<(), SignerError> {
        let signature = Signature::from_slice(share)
            .map_err(|source| SignerError::MalformedShare { index, source })?;

        let session = self.session.lock();
        session.check_index(index)?;

        session.group[usize::from(index)]
            .verify(digest.as_bytes(), &signature)
            .map_err(|_| SignerError::InvalidShare(index))
    }

    /// Verifies every stored share over `digest` and bundles them.
    pub fn aggregate(&self, digest: &Digest) -> Result<AggregatedSignature, SignerError> {
        let session = self.session.lock();

        if session.shares.is_empty() {
            return Err(SignerError::NoShares);
        }

        let mut bitmap = vec![0u8; session.group.len().div_ceil(8)];
        let mut signatures = BTreeMap::new();

        for (&index, signature) in &session.shares {
            session.group[usize::from(index)]
                .verify(digest.as_bytes(), signature)
                .map_err(|_| SignerError::InvalidShare(index))?;

            bitmap[usize::from(index / 8)] |= 1 << (index % 8);
            signatures.insert(index, signature.to_bytes().to_vec());
        }

        Ok(AggregatedSignature { bitmap, signatures })
    }
}

impl ThresholdSigner for MultiSigner {
    fn create_share(&self, digest: &Digest) -> anyhow::Result<Vec<u8>> {
        Ok(self.sign(digest)?)
    }

    fn store_share(&self, index: u16, share: &[u8]) -> anyhow::Result<()> {
        Ok(self.store(index, share)?)
    }
}

fn to_public_key(key: &VerifyingKey) -> PublicKey {
    PublicKey::from_slice(key.to_encoded_point(true).as_bytes())
        .unwrap_or_else(|| unreachable!("compressed secp256k1 point is 33 bytes"))
}
