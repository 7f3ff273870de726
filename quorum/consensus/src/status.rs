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

use parking_lot::RwLock;
use quorum_common::StatusHandler;
use std::collections::BTreeMap;

/// [`StatusHandler`] keeping the latest value of every status key in memory,
/// e.g. for a node status endpoint.
#[derive(Debug, Default)]
pub struct StatusRegistry {
    values: RwLock<BTreeMap<String, String>>,
    updates: RwLock<BTreeMap<String, u64>>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Number of times `key` has been set.
    pub fn updates(&self, key: &str) -> u64 {
        self.updates.read().get(key).copied().unwrap_or(0)
    }
}

impl StatusHandler for StatusRegistry {
    fn set_string_value(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_owned(), value.to_owned());
        *self.updates.write().entry(key.to_owned()).or_default() += 1;
    }
}
