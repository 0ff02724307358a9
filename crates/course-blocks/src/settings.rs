// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tunables for [`BlockStructureManager`](crate::BlockStructureManager).
use serde::{Deserialize, Serialize};

/// Manager settings; absent keys take their defaults when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Read and write the structure cache.
    pub cache_enabled: bool,
    /// Keep the collected base structure in memory between requests for the
    /// same version token.
    pub reuse_base_structure: bool,
    /// Advisory byte budget for in-memory cache tiers.
    pub cache_budget_bytes: Option<u64>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            reuse_base_structure: true,
            cache_budget_bytes: None,
        }
    }
}
