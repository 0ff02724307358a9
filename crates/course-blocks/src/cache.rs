// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port to the external store holding serialized base structures.
use thiserror::Error;

use crate::ident::{UsageKey, VersionToken};
use crate::structure::BlockStructure;

/// Errors a structure cache may report on writes.
///
/// Reads never fail: anything that cannot produce an intact structure is a
/// miss.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The structure could not be serialized.
    #[error("failed to encode block structure: {0}")]
    Encode(String),
    /// The backing store rejected the write.
    #[error("structure cache backend error: {0}")]
    Backend(String),
}

/// Cache of viewer-agnostic structures keyed by `(root, version token)`.
///
/// # Absence Semantics
///
/// [`get`](StructureCache::get) returns `None` for an absent entry, for an
/// entry stored under a different token and for an entry that fails to
/// decode. Concurrent writers for the same root race benignly: the last
/// write wins, and both computed the same structure.
pub trait StructureCache {
    /// Loads the structure stored for `root` under `token`.
    fn get(&self, root: &UsageKey, token: &VersionToken) -> Option<BlockStructure>;

    /// Stores `structure` for `root` under `token`, replacing any entry.
    fn put(
        &mut self,
        root: &UsageKey,
        token: &VersionToken,
        structure: &BlockStructure,
    ) -> Result<(), CacheError>;

    /// Drops the entry for `root`. No-op when absent.
    fn delete(&mut self, root: &UsageKey);
}

impl<T> StructureCache for &mut T
where
    T: StructureCache + ?Sized,
{
    fn get(&self, root: &UsageKey, token: &VersionToken) -> Option<BlockStructure> {
        (**self).get(root, token)
    }

    fn put(
        &mut self,
        root: &UsageKey,
        token: &VersionToken,
        structure: &BlockStructure,
    ) -> Result<(), CacheError> {
        (**self).put(root, token, structure)
    }

    fn delete(&mut self, root: &UsageKey) {
        (**self).delete(root);
    }
}
