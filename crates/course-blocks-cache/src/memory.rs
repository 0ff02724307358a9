// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory structure cache.

use std::collections::HashMap;
use std::sync::Arc;

use course_blocks::{BlockStructure, CacheError, ManagerSettings, StructureCache, UsageKey, VersionToken};
use tracing::{debug, warn};

use crate::{decode_structure, encode_structure, structure_digest, BlobHash};

struct Entry {
    token: VersionToken,
    digest: BlobHash,
    blob: Arc<[u8]>,
}

/// In-memory [`StructureCache`] holding one encoded structure per root.
///
/// The optional byte budget is advisory: `put` always succeeds and
/// [`is_over_budget`](MemoryStructureStore::is_over_budget) reports when the
/// stored blobs exceed it.
///
/// # Miss Semantics
///
/// - An entry stored under another version token is a miss.
/// - An entry whose bytes no longer match their digest is a miss.
/// - An entry that fails to decode is a miss.
pub struct MemoryStructureStore {
    entries: HashMap<UsageKey, Entry>,
    byte_count: usize,
    max_bytes: Option<usize>,
}

impl MemoryStructureStore {
    /// Create an empty store with no byte budget.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            byte_count: 0,
            max_bytes: None,
        }
    }

    /// Create an empty store with an advisory byte budget.
    pub fn with_limits(max_bytes: usize) -> Self {
        Self {
            max_bytes: Some(max_bytes),
            ..Self::new()
        }
    }

    /// Create a store honouring `settings.cache_budget_bytes`.
    pub fn from_settings(settings: &ManagerSettings) -> Self {
        match settings
            .cache_budget_bytes
            .map(usize::try_from)
        {
            Some(Ok(max)) => Self::with_limits(max),
            // A budget beyond the address space can never be exceeded.
            Some(Err(_)) | None => Self::new(),
        }
    }

    /// Number of roots with a stored entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total encoded bytes across all entries.
    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    /// Returns `true` if `byte_count` exceeds the configured budget.
    pub fn is_over_budget(&self) -> bool {
        self.max_bytes.is_some_and(|max| self.byte_count > max)
    }

    /// Content digest of the entry stored for `root`.
    pub fn entry_digest(&self, root: &UsageKey) -> Option<BlobHash> {
        self.entries.get(root).map(|entry| entry.digest)
    }

    /// Version token of the entry stored for `root`.
    pub fn entry_token(&self, root: &UsageKey) -> Option<VersionToken> {
        self.entries.get(root).map(|entry| entry.token)
    }

    /// Stores already encoded bytes for `root`, recording their digest.
    ///
    /// Used to seed the store from another tier. Bytes that do not decode are
    /// accepted here and reported as a miss on read.
    pub fn insert_encoded(&mut self, root: UsageKey, token: VersionToken, bytes: &[u8]) -> BlobHash {
        let digest = structure_digest(bytes);
        self.insert_entry(
            root,
            Entry {
                token,
                digest,
                blob: Arc::from(bytes),
            },
        );
        digest
    }

    fn insert_entry(&mut self, root: UsageKey, entry: Entry) {
        self.byte_count += entry.blob.len();
        if let Some(previous) = self.entries.insert(root, entry) {
            self.byte_count -= previous.blob.len();
        }
    }
}

impl Default for MemoryStructureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStructureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStructureStore")
            .field("entries", &self.entries.len())
            .field("byte_count", &self.byte_count)
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}

impl StructureCache for MemoryStructureStore {
    fn get(&self, root: &UsageKey, token: &VersionToken) -> Option<BlockStructure> {
        let entry = self.entries.get(root)?;
        if entry.token != *token {
            debug!(root = %root, stored = %entry.token, requested = %token, "version token mismatch");
            return None;
        }
        let computed = structure_digest(&entry.blob);
        if computed != entry.digest {
            warn!(root = %root, expected = %entry.digest, computed = %computed, "cached structure digest mismatch");
            return None;
        }
        match decode_structure(&entry.blob) {
            Ok(structure) => Some(structure),
            Err(err) => {
                warn!(root = %root, error = %err, "undecodable cached structure");
                None
            }
        }
    }

    fn put(
        &mut self,
        root: &UsageKey,
        token: &VersionToken,
        structure: &BlockStructure,
    ) -> Result<(), CacheError> {
        let bytes = encode_structure(structure).map_err(|err| CacheError::Encode(err.to_string()))?;
        let digest = structure_digest(&bytes);
        debug!(root = %root, token = %token, bytes = bytes.len(), digest = %digest, "stored structure");
        self.insert_entry(
            root.clone(),
            Entry {
                token: *token,
                digest,
                blob: Arc::from(bytes),
            },
        );
        Ok(())
    }

    fn delete(&mut self, root: &UsageKey) {
        if let Some(previous) = self.entries.remove(root) {
            self.byte_count -= previous.blob.len();
        }
    }
}
