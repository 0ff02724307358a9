// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transformer doubles.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use course_blocks::{
    BlockStructure, BlockTransformer, FieldRequests, TransformerVersions, UsageInfo, UsageKey,
};

/// Shared, ordered record of transformer calls (`"collect:<name>"`,
/// `"transform:<name>"`).
#[derive(Clone, Default, Debug)]
pub struct TransformerLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl TransformerLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&self, entry: String) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
    }

    /// Snapshot of all entries in call order.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Configurable transformer that requests fields, logs its calls and records
/// the number of blocks it saw in its own namespace (`"seen_blocks"`).
#[derive(Clone, Debug)]
pub struct MockTransformer {
    name: String,
    versions: TransformerVersions,
    fields: Vec<String>,
    log: TransformerLog,
}

impl MockTransformer {
    /// Transformer `name` at versions `(1, 1)` requesting nothing.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            versions: TransformerVersions::new(1, 1),
            fields: Vec::new(),
            log: TransformerLog::new(),
        }
    }

    /// Declares different versions.
    pub fn with_versions(mut self, write: u32, read: u32) -> Self {
        self.versions = TransformerVersions::new(write, read);
        self
    }

    /// Requests `fields` during collect.
    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| (*f).to_owned()).collect();
        self
    }

    /// Logs calls into `log`.
    pub fn with_log(mut self, log: &TransformerLog) -> Self {
        self.log = log.clone();
        self
    }

    /// Boxes the transformer for a pipeline.
    pub fn boxed(self) -> Box<dyn BlockTransformer> {
        Box::new(self)
    }
}

impl BlockTransformer for MockTransformer {
    fn name(&self) -> &str {
        &self.name
    }

    fn versions(&self) -> TransformerVersions {
        self.versions
    }

    fn collect(&self, requests: &mut FieldRequests<'_>) {
        self.log.push(format!("collect:{}", self.name));
        requests.request_fields(self.fields.iter().cloned());
    }

    fn transform(&self, _usage_info: &UsageInfo, structure: &mut BlockStructure) {
        self.log.push(format!("transform:{}", self.name));
        let seen = structure.len() as u64;
        // Versions are positive for every pipeline-registered mock.
        let _ = structure.set_transformer_data(self, "seen_blocks", seen);
    }
}

/// Removes a fixed set of blocks (without keeping descendants) through
/// `remove_block_traversal`.
#[derive(Clone, Debug)]
pub struct RemoveBlocksTransformer {
    name: String,
    targets: BTreeSet<UsageKey>,
}

impl RemoveBlocksTransformer {
    /// Transformer `name` removing every key in `targets`.
    pub fn new(name: &str, targets: impl IntoIterator<Item = UsageKey>) -> Self {
        Self {
            name: name.to_owned(),
            targets: targets.into_iter().collect(),
        }
    }

    /// Boxes the transformer for a pipeline.
    pub fn boxed(self) -> Box<dyn BlockTransformer> {
        Box::new(self)
    }
}

impl BlockTransformer for RemoveBlocksTransformer {
    fn name(&self) -> &str {
        &self.name
    }

    fn versions(&self) -> TransformerVersions {
        TransformerVersions::new(1, 1)
    }

    fn collect(&self, _requests: &mut FieldRequests<'_>) {}

    fn transform(&self, _usage_info: &UsageInfo, structure: &mut BlockStructure) {
        structure.remove_block_traversal(|_, key| self.targets.contains(key));
    }
}
