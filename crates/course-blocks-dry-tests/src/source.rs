// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory content source fake.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use course_blocks::{
    make_version_token, ContentSource, FieldMap, FieldValue, SourceBlock, SourceError, UsageKey,
    VersionToken,
};

use crate::fixtures::key;

/// In-memory [`ContentSource`] for tests.
///
/// Clones share state, so a test can hand one clone to a manager and keep
/// another to edit content, flip failure switches and read call counters.
#[derive(Clone, Default)]
pub struct InMemoryContentSource {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    children: BTreeMap<UsageKey, Vec<UsageKey>>,
    fields: BTreeMap<UsageKey, FieldMap>,
    marker: String,
    unavailable: bool,
    root_reads: usize,
    children_reads: usize,
    field_reads: usize,
}

impl InMemoryContentSource {
    /// Create an empty source at content version `"v0"`.
    pub fn new() -> Self {
        let source = Self::default();
        source.set_version("v0");
        source
    }

    /// Create a source from an index-based children map (block `i` is [`key`]`(i)`).
    pub fn from_children(children: &[&[usize]]) -> Self {
        let source = Self::new();
        for (parent, kids) in children.iter().enumerate() {
            source.add_block(key(parent), kids.iter().map(|c| key(*c)).collect());
        }
        source
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds (or replaces) block `location` with ordered `children`.
    pub fn add_block(&self, location: UsageKey, children: Vec<UsageKey>) {
        self.lock().children.insert(location, children);
    }

    /// Drops block `location`; edges pointing at it are left dangling.
    pub fn remove_block(&self, location: &UsageKey) {
        let mut inner = self.lock();
        inner.children.remove(location);
        inner.fields.remove(location);
    }

    /// Sets field `name` on block `location`.
    pub fn set_field(&self, location: &UsageKey, name: &str, value: impl Into<FieldValue>) {
        self.lock()
            .fields
            .entry(location.clone())
            .or_default()
            .insert(name.to_owned(), value.into());
    }

    /// Changes the last-modified marker the version token derives from.
    pub fn set_version(&self, marker: &str) {
        marker.clone_into(&mut self.lock().marker);
    }

    /// Makes every call fail with [`SourceError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Number of `get_root_item` calls.
    pub fn root_reads(&self) -> usize {
        self.lock().root_reads
    }

    /// Number of `get_children` calls.
    pub fn children_reads(&self) -> usize {
        self.lock().children_reads
    }

    /// Number of `get_field` calls.
    pub fn field_reads(&self) -> usize {
        self.lock().field_reads
    }

    /// Resets every call counter.
    pub fn reset_counts(&self) {
        let mut inner = self.lock();
        inner.root_reads = 0;
        inner.children_reads = 0;
        inner.field_reads = 0;
    }
}

impl Inner {
    fn check_available(&self) -> Result<(), SourceError> {
        if self.unavailable {
            return Err(SourceError::Unavailable("simulated outage".into()));
        }
        Ok(())
    }

    fn block(&self, location: &UsageKey) -> Result<SourceBlock, SourceError> {
        self.children
            .get(location)
            .map(|children| SourceBlock {
                location: location.clone(),
                children: children.clone(),
            })
            .ok_or_else(|| SourceError::ItemNotFound(location.clone()))
    }
}

impl ContentSource for InMemoryContentSource {
    fn get_root_item(&self, key: &UsageKey) -> Result<SourceBlock, SourceError> {
        let mut inner = self.lock();
        inner.root_reads += 1;
        inner.check_available()?;
        inner.block(key)
    }

    fn get_children(&self, block: &SourceBlock) -> Result<Vec<SourceBlock>, SourceError> {
        let mut inner = self.lock();
        inner.children_reads += 1;
        inner.check_available()?;
        block.children.iter().map(|child| inner.block(child)).collect()
    }

    fn get_field(&self, key: &UsageKey, field: &str) -> Result<Option<FieldValue>, SourceError> {
        let mut inner = self.lock();
        inner.field_reads += 1;
        inner.check_available()?;
        Ok(inner.fields.get(key).and_then(|f| f.get(field)).cloned())
    }

    fn version_token(&self, _root: &UsageKey) -> Result<VersionToken, SourceError> {
        let inner = self.lock();
        inner.check_available()?;
        Ok(make_version_token(&inner.marker))
    }
}
