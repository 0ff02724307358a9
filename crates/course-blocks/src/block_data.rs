// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-block field storage: collected values and explicit overrides.
//!
//! Fields are collected in one batch per distinct set of requested names.
//! Overrides always win over collected values and never hit the content
//! source.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ident::UsageKey;
use crate::source::{ContentSource, SourceError};
use crate::structure::BlockStructure;

/// Value stored for a block field or transformer datum.
///
/// The CBOR data model, so every structure serializes with a single codec.
pub type FieldValue = ciborium::Value;

/// Field-name to value map used by every data layer.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Data attached to one block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockData {
    pub(crate) collected: FieldMap,
    pub(crate) overridden: FieldMap,
    /// Block-scoped transformer data, namespaced by transformer name.
    pub(crate) transformer_data: BTreeMap<String, FieldMap>,
}

impl BlockData {
    /// Effective value of `name`: the override if present, else the collected value.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.overridden
            .get(name)
            .or_else(|| self.collected.get(name))
    }

    /// Value fetched from the content source, ignoring overrides.
    pub fn collected_field(&self, name: &str) -> Option<&FieldValue> {
        self.collected.get(name)
    }

    /// Explicit override for `name`, if one was written.
    pub fn overridden_field(&self, name: &str) -> Option<&FieldValue> {
        self.overridden.get(name)
    }

    /// Block-scoped data written by the transformer named `transformer`.
    pub fn transformer_fields(&self, transformer: &str) -> Option<&FieldMap> {
        self.transformer_data.get(transformer)
    }
}

impl BlockStructure {
    /// Adds `names` to the pending field request set.
    ///
    /// Nothing is fetched until [`collect_requested_fields`](Self::collect_requested_fields).
    pub fn request_fields<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested_fields.extend(names.into_iter().map(Into::into));
    }

    /// Requested field names that have not been collected yet.
    pub fn pending_fields(&self) -> impl Iterator<Item = &str> {
        self.requested_fields
            .difference(&self.collected_fields)
            .map(String::as_str)
    }

    /// Every field name requested so far.
    pub fn requested_fields(&self) -> impl Iterator<Item = &str> {
        self.requested_fields.iter().map(String::as_str)
    }

    /// Fetches every pending field for every block in one pass.
    ///
    /// Fields a block does not have are simply not stored. Calling this again
    /// without new requests does not touch the source.
    ///
    /// # Errors
    /// Propagates the first [`SourceError`] unchanged; fields already stored
    /// in this pass are kept but the batch is not marked collected.
    pub fn collect_requested_fields<S>(&mut self, source: &S) -> Result<(), SourceError>
    where
        S: ContentSource + ?Sized,
    {
        let pending: Vec<String> = self.pending_fields().map(str::to_owned).collect();
        if pending.is_empty() {
            return Ok(());
        }
        let mut stored = 0usize;
        for key in self.relations.keys() {
            let data = self.block_data.entry(key.clone()).or_default();
            for name in &pending {
                if let Some(value) = source.get_field(key, name)? {
                    data.collected.insert(name.clone(), value);
                    stored += 1;
                }
            }
        }
        debug!(
            fields = pending.len(),
            blocks = self.relations.len(),
            stored,
            "collected requested block fields"
        );
        self.collected_fields.extend(pending);
        Ok(())
    }

    /// Effective value of field `name` on `key`, or `None` when neither
    /// collected nor overridden.
    pub fn get_field(&self, key: &UsageKey, name: &str) -> Option<&FieldValue> {
        self.block_data.get(key).and_then(|data| data.field(name))
    }

    /// Effective value of field `name` on `key`, or `default`.
    pub fn get_field_or(&self, key: &UsageKey, name: &str, default: FieldValue) -> FieldValue {
        self.get_field(key, name).cloned().unwrap_or(default)
    }

    /// Boolean reading of field `name`; `default` when absent or not a bool.
    pub fn get_bool_field(&self, key: &UsageKey, name: &str, default: bool) -> bool {
        self.get_field(key, name)
            .and_then(FieldValue::as_bool)
            .unwrap_or(default)
    }

    /// Writes `value` into the override layer of `key`.
    ///
    /// # Panics
    /// Panics if `key` is not part of the structure.
    pub fn override_field(&mut self, key: &UsageKey, name: impl Into<String>, value: impl Into<FieldValue>) {
        assert!(
            self.contains(key),
            "cannot override a field on {key}: block is not in the structure"
        );
        self.block_data
            .entry(key.clone())
            .or_default()
            .overridden
            .insert(name.into(), value.into());
    }

    /// Data record of `key`, if any.
    ///
    /// The record of a removed block survives until the next prune.
    pub fn block_data(&self, key: &UsageKey) -> Option<&BlockData> {
        self.block_data.get(key)
    }

    /// Every data record currently held, including those of removed blocks
    /// awaiting a prune.
    pub fn block_data_map(&self) -> &BTreeMap<UsageKey, BlockData> {
        &self.block_data
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::ident::{make_version_token, VersionToken};
    use crate::source::SourceBlock;

    struct Fields {
        data: BTreeMap<UsageKey, FieldMap>,
        reads: Cell<usize>,
    }

    impl ContentSource for Fields {
        fn get_root_item(&self, key: &UsageKey) -> Result<SourceBlock, SourceError> {
            Err(SourceError::ItemNotFound(key.clone()))
        }

        fn get_children(&self, _block: &SourceBlock) -> Result<Vec<SourceBlock>, SourceError> {
            Ok(Vec::new())
        }

        fn get_field(&self, key: &UsageKey, field: &str) -> Result<Option<FieldValue>, SourceError> {
            self.reads.set(self.reads.get() + 1);
            Ok(self.data.get(key).and_then(|m| m.get(field)).cloned())
        }

        fn version_token(&self, _root: &UsageKey) -> Result<VersionToken, SourceError> {
            Ok(make_version_token("fields"))
        }
    }

    fn fixture() -> (BlockStructure, Fields) {
        let mut s = BlockStructure::new(UsageKey::from("A"));
        let mut data = BTreeMap::new();
        let blocks: [(&str, Vec<(&str, FieldValue)>); 5] = [
            ("A", vec![]),
            ("B", vec![("field1", "B.val1".into())]),
            ("C", vec![("field1", "C.val1".into()), ("field2", "C.val2".into())]),
            ("D", vec![("field1", true.into()), ("field2", false.into())]),
            ("E", vec![("field1", FieldValue::Null), ("field2", false.into())]),
        ];
        for (name, fields) in blocks {
            s.add_node(UsageKey::from(name));
            data.insert(
                UsageKey::from(name),
                fields
                    .into_iter()
                    .map(|(k, v)| (k.to_owned(), v))
                    .collect::<FieldMap>(),
            );
        }
        (
            s,
            Fields {
                data,
                reads: Cell::new(0),
            },
        )
    }

    #[test]
    fn fields_are_absent_until_collected() {
        let (mut s, source) = fixture();
        s.request_fields(["field1", "field2", "field3"]);
        assert!(s.get_field(&UsageKey::from("B"), "field1").is_none());
        assert_eq!(s.pending_fields().count(), 3);
        s.collect_requested_fields(&source).unwrap();
        assert_eq!(s.pending_fields().count(), 0);
    }

    #[test]
    fn collected_fields_match_each_block_subset() {
        let (mut s, source) = fixture();
        s.request_fields(["field1", "field2", "field3"]);
        s.collect_requested_fields(&source).unwrap();
        for (key, fields) in &source.data {
            for name in ["field1", "field2", "field3"] {
                assert_eq!(s.get_field(key, name), fields.get(name), "{key}.{name}");
            }
        }
        let missing = s.get_field_or(&UsageKey::from("A"), "field3", "dflt".into());
        assert_eq!(missing, FieldValue::from("dflt"));
    }

    #[test]
    fn collection_is_idempotent_without_new_requests() {
        let (mut s, source) = fixture();
        s.request_fields(["field1"]);
        s.collect_requested_fields(&source).unwrap();
        let reads = source.reads.get();
        assert_eq!(reads, 5);
        s.collect_requested_fields(&source).unwrap();
        assert_eq!(source.reads.get(), reads);

        s.request_fields(["field1", "field2"]);
        s.collect_requested_fields(&source).unwrap();
        assert_eq!(source.reads.get(), reads + 5, "only field2 is fetched");
    }

    #[test]
    fn override_wins_over_collected_value() {
        let (mut s, source) = fixture();
        let c = UsageKey::from("C");
        s.request_fields(["field1"]);
        s.collect_requested_fields(&source).unwrap();
        s.override_field(&c, "field1", "overridden");
        assert_eq!(s.get_field(&c, "field1"), Some(&FieldValue::from("overridden")));
        let data = s.block_data(&c).unwrap();
        assert_eq!(data.collected_field("field1"), Some(&FieldValue::from("C.val1")));
    }

    #[test]
    fn override_does_not_require_collection() {
        let (mut s, _source) = fixture();
        let a = UsageKey::from("A");
        s.override_field(&a, "due", 42u64);
        assert_eq!(s.get_field(&a, "due"), Some(&FieldValue::from(42u64)));
        assert!(s.get_bool_field(&a, "due", true), "non-bool falls back to default");
    }
}
