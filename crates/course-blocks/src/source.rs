// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port to the durable content store that structures are built from.
use thiserror::Error;

use crate::block_data::FieldValue;
use crate::ident::{UsageKey, VersionToken};

/// A block as handed out by a [`ContentSource`]: its key and ordered child keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBlock {
    /// Usage key of the block.
    pub location: UsageKey,
    /// Ordered usage keys of its children.
    pub children: Vec<UsageKey>,
}

/// Failure reported by a content source. Propagated to callers unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The requested item does not exist in the source.
    #[error("item not found: {0}")]
    ItemNotFound(UsageKey),
    /// The source could not be reached or failed internally.
    #[error("content source unavailable: {0}")]
    Unavailable(String),
}

/// Read access to course content, already resolved to one revision
/// (draft/publish resolution is the source's concern).
pub trait ContentSource {
    /// Loads the block at `key`.
    fn get_root_item(&self, key: &UsageKey) -> Result<SourceBlock, SourceError>;

    /// Loads the children of `block`, in order.
    fn get_children(&self, block: &SourceBlock) -> Result<Vec<SourceBlock>, SourceError>;

    /// Reads one field of block `key`; `Ok(None)` when the block lacks it.
    fn get_field(&self, key: &UsageKey, field: &str) -> Result<Option<FieldValue>, SourceError>;

    /// Token naming the current content version under `root`.
    fn version_token(&self, root: &UsageKey) -> Result<VersionToken, SourceError>;
}

impl<T> ContentSource for &T
where
    T: ContentSource + ?Sized,
{
    fn get_root_item(&self, key: &UsageKey) -> Result<SourceBlock, SourceError> {
        (**self).get_root_item(key)
    }

    fn get_children(&self, block: &SourceBlock) -> Result<Vec<SourceBlock>, SourceError> {
        (**self).get_children(block)
    }

    fn get_field(&self, key: &UsageKey, field: &str) -> Result<Option<FieldValue>, SourceError> {
        (**self).get_field(key, field)
    }

    fn version_token(&self, root: &UsageKey) -> Result<VersionToken, SourceError> {
        (**self).version_token(root)
    }
}
