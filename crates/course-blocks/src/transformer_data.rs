// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transformer-scoped data, structure-wide and per block, gated by versions.
//!
//! Every transformer owns one namespace keyed by its name. The first time a
//! transformer touches a structure its declared `(write, read)` versions are
//! recorded. Reads through a transformer whose declared pair no longer
//! matches the recorded one come back empty so the caller recomputes; stale
//! data is never handed out.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::block_data::{FieldMap, FieldValue};
use crate::ident::UsageKey;
use crate::structure::BlockStructure;
use crate::transformer::BlockTransformer;

/// Declared data versions of a transformer.
///
/// `write` names the shape of the data the transformer stores; `read` names
/// the shape it expects to find. Both must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformerVersions {
    /// Version of the data this transformer writes.
    pub write: u32,
    /// Version of the data this transformer reads.
    pub read: u32,
}

impl TransformerVersions {
    /// Builds a version pair.
    #[must_use]
    pub const fn new(write: u32, read: u32) -> Self {
        Self { write, read }
    }

    /// Checks that both versions are set.
    ///
    /// # Errors
    /// Returns [`VersioningError::Unversioned`] when either version is zero.
    pub fn validate(self, transformer: &str) -> Result<Self, VersioningError> {
        if self.write == 0 || self.read == 0 {
            return Err(VersioningError::Unversioned {
                transformer: transformer.to_owned(),
                write: self.write,
                read: self.read,
            });
        }
        Ok(self)
    }
}

/// Transformer versioning failure; a programming error caught at registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersioningError {
    /// A declared write or read version is not positive.
    #[error("version attributes are not set on transformer {transformer} (write={write}, read={read})")]
    Unversioned {
        /// Name of the offending transformer.
        transformer: String,
        /// Declared write version.
        write: u32,
        /// Declared read version.
        read: u32,
    },
}

/// Recorded transformer versions plus structure-wide transformer data.
///
/// Block-scoped transformer data lives on each block's
/// [`BlockData`](crate::BlockData) so that pruning a block drops it too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformerDataStore {
    versions: BTreeMap<String, TransformerVersions>,
    data: BTreeMap<String, FieldMap>,
}

impl TransformerDataStore {
    /// Versions recorded for the transformer named `name`.
    pub fn versions(&self, name: &str) -> Option<TransformerVersions> {
        self.versions.get(name).copied()
    }

    /// Names of every transformer that touched the structure.
    pub fn transformer_names(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }

    /// Structure-wide data of the transformer named `name`, unchecked.
    pub fn namespace(&self, name: &str) -> Option<&FieldMap> {
        self.data.get(name)
    }
}

/// Outcome of recording a transformer on a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// First time this transformer touched the structure.
    Recorded,
    /// Recorded versions already matched.
    Current,
    /// Recorded versions differed; the stale namespace was purged.
    Replaced {
        /// Versions found on the structure before replacement.
        previous: TransformerVersions,
    },
}

impl BlockStructure {
    /// Records `transformer`'s declared versions on this structure.
    ///
    /// When the structure carries a different pair for the same name, all of
    /// that transformer's structure-wide and block-scoped data is dropped and
    /// the new pair is recorded.
    ///
    /// # Errors
    /// Returns [`VersioningError`] if the declared versions are not positive.
    pub fn register_transformer<T>(&mut self, transformer: &T) -> Result<Registration, VersioningError>
    where
        T: BlockTransformer + ?Sized,
    {
        let name = transformer.name();
        let declared = transformer.versions().validate(name)?;
        let outcome = match self.transformer_data.versions.get(name) {
            Some(recorded) if *recorded == declared => return Ok(Registration::Current),
            Some(recorded) => Registration::Replaced {
                previous: *recorded,
            },
            None => Registration::Recorded,
        };
        if let Registration::Replaced { previous } = outcome {
            debug!(
                transformer = name,
                previous_write = previous.write,
                previous_read = previous.read,
                write = declared.write,
                read = declared.read,
                "dropping stale transformer data"
            );
            self.transformer_data.data.remove(name);
            for data in self.block_data.values_mut() {
                data.transformer_data.remove(name);
            }
        }
        self.transformer_data
            .versions
            .insert(name.to_owned(), declared);
        Ok(outcome)
    }

    /// Versions recorded for `name`, if that transformer touched the structure.
    pub fn transformer_versions(&self, name: &str) -> Option<TransformerVersions> {
        self.transformer_data.versions(name)
    }

    /// Returns `true` when the recorded versions for `transformer` match its
    /// declared ones, i.e. its data may be read.
    pub fn is_transformer_data_current<T>(&self, transformer: &T) -> bool
    where
        T: BlockTransformer + ?Sized,
    {
        self.transformer_data
            .versions
            .get(transformer.name())
            .is_some_and(|recorded| *recorded == transformer.versions())
    }

    /// Stores structure-wide `value` under `key` in `transformer`'s namespace.
    ///
    /// # Errors
    /// Returns [`VersioningError`] if the transformer is unversioned.
    pub fn set_transformer_data<T>(
        &mut self,
        transformer: &T,
        key: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Result<(), VersioningError>
    where
        T: BlockTransformer + ?Sized,
    {
        self.register_transformer(transformer)?;
        self.transformer_data
            .data
            .entry(transformer.name().to_owned())
            .or_default()
            .insert(key.into(), value.into());
        Ok(())
    }

    /// Structure-wide value under `key` in `transformer`'s namespace.
    ///
    /// `None` when absent or when the recorded versions are stale.
    pub fn get_transformer_data<T>(&self, transformer: &T, key: &str) -> Option<&FieldValue>
    where
        T: BlockTransformer + ?Sized,
    {
        if !self.is_transformer_data_current(transformer) {
            return None;
        }
        self.transformer_data
            .data
            .get(transformer.name())
            .and_then(|ns| ns.get(key))
    }

    /// Stores `value` under `field` in `transformer`'s namespace on block `key`.
    ///
    /// # Errors
    /// Returns [`VersioningError`] if the transformer is unversioned.
    ///
    /// # Panics
    /// Panics if `key` is not part of the structure.
    pub fn set_transformer_block_field<T>(
        &mut self,
        key: &UsageKey,
        transformer: &T,
        field: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Result<(), VersioningError>
    where
        T: BlockTransformer + ?Sized,
    {
        assert!(
            self.contains(key),
            "cannot write transformer data on {key}: block is not in the structure"
        );
        self.register_transformer(transformer)?;
        self.block_data
            .entry(key.clone())
            .or_default()
            .transformer_data
            .entry(transformer.name().to_owned())
            .or_default()
            .insert(field.into(), value.into());
        Ok(())
    }

    /// Value of `field` in `transformer`'s namespace on block `key`.
    ///
    /// `None` when absent or when the recorded versions are stale.
    pub fn get_transformer_block_field<T>(
        &self,
        key: &UsageKey,
        transformer: &T,
        field: &str,
    ) -> Option<&FieldValue>
    where
        T: BlockTransformer + ?Sized,
    {
        if !self.is_transformer_data_current(transformer) {
            return None;
        }
        self.block_data
            .get(key)
            .and_then(|data| data.transformer_data.get(transformer.name()))
            .and_then(|ns| ns.get(field))
    }

    /// Recorded versions and structure-wide transformer data.
    pub fn transformer_data(&self) -> &TransformerDataStore {
        &self.transformer_data
    }
}
