// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Two-phase orchestration of an ordered transformer list.
//!
//! Collect runs every transformer's field declarations and then fetches all
//! requested fields from the content source exactly once. Transform applies
//! each transformer in order to the same structure and finishes with a prune.
use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::source::{ContentSource, SourceError};
use crate::structure::BlockStructure;
use crate::transformer::{BlockTransformer, FieldRequests, UsageInfo};
use crate::transformer_data::VersioningError;

/// Errors surfaced by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// A transformer declares invalid versions.
    #[error(transparent)]
    Versioning(#[from] VersioningError),
    /// Two transformers share a name, and therefore a data namespace.
    #[error("duplicate transformer: {0}")]
    DuplicateTransformer(String),
    /// Field collection failed.
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Ordered, validated list of transformers supplied by the caller.
pub struct TransformerPipeline {
    transformers: Vec<Box<dyn BlockTransformer>>,
}

impl fmt::Debug for TransformerPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl TransformerPipeline {
    /// Validates `transformers` and fixes their application order.
    ///
    /// # Errors
    /// [`PipelineError::Versioning`] for a transformer with a non-positive
    /// version; [`PipelineError::DuplicateTransformer`] when two share a name.
    pub fn new(transformers: Vec<Box<dyn BlockTransformer>>) -> Result<Self, PipelineError> {
        let mut seen = BTreeSet::new();
        for transformer in &transformers {
            let name = transformer.name();
            transformer.versions().validate(name)?;
            if !seen.insert(name.to_owned()) {
                return Err(PipelineError::DuplicateTransformer(name.to_owned()));
            }
        }
        Ok(Self { transformers })
    }

    /// Transformers in application order.
    pub fn transformers(&self) -> impl Iterator<Item = &dyn BlockTransformer> {
        self.transformers.iter().map(AsRef::as_ref)
    }

    /// Transformer names in application order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transformers.iter().map(|t| t.name())
    }

    /// Number of transformers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    /// Returns `true` for a pipeline without transformers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Records every transformer's versions, gathers their field requests and
    /// fetches the requested fields in one batch.
    ///
    /// # Errors
    /// Propagates versioning and content source failures.
    #[instrument(level = "debug", skip_all, fields(root = %structure.root(), transformers = self.len()))]
    pub fn collect<S>(&self, structure: &mut BlockStructure, source: &S) -> Result<(), PipelineError>
    where
        S: ContentSource + ?Sized,
    {
        for transformer in &self.transformers {
            structure.register_transformer(transformer.as_ref())?;
            transformer.collect(&mut FieldRequests::new(structure));
        }
        structure.collect_requested_fields(source)?;
        Ok(())
    }

    /// Applies every transformer in order for one viewer, then prunes
    /// blocks the removals left unreachable.
    #[instrument(level = "debug", skip_all, fields(root = %structure.root(), user = usage_info.user.0))]
    pub fn transform(&self, usage_info: &UsageInfo, structure: &mut BlockStructure) {
        for transformer in &self.transformers {
            transformer.transform(usage_info, structure);
        }
        let pruned = structure.prune_unreachable();
        debug!(pruned, remaining = structure.len(), "transform phase finished");
    }

    /// Runs [`collect`](Self::collect) then [`transform`](Self::transform).
    ///
    /// # Errors
    /// Propagates collect-phase failures; nothing is transformed then.
    pub fn run<S>(
        &self,
        usage_info: &UsageInfo,
        structure: &mut BlockStructure,
        source: &S,
    ) -> Result<(), PipelineError>
    where
        S: ContentSource + ?Sized,
    {
        self.collect(structure, source)?;
        self.transform(usage_info, structure);
        Ok(())
    }

    /// Returns `true` when `structure` carries current data for every
    /// transformer of this pipeline.
    pub fn verify_versions(&self, structure: &BlockStructure) -> bool {
        self.transformers
            .iter()
            .all(|t| structure.is_transformer_data_current(t.as_ref()))
    }

    /// Names of transformers whose data on `structure` is missing or stale.
    pub fn stale_transformers<'a>(&'a self, structure: &BlockStructure) -> Vec<&'a str> {
        self.transformers
            .iter()
            .filter(|t| !structure.is_transformer_data_current(t.as_ref()))
            .map(|t| t.name())
            .collect()
    }
}
