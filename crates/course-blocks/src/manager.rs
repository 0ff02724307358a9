// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-root entry point tying source, cache and pipeline together.
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::cache::{CacheError, StructureCache};
use crate::factory::{BlockStructureFactory, BuildError};
use crate::ident::{UsageKey, VersionToken};
use crate::pipeline::{PipelineError, TransformerPipeline};
use crate::settings::ManagerSettings;
use crate::source::{ContentSource, SourceError};
use crate::structure::BlockStructure;
use crate::transformer::UsageInfo;

/// Errors surfaced by [`BlockStructureManager`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    /// The structure could not be built from the content source.
    #[error(transparent)]
    Build(#[from] BuildError),
    /// The collect phase failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// The content source failed outside construction (e.g. version lookup).
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The collected structure could not be stored.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Serves collected and per-viewer structures for one root.
///
/// The collected (viewer-agnostic) structure is looked up in the cache under
/// the source's current version token. A hit that carries stale or missing
/// data for any pipeline transformer counts as a miss; misses rebuild from
/// the source, run the collect phase and refill the cache.
#[derive(Debug)]
pub struct BlockStructureManager<S, C> {
    root: UsageKey,
    source: S,
    cache: C,
    pipeline: TransformerPipeline,
    settings: ManagerSettings,
    base: Option<(VersionToken, BlockStructure)>,
}

impl<S, C> BlockStructureManager<S, C>
where
    S: ContentSource,
    C: StructureCache,
{
    /// Creates a manager with default settings.
    pub fn new(root: UsageKey, source: S, cache: C, pipeline: TransformerPipeline) -> Self {
        Self {
            root,
            source,
            cache,
            pipeline,
            settings: ManagerSettings::default(),
            base: None,
        }
    }

    /// Replaces the settings.
    pub fn with_settings(mut self, settings: ManagerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Root this manager serves.
    pub fn root(&self) -> &UsageKey {
        &self.root
    }

    /// Active settings.
    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Transformer pipeline applied by this manager.
    pub fn pipeline(&self) -> &TransformerPipeline {
        &self.pipeline
    }

    /// Content source backing this manager.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Structure cache backing this manager.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Returns the collected, viewer-agnostic structure for the current
    /// content version.
    ///
    /// # Errors
    /// Source, build, collect and cache write failures propagate unchanged.
    #[instrument(level = "debug", skip_all, fields(root = %self.root))]
    pub fn get_collected(&mut self) -> Result<BlockStructure, ManagerError> {
        let token = self.source.version_token(&self.root)?;
        if self.settings.reuse_base_structure {
            if let Some((memo_token, base)) = &self.base {
                if *memo_token == token && self.pipeline.verify_versions(base) {
                    debug!(token = %token, "reusing memoised base structure");
                    return Ok(base.copy());
                }
            }
        }
        let structure = self.load_or_build(&token)?;
        if self.settings.reuse_base_structure {
            self.base = Some((token, structure.copy()));
        }
        Ok(structure)
    }

    /// Returns the structure as seen by the viewer in `usage_info`.
    ///
    /// Works on a copy of the collected base, which is never mutated.
    ///
    /// # Errors
    /// See [`get_collected`](Self::get_collected).
    pub fn get_transformed(&mut self, usage_info: &UsageInfo) -> Result<BlockStructure, ManagerError> {
        let mut structure = self.get_collected()?;
        self.pipeline.transform(usage_info, &mut structure);
        Ok(structure)
    }

    /// Drops the memoised base and the cache entry for the root.
    pub fn clear(&mut self) {
        self.base = None;
        self.cache.delete(&self.root);
        debug!(root = %self.root, "cleared collected structure");
    }

    fn load_or_build(&mut self, token: &VersionToken) -> Result<BlockStructure, ManagerError> {
        if self.settings.cache_enabled {
            if let Some(cached) = BlockStructureFactory::build_from_cache(&self.root, token, &self.cache) {
                let stale = self.pipeline.stale_transformers(&cached);
                if stale.is_empty() {
                    return Ok(cached);
                }
                info!(
                    root = %self.root,
                    stale = ?stale,
                    "cached structure has stale transformer data; rebuilding"
                );
            }
        }
        let mut structure = BlockStructureFactory::build_from_source(&self.root, &self.source)?;
        self.pipeline.collect(&mut structure, &self.source)?;
        if self.settings.cache_enabled {
            self.cache.put(&self.root, token, &structure)?;
        }
        Ok(structure)
    }
}
