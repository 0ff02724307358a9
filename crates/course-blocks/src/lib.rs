// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! course-blocks: block structure engine for course content.
//!
//! A [`BlockStructure`] is an in-memory convergent DAG of course blocks keyed
//! by [`UsageKey`], carrying collected and overridden block fields plus
//! versioned, per-transformer data. A [`TransformerPipeline`] runs an ordered
//! list of [`BlockTransformer`]s in two phases:
//!
//! 1. **collect**: every transformer declares the block fields it needs and
//!    the structure fetches them from a [`ContentSource`] in one batch. The
//!    result is viewer-agnostic and cacheable through a [`StructureCache`].
//! 2. **transform**: every transformer, in order, filters or annotates a copy
//!    of that structure for one viewer ([`UsageInfo`]).
//!
//! [`BlockStructureManager`] ties source, cache and pipeline together for
//! one root.
//!
//! # Versioning
//!
//! Each transformer declares `(write, read)` versions. Data written under a
//! pair that no longer matches the transformer's declared one reads back as
//! absent, and the manager rebuilds any cached structure carrying such data.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]

mod block_data;
mod cache;
/// Reference transformers (staff-only visibility, special exams).
pub mod demo;
mod factory;
mod ident;
mod manager;
mod pipeline;
mod settings;
mod source;
mod structure;
mod transformer;
mod transformer_data;
mod traversal;

/// Per-block field storage.
pub use block_data::{BlockData, FieldMap, FieldValue};
/// Structure cache port.
pub use cache::{CacheError, StructureCache};
/// Structure construction.
pub use factory::{BlockStructureFactory, BuildError};
/// Identifier types and version token derivation.
pub use ident::{make_version_token, CourseKey, Hash, UsageKey, UserId, VersionToken};
/// Per-root structure manager.
pub use manager::{BlockStructureManager, ManagerError};
/// Two-phase transformer orchestration.
pub use pipeline::{PipelineError, TransformerPipeline};
/// Manager tunables.
pub use settings::ManagerSettings;
/// Content source port.
pub use source::{ContentSource, SourceBlock, SourceError};
/// The block graph.
pub use structure::BlockStructure;
/// Transformer contract and viewer context.
pub use transformer::{BlockTransformer, Decision, FieldRequests, UsageInfo};
/// Versioned transformer data.
pub use transformer_data::{Registration, TransformerDataStore, TransformerVersions, VersioningError};
/// Traversal cursors.
pub use traversal::{Topological, TopologicalWalk};
