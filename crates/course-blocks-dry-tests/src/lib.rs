// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for course-blocks crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`fixtures`] - Index-based children maps, structure builders and assertions
//! - [`source`] - In-memory content source with call counters and failure switches
//! - [`transformers`] - Mock, logging and removing transformers

pub mod config;
pub mod fixtures;
pub mod source;
pub mod transformers;

// Re-export commonly used items at crate root for convenience
pub use config::InMemoryConfigStore;
pub use fixtures::{
    assert_block_structure, build_structure, children_map, key, parents_map, DAG_CHILDREN,
    LINEAR_CHILDREN, SIMPLE_CHILDREN,
};
pub use source::InMemoryContentSource;
pub use transformers::{MockTransformer, RemoveBlocksTransformer, TransformerLog};
