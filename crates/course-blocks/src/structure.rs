// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Graph core of a block structure: parent/child relations over usage keys.
//!
//! Relations are kept as an arena keyed by [`UsageKey`] with an adjacency
//! entry per block. Child lists preserve insertion order; parent lists are
//! maintained in lockstep and are never edited directly by callers.
//!
//! Invariants
//! - For every block `p` in the structure and every `c` in `children(p)`,
//!   `c` is in the structure and `p` is in `parents(c)`, and vice versa.
//! - A block absent from the relations arena appears in no child or parent
//!   list.
//! - The graph is acyclic. Convergence (a block with several parents) is
//!   allowed.
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::block_data::BlockData;
use crate::ident::UsageKey;
use crate::transformer_data::TransformerDataStore;

/// Adjacency entry for one block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRelations {
    pub(crate) parents: Vec<UsageKey>,
    pub(crate) children: Vec<UsageKey>,
}

/// In-memory graph of course blocks plus collected, overridden and
/// transformer-scoped data.
///
/// A structure is built once per pipeline run (or once, viewer-agnostic, as a
/// cacheable base), mutated in place while transformers run and then either
/// discarded or serialized to a structure cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockStructure {
    pub(crate) root: UsageKey,
    pub(crate) relations: BTreeMap<UsageKey, BlockRelations>,
    pub(crate) block_data: BTreeMap<UsageKey, BlockData>,
    pub(crate) transformer_data: TransformerDataStore,
    pub(crate) requested_fields: BTreeSet<String>,
    pub(crate) collected_fields: BTreeSet<String>,
}

impl BlockStructure {
    /// Creates an empty structure whose entry point is `root`.
    ///
    /// The root itself is not added; builders add it like any other block.
    pub fn new(root: UsageKey) -> Self {
        Self {
            root,
            relations: BTreeMap::new(),
            block_data: BTreeMap::new(),
            transformer_data: TransformerDataStore::default(),
            requested_fields: BTreeSet::new(),
            collected_fields: BTreeSet::new(),
        }
    }

    /// Returns the usage key designated as the entry point.
    #[must_use]
    pub fn root(&self) -> &UsageKey {
        &self.root
    }

    /// Adds `key` to the structure. Adding a present block is a no-op.
    pub fn add_node(&mut self, key: UsageKey) {
        self.block_data.entry(key.clone()).or_default();
        self.relations.entry(key).or_default();
    }

    /// Adds a `parent -> child` edge. Adding an existing edge is a no-op.
    ///
    /// # Panics
    /// Panics if either endpoint is not part of the structure: an edge to a
    /// block outside the node set is a programming error, never repaired.
    pub fn add_edge(&mut self, parent: &UsageKey, child: &UsageKey) {
        assert!(
            self.relations.contains_key(parent),
            "edge source {parent} is not in the block structure"
        );
        assert!(
            self.relations.contains_key(child),
            "edge target {child} is not in the block structure"
        );
        if let Some(rel) = self.relations.get_mut(parent) {
            if !rel.children.contains(child) {
                rel.children.push(child.clone());
            }
        }
        if let Some(rel) = self.relations.get_mut(child) {
            if !rel.parents.contains(parent) {
                rel.parents.push(parent.clone());
            }
        }
    }

    /// Returns the ordered children of `key` (empty for unknown blocks).
    pub fn get_children(&self, key: &UsageKey) -> &[UsageKey] {
        self.relations
            .get(key)
            .map_or(&[][..], |rel| rel.children.as_slice())
    }

    /// Returns the parents of `key` (empty for unknown blocks and the root).
    pub fn get_parents(&self, key: &UsageKey) -> &[UsageKey] {
        self.relations
            .get(key)
            .map_or(&[][..], |rel| rel.parents.as_slice())
    }

    /// Returns `true` if `key` is currently part of the structure.
    ///
    /// Blocks orphaned by a removal stay part of the structure until
    /// [`prune_unreachable`](Self::prune_unreachable) runs; a removed block
    /// itself is gone immediately.
    #[must_use]
    pub fn contains(&self, key: &UsageKey) -> bool {
        self.relations.contains_key(key)
    }

    /// Iterates over every block in the structure in ascending key order.
    pub fn all_nodes(&self) -> impl Iterator<Item = &UsageKey> {
        self.relations.keys()
    }

    /// Number of blocks in the structure.
    #[must_use]
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// Returns `true` if the structure holds no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Snapshot of the child lists of every block.
    pub fn children_map(&self) -> BTreeMap<UsageKey, Vec<UsageKey>> {
        self.relations
            .iter()
            .map(|(key, rel)| (key.clone(), rel.children.clone()))
            .collect()
    }

    /// Detaches `key` from every neighbour and drops its relations entry.
    ///
    /// Returns the former `(parents, children)` of the block.
    pub(crate) fn detach(&mut self, key: &UsageKey) -> (Vec<UsageKey>, Vec<UsageKey>) {
        let Some(rel) = self.relations.remove(key) else {
            return (Vec::new(), Vec::new());
        };
        for child in &rel.children {
            if let Some(child_rel) = self.relations.get_mut(child) {
                child_rel.parents.retain(|p| p != key);
            }
        }
        for parent in &rel.parents {
            if let Some(parent_rel) = self.relations.get_mut(parent) {
                parent_rel.children.retain(|c| c != key);
            }
        }
        (rel.parents, rel.children)
    }

    /// Checks that every parent and child names a block of the graph, that
    /// no list repeats a block, and that parent and child lists are mutual
    /// inverses.
    ///
    /// Structures built through this API always pass; a structure read back
    /// from bytes may not.
    pub fn relations_consistent(&self) -> bool {
        fn distinct(keys: &[UsageKey]) -> bool {
            keys.iter().collect::<BTreeSet<_>>().len() == keys.len()
        }
        self.relations.iter().all(|(key, rel)| {
            distinct(&rel.children)
                && distinct(&rel.parents)
                && rel.children.iter().all(|c| {
                    self.relations
                        .get(c)
                        .is_some_and(|child| child.parents.contains(key))
                })
                && rel.parents.iter().all(|p| {
                    self.relations
                        .get(p)
                        .is_some_and(|parent| parent.children.contains(key))
                })
        })
    }
}

impl<'a> IntoIterator for &'a BlockStructure {
    type Item = &'a UsageKey;
    type IntoIter = std::collections::btree_map::Keys<'a, UsageKey, BlockRelations>;

    fn into_iter(self) -> Self::IntoIter {
        self.relations.keys()
    }
}
