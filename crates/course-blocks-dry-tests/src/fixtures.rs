// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Index-based graph fixtures and structure assertions.
//!
//! A children map is a slice indexed by block number: `children[i]` lists
//! the children of block [`key`]`(i)`. Block `0` is the root.

use std::collections::{BTreeMap, BTreeSet};

use course_blocks::{BlockStructure, BlockStructureFactory, TransformerDataStore, UsageKey};

/// Tree with two levels.
///
/// ```text
///        0
///      /   \
///     1     2
///    / \    |
///   3   4   5
/// ```
pub const SIMPLE_CHILDREN: &[&[usize]] = &[&[1, 2], &[3, 4], &[5], &[], &[], &[]];

/// Single chain `0 -> 1 -> 2 -> 3`.
pub const LINEAR_CHILDREN: &[&[usize]] = &[&[1], &[2], &[3], &[]];

/// Convergent DAG.
///
/// ```text
///        0
///      /   \
///     1     2
///      \   / \
///        3    4
///       / \  /
///      5    6
/// ```
pub const DAG_CHILDREN: &[&[usize]] = &[&[1, 2], &[3], &[3, 4], &[5, 6], &[6], &[], &[]];

/// Usage key of block `i`.
pub fn key(i: usize) -> UsageKey {
    UsageKey::new(format!("block-v1:edX+Test+2024+type@block+block@{i}"))
}

/// Converts an index-based children map into a keyed one.
pub fn children_map(children: &[&[usize]]) -> BTreeMap<UsageKey, Vec<UsageKey>> {
    children
        .iter()
        .enumerate()
        .map(|(i, kids)| (key(i), kids.iter().map(|c| key(*c)).collect()))
        .collect()
}

/// Derives the parents of every block from an index-based children map.
pub fn parents_map(children: &[&[usize]]) -> Vec<Vec<usize>> {
    let mut parents = vec![Vec::new(); children.len()];
    for (parent, kids) in children.iter().enumerate() {
        for child in *kids {
            parents[*child].push(parent);
        }
    }
    parents
}

/// Assembles a structure rooted at block `0` with no data attached.
pub fn build_structure(children: &[&[usize]]) -> BlockStructure {
    BlockStructureFactory::build_new(
        key(0),
        &children_map(children),
        TransformerDataStore::default(),
        BTreeMap::new(),
    )
}

/// Asserts that `structure` has exactly the relations in `expected` for every
/// block not listed in `missing`, and that every `missing` block is absent.
///
/// Parent lists are compared as sets.
///
/// # Panics
/// Panics on the first mismatch.
pub fn assert_block_structure(structure: &BlockStructure, expected: &[&[usize]], missing: &[usize]) {
    let missing: BTreeSet<usize> = missing.iter().copied().collect();
    let parents = parents_map(expected);
    for (i, kids) in expected.iter().enumerate() {
        let k = key(i);
        if missing.contains(&i) {
            assert!(!structure.contains(&k), "block {i} should be missing");
            continue;
        }
        assert!(structure.contains(&k), "block {i} should be present");
        let want: Vec<UsageKey> = kids.iter().map(|c| key(*c)).collect();
        assert_eq!(structure.get_children(&k), want.as_slice(), "children of block {i}");
        let got: BTreeSet<&UsageKey> = structure.get_parents(&k).iter().collect();
        let want_parents: Vec<UsageKey> = parents[i].iter().map(|p| key(*p)).collect();
        let want_parents: BTreeSet<&UsageKey> = want_parents.iter().collect();
        assert_eq!(got, want_parents, "parents of block {i}");
    }
}
