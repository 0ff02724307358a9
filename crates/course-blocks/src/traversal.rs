// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Traversal and mutation: topological walks, block removal, pruning, copy.
//!
//! Removal detaches a block from the graph at once but keeps its data record
//! until [`BlockStructure::prune_unreachable`] sweeps it, together with every
//! block no longer reachable from the root.
use std::collections::BTreeSet;

use tracing::debug;

use crate::factory::BlockStructureFactory;
use crate::ident::UsageKey;
use crate::structure::BlockStructure;

/// Resumable parent-before-child walk over a structure that may change
/// between steps.
///
/// A block is yielded only once all of its live parents were yielded. The
/// walk is live: blocks removed after they were pushed are skipped, and
/// blocks left without any path to the root by a removal are never yielded.
/// Each block is yielded at most once.
///
/// Liveness is tracked for the whole walk. Removing the block the walk last
/// yielded is noticed on the following step and its fallout is propagated
/// at once; any other removal is picked up by a reachability sweep when the
/// walk would otherwise stall.
#[derive(Debug, Clone)]
pub struct TopologicalWalk {
    stack: Vec<UsageKey>,
    yielded: BTreeSet<UsageKey>,
    // Blocks known to have no live path to the root.
    dead: BTreeSet<UsageKey>,
    // Blocks popped before all of their parents were settled.
    waiting: BTreeSet<UsageKey>,
    // Last yielded block and its children at yield time; expanded lazily so
    // the caller may mutate the structure in between.
    last: Option<(UsageKey, Vec<UsageKey>)>,
}

impl TopologicalWalk {
    /// Starts a walk at the root of `structure`.
    pub fn new(structure: &BlockStructure) -> Self {
        let mut walk = Self {
            stack: Vec::new(),
            yielded: BTreeSet::new(),
            dead: BTreeSet::new(),
            waiting: BTreeSet::new(),
            last: None,
        };
        walk.mark_unreachable(structure);
        let root = structure.root();
        if structure.contains(root) {
            walk.stack.push(root.clone());
        }
        walk
    }

    /// Advances the walk against the current state of `structure`.
    pub fn next(&mut self, structure: &BlockStructure) -> Option<UsageKey> {
        if let Some((prev, recorded)) = self.last.take() {
            let children = if structure.contains(&prev) {
                structure.get_children(&prev).to_vec()
            } else {
                self.bury(structure, &recorded);
                recorded
            };
            self.stack
                .extend(children.into_iter().rev().filter(|c| !self.yielded.contains(c)));
        }
        loop {
            while let Some(key) = self.stack.pop() {
                if let Some(found) = self.try_yield(structure, key) {
                    return Some(found);
                }
            }
            // Blocks still waiting on a parent that was orphaned behind the
            // walk's back.
            if self.waiting.is_empty() || self.mark_unreachable(structure) == 0 {
                return None;
            }
            let retry = std::mem::take(&mut self.waiting);
            self.stack.extend(retry.into_iter().rev());
        }
    }

    fn try_yield(&mut self, structure: &BlockStructure, key: UsageKey) -> Option<UsageKey> {
        if self.yielded.contains(&key) || self.is_gone(structure, &key) {
            self.waiting.remove(&key);
            return None;
        }
        let settled = structure
            .get_parents(&key)
            .iter()
            .all(|p| self.yielded.contains(p) || self.is_gone(structure, p));
        if !settled {
            self.waiting.insert(key);
            return None;
        }
        self.waiting.remove(&key);
        self.yielded.insert(key.clone());
        self.last = Some((key.clone(), structure.get_children(&key).to_vec()));
        Some(key)
    }

    fn is_gone(&self, structure: &BlockStructure, key: &UsageKey) -> bool {
        self.dead.contains(key) || !structure.contains(key)
    }

    /// Marks blocks left with no live parent, walking down from `orphans`,
    /// and queues the children of each for another look.
    fn bury(&mut self, structure: &BlockStructure, orphans: &[UsageKey]) {
        let mut pending = orphans.to_vec();
        while let Some(key) = pending.pop() {
            if key == *structure.root()
                || self.yielded.contains(&key)
                || self.is_gone(structure, &key)
            {
                continue;
            }
            let orphaned = structure
                .get_parents(&key)
                .iter()
                .all(|p| self.is_gone(structure, p));
            if orphaned {
                let children = structure.get_children(&key);
                self.stack.extend(children.iter().rev().cloned());
                pending.extend(children.iter().cloned());
                self.dead.insert(key);
            }
        }
    }

    /// Marks every block with no path from the root as dead. Returns how
    /// many were newly marked.
    fn mark_unreachable(&mut self, structure: &BlockStructure) -> usize {
        let mut reachable: BTreeSet<&UsageKey> = BTreeSet::new();
        let root = structure.root();
        if structure.contains(root) {
            reachable.insert(root);
            let mut pending = vec![root];
            while let Some(key) = pending.pop() {
                for child in structure.get_children(key) {
                    if reachable.insert(child) {
                        pending.push(child);
                    }
                }
            }
        }
        let before = self.dead.len();
        for key in structure.all_nodes() {
            if !reachable.contains(key) && !self.yielded.contains(key) {
                self.dead.insert(key.clone());
            }
        }
        self.dead.len() - before
    }
}

/// Read-only, lazy topological traversal borrowed from a structure.
#[derive(Debug)]
pub struct Topological<'a> {
    structure: &'a BlockStructure,
    walk: TopologicalWalk,
}

impl Iterator for Topological<'_> {
    type Item = UsageKey;

    fn next(&mut self) -> Option<Self::Item> {
        self.walk.next(self.structure)
    }
}

impl BlockStructure {
    /// Lazily yields every block reachable from the root, parents before
    /// children, first child first.
    pub fn topological_traversal(&self) -> Topological<'_> {
        Topological {
            structure: self,
            walk: TopologicalWalk::new(self),
        }
    }

    /// Collects [`topological_traversal`](Self::topological_traversal).
    pub fn topological_order(&self) -> Vec<UsageKey> {
        self.topological_traversal().collect()
    }

    /// Every block reachable from the root, children before parents.
    ///
    /// A convergent block is listed once, after the first parent path that
    /// reaches it has been fully explored.
    pub fn post_order_traversal(&self) -> Vec<UsageKey> {
        let mut out = Vec::new();
        if !self.contains(self.root()) {
            return out;
        }
        let mut visited = BTreeSet::new();
        visited.insert(self.root().clone());
        // (block, index of the next child to visit)
        let mut stack: Vec<(UsageKey, usize)> = vec![(self.root().clone(), 0)];
        while let Some((key, next)) = stack.pop() {
            let child = self.get_children(&key).get(next).cloned();
            match child {
                Some(child) => {
                    stack.push((key, next + 1));
                    if visited.insert(child.clone()) {
                        stack.push((child, 0));
                    }
                }
                None => out.push(key),
            }
        }
        out
    }

    /// Removes `key` from the graph.
    ///
    /// The block disappears from every parent's child list and from
    /// [`contains`](Self::contains) immediately; its data record stays until
    /// the next prune. With `keep_descendants` each former parent gains an
    /// edge to each former child so the subtree stays reachable; otherwise
    /// the child edges are dropped and descendants with no other path to the
    /// root are left for pruning. Removing an absent block is a no-op.
    pub fn remove_block(&mut self, key: &UsageKey, keep_descendants: bool) {
        if !self.contains(key) {
            return;
        }
        let (parents, children) = self.detach(key);
        if keep_descendants {
            for parent in &parents {
                for child in &children {
                    self.add_edge(parent, child);
                }
            }
        }
        debug!(
            block = %key,
            keep_descendants,
            parents = parents.len(),
            children = children.len(),
            "removed block"
        );
    }

    /// Walks the structure topologically and removes (without keeping
    /// descendants) every block for which `predicate` holds.
    ///
    /// The predicate sees the live graph: descendants cut off by an earlier
    /// removal are neither evaluated nor yielded. Returns the removed blocks
    /// in removal order. Orphans are left for
    /// [`prune_unreachable`](Self::prune_unreachable).
    pub fn remove_block_traversal<F>(&mut self, mut predicate: F) -> Vec<UsageKey>
    where
        F: FnMut(&Self, &UsageKey) -> bool,
    {
        let mut removed = Vec::new();
        let mut walk = TopologicalWalk::new(self);
        while let Some(key) = walk.next(self) {
            if predicate(self, &key) {
                self.remove_block(&key, false);
                removed.push(key);
            }
        }
        removed
    }

    /// Deletes every block not reachable from the root, with its field and
    /// transformer data, plus the data records of removed blocks.
    ///
    /// A block still reachable through any parent survives. Idempotent.
    /// Returns the number of blocks dropped from the graph.
    pub fn prune_unreachable(&mut self) -> usize {
        let reachable: BTreeSet<UsageKey> = self.post_order_traversal().into_iter().collect();
        let unreachable: Vec<UsageKey> = self
            .relations
            .keys()
            .filter(|key| !reachable.contains(*key))
            .cloned()
            .collect();
        for key in &unreachable {
            self.relations.remove(key);
        }
        for rel in self.relations.values_mut() {
            rel.parents.retain(|p| reachable.contains(p));
        }
        let records = self.block_data.len();
        self.block_data.retain(|key, _| reachable.contains(key));
        if !unreachable.is_empty() || records != self.block_data.len() {
            debug!(
                pruned = unreachable.len(),
                records = records - self.block_data.len(),
                remaining = self.relations.len(),
                "pruned unreachable blocks"
            );
        }
        debug_assert!(self.relations_consistent());
        unreachable.len()
    }

    /// Structural copy sharing nothing with `self`.
    ///
    /// Assembled from this structure's children map, transformer data and
    /// data records, so requested and collected field bookkeeping carries
    /// over too.
    pub fn copy(&self) -> Self {
        let mut copy = BlockStructureFactory::build_new(
            self.root.clone(),
            &self.children_map(),
            self.transformer_data.clone(),
            self.block_data.clone(),
        );
        copy.requested_fields.clone_from(&self.requested_fields);
        copy.collected_fields.clone_from(&self.collected_fields);
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(i: usize) -> UsageKey {
        UsageKey::new(i.to_string())
    }

    fn build(children: &[&[usize]]) -> BlockStructure {
        let mut s = BlockStructure::new(key(0));
        for i in 0..children.len() {
            s.add_node(key(i));
        }
        for (p, kids) in children.iter().enumerate() {
            for c in *kids {
                s.add_edge(&key(p), &key(*c));
            }
        }
        s
    }

    #[test]
    fn topological_order_puts_parents_first() {
        //   0 -> 1, 2 ; 1 -> 3 ; 2 -> 3
        let s = build(&[&[1, 2], &[3], &[3], &[]]);
        assert_eq!(s.topological_order(), vec![key(0), key(1), key(2), key(3)]);
    }

    #[test]
    fn post_order_lists_children_first() {
        let s = build(&[&[1, 2], &[3], &[3], &[]]);
        assert_eq!(s.post_order_traversal(), vec![key(3), key(1), key(2), key(0)]);
    }

    #[test]
    fn walk_skips_blocks_orphaned_mid_walk() {
        // 0 -> 1 -> 2 -> 3
        let mut s = build(&[&[1], &[2], &[3], &[]]);
        let mut walk = TopologicalWalk::new(&s);
        assert_eq!(walk.next(&s), Some(key(0)));
        assert_eq!(walk.next(&s), Some(key(1)));
        s.remove_block(&key(1), false);
        assert_eq!(walk.next(&s), None);
    }

    #[test]
    fn walk_still_reaches_shared_child_of_removed_block() {
        // 0 -> 1, 2 ; 1 -> 3 ; 2 -> 3
        let mut s = build(&[&[1, 2], &[3], &[3], &[]]);
        let mut walk = TopologicalWalk::new(&s);
        assert_eq!(walk.next(&s), Some(key(0)));
        assert_eq!(walk.next(&s), Some(key(1)));
        s.remove_block(&key(1), false);
        assert_eq!(walk.next(&s), Some(key(2)));
        assert_eq!(walk.next(&s), Some(key(3)));
        assert_eq!(walk.next(&s), None);
    }

    #[test]
    fn walk_unblocks_child_whose_other_parent_was_orphaned() {
        // 0 -> 1, 2 ; 1 -> 3 ; 3 -> 4 ; 2 -> 4
        let mut s = build(&[&[1, 2], &[3], &[4], &[4], &[]]);
        let mut walk = TopologicalWalk::new(&s);
        assert_eq!(walk.next(&s), Some(key(0)));
        assert_eq!(walk.next(&s), Some(key(1)));
        s.remove_block(&key(1), false);
        assert_eq!(walk.next(&s), Some(key(2)));
        assert_eq!(walk.next(&s), Some(key(4)), "3 is orphaned, 4 hangs off 2");
        assert_eq!(walk.next(&s), None);
    }

    #[test]
    fn walk_sweeps_blocks_orphaned_out_of_turn() {
        // 0 -> 1, 2 ; 1 -> 3 ; 3 -> 4 ; 2 -> 4
        let mut s = build(&[&[1, 2], &[3], &[4], &[4], &[]]);
        let mut walk = TopologicalWalk::new(&s);
        assert_eq!(walk.next(&s), Some(key(0)));
        // Not the block just yielded, so only the stall sweep notices 3.
        s.remove_block(&key(1), false);
        assert_eq!(walk.next(&s), Some(key(2)));
        assert_eq!(walk.next(&s), Some(key(4)));
        assert_eq!(walk.next(&s), None);
    }

    #[test]
    fn walk_skips_orphans_present_before_it_started() {
        // 0 -> 1, 2 ; 1 -> 3 ; 3 -> 4 ; 2 -> 4
        let mut s = build(&[&[1, 2], &[3], &[4], &[4], &[]]);
        s.remove_block(&key(1), false);
        assert_eq!(s.topological_order(), vec![key(0), key(2), key(4)]);
    }

    fn chain(n: usize) -> BlockStructure {
        let mut s = BlockStructure::new(key(0));
        s.add_node(key(0));
        for i in 1..n {
            s.add_node(key(i));
            s.add_edge(&key(i - 1), &key(i));
        }
        s
    }

    #[test]
    fn deep_chain_walks_in_order() {
        let n = 100_000;
        let s = chain(n);
        let expected: Vec<UsageKey> = (0..n).map(key).collect();
        assert_eq!(s.topological_order(), expected);
        assert_eq!(s.post_order_traversal().len(), n);
    }

    #[test]
    fn deep_chain_cut_in_the_middle() {
        let n = 100_000;
        let mut s = chain(n);
        let cut = key(n / 2);
        let removed = s.remove_block_traversal(|_, k| *k == cut);
        assert_eq!(removed, vec![cut]);
        assert_eq!(s.prune_unreachable(), n / 2 - 1);
        assert_eq!(s.len(), n / 2);
        assert_eq!(s.topological_order(), (0..n / 2).map(key).collect::<Vec<_>>());
    }

    #[test]
    fn removal_keeps_data_record_until_prune() {
        let mut s = build(&[&[1], &[2], &[]]);
        s.override_field(&key(1), "title", "one");
        s.remove_block(&key(1), false);
        assert!(!s.contains(&key(1)));
        assert!(s.block_data(&key(1)).is_some());
        assert_eq!(s.prune_unreachable(), 1, "2 became unreachable");
        assert!(s.block_data(&key(1)).is_none());
        assert!(!s.contains(&key(2)));
    }

    #[test]
    fn removing_absent_block_is_noop() {
        let mut s = build(&[&[1], &[]]);
        let before = s.clone();
        s.remove_block(&key(7), true);
        assert_eq!(s, before);
    }

    #[test]
    fn prune_without_root_empties_structure() {
        let mut s = build(&[&[1], &[]]);
        s.remove_block(&key(0), false);
        s.prune_unreachable();
        assert!(s.is_empty());
        assert!(s.block_data_map().is_empty());
    }
}
