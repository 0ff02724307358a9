// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structure construction from a content source, a cache or raw parts.
use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::block_data::BlockData;
use crate::cache::StructureCache;
use crate::ident::{UsageKey, VersionToken};
use crate::source::{ContentSource, SourceError};
use crate::structure::BlockStructure;
use crate::transformer_data::TransformerDataStore;

/// Errors raised while building a structure from a content source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The designated root does not exist in the content source.
    #[error("root block not found: {0}")]
    RootNotFound(UsageKey),
    /// The content source failed while the graph was being walked.
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Stateless constructors for [`BlockStructure`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockStructureFactory;

impl BlockStructureFactory {
    /// Walks the content under `root` and returns its graph, no fields collected.
    ///
    /// Convergent blocks are expanded once: a visited set short-circuits any
    /// block reached through a second parent, which only gains the edge.
    ///
    /// # Errors
    /// [`BuildError::RootNotFound`] when the source does not know `root` or
    /// hands back a block filed under another key; any other source failure
    /// is propagated unchanged.
    #[instrument(level = "debug", skip_all, fields(root = %root))]
    pub fn build_from_source<S>(root: &UsageKey, source: &S) -> Result<BlockStructure, BuildError>
    where
        S: ContentSource + ?Sized,
    {
        let root_item = source.get_root_item(root).map_err(|err| match err {
            SourceError::ItemNotFound(key) if key == *root => BuildError::RootNotFound(key),
            other => BuildError::Source(other),
        })?;
        if root_item.location != *root {
            warn!(location = %root_item.location, "source answered for a different root");
            return Err(BuildError::RootNotFound(root.clone()));
        }
        let mut structure = BlockStructure::new(root.clone());
        structure.add_node(root_item.location.clone());
        let mut visited = BTreeSet::from([root_item.location.clone()]);
        let mut pending = vec![root_item];
        while let Some(block) = pending.pop() {
            for child in source.get_children(&block)? {
                structure.add_node(child.location.clone());
                structure.add_edge(&block.location, &child.location);
                if visited.insert(child.location.clone()) {
                    pending.push(child);
                }
            }
        }
        debug!(blocks = structure.len(), "built block structure from source");
        Ok(structure)
    }

    /// Loads the structure cached for `root` under `token`.
    ///
    /// Returns `None` on any miss, including an entry whose root differs.
    pub fn build_from_cache<C>(root: &UsageKey, token: &VersionToken, cache: &C) -> Option<BlockStructure>
    where
        C: StructureCache + ?Sized,
    {
        let Some(structure) = cache.get(root, token) else {
            debug!(root = %root, token = %token, "structure cache miss");
            return None;
        };
        if structure.root() != root {
            warn!(
                root = %root,
                cached_root = %structure.root(),
                "cached structure has a different root; treating as miss"
            );
            return None;
        }
        debug!(root = %root, blocks = structure.len(), "structure cache hit");
        Some(structure)
    }

    /// Assembles a structure from already computed parts.
    ///
    /// Every key of `children` becomes a block; parents are derived from the
    /// child lists. `block_data` is taken as is, so records of removed blocks
    /// awaiting a prune carry over.
    ///
    /// # Panics
    /// Panics if a child list names a block that is not a key of `children`.
    pub fn build_new(
        root: UsageKey,
        children: &BTreeMap<UsageKey, Vec<UsageKey>>,
        transformer_data: TransformerDataStore,
        block_data: BTreeMap<UsageKey, BlockData>,
    ) -> BlockStructure {
        let mut structure = BlockStructure::new(root);
        structure.block_data = block_data;
        for key in children.keys() {
            structure.add_node(key.clone());
        }
        for (parent, kids) in children {
            for child in kids {
                structure.add_edge(parent, child);
            }
        }
        structure.transformer_data = transformer_data;
        structure
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::block_data::FieldValue;
    use crate::ident::make_version_token;
    use crate::source::SourceBlock;

    struct Tree(BTreeMap<UsageKey, Vec<UsageKey>>);

    impl Tree {
        fn block(&self, key: &UsageKey) -> Result<SourceBlock, SourceError> {
            self.0
                .get(key)
                .map(|children| SourceBlock {
                    location: key.clone(),
                    children: children.clone(),
                })
                .ok_or_else(|| SourceError::ItemNotFound(key.clone()))
        }
    }

    impl ContentSource for Tree {
        fn get_root_item(&self, key: &UsageKey) -> Result<SourceBlock, SourceError> {
            self.block(key)
        }

        fn get_children(&self, block: &SourceBlock) -> Result<Vec<SourceBlock>, SourceError> {
            block.children.iter().map(|c| self.block(c)).collect()
        }

        fn get_field(&self, _key: &UsageKey, _field: &str) -> Result<Option<FieldValue>, SourceError> {
            Ok(None)
        }

        fn version_token(&self, _root: &UsageKey) -> Result<VersionToken, SourceError> {
            Ok(make_version_token("tree"))
        }
    }

    fn key(s: &str) -> UsageKey {
        UsageKey::from(s)
    }

    fn diamond() -> Tree {
        Tree(BTreeMap::from([
            (key("a"), vec![key("b"), key("c")]),
            (key("b"), vec![key("d")]),
            (key("c"), vec![key("d")]),
            (key("d"), vec![]),
        ]))
    }

    #[test]
    fn builds_convergent_graph_once() {
        let s = BlockStructureFactory::build_from_source(&key("a"), &diamond()).unwrap();
        assert_eq!(s.len(), 4);
        assert_eq!(s.get_children(&key("a")), &[key("b"), key("c")]);
        let mut parents = s.get_parents(&key("d")).to_vec();
        parents.sort();
        assert_eq!(parents, vec![key("b"), key("c")]);
        assert!(s.relations_consistent());
    }

    #[test]
    fn missing_root_is_a_build_error() {
        let err = BlockStructureFactory::build_from_source(&key("zz"), &diamond()).unwrap_err();
        assert_eq!(err, BuildError::RootNotFound(key("zz")));
    }

    #[test]
    fn root_filed_under_another_key_is_not_found() {
        struct Misfiled(Tree);

        impl ContentSource for Misfiled {
            fn get_root_item(&self, _key: &UsageKey) -> Result<SourceBlock, SourceError> {
                self.0.block(&key("b"))
            }

            fn get_children(&self, block: &SourceBlock) -> Result<Vec<SourceBlock>, SourceError> {
                self.0.get_children(block)
            }

            fn get_field(&self, key: &UsageKey, field: &str) -> Result<Option<FieldValue>, SourceError> {
                self.0.get_field(key, field)
            }

            fn version_token(&self, root: &UsageKey) -> Result<VersionToken, SourceError> {
                self.0.version_token(root)
            }
        }

        let err = BlockStructureFactory::build_from_source(&key("a"), &Misfiled(diamond())).unwrap_err();
        assert_eq!(err, BuildError::RootNotFound(key("a")));
    }

    #[test]
    fn missing_descendant_is_a_source_error() {
        let mut tree = diamond();
        tree.0.remove(&key("d"));
        let err = BlockStructureFactory::build_from_source(&key("a"), &tree).unwrap_err();
        assert_eq!(err, BuildError::Source(SourceError::ItemNotFound(key("d"))));
    }

    #[test]
    fn build_new_derives_parents() {
        let s = BlockStructureFactory::build_new(
            key("a"),
            &diamond().0,
            TransformerDataStore::default(),
            BTreeMap::new(),
        );
        assert_eq!(s.get_parents(&key("b")), &[key("a")]);
        assert_eq!(s.get_parents(&key("d")), &[key("b"), key("c")]);
        assert_eq!(s.block_data_map().len(), 4);
    }
}
