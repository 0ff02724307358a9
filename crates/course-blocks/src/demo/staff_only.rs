// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hides blocks flagged staff-only from viewers without staff access.
//!
//! A block is staff-only when its own `visible_to_staff_only` field is set,
//! or when every one of its parents is staff-only. A block shared between a
//! hidden and a visible parent stays visible.
use tracing::{debug, warn};

use crate::ident::UsageKey;
use crate::structure::BlockStructure;
use crate::transformer::{BlockTransformer, Decision, FieldRequests, UsageInfo};
use crate::transformer_data::{TransformerVersions, VersioningError};

/// Transformer name and data namespace.
pub const STAFF_ONLY_TRANSFORMER_NAME: &str = "visibility";
/// Block field carrying the staff-only flag.
pub const VISIBLE_TO_STAFF_ONLY: &str = "visible_to_staff_only";
/// Per-block verdict stored in the transformer namespace
/// (`Granted` = visible, `Denied` = staff-only).
pub const MERGED_ACCESS: &str = "merged_access";

/// Removes staff-only blocks for learners.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaffOnlyTransformer;

impl StaffOnlyTransformer {
    /// Verdict recorded for `key`, `Undecided` before the transform ran.
    pub fn decision(&self, structure: &BlockStructure, key: &UsageKey) -> Decision {
        Decision::from_field(structure.get_transformer_block_field(key, self, MERGED_ACCESS))
    }

    fn record_decisions(&self, structure: &mut BlockStructure) -> Result<(), VersioningError> {
        for key in structure.topological_order() {
            let parents = structure.get_parents(&key);
            let inherited = !parents.is_empty()
                && parents
                    .iter()
                    .all(|p| self.decision(structure, p) == Decision::Denied);
            let staff_only = inherited || structure.get_bool_field(&key, VISIBLE_TO_STAFF_ONLY, false);
            let verdict = if staff_only {
                Decision::Denied
            } else {
                Decision::Granted
            };
            structure.set_transformer_block_field(&key, self, MERGED_ACCESS, verdict)?;
        }
        Ok(())
    }
}

impl BlockTransformer for StaffOnlyTransformer {
    fn name(&self) -> &str {
        STAFF_ONLY_TRANSFORMER_NAME
    }

    fn versions(&self) -> TransformerVersions {
        TransformerVersions::new(1, 1)
    }

    fn collect(&self, requests: &mut FieldRequests<'_>) {
        requests.request_field(VISIBLE_TO_STAFF_ONLY);
    }

    fn transform(&self, usage_info: &UsageInfo, structure: &mut BlockStructure) {
        if usage_info.has_staff_access {
            return;
        }
        if let Err(err) = self.record_decisions(structure) {
            warn!(error = %err, "staff-only verdicts not recorded; leaving structure untouched");
            return;
        }
        let removed =
            structure.remove_block_traversal(|s, key| self.decision(s, key) == Decision::Denied);
        debug!(removed = removed.len(), "removed staff-only blocks");
    }
}
