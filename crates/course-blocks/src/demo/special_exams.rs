// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Special exams: proctored, practice and timed subsections.
//!
//! Learners for whom exams are excluded (usage attribute
//! [`INCLUDE_SPECIAL_EXAMS`] set to `false`) lose every special exam block.
//! Everyone else sees each exam annotated with a `special_exam_info` record
//! in this transformer's namespace.
use tracing::{debug, warn};

use crate::block_data::FieldValue;
use crate::ident::UsageKey;
use crate::structure::BlockStructure;
use crate::transformer::{BlockTransformer, FieldRequests, UsageInfo};
use crate::transformer_data::{TransformerVersions, VersioningError};

/// Transformer name and data namespace.
pub const SPECIAL_EXAMS_TRANSFORMER_NAME: &str = "special_exams";
/// Usage attribute (bool, default `true`) toggling special exams.
pub const INCLUDE_SPECIAL_EXAMS: &str = "include_special_exams";
/// Per-block annotation written for every special exam.
pub const SPECIAL_EXAM_INFO: &str = "special_exam_info";

/// Proctoring flag.
pub const IS_PROCTORED_ENABLED: &str = "is_proctored_enabled";
/// Practice exam flag.
pub const IS_PRACTICE_EXAM: &str = "is_practice_exam";
/// Timed exam flag.
pub const IS_TIMED_EXAM: &str = "is_timed_exam";

/// Filters or annotates special exams.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecialExamsTransformer;

impl SpecialExamsTransformer {
    /// Short human label for `key`, or `None` when it is not a special exam.
    pub fn short_description(structure: &BlockStructure, key: &UsageKey) -> Option<&'static str> {
        let flag = |name| structure.get_bool_field(key, name, false);
        if flag(IS_PRACTICE_EXAM) {
            Some("Practice Exam")
        } else if flag(IS_PROCTORED_ENABLED) {
            Some("Proctored Exam")
        } else if flag(IS_TIMED_EXAM) {
            Some("Timed Exam")
        } else {
            None
        }
    }

    /// Returns `true` if `key` is any kind of special exam.
    pub fn is_special_exam(structure: &BlockStructure, key: &UsageKey) -> bool {
        Self::short_description(structure, key).is_some()
    }

    fn annotate(&self, structure: &mut BlockStructure) -> Result<usize, VersioningError> {
        let mut annotated = 0;
        for key in structure.topological_order() {
            if let Some(description) = Self::short_description(structure, &key) {
                let info = FieldValue::Map(vec![(
                    FieldValue::from("short_description"),
                    FieldValue::from(description),
                )]);
                structure.set_transformer_block_field(&key, self, SPECIAL_EXAM_INFO, info)?;
                annotated += 1;
            }
        }
        Ok(annotated)
    }
}

impl BlockTransformer for SpecialExamsTransformer {
    fn name(&self) -> &str {
        SPECIAL_EXAMS_TRANSFORMER_NAME
    }

    fn versions(&self) -> TransformerVersions {
        TransformerVersions::new(1, 1)
    }

    fn collect(&self, requests: &mut FieldRequests<'_>) {
        requests.request_fields([IS_PROCTORED_ENABLED, IS_PRACTICE_EXAM, IS_TIMED_EXAM]);
    }

    fn transform(&self, usage_info: &UsageInfo, structure: &mut BlockStructure) {
        let include = usage_info
            .attribute(INCLUDE_SPECIAL_EXAMS)
            .and_then(FieldValue::as_bool)
            .unwrap_or(true);
        if !include && !usage_info.has_staff_access {
            let removed = structure.remove_block_traversal(Self::is_special_exam);
            debug!(removed = removed.len(), "removed special exams");
            return;
        }
        match self.annotate(structure) {
            Ok(annotated) => debug!(annotated, "annotated special exams"),
            Err(err) => warn!(error = %err, "special exam info not recorded"),
        }
    }
}
