// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transformer contract: versioned collect/transform policy units.
use std::collections::BTreeMap;

use crate::block_data::FieldValue;
use crate::ident::{CourseKey, UsageKey, UserId};
use crate::structure::BlockStructure;
use crate::transformer_data::TransformerVersions;

/// A versioned policy unit applied to a block structure.
///
/// Transformers run in two phases:
/// * `collect` declares the block fields the transformer will need. It only
///   sees a [`FieldRequests`] capability: no field values exist yet and the
///   graph cannot be touched.
/// * `transform` runs per viewer, in registration order. It may read fields,
///   read and write its own namespace of transformer data (keyed by
///   [`name`](Self::name)) and remove blocks. Later transformers observe what
///   earlier ones left behind.
pub trait BlockTransformer {
    /// Unique name; also the transformer's data namespace.
    fn name(&self) -> &str;

    /// Declared data versions. Both must be positive.
    fn versions(&self) -> TransformerVersions;

    /// Declares the block fields this transformer reads.
    fn collect(&self, requests: &mut FieldRequests<'_>);

    /// Filters or annotates `structure` for the viewer described by `usage_info`.
    fn transform(&self, usage_info: &UsageInfo, structure: &mut BlockStructure);
}

/// Collect-phase capability: the only handle a transformer gets while
/// declaring its data dependencies.
#[derive(Debug)]
pub struct FieldRequests<'a> {
    structure: &'a mut BlockStructure,
}

impl<'a> FieldRequests<'a> {
    /// Wraps `structure` for one collect call.
    pub fn new(structure: &'a mut BlockStructure) -> Self {
        Self { structure }
    }

    /// Requests a single block field.
    pub fn request_field(&mut self, name: impl Into<String>) {
        self.structure.request_fields([name.into()]);
    }

    /// Requests several block fields.
    pub fn request_fields<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.structure.request_fields(names);
    }

    /// Root of the structure being collected.
    #[must_use]
    pub fn root(&self) -> &UsageKey {
        self.structure.root()
    }
}

/// Viewer context handed to every `transform` call.
///
/// Carries the minimum identity every policy needs; anything else a
/// transformer depends on travels in `attributes` under keys that
/// transformer documents.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageInfo {
    /// Stable identity of the viewer.
    pub user: UserId,
    /// Whether the viewer bypasses learner-facing gating.
    pub has_staff_access: bool,
    /// Course being viewed.
    pub course_key: CourseKey,
    /// Transformer-specific inputs.
    pub attributes: BTreeMap<String, FieldValue>,
}

impl UsageInfo {
    /// Context for a learner without staff access.
    pub fn new(user: UserId, course_key: CourseKey) -> Self {
        Self {
            user,
            has_staff_access: false,
            course_key,
            attributes: BTreeMap::new(),
        }
    }

    /// Sets the staff-access flag.
    pub fn with_staff_access(mut self, has_staff_access: bool) -> Self {
        self.has_staff_access = has_staff_access;
        self
    }

    /// Adds a transformer-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Looks up a transformer-specific attribute.
    pub fn attribute(&self, key: &str) -> Option<&FieldValue> {
        self.attributes.get(key)
    }
}

/// Tri-state verdict a transformer records in its own namespace.
///
/// Stored explicitly (`null` / `true` / `false`) so "not yet decided" never
/// depends on whether a key happens to be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decision {
    /// No verdict reached yet.
    #[default]
    Undecided,
    /// Explicitly allowed.
    Granted,
    /// Explicitly refused.
    Denied,
}

impl Decision {
    /// Reads a stored verdict; absent or non-bool values are `Undecided`.
    pub fn from_field(value: Option<&FieldValue>) -> Self {
        match value.and_then(FieldValue::as_bool) {
            Some(true) => Self::Granted,
            Some(false) => Self::Denied,
            None => Self::Undecided,
        }
    }

    /// Explicit sentinel to store for this verdict.
    pub fn to_field(self) -> FieldValue {
        match self {
            Self::Undecided => FieldValue::Null,
            Self::Granted => FieldValue::Bool(true),
            Self::Denied => FieldValue::Bool(false),
        }
    }

    /// Returns `true` once a verdict was reached.
    #[must_use]
    pub fn is_decided(self) -> bool {
        !matches!(self, Self::Undecided)
    }
}

impl From<Decision> for FieldValue {
    fn from(decision: Decision) -> Self {
        decision.to_field()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_sentinels_round_trip() {
        for d in [Decision::Undecided, Decision::Granted, Decision::Denied] {
            assert_eq!(Decision::from_field(Some(&d.to_field())), d);
        }
        assert_eq!(Decision::from_field(None), Decision::Undecided);
        assert!(!Decision::Undecided.is_decided());
        assert!(Decision::Denied.is_decided());
    }

    #[test]
    fn field_requests_accumulate_on_structure() {
        let mut s = BlockStructure::new(UsageKey::from("root"));
        let mut requests = FieldRequests::new(&mut s);
        requests.request_field("due");
        requests.request_fields(["start", "due"]);
        assert_eq!(requests.root(), &UsageKey::from("root"));
        let requested: Vec<&str> = s.requested_fields().collect();
        assert_eq!(requested, vec!["due", "start"]);
    }

    #[test]
    fn usage_info_builder_sets_attributes() {
        let info = UsageInfo::new(UserId(7), CourseKey::new("course-v1:edX+D+1"))
            .with_staff_access(true)
            .with_attribute("cohort", "blue");
        assert!(info.has_staff_access);
        assert_eq!(info.attribute("cohort"), Some(&FieldValue::from("blue")));
        assert_eq!(info.attribute("missing"), None);
    }
}
