// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use course_blocks::{
    BlockStructureFactory, CourseKey, FieldValue, PipelineError, SourceError, TransformerPipeline,
    TransformerVersions, UsageInfo, UserId, VersioningError,
};
use course_blocks_dry_tests::{
    assert_block_structure, build_structure, key, InMemoryContentSource, MockTransformer,
    RemoveBlocksTransformer, TransformerLog, SIMPLE_CHILDREN,
};

fn learner() -> UsageInfo {
    UsageInfo::new(UserId(7), CourseKey::new("course-v1:edX+Test+2024"))
}

#[test]
fn new_rejects_unversioned_transformer() {
    let err = TransformerPipeline::new(vec![
        MockTransformer::new("ok").boxed(),
        MockTransformer::new("broken").with_versions(0, 1).boxed(),
    ])
    .expect_err("unversioned");
    assert_eq!(
        err,
        PipelineError::Versioning(VersioningError::Unversioned {
            transformer: "broken".into(),
            write: 0,
            read: 1,
        })
    );
}

#[test]
fn new_rejects_duplicate_names() {
    let err = TransformerPipeline::new(vec![
        MockTransformer::new("dup").boxed(),
        MockTransformer::new("other").boxed(),
        MockTransformer::new("dup").with_versions(2, 2).boxed(),
    ])
    .expect_err("duplicate");
    assert_eq!(err, PipelineError::DuplicateTransformer("dup".into()));
}

#[test]
fn names_keep_registration_order() {
    let pipeline = TransformerPipeline::new(vec![
        MockTransformer::new("z").boxed(),
        MockTransformer::new("a").boxed(),
    ])
    .expect("valid");
    assert_eq!(pipeline.names().collect::<Vec<_>>(), vec!["z", "a"]);
    assert_eq!(pipeline.len(), 2);
    assert!(!pipeline.is_empty());
    assert!(TransformerPipeline::new(Vec::new()).expect("empty").is_empty());
}

#[test]
fn phases_run_in_order() {
    let log = TransformerLog::new();
    let pipeline = TransformerPipeline::new(vec![
        MockTransformer::new("a").with_log(&log).boxed(),
        MockTransformer::new("b").with_log(&log).boxed(),
    ])
    .expect("valid");
    let source = InMemoryContentSource::from_children(SIMPLE_CHILDREN);
    let mut s = BlockStructureFactory::build_from_source(&key(0), &source).expect("build");
    pipeline.run(&learner(), &mut s, &source).expect("run");
    assert_eq!(
        log.entries(),
        vec!["collect:a", "collect:b", "transform:a", "transform:b"]
    );
}

#[test]
fn collect_fetches_each_field_once_per_block() {
    let pipeline = TransformerPipeline::new(vec![
        MockTransformer::new("a").with_fields(&["f1", "f2"]).boxed(),
        MockTransformer::new("b").with_fields(&["f2", "f3"]).boxed(),
    ])
    .expect("valid");
    let source = InMemoryContentSource::from_children(SIMPLE_CHILDREN);
    source.set_field(&key(4), "f3", 4u64);
    let mut s = BlockStructureFactory::build_from_source(&key(0), &source).expect("build");
    source.reset_counts();

    pipeline.collect(&mut s, &source).expect("collect");
    assert_eq!(source.field_reads(), SIMPLE_CHILDREN.len() * 3);
    assert_eq!(s.get_field(&key(4), "f3"), Some(&FieldValue::from(4u64)));

    // Already collected fields are not fetched again.
    pipeline.collect(&mut s, &source).expect("collect again");
    assert_eq!(source.field_reads(), SIMPLE_CHILDREN.len() * 3);
}

#[test]
fn collect_records_declared_versions() {
    let pipeline = TransformerPipeline::new(vec![
        MockTransformer::new("a").with_versions(3, 2).boxed(),
    ])
    .expect("valid");
    let mut s = build_structure(SIMPLE_CHILDREN);
    assert!(!pipeline.verify_versions(&s));
    assert_eq!(pipeline.stale_transformers(&s), vec!["a"]);

    let source = InMemoryContentSource::from_children(SIMPLE_CHILDREN);
    pipeline.collect(&mut s, &source).expect("collect");
    assert_eq!(s.transformer_versions("a"), Some(TransformerVersions::new(3, 2)));
    assert!(pipeline.verify_versions(&s));
    assert!(pipeline.stale_transformers(&s).is_empty());
}

#[test]
fn version_bump_marks_collected_structure_stale() {
    let source = InMemoryContentSource::from_children(SIMPLE_CHILDREN);
    let v1 = TransformerPipeline::new(vec![
        MockTransformer::new("a").boxed(),
        MockTransformer::new("b").boxed(),
    ])
    .expect("valid");
    let mut s = BlockStructureFactory::build_from_source(&key(0), &source).expect("build");
    v1.collect(&mut s, &source).expect("collect");

    let v2 = TransformerPipeline::new(vec![
        MockTransformer::new("a").boxed(),
        MockTransformer::new("b").with_versions(2, 1).boxed(),
        MockTransformer::new("c").boxed(),
    ])
    .expect("valid");
    assert!(!v2.verify_versions(&s));
    assert_eq!(v2.stale_transformers(&s), vec!["b", "c"]);
}

#[test]
fn collect_failure_surfaces_source_error() {
    let pipeline = TransformerPipeline::new(vec![MockTransformer::new("a").with_fields(&["f"]).boxed()])
        .expect("valid");
    let source = InMemoryContentSource::from_children(SIMPLE_CHILDREN);
    let mut s = BlockStructureFactory::build_from_source(&key(0), &source).expect("build");
    source.set_unavailable(true);
    let err = pipeline.run(&learner(), &mut s, &source).expect_err("outage");
    assert!(matches!(err, PipelineError::Source(SourceError::Unavailable(_))));
}

#[test]
fn later_transformers_observe_earlier_removals() {
    let b = MockTransformer::new("b");
    let pipeline = TransformerPipeline::new(vec![
        RemoveBlocksTransformer::new("cut", [key(2)]).boxed(),
        b.clone().boxed(),
    ])
    .expect("valid");
    let mut s = build_structure(SIMPLE_CHILDREN);
    pipeline.transform(&learner(), &mut s);

    // `cut` detached block 2; its orphaned child 5 lingers until the final prune.
    assert_eq!(s.get_transformer_data(&b, "seen_blocks"), Some(&FieldValue::from(5u64)));
    assert_block_structure(&s, &[&[1], &[3, 4], &[], &[], &[], &[]], &[2, 5]);
    assert!(s.block_data(&key(5)).is_none());
}

#[test]
fn transform_prunes_whole_removed_subtrees() {
    let pipeline =
        TransformerPipeline::new(vec![RemoveBlocksTransformer::new("cut", [key(1)]).boxed()])
            .expect("valid");
    let mut s = build_structure(SIMPLE_CHILDREN);
    pipeline.transform(&learner(), &mut s);
    assert_eq!(s.len(), 3);
    assert_block_structure(&s, &[&[2], &[], &[5], &[], &[], &[]], &[1, 3, 4]);
}

#[test]
fn transformers_share_one_structure_per_viewer() {
    let pipeline = TransformerPipeline::new(vec![
        RemoveBlocksTransformer::new("first", [key(3)]).boxed(),
        RemoveBlocksTransformer::new("second", [key(5)]).boxed(),
    ])
    .expect("valid");
    let base = build_structure(SIMPLE_CHILDREN);
    let mut viewer = base.copy();
    pipeline.transform(&learner(), &mut viewer);
    assert_block_structure(&viewer, &[&[1, 2], &[4], &[], &[], &[], &[]], &[3, 5]);
    assert_block_structure(&base, SIMPLE_CHILDREN, &[]);
}
