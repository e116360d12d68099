//! This bench test simulates applying a large delta to a specification with
//! many requirement blocks.

#![allow(missing_docs)]

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use specdelta::{
    DeltaPlan, RequirementsRegion,
    domain::merge::{apply_plan, recompose},
};

/// Generates a specification with `count` requirement blocks.
fn base_spec(count: usize) -> String {
    let mut text = String::from(
        "# bench Specification\n\n## Purpose\nA synthetic specification used to measure merge throughput.\n\n## Requirements\n",
    );
    for i in 0..count {
        text.push_str(&format!(
            "### Requirement: Block {i}\nThe system SHALL handle case {i}.\n\n#### Scenario: Case {i}\n- **WHEN** input {i} arrives\n- **THEN** it is handled\n\n"
        ));
    }
    text
}

/// Generates a delta that modifies every other block and appends new ones.
fn delta_doc(count: usize) -> String {
    let mut text = String::from("## MODIFIED Requirements\n");
    for i in (0..count).step_by(2) {
        text.push_str(&format!(
            "### Requirement: Block {i}\nThe system SHALL handle case {i} differently.\n\n#### Scenario: Case {i}\n- **WHEN** input {i} arrives\n- **THEN** it is handled differently\n\n"
        ));
    }
    text.push_str("## ADDED Requirements\n");
    for i in count..count + 50 {
        text.push_str(&format!(
            "### Requirement: Block {i}\nThe system SHALL handle case {i}.\n\n#### Scenario: Case {i}\n- **WHEN** input {i} arrives\n- **THEN** it is handled\n\n"
        ));
    }
    text
}

fn merge_many(c: &mut Criterion) {
    c.bench_function("merge 500 blocks", |b| {
        b.iter_batched(
            || {
                let region = RequirementsRegion::parse(&base_spec(500));
                let plan = DeltaPlan::parse(&delta_doc(500));
                (region, plan)
            },
            |(region, plan)| {
                let blocks = apply_plan(&region, &plan).unwrap();
                recompose(&region, &blocks)
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, merge_many);
criterion_main!(benches);
