//! Performance benchmarks for sluice-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use sluice_engine::{
    build_planner_with, far_future, FixedClock, InMemoryLookup, NoExisting, Planner,
    PlannerOptions, Record, SequentialKeyGenerator,
};
use std::sync::Arc;

const NOW: i64 = 1_706_745_600_000;

fn planner(options: serde_json::Value) -> Box<dyn Planner> {
    build_planner_with(
        &PlannerOptions::from_json(&options).unwrap(),
        Arc::new(FixedClock::from_millis(NOW)),
        Arc::new(SequentialKeyGenerator::new("bench-")),
    )
    .unwrap()
}

fn batch(size: usize) -> Vec<Record> {
    (0..size as i64)
        .map(|i| {
            Record::new()
                .with("id", i)
                .with("name", format!("User {}", i))
                .with("email", format!("user{}@test.com", i))
        })
        .collect()
}

/// Half of the batch's keys already stored, half of those with changed values.
fn stored(size: usize, open_versions: bool) -> InMemoryLookup {
    let records = (0..size as i64).step_by(2).map(|i| {
        let name = if i % 4 == 0 { format!("User {}", i) } else { format!("Old {}", i) };
        let record = Record::new()
            .with("id", i)
            .with("name", name)
            .with("email", format!("user{}@test.com", i));
        if open_versions {
            record
                .with("valid_from", chrono::DateTime::from_timestamp_millis(0).unwrap())
                .with("valid_to", far_future())
        } else {
            record
        }
    });
    InMemoryLookup::new(&["id".to_string()], records)
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    for size in [100, 1000, 10000].iter() {
        let records = batch(*size);

        group.bench_with_input(BenchmarkId::new("plain", size), size, |b, _| {
            let planner = planner(json!({"strategy": "append"}));
            b.iter(|| planner.plan_mutations_for_batch(black_box(&records), &NoExisting))
        });

        group.bench_with_input(BenchmarkId::new("enriched", size), size, |b, _| {
            let planner = planner(json!({
                "strategy": "append",
                "fields.key": ["id"],
                "uuid.key.enabled": true,
                "field.last.updated": "updated_at"
            }));
            b.iter(|| planner.plan_mutations_for_batch(black_box(&records), &NoExisting))
        });
    }

    group.finish();
}

fn bench_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert");

    for size in [100, 1000, 10000].iter() {
        let records = batch(*size);
        let existing = stored(*size, false);
        let planner = planner(json!({"strategy": "upsert", "fields.key": ["id"]}));

        group.bench_with_input(BenchmarkId::new("half_stored", size), size, |b, _| {
            b.iter(|| planner.plan_mutations_for_batch(black_box(&records), &existing))
        });
    }

    group.finish();
}

fn bench_type2(c: &mut Criterion) {
    let mut group = c.benchmark_group("type2");

    for size in [100, 1000, 10000].iter() {
        let records = batch(*size);
        let existing = stored(*size, true);
        let planner = planner(json!({
            "strategy": "type2",
            "fields.key": ["id"],
            "field.effective.from": "valid_from",
            "field.effective.to": "valid_to"
        }));

        group.bench_with_input(BenchmarkId::new("half_stored", size), size, |b, _| {
            b.iter(|| planner.plan_mutations_for_batch(black_box(&records), &existing))
        });
    }

    group.finish();
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");
    let records = batch(1000);
    let plan = planner(json!({"strategy": "append"}))
        .plan_mutations_for_batch(&records, &NoExisting)
        .unwrap();

    group.bench_function("plan_to_json", |b| b.iter(|| black_box(&plan).to_json()));

    group.bench_function("record_from_json", |b| {
        let raw = json!({"id": 1, "name": "User 1", "email": "user1@test.com", "active": true});
        b.iter(|| Record::from_json(black_box(&raw)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_append,
    bench_upsert,
    bench_type2,
    bench_serialization
);
criterion_main!(benches);
