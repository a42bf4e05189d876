//! Performance benchmarks for tether-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tether_engine::{
    resolve, ActivityFields, ConflictDetector, Entity, EntityPayload, Resolution, SyncEvent,
};

fn activity(title: &str) -> EntityPayload {
    EntityPayload::Activity(ActivityFields {
        title: title.into(),
        description: Some("benchmark payload".into()),
        category: "learning".into(),
        tags: vec!["bench".into()],
        impact_level: Some(2),
        date: "2024-01-01".into(),
        duration_minutes: Some(30),
    })
}

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("conflict_detect");
    let detector = ConflictDetector::default();

    let local = Entity::new("act-1", "user-1", activity("local"), 1_000_000);
    let remote = Entity::new("act-1", "user-1", activity("remote"), 2_000_000);
    let event = SyncEvent::updated(&remote, "device-2");

    group.bench_function("concurrent_edit", |b| {
        b.iter(|| detector.detect(black_box(Some(&local)), black_box(&event)))
    });

    let echo = SyncEvent::updated(&local, "device-2");
    group.bench_function("clean_apply", |b| {
        b.iter(|| detector.detect(black_box(Some(&local)), black_box(&echo)))
    });

    group.bench_function("no_local_copy", |b| {
        b.iter(|| detector.detect(black_box(None), black_box(&event)))
    });

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("conflict_resolve");
    let detector = ConflictDetector::default();

    let local = Entity::new("act-1", "user-1", activity("local"), 1_000_000);
    let remote = Entity::new("act-1", "user-1", activity("remote"), 2_000_000);
    let event = SyncEvent::updated(&remote, "device-2");
    let conflict = detector
        .detect(Some(&local), &event)
        .unwrap()
        .expect("divergence beyond tolerance");

    for decision in [Resolution::KeepLocal, Resolution::KeepRemote, Resolution::Merge] {
        group.bench_with_input(
            BenchmarkId::new("resolve", format!("{:?}", decision)),
            &decision,
            |b, decision| b.iter(|| resolve(black_box(&conflict), *decision, None)),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_detect, bench_resolve);
criterion_main!(benches);
