//! Performance benchmarks for signature generation and duplicate removal.
//!
//! Run with: `cargo bench --bench signature`

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};

use topicmap_engine::{association_signature, AssociationId, TopicMap};

/// Build an association with `roles` roles over a shared pool of topics.
fn wide_association(map: &mut TopicMap, roles: usize) -> AssociationId {
    let rel = map.create_topic().unwrap();
    let association = map.create_association(rel, &[]).unwrap();
    for _ in 0..roles {
        let role_type = map.create_topic().unwrap();
        let player = map.create_topic().unwrap();
        map.create_role(association, role_type, player).unwrap();
    }
    association
}

/// Map with `total` occurrences on one topic, `distinct` distinct values.
fn map_with_duplicates(total: usize, distinct: usize) -> TopicMap {
    let mut map = TopicMap::new();
    let typ = map.create_topic().unwrap();
    let topic = map.create_topic().unwrap();
    for i in 0..total {
        let value = map.pool().string(&format!("value-{}", i % distinct));
        map.create_occurrence(topic, typ, value, &[]).unwrap();
    }
    map
}

fn bench_association_signature(c: &mut Criterion) {
    let mut group = c.benchmark_group("association_signature");
    for roles in [2usize, 8, 32] {
        let mut map = TopicMap::new();
        let association = wide_association(&mut map, roles);
        group.throughput(Throughput::Elements(roles as u64));
        group.bench_with_input(BenchmarkId::from_parameter(roles), &roles, |b, _| {
            b.iter(|| association_signature(black_box(&map), black_box(association)).unwrap());
        });
    }
    group.finish();
}

fn bench_duplicate_removal(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove_duplicates");
    for total in [50usize, 200] {
        group.throughput(Throughput::Elements(total as u64));
        group.bench_with_input(BenchmarkId::from_parameter(total), &total, |b, &total| {
            b.iter_batched(
                || map_with_duplicates(total, 10),
                |mut map| {
                    map.remove_duplicates().unwrap();
                    black_box(map.stats())
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_topic_merge(c: &mut Criterion) {
    c.bench_function("merge_topics_with_20_characteristics", |b| {
        b.iter_batched(
            || {
                let mut map = TopicMap::new();
                let typ = map.create_topic().unwrap();
                let a = map.create_topic().unwrap();
                let t = map.create_topic().unwrap();
                for i in 0..10 {
                    let value = map.pool().string(&format!("a-{}", i));
                    map.create_occurrence(a, typ, value, &[]).unwrap();
                    let value = map.pool().string(&format!("b-{}", i));
                    map.create_occurrence(t, typ, value, &[]).unwrap();
                }
                (map, a, t)
            },
            |(mut map, a, t)| {
                map.merge_topics(a, t).unwrap();
                black_box(map.stats())
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_association_signature,
    bench_duplicate_removal,
    bench_topic_merge
);
criterion_main!(benches);
