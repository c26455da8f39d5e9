//! Flatten, unflatten and push id benchmarks.

use arbordb_core::{FlatJsonObject, LogicalPath, PushIdGenerator};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Map, Value};

/// Create a nested document `depth` levels deep with `width` fields per level.
fn nested_document(depth: usize, width: usize) -> Value {
    if depth == 0 {
        return json!("leaf");
    }
    let fields: Map<String, Value> = (0..width)
        .map(|i| (format!("key_{i}"), nested_document(depth - 1, width)))
        .collect();
    Value::Object(fields)
}

/// Create an array of small records.
fn record_list(len: usize) -> Value {
    Value::Array(
        (0..len)
            .map(|i| json!({"id": i, "name": format!("user {i}"), "active": i % 2 == 0}))
            .collect(),
    )
}

fn bench_flatten(c: &mut Criterion) {
    let mut group = c.benchmark_group("flatten");
    let prefix = LogicalPath::parse("bench/data");

    for (depth, width) in [(2, 8), (3, 8), (4, 6)] {
        let doc = nested_document(depth, width);
        let leaves = FlatJsonObject::new(&doc, &prefix).len();
        group.throughput(Throughput::Elements(leaves as u64));
        group.bench_with_input(
            BenchmarkId::new("nested", format!("{depth}x{width}")),
            &doc,
            |b, doc| b.iter(|| black_box(FlatJsonObject::new(black_box(doc), &prefix))),
        );
    }

    let records = record_list(1000);
    group.throughput(Throughput::Elements(3000));
    group.bench_function("records_1000", |b| {
        b.iter(|| black_box(FlatJsonObject::new(black_box(&records), &prefix)))
    });

    group.finish();
}

fn bench_unflatten(c: &mut Criterion) {
    let mut group = c.benchmark_group("unflatten");
    let prefix = LogicalPath::root();

    for (depth, width) in [(2, 8), (3, 8), (4, 6)] {
        let flat = FlatJsonObject::new(&nested_document(depth, width), &prefix);
        group.throughput(Throughput::Elements(flat.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("nested", format!("{depth}x{width}")),
            &flat,
            |b, flat| b.iter(|| black_box(flat.unflatten().unwrap())),
        );
    }

    let flat = FlatJsonObject::new(&record_list(1000), &prefix);
    group.throughput(Throughput::Elements(flat.len() as u64));
    group.bench_function("records_1000", |b| {
        b.iter(|| black_box(flat.unflatten().unwrap()))
    });

    group.finish();
}

fn bench_push_ids(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_id");
    let generator = PushIdGenerator::with_seed(42);

    group.bench_function("same_millisecond", |b| {
        b.iter(|| black_box(generator.generate_at(1_700_000_000_000)))
    });
    group.bench_function("wall_clock", |b| b.iter(|| black_box(generator.generate())));

    group.finish();
}

criterion_group!(benches, bench_flatten, bench_unflatten, bench_push_ids);
criterion_main!(benches);
