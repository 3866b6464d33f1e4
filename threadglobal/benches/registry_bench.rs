//! Benchmarks for registry reads, writes and snapshots.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use threadglobal::global::{clear, dump_values, get_value, set_value};
use threadglobal::ThreadGlobal;

fn seed(entries: usize) {
    clear();
    for i in 0..entries {
        set_value(format!("key-{i}"), json!(i));
    }
}

fn registry_benchmark(c: &mut Criterion) {
    seed(32);

    c.bench_function("set_value", |b| {
        b.iter(|| set_value("hot", black_box(json!("value"))));
    });

    c.bench_function("get_value", |b| {
        b.iter(|| black_box(get_value(black_box("key-7"))));
    });

    let typed = ThreadGlobal::<u64>::value("typed");
    c.bench_function("typed_set_get", |b| {
        b.iter(|| {
            typed.set(black_box(42)).ok();
            black_box(typed.get())
        });
    });

    c.bench_function("dump_values", |b| {
        b.iter(|| black_box(dump_values()));
    });

    let snapshot = dump_values();
    c.bench_function("replay", |b| {
        b.iter(|| snapshot.replay());
    });
}

criterion_group!(benches, registry_benchmark);
criterion_main!(benches);
