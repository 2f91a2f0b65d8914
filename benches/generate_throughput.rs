//! Benchmarks for identifier generation.
//!
//! Run with: cargo bench
//! View results in: target/criterion/report/index.html

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

use idsmith::contracts::SequenceAllocator;
use idsmith::guard::{Collection, GuardConfig, RecordDraft, UniquenessGuard};
use idsmith::storage::{MemoryStorage, RocksDbStorage};
use idsmith::template::{compose, ComposeContext, Element, Template};

fn create_storage() -> (Arc<RocksDbStorage>, TempDir) {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(RocksDbStorage::open(dir.path()).unwrap());
    (storage, dir)
}

fn invoice_template() -> Template {
    Template::new(vec![
        Element::fixed("INV-"),
        Element::date("yyMM"),
        Element::fixed("-"),
        Element::rand20("X5_"),
        Element::seq("D6"),
    ])
}

// =============================================================================
// Composition Benchmarks
// =============================================================================

fn bench_compose(c: &mut Criterion) {
    let template = invoice_template();
    let ctx = ComposeContext::now().with_sequence(123_456);
    let mut rng = StdRng::seed_from_u64(7);

    c.bench_function("compose_invoice_template", |b| {
        b.iter(|| compose(black_box(&template), &ctx, &mut rng).unwrap());
    });
}

// =============================================================================
// Allocation Benchmarks
// =============================================================================

fn bench_next_sequence(c: &mut Criterion) {
    let mut group = c.benchmark_group("next_sequence");

    let memory = MemoryStorage::new();
    group.bench_function("memory", |b| {
        b.iter(|| memory.next_sequence(black_box("inv:bench")).unwrap());
    });

    let (rocks, _dir) = create_storage();
    group.bench_function("rocksdb", |b| {
        b.iter(|| rocks.next_sequence(black_box("inv:bench")).unwrap());
    });

    group.finish();
}

// =============================================================================
// End-to-End Create Benchmarks
// =============================================================================

fn bench_create_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_burst");

    for batch_size in [10, 100].iter() {
        let (storage, _dir) = create_storage();
        let guard = UniquenessGuard::with_storage(storage, GuardConfig::default());
        let collection = Collection::new("bench").with_template(invoice_template());

        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &size| {
                b.iter(|| {
                    for _ in 0..size {
                        guard
                            .create_with_generated_id(&collection, RecordDraft::default())
                            .unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_compose, bench_next_sequence, bench_create_burst);
criterion_main!(benches);
