//! Identifier and ignore-pattern benchmarks.
//!
//! Run with:
//!   cargo bench --bench identifier_bench

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use vaultid::services::identifier;
use vaultid::{AssignmentEngine, ExclusionFilter, MemoryStore, Settings};

fn bench_generate(c: &mut Criterion) {
    c.bench_function("identifier_generate", |b| {
        b.iter(|| black_box(identifier::generate()))
    });
}

fn bench_is_ignored(c: &mut Criterion) {
    let filter = ExclusionFilter::new([
        "^templates/",
        "^archive/\\d{4}/",
        "\\.excalidraw\\.md$",
        "(^|/)drafts?/",
    ])
    .expect("valid patterns");

    let paths = [
        "notes/projects/vaultid.md",
        "templates/daily.md",
        "archive/2023/q1/retro.md",
        "sketches/board.excalidraw.md",
    ];

    let mut group = c.benchmark_group("is_ignored");
    for path in paths {
        group.bench_with_input(BenchmarkId::from_parameter(path), path, |b, path| {
            b.iter(|| black_box(filter.is_ignored(black_box(path))))
        });
    }
    group.finish();
}

fn bench_compile_patterns(c: &mut Criterion) {
    let settings = Settings {
        ignore_file_regex: "^templates/\n^archive/\\d{4}/\n\\.excalidraw\\.md$".to_string(),
        ..Settings::default()
    };

    c.bench_function("compile_ignore_patterns", |b| {
        b.iter(|| black_box(ExclusionFilter::from_settings(black_box(&settings))))
    });
}

fn bench_assign_all(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");

    let mut group = c.benchmark_group("assign_all");
    for count in [100usize, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let store = Arc::new(MemoryStore::new());
                for i in 0..count {
                    store.insert(format!("notes/{i}.md"), None);
                }
                let engine = AssignmentEngine::new(store);
                runtime
                    .block_on(engine.assign_all(&Settings::default()))
                    .expect("assign all")
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_generate,
    bench_is_ignored,
    bench_compile_patterns,
    bench_assign_all,
);

criterion_main!(benches);
