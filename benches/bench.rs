//! Criterion benchmarks for semsearch.
//!
//! Covers the hot paths of result consumption:
//! - Incremental ranking windows
//! - End-to-end runner consumption
//! - Terms union and intersection

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use semsearch::prelude::*;
use semsearch::runner::ranker::next_window;

/// Generate pseudo-random scores with plenty of ties.
fn generate_scores(count: usize) -> Vec<f64> {
    (0..count).map(|i| ((i * 7919) % 97) as f64 / 10.0).collect()
}

/// Generate documents repeating "search" a varying number of times.
fn generate_index(count: usize) -> MemoryIndex {
    let mut index = MemoryIndex::new();
    for i in 0..count {
        let mut words = vec!["search"; 1 + (i * 31) % 9];
        words.extend(["engine", "ranking", "merge"]);
        index.add_document(&format!("mem://bench/{i}"), &format!("Bench {i}"), &words.join(" "));
    }
    index
}

fn generate_terms(count: usize, stride: usize) -> TermsResultSet {
    let terms: Vec<String> = (0..count).map(|i| format!("term{:08}", i * stride)).collect();
    let counts = (0..count as i64).collect();
    TermsResultSet::new(terms)
        .with_counts(counts)
        .expect("one count per term")
}

fn bench_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("ranking");
    let count = 100_000;
    let ids: Vec<i64> = (0..count as i64).collect();
    let scores = generate_scores(count);

    group.throughput(Throughput::Elements(1000));
    group.bench_function("first_window", |b| {
        b.iter(|| black_box(next_window(&ids, &scores, &[], 1000)));
    });

    group.bench_function("ten_windows", |b| {
        b.iter(|| {
            let mut order = Vec::new();
            for block in 1..=10 {
                let window = next_window(&ids, &scores, &order, block * 1000);
                order.extend(window);
            }
            black_box(order)
        });
    });

    group.bench_function("full_sort_baseline", |b| {
        b.iter(|| {
            let mut order: Vec<usize> = (0..count).collect();
            order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(ids[b].cmp(&ids[a])));
            black_box(order)
        });
    });

    group.finish();
}

fn bench_runner(c: &mut Criterion) {
    let mut group = c.benchmark_group("runner");
    group.sample_size(20);

    let index = Arc::new(generate_index(10_000));
    let engine = QueryEngine::builder(index.clone())
        .scorer_source(Bm25Scorer::source(index))
        .build()
        .expect("engine");
    let query: Arc<dyn QueryNode> = Arc::new(TokenQuery::new("search"));

    group.throughput(Throughput::Elements(100));
    group.bench_function("first_page_with_hits", |b| {
        b.iter(|| {
            let runner = engine.query_runner(Arc::clone(&query)).expect("runner");
            for rank in 0..100 {
                black_box(runner.document_hits(rank).expect("hits"));
            }
            runner.close().expect("close");
        });
    });

    group.finish();
}

fn bench_terms(c: &mut Criterion) {
    let mut group = c.benchmark_group("terms");
    let inputs = vec![
        generate_terms(20_000, 2),
        generate_terms(20_000, 3),
        generate_terms(20_000, 5),
    ];

    group.throughput(Throughput::Elements(60_000));
    group.bench_function("union", |b| {
        b.iter(|| black_box(OrTermsQuery::union(&inputs, CountsStrategy::Sum).expect("union")));
    });

    group.bench_function("intersection", |b| {
        b.iter(|| {
            black_box(AndTermsQuery::intersect(&inputs, CountsStrategy::Max).expect("intersect"))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_ranking, bench_runner, bench_terms);
criterion_main!(benches);
