//! Join benchmarks.
//!
//! These benchmarks measure whole-graph joins on linked lists, the typical
//! workload of the shape domain: a loop building a list yields one new node per
//! iteration, and every new state is joined against the reached ones.
//!
//! Run with:
//! ```bash
//! cargo bench --bench join
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use smg_rs::join::SmgJoin;
use smg_rs::options::SmgOptions;
use smg_rs::state::SmgState;
use smg_rs::types::ValueId;

// ============================================================================
// Helper: singly-linked lists
// ============================================================================

/// Builds `head -> n_1 -> ... -> n_len -> NULL` with 64-bit data and next fields.
fn build_list(len: usize, data: Option<i64>) -> SmgState {
    let mut state = SmgState::default();
    state.push_stack_frame("main");
    let head = state.add_local_variable("head", 64).unwrap();

    let mut next = ValueId::ZERO;
    for _ in 0..len {
        let node = state.malloc(128, "node").unwrap();
        let (object, _) = state.dereference(node).unwrap();
        let value = ValueId::fresh();
        if let Some(n) = data {
            state.assign_explicit(value, n);
        }
        state.write_value(object, 0, 64, value).unwrap();
        state.write_value(object, 64, 64, next).unwrap();
        next = node;
    }
    state.write_value(head, 0, 64, next).unwrap();
    state
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_join_identical(c: &mut Criterion) {
    let mut group = c.benchmark_group("join/identical");
    let options = SmgOptions::default();

    for len in [1, 4, 16, 64] {
        let state = build_list(len, Some(0));
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("list", len), &state, |b, state| {
            b.iter(|| SmgJoin::new(&options).run(state.smg(), state.smg()).unwrap());
        });
    }

    group.finish();
}

fn bench_join_entailing(c: &mut Criterion) {
    let mut group = c.benchmark_group("join/entailing");
    let options = SmgOptions::default().with_heap_abstraction(false);

    for len in [1, 4, 16, 64] {
        let specific = build_list(len, Some(1));
        let general = build_list(len, None);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(
            BenchmarkId::new("list", len),
            &(specific, general),
            |b, (specific, general)| {
                b.iter(|| SmgJoin::new(&options).run(specific.smg(), general.smg()).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_join_abstraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("join/abstraction");
    group.sample_size(20);
    let options = SmgOptions::default();

    for len in [2, 8, 32] {
        let a = build_list(len, Some(0));
        let b = build_list(len, Some(0));
        group.bench_with_input(BenchmarkId::new("list", len), &(a, b), |bench, (a, b)| {
            bench.iter(|| SmgJoin::new(&options).run(a.smg(), b.smg()).unwrap());
        });
    }

    group.finish();
}

fn bench_subsumption(c: &mut Criterion) {
    let mut group = c.benchmark_group("join/is_less_or_equal");
    let options = SmgOptions::default();

    let reached: Vec<SmgState> = (0..8).map(|i| build_list(8, Some(i))).collect();
    let new = build_list(8, Some(7));
    group.bench_function("scan_8", |b| {
        b.iter(|| reached.iter().any(|r| new.is_less_or_equal(r, &options).unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_join_identical,
    bench_join_entailing,
    bench_join_abstraction,
    bench_subsumption
);
criterion_main!(benches);
