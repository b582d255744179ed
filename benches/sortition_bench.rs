//! Benchmarks for the sortition tree and entropy draws
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use draw_ledger::{Address, DrawLedger, LedgerConfig, SortitionTree, U256};

fn filled_tree(k: usize, keys: u64) -> SortitionTree<u64> {
    let mut tree = SortitionTree::new(k).unwrap();
    for key in 0..keys {
        tree.set(key, (key % 97 + 1) as u128).unwrap();
    }
    tree
}

fn benchmark_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sortition set");

    for k in [2usize, 10].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(k), k, |b, &k| {
            let mut tree = filled_tree(k, 10_000);
            let mut key = 0u64;
            b.iter(|| {
                key = (key + 7919) % 10_000;
                tree.set(black_box(key), black_box(500)).unwrap();
            });
        });
    }

    group.finish();
}

fn benchmark_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sortition select");

    for keys in [1_000u64, 100_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(keys), keys, |b, &keys| {
            let tree = filled_tree(10, keys);
            let total = tree.total();
            let mut value = 0u128;
            b.iter(|| {
                value = (value + 104_729) % total;
                *tree.select(black_box(value)).unwrap()
            });
        });
    }

    group.finish();
}

fn benchmark_draw_with_entropy(c: &mut Criterion) {
    let mut ledger = DrawLedger::new(LedgerConfig::default()).unwrap();
    ledger.open_next_draw().unwrap();
    for n in 1..=10_000u64 {
        ledger.deposit(Address::from_low_u64(n), n as u128).unwrap();
    }
    ledger.open_next_draw().unwrap();

    c.bench_function("draw_with_entropy 10k depositors", |b| {
        let mut seed = 0u64;
        b.iter(|| {
            seed += 1;
            ledger.draw_with_entropy(black_box(U256::from(seed))).unwrap()
        });
    });
}

criterion_group!(benches, benchmark_set, benchmark_select, benchmark_draw_with_entropy);
criterion_main!(benches);
