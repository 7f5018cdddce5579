//! Radix-tree benchmarks for arbordb
//!
//! These measure the storage substrate in isolation: copy-on-write
//! insert throughput, point reads, and ordered scans over committed
//! trees.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use arbordb::Tree;

fn keys(count: usize, shuffled: bool) -> Vec<Vec<u8>> {
    let mut keys: Vec<Vec<u8>> = (0..count)
        .map(|i| format!("key{:08}", i).into_bytes())
        .collect();
    if shuffled {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        keys.shuffle(&mut rng);
    }
    keys
}

fn committed_tree(keys: &[Vec<u8>]) -> Tree<u64> {
    let mut txn = Tree::new().txn();
    for (i, key) in keys.iter().enumerate() {
        txn.insert(key, i as u64);
    }
    let (tree, notifier) = txn.commit();
    notifier.notify();
    tree
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("radix_insert");

    for count in [100usize, 1000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("sequential", count),
            &count,
            |b, &count| {
                let keys = keys(count, false);
                b.iter(|| black_box(committed_tree(&keys)));
            },
        );
        group.bench_with_input(BenchmarkId::new("random", count), &count, |b, &count| {
            let keys = keys(count, true);
            b.iter(|| black_box(committed_tree(&keys)));
        });
        // One commit per insert: the cost of full path copies.
        group.bench_with_input(
            BenchmarkId::new("one_txn_per_key", count),
            &count,
            |b, &count| {
                let keys = keys(count, true);
                b.iter(|| {
                    let mut tree = Tree::new();
                    for (i, key) in keys.iter().enumerate() {
                        let mut txn = tree.txn();
                        txn.insert(key, i as u64);
                        let (next, notifier) = txn.commit();
                        notifier.notify();
                        tree = next;
                    }
                    black_box(tree)
                });
            },
        );
    }
    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("radix_get");

    for count in [1000usize, 100_000] {
        let keys = keys(count, true);
        let tree = committed_tree(&keys);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("hit", count), &tree, |b, tree| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 7919) % keys.len();
                black_box(tree.get(&keys[i]))
            });
        });
        group.bench_with_input(BenchmarkId::new("miss", count), &tree, |b, tree| {
            b.iter(|| black_box(tree.get(b"key-never-inserted")));
        });
    }
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("radix_scan");

    for count in [1000usize, 100_000] {
        let keys = keys(count, false);
        let tree = committed_tree(&keys);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("full", count), &tree, |b, tree| {
            b.iter(|| black_box(tree.iter().count()));
        });
        group.bench_with_input(BenchmarkId::new("prefix", count), &tree, |b, tree| {
            b.iter(|| black_box(tree.iter_prefix(b"key0000").count()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insert, bench_get, bench_scan);
criterion_main!(benches);
