//! Benchmarks for compact tree appends.

use alder_merkle::{CompactTree, TreeHasher};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

fn bench_leaves(count: usize) -> Vec<[u8; 32]> {
    let hasher = TreeHasher;
    let mut state: u32 = 0xDEAD_BEEF;
    (0..count)
        .map(|_| {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            hasher.hash_leaf(&state.to_be_bytes())
        })
        .collect()
}

fn bench_append(c: &mut Criterion) {
    let sizes: &[usize] = &[1_000, 10_000, 100_000];

    let mut group = c.benchmark_group("compact_append");
    for &size in sizes {
        let leaves = bench_leaves(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &leaves, |b, leaves| {
            b.iter(|| {
                let mut tree = CompactTree::new(TreeHasher);
                for leaf in leaves {
                    tree.append(*leaf, |_, _, _| {});
                }
                tree.current_root()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_append);
criterion_main!(benches);
