// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

use canopy_tree::{Aabb, Tree};

fn gen_grid_boxes(n: usize, cell: f64) -> Vec<(Vec<f64>, Vec<f64>)> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let x0 = x as f64 * cell;
            let y0 = y as f64 * cell;
            out.push((vec![x0, y0], vec![x0 + cell, y0 + cell]));
        }
    }
    out
}

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

fn build_tree(boxes: &[(Vec<f64>, Vec<f64>)], skin: f64) -> Tree {
    let mut tree = Tree::with_options(2, skin, boxes.len().max(1), true).expect("2D is valid");
    for (i, (lo, hi)) in boxes.iter().enumerate() {
        tree.insert(i as u64, lo, hi).expect("fresh id and valid bounds");
    }
    tree
}

fn bench_incremental_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental_build");
    for &n in &[16usize, 32] {
        let boxes = gen_grid_boxes(n, 10.0);
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("insert_n{}", n * n), |b| {
            b.iter_batched(
                || boxes.clone(),
                |boxes| black_box(build_tree(&boxes, 0.05)),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_update_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_churn");
    let n = 32usize;
    let boxes = gen_grid_boxes(n, 10.0);
    group.throughput(Throughput::Elements((n * n) as u64));

    // Jitter every particle by a fraction of its cell: absorbed by the skin.
    group.bench_function("in_skin", |b| {
        b.iter_batched(
            || build_tree(&boxes, 0.1),
            |mut tree| {
                for (i, (lo, hi)) in boxes.iter().enumerate() {
                    let lo = [lo[0] + 0.2, lo[1] + 0.2];
                    let hi = [hi[0] - 0.2, hi[1] - 0.2];
                    let moved = tree
                        .update(i as u64, &lo, &hi, false)
                        .expect("known id and valid bounds");
                    black_box(moved);
                }
                tree
            },
            BatchSize::SmallInput,
        )
    });

    // Teleport every particle: forces splice + SAH re-insertion.
    group.bench_function("out_of_skin", |b| {
        b.iter_batched(
            || (build_tree(&boxes, 0.1), Rng::new(0x9E3779B97F4A7C15)),
            |(mut tree, mut rng)| {
                for i in 0..boxes.len() {
                    let x = rng.next_f64() * 320.0;
                    let y = rng.next_f64() * 320.0;
                    let moved = tree
                        .update(i as u64, &[x, y], &[x + 10.0, y + 10.0], false)
                        .expect("known id and valid bounds");
                    black_box(moved);
                }
                tree
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    for &n in &[16usize, 32] {
        let boxes = gen_grid_boxes(n, 10.0);
        let tree = build_tree(&boxes, 0.05);
        let probe = Aabb::new(&[15.0, 15.0], &[145.0, 145.0]).expect("valid probe");

        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("probe_box_n{}", n * n), |b| {
            b.iter(|| {
                let hits = tree.query_aabb(black_box(&probe)).expect("matching dimension");
                black_box(hits.len())
            })
        });
        group.bench_function(format!("by_particle_n{}", n * n), |b| {
            b.iter(|| {
                let hits = tree.query((n * n / 2) as u64).expect("known id");
                black_box(hits.len())
            })
        });
    }
    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild");
    let n = 8usize; // rebuild is O(n^3) in leaves; keep it modest
    let boxes = gen_grid_boxes(n, 10.0);
    group.throughput(Throughput::Elements((n * n) as u64));
    group.bench_function(format!("greedy_pairing_n{}", n * n), |b| {
        b.iter_batched(
            || build_tree(&boxes, 0.05),
            |mut tree| {
                tree.rebuild();
                tree
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_incremental_build,
    bench_update_churn,
    bench_query,
    bench_rebuild
);
criterion_main!(benches);
