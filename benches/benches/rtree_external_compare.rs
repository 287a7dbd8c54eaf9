// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![cfg(feature = "compare_rstar")]

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

use canopy_tree::{Aabb, Tree};
use rstar::primitives::Rectangle;
use rstar::{AABB, RTree};

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

fn to_rstar_rects(v: &[(Vec<f64>, Vec<f64>)]) -> Vec<Rectangle<[f64; 2]>> {
    v.iter()
        .map(|(lo, hi)| Rectangle::from_corners([lo[0], lo[1]], [hi[0], hi[1]]))
        .collect()
}

fn bench_external_compare_2d(c: &mut Criterion) {
    let mut group = c.benchmark_group("external_compare_2d");
    for &n in &[16usize, 32] {
        let boxes = gen_grid_boxes(n, 10.0);
        group.throughput(Throughput::Elements((n * n) as u64));

        group.bench_function(format!("canopy_build_query_n{}", n * n), |b| {
            b.iter_batched(
                || boxes.clone(),
                |boxes| {
                    let mut tree =
                        Tree::with_options(2, 0.0, boxes.len(), true).expect("2D is valid");
                    for (i, (lo, hi)) in boxes.iter().enumerate() {
                        tree.insert(i as u64, lo, hi).expect("fresh id");
                    }
                    let probe = Aabb::new(&[100.0, 100.0], &[500.0, 500.0]).expect("valid probe");
                    let hits = tree.query_aabb(&probe).expect("matching dimension").len();
                    black_box(hits)
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("rstar_build_query_n{}", n * n), |b| {
            b.iter_batched(
                || to_rstar_rects(&boxes),
                |rects| {
                    let rtree = RTree::bulk_load(rects);
                    let envelope = AABB::from_corners([100.0, 100.0], [500.0, 500.0]);
                    let hits = rtree.locate_in_envelope_intersecting(&envelope).count();
                    black_box(hits)
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_external_compare_2d);
criterion_main!(benches);
