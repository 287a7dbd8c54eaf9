// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Particle churn and the skin.
//!
//! Drift a particle in small steps: motion inside the fattened box is
//! absorbed, and only the step that escapes the skin touches the tree.
//! Finish with an offline rebuild.
//!
//! Run:
//! - `cargo run -p canopy_demos --example particle_churn`

use canopy_tree::Tree;

fn main() {
    let mut tree = Tree::with_options(2, 0.2, 64, true).expect("2D is a valid dimension");

    // A row of unit boxes, one unit apart.
    for i in 0..16u64 {
        let x = i as f64 * 2.0;
        tree.insert(i, &[x, 0.0], &[x + 1.0, 1.0]).expect("fresh id");
    }
    println!("inserted 16 particles, nodes: {}", tree.node_count());

    // Drift particle 0 to the right in steps of 0.05. With a 0.2 skin the
    // fat box spans [-0.2, 1.2], so the first few steps are free.
    let mut reinserts = 0;
    for step in 1..=10 {
        let x = step as f64 * 0.05;
        let moved = tree
            .update(0, &[x, 0.0], &[x + 1.0, 1.0], false)
            .expect("known id and valid bounds");
        if moved {
            reinserts += 1;
        }
        println!("step {step:2}: x = {x:.2}, tree touched: {moved}");
    }
    println!("re-insertions during the drift: {reinserts}");

    // Teleport half the particles, then clean up the hierarchy offline.
    for i in (0..16u64).step_by(2) {
        let x = 100.0 + i as f64 * 2.0;
        tree.update(i, &[x, 50.0], &[x + 1.0, 51.0], false)
            .expect("known id and valid bounds");
    }
    let ratio_before = tree.surface_area_ratio();
    tree.rebuild();
    let ratio_after = tree.surface_area_ratio();
    println!("surface area ratio: {ratio_before:.3} -> {ratio_after:.3}");
    tree.validate();
}
