// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree basics.
//!
//! Build a small 2D tree, run both query forms, and print the hierarchy.
//!
//! Run:
//! - `cargo run -p canopy_demos --example tree_basics`

use canopy_tree::{Aabb, Tree};

fn main() {
    let mut tree = Tree::with_options(2, 0.1, 16, true).expect("2D is a valid dimension");

    // Three particles: 1 and 2 overlap, 3 sits far away.
    tree.insert(1, &[0.0, 0.0], &[1.0, 1.0]).expect("fresh id");
    tree.insert(2, &[0.5, 0.5], &[1.5, 1.5]).expect("fresh id");
    tree.insert(3, &[9.0, 9.0], &[10.0, 10.0]).expect("fresh id");

    println!("candidates for 1: {:?}", tree.query(1).expect("known id"));
    println!("candidates for 3: {:?}", tree.query(3).expect("known id"));

    // Probe an arbitrary region.
    let viewport = Aabb::new(&[0.0, 0.0], &[2.0, 2.0]).expect("valid bounds");
    let visible = tree.query_aabb(&viewport).expect("matching dimension");
    println!("particles in the viewport: {visible:?}");

    // The hierarchy, drawn as a directory listing.
    println!();
    println!("{tree}");

    println!("height: {}", tree.height());
    println!("nodes: {}", tree.node_count());
    println!("surface area ratio: {:.3}", tree.surface_area_ratio());
}
