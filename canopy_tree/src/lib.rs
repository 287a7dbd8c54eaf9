// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Canopy Tree: a dynamic AABB tree for broad-phase overlap queries.
//!
//! Canopy Tree indexes geometric objects ("particles") in d-dimensional
//! Euclidean space (`d >= 2`) and answers the broad-phase question of which
//! indexed objects *might* overlap a given box, or the box of a given
//! particle, in expected `O(log n)` work per query.
//!
//! - Insert, move, and remove particles incrementally; insertion picks its
//!   spot with the surface-area heuristic (SAH) and every structural change
//!   rebalances the ancestor path with local rotations.
//! - Leaf boxes are *fattened* by a configurable skin, so motion that stays
//!   inside the skin is absorbed without touching the tree at all.
//! - Query by particle id or by an arbitrary probe box.
//! - [`Tree::rebuild`] reconstructs the hierarchy by greedy minimum-area
//!   pairing for offline cleanup after long incremental churn.
//!
//! Nodes live in an index-addressed arena with a free-list, so the
//! doubly-linked hierarchy involves no ownership cycles and node slots are
//! recycled rather than reallocated once the pool has grown to size.
//!
//! # Example
//!
//! ```rust
//! use canopy_tree::Tree;
//!
//! // A 2D tree: motion within 10% of a box's size is absorbed by the skin.
//! let mut tree = Tree::with_options(2, 0.1, 16, true).unwrap();
//! tree.insert(1, &[0.0, 0.0], &[1.0, 1.0]).unwrap();
//! tree.insert(2, &[0.5, 0.5], &[1.5, 1.5]).unwrap();
//! tree.insert(3, &[9.0, 9.0], &[10.0, 10.0]).unwrap();
//!
//! // Broad-phase candidates for particle 1 (self excluded).
//! assert_eq!(tree.query(1).unwrap(), vec![2]);
//!
//! // Small motion stays inside the fattened box: no tree surgery.
//! let moved = tree.update(1, &[0.02, 0.02], &[1.02, 1.02], false).unwrap();
//! assert!(!moved);
//!
//! // A long hop re-inserts the leaf.
//! let moved = tree.update(3, &[0.5, 0.5], &[1.5, 1.5], false).unwrap();
//! assert!(moved);
//! ```
//!
//! Probe queries take an explicit box:
//!
//! ```rust
//! use canopy_tree::{Aabb, Tree};
//!
//! let mut tree = Tree::new(2).unwrap();
//! tree.insert(7, &[0.0, 0.0], &[1.0, 1.0]).unwrap();
//!
//! let viewport = Aabb::new(&[-5.0, -5.0], &[5.0, 5.0]).unwrap();
//! assert_eq!(tree.query_aabb(&viewport).unwrap(), vec![7]);
//! ```
//!
//! ## Scope
//!
//! This crate is a broad phase only: results are candidate pairs whose
//! *fattened* boxes overlap, and callers run their own narrow phase.
//! Periodic boxes, ray casts, swept collision, and k-nearest-neighbour
//! queries are out of scope. The tree is single-owner and single-threaded;
//! queries must not run concurrently with mutation because the node pool
//! may be reorganized by any insert.
//!
//! ### Float semantics
//!
//! Coordinates are `f64` and assumed finite (no NaNs). Internal boxes are
//! maintained as the *exact* componentwise union of their children, and
//! [`Tree::validate`] checks that equality bit-for-bit in debug builds.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod arena;
mod error;
mod tree;
mod types;

pub use error::TreeError;
pub use tree::{DEFAULT_INITIAL_CAPACITY, DEFAULT_SKIN_THICKNESS, Tree};
pub use types::Aabb;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn insert_query_update_roundtrip() {
        let mut tree = Tree::with_options(2, 0.05, 16, true).unwrap();
        tree.insert(1, &[0.0, 0.0], &[10.0, 10.0]).unwrap();
        tree.insert(2, &[5.0, 5.0], &[15.0, 15.0]).unwrap();
        assert_eq!(tree.query(1).unwrap(), [2].to_vec());

        let moved = tree.update(2, &[50.0, 50.0], &[60.0, 60.0], false).unwrap();
        assert!(moved);
        assert_eq!(tree.query(1).unwrap(), Vec::<u64>::new());
        tree.validate();
    }

    #[test]
    fn probe_query_on_an_empty_tree_is_empty() {
        let tree = Tree::new(2).unwrap();
        let probe = Aabb::new(&[0.0, 0.0], &[100.0, 100.0]).unwrap();
        assert_eq!(tree.query_aabb(&probe).unwrap(), Vec::<u64>::new());
    }
}
