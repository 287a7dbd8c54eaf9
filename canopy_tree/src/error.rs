// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for the tree's public surface.

use thiserror::Error;

/// Argument errors surfaced by [`Tree`](crate::Tree) and
/// [`Aabb`](crate::Aabb) operations.
///
/// All variants are caller mistakes detected at the API boundary; none of
/// them leave the tree in a modified state. Violations of the tree's own
/// internal invariants are not error values; they are assertion failures
/// in [`Tree::validate`](crate::Tree::validate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TreeError {
    /// A tree was requested with fewer than two dimensions.
    #[error("invalid dimensionality {dimension}: a tree needs at least 2 axes")]
    InvalidDimensionality {
        /// The rejected dimensionality.
        dimension: usize,
    },

    /// Supplied bounds have the wrong number of axes.
    #[error("dimension mismatch: expected {expected} axes, got {got}")]
    DimensionMismatch {
        /// The number of axes required.
        expected: usize,
        /// The number of axes supplied.
        got: usize,
    },

    /// A lower bound exceeds its upper bound on some axis.
    #[error("inverted bounds on axis {axis}: lower exceeds upper")]
    InvertedBounds {
        /// The first offending axis.
        axis: usize,
    },

    /// `insert` was given a particle id that is already indexed.
    #[error("particle {0} already exists in the tree")]
    DuplicateParticle(u64),

    /// An operation referenced a particle id that is not indexed.
    #[error("unknown particle {0}")]
    UnknownParticle(u64),
}
