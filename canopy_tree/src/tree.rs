// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: SAH insertion, rotation rebalancing, overlap
//! queries, bulk rebuild, validation.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;

use crate::arena::{Arena, NodeIndex};
use crate::error::TreeError;
use crate::types::Aabb;

/// Default skin thickness, as a fraction of a box's per-axis size.
pub const DEFAULT_SKIN_THICKNESS: f64 = 0.05;

/// Default initial node capacity.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// A dynamic axis-aligned bounding-box tree over particles in `d >= 2`
/// dimensions.
///
/// Leaf boxes are fattened by a relative skin so that small motion is
/// absorbed without tree surgery; internal boxes are the exact union of
/// their children. Insertion descends by the surface-area heuristic, and
/// every refit walk applies one rotation per visited ancestor, keeping the
/// tree balanced enough for `O(log n)` broad-phase queries.
///
/// The tree is single-owner and single-threaded: mutation takes
/// `&mut self`, observation takes `&self`, and nothing blocks or suspends.
/// Given the same operation sequence, two identically configured trees end
/// up with identical arenas: tie-breaks in the insertion descent and the
/// rotations are strict comparisons, so tests can rely on node placement.
pub struct Tree {
    arena: Arena,
    root: Option<NodeIndex>,
    /// Particle id -> leaf node. The domain is exactly the live leaves.
    particles: HashMap<u64, NodeIndex>,
    dimension: usize,
    skin_thickness: f64,
    touch_is_overlap: bool,
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("dimension", &self.dimension)
            .field("n_particles", &self.particles.len())
            .field("node_count", &self.arena.count())
            .field("capacity", &self.arena.capacity())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

impl Tree {
    /// Create an empty tree with the default skin thickness
    /// ([`DEFAULT_SKIN_THICKNESS`]), the default initial capacity, and
    /// touching boxes counting as overlapping.
    pub fn new(dimension: usize) -> Result<Self, TreeError> {
        Self::with_options(dimension, DEFAULT_SKIN_THICKNESS, DEFAULT_INITIAL_CAPACITY, true)
    }

    /// Create an empty tree with explicit options.
    ///
    /// `skin_thickness` is the relative fattening applied to leaf boxes;
    /// `initial_capacity` (clamped to at least 1) sizes the node pool;
    /// `touch_is_overlap` selects whether shared faces count as overlap in
    /// queries. Fails with [`TreeError::InvalidDimensionality`] when
    /// `dimension < 2`.
    pub fn with_options(
        dimension: usize,
        skin_thickness: f64,
        initial_capacity: usize,
        touch_is_overlap: bool,
    ) -> Result<Self, TreeError> {
        if dimension < 2 {
            return Err(TreeError::InvalidDimensionality { dimension });
        }
        debug_assert!(skin_thickness >= 0.0, "skin thickness must be non-negative");
        Ok(Self {
            arena: Arena::new(dimension, initial_capacity),
            root: None,
            particles: HashMap::new(),
            dimension,
            skin_thickness,
            touch_is_overlap,
        })
    }

    /// Number of axes.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The relative skin applied to leaf boxes.
    #[inline]
    pub fn skin_thickness(&self) -> f64 {
        self.skin_thickness
    }

    /// Whether touching boxes count as overlapping in queries.
    #[inline]
    pub fn touch_is_overlap(&self) -> bool {
        self.touch_is_overlap
    }

    /// Insert a particle with the given tight bounds.
    ///
    /// The stored leaf box is fattened by `skin_thickness * size` per axis.
    /// Fails with [`TreeError::DuplicateParticle`] if the id is already
    /// indexed, and with [`TreeError::DimensionMismatch`] /
    /// [`TreeError::InvertedBounds`] on malformed bounds.
    pub fn insert(&mut self, particle: u64, lower: &[f64], upper: &[f64]) -> Result<(), TreeError> {
        if self.particles.contains_key(&particle) {
            return Err(TreeError::DuplicateParticle(particle));
        }
        self.check_dimension(lower, upper)?;
        let tight = Aabb::new(lower, upper)?;

        let leaf = self.arena.allocate();
        {
            let node = self.arena.node_mut(leaf);
            node.aabb = Aabb::fattened(&tight, self.skin_thickness);
            node.height = 0;
            node.particle = Some(particle);
        }
        self.insert_leaf(leaf);
        self.particles.insert(particle, leaf);
        Ok(())
    }

    /// Move a particle to new tight bounds.
    ///
    /// Returns `false` (tree untouched) when `always_reinsert` is off and
    /// the motion still fits inside the leaf's fattened box. Otherwise the
    /// leaf is spliced out, refattened around the new bounds, re-inserted
    /// through the SAH descent, and `true` is returned.
    pub fn update(
        &mut self,
        particle: u64,
        lower: &[f64],
        upper: &[f64],
        always_reinsert: bool,
    ) -> Result<bool, TreeError> {
        self.check_dimension(lower, upper)?;
        let leaf = *self
            .particles
            .get(&particle)
            .ok_or(TreeError::UnknownParticle(particle))?;
        debug_assert!(self.node(leaf).is_leaf());

        let tight = Aabb::new(lower, upper)?;
        if !always_reinsert && self.node(leaf).aabb.contains(&tight) {
            return Ok(false);
        }

        // Splice the leaf out but keep the node; it is re-inserted below.
        self.remove_leaf(leaf);
        self.node_mut(leaf).aabb = Aabb::fattened(&tight, self.skin_thickness);
        self.insert_leaf(leaf);
        Ok(true)
    }

    /// Remove a particle from the tree.
    pub fn remove(&mut self, particle: u64) -> Result<(), TreeError> {
        let leaf = self
            .particles
            .remove(&particle)
            .ok_or(TreeError::UnknownParticle(particle))?;
        debug_assert!(self.node(leaf).is_leaf());
        self.remove_leaf(leaf);
        self.arena.free(leaf);
        Ok(())
    }

    /// Remove every particle.
    ///
    /// The arena keeps its capacity but is re-threaded as a fresh free
    /// chain in ascending slot order, so a subsequent operation sequence
    /// places nodes exactly as it would on a new tree.
    pub fn clear(&mut self) {
        self.particles.clear();
        self.root = None;
        self.arena.reset();
    }

    /// Candidate interaction partners for a particle: every other particle
    /// whose fattened box overlaps this particle's fattened box.
    ///
    /// The particle itself is never reported. Result order is
    /// traversal-dependent and not part of the contract.
    pub fn query(&self, particle: u64) -> Result<Vec<u64>, TreeError> {
        let leaf = *self
            .particles
            .get(&particle)
            .ok_or(TreeError::UnknownParticle(particle))?;
        let fat = self.node(leaf).aabb.clone();
        Ok(self.query_overlaps(&fat, Some(particle)))
    }

    /// Particles whose fattened boxes overlap an arbitrary probe box.
    pub fn query_aabb(&self, aabb: &Aabb) -> Result<Vec<u64>, TreeError> {
        if aabb.dimension() != self.dimension {
            return Err(TreeError::DimensionMismatch {
                expected: self.dimension,
                got: aabb.dimension(),
            });
        }
        Ok(self.query_overlaps(aabb, None))
    }

    /// The *fattened* box stored for a particle.
    pub fn fat_aabb(&self, particle: u64) -> Result<&Aabb, TreeError> {
        let leaf = *self
            .particles
            .get(&particle)
            .ok_or(TreeError::UnknownParticle(particle))?;
        Ok(&self.node(leaf).aabb)
    }

    /// Height of the tree: 0 when empty or a lone leaf.
    pub fn height(&self) -> usize {
        match self.root {
            Some(root) => self.node(root).height.max(0) as usize,
            None => 0,
        }
    }

    /// Number of indexed particles.
    #[inline]
    pub fn n_particles(&self) -> usize {
        self.particles.len()
    }

    /// Number of live nodes (leaves plus internals).
    #[inline]
    pub fn node_count(&self) -> usize {
        self.arena.count()
    }

    /// The largest child-height imbalance over all internal nodes.
    pub fn maximum_balance(&self) -> usize {
        let mut max_balance = 0;
        for node in self.arena.slots() {
            // Free slots, leaves, and leaf-parents cannot be imbalanced.
            if node.height < 2 {
                continue;
            }
            let (Some(left), Some(right)) = (node.left, node.right) else {
                continue;
            };
            let balance = self
                .node(left)
                .height
                .abs_diff(self.node(right).height) as usize;
            max_balance = max_balance.max(balance);
        }
        max_balance
    }

    /// Sum of live node surface areas divided by the root's surface area,
    /// or 0 for an empty tree. A quality measure: lower is better.
    pub fn surface_area_ratio(&self) -> f64 {
        let Some(root) = self.root else {
            return 0.0;
        };
        let root_area = self.node(root).aabb.surface_area();
        let mut total_area = 0.0;
        for node in self.arena.slots() {
            if node.height < 0 {
                continue;
            }
            total_area += node.aabb.surface_area();
        }
        total_area / root_area
    }

    /// Rebuild the tree from its current leaf set by greedy pairing:
    /// repeatedly merge the pair with the smallest combined surface area.
    ///
    /// `O(n^3)` in the number of leaves; intended as an offline cleanup
    /// after long incremental churn, not per-frame work. Leaf boxes and the
    /// particle map are unchanged.
    pub fn rebuild(&mut self) {
        let mut indices: Vec<NodeIndex> = Vec::with_capacity(self.particles.len());
        for i in 0..self.arena.capacity() {
            let index = NodeIndex::new(i);
            if self.node(index).height < 0 {
                continue;
            }
            if self.node(index).is_leaf() {
                self.node_mut(index).parent = None;
                indices.push(index);
            } else {
                self.arena.free(index);
            }
        }

        if indices.is_empty() {
            self.root = None;
            return;
        }

        while indices.len() > 1 {
            let mut min_cost = f64::MAX;
            let (mut i_min, mut j_min) = (0, 0);
            for i in 0..indices.len() {
                let aabb_i = &self.node(indices[i]).aabb;
                for j in (i + 1)..indices.len() {
                    let cost = Aabb::merged(aabb_i, &self.node(indices[j]).aabb).surface_area();
                    if cost < min_cost {
                        i_min = i;
                        j_min = j;
                        min_cost = cost;
                    }
                }
            }

            let left = indices[i_min];
            let right = indices[j_min];
            let parent = self.arena.allocate();
            {
                let aabb = Aabb::merged(&self.node(left).aabb, &self.node(right).aabb);
                let height = 1 + self.node(left).height.max(self.node(right).height);
                let parent_node = self.node_mut(parent);
                parent_node.left = Some(left);
                parent_node.right = Some(right);
                parent_node.height = height;
                parent_node.aabb = aabb;
                parent_node.parent = None;
            }
            self.node_mut(left).parent = Some(parent);
            self.node_mut(right).parent = Some(parent);

            let last = indices.len() - 1;
            indices[j_min] = indices[last];
            indices[i_min] = parent;
            indices.pop();
        }

        self.root = Some(indices[0]);
        self.validate();
    }

    /// Assert the structural and metric invariants of the tree.
    ///
    /// Checks parent/child linkage, leaf field consistency, exact height
    /// and box equality at every internal node (bit-identical union of the
    /// children), free-chain accounting, and that the particle map's value
    /// set is exactly the leaf set. Compiled to a no-op without
    /// `debug_assertions`; violations indicate implementation bugs, not
    /// caller errors.
    pub fn validate(&self) {
        if !cfg!(debug_assertions) {
            return;
        }

        self.validate_structure(self.root);
        self.validate_metrics(self.root);

        let free = self.arena.free_chain_len();
        assert_eq!(
            self.arena.count() + free,
            self.arena.capacity(),
            "free-chain accounting is broken"
        );
        assert_eq!(self.height(), self.compute_height());

        let live_leaves = self
            .arena
            .slots()
            .iter()
            .filter(|node| node.height == 0)
            .count();
        assert_eq!(live_leaves, self.particles.len());
        for (&particle, &index) in &self.particles {
            let node = self.node(index);
            assert!(node.is_leaf() && node.height == 0);
            assert_eq!(node.particle, Some(particle));
        }
    }

    /// Write the tree as an ASCII directory listing: particle ids at the
    /// leaves, `X` at internal nodes. Informational only; the exact layout
    /// is not a stable interface.
    pub fn write_ascii<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out, "canopy:")?;
        self.write_ascii_node(out, "", self.root, false)
    }

    // --- internals ---

    #[inline]
    fn node(&self, index: NodeIndex) -> &crate::arena::Node {
        self.arena.node(index)
    }

    #[inline]
    fn node_mut(&mut self, index: NodeIndex) -> &mut crate::arena::Node {
        self.arena.node_mut(index)
    }

    /// Both children of an internal node.
    fn children(&self, index: NodeIndex) -> (NodeIndex, NodeIndex) {
        let node = self.node(index);
        let left = node.left.expect("internal node is missing its left child");
        let right = node.right.expect("internal node is missing its right child");
        (left, right)
    }

    fn check_dimension(&self, lower: &[f64], upper: &[f64]) -> Result<(), TreeError> {
        if lower.len() != self.dimension {
            return Err(TreeError::DimensionMismatch {
                expected: self.dimension,
                got: lower.len(),
            });
        }
        if upper.len() != self.dimension {
            return Err(TreeError::DimensionMismatch {
                expected: self.dimension,
                got: upper.len(),
            });
        }
        Ok(())
    }

    /// Swap `old` for `new` in `parent`'s child slot.
    fn replace_child(&mut self, parent: NodeIndex, old: NodeIndex, new: NodeIndex) {
        let node = self.node_mut(parent);
        if node.left == Some(old) {
            node.left = Some(new);
        } else {
            debug_assert_eq!(node.right, Some(old));
            node.right = Some(new);
        }
    }

    /// Recompute a node's height and box from its children.
    fn refresh_node(&mut self, index: NodeIndex) {
        let (left, right) = self.children(index);
        let height = 1 + self.node(left).height.max(self.node(right).height);
        let aabb = Aabb::merged(&self.node(left).aabb, &self.node(right).aabb);
        let node = self.node_mut(index);
        node.height = height;
        node.aabb = aabb;
    }

    /// SAH cost of pushing the new leaf into `child`'s subtree, on top of
    /// the inherited ancestor cost.
    fn branch_cost(&self, child: NodeIndex, leaf_aabb: &Aabb, inheritance_cost: f64) -> f64 {
        let child_node = self.node(child);
        let merged_area = Aabb::merged(leaf_aabb, &child_node.aabb).surface_area();
        if child_node.is_leaf() {
            merged_area + inheritance_cost
        } else {
            (merged_area - child_node.aabb.surface_area()) + inheritance_cost
        }
    }

    /// Link a leaf node into the tree at the SAH-selected position, then
    /// refit and rebalance the ancestor path.
    fn insert_leaf(&mut self, leaf: NodeIndex) {
        let Some(root) = self.root else {
            self.root = Some(leaf);
            self.node_mut(leaf).parent = None;
            return;
        };

        // Descend to the best sibling for the new leaf.
        let leaf_aabb = self.node(leaf).aabb.clone();
        let mut index = root;
        while !self.node(index).is_leaf() {
            let (left, right) = self.children(index);

            let area = self.node(index).aabb.surface_area();
            let combined_area = Aabb::merged(&self.node(index).aabb, &leaf_aabb).surface_area();

            // Cost of pairing the leaf with this node, and the cost every
            // ancestor inherits if we descend past it instead.
            let cost = 2.0 * combined_area;
            let inheritance_cost = 2.0 * (combined_area - area);

            let cost_left = self.branch_cost(left, &leaf_aabb, inheritance_cost);
            let cost_right = self.branch_cost(right, &leaf_aabb, inheritance_cost);

            if cost < cost_left && cost < cost_right {
                break;
            }

            // Ties descend right: the comparison is strict.
            index = if cost_left < cost_right { left } else { right };
        }

        let sibling = index;

        // Splice a new parent in above the sibling.
        let old_parent = self.node(sibling).parent;
        let new_parent = self.arena.allocate();
        {
            let aabb = Aabb::merged(&leaf_aabb, &self.node(sibling).aabb);
            let height = self.node(sibling).height + 1;
            let parent_node = self.node_mut(new_parent);
            parent_node.parent = old_parent;
            parent_node.aabb = aabb;
            parent_node.height = height;
            parent_node.left = Some(sibling);
            parent_node.right = Some(leaf);
        }
        match old_parent {
            Some(grand) => self.replace_child(grand, sibling, new_parent),
            None => self.root = Some(new_parent),
        }
        self.node_mut(sibling).parent = Some(new_parent);
        self.node_mut(leaf).parent = Some(new_parent);

        // Walk back up fixing heights and boxes, one rotation per ancestor.
        let mut cursor = self.node(leaf).parent;
        while let Some(index) = cursor {
            let index = self.balance(index);
            self.refresh_node(index);
            cursor = self.node(index).parent;
        }
    }

    /// Splice a leaf out of the tree, promoting its sibling, then refit and
    /// rebalance the ancestor path. The leaf node itself is not freed.
    fn remove_leaf(&mut self, leaf: NodeIndex) {
        if Some(leaf) == self.root {
            self.root = None;
            return;
        }

        let parent = self.node(leaf).parent.expect("non-root leaf has a parent");
        let grandparent = self.node(parent).parent;
        let (left, right) = self.children(parent);
        let sibling = if left == leaf { right } else { left };

        match grandparent {
            Some(grandparent) => {
                self.replace_child(grandparent, parent, sibling);
                self.node_mut(sibling).parent = Some(grandparent);
                self.arena.free(parent);

                let mut cursor = Some(grandparent);
                while let Some(index) = cursor {
                    let index = self.balance(index);
                    self.refresh_node(index);
                    cursor = self.node(index).parent;
                }
            }
            None => {
                self.root = Some(sibling);
                self.node_mut(sibling).parent = None;
                self.arena.free(parent);
            }
        }
    }

    /// Apply at most one rotation at `index`, reducing its child imbalance.
    /// Returns the node now occupying `index`'s position; its parent is the
    /// next stop of the refit walk.
    fn balance(&mut self, index: NodeIndex) -> NodeIndex {
        if self.node(index).is_leaf() || self.node(index).height < 2 {
            return index;
        }

        let (left, right) = self.children(index);
        let delta = self.node(right).height - self.node(left).height;

        // Right branch too tall: promote `right` above `index`.
        if delta > 1 {
            let (right_left, right_right) = self.children(right);

            let old_parent = self.node(index).parent;
            self.node_mut(right).left = Some(index);
            self.node_mut(right).parent = old_parent;
            self.node_mut(index).parent = Some(right);
            match old_parent {
                Some(grand) => self.replace_child(grand, index, right),
                None => self.root = Some(right),
            }

            // Keep the taller grandchild high; ties keep `right_right`.
            if self.node(right_left).height > self.node(right_right).height {
                self.node_mut(right).right = Some(right_left);
                self.node_mut(index).right = Some(right_right);
                self.node_mut(right_right).parent = Some(index);
            } else {
                self.node_mut(right).right = Some(right_right);
                self.node_mut(index).right = Some(right_left);
                self.node_mut(right_left).parent = Some(index);
            }
            self.refresh_node(index);
            self.refresh_node(right);
            return right;
        }

        // Left branch too tall: the mirror rotation.
        if delta < -1 {
            let (left_left, left_right) = self.children(left);

            let old_parent = self.node(index).parent;
            self.node_mut(left).left = Some(index);
            self.node_mut(left).parent = old_parent;
            self.node_mut(index).parent = Some(left);
            match old_parent {
                Some(grand) => self.replace_child(grand, index, left),
                None => self.root = Some(left),
            }

            if self.node(left_left).height > self.node(left_right).height {
                self.node_mut(left).right = Some(left_left);
                self.node_mut(index).left = Some(left_right);
                self.node_mut(left_right).parent = Some(index);
            } else {
                self.node_mut(left).right = Some(left_right);
                self.node_mut(index).left = Some(left_left);
                self.node_mut(left_left).parent = Some(index);
            }
            self.refresh_node(index);
            self.refresh_node(left);
            return left;
        }

        index
    }

    /// Stack-based overlap traversal. `exclude` suppresses a particle from
    /// the result (the "don't report self" rule of the by-particle query).
    fn query_overlaps(&self, probe: &Aabb, exclude: Option<u64>) -> Vec<u64> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeIndex> = Vec::with_capacity(256);
        if let Some(root) = self.root {
            stack.push(root);
        }

        while let Some(index) = stack.pop() {
            let node = self.node(index);
            if !probe.overlaps(&node.aabb, self.touch_is_overlap) {
                continue;
            }
            if node.is_leaf() {
                if let Some(particle) = node.particle
                    && Some(particle) != exclude
                {
                    found.push(particle);
                }
            } else {
                let (left, right) = self.children(index);
                stack.push(left);
                stack.push(right);
            }
        }

        found
    }

    fn compute_height(&self) -> usize {
        self.subtree_height(self.root)
    }

    fn subtree_height(&self, node: Option<NodeIndex>) -> usize {
        let Some(index) = node else {
            return 0;
        };
        if self.node(index).is_leaf() {
            return 0;
        }
        let (left, right) = self.children(index);
        1 + self
            .subtree_height(Some(left))
            .max(self.subtree_height(Some(right)))
    }

    fn validate_structure(&self, node: Option<NodeIndex>) {
        let Some(index) = node else {
            return;
        };
        if Some(index) == self.root {
            assert!(self.node(index).parent.is_none(), "root has a parent");
        }

        let node = self.node(index);
        if node.is_leaf() {
            assert!(node.right.is_none());
            assert_eq!(node.height, 0);
            assert!(node.particle.is_some(), "leaf without a particle");
            return;
        }

        let (left, right) = self.children(index);
        assert_eq!(self.node(left).parent, Some(index));
        assert_eq!(self.node(right).parent, Some(index));
        self.validate_structure(Some(left));
        self.validate_structure(Some(right));
    }

    fn validate_metrics(&self, node: Option<NodeIndex>) {
        let Some(index) = node else {
            return;
        };
        let node = self.node(index);
        if node.is_leaf() {
            return;
        }

        let (left, right) = self.children(index);
        let height = 1 + self.node(left).height.max(self.node(right).height);
        assert_eq!(node.height, height, "stale height at an internal node");

        // Bit-identical: the union is recomputed with the same routine the
        // refit walks use.
        let merged = Aabb::merged(&self.node(left).aabb, &self.node(right).aabb);
        assert_eq!(merged.lower(), node.aabb.lower());
        assert_eq!(merged.upper(), node.aabb.upper());

        self.validate_metrics(Some(left));
        self.validate_metrics(Some(right));
    }

    fn write_ascii_node<W: fmt::Write>(
        &self,
        out: &mut W,
        prefix: &str,
        node: Option<NodeIndex>,
        is_left: bool,
    ) -> fmt::Result {
        let Some(index) = node else {
            return Ok(());
        };
        let node = self.node(index);

        write!(out, "{prefix}{}", if is_left { "├── " } else { "└── " })?;
        match node.particle {
            Some(particle) if node.is_leaf() => writeln!(out, "{particle}")?,
            _ => writeln!(out, "X")?,
        }

        let child_prefix: String = format!("{prefix}{}", if is_left { "│   " } else { "    " });
        self.write_ascii_node(out, &child_prefix, node.left, true)?;
        self.write_ascii_node(out, &child_prefix, node.right, false)
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_ascii(f)
    }
}
