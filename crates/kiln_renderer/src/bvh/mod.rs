//! Bounding volume hierarchy.
//!
//! Flat node array with the root at index 0 and siblings stored next to
//! each other, so an inner node only records the index of its first child.
//! Leaves reference a range of `prim_indices`.

mod radix_sort;
mod sah_builder;
mod traverse;

use bytemuck::{Pod, Zeroable};
use kiln_math::{Aabb, Vec3};
use rayon::prelude::*;

pub use radix_sort::{make_key, sort_by_key};
pub use sah_builder::SahBuilder;
pub use traverse::{traverse, HitDistance, NodeIntersector, TraversalMode};

/// One BVH node, 32 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    /// `[xmin, xmax, ymin, ymax, zmin, zmax]`
    pub bounds: [f32; 6],
    /// Non-zero only for leaves.
    pub primitive_count: u32,
    /// First child for inner nodes, first slot in `prim_indices` for leaves.
    pub first_item: u32,
}

impl BvhNode {
    pub fn leaf(bounds: &Aabb, first: u32, count: u32) -> Self {
        Self { bounds: bounds.to_slabs(), primitive_count: count, first_item: first }
    }

    pub fn inner(bounds: &Aabb, first_child: u32) -> Self {
        Self { bounds: bounds.to_slabs(), primitive_count: 0, first_item: first_child }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.primitive_count > 0
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_slabs(&self.bounds)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Bvh {
    pub nodes: Vec<BvhNode>,
    pub prim_indices: Vec<u32>,
}

impl Bvh {
    /// Build with the default SAH settings.
    pub fn build(bounds: &[Aabb]) -> Bvh {
        SahBuilder::default().build(bounds)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bounds of the whole hierarchy.
    pub fn bounds(&self) -> Aabb {
        self.nodes.first().map_or(Aabb::EMPTY, BvhNode::aabb)
    }

    /// Primitive indices of a leaf.
    pub fn leaf_primitives(&self, node: &BvhNode) -> &[u32] {
        let first = node.first_item as usize;
        &self.prim_indices[first..first + node.primitive_count as usize]
    }

    /// Depth of the deepest leaf (a lone root leaf has depth 0).
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            let node = &self.nodes[index];
            if node.is_leaf() {
                max_depth = max_depth.max(depth);
            } else {
                let first = node.first_item as usize;
                stack.push((first, depth + 1));
                stack.push((first + 1, depth + 1));
            }
        }
        max_depth
    }
}

/// Per-primitive centroids, computed in parallel.
pub fn centroids(bounds: &[Aabb]) -> Vec<Vec3> {
    bounds.par_iter().map(Aabb::centroid).collect()
}

/// Union of all boxes.
pub fn bounds_union(bounds: &[Aabb]) -> Aabb {
    bounds
        .par_iter()
        .fold(|| Aabb::EMPTY, |acc, b| Aabb::surrounding(&acc, b))
        .reduce(|| Aabb::EMPTY, |a, b| Aabb::surrounding(&a, &b))
}
