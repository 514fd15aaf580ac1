//! Stack-based BVH traversal.
//!
//! Children are visited near-first. In closest-hit mode the ray interval
//! shrinks with every accepted hit so later boxes are culled against it.

use kiln_math::{Interval, Ray, Vec3};

use super::{Bvh, BvhNode};

/// Maximum number of postponed subtrees. Builds are depth limited to 64.
const STACK_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalMode {
    /// Find the nearest hit.
    Closest,
    /// Stop at the first hit found.
    Any,
}

/// Anything a leaf callback reports as a hit.
pub trait HitDistance {
    /// Distance at which the hit starts along the ray.
    fn t_entry(&self) -> f32;
}

impl HitDistance for f32 {
    fn t_entry(&self) -> f32 {
        *self
    }
}

/// Precomputed per-ray slab test.
#[derive(Debug, Clone, Copy)]
pub struct NodeIntersector {
    octant: [usize; 3],
    inv_dir: Vec3,
    origin: Vec3,
}

impl NodeIntersector {
    pub fn new(ray: &Ray) -> Self {
        let d = ray.direction;
        let inv_dir = Vec3::ONE / d;
        Self {
            octant: [
                usize::from(d.x.is_sign_negative()),
                usize::from(d.y.is_sign_negative()),
                usize::from(d.z.is_sign_negative()),
            ],
            inv_dir,
            origin: ray.origin,
        }
    }

    /// Entry and exit distance of the ray through `node`, clipped to `t`.
    /// The node is missed when entry > exit.
    #[inline]
    pub fn intersect(&self, node: &BvhNode, t: Interval) -> (f32, f32) {
        let mut entry = t.min;
        let mut exit = t.max;
        for axis in 0..3 {
            let near = node.bounds[2 * axis + self.octant[axis]];
            let far = node.bounds[2 * axis + 1 - self.octant[axis]];
            let inv = self.inv_dir[axis];
            let o = self.origin[axis];
            // With a zero direction this is +-inf, or NaN for an origin on
            // the plane, which max/min drop
            entry = entry.max((near - o) * inv);
            exit = exit.min((far - o) * inv);
        }
        (entry, exit)
    }
}

/// Walk `bvh` with `ray`, calling `intersect` for every primitive of every
/// reached leaf. The callback receives the ray with its current interval.
///
/// In [`TraversalMode::Closest`] the interval's far end is pulled in to each
/// accepted hit, so the callback only needs to report hits inside it.
pub fn traverse<H, F>(bvh: &Bvh, mut ray: Ray, mode: TraversalMode, mut intersect: F) -> Option<H>
where
    H: HitDistance,
    F: FnMut(&Ray, u32) -> Option<H>,
{
    let root = bvh.nodes.first()?;
    let nodes = NodeIntersector::new(&ray);
    let mut best: Option<H> = None;

    let mut leaf = |node: &BvhNode, ray: &mut Ray, best: &mut Option<H>| -> bool {
        for &prim in bvh.leaf_primitives(node) {
            if let Some(hit) = intersect(ray, prim) {
                if mode == TraversalMode::Any {
                    *best = Some(hit);
                    return true;
                }
                ray.t.max = hit.t_entry();
                *best = Some(hit);
            }
        }
        false
    };

    if root.is_leaf() {
        let (entry, exit) = nodes.intersect(root, ray.t);
        if entry <= exit {
            leaf(root, &mut ray, &mut best);
        }
        return best;
    }

    let mut stack = [0u32; STACK_SIZE];
    let mut top = 0usize;
    let mut current = root;

    loop {
        let first = current.first_item as usize;
        let left = &bvh.nodes[first];
        let right = &bvh.nodes[first + 1];

        let (left_entry, left_exit) = nodes.intersect(left, ray.t);
        let (right_entry, right_exit) = nodes.intersect(right, ray.t);
        let mut hit_left = left_entry <= left_exit;
        let mut hit_right = right_entry <= right_exit;

        if hit_left && left.is_leaf() {
            if leaf(left, &mut ray, &mut best) {
                break;
            }
            hit_left = false;
        }
        if hit_right && right.is_leaf() {
            if leaf(right, &mut ray, &mut best) {
                break;
            }
            hit_right = false;
        }

        match (hit_left, hit_right) {
            (true, true) => {
                let (near, far) = if left_entry > right_entry {
                    (first + 1, first)
                } else {
                    (first, first + 1)
                };
                debug_assert!(top < STACK_SIZE, "BVH deeper than the traversal stack");
                if top < STACK_SIZE {
                    stack[top] = far as u32;
                    top += 1;
                }
                current = &bvh.nodes[near];
            }
            (true, false) => current = left,
            (false, true) => current = right,
            (false, false) => {
                if top == 0 {
                    break;
                }
                top -= 1;
                current = &bvh.nodes[stack[top] as usize];
            }
        }
    }

    best
}
