//! Top-down full-sweep SAH builder.
//!
//! Primitive references are sorted once per axis by centroid. Every node
//! sweeps all three sorted lists to find the cheapest split, then stable
//! partitions the other two lists so all three stay sorted within each
//! child range. Child ranges are disjoint slices, so subtrees can be built
//! on separate rayon tasks without sharing anything but the node counter.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use kiln_math::{Aabb, Vec3};
use parking_lot::Mutex;

use super::radix_sort::{make_key, sort_by_key};
use super::{bounds_union, centroids, Bvh, BvhNode};

/// SAH build settings.
#[derive(Debug, Clone)]
pub struct SahBuilder {
    /// Cost of one node traversal, relative to one primitive test.
    pub traversal_cost: f32,
    /// Ranges larger than this are handed to a new parallel task.
    pub task_spawn_threshold: usize,
    pub max_depth: usize,
    /// Ranges up to this size become leaves when no split pays off.
    pub max_leaf_size: usize,
}

impl Default for SahBuilder {
    fn default() -> Self {
        Self {
            traversal_cost: 1.0,
            task_spawn_threshold: 1024,
            max_depth: 64,
            max_leaf_size: 16,
        }
    }
}

/// A node still to be built and the reference ranges it owns.
struct WorkItem<'a> {
    node: u32,
    bounds: Aabb,
    begin: usize,
    depth: usize,
    refs: [&'a mut [u32]; 3],
    costs: &'a mut [f32],
}

impl WorkItem<'_> {
    fn len(&self) -> usize {
        self.refs[0].len()
    }
}

/// State shared by every build task.
struct BuildContext<'a> {
    settings: &'a SahBuilder,
    boxes: &'a [Aabb],
    marks: Vec<AtomicU8>,
    node_count: AtomicU32,
    nodes: Mutex<Vec<(u32, BvhNode)>>,
}

impl SahBuilder {
    pub fn build(&self, boxes: &[Aabb]) -> Bvh {
        let count = boxes.len();
        if count == 0 {
            return Bvh::default();
        }

        let centers = centroids(boxes);
        let global = bounds_union(boxes);

        let mut refs = [
            sorted_references(&centers, 0),
            sorted_references(&centers, 1),
            sorted_references(&centers, 2),
        ];
        let mut costs = vec![0.0f32; count];

        let ctx = BuildContext {
            settings: self,
            boxes,
            marks: (0..count).map(|_| AtomicU8::new(0)).collect(),
            node_count: AtomicU32::new(1),
            nodes: Mutex::new(Vec::with_capacity(2 * count)),
        };

        {
            let [r0, r1, r2] = &mut refs;
            let root = WorkItem {
                node: 0,
                bounds: global,
                begin: 0,
                depth: 0,
                refs: [r0.as_mut_slice(), r1.as_mut_slice(), r2.as_mut_slice()],
                costs: costs.as_mut_slice(),
            };
            rayon::scope(|scope| run(&ctx, scope, root));
        }

        let node_count = ctx.node_count.load(Ordering::Acquire) as usize;
        let mut nodes = vec![BvhNode::default(); node_count];
        for (index, node) in ctx.nodes.into_inner() {
            nodes[index as usize] = node;
        }

        let [prim_indices, _, _] = refs;
        log::debug!("built BVH over {} primitives: {} nodes", count, nodes.len());
        Bvh { nodes, prim_indices }
    }
}

fn sorted_references(centers: &[Vec3], axis: usize) -> Vec<u32> {
    let mut keys: Vec<u32> = centers.iter().map(|c| make_key(c[axis])).collect();
    let mut refs: Vec<u32> = (0..centers.len() as u32).collect();
    sort_by_key(&mut keys, &mut refs);
    refs
}

/// Build the subtree of `item`, keeping the larger half of every split on a
/// local stack and spawning the smaller half when it is big enough.
fn run<'s>(ctx: &'s BuildContext<'s>, scope: &rayon::Scope<'s>, item: WorkItem<'s>) {
    let mut written = Vec::new();
    let mut stack = vec![item];
    while let Some(item) = stack.pop() {
        debug_assert!(item.depth <= ctx.settings.max_depth);
        let Some((first, second)) = split(ctx, item, &mut written) else {
            continue;
        };

        let (small, large) = if first.len() > second.len() { (second, first) } else { (first, second) };
        stack.push(large);
        if small.len() > ctx.settings.task_spawn_threshold {
            scope.spawn(move |scope| run(ctx, scope, small));
        } else {
            stack.push(small);
        }
    }
    ctx.nodes.lock().extend(written);
}

/// Emit the node for `item`. Returns the two child items for inner nodes.
fn split<'s>(
    ctx: &BuildContext<'_>,
    item: WorkItem<'s>,
    written: &mut Vec<(u32, BvhNode)>,
) -> Option<(WorkItem<'s>, WorkItem<'s>)> {
    let settings = ctx.settings;
    let count = item.len();
    let make_leaf = |item: &WorkItem<'_>, written: &mut Vec<(u32, BvhNode)>| {
        written.push((item.node, BvhNode::leaf(&item.bounds, item.begin as u32, count as u32)));
    };

    if count <= 1 || item.depth >= settings.max_depth {
        make_leaf(&item, written);
        return None;
    }

    // Cheapest split over all axes; the first axis wins ties
    let mut best = (f32::MAX, count, 0usize);
    for axis in 0..3 {
        let (cost, index) = find_split(item.refs[axis], item.costs, ctx.boxes);
        if cost < best.0 {
            best = (cost, index, axis);
        }
    }
    let (best_cost, mut split_index, mut axis) = best;

    let max_split_cost = item.bounds.half_area() * (count as f32 - settings.traversal_cost);
    if best_cost >= max_split_cost {
        if count > settings.max_leaf_size {
            axis = item.bounds.longest_axis();
            split_index = count / 2;
        } else {
            make_leaf(&item, written);
            return None;
        }
    }

    for (i, &prim) in item.refs[axis].iter().enumerate() {
        ctx.marks[prim as usize].store(u8::from(i < split_index), Ordering::Relaxed);
    }
    let is_left = |prim: u32| ctx.marks[prim as usize].load(Ordering::Relaxed) != 0;
    for other in [(axis + 1) % 3, (axis + 2) % 3] {
        stable_partition(item.refs[other], is_left);
    }

    let mut left_bounds = Aabb::EMPTY;
    let mut right_bounds = Aabb::EMPTY;
    for (i, &prim) in item.refs[axis].iter().enumerate() {
        let target = if i < split_index { &mut left_bounds } else { &mut right_bounds };
        target.extend(&ctx.boxes[prim as usize]);
    }

    let first_child = ctx.node_count.fetch_add(2, Ordering::AcqRel);
    written.push((item.node, BvhNode::inner(&item.bounds, first_child)));

    let WorkItem { begin, depth, refs: [r0, r1, r2], costs, .. } = item;
    let (l0, h0) = r0.split_at_mut(split_index);
    let (l1, h1) = r1.split_at_mut(split_index);
    let (l2, h2) = r2.split_at_mut(split_index);
    let (lc, hc) = costs.split_at_mut(split_index);

    let left = WorkItem {
        node: first_child,
        bounds: left_bounds,
        begin,
        depth: depth + 1,
        refs: [l0, l1, l2],
        costs: lc,
    };
    let right = WorkItem {
        node: first_child + 1,
        bounds: right_bounds,
        begin: begin + split_index,
        depth: depth + 1,
        refs: [h0, h1, h2],
        costs: hc,
    };
    Some((left, right))
}

/// Sweep one sorted reference list. Returns the best cost and the index of
/// the first primitive of the right half.
fn find_split(refs: &[u32], costs: &mut [f32], boxes: &[Aabb]) -> (f32, usize) {
    let end = refs.len();

    let mut bbox = Aabb::EMPTY;
    for i in (1..end).rev() {
        bbox.extend(&boxes[refs[i] as usize]);
        costs[i] = bbox.half_area() * (end - i) as f32;
    }

    let mut bbox = Aabb::EMPTY;
    let mut best = (f32::MAX, end);
    for i in 0..end - 1 {
        bbox.extend(&boxes[refs[i] as usize]);
        let cost = bbox.half_area() * (i + 1) as f32 + costs[i + 1];
        if cost < best.0 {
            best = (cost, i + 1);
        }
    }
    best
}

/// Reorder `refs` so elements matching `pred` come first, keeping the
/// relative order inside both groups.
fn stable_partition(refs: &mut [u32], pred: impl Fn(u32) -> bool) {
    let (left, right): (Vec<u32>, Vec<u32>) = refs.iter().partition(|&&r| pred(r));
    refs[..left.len()].copy_from_slice(&left);
    refs[left.len()..].copy_from_slice(&right);
}
