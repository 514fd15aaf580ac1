use crate::{Interval, Ray, Vec3};

/// Axis-Aligned Bounding Box for spatial acceleration structures (BVH).
///
/// An AABB is defined by three intervals (one per axis) that bound a 3D volume.
/// Unlike a padded render box this one stays exact: BVH nodes compare child
/// boxes against parent boxes, so no minimum thickness is introduced.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    /// Create a new AABB from three intervals.
    pub const fn new(x: Interval, y: Interval, z: Interval) -> Self {
        Self { x, y, z }
    }

    /// Create an empty AABB (contains nothing).
    pub const fn empty() -> Self {
        Self::EMPTY
    }

    /// Create an AABB from two corner points.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            x: Interval::new(a.x.min(b.x), a.x.max(b.x)),
            y: Interval::new(a.y.min(b.y), a.y.max(b.y)),
            z: Interval::new(a.z.min(b.z), a.z.max(b.z)),
        }
    }

    /// Degenerate box around a single point.
    pub fn from_point(p: Vec3) -> Self {
        Self::from_points(p, p)
    }

    /// Rebuild a box from the `[xmin, xmax, ymin, ymax, zmin, zmax]` layout.
    pub fn from_slabs(bounds: &[f32; 6]) -> Self {
        Self {
            x: Interval::new(bounds[0], bounds[1]),
            y: Interval::new(bounds[2], bounds[3]),
            z: Interval::new(bounds[4], bounds[5]),
        }
    }

    /// Bounds in `[xmin, xmax, ymin, ymax, zmin, zmax]` order.
    ///
    /// BVH nodes store this layout so `bounds[2 * axis + octant]` picks the
    /// near plane for a ray without branching.
    pub fn to_slabs(&self) -> [f32; 6] {
        [
            self.x.min, self.x.max, self.y.min, self.y.max, self.z.min, self.z.max,
        ]
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            x: Interval::surrounding(&box0.x, &box1.x),
            y: Interval::surrounding(&box0.y, &box1.y),
            z: Interval::surrounding(&box0.z, &box1.z),
        }
    }

    /// Grow this box to include another box.
    pub fn extend(&mut self, other: &Aabb) {
        *self = Self::surrounding(self, other);
    }

    /// Grow this box to include a point.
    pub fn extend_point(&mut self, p: Vec3) {
        self.x.extend(p.x);
        self.y.extend(p.y);
        self.z.extend(p.z);
    }

    pub fn lower(&self) -> Vec3 {
        Vec3::new(self.x.min, self.y.min, self.z.min)
    }

    pub fn upper(&self) -> Vec3 {
        Vec3::new(self.x.max, self.y.max, self.z.max)
    }

    /// Get the interval for a specific axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, n: usize) -> Interval {
        match n {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// True when any axis is empty.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty() || self.z.is_empty()
    }

    /// Extent of the box along each axis.
    pub fn size(&self) -> Vec3 {
        self.upper() - self.lower()
    }

    /// Half of the surface area, the SAH cost weight of a node.
    pub fn half_area(&self) -> f32 {
        let d = self.size();
        d.x * (d.y + d.z) + d.y * d.z
    }

    /// Returns true if `other` lies completely inside this box.
    pub fn contains(&self, other: &Aabb) -> bool {
        self.x.min <= other.x.min
            && other.x.max <= self.x.max
            && self.y.min <= other.y.min
            && other.y.max <= self.y.max
            && self.z.min <= other.z.min
            && other.z.max <= self.z.max
    }

    /// Slab test returning the parametric entry/exit range of the ray.
    ///
    /// The result is clipped to `ray_t` and `None` when the clipped range is
    /// empty. Touching a face counts as a hit.
    pub fn slab(&self, r: &Ray, mut ray_t: Interval) -> Option<Interval> {
        for axis in 0..3 {
            let slab = self.axis_interval(axis);
            let adinv = 1.0 / r.direction[axis];
            let mut t0 = (slab.min - r.origin[axis]) * adinv;
            let mut t1 = (slab.max - r.origin[axis]) * adinv;
            if adinv < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            // NaN comes from a zero direction with the origin on the plane
            if !t0.is_nan() {
                ray_t.min = t0.max(ray_t.min);
            }
            if !t1.is_nan() {
                ray_t.max = t1.min(ray_t.max);
            }
            if ray_t.max < ray_t.min {
                return None;
            }
        }
        Some(ray_t)
    }

    /// Test if a ray intersects this AABB within the given interval.
    pub fn hit(&self, r: &Ray, ray_t: Interval) -> bool {
        self.slab(r, ray_t).is_some()
    }

    /// Translate (move) the AABB by an offset vector.
    pub fn translate(&self, offset: Vec3) -> Aabb {
        Aabb::from_points(self.lower() + offset, self.upper() + offset)
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn longest_axis(&self) -> usize {
        let d = self.size();
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.lower() + self.upper()) * 0.5
    }

    pub const EMPTY: Aabb = Aabb {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };

    pub const UNIVERSE: Aabb = Aabb {
        x: Interval::UNIVERSE,
        y: Interval::UNIVERSE,
        z: Interval::UNIVERSE,
    };
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_aabb_from_points() {
        let aabb = Aabb::from_points(Vec3::new(10.0, 0.0, 10.0), Vec3::new(0.0, 10.0, 0.0));

        assert_eq!(aabb.lower(), Vec3::ZERO);
        assert_eq!(aabb.upper(), Vec3::splat(10.0));
    }

    #[test]
    fn test_aabb_extend() {
        let mut aabb = Aabb::empty();
        assert!(aabb.is_empty());

        aabb.extend_point(Vec3::new(1.0, 2.0, 3.0));
        aabb.extend(&Aabb::from_points(Vec3::ZERO, Vec3::ONE));

        assert_eq!(aabb.lower(), Vec3::ZERO);
        assert_eq!(aabb.upper(), Vec3::new(1.0, 2.0, 3.0));
        assert!(aabb.contains(&Aabb::from_point(Vec3::new(0.5, 1.5, 2.5))));
    }

    #[test]
    fn test_aabb_half_area() {
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        // 1*(2+3) + 2*3
        assert_eq!(aabb.half_area(), 11.0);
        assert_eq!(Aabb::from_point(Vec3::ONE).half_area(), 0.0);
    }

    #[test]
    fn test_aabb_slab_layout_round_trip() {
        let aabb = Aabb::from_points(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0));
        let slabs = aabb.to_slabs();
        assert_eq!(slabs, [-1.0, 1.0, -2.0, 2.0, -3.0, 3.0]);
        assert_eq!(Aabb::from_slabs(&slabs), aabb);
    }

    #[test]
    fn test_aabb_hit() {
        let aabb = Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0));

        // Ray pointing at center
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let t = aabb.slab(&ray, ray.t).expect("ray should hit");
        assert_eq!(t, Interval::new(4.0, 6.0));

        // Ray pointing away
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), -Vec3::Z);
        assert!(!aabb.hit(&ray, ray.t));

        // Ray missing the box
        let ray = Ray::new(Vec3::new(10.0, 0.0, 0.0), Vec3::Z);
        assert!(!aabb.hit(&ray, ray.t));

        // Ray starting inside is clipped at its origin
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(aabb.slab(&ray, ray.t), Some(Interval::new(0.0, 1.0)));
    }

    #[test]
    fn test_aabb_slab_matches_analytic_range() {
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..1000 {
            let lo = Vec3::new(
                rng.gen_range(-5.0..0.0),
                rng.gen_range(-5.0..0.0),
                rng.gen_range(-5.0..0.0),
            );
            let hi = lo + Vec3::new(
                rng.gen_range(0.5..4.0),
                rng.gen_range(0.5..4.0),
                rng.gen_range(0.5..4.0),
            );
            let aabb = Aabb::from_points(lo, hi);

            // Aim from far away at a point inside the box
            let target = lo + (hi - lo) * Vec3::new(rng.gen(), rng.gen(), rng.gen());
            let origin = target
                + Vec3::new(
                    rng.gen_range(-20.0..20.0),
                    rng.gen_range(-20.0..20.0),
                    rng.gen_range(-20.0..20.0),
                );
            if aabb.contains(&Aabb::from_point(origin)) {
                continue;
            }
            let direction = target - origin;
            let ray = Ray::with_interval(origin, direction, Interval::UNIVERSE);

            // Closed form: max of per-axis near planes, min of far planes
            let inv = direction.recip();
            let t0 = (lo - origin) * inv;
            let t1 = (hi - origin) * inv;
            let near = t0.min(t1).max_element();
            let far = t0.max(t1).min_element();

            let t = aabb.slab(&ray, ray.t).expect("ray aimed into the box");
            assert_relative_eq!(t.min, near, max_relative = 1e-5);
            assert_relative_eq!(t.max, far, max_relative = 1e-5);
        }
    }

    #[test]
    fn test_aabb_slab_axis_parallel_ray() {
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::ONE);

        // Zero x/y direction components, origin inside the x/y slabs
        let ray = Ray::new(Vec3::new(0.5, 0.5, -2.0), Vec3::Z);
        assert_eq!(aabb.slab(&ray, ray.t), Some(Interval::new(2.0, 3.0)));

        // Zero x component, origin outside the x slab
        let ray = Ray::new(Vec3::new(2.0, 0.5, -2.0), Vec3::Z);
        assert_eq!(aabb.slab(&ray, ray.t), None);
    }

    #[test]
    fn test_aabb_longest_axis() {
        assert_eq!(Aabb::from_points(Vec3::ZERO, Vec3::new(10.0, 1.0, 1.0)).longest_axis(), 0);
        assert_eq!(Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 10.0, 1.0)).longest_axis(), 1);
        assert_eq!(Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 1.0, 10.0)).longest_axis(), 2);
    }

    #[test]
    fn test_aabb_centroid_and_translate() {
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::splat(10.0));
        assert_eq!(aabb.centroid(), Vec3::splat(5.0));

        let moved = aabb.translate(Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(moved.x, Interval::new(5.0, 15.0));
        assert_eq!(moved.y, aabb.y);
    }
}
