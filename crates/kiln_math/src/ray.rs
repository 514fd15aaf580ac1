use crate::{Interval, Vec3};

/// A ray in 3D space with origin, direction, and valid parameter range.
///
/// Points along the ray are `origin + t * direction` for `t` inside `t`.
/// The direction is not required to be normalized; instance transforms
/// rely on this so hit distances stay comparable across spaces.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub t: Interval,
}

impl Ray {
    /// Create a new ray covering `[0, f32::MAX]`.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            t: Interval::FORWARD,
        }
    }

    /// Create a ray restricted to the given parameter range.
    pub fn with_interval(origin: Vec3, direction: Vec3, t: Interval) -> Self {
        Self {
            origin,
            direction,
            t,
        }
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_creation() {
        let origin = Vec3::new(1.0, 2.0, 3.0);
        let direction = Vec3::new(0.0, 1.0, 0.0);
        let ray = Ray::new(origin, direction);

        assert_eq!(ray.origin, origin);
        assert_eq!(ray.direction, direction);
        assert_eq!(ray.t, Interval::FORWARD);
    }

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);

        assert_eq!(ray.at(0.0), Vec3::ZERO);
        assert_eq!(ray.at(2.0), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(ray.at(-1.0), Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_ray_with_interval() {
        let ray = Ray::with_interval(Vec3::ZERO, Vec3::Y, Interval::new(1.0, 2.0));
        assert!(ray.t.contains(1.5));
        assert!(!ray.t.contains(2.5));
    }
}
