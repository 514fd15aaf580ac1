// Transform utilities for Mat4
//
// Extends glam::Mat4 with the instance-space helpers the tracer needs.
// glam already provides transform_point3(), transform_vector3() and inverse().

use glam::{Mat3, Mat4, Vec3};

use crate::{Aabb, Ray};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;

    /// Transform a ray into another space without renormalizing the
    /// direction, so parametric distances stay valid in both spaces.
    fn transform_ray(&self, ray: &Ray) -> Ray;

    /// Matrix that maps normals the same way this matrix maps points
    /// (inverse transpose of the upper 3x3).
    fn normal_matrix(&self) -> Mat3;
}

impl Mat4Ext for Mat4 {
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return Aabb::EMPTY;
        }

        let lo = aabb.lower();
        let hi = aabb.upper();

        let mut result = Aabb::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            );
            result.extend_point(self.transform_point3(corner));
        }
        result
    }

    fn transform_ray(&self, ray: &Ray) -> Ray {
        Ray::with_interval(
            self.transform_point3(ray.origin),
            self.transform_vector3(ray.direction),
            ray.t,
        )
    }

    fn normal_matrix(&self) -> Mat3 {
        Mat3::from_mat4(*self).inverse().transpose()
    }
}
