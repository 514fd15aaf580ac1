// Re-export glam for convenience
pub use glam::*;

// Kiln math types
mod aabb;
mod interval;
mod ray;
mod transform;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::Ray;
pub use transform::Mat4Ext;

/// Largest absolute component of a vector, used for epsilon scaling.
#[inline]
pub fn max_abs_component(v: Vec3) -> f32 {
    v.abs().max_element()
}
