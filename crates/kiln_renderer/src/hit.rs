//! Ray hit records.

use kiln_math::{Interval, Vec3};

use crate::bvh::HitDistance;
use crate::scene::{Surface, Volume};

/// What a ray hit.
#[derive(Clone, Copy)]
pub enum HitKind<'a> {
    Surface {
        surface: &'a Surface,
        /// Geometric normal, not normalized until the world returns the hit.
        normal: Vec3,
        /// Barycentric (triangles) or zero (spheres) coordinates.
        uvw: Vec3,
        /// False when the ray arrived from the back side.
        front_facing: bool,
    },
    Volume(&'a Volume),
}

/// A hit against the scene. Surface hits have a degenerate interval;
/// volume hits span the part of the ray inside the volume.
#[derive(Clone, Copy)]
pub struct Hit<'a> {
    pub t: Interval,
    pub prim_id: u32,
    /// Index of the surface or volume inside its group.
    pub geom_id: u32,
    /// The surface's or volume's `id` parameter, else `geom_id`.
    pub obj_id: u32,
    pub inst_id: u32,
    pub kind: HitKind<'a>,
}

impl Hit<'_> {
    pub fn is_surface(&self) -> bool {
        matches!(self.kind, HitKind::Surface { .. })
    }

    pub fn is_volume(&self) -> bool {
        matches!(self.kind, HitKind::Volume(_))
    }
}

impl HitDistance for Hit<'_> {
    fn t_entry(&self) -> f32 {
        self.t.min
    }
}
