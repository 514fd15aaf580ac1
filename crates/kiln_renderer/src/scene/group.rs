//! Groups: the bottom level of the scene hierarchy.

use std::sync::{Arc, OnceLock};

use kiln_core::{ObjectType, ParameterStore};
use kiln_math::{Aabb, Interval, Ray};

use super::{CommitContext, Entity, Resolved, Surface, Volume};
use crate::bvh::{traverse, Bvh, TraversalMode};
use crate::hit::{Hit, HitKind};

/// Acceleration structures over a group's children.
#[derive(Debug)]
pub struct GroupAccel {
    pub surfaces: Bvh,
    pub volumes: Bvh,
    pub bounds: Aabb,
}

impl GroupAccel {
    fn build(surfaces: &[(u32, Arc<Surface>)], volumes: &[(u32, Arc<Volume>)]) -> Self {
        let surface_bounds: Vec<Aabb> = surfaces.iter().map(|(_, s)| s.geometry().bvh().bounds()).collect();
        let volume_bounds: Vec<Aabb> = volumes.iter().map(|(_, v)| v.volume_bounds()).collect();

        let mut bounds = Aabb::EMPTY;
        for b in surface_bounds.iter().chain(&volume_bounds) {
            bounds.extend(b);
        }
        log::debug!("building group BVH: {} surfaces, {} volumes", surfaces.len(), volumes.len());
        GroupAccel { surfaces: Bvh::build(&surface_bounds), volumes: Bvh::build(&volume_bounds), bounds }
    }
}

/// Committed group. Children keep the position they had in the parameter
/// array, which becomes their geometry id.
#[derive(Debug)]
pub struct Group {
    surfaces: Vec<(u32, Arc<Surface>)>,
    volumes: Vec<(u32, Arc<Volume>)>,
    accel: Arc<OnceLock<GroupAccel>>,
}

/// Keep valid children, warn about the rest.
pub(super) fn valid_members<T>(resolved: Vec<Resolved<T>>, kind: &str, cx: &CommitContext<'_>) -> Vec<(u32, Arc<T>)> {
    resolved
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| match entry {
            Resolved::Valid(item) => Some((i as u32, item)),
            Resolved::Invalid(handle) => {
                cx.warn(format!("skipping invalid {kind} {handle}"));
                None
            }
            Resolved::Missing => None,
        })
        .collect()
}

fn same_members<T>(a: &[(u32, Arc<T>)], b: &[(u32, Arc<T>)]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|((ia, x), (ib, y))| ia == ib && Arc::ptr_eq(x, y))
}

impl Group {
    /// Group over the given children. The acceleration structure of
    /// `previous` is shared when it holds exactly the same children.
    pub fn with_members(
        surfaces: Vec<(u32, Arc<Surface>)>,
        volumes: Vec<(u32, Arc<Volume>)>,
        previous: Option<&Group>,
    ) -> Self {
        let accel = match previous {
            Some(prev) if prev.has_members(&surfaces, &volumes) => prev.accel.clone(),
            _ => Arc::default(),
        };
        Group { surfaces, volumes, accel }
    }

    /// Whether this group holds exactly these children.
    pub fn has_members(&self, surfaces: &[(u32, Arc<Surface>)], volumes: &[(u32, Arc<Volume>)]) -> bool {
        same_members(&self.surfaces, surfaces) && same_members(&self.volumes, volumes)
    }

    pub fn surfaces(&self) -> &[(u32, Arc<Surface>)] {
        &self.surfaces
    }

    pub fn volumes(&self) -> &[(u32, Arc<Volume>)] {
        &self.volumes
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty() && self.volumes.is_empty()
    }

    /// Acceleration structure, built on first use.
    pub fn accel(&self) -> &GroupAccel {
        self.accel.get_or_init(|| GroupAccel::build(&self.surfaces, &self.volumes))
    }

    /// Whether the acceleration structure exists yet.
    pub fn is_built(&self) -> bool {
        self.accel.get().is_some()
    }

    pub fn group_bounds(&self) -> Aabb {
        self.accel().bounds
    }

    fn intersect_surfaces(&self, ray: &Ray) -> Option<Hit<'_>> {
        traverse(&self.accel().surfaces, *ray, TraversalMode::Closest, |r, i| {
            let (id, surface) = &self.surfaces[i as usize];
            surface.geometry().intersect(r).map(|hit| Hit {
                t: Interval::new(hit.t, hit.t),
                prim_id: hit.prim_id,
                geom_id: *id,
                obj_id: surface.id().unwrap_or(*id),
                inst_id: 0,
                kind: HitKind::Surface {
                    surface: surface.as_ref(),
                    normal: hit.normal,
                    uvw: hit.uvw,
                    front_facing: hit.normal.dot(r.direction) < 0.0,
                },
            })
        })
    }

    fn intersect_volumes(&self, ray: &Ray) -> Option<Hit<'_>> {
        traverse(&self.accel().volumes, *ray, TraversalMode::Closest, |r, i| {
            let (id, volume) = &self.volumes[i as usize];
            // Clip against the unshortened ray so the exit is not cut at a
            // closer volume's entry.
            let t = volume.intersect(ray)?;
            (t.min <= r.t.max).then(|| Hit {
                t,
                prim_id: 0,
                geom_id: *id,
                obj_id: volume.id().unwrap_or(*id),
                inst_id: 0,
                kind: HitKind::Volume(volume.as_ref()),
            })
        })
    }

    /// Nearest hit inside `ray.t`. A volume entered before the nearest
    /// surface wins, with its interval ending at that surface.
    pub fn intersect(&self, ray: &Ray, skip_volumes: bool) -> Option<Hit<'_>> {
        let surface = self.intersect_surfaces(ray);
        if skip_volumes {
            return surface;
        }
        match (surface, self.intersect_volumes(ray)) {
            (Some(s), Some(mut v)) if v.t.min < s.t.min => {
                v.t.max = v.t.max.min(s.t.min);
                Some(v)
            }
            (Some(s), _) => Some(s),
            (None, v) => v,
        }
    }

    /// Whether anything blocks `ray.t`.
    pub fn occluded(&self, ray: &Ray, skip_volumes: bool) -> bool {
        let accel = self.accel();
        let blocked = traverse(&accel.surfaces, *ray, TraversalMode::Any, |r, i| {
            self.surfaces[i as usize].1.geometry().intersect(r).map(|hit| hit.t)
        });
        if blocked.is_some() {
            return true;
        }
        !skip_volumes
            && traverse(&accel.volumes, *ray, TraversalMode::Any, |r, i| {
                self.volumes[i as usize].1.intersect(r).map(|t| t.min)
            })
            .is_some()
    }
}

impl Entity for Group {
    const KIND: ObjectType = ObjectType::Group;
    const NAME: &'static str = "group";

    type Subtype = ();

    fn parse_subtype(_name: &str) -> Option<()> {
        Some(())
    }

    fn build(
        _subtype: (),
        params: &ParameterStore,
        cx: &CommitContext<'_>,
        previous: Option<&Self>,
    ) -> Result<Self, String> {
        let surfaces = valid_members(cx.entities::<Surface>(params, "surface")?, "surface", cx);
        let volumes = valid_members(cx.entities::<Volume>(params, "volume")?, "volume", cx);
        Ok(Group::with_members(surfaces, volumes, previous))
    }

    fn bounds(&self) -> Option<Aabb> {
        Some(self.group_bounds())
    }
}
