//! The world: instances, lights and the top-level BVH.

use std::sync::{Arc, OnceLock};

use kiln_core::{ObjectType, ParameterStore};
use kiln_math::{Aabb, Mat3, Mat4, Mat4Ext, Ray};
use rayon::prelude::*;

use super::group::valid_members;
use super::{CommitContext, Entity, Group, Instance, Light, Surface, Volume};
use crate::bvh::{traverse, Bvh, TraversalMode};
use crate::hit::{Hit, HitKind};

/// One transformed copy of a group.
#[derive(Debug)]
struct Placement {
    group: Arc<Group>,
    xfm: Mat4,
    inv: Mat4,
    normal: Mat3,
    inst_id: u32,
}

#[derive(Debug)]
pub struct WorldAccel {
    placements: Vec<Placement>,
    bvh: Bvh,
    bounds: Aabb,
}

impl WorldAccel {
    fn build(instances: &[Arc<Instance>]) -> Self {
        // Bottom levels first, in parallel.
        instances.par_iter().for_each(|instance| {
            instance.group().accel();
        });

        let mut placements = Vec::new();
        for (index, instance) in instances.iter().enumerate() {
            if instance.group().is_empty() {
                continue;
            }
            let inst_id = instance.id().unwrap_or(index as u32);
            for xfm in instance.transforms() {
                placements.push(Placement {
                    group: instance.group().clone(),
                    xfm: *xfm,
                    inv: xfm.inverse(),
                    normal: xfm.normal_matrix(),
                    inst_id,
                });
            }
        }

        let boxes: Vec<Aabb> = placements.iter().map(|p| p.xfm.transform_aabb(&p.group.group_bounds())).collect();
        let mut bounds = Aabb::EMPTY;
        for b in &boxes {
            bounds.extend(b);
        }
        log::debug!("building world BVH over {} placements", placements.len());
        WorldAccel { bvh: Bvh::build(&boxes), placements, bounds }
    }
}

/// Committed world. Surfaces and volumes attached directly become one
/// extra identity instance at the end of the instance list.
#[derive(Debug)]
pub struct World {
    instances: Vec<Arc<Instance>>,
    zero_instance: Option<Arc<Instance>>,
    lights: Vec<Arc<Light>>,
    accel: Arc<OnceLock<WorldAccel>>,
}

impl World {
    /// Every instance the world renders, the zero instance included.
    pub fn instances(&self) -> &[Arc<Instance>] {
        &self.instances
    }

    pub fn has_zero_instance(&self) -> bool {
        self.zero_instance.is_some()
    }

    pub fn lights(&self) -> &[Arc<Light>] {
        &self.lights
    }

    pub fn accel(&self) -> &WorldAccel {
        self.accel.get_or_init(|| WorldAccel::build(&self.instances))
    }

    /// Build every acceleration structure before rendering.
    pub fn prepare(&self) {
        self.accel();
    }

    pub fn world_bounds(&self) -> Aabb {
        self.accel().bounds
    }

    fn intersect_placements(&self, ray: &Ray, skip_volumes: bool) -> Option<Hit<'_>> {
        let accel = self.accel();
        traverse(&accel.bvh, *ray, TraversalMode::Closest, |r, i| {
            let placement = &accel.placements[i as usize];
            let local = placement.inv.transform_ray(r);
            let mut hit = placement.group.intersect(&local, skip_volumes)?;
            hit.inst_id = placement.inst_id;
            if let HitKind::Surface { normal, front_facing, .. } = &mut hit.kind {
                let n = (placement.normal * *normal).normalize_or_zero();
                *front_facing = n.dot(r.direction) < 0.0;
                *normal = if *front_facing { n } else { -n };
            }
            Some(hit)
        })
    }

    /// Nearest hit inside `ray.t`. Surface normals come back in world space,
    /// normalized and facing against the ray.
    pub fn intersect(&self, ray: &Ray, skip_volumes: bool) -> Option<Hit<'_>> {
        let mut hit = self.intersect_placements(ray, skip_volumes)?;
        if hit.is_volume() {
            // A surface of another instance may sit inside the volume.
            let inside = Ray::with_interval(ray.origin, ray.direction, hit.t);
            if let Some(surface) = self.intersect_placements(&inside, true) {
                hit.t.max = surface.t.min;
            }
        }
        Some(hit)
    }

    /// Whether anything blocks `ray.t`.
    pub fn occluded(&self, ray: &Ray, skip_volumes: bool) -> bool {
        let accel = self.accel();
        traverse(&accel.bvh, *ray, TraversalMode::Any, |r, i| {
            let placement = &accel.placements[i as usize];
            let local = placement.inv.transform_ray(r);
            placement.group.occluded(&local, skip_volumes).then_some(r.t.min)
        })
        .is_some()
    }
}

fn same_instances(a: &[Arc<Instance>], b: &[Arc<Instance>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
}

impl Entity for World {
    const KIND: ObjectType = ObjectType::World;
    const NAME: &'static str = "world";

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
        let instances = cx.entities::<Instance>(params, "instance")?;
        let mut instances: Vec<Arc<Instance>> = valid_members(instances, "instance", cx)
            .into_iter()
            .map(|(_, instance)| instance)
            .collect();

        let surfaces = valid_members(cx.entities::<Surface>(params, "surface")?, "surface", cx);
        let volumes = valid_members(cx.entities::<Volume>(params, "volume")?, "volume", cx);
        let zero_instance = if params.has("surface") || params.has("volume") {
            log::debug!(
                "world {} adds a zero instance: {} surfaces, {} volumes",
                cx.handle(),
                surfaces.len(),
                volumes.len()
            );
            let id = params.get::<u32>("id");
            let zero = match previous.and_then(|world| world.zero_instance.clone()) {
                Some(prev) if prev.id() == id && prev.group().has_members(&surfaces, &volumes) => prev,
                prev => {
                    let previous_group = prev.as_ref().map(|instance| instance.group().as_ref());
                    let group = Group::with_members(surfaces, volumes, previous_group);
                    Arc::new(Instance::new(Arc::new(group), vec![Mat4::IDENTITY], id))
                }
            };
            instances.push(zero.clone());
            Some(zero)
        } else {
            None
        };

        let lights = valid_members(cx.entities::<Light>(params, "light")?, "light", cx)
            .into_iter()
            .map(|(_, light)| light)
            .collect();

        let accel = match previous {
            Some(prev) if same_instances(&prev.instances, &instances) => prev.accel.clone(),
            _ => Arc::default(),
        };
        Ok(World { instances, zero_instance, lights, accel })
    }

    fn bounds(&self) -> Option<Aabb> {
        Some(self.world_bounds())
    }
}
