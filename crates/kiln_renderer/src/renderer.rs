//! Renderers: turn a primary ray into a shaded sample.
//!
//! The default renderer shades surfaces with ambient occlusion and
//! directional lights, ray-marches volumes front to back and composites
//! the background behind whatever opacity is left.

use kiln_core::{ObjectType, ParameterStore};
use kiln_math::{max_abs_component, Interval, Ray, Vec3, Vec4};
use rand::RngCore;

use crate::hit::{Hit, HitKind};
use crate::scene::{CommitContext, Entity, Volume, World};

/// Relative epsilon for offsetting secondary ray origins off a surface.
const ULP_EPSILON: f32 = 9.238_7e-7;

/// Opacity at which compositing stops.
const MAX_OPACITY: f32 = 0.99;

/// Uniform float in `[0, 1)`.
#[inline]
pub fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    (rng.next_u32() >> 8) as f32 * (1.0 / (1u32 << 24) as f32)
}

/// Uniformly distributed unit vector, by rejection sampling.
pub fn random_unit_vector(rng: &mut dyn RngCore) -> Vec3 {
    loop {
        let v = Vec3::new(gen_f32(rng) * 2.0 - 1.0, gen_f32(rng) * 2.0 - 1.0, gen_f32(rng) * 2.0 - 1.0);
        let len_sq = v.length_squared();
        if len_sq > 1e-6 && len_sq <= 1.0 {
            return v / len_sq.sqrt();
        }
    }
}

/// Reproducible pseudo-random color for an id.
pub fn id_color(i: u32) -> Vec3 {
    const MX: u32 = 13 * 17 * 43;
    const MY: u32 = 11 * 29;
    const MZ: u32 = 7 * 23 * 63;
    let g = i.wrapping_mul(3 * 5 * 127).wrapping_add(12_312_314);
    Vec3::new(
        (g % MX) as f32 / (MX - 1) as f32,
        (g % MY) as f32 / (MY - 1) as f32,
        (g % MZ) as f32 / (MZ - 1) as f32,
    )
}

/// Colors `opacityHeatmap` ramps through from transparent to opaque.
const HEATMAP: [Vec3; 4] = [Vec3::Z, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::ONE];

fn heatmap_color(opacity: f32) -> Vec3 {
    let x = if opacity.is_nan() { 0.0 } else { opacity.clamp(0.0, 1.0) * 3.0 };
    let lower = (x as usize).min(HEATMAP.len() - 2);
    HEATMAP[lower].lerp(HEATMAP[lower + 1], x - lower as f32)
}

fn bool_color(pred: bool) -> Vec3 {
    if pred {
        Vec3::Y
    } else {
        Vec3::X
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererType {
    AmbientOcclusion,
    Raycast,
    RayDir,
    Debug,
}

/// What the debug renderer visualizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugMethod {
    PrimId,
    GeomId,
    InstId,
    Ng,
    NgAbs,
    Uvw,
    HitSurface,
    HitVolume,
    Backface,
    OpacityHeatmap,
}

impl DebugMethod {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "primID" => DebugMethod::PrimId,
            "geomID" => DebugMethod::GeomId,
            "instID" => DebugMethod::InstId,
            "Ng" => DebugMethod::Ng,
            "Ng.abs" => DebugMethod::NgAbs,
            "uvw" => DebugMethod::Uvw,
            "hitSurface" => DebugMethod::HitSurface,
            "hitVolume" => DebugMethod::HitVolume,
            "backface" => DebugMethod::Backface,
            "opacityHeatmap" => DebugMethod::OpacityHeatmap,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    /// Composited shading; `ao_samples` and `lights` are off for raycast.
    Shaded { ao_samples: u32, lights: bool },
    RayDir,
    Debug(DebugMethod),
}

/// Ids of the first object a ray hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitIds {
    pub primitive: u32,
    pub object: u32,
    pub instance: u32,
}

impl HitIds {
    /// Ids written where the ray hit nothing.
    pub const NONE: HitIds = HitIds { primitive: u32::MAX, object: u32::MAX, instance: u32::MAX };

    pub fn from_hit(hit: &Hit<'_>) -> Self {
        HitIds { primitive: hit.prim_id, object: hit.obj_id, instance: hit.inst_id }
    }

    pub fn to_array(self) -> [u32; 3] {
        [self.primitive, self.object, self.instance]
    }
}

/// One shaded sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub color: Vec4,
    /// Distance to the first hit, infinite on a miss.
    pub depth: f32,
    pub ids: HitIds,
}

/// Committed renderer.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    mode: Mode,
    background: Vec4,
    pixel_samples: u32,
    /// Inverse of the volume sampling rate.
    volume_step_factor: f32,
}

impl Renderer {
    pub fn background(&self) -> Vec4 {
        self.background
    }

    /// Samples per pixel per render call.
    pub fn pixel_samples(&self) -> u32 {
        self.pixel_samples
    }

    /// Shade one primary ray.
    pub fn render_sample(&self, ray: Ray, world: &World, rng: &mut dyn RngCore) -> Sample {
        match self.mode {
            Mode::Shaded { ao_samples, lights } => self.shade(ray, world, ao_samples, lights, rng),
            Mode::RayDir => Sample {
                color: ((ray.direction.normalize_or_zero() + Vec3::ONE) * 0.5).extend(1.0),
                depth: f32::INFINITY,
                ids: HitIds::NONE,
            },
            Mode::Debug(method) => self.debug(ray, world, method),
        }
    }

    fn shade(&self, mut ray: Ray, world: &World, ao_samples: u32, lights: bool, rng: &mut dyn RngCore) -> Sample {
        let background = self.background.truncate();
        let mut color = Vec3::ZERO;
        let mut opacity = 0.0f32;
        let mut depth = f32::INFINITY;
        let mut ids = None;
        let mut skip_volumes = false;

        while opacity < MAX_OPACITY {
            let Some(hit) = world.intersect(&ray, skip_volumes) else {
                color += (1.0 - opacity) * background;
                opacity += (1.0 - opacity) * self.background.w;
                break;
            };
            depth = depth.min(hit.t.min);
            ids.get_or_insert_with(|| HitIds::from_hit(&hit));

            match hit.kind {
                HitKind::Surface { surface, normal, uvw, .. } => {
                    let base = surface.color(hit.prim_id, uvw);
                    let mut shaded = base * normal.dot(-ray.direction).abs();
                    if ao_samples > 0 {
                        shaded *= ambient_occlusion(&ray, &hit, normal, ao_samples, world, rng);
                    }
                    if lights {
                        shaded += direct_light(&ray, &hit, normal, base, world);
                    }
                    color += (1.0 - opacity) * shaded;
                    opacity = 1.0;
                    ray.t.min = hit.t.max + 1e-3;
                }
                HitKind::Volume(volume) => {
                    self.march(&ray, hit.t, volume, &mut color, &mut opacity);
                    ray.t.min = hit.t.max + 1e-6;
                    skip_volumes = true;
                    if opacity >= MAX_OPACITY {
                        color += (1.0 - opacity) * background;
                        opacity += (1.0 - opacity) * self.background.w;
                    }
                }
            }
        }

        Sample { color: color.extend(opacity), depth, ids: ids.unwrap_or(HitIds::NONE) }
    }

    /// Front-to-back ray march through `interval`.
    ///
    /// Opacities are defined per field step; a longer step compounds the
    /// sample's transmittance over the distance it covers.
    fn march(&self, ray: &Ray, mut interval: Interval, volume: &Volume, color: &mut Vec3, opacity: &mut f32) {
        let step = volume.field().step_size() * self.volume_step_factor;
        if step.is_nan() || step <= 0.0 {
            return;
        }
        interval.min += 0.1 * step;
        while *opacity < MAX_OPACITY && interval.size() >= 0.0 {
            if let Some((c, o)) = volume.sample(ray.at(interval.min)) {
                let alpha = step_opacity(o, self.volume_step_factor);
                *color += (1.0 - *opacity) * alpha * c;
                *opacity += (1.0 - *opacity) * alpha;
            }
            interval.min += step;
        }
    }

    fn debug(&self, ray: Ray, world: &World, method: DebugMethod) -> Sample {
        let Some(hit) = world.intersect(&ray, false) else {
            return Sample { color: self.background, depth: f32::INFINITY, ids: HitIds::NONE };
        };
        let background = self.background.truncate();
        let surface = match hit.kind {
            HitKind::Surface { surface, normal, uvw, front_facing } => Some((normal, uvw, front_facing, surface)),
            HitKind::Volume(_) => None,
        };
        let color = match (method, surface) {
            (DebugMethod::PrimId, Some(_)) => id_color(hit.prim_id),
            (DebugMethod::GeomId, _) => id_color(hit.geom_id),
            (DebugMethod::InstId, _) => id_color(hit.inst_id),
            (DebugMethod::Ng, Some((normal, ..))) => normal,
            (DebugMethod::NgAbs, Some((normal, ..))) => normal.abs(),
            (DebugMethod::Uvw, Some((_, uvw, ..))) => Vec3::new(uvw.x, uvw.y, 1.0),
            (DebugMethod::HitSurface, s) => bool_color(s.is_some()),
            (DebugMethod::HitVolume, _) => bool_color(hit.is_volume()),
            (DebugMethod::Backface, Some((.., front_facing, _))) => bool_color(front_facing),
            (DebugMethod::OpacityHeatmap, Some((normal, .., surface))) => {
                let c = heatmap_color(surface.opacity());
                let falloff = normal.dot(-ray.direction.normalize_or_zero()).abs();
                (0.8 * c * falloff + 0.2 * c).min(Vec3::ONE)
            }
            (_, None) => background,
        };
        Sample { color: color.extend(1.0), depth: hit.t.min, ids: HitIds::from_hit(&hit) }
    }
}

/// Opacity of a march step `steps` field steps long, for a sample opacity
/// `o` per field step.
fn step_opacity(o: f32, steps: f32) -> f32 {
    if o.is_nan() {
        return 0.0;
    }
    1.0 - (1.0 - o.clamp(0.0, 1.0)).powf(steps)
}

/// Offset scale for a hit at distance `t` along `ray`.
fn epsilon_from(p: Vec3, ray: &Ray, t: f32) -> f32 {
    max_abs_component(p).max(max_abs_component(ray.direction) * t) * ULP_EPSILON
}

/// Fraction of `samples` hemisphere rays around `normal` that escape.
fn ambient_occlusion(
    ray: &Ray,
    hit: &Hit<'_>,
    normal: Vec3,
    samples: u32,
    world: &World,
    rng: &mut dyn RngCore,
) -> f32 {
    let p = ray.at(hit.t.min);
    let origin = p + epsilon_from(p, ray, hit.t.min) * normal;
    let occluded = (0..samples)
        .filter(|_| {
            let mut dir = random_unit_vector(rng);
            if dir.dot(normal) <= 0.0 {
                dir = -dir;
            }
            world.occluded(&Ray::new(origin, dir), true)
        })
        .count();
    1.0 - occluded as f32 / samples as f32
}

/// Unshadowed directional light reaching the hit.
fn direct_light(ray: &Ray, hit: &Hit<'_>, normal: Vec3, base: Vec3, world: &World) -> Vec3 {
    let p = ray.at(hit.t.min);
    let origin = p + epsilon_from(p, ray, hit.t.min) * normal;
    world
        .lights()
        .iter()
        .filter(|light| normal.dot(-light.direction) > 0.0)
        .filter(|light| !world.occluded(&Ray::new(origin, -light.direction), true))
        .map(|light| base * light.incident(normal))
        .sum()
}

impl Entity for Renderer {
    const KIND: ObjectType = ObjectType::Renderer;
    const NAME: &'static str = "renderer";

    type Subtype = RendererType;

    fn parse_subtype(name: &str) -> Option<RendererType> {
        match name {
            "default" | "ao" | "scivis" | "pathtracer" => Some(RendererType::AmbientOcclusion),
            "raycast" => Some(RendererType::Raycast),
            "rayDir" => Some(RendererType::RayDir),
            "debug" => Some(RendererType::Debug),
            _ => None,
        }
    }

    fn build(
        subtype: RendererType,
        params: &ParameterStore,
        _cx: &CommitContext<'_>,
        _previous: Option<&Self>,
    ) -> Result<Self, String> {
        let pixel_samples = params.get_or("pixelSamples", 1i32);
        if pixel_samples < 1 {
            return Err(format!("'pixelSamples' must be at least 1, got {pixel_samples}"));
        }
        let rate = params.get_or("volumeSamplingRate", 0.125f32);
        if rate.is_nan() || rate <= 0.0 {
            return Err(format!("'volumeSamplingRate' must be positive, got {rate}"));
        }

        let mode = match subtype {
            RendererType::AmbientOcclusion => {
                let ao_samples = params.get_or("aoSamples", 1i32);
                Mode::Shaded { ao_samples: ao_samples.max(0) as u32, lights: true }
            }
            RendererType::Raycast => Mode::Shaded { ao_samples: 0, lights: false },
            RendererType::RayDir => Mode::RayDir,
            RendererType::Debug => {
                let name = params.get_str("method").unwrap_or("primID");
                Mode::Debug(DebugMethod::from_name(name).ok_or_else(|| format!("unknown debug method '{name}'"))?)
            }
        };

        Ok(Renderer {
            mode,
            background: params.get_or("backgroundColor", Vec4::ONE),
            pixel_samples: pixel_samples as u32,
            volume_step_factor: 1.0 / rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::tests::{array_param, committed, object_array_param, ramp_volume, sphere_surface};
    use crate::scene::{Light, SceneObject, Surface};
    use kiln_core::{Object, ParamValue};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn world_of(
        surfaces: &[Arc<SceneObject<Surface>>],
        volumes: &[Arc<SceneObject<Volume>>],
        extra: Vec<(&str, ParamValue)>,
    ) -> Arc<World> {
        let mut params = extra;
        if !surfaces.is_empty() {
            params.push(("surface", object_array_param(ObjectType::Surface, surfaces)));
        }
        if !volumes.is_empty() {
            params.push(("volume", object_array_param(ObjectType::Volume, volumes)));
        }
        committed::<World>("", params).current().unwrap()
    }

    fn renderer(subtype: &str, params: Vec<(&str, ParamValue)>) -> Renderer {
        let object = committed::<Renderer>(subtype, params);
        assert!(object.is_valid());
        *object.current().unwrap()
    }

    fn forward() -> Ray {
        Ray::new(Vec3::ZERO, -Vec3::Z)
    }

    #[test]
    fn test_gen_f32_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let x = gen_f32(&mut rng);
            assert!((0.0..1.0).contains(&x));
        }
        let v = random_unit_vector(&mut rng);
        assert!((v.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_id_color_deterministic() {
        assert_eq!(id_color(3), id_color(3));
        assert_ne!(id_color(3), id_color(4));
        let c = id_color(12345);
        assert!(c.cmpge(Vec3::ZERO).all() && c.cmple(Vec3::ONE).all());
    }

    #[test]
    fn test_miss_returns_background() {
        let world = world_of(&[], &[], vec![]);
        let r = renderer("default", vec![("backgroundColor", ParamValue::Vec4(Vec4::new(0.1, 0.2, 0.3, 1.0)))]);
        let mut rng = StdRng::seed_from_u64(0);
        let sample = r.render_sample(forward(), &world, &mut rng);
        assert_eq!(sample.color, Vec4::new(0.1, 0.2, 0.3, 1.0));
        assert_eq!(sample.depth, f32::INFINITY);
    }

    #[test]
    fn test_unoccluded_surface() {
        let world = world_of(&[sphere_surface(Vec3::new(0.0, 0.0, -3.0), 1.0)], &[], vec![]);
        let r = renderer("ao", vec![("aoSamples", ParamValue::Int(8))]);
        let mut rng = StdRng::seed_from_u64(1);
        let sample = r.render_sample(forward(), &world, &mut rng);
        assert!((sample.color - Vec4::ONE).abs().max_element() < 1e-4);
        assert!((sample.depth - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_enclosed_surface_is_occluded() {
        // Camera and small sphere both sit inside a large sphere.
        let surfaces = [sphere_surface(Vec3::new(0.0, 0.0, -3.0), 1.0), sphere_surface(Vec3::ZERO, 20.0)];
        let world = world_of(&surfaces, &[], vec![]);
        let mut rng = StdRng::seed_from_u64(2);

        let ao = renderer("default", vec![("aoSamples", ParamValue::Int(4))]).render_sample(forward(), &world, &mut rng);
        assert!(ao.color.truncate().max_element() < 1e-4);
        assert_eq!(ao.color.w, 1.0);

        let raycast = renderer("raycast", vec![]).render_sample(forward(), &world, &mut rng);
        assert!((raycast.color - Vec4::ONE).abs().max_element() < 1e-4);
    }

    #[test]
    fn test_directional_light_adds() {
        let light = committed::<Light>("directional", vec![]);
        let world = world_of(
            &[sphere_surface(Vec3::new(0.0, 0.0, -3.0), 1.0)],
            &[],
            vec![("light", object_array_param(ObjectType::Light, &[light]))],
        );
        let r = renderer("default", vec![("aoSamples", ParamValue::Int(0))]);
        let mut rng = StdRng::seed_from_u64(3);
        let sample = r.render_sample(forward(), &world, &mut rng);
        assert!((sample.color.truncate() - Vec3::splat(2.0)).abs().max_element() < 1e-4);
    }

    #[test]
    fn test_volume_composites_over_background() {
        let world = world_of(&[], &[ramp_volume(vec![])], vec![]);
        let r = renderer(
            "default",
            vec![
                ("backgroundColor", ParamValue::Vec4(Vec4::new(0.0, 0.0, 0.0, 1.0))),
                ("volumeSamplingRate", ParamValue::Float(1.0)),
            ],
        );
        let mut rng = StdRng::seed_from_u64(4);
        let ray = Ray::new(Vec3::new(0.75, 0.5, -1.0), Vec3::Z);
        let sample = r.render_sample(ray, &world, &mut rng);
        assert!((sample.depth - 1.0).abs() < 1e-4);
        assert!(sample.color.x > 0.0 && sample.color.x < 1.0);
        assert_eq!(sample.color.w, 1.0);

        // Outside the field the background shows through untouched.
        let miss = r.render_sample(Ray::new(Vec3::new(3.0, 0.5, -1.0), Vec3::Z), &world, &mut rng);
        assert_eq!(miss.color, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_opaque_volume_stays_bounded() {
        let opaque = ramp_volume(vec![
            ("color", array_param(&[Vec3::ONE, Vec3::ONE])),
            ("opacity", array_param(&[1.0f32, 1.0])),
        ]);
        let half = ramp_volume(vec![("opacity", array_param(&[0.5f32, 0.5]))]);
        let background = Vec4::new(0.2, 0.4, 0.6, 1.0);
        // Default sampling rate: each march step spans several field steps
        let r = renderer("default", vec![("backgroundColor", ParamValue::Vec4(background))]);
        let mut rng = StdRng::seed_from_u64(8);
        let ray = Ray::new(Vec3::new(0.75, 0.5, -1.0), Vec3::Z);

        let sample = r.render_sample(ray, &world_of(&[], &[opaque], vec![]), &mut rng);
        assert!((sample.color - Vec4::ONE).abs().max_element() < 1e-5, "{:?}", sample.color);

        let sample = r.render_sample(ray, &world_of(&[], &[half], vec![]), &mut rng);
        assert!(sample.color.cmpge(Vec4::ZERO).all(), "{:?}", sample.color);
        assert!(sample.color.cmple(Vec4::ONE).all(), "{:?}", sample.color);
        assert!((sample.color.w - 1.0).abs() < 1e-6);

        assert_eq!(step_opacity(0.5, 1.0), 0.5);
        assert!((step_opacity(0.5, 8.0) - (1.0 - 0.5f32.powi(8))).abs() < 1e-6);
        assert_eq!(step_opacity(2.0, 8.0), 1.0);
        assert_eq!(step_opacity(f32::NAN, 8.0), 0.0);
    }

    #[test]
    fn test_ray_dir() {
        let world = world_of(&[], &[], vec![]);
        let mut rng = StdRng::seed_from_u64(5);
        let sample = renderer("rayDir", vec![]).render_sample(Ray::new(Vec3::ZERO, Vec3::X), &world, &mut rng);
        assert_eq!(sample.color, Vec4::new(1.0, 0.5, 0.5, 1.0));
    }

    #[test]
    fn test_debug_methods() {
        let world = world_of(&[sphere_surface(Vec3::new(0.0, 0.0, -3.0), 1.0)], &[], vec![]);
        let mut rng = StdRng::seed_from_u64(6);
        let shade = |method: &str, rng: &mut StdRng| {
            renderer("debug", vec![("method", method.into())]).render_sample(forward(), &world, rng).color
        };
        assert_eq!(shade("hitSurface", &mut rng), Vec4::new(0.0, 1.0, 0.0, 1.0));
        assert_eq!(shade("hitVolume", &mut rng), Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(shade("backface", &mut rng), Vec4::new(0.0, 1.0, 0.0, 1.0));
        assert_eq!(shade("primID", &mut rng), id_color(0).extend(1.0));
        assert!((shade("Ng", &mut rng) - Vec4::new(0.0, 0.0, 1.0, 1.0)).abs().max_element() < 1e-4);
    }

    #[test]
    fn test_opacity_heatmap() {
        assert_eq!(heatmap_color(0.0), Vec3::Z);
        assert_eq!(heatmap_color(0.5), Vec3::new(1.0, 0.5, 0.0));
        assert_eq!(heatmap_color(1.0), Vec3::ONE);
        assert_eq!(heatmap_color(f32::NAN), Vec3::Z);

        let sphere = sphere_surface(Vec3::new(0.0, 0.0, -3.0), 1.0);
        let world = world_of(&[sphere], &[], vec![]);
        let r = renderer("debug", vec![("method", "opacityHeatmap".into())]);
        let mut rng = StdRng::seed_from_u64(9);
        // Head on, an opaque surface saturates to white
        let sample = r.render_sample(forward(), &world, &mut rng);
        assert!((sample.color - Vec4::ONE).abs().max_element() < 1e-5);
        // Grazing, only the ambient fifth remains
        let graze = Ray::new(Vec3::new(0.999, 0.0, 0.0), -Vec3::Z);
        let sample = r.render_sample(graze, &world, &mut rng);
        assert!(sample.color.x < 0.5 && sample.color.x >= 0.2 - 1e-5);
    }

    #[test]
    fn test_samples_carry_first_hit_ids() {
        let tagged = sphere_surface(Vec3::new(0.0, 0.0, -3.0), 1.0);
        tagged.core().set_param("id", ParamValue::UInt(9));
        tagged.commit();
        let world = world_of(&[tagged], &[], vec![]);
        let mut rng = StdRng::seed_from_u64(10);

        for subtype in ["default", "debug"] {
            let r = renderer(subtype, vec![]);
            let hit = r.render_sample(forward(), &world, &mut rng);
            assert_eq!(hit.ids, HitIds { primitive: 0, object: 9, instance: 0 });
            let miss = r.render_sample(Ray::new(Vec3::ZERO, Vec3::Z), &world, &mut rng);
            assert_eq!(miss.ids, HitIds::NONE);
        }
        let r = renderer("rayDir", vec![]);
        assert_eq!(r.render_sample(forward(), &world, &mut rng).ids, HitIds::NONE);

        // A volume in front reports itself with primitive 0
        let volume = ramp_volume(vec![("id", ParamValue::UInt(4))]);
        let world = world_of(&[], &[volume], vec![]);
        let ray = Ray::new(Vec3::new(0.75, 0.5, -1.0), Vec3::Z);
        let sample = renderer("default", vec![]).render_sample(ray, &world, &mut rng);
        assert_eq!(sample.ids, HitIds { primitive: 0, object: 4, instance: 0 });
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(!committed::<Renderer>("debug", vec![("method", "nope".into())]).is_valid());
        assert!(!committed::<Renderer>("default", vec![("pixelSamples", ParamValue::Int(0))]).is_valid());
        assert!(!committed::<Renderer>("default", vec![("volumeSamplingRate", ParamValue::Float(0.0))]).is_valid());
        assert!(!committed::<Renderer>("pathtracer2", vec![]).is_valid());
        assert_eq!(renderer("scivis", vec![]).pixel_samples(), 1);
    }
}
