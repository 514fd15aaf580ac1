//! Sphere, triangle, quad, cylinder and cone geometry.
//!
//! Each geometry owns a BVH over its primitives, built at commit time.
//! Quads are intersected as two triangles; cylinders and cones are open
//! tubes without caps.

use kiln_core::{Array, ObjectType, ParameterStore};
use kiln_math::{Aabb, Ray, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};

use super::{typed_values, CommitContext, Entity};
use crate::bvh::{traverse, Bvh, HitDistance, TraversalMode};

/// Value of an attribute nobody supplied.
pub const DEFAULT_ATTRIBUTE: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

/// Per-vertex or per-primitive attribute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Attribute0,
    Attribute1,
    Attribute2,
    Attribute3,
    Color,
}

impl Attribute {
    pub const ALL: [Attribute; 5] = [
        Attribute::Attribute0,
        Attribute::Attribute1,
        Attribute::Attribute2,
        Attribute::Attribute3,
        Attribute::Color,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Attribute::Attribute0 => "attribute0",
            Attribute::Attribute1 => "attribute1",
            Attribute::Attribute2 => "attribute2",
            Attribute::Attribute3 => "attribute3",
            Attribute::Color => "color",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Sphere,
    Triangle,
    Quad,
    Cylinder,
    Cone,
}

#[derive(Debug)]
pub enum Shape {
    Spheres {
        centers: Vec<Vec3>,
        radii: Vec<f32>,
        /// Vertex each sphere was taken from, when `primitive.index` is set.
        vertex_index: Option<Vec<u32>>,
    },
    Triangles {
        positions: Vec<Vec3>,
        indices: Vec<UVec3>,
    },
    Quads {
        positions: Vec<Vec3>,
        indices: Vec<UVec4>,
    },
    /// Cylinders and cones: a tube between two vertices.
    Curves {
        positions: Vec<Vec3>,
        indices: Vec<UVec2>,
        /// Radius at the first and second vertex.
        radii: Vec<Vec2>,
    },
}

impl Shape {
    pub fn primitive_count(&self) -> usize {
        match self {
            Shape::Spheres { centers, .. } => centers.len(),
            Shape::Triangles { indices, .. } => indices.len(),
            Shape::Quads { indices, .. } => indices.len(),
            Shape::Curves { indices, .. } => indices.len(),
        }
    }

    fn primitive_bounds(&self) -> Vec<Aabb> {
        match self {
            Shape::Spheres { centers, radii, .. } => centers
                .iter()
                .zip(radii)
                .map(|(&c, &r)| Aabb::from_points(c - Vec3::splat(r), c + Vec3::splat(r)))
                .collect(),
            Shape::Triangles { positions, indices } => indices
                .iter()
                .map(|i| point_bounds(positions, &i.to_array()))
                .collect(),
            Shape::Quads { positions, indices } => indices
                .iter()
                .map(|i| point_bounds(positions, &i.to_array()))
                .collect(),
            Shape::Curves { positions, indices, radii } => indices
                .iter()
                .zip(radii)
                .map(|(i, r)| {
                    let (a, b) = (positions[i.x as usize], positions[i.y as usize]);
                    let lower = (a - Vec3::splat(r.x)).min(b - Vec3::splat(r.y));
                    let upper = (a + Vec3::splat(r.x)).max(b + Vec3::splat(r.y));
                    Aabb::from_points(lower, upper)
                })
                .collect(),
        }
    }
}

fn point_bounds(positions: &[Vec3], indices: &[u32]) -> Aabb {
    let mut bounds = Aabb::EMPTY;
    for &i in indices {
        bounds.extend_point(positions[i as usize]);
    }
    bounds
}

/// Hit against one geometry, in the geometry's own space.
#[derive(Debug, Clone, Copy)]
pub struct GeometryHit {
    pub t: f32,
    pub prim_id: u32,
    pub normal: Vec3,
    pub uvw: Vec3,
}

impl HitDistance for GeometryHit {
    fn t_entry(&self) -> f32 {
        self.t
    }
}

/// Committed geometry.
#[derive(Debug)]
pub struct Geometry {
    shape: Shape,
    vertex_attributes: [Option<Vec<Vec4>>; 5],
    primitive_attributes: [Option<Vec<Vec4>>; 5],
    bvh: Bvh,
}

impl Geometry {
    pub fn new(shape: Shape) -> Self {
        let bvh = Bvh::build(&shape.primitive_bounds());
        Self { shape, vertex_attributes: Default::default(), primitive_attributes: Default::default(), bvh }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn primitive_count(&self) -> usize {
        self.shape.primitive_count()
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// Nearest hit inside `ray.t`.
    pub fn intersect(&self, ray: &Ray) -> Option<GeometryHit> {
        traverse(&self.bvh, *ray, TraversalMode::Closest, |r, prim| self.intersect_primitive(r, prim))
    }

    /// Whether anything lies inside `ray.t`.
    pub fn occluded(&self, ray: &Ray) -> bool {
        traverse(&self.bvh, *ray, TraversalMode::Any, |r, prim| self.intersect_primitive(r, prim)).is_some()
    }

    fn intersect_primitive(&self, ray: &Ray, prim: u32) -> Option<GeometryHit> {
        match &self.shape {
            Shape::Spheres { centers, radii, .. } => {
                intersect_sphere(ray, centers[prim as usize], radii[prim as usize]).map(|(t, normal)| GeometryHit {
                    t,
                    prim_id: prim,
                    normal,
                    uvw: Vec3::ZERO,
                })
            }
            Shape::Triangles { positions, indices } => {
                let i = indices[prim as usize];
                let p = [positions[i.x as usize], positions[i.y as usize], positions[i.z as usize]];
                intersect_triangle(ray, p).map(|(t, normal, uvw)| GeometryHit { t, prim_id: prim, normal, uvw })
            }
            Shape::Quads { positions, indices } => {
                let p = indices[prim as usize].to_array().map(|i| positions[i as usize]);
                intersect_quad(ray, p).map(|(t, normal, uvw)| GeometryHit { t, prim_id: prim, normal, uvw })
            }
            Shape::Curves { positions, indices, radii } => {
                let i = indices[prim as usize];
                let ends = [positions[i.x as usize], positions[i.y as usize]];
                intersect_tube(ray, ends, radii[prim as usize]).map(|(t, normal, s)| GeometryHit {
                    t,
                    prim_id: prim,
                    normal,
                    uvw: Vec3::new(s, 0.0, 0.0),
                })
            }
        }
    }

    /// Attribute value at a hit. Vertex data wins over primitive data.
    pub fn attribute(&self, attribute: Attribute, prim: u32, uvw: Vec3) -> Option<Vec4> {
        let slot = attribute.index();
        if let Some(values) = &self.vertex_attributes[slot] {
            let read = |i: u32| values.get(i as usize).copied().unwrap_or(DEFAULT_ATTRIBUTE);
            return Some(match &self.shape {
                Shape::Spheres { vertex_index, .. } => {
                    let vertex = vertex_index.as_ref().map_or(prim, |index| index[prim as usize]);
                    read(vertex)
                }
                Shape::Triangles { indices, .. } => {
                    let i = indices[prim as usize];
                    read(i.x) * uvw.z + read(i.y) * uvw.x + read(i.z) * uvw.y
                }
                Shape::Quads { indices, .. } => {
                    let i = indices[prim as usize];
                    let (u, v) = (uvw.x, uvw.y);
                    read(i.x) * ((1.0 - u) * (1.0 - v))
                        + read(i.y) * (u * (1.0 - v))
                        + read(i.z) * (u * v)
                        + read(i.w) * ((1.0 - u) * v)
                }
                Shape::Curves { indices, .. } => {
                    let i = indices[prim as usize];
                    read(i.x).lerp(read(i.y), uvw.x)
                }
            });
        }
        self.primitive_attributes[slot]
            .as_ref()
            .map(|values| values.get(prim as usize).copied().unwrap_or(DEFAULT_ATTRIBUTE))
    }

    /// `vertex.color`, else `primitive.color`, else white.
    pub fn color(&self, prim: u32, uvw: Vec3) -> Vec4 {
        self.attribute(Attribute::Color, prim, uvw).unwrap_or(Vec4::ONE)
    }
}

/// Ray/sphere test. Returns the distance and the unnormalized outward normal.
fn intersect_sphere(ray: &Ray, center: Vec3, radius: f32) -> Option<(f32, Vec3)> {
    let oc = ray.origin - center;
    let a = ray.direction.dot(ray.direction);
    let b = 2.0 * ray.direction.dot(oc);
    let c = oc.dot(oc) - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }

    let root = disc.sqrt();
    let t0 = (-b - root) / (2.0 * a);
    let t1 = (-b + root) / (2.0 * a);
    let lo = ray.t.min;
    let t = (if t0 > lo { t0 } else { t1 }).min(if t1 > lo { t1 } else { t0 });
    if !ray.t.surrounds(t) {
        return None;
    }
    Some((t, ray.at(t) - center))
}

/// Ray/triangle test. Returns the distance, the winding-order normal and the
/// barycentrics `(u, v, w)` weighting the second, third and first vertex.
fn intersect_triangle(ray: &Ray, p: [Vec3; 3]) -> Option<(f32, Vec3, Vec3)> {
    let e1 = p[0] - p[1];
    let e2 = p[2] - p[0];
    let n = e1.cross(e2);

    let c = p[0] - ray.origin;
    let r = ray.direction.cross(c);
    let inv_det = 1.0 / n.dot(ray.direction);

    let u = r.dot(e2) * inv_det;
    let v = r.dot(e1) * inv_det;
    let w = 1.0 - u - v;
    // Written so NaN from a parallel ray fails the test
    if !(u >= 0.0 && v >= 0.0 && w >= 0.0) {
        return None;
    }

    let t = n.dot(c) * inv_det;
    if !(t >= ray.t.min && t < ray.t.max) {
        return None;
    }
    Some((t, n, Vec3::new(u, v, w)))
}

/// Ray/quad test, as triangles (p0, p1, p3) and (p2, p3, p1). Returns the
/// distance, the winding-order normal and the bilinear `(u, v)` of the hit,
/// with p0 at (0, 0) and p2 at (1, 1).
fn intersect_quad(ray: &Ray, p: [Vec3; 4]) -> Option<(f32, Vec3, Vec3)> {
    if let Some((t, n, uvw)) = intersect_triangle(ray, [p[0], p[1], p[3]]) {
        return Some((t, n, Vec3::new(uvw.x, uvw.y, 0.0)));
    }
    intersect_triangle(ray, [p[2], p[3], p[1]]).map(|(t, n, uvw)| (t, n, Vec3::new(1.0 - uvw.x, 1.0 - uvw.y, 0.0)))
}

/// Ray test against the open tube from `ends[0]` to `ends[1]`, whose radius
/// goes linearly from `radii.x` to `radii.y`. Returns the distance, the
/// unnormalized outward normal and the position `s` along the axis in
/// `[0, 1]`.
fn intersect_tube(ray: &Ray, ends: [Vec3; 2], radii: Vec2) -> Option<(f32, Vec3, f32)> {
    let ba = ends[1] - ends[0];
    let baba = ba.dot(ba);
    if baba <= 0.0 {
        return None;
    }
    let oc = ray.origin - ends[0];
    let d = ray.direction;
    let dr = radii.y - radii.x;

    // Axial position and radius along the ray: s0 + s1 t and r0 + r1 t
    let s0 = oc.dot(ba) / baba;
    let s1 = d.dot(ba) / baba;
    let r0 = radii.x + dr * s0;
    let r1 = dr * s1;

    let a = d.dot(d) - baba * s1 * s1 - r1 * r1;
    let half_b = oc.dot(d) - baba * s0 * s1 - r0 * r1;
    let c = oc.dot(oc) - baba * s0 * s0 - r0 * r0;
    if a.abs() < 1e-12 {
        return None;
    }
    let disc = half_b * half_b - a * c;
    if disc < 0.0 {
        return None;
    }

    let root = disc.sqrt();
    let (mut near, mut far) = ((-half_b - root) / a, (-half_b + root) / a);
    if near > far {
        std::mem::swap(&mut near, &mut far);
    }
    [near, far].into_iter().find_map(|t| {
        let s = s0 + s1 * t;
        let r = r0 + r1 * t;
        if !(ray.t.surrounds(t) && (0.0..=1.0).contains(&s) && r >= 0.0) {
            return None;
        }
        let w = oc + t * d;
        Some((t, w - s * ba - (r * dr / baba) * ba, s))
    })
}

fn attribute_arrays(
    params: &ParameterStore,
    cx: &CommitContext<'_>,
    prefix: &str,
) -> Result<[Option<Vec<Vec4>>; 5], String> {
    let mut slots: [Option<Vec<Vec4>>; 5] = Default::default();
    for attribute in Attribute::ALL {
        let name = format!("{prefix}.{}", attribute.name());
        if let Some(array) = cx.array(params, &name)? {
            let values = array
                .read_vec4()
                .ok_or_else(|| format!("parameter '{name}' has unsupported element type {:?}", array.element_type()))?;
            slots[attribute.index()] = Some(values);
        }
    }
    Ok(slots)
}

fn required_array(params: &ParameterStore, cx: &CommitContext<'_>, name: &str) -> Result<std::sync::Arc<Array>, String> {
    cx.array(params, name)?.ok_or_else(|| format!("missing required parameter '{name}'"))
}

fn build_spheres(params: &ParameterStore, cx: &CommitContext<'_>) -> Result<Shape, String> {
    let positions: Vec<Vec3> = typed_values(&*required_array(params, cx, "vertex.position")?, "vertex.position")?;
    let vertex_radius = match cx.array(params, "vertex.radius")? {
        Some(array) => Some(typed_values::<f32>(&array, "vertex.radius")?),
        None => None,
    };
    let radius = params.get_or("radius", 0.01f32);
    let index = match cx.array(params, "primitive.index")? {
        Some(array) => Some(typed_values::<u32>(&array, "primitive.index")?),
        None => None,
    };

    let vertices: Vec<u32> = match &index {
        Some(index) => index.clone(),
        None => (0..positions.len() as u32).collect(),
    };
    let mut centers = Vec::with_capacity(vertices.len());
    let mut radii = Vec::with_capacity(vertices.len());
    for &v in &vertices {
        let center = positions
            .get(v as usize)
            .ok_or_else(|| format!("primitive.index references vertex {v} of {}", positions.len()))?;
        centers.push(*center);
        radii.push(match &vertex_radius {
            Some(r) => *r.get(v as usize).ok_or_else(|| format!("vertex.radius has no entry for vertex {v}"))?,
            None => radius,
        });
    }

    Ok(Shape::Spheres { centers, radii, vertex_index: index })
}

fn build_triangles(params: &ParameterStore, cx: &CommitContext<'_>) -> Result<Shape, String> {
    let positions: Vec<Vec3> = typed_values(&*required_array(params, cx, "vertex.position")?, "vertex.position")?;
    let indices = match cx.array(params, "primitive.index")? {
        Some(array) => {
            let indices: Vec<UVec3> = typed_values(&array, "primitive.index")?;
            let count = positions.len() as u32;
            if let Some(bad) = indices.iter().find(|i| i.max_element() >= count) {
                return Err(format!("primitive.index {bad} out of range for {count} vertices"));
            }
            indices
        }
        None => (0..positions.len() as u32 / 3).map(|t| UVec3::new(3 * t, 3 * t + 1, 3 * t + 2)).collect(),
    };
    Ok(Shape::Triangles { positions, indices })
}

fn build_quads(params: &ParameterStore, cx: &CommitContext<'_>) -> Result<Shape, String> {
    let positions: Vec<Vec3> = typed_values(&*required_array(params, cx, "vertex.position")?, "vertex.position")?;
    let indices = match cx.array(params, "primitive.index")? {
        Some(array) => {
            let indices: Vec<UVec4> = typed_values(&array, "primitive.index")?;
            let count = positions.len() as u32;
            if let Some(bad) = indices.iter().find(|i| i.max_element() >= count) {
                return Err(format!("primitive.index {bad} out of range for {count} vertices"));
            }
            indices
        }
        None => (0..positions.len() as u32 / 4).map(|q| UVec4::new(4 * q, 4 * q + 1, 4 * q + 2, 4 * q + 3)).collect(),
    };
    Ok(Shape::Quads { positions, indices })
}

/// Segment endpoints from `primitive.index`, else consecutive vertex pairs.
fn curve_indices(params: &ParameterStore, cx: &CommitContext<'_>, count: usize) -> Result<Vec<UVec2>, String> {
    let Some(array) = cx.array(params, "primitive.index")? else {
        return Ok((0..count as u32 / 2).map(|c| UVec2::new(2 * c, 2 * c + 1)).collect());
    };
    let indices: Vec<UVec2> = typed_values(&array, "primitive.index")?;
    if let Some(bad) = indices.iter().find(|i| i.max_element() as usize >= count) {
        return Err(format!("primitive.index {bad} out of range for {count} vertices"));
    }
    Ok(indices)
}

fn optional_floats(params: &ParameterStore, cx: &CommitContext<'_>, name: &str) -> Result<Option<Vec<f32>>, String> {
    match cx.array(params, name)? {
        Some(array) => Ok(Some(typed_values::<f32>(&array, name)?)),
        None => Ok(None),
    }
}

/// Cylinders take one radius per segment, cones one per vertex.
fn build_curves(subtype: GeometryType, params: &ParameterStore, cx: &CommitContext<'_>) -> Result<Shape, String> {
    let positions: Vec<Vec3> = typed_values(&*required_array(params, cx, "vertex.position")?, "vertex.position")?;
    let indices = curve_indices(params, cx, positions.len())?;
    let radius = params.get_or("radius", 1.0f32);

    let radii = if subtype == GeometryType::Cone {
        let vertex_radius = optional_floats(params, cx, "vertex.radius")?;
        let at = |v: u32| match &vertex_radius {
            Some(r) => r.get(v as usize).copied().ok_or_else(|| format!("vertex.radius has no entry for vertex {v}")),
            None => Ok(radius),
        };
        indices.iter().map(|i| Ok(Vec2::new(at(i.x)?, at(i.y)?))).collect::<Result<Vec<_>, String>>()?
    } else {
        let primitive_radius = optional_floats(params, cx, "primitive.radius")?;
        (0..indices.len())
            .map(|p| match &primitive_radius {
                Some(r) => r
                    .get(p)
                    .map(|r| Vec2::splat(*r))
                    .ok_or_else(|| format!("primitive.radius has no entry for primitive {p}")),
                None => Ok(Vec2::splat(radius)),
            })
            .collect::<Result<Vec<_>, String>>()?
    };

    Ok(Shape::Curves { positions, indices, radii })
}

impl Entity for Geometry {
    const KIND: ObjectType = ObjectType::Geometry;
    const NAME: &'static str = "geometry";

    type Subtype = GeometryType;

    fn parse_subtype(name: &str) -> Option<GeometryType> {
        match name {
            "sphere" => Some(GeometryType::Sphere),
            "triangle" => Some(GeometryType::Triangle),
            "quad" => Some(GeometryType::Quad),
            "cylinder" => Some(GeometryType::Cylinder),
            "cone" => Some(GeometryType::Cone),
            _ => None,
        }
    }

    fn build(
        subtype: GeometryType,
        params: &ParameterStore,
        cx: &CommitContext<'_>,
        _previous: Option<&Self>,
    ) -> Result<Self, String> {
        let shape = match subtype {
            GeometryType::Sphere => build_spheres(params, cx)?,
            GeometryType::Triangle => build_triangles(params, cx)?,
            GeometryType::Quad => build_quads(params, cx)?,
            GeometryType::Cylinder | GeometryType::Cone => build_curves(subtype, params, cx)?,
        };
        let mut geometry = Geometry::new(shape);
        geometry.vertex_attributes = attribute_arrays(params, cx, "vertex")?;
        geometry.primitive_attributes = attribute_arrays(params, cx, "primitive")?;
        log::debug!("{:?} geometry with {} primitives", subtype, geometry.primitive_count());
        Ok(geometry)
    }

    fn bounds(&self) -> Option<Aabb> {
        Some(self.bvh.bounds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::tests::{array_param, committed};
    use crate::scene::SceneObject;
    use approx::assert_abs_diff_eq;
    use kiln_core::{Object, ParamValue};
    use std::sync::Arc;

    fn two_triangles() -> Arc<SceneObject<Geometry>> {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        ];
        let indices = [UVec3::new(0, 1, 2), UVec3::new(3, 4, 5)];
        committed(
            "triangle",
            vec![("vertex.position", array_param(&positions)), ("primitive.index", array_param(&indices))],
        )
    }

    #[test]
    fn test_indexed_triangles_closest_hit() {
        let object = two_triangles();
        assert!(object.is_valid());
        let geometry = object.current().unwrap();

        let ray = Ray::new(Vec3::new(0.25, 0.25, -5.0), Vec3::Z);
        let hit = geometry.intersect(&ray).unwrap();
        assert_eq!(hit.prim_id, 0);
        assert_abs_diff_eq!(hit.t, 5.0, epsilon = 1e-5);
        assert_abs_diff_eq!(hit.uvw, Vec3::new(0.25, 0.25, 0.5), epsilon = 1e-6);
        assert!(geometry.occluded(&ray));

        let past = Ray::new(Vec3::new(0.75, 0.75, -5.0), Vec3::Z);
        assert!(geometry.intersect(&past).is_none());
    }

    #[test]
    fn test_unindexed_triangles() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ZERO, Vec3::X];
        let object = committed::<Geometry>("triangle", vec![("vertex.position", array_param(&positions))]);
        let geometry = object.current().unwrap();
        assert_eq!(geometry.primitive_count(), 1);
    }

    #[test]
    fn test_sphere_radius_and_index() {
        let positions = [Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)];
        let object = committed::<Geometry>(
            "sphere",
            vec![
                ("vertex.position", array_param(&positions)),
                ("primitive.index", array_param(&[1u32])),
                ("radius", ParamValue::Float(2.0)),
            ],
        );
        let geometry = object.current().unwrap();
        assert_eq!(geometry.primitive_count(), 1);

        let ray = Ray::new(Vec3::new(10.0, 0.0, 10.0), -Vec3::Z);
        let hit = geometry.intersect(&ray).unwrap();
        assert_abs_diff_eq!(hit.t, 8.0, epsilon = 1e-5);
        assert_abs_diff_eq!(hit.normal.normalize(), Vec3::Z, epsilon = 1e-5);

        let bounds = geometry.bounds().unwrap();
        assert_abs_diff_eq!(bounds.lower(), Vec3::new(8.0, -2.0, -2.0), epsilon = 1e-6);
    }

    #[test]
    fn test_ray_inside_sphere_hits_far_side() {
        let (t, _) = intersect_sphere(&Ray::new(Vec3::ZERO, Vec3::X), Vec3::ZERO, 1.0).unwrap();
        assert_abs_diff_eq!(t, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_missing_positions_is_invalid() {
        let object = committed::<Geometry>("sphere", vec![("radius", ParamValue::Float(1.0))]);
        assert!(!object.is_valid());
    }

    #[test]
    fn test_unknown_subtype_never_valid() {
        let object = committed::<Geometry>("curve", vec![("vertex.position", array_param(&[Vec3::ZERO]))]);
        assert!(!object.is_valid());
    }

    fn unit_quad(extra: Vec<(&str, ParamValue)>) -> Arc<Geometry> {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y];
        let mut params = vec![("vertex.position", array_param(&positions))];
        params.extend(extra);
        let object = committed::<Geometry>("quad", params);
        assert!(object.is_valid());
        object.current().unwrap()
    }

    #[test]
    fn test_quad_halves_share_bilinear_coordinates() {
        let geometry = unit_quad(vec![("vertex.attribute0", array_param(&[0.0f32, 1.0, 2.0, 3.0]))]);
        assert_eq!(geometry.primitive_count(), 1);

        let lower = geometry.intersect(&Ray::new(Vec3::new(0.2, 0.6, -5.0), Vec3::Z)).unwrap();
        let upper = geometry.intersect(&Ray::new(Vec3::new(0.7, 0.9, -5.0), Vec3::Z)).unwrap();
        assert_eq!((lower.prim_id, upper.prim_id), (0, 0));
        assert_abs_diff_eq!(lower.uvw, Vec3::new(0.2, 0.6, 0.0), epsilon = 1e-5);
        assert_abs_diff_eq!(upper.uvw, Vec3::new(0.7, 0.9, 0.0), epsilon = 1e-5);
        assert_abs_diff_eq!(lower.normal.normalize(), upper.normal.normalize(), epsilon = 1e-6);

        let value = geometry.attribute(Attribute::Attribute0, 0, upper.uvw).unwrap();
        assert_abs_diff_eq!(value.x, 0.07 + 1.26 + 0.81, epsilon = 1e-5);
        assert!(geometry.intersect(&Ray::new(Vec3::new(1.2, 0.5, -5.0), Vec3::Z)).is_none());
    }

    #[test]
    fn test_indexed_quads_reject_bad_index() {
        let quad = |index: UVec4| {
            committed::<Geometry>(
                "quad",
                vec![
                    ("vertex.position", array_param(&[Vec3::ZERO, Vec3::X, Vec3::ONE, Vec3::Y])),
                    ("primitive.index", array_param(&[index])),
                ],
            )
        };
        assert!(quad(UVec4::new(0, 1, 2, 3)).is_valid());
        assert!(!quad(UVec4::new(0, 1, 2, 4)).is_valid());
    }

    #[test]
    fn test_cylinder_side_hit() {
        let object = committed::<Geometry>(
            "cylinder",
            vec![
                ("vertex.position", array_param(&[Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0)])),
                ("primitive.radius", array_param(&[0.5f32])),
                ("vertex.color", array_param(&[Vec3::X, Vec3::Z])),
            ],
        );
        let geometry = object.current().unwrap();

        let hit = geometry.intersect(&Ray::new(Vec3::new(5.0, 0.0, 1.0), -Vec3::X)).unwrap();
        assert_abs_diff_eq!(hit.t, 4.5, epsilon = 1e-5);
        assert_abs_diff_eq!(hit.normal.normalize(), Vec3::X, epsilon = 1e-5);
        assert_abs_diff_eq!(hit.uvw.x, 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(geometry.color(0, hit.uvw), Vec4::new(0.5, 0.0, 0.5, 1.0), epsilon = 1e-5);

        // From inside the tube the far wall is hit
        let inside = geometry.intersect(&Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::X)).unwrap();
        assert_abs_diff_eq!(inside.t, 0.5, epsilon = 1e-5);

        // Open ends: past the caps or straight down the axis misses
        assert!(geometry.intersect(&Ray::new(Vec3::new(5.0, 0.0, 3.0), -Vec3::X)).is_none());
        assert!(geometry.intersect(&Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z)).is_none());
    }

    #[test]
    fn test_cylinder_radius_defaults() {
        let positions = [Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0), Vec3::X];
        let object = committed::<Geometry>("cylinder", vec![("vertex.position", array_param(&positions))]);
        let geometry = object.current().unwrap();
        assert_eq!(geometry.primitive_count(), 1);
        assert_abs_diff_eq!(geometry.bounds().unwrap().lower(), Vec3::new(-1.0, -1.0, -1.0), epsilon = 1e-6);

        let short = committed::<Geometry>(
            "cylinder",
            vec![
                ("vertex.position", array_param(&positions)),
                ("primitive.index", array_param(&[UVec2::new(0, 1), UVec2::new(1, 2)])),
                ("primitive.radius", array_param(&[0.5f32])),
            ],
        );
        assert!(!short.is_valid());
    }

    #[test]
    fn test_cone_tapers() {
        let object = committed::<Geometry>(
            "cone",
            vec![
                ("vertex.position", array_param(&[Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0)])),
                ("vertex.radius", array_param(&[1.0f32, 0.0])),
            ],
        );
        let geometry = object.current().unwrap();

        let hit = geometry.intersect(&Ray::new(Vec3::new(5.0, 0.0, 1.0), -Vec3::X)).unwrap();
        assert_abs_diff_eq!(hit.t, 4.5, epsilon = 1e-5);
        // The side leans toward the apex
        assert_abs_diff_eq!(hit.normal.normalize(), Vec3::new(2.0, 0.0, 1.0).normalize(), epsilon = 1e-5);

        let near_base = geometry.intersect(&Ray::new(Vec3::new(5.0, 0.0, 0.2), -Vec3::X)).unwrap();
        assert_abs_diff_eq!(near_base.t, 4.1, epsilon = 1e-4);
        assert!(geometry.intersect(&Ray::new(Vec3::new(5.0, 0.0, 1.5), Vec3::Y)).is_none());
    }

    #[test]
    fn test_color_interpolation() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let colors = [Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0)];
        let object = committed::<Geometry>(
            "triangle",
            vec![("vertex.position", array_param(&positions)), ("vertex.color", array_param(&colors))],
        );
        let geometry = object.current().unwrap();
        let c = geometry.color(0, Vec3::new(0.25, 0.25, 0.5));
        assert_abs_diff_eq!(c, Vec4::new(0.5, 0.25, 0.25, 1.0), epsilon = 1e-6);
        assert!(geometry.attribute(Attribute::Attribute0, 0, Vec3::ZERO).is_none());
    }

    #[test]
    fn test_primitive_attribute() {
        let positions = [Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0)];
        let object = committed::<Geometry>(
            "sphere",
            vec![
                ("vertex.position", array_param(&positions)),
                ("primitive.attribute1", array_param(&[0.25f32, 0.75])),
            ],
        );
        let geometry = object.current().unwrap();
        let value = geometry.attribute(Attribute::Attribute1, 1, Vec3::ZERO).unwrap();
        assert_eq!(value, Vec4::new(0.75, 0.0, 0.0, 1.0));
        assert_eq!(geometry.color(1, Vec3::ZERO), Vec4::ONE);
    }
}
