//! Structured regular scalar fields.

use kiln_core::{ArrayShape, ObjectType, ParameterStore};
use kiln_math::{Aabb, UVec3, Vec3};

use super::{typed_values, CommitContext, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    StructuredRegular,
}

/// Voxel grid with vertex-centered samples.
#[derive(Debug)]
pub struct StructuredRegular {
    data: Vec<f32>,
    dims: UVec3,
    origin: Vec3,
    spacing: Vec3,
}

impl StructuredRegular {
    pub fn new(data: Vec<f32>, dims: UVec3, origin: Vec3, spacing: Vec3) -> Self {
        Self { data, dims, origin, spacing }
    }

    fn voxel(&self, x: u32, y: u32, z: u32) -> f32 {
        let i = x as usize + self.dims.x as usize * (y as usize + self.dims.y as usize * z as usize);
        self.data[i]
    }

    /// Trilinear sample at a world position; NaN outside the grid.
    pub fn sample(&self, p: Vec3) -> f32 {
        let local = (p - self.origin) / self.spacing;
        let upper = (self.dims - UVec3::ONE).as_vec3();
        if local.cmplt(Vec3::ZERO).any() || local.cmpgt(upper).any() {
            return f32::NAN;
        }

        let i0 = local.floor().as_uvec3().min(self.dims - UVec3::ONE);
        let i1 = (i0 + UVec3::ONE).min(self.dims - UVec3::ONE);
        let f = local - i0.as_vec3();

        let lerp = |a: f32, b: f32, t: f32| a + t * (b - a);
        let c00 = lerp(self.voxel(i0.x, i0.y, i0.z), self.voxel(i1.x, i0.y, i0.z), f.x);
        let c01 = lerp(self.voxel(i0.x, i1.y, i0.z), self.voxel(i1.x, i1.y, i0.z), f.x);
        let c10 = lerp(self.voxel(i0.x, i0.y, i1.z), self.voxel(i1.x, i0.y, i1.z), f.x);
        let c11 = lerp(self.voxel(i0.x, i1.y, i1.z), self.voxel(i1.x, i1.y, i1.z), f.x);
        let c0 = lerp(c00, c01, f.y);
        let c1 = lerp(c10, c11, f.y);
        lerp(c0, c1, f.z)
    }

    pub fn bounds(&self) -> Aabb {
        let extent = (self.dims - UVec3::ONE).as_vec3() * self.spacing;
        Aabb::from_points(self.origin, self.origin + extent)
    }

    /// Ray-march step: half the finest grid spacing.
    pub fn step_size(&self) -> f32 {
        (self.spacing / 2.0).min_element()
    }
}

/// Committed spatial field.
#[derive(Debug)]
pub enum SpatialField {
    StructuredRegular(StructuredRegular),
}

impl SpatialField {
    pub fn sample(&self, p: Vec3) -> f32 {
        match self {
            SpatialField::StructuredRegular(grid) => grid.sample(p),
        }
    }

    pub fn step_size(&self) -> f32 {
        match self {
            SpatialField::StructuredRegular(grid) => grid.step_size(),
        }
    }

    pub fn field_bounds(&self) -> Aabb {
        match self {
            SpatialField::StructuredRegular(grid) => grid.bounds(),
        }
    }
}

impl Entity for SpatialField {
    const KIND: ObjectType = ObjectType::SpatialField;
    const NAME: &'static str = "spatial field";

    type Subtype = FieldType;

    fn parse_subtype(name: &str) -> Option<FieldType> {
        (name == "structuredRegular").then_some(FieldType::StructuredRegular)
    }

    fn build(
        _subtype: FieldType,
        params: &ParameterStore,
        cx: &CommitContext<'_>,
        _previous: Option<&Self>,
    ) -> Result<Self, String> {
        let array = cx.array(params, "data")?.ok_or("missing required parameter 'data'")?;
        let ArrayShape::D3(x, y, z) = array.shape() else {
            return Err("'data' must be a 3D array".to_string());
        };
        let data: Vec<f32> = typed_values(&array, "data")?;
        if x == 0 || y == 0 || z == 0 {
            return Err("'data' is empty".to_string());
        }

        let spacing = params.get_or("spacing", Vec3::ONE);
        if spacing.cmple(Vec3::ZERO).any() {
            return Err(format!("'spacing' {spacing} must be positive"));
        }
        let grid = StructuredRegular::new(
            data,
            UVec3::new(x as u32, y as u32, z as u32),
            params.get_or("origin", Vec3::ZERO),
            spacing,
        );
        Ok(SpatialField::StructuredRegular(grid))
    }

    fn bounds(&self) -> Option<Aabb> {
        Some(self.field_bounds())
    }
}
