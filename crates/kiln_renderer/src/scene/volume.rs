//! Transfer-function volume over a spatial field.

use std::sync::Arc;

use kiln_core::{ObjectType, ParameterStore};
use kiln_math::{Aabb, Interval, Ray, Vec2, Vec3};

use super::{typed_values, CommitContext, Entity, SpatialField};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeType {
    TransferFunction1D,
}

#[derive(Debug)]
pub struct Volume {
    field: Arc<SpatialField>,
    value_range: Interval,
    colors: Vec<Vec3>,
    opacities: Vec<f32>,
    density_scale: f32,
    id: Option<u32>,
}

/// Linear lookup in a table indexed over `[0, 1]`.
fn sample_linear<T>(table: &[T], x: f32, lerp: impl Fn(T, T, f32) -> T) -> T
where
    T: Copy,
{
    let last = table.len() - 1;
    let position = x * last as f32;
    let lower = (position.floor() as usize).min(last);
    let upper = (lower + 1).min(last);
    lerp(table[lower], table[upper], position - lower as f32)
}

impl Volume {
    pub fn field(&self) -> &SpatialField {
        &self.field
    }

    pub fn id(&self) -> Option<u32> {
        self.id
    }

    pub fn volume_bounds(&self) -> Aabb {
        self.field.field_bounds()
    }

    /// Part of `ray` inside the volume bounds.
    pub fn intersect(&self, ray: &Ray) -> Option<Interval> {
        self.volume_bounds().slab(ray, ray.t)
    }

    /// Color and opacity at `p`, `None` where the field is undefined.
    pub fn sample(&self, p: Vec3) -> Option<(Vec3, f32)> {
        let value = self.field.sample(p);
        if value.is_nan() {
            return None;
        }
        let x = self.value_range.normalize(value);
        let color = sample_linear(&self.colors, x, |a, b, t| a.lerp(b, t));
        let opacity = sample_linear(&self.opacities, x, |a, b, t| a + t * (b - a));
        Some((color, opacity * self.density_scale))
    }
}

impl Entity for Volume {
    const KIND: ObjectType = ObjectType::Volume;
    const NAME: &'static str = "volume";

    type Subtype = VolumeType;

    fn parse_subtype(name: &str) -> Option<VolumeType> {
        match name {
            "transferFunction1D" | "scivis" | "density" => Some(VolumeType::TransferFunction1D),
            _ => None,
        }
    }

    fn build(
        _subtype: VolumeType,
        params: &ParameterStore,
        cx: &CommitContext<'_>,
        _previous: Option<&Self>,
    ) -> Result<Self, String> {
        let field = cx.entity::<SpatialField>(params, "field")?.require("field")?;

        let color = cx.array(params, "color")?.ok_or("missing required parameter 'color'")?;
        let colors: Vec<Vec3> = color
            .read_vec4()
            .ok_or_else(|| format!("'color' has unsupported element type {:?}", color.element_type()))?
            .into_iter()
            .map(|c| c.truncate())
            .collect();
        let opacity = cx.array(params, "opacity")?.ok_or("missing required parameter 'opacity'")?;
        let opacities: Vec<f32> = typed_values(&opacity, "opacity")?;
        if colors.is_empty() || opacities.is_empty() {
            return Err("transfer function tables must not be empty".to_string());
        }

        let range = params.get_or("valueRange", Vec2::new(0.0, 1.0));
        Ok(Volume {
            field,
            value_range: Interval::new(range.x, range.y),
            colors,
            opacities,
            density_scale: params.get_or("densityScale", 1.0f32),
            id: params.get("id"),
        })
    }

    fn bounds(&self) -> Option<Aabb> {
        Some(self.volume_bounds())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scene::tests::{array_param, committed, object_param};
    use crate::scene::SceneObject;
    use kiln_core::{Array, ArrayDesc, ArraySource, DataType, HostBuffer, Object, ParamValue};

    /// 2x2x2 field over the unit cube whose value equals x.
    pub(crate) fn ramp_field() -> Arc<SceneObject<SpatialField>> {
        let values = [0.0f32, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let desc = ArrayDesc::new_3d(DataType::Float32, 2, 2, 2);
        let data = Array::new(desc, ArraySource::Shared(HostBuffer::from_slice(&values))).unwrap();
        committed::<SpatialField>("structuredRegular", vec![("data", object_param(&data))])
    }

    pub(crate) fn ramp_volume(extra: Vec<(&str, ParamValue)>) -> Arc<SceneObject<Volume>> {
        let mut params = vec![
            ("field", object_param(&ramp_field())),
            ("color", array_param(&[Vec3::ZERO, Vec3::ONE])),
            ("opacity", array_param(&[0.0f32, 1.0])),
        ];
        params.extend(extra);
        committed::<Volume>("transferFunction1D", params)
    }

    #[test]
    fn test_transfer_function_lookup() {
        let volume = ramp_volume(vec![]).current().unwrap();
        let (color, opacity) = volume.sample(Vec3::new(0.5, 0.5, 0.5)).unwrap();
        assert!((color - Vec3::splat(0.5)).length() < 1e-6);
        assert!((opacity - 0.5).abs() < 1e-6);
        assert!(volume.sample(Vec3::new(2.0, 0.5, 0.5)).is_none());
    }

    #[test]
    fn test_value_range_clamps() {
        let volume = ramp_volume(vec![("valueRange", ParamValue::Vec2(Vec2::new(0.0, 0.5)))]).current().unwrap();
        let (_, below) = volume.sample(Vec3::new(0.25, 0.0, 0.0)).unwrap();
        let (_, above) = volume.sample(Vec3::new(0.75, 0.0, 0.0)).unwrap();
        assert!((below - 0.5).abs() < 1e-6);
        assert_eq!(above, 1.0);
    }

    #[test]
    fn test_density_scale() {
        let volume = ramp_volume(vec![("densityScale", ParamValue::Float(2.0))]).current().unwrap();
        let (_, opacity) = volume.sample(Vec3::new(0.5, 0.0, 0.0)).unwrap();
        assert!((opacity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_intersect_interval() {
        let volume = ramp_volume(vec![]).current().unwrap();
        let ray = Ray::new(Vec3::new(0.5, 0.5, -2.0), Vec3::Z);
        let t = volume.intersect(&ray).unwrap();
        assert!((t.min - 2.0).abs() < 1e-5 && (t.max - 3.0).abs() < 1e-5);
        assert!(volume.intersect(&Ray::new(Vec3::new(5.0, 0.5, -2.0), Vec3::Z)).is_none());
    }

    #[test]
    fn test_aliases_and_required_params() {
        assert!(ramp_volume(vec![]).is_valid());
        assert_eq!(Volume::parse_subtype("scivis"), Some(VolumeType::TransferFunction1D));
        assert_eq!(Volume::parse_subtype("density"), Some(VolumeType::TransferFunction1D));
        let missing = committed::<Volume>("density", vec![("field", object_param(&ramp_field()))]);
        assert!(!missing.is_valid());
    }
}
