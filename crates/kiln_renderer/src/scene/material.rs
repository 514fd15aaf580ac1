//! Matte material.

use std::sync::Arc;

use kiln_core::{ObjectType, ParamValue, ParameterStore};
use kiln_math::Vec3;

use super::{Attribute, CommitContext, Entity, Geometry, Resolved, Sampler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialType {
    Matte,
}

/// Where a material takes its color from.
#[derive(Debug)]
pub enum MaterialColor {
    Constant(Vec3),
    Attribute(Attribute),
    Sampler(Arc<Sampler>),
}

#[derive(Debug)]
pub struct Material {
    pub color: MaterialColor,
    pub opacity: f32,
}

impl Material {
    /// Surface color at a hit on `geometry`. A constant color is tinted by
    /// the geometry color.
    pub fn color_at(&self, geometry: &Geometry, prim: u32, uvw: Vec3) -> Vec3 {
        match &self.color {
            MaterialColor::Constant(color) => *color * geometry.color(prim, uvw).truncate(),
            MaterialColor::Attribute(attribute) => geometry
                .attribute(*attribute, prim, uvw)
                .unwrap_or(super::geometry::DEFAULT_ATTRIBUTE)
                .truncate(),
            MaterialColor::Sampler(sampler) => sampler.sample(geometry, prim, uvw).truncate(),
        }
    }
}

impl Entity for Material {
    const KIND: ObjectType = ObjectType::Material;
    const NAME: &'static str = "material";

    type Subtype = MaterialType;

    fn parse_subtype(name: &str) -> Option<MaterialType> {
        (name == "matte").then_some(MaterialType::Matte)
    }

    fn build(
        _subtype: MaterialType,
        params: &ParameterStore,
        cx: &CommitContext<'_>,
        _previous: Option<&Self>,
    ) -> Result<Self, String> {
        let color = match params.value("color") {
            None => MaterialColor::Constant(Vec3::splat(0.8)),
            Some(ParamValue::Vec3(color)) => MaterialColor::Constant(*color),
            Some(ParamValue::Vec4(color)) => MaterialColor::Constant(color.truncate()),
            Some(ParamValue::String(name)) => MaterialColor::Attribute(
                Attribute::from_name(name).ok_or_else(|| format!("unknown color attribute '{name}'"))?,
            ),
            Some(ParamValue::Object(_)) => match cx.entity::<Sampler>(params, "color")? {
                Resolved::Valid(sampler) => MaterialColor::Sampler(sampler),
                Resolved::Invalid(handle) => {
                    cx.warn(format!("color sampler {handle} is invalid, using the default color"));
                    MaterialColor::Constant(Vec3::splat(0.8))
                }
                Resolved::Missing => MaterialColor::Constant(Vec3::splat(0.8)),
            },
            Some(other) => return Err(format!("unsupported 'color' type {:?}", other.data_type())),
        };

        Ok(Material { color, opacity: params.get_or("opacity", 1.0f32) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::tests::{array_param, committed, object_param};
    use kiln_core::Object;
    use kiln_math::Vec4;

    fn triangle(extra: Vec<(&str, ParamValue)>) -> Arc<Geometry> {
        let mut params = vec![("vertex.position", array_param(&[Vec3::ZERO, Vec3::X, Vec3::Y]))];
        params.extend(extra);
        committed::<Geometry>("triangle", params).current().unwrap()
    }

    #[test]
    fn test_default_color() {
        let material = committed::<Material>("matte", vec![]).current().unwrap();
        let geometry = triangle(vec![]);
        assert_eq!(material.color_at(&geometry, 0, Vec3::ZERO), Vec3::splat(0.8));
        assert_eq!(material.opacity, 1.0);
    }

    #[test]
    fn test_constant_tinted_by_geometry_color() {
        let material = committed::<Material>("matte", vec![("color", ParamValue::Vec3(Vec3::ONE))])
            .current()
            .unwrap();
        let geometry = triangle(vec![("primitive.color", array_param(&[Vec4::new(0.5, 0.25, 1.0, 1.0)]))]);
        assert_eq!(material.color_at(&geometry, 0, Vec3::ZERO), Vec3::new(0.5, 0.25, 1.0));
    }

    #[test]
    fn test_attribute_color() {
        let material = committed::<Material>("matte", vec![("color", "attribute2".into())]).current().unwrap();
        let geometry = triangle(vec![("primitive.attribute2", array_param(&[Vec3::new(0.1, 0.2, 0.3)]))]);
        let c = material.color_at(&geometry, 0, Vec3::ZERO);
        assert!((c - Vec3::new(0.1, 0.2, 0.3)).length() < 1e-6);
    }

    #[test]
    fn test_sampler_color() {
        let sampler = committed::<Sampler>("image1D", vec![("image", array_param(&[Vec3::ZERO, Vec3::X]))]);
        let material = committed::<Material>("matte", vec![("color", object_param(&sampler))]);
        assert!(material.is_valid());
        let material = material.current().unwrap();
        assert!(matches!(material.color, MaterialColor::Sampler(_)));

        let geometry = triangle(vec![("primitive.attribute0", array_param(&[1.0f32]))]);
        assert_eq!(material.color_at(&geometry, 0, Vec3::ZERO), Vec3::X);
    }

    #[test]
    fn test_bad_color_type_is_invalid() {
        let material = committed::<Material>("matte", vec![("color", ParamValue::Int(3))]);
        assert!(!material.is_valid());
    }
}
