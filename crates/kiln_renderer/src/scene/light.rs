//! Directional light.

use kiln_core::{ObjectType, ParameterStore};
use kiln_math::Vec3;

use super::{CommitContext, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Directional,
}

#[derive(Debug, Clone, Copy)]
pub struct Light {
    /// Direction the light travels in, normalized.
    pub direction: Vec3,
    pub color: Vec3,
    pub irradiance: f32,
}

impl Light {
    /// Radiance scale reaching a surface with normal `n`.
    pub fn incident(&self, n: Vec3) -> Vec3 {
        self.color * self.irradiance * n.dot(-self.direction).max(0.0)
    }
}

impl Entity for Light {
    const KIND: ObjectType = ObjectType::Light;
    const NAME: &'static str = "light";

    type Subtype = LightType;

    fn parse_subtype(name: &str) -> Option<LightType> {
        (name == "directional").then_some(LightType::Directional)
    }

    fn build(
        _subtype: LightType,
        params: &ParameterStore,
        _cx: &CommitContext<'_>,
        _previous: Option<&Self>,
    ) -> Result<Self, String> {
        let direction = params.get_or("direction", Vec3::new(0.0, 0.0, -1.0));
        let direction = direction
            .try_normalize()
            .ok_or_else(|| format!("'direction' {direction} cannot be normalized"))?;
        Ok(Light {
            direction,
            color: params.get_or("color", Vec3::ONE),
            irradiance: params.get_or("irradiance", 1.0f32),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::tests::committed;
    use kiln_core::{Object, ParamValue};

    #[test]
    fn test_defaults() {
        let light = committed::<Light>("directional", vec![]).current().unwrap();
        assert_eq!(light.direction, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(light.incident(Vec3::Z), Vec3::ONE);
        assert_eq!(light.incident(-Vec3::Z), Vec3::ZERO);
    }

    #[test]
    fn test_zero_direction_is_invalid() {
        let light = committed::<Light>("directional", vec![("direction", ParamValue::Vec3(Vec3::ZERO))]);
        assert!(!light.is_valid());
    }

    #[test]
    fn test_point_light_unsupported() {
        assert!(!committed::<Light>("point", vec![]).is_valid());
    }
}
