//! Surfaces: a geometry paired with a material.

use std::sync::Arc;

use kiln_core::{ObjectType, ParameterStore};
use kiln_math::{Aabb, Vec3, Vec4};

use super::{CommitContext, Entity, Geometry, Material, Resolved};

#[derive(Debug)]
pub struct Surface {
    geometry: Arc<Geometry>,
    /// `None` when the material is missing or invalid and the device
    /// substitutes the fallback color.
    material: Option<Arc<Material>>,
    fallback: Vec4,
    id: Option<u32>,
}

impl Surface {
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn material(&self) -> Option<&Material> {
        self.material.as_deref()
    }

    pub fn color(&self, prim: u32, uvw: Vec3) -> Vec3 {
        match &self.material {
            Some(material) => material.color_at(&self.geometry, prim, uvw),
            None => self.fallback.truncate(),
        }
    }

    /// The `id` parameter, reported in the object id channel.
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    pub fn opacity(&self) -> f32 {
        self.material.as_ref().map_or(self.fallback.w, |material| material.opacity)
    }
}

impl Entity for Surface {
    const KIND: ObjectType = ObjectType::Surface;
    const NAME: &'static str = "surface";

    type Subtype = ();

    fn parse_subtype(_name: &str) -> Option<()> {
        Some(())
    }

    fn build(
        _subtype: (),
        params: &ParameterStore,
        cx: &CommitContext<'_>,
        _previous: Option<&Self>,
    ) -> Result<Self, String> {
        let geometry = cx.entity::<Geometry>(params, "geometry")?.require("geometry")?;
        let material = match cx.entity::<Material>(params, "material")? {
            Resolved::Valid(material) => Some(material),
            Resolved::Missing if cx.config().allow_invalid_materials => None,
            Resolved::Invalid(handle) if cx.config().allow_invalid_materials => {
                cx.warn(format!("material {handle} is invalid, using the fallback color"));
                None
            }
            Resolved::Missing => return Err("missing required parameter 'material'".to_string()),
            Resolved::Invalid(handle) => {
                return Err(format!("parameter 'material' references invalid object {handle}"))
            }
        };

        Ok(Surface {
            geometry,
            material,
            fallback: cx.config().invalid_material_color(),
            id: params.get("id"),
        })
    }

    fn bounds(&self) -> Option<Aabb> {
        Some(self.geometry.bvh().bounds())
    }
}
