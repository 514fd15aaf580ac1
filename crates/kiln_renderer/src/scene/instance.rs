//! Transformed placements of a group.

use std::sync::Arc;

use kiln_core::{ObjectType, ParamValue, ParameterStore};
use kiln_math::{Aabb, Mat4, Mat4Ext};

use super::{typed_values, CommitContext, Entity, Group};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceType {
    Transform,
}

/// Committed instance. More than one transform places the group several
/// times (multi-instancing).
#[derive(Debug)]
pub struct Instance {
    group: Arc<Group>,
    transforms: Vec<Mat4>,
    id: Option<u32>,
}

impl Instance {
    pub fn new(group: Arc<Group>, transforms: Vec<Mat4>, id: Option<u32>) -> Self {
        Self { group, transforms, id }
    }

    pub fn group(&self) -> &Arc<Group> {
        &self.group
    }

    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    /// User id, `None` when unset.
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    pub fn instance_bounds(&self) -> Aabb {
        let local = self.group.group_bounds();
        let mut bounds = Aabb::EMPTY;
        for xfm in &self.transforms {
            bounds.extend(&xfm.transform_aabb(&local));
        }
        bounds
    }
}

impl Entity for Instance {
    const KIND: ObjectType = ObjectType::Instance;
    const NAME: &'static str = "instance";

    type Subtype = InstanceType;

    fn parse_subtype(name: &str) -> Option<InstanceType> {
        (name == "transform").then_some(InstanceType::Transform)
    }

    fn build(
        _subtype: InstanceType,
        params: &ParameterStore,
        cx: &CommitContext<'_>,
        _previous: Option<&Self>,
    ) -> Result<Self, String> {
        let group = cx.entity::<Group>(params, "group")?.require("group")?;

        let transforms = match params.value("transform") {
            None => vec![Mat4::IDENTITY],
            Some(ParamValue::Mat4(xfm)) => vec![*xfm],
            Some(ParamValue::Object(_)) => {
                let array = cx.array(params, "transform")?.ok_or("missing 'transform' array")?;
                typed_values::<Mat4>(&array, "transform")?
            }
            Some(other) => return Err(format!("unsupported 'transform' type {:?}", other.data_type())),
        };
        if transforms.is_empty() {
            cx.warn("instance has an empty transform array and places nothing");
        }

        Ok(Instance { group, transforms, id: params.get::<u32>("id") })
    }

    fn bounds(&self) -> Option<Aabb> {
        Some(self.instance_bounds())
    }
}
