//! Image samplers over 1D, 2D and 3D textures.

use kiln_core::{ObjectType, ParameterStore};
use kiln_math::{Mat4, Vec3, Vec4};

use super::geometry::DEFAULT_ATTRIBUTE;
use super::{Attribute, CommitContext, Entity, Geometry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerType {
    Image1D,
    Image2D,
    Image3D,
}

impl SamplerType {
    /// Texture axes the sampler interpolates over.
    pub fn axes(self) -> usize {
        match self {
            SamplerType::Image1D => 1,
            SamplerType::Image2D => 2,
            SamplerType::Image3D => 3,
        }
    }

    fn array_type(self) -> ObjectType {
        match self {
            SamplerType::Image1D => ObjectType::Array1D,
            SamplerType::Image2D => ObjectType::Array2D,
            SamplerType::Image3D => ObjectType::Array3D,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
    MirrorRepeat,
}

impl WrapMode {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "clampToEdge" => Some(WrapMode::ClampToEdge),
            "repeat" => Some(WrapMode::Repeat),
            "mirrorRepeat" => Some(WrapMode::MirrorRepeat),
            _ => None,
        }
    }

    /// Map any texel index into `0..len`.
    pub fn apply(self, i: i64, len: usize) -> usize {
        let n = len as i64;
        let wrapped = match self {
            WrapMode::ClampToEdge => i.clamp(0, n - 1),
            WrapMode::Repeat => i.rem_euclid(n),
            WrapMode::MirrorRepeat => {
                let m = i.rem_euclid(2 * n);
                if m >= n {
                    2 * n - 1 - m
                } else {
                    m
                }
            }
        };
        wrapped as usize
    }
}

/// Texel index at or below `position` and the fraction past it.
///
/// NaN maps to texel 0. Positions beyond the `i32` range are clamped to it,
/// where an `f32` has no fractional part left.
fn texel_split(position: f32) -> (i64, f32) {
    if position.is_nan() {
        return (0, 0.0);
    }
    let position = position.clamp(i32::MIN as f32, i32::MAX as f32);
    let lower = position.floor();
    (lower as i64, position - lower)
}

/// Committed sampler: looks an attribute up in a texture.
#[derive(Debug)]
pub struct Sampler {
    subtype: SamplerType,
    image: Vec<Vec4>,
    /// Texels along x, y and z; unused axes are 1.
    dims: [usize; 3],
    in_attribute: Attribute,
    filter: Filter,
    /// Per axis, from `wrapMode1` to `wrapMode3`.
    wrap: [WrapMode; 3],
    in_transform: Mat4,
    out_transform: Mat4,
}

impl Sampler {
    pub fn subtype(&self) -> SamplerType {
        self.subtype
    }

    /// Sample at the given hit on `geometry`.
    pub fn sample(&self, geometry: &Geometry, prim: u32, uvw: Vec3) -> Vec4 {
        let value = geometry.attribute(self.in_attribute, prim, uvw).unwrap_or(DEFAULT_ATTRIBUTE);
        let coord = self.in_transform * value;
        self.out_transform * self.lookup(coord)
    }

    fn texel(&self, [x, y, z]: [usize; 3]) -> Vec4 {
        self.image[x + self.dims[0] * (y + self.dims[1] * z)]
    }

    /// Filtered lookup at normalized coordinates; only the first
    /// `subtype.axes()` components are read.
    fn lookup(&self, coord: Vec4) -> Vec4 {
        let axes = self.subtype.axes();
        let mut lower = [0usize; 3];
        let mut upper = [0usize; 3];
        let mut frac = [0.0f32; 3];
        for axis in 0..axes {
            let n = self.dims[axis];
            let (i, f) = texel_split(coord[axis] * (n - 1) as f32);
            lower[axis] = self.wrap[axis].apply(i, n);
            upper[axis] = self.wrap[axis].apply(i.saturating_add(1), n);
            frac[axis] = match self.filter {
                Filter::Linear => f,
                Filter::Nearest if f < 0.5 => 0.0,
                Filter::Nearest => 1.0,
            };
        }

        let mut result = Vec4::ZERO;
        for corner in 0..1usize << axes {
            let mut index = [0usize; 3];
            let mut weight = 1.0;
            for axis in 0..axes {
                let high = (corner >> axis) & 1 == 1;
                index[axis] = if high { upper[axis] } else { lower[axis] };
                weight *= if high { frac[axis] } else { 1.0 - frac[axis] };
            }
            if weight != 0.0 {
                result += self.texel(index) * weight;
            }
        }
        result
    }
}

impl Entity for Sampler {
    const KIND: ObjectType = ObjectType::Sampler;
    const NAME: &'static str = "sampler";

    type Subtype = SamplerType;

    fn parse_subtype(name: &str) -> Option<SamplerType> {
        match name {
            "image1D" => Some(SamplerType::Image1D),
            "image2D" => Some(SamplerType::Image2D),
            "image3D" => Some(SamplerType::Image3D),
            _ => None,
        }
    }

    fn build(
        subtype: SamplerType,
        params: &ParameterStore,
        cx: &CommitContext<'_>,
        _previous: Option<&Self>,
    ) -> Result<Self, String> {
        let array = cx.array(params, "image")?.ok_or("missing required parameter 'image'")?;
        if array.shape().object_type() != subtype.array_type() {
            return Err(format!("'image' must be an {:?}, found {:?}", subtype.array_type(), array.shape().object_type()));
        }
        let image = array
            .read_vec4()
            .ok_or_else(|| format!("'image' has unsupported element type {:?}", array.element_type()))?;
        if image.is_empty() {
            return Err("'image' is empty".to_string());
        }

        let in_name = params.get_str("inAttribute").unwrap_or("attribute0");
        let in_attribute =
            Attribute::from_name(in_name).ok_or_else(|| format!("unknown inAttribute '{in_name}'"))?;
        let filter = match params.get_str("filter") {
            Some("nearest") => Filter::Nearest,
            _ => Filter::Linear,
        };
        let mut wrap = [WrapMode::ClampToEdge; 3];
        for (axis, mode) in wrap.iter_mut().enumerate().take(subtype.axes()) {
            let name = format!("wrapMode{}", axis + 1);
            let value = params.get_str(&name).unwrap_or("clampToEdge");
            *mode = WrapMode::from_name(value).ok_or_else(|| format!("unknown {name} '{value}'"))?;
        }

        Ok(Sampler {
            subtype,
            image,
            dims: array.shape().dims(),
            in_attribute,
            filter,
            wrap,
            in_transform: params.get_or("inTransform", Mat4::IDENTITY),
            out_transform: params.get_or("outTransform", Mat4::IDENTITY),
        })
    }
}
