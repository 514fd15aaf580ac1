//! Type tags for objects, parameters and array elements.

use std::mem::size_of;

use glam::{Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};

/// Kind of object behind a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Array1D,
    Array2D,
    Array3D,
    Geometry,
    Material,
    Sampler,
    Light,
    SpatialField,
    Volume,
    Surface,
    Group,
    Instance,
    World,
    Camera,
    Renderer,
    Frame,
}

impl ObjectType {
    /// Commit order within one flush: lower values commit first.
    ///
    /// Every type only reads objects of strictly lower priority, so a
    /// parent always sees the newest committed state of its children.
    pub fn commit_priority(self) -> u32 {
        match self {
            ObjectType::Geometry | ObjectType::Material | ObjectType::SpatialField => 1,
            ObjectType::Surface | ObjectType::Volume => 2,
            ObjectType::Group => 3,
            ObjectType::Instance => 4,
            ObjectType::World => 5,
            ObjectType::Frame => 6,
            _ => 0,
        }
    }

    pub fn is_array(self) -> bool {
        matches!(self, ObjectType::Array1D | ObjectType::Array2D | ObjectType::Array3D)
    }
}

/// Type tag of a parameter value or array element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int32,
    UInt32,
    Float32,
    Float32Vec2,
    Float32Vec3,
    Float32Vec4,
    UInt32Vec2,
    UInt32Vec3,
    UInt32Vec4,
    Float32Mat4,
    Float32Box3,
    /// Linear 8-bit RGBA.
    UFixed8Vec4,
    /// 8-bit RGBA with sRGB-encoded color components.
    UFixed8RgbaSrgb,
    String,
    /// A parameter whose value is itself a type tag (frame channel formats).
    DataType,
    FrameCallback,
    Object(ObjectType),
}

impl DataType {
    /// Size in bytes of one array element of this type, `None` for types
    /// that cannot be stored in a numeric array.
    pub fn element_size(self) -> Option<usize> {
        let size = match self {
            DataType::Int32 => size_of::<i32>(),
            DataType::UInt32 => size_of::<u32>(),
            DataType::Float32 => size_of::<f32>(),
            DataType::Float32Vec2 => size_of::<Vec2>(),
            DataType::Float32Vec3 => size_of::<Vec3>(),
            DataType::Float32Vec4 => size_of::<Vec4>(),
            DataType::UInt32Vec2 => size_of::<UVec2>(),
            DataType::UInt32Vec3 => size_of::<UVec3>(),
            DataType::UInt32Vec4 => size_of::<UVec4>(),
            DataType::Float32Mat4 => size_of::<Mat4>(),
            DataType::UFixed8Vec4 | DataType::UFixed8RgbaSrgb => 4,
            _ => return None,
        };
        Some(size)
    }

    pub fn is_object(self) -> bool {
        matches!(self, DataType::Object(_))
    }
}
