//! Type-tagged parameter values and the per-object parameter store.

use std::fmt;
use std::sync::Arc;

use glam::{Mat4, UVec2, UVec3, Vec2, Vec3, Vec4};
use kiln_math::Aabb;

use crate::object::{ObjectHandle, ObjectRef};
use crate::types::DataType;

/// Callback invoked with the frame's handle when a render completes.
///
/// It runs on the frame's render thread before the frame reports ready,
/// so it must not wait on or map that same frame.
#[derive(Clone)]
pub struct FrameCallback(pub Arc<dyn Fn(ObjectHandle) + Send + Sync>);

impl FrameCallback {
    pub fn new(f: impl Fn(ObjectHandle) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, frame: ObjectHandle) {
        (self.0)(frame)
    }
}

impl fmt::Debug for FrameCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FrameCallback")
    }
}

/// A parameter value together with its type.
#[derive(Debug, Clone)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    UVec2(UVec2),
    UVec3(UVec3),
    Mat4(Mat4),
    Box3(Aabb),
    String(String),
    DataType(DataType),
    Object(ObjectRef),
    FrameCallback(FrameCallback),
}

impl ParamValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ParamValue::Bool(_) => DataType::Bool,
            ParamValue::Int(_) => DataType::Int32,
            ParamValue::UInt(_) => DataType::UInt32,
            ParamValue::Float(_) => DataType::Float32,
            ParamValue::Vec2(_) => DataType::Float32Vec2,
            ParamValue::Vec3(_) => DataType::Float32Vec3,
            ParamValue::Vec4(_) => DataType::Float32Vec4,
            ParamValue::UVec2(_) => DataType::UInt32Vec2,
            ParamValue::UVec3(_) => DataType::UInt32Vec3,
            ParamValue::Mat4(_) => DataType::Float32Mat4,
            ParamValue::Box3(_) => DataType::Float32Box3,
            ParamValue::String(_) => DataType::String,
            ParamValue::DataType(_) => DataType::DataType,
            ParamValue::Object(object) => DataType::Object(object.kind()),
            ParamValue::FrameCallback(_) => DataType::FrameCallback,
        }
    }
}

macro_rules! param_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::$variant(value)
                }
            }

            impl FromParam for $ty {
                fn from_param(value: &ParamValue) -> Option<Self> {
                    match value {
                        ParamValue::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

/// Extraction of a typed value from a [`ParamValue`]. Types must match
/// exactly; no numeric conversion is attempted.
pub trait FromParam: Sized {
    fn from_param(value: &ParamValue) -> Option<Self>;
}

param_conversions! {
    bool => Bool,
    i32 => Int,
    u32 => UInt,
    f32 => Float,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    UVec2 => UVec2,
    UVec3 => UVec3,
    Mat4 => Mat4,
    Aabb => Box3,
    String => String,
    DataType => DataType,
    ObjectRef => Object,
    FrameCallback => FrameCallback,
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

/// Ordered list of named parameters, unique by name.
///
/// Object values are stored as [`ObjectRef`]s, so every object referenced
/// from a store holds an internal reference for as long as it stays there.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterStore {
    /// Set `name`, replacing an existing value in place.
    pub fn set(&mut self, name: &str, value: ParamValue) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn param_type(&self, name: &str) -> Option<DataType> {
        self.value(name).map(ParamValue::data_type)
    }

    /// Typed lookup; `None` if the parameter is missing or of another type.
    pub fn get<T: FromParam>(&self, name: &str) -> Option<T> {
        self.value(name).and_then(T::from_param)
    }

    pub fn get_or<T: FromParam>(&self, name: &str, default: T) -> T {
        self.get(name).unwrap_or(default)
    }

    pub fn get_object(&self, name: &str) -> Option<ObjectRef> {
        self.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.value(name) {
            Some(ParamValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::tests::Dummy;
    use crate::object::Object;
    use crate::types::ObjectType;

    #[test]
    fn test_set_replaces_in_place() {
        let mut store = ParameterStore::default();
        store.set("radius", 0.5f32.into());
        store.set("color", Vec3::ONE.into());
        store.set("radius", 2.0f32.into());

        let names: Vec<_> = store.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["radius", "color"]);
        assert_eq!(store.get::<f32>("radius"), Some(2.0));
    }

    #[test]
    fn test_typed_lookup_is_exact() {
        let mut store = ParameterStore::default();
        store.set("pixelSamples", ParamValue::Int(4));

        assert_eq!(store.get::<i32>("pixelSamples"), Some(4));
        assert_eq!(store.get::<u32>("pixelSamples"), None);
        assert_eq!(store.get_or::<f32>("pixelSamples", 1.0), 1.0);
        assert_eq!(store.param_type("pixelSamples"), Some(DataType::Int32));
        assert_eq!(store.param_type("missing"), None);
    }

    #[test]
    fn test_strings_and_types() {
        let mut store = ParameterStore::default();
        store.set("method", "primID".into());
        store.set("channel.color", DataType::Float32Vec4.into());

        assert_eq!(store.get_str("method"), Some("primID"));
        assert_eq!(store.get::<DataType>("channel.color"), Some(DataType::Float32Vec4));
        assert_eq!(store.get_str("channel.color"), None);
    }

    #[test]
    fn test_remove() {
        let mut store = ParameterStore::default();
        store.set("a", true.into());
        assert!(store.remove("a").is_some());
        assert!(store.remove("a").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_object_value_holds_internal_reference() {
        let geometry = Dummy::new(ObjectType::Geometry);
        let object: Arc<dyn Object> = geometry.clone();

        let mut store = ParameterStore::default();
        store.set("geometry", ObjectRef::new(object).into());
        assert_eq!(geometry.core().internal_refs(), 1);
        assert_eq!(
            store.param_type("geometry"),
            Some(DataType::Object(ObjectType::Geometry))
        );

        let fetched = store.get_object("geometry");
        assert_eq!(geometry.core().internal_refs(), 2);
        drop(fetched);

        store.remove("geometry");
        assert_eq!(geometry.core().internal_refs(), 0);
    }
}
