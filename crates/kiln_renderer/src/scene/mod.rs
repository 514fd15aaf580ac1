//! Scene graph entities.
//!
//! Every entity kind is a [`SceneObject`] wrapping an immutable snapshot that
//! `commit()` rebuilds from the staged parameters. Renders clone the `Arc`
//! of the snapshots they read, so later commits never disturb a render that
//! is already running.

mod field;
mod geometry;
mod group;
mod instance;
mod light;
mod material;
mod sampler;
mod surface;
mod volume;
mod world;

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use kiln_core::{
    valid_property, Array, DataType, Object, ObjectCore, ObjectHandle, ObjectRef, ObjectType, ParamValue,
    ParameterStore, StatusReporter,
};
use kiln_math::Aabb;
use parking_lot::{Mutex, RwLock};

use crate::config::DeviceConfig;

pub use field::{SpatialField, StructuredRegular};
pub use geometry::{Attribute, Geometry, GeometryHit, Shape};
pub use group::{Group, GroupAccel};
pub use instance::Instance;
pub use light::Light;
pub use material::{Material, MaterialColor};
pub use sampler::{Filter, Sampler, SamplerType, WrapMode};
pub use surface::Surface;
pub use volume::Volume;
pub use world::World;

/// State every object of a device shares.
#[derive(Debug)]
pub struct SceneContext {
    pub config: DeviceConfig,
    pub status: StatusReporter,
}

/// A kind of scene entity and how its snapshot is built.
pub trait Entity: Sized + Send + Sync + 'static {
    const KIND: ObjectType;
    /// Name used in diagnostics.
    const NAME: &'static str;

    type Subtype: Copy + fmt::Debug + Send + Sync + 'static;

    /// `None` for subtypes this device does not implement.
    fn parse_subtype(name: &str) -> Option<Self::Subtype>;

    /// Build the committed snapshot. `Err` carries the diagnostic reported
    /// for an invalid configuration.
    fn build(
        subtype: Self::Subtype,
        params: &ParameterStore,
        cx: &CommitContext<'_>,
        previous: Option<&Self>,
    ) -> Result<Self, String>;

    fn bounds(&self) -> Option<Aabb> {
        None
    }
}

/// Outcome of looking up an object parameter.
pub enum Resolved<T> {
    Missing,
    Invalid(ObjectHandle),
    Valid(Arc<T>),
}

impl<T> Resolved<T> {
    pub fn valid(self) -> Option<Arc<T>> {
        match self {
            Resolved::Valid(value) => Some(value),
            _ => None,
        }
    }

    /// The snapshot, or the diagnostic for a missing or invalid reference.
    pub fn require(self, name: &str) -> Result<Arc<T>, String> {
        match self {
            Resolved::Valid(value) => Ok(value),
            Resolved::Missing => Err(format!("missing required parameter '{name}'")),
            Resolved::Invalid(handle) => Err(format!("parameter '{name}' references invalid object {handle}")),
        }
    }
}

/// Access to other objects while committing. Every object read through it
/// registers the committing object as an observer, so the reader recommits
/// whenever the object it read does.
pub struct CommitContext<'a> {
    parent: Weak<dyn Object>,
    handle: ObjectHandle,
    scene: &'a SceneContext,
    observed: Mutex<Vec<Weak<dyn Object>>>,
}

impl<'a> CommitContext<'a> {
    /// Handle of the object being committed.
    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.scene.config
    }

    /// Report a non-fatal problem against the committing object.
    pub fn warn(&self, message: impl AsRef<str>) {
        self.scene.status.warning(self.handle, message);
    }

    fn observe(&self, object: &ObjectRef) {
        object.core().add_observer(self.parent.clone());
        self.observed.lock().push(Arc::downgrade(object.object()));
    }

    fn snapshot<T: Entity>(&self, object: &ObjectRef, name: &str) -> Result<Resolved<T>, String> {
        if object.kind() != T::KIND {
            return Err(format!("parameter '{name}' must be a {}, found {:?}", T::NAME, object.kind()));
        }
        let entity = object
            .downcast_ref::<SceneObject<T>>()
            .ok_or_else(|| format!("parameter '{name}' holds an object of another device"))?;
        self.observe(object);
        Ok(match entity.current() {
            Some(snapshot) => Resolved::Valid(snapshot),
            None => Resolved::Invalid(object.handle()),
        })
    }

    /// Committed snapshot of the object parameter `name`.
    pub fn entity<T: Entity>(&self, params: &ParameterStore, name: &str) -> Result<Resolved<T>, String> {
        match params.value(name) {
            None => Ok(Resolved::Missing),
            Some(ParamValue::Object(object)) => self.snapshot(object, name),
            Some(other) => Err(format!("parameter '{name}' must be a {}, found {:?}", T::NAME, other.data_type())),
        }
    }

    /// The array parameter `name`.
    pub fn array(&self, params: &ParameterStore, name: &str) -> Result<Option<Arc<Array>>, String> {
        match params.value(name) {
            None => Ok(None),
            Some(ParamValue::Object(object)) if object.kind().is_array() => {
                let array = object
                    .downcast::<Array>()
                    .ok_or_else(|| format!("parameter '{name}' is not an array"))?;
                self.observe(object);
                Ok(Some(array))
            }
            Some(other) => Err(format!("parameter '{name}' must be an array, found {:?}", other.data_type())),
        }
    }

    /// Snapshots of every element of the object array `name`, or of a single
    /// object stored directly under `name`.
    pub fn entities<T: Entity>(&self, params: &ParameterStore, name: &str) -> Result<Vec<Resolved<T>>, String> {
        match params.value(name) {
            Some(ParamValue::Object(object)) if object.kind() == T::KIND => Ok(vec![self.snapshot(object, name)?]),
            Some(ParamValue::Object(_)) => {
                let Some(array) = self.array(params, name)? else {
                    return Ok(Vec::new());
                };
                let elements = array
                    .objects()
                    .ok_or_else(|| format!("parameter '{name}' must be an array of {} objects", T::NAME))?;
                elements.iter().map(|element| self.snapshot(element, name)).collect()
            }
            None => Ok(Vec::new()),
            Some(other) => Err(format!("parameter '{name}' must be an array, found {:?}", other.data_type())),
        }
    }
}

/// Device object for one entity kind.
pub struct SceneObject<T: Entity> {
    core: ObjectCore,
    scene: Arc<SceneContext>,
    subtype: Option<T::Subtype>,
    state: RwLock<Option<Arc<T>>>,
    /// Objects the last commit read.
    observed: Mutex<Vec<Weak<dyn Object>>>,
}

impl<T: Entity> SceneObject<T> {
    pub fn create(subtype: &str, scene: Arc<SceneContext>) -> Arc<Self> {
        let parsed = T::parse_subtype(subtype);
        let object = Arc::new_cyclic(|this: &Weak<Self>| SceneObject {
            core: ObjectCore::new(T::KIND, subtype, this.clone()),
            scene,
            subtype: parsed,
            state: RwLock::new(None),
            observed: Mutex::new(Vec::new()),
        });
        if parsed.is_none() {
            object
                .scene
                .status
                .warning(object.core.handle(), format!("unknown {} subtype '{subtype}'", T::NAME));
        }
        object
    }

    /// Last committed snapshot, `None` while the object is invalid.
    pub fn current(&self) -> Option<Arc<T>> {
        self.state.read().clone()
    }

    /// Stop observing objects the previous commit read and this one did not.
    fn forget_stale(&self, observed: Vec<Weak<dyn Object>>) {
        let previous = std::mem::replace(&mut *self.observed.lock(), observed);
        let current = self.observed.lock();
        let this = self.core.weak();
        for stale in previous.iter().filter(|old| !current.iter().any(|o| Weak::ptr_eq(o, *old))) {
            if let Some(object) = stale.upgrade() {
                object.core().remove_observer(&this);
            }
        }
    }
}

impl<T: Entity> Object for SceneObject<T> {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn commit(&self) {
        let Some(subtype) = self.subtype else {
            return;
        };
        let params = self.core.params().clone();
        let previous = self.current();
        let cx = CommitContext {
            parent: self.core.weak(),
            handle: self.core.handle(),
            scene: &self.scene,
            observed: Mutex::new(Vec::new()),
        };

        let next = match T::build(subtype, &params, &cx, previous.as_deref()) {
            Ok(snapshot) => Some(Arc::new(snapshot)),
            Err(message) => {
                cx.warn(format!("invalid {} ({:?}): {message}", T::NAME, subtype));
                None
            }
        };
        *self.state.write() = next;
        self.forget_stale(cx.observed.into_inner());
    }

    fn is_valid(&self) -> bool {
        self.state.read().is_some()
    }

    fn get_property(&self, name: &str, ty: DataType) -> Option<ParamValue> {
        if name == "bounds" && ty == DataType::Float32Box3 {
            return self.current().and_then(|snapshot| snapshot.bounds()).map(ParamValue::Box3);
        }
        valid_property(self.is_valid(), name, ty)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Read an array parameter as `T` elements.
pub(crate) fn typed_values<T: kiln_core::ArrayElement>(array: &Array, name: &str) -> Result<Vec<T>, String> {
    array.values::<T>().ok_or_else(|| {
        format!("parameter '{name}' must hold {:?} elements, found {:?}", T::DATA_TYPE, array.element_type())
    })
}
