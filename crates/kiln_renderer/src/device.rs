//! The device: handle table, deferred commits, worker pool and the
//! application-facing object API.

use std::collections::HashMap;
use std::sync::Arc;

use kiln_core::{
    Array, ArrayDesc, ArrayMapping, ArraySource, CommitBuffer, DataType, KilnError, KilnResult, Object,
    ObjectHandle, ObjectRef, ObjectType, ParamValue, Severity, StatusCallback, StatusReporter,
};
use parking_lot::{Mutex, RwLock};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::camera::Camera;
use crate::config::DeviceConfig;
use crate::frame::{Frame, FrameMapping};
use crate::renderer::Renderer;
use crate::scene::{
    Geometry, Group, Instance, Light, Material, Sampler, SceneContext, SceneObject, SpatialField, Surface, Volume,
    World,
};

/// Whether a query blocks on pending work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    NoWait,
    Wait,
}

/// A CPU ray tracing device.
///
/// Objects are addressed by [`ObjectHandle`]. Parameter changes are staged
/// and only take effect once the object was passed to
/// [`commit_parameters`](Device::commit_parameters) and the device reached
/// one of its synchronization points: starting a render, a property query
/// with [`WaitMode::Wait`], or mapping a frame.
pub struct Device {
    scene: Arc<SceneContext>,
    objects: RwLock<HashMap<ObjectHandle, Arc<dyn Object>>>,
    commits: CommitBuffer,
    /// Serializes flushing with render start.
    render_lock: Mutex<()>,
    pool: Arc<ThreadPool>,
}

impl Device {
    pub fn new(config: DeviceConfig) -> KilnResult<Self> {
        Self::create(config, None)
    }

    /// Device whose diagnostics are also delivered to `callback`.
    pub fn with_status_callback(config: DeviceConfig, callback: StatusCallback) -> KilnResult<Self> {
        Self::create(config, Some(callback))
    }

    fn create(config: DeviceConfig, callback: Option<StatusCallback>) -> KilnResult<Self> {
        config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .thread_name(|i| format!("kiln-worker-{i}"))
            .build()
            .map_err(|e| KilnError::Config(e.to_string()))?;
        log::info!("kiln device started with {} worker threads", pool.current_num_threads());

        Ok(Self {
            scene: Arc::new(SceneContext { config, status: StatusReporter::new(callback) }),
            objects: RwLock::new(HashMap::new()),
            commits: CommitBuffer::new(),
            render_lock: Mutex::new(()),
            pool: Arc::new(pool),
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.scene.config
    }

    fn insert(&self, object: Arc<dyn Object>) -> ObjectHandle {
        let handle = object.core().handle();
        self.objects.write().insert(handle, object);
        handle
    }

    fn object(&self, handle: ObjectHandle) -> KilnResult<Arc<dyn Object>> {
        self.objects.read().get(&handle).cloned().ok_or(KilnError::InvalidHandle(handle))
    }

    fn downcast<T: Object>(&self, handle: ObjectHandle, expected: &'static str) -> KilnResult<Arc<T>> {
        let object = self.object(handle)?;
        let actual = object.core().kind();
        object
            .into_any()
            .downcast::<T>()
            .map_err(|_| KilnError::WrongObjectType { handle, expected, actual })
    }

    fn frame(&self, handle: ObjectHandle) -> KilnResult<Arc<Frame>> {
        self.downcast::<Frame>(handle, "frame")
    }

    /// Create an object of `kind`. An unknown subtype still yields a
    /// handle, to an object that never becomes valid.
    pub fn new_object(&self, kind: ObjectType, subtype: &str) -> KilnResult<ObjectHandle> {
        let scene = self.scene.clone();
        let object: Arc<dyn Object> = match kind {
            ObjectType::Geometry => SceneObject::<Geometry>::create(subtype, scene),
            ObjectType::Material => SceneObject::<Material>::create(subtype, scene),
            ObjectType::Sampler => SceneObject::<Sampler>::create(subtype, scene),
            ObjectType::Light => SceneObject::<Light>::create(subtype, scene),
            ObjectType::SpatialField => SceneObject::<SpatialField>::create(subtype, scene),
            ObjectType::Volume => SceneObject::<Volume>::create(subtype, scene),
            ObjectType::Surface => SceneObject::<Surface>::create(subtype, scene),
            ObjectType::Group => SceneObject::<Group>::create(subtype, scene),
            ObjectType::Instance => SceneObject::<Instance>::create(subtype, scene),
            ObjectType::World => SceneObject::<World>::create(subtype, scene),
            ObjectType::Camera => SceneObject::<Camera>::create(subtype, scene),
            ObjectType::Renderer => SceneObject::<Renderer>::create(subtype, scene),
            ObjectType::Frame => Frame::create(scene, self.pool.clone()),
            ObjectType::Array1D | ObjectType::Array2D | ObjectType::Array3D => {
                return Err(KilnError::NotConstructible(kind))
            }
        };
        Ok(self.insert(object))
    }

    pub fn new_array(&self, desc: ArrayDesc, source: ArraySource) -> KilnResult<ObjectHandle> {
        let array = Array::new(desc, source).inspect_err(|e| {
            if let KilnError::Allocation(_) = e {
                self.scene.status.report(Severity::Fatal, None, e.to_string());
            }
        })?;
        Ok(self.insert(array))
    }

    /// 1D array of object references, all of `element_type`.
    pub fn new_object_array(&self, element_type: ObjectType, handles: &[ObjectHandle]) -> KilnResult<ObjectHandle> {
        let objects = handles
            .iter()
            .map(|handle| self.object(*handle).map(ObjectRef::new))
            .collect::<KilnResult<Vec<_>>>()?;
        let array: Arc<dyn Object> = Array::new_objects(element_type, objects)?;
        Ok(self.insert(array))
    }

    /// Write access to an array's memory until [`unmap_array`](Device::unmap_array).
    pub fn map_array(&self, handle: ObjectHandle) -> KilnResult<ArrayMapping> {
        self.downcast::<Array>(handle, "array")?.map()
    }

    /// Release a mapping. Objects reading the array recommit at the next
    /// flush.
    pub fn unmap_array(&self, mapping: ArrayMapping) -> KilnResult<()> {
        let object = self.object(mapping.array())?;
        drop(mapping);
        object.core().mark_updated();
        self.commits.enqueue(&object);
        Ok(())
    }

    pub fn set_parameter(&self, handle: ObjectHandle, name: &str, value: impl Into<ParamValue>) -> KilnResult<()> {
        self.object(handle)?.core().set_param(name, value.into());
        Ok(())
    }

    pub fn set_parameter_object(&self, handle: ObjectHandle, name: &str, object: ObjectHandle) -> KilnResult<()> {
        let value = ParamValue::Object(ObjectRef::new(self.object(object)?));
        self.object(handle)?.core().set_param(name, value);
        Ok(())
    }

    pub fn unset_parameter(&self, handle: ObjectHandle, name: &str) -> KilnResult<()> {
        self.object(handle)?.core().unset_param(name);
        Ok(())
    }

    /// Queue the staged parameters for the next flush.
    pub fn commit_parameters(&self, handle: ObjectHandle) -> KilnResult<()> {
        self.commits.enqueue(&self.object(handle)?);
        Ok(())
    }

    /// Commit everything queued. Returns how many objects committed.
    pub fn flush(&self) -> usize {
        let _guard = self.render_lock.lock();
        self.flush_locked()
    }

    fn flush_locked(&self) -> usize {
        let committed = self.commits.flush();
        if committed > 0 {
            log::debug!("flushed {committed} commits");
        }
        committed
    }

    /// Query a property. With [`WaitMode::Wait`] pending commits are
    /// applied first, and a frame finishes its render.
    pub fn get_property(
        &self,
        handle: ObjectHandle,
        name: &str,
        ty: DataType,
        wait: WaitMode,
    ) -> KilnResult<Option<ParamValue>> {
        let object = self.object(handle)?;
        if wait == WaitMode::Wait {
            self.flush();
            if let Some(frame) = object.as_any().downcast_ref::<Frame>() {
                frame.wait();
            }
        }
        Ok(object.get_property(name, ty))
    }

    pub fn retain(&self, handle: ObjectHandle) -> KilnResult<()> {
        self.object(handle)?.core().retain();
        Ok(())
    }

    /// Drop one public reference. The handle stops resolving once the last
    /// one is gone; the object itself lives on while the device still
    /// references it.
    pub fn release(&self, handle: ObjectHandle) -> KilnResult<()> {
        let object = self.object(handle)?;
        if object.core().release() {
            self.objects.write().remove(&handle);
            object.on_no_public_references();
            log::debug!("released {:?} {handle}", object.core().kind());
        }
        Ok(())
    }

    /// Apply pending commits and start rendering `frame` in the background.
    pub fn render_frame(&self, frame: ObjectHandle) -> KilnResult<()> {
        let frame = self.frame(frame)?;
        let _guard = self.render_lock.lock();
        self.flush_locked();
        frame.render()
    }

    pub fn frame_ready(&self, frame: ObjectHandle, wait: WaitMode) -> KilnResult<bool> {
        let frame = self.frame(frame)?;
        if wait == WaitMode::Wait {
            frame.wait();
        }
        Ok(frame.is_ready())
    }

    /// Cancel the in-flight render of `frame`.
    pub fn discard_frame(&self, frame: ObjectHandle) -> KilnResult<()> {
        self.frame(frame)?.discard();
        Ok(())
    }

    /// Copy of a frame channel (`channel.color` or `channel.depth`), taken
    /// after the in-flight render completes.
    pub fn map_frame(&self, frame: ObjectHandle, channel: &str) -> KilnResult<FrameMapping> {
        self.frame(frame)?.map(channel)
    }

    pub fn unmap_frame(&self, frame: ObjectHandle, _channel: &str) -> KilnResult<()> {
        self.frame(frame).map(|_| ())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        let remaining = self.objects.get_mut().len();
        if remaining > 0 {
            log::debug!("device dropped with {remaining} live handles");
        }
    }
}
