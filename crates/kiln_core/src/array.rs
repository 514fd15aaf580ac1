//! Typed 1D/2D/3D arrays and their memory ownership.
//!
//! Application memory is modelled as a [`HostBuffer`]: a shared, lockable
//! byte vector the caller keeps a clone of. Depending on the source an array
//! either aliases that buffer (shared), aliases it and hands it back through
//! a deleter (captured), or allocates its own (managed). When the caller
//! drops its last handle while the device still references the array, the
//! data is copied into device memory first (privatized).

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use bytemuck::Pod;
use glam::{Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};
use parking_lot::lock_api::ArcRwLockWriteGuard;
use parking_lot::{Mutex, RawRwLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{try_alloc_zeroed, KilnError, KilnResult};
use crate::object::{Object, ObjectCore, ObjectHandle, ObjectRef};
use crate::param::ParamValue;
use crate::types::{DataType, ObjectType};

/// Byte storage owned by the application (or, once privatized, the device).
#[derive(Clone, Default)]
pub struct HostBuffer(Arc<RwLock<Vec<u8>>>);

impl HostBuffer {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(Arc::new(RwLock::new(bytes)))
    }

    pub fn from_slice<T: Pod>(values: &[T]) -> Self {
        Self::from_bytes(bytemuck::cast_slice(values).to_vec())
    }

    pub fn zeroed(len: usize) -> KilnResult<Self> {
        Ok(Self::from_bytes(try_alloc_zeroed(len)?))
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.0.write()
    }

    /// Whether both handles refer to the same memory.
    pub fn ptr_eq(&self, other: &HostBuffer) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn write_arc(&self) -> ArcRwLockWriteGuard<RawRwLock, Vec<u8>> {
        self.0.write_arc()
    }
}

impl fmt::Debug for HostBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostBuffer({} bytes)", self.len())
    }
}

/// Called once when the device no longer needs captured memory.
pub type ArrayDeleter = Box<dyn FnOnce() + Send>;

/// Where the data of a new array comes from.
pub enum ArraySource {
    /// Caller-owned memory the array aliases.
    Shared(HostBuffer),
    /// Caller-owned memory plus the deleter that releases it.
    Captured(HostBuffer, ArrayDeleter),
    /// Zeroed memory allocated by the device, filled through `map`.
    Managed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Shared,
    Captured,
    Managed,
    /// Device copy of memory that used to be shared or captured.
    Privatized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayShape {
    D1(usize),
    D2(usize, usize),
    D3(usize, usize, usize),
}

impl ArrayShape {
    pub fn len(self) -> usize {
        let [x, y, z] = self.dims();
        x * y * z
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    pub fn dims(self) -> [usize; 3] {
        match self {
            ArrayShape::D1(x) => [x, 1, 1],
            ArrayShape::D2(x, y) => [x, y, 1],
            ArrayShape::D3(x, y, z) => [x, y, z],
        }
    }

    pub fn object_type(self) -> ObjectType {
        match self {
            ArrayShape::D1(_) => ObjectType::Array1D,
            ArrayShape::D2(..) => ObjectType::Array2D,
            ArrayShape::D3(..) => ObjectType::Array3D,
        }
    }
}

/// Layout of a numeric array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayDesc {
    pub element_type: DataType,
    pub shape: ArrayShape,
    /// Distance between elements in bytes; 0 means tightly packed.
    pub byte_stride: usize,
}

impl ArrayDesc {
    pub fn new_1d(element_type: DataType, len: usize) -> Self {
        Self { element_type, shape: ArrayShape::D1(len), byte_stride: 0 }
    }

    pub fn new_2d(element_type: DataType, x: usize, y: usize) -> Self {
        Self { element_type, shape: ArrayShape::D2(x, y), byte_stride: 0 }
    }

    pub fn new_3d(element_type: DataType, x: usize, y: usize, z: usize) -> Self {
        Self { element_type, shape: ArrayShape::D3(x, y, z), byte_stride: 0 }
    }

    pub fn with_byte_stride(mut self, stride: usize) -> Self {
        self.byte_stride = stride;
        self
    }
}

/// Plain-data element types arrays can be read as.
pub trait ArrayElement: Pod {
    const DATA_TYPE: DataType;
}

macro_rules! array_elements {
    ($($ty:ty => $data_type:ident),* $(,)?) => {
        $(impl ArrayElement for $ty {
            const DATA_TYPE: DataType = DataType::$data_type;
        })*
    };
}

array_elements! {
    i32 => Int32,
    u32 => UInt32,
    f32 => Float32,
    Vec2 => Float32Vec2,
    Vec3 => Float32Vec3,
    Vec4 => Float32Vec4,
    UVec2 => UInt32Vec2,
    UVec3 => UInt32Vec3,
    UVec4 => UInt32Vec4,
    Mat4 => Float32Mat4,
}

struct DataStorage {
    buffer: HostBuffer,
    ownership: Ownership,
    deleter: Option<ArrayDeleter>,
}

impl DataStorage {
    fn run_deleter(&mut self) {
        if let Some(deleter) = self.deleter.take() {
            deleter();
        }
    }
}

enum Contents {
    Data(Mutex<DataStorage>),
    Objects(Vec<ObjectRef>),
}

/// Device array object.
pub struct Array {
    core: ObjectCore,
    element_type: DataType,
    shape: ArrayShape,
    contents: Contents,
}

impl Array {
    /// Create a numeric array.
    pub fn new(desc: ArrayDesc, source: ArraySource) -> KilnResult<Arc<Array>> {
        let element_size = desc
            .element_type
            .element_size()
            .ok_or(KilnError::InvalidElementType(desc.element_type))?;
        if desc.byte_stride != 0 && desc.byte_stride != element_size {
            return Err(KilnError::UnsupportedLayout(
                "strided arrays not yet supported".to_string(),
            ));
        }

        let expected = desc.shape.len() * element_size;
        let storage = match source {
            ArraySource::Shared(buffer) => {
                check_len(&buffer, expected)?;
                DataStorage { buffer, ownership: Ownership::Shared, deleter: None }
            }
            ArraySource::Captured(buffer, deleter) => {
                check_len(&buffer, expected)?;
                DataStorage { buffer, ownership: Ownership::Captured, deleter: Some(deleter) }
            }
            ArraySource::Managed => DataStorage {
                buffer: HostBuffer::zeroed(expected)?,
                ownership: Ownership::Managed,
                deleter: None,
            },
        };

        Ok(Arc::new_cyclic(|this: &Weak<Array>| Array {
            core: ObjectCore::new(desc.shape.object_type(), "", this.clone()),
            element_type: desc.element_type,
            shape: desc.shape,
            contents: Contents::Data(Mutex::new(storage)),
        }))
    }

    /// Create a 1D array of object references. Every element must be of
    /// `element_type`.
    pub fn new_objects(element_type: ObjectType, objects: Vec<ObjectRef>) -> KilnResult<Arc<Array>> {
        if let Some(wrong) = objects.iter().find(|o| o.kind() != element_type) {
            return Err(KilnError::WrongObjectType {
                handle: wrong.handle(),
                expected: "the array element type",
                actual: wrong.kind(),
            });
        }

        let len = objects.len();
        Ok(Arc::new_cyclic(|this: &Weak<Array>| Array {
            core: ObjectCore::new(ObjectType::Array1D, "", this.clone()),
            element_type: DataType::Object(element_type),
            shape: ArrayShape::D1(len),
            contents: Contents::Objects(objects),
        }))
    }

    pub fn element_type(&self) -> DataType {
        self.element_type
    }

    pub fn shape(&self) -> ArrayShape {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.shape.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    /// `None` for object arrays.
    pub fn ownership(&self) -> Option<Ownership> {
        match &self.contents {
            Contents::Data(storage) => Some(storage.lock().ownership),
            Contents::Objects(_) => None,
        }
    }

    /// Elements of an object array.
    pub fn objects(&self) -> Option<&[ObjectRef]> {
        match &self.contents {
            Contents::Objects(objects) => Some(objects),
            Contents::Data(_) => None,
        }
    }

    fn buffer(&self) -> Option<HostBuffer> {
        match &self.contents {
            Contents::Data(storage) => Some(storage.lock().buffer.clone()),
            Contents::Objects(_) => None,
        }
    }

    /// Copy of the elements, or `None` if `T` is not the element type.
    pub fn values<T: ArrayElement>(&self) -> Option<Vec<T>> {
        if T::DATA_TYPE != self.element_type {
            return None;
        }
        let buffer = self.buffer()?;
        let bytes = buffer.read();
        Some(
            bytes
                .chunks_exact(std::mem::size_of::<T>())
                .map(bytemuck::pod_read_unaligned)
                .collect(),
        )
    }

    /// Elements widened to `Vec4`, filling missing components with
    /// (0, 0, 0, 1). Only float and 8-bit color element types qualify.
    pub fn read_vec4(&self) -> Option<Vec<Vec4>> {
        match self.element_type {
            DataType::Float32 => self
                .values::<f32>()
                .map(|v| v.into_iter().map(|x| Vec4::new(x, 0.0, 0.0, 1.0)).collect()),
            DataType::Float32Vec2 => self
                .values::<Vec2>()
                .map(|v| v.into_iter().map(|x| Vec4::new(x.x, x.y, 0.0, 1.0)).collect()),
            DataType::Float32Vec3 => self
                .values::<Vec3>()
                .map(|v| v.into_iter().map(|x| x.extend(1.0)).collect()),
            DataType::Float32Vec4 => self.values::<Vec4>(),
            DataType::UFixed8Vec4 | DataType::UFixed8RgbaSrgb => {
                let srgb = self.element_type == DataType::UFixed8RgbaSrgb;
                let buffer = self.buffer()?;
                let bytes = buffer.read();
                Some(
                    bytes
                        .chunks_exact(4)
                        .map(|c| {
                            let channel = |b: u8| {
                                let x = f32::from(b) / 255.0;
                                if srgb { x.powf(2.2) } else { x }
                            };
                            Vec4::new(channel(c[0]), channel(c[1]), channel(c[2]), f32::from(c[3]) / 255.0)
                        })
                        .collect(),
                )
            }
            _ => None,
        }
    }

    /// Lock the array memory for writing. Object arrays cannot be mapped.
    pub fn map(&self) -> KilnResult<ArrayMapping> {
        let buffer = self.buffer().ok_or(KilnError::NotMappable(self.core.handle()))?;
        Ok(ArrayMapping { array: self.core.handle(), guard: buffer.write_arc() })
    }

    /// Copy caller memory into device memory and release the caller's copy.
    fn privatize(&self) {
        let Contents::Data(storage) = &self.contents else {
            return;
        };
        let mut storage = storage.lock();
        if !matches!(storage.ownership, Ownership::Shared | Ownership::Captured) {
            return;
        }

        let copy = storage.buffer.read().clone();
        storage.buffer = HostBuffer::from_bytes(copy);
        storage.ownership = Ownership::Privatized;
        storage.run_deleter();
        log::debug!("privatized array {} ({} bytes)", self.core.handle(), storage.buffer.len());
    }
}

fn check_len(buffer: &HostBuffer, expected: usize) -> KilnResult<()> {
    let actual = buffer.len();
    if actual != expected {
        return Err(KilnError::SizeMismatch { expected, actual });
    }
    Ok(())
}

impl Object for Array {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    // Arrays hold no derived state, so they are valid from creation on.
    fn is_valid(&self) -> bool {
        true
    }

    fn get_property(&self, name: &str, ty: DataType) -> Option<ParamValue> {
        crate::object::valid_property(true, name, ty)
    }

    fn on_no_public_references(&self) {
        if self.core.internal_refs() > 0 {
            self.privatize();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Drop for Array {
    fn drop(&mut self) {
        if let Contents::Data(storage) = &mut self.contents {
            storage.get_mut().run_deleter();
        }
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("handle", &self.core.handle())
            .field("element_type", &self.element_type)
            .field("shape", &self.shape)
            .field("ownership", &self.ownership())
            .finish()
    }
}

/// Exclusive write access to an array's memory, released by unmapping it
/// through the device.
pub struct ArrayMapping {
    array: ObjectHandle,
    guard: ArcRwLockWriteGuard<RawRwLock, Vec<u8>>,
}

impl ArrayMapping {
    pub fn array(&self) -> ObjectHandle {
        self.array
    }

    pub fn bytes(&self) -> &[u8] {
        &self.guard
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.guard
    }

    /// Overwrite the mapped memory, starting at element 0, with `values`.
    pub fn write<T: Pod>(&mut self, values: &[T]) -> KilnResult<()> {
        let src: &[u8] = bytemuck::cast_slice(values);
        let dst = self.bytes_mut();
        if src.len() > dst.len() {
            return Err(KilnError::SizeMismatch { expected: dst.len(), actual: src.len() });
        }
        dst[..src.len()].copy_from_slice(src);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::tests::Dummy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn triangle() -> Vec<Vec3> {
        vec![Vec3::ZERO, Vec3::X, Vec3::Y]
    }

    #[test]
    fn test_shared_array_aliases_caller_memory() {
        let memory = HostBuffer::from_slice(&triangle());
        let array = Array::new(
            ArrayDesc::new_1d(DataType::Float32Vec3, 3),
            ArraySource::Shared(memory.clone()),
        )
        .unwrap();

        assert_eq!(array.core().kind(), ObjectType::Array1D);
        assert_eq!(array.ownership(), Some(Ownership::Shared));
        assert_eq!(array.values::<Vec3>().unwrap(), triangle());
        assert!(array.values::<Vec4>().is_none());

        // Writes by the owner are visible while the array is shared
        memory.write()[0..4].copy_from_slice(&2.0f32.to_ne_bytes());
        assert_eq!(array.values::<Vec3>().unwrap()[0].x, 2.0);
    }

    #[test]
    fn test_strided_arrays_rejected() {
        let memory = HostBuffer::from_slice(&[0.0f32; 8]);
        let desc = ArrayDesc::new_1d(DataType::Float32, 4).with_byte_stride(8);
        assert!(matches!(
            Array::new(desc, ArraySource::Shared(memory)),
            Err(KilnError::UnsupportedLayout(_))
        ));

        // A stride equal to the element size is just a packed array
        let memory = HostBuffer::from_slice(&[0.0f32; 4]);
        let desc = ArrayDesc::new_1d(DataType::Float32, 4).with_byte_stride(4);
        assert!(Array::new(desc, ArraySource::Shared(memory)).is_ok());
    }

    #[test]
    fn test_size_and_type_checks() {
        let memory = HostBuffer::from_slice(&[0u32; 5]);
        assert!(matches!(
            Array::new(ArrayDesc::new_1d(DataType::UInt32, 4), ArraySource::Shared(memory)),
            Err(KilnError::SizeMismatch { expected: 16, actual: 20 })
        ));
        assert!(matches!(
            Array::new(ArrayDesc::new_1d(DataType::String, 1), ArraySource::Managed),
            Err(KilnError::InvalidElementType(DataType::String))
        ));
    }

    #[test]
    fn test_managed_array_map() {
        let array = Array::new(ArrayDesc::new_3d(DataType::Float32, 2, 2, 2), ArraySource::Managed).unwrap();
        assert_eq!(array.core().kind(), ObjectType::Array3D);
        assert_eq!(array.values::<f32>().unwrap(), vec![0.0; 8]);

        {
            let mut mapping = array.map().unwrap();
            assert_eq!(mapping.array(), array.core().handle());
            mapping.write(&[1.0f32, 2.0, 3.0]).unwrap();
            assert!(mapping.write(&[0.0f32; 9]).is_err());
        }
        assert_eq!(&array.values::<f32>().unwrap()[..4], &[1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn test_read_vec4_widens() {
        let memory = HostBuffer::from_slice(&[Vec2::new(0.5, 0.25)]);
        let array = Array::new(ArrayDesc::new_1d(DataType::Float32Vec2, 1), ArraySource::Shared(memory)).unwrap();
        assert_eq!(array.read_vec4().unwrap(), vec![Vec4::new(0.5, 0.25, 0.0, 1.0)]);

        let memory = HostBuffer::from_slice(&[[255u8, 0, 0, 255]]);
        let array = Array::new(ArrayDesc::new_1d(DataType::UFixed8Vec4, 1), ArraySource::Shared(memory)).unwrap();
        assert_eq!(array.read_vec4().unwrap(), vec![Vec4::new(1.0, 0.0, 0.0, 1.0)]);
    }

    #[test]
    fn test_privatize_on_release_with_internal_refs() {
        let memory = HostBuffer::from_slice(&triangle());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let array = Array::new(
            ArrayDesc::new_1d(DataType::Float32Vec3, 3),
            ArraySource::Captured(memory.clone(), Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

        let internal = ObjectRef::new(array.clone());
        array.on_no_public_references();
        assert_eq!(array.ownership(), Some(Ownership::Privatized));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The caller reuses its memory; the device copy is unaffected
        memory.write().fill(0xff);
        let through_ref = internal.downcast_ref::<Array>().unwrap();
        assert_eq!(through_ref.values::<Vec3>().unwrap(), triangle());

        drop(internal);
        drop(array);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_privatize_without_internal_refs() {
        let array = Array::new(
            ArrayDesc::new_1d(DataType::Float32, 2),
            ArraySource::Shared(HostBuffer::from_slice(&[1.0f32, 2.0])),
        )
        .unwrap();
        array.on_no_public_references();
        assert_eq!(array.ownership(), Some(Ownership::Shared));
    }

    #[test]
    fn test_captured_deleter_runs_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let array = Array::new(
            ArrayDesc::new_1d(DataType::Float32, 1),
            ArraySource::Captured(HostBuffer::from_slice(&[1.0f32]), Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();
        drop(array);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_object_arrays() {
        let a = Dummy::new(ObjectType::Surface);
        let b = Dummy::new(ObjectType::Surface);
        let refs = vec![ObjectRef::new(a.clone()), ObjectRef::new(b.clone())];
        let array = Array::new_objects(ObjectType::Surface, refs).unwrap();

        assert_eq!(array.element_type(), DataType::Object(ObjectType::Surface));
        assert_eq!(array.objects().unwrap().len(), 2);
        assert_eq!(a.core().internal_refs(), 1);
        assert!(matches!(array.map(), Err(KilnError::NotMappable(_))));
        assert!(array.ownership().is_none());

        let light = Dummy::new(ObjectType::Light);
        assert!(matches!(
            Array::new_objects(ObjectType::Surface, vec![ObjectRef::new(light)]),
            Err(KilnError::WrongObjectType { .. })
        ));

        drop(array);
        assert_eq!(a.core().internal_refs(), 0);
    }
}
