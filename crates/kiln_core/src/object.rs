//! Object identity, reference counting and timestamps.
//!
//! Every device object embeds an [`ObjectCore`]. The public reference count
//! is driven by the application through the device's handle table; the
//! internal count tracks [`ObjectRef`] values held by parameter stores,
//! object arrays and the commit queue. The allocation itself is an `Arc`,
//! so the object is destroyed once both kinds of owner are gone.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use crate::param::{ParamValue, ParameterStore};
use crate::types::{DataType, ObjectType};

static NEXT_TIMESTAMP: AtomicU64 = AtomicU64::new(1);
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Next value of the process-wide modification clock.
///
/// Strictly increasing, so comparing two timestamps tells which event
/// happened last.
pub fn new_timestamp() -> u64 {
    NEXT_TIMESTAMP.fetch_add(1, Ordering::Relaxed)
}

/// Opaque application-facing handle. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectHandle(u64);

impl ObjectHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State shared by every object regardless of its type.
pub struct ObjectCore {
    handle: ObjectHandle,
    kind: ObjectType,
    subtype: String,
    public_refs: AtomicU32,
    internal_refs: AtomicU32,
    last_updated: AtomicU64,
    last_committed: AtomicU64,
    params: Mutex<ParameterStore>,
    observers: Mutex<Vec<Weak<dyn Object>>>,
    this: Weak<dyn Object>,
}

impl ObjectCore {
    /// Create the core for a new object.
    ///
    /// `this` is the weak self pointer handed out by `Arc::new_cyclic`. The
    /// object starts with one public reference and counts as updated.
    pub fn new(kind: ObjectType, subtype: impl Into<String>, this: Weak<dyn Object>) -> Self {
        Self {
            handle: ObjectHandle::next(),
            kind,
            subtype: subtype.into(),
            public_refs: AtomicU32::new(1),
            internal_refs: AtomicU32::new(0),
            last_updated: AtomicU64::new(new_timestamp()),
            last_committed: AtomicU64::new(0),
            params: Mutex::new(ParameterStore::default()),
            observers: Mutex::new(Vec::new()),
            this,
        }
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    pub fn kind(&self) -> ObjectType {
        self.kind
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    pub fn commit_priority(&self) -> u32 {
        self.kind.commit_priority()
    }

    /// Lock the staged parameters for reading.
    pub fn params(&self) -> MutexGuard<'_, ParameterStore> {
        self.params.lock()
    }

    pub fn set_param(&self, name: &str, value: ParamValue) {
        self.params.lock().set(name, value);
        self.mark_updated();
    }

    pub fn unset_param(&self, name: &str) {
        if self.params.lock().remove(name).is_some() {
            self.mark_updated();
        }
    }

    pub fn mark_updated(&self) {
        self.last_updated.store(new_timestamp(), Ordering::Release);
    }

    pub fn mark_committed(&self) {
        self.last_committed.store(new_timestamp(), Ordering::Release);
    }

    pub fn last_updated(&self) -> u64 {
        self.last_updated.load(Ordering::Acquire)
    }

    pub fn last_committed(&self) -> u64 {
        self.last_committed.load(Ordering::Acquire)
    }

    pub fn needs_commit(&self) -> bool {
        self.last_updated() > self.last_committed()
    }

    pub fn is_committed(&self) -> bool {
        self.last_committed() != 0
    }

    pub fn public_refs(&self) -> u32 {
        self.public_refs.load(Ordering::Acquire)
    }

    pub fn internal_refs(&self) -> u32 {
        self.internal_refs.load(Ordering::Acquire)
    }

    pub fn retain(&self) {
        self.public_refs.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop one public reference. Returns true when it was the last one.
    pub fn release(&self) -> bool {
        let previous = self
            .public_refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .unwrap_or(0);
        previous == 1
    }

    /// Strong pointer to the object owning this core, if it is still alive.
    pub fn upgrade(&self) -> Option<Arc<dyn Object>> {
        self.this.upgrade()
    }

    pub fn weak(&self) -> Weak<dyn Object> {
        self.this.clone()
    }

    /// Register `observer` to be recommitted whenever this object commits.
    pub fn add_observer(&self, observer: Weak<dyn Object>) {
        let mut observers = self.observers.lock();
        observers.retain(|o| o.strong_count() > 0);
        if !observers.iter().any(|o| Weak::ptr_eq(o, &observer)) {
            observers.push(observer);
        }
    }

    pub fn remove_observer(&self, observer: &Weak<dyn Object>) {
        self.observers.lock().retain(|o| o.strong_count() > 0 && !Weak::ptr_eq(o, observer));
    }

    /// Live observers, pruning the ones that were destroyed.
    pub fn observers(&self) -> Vec<Arc<dyn Object>> {
        let mut observers = self.observers.lock();
        observers.retain(|o| o.strong_count() > 0);
        observers.iter().filter_map(Weak::upgrade).collect()
    }
}

impl fmt::Debug for ObjectCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCore")
            .field("handle", &self.handle)
            .field("kind", &self.kind)
            .field("subtype", &self.subtype)
            .field("public_refs", &self.public_refs())
            .field("internal_refs", &self.internal_refs())
            .finish()
    }
}

/// Behaviour every device object provides.
pub trait Object: Any + Send + Sync {
    fn core(&self) -> &ObjectCore;

    /// Turn the staged parameters into committed state.
    ///
    /// Called by the commit buffer, at most once per flush, after every
    /// lower-priority object queued in the same flush.
    fn commit(&self) {}

    fn is_valid(&self) -> bool {
        self.core().is_committed()
    }

    /// Answer a property query; `None` when the name/type pair is unknown.
    fn get_property(&self, name: &str, ty: DataType) -> Option<ParamValue> {
        valid_property(self.is_valid(), name, ty)
    }

    /// Hook run when the application releases its last handle.
    fn on_no_public_references(&self) {}

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// The `valid` property every object answers.
pub fn valid_property(valid: bool, name: &str, ty: DataType) -> Option<ParamValue> {
    (name == "valid" && ty == DataType::Bool).then_some(ParamValue::Bool(valid))
}

/// Internal (device-side) reference to an object.
///
/// Holding one keeps the object alive and raises its internal count, which
/// is what decides whether a released array must privatize its memory.
pub struct ObjectRef(Arc<dyn Object>);

impl ObjectRef {
    pub fn new(object: Arc<dyn Object>) -> Self {
        object.core().internal_refs.fetch_add(1, Ordering::AcqRel);
        Self(object)
    }

    pub fn handle(&self) -> ObjectHandle {
        self.0.core().handle()
    }

    pub fn kind(&self) -> ObjectType {
        self.0.core().kind()
    }

    pub fn object(&self) -> &Arc<dyn Object> {
        &self.0
    }

    pub fn downcast<T: Object>(&self) -> Option<Arc<T>> {
        self.0.clone().into_any().downcast::<T>().ok()
    }

    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl Clone for ObjectRef {
    fn clone(&self) -> Self {
        Self::new(self.0.clone())
    }
}

impl Drop for ObjectRef {
    fn drop(&mut self) {
        self.0.core().internal_refs.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Deref for ObjectRef {
    type Target = dyn Object;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.handle() == other.handle()
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:?} {})", self.kind(), self.handle())
    }
}
