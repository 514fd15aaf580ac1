//! Errors returned by misuse of the object API.
//!
//! Configuration problems (missing or mistyped parameters) are not errors:
//! they are reported through the status channel at commit time and leave the
//! object invalid.

use thiserror::Error;

use crate::object::ObjectHandle;
use crate::types::{DataType, ObjectType};

/// Errors that can occur when calling into a device.
#[derive(Error, Debug)]
pub enum KilnError {
    #[error("invalid object handle {0}")]
    InvalidHandle(ObjectHandle),

    #[error("object {handle} is a {actual:?}, expected {expected}")]
    WrongObjectType {
        handle: ObjectHandle,
        expected: &'static str,
        actual: ObjectType,
    },

    #[error("{0:?} objects are not created through new_object")]
    NotConstructible(ObjectType),

    #[error("unsupported array layout: {0}")]
    UnsupportedLayout(String),

    #[error("{0:?} cannot be used as an array element type")]
    InvalidElementType(DataType),

    #[error("array memory holds {actual} bytes, {expected} required")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("array {0} holds object handles and cannot be mapped")]
    NotMappable(ObjectHandle),

    #[error("unknown frame channel '{0}'")]
    UnknownChannel(String),

    #[error("frame channel '{0}' is not enabled")]
    ChannelDisabled(String),

    #[error("failed to allocate {0} bytes")]
    Allocation(usize),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to start render task: {0}")]
    TaskSpawn(String),
}

/// Result type for device operations.
pub type KilnResult<T> = Result<T, KilnError>;

/// Allocate a zeroed byte buffer, turning allocation failure into an error.
pub fn try_alloc_zeroed(len: usize) -> KilnResult<Vec<u8>> {
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(len)
        .map_err(|_| KilnError::Allocation(len))?;
    bytes.resize(len, 0);
    Ok(bytes)
}
