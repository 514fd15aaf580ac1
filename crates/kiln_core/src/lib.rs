//! Kiln Core - object runtime shared by every Kiln device.
//!
//! This crate provides:
//!
//! - **Objects**: handles, dual public/internal reference counts and
//!   update/commit timestamps (`ObjectCore`, `ObjectRef`)
//! - **Parameters**: the ordered, type-tagged parameter store
//! - **Arrays**: typed 1D/2D/3D buffers with shared, captured, managed and
//!   privatized ownership
//! - **Deferred commits**: the priority-ordered `CommitBuffer`
//! - **Diagnostics**: the severity-tagged status channel
//!
//! The rendering entities themselves live in `kiln_renderer`; they plug into
//! this runtime by implementing [`Object`].

pub mod array;
pub mod commit;
pub mod error;
pub mod object;
pub mod param;
pub mod status;
pub mod types;

// Re-export commonly used types
pub use array::{
    Array, ArrayDeleter, ArrayDesc, ArrayElement, ArrayMapping, ArrayShape, ArraySource, HostBuffer, Ownership,
};
pub use commit::CommitBuffer;
pub use error::{KilnError, KilnResult};
pub use object::{new_timestamp, valid_property, Object, ObjectCore, ObjectHandle, ObjectRef};
pub use param::{FrameCallback, FromParam, ParamValue, ParameterStore};
pub use status::{Severity, StatusCallback, StatusReporter};
pub use types::{DataType, ObjectType};
