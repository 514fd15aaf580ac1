//! Kiln Renderer - CPU ray tracing device
//!
//! Scene objects are created and parameterized through a [`Device`] by
//! handle, committed in dependency order and rendered progressively:
//!
//! - SAH bounding volume hierarchies over geometry, groups and worlds
//! - Closest-hit and any-hit traversal through instance transforms
//! - Ambient occlusion, raycast, ray direction and debug renderers
//! - Volume ray marching through structured regular fields
//! - Asynchronous, tiled, accumulating frames

pub mod bvh;
mod camera;
mod config;
mod device;
pub mod frame;
mod hit;
mod renderer;
pub mod scene;

pub use camera::{Camera, CameraType};
pub use config::{DeviceConfig, DEFAULT_TILE_SIZE};
pub use device::{Device, WaitMode};
pub use frame::{
    ColorFormat, FrameMapping, COLOR_CHANNEL, DEPTH_CHANNEL, INSTANCE_ID_CHANNEL, OBJECT_ID_CHANNEL, PRIMITIVE_ID_CHANNEL,
};
pub use hit::{Hit, HitKind};
pub use renderer::{DebugMethod, HitIds, Renderer, RendererType, Sample};

/// Re-export the runtime and math types applications need
pub use kiln_core::{
    ArrayDesc, ArrayMapping, ArraySource, DataType, FrameCallback, HostBuffer, KilnError, KilnResult, ObjectHandle,
    ObjectType, ParamValue, Severity, StatusCallback,
};
pub use kiln_math::{Aabb, Interval, Mat4Ext, Ray};
// Re-export glam for convenience
pub use glam::*;
