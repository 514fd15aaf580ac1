//! Frames: progressive, asynchronous rendering into pixel buffers.
//!
//! A frame binds a camera, a renderer and a world. Every `render()` runs on
//! a background [`RenderTask`]; the tile work itself executes on the
//! device's rayon pool. Consecutive renders of an unchanged scene refine a
//! running average, and any change to the camera, renderer, world, bound
//! objects or resolution starts over at frame index 0.
//!
//! Buffers are stored bottom row first.

mod task;
mod tile;

pub use task::{CancelToken, RenderTask};
pub use tile::{generate_tiles, Tile, TileResult};

use std::any::Any;
use std::sync::{Arc, Weak};
use std::time::Instant;

use kiln_core::error::try_alloc_zeroed;
use kiln_core::{
    valid_property, DataType, FrameCallback, KilnError, KilnResult, Object, ObjectCore, ObjectHandle, ObjectRef,
    ObjectType, ParamValue, ParameterStore, Severity,
};
use kiln_math::{UVec2, Vec2, Vec4};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::camera::Camera;
use crate::renderer::{gen_f32, HitIds, Renderer};
use crate::scene::{Entity, SceneContext, SceneObject, World};

pub const COLOR_CHANNEL: &str = "channel.color";
pub const DEPTH_CHANNEL: &str = "channel.depth";
pub const PRIMITIVE_ID_CHANNEL: &str = "channel.primitiveId";
pub const OBJECT_ID_CHANNEL: &str = "channel.objectId";
pub const INSTANCE_ID_CHANNEL: &str = "channel.instanceId";

/// Id channels in [`HitIds::to_array`] order.
const ID_CHANNELS: [&str; 3] = [PRIMITIVE_ID_CHANNEL, OBJECT_ID_CHANNEL, INSTANCE_ID_CHANNEL];

const DEFAULT_SIZE: UVec2 = UVec2::new(10, 10);

/// Pixel encoding of the color channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorFormat {
    UFixed8,
    #[default]
    UFixed8Srgb,
    Float32,
}

impl ColorFormat {
    pub fn from_data_type(ty: DataType) -> Option<Self> {
        match ty {
            DataType::UFixed8Vec4 => Some(ColorFormat::UFixed8),
            DataType::UFixed8RgbaSrgb => Some(ColorFormat::UFixed8Srgb),
            DataType::Float32Vec4 => Some(ColorFormat::Float32),
            _ => None,
        }
    }

    pub fn data_type(self) -> DataType {
        match self {
            ColorFormat::UFixed8 => DataType::UFixed8Vec4,
            ColorFormat::UFixed8Srgb => DataType::UFixed8RgbaSrgb,
            ColorFormat::Float32 => DataType::Float32Vec4,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorFormat::UFixed8 | ColorFormat::UFixed8Srgb => 4,
            ColorFormat::Float32 => 16,
        }
    }

    fn encode(self, color: Vec4, out: &mut [u8]) {
        let unorm = |x: f32| (x.clamp(0.0, 1.0) * 255.0).round() as u8;
        match self {
            ColorFormat::UFixed8 => {
                for (o, c) in out.iter_mut().zip(color.to_array()) {
                    *o = unorm(c);
                }
            }
            ColorFormat::UFixed8Srgb => {
                let gamma = |x: f32| x.max(0.0).powf(1.0 / 2.2);
                out[0] = unorm(gamma(color.x));
                out[1] = unorm(gamma(color.y));
                out[2] = unorm(gamma(color.z));
                out[3] = unorm(color.w);
            }
            ColorFormat::Float32 => out.copy_from_slice(bytemuck::cast_slice(&color.to_array())),
        }
    }
}

/// A mapped frame channel.
#[derive(Debug, Clone)]
pub struct FrameMapping {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub pixel_type: DataType,
}

impl FrameMapping {
    /// Bytes of pixel (x, y), y = 0 being the bottom row.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let width = self.width as usize;
        let count = width * self.height as usize;
        let stride = if count == 0 { 0 } else { self.data.len() / count };
        let start = (y as usize * width + x as usize) * stride;
        &self.data[start..start + stride]
    }

    /// The channel reinterpreted as 32-bit unsigned ids.
    pub fn to_u32(&self) -> Vec<u32> {
        bytemuck::pod_collect_to_vec(&self.data[..])
    }

    /// The channel reinterpreted as 32-bit floats.
    pub fn to_f32(&self) -> Vec<f32> {
        bytemuck::pod_collect_to_vec(&self.data[..])
    }
}

fn try_filled<T: Clone>(len: usize, value: T) -> KilnResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| KilnError::Allocation(len.saturating_mul(std::mem::size_of::<T>())))?;
    v.resize(len, value);
    Ok(v)
}

/// Pixels in a `size` image. Buffers are indexed with `u32` row math, so
/// the count must fit a `u32`.
fn checked_pixel_count(size: UVec2, bytes_per_pixel: usize) -> KilnResult<usize> {
    size.x
        .checked_mul(size.y)
        .map(|count| count as usize)
        .ok_or_else(|| {
            let pixels = (size.x as usize).saturating_mul(size.y as usize);
            KilnError::Allocation(pixels.saturating_mul(bytes_per_pixel))
        })
}

/// Optional channels a frame keeps besides color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Channels {
    depth: bool,
    /// Primitive, object and instance ids.
    ids: [bool; 3],
}

impl Channels {
    fn from_params(params: &ParameterStore) -> Self {
        let enabled = |name: &str, ty: DataType| params.get::<DataType>(name) == Some(ty);
        Channels {
            depth: enabled(DEPTH_CHANNEL, DataType::Float32),
            ids: ID_CHANNELS.map(|name| enabled(name, DataType::UInt32)),
        }
    }
}

#[derive(Debug, Default)]
struct FrameBuffers {
    size: UVec2,
    format: ColorFormat,
    /// Running average of every sample since the last reset.
    accum: Vec<Vec4>,
    color: Vec<u8>,
    depth: Option<Vec<f32>>,
    /// Ids of the first sample's hit, overwritten every pass.
    ids: [Option<Vec<u32>>; 3],
    frame_index: u32,
    /// Seconds the last render took.
    duration: f32,
}

impl FrameBuffers {
    fn pixel_count(&self) -> usize {
        self.size.x as usize * self.size.y as usize
    }

    /// Resize or re-encode after a commit. Returns whether the accumulated
    /// image was lost.
    fn reconfigure(&mut self, size: UVec2, format: ColorFormat, channels: Channels) -> KilnResult<bool> {
        let resized = size != self.size;
        if resized {
            let count = checked_pixel_count(size, std::mem::size_of::<Vec4>())?;
            let color_bytes = count
                .checked_mul(format.bytes_per_pixel())
                .ok_or(KilnError::Allocation(usize::MAX))?;
            self.accum = try_filled(count, Vec4::ZERO)?;
            self.color = try_alloc_zeroed(color_bytes)?;
            self.size = size;
            self.format = format;
        } else if format != self.format {
            let mut color = try_alloc_zeroed(self.pixel_count() * format.bytes_per_pixel())?;
            for (accum, out) in self.accum.iter().zip(color.chunks_exact_mut(format.bytes_per_pixel())) {
                format.encode(*accum, out);
            }
            self.color = color;
            self.format = format;
        }
        let count = self.pixel_count();
        let keep = !resized && self.depth.as_ref().is_some_and(|d| d.len() == count);
        if !channels.depth {
            self.depth = None;
        } else if !keep {
            self.depth = Some(try_filled(count, f32::INFINITY)?);
        }
        for (ids, enabled) in self.ids.iter_mut().zip(channels.ids) {
            let keep = !resized && ids.as_ref().is_some_and(|v| v.len() == count);
            if !enabled {
                *ids = None;
            } else if !keep {
                *ids = Some(try_filled(count, u32::MAX)?);
            }
        }
        Ok(resized)
    }

    fn clear(&mut self) {
        self.accum.fill(Vec4::ZERO);
        self.color.fill(0);
        if let Some(depth) = &mut self.depth {
            depth.fill(f32::INFINITY);
        }
        for ids in self.ids.iter_mut().flatten() {
            ids.fill(u32::MAX);
        }
        self.frame_index = 0;
    }

    /// Blend one tile's pass into the image. `base` samples were
    /// accumulated before this pass, which adds `samples` more per pixel.
    fn merge(&mut self, result: &TileResult, base: u32, samples: u32) {
        let width = self.size.x;
        let bpp = self.format.bytes_per_pixel();
        let prior = base as f32;
        let added = samples as f32;
        let samples_of = result.colors.iter().zip(&result.depths).zip(&result.ids);
        for ((x, y), ((color, depth), ids)) in result.tile.pixels().zip(samples_of) {
            let i = y as usize * width as usize + x as usize;
            if i >= self.accum.len() {
                continue;
            }
            let accum = if base == 0 { *color } else { (self.accum[i] * prior + *color * added) / (prior + added) };
            self.accum[i] = accum;
            self.format.encode(accum, &mut self.color[i * bpp..(i + 1) * bpp]);
            if let Some(d) = &mut self.depth {
                d[i] = if base == 0 { *depth } else { d[i].min(*depth) };
            }
            for (channel, id) in self.ids.iter_mut().zip(ids.to_array()) {
                if let Some(channel) = channel {
                    channel[i] = id;
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Bindings {
    camera: ObjectRef,
    renderer: ObjectRef,
    world: ObjectRef,
}

impl Bindings {
    fn handles(&self) -> [ObjectHandle; 3] {
        [self.camera.handle(), self.renderer.handle(), self.world.handle()]
    }
}

fn snapshot<T: Entity>(object: &ObjectRef) -> Option<Arc<T>> {
    object.downcast_ref::<SceneObject<T>>()?.current()
}

/// Committed snapshots a render works from, plus the update timestamps of
/// the objects they came from.
struct Snapshots {
    camera: Arc<Camera>,
    renderer: Arc<Renderer>,
    world: Arc<World>,
    stamps: [u64; 3],
}

impl Snapshots {
    fn resolve(bindings: &Bindings) -> Option<Self> {
        Some(Snapshots {
            camera: snapshot(&bindings.camera)?,
            renderer: snapshot(&bindings.renderer)?,
            world: snapshot(&bindings.world)?,
            stamps: [
                bindings.camera.core().last_updated(),
                bindings.renderer.core().last_updated(),
                bindings.world.core().last_updated(),
            ],
        })
    }
}

#[derive(Debug, Default)]
struct FrameState {
    committed: bool,
    bindings: Option<Bindings>,
    size: UVec2,
    callback: Option<FrameCallback>,
    /// Set by a commit that changed a binding or the resolution.
    changed: bool,
    /// Update timestamps of camera, renderer and world at the last render.
    seen: [u64; 3],
    next_index: u32,
}

/// One render pass over every tile.
struct RenderJob {
    camera: Arc<Camera>,
    renderer: Arc<Renderer>,
    world: Arc<World>,
    size: UVec2,
    tile_size: u32,
    base: u32,
    samples: u32,
}

impl RenderJob {
    fn run(&self, buffers: &Mutex<FrameBuffers>, cancel: &CancelToken) {
        self.world.prepare();
        let tiles = generate_tiles(self.size.x, self.size.y, self.tile_size);
        log::debug!(
            "rendering {}x{} in {} tiles, samples {}..{}",
            self.size.x,
            self.size.y,
            tiles.len(),
            self.base,
            self.base + self.samples
        );
        tiles.par_iter().for_each(|tile| {
            if cancel.is_cancelled() {
                return;
            }
            let result = self.render_tile(*tile);
            buffers.lock().merge(&result, self.base, self.samples);
        });
    }

    fn render_tile(&self, tile: Tile) -> TileResult {
        let mut rng = StdRng::seed_from_u64((u64::from(self.base) << 32) | tile.index as u64);
        let inv_size = Vec2::ONE / self.size.as_vec2();
        let mut result = TileResult::with_capacity(tile);
        for (x, y) in tile.pixels() {
            let mut color = Vec4::ZERO;
            let mut depth = f32::INFINITY;
            let mut ids = None;
            for _ in 0..self.samples {
                let jitter = Vec2::new(gen_f32(&mut rng) - 0.5, gen_f32(&mut rng) - 0.5);
                let screen = (Vec2::new(x as f32, y as f32) + 0.5 + jitter) * inv_size;
                let sample = self.renderer.render_sample(self.camera.ray(screen), &self.world, &mut rng);
                color += sample.color;
                depth = depth.min(sample.depth);
                ids.get_or_insert(sample.ids);
            }
            result.colors.push(color / self.samples as f32);
            result.depths.push(depth);
            result.ids.push(ids.unwrap_or(HitIds::NONE));
        }
        result
    }
}

/// Device frame object.
pub struct Frame {
    core: ObjectCore,
    scene: Arc<SceneContext>,
    pool: Arc<ThreadPool>,
    state: Mutex<FrameState>,
    buffers: Arc<Mutex<FrameBuffers>>,
    task: Mutex<Option<RenderTask>>,
}

impl Frame {
    pub fn create(scene: Arc<SceneContext>, pool: Arc<ThreadPool>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| Frame {
            core: ObjectCore::new(ObjectType::Frame, "", this.clone()),
            scene,
            pool,
            state: Mutex::new(FrameState::default()),
            buffers: Arc::default(),
            task: Mutex::new(None),
        })
    }

    fn binding(&self, params: &ParameterStore, name: &str, kind: ObjectType) -> Option<ObjectRef> {
        match params.value(name) {
            None => None,
            Some(ParamValue::Object(object)) if object.kind() == kind => Some(object.clone()),
            Some(other) => {
                self.scene.status.warning(
                    self.core.handle(),
                    format!("frame parameter '{name}' must be a {kind:?}, found {:?}", other.data_type()),
                );
                None
            }
        }
    }

    fn color_format(&self, params: &ParameterStore) -> ColorFormat {
        match params.value(COLOR_CHANNEL) {
            None => ColorFormat::default(),
            Some(ParamValue::DataType(ty)) => ColorFormat::from_data_type(*ty).unwrap_or_else(|| {
                self.scene.status.warning(self.core.handle(), format!("unsupported color format {ty:?}"));
                ColorFormat::default()
            }),
            Some(other) => {
                let message = format!("'{COLOR_CHANNEL}' must be a data type, found {:?}", other.data_type());
                self.scene.status.warning(self.core.handle(), message);
                ColorFormat::default()
            }
        }
    }

    /// Start a render pass and return without waiting for it. Waits for
    /// the previous pass first.
    ///
    /// A cancelled pass still advances `frame_index`; tiles it skipped keep
    /// the previous pass's data.
    pub fn render(&self) -> KilnResult<()> {
        let mut task = self.task.lock();
        if let Some(previous) = task.as_mut() {
            previous.wait();
        }

        let handle = self.core.handle();
        let mut state = self.state.lock();
        let snapshots = state.bindings.as_ref().and_then(Snapshots::resolve).filter(|_| state.size.min_element() > 0);
        let job = match snapshots {
            Some(s) => {
                let reset = state.changed || s.stamps.iter().zip(&state.seen).any(|(now, seen)| now > seen);
                let base = if reset { 0 } else { state.next_index };
                let samples = s.renderer.pixel_samples();
                state.changed = false;
                state.seen = s.stamps;
                state.next_index = base + samples;
                self.buffers.lock().frame_index = base + samples - 1;
                Some(RenderJob {
                    camera: s.camera,
                    renderer: s.renderer,
                    world: s.world,
                    size: state.size,
                    tile_size: self.scene.config.tile_size,
                    base,
                    samples,
                })
            }
            None => {
                self.scene
                    .status
                    .warning(handle, "frame needs a valid camera, renderer and world; clearing it");
                None
            }
        };

        let callback = state.callback.clone();
        let buffers = self.buffers.clone();
        let pool = self.pool.clone();
        drop(state);

        *task = Some(RenderTask::spawn(format!("kiln-frame-{}", handle.raw()), move |cancel| {
            let start = Instant::now();
            match job {
                Some(job) => pool.install(|| job.run(&buffers, cancel)),
                None => buffers.lock().clear(),
            }
            let elapsed = start.elapsed();
            buffers.lock().duration = elapsed.as_secs_f32();
            log::debug!("frame {handle} done in {:.3}s", elapsed.as_secs_f32());
            if let Some(callback) = callback {
                callback.call(handle);
            }
            elapsed
        })?);
        Ok(())
    }

    /// Whether the last render finished.
    pub fn is_ready(&self) -> bool {
        self.task.lock().as_mut().map_or(true, RenderTask::is_ready)
    }

    /// Block until the last render finished.
    pub fn wait(&self) {
        if let Some(task) = self.task.lock().as_mut() {
            task.wait();
        }
    }

    /// Cancel the in-flight render. Tiles already started still finish.
    pub fn discard(&self) {
        if let Some(task) = self.task.lock().as_ref() {
            task.cancel();
        }
    }

    /// Copy out a channel once the in-flight render is done.
    pub fn map(&self, channel: &str) -> KilnResult<FrameMapping> {
        self.wait();
        let buffers = self.buffers.lock();
        let (data, pixel_type) = match channel {
            COLOR_CHANNEL => (buffers.color.clone(), buffers.format.data_type()),
            DEPTH_CHANNEL => {
                let depth = buffers
                    .depth
                    .as_ref()
                    .ok_or_else(|| KilnError::ChannelDisabled(channel.to_string()))?;
                (bytemuck::cast_slice::<f32, u8>(depth).to_vec(), DataType::Float32)
            }
            _ => {
                let index = ID_CHANNELS
                    .iter()
                    .position(|name| *name == channel)
                    .ok_or_else(|| KilnError::UnknownChannel(channel.to_string()))?;
                let ids = buffers.ids[index]
                    .as_ref()
                    .ok_or_else(|| KilnError::ChannelDisabled(channel.to_string()))?;
                (bytemuck::cast_slice::<u32, u8>(ids).to_vec(), DataType::UInt32)
            }
        };
        Ok(FrameMapping { data, width: buffers.size.x, height: buffers.size.y, pixel_type })
    }

    pub fn frame_index(&self) -> u32 {
        self.buffers.lock().frame_index
    }
}

impl Object for Frame {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn commit(&self) {
        self.wait();
        let params = self.core.params().clone();
        let handle = self.core.handle();

        let camera = self.binding(&params, "camera", ObjectType::Camera);
        let renderer = self.binding(&params, "renderer", ObjectType::Renderer);
        let world = self.binding(&params, "world", ObjectType::World);
        let bindings = match (camera, renderer, world) {
            (Some(camera), Some(renderer), Some(world)) => Some(Bindings { camera, renderer, world }),
            _ => None,
        };
        let size = params.get_or("size", DEFAULT_SIZE);
        let format = self.color_format(&params);
        let channels = Channels::from_params(&params);

        let mut state = self.state.lock();
        let rebound = state.bindings.as_ref().map(Bindings::handles) != bindings.as_ref().map(Bindings::handles);
        let resized = match self.buffers.lock().reconfigure(size, format, channels) {
            Ok(resized) => resized,
            Err(e) => {
                self.scene.status.report(Severity::Fatal, Some(handle), format!("frame buffers: {e}"));
                state.committed = false;
                return;
            }
        };
        state.changed |= rebound || resized;
        state.bindings = bindings;
        state.size = size;
        state.callback = params.get::<FrameCallback>("frameCompletionCallback");
        state.committed = true;
    }

    fn is_valid(&self) -> bool {
        let state = self.state.lock();
        state.committed
            && state.size.min_element() > 0
            && state.bindings.as_ref().and_then(Snapshots::resolve).is_some()
    }

    fn get_property(&self, name: &str, ty: DataType) -> Option<ParamValue> {
        match (name, ty) {
            ("duration", DataType::Float32) => Some(ParamValue::Float(self.buffers.lock().duration)),
            ("frameIndex", DataType::UInt32) => Some(ParamValue::UInt(self.frame_index())),
            _ => valid_property(self.is_valid(), name, ty),
        }
    }

    fn on_no_public_references(&self) {
        self.discard();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_result(tile: Tile, color: Vec4, depth: f32) -> TileResult {
        let n = tile.pixel_count();
        TileResult { tile, colors: vec![color; n], depths: vec![depth; n], ids: vec![HitIds::NONE; n] }
    }

    const COLOR_ONLY: Channels = Channels { depth: false, ids: [false; 3] };
    const WITH_DEPTH: Channels = Channels { depth: true, ids: [false; 3] };

    #[test]
    fn test_color_encoding() {
        let mut out = [0u8; 4];
        ColorFormat::UFixed8.encode(Vec4::new(1.0, 0.5, -1.0, 2.0), &mut out);
        assert_eq!(out, [255, 128, 0, 255]);

        ColorFormat::UFixed8Srgb.encode(Vec4::new(0.5, 0.0, 1.0, 0.5), &mut out);
        assert_eq!(out, [186, 0, 255, 128]);

        let mut wide = [0u8; 16];
        ColorFormat::Float32.encode(Vec4::new(0.25, 2.0, 0.0, 1.0), &mut wide);
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(&wide[..]);
        assert_eq!(floats, vec![0.25, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn test_format_data_types() {
        for format in [ColorFormat::UFixed8, ColorFormat::UFixed8Srgb, ColorFormat::Float32] {
            assert_eq!(ColorFormat::from_data_type(format.data_type()), Some(format));
        }
        assert_eq!(ColorFormat::from_data_type(DataType::Float32), None);
    }

    #[test]
    fn test_merge_running_average() {
        let mut buffers = FrameBuffers::default();
        assert!(buffers.reconfigure(UVec2::new(2, 2), ColorFormat::Float32, WITH_DEPTH).unwrap());
        let tile = Tile::new(0, 0, 2, 2, 0);

        buffers.merge(&tile_result(tile, Vec4::ONE, 3.0), 0, 1);
        buffers.merge(&tile_result(tile, Vec4::ZERO, 5.0), 1, 1);
        assert_eq!(buffers.accum[0], Vec4::splat(0.5));
        assert_eq!(buffers.depth.as_ref().unwrap()[0], 3.0);

        // Two more samples at once weigh twice as much
        buffers.merge(&tile_result(tile, Vec4::ONE, 1.0), 2, 2);
        assert_eq!(buffers.accum[3], Vec4::splat(0.75));
        assert_eq!(buffers.depth.as_ref().unwrap()[3], 1.0);

        // A reset overwrites
        buffers.merge(&tile_result(tile, Vec4::splat(0.2), 9.0), 0, 1);
        assert_eq!(buffers.accum[1], Vec4::splat(0.2));
        assert_eq!(buffers.depth.as_ref().unwrap()[1], 9.0);
    }

    #[test]
    fn test_reconfigure_reencodes_color() {
        let mut buffers = FrameBuffers::default();
        buffers.reconfigure(UVec2::new(1, 1), ColorFormat::Float32, COLOR_ONLY).unwrap();
        buffers.merge(&tile_result(Tile::new(0, 0, 1, 1, 0), Vec4::ONE, 1.0), 0, 1);

        assert!(!buffers.reconfigure(UVec2::new(1, 1), ColorFormat::UFixed8, COLOR_ONLY).unwrap());
        assert_eq!(buffers.color, vec![255; 4]);
        assert!(buffers.depth.is_none());

        assert!(buffers.reconfigure(UVec2::new(3, 1), ColorFormat::UFixed8, WITH_DEPTH).unwrap());
        assert_eq!(buffers.color.len(), 12);
        assert_eq!(buffers.depth.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn test_clear() {
        let mut buffers = FrameBuffers::default();
        buffers.reconfigure(UVec2::new(1, 1), ColorFormat::UFixed8, WITH_DEPTH).unwrap();
        buffers.merge(&tile_result(Tile::new(0, 0, 1, 1, 0), Vec4::ONE, 1.0), 0, 1);
        buffers.frame_index = 4;
        buffers.clear();
        assert_eq!(buffers.color, vec![0; 4]);
        assert_eq!(buffers.depth.as_ref().unwrap()[0], f32::INFINITY);
        assert_eq!(buffers.frame_index, 0);
    }

    #[test]
    fn test_id_channels() {
        let mut buffers = FrameBuffers::default();
        let channels = Channels { depth: false, ids: [true, false, true] };
        buffers.reconfigure(UVec2::new(2, 1), ColorFormat::UFixed8, channels).unwrap();
        assert_eq!(buffers.ids[0].as_deref(), Some(&[u32::MAX, u32::MAX][..]));
        assert!(buffers.ids[1].is_none());

        let tile = Tile::new(0, 0, 2, 1, 0);
        let mut result = tile_result(tile, Vec4::ONE, 1.0);
        result.ids[1] = HitIds { primitive: 3, object: 4, instance: 5 };
        buffers.merge(&result, 0, 1);
        assert_eq!(buffers.ids[0].as_deref(), Some(&[u32::MAX, 3][..]));
        assert_eq!(buffers.ids[2].as_deref(), Some(&[u32::MAX, 5][..]));

        // Later passes overwrite rather than accumulate
        result.ids[1] = HitIds { primitive: 8, object: 8, instance: 8 };
        buffers.merge(&result, 1, 1);
        assert_eq!(buffers.ids[0].as_deref(), Some(&[u32::MAX, 8][..]));

        buffers.clear();
        assert_eq!(buffers.ids[2].as_deref(), Some(&[u32::MAX, u32::MAX][..]));

        buffers.reconfigure(UVec2::new(2, 1), ColorFormat::UFixed8, COLOR_ONLY).unwrap();
        assert!(buffers.ids.iter().all(Option::is_none));
    }

    #[test]
    fn test_oversized_frame_is_an_allocation_error() {
        let mut buffers = FrameBuffers::default();
        buffers.reconfigure(UVec2::new(4, 4), ColorFormat::UFixed8, WITH_DEPTH).unwrap();

        // 70000 x 70000 pixels overflow u32 before anything is allocated
        let result = buffers.reconfigure(UVec2::new(70_000, 70_000), ColorFormat::Float32, WITH_DEPTH);
        assert!(matches!(result, Err(KilnError::Allocation(bytes)) if bytes >= 70_000 * 70_000));
        assert_eq!(buffers.size, UVec2::new(4, 4));
        assert_eq!(buffers.accum.len(), 16);

        assert!(checked_pixel_count(UVec2::new(u32::MAX, 2), 4).is_err());
        assert_eq!(checked_pixel_count(UVec2::new(65_536, 65_535), 4).unwrap(), 65_536 * 65_535);
    }

    #[test]
    fn test_mapping_pixel() {
        let mapping = FrameMapping { data: (0..16).collect(), width: 2, height: 2, pixel_type: DataType::UFixed8Vec4 };
        assert_eq!(mapping.pixel(1, 1), &[12, 13, 14, 15]);
        assert_eq!(mapping.pixel(0, 1), &[8, 9, 10, 11]);
    }
}
