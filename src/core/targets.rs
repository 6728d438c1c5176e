//! Scoped render-target pooling for the post-processing chain
//!
//! Intermediate targets are acquired from a pool for the duration of a single
//! frame draw and released when the frame scope ends, including on early
//! return. Released targets are kept alive and reused by matching descriptor
//! on later frames; targets that stay idle for several frames are evicted.

use log::trace;
use wgpu::{
    Device, Extent3d, Texture, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages,
    TextureView, TextureViewDescriptor,
};

/// Frames a pooled target may sit unused before it is dropped.
const EVICT_AFTER_FRAMES: u64 = 8;

/// Descriptor for a pooled render target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsages,
}

impl TargetDesc {
    /// Standard color target: render attachment that later passes can sample
    pub fn color(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
        }
    }

    /// Storage-capable target for compute passes that also gets copied to and from
    pub fn storage(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            usage: TextureUsages::STORAGE_BINDING
                | TextureUsages::TEXTURE_BINDING
                | TextureUsages::COPY_SRC
                | TextureUsages::COPY_DST,
        }
    }
}

/// Handle to a target acquired for the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetId(usize);

#[derive(Debug)]
struct PoolEntry {
    desc: TargetDesc,
    texture: Texture,
    view: TextureView,
    in_use: bool,
    last_used_frame: u64,
}

/// Pool of reusable intermediate render targets
#[derive(Debug)]
pub struct RenderTargetPool {
    entries: Vec<PoolEntry>,
    frame_index: u64,
}

impl RenderTargetPool {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            frame_index: 0,
        }
    }

    /// Open the per-frame acquisition scope. Everything acquired through the
    /// returned guard is released when the guard drops.
    pub fn begin_frame(&mut self) -> FrameTargets<'_> {
        self.frame_index += 1;
        let frame = self.frame_index;
        self.entries
            .retain(|e| e.in_use || frame.saturating_sub(e.last_used_frame) <= EVICT_AFTER_FRAMES);
        FrameTargets { pool: self }
    }

    /// Number of targets currently kept alive by the pool
    pub fn allocated(&self) -> usize {
        self.entries.len()
    }
}

impl Default for RenderTargetPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame-scoped view of the pool. Dropping the guard releases every target
/// acquired during the frame, regardless of how the draw scope exits.
#[derive(Debug)]
pub struct FrameTargets<'a> {
    pool: &'a mut RenderTargetPool,
}

impl<'a> FrameTargets<'a> {
    /// Acquire a target matching `desc`, reusing a released one when possible
    pub fn acquire(&mut self, device: &Device, desc: TargetDesc) -> TargetId {
        let frame = self.pool.frame_index;

        if let Some(index) = self
            .pool
            .entries
            .iter()
            .position(|e| !e.in_use && e.desc == desc)
        {
            let entry = &mut self.pool.entries[index];
            entry.in_use = true;
            entry.last_used_frame = frame;
            return TargetId(index);
        }

        let texture = device.create_texture(&TextureDescriptor {
            label: Some("scoped_render_target"),
            size: Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor::default());

        trace!(
            "scoped target pool grew to {}: {}x{} {:?}",
            self.pool.entries.len() + 1,
            desc.width,
            desc.height,
            desc.format
        );

        let index = self.pool.entries.len();
        self.pool.entries.push(PoolEntry {
            desc,
            texture,
            view,
            in_use: true,
            last_used_frame: frame,
        });

        TargetId(index)
    }

    pub fn view(&self, id: TargetId) -> &TextureView {
        &self.pool.entries[id.0].view
    }

    pub fn texture(&self, id: TargetId) -> &Texture {
        &self.pool.entries[id.0].texture
    }

    /// Number of targets held by the current frame scope
    pub fn in_use(&self) -> usize {
        self.pool.entries.iter().filter(|e| e.in_use).count()
    }
}

impl Drop for FrameTargets<'_> {
    fn drop(&mut self) {
        for entry in &mut self.pool.entries {
            entry.in_use = false;
        }
    }
}
