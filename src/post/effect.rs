//! Effect invocation protocol
//!
//! Pluggable effects (fog, depth of field, local reflections, light streak,
//! lens flare, antialiasing techniques) are external components. The
//! compositor talks to them through these traits only: per-frame transient
//! input views in, one output view out, plus capability flags telling the
//! orchestrator which optional G-buffers to bind.

use crate::error::RenderResult;
use wgpu::{CommandEncoder, Device, Queue, TextureView};

/// Per-frame recording context handed to every pass
pub struct FrameContext<'a> {
    pub device: &'a Device,
    pub queue: &'a Queue,
    pub encoder: &'a mut CommandEncoder,
    /// Seconds elapsed since the previous frame, drives exposure adaption
    pub time_delta: f32,
    pub near_plane: f32,
    pub far_plane: f32,
}

/// Input views for one effect invocation, borrowed for the duration of the
/// call. Optional slots are populated only when the effect requests them.
pub struct EffectInputs<'a> {
    pub color: &'a TextureView,
    pub depth: Option<&'a TextureView>,
    pub normals: Option<&'a TextureView>,
    pub specular_roughness: Option<&'a TextureView>,
    pub reflection_normals: Option<&'a TextureView>,
    pub reflection_roughness: Option<&'a TextureView>,
    pub velocity: Option<&'a TextureView>,
}

impl<'a> EffectInputs<'a> {
    pub fn new(color: &'a TextureView) -> Self {
        Self {
            color,
            depth: None,
            normals: None,
            specular_roughness: None,
            reflection_normals: None,
            reflection_roughness: None,
            velocity: None,
        }
    }
}

/// Contract every pluggable image effect satisfies
pub trait PostEffect {
    fn name(&self) -> &str;

    fn enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    /// Optional G-buffer requirements, bound by the orchestrator before `draw`
    fn requires_depth(&self) -> bool {
        false
    }

    fn requires_velocity(&self) -> bool {
        false
    }

    fn requires_normals(&self) -> bool {
        false
    }

    /// Record the effect. A disabled effect is never drawn; skipping it must
    /// not alter buffer lifetime elsewhere in the chain.
    fn draw(
        &mut self,
        ctx: &mut FrameContext<'_>,
        inputs: &EffectInputs<'_>,
        output: &TextureView,
    ) -> RenderResult<()>;
}

/// Screen-space antialiasing technique
pub trait AntiAliasing: PostEffect {
    /// The technique's contrast metric assumes display-referred input, so the
    /// compositor must wrap it in range compression/decompression when it
    /// runs before tone mapping.
    fn needs_range_decompress(&self) -> bool {
        false
    }

    /// Fast approximate techniques read perceptual luma from the alpha
    /// channel of their input.
    fn uses_luminance_in_alpha(&self) -> bool {
        false
    }

    fn input_luminance_in_alpha(&self) -> bool {
        false
    }

    fn set_input_luminance_in_alpha(&mut self, _value: bool) {}
}

/// Ambient occlusion is a distinct capability: optionally absent entirely,
/// and it produces its own output target instead of binding one.
pub trait AmbientOcclusion {
    fn requires_normals(&self) -> bool {
        false
    }

    fn draw(
        &mut self,
        ctx: &mut FrameContext<'_>,
        color: &TextureView,
        depth: Option<&TextureView>,
        normals: Option<&TextureView>,
    ) -> RenderResult<TextureView>;
}
