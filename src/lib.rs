//! HDR post-processing compositor and atmosphere light binding.
//! Rust: wgpu 0.19. Records GPU command streams only; no device ownership,
//! no readback, at most one frame in flight.
//!
//! The compositor sequences sanitize, antialiasing (before or after tone
//! mapping), local reflections, ambient occlusion, fog, depth of field,
//! histogram auto-exposure, bloom, light streak, lens flare, tone mapping
//! and the final color transforms over pooled intermediate targets.
//! Pluggable effects are supplied by the host through the traits in
//! [`post::effect`].

pub mod core;
pub mod error;
pub mod lighting;
pub mod post;

pub use error::{RenderError, RenderResult};
pub use post::{
    AaPlacement, AmbientOcclusion, AntiAliasing, BloomSettings, ColorTransformGroup, Compositor,
    EffectInputs, ExposureSettings, FrameCaps, FrameContext, FramePlan, FrameStage, OutputLayout,
    PostEffect, PostProcessSettings, TargetSemantic, HDR_FORMAT,
};
pub use lighting::{AtmosphereLightGroup, AtmosphereSettings, LightKind, RenderLight};
