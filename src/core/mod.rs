//! Core plumbing for the post-processing chain
//!
//! Contains the scoped render-target pool, the full-screen pass runner and
//! the shader parameter collection used by light-group bindings.

pub mod params;
pub mod screen_effect;
pub mod targets;

pub use params::{composed, ParameterSet, ParameterValue};
pub use screen_effect::{ScreenEffect, ScreenEffectDesc};
pub use targets::{FrameTargets, RenderTargetPool, TargetDesc, TargetId};
