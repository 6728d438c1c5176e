//! Final color transform group
//!
//! Runs after tone mapping. The group currently carries the
//! luminance-to-channel transform that fast approximate antialiasing relies
//! on; when the whole group is disabled a pass-through scaler takes its
//! place so the chain always produces the final image the same way.

use crate::core::screen_effect::{ScreenEffect, ScreenEffectDesc};
use crate::error::RenderResult;
use crate::post::effect::FrameContext;
use serde::{Deserialize, Serialize};
use wgpu::{Device, TextureFormat, TextureView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorChannel {
    R,
    G,
    B,
    A,
}

impl ColorChannel {
    fn shader_index(self) -> i32 {
        match self {
            ColorChannel::R => 0,
            ColorChannel::G => 1,
            ColorChannel::B => 2,
            ColorChannel::A => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorTransformKind {
    /// Write perceptual luminance into one color channel
    LuminanceToChannel { channel: ColorChannel },
}

/// One transform in the group, individually toggleable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTransform {
    pub kind: ColorTransformKind,
    pub enabled: bool,
}

/// Ordered set of color transforms applied as the last full-screen pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorTransformGroup {
    pub enabled: bool,
    transforms: Vec<ColorTransform>,
}

impl Default for ColorTransformGroup {
    fn default() -> Self {
        Self {
            enabled: true,
            transforms: Vec::new(),
        }
    }
}

impl ColorTransformGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transforms(&self) -> &[ColorTransform] {
        &self.transforms
    }

    /// Find the luminance-to-alpha transform, if present
    pub fn luminance_to_alpha(&self) -> Option<&ColorTransform> {
        self.transforms.iter().find(|t| {
            matches!(
                t.kind,
                ColorTransformKind::LuminanceToChannel {
                    channel: ColorChannel::A
                }
            )
        })
    }

    /// Get or add the luminance-to-alpha transform
    pub fn ensure_luminance_to_alpha(&mut self) -> &mut ColorTransform {
        let index = self.transforms.iter().position(|t| {
            matches!(
                t.kind,
                ColorTransformKind::LuminanceToChannel {
                    channel: ColorChannel::A
                }
            )
        });
        let index = match index {
            Some(index) => index,
            None => {
                self.transforms.push(ColorTransform {
                    kind: ColorTransformKind::LuminanceToChannel {
                        channel: ColorChannel::A,
                    },
                    enabled: false,
                });
                self.transforms.len() - 1
            }
        };
        &mut self.transforms[index]
    }

    /// Active luminance channel for the shader, -1 when none applies
    fn luminance_channel(&self) -> i32 {
        self.transforms
            .iter()
            .filter(|t| t.enabled)
            .find_map(|t| match t.kind {
                ColorTransformKind::LuminanceToChannel { channel } => Some(channel.shader_index()),
            })
            .unwrap_or(-1)
    }
}

/// Keep the group's luminance-to-alpha transform in sync with the installed
/// antialiasing technique: present and enabled exactly while a technique
/// that consumes luminance-in-alpha is active, disabled (never removed)
/// otherwise.
pub fn sync_luminance_to_alpha(group: &mut ColorTransformGroup, uses_luminance: bool, active: bool) {
    if uses_luminance {
        let transform = group.ensure_luminance_to_alpha();
        transform.enabled = active;
    } else if let Some(index) = group
        .transforms
        .iter()
        .position(|t| matches!(t.kind, ColorTransformKind::LuminanceToChannel { .. }))
    {
        group.transforms[index].enabled = false;
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct TransformParams {
    luminance_channel: i32,
    _pad: [i32; 3],
}

/// GPU side of the color transform group
pub struct ColorGradeStage {
    transform_effect: ScreenEffect,
    scaler: ScreenEffect,
}

impl ColorGradeStage {
    pub fn new(device: &Device, output_format: TextureFormat) -> RenderResult<Self> {
        let transform_effect = ScreenEffect::new(
            device,
            &ScreenEffectDesc {
                label: "color_transforms",
                source: include_str!("../shaders/color_transform.wgsl"),
                input_count: 1,
                uniform_size: std::mem::size_of::<TransformParams>() as u64,
                reads_exposure: false,
                additive_blend: false,
                output_format,
            },
        )?;

        let scaler = ScreenEffect::new(
            device,
            &ScreenEffectDesc {
                label: "scaler",
                source: include_str!("../shaders/blit.wgsl"),
                input_count: 1,
                uniform_size: 0,
                reads_exposure: false,
                additive_blend: false,
                output_format,
            },
        )?;

        Ok(Self {
            transform_effect,
            scaler,
        })
    }

    /// Apply the group, or the pass-through scaler when it is disabled
    pub fn draw(
        &self,
        ctx: &mut FrameContext<'_>,
        group: &ColorTransformGroup,
        input: &TextureView,
        output: &TextureView,
    ) -> RenderResult<()> {
        if group.enabled {
            let params = TransformParams {
                luminance_channel: group.luminance_channel(),
                _pad: [0; 3],
            };
            self.transform_effect
                .update_uniforms(ctx.queue, bytemuck::bytes_of(&params))?;
            self.transform_effect
                .draw(ctx.device, ctx.encoder, &[input], None, output)
        } else {
            self.scaler
                .draw(ctx.device, ctx.encoder, &[input], None, output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_luminance_to_alpha_adds_once() {
        let mut group = ColorTransformGroup::new();
        assert!(group.luminance_to_alpha().is_none());

        group.ensure_luminance_to_alpha();
        group.ensure_luminance_to_alpha();
        assert_eq!(group.transforms().len(), 1);
    }

    #[test]
    fn sync_enables_only_while_technique_active() {
        let mut group = ColorTransformGroup::new();

        sync_luminance_to_alpha(&mut group, true, true);
        assert!(group.luminance_to_alpha().is_some());
        assert!(group.luminance_to_alpha().map(|t| t.enabled).unwrap_or(false));

        // Technique disabled: transform stays in the group, toggled off
        sync_luminance_to_alpha(&mut group, true, false);
        assert_eq!(group.transforms().len(), 1);
        assert!(!group.luminance_to_alpha().map(|t| t.enabled).unwrap_or(true));

        // Technique swapped for one that does not use luminance-in-alpha
        sync_luminance_to_alpha(&mut group, false, false);
        assert_eq!(group.transforms().len(), 1);
        assert!(!group.luminance_to_alpha().map(|t| t.enabled).unwrap_or(true));
    }

    #[test]
    fn sync_without_technique_never_adds() {
        let mut group = ColorTransformGroup::new();
        sync_luminance_to_alpha(&mut group, false, false);
        assert!(group.transforms().is_empty());
    }

    #[test]
    fn luminance_channel_reflects_enabled_transform() {
        let mut group = ColorTransformGroup::new();
        assert_eq!(group.luminance_channel(), -1);

        group.ensure_luminance_to_alpha().enabled = true;
        assert_eq!(group.luminance_channel(), 3);

        sync_luminance_to_alpha(&mut group, true, false);
        assert_eq!(group.luminance_channel(), -1);
    }
}
