//! Bloom engine
//!
//! Bright-pass extraction followed by an iterative downsample/upsample
//! pyramid. Downsample levels are retained and consumed in reverse during
//! upsampling, where each step blends additively into the level above.

use crate::core::screen_effect::{ScreenEffect, ScreenEffectDesc};
use crate::core::targets::{FrameTargets, TargetDesc, TargetId};
use crate::error::RenderResult;
use crate::post::effect::FrameContext;
use serde::{Deserialize, Serialize};
use wgpu::{Buffer, Device, TextureFormat};

/// Bloom configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    pub strength: f32,
    pub radius: f32,
    pub down_samples: u32,
    pub bright_pass_steepness: f32,
    pub threshold_offset: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            strength: 0.5,
            radius: 1.0,
            down_samples: 5,
            bright_pass_steepness: 2.0,
            threshold_offset: 4.0,
        }
    }
}

/// Pyramid level sizes for a given base resolution: the bright pass at full
/// size plus `down_samples` halvings. Integer halving may lose a pixel at
/// odd sizes; levels never shrink below 1x1.
pub fn pyramid_levels(width: u32, height: u32, down_samples: u32) -> Vec<(u32, u32)> {
    let mut levels = Vec::with_capacity(down_samples as usize + 1);
    let mut size = (width.max(1), height.max(1));
    levels.push(size);
    for _ in 0..down_samples {
        size = ((size.0 / 2).max(1), (size.1 / 2).max(1));
        levels.push(size);
    }
    levels
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct BrightPassParams {
    steepness: f32,
    threshold_offset: f32,
    _pad: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct UpSampleParams {
    strength: f32,
    radius: f32,
    _pad: [f32; 2],
}

/// Source image for the bright pass: either a pooled target from the
/// current frame scope or a view owned elsewhere (e.g. by the ambient
/// occlusion effect)
#[derive(Clone, Copy)]
pub enum BloomInput<'a> {
    Target(TargetId),
    View(&'a wgpu::TextureView),
}

/// Targets produced by one bloom draw, valid for the current frame scope
pub struct BloomOutput {
    /// Full-resolution bright-pass result, consumed by light streak and
    /// lens flare
    pub bright_pass: TargetId,
    /// Final bloom contribution at full resolution (the bright pass itself
    /// when no downsampling is configured)
    pub bloom: TargetId,
}

/// GPU pipelines for the bloom chain
pub struct BloomEngine {
    bright_pass: ScreenEffect,
    down_sample: ScreenEffect,
    up_sample: ScreenEffect,
    format: TextureFormat,
}

impl BloomEngine {
    pub fn new(device: &Device, format: TextureFormat) -> RenderResult<Self> {
        let bright_pass = ScreenEffect::new(
            device,
            &ScreenEffectDesc {
                label: "bloom_bright_pass",
                source: include_str!("../shaders/bloom_brightpass.wgsl"),
                input_count: 1,
                uniform_size: std::mem::size_of::<BrightPassParams>() as u64,
                reads_exposure: true,
                additive_blend: false,
                output_format: format,
            },
        )?;

        let down_sample = ScreenEffect::new(
            device,
            &ScreenEffectDesc {
                label: "bloom_down_sample",
                source: include_str!("../shaders/bloom_downsample.wgsl"),
                input_count: 1,
                uniform_size: 0,
                reads_exposure: false,
                additive_blend: false,
                output_format: format,
            },
        )?;

        let up_sample = ScreenEffect::new(
            device,
            &ScreenEffectDesc {
                label: "bloom_up_sample",
                source: include_str!("../shaders/bloom_upsample.wgsl"),
                input_count: 1,
                uniform_size: std::mem::size_of::<UpSampleParams>() as u64,
                reads_exposure: false,
                additive_blend: true,
                output_format: format,
            },
        )?;

        Ok(Self {
            bright_pass,
            down_sample,
            up_sample,
            format,
        })
    }

    /// Record the full bloom chain for this frame
    pub fn draw(
        &self,
        ctx: &mut FrameContext<'_>,
        settings: &BloomSettings,
        input: BloomInput<'_>,
        width: u32,
        height: u32,
        exposure: &Buffer,
        frame: &mut FrameTargets<'_>,
    ) -> RenderResult<BloomOutput> {
        let bright_params = BrightPassParams {
            steepness: settings.bright_pass_steepness,
            threshold_offset: settings.threshold_offset,
            _pad: [0.0; 2],
        };
        self.bright_pass
            .update_uniforms(ctx.queue, bytemuck::bytes_of(&bright_params))?;

        let up_params = UpSampleParams {
            strength: settings.strength,
            radius: settings.radius,
            _pad: [0.0; 2],
        };
        self.up_sample
            .update_uniforms(ctx.queue, bytemuck::bytes_of(&up_params))?;

        let levels = pyramid_levels(width, height, settings.down_samples);

        // Bright pass at full resolution
        let bright = frame.acquire(
            ctx.device,
            TargetDesc::color(levels[0].0, levels[0].1, self.format),
        );
        let input_view = match input {
            BloomInput::Target(id) => frame.view(id),
            BloomInput::View(view) => view,
        };
        self.bright_pass.draw(
            ctx.device,
            ctx.encoder,
            &[input_view],
            Some(exposure),
            frame.view(bright),
        )?;

        // Downsample chain, retaining every level for the upsample pass
        let mut pyramid = Vec::with_capacity(levels.len());
        pyramid.push(bright);
        for level in &levels[1..] {
            let target = frame.acquire(ctx.device, TargetDesc::color(level.0, level.1, self.format));
            let source = pyramid[pyramid.len() - 1];
            self.down_sample.draw(
                ctx.device,
                ctx.encoder,
                &[frame.view(source)],
                None,
                frame.view(target),
            )?;
            pyramid.push(target);
        }

        // Upsample in strict reverse order, accumulating into each retained
        // level. With no downsamples the bright pass is the bloom output.
        let mut current = pyramid[pyramid.len() - 1];
        for index in (0..pyramid.len() - 1).rev() {
            let target = pyramid[index];
            self.up_sample.draw(
                ctx.device,
                ctx.encoder,
                &[frame.view(current)],
                None,
                frame.view(target),
            )?;
            current = target;
        }

        Ok(BloomOutput {
            bright_pass: bright,
            bloom: current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_configuration_surface() {
        let settings = BloomSettings::default();
        assert_eq!(settings.strength, 0.5);
        assert_eq!(settings.radius, 1.0);
        assert_eq!(settings.down_samples, 5);
        assert_eq!(settings.bright_pass_steepness, 2.0);
        assert_eq!(settings.threshold_offset, 4.0);
    }
}
