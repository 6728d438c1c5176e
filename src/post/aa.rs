//! Antialiasing placement strategy
//!
//! Antialiasing can run before tone mapping (on range-compressed HDR, the
//! hybrid scheme) or after tone mapping on the final image. The placement is
//! configuration data; the observed setups use "before", but both paths are
//! supported. This module carries the range compression pair that makes a
//! display-referred contrast metric valid on HDR linear color.

use crate::core::screen_effect::{ScreenEffect, ScreenEffectDesc};
use crate::error::RenderResult;
use crate::post::effect::FrameContext;
use serde::{Deserialize, Serialize};
use wgpu::{Device, TextureFormat, TextureView};

/// Where antialiasing executes relative to tone mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AaPlacement {
    /// Before tone mapping, wrapped in range compression when the technique
    /// needs it
    #[default]
    BeforeToneMap,
    /// After tone mapping and color transforms, on the final image
    AfterToneMap,
}

/// Range compression/decompression pass pair
pub struct RangeCompression {
    compress: ScreenEffect,
    decompress: ScreenEffect,
}

impl RangeCompression {
    pub fn new(device: &Device, format: TextureFormat) -> RenderResult<Self> {
        let compress = ScreenEffect::new(
            device,
            &ScreenEffectDesc {
                label: "range_compress",
                source: include_str!("../shaders/range_compress.wgsl"),
                input_count: 1,
                uniform_size: 0,
                reads_exposure: false,
                additive_blend: false,
                output_format: format,
            },
        )?;
        let decompress = ScreenEffect::new(
            device,
            &ScreenEffectDesc {
                label: "range_decompress",
                source: include_str!("../shaders/range_decompress.wgsl"),
                input_count: 1,
                uniform_size: 0,
                reads_exposure: false,
                additive_blend: false,
                output_format: format,
            },
        )?;
        Ok(Self {
            compress,
            decompress,
        })
    }

    /// Fold HDR into display range, perceptual luma into alpha
    pub fn compress(
        &self,
        ctx: &mut FrameContext<'_>,
        input: &TextureView,
        output: &TextureView,
    ) -> RenderResult<()> {
        self.compress
            .draw(ctx.device, ctx.encoder, &[input], None, output)
    }

    /// Restore HDR range after the technique ran
    pub fn decompress(
        &self,
        ctx: &mut FrameContext<'_>,
        input: &TextureView,
        output: &TextureView,
    ) -> RenderResult<()> {
        self.decompress
            .draw(ctx.device, ctx.encoder, &[input], None, output)
    }
}
