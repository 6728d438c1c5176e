//! Tone map stage
//!
//! Maps HDR scene color plus the bloom contribution to display range with
//! the ACES filmic curve, scaled by the frame exposure.

use crate::core::screen_effect::{ScreenEffect, ScreenEffectDesc};
use crate::error::RenderResult;
use crate::post::effect::FrameContext;
use wgpu::{Buffer, Device, TextureFormat, TextureView};

pub struct ToneMapStage {
    effect: ScreenEffect,
}

impl ToneMapStage {
    pub fn new(device: &Device, format: TextureFormat) -> RenderResult<Self> {
        let effect = ScreenEffect::new(
            device,
            &ScreenEffectDesc {
                label: "tone_map",
                source: include_str!("../shaders/tonemap.wgsl"),
                input_count: 2,
                uniform_size: 0,
                reads_exposure: true,
                additive_blend: false,
                output_format: format,
            },
        )?;
        Ok(Self { effect })
    }

    pub fn draw(
        &self,
        ctx: &mut FrameContext<'_>,
        color: &TextureView,
        bloom: &TextureView,
        exposure: &Buffer,
        output: &TextureView,
    ) -> RenderResult<()> {
        self.effect
            .draw(ctx.device, ctx.encoder, &[color, bloom], Some(exposure), output)
    }
}
