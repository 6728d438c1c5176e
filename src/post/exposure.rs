//! Exposure/histogram engine
//!
//! Maintains the compositor's two persistent GPU buffers: a 256-bucket
//! luminance histogram and an 8-float exposure state. In auto mode the
//! histogram is cleared, accumulated over 16x16 tiles and reduced to a
//! smoothed exposure on the GPU; in manual mode the exposure state is
//! overwritten with the configured constant. CPU mirrors of the reduce math
//! are exported for host-side use.

use crate::error::{RenderError, RenderResult};
use crate::post::effect::FrameContext;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use wgpu::util::DeviceExt;
use wgpu::*;

pub const HISTOGRAM_BUCKETS: u32 = 256;
pub const MIN_LOG_LUMINANCE: f32 = -12.0;
pub const MAX_LOG_LUMINANCE: f32 = 2.0;

/// Histogram accumulation tile edge, in pixels
const TILE_SIZE: u32 = 16;

/// Exposure configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureSettings {
    pub auto_key: bool,
    pub key: f32,
    pub min_exposure: f32,
    pub max_exposure: f32,
    pub adaption_speed: f32,
    /// Constant exposure used when `auto_exposure` is off
    pub exposure: f32,
    pub auto_exposure: bool,
}

impl Default for ExposureSettings {
    fn default() -> Self {
        Self {
            auto_key: true,
            key: 0.08,
            min_exposure: 1.0 / 64.0,
            max_exposure: 64.0,
            adaption_speed: 1.1,
            exposure: 2.0,
            auto_exposure: true,
        }
    }
}

/// The 8-float exposure state vector for a constant exposure:
/// `{E, 1/E, E, 0, min_log, max_log, range, 1/range}`
pub fn exposure_buffer_values(exposure: f32) -> [f32; 8] {
    let range = MAX_LOG_LUMINANCE - MIN_LOG_LUMINANCE;
    [
        exposure,
        1.0 / exposure,
        exposure,
        0.0,
        MIN_LOG_LUMINANCE,
        MAX_LOG_LUMINANCE,
        range,
        1.0 / range,
    ]
}

/// Time-constant exponential exposure adaption. Mirrors the reduce shader:
/// identity at `time_delta = 0`, converges on `target` as time grows.
pub fn adapt_exposure(previous: f32, target: f32, adaption_speed: f32, time_delta: f32) -> f32 {
    previous + (target - previous) * (1.0 - (-time_delta * adaption_speed).exp())
}

/// Scene key derived from average luminance when auto-key is enabled
pub fn auto_key(average_luminance: f32) -> f32 {
    1.03 - 2.0 / (2.0 + (average_luminance + 1.0).log10())
}

/// Target exposure for an average scene luminance, before adaption
pub fn target_exposure(settings: &ExposureSettings, average_luminance: f32) -> f32 {
    let key = if settings.auto_key {
        auto_key(average_luminance)
    } else {
        settings.key
    };
    (key / average_luminance.max(1e-4)).clamp(settings.min_exposure, settings.max_exposure)
}

/// Histogram bucket for a linear luminance value. Mirrors the histogram
/// shader's log2 mapping over `[MIN_LOG_LUMINANCE, MAX_LOG_LUMINANCE]`.
pub fn luminance_bucket(luminance: f32) -> u32 {
    let range = MAX_LOG_LUMINANCE - MIN_LOG_LUMINANCE;
    let normalized = ((luminance.max(1e-6).log2() - MIN_LOG_LUMINANCE) / range).clamp(0.0, 1.0);
    (normalized * 255.0) as u32
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ReduceParams {
    pixel_count: u32,
    auto_key: u32,
    key: f32,
    min_exposure: f32,
    max_exposure: f32,
    adaption_speed: f32,
    time_delta: f32,
    _pad: f32,
}

/// GPU-resident exposure engine, owned by the compositor
pub struct ExposureEngine {
    histogram: Buffer,
    exposure: Buffer,
    histogram_pipeline: ComputePipeline,
    histogram_layout: BindGroupLayout,
    reduce_pipeline: ComputePipeline,
    reduce_layout: BindGroupLayout,
    reduce_params: Buffer,
    debug_pipeline: ComputePipeline,
    debug_layout: BindGroupLayout,
}

impl ExposureEngine {
    pub fn new(device: &Device, settings: &ExposureSettings) -> RenderResult<Self> {
        let histogram = device.create_buffer_init(&util::BufferInitDescriptor {
            label: Some("exposure_histogram"),
            contents: bytemuck::cast_slice(&[0u32; HISTOGRAM_BUCKETS as usize]),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
        });

        // The exposure state must hold a valid positive exposure before the
        // first bright pass reads it.
        let exposure = device.create_buffer_init(&util::BufferInitDescriptor {
            label: Some("exposure_state"),
            contents: bytemuck::cast_slice(&exposure_buffer_values(settings.exposure)),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
        });

        let histogram_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("histogram_layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: false },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let reduce_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("histogram_reduce_layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let debug_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("histogram_debug_layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::StorageTexture {
                        access: StorageTextureAccess::WriteOnly,
                        format: TextureFormat::Rgba8Unorm,
                        view_dimension: TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let histogram_shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("histogram_shader"),
            source: ShaderSource::Wgsl(Cow::Borrowed(include_str!("../shaders/histogram.wgsl"))),
        });
        let reduce_shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("histogram_reduce_shader"),
            source: ShaderSource::Wgsl(Cow::Borrowed(include_str!(
                "../shaders/histogram_reduce.wgsl"
            ))),
        });
        let debug_shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("histogram_debug_shader"),
            source: ShaderSource::Wgsl(Cow::Borrowed(include_str!(
                "../shaders/histogram_debug.wgsl"
            ))),
        });

        let histogram_pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("histogram_pipeline_layout"),
            bind_group_layouts: &[&histogram_layout],
            push_constant_ranges: &[],
        });
        let reduce_pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("histogram_reduce_pipeline_layout"),
            bind_group_layouts: &[&reduce_layout],
            push_constant_ranges: &[],
        });
        let debug_pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("histogram_debug_pipeline_layout"),
            bind_group_layouts: &[&debug_layout],
            push_constant_ranges: &[],
        });

        let histogram_pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("histogram_pipeline"),
            layout: Some(&histogram_pipeline_layout),
            module: &histogram_shader,
            entry_point: "main",
        });
        let reduce_pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("histogram_reduce_pipeline"),
            layout: Some(&reduce_pipeline_layout),
            module: &reduce_shader,
            entry_point: "main",
        });
        let debug_pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("histogram_debug_pipeline"),
            layout: Some(&debug_pipeline_layout),
            module: &debug_shader,
            entry_point: "main",
        });

        let reduce_params = device.create_buffer(&BufferDescriptor {
            label: Some("histogram_reduce_params"),
            size: std::mem::size_of::<ReduceParams>() as BufferAddress,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            histogram,
            exposure,
            histogram_pipeline,
            histogram_layout,
            reduce_pipeline,
            reduce_layout,
            reduce_params,
            debug_pipeline,
            debug_layout,
        })
    }

    /// The persistent exposure state buffer, read by the bright pass and the
    /// tone map stage.
    pub fn exposure_buffer(&self) -> &Buffer {
        &self.exposure
    }

    /// Bring the exposure state up to date for this frame, either from the
    /// histogram (auto) or from the configured constant (manual).
    pub fn update(
        &self,
        ctx: &mut FrameContext<'_>,
        settings: &ExposureSettings,
        input: &TextureView,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        if !settings.auto_exposure {
            ctx.queue.write_buffer(
                &self.exposure,
                0,
                bytemuck::cast_slice(&exposure_buffer_values(settings.exposure)),
            );
            return Ok(());
        }

        if width == 0 || height == 0 {
            return Err(RenderError::render("histogram input has zero extent"));
        }

        ctx.encoder.clear_buffer(&self.histogram, 0, None);

        let histogram_bind_group = ctx.device.create_bind_group(&BindGroupDescriptor {
            label: Some("histogram_bind_group"),
            layout: &self.histogram_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(input),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: self.histogram.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: self.exposure.as_entire_binding(),
                },
            ],
        });

        let params = ReduceParams {
            pixel_count: width * height,
            auto_key: settings.auto_key as u32,
            key: settings.key,
            min_exposure: settings.min_exposure,
            max_exposure: settings.max_exposure,
            adaption_speed: settings.adaption_speed,
            time_delta: ctx.time_delta,
            _pad: 0.0,
        };
        ctx.queue
            .write_buffer(&self.reduce_params, 0, bytemuck::bytes_of(&params));

        let reduce_bind_group = ctx.device.create_bind_group(&BindGroupDescriptor {
            label: Some("histogram_reduce_bind_group"),
            layout: &self.reduce_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: self.histogram.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: self.exposure.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: self.reduce_params.as_entire_binding(),
                },
            ],
        });

        {
            let mut pass = ctx.encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("histogram_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.histogram_pipeline);
            pass.set_bind_group(0, &histogram_bind_group, &[]);
            pass.dispatch_workgroups(
                (width + TILE_SIZE - 1) / TILE_SIZE,
                (height + TILE_SIZE - 1) / TILE_SIZE,
                1,
            );
        }

        {
            let mut pass = ctx.encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("histogram_reduce_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.reduce_pipeline);
            pass.set_bind_group(0, &reduce_bind_group, &[]);
            pass.dispatch_workgroups(1, 1, 1);
        }

        Ok(())
    }

    /// Draw the histogram bars into a storage-capable copy of the output
    pub fn draw_debug_overlay(
        &self,
        ctx: &mut FrameContext<'_>,
        debug_target: &TextureView,
    ) -> RenderResult<()> {
        let bind_group = ctx.device.create_bind_group(&BindGroupDescriptor {
            label: Some("histogram_debug_bind_group"),
            layout: &self.debug_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: self.histogram.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(debug_target),
                },
            ],
        });

        let mut pass = ctx.encoder.begin_compute_pass(&ComputePassDescriptor {
            label: Some("histogram_debug_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.debug_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(1, 32, 1);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_mapping_spans_the_log_range() {
        assert_eq!(luminance_bucket(0.0), 0);
        assert_eq!(luminance_bucket(2f32.powf(MIN_LOG_LUMINANCE)), 0);
        assert_eq!(luminance_bucket(2f32.powf(MAX_LOG_LUMINANCE)), 255);
        assert_eq!(luminance_bucket(1e10), 255);

        let mid = luminance_bucket(2f32.powf(-5.0));
        assert_eq!(mid, 127);
    }

    #[test]
    fn bucket_mapping_is_monotone() {
        let mut previous = 0;
        for i in 0..64 {
            let lum = 2f32.powf(MIN_LOG_LUMINANCE + i as f32 * 0.25);
            let bucket = luminance_bucket(lum);
            assert!(bucket >= previous);
            previous = bucket;
        }
    }
}
