//! Full-screen-triangle effect runner
//!
//! Every raster pass in the post-processing chain (sanitize, bright pass,
//! bloom resampling, tone map, range compression, color transforms, blit) is
//! an instance of `ScreenEffect`: one WGSL shader drawn as a full-screen
//! triangle with a fixed binding convention.
//!
//! Binding layout, in order: sampled inputs at 0..input_count, the shared
//! sampler next, then the uniform buffer (if any), then the exposure storage
//! buffer (if the pass reads exposure).

use crate::error::{RenderError, RenderResult};
use std::borrow::Cow;
use wgpu::*;

/// Static description of a screen effect pass
pub struct ScreenEffectDesc<'a> {
    pub label: &'a str,
    /// WGSL source with `vs_main`/`fs_main` entry points
    pub source: &'a str,
    /// Number of sampled texture inputs
    pub input_count: u32,
    /// Size of the uniform struct in bytes, 0 for none
    pub uniform_size: u64,
    /// Bind the compositor's exposure buffer as read-only storage
    pub reads_exposure: bool,
    /// Additive (ONE, ONE) blending; the destination is loaded, not cleared
    pub additive_blend: bool,
    pub output_format: TextureFormat,
}

/// A reusable full-screen pass: pipeline, layout and uniform storage
pub struct ScreenEffect {
    label: String,
    pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    sampler: Sampler,
    uniform_buffer: Option<Buffer>,
    input_count: u32,
    reads_exposure: bool,
    additive_blend: bool,
}

impl ScreenEffect {
    pub fn new(device: &Device, desc: &ScreenEffectDesc<'_>) -> RenderResult<Self> {
        let mut entries = Vec::new();

        for binding in 0..desc.input_count {
            entries.push(BindGroupLayoutEntry {
                binding,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }

        entries.push(BindGroupLayoutEntry {
            binding: desc.input_count,
            visibility: ShaderStages::FRAGMENT,
            ty: BindingType::Sampler(SamplerBindingType::Filtering),
            count: None,
        });

        let mut next_binding = desc.input_count + 1;
        if desc.uniform_size > 0 {
            entries.push(BindGroupLayoutEntry {
                binding: next_binding,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
            next_binding += 1;
        }
        if desc.reads_exposure {
            entries.push(BindGroupLayoutEntry {
                binding: next_binding,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some(&format!("{}_layout", desc.label)),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(&format!("{}_pipeline_layout", desc.label)),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let shader_module = device.create_shader_module(ShaderModuleDescriptor {
            label: Some(&format!("{}_shader", desc.label)),
            source: ShaderSource::Wgsl(Cow::Borrowed(desc.source)),
        });

        let blend = if desc.additive_blend {
            Some(BlendState {
                color: BlendComponent {
                    src_factor: BlendFactor::One,
                    dst_factor: BlendFactor::One,
                    operation: BlendOperation::Add,
                },
                alpha: BlendComponent {
                    src_factor: BlendFactor::One,
                    dst_factor: BlendFactor::One,
                    operation: BlendOperation::Add,
                },
            })
        } else {
            None
        };

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(&format!("{}_pipeline", desc.label)),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader_module,
                entry_point: "vs_main",
                buffers: &[], // Full-screen triangle needs no vertex buffer
            },
            fragment: Some(FragmentState {
                module: &shader_module,
                entry_point: "fs_main",
                targets: &[Some(ColorTargetState {
                    format: desc.output_format,
                    blend,
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some(&format!("{}_sampler", desc.label)),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            ..Default::default()
        });

        let uniform_buffer = if desc.uniform_size > 0 {
            Some(device.create_buffer(&BufferDescriptor {
                label: Some(&format!("{}_uniforms", desc.label)),
                size: desc.uniform_size,
                usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }))
        } else {
            None
        };

        Ok(Self {
            label: desc.label.to_string(),
            pipeline,
            bind_group_layout,
            sampler,
            uniform_buffer,
            input_count: desc.input_count,
            reads_exposure: desc.reads_exposure,
            additive_blend: desc.additive_blend,
        })
    }

    /// Write the pass uniforms. Values apply to every recording until the
    /// next write that precedes a queue submit.
    pub fn update_uniforms(&self, queue: &Queue, data: &[u8]) -> RenderResult<()> {
        let buffer = self
            .uniform_buffer
            .as_ref()
            .ok_or_else(|| RenderError::upload(format!("{} has no uniform buffer", self.label)))?;
        queue.write_buffer(buffer, 0, data);
        Ok(())
    }

    /// Record the pass: bind inputs and draw one full-screen triangle
    pub fn draw(
        &self,
        device: &Device,
        encoder: &mut CommandEncoder,
        inputs: &[&TextureView],
        exposure: Option<&Buffer>,
        output: &TextureView,
    ) -> RenderResult<()> {
        if inputs.len() != self.input_count as usize {
            return Err(RenderError::render(format!(
                "{} expects {} inputs, got {}",
                self.label,
                self.input_count,
                inputs.len()
            )));
        }
        if self.reads_exposure && exposure.is_none() {
            return Err(RenderError::render(format!(
                "{} requires the exposure buffer",
                self.label
            )));
        }

        let mut entries = Vec::new();
        for (binding, &input) in inputs.iter().enumerate() {
            entries.push(BindGroupEntry {
                binding: binding as u32,
                resource: BindingResource::TextureView(input),
            });
        }
        entries.push(BindGroupEntry {
            binding: self.input_count,
            resource: BindingResource::Sampler(&self.sampler),
        });
        let mut next_binding = self.input_count + 1;
        if let Some(buffer) = &self.uniform_buffer {
            entries.push(BindGroupEntry {
                binding: next_binding,
                resource: buffer.as_entire_binding(),
            });
            next_binding += 1;
        }
        if self.reads_exposure {
            if let Some(buffer) = exposure {
                entries.push(BindGroupEntry {
                    binding: next_binding,
                    resource: buffer.as_entire_binding(),
                });
            }
        }

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some(&format!("{}_bind_group", self.label)),
            layout: &self.bind_group_layout,
            entries: &entries,
        });

        // Additive passes accumulate into retained content, so the target is
        // loaded instead of cleared.
        let load = if self.additive_blend {
            LoadOp::Load
        } else {
            LoadOp::Clear(Color::BLACK)
        };

        {
            let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some(&self.label),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: output,
                    resolve_target: None,
                    ops: Operations {
                        load,
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        Ok(())
    }
}
