// ============================================================================
// GPU BRUSH — stamp pipeline rendering into a layer's texture
// ============================================================================
//
// Two pipelines, one shader: pen and eraser differ only in the fixed-
// function blend state.  The pen pair is classic source-over
// (SRC_ALPHA / ONE_MINUS_SRC_ALPHA); the eraser pair (ZERO /
// ONE_MINUS_SRC_ALPHA) scales the destination down by the stamp's coverage,
// which genuinely removes alpha instead of painting over it.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::context::GpuContext;

/// Per-stamp uniforms.  Layout matches `StampUniforms` in the WGSL source.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct StampUniforms {
    pub center: [f32; 2],
    pub radius: f32,
    pub _pad0: f32,
    /// Straight (non-premultiplied) RGBA in [0, 1].
    pub color: [f32; 4],
    pub canvas_size: [f32; 2],
    pub _pad1: [f32; 2],
}

impl StampUniforms {
    pub fn new(center: (f32, f32), radius: f32, color: [f32; 4], canvas_size: (u32, u32)) -> Self {
        Self {
            center: [center.0, center.1],
            radius,
            _pad0: 0.0,
            color,
            canvas_size: [canvas_size.0 as f32, canvas_size.1 as f32],
            _pad1: [0.0; 2],
        }
    }
}

pub struct BrushPipeline {
    pen_pipeline: wgpu::RenderPipeline,
    eraser_pipeline: wgpu::RenderPipeline,
    uniform_bgl: wgpu::BindGroupLayout,
}

impl BrushPipeline {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("brush_stamp_shader"),
            source: wgpu::ShaderSource::Wgsl(super::shaders::BRUSH_STAMP_SHADER.into()),
        });

        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("stamp_uniform_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("brush_pipeline_layout"),
            bind_group_layouts: &[&uniform_bgl],
            push_constant_ranges: &[],
        });

        let pen_blend = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        };
        let eraser_blend = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Zero,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Zero,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let make_pipeline = |label: &str, blend: wgpu::BlendState| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_stamp",
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_stamp",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                multiview: None,
            })
        };

        Self {
            pen_pipeline: make_pipeline("brush_pen_pipeline", pen_blend),
            eraser_pipeline: make_pipeline("brush_eraser_pipeline", eraser_blend),
            uniform_bgl,
        }
    }

    /// Render a run of stamps into `target` (a layer's texture view).
    /// All stamps go into one command submission.
    pub fn draw_stamps(
        &self,
        ctx: &GpuContext,
        target: &wgpu::TextureView,
        stamps: &[StampUniforms],
        is_eraser: bool,
    ) {
        if stamps.is_empty() {
            return;
        }
        let device = &ctx.device;

        let pipeline = if is_eraser {
            &self.eraser_pipeline
        } else {
            &self.pen_pipeline
        };

        // One uniform buffer + bind group per stamp; tiny buffers, batched
        // into a single pass.
        let bind_groups: Vec<wgpu::BindGroup> = stamps
            .iter()
            .map(|uniforms| {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("stamp_uniform_buf"),
                    contents: bytemuck::bytes_of(uniforms),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("stamp_uniform_bg"),
                    layout: &self.uniform_bgl,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                })
            })
            .collect();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("brush_stamp_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("brush_stamp_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            for bg in &bind_groups {
                pass.set_bind_group(0, bg, &[]);
                pass.draw(0..6, 0..1);
            }
        }
        ctx.submit_one(encoder);
    }
}
