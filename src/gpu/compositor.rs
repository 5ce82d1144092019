// ============================================================================
// COMPOSITOR — ping-pong blend-mode compositing and readback
// ============================================================================
//
// Hardware alpha blending can only express Normal, so the compositor
// disables it and runs every layer through a blend-mode-selecting fragment
// shader instead.  Two offscreen textures alternate roles:
//
//   - `ping`: background accumulator (read)
//   - `pong`: destination (write)
//   - after each layer, swap ping ↔ pong.
//
// The first pass clears ping to transparent; every visible layer then
// renders one full-screen quad sampling both its own texture and the
// accumulator.  Whichever texture received the last write holds the final
// composite.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::context::GpuContext;
use super::texture::LayerTexture;
use crate::log_err;

/// Per-layer uniforms for the blend shader.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct BlendUniforms {
    pub opacity: f32,
    pub blend_mode: u32,
    pub _pad: [f32; 2],
}

pub struct Compositor {
    pub pipeline: wgpu::RenderPipeline,
    /// Bind group layout for blend uniforms (group 0).
    pub blend_uniform_bgl: wgpu::BindGroupLayout,
    /// Bind group layout for a texture+sampler pair (group 1 = fg, group 2 = bg).
    pub tex_sampler_bgl: wgpu::BindGroupLayout,
    pub sampler_linear: wgpu::Sampler,
    pub output_format: wgpu::TextureFormat,
    /// Cached per-layer uniform buffers and bind groups, reused across
    /// frames via `queue.write_buffer()`.
    cached_blend_slots: Vec<(wgpu::Buffer, wgpu::BindGroup)>,
}

impl Compositor {
    pub fn new(device: &wgpu::Device) -> Self {
        let output_format = wgpu::TextureFormat::Rgba8Unorm;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("layer_blend_shader"),
            source: wgpu::ShaderSource::Wgsl(super::shaders::LAYER_BLEND_SHADER.into()),
        });

        // Group 0: BlendUniforms (opacity, blend_mode)
        let blend_uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blend_uniform_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        // Groups 1 & 2: texture + sampler (same layout for fg and bg)
        let tex_sampler_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tex_sampler_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("layer_blend_pipeline_layout"),
            bind_group_layouts: &[&blend_uniform_bgl, &tex_sampler_bgl, &tex_sampler_bgl],
            push_constant_ranges: &[],
        });

        // NO hardware blending — the fragment shader does all blend math.
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("layer_blend_pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_blend",
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
                entry_point: "fs_blend",
                targets: &[Some(wgpu::ColorTargetState {
                    format: output_format,
                    blend: None, // disabled — shader handles blending
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
        });

        let sampler_linear = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sampler_linear"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            pipeline,
            blend_uniform_bgl,
            tex_sampler_bgl,
            sampler_linear,
            output_format,
            cached_blend_slots: Vec::new(),
        }
    }

    /// Composite visible layers with blend-mode support.
    ///
    /// `layers`: `(opacity, blend_mode_u8, &LayerTexture)` in back-to-front
    /// order.  Returns which of the two ping-pong textures holds the final
    /// result (0 or 1) so the caller knows which to read back.
    pub fn composite_layers_blended(
        &mut self,
        ctx: &GpuContext,
        ping_pong: [&wgpu::TextureView; 2],
        layers: &[(f32, u32, &LayerTexture)],
    ) -> usize {
        let device = &ctx.device;
        let queue = &ctx.queue;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("layer_blend_encoder"),
        });

        // Clear ping (texture 0) to transparent black.
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear_ping"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: ping_pong[0],
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }

        let mut read_idx: usize = 0; // ping = background (read)
        let mut write_idx: usize = 1; // pong = destination (write)

        for (layer_i, (opacity, blend_mode, layer_tex)) in layers.iter().enumerate() {
            // ---- Uniforms: reuse cached buffer + bind group ----
            let uniforms = BlendUniforms {
                opacity: *opacity,
                blend_mode: *blend_mode,
                _pad: [0.0; 2],
            };
            if layer_i >= self.cached_blend_slots.len() {
                let buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("blend_uniform_buf"),
                    contents: bytemuck::bytes_of(&uniforms),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
                let bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("blend_uniform_bg"),
                    layout: &self.blend_uniform_bgl,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buf.as_entire_binding(),
                    }],
                });
                self.cached_blend_slots.push((buf, bg));
            } else {
                queue.write_buffer(
                    &self.cached_blend_slots[layer_i].0,
                    0,
                    bytemuck::bytes_of(&uniforms),
                );
            }
            let uniform_bg = &self.cached_blend_slots[layer_i].1;

            // ---- Foreground bind group (group 1) ----
            let fg_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("fg_bg"),
                layout: &self.tex_sampler_bgl,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&layer_tex.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler_linear),
                    },
                ],
            });

            // ---- Background bind group (group 2) — read the accumulator ----
            let bg_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("bg_bg"),
                layout: &self.tex_sampler_bgl,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(ping_pong[read_idx]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler_linear),
                    },
                ],
            });

            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("layer_blend_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: ping_pong[write_idx],
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });

                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, uniform_bg, &[]);
                pass.set_bind_group(1, &fg_bg, &[]);
                pass.set_bind_group(2, &bg_bg, &[]);
                pass.draw(0..6, 0..1);
            }

            std::mem::swap(&mut read_idx, &mut write_idx);
        }

        queue.submit(std::iter::once(encoder.finish()));

        // `read_idx` points at the texture with the final result (it was the
        // last write_idx before the swap).
        read_idx
    }

    pub(crate) fn aligned_bytes_per_row(width: u32) -> u32 {
        let unaligned = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        unaligned.div_ceil(align) * align
    }

    /// Read back a sub-region of a texture as packed RGBA bytes.
    /// The staging buffer is cached across calls and only reallocated when
    /// it grows.
    pub fn readback_texture_region(
        ctx: &GpuContext,
        texture: &wgpu::Texture,
        src_x: u32,
        src_y: u32,
        region_w: u32,
        region_h: u32,
        cached_staging: &mut Option<(wgpu::Buffer, u64)>,
    ) -> Vec<u8> {
        let device = &ctx.device;
        let queue = &ctx.queue;

        let bytes_per_row = Self::aligned_bytes_per_row(region_w);
        let buffer_size = (bytes_per_row * region_h) as u64;

        let need_new = match cached_staging {
            Some((_, sz)) if *sz >= buffer_size => false,
            _ => true,
        };
        if need_new {
            let new_buf = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("readback_staging"),
                size: buffer_size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            *cached_staging = Some((new_buf, buffer_size));
        }
        let staging = &cached_staging.as_ref().unwrap().0;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: src_x,
                    y: src_y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(region_h),
                },
            },
            wgpu::Extent3d {
                width: region_w,
                height: region_h,
                depth_or_array_layers: 1,
            },
        );

        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..buffer_size);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log_err!("gpu: readback map error: {:?}", e);
                return vec![];
            }
            Err(e) => {
                log_err!("gpu: readback channel error: {:?}", e);
                return vec![];
            }
        }

        let mapped = slice.get_mapped_range();
        let actual_row = region_w as usize * 4;

        // Strip the per-row alignment padding.
        let mut result = Vec::with_capacity(actual_row * region_h as usize);
        for y in 0..region_h {
            let start = (y * bytes_per_row) as usize;
            result.extend_from_slice(&mapped[start..start + actual_row]);
        }

        drop(mapped);
        staging.unmap();

        result
    }

    /// Read back an entire texture.
    pub fn readback_texture(
        ctx: &GpuContext,
        texture: &wgpu::Texture,
        width: u32,
        height: u32,
        cached_staging: &mut Option<(wgpu::Buffer, u64)>,
    ) -> Vec<u8> {
        Self::readback_texture_region(ctx, texture, 0, 0, width, height, cached_staging)
    }
}
