// ============================================================================
// GPU RENDERER — top-level coordinator for GPU-accelerated rendering
// ============================================================================
//
// Owns the device context, the brush and compositor pipelines, and a
// per-layer texture cache.  The CPU pixel buffers remain the single source
// of truth: textures are re-uploaded lazily when a layer's content
// generation is ahead of the cached one, and GPU-side strokes read their
// touched region back into the CPU buffer before committing.

use image::RgbaImage;

use super::brush::{BrushPipeline, StampUniforms};
use super::compositor::Compositor;
use super::context::GpuContext;
use super::texture::LayerTexture;
use crate::brush::{Brush, StrokePoint};
use crate::canvas::{CanvasState, DirtyRect};
use crate::error::EngineError;
use crate::log_warn;

/// GPU-side cache of one layer's pixels.
struct CachedLayer {
    /// The layer content generation this texture was uploaded from.
    generation: u64,
    texture: LayerTexture,
}

pub struct GpuRenderer {
    ctx: GpuContext,
    compositor: Compositor,
    brush: BrushPipeline,
    /// One cached texture per canvas layer, index-aligned.
    layers: Vec<CachedLayer>,
    /// Offscreen ping-pong targets, sized `supersample ×` the canvas.
    ping_pong: Option<[LayerTexture; 2]>,
    target_size: (u32, u32),
    /// Render at N× the canvas resolution and box-downsample on readback.
    supersample: u32,
    staging: Option<(wgpu::Buffer, u64)>,
}

impl GpuRenderer {
    /// Initialize the GPU path.  Failure is surfaced so the host can fall
    /// back to the CPU compositor (or abort, for GPU-mandatory builds).
    pub fn new(supersample: u32) -> Result<Self, EngineError> {
        let ctx = GpuContext::new()?;
        let compositor = Compositor::new(&ctx.device);
        let brush = BrushPipeline::new(&ctx.device);
        Ok(Self {
            ctx,
            compositor,
            brush,
            layers: Vec::new(),
            ping_pong: None,
            target_size: (0, 0),
            supersample: supersample.clamp(1, 4),
            staging: None,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.ctx.adapter_name
    }

    /// Bring the per-layer texture cache up to date with the CPU buffers.
    ///
    /// `dirty` is a partial-upload hint: when given, it must cover every
    /// pixel changed since the previous call (the engine's accumulated
    /// dirty rect does).  Stale textures then re-upload only the aligned
    /// dirty region; everything else re-uploads in full.
    fn sync_layer_textures(&mut self, canvas: &CanvasState, dirty: Option<DirtyRect>) {
        self.layers.truncate(canvas.layers.len());

        for (i, layer) in canvas.layers.iter().enumerate() {
            let (w, h) = layer.pixels.dimensions();

            let needs_create = match self.layers.get(i) {
                Some(c) => c.texture.width != w || c.texture.height != h,
                None => true,
            };
            if needs_create {
                let cached = CachedLayer {
                    generation: layer.gpu_generation,
                    texture: LayerTexture::new(
                        &self.ctx.device,
                        &self.ctx.queue,
                        w,
                        h,
                        layer.pixels.as_raw(),
                    ),
                };
                if i < self.layers.len() {
                    self.layers[i] = cached;
                } else {
                    self.layers.push(cached);
                }
                continue;
            }

            let cached = &mut self.layers[i];
            if cached.generation == layer.gpu_generation {
                continue;
            }
            match dirty {
                Some(d) if !d.is_empty() => {
                    let (x, y, rw, rh) =
                        super::align_dirty_rect(d.min_x, d.min_y, d.width(), d.height(), w, h);
                    if rw == 0 || rh == 0 {
                        cached.generation = layer.gpu_generation;
                        continue;
                    }
                    let region = extract_region(&layer.pixels, x, y, rw, rh);
                    cached.texture.update_rect(&self.ctx.queue, x, y, rw, rh, &region);
                }
                _ => cached.texture.upload_full(&self.ctx.queue, layer.pixels.as_raw()),
            }
            cached.generation = layer.gpu_generation;
        }
    }

    fn ensure_targets(&mut self, width: u32, height: u32) {
        if self.target_size == (width, height) && self.ping_pong.is_some() {
            return;
        }
        let make = || LayerTexture::new(&self.ctx.device, &self.ctx.queue, width, height, &[]);
        self.ping_pong = Some([make(), make()]);
        self.target_size = (width, height);
    }

    /// Composite every visible layer on the GPU and read the result back as
    /// a straight-alpha image at canvas resolution.
    ///
    /// With `supersample > 1` the ping-pong targets are N× the canvas and
    /// the readback box-averages back down, smoothing stamp edges.
    ///
    /// Interactive per-layer transforms are a CPU-compositor concern; this
    /// path samples each layer's buffer as uploaded.
    pub fn composite(
        &mut self,
        canvas: &CanvasState,
        dirty: Option<DirtyRect>,
    ) -> Result<RgbaImage, EngineError> {
        let ss = self.supersample;
        let (tw, th) = (canvas.width * ss, canvas.height * ss);
        if !self.ctx.supports_size(tw, th) {
            return Err(EngineError::GpuInit(format!(
                "composite target {}×{} exceeds device limit {}",
                tw, th, self.ctx.max_texture_dim
            )));
        }

        self.sync_layer_textures(canvas, dirty);
        self.ensure_targets(tw, th);
        let Some(ping_pong) = self.ping_pong.as_ref() else {
            return Err(EngineError::GpuInit("ping-pong targets unavailable".to_string()));
        };

        let visible: Vec<(f32, u32, &LayerTexture)> = canvas
            .layers
            .iter()
            .zip(self.layers.iter())
            .filter(|(layer, _)| layer.visible && layer.opacity > 0.0)
            .map(|(layer, cached)| {
                (
                    layer.opacity,
                    layer.blend_mode.to_u8() as u32,
                    &cached.texture,
                )
            })
            .collect();

        let final_idx = self.compositor.composite_layers_blended(
            &self.ctx,
            [&ping_pong[0].view, &ping_pong[1].view],
            &visible,
        );

        let premul = Compositor::readback_texture(
            &self.ctx,
            &ping_pong[final_idx].texture,
            tw,
            th,
            &mut self.staging,
        );
        if premul.is_empty() {
            return Err(EngineError::GpuInit("composite readback failed".to_string()));
        }

        Ok(downsample_unpremultiply(&premul, tw, th, ss))
    }

    /// GPU-side stroke rasterization: renders the stamp run into the active
    /// layer's texture, then reads the touched region back into the CPU
    /// buffer so the buffers never disagree.  Same guards, spacing and
    /// pressure handling as the CPU rasterizer.
    pub fn stamp_line(
        &mut self,
        canvas: &mut CanvasState,
        from: StrokePoint,
        to: StrokePoint,
        brush: &Brush,
    ) -> DirtyRect {
        if !from.x.is_finite() || !from.y.is_finite() || !to.x.is_finite() || !to.y.is_finite() {
            log_warn!("gpu brush: dropping non-finite stroke segment");
            return DirtyRect::EMPTY;
        }
        let (cw, ch) = (canvas.width, canvas.height);
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let distance = dx.hypot(dy);
        let diagonal = (cw as f32).hypot(ch as f32);
        if distance > 2.0 * diagonal {
            log_warn!("gpu brush: dropping implausible segment ({:.0}px)", distance);
            return DirtyRect::EMPTY;
        }

        // Build the stamp run (a zero-length drag is still one stamp).
        let spacing = (brush.size / 4.0).max(0.25);
        let steps = if distance < 0.1 {
            0
        } else {
            (distance / spacing).ceil().max(1.0) as usize
        };

        let color = [
            brush.color[0] as f32 / 255.0,
            brush.color[1] as f32 / 255.0,
            brush.color[2] as f32 / 255.0,
            brush.color[3] as f32 / 255.0,
        ];

        let mut stamps = Vec::with_capacity(steps + 1);
        let mut dirty = DirtyRect::EMPTY;
        for i in 0..=steps {
            let t = if steps == 0 { 0.0 } else { i as f32 / steps as f32 };
            let x = from.x + dx * t;
            let y = from.y + dy * t;
            let pressure = from.pressure + (to.pressure - from.pressure) * t;
            let radius = brush.radius_for(pressure);
            if radius <= 0.0 {
                continue;
            }
            let reach = radius + 1.5;
            if x + reach < 0.0 || y + reach < 0.0 || x - reach >= cw as f32 || y - reach >= ch as f32
            {
                continue;
            }
            dirty.include((x - reach).max(0.0) as u32, (y - reach).max(0.0) as u32);
            dirty.include(
                ((x + reach).ceil() as u32).min(cw.saturating_sub(1)),
                ((y + reach).ceil() as u32).min(ch.saturating_sub(1)),
            );
            stamps.push(StampUniforms::new((x, y), radius, color, (cw, ch)));
        }
        if stamps.is_empty() {
            return DirtyRect::EMPTY;
        }

        // Texture must match the CPU buffer before we paint on top of it.
        self.sync_layer_textures(canvas, None);
        let index = canvas.active_layer_index;
        let Some(cached) = self.layers.get(index) else {
            return DirtyRect::EMPTY;
        };

        self.brush
            .draw_stamps(&self.ctx, &cached.texture.view, &stamps, brush.is_eraser);

        // Read the touched region back: the CPU buffer stays canonical.
        let (x, y, rw, rh) =
            super::align_dirty_rect(dirty.min_x, dirty.min_y, dirty.width(), dirty.height(), cw, ch);
        if rw == 0 || rh == 0 {
            return DirtyRect::EMPTY;
        }
        let bytes = Compositor::readback_texture_region(
            &self.ctx,
            &cached.texture.texture,
            x,
            y,
            rw,
            rh,
            &mut self.staging,
        );
        if bytes.is_empty() {
            return DirtyRect::EMPTY;
        }

        let layer = &mut canvas.layers[index];
        write_region(&mut layer.pixels, x, y, rw, rh, &bytes);
        layer.mark_pixels_changed();
        // The texture already holds exactly what we just wrote back.
        self.layers[index].generation = canvas.layers[index].gpu_generation;

        canvas.mark_dirty(dirty);
        dirty
    }
}

/// Copy a sub-rectangle of `img` into a packed RGBA byte vector.
pub(crate) fn extract_region(img: &RgbaImage, x: u32, y: u32, w: u32, h: u32) -> Vec<u8> {
    let stride = img.width() as usize * 4;
    let raw = img.as_raw();
    let mut out = Vec::with_capacity((w * h * 4) as usize);
    for row in y..y + h {
        let start = row as usize * stride + x as usize * 4;
        out.extend_from_slice(&raw[start..start + w as usize * 4]);
    }
    out
}

/// Write a packed RGBA region back into `img` at `(x, y)`.
pub(crate) fn write_region(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, data: &[u8]) {
    let stride = img.width() as usize * 4;
    let raw = img.as_mut();
    let row_bytes = w as usize * 4;
    for row in 0..h {
        let dst = (y + row) as usize * stride + x as usize * 4;
        let src = row as usize * row_bytes;
        raw[dst..dst + row_bytes].copy_from_slice(&data[src..src + row_bytes]);
    }
}

/// Box-average a premultiplied RGBA buffer down by `factor` and convert the
/// result to straight alpha.  `factor == 1` only un-premultiplies.
pub(crate) fn downsample_unpremultiply(data: &[u8], src_w: u32, src_h: u32, factor: u32) -> RgbaImage {
    let factor = factor.max(1);
    let dst_w = src_w / factor;
    let dst_h = src_h / factor;
    let samples = (factor * factor) as f32;
    let stride = src_w as usize * 4;

    let mut out = RgbaImage::new(dst_w, dst_h);
    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let mut acc = [0.0f32; 4];
            for sy in 0..factor {
                for sx in 0..factor {
                    let off = (dy * factor + sy) as usize * stride + ((dx * factor + sx) as usize) * 4;
                    for c in 0..4 {
                        acc[c] += data[off + c] as f32;
                    }
                }
            }
            let a = acc[3] / samples;
            let px = if a <= 0.0 {
                image::Rgba([0, 0, 0, 0])
            } else {
                // premultiplied average / alpha average → straight color
                let inv_a = 255.0 / a;
                image::Rgba([
                    ((acc[0] / samples) * inv_a).clamp(0.0, 255.0).round() as u8,
                    ((acc[1] / samples) * inv_a).clamp(0.0, 255.0).round() as u8,
                    ((acc[2] / samples) * inv_a).clamp(0.0, 255.0).round() as u8,
                    a.clamp(0.0, 255.0).round() as u8,
                ])
            };
            out.put_pixel(dx, dy, px);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn extract_and_write_region_round_trip() {
        let mut img = RgbaImage::new(8, 8);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgba([x as u8, y as u8, 7, 255]);
        }
        let region = extract_region(&img, 2, 3, 4, 2);
        assert_eq!(region.len(), 4 * 2 * 4);
        assert_eq!(&region[0..4], &[2, 3, 7, 255]);

        let mut dst = RgbaImage::new(8, 8);
        write_region(&mut dst, 2, 3, 4, 2, &region);
        assert_eq!(*dst.get_pixel(2, 3), Rgba([2, 3, 7, 255]));
        assert_eq!(*dst.get_pixel(5, 4), Rgba([5, 4, 7, 255]));
        assert_eq!(*dst.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn unpremultiply_restores_straight_color() {
        // Premultiplied half-transparent red: (128, 0, 0, 128).
        let data = [128u8, 0, 0, 128];
        let out = downsample_unpremultiply(&data, 1, 1, 1);
        let px = out.get_pixel(0, 0);
        assert_eq!(px[3], 128);
        assert!((px[0] as i32 - 255).abs() <= 1);
    }

    #[test]
    fn downsample_averages_premultiplied_blocks() {
        // 2×2 premultiplied block: one opaque white, three transparent.
        let data = [
            255u8, 255, 255, 255, /* */ 0, 0, 0, 0, //
            0, 0, 0, 0, /*            */ 0, 0, 0, 0,
        ];
        let out = downsample_unpremultiply(&data, 2, 2, 2);
        assert_eq!(out.dimensions(), (1, 1));
        let px = out.get_pixel(0, 0);
        // Coverage averages to 1/4; color stays white.
        assert_eq!(px[3], 64);
        assert_eq!(px[0], 255);
    }

    #[test]
    fn fully_transparent_blocks_stay_transparent() {
        let data = [0u8; 16];
        let out = downsample_unpremultiply(&data, 2, 2, 2);
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
    }
}
