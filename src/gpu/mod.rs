// ============================================================================
// GPU MODULE — hardware-accelerated brush and compositing paths
// ============================================================================
//
// Architecture:
//   context.rs    — wgpu Device, Queue, adapter init
//   shaders.rs    — all WGSL shader source (inline strings)
//   texture.rs    — LayerTexture wrapper with partial upload
//   brush.rs      — stamp pipeline (pen/eraser via blend state)
//   compositor.rs — ping-pong blend-mode compositor + readback
//   renderer.rs   — top-level GpuRenderer coordinator
//
// The CPU pixel buffers stay canonical throughout: layer textures are pure
// caches keyed by each layer's content generation, and GPU-side strokes
// read their touched region back into the CPU buffer before committing.
// ============================================================================

pub mod brush;
pub mod compositor;
pub mod context;
pub mod renderer;
pub mod shaders;
pub mod texture;

pub use renderer::GpuRenderer;

/// WGPU requires `bytes_per_row` to be a multiple of 256 for texture↔buffer
/// copies.  Used when aligning dirty rects for partial uploads.
pub const COPY_BYTES_PER_ROW_ALIGNMENT: u32 = 256;

/// Align a dirty rect so that `width * 4` is a multiple of 256 bytes.
/// Expands the rect rightward (and clamps to texture bounds).
///
/// Returns (x, y, aligned_width, height).
pub fn align_dirty_rect(
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    texture_width: u32,
    texture_height: u32,
) -> (u32, u32, u32, u32) {
    // bytes_per_row = width * 4 must be a multiple of 256, so width must be
    // a multiple of 64.
    const PIXEL_ALIGNMENT: u32 = COPY_BYTES_PER_ROW_ALIGNMENT / 4;

    let clamped_x = x.min(texture_width.saturating_sub(1));
    let clamped_y = y.min(texture_height.saturating_sub(1));

    let max_width = texture_width - clamped_x;
    let max_height = texture_height - clamped_y;

    let clamped_w = w.min(max_width);
    let clamped_h = h.min(max_height);

    if clamped_w == 0 || clamped_h == 0 {
        return (clamped_x, clamped_y, 0, 0);
    }

    let aligned_w = clamped_w.div_ceil(PIXEL_ALIGNMENT) * PIXEL_ALIGNMENT;

    (clamped_x, clamped_y, aligned_w.min(max_width), clamped_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_rounds_width_up_to_64() {
        let (x, y, w, h) = align_dirty_rect(10, 20, 30, 40, 1024, 1024);
        assert_eq!((x, y, h), (10, 20, 40));
        assert_eq!(w, 64);
        assert_eq!(w % 64, 0);
    }

    #[test]
    fn align_clamps_at_the_texture_edge() {
        let (x, _, w, _) = align_dirty_rect(1000, 0, 30, 10, 1024, 1024);
        assert_eq!(x, 1000);
        // Only 24 pixels remain to the right edge; alignment cannot grow
        // past the texture.
        assert_eq!(w, 24);
    }

    #[test]
    fn align_handles_degenerate_rects() {
        assert_eq!(align_dirty_rect(5, 5, 0, 10, 64, 64).2, 0);
        // Origin past the texture is clamped back inside its bounds.
        let (x, _, w, _) = align_dirty_rect(100, 100, 8, 8, 64, 64);
        assert!(x + w <= 64);
    }
}
