// ============================================================================
// CANVAS — layers, dirty-rect tracking, CPU compositing
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Maximum longest-edge dimension for layer-panel thumbnails.
const THUMBNAIL_MAX_EDGE: u32 = 256;

/// Process-wide generation allocator for layer pixel content.  Every
/// mutation (and every freshly created or restored layer) gets a new id, so
/// a GPU texture uploaded for one generation can never be mistaken for
/// current after an undo restore swaps the buffer out underneath it.
fn next_generation() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

// ============================================================================
// DIRTY RECT
// ============================================================================

/// Inclusive bounding box of pixels touched since the last recomposite.
///
/// Starts out as [`DirtyRect::EMPTY`] (inverted infinity) and grows via
/// min/max as pixels are reported.  The rect is allowed to be a conservative
/// superset of the actual changes; it must never miss a changed pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl DirtyRect {
    /// The empty state: min above max, so any `include` resets both.
    pub const EMPTY: Self = Self {
        min_x: u32::MAX,
        min_y: u32::MAX,
        max_x: 0,
        max_y: 0,
    };

    pub fn from_bounds(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Full-canvas rect for `width × height` pixels.
    pub fn full(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return Self::EMPTY;
        }
        Self::from_bounds(0, 0, width - 1, height - 1)
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Grow to cover the pixel at (x, y).
    pub fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Grow to cover `other` (no-op if `other` is empty).
    pub fn union(&mut self, other: &DirtyRect) {
        if other.is_empty() {
            return;
        }
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        !self.is_empty()
            && x >= self.min_x
            && x <= self.max_x
            && y >= self.min_y
            && y <= self.max_y
    }

    /// Clamp to the canvas; returns EMPTY if nothing overlaps.
    pub fn clamped(&self, width: u32, height: u32) -> DirtyRect {
        if self.is_empty() || width == 0 || height == 0 || self.min_x >= width || self.min_y >= height {
            return Self::EMPTY;
        }
        Self {
            min_x: self.min_x,
            min_y: self.min_y,
            max_x: self.max_x.min(width - 1),
            max_y: self.max_y.min(height - 1),
        }
    }

    pub fn width(&self) -> u32 {
        if self.is_empty() { 0 } else { self.max_x - self.min_x + 1 }
    }

    pub fn height(&self) -> u32 {
        if self.is_empty() { 0 } else { self.max_y - self.min_y + 1 }
    }
}

// ============================================================================
// BLEND MODES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Additive,
}

impl BlendMode {
    /// All modes, for UI display.
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Additive,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
            BlendMode::Additive => "Additive",
        }
    }

    /// Stable u8 id, shared with the GPU compositor shader.
    pub fn to_u8(&self) -> u8 {
        match self {
            BlendMode::Normal => 0,
            BlendMode::Multiply => 1,
            BlendMode::Screen => 2,
            BlendMode::Additive => 3,
        }
    }

    /// Reconstruct from a u8 (unknown values fall back to Normal).
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => BlendMode::Multiply,
            2 => BlendMode::Screen,
            3 => BlendMode::Additive,
            _ => BlendMode::Normal,
        }
    }
}

// ============================================================================
// LAYER
// ============================================================================

/// Transient per-layer transform, present only while the user is dragging a
/// move/rotate/scale handle.  The compositor honors it by inverse-mapping
/// sample positions; committing it bakes the pixels and clears it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerTransform {
    pub translate_x: f32,
    pub translate_y: f32,
    pub scale: f32,
    pub rotation_radians: f32,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self {
            translate_x: 0.0,
            translate_y: 0.0,
            scale: 1.0,
            rotation_radians: 0.0,
            flip_x: false,
            flip_y: false,
        }
    }
}

impl LayerTransform {
    pub fn is_identity(&self) -> bool {
        self.translate_x == 0.0
            && self.translate_y == 0.0
            && self.scale == 1.0
            && self.rotation_radians == 0.0
            && !self.flip_x
            && !self.flip_y
    }

    /// Map an output pixel position back to the layer's own buffer, pivoted
    /// at the layer center.  Inverse of translate → rotate → scale → flip.
    fn source_pos(&self, x: f32, y: f32, cx: f32, cy: f32) -> (f32, f32) {
        let dx = x - self.translate_x - cx;
        let dy = y - self.translate_y - cy;
        let (sin, cos) = (-self.rotation_radians).sin_cos();
        let rx = dx * cos - dy * sin;
        let ry = dx * sin + dy * cos;
        let scale = if self.scale.abs() < 1e-6 { 1e-6 } else { self.scale };
        let mut sx = rx / scale;
        let mut sy = ry / scale;
        if self.flip_x {
            sx = -sx;
        }
        if self.flip_y {
            sy = -sy;
        }
        (sx + cx, sy + cy)
    }
}

pub struct Layer {
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    /// Canvas-sized RGBA buffer, non-premultiplied.  This is the single
    /// source of truth for the layer's pixels; the GPU texture is a cache.
    pub pixels: RgbaImage,
    /// Content generation of `pixels`.  The GPU renderer compares it to the
    /// generation it last uploaded and re-uploads lazily on mismatch.
    pub gpu_generation: u64,
    /// See [`LayerTransform`].
    pub transform: Option<LayerTransform>,
}

impl Layer {
    pub fn new(name: String, width: u32, height: u32, fill: Rgba<u8>) -> Self {
        Self {
            name,
            visible: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            pixels: RgbaImage::from_pixel(width, height, fill),
            gpu_generation: next_generation(),
            transform: None,
        }
    }

    /// Call after any CPU-side mutation of `pixels`.
    pub fn mark_pixels_changed(&mut self) {
        self.gpu_generation = next_generation();
    }

    /// Downscaled copy for the layer panel, at most `max_edge` pixels on the
    /// longest side.
    pub fn thumbnail(&self, max_edge: u32) -> RgbaImage {
        let max_edge = max_edge.clamp(1, THUMBNAIL_MAX_EDGE);
        let (w, h) = self.pixels.dimensions();
        let longest = w.max(h).max(1);
        if longest <= max_edge {
            return self.pixels.clone();
        }
        let scale = max_edge as f32 / longest as f32;
        let nw = ((w as f32 * scale).round() as u32).max(1);
        let nh = ((h as f32 * scale).round() as u32).max(1);
        image::imageops::resize(&self.pixels, nw, nh, image::imageops::FilterType::Triangle)
    }

    /// Pixel memory plus metadata, for history accounting.
    pub fn memory_bytes(&self) -> usize {
        self.pixels.as_raw().len() + self.name.len()
    }

    /// Bake the interactive transform into the pixel buffer and clear it.
    /// Nearest sampling; pixels mapped from outside the buffer become
    /// transparent.
    pub fn commit_transform(&mut self) {
        let Some(t) = self.transform.take() else {
            return;
        };
        if t.is_identity() {
            return;
        }
        let (w, h) = self.pixels.dimensions();
        let cx = w as f32 / 2.0;
        let cy = h as f32 / 2.0;
        let src = std::mem::replace(&mut self.pixels, RgbaImage::new(w, h));
        for y in 0..h {
            for x in 0..w {
                let (sx, sy) = t.source_pos(x as f32 + 0.5, y as f32 + 0.5, cx, cy);
                let sx = sx.floor();
                let sy = sy.floor();
                if sx >= 0.0 && sy >= 0.0 && (sx as u32) < w && (sy as u32) < h {
                    self.pixels
                        .put_pixel(x, y, *src.get_pixel(sx as u32, sy as u32));
                }
            }
        }
        self.mark_pixels_changed();
    }
}

// ============================================================================
// CANVAS STATE
// ============================================================================

pub struct CanvasState {
    pub width: u32,
    pub height: u32,
    /// Bottom-to-top.  Index 0 is the opaque background layer.
    pub layers: Vec<Layer>,
    pub active_layer_index: usize,
    /// Accumulated bounds of everything mutated since the last
    /// [`take_dirty`](Self::take_dirty).
    pub dirty: DirtyRect,
    /// Bumped on every `mark_dirty` call; lets caches detect staleness.
    pub dirty_generation: u64,
}

impl CanvasState {
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Self {
        let background_layer = Layer::new("Background".to_string(), width, height, background);
        Self {
            width,
            height,
            layers: vec![background_layer],
            active_layer_index: 0,
            dirty: DirtyRect::full(width, height),
            dirty_generation: 0,
        }
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.layers.get(self.active_layer_index)
    }

    pub fn active_layer_mut(&mut self) -> Option<&mut Layer> {
        self.layers.get_mut(self.active_layer_index)
    }

    /// Merge `rect` into the pending dirty region so no update is lost
    /// between recomposites.
    pub fn mark_dirty(&mut self, rect: DirtyRect) {
        self.dirty.union(&rect.clamped(self.width, self.height));
        self.dirty_generation = self.dirty_generation.wrapping_add(1);
    }

    pub fn mark_all_dirty(&mut self) {
        self.mark_dirty(DirtyRect::full(self.width, self.height));
    }

    /// Hand the accumulated dirty region to the caller and reset it.  The
    /// host calls this at most once per animation tick, so any number of
    /// pointer samples coalesce into a single recomposite.
    pub fn take_dirty(&mut self) -> DirtyRect {
        std::mem::replace(&mut self.dirty, DirtyRect::EMPTY)
    }

    // ========================================================================
    // CPU COMPOSITING
    // ========================================================================

    /// Composite every visible layer over the full canvas.
    pub fn composite(&self) -> RgbaImage {
        match self.composite_partial(DirtyRect::full(self.width, self.height)) {
            Some((image, _)) => image,
            None => RgbaImage::new(self.width, self.height),
        }
    }

    /// Composite only the pixels inside `rect` (clamped to the canvas).
    /// Returns the region image and its (x, y) origin, or `None` when the
    /// rect is empty.  Rows are processed in parallel.
    pub fn composite_partial(&self, rect: DirtyRect) -> Option<(RgbaImage, (u32, u32))> {
        let rect = rect.clamped(self.width, self.height);
        if rect.is_empty() {
            return None;
        }
        let (rw, rh) = (rect.width(), rect.height());
        let mut out = RgbaImage::new(rw, rh);
        let row_bytes = rw as usize * 4;

        out.par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(row_idx, row)| {
                let y = rect.min_y + row_idx as u32;
                for x in rect.min_x..=rect.max_x {
                    let px = self.composite_pixel(x, y);
                    let off = (x - rect.min_x) as usize * 4;
                    row[off..off + 4].copy_from_slice(&px.0);
                }
            });

        Some((out, (rect.min_x, rect.min_y)))
    }

    /// Bottom-to-top source-over accumulation for one pixel.
    fn composite_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        let mut base = Rgba([0, 0, 0, 0]);
        for layer in &self.layers {
            if !layer.visible || layer.opacity <= 0.0 {
                continue;
            }
            let top = Self::sample_layer(layer, x, y, self.width, self.height);
            base = Self::blend_pixel(base, top, layer.blend_mode, layer.opacity);
        }
        base
    }

    /// Read a layer pixel, honoring any interactive transform.
    fn sample_layer(layer: &Layer, x: u32, y: u32, width: u32, height: u32) -> Rgba<u8> {
        match &layer.transform {
            None => *layer.pixels.get_pixel(x, y),
            Some(t) if t.is_identity() => *layer.pixels.get_pixel(x, y),
            Some(t) => {
                let (sx, sy) = t.source_pos(
                    x as f32 + 0.5,
                    y as f32 + 0.5,
                    width as f32 / 2.0,
                    height as f32 / 2.0,
                );
                let sx = sx.floor();
                let sy = sy.floor();
                if sx >= 0.0 && sy >= 0.0 && (sx as u32) < width && (sy as u32) < height {
                    *layer.pixels.get_pixel(sx as u32, sy as u32)
                } else {
                    Rgba([0, 0, 0, 0])
                }
            }
        }
    }

    /// Straight-alpha source-over blend of `top` onto `base`, with the
    /// layer's blend mode applied to the RGB channels and `opacity` scaling
    /// the top alpha.
    pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
        // Fast path: fully transparent top pixel — nothing to blend
        if top[3] == 0 {
            return base;
        }
        // Fast path: Normal blend, full opacity, fully opaque top pixel
        if mode == BlendMode::Normal && opacity >= 1.0 && top[3] == 255 {
            return top;
        }

        let opacity = opacity.clamp(0.0, 1.0);

        let base_r = base[0] as f32 / 255.0;
        let base_g = base[1] as f32 / 255.0;
        let base_b = base[2] as f32 / 255.0;
        let base_a = base[3] as f32 / 255.0;

        let top_r = top[0] as f32 / 255.0;
        let top_g = top[1] as f32 / 255.0;
        let top_b = top[2] as f32 / 255.0;
        let top_a = (top[3] as f32 / 255.0) * opacity;

        let (r, g, b) = match mode {
            BlendMode::Normal => (top_r, top_g, top_b),
            BlendMode::Multiply => (base_r * top_r, base_g * top_g, base_b * top_b),
            BlendMode::Screen => (
                1.0 - (1.0 - base_r) * (1.0 - top_r),
                1.0 - (1.0 - base_g) * (1.0 - top_g),
                1.0 - (1.0 - base_b) * (1.0 - top_b),
            ),
            BlendMode::Additive => (
                (base_r + top_r).min(1.0),
                (base_g + top_g).min(1.0),
                (base_b + top_b).min(1.0),
            ),
        };

        let out_a = top_a + base_a * (1.0 - top_a);
        if out_a == 0.0 {
            return Rgba([0, 0, 0, 0]);
        }

        let out_r = (r * top_a + base_r * base_a * (1.0 - top_a)) / out_a;
        let out_g = (g * top_a + base_g * base_a * (1.0 - top_a)) / out_a;
        let out_b = (b * top_a + base_b * base_a * (1.0 - top_a)) / out_a;

        Rgba([
            (out_r * 255.0).clamp(0.0, 255.0).round() as u8,
            (out_g * 255.0).clamp(0.0, 255.0).round() as u8,
            (out_b * 255.0).clamp(0.0, 255.0).round() as u8,
            (out_a * 255.0).clamp(0.0, 255.0).round() as u8,
        ])
    }

    // ========================================================================
    // LAYER STRUCTURE OPERATIONS
    // ========================================================================

    /// Insert a new transparent layer directly above the active one and make
    /// it active.  Returns its index.
    pub fn add_layer(&mut self, name: String) -> usize {
        let index = (self.active_layer_index + 1).min(self.layers.len());
        let layer = Layer::new(name, self.width, self.height, Rgba([0, 0, 0, 0]));
        self.layers.insert(index, layer);
        self.active_layer_index = index;
        self.mark_all_dirty();
        index
    }

    /// Remove the active layer.  The background layer (index 0) is
    /// protected.
    pub fn delete_active_layer(&mut self) -> Result<(), EngineError> {
        if self.active_layer_index == 0 {
            return Err(EngineError::BackgroundLayer);
        }
        if self.active_layer_index >= self.layers.len() {
            return Err(EngineError::LayerIndex {
                index: self.active_layer_index,
                count: self.layers.len(),
            });
        }
        self.layers.remove(self.active_layer_index);
        if self.active_layer_index >= self.layers.len() {
            self.active_layer_index = self.layers.len() - 1;
        }
        self.mark_all_dirty();
        Ok(())
    }

    /// Copy the active layer directly above itself and make the copy active.
    pub fn duplicate_active_layer(&mut self) -> Result<usize, EngineError> {
        let source = self
            .layers
            .get(self.active_layer_index)
            .ok_or(EngineError::LayerIndex {
                index: self.active_layer_index,
                count: self.layers.len(),
            })?;
        let copy = Layer {
            name: format!("{} copy", source.name),
            visible: source.visible,
            opacity: source.opacity,
            blend_mode: source.blend_mode,
            pixels: source.pixels.clone(),
            gpu_generation: next_generation(),
            transform: None,
        };
        let index = self.active_layer_index + 1;
        self.layers.insert(index, copy);
        self.active_layer_index = index;
        self.mark_all_dirty();
        Ok(index)
    }

    /// Blend the active layer into the one below it (honoring opacity and
    /// blend mode) and remove it.  Refused for the background layer, which
    /// has nothing below.
    pub fn merge_down(&mut self) -> Result<(), EngineError> {
        if self.active_layer_index == 0 {
            return Err(EngineError::BackgroundLayer);
        }
        if self.active_layer_index >= self.layers.len() {
            return Err(EngineError::LayerIndex {
                index: self.active_layer_index,
                count: self.layers.len(),
            });
        }
        let top = self.layers.remove(self.active_layer_index);
        let below_index = self.active_layer_index - 1;
        let below = &mut self.layers[below_index];
        if top.visible {
            for (dst, src) in below.pixels.pixels_mut().zip(top.pixels.pixels()) {
                *dst = Self::blend_pixel(*dst, *src, top.blend_mode, top.opacity);
            }
        }
        below.mark_pixels_changed();
        self.active_layer_index = below_index;
        self.mark_all_dirty();
        Ok(())
    }

    pub fn switch_layer(&mut self, index: usize) -> Result<(), EngineError> {
        if index >= self.layers.len() {
            return Err(EngineError::LayerIndex {
                index,
                count: self.layers.len(),
            });
        }
        self.active_layer_index = index;
        Ok(())
    }

    pub fn set_layer_visible(&mut self, index: usize, visible: bool) -> Result<(), EngineError> {
        let count = self.layers.len();
        let layer = self
            .layers
            .get_mut(index)
            .ok_or(EngineError::LayerIndex { index, count })?;
        layer.visible = visible;
        self.mark_all_dirty();
        Ok(())
    }

    pub fn set_layer_opacity(&mut self, index: usize, opacity: f32) -> Result<(), EngineError> {
        let count = self.layers.len();
        let layer = self
            .layers
            .get_mut(index)
            .ok_or(EngineError::LayerIndex { index, count })?;
        layer.opacity = opacity.clamp(0.0, 1.0);
        self.mark_all_dirty();
        Ok(())
    }

    pub fn set_layer_blend_mode(&mut self, index: usize, mode: BlendMode) -> Result<(), EngineError> {
        let count = self.layers.len();
        let layer = self
            .layers
            .get_mut(index)
            .ok_or(EngineError::LayerIndex { index, count })?;
        layer.blend_mode = mode;
        self.mark_all_dirty();
        Ok(())
    }

    pub fn rename_layer(&mut self, index: usize, name: String) -> Result<(), EngineError> {
        let count = self.layers.len();
        let layer = self
            .layers
            .get_mut(index)
            .ok_or(EngineError::LayerIndex { index, count })?;
        layer.name = name;
        Ok(())
    }

    /// Pixel memory across all live layers, for diagnostics.
    pub fn memory_bytes(&self) -> usize {
        self.layers.iter().map(Layer::memory_bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red() -> Rgba<u8> {
        Rgba([255, 0, 0, 255])
    }

    #[test]
    fn dirty_rect_accumulates_via_min_max() {
        let mut rect = DirtyRect::EMPTY;
        assert!(rect.is_empty());
        rect.include(10, 20);
        rect.include(3, 40);
        assert_eq!(rect, DirtyRect::from_bounds(3, 20, 10, 40));
        assert_eq!(rect.width(), 8);
        assert_eq!(rect.height(), 21);
    }

    #[test]
    fn take_dirty_resets_to_empty() {
        let mut canvas = CanvasState::new(32, 32, red());
        canvas.mark_dirty(DirtyRect::from_bounds(1, 1, 5, 5));
        assert!(!canvas.take_dirty().is_empty());
        assert!(canvas.dirty.is_empty());
    }

    #[test]
    fn single_opaque_normal_layer_composites_identically() {
        let mut canvas = CanvasState::new(16, 16, Rgba([0, 0, 0, 0]));
        // Paint an arbitrary pattern into the background layer.
        for (x, y, px) in canvas.layers[0].pixels.enumerate_pixels_mut() {
            *px = Rgba([x as u8 * 3, y as u8 * 7, 99, 255]);
        }
        let out = canvas.composite();
        assert_eq!(out.as_raw(), canvas.layers[0].pixels.as_raw());
    }

    #[test]
    fn invisible_layers_are_skipped() {
        let mut canvas = CanvasState::new(8, 8, red());
        canvas.add_layer("Ink".to_string());
        canvas.layers[1].pixels = RgbaImage::from_pixel(8, 8, Rgba([0, 255, 0, 255]));
        canvas.layers[1].visible = false;
        assert_eq!(*canvas.composite().get_pixel(4, 4), red());
    }

    #[test]
    fn multiply_blend_darkens() {
        let half = Rgba([128, 128, 128, 255]);
        let out = CanvasState::blend_pixel(half, half, BlendMode::Multiply, 1.0);
        // 0.502 * 0.502 ≈ 0.252
        assert!((out[0] as i32 - 64).abs() <= 1);
        assert_eq!(out[3], 255);
    }

    #[test]
    fn background_layer_is_protected() {
        let mut canvas = CanvasState::new(8, 8, red());
        assert!(matches!(
            canvas.delete_active_layer(),
            Err(EngineError::BackgroundLayer)
        ));
        assert!(matches!(
            canvas.merge_down(),
            Err(EngineError::BackgroundLayer)
        ));
    }

    #[test]
    fn merge_down_bakes_pixels_and_drops_layer() {
        let mut canvas = CanvasState::new(4, 4, red());
        canvas.add_layer("Ink".to_string());
        canvas.layers[1]
            .pixels
            .put_pixel(2, 2, Rgba([0, 0, 255, 255]));
        canvas.merge_down().unwrap();
        assert_eq!(canvas.layers.len(), 1);
        assert_eq!(canvas.active_layer_index, 0);
        assert_eq!(*canvas.layers[0].pixels.get_pixel(2, 2), Rgba([0, 0, 255, 255]));
        assert_eq!(*canvas.layers[0].pixels.get_pixel(0, 0), red());
    }

    #[test]
    fn switch_layer_rejects_bad_index() {
        let mut canvas = CanvasState::new(4, 4, red());
        assert!(canvas.switch_layer(3).is_err());
        canvas.add_layer("Ink".to_string());
        assert!(canvas.switch_layer(0).is_ok());
    }

    #[test]
    fn layer_transform_translates_samples() {
        let mut canvas = CanvasState::new(8, 8, Rgba([0, 0, 0, 0]));
        canvas.layers[0].pixels.put_pixel(2, 2, red());
        canvas.layers[0].transform = Some(LayerTransform {
            translate_x: 3.0,
            ..LayerTransform::default()
        });
        let out = canvas.composite();
        assert_eq!(*out.get_pixel(5, 2), red());
        assert_eq!(out.get_pixel(2, 2)[3], 0);
    }

    #[test]
    fn commit_transform_bakes_and_clears() {
        let mut layer = Layer::new("L".to_string(), 8, 8, Rgba([0, 0, 0, 0]));
        layer.pixels.put_pixel(1, 1, red());
        layer.transform = Some(LayerTransform {
            translate_x: 2.0,
            translate_y: 1.0,
            ..LayerTransform::default()
        });
        layer.commit_transform();
        assert!(layer.transform.is_none());
        assert_eq!(*layer.pixels.get_pixel(3, 2), red());
        assert_eq!(layer.pixels.get_pixel(1, 1)[3], 0);
    }
}
