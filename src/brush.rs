// ============================================================================
// BRUSH — antialiased circular stamps and interpolated strokes
// ============================================================================
//
// The CPU rasterization path: stamps are burned straight into a layer's
// pixel buffer.  The GPU path (gpu/brush.rs) renders the same radial alpha
// profile into the layer's texture and reads the touched region back, so
// both paths produce the same marks.

use image::{Rgba, RgbaImage};

use crate::canvas::DirtyRect;
use crate::config::PressureCurve;

/// One pointer sample in canvas-local pixel space.  Transient: consumed by
/// the rasterizer, never persisted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokePoint {
    pub x: f32,
    pub y: f32,
    /// Stylus pressure in (0, 1]; mice report 1.0.
    pub pressure: f32,
}

impl StrokePoint {
    pub fn new(x: f32, y: f32, pressure: f32) -> Self {
        Self { x, y, pressure }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Peak alpha of the soft outer fringe.
const FRINGE_ALPHA: f32 = 0.3;
/// How far past the nominal radius the fringe reaches.
const FRINGE_REACH: f32 = 1.5;

/// Radial alpha profile of a stamp: opaque core to `radius − 0.5`, linear
/// fade to `radius + 0.5`, then a weak fringe tapering to zero at
/// `radius + 1.5` for a smoother perceived edge.
#[inline]
fn stamp_alpha(distance: f32, radius: f32) -> f32 {
    if distance <= radius - 0.5 {
        return 1.0;
    }
    let core = (radius + 0.5 - distance).clamp(0.0, 1.0);
    let fringe = (FRINGE_ALPHA * (radius + FRINGE_REACH - distance)).clamp(0.0, FRINGE_ALPHA);
    core.max(fringe)
}

/// Brush settings plus the stamp/stroke rasterizer.
#[derive(Clone, Copy, Debug)]
pub struct Brush {
    /// Diameter in canvas pixels at full pressure.
    pub size: f32,
    /// RGBA, non-premultiplied.  The alpha channel acts as flow.
    pub color: Rgba<u8>,
    /// Eraser marks multiply destination alpha down instead of painting.
    pub is_eraser: bool,
    pub pressure: PressureCurve,
}

impl Brush {
    pub fn new(size: f32, color: Rgba<u8>) -> Self {
        Self {
            size,
            color,
            is_eraser: false,
            pressure: PressureCurve::default(),
        }
    }

    /// Stamp radius for a raw pressure sample.
    pub(crate) fn radius_for(&self, pressure: f32) -> f32 {
        (self.size / 2.0) * self.pressure.apply(pressure)
    }

    /// Burn one stamp centered at `(cx, cy)` into `buffer`.  Returns the
    /// bounds of every pixel written (empty when the stamp misses the
    /// canvas or the input is garbage).
    pub fn stamp(&self, buffer: &mut RgbaImage, cx: f32, cy: f32, pressure: f32) -> DirtyRect {
        let mut dirty = DirtyRect::EMPTY;
        if !cx.is_finite() || !cy.is_finite() {
            return dirty;
        }
        let radius = self.radius_for(pressure);
        if radius <= 0.0 {
            return dirty;
        }

        let (width, height) = buffer.dimensions();
        let reach = radius + FRINGE_REACH;
        if cx + reach < 0.0 || cy + reach < 0.0 {
            return dirty;
        }
        let min_x = (cx - reach).max(0.0) as u32;
        let min_y = (cy - reach).max(0.0) as u32;
        let max_x = ((cx + reach).ceil() as u32).min(width.saturating_sub(1));
        let max_y = ((cy + reach).ceil() as u32).min(height.saturating_sub(1));
        if min_x > max_x || min_y > max_y || width == 0 || height == 0 {
            return dirty;
        }

        let flow = self.color[3] as f32 / 255.0;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let alpha = stamp_alpha(dx.hypot(dy), radius) * flow;
                if alpha < 0.001 {
                    continue;
                }
                let px = buffer.get_pixel_mut(x, y);
                if self.is_eraser {
                    erase_pixel(px, alpha);
                } else {
                    paint_pixel(px, self.color, alpha);
                }
                dirty.include(x, y);
            }
        }
        dirty
    }

    /// Rasterize a stroke segment as a run of stamps with linearly
    /// interpolated position and pressure.
    ///
    /// Defensive guards: non-finite endpoints and segments longer than
    /// twice the canvas diagonal are dropped — input devices occasionally
    /// emit a corrupt sample mid-stroke, and one bad point must not smear
    /// paint across the whole canvas or stall the event handler.
    pub fn line(&self, buffer: &mut RgbaImage, from: StrokePoint, to: StrokePoint) -> DirtyRect {
        if !from.is_finite() || !to.is_finite() {
            crate::log_warn!("brush: dropping non-finite stroke segment");
            return DirtyRect::EMPTY;
        }

        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let distance = dx.hypot(dy);

        let (width, height) = buffer.dimensions();
        let diagonal = (width as f32).hypot(height as f32);
        if distance > 2.0 * diagonal {
            crate::log_warn!(
                "brush: dropping implausible segment ({:.0}px on a {:.0}px canvas)",
                distance,
                diagonal
            );
            return DirtyRect::EMPTY;
        }

        // Pointer-down immediately followed by pointer-up: still one dot.
        if distance < 0.1 {
            return self.stamp(buffer, from.x, from.y, from.pressure);
        }

        let spacing = (self.size / 4.0).max(0.25);
        let steps = (distance / spacing).ceil().max(1.0) as usize;

        let mut dirty = DirtyRect::EMPTY;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let pressure = from.pressure + (to.pressure - from.pressure) * t;
            dirty.union(&self.stamp(buffer, from.x + dx * t, from.y + dy * t, pressure));
        }
        dirty
    }
}

/// Standard non-premultiplied source-over: `out_a = a_t + a_b·(1−a_t)`,
/// channels weighted by their alphas and renormalized.
#[inline]
fn paint_pixel(px: &mut Rgba<u8>, color: Rgba<u8>, alpha: f32) {
    let top_a = alpha.clamp(0.0, 1.0);
    let base_a = px[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        *px = Rgba([0, 0, 0, 0]);
        return;
    }
    let inv = 1.0 / out_a;
    for c in 0..3 {
        let top_c = color[c] as f32 / 255.0;
        let base_c = px[c] as f32 / 255.0;
        let out_c = (top_c * top_a + base_c * base_a * (1.0 - top_a)) * inv;
        px[c] = (out_c * 255.0).clamp(0.0, 255.0).round() as u8;
    }
    px[3] = (out_a * 255.0).clamp(0.0, 255.0).round() as u8;
}

/// Eraser semantics: scale the existing alpha down by the stamp coverage.
/// RGB is left alone so partially erased pixels keep their hue.
#[inline]
fn erase_pixel(px: &mut Rgba<u8>, alpha: f32) {
    let old = px[3] as f32 / 255.0;
    let new = old * (1.0 - alpha.clamp(0.0, 1.0));
    px[3] = (new * 255.0).clamp(0.0, 255.0).round() as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn buffer(w: u32, h: u32) -> RgbaImage {
        RgbaImage::new(w, h)
    }

    #[test]
    fn dot_stamp_alpha_profile() {
        let mut buf = buffer(200, 200);
        let brush = Brush::new(10.0, RED);
        brush.stamp(&mut buf, 100.0, 100.0, 1.0);
        // Opaque at the center, untouched 20px away.
        assert_eq!(buf.get_pixel(100, 100)[3], 255);
        assert_eq!(buf.get_pixel(100, 100)[0], 255);
        assert_eq!(buf.get_pixel(100, 120)[3], 0);
        // The edge band is semi-transparent.
        let edge = buf.get_pixel(105, 100)[3];
        assert!(edge > 0 && edge < 255, "edge alpha {}", edge);
    }

    #[test]
    fn stamp_profile_is_monotonic() {
        let radius = 6.0;
        let mut last = f32::INFINITY;
        for step in 0..100 {
            let d = step as f32 * 0.1;
            let a = stamp_alpha(d, radius);
            assert!(a <= last + 1e-6, "profile rose at d={}", d);
            last = a;
        }
        assert_eq!(stamp_alpha(0.0, radius), 1.0);
        assert_eq!(stamp_alpha(radius + 2.0, radius), 0.0);
    }

    #[test]
    fn eraser_scales_alpha_down() {
        let mut buf = RgbaImage::from_pixel(40, 40, RED);
        let mut brush = Brush::new(12.0, Rgba([0, 0, 0, 255]));
        brush.is_eraser = true;
        brush.stamp(&mut buf, 20.0, 20.0, 1.0);
        // Fully erased at the center, untouched in the corner.
        assert_eq!(buf.get_pixel(20, 20)[3], 0);
        assert_eq!(*buf.get_pixel(0, 0), RED);
        // RGB survives the erase.
        assert_eq!(buf.get_pixel(20, 20)[0], 255);
    }

    #[test]
    fn eraser_is_multiplicative_not_subtractive() {
        let mut px = Rgba([10, 20, 30, 200]);
        erase_pixel(&mut px, 0.5);
        assert_eq!(px[3], 100);
        erase_pixel(&mut px, 0.5);
        assert_eq!(px[3], 50);
    }

    #[test]
    fn zero_length_segment_still_marks() {
        let mut buf = buffer(50, 50);
        let brush = Brush::new(8.0, RED);
        let p = StrokePoint::new(25.0, 25.0, 1.0);
        let dirty = brush.line(&mut buf, p, p);
        assert!(!dirty.is_empty());
        assert_eq!(buf.get_pixel(25, 25)[3], 255);
    }

    #[test]
    fn line_covers_both_endpoints() {
        let mut buf = buffer(100, 40);
        let brush = Brush::new(6.0, RED);
        brush.line(
            &mut buf,
            StrokePoint::new(10.0, 20.0, 1.0),
            StrokePoint::new(90.0, 20.0, 1.0),
        );
        assert_eq!(buf.get_pixel(10, 20)[3], 255);
        assert_eq!(buf.get_pixel(50, 20)[3], 255);
        assert_eq!(buf.get_pixel(90, 20)[3], 255);
        assert_eq!(buf.get_pixel(50, 5)[3], 0);
    }

    #[test]
    fn non_finite_segment_is_dropped() {
        let mut buf = buffer(50, 50);
        let before = buf.clone();
        let brush = Brush::new(8.0, RED);
        let dirty = brush.line(
            &mut buf,
            StrokePoint::new(f32::NAN, 10.0, 1.0),
            StrokePoint::new(20.0, 20.0, 1.0),
        );
        assert!(dirty.is_empty());
        assert_eq!(buf.as_raw(), before.as_raw());
    }

    #[test]
    fn runaway_segment_is_dropped() {
        let mut buf = buffer(50, 50);
        let before = buf.clone();
        let brush = Brush::new(8.0, RED);
        let dirty = brush.line(
            &mut buf,
            StrokePoint::new(0.0, 0.0, 1.0),
            StrokePoint::new(100_000.0, 0.0, 1.0),
        );
        assert!(dirty.is_empty());
        assert_eq!(buf.as_raw(), before.as_raw());
    }

    #[test]
    fn dirty_rect_covers_every_changed_pixel() {
        let mut buf = buffer(80, 80);
        let before = buf.clone();
        let brush = Brush::new(9.0, Rgba([0, 128, 255, 180]));
        let dirty = brush.line(
            &mut buf,
            StrokePoint::new(12.0, 70.0, 0.3),
            StrokePoint::new(65.0, 8.0, 1.0),
        );
        for (x, y, px) in buf.enumerate_pixels() {
            if px != before.get_pixel(x, y) {
                assert!(dirty.contains(x, y), "changed pixel ({}, {}) outside dirty rect", x, y);
            }
        }
    }

    #[test]
    fn pressure_shrinks_the_mark() {
        let brush = Brush::new(20.0, RED);
        let mut light = buffer(60, 60);
        let mut heavy = buffer(60, 60);
        brush.stamp(&mut light, 30.0, 30.0, 0.1);
        brush.stamp(&mut heavy, 30.0, 30.0, 1.0);
        let coverage = |img: &RgbaImage| img.pixels().filter(|p| p[3] > 0).count();
        let light_px = coverage(&light);
        assert!(light_px > 0, "zero pressure ratio must still mark");
        assert!(light_px < coverage(&heavy));
    }
}
