// ============================================================================
// TRANSFORM — view transform and 2D affine matrix math
// ============================================================================
//
// Pointer input arrives in device/view coordinates; pixels live in
// canvas-local coordinates.  `ViewTransform` maps between the two under an
// arbitrary composition of translate, uniform scale, rotation and
// independent horizontal/vertical flip, pivoted at the canvas center.
//
// The inverse mapping is the exact algebraic inverse of the forward one —
// never a separately maintained matrix — so display and hit-testing cannot
// drift apart.

use serde::{Deserialize, Serialize};

/// A 2D affine matrix as 6 elements `[a, b, c, d, e, f]`, representing
///
/// ```text
/// | a  c  e |
/// | b  d  f |
/// | 0  0  1 |
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat2D(pub [f32; 6]);

impl Mat2D {
    pub const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn translation(tx: f32, ty: f32) -> Self {
        Self([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// Non-uniform scale (pass the same factor twice for uniform zoom;
    /// negative factors express flips).
    pub fn scale(sx: f32, sy: f32) -> Self {
        Self([sx, 0.0, 0.0, sy, 0.0, 0.0])
    }

    pub fn rotation(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self([cos, sin, -sin, cos, 0.0, 0.0])
    }

    /// Matrix product `self · other`: the result applies `other` first,
    /// then `self`.
    pub fn multiply(&self, other: &Mat2D) -> Mat2D {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Mat2D([
            a1 * a2 + c1 * b2,
            b1 * a2 + d1 * b2,
            a1 * c2 + c1 * d2,
            b1 * c2 + d1 * d2,
            a1 * e2 + c1 * f2 + e1,
            b1 * e2 + d1 * f2 + f1,
        ])
    }

    /// Inverse matrix, or `None` when the determinant is zero (the matrix
    /// collapses the plane and cannot be undone).
    pub fn invert(&self) -> Option<Mat2D> {
        let [a, b, c, d, e, f] = self.0;
        let det = a * d - b * c;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Mat2D([
            d * inv,
            -b * inv,
            -c * inv,
            a * inv,
            (c * f - d * e) * inv,
            (b * e - a * f) * inv,
        ]))
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }
}

/// Zoom bounds; matching the range a host UI would expose on a slider.
const MIN_SCALE: f32 = 0.01;
const MAX_SCALE: f32 = 64.0;

/// The canvas → view mapping: flip, then uniform scale, then rotation, then
/// translation, all pivoted at the canvas center.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub scale: f32,
    pub rotation_degrees: f32,
    /// Exactly `1.0` or `-1.0` after [`normalize`](Self::normalize).
    pub flip_x: f32,
    pub flip_y: f32,
    pub translate_x: f32,
    pub translate_y: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation_degrees: 0.0,
            flip_x: 1.0,
            flip_y: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
        }
    }
}

impl ViewTransform {
    /// Canonical form: rotation wrapped to `[0, 360)`, flip flags snapped to
    /// exactly ±1, scale clamped to sane zoom bounds.  A double flip is
    /// rewritten as a 180° rotation — the two are algebraically the same
    /// operation, and keeping one canonical spelling means equality checks
    /// and the inverse mapping never have to consider both.
    pub fn normalize(&mut self) {
        self.flip_x = if self.flip_x < 0.0 { -1.0 } else { 1.0 };
        self.flip_y = if self.flip_y < 0.0 { -1.0 } else { 1.0 };
        if self.flip_x < 0.0 && self.flip_y < 0.0 {
            self.flip_x = 1.0;
            self.flip_y = 1.0;
            self.rotation_degrees += 180.0;
        }
        if !self.rotation_degrees.is_finite() {
            self.rotation_degrees = 0.0;
        }
        self.rotation_degrees = self.rotation_degrees.rem_euclid(360.0);
        if !self.scale.is_finite() {
            self.scale = 1.0;
        }
        self.scale = self.scale.clamp(MIN_SCALE, MAX_SCALE);
    }

    pub fn zoom_by(&mut self, factor: f32) {
        self.scale *= factor;
        self.normalize();
    }

    pub fn rotate_by(&mut self, delta_degrees: f32) {
        self.rotation_degrees += delta_degrees;
        self.normalize();
    }

    pub fn flip_horizontal(&mut self) {
        self.flip_x = -self.flip_x;
        self.normalize();
    }

    pub fn flip_vertical(&mut self) {
        self.flip_y = -self.flip_y;
        self.normalize();
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.translate_x += dx;
        self.translate_y += dy;
    }

    /// Canvas-local pixel coordinates → device/view coordinates.
    pub fn forward(&self, point: (f32, f32), canvas_w: u32, canvas_h: u32) -> (f32, f32) {
        let cx = canvas_w as f32 / 2.0;
        let cy = canvas_h as f32 / 2.0;

        // Flip and scale around the canvas center.
        let x = (point.0 - cx) * self.flip_x * self.scale;
        let y = (point.1 - cy) * self.flip_y * self.scale;

        // Rotate, then translate.
        let (sin, cos) = self.rotation_degrees.to_radians().sin_cos();
        (
            x * cos - y * sin + self.translate_x,
            x * sin + y * cos + self.translate_y,
        )
    }

    /// Device/view coordinates → canvas-local pixel coordinates.
    ///
    /// The exact algebraic inverse of [`forward`](Self::forward):
    /// untranslate, de-rotate, divide out scale·flip, re-add the half
    /// canvas extents.
    pub fn inverse(&self, device: (f32, f32), canvas_w: u32, canvas_h: u32) -> (f32, f32) {
        let x = device.0 - self.translate_x;
        let y = device.1 - self.translate_y;

        let (sin, cos) = (-self.rotation_degrees.to_radians()).sin_cos();
        let rx = x * cos - y * sin;
        let ry = x * sin + y * cos;

        // flip is ±1 so dividing by scale·flip undoes both at once.
        let scale = if self.scale == 0.0 { MIN_SCALE } else { self.scale };
        (
            rx / (scale * self.flip_x) + canvas_w as f32 / 2.0,
            ry / (scale * self.flip_y) + canvas_h as f32 / 2.0,
        )
    }

    /// The forward mapping as one affine matrix, for callers that want to
    /// batch-transform geometry (e.g. overlay rendering in the host).
    pub fn matrix(&self, canvas_w: u32, canvas_h: u32) -> Mat2D {
        let center = Mat2D::translation(-(canvas_w as f32) / 2.0, -(canvas_h as f32) / 2.0);
        let flip_scale = Mat2D::scale(self.flip_x * self.scale, self.flip_y * self.scale);
        let rotate = Mat2D::rotation(self.rotation_degrees.to_radians());
        let translate = Mat2D::translation(self.translate_x, self.translate_y);
        translate
            .multiply(&rotate)
            .multiply(&flip_scale)
            .multiply(&center)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: (f32, f32), b: (f32, f32)) {
        assert!(
            (a.0 - b.0).abs() < 1e-3 && (a.1 - b.1).abs() < 1e-3,
            "{:?} != {:?}",
            a,
            b
        );
    }

    #[test]
    fn round_trip_identity() {
        let view = ViewTransform::default();
        let p = (123.0, 45.0);
        assert_close(view.inverse(view.forward(p, 200, 100), 200, 100), p);
    }

    #[test]
    fn round_trip_full_composition() {
        let mut view = ViewTransform {
            scale: 2.5,
            rotation_degrees: 37.0,
            flip_x: -1.0,
            flip_y: 1.0,
            translate_x: -80.0,
            translate_y: 14.5,
        };
        view.normalize();
        for &p in &[(0.0, 0.0), (199.0, 0.0), (63.2, 87.9), (100.0, 100.0)] {
            assert_close(view.inverse(view.forward(p, 200, 200), 200, 200), p);
        }
    }

    #[test]
    fn matrix_agrees_with_forward() {
        let mut view = ViewTransform {
            scale: 0.5,
            rotation_degrees: 290.0,
            flip_x: 1.0,
            flip_y: -1.0,
            translate_x: 12.0,
            translate_y: -7.0,
        };
        view.normalize();
        let m = view.matrix(300, 200);
        let p = (51.0, 160.0);
        assert_close(m.apply(p.0, p.1), view.forward(p, 300, 200));
    }

    #[test]
    fn rotation_wraps_to_360() {
        let mut view = ViewTransform::default();
        view.rotate_by(370.0);
        assert!((view.rotation_degrees - 10.0).abs() < 1e-4);
        view.rotate_by(-30.0);
        assert!((view.rotation_degrees - 340.0).abs() < 1e-4);
    }

    #[test]
    fn double_flip_becomes_rotation() {
        let mut view = ViewTransform::default();
        view.flip_horizontal();
        view.flip_vertical();
        assert_eq!(view.flip_x, 1.0);
        assert_eq!(view.flip_y, 1.0);
        assert!((view.rotation_degrees - 180.0).abs() < 1e-4);
    }

    #[test]
    fn invert_rejects_singular() {
        assert!(Mat2D::scale(0.0, 1.0).invert().is_none());
        assert!(Mat2D([1.0, 2.0, 2.0, 4.0, 0.0, 0.0]).invert().is_none());
    }

    #[test]
    fn invert_round_trips() {
        let m = Mat2D::translation(5.0, -3.0)
            .multiply(&Mat2D::rotation(0.7))
            .multiply(&Mat2D::scale(2.0, -1.5));
        let inv = m.invert().unwrap();
        let p = m.apply(11.0, -4.0);
        let (x, y) = inv.apply(p.0, p.1);
        assert!((x - 11.0).abs() < 1e-3 && (y - (-4.0)).abs() < 1e-3);
    }
}
