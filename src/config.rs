//! Engine configuration.
//!
//! Everything here is plain data with serde derives so the host application
//! can persist settings alongside its own preferences.

use serde::{Deserialize, Serialize};

/// Settings for a new [`crate::Engine`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Canvas dimensions in pixels.
    pub width: u32,
    pub height: u32,
    /// Background layer fill color (RGBA, non-premultiplied).
    pub background: [u8; 4],
    /// Maximum number of undo snapshots kept.
    pub history_limit: usize,
    /// Optional total byte budget for the snapshot stack.  Oldest entries
    /// are evicted first once exceeded.
    pub history_memory_budget: Option<usize>,
    /// Pressure → brush-size response.
    pub pressure: PressureCurve,
    /// GPU composite super-sampling factor (1 = off, 2 = render at 2× and
    /// downsample on readback).
    pub supersample: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            background: [255, 255, 255, 255],
            history_limit: 50,
            history_memory_budget: Some(256 * 1024 * 1024),
            pressure: PressureCurve::default(),
            supersample: 1,
        }
    }
}

/// Maps raw stylus pressure to a brush-size ratio.
///
/// `min_ratio` guarantees that a zero-pressure sample still leaves a visible
/// mark; `gamma` shapes the response (1.0 = linear, >1 = softer onset).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PressureCurve {
    pub min_ratio: f32,
    pub gamma: f32,
}

impl Default for PressureCurve {
    fn default() -> Self {
        Self {
            min_ratio: 0.15,
            gamma: 1.0,
        }
    }
}

impl PressureCurve {
    /// Size ratio in `[min_ratio, 1]` for a raw pressure sample.
    pub fn apply(&self, pressure: f32) -> f32 {
        let p = if pressure.is_finite() {
            pressure.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.min_ratio + (1.0 - self.min_ratio) * p.powf(self.gamma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_pressure_still_marks() {
        let curve = PressureCurve::default();
        assert!(curve.apply(0.0) > 0.0);
        assert!((curve.apply(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn garbage_pressure_clamps() {
        let curve = PressureCurve::default();
        assert!((curve.apply(f32::NAN) - 1.0).abs() < 1e-6);
        assert!((curve.apply(9.0) - 1.0).abs() < 1e-6);
        assert!((curve.apply(-3.0) - curve.min_ratio).abs() < 1e-6);
    }
}
