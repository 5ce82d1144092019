use thiserror::Error;

/// Errors the engine surfaces to its caller.
///
/// Transient input garbage (non-finite coordinates, implausible pointer
/// jumps) is *not* represented here — those are recovered locally by
/// skipping the offending sample, since input devices occasionally emit
/// nonsense mid-stroke.  Only failures the host must react to are typed.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No usable GPU adapter or device. The CPU compositor still works;
    /// callers decide whether to fall back or abort startup.
    #[error("GPU initialization failed: {0}")]
    GpuInit(String),

    #[error("layer index {index} out of range ({count} layers)")]
    LayerIndex { index: usize, count: usize },

    /// Layer 0 is the opaque background; it can be neither deleted nor
    /// merged down.
    #[error("the background layer cannot be removed")]
    BackgroundLayer,
}
