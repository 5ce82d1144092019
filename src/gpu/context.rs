// ============================================================================
// GPU CONTEXT — wgpu Device, Queue, and adapter initialization
// ============================================================================

use std::sync::Arc;

use crate::error::EngineError;
use crate::{log_info, log_warn};

/// Core wgpu resources shared by the brush and compositor pipelines.
/// Created once at startup.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    /// Maximum texture dimension supported by this device.
    pub max_texture_dim: u32,
}

impl GpuContext {
    /// Attempt to create a GPU context.  Tries a hardware adapter first,
    /// then a software rasterizer (`force_fallback_adapter`) so compositing
    /// still works on machines without a real GPU.  When both fail the
    /// error surfaces to the caller, which falls back to the CPU compositor
    /// or aborts startup.
    ///
    /// `pollster::block_on` keeps initialization synchronous: the engine is
    /// single-threaded and constructed before any event handling starts.
    pub fn new() -> Result<Self, EngineError> {
        if let Some(ctx) = pollster::block_on(Self::new_async(false)) {
            return Ok(ctx);
        }
        log_warn!("gpu: hardware adapter unavailable, trying software fallback");
        pollster::block_on(Self::new_async(true)).ok_or_else(|| {
            EngineError::GpuInit("no usable adapter (hardware or fallback)".to_string())
        })
    }

    async fn new_async(force_fallback: bool) -> Option<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None, // headless — offscreen targets only
                force_fallback_adapter: force_fallback,
            })
            .await?;

        let adapter_name = adapter.get_info().name.clone();
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Impasto GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: limits.max_texture_dimension_2d,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                },
                None,
            )
            .await
            .ok()?;

        log_info!("gpu: using adapter '{}'", adapter_name);

        Some(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name,
            max_texture_dim: limits.max_texture_dimension_2d,
        })
    }

    /// Whether a texture of the given dimensions can be created.
    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        width <= self.max_texture_dim && height <= self.max_texture_dim
    }

    /// Submit a single encoder's commands.
    pub fn submit_one(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
