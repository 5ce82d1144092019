// ============================================================================
// LAYER TEXTURE — GPU-side texture wrapper with partial upload support
// ============================================================================

/// A GPU-side RGBA8 texture caching one layer's pixel data (or serving as an
/// offscreen compositing target).
///
/// ### Key optimisation: `update_rect`
/// During a stroke only the modified region is uploaded via
/// `queue.write_texture` — never the whole canvas.
pub struct LayerTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl LayerTexture {
    /// Create a texture and upload `data` (straight RGBA, row-major).
    /// Pass an empty slice to leave it uninitialized (render targets).
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("LayerTexture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let this = Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            texture,
            width,
            height,
        };
        if !data.is_empty() {
            this.upload_full(queue, data);
        }
        this
    }

    /// Upload only the modified rectangle.  `data` must contain
    /// `rect_width * rect_height * 4` bytes for the sub-region starting at
    /// `(x, y)`.
    pub fn update_rect(
        &self,
        queue: &wgpu::Queue,
        x: u32,
        y: u32,
        rect_width: u32,
        rect_height: u32,
        data: &[u8],
    ) {
        debug_assert_eq!(data.len(), (rect_width * rect_height * 4) as usize);

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * rect_width),
                rows_per_image: Some(rect_height),
            },
            wgpu::Extent3d {
                width: rect_width,
                height: rect_height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Full re-upload of all pixel data.
    pub fn upload_full(&self, queue: &wgpu::Queue, data: &[u8]) {
        self.update_rect(queue, 0, 0, self.width, self.height, data);
    }
}
