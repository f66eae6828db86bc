// ============================================================================
// gpu/readback.rs — Shapemorph
// Copies the canvas back to the host for headless frame export.
// ============================================================================

use crate::error::HeadlessError;

use super::WgpuBackend;

/// Strip the row padding wgpu requires for texture-to-buffer copies.
fn unpad_rows(data: &[u8], width: u32, height: u32, padded_bpr: u32) -> Vec<u8> {
    let row_bytes = (width * 4) as usize;
    let mut rgba = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height {
        let start = (row * padded_bpr) as usize;
        rgba.extend_from_slice(&data[start..start + row_bytes]);
    }
    rgba
}

impl WgpuBackend {
    /// Read the last rendered canvas into an RGBA image. Blocks until the GPU
    /// has finished every submitted frame.
    pub fn read_canvas(&self) -> Result<image::RgbaImage, HeadlessError> {
        let width = self.canvas.extent.width;
        let height = self.canvas.extent.height;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bpr = (width * 4).div_ceil(align) * align;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("canvas_staging"),
            size: (padded_bpr * height) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.canvas.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(HeadlessError::Readback(e.to_string())),
            Err(e) => return Err(HeadlessError::Readback(e.to_string())),
        }

        let rgba = {
            let data = slice.get_mapped_range();
            unpad_rows(&data, width, height, padded_bpr)
        };
        staging.unmap();

        image::RgbaImage::from_raw(width, height, rgba)
            .ok_or_else(|| HeadlessError::Readback("canvas size does not match pixel data".into()))
    }
}
