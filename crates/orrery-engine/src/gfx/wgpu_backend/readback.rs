//! Single-pixel readback for picking.

use std::sync::mpsc;

use crate::gfx::error::GfxError;

/// Rows copied out of a texture must be 256-byte aligned; one row of one
/// texel is all we ever copy.
const STAGING_SIZE: u64 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64;

pub(super) fn staging_buffer(device: &wgpu::Device) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("orrery pick staging"),
        size: STAGING_SIZE,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

pub(super) fn copy_pixel(
    encoder: &mut wgpu::CommandEncoder,
    texture: &wgpu::Texture,
    staging: &wgpu::Buffer,
    x: u32,
    y: u32,
) {
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
                rows_per_image: Some(1),
            },
        },
        wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
    );
}

/// Blocks until the copied texel is mapped, then returns it.
pub(super) fn map_pixel(device: &wgpu::Device, staging: &wgpu::Buffer) -> Result<[u8; 4], GfxError> {
    let slice = staging.slice(..4);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });

    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| GfxError::Readback(e.to_string()))?;
    rx.recv()
        .map_err(|_| GfxError::Readback("map callback dropped".to_string()))?
        .map_err(|e| GfxError::Readback(e.to_string()))?;

    let pixel = {
        let data = slice.get_mapped_range();
        [data[0], data[1], data[2], data[3]]
    };
    staging.unmap();
    Ok(pixel)
}
