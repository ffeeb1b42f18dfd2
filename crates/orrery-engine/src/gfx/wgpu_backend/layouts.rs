//! Conversions from boundary descriptors to wgpu objects.

use std::num::NonZeroU64;

use crate::gfx::types::{
    AttributeFormat,
    BufferKind,
    FrameUniforms,
    Primitive,
    TextureFormat,
    TextureSlot,
    VertexBinding,
};

/// Render pipelines are keyed by the target they draw into.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) struct PipelineKey {
    pub format: wgpu::TextureFormat,
    pub depth: bool,
    /// Alpha blending for on-screen passes; off-screen (picking) passes write
    /// colors verbatim.
    pub blend: bool,
}

pub(super) const TEXTURE_STAGES: wgpu::ShaderStages = wgpu::ShaderStages::VERTEX
    .union(wgpu::ShaderStages::FRAGMENT)
    .union(wgpu::ShaderStages::COMPUTE);

// ── formats ───────────────────────────────────────────────────────────────

pub(super) fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

pub(super) fn texture_usage(format: TextureFormat) -> wgpu::TextureUsages {
    match format {
        TextureFormat::Rgba8Unorm => {
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::RENDER_ATTACHMENT
        }
        TextureFormat::Rgba32Float => wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        TextureFormat::Depth32Float => wgpu::TextureUsages::RENDER_ATTACHMENT,
    }
}

pub(super) fn buffer_usage(kind: BufferKind) -> wgpu::BufferUsages {
    match kind {
        BufferKind::Vertex => wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        BufferKind::Index => wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        BufferKind::Storage => {
            wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC
        }
    }
}

/// Buffers are at least 16 bytes and a multiple of 4 so they can always be
/// bound as storage and written with `Queue::write_buffer`.
pub(super) fn padded_buffer_size(size: u64) -> u64 {
    size.max(16).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT)
}

fn vertex_format(format: AttributeFormat) -> wgpu::VertexFormat {
    match format {
        AttributeFormat::Float32 => wgpu::VertexFormat::Float32,
        AttributeFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        AttributeFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        AttributeFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        AttributeFormat::Uint32 => wgpu::VertexFormat::Uint32,
        AttributeFormat::Uint32x4 => wgpu::VertexFormat::Uint32x4,
        AttributeFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
    }
}

pub(super) fn topology(primitive: Primitive) -> wgpu::PrimitiveTopology {
    match primitive {
        Primitive::Triangles => wgpu::PrimitiveTopology::TriangleList,
        Primitive::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        Primitive::Lines => wgpu::PrimitiveTopology::LineList,
        Primitive::Points => wgpu::PrimitiveTopology::PointList,
    }
}

/// Attribute lists per binding; `VertexBufferLayout` borrows from these.
pub(super) fn vertex_attributes(bindings: &[VertexBinding]) -> Vec<Vec<wgpu::VertexAttribute>> {
    bindings
        .iter()
        .map(|b| {
            b.attributes
                .iter()
                .map(|a| wgpu::VertexAttribute {
                    format: vertex_format(a.format),
                    offset: a.offset,
                    shader_location: a.location,
                })
                .collect()
        })
        .collect()
}

pub(super) fn vertex_layouts<'a>(
    bindings: &[VertexBinding],
    attributes: &'a [Vec<wgpu::VertexAttribute>],
) -> Vec<wgpu::VertexBufferLayout<'a>> {
    bindings
        .iter()
        .zip(attributes)
        .map(|(b, attrs)| wgpu::VertexBufferLayout {
            array_stride: b.stride,
            step_mode: if b.per_instance {
                wgpu::VertexStepMode::Instance
            } else {
                wgpu::VertexStepMode::Vertex
            },
            attributes: attrs,
        })
        .collect()
}

// ── blend ─────────────────────────────────────────────────────────────────

pub(super) fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

// ── bind group layouts ────────────────────────────────────────────────────

pub(super) fn frame_uniforms_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("orrery frame uniforms bgl"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(std::mem::size_of::<FrameUniforms>() as u64),
            },
            count: None,
        }],
    })
}

/// Group 1: texture slot `i` at binding `2i`, its sampler (if sampled) at `2i + 1`.
pub(super) fn texture_layout(
    device: &wgpu::Device,
    label: &str,
    slots: &[TextureSlot],
) -> Option<wgpu::BindGroupLayout> {
    if slots.is_empty() {
        return None;
    }
    let mut entries = Vec::with_capacity(slots.len() * 2);
    for (i, slot) in slots.iter().enumerate() {
        let binding = 2 * i as u32;
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: TEXTURE_STAGES,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: *slot == TextureSlot::Sampled },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        if *slot == TextureSlot::Sampled {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: binding + 1,
                visibility: TEXTURE_STAGES,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
    }
    Some(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&format!("{label} textures bgl")),
        entries: &entries,
    }))
}

/// Group 0 of a transform program: params, output, then `inputs` sources.
pub(super) fn transform_layout(device: &wgpu::Device, label: &str, inputs: u32) -> wgpu::BindGroupLayout {
    let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    };
    let mut entries = vec![storage(0, true), storage(1, false)];
    entries.extend((0..inputs).map(|i| storage(2 + i, true)));

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&format!("{label} transform bgl")),
        entries: &entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sizes_are_bindable() {
        assert_eq!(padded_buffer_size(0), 16);
        assert_eq!(padded_buffer_size(18), 20);
        assert_eq!(padded_buffer_size(64), 64);
    }

    #[test]
    fn storage_buffers_double_as_vertex_data() {
        let usage = buffer_usage(BufferKind::Storage);
        assert!(usage.contains(wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::VERTEX));
    }
}
