mod layouts;
mod readback;

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::coords::ColorRgba;

use super::context::GraphicsContext;
use super::error::GfxError;
use super::types::{
    BufferDesc,
    BufferId,
    DrawCallDesc,
    DrawCallId,
    FilterMode,
    FrameUniforms,
    FramebufferId,
    Primitive,
    ProgramDesc,
    ProgramId,
    ProgramKind,
    Resource,
    Target,
    TextureDesc,
    TextureId,
    TextureSlot,
    TransformDesc,
    VertexArrayId,
    VertexBinding,
};

use layouts::PipelineKey;

/// Transform programs are dispatched in groups of this many entries; WGSL
/// sources declare `@workgroup_size(64)`.
pub const TRANSFORM_WORKGROUP_SIZE: u32 = 64;

// ── resources ─────────────────────────────────────────────────────────────

struct GpuTexture {
    desc: TextureDesc,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct GpuBuffer {
    desc: BufferDesc,
    buffer: wgpu::Buffer,
}

struct GpuProgram {
    desc: ProgramDesc,
    module: wgpu::ShaderModule,
    textures_layout: Option<wgpu::BindGroupLayout>,
    layout: wgpu::PipelineLayout,
    /// Transform programs only.
    compute: Option<(wgpu::BindGroupLayout, wgpu::ComputePipeline)>,
}

struct GpuDrawCall {
    desc: DrawCallDesc,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

/// Screen target for the current frame.
struct AttachedSurface {
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
}

/// [`GraphicsContext`] over a wgpu device and queue.
///
/// Passes are recorded into one pending command encoder and submitted on
/// [`flush`](Self::flush), before uniform/buffer/texture writes (queue writes
/// land before the next submission, so recorded passes must go first), and
/// before pixel readback.
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    next_id: u32,

    textures: HashMap<TextureId, GpuTexture>,
    buffers: HashMap<BufferId, GpuBuffer>,
    programs: HashMap<ProgramId, GpuProgram>,
    vertex_arrays: HashMap<VertexArrayId, Vec<VertexBinding>>,
    draw_calls: HashMap<DrawCallId, GpuDrawCall>,
    framebuffers: HashMap<FramebufferId, (TextureId, Option<TextureId>)>,

    surface: Option<AttachedSurface>,

    frame_layout: wgpu::BindGroupLayout,
    frame_ubo: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    frame_uniforms: Option<FrameUniforms>,

    nearest_sampler: wgpu::Sampler,
    linear_sampler: wgpu::Sampler,

    readback: wgpu::Buffer,
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuContext {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let frame_layout = layouts::frame_uniforms_layout(&device);
        let frame_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("orrery frame ubo"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("orrery frame bind group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: frame_ubo.as_entire_binding() }],
        });

        let sampler = |label: &str, filter: wgpu::FilterMode| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::MipmapFilterMode::Nearest,
                ..Default::default()
            })
        };
        let nearest_sampler = sampler("orrery nearest sampler", wgpu::FilterMode::Nearest);
        let linear_sampler = sampler("orrery linear sampler", wgpu::FilterMode::Linear);

        let readback = readback::staging_buffer(&device);

        Self {
            device,
            queue,
            next_id: 0,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            programs: HashMap::new(),
            vertex_arrays: HashMap::new(),
            draw_calls: HashMap::new(),
            framebuffers: HashMap::new(),
            surface: None,
            frame_layout,
            frame_ubo,
            frame_bind_group,
            frame_uniforms: None,
            nearest_sampler,
            linear_sampler,
            readback,
            encoder: None,
        }
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Sets the swapchain view that `Target::Screen` draws into.
    pub fn attach_surface(&mut self, view: wgpu::TextureView, format: wgpu::TextureFormat) {
        self.surface = Some(AttachedSurface { view, format });
    }

    /// Submits pending work and forgets the screen target.
    pub fn detach_surface(&mut self) {
        self.flush();
        self.surface = None;
    }

    /// Submits all recorded passes.
    pub fn flush(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn take_encoder(&mut self) -> wgpu::CommandEncoder {
        self.encoder.take().unwrap_or_else(|| {
            self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("orrery encoder"),
            })
        })
    }

    fn set_uniforms(&mut self, uniforms: &FrameUniforms) {
        if self.frame_uniforms.as_ref() == Some(uniforms) {
            return;
        }
        self.flush();
        self.queue.write_buffer(&self.frame_ubo, 0, bytemuck::bytes_of(uniforms));
        self.frame_uniforms = Some(*uniforms);
    }

    fn texture(&self, id: TextureId) -> Result<&GpuTexture, GfxError> {
        self.textures.get(&id).ok_or(GfxError::UnknownResource(Resource::Texture(id)))
    }

    fn buffer(&self, id: BufferId) -> Result<&GpuBuffer, GfxError> {
        self.buffers.get(&id).ok_or(GfxError::UnknownResource(Resource::Buffer(id)))
    }

    fn program(&self, id: ProgramId) -> Result<&GpuProgram, GfxError> {
        self.programs.get(&id).ok_or(GfxError::UnknownResource(Resource::Program(id)))
    }

    fn allocate_texture(&self, desc: &TextureDesc) -> Result<GpuTexture, GfxError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GfxError::invalid("texture", format!("`{}` has zero size", desc.label)));
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d { width: desc.width, height: desc.height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: layouts::texture_format(desc.format),
            usage: layouts::texture_usage(desc.format),
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(GpuTexture { desc: desc.clone(), texture, view })
    }

    fn upload_texture(&mut self, id: TextureId, data: &[u8]) -> Result<(), GfxError> {
        let expected = self.texture(id)?.desc.byte_len();
        if data.len() != expected {
            return Err(GfxError::invalid(
                "texture upload",
                format!("expected {expected} bytes, got {}", data.len()),
            ));
        }
        self.flush();
        let tex = self.texture(id)?;
        if tex.desc.format.is_depth() {
            return Err(GfxError::invalid("texture upload", "depth textures are render-only"));
        }
        let bpp = tex.desc.format.bytes_per_texel();
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &tex.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(tex.desc.width * bpp),
                rows_per_image: Some(tex.desc.height),
            },
            wgpu::Extent3d { width: tex.desc.width, height: tex.desc.height, depth_or_array_layers: 1 },
        );
        Ok(())
    }

    /// Color view, its format, and the optional depth view for a target.
    fn resolve_target(
        &self,
        target: Target,
    ) -> Result<(&wgpu::TextureView, wgpu::TextureFormat, Option<&wgpu::TextureView>), GfxError> {
        match target {
            Target::Screen => {
                let surface = self.surface.as_ref().ok_or(GfxError::NoSurface)?;
                Ok((&surface.view, surface.format, None))
            }
            Target::Framebuffer(fb) => {
                let &(color, depth) = self
                    .framebuffers
                    .get(&fb)
                    .ok_or(GfxError::UnknownResource(Resource::Framebuffer(fb)))?;
                let color = self.texture(color)?;
                let depth = match depth {
                    Some(d) => Some(&self.texture(d)?.view),
                    None => None,
                };
                Ok((&color.view, layouts::texture_format(color.desc.format), depth))
            }
        }
    }

    fn texture_bind_group(
        &self,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        slots: &[TextureSlot],
        textures: &[TextureId],
    ) -> Result<wgpu::BindGroup, GfxError> {
        let mut entries = Vec::with_capacity(slots.len() * 2);
        for (i, (slot, &id)) in slots.iter().zip(textures).enumerate() {
            let tex = self.texture(id)?;
            let binding = 2 * i as u32;
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(&tex.view),
            });
            if *slot == TextureSlot::Sampled {
                let sampler = match tex.desc.filter {
                    FilterMode::Nearest => &self.nearest_sampler,
                    FilterMode::Linear => &self.linear_sampler,
                };
                entries.push(wgpu::BindGroupEntry {
                    binding: binding + 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                });
            }
        }
        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} textures")),
            layout,
            entries: &entries,
        }))
    }

    fn build_render_pipeline(
        device: &wgpu::Device,
        program: &GpuProgram,
        bindings: &[VertexBinding],
        primitive: Primitive,
        indexed: bool,
        key: PipelineKey,
    ) -> Result<wgpu::RenderPipeline, GfxError> {
        let ProgramKind::Render { vertex_entry, fragment_entry } = &program.desc.kind else {
            return Err(GfxError::invalid("draw call", "transform programs cannot draw"));
        };

        let attributes = layouts::vertex_attributes(bindings);
        let buffers = layouts::vertex_layouts(bindings, &attributes);
        let strip = matches!(primitive, Primitive::TriangleStrip);

        Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&program.desc.label),
            layout: Some(&program.layout),
            vertex: wgpu::VertexState {
                module: &program.module,
                entry_point: Some(vertex_entry.as_str()),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.module,
                entry_point: Some(fragment_entry.as_str()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend: key.blend.then(layouts::premul_alpha_blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: layouts::topology(primitive),
                strip_index_format: (strip && indexed).then_some(wgpu::IndexFormat::Uint16),
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: key.depth.then(|| wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        }))
    }
}

impl GraphicsContext for WgpuContext {
    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>) -> Result<TextureId, GfxError> {
        let tex = self.allocate_texture(desc)?;
        let id = TextureId(self.next());
        self.textures.insert(id, tex);
        if let Some(bytes) = data {
            if let Err(e) = self.upload_texture(id, bytes) {
                self.textures.remove(&id);
                return Err(e);
            }
        }
        Ok(id)
    }

    fn resize_texture(
        &mut self,
        id: TextureId,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) -> Result<(), GfxError> {
        let mut desc = self.texture(id)?.desc.clone();
        desc.width = width;
        desc.height = height;
        let tex = self.allocate_texture(&desc)?;
        // Recorded passes may still reference the old texture.
        self.flush();
        self.textures.insert(id, tex);
        match data {
            Some(bytes) => self.upload_texture(id, bytes),
            None => Ok(()),
        }
    }

    fn write_texture(&mut self, id: TextureId, data: &[u8]) -> Result<(), GfxError> {
        self.upload_texture(id, data)
    }

    fn texture_size(&self, id: TextureId) -> Result<(u32, u32), GfxError> {
        let tex = self.texture(id)?;
        Ok((tex.desc.width, tex.desc.height))
    }

    fn create_buffer(&mut self, desc: &BufferDesc, data: Option<&[u8]>) -> Result<BufferId, GfxError> {
        if let Some(src) = data {
            if src.len() as u64 > desc.size {
                return Err(GfxError::invalid(
                    "buffer upload",
                    format!("`{}` holds {} bytes, got {}", desc.label, desc.size, src.len()),
                ));
            }
        }
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&desc.label),
            size: layouts::padded_buffer_size(desc.size),
            usage: layouts::buffer_usage(desc.kind),
            mapped_at_creation: false,
        });
        let id = BufferId(self.next());
        self.buffers.insert(id, GpuBuffer { desc: desc.clone(), buffer });
        if let Some(src) = data {
            self.write_buffer(id, 0, src)?;
        }
        Ok(id)
    }

    fn write_buffer(&mut self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), GfxError> {
        let size = self.buffer(id)?.desc.size;
        let end = offset + data.len() as u64;
        if end > size || offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(GfxError::invalid(
                "buffer write",
                format!("{} bytes at offset {offset} into a {size}-byte buffer", data.len()),
            ));
        }
        if data.is_empty() {
            return Ok(());
        }
        self.flush();
        let buf = self.buffer(id)?;
        if data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT == 0 {
            self.queue.write_buffer(&buf.buffer, offset, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(data.len().next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize), 0);
            self.queue.write_buffer(&buf.buffer, offset, &padded);
        }
        Ok(())
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, GfxError> {
        if let ProgramKind::Transform { captures, .. } = &desc.kind {
            if captures.is_empty() {
                return Err(GfxError::Program {
                    label: desc.label.clone(),
                    reason: "transform program captures no outputs".to_string(),
                });
            }
        }

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.source.clone()),
        });
        let textures_layout = layouts::texture_layout(&self.device, &desc.label, &desc.textures);

        let (layout, compute) = match &desc.kind {
            ProgramKind::Render { .. } => {
                let mut groups = vec![&self.frame_layout];
                groups.extend(textures_layout.as_ref());
                let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(&desc.label),
                    bind_group_layouts: &groups,
                    immediate_size: 0,
                });
                (layout, None)
            }
            ProgramKind::Transform { entry, inputs, .. } => {
                let io_layout = layouts::transform_layout(&self.device, &desc.label, *inputs);
                let mut groups = vec![&io_layout];
                groups.extend(textures_layout.as_ref());
                let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(&desc.label),
                    bind_group_layouts: &groups,
                    immediate_size: 0,
                });
                let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(&desc.label),
                    layout: Some(&layout),
                    module: &module,
                    entry_point: Some(entry.as_str()),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    cache: None,
                });
                (layout, Some((io_layout, pipeline)))
            }
        };

        log::debug!("compiled program `{}`", desc.label);
        let id = ProgramId(self.next());
        self.programs.insert(id, GpuProgram { desc: desc.clone(), module, textures_layout, layout, compute });
        Ok(id)
    }

    fn create_vertex_array(&mut self, bindings: &[VertexBinding]) -> Result<VertexArrayId, GfxError> {
        for b in bindings {
            self.buffer(b.buffer)?;
        }
        let id = VertexArrayId(self.next());
        self.vertex_arrays.insert(id, bindings.to_vec());
        Ok(id)
    }

    fn create_draw_call(&mut self, desc: &DrawCallDesc) -> Result<DrawCallId, GfxError> {
        let program = self.program(desc.program)?;
        if program.desc.textures.len() != desc.textures.len() {
            return Err(GfxError::invalid(
                "texture bindings",
                format!("program `{}` declares {} slots", program.desc.label, program.desc.textures.len()),
            ));
        }
        if !self.vertex_arrays.contains_key(&desc.vertex_array) {
            return Err(GfxError::UnknownResource(Resource::VertexArray(desc.vertex_array)));
        }
        let id = DrawCallId(self.next());
        self.draw_calls.insert(id, GpuDrawCall { desc: desc.clone(), pipelines: HashMap::new() });
        Ok(id)
    }

    fn create_framebuffer(
        &mut self,
        color: TextureId,
        depth: Option<TextureId>,
    ) -> Result<FramebufferId, GfxError> {
        self.texture(color)?;
        if let Some(d) = depth {
            if !self.texture(d)?.desc.format.is_depth() {
                return Err(GfxError::invalid("framebuffer", "depth attachment has a color format"));
            }
        }
        let id = FramebufferId(self.next());
        self.framebuffers.insert(id, (color, depth));
        Ok(id)
    }

    fn transform(&mut self, desc: &TransformDesc) -> Result<(), GfxError> {
        if desc.count == 0 {
            return Ok(());
        }
        let program = self.program(desc.program)?;
        let Some((io_layout, pipeline)) = program.compute.as_ref() else {
            return Err(GfxError::invalid("transform", format!("`{}` is not a transform program", program.desc.label)));
        };

        let mut params = desc.params.clone();
        if params.is_empty() {
            params.push(0);
        }
        let params_buf = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("orrery transform params"),
            contents: bytemuck::cast_slice(&params),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let output = self.buffer(desc.output)?;
        let needed = program.desc.captured_stride() * desc.count as u64;
        if output.desc.size < needed {
            return Err(GfxError::invalid(
                "transform output",
                format!("`{}` needs {needed} bytes, has {}", output.desc.label, output.desc.size),
            ));
        }

        let mut entries = vec![
            wgpu::BindGroupEntry { binding: 0, resource: params_buf.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: output.buffer.as_entire_binding() },
        ];
        for (i, &input) in desc.inputs.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + i as u32,
                resource: self.buffer(input)?.buffer.as_entire_binding(),
            });
        }
        let io_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&program.desc.label),
            layout: io_layout,
            entries: &entries,
        });
        let tex_group = match &program.textures_layout {
            Some(layout) => Some(self.texture_bind_group(
                &program.desc.label,
                layout,
                &program.desc.textures,
                &desc.textures,
            )?),
            None => None,
        };
        let pipeline = pipeline.clone();

        let mut encoder = self.take_encoder();
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("orrery transform pass"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&pipeline);
            cpass.set_bind_group(0, &io_group, &[]);
            if let Some(group) = &tex_group {
                cpass.set_bind_group(1, group, &[]);
            }
            cpass.dispatch_workgroups(desc.count.div_ceil(TRANSFORM_WORKGROUP_SIZE), 1, 1);
        }
        self.encoder = Some(encoder);
        Ok(())
    }

    fn clear(&mut self, target: Target, color: ColorRgba) -> Result<(), GfxError> {
        let mut encoder = self.take_encoder();
        let result = self.resolve_target(target).map(|(view, _, depth)| {
            let _rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("orrery clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: color.r as f64,
                            g: color.g as f64,
                            b: color.b as f64,
                            a: color.a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: depth.map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        });
        self.encoder = Some(encoder);
        result
    }

    fn draw(&mut self, call: DrawCallId, target: Target, uniforms: &FrameUniforms) -> Result<(), GfxError> {
        if !self.draw_calls.contains_key(&call) {
            return Err(GfxError::UnknownResource(Resource::DrawCall(call)));
        }
        self.set_uniforms(uniforms);

        let (_, format, depth) = self.resolve_target(target)?;
        let key = PipelineKey { format, depth: depth.is_some(), blend: target == Target::Screen };

        // ── pipeline (lazy, per target kind) ───────────────────────────────
        let Some(draw) = self.draw_calls.get(&call) else { return Ok(()); };
        if !draw.pipelines.contains_key(&key) {
            let program = self.program(draw.desc.program)?;
            let bindings = self
                .vertex_arrays
                .get(&draw.desc.vertex_array)
                .ok_or(GfxError::UnknownResource(Resource::VertexArray(draw.desc.vertex_array)))?;
            let pipeline = Self::build_render_pipeline(
                &self.device,
                program,
                bindings,
                draw.desc.primitive,
                draw.desc.index_buffer.is_some(),
                key,
            )?;
            if let Some(draw) = self.draw_calls.get_mut(&call) {
                draw.pipelines.insert(key, pipeline);
            }
        }

        // ── bindings ───────────────────────────────────────────────────────
        let Some(draw) = self.draw_calls.get(&call) else { return Ok(()); };
        let Some(pipeline) = draw.pipelines.get(&key) else { return Ok(()); };
        let program = self.program(draw.desc.program)?;
        let tex_group = match &program.textures_layout {
            Some(layout) => Some(self.texture_bind_group(
                &draw.desc.label,
                layout,
                &program.desc.textures,
                &draw.desc.textures,
            )?),
            None => None,
        };
        let bindings = self
            .vertex_arrays
            .get(&draw.desc.vertex_array)
            .ok_or(GfxError::UnknownResource(Resource::VertexArray(draw.desc.vertex_array)))?;
        let mut vertex_buffers = Vec::with_capacity(bindings.len());
        for b in bindings {
            vertex_buffers.push(self.buffer(b.buffer)?.buffer.clone());
        }
        let index_buffer = match draw.desc.index_buffer {
            Some(ib) => Some(self.buffer(ib)?.buffer.clone()),
            None => None,
        };
        let pipeline = pipeline.clone();
        let (vertex_count, instance_count) = (draw.desc.vertex_count, draw.desc.instance_count);
        let (view, _, depth) = self.resolve_target(target)?;
        let (view, depth) = (view.clone(), depth.cloned());

        // ── pass ───────────────────────────────────────────────────────────
        let mut encoder = self.take_encoder();
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("orrery draw pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: depth.as_ref().map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_pipeline(&pipeline);
            rpass.set_bind_group(0, &self.frame_bind_group, &[]);
            if let Some(group) = &tex_group {
                rpass.set_bind_group(1, group, &[]);
            }
            for (slot, buffer) in vertex_buffers.iter().enumerate() {
                rpass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
            match &index_buffer {
                Some(ib) => {
                    rpass.set_index_buffer(ib.slice(..), wgpu::IndexFormat::Uint16);
                    rpass.draw_indexed(0..vertex_count, 0, 0..instance_count);
                }
                None => rpass.draw(0..vertex_count, 0..instance_count),
            }
        }
        self.encoder = Some(encoder);
        Ok(())
    }

    fn read_pixel(&mut self, framebuffer: FramebufferId, x: u32, y: u32) -> Result<[u8; 4], GfxError> {
        let &(color, _) = self
            .framebuffers
            .get(&framebuffer)
            .ok_or(GfxError::UnknownResource(Resource::Framebuffer(framebuffer)))?;
        let (width, height) = self.texture_size(color)?;
        if x >= width || y >= height {
            return Err(GfxError::OutOfBounds { x, y, width, height });
        }

        let mut encoder = self.take_encoder();
        let tex = self.texture(color)?;
        readback::copy_pixel(&mut encoder, &tex.texture, &self.readback, x, y);
        self.queue.submit(std::iter::once(encoder.finish()));
        readback::map_pixel(&self.device, &self.readback)
    }

    fn release(&mut self, resource: Resource) {
        // Pending passes may reference the resource.
        self.flush();
        match resource {
            Resource::Texture(id) => {
                if let Some(tex) = self.textures.remove(&id) {
                    tex.texture.destroy();
                }
            }
            Resource::Buffer(id) => {
                if let Some(buf) = self.buffers.remove(&id) {
                    buf.buffer.destroy();
                }
            }
            Resource::Program(id) => {
                self.programs.remove(&id);
            }
            Resource::VertexArray(id) => {
                self.vertex_arrays.remove(&id);
            }
            Resource::DrawCall(id) => {
                self.draw_calls.remove(&id);
            }
            Resource::Framebuffer(id) => {
                self.framebuffers.remove(&id);
            }
        }
    }
}
