use std::collections::HashMap;

use crate::coords::ColorRgba;

use super::context::GraphicsContext;
use super::error::GfxError;
use super::types::{
    BufferDesc,
    BufferId,
    BufferKind,
    DrawCallDesc,
    DrawCallId,
    FrameUniforms,
    FramebufferId,
    ProgramDesc,
    ProgramId,
    ProgramKind,
    Resource,
    Target,
    TextureDesc,
    TextureFormat,
    TextureId,
    TransformDesc,
    VertexArrayId,
    VertexBinding,
};

/// One recorded boundary call.
#[derive(Debug, Clone, PartialEq)]
pub enum GfxCommand {
    CreateTexture { id: TextureId, width: u32, height: u32, format: TextureFormat },
    ResizeTexture { id: TextureId, width: u32, height: u32 },
    WriteTexture { id: TextureId, len: usize },
    CreateBuffer { id: BufferId, kind: BufferKind, size: u64 },
    WriteBuffer { id: BufferId, offset: u64, len: usize },
    CreateProgram { id: ProgramId, label: String },
    CreateVertexArray { id: VertexArrayId },
    CreateDrawCall { id: DrawCallId, label: String },
    CreateFramebuffer { id: FramebufferId },
    Transform { program: ProgramId, count: u32, params: Vec<u32> },
    Clear { target: Target },
    Draw { call: DrawCallId, label: String, target: Target, render_mode: u32 },
    ReadPixel { framebuffer: FramebufferId, x: u32, y: u32 },
    Release(Resource),
}

struct Texture {
    desc: TextureDesc,
    data: Vec<u8>,
}

struct Buffer {
    desc: BufferDesc,
    data: Vec<u8>,
}

/// Graphics context that executes nothing on a GPU.
///
/// Resource contents live in memory, so uploads can be inspected and picking
/// pixels injected with [`HeadlessContext::set_pixel`]. Draws and transforms
/// are validated and recorded but produce no pixels.
#[derive(Default)]
pub struct HeadlessContext {
    next_id: u32,
    textures: HashMap<TextureId, Texture>,
    buffers: HashMap<BufferId, Buffer>,
    programs: HashMap<ProgramId, ProgramDesc>,
    vertex_arrays: HashMap<VertexArrayId, Vec<VertexBinding>>,
    draw_calls: HashMap<DrawCallId, DrawCallDesc>,
    framebuffers: HashMap<FramebufferId, (TextureId, Option<TextureId>)>,
    commands: Vec<GfxCommand>,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn commands(&self) -> &[GfxCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<GfxCommand> {
        std::mem::take(&mut self.commands)
    }

    /// `(label, target, render_mode)` of every recorded draw, in issue order.
    pub fn draws(&self) -> Vec<(&str, Target, u32)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                GfxCommand::Draw { label, target, render_mode, .. } => {
                    Some((label.as_str(), *target, *render_mode))
                }
                _ => None,
            })
            .collect()
    }

    pub fn texture_data(&self, id: TextureId) -> Option<&[u8]> {
        self.textures.get(&id).map(|t| t.data.as_slice())
    }

    pub fn buffer_data(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(&id).map(|b| b.data.as_slice())
    }

    pub fn draw_call(&self, id: DrawCallId) -> Option<&DrawCallDesc> {
        self.draw_calls.get(&id)
    }

    /// Number of live (unreleased) resources of every kind.
    pub fn live_resources(&self) -> usize {
        self.textures.len()
            + self.buffers.len()
            + self.programs.len()
            + self.vertex_arrays.len()
            + self.draw_calls.len()
            + self.framebuffers.len()
    }

    /// Writes one pixel into a framebuffer's color attachment, standing in for
    /// what a picking pass would have rendered.
    pub fn set_pixel(&mut self, fb: FramebufferId, x: u32, y: u32, rgba: [u8; 4]) -> Result<(), GfxError> {
        let offset = self.pixel_offset(fb, x, y)?;
        let (color, _) = self.framebuffers[&fb];
        if let Some(tex) = self.textures.get_mut(&color) {
            tex.data[offset..offset + 4].copy_from_slice(&rgba);
        }
        Ok(())
    }

    fn pixel_offset(&self, fb: FramebufferId, x: u32, y: u32) -> Result<usize, GfxError> {
        let &(color, _) = self
            .framebuffers
            .get(&fb)
            .ok_or(GfxError::UnknownResource(Resource::Framebuffer(fb)))?;
        let tex = self.texture(color)?;
        if tex.desc.format != TextureFormat::Rgba8Unorm {
            return Err(GfxError::invalid("readback", "color attachment is not rgba8"));
        }
        let (width, height) = (tex.desc.width, tex.desc.height);
        if x >= width || y >= height {
            return Err(GfxError::OutOfBounds { x, y, width, height });
        }
        Ok((y as usize * width as usize + x as usize) * 4)
    }

    fn texture(&self, id: TextureId) -> Result<&Texture, GfxError> {
        self.textures.get(&id).ok_or(GfxError::UnknownResource(Resource::Texture(id)))
    }

    fn buffer(&self, id: BufferId) -> Result<&Buffer, GfxError> {
        self.buffers.get(&id).ok_or(GfxError::UnknownResource(Resource::Buffer(id)))
    }

    fn program(&self, id: ProgramId) -> Result<&ProgramDesc, GfxError> {
        self.programs.get(&id).ok_or(GfxError::UnknownResource(Resource::Program(id)))
    }

    fn check_textures(&self, program: &ProgramDesc, textures: &[TextureId]) -> Result<(), GfxError> {
        if program.textures.len() != textures.len() {
            return Err(GfxError::invalid(
                "texture bindings",
                format!(
                    "program `{}` declares {} slots, got {}",
                    program.label,
                    program.textures.len(),
                    textures.len()
                ),
            ));
        }
        for &t in textures {
            self.texture(t)?;
        }
        Ok(())
    }
}

fn check_upload(desc: &TextureDesc, data: Option<&[u8]>) -> Result<Vec<u8>, GfxError> {
    if desc.width == 0 || desc.height == 0 {
        return Err(GfxError::invalid("texture", format!("`{}` has zero size", desc.label)));
    }
    match data {
        Some(bytes) if bytes.len() != desc.byte_len() => Err(GfxError::invalid(
            "texture upload",
            format!("`{}` expects {} bytes, got {}", desc.label, desc.byte_len(), bytes.len()),
        )),
        Some(bytes) => Ok(bytes.to_vec()),
        None => Ok(vec![0; desc.byte_len()]),
    }
}

impl GraphicsContext for HeadlessContext {
    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>) -> Result<TextureId, GfxError> {
        let bytes = check_upload(desc, data)?;
        let id = TextureId(self.next());
        self.textures.insert(id, Texture { desc: desc.clone(), data: bytes });
        self.commands.push(GfxCommand::CreateTexture {
            id,
            width: desc.width,
            height: desc.height,
            format: desc.format,
        });
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
        let bytes = check_upload(&desc, data)?;
        self.textures.insert(id, Texture { desc, data: bytes });
        self.commands.push(GfxCommand::ResizeTexture { id, width, height });
        Ok(())
    }

    fn write_texture(&mut self, id: TextureId, data: &[u8]) -> Result<(), GfxError> {
        let desc = self.texture(id)?.desc.clone();
        let bytes = check_upload(&desc, Some(data))?;
        if let Some(tex) = self.textures.get_mut(&id) {
            tex.data = bytes;
        }
        self.commands.push(GfxCommand::WriteTexture { id, len: data.len() });
        Ok(())
    }

    fn texture_size(&self, id: TextureId) -> Result<(u32, u32), GfxError> {
        let tex = self.texture(id)?;
        Ok((tex.desc.width, tex.desc.height))
    }

    fn create_buffer(&mut self, desc: &BufferDesc, data: Option<&[u8]>) -> Result<BufferId, GfxError> {
        let mut bytes = vec![0; desc.size as usize];
        if let Some(src) = data {
            if src.len() as u64 > desc.size {
                return Err(GfxError::invalid(
                    "buffer upload",
                    format!("`{}` holds {} bytes, got {}", desc.label, desc.size, src.len()),
                ));
            }
            bytes[..src.len()].copy_from_slice(src);
        }
        let id = BufferId(self.next());
        self.buffers.insert(id, Buffer { desc: desc.clone(), data: bytes });
        self.commands.push(GfxCommand::CreateBuffer { id, kind: desc.kind, size: desc.size });
        Ok(id)
    }

    fn write_buffer(&mut self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), GfxError> {
        let size = self.buffer(id)?.desc.size;
        let end = offset + data.len() as u64;
        if end > size {
            return Err(GfxError::invalid("buffer write", format!("{end} bytes past a {size}-byte buffer")));
        }
        if let Some(buf) = self.buffers.get_mut(&id) {
            buf.data[offset as usize..end as usize].copy_from_slice(data);
        }
        self.commands.push(GfxCommand::WriteBuffer { id, offset, len: data.len() });
        Ok(())
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, GfxError> {
        let entries_ok = match &desc.kind {
            ProgramKind::Render { vertex_entry, fragment_entry } => {
                desc.source.contains(vertex_entry.as_str()) && desc.source.contains(fragment_entry.as_str())
            }
            ProgramKind::Transform { entry, captures, .. } => {
                !captures.is_empty() && desc.source.contains(entry.as_str())
            }
        };
        if !entries_ok {
            return Err(GfxError::Program {
                label: desc.label.clone(),
                reason: "entry point or captured outputs missing".to_string(),
            });
        }
        let id = ProgramId(self.next());
        self.programs.insert(id, desc.clone());
        self.commands.push(GfxCommand::CreateProgram { id, label: desc.label.clone() });
        Ok(id)
    }

    fn create_vertex_array(&mut self, bindings: &[VertexBinding]) -> Result<VertexArrayId, GfxError> {
        for b in bindings {
            self.buffer(b.buffer)?;
            if let Some(a) = b.attributes.iter().find(|a| a.offset + a.format.size() > b.stride) {
                return Err(GfxError::invalid(
                    "vertex attribute",
                    format!("location {} overruns stride {}", a.location, b.stride),
                ));
            }
        }
        let id = VertexArrayId(self.next());
        self.vertex_arrays.insert(id, bindings.to_vec());
        self.commands.push(GfxCommand::CreateVertexArray { id });
        Ok(id)
    }

    fn create_draw_call(&mut self, desc: &DrawCallDesc) -> Result<DrawCallId, GfxError> {
        let program = self.program(desc.program)?;
        if !matches!(program.kind, ProgramKind::Render { .. }) {
            return Err(GfxError::invalid("draw call", format!("`{}` is not a render program", program.label)));
        }
        self.check_textures(program, &desc.textures)?;
        if !self.vertex_arrays.contains_key(&desc.vertex_array) {
            return Err(GfxError::UnknownResource(Resource::VertexArray(desc.vertex_array)));
        }
        if let Some(ib) = desc.index_buffer {
            self.buffer(ib)?;
        }
        let id = DrawCallId(self.next());
        self.draw_calls.insert(id, desc.clone());
        self.commands.push(GfxCommand::CreateDrawCall { id, label: desc.label.clone() });
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
        self.commands.push(GfxCommand::CreateFramebuffer { id });
        Ok(id)
    }

    fn transform(&mut self, desc: &TransformDesc) -> Result<(), GfxError> {
        let program = self.program(desc.program)?;
        let ProgramKind::Transform { inputs, .. } = &program.kind else {
            return Err(GfxError::invalid("transform", format!("`{}` is not a transform program", program.label)));
        };
        if *inputs as usize != desc.inputs.len() {
            return Err(GfxError::invalid(
                "transform",
                format!("`{}` takes {inputs} inputs, got {}", program.label, desc.inputs.len()),
            ));
        }
        let needed = program.captured_stride() * desc.count as u64;
        self.check_textures(program, &desc.textures)?;
        for &input in &desc.inputs {
            self.buffer(input)?;
        }
        let out = self.buffer(desc.output)?;
        if out.desc.size < needed {
            return Err(GfxError::invalid(
                "transform output",
                format!("`{}` needs {needed} bytes, has {}", out.desc.label, out.desc.size),
            ));
        }
        self.commands.push(GfxCommand::Transform {
            program: desc.program,
            count: desc.count,
            params: desc.params.clone(),
        });
        Ok(())
    }

    fn clear(&mut self, target: Target, color: ColorRgba) -> Result<(), GfxError> {
        if let Target::Framebuffer(fb) = target {
            let &(tex, _) = self
                .framebuffers
                .get(&fb)
                .ok_or(GfxError::UnknownResource(Resource::Framebuffer(fb)))?;
            let texel = color.to_rgba8();
            if let Some(t) = self.textures.get_mut(&tex) {
                for px in t.data.chunks_exact_mut(4) {
                    px.copy_from_slice(&texel);
                }
            }
        }
        self.commands.push(GfxCommand::Clear { target });
        Ok(())
    }

    fn draw(&mut self, call: DrawCallId, target: Target, uniforms: &FrameUniforms) -> Result<(), GfxError> {
        let label = self
            .draw_calls
            .get(&call)
            .map(|d| d.label.clone())
            .ok_or(GfxError::UnknownResource(Resource::DrawCall(call)))?;
        if let Target::Framebuffer(fb) = target {
            if !self.framebuffers.contains_key(&fb) {
                return Err(GfxError::UnknownResource(Resource::Framebuffer(fb)));
            }
        }
        self.commands.push(GfxCommand::Draw { call, label, target, render_mode: uniforms.render_mode });
        Ok(())
    }

    fn read_pixel(&mut self, framebuffer: FramebufferId, x: u32, y: u32) -> Result<[u8; 4], GfxError> {
        self.commands.push(GfxCommand::ReadPixel { framebuffer, x, y });
        let offset = self.pixel_offset(framebuffer, x, y)?;
        let (color, _) = self.framebuffers[&framebuffer];
        let data = &self.texture(color)?.data;
        Ok([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
    }

    fn release(&mut self, resource: Resource) {
        let existed = match resource {
            Resource::Texture(id) => self.textures.remove(&id).is_some(),
            Resource::Buffer(id) => self.buffers.remove(&id).is_some(),
            Resource::Program(id) => self.programs.remove(&id).is_some(),
            Resource::VertexArray(id) => self.vertex_arrays.remove(&id).is_some(),
            Resource::DrawCall(id) => self.draw_calls.remove(&id).is_some(),
            Resource::Framebuffer(id) => self.framebuffers.remove(&id).is_some(),
        };
        if existed {
            self.commands.push(GfxCommand::Release(resource));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{FilterMode, Primitive};

    fn picking_target(ctx: &mut HeadlessContext, w: u32, h: u32) -> FramebufferId {
        let color = ctx
            .create_texture(&TextureDesc::new("color", w, h, TextureFormat::Rgba8Unorm), None)
            .unwrap();
        let depth = ctx
            .create_texture(&TextureDesc::new("depth", w, h, TextureFormat::Depth32Float), None)
            .unwrap();
        ctx.create_framebuffer(color, Some(depth)).unwrap()
    }

    #[test]
    fn injected_pixels_read_back() {
        let mut ctx = HeadlessContext::new();
        let fb = picking_target(&mut ctx, 4, 4);
        ctx.set_pixel(fb, 2, 3, [0, 0, 0, 7]).unwrap();
        assert_eq!(ctx.read_pixel(fb, 2, 3).unwrap(), [0, 0, 0, 7]);
        assert_eq!(ctx.read_pixel(fb, 0, 0).unwrap(), [0, 0, 0, 0]);
    }

    #[test]
    fn out_of_bounds_readback_is_transient() {
        let mut ctx = HeadlessContext::new();
        let fb = picking_target(&mut ctx, 4, 4);
        let err = ctx.read_pixel(fb, 4, 0).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn clear_fills_framebuffer() {
        let mut ctx = HeadlessContext::new();
        let fb = picking_target(&mut ctx, 2, 2);
        ctx.set_pixel(fb, 1, 1, [9, 9, 9, 9]).unwrap();
        ctx.clear(Target::Framebuffer(fb), ColorRgba::transparent()).unwrap();
        assert_eq!(ctx.read_pixel(fb, 1, 1).unwrap(), [0, 0, 0, 0]);
    }

    #[test]
    fn upload_size_is_checked() {
        let mut ctx = HeadlessContext::new();
        let desc = TextureDesc::new("t", 2, 2, TextureFormat::Rgba32Float).with_filter(FilterMode::Nearest);
        assert!(ctx.create_texture(&desc, Some(&[0u8; 16])).is_err());
        assert!(ctx.create_texture(&desc, Some(&[0u8; 64])).is_ok());
    }

    #[test]
    fn draws_are_recorded_with_mode() {
        let mut ctx = HeadlessContext::new();
        let program = ctx
            .create_program(&ProgramDesc::render("p", "fn vs_main() {} fn fs_main() {}"))
            .unwrap();
        let buf = ctx.create_buffer(&BufferDesc::new("b", BufferKind::Vertex, 16), None).unwrap();
        let va = ctx
            .create_vertex_array(&[VertexBinding {
                buffer: buf,
                stride: 16,
                per_instance: false,
                attributes: vec![],
            }])
            .unwrap();
        let call = ctx
            .create_draw_call(&DrawCallDesc {
                label: "quad".into(),
                program,
                vertex_array: va,
                primitive: Primitive::Triangles,
                index_buffer: None,
                vertex_count: 6,
                instance_count: 1,
                textures: vec![],
            })
            .unwrap();
        let uniforms = FrameUniforms { render_mode: 3, ..FrameUniforms::default() };
        ctx.draw(call, Target::Screen, &uniforms).unwrap();
        assert_eq!(ctx.draws(), vec![("quad", Target::Screen, 3)]);
    }

    #[test]
    fn release_drops_resources() {
        let mut ctx = HeadlessContext::new();
        let buf = ctx.create_buffer(&BufferDesc::new("b", BufferKind::Storage, 8), Some(&[1, 2])).unwrap();
        assert_eq!(ctx.buffer_data(buf), Some(&[1, 2, 0, 0, 0, 0, 0, 0][..]));
        ctx.release(Resource::Buffer(buf));
        ctx.release(Resource::Buffer(buf));
        assert_eq!(ctx.live_resources(), 0);
        assert_eq!(
            ctx.commands().iter().filter(|c| matches!(c, GfxCommand::Release(_))).count(),
            1
        );
    }
}
