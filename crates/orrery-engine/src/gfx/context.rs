use crate::coords::ColorRgba;

use super::error::GfxError;
use super::types::{
    BufferDesc,
    BufferId,
    DrawCallDesc,
    DrawCallId,
    FrameUniforms,
    FramebufferId,
    ProgramDesc,
    ProgramId,
    Resource,
    Target,
    TextureDesc,
    TextureId,
    TransformDesc,
    VertexArrayId,
    VertexBinding,
};

/// The downward GPU contract used by the graph renderer.
///
/// Calls are synchronous from the caller's point of view: work is recorded in
/// order and any readback observes everything issued before it.
pub trait GraphicsContext {
    /// Creates a 2-D texture, optionally uploading its full contents.
    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>) -> Result<TextureId, GfxError>;

    /// Reallocates a texture at a new size. Previous contents are discarded.
    fn resize_texture(
        &mut self,
        id: TextureId,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) -> Result<(), GfxError>;

    /// Replaces the full contents of a texture.
    fn write_texture(&mut self, id: TextureId, data: &[u8]) -> Result<(), GfxError>;

    fn texture_size(&self, id: TextureId) -> Result<(u32, u32), GfxError>;

    fn create_buffer(&mut self, desc: &BufferDesc, data: Option<&[u8]>) -> Result<BufferId, GfxError>;

    fn write_buffer(&mut self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), GfxError>;

    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, GfxError>;

    fn create_vertex_array(&mut self, bindings: &[VertexBinding]) -> Result<VertexArrayId, GfxError>;

    fn create_draw_call(&mut self, desc: &DrawCallDesc) -> Result<DrawCallId, GfxError>;

    /// Creates an off-screen target from a color texture and optional depth texture.
    ///
    /// The framebuffer follows its textures: resizing them resizes it.
    fn create_framebuffer(
        &mut self,
        color: TextureId,
        depth: Option<TextureId>,
    ) -> Result<FramebufferId, GfxError>;

    /// Runs a transform program, writing `desc.count` output entries.
    fn transform(&mut self, desc: &TransformDesc) -> Result<(), GfxError>;

    /// Clears a target's color (and depth, when present).
    fn clear(&mut self, target: Target, color: ColorRgba) -> Result<(), GfxError>;

    fn draw(&mut self, call: DrawCallId, target: Target, uniforms: &FrameUniforms) -> Result<(), GfxError>;

    /// Reads one RGBA8 pixel of a framebuffer's color attachment.
    ///
    /// Coordinates outside the attachment fail with a transient
    /// [`GfxError::OutOfBounds`].
    fn read_pixel(&mut self, framebuffer: FramebufferId, x: u32, y: u32) -> Result<[u8; 4], GfxError>;

    /// Frees a resource. Unknown handles are ignored.
    fn release(&mut self, resource: Resource);
}
