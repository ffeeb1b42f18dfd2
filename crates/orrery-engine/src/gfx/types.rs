use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};

macro_rules! handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {$(
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(pub(crate) u32);

        impl $name {
            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }
        }
    )*};
}

handle! {
    /// 2-D texture owned by a graphics context.
    TextureId,
    /// Vertex, index or storage buffer.
    BufferId,
    /// Compiled render or transform program.
    ProgramId,
    /// Set of buffers bound to attribute slots.
    VertexArrayId,
    /// Program + vertex array + primitive, ready to draw.
    DrawCallId,
    /// Off-screen color (+ optional depth) target.
    FramebufferId,
}

/// Any releasable handle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Resource {
    Texture(TextureId),
    Buffer(BufferId),
    Program(ProgramId),
    VertexArray(VertexArrayId),
    DrawCall(DrawCallId),
    Framebuffer(FramebufferId),
}

// ── textures ──────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba32Float,
    Depth32Float,
}

impl TextureFormat {
    pub const fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm => 4,
            TextureFormat::Rgba32Float => 16,
            TextureFormat::Depth32Float => 4,
        }
    }

    pub const fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub filter: FilterMode,
}

impl TextureDesc {
    pub fn new(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self { label: label.into(), width, height, format, filter: FilterMode::Nearest }
    }

    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    /// Byte length of a full upload for this size and format.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_texel() as usize
    }
}

// ── buffers ───────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferKind {
    /// Per-vertex or per-instance attribute data.
    Vertex,
    /// `u16` indices.
    Index,
    /// Transform input/output; also bindable as vertex data.
    Storage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferDesc {
    pub label: String,
    pub kind: BufferKind,
    pub size: u64,
}

impl BufferDesc {
    pub fn new(label: impl Into<String>, kind: BufferKind, size: u64) -> Self {
        Self { label: label.into(), kind, size }
    }
}

// ── programs ──────────────────────────────────────────────────────────────

/// How a program binds texture slot `i` (group 1, binding `2 * i`).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureSlot {
    /// Read with `textureLoad`; no sampler.
    Data,
    /// Filtered sampling; sampler lives at binding `2 * i + 1`.
    Sampled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgramKind {
    /// Vertex + fragment stage. Group 0 binding 0 is [`FrameUniforms`].
    Render { vertex_entry: String, fragment_entry: String },

    /// Compute stage that resolves packed source entries into draw-ready
    /// instance data. Group 0: binding 0 params (`array<u32>`), binding 1
    /// output (`array<u32>`, read-write), bindings `2..2 + inputs` inputs.
    ///
    /// `captures` names the output fields, in order; it documents the output
    /// record and sizes it (`4 * captures.len()` bytes per entry).
    Transform { entry: String, inputs: u32, captures: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramDesc {
    pub label: String,
    pub source: Cow<'static, str>,
    pub kind: ProgramKind,
    pub textures: Vec<TextureSlot>,
}

impl ProgramDesc {
    pub fn render(label: impl Into<String>, source: impl Into<Cow<'static, str>>) -> Self {
        Self {
            label: label.into(),
            source: source.into(),
            kind: ProgramKind::Render {
                vertex_entry: "vs_main".to_string(),
                fragment_entry: "fs_main".to_string(),
            },
            textures: Vec::new(),
        }
    }

    pub fn transform(
        label: impl Into<String>,
        source: impl Into<Cow<'static, str>>,
        inputs: u32,
        captures: &[&str],
    ) -> Self {
        Self {
            label: label.into(),
            source: source.into(),
            kind: ProgramKind::Transform {
                entry: "main".to_string(),
                inputs,
                captures: captures.iter().map(|c| c.to_string()).collect(),
            },
            textures: Vec::new(),
        }
    }

    pub fn with_textures(mut self, slots: &[TextureSlot]) -> Self {
        self.textures = slots.to_vec();
        self
    }

    /// Output bytes per entry for transform programs; 0 for render programs.
    pub fn captured_stride(&self) -> u64 {
        match &self.kind {
            ProgramKind::Transform { captures, .. } => 4 * captures.len() as u64,
            ProgramKind::Render { .. } => 0,
        }
    }
}

// ── vertex arrays ─────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AttributeFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Uint32x4,
    /// Four bytes normalized to `[0, 1]`; used for packed picking colors.
    Unorm8x4,
}

impl AttributeFormat {
    pub const fn size(self) -> u64 {
        match self {
            AttributeFormat::Float32 | AttributeFormat::Uint32 | AttributeFormat::Unorm8x4 => 4,
            AttributeFormat::Float32x2 => 8,
            AttributeFormat::Float32x3 => 12,
            AttributeFormat::Float32x4 | AttributeFormat::Uint32x4 => 16,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: AttributeFormat,
    pub offset: u64,
}

/// One buffer bound to attribute slots.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBinding {
    pub buffer: BufferId,
    pub stride: u64,
    pub per_instance: bool,
    pub attributes: Vec<VertexAttribute>,
}

// ── draw calls ────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Primitive {
    Triangles,
    TriangleStrip,
    Lines,
    Points,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCallDesc {
    pub label: String,
    pub program: ProgramId,
    pub vertex_array: VertexArrayId,
    pub primitive: Primitive,
    /// `u16` index buffer; when set, `vertex_count` counts indices.
    pub index_buffer: Option<BufferId>,
    pub vertex_count: u32,
    pub instance_count: u32,
    /// One texture per program texture slot, in slot order.
    pub textures: Vec<TextureId>,
}

/// One transform pass: `count` invocations of a transform program.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformDesc {
    pub program: ProgramId,
    pub inputs: Vec<BufferId>,
    pub textures: Vec<TextureId>,
    pub params: Vec<u32>,
    pub output: BufferId,
    pub count: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Target {
    /// The attached surface (window swapchain image).
    Screen,
    Framebuffer(FramebufferId),
}

// ── frame uniforms ────────────────────────────────────────────────────────

/// Per-pass uniforms bound at group 0 binding 0 of every render program.
///
/// | offset | field         |
/// |--------|---------------|
/// | 0      | `view`        |
/// | 64     | `projection`  |
/// | 128    | `clear_color` |
/// | 144    | `viewport`    |
/// | 152    | `pixel_ratio` |
/// | 156    | `render_mode` |
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub clear_color: [f32; 4],
    /// Viewport size in logical pixels.
    pub viewport: [f32; 2],
    pub pixel_ratio: f32,
    pub render_mode: u32,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        const IDENTITY: [[f32; 4]; 4] = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        Self {
            view: IDENTITY,
            projection: IDENTITY,
            clear_color: [0.0; 4],
            viewport: [1.0, 1.0],
            pixel_ratio: 1.0,
            render_mode: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_uniforms_layout_matches_wgsl() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 160);
        assert_eq!(std::mem::offset_of!(FrameUniforms, clear_color), 128);
        assert_eq!(std::mem::offset_of!(FrameUniforms, render_mode), 156);
    }

    #[test]
    fn transform_stride_counts_captures() {
        let desc = ProgramDesc::transform("t", "", 1, &["a", "b", "c"]);
        assert_eq!(desc.captured_stride(), 12);
        assert_eq!(ProgramDesc::render("r", "").captured_stride(), 0);
    }
}
