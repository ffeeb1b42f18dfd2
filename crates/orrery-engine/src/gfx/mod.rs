//! Graphics-context boundary.
//!
//! Everything above this module talks to the GPU through [`GraphicsContext`]:
//! textures, buffers, programs, vertex arrays, draw calls, framebuffers,
//! transform passes and single-pixel readback. Two backends implement it:
//!
//! - [`WgpuContext`]: the real thing, over a wgpu device/queue
//! - [`HeadlessContext`]: records calls and keeps texture bytes in memory,
//!   used by tests and by tools that only need the CPU-side results

mod context;
mod error;
mod headless;
mod types;
mod wgpu_backend;

pub use context::GraphicsContext;
pub use error::GfxError;
pub use headless::{GfxCommand, HeadlessContext};
pub use types::{
    AttributeFormat,
    BufferDesc,
    BufferId,
    BufferKind,
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
    TextureFormat,
    TextureId,
    TextureSlot,
    TransformDesc,
    VertexArrayId,
    VertexAttribute,
    VertexBinding,
};
pub use wgpu_backend::{WgpuContext, TRANSFORM_WORKGROUP_SIZE};
