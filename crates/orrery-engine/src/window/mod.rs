//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and windows, wires them to the GPU layer, and
//! redraws only when the application asks for a frame.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
pub use winit::window::CursorIcon;
