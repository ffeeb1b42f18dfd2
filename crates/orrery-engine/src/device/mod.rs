//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue
//! - creating & configuring the Surface (swapchain)
//! - acquiring surface frames for the graphics-context backend to draw into

mod gpu;
mod init;
mod surface;

pub use gpu::{Gpu, SurfaceFrame};
pub use init::GpuInit;
pub use surface::SurfaceErrorAction;
