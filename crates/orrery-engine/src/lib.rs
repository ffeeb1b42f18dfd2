//! Orrery engine crate.
//!
//! This crate owns the platform + GPU runtime pieces used by the graph layer:
//! device and surface management, the window runtime, input translation,
//! frame timing, and the graphics-context boundary (`gfx`) that every
//! renderable talks to.

pub mod device;
pub mod window;
pub mod input;
pub mod time;
pub mod core;

pub mod logging;
pub mod coords;
pub mod gfx;
