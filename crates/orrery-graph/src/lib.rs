//! Orrery graph renderer.
//!
//! Turns caller records into GPU data and draws large node-link graphs with
//! progressive refinement:
//!
//! - `mapping`: record → interleaved buffer packing through field extractors
//! - `registry`: deduplicated point positions shared by every layer
//! - `layer`: node/edge/label renderables built from a shape-variant table
//! - `scheduler`: DRAFT → PICKING → MEDIUM → HIGH_PASS_1 → HIGH_PASS_2
//! - `picking`: color-id allocation and pixel readback into typed events
//! - `labels`: text rasterization, shelf packing and signed distance fields
//! - `viewport`: one graph instance owning all of the above
//! - `host`: a window application driving a viewport

pub mod camera;
pub mod error;
pub mod events;
pub mod host;
pub mod labels;
pub mod layer;
pub mod load;
pub mod mapping;
pub mod palette;
pub mod picking;
pub mod registry;
pub mod scheduler;
pub mod texel;
pub mod viewport;

pub use error::{ErrorKind, GraphError, Result};
pub use viewport::{Viewport, ViewportConfig};

/// Caller-facing entity identifier (points, nodes, edges, labels).
pub type Id = u64;
