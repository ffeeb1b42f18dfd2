//! Coordinate and color types shared across the engine and the graph layer.
//!
//! Canonical CPU screen space:
//! - Logical pixels (DPI-aware)
//! - Origin top-left
//! - +X right, +Y down
//!
//! World space (graph positions) is owned by the graph layer and reaches the
//! GPU through view/projection matrices.

mod color;
mod viewport;

pub use color::{ColorParseError, ColorRgba};
pub use viewport::Viewport;
