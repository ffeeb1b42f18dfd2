//! Label atlas: text rasterization, shelf packing, signed distance fields.

mod atlas;
mod rasterizer;
mod sdf;

pub use atlas::{AtlasConfig, AtlasTextures, LabelAtlas, LabelBox, LabelRequest};
pub use rasterizer::{Coverage, FontRasterizer, LabelRasterizer};
pub use sdf::{distance_field, distance_field_u8};
