//! Color-id picking.
//!
//! Every pickable entity gets an id from a 31-bit free list. The picking pass
//! renders `(id << 1) | 1` into an off-screen target; pointer events read one
//! pixel back, decode it, and map it to the entity's caller-facing id.

mod allocator;
mod manager;

pub use allocator::{
    decode_pixel, encode_color, rendered_pixel, PickingAllocation, PickingAllocator, PickingRange, ID_SPACE_END,
};
pub use manager::{OwnerKey, PickEvent, PickKind, PickTarget, PickingManager};
