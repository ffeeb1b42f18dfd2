//! Input subsystem.
//!
//! Pointer-centric: the graph viewport only cares about hover, click, drag
//! (pan) and wheel (zoom). Public types do not expose winit; the window
//! runtime translates platform events into [`InputEvent`]s.

mod state;
mod types;

pub use state::{InputState, PointerGesture};
pub use types::{
    ButtonState,
    InputEvent,
    Modifiers,
    MouseButton,
    PointerButtonEvent,
    PointerMoveEvent,
    WheelDelta,
};
