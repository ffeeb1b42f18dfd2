use std::time::Instant;

use winit::event::WindowEvent;
use winit::window::WindowId;

use crate::input::{InputState, PointerGesture};

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract implemented by higher layers.
///
/// Redraw is invalidation-driven: the runtime only requests a frame when
/// [`App::wants_redraw`] says so, and otherwise sleeps until
/// [`App::next_deadline`].
pub trait App {
    /// Called for raw window events, before the runtime handles them.
    fn on_window_event(&mut self, window_id: WindowId, event: &WindowEvent) -> AppControl {
        let _ = (window_id, event);
        AppControl::Continue
    }

    /// Called for each pointer gesture recognized from input events.
    fn on_input(&mut self, window_id: WindowId, gesture: PointerGesture, input: &InputState) -> AppControl {
        let _ = (window_id, gesture, input);
        AppControl::Continue
    }

    /// Whether a frame should be rendered at `now`.
    fn wants_redraw(&self, now: Instant) -> bool;

    /// Earliest instant at which the app needs to be woken, if any.
    fn next_deadline(&self) -> Option<Instant> {
        None
    }

    /// Called once per rendered frame per window.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;
}
