use std::collections::HashSet;

use super::types::{
    ButtonState,
    InputEvent,
    Modifiers,
    MouseButton,
    PointerButtonEvent,
    PointerMoveEvent,
    WheelDelta,
};

/// Movement (logical px) after which a press turns into a drag.
const DRAG_THRESHOLD: f32 = 4.0;

/// Higher-level interpretation of an input event.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PointerGesture {
    /// Pointer moved with no button held.
    Hover { x: f32, y: f32 },
    /// Pointer moved with the primary button held past the drag threshold.
    Drag { dx: f32, dy: f32 },
    /// Primary button released without dragging.
    Click { x: f32, y: f32 },
    /// Wheel scrolled at the given position.
    Scroll { delta: WheelDelta, x: f32, y: f32 },
    /// Pointer left the window.
    Left,
}

/// Current input state for a single window.
#[derive(Debug, Default)]
pub struct InputState {
    pub modifiers: Modifiers,
    pub focused: bool,

    /// Pointer position in logical pixels.
    pub pointer_pos: Option<(f32, f32)>,

    pub buttons_down: HashSet<MouseButton>,

    /// Where the primary button went down, and whether it has since dragged.
    press: Option<((f32, f32), bool)>,
}

impl InputState {
    /// Applies an event to the state and returns the gesture it completes, if any.
    pub fn apply_event(&mut self, ev: &InputEvent) -> Option<PointerGesture> {
        match *ev {
            InputEvent::ModifiersChanged(m) => {
                self.modifiers = m;
                None
            }

            InputEvent::Focused(f) => {
                self.focused = f;
                if !f {
                    // Avoid stuck buttons when focus changes mid-press.
                    self.buttons_down.clear();
                    self.press = None;
                }
                None
            }

            InputEvent::PointerMoved(PointerMoveEvent { x, y }) => {
                let prev = self.pointer_pos.replace((x, y));
                match (&mut self.press, prev) {
                    (Some((origin, dragging)), Some((px, py))) => {
                        if !*dragging {
                            let (ox, oy) = *origin;
                            *dragging = (x - ox).hypot(y - oy) > DRAG_THRESHOLD;
                        }
                        dragging.then_some(PointerGesture::Drag { dx: x - px, dy: y - py })
                    }
                    _ => Some(PointerGesture::Hover { x, y }),
                }
            }

            InputEvent::PointerLeft => {
                self.pointer_pos = None;
                self.press = None;
                Some(PointerGesture::Left)
            }

            InputEvent::PointerButton(PointerButtonEvent { button, state, x, y, modifiers }) => {
                self.pointer_pos = Some((x, y));
                self.modifiers = modifiers;
                match state {
                    ButtonState::Pressed => {
                        self.buttons_down.insert(button);
                        if button == MouseButton::Left {
                            self.press = Some(((x, y), false));
                        }
                        None
                    }
                    ButtonState::Released => {
                        self.buttons_down.remove(&button);
                        if button != MouseButton::Left {
                            return None;
                        }
                        match self.press.take() {
                            Some((_, false)) => Some(PointerGesture::Click { x, y }),
                            _ => None,
                        }
                    }
                }
            }

            InputEvent::Wheel { delta, x, y, modifiers } => {
                self.modifiers = modifiers;
                Some(PointerGesture::Scroll { delta, x, y })
            }
        }
    }

    pub fn button_down(&self, btn: MouseButton) -> bool {
        self.buttons_down.contains(&btn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moved(x: f32, y: f32) -> InputEvent {
        InputEvent::PointerMoved(PointerMoveEvent { x, y })
    }

    fn left(state: ButtonState, x: f32, y: f32) -> InputEvent {
        InputEvent::PointerButton(PointerButtonEvent {
            button: MouseButton::Left,
            state,
            x,
            y,
            modifiers: Modifiers::default(),
        })
    }

    #[test]
    fn press_release_in_place_is_click() {
        let mut s = InputState::default();
        s.apply_event(&moved(10.0, 10.0));
        assert_eq!(s.apply_event(&left(ButtonState::Pressed, 10.0, 10.0)), None);
        s.apply_event(&moved(11.0, 10.0));
        assert_eq!(
            s.apply_event(&left(ButtonState::Released, 11.0, 10.0)),
            Some(PointerGesture::Click { x: 11.0, y: 10.0 })
        );
    }

    #[test]
    fn drag_suppresses_click() {
        let mut s = InputState::default();
        s.apply_event(&moved(0.0, 0.0));
        s.apply_event(&left(ButtonState::Pressed, 0.0, 0.0));
        assert_eq!(
            s.apply_event(&moved(20.0, 0.0)),
            Some(PointerGesture::Drag { dx: 20.0, dy: 0.0 })
        );
        assert_eq!(s.apply_event(&left(ButtonState::Released, 20.0, 0.0)), None);
    }

    #[test]
    fn move_without_press_is_hover() {
        let mut s = InputState::default();
        assert_eq!(s.apply_event(&moved(3.0, 4.0)), Some(PointerGesture::Hover { x: 3.0, y: 4.0 }));
        assert_eq!(s.apply_event(&InputEvent::PointerLeft), Some(PointerGesture::Left));
        assert_eq!(s.pointer_pos, None);
    }

    #[test]
    fn focus_loss_clears_buttons() {
        let mut s = InputState::default();
        s.apply_event(&left(ButtonState::Pressed, 0.0, 0.0));
        assert!(s.button_down(MouseButton::Left));
        s.apply_event(&InputEvent::Focused(false));
        assert!(!s.button_down(MouseButton::Left));
    }
}
