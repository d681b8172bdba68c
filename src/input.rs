use std::collections::HashSet;

use glam::Vec2;
use sdl2::keyboard::Scancode;
use sdl2::mouse::MouseButton;
use sdl2::EventPump;

/// Snapshot of the keyboard and mouse, captured once per loop iteration.
/// Camera controllers poll this instead of the SDL event stream so held
/// keys keep applying every tick.
pub struct InputState {
    keys: HashSet<Scancode>,
    mouse_position: Vec2,
    middle_button: bool,
}

impl InputState {
    pub fn capture(event_pump: &EventPump) -> InputState {
        let keys = event_pump.keyboard_state().pressed_scancodes().collect();
        let mouse = event_pump.mouse_state();
        InputState {
            keys,
            mouse_position: Vec2::new(mouse.x() as f32, mouse.y() as f32),
            middle_button: mouse.is_mouse_button_pressed(MouseButton::Middle),
        }
    }

    pub fn key(&self, scancode: Scancode) -> bool {
        self.keys.contains(&scancode)
    }

    pub fn shift(&self) -> bool {
        self.key(Scancode::LShift) || self.key(Scancode::RShift)
    }

    pub fn ctrl(&self) -> bool {
        self.key(Scancode::LCtrl) || self.key(Scancode::RCtrl)
    }

    pub fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }

    pub fn middle_button(&self) -> bool {
        self.middle_button
    }

    #[cfg(test)]
    pub(crate) fn synthetic(
        keys: &[Scancode],
        mouse_position: Vec2,
        middle_button: bool,
    ) -> InputState {
        InputState {
            keys: keys.iter().copied().collect(),
            mouse_position,
            middle_button,
        }
    }
}
