use std::collections::HashSet;

use glam::DVec2;

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Escape,
}

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const MIDDLE: Self = Self(2);

    pub fn new(index: u8) -> Self {
        Self(index)
    }
}

/// Window and input notifications, independent of the windowing library.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    ButtonPressed(MouseButton),
    ButtonReleased(MouseButton),
    /// Pointer position in window pixels, origin top-left.
    PointerMoved(DVec2),
    /// Wheel travel; positive values scroll away from the user.
    Scroll(f64),
    KeyPressed(KeyCode),
    KeyReleased(KeyCode),
    Resized { width: u32, height: u32 },
    CloseRequested,
}

/// Pressed keys and buttons plus the last pointer position.
#[derive(Debug, Default)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    mouse_buttons: HashSet<MouseButton>,
    mouse_position: DVec2,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds an event into the state.
    pub fn apply(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::ButtonPressed(button) => {
                self.mouse_buttons.insert(button);
            }
            InputEvent::ButtonReleased(button) => {
                self.mouse_buttons.remove(&button);
            }
            InputEvent::PointerMoved(position) => self.mouse_position = position,
            InputEvent::KeyPressed(key) => {
                self.keys.insert(key);
            }
            InputEvent::KeyReleased(key) => {
                self.keys.remove(&key);
            }
            InputEvent::Scroll(_) | InputEvent::Resized { .. } | InputEvent::CloseRequested => {}
        }
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons.contains(&button)
    }

    pub fn mouse_position(&self) -> DVec2 {
        self.mouse_position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_buttons_keys_and_pointer() {
        let mut input = InputState::new();
        input.apply(&InputEvent::ButtonPressed(MouseButton::LEFT));
        input.apply(&InputEvent::PointerMoved(DVec2::new(10.0, 20.0)));
        input.apply(&InputEvent::KeyPressed(KeyCode::Character('D')));
        assert!(input.is_mouse_button_down(MouseButton::LEFT));
        assert!(input.is_key_down(KeyCode::Character('D')));
        assert_eq!(input.mouse_position(), DVec2::new(10.0, 20.0));

        input.apply(&InputEvent::ButtonReleased(MouseButton::LEFT));
        input.apply(&InputEvent::KeyReleased(KeyCode::Character('D')));
        assert!(!input.is_mouse_button_down(MouseButton::LEFT));
        assert!(!input.is_key_down(KeyCode::Character('D')));
    }
}
