use std::collections::HashSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
}

/// Non-printable keys the demo binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Tab,
    Escape,
    LeftShift,
}

/// Pressed-key table plus the look delta gathered since the last frame.
#[derive(Debug, Default)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    look: Vec2,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&mut self, key: KeyCode) {
        self.keys.insert(key);
    }

    pub fn set_key_up(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    /// Forgets every held key and any pending look motion, used when the
    /// window loses focus.
    pub fn release_all(&mut self) {
        self.keys.clear();
        self.look = Vec2::ZERO;
    }

    /// Accumulates raw mouse motion in device units (x right, y down).
    ///
    /// Raw motion keeps arriving while the cursor is grabbed at the window
    /// edge, so turning is never bounded by the window size.
    pub fn add_mouse_motion(&mut self, delta: (f64, f64)) {
        // device y grows downward, pitch grows upward
        self.look += Vec2::new(delta.0 as f32, -(delta.1 as f32));
    }

    /// Returns the motion gathered since the last call and clears it.
    pub fn take_look_delta(&mut self) -> Vec2 {
        std::mem::take(&mut self.look)
    }
}
