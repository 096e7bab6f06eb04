//! Render state owned by the main loop and the input rules that drive it.

use std::fmt::Write as _;

use glam::{Mat4, Vec2, Vec3};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::camera::{Camera, MoveDirection};
use crate::config::DemoConfig;
use crate::input::{InputState, KeyCode, NamedKey};
use crate::light::{LightSpace, LightState};
use crate::scene::{normal_matrix, ObjectContext, Scene};
use crate::shading::ShadingConstants;

/// How triangles are rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolygonFill {
    Fill,
    Line,
    Point,
}

/// The four selectable visualization presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillMode {
    FilledSmooth,
    Wireframe,
    Points,
    FilledFlat,
}

impl FillMode {
    pub fn from_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::Digit(1) => Some(Self::FilledSmooth),
            KeyCode::Digit(2) => Some(Self::Wireframe),
            KeyCode::Digit(3) => Some(Self::Points),
            KeyCode::Digit(4) => Some(Self::FilledFlat),
            _ => None,
        }
    }

    pub fn render_mode(self) -> RenderMode {
        let (polygon, is_flat) = match self {
            Self::FilledSmooth => (PolygonFill::Fill, false),
            Self::Wireframe => (PolygonFill::Line, false),
            Self::Points => (PolygonFill::Point, false),
            Self::FilledFlat => (PolygonFill::Fill, true),
        };
        RenderMode { polygon, is_flat }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderMode {
    pub polygon: PolygonFill,
    pub is_flat: bool,
}

impl Default for RenderMode {
    fn default() -> Self {
        FillMode::FilledSmooth.render_mode()
    }
}

/// Requests the window layer has to carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Exit,
    SetCursorLocked(bool),
}

const MOVE_BINDINGS: [(KeyCode, MoveDirection); 6] = [
    (KeyCode::Character('W'), MoveDirection::Forward),
    (KeyCode::Character('S'), MoveDirection::Backward),
    (KeyCode::Character('A'), MoveDirection::Left),
    (KeyCode::Character('D'), MoveDirection::Right),
    (KeyCode::Named(NamedKey::Space), MoveDirection::Up),
    (KeyCode::Named(NamedKey::LeftShift), MoveDirection::Down),
];

/// Everything a frame is rendered from.
#[derive(Debug, Clone)]
pub struct RenderState {
    pub camera: Camera,
    pub light: LightState,
    /// Degrees around world up for the spinning object.
    pub object_angle: f32,
    pub mode: RenderMode,
    pub projection: Mat4,
    pub cursor_locked: bool,
    pub shading: ShadingConstants,
    camera_speed: f32,
    mouse_sensitivity: f32,
    rotation_step: f32,
    fov_y: f32,
    near: f32,
    far: f32,
}

/// Matrices shared by the shadow and main passes of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub view: Mat4,
    pub projection: Mat4,
    pub light_space: LightSpace,
    /// Direction towards the directional light, world space.
    pub light_direction: Vec3,
}

impl RenderState {
    pub fn new(config: &DemoConfig, width: u32, height: u32) -> Self {
        let mut state = Self {
            camera: Camera::default(),
            light: LightState::default(),
            object_angle: 0.0,
            mode: RenderMode::default(),
            projection: Mat4::IDENTITY,
            cursor_locked: true,
            shading: ShadingConstants::default(),
            camera_speed: config.camera_speed,
            mouse_sensitivity: config.mouse_sensitivity,
            rotation_step: config.rotation_step,
            fov_y: config.fov_y_degrees.to_radians(),
            near: config.near,
            far: config.far,
        };
        state.resize(width, height);
        state
    }

    /// Rebuilds the perspective projection for a new drawable size.
    pub fn resize(&mut self, width: u32, height: u32) {
        let aspect = if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        };
        self.projection = Mat4::perspective_rh(self.fov_y, aspect.max(0.01), self.near, self.far);
    }

    /// Applies every held key once; called once per frame.
    pub fn process_input(&mut self, input: &InputState) {
        for (key, direction) in MOVE_BINDINGS {
            if input.is_key_down(key) {
                self.camera.move_by(direction, self.camera_speed);
            }
        }

        if input.is_key_down(KeyCode::Character('Q')) {
            self.object_angle -= self.rotation_step;
        }
        if input.is_key_down(KeyCode::Character('E')) {
            self.object_angle += self.rotation_step;
        }

        for digit in 1..=4 {
            let key = KeyCode::Digit(digit);
            if input.is_key_down(key) {
                if let Some(mode) = FillMode::from_key(key) {
                    self.select_mode(mode);
                }
            }
        }

        if input.is_key_down(KeyCode::Character('J')) {
            self.light.rotate(-self.rotation_step);
        }
        if input.is_key_down(KeyCode::Character('L')) {
            self.light.rotate(self.rotation_step);
        }
    }

    pub fn select_mode(&mut self, mode: FillMode) {
        let next = mode.render_mode();
        if next != self.mode {
            info!("render mode {mode:?}");
            self.mode = next;
        }
    }

    /// Handles keys that act once per press rather than while held.
    pub fn handle_key_press(&mut self, key: KeyCode) -> Option<Command> {
        match key {
            KeyCode::Named(NamedKey::Escape) => Some(Command::Exit),
            KeyCode::Character('M') | KeyCode::Named(NamedKey::Tab) => {
                self.cursor_locked = !self.cursor_locked;
                debug!("cursor locked: {}", self.cursor_locked);
                Some(Command::SetCursorLocked(self.cursor_locked))
            }
            KeyCode::Character('F') => {
                self.light.spot.enabled = !self.light.spot.enabled;
                info!("spot light enabled: {}", self.light.spot.enabled);
                None
            }
            _ => None,
        }
    }

    /// Turns raw mouse motion into camera rotation.
    pub fn look(&mut self, delta: Vec2) {
        if !self.cursor_locked {
            return;
        }
        let delta = delta * self.mouse_sensitivity;
        self.camera.look(delta.y, delta.x);
    }

    pub fn object_context(&self) -> ObjectContext<'_> {
        ObjectContext {
            object_angle: self.object_angle,
            light: &self.light,
        }
    }

    pub fn frame(&self) -> FrameParams {
        FrameParams {
            view: self.camera.view_matrix(),
            projection: self.projection,
            light_space: self.light.light_space(),
            light_direction: self.light.direction(),
        }
    }
}

/// Human readable description of the scene and the current frame.
pub fn summary(scene: &Scene, state: &RenderState) -> String {
    let frame = state.frame();
    let ctx = state.object_context();
    let mut out = String::new();
    let _ = writeln!(out, "Scene with {} objects", scene.objects.len());
    for object in &scene.objects {
        let model = object.model_transform(&ctx);
        let origin = model.transform_point3(Vec3::ZERO);
        let normal = normal_matrix(frame.view, model);
        let _ = writeln!(
            out,
            " - {} ({:?}, shadows: {}) at ({:.2}, {:.2}, {:.2}) normal det {:.3}",
            object.name,
            object.shading,
            if object.casts_shadow { "yes" } else { "no" },
            origin.x,
            origin.y,
            origin.z,
            normal.determinant()
        );
    }
    let eye = frame.light_space.eye;
    let _ = writeln!(
        out,
        "Light angle {:.1} deg, light camera at ({:.2}, {:.2}, {:.2})",
        state.light.angle, eye.x, eye.y, eye.z
    );
    let camera = state.camera.position();
    let _ = writeln!(
        out,
        "Camera at ({:.2}, {:.2}, {:.2}) yaw {:.1} pitch {:.1}",
        camera.x,
        camera.y,
        camera.z,
        state.camera.yaw(),
        state.camera.pitch()
    );
    let _ = writeln!(
        out,
        "Render mode {:?}, flat shading {}, spot light {}",
        state.mode.polygon,
        state.mode.is_flat,
        if state.light.spot.enabled { "on" } else { "off" }
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> RenderState {
        RenderState::new(&DemoConfig::default(), 1024, 768)
    }

    fn press_for_one_frame(state: &mut RenderState, key: KeyCode) {
        let mut input = InputState::new();
        input.set_key_down(key);
        state.process_input(&input);
        input.set_key_up(key);
        state.process_input(&input);
    }

    #[test]
    fn held_w_moves_forward_each_frame() {
        let mut state = state();
        let mut input = InputState::new();
        input.set_key_down(KeyCode::Character('W'));
        for _ in 0..10 {
            state.process_input(&input);
        }
        let z = state.camera.position().z;
        assert!((z - 2.5).abs() < 1e-4, "z = {z}");
    }

    #[test]
    fn mode_keys_select_polygon_and_flat_flag() {
        let mut state = state();
        press_for_one_frame(&mut state, KeyCode::Digit(4));
        assert_eq!(
            state.mode,
            RenderMode {
                polygon: PolygonFill::Fill,
                is_flat: true
            }
        );
        press_for_one_frame(&mut state, KeyCode::Digit(3));
        assert_eq!(state.mode.polygon, PolygonFill::Point);
        assert!(!state.mode.is_flat);
    }

    #[test]
    fn escape_and_cursor_toggle_commands() {
        let mut state = state();
        assert_eq!(
            state.handle_key_press(KeyCode::Named(NamedKey::Escape)),
            Some(Command::Exit)
        );
        assert_eq!(
            state.handle_key_press(KeyCode::Character('M')),
            Some(Command::SetCursorLocked(false))
        );
        assert_eq!(
            state.handle_key_press(KeyCode::Named(NamedKey::Tab)),
            Some(Command::SetCursorLocked(true))
        );
        assert_eq!(state.handle_key_press(KeyCode::Character('F')), None);
        assert!(state.light.spot.enabled);
    }

    #[test]
    fn look_is_ignored_while_cursor_unlocked() {
        let mut state = state();
        state.handle_key_press(KeyCode::Character('M'));
        state.look(Vec2::new(100.0, 100.0));
        assert_eq!(state.camera.pitch(), 0.0);

        state.handle_key_press(KeyCode::Character('M'));
        state.look(Vec2::new(100.0, 5000.0));
        assert_eq!(state.camera.pitch(), 89.0);
        assert!((state.camera.yaw() + 80.0).abs() < 1e-4);
    }

    #[test]
    fn turning_is_not_bounded_by_window_width() {
        let mut state = state();
        let mut input = InputState::new();
        // twenty frames of 1000 units each, far past a 1024 px wide window
        for _ in 0..20 {
            input.add_mouse_motion((1000.0, 0.0));
            state.look(input.take_look_delta());
        }
        assert!((state.camera.yaw() - 1910.0).abs() < 1e-2);
        assert_eq!(state.camera.pitch(), 0.0);
    }

    #[test]
    fn object_rotation_keys_update_angle() {
        let mut state = state();
        press_for_one_frame(&mut state, KeyCode::Character('E'));
        press_for_one_frame(&mut state, KeyCode::Character('E'));
        press_for_one_frame(&mut state, KeyCode::Character('Q'));
        assert_eq!(state.object_angle, 1.0);
    }

    #[test]
    fn resize_changes_aspect_only() {
        let mut state = state();
        let before = state.projection;
        state.resize(800, 800);
        assert_ne!(before, state.projection);
        assert_eq!(before.y_axis, state.projection.y_axis);
        state.resize(800, 0);
        assert!(state.projection.is_finite());
    }

    #[test]
    fn summary_lists_objects() {
        let state = state();
        let scene = Scene::demo(std::path::Path::new("."));
        let text = summary(&scene, &state);
        assert!(text.contains("Scene with 3 objects"));
        assert!(text.contains(" - ground (Lit, shadows: yes) at (0.00, -1.00, 0.00)"));
        assert!(text.contains("light camera at (0.00, 7.07, 7.07)"));
    }
}
