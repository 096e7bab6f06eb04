//! Free-flying first person camera.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Pitch is kept strictly inside the poles so `look_at` never flips.
pub const PITCH_LIMIT: f32 = 89.0;

/// Discrete movement commands, each mapped onto one camera basis vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveDirection {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    world_up: Vec3,
    front: Vec3,
    right: Vec3,
    up: Vec3,
    /// Degrees around world up, -90 faces -Z.
    yaw: f32,
    /// Degrees, always within `[-PITCH_LIMIT, PITCH_LIMIT]`.
    pitch: f32,
}

impl Camera {
    /// Builds a camera at `position` looking at `target`.
    pub fn new(position: Vec3, target: Vec3, world_up: Vec3) -> Self {
        let front = (target - position).normalize_or(Vec3::NEG_Z);
        let pitch = front.y.clamp(-1.0, 1.0).asin().to_degrees();
        let yaw = front.z.atan2(front.x).to_degrees();
        let mut camera = Self {
            position,
            world_up: world_up.normalize_or(Vec3::Y),
            front,
            right: Vec3::X,
            up: Vec3::Y,
            yaw,
            pitch: 0.0,
        };
        camera.rotate(pitch, yaw);
        camera
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Translates the camera along its current basis.
    pub fn move_by(&mut self, direction: MoveDirection, speed: f32) {
        let offset = match direction {
            MoveDirection::Forward => self.front,
            MoveDirection::Backward => -self.front,
            MoveDirection::Right => self.right,
            MoveDirection::Left => -self.right,
            MoveDirection::Up => self.up,
            MoveDirection::Down => -self.up,
        };
        self.position += offset * speed;
    }

    /// Sets absolute orientation in degrees and rebuilds the basis.
    pub fn rotate(&mut self, pitch: f32, yaw: f32) {
        self.pitch = clamp_pitch(pitch);
        self.yaw = yaw;

        let (pitch_sin, pitch_cos) = self.pitch.to_radians().sin_cos();
        let (yaw_sin, yaw_cos) = self.yaw.to_radians().sin_cos();
        self.front = Vec3::new(yaw_cos * pitch_cos, pitch_sin, yaw_sin * pitch_cos).normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }

    /// Applies a look delta (degrees) on top of the current orientation.
    pub fn look(&mut self, pitch_delta: f32, yaw_delta: f32) {
        self.rotate(self.pitch + pitch_delta, self.yaw + yaw_delta);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.world_up)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 3.0), Vec3::new(0.0, 0.0, -10.0), Vec3::Y)
    }
}

pub fn clamp_pitch(pitch: f32) -> f32 {
    if pitch.is_nan() {
        return 0.0;
    }
    pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT)
}
