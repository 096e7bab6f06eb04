//! Scene lights and the directional light's shadow-casting transform.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Direction towards the light before any rotation is applied.
pub const BASE_LIGHT_DIRECTION: Vec3 = Vec3::new(0.0, 1.0, 1.0);
/// Distance of the virtual light camera from the origin.
pub const LIGHT_DISTANCE: f32 = 10.0;
/// Half extent of the orthographic shadow frustum.
pub const SHADOW_ORTHO_EXTENT: f32 = 10.0;
pub const SHADOW_NEAR: f32 = 1.0;
pub const SHADOW_FAR: f32 = 50.0;

/// Rotating directional light plus the static point light and the
/// camera-attached spot light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightState {
    /// Degrees around world up. Unbounded; trig wraps it.
    pub angle: f32,
    pub color: Vec3,
    pub point_position: Vec3,
    pub spot: SpotLight,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            angle: 0.0,
            color: Vec3::ONE,
            point_position: Vec3::new(0.0, 2.0, 0.0),
            spot: SpotLight::default(),
        }
    }
}

impl LightState {
    pub fn rotate(&mut self, degrees: f32) {
        self.angle += degrees;
    }

    /// Rotation about world up by the current light angle.
    pub fn rotation(&self) -> Mat4 {
        Mat4::from_rotation_y(self.angle.to_radians())
    }

    /// Direction towards the light, not normalized.
    pub fn direction(&self) -> Vec3 {
        self.rotation().transform_vector3(BASE_LIGHT_DIRECTION)
    }

    /// Computes the light camera placement and the light-space matrix.
    pub fn light_space(&self) -> LightSpace {
        LightSpace::from_direction(self.direction())
    }
}

/// Light-space data for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSpace {
    pub eye: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
    pub matrix: Mat4,
}

impl LightSpace {
    pub fn from_direction(direction: Vec3) -> Self {
        let eye = direction.normalize() * LIGHT_DISTANCE;
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let projection = Mat4::orthographic_rh(
            -SHADOW_ORTHO_EXTENT,
            SHADOW_ORTHO_EXTENT,
            -SHADOW_ORTHO_EXTENT,
            SHADOW_ORTHO_EXTENT,
            SHADOW_NEAR,
            SHADOW_FAR,
        );
        Self {
            eye,
            view,
            projection,
            matrix: projection * view,
        }
    }
}

/// Cone light attached to the camera, off unless toggled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotLight {
    pub enabled: bool,
    /// Degrees from the cone axis where falloff starts.
    pub inner_angle: f32,
    /// Degrees from the cone axis where the light reaches zero.
    pub outer_angle: f32,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            enabled: false,
            inner_angle: 12.5,
            outer_angle: 17.5,
        }
    }
}

impl SpotLight {
    pub fn cutoffs(&self) -> (f32, f32) {
        (
            self.inner_angle.to_radians().cos(),
            self.outer_angle.to_radians().cos(),
        )
    }
}

/// Model matrix of the small cube marking the directional light.
///
/// The cube sits at `(0, 1, 1) * distance` before rotation, so it is not
/// on the same sphere as the shadow camera.
pub fn indicator_transform(light: &LightState, scale: f32) -> Mat4 {
    light.rotation()
        * Mat4::from_translation(BASE_LIGHT_DIRECTION * LIGHT_DISTANCE)
        * Mat4::from_scale(Vec3::splat(scale))
}
