use std::path::{Path, PathBuf};

use glam::{Mat3, Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::assets::FallbackMesh;
use crate::light::{indicator_transform, LightState};

/// How an object's model matrix is derived each frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Placement {
    /// Rotated about world up by the scene's object angle.
    Spinning,
    /// Translated, then uniformly scaled.
    Fixed { translation: Vec3, scale: f32 },
    /// Follows the rotating directional light.
    LightIndicator { scale: f32 },
}

/// Which pipeline draws the object in the main pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shading {
    Lit,
    /// Flat light color, no lighting or shadows.
    Emissive,
}

/// Per-frame inputs of the model transform rules.
#[derive(Debug, Clone, Copy)]
pub struct ObjectContext<'a> {
    /// Degrees.
    pub object_angle: f32,
    pub light: &'a LightState,
}

/// One drawable entry of the fixed scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub model_path: PathBuf,
    #[serde(skip)]
    pub fallback: Option<FallbackMesh>,
    pub placement: Placement,
    pub shading: Shading,
    pub casts_shadow: bool,
    pub alpha_test: bool,
}

impl SceneObject {
    pub fn model_transform(&self, ctx: &ObjectContext<'_>) -> Mat4 {
        match self.placement {
            Placement::Spinning => Mat4::from_rotation_y(ctx.object_angle.to_radians()),
            Placement::Fixed { translation, scale } => {
                Mat4::from_translation(translation) * Mat4::from_scale(Vec3::splat(scale))
            }
            Placement::LightIndicator { scale } => indicator_transform(ctx.light, scale),
        }
    }
}

/// Inverse-transpose of the upper 3x3 of `view * model`.
///
/// Recomputed for every draw; the result is only valid for this exact pair.
pub fn normal_matrix(view: Mat4, model: Mat4) -> Mat3 {
    Mat3::from_mat4(view * model).inverse().transpose()
}

/// The ordered object list plus the skybox location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub skybox_dir: PathBuf,
}

impl Scene {
    /// The demo scene: humanoid, ground plane and light marker.
    pub fn demo(asset_root: &Path) -> Self {
        let objects = vec![
            SceneObject {
                name: "nanosuit".to_string(),
                model_path: asset_root.join("objects/nanosuit/nanosuit.obj"),
                fallback: Some(FallbackMesh::Cube),
                placement: Placement::Spinning,
                shading: Shading::Lit,
                casts_shadow: true,
                alpha_test: false,
            },
            SceneObject {
                name: "ground".to_string(),
                model_path: asset_root.join("objects/ground/ground.obj"),
                fallback: Some(FallbackMesh::Plane(20.0)),
                placement: Placement::Fixed {
                    translation: Vec3::new(0.0, -1.0, 0.0),
                    scale: 0.5,
                },
                shading: Shading::Lit,
                casts_shadow: true,
                alpha_test: false,
            },
            SceneObject {
                name: "light-cube".to_string(),
                model_path: asset_root.join("objects/cube/cube.obj"),
                fallback: Some(FallbackMesh::Cube),
                placement: Placement::LightIndicator { scale: 0.5 },
                shading: Shading::Emissive,
                casts_shadow: false,
                alpha_test: false,
            },
        ];
        Self {
            objects,
            skybox_dir: asset_root.join("skybox"),
        }
    }

    /// Objects drawn into the shadow map, with their index in `objects`.
    pub fn shadow_casters(&self) -> impl Iterator<Item = (usize, &SceneObject)> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, object)| object.casts_shadow)
    }

    /// Objects drawn with the given pipeline, with their index in `objects`.
    pub fn by_shading(&self, shading: Shading) -> impl Iterator<Item = (usize, &SceneObject)> {
        self.objects
            .iter()
            .enumerate()
            .filter(move |(_, object)| object.shading == shading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(light: &LightState) -> ObjectContext<'_> {
        ObjectContext {
            object_angle: 90.0,
            light,
        }
    }

    fn approx_mat3(a: Mat3, b: Mat3) -> bool {
        a.to_cols_array()
            .iter()
            .zip(b.to_cols_array())
            .all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn demo_scene_orders_lit_objects_before_indicator() {
        let scene = Scene::demo(Path::new("assets"));
        let names: Vec<_> = scene.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["nanosuit", "ground", "light-cube"]);
        let casters: Vec<usize> = scene.shadow_casters().map(|(index, _)| index).collect();
        assert_eq!(casters, [0, 1]);
        let lit: Vec<usize> = scene.by_shading(Shading::Lit).map(|(index, _)| index).collect();
        assert_eq!(lit, [0, 1]);
        let emissive: Vec<&str> = scene
            .by_shading(Shading::Emissive)
            .map(|(_, object)| object.name.as_str())
            .collect();
        assert_eq!(emissive, ["light-cube"]);
        assert_eq!(scene.skybox_dir, Path::new("assets/skybox"));
    }

    #[test]
    fn ground_is_lowered_and_halved() {
        let light = LightState::default();
        let scene = Scene::demo(Path::new("."));
        let ground = scene.objects[1].model_transform(&context(&light));
        let corner = ground.transform_point3(Vec3::new(2.0, 0.0, 2.0));
        assert!((corner - Vec3::new(1.0, -1.0, 1.0)).length() < 1e-6);
    }

    #[test]
    fn spinning_object_uses_object_angle() {
        let light = LightState::default();
        let scene = Scene::demo(Path::new("."));
        let model = scene.objects[0].model_transform(&context(&light));
        let turned = model.transform_vector3(Vec3::Z);
        assert!((turned - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn normal_matrix_is_inverse_transpose_and_idempotent() {
        let view = Mat4::look_at_rh(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO, Vec3::Y);
        let model = Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0))
            * Mat4::from_scale(Vec3::new(0.5, 2.0, 0.5));
        let first = normal_matrix(view, model);
        let second = normal_matrix(view, model);
        assert_eq!(first, second);

        let upper = Mat3::from_mat4(view * model);
        assert!(approx_mat3(first.transpose() * upper, Mat3::IDENTITY));
    }

    #[test]
    fn normal_matrix_tracks_view_changes() {
        let model = Mat4::from_rotation_y(0.3);
        let before = normal_matrix(Mat4::IDENTITY, model);
        let after = normal_matrix(Mat4::from_rotation_x(0.7), model);
        assert!(!approx_mat3(before, after));
    }
}
