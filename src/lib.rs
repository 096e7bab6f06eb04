//! Forward-lit 3D scene with directional shadow mapping.
//!
//! Everything except [`render`] is plain CPU-side state and math, so the
//! camera, light, scene and shading rules can be exercised without a GPU.
//! The binary owns the window and event loop and feeds [`RenderState`] into
//! the [`Renderer`] once per frame.

pub mod app;
pub mod assets;
pub mod camera;
pub mod config;
pub mod input;
pub mod light;
pub mod obj;
pub mod render;
pub mod scene;
pub mod shading;

pub use app::{summary, Command, FillMode, FrameParams, PolygonFill, RenderMode, RenderState};
pub use assets::{load_model, load_model_or, AssetError, FallbackMesh, ModelData, SkyboxData};
pub use camera::{Camera, MoveDirection};
pub use config::{CliOptions, DemoConfig};
pub use input::{InputState, KeyCode, NamedKey};
pub use light::{LightSpace, LightState, SpotLight};
pub use obj::{load_mtl_from_str, load_obj_from_str, ObjMesh};
pub use render::Renderer;
pub use scene::{normal_matrix, Placement, Scene, SceneObject, Shading};
pub use shading::{shade_fragment, shadow_factor, ShadingConstants, ShadowLookup};
