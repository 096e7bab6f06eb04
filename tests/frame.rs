use glam::{Mat4, Vec2, Vec3, Vec4};
use shadow_scene::shading::{Fragment, ViewLights};
use shadow_scene::{
    shade_fragment, shadow_factor, DemoConfig, InputState, KeyCode, PolygonFill, RenderState,
    Scene, ShadingConstants,
};

fn state() -> RenderState {
    RenderState::new(&DemoConfig::default(), 1024, 768)
}

fn hold(state: &mut RenderState, key: KeyCode, frames: usize) {
    let mut input = InputState::new();
    input.set_key_down(key);
    for _ in 0..frames {
        state.process_input(&input);
    }
}

fn tap(state: &mut RenderState, key: KeyCode) {
    hold(state, key, 1);
    if let Some(command) = state.handle_key_press(key) {
        panic!("{key:?} produced unexpected {command:?}");
    }
}

#[test]
fn light_camera_starts_above_and_behind_origin() {
    let frame = state().frame();
    let eye = Vec3::new(0.0, 1.0, 1.0).normalize() * 10.0;
    assert!((frame.light_space.eye - eye).length() < 1e-5);
    assert_eq!(
        frame.light_space.view,
        Mat4::look_at_rh(frame.light_space.eye, Vec3::ZERO, Vec3::Y)
    );

    // the origin lands in the middle of the shadow map
    let clip = frame.light_space.matrix * Vec4::new(0.0, 0.0, 0.0, 1.0);
    let ndc = clip.truncate() / clip.w;
    assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
    assert!(ndc.z > 0.0 && ndc.z < 1.0);
}

#[test]
fn light_rotation_round_trips() {
    let mut state = state();
    let start = state.frame().light_space;
    hold(&mut state, KeyCode::Character('J'), 37);
    assert_ne!(state.frame().light_space, start);
    hold(&mut state, KeyCode::Character('L'), 37);
    assert_eq!(state.light.angle, 0.0);
    assert_eq!(state.frame().light_space, start);
}

#[test]
fn wireframe_then_smooth_restores_filled_rendering() {
    let mut state = state();
    tap(&mut state, KeyCode::Digit(2));
    assert_eq!(state.mode.polygon, PolygonFill::Line);
    tap(&mut state, KeyCode::Digit(4));
    assert_eq!(state.mode.polygon, PolygonFill::Fill);
    assert!(state.mode.is_flat);
    tap(&mut state, KeyCode::Digit(1));
    assert_eq!(state.mode.polygon, PolygonFill::Fill);
    assert!(!state.mode.is_flat);
}

#[test]
fn flat_wins_when_one_and_four_are_held_together() {
    let mut state = state();
    let mut input = InputState::new();
    input.set_key_down(KeyCode::Digit(1));
    input.set_key_down(KeyCode::Digit(4));
    state.process_input(&input);
    assert_eq!(state.mode.polygon, PolygonFill::Fill);
    assert!(state.mode.is_flat);
}

#[test]
fn alpha_test_discards_nearly_transparent_texels() {
    let constants = ShadingConstants::default();
    let lights = ViewLights::new(
        Mat4::IDENTITY,
        Vec3::new(0.0, 1.0, 1.0),
        Vec3::new(0.0, 2.0, 0.0),
        Vec3::ONE,
        None,
    );
    let mut fragment = Fragment {
        view_position: Vec3::new(0.0, -1.0, -3.0),
        normal: Vec3::Y,
        light_clip: Vec4::new(0.0, 0.0, 0.5, 1.0),
        diffuse_texel: Vec4::new(0.8, 0.6, 0.4, 0.05),
        specular_texel: Vec3::splat(0.5),
        alpha_test: true,
    };
    let lit_map = |_: Vec2| 1.0;
    assert_eq!(shade_fragment(&constants, &lights, &fragment, &lit_map), None);

    fragment.alpha_test = false;
    let color = shade_fragment(&constants, &lights, &fragment, &lit_map)
        .expect("alpha test disabled keeps the fragment");
    assert_eq!(color.w, 1.0);
    assert!(color.truncate().cmpge(Vec3::ZERO).all());
    assert!(color.truncate().cmple(Vec3::ONE).all());
}

#[test]
fn spinning_object_shadows_the_ground_beneath_the_light() {
    let state = state();
    let frame = state.frame();
    let scene = Scene::demo(std::path::Path::new("."));
    let ground = scene.objects[1].model_transform(&state.object_context());

    // a ground point straight down the light ray from the object's top
    let caster = Vec3::new(0.0, 1.0, 0.0);
    let towards_ground = -frame.light_direction.normalize();
    let receiver = caster + towards_ground * 2.0 / towards_ground.y.abs();
    assert!((receiver.y + 1.0).abs() < 1e-5);
    assert!((ground.transform_point3(Vec3::ZERO).y - receiver.y).abs() < 1e-5);

    let matrix = frame.light_space.matrix;
    let caster_clip = matrix * caster.extend(1.0);
    let caster_depth = caster_clip.z / caster_clip.w;
    let receiver_clip = matrix * receiver.extend(1.0);

    let map = |_: Vec2| caster_depth;
    let bias = state.shading.shadow_bias;
    assert_eq!(shadow_factor(receiver_clip, bias, &map), 1.0);
    assert_eq!(shadow_factor(caster_clip, bias, &map), 0.0);
}

#[test]
fn looking_far_up_keeps_the_view_upright() {
    let mut state = state();
    for _ in 0..100 {
        state.look(Vec2::new(3.0, 250.0));
    }
    assert_eq!(state.camera.pitch(), 89.0);
    let view = state.frame().view;
    assert!(view.is_finite());
    assert!(state.camera.up().y > 0.0);
}
