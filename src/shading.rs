//! Per-fragment lighting model.
//!
//! The fragment stage in `render::shaders` evaluates exactly this model on the
//! GPU; the functions here are the CPU rendition used to pin its behavior and
//! to seed the uniform constants both sides agree on. Everything operates in
//! view space.

use glam::{Mat4, Vec2, Vec3, Vec4};

/// Tunables shared by the CPU model and the GPU uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadingConstants {
    pub ambient_strength: f32,
    pub specular_strength: f32,
    pub shininess: f32,
    pub attenuation_constant: f32,
    pub attenuation_linear: f32,
    pub attenuation_quadratic: f32,
    pub shadow_bias: f32,
    pub alpha_cutoff: f32,
    pub fog_density: f32,
    pub fog_color: Vec3,
}

impl Default for ShadingConstants {
    fn default() -> Self {
        Self {
            ambient_strength: 0.2,
            specular_strength: 0.5,
            shininess: 32.0,
            attenuation_constant: 1.0,
            attenuation_linear: 0.09,
            attenuation_quadratic: 0.032,
            shadow_bias: 0.005,
            alpha_cutoff: 0.1,
            fog_density: 0.05,
            fog_color: Vec3::splat(0.5),
        }
    }
}

impl ShadingConstants {
    pub fn attenuation(&self, distance: f32) -> f32 {
        1.0 / (self.attenuation_constant
            + self.attenuation_linear * distance
            + self.attenuation_quadratic * distance * distance)
    }

    /// Exponential-squared fog; 1 keeps the surface color, 0 is pure fog.
    pub fn fog_factor(&self, distance: f32) -> f32 {
        let scaled = distance * self.fog_density;
        (-(scaled * scaled)).exp().clamp(0.0, 1.0)
    }
}

/// Ambient, diffuse and specular sums for one fragment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LightTerms {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl std::ops::Add for LightTerms {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            ambient: self.ambient + other.ambient,
            diffuse: self.diffuse + other.diffuse,
            specular: self.specular + other.specular,
        }
    }
}

impl std::ops::Mul<f32> for LightTerms {
    type Output = Self;

    fn mul(self, factor: f32) -> Self {
        Self {
            ambient: self.ambient * factor,
            diffuse: self.diffuse * factor,
            specular: self.specular * factor,
        }
    }
}

/// Lights as seen from view space for a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewLights {
    /// Unit vector towards the directional light.
    pub directional: Vec3,
    pub point_position: Vec3,
    pub color: Vec3,
    /// `(inner_cos, outer_cos)` when the spot light is on.
    pub spot: Option<(f32, f32)>,
}

impl ViewLights {
    pub fn new(
        view: Mat4,
        light_direction: Vec3,
        point_position: Vec3,
        color: Vec3,
        spot: Option<(f32, f32)>,
    ) -> Self {
        Self {
            directional: view.transform_vector3(light_direction).normalize(),
            point_position: view.transform_point3(point_position),
            color,
            spot,
        }
    }
}

/// Interpolated inputs of one fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub view_position: Vec3,
    pub normal: Vec3,
    pub light_clip: Vec4,
    pub diffuse_texel: Vec4,
    pub specular_texel: Vec3,
    pub alpha_test: bool,
}

/// Read access to the shadow depth texture.
pub trait ShadowLookup {
    /// Stored depth at texture coordinates in `[0, 1]^2`.
    fn depth_at(&self, uv: Vec2) -> f32;
}

impl<F> ShadowLookup for F
where
    F: Fn(Vec2) -> f32,
{
    fn depth_at(&self, uv: Vec2) -> f32 {
        self(uv)
    }
}

/// Returns 1 when the fragment is occluded from the directional light.
pub fn shadow_factor(light_clip: Vec4, bias: f32, map: &impl ShadowLookup) -> f32 {
    let ndc = light_clip.truncate() / light_clip.w;
    if ndc.z > 1.0 {
        return 0.0;
    }
    let uv = Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    // outside the map reads as the far plane
    let stored = if uv.cmplt(Vec2::ZERO).any() || uv.cmpgt(Vec2::ONE).any() {
        1.0
    } else {
        map.depth_at(uv)
    };
    if ndc.z - bias > stored {
        1.0
    } else {
        0.0
    }
}

fn phong(
    constants: &ShadingConstants,
    normal: Vec3,
    to_light: Vec3,
    to_eye: Vec3,
    color: Vec3,
) -> LightTerms {
    let diffuse = normal.dot(to_light).max(0.0);
    let reflected = reflect(-to_light, normal);
    let specular = to_eye.dot(reflected).max(0.0).powf(constants.shininess);
    LightTerms {
        ambient: constants.ambient_strength * color,
        diffuse: diffuse * color,
        specular: constants.specular_strength * specular * color,
    }
}

fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - 2.0 * normal.dot(incident) * normal
}

/// Sums the contributions of every active light.
pub fn accumulate(
    constants: &ShadingConstants,
    lights: &ViewLights,
    view_position: Vec3,
    normal: Vec3,
    shadow: f32,
) -> LightTerms {
    let normal = normal.normalize();
    let to_eye = (-view_position).normalize_or_zero();

    let mut directional = phong(constants, normal, lights.directional, to_eye, lights.color);
    directional.diffuse *= 1.0 - shadow;
    directional.specular *= 1.0 - shadow;

    let to_point = lights.point_position - view_position;
    let point = phong(
        constants,
        normal,
        to_point.normalize_or_zero(),
        to_eye,
        lights.color,
    ) * constants.attenuation(to_point.length());

    let mut terms = directional + point;

    if let Some((inner, outer)) = lights.spot {
        // the spot light sits at the eye and shines down -Z
        let distance = view_position.length();
        let theta = view_position.normalize_or_zero().dot(Vec3::NEG_Z);
        let intensity = ((theta - outer) / (inner - outer)).clamp(0.0, 1.0);
        let mut spot = phong(constants, normal, to_eye, to_eye, lights.color)
            * constants.attenuation(distance);
        spot.diffuse *= intensity;
        spot.specular *= intensity;
        terms = terms + spot;
    }

    terms
}

/// Final fragment color, or `None` when alpha testing discards it.
pub fn shade_fragment(
    constants: &ShadingConstants,
    lights: &ViewLights,
    fragment: &Fragment,
    shadow_map: &impl ShadowLookup,
) -> Option<Vec4> {
    if fragment.alpha_test && fragment.diffuse_texel.w < constants.alpha_cutoff {
        return None;
    }

    let shadow = shadow_factor(fragment.light_clip, constants.shadow_bias, shadow_map);
    let terms = accumulate(
        constants,
        lights,
        fragment.view_position,
        fragment.normal,
        shadow,
    );
    let lit = ((terms.ambient + terms.diffuse) * fragment.diffuse_texel.truncate()
        + terms.specular * fragment.specular_texel)
        .min(Vec3::ONE);

    let fog = constants.fog_factor(fragment.view_position.length());
    let color = constants.fog_color.lerp(lit, fog);
    Some(color.extend(1.0))
}
