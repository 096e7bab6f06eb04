//! WGSL sources. Both modules share the `Globals` block so one bind group
//! layout serves every pipeline.

const GLOBALS: &str = r#"
struct Globals {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    light_space: mat4x4<f32>,
    inverse_sky: mat4x4<f32>,
    light_direction: vec4<f32>,
    light_color: vec4<f32>,
    point_light: vec4<f32>,
    fog: vec4<f32>,
    spot: vec4<f32>,
    attenuation: vec4<f32>,
    material: vec4<f32>,
    flags: vec4<u32>,
}

@group(0) @binding(0)
var<uniform> globals: Globals;
"#;

const SCENE: &str = r#"
struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    params: vec4<f32>,
}

@group(1) @binding(0)
var<uniform> object: ObjectConstants;

@group(2) @binding(0)
var diffuse_texture: texture_2d<f32>;
@group(2) @binding(1)
var specular_texture: texture_2d<f32>;
@group(2) @binding(2)
var material_sampler: sampler;

@group(3) @binding(0)
var shadow_map: texture_depth_2d;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) view_position: vec3<f32>,
    @location(1) view_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) light_clip: vec4<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = object.model * vec4<f32>(input.position, 1.0);
    let view_position = globals.view * world;
    let normal_matrix = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    );
    out.clip_position = globals.projection * view_position;
    out.view_position = view_position.xyz;
    out.view_normal = normal_matrix * input.normal;
    out.uv = input.uv;
    out.light_clip = globals.light_space * world;
    return out;
}

@vertex
fn vs_shadow(input: VertexInput) -> @builtin(position) vec4<f32> {
    return globals.light_space * object.model * vec4<f32>(input.position, 1.0);
}

struct LightTerms {
    ambient: vec3<f32>,
    diffuse: vec3<f32>,
    specular: vec3<f32>,
}

fn safe_normalize(v: vec3<f32>) -> vec3<f32> {
    let len = length(v);
    if len > 0.0 {
        return v / len;
    }
    return vec3<f32>(0.0);
}

fn attenuation(distance: f32) -> f32 {
    let k = globals.attenuation;
    return 1.0 / (k.x + k.y * distance + k.z * distance * distance);
}

fn phong(normal: vec3<f32>, to_light: vec3<f32>, to_eye: vec3<f32>, color: vec3<f32>) -> LightTerms {
    let diffuse = max(dot(normal, to_light), 0.0);
    let reflected = reflect(-to_light, normal);
    let specular = pow(max(dot(to_eye, reflected), 0.0), globals.attenuation.w);
    return LightTerms(
        globals.material.x * color,
        diffuse * color,
        globals.material.y * specular * color
    );
}

// 1.0 when the fragment is occluded from the directional light.
fn shadow_factor(light_clip: vec4<f32>) -> f32 {
    let ndc = light_clip.xyz / light_clip.w;
    if ndc.z > 1.0 {
        return 0.0;
    }
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    if any(uv < vec2<f32>(0.0)) || any(uv > vec2<f32>(1.0)) {
        return 0.0;
    }
    let size = vec2<f32>(textureDimensions(shadow_map));
    let texel = vec2<i32>(min(uv * size, size - vec2<f32>(1.0)));
    let closest = textureLoad(shadow_map, texel, 0);
    if ndc.z - globals.material.z > closest {
        return 1.0;
    }
    return 0.0;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    // derivatives and implicit-lod samples stay ahead of the discard
    let diffuse_texel = textureSample(diffuse_texture, material_sampler, in.uv);
    let specular_texel = textureSample(specular_texture, material_sampler, in.uv).rgb;
    let face_normal = normalize(cross(dpdx(in.view_position), dpdy(in.view_position)));

    if object.params.x > 0.5 && diffuse_texel.a < globals.material.w {
        discard;
    }

    var normal = normalize(in.view_normal);
    if globals.flags.x != 0u {
        normal = faceForward(face_normal, in.view_position, face_normal);
    }
    let to_eye = safe_normalize(-in.view_position);
    let color = globals.light_color.rgb;

    let lit_fraction = 1.0 - shadow_factor(in.light_clip);
    let to_sun = normalize((globals.view * vec4<f32>(globals.light_direction.xyz, 0.0)).xyz);
    let sun = phong(normal, to_sun, to_eye, color);

    let point_position = (globals.view * vec4<f32>(globals.point_light.xyz, 1.0)).xyz;
    let to_point = point_position - in.view_position;
    let point_falloff = attenuation(length(to_point));
    let point = phong(normal, safe_normalize(to_point), to_eye, color);

    var ambient = sun.ambient + point.ambient * point_falloff;
    var diffuse = sun.diffuse * lit_fraction + point.diffuse * point_falloff;
    var specular = sun.specular * lit_fraction + point.specular * point_falloff;

    if globals.spot.z > 0.5 {
        let theta = dot(to_eye, vec3<f32>(0.0, 0.0, 1.0));
        let intensity = clamp((theta - globals.spot.y) / (globals.spot.x - globals.spot.y), 0.0, 1.0);
        let spot_falloff = attenuation(length(in.view_position));
        let spot = phong(normal, to_eye, to_eye, color);
        ambient += spot.ambient * spot_falloff;
        diffuse += spot.diffuse * spot_falloff * intensity;
        specular += spot.specular * spot_falloff * intensity;
    }

    let lit = min((ambient + diffuse) * diffuse_texel.rgb + specular * specular_texel, vec3<f32>(1.0));
    let fog_distance = length(in.view_position) * globals.fog.w;
    let visibility = clamp(exp(-(fog_distance * fog_distance)), 0.0, 1.0);
    return vec4<f32>(mix(globals.fog.rgb, lit, visibility), 1.0);
}

@fragment
fn fs_emissive(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(globals.light_color.rgb, 1.0);
}
"#;

const SKYBOX: &str = r#"
@group(1) @binding(0)
var sky_texture: texture_cube<f32>;
@group(1) @binding(1)
var sky_sampler: sampler;

struct SkyOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) ndc: vec2<f32>,
}

@vertex
fn vs_sky(@builtin(vertex_index) index: u32) -> SkyOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    let ndc = uv * 2.0 - vec2<f32>(1.0);
    var out: SkyOutput;
    out.position = vec4<f32>(ndc, 1.0, 1.0);
    out.ndc = ndc;
    return out;
}

@fragment
fn fs_sky(in: SkyOutput) -> @location(0) vec4<f32> {
    let far_point = globals.inverse_sky * vec4<f32>(in.ndc, 1.0, 1.0);
    let direction = far_point.xyz / far_point.w;
    return vec4<f32>(textureSample(sky_texture, sky_sampler, direction).rgb, 1.0);
}
"#;

/// Lit, emissive and depth-only entry points.
pub fn scene_source() -> String {
    format!("{GLOBALS}{SCENE}")
}

pub fn skybox_source() -> String {
    format!("{GLOBALS}{SKYBOX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(source: &str) -> naga::Module {
        let module = naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|err| panic!("{}", err.emit_to_string(source)));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .unwrap_or_else(|err| panic!("{}", err.emit_to_string(source)));
        module
    }

    fn entry_points(module: &naga::Module) -> Vec<(&str, naga::ShaderStage)> {
        module
            .entry_points
            .iter()
            .map(|entry| (entry.name.as_str(), entry.stage))
            .collect()
    }

    #[test]
    fn scene_module_validates_with_every_entry_point() {
        use naga::ShaderStage::{Fragment, Vertex};
        let module = validate(&scene_source());
        let entries = entry_points(&module);
        for expected in [
            ("vs_main", Vertex),
            ("vs_shadow", Vertex),
            ("fs_main", Fragment),
            ("fs_emissive", Fragment),
        ] {
            assert!(entries.contains(&expected), "missing {expected:?}");
        }
    }

    #[test]
    fn skybox_module_validates_with_every_entry_point() {
        use naga::ShaderStage::{Fragment, Vertex};
        let module = validate(&skybox_source());
        let entries = entry_points(&module);
        assert!(entries.contains(&("vs_sky", Vertex)));
        assert!(entries.contains(&("fs_sky", Fragment)));
    }

    #[test]
    fn both_modules_share_the_globals_block() {
        assert!(scene_source().starts_with(GLOBALS));
        assert!(skybox_source().starts_with(GLOBALS));
    }
}
