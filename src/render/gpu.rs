//! GPU-side resource wrappers and uniform layouts.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4};
use wgpu::util::DeviceExt;

use crate::app::{FrameParams, RenderState};
use crate::assets::{SkyboxData, TextureData};
use crate::obj::{ObjMesh, VERTEX_STRIDE};
use crate::scene::normal_matrix;

pub(crate) const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x2,
];

pub(crate) fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: (VERTEX_STRIDE * std::mem::size_of::<f32>()) as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

/// Per-frame constants shared by every pipeline.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct GlobalUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub light_space: [[f32; 4]; 4],
    /// Inverse of projection times the rotation-only view, for the skybox.
    pub inverse_sky: [[f32; 4]; 4],
    pub light_direction: [f32; 4],
    pub light_color: [f32; 4],
    pub point_light: [f32; 4],
    /// rgb color, w density
    pub fog: [f32; 4],
    /// inner cos, outer cos, enabled
    pub spot: [f32; 4],
    /// constant, linear, quadratic, shininess
    pub attenuation: [f32; 4],
    /// ambient, specular strength, shadow bias, alpha cutoff
    pub material: [f32; 4],
    /// x: flat shading
    pub flags: [u32; 4],
}

impl GlobalUniform {
    pub fn new(frame: &FrameParams, state: &RenderState) -> Self {
        let shading = &state.shading;
        let sky_view = Mat4::from_mat3(Mat3::from_mat4(frame.view));
        let (inner, outer) = state.light.spot.cutoffs();
        Self {
            view: frame.view.to_cols_array_2d(),
            projection: frame.projection.to_cols_array_2d(),
            light_space: frame.light_space.matrix.to_cols_array_2d(),
            inverse_sky: (frame.projection * sky_view).inverse().to_cols_array_2d(),
            light_direction: frame.light_direction.extend(0.0).into(),
            light_color: state.light.color.extend(1.0).into(),
            point_light: state.light.point_position.extend(1.0).into(),
            fog: shading.fog_color.extend(shading.fog_density).into(),
            spot: [
                inner,
                outer,
                if state.light.spot.enabled { 1.0 } else { 0.0 },
                0.0,
            ],
            attenuation: [
                shading.attenuation_constant,
                shading.attenuation_linear,
                shading.attenuation_quadratic,
                shading.shininess,
            ],
            material: [
                shading.ambient_strength,
                shading.specular_strength,
                shading.shadow_bias,
                shading.alpha_cutoff,
            ],
            flags: [u32::from(state.mode.is_flat), 0, 0, 0],
        }
    }
}

/// Per-object constants; the normal matrix is rebuilt on every write.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct ObjectConstants {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
    /// x: alpha test
    pub params: [f32; 4],
}

impl ObjectConstants {
    pub fn new(model: Mat4, view: Mat4, alpha_test: bool) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            normal: mat3_to_3x4(normal_matrix(view, model)),
            params: [if alpha_test { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

pub(crate) fn uniform_layout_entry(binding: u32, size: usize) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(size as u64),
        },
        count: None,
    }
}

pub(crate) fn texture_layout_entry(
    binding: u32,
    view_dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

pub(crate) fn sampler_layout_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Vertex and index buffers of one mesh part.
pub(crate) struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    pub fn from_mesh(device: &wgpu::Device, mesh: &ObjMesh, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex.slice(..));
        pass.set_index_buffer(self.index.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

pub(crate) struct GpuPart {
    pub mesh: MeshBuffers,
    pub material: wgpu::BindGroup,
}

/// All parts of one scene object's model.
pub(crate) struct GpuModel {
    pub parts: Vec<GpuPart>,
}

/// Something that can issue its own draw calls into a pass.
pub(crate) trait Draw {
    /// `material_group` is the bind group slot for per-part textures, or
    /// `None` for pipelines that do not sample them.
    fn draw(&self, pass: &mut wgpu::RenderPass<'_>, material_group: Option<u32>);
}

impl Draw for GpuModel {
    fn draw(&self, pass: &mut wgpu::RenderPass<'_>, material_group: Option<u32>) {
        for part in &self.parts {
            if let Some(group) = material_group {
                pass.set_bind_group(group, &part.material, &[]);
            }
            part.mesh.draw(pass);
        }
    }
}

pub(crate) fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    data: &TextureData,
    label: &str,
) -> wgpu::TextureView {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: data.width,
                height: data.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &data.rgba,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

pub(crate) fn create_cube_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    skybox: &SkyboxData,
) -> wgpu::TextureView {
    let bytes: Vec<u8> = skybox
        .faces
        .iter()
        .flat_map(|face| face.rgba.iter().copied())
        .collect();
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("skybox-texture"),
            size: wgpu::Extent3d {
                width: skybox.size,
                height: skybox.size,
                depth_or_array_layers: skybox.faces.len() as u32,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &bytes,
    );
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("skybox-view"),
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    })
}

pub(crate) struct DepthBuffer {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl DepthBuffer {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    pub fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DemoConfig;
    use glam::{Vec3, Vec4};

    #[test]
    fn uniform_sizes_match_wgsl_layouts() {
        assert_eq!(std::mem::size_of::<GlobalUniform>(), 384);
        assert_eq!(std::mem::size_of::<ObjectConstants>(), 128);
        assert_eq!(std::mem::size_of::<GlobalUniform>() % 16, 0);
    }

    #[test]
    fn globals_carry_frame_state() {
        let mut state = RenderState::new(&DemoConfig::default(), 1024, 768);
        state.mode.is_flat = true;
        state.light.spot.enabled = true;
        let frame = state.frame();
        let globals = GlobalUniform::new(&frame, &state);
        assert_eq!(globals.flags[0], 1);
        assert_eq!(globals.spot[2], 1.0);
        assert_eq!(
            globals.light_space,
            frame.light_space.matrix.to_cols_array_2d()
        );
        assert_eq!(globals.fog, [0.5, 0.5, 0.5, 0.05]);
    }

    #[test]
    fn sky_matrix_ignores_camera_translation() {
        let mut state = RenderState::new(&DemoConfig::default(), 1024, 768);
        let before = GlobalUniform::new(&state.frame(), &state).inverse_sky;
        state.camera.move_by(crate::camera::MoveDirection::Forward, 3.0);
        let after = GlobalUniform::new(&state.frame(), &state).inverse_sky;
        let drift = Mat4::from_cols_array_2d(&before) - Mat4::from_cols_array_2d(&after);
        assert!(drift.to_cols_array().iter().all(|d| d.abs() < 1e-4));

        // screen center on the far plane points down the view direction
        let far = Mat4::from_cols_array_2d(&before) * Vec4::new(0.0, 0.0, 1.0, 1.0);
        let direction = (far.truncate() / far.w).normalize();
        assert!((direction - Vec3::NEG_Z).length() < 1e-3);
    }

    #[test]
    fn object_constants_pack_normal_matrix_columns() {
        let view = Mat4::from_rotation_x(0.4);
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let constants = ObjectConstants::new(model, view, true);
        let expected = normal_matrix(view, model);
        assert_eq!(constants.normal[0][..3], expected.x_axis.to_array());
        assert_eq!(constants.normal[2][3], 0.0);
        assert_eq!(constants.params[0], 1.0);
    }
}
