//! Disk loading for meshes, textures and skybox faces.
//!
//! Missing or broken assets never stop the demo: callers get procedural
//! stand-ins and the failure is logged.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use thiserror::Error;

use crate::obj::{load_mtl_from_str, load_obj_from_str, MtlMaterial, ObjMesh, VERTEX_STRIDE};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to parse mesh {path}: {message}")]
    Mesh { path: PathBuf, message: String },
    #[error("skybox face {path} is {width}x{height}, expected {expected}x{expected}")]
    SkyboxFace {
        path: PathBuf,
        width: u32,
        height: u32,
        expected: u32,
    },
}

/// Decoded RGBA8 pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    pub fn from_file(path: &Path) -> Result<Self, AssetError> {
        let bytes = read(path)?;
        // TGA has no signature, so fall back to the file extension
        let image = image::guess_format(&bytes)
            .or_else(|_| image::ImageFormat::from_path(path))
            .and_then(|format| image::load_from_memory_with_format(&bytes, format))
            .map_err(|source| AssetError::Image {
                path: path.to_path_buf(),
                source,
            })?;
        let rgba = image.to_rgba8();
        Ok(Self {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }

    pub fn solid(color: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: color.to_vec(),
        }
    }

    pub fn white() -> Self {
        Self::solid([255, 255, 255, 255])
    }
}

/// A mesh part with the textures its material references.
#[derive(Debug, Clone)]
pub struct PartData {
    pub mesh: ObjMesh,
    pub diffuse: Option<TextureData>,
    pub specular: Option<TextureData>,
}

#[derive(Debug, Clone)]
pub struct ModelData {
    pub name: String,
    pub parts: Vec<PartData>,
}

/// Procedural stand-in used when a model cannot be loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FallbackMesh {
    Cube,
    /// Square in the XZ plane with the given half extent, facing +Y.
    Plane(f32),
}

impl FallbackMesh {
    pub fn build(self) -> ObjMesh {
        match self {
            Self::Cube => cube_mesh(),
            Self::Plane(half_extent) => plane_mesh(half_extent),
        }
    }
}

/// Loads an OBJ model plus the textures named in its MTL libraries.
pub fn load_model(path: &Path) -> Result<ModelData, AssetError> {
    let source = read_to_string(path)?;
    let obj = load_obj_from_str(&source).map_err(|err| AssetError::Mesh {
        path: path.to_path_buf(),
        message: format!("{err:#}"),
    })?;
    let directory = path.parent().unwrap_or_else(|| Path::new("."));

    let mut materials: HashMap<String, MtlMaterial> = HashMap::new();
    for library in &obj.material_libraries {
        let library_path = directory.join(library);
        match read_to_string(&library_path) {
            Ok(text) => {
                for material in load_mtl_from_str(&text) {
                    materials.insert(material.name.clone(), material);
                }
            }
            Err(err) => warn!("{err}; parts will use white textures"),
        }
    }

    let mut textures = TextureCache::default();
    let parts = obj
        .parts
        .into_iter()
        .map(|part| {
            let material = part.material.as_ref().and_then(|name| materials.get(name));
            let diffuse = material
                .and_then(|m| m.diffuse_map.as_deref())
                .and_then(|file| textures.load(&directory.join(file)));
            let specular = material
                .and_then(|m| m.specular_map.as_deref())
                .and_then(|file| textures.load(&directory.join(file)));
            PartData {
                mesh: part.mesh,
                diffuse,
                specular,
            }
        })
        .collect::<Vec<_>>();

    info!(
        "loaded {} ({} parts, {} vertices)",
        path.display(),
        parts.len(),
        parts.iter().map(|p| p.mesh.vertex_count()).sum::<usize>()
    );
    Ok(ModelData {
        name: display_name(path),
        parts,
    })
}

/// Like [`load_model`] but substitutes `fallback` on failure.
pub fn load_model_or(path: &Path, fallback: FallbackMesh) -> ModelData {
    match load_model(path) {
        Ok(model) => model,
        Err(err) => {
            error!("{err}; using a procedural {fallback:?}");
            ModelData {
                name: display_name(path),
                parts: vec![PartData {
                    mesh: fallback.build(),
                    diffuse: None,
                    specular: None,
                }],
            }
        }
    }
}

#[derive(Default)]
struct TextureCache {
    loaded: HashMap<PathBuf, Option<TextureData>>,
}

impl TextureCache {
    fn load(&mut self, path: &Path) -> Option<TextureData> {
        self.loaded
            .entry(path.to_path_buf())
            .or_insert_with(|| match TextureData::from_file(path) {
                Ok(texture) => Some(texture),
                Err(err) => {
                    warn!("{err}; using a white texture");
                    None
                }
            })
            .clone()
    }
}

/// Face order matches wgpu cube layers: +X, -X, +Y, -Y, +Z, -Z.
pub const SKYBOX_FACES: [&str; 6] = [
    "right.tga",
    "left.tga",
    "top.tga",
    "bottom.tga",
    "back.tga",
    "front.tga",
];

#[derive(Debug, Clone)]
pub struct SkyboxData {
    pub size: u32,
    pub faces: Vec<TextureData>,
}

impl SkyboxData {
    pub fn load(directory: &Path) -> Result<Self, AssetError> {
        let mut faces = Vec::with_capacity(SKYBOX_FACES.len());
        for name in SKYBOX_FACES {
            faces.push(TextureData::from_file(&directory.join(name))?);
        }
        let size = faces[0].width;
        for (face, name) in faces.iter().zip(SKYBOX_FACES) {
            if face.width != size || face.height != size {
                return Err(AssetError::SkyboxFace {
                    path: directory.join(name),
                    width: face.width,
                    height: face.height,
                    expected: size,
                });
            }
        }
        Ok(Self { size, faces })
    }

    /// Every face a single texel of `color`.
    pub fn solid(color: [u8; 4]) -> Self {
        Self {
            size: 1,
            faces: vec![TextureData::solid(color); SKYBOX_FACES.len()],
        }
    }

    pub fn load_or(directory: &Path, color: [u8; 4]) -> Self {
        Self::load(directory).unwrap_or_else(|err| {
            error!("{err}; skybox falls back to the fog color");
            Self::solid(color)
        })
    }
}

fn read(path: &Path) -> Result<Vec<u8>, AssetError> {
    fs::read(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_to_string(path: &Path) -> Result<String, AssetError> {
    fs::read_to_string(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn display_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("model")
        .to_string()
}

fn push_vertex(vertices: &mut Vec<f32>, position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) {
    vertices.extend_from_slice(&position);
    vertices.extend_from_slice(&normal);
    vertices.extend_from_slice(&uv);
}

/// Unit cube centered on the origin, counter-clockwise outward faces.
pub fn cube_mesh() -> ObjMesh {
    // (normal, tangent u, tangent v) per face; u × v == normal
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];
    let mut vertices = Vec::with_capacity(24 * VERTEX_STRIDE);
    let mut indices = Vec::with_capacity(36);
    for (face, (normal, u, v)) in FACES.iter().enumerate() {
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = [
                0.5 * (normal[0] + su * u[0] + sv * v[0]),
                0.5 * (normal[1] + su * u[1] + sv * v[1]),
                0.5 * (normal[2] + su * u[2] + sv * v[2]),
            ];
            push_vertex(
                &mut vertices,
                position,
                *normal,
                [(su + 1.0) * 0.5, (1.0 - sv) * 0.5],
            );
        }
        let base = (face * 4) as u32;
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    ObjMesh { vertices, indices }
}

/// Upward facing square used as ground.
pub fn plane_mesh(half_extent: f32) -> ObjMesh {
    let mut vertices = Vec::with_capacity(4 * VERTEX_STRIDE);
    let corners = [
        ([-half_extent, 0.0, half_extent], [0.0, 1.0]),
        ([half_extent, 0.0, half_extent], [1.0, 1.0]),
        ([half_extent, 0.0, -half_extent], [1.0, 0.0]),
        ([-half_extent, 0.0, -half_extent], [0.0, 0.0]),
    ];
    for (position, uv) in corners {
        push_vertex(&mut vertices, position, [0.0, 1.0, 0.0], uv);
    }
    ObjMesh {
        vertices,
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::io::Write;

    fn triangle_normal(mesh: &ObjMesh, tri: &[u32]) -> Vec3 {
        let p = |i: u32| {
            let base = i as usize * VERTEX_STRIDE;
            Vec3::from_slice(&mesh.vertices[base..base + 3])
        };
        (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]))
    }

    // uncompressed 32-bit, top-left origin
    fn solid_tga(size: u16) -> Vec<u8> {
        let [w0, w1] = size.to_le_bytes();
        let mut bytes = vec![0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, w0, w1, w0, w1, 32, 0x28];
        for _ in 0..(size as usize * size as usize) {
            bytes.extend_from_slice(&[255, 0, 0, 255]);
        }
        bytes
    }

    #[test]
    fn procedural_meshes_wind_counter_clockwise_outward() {
        for mesh in [cube_mesh(), plane_mesh(5.0)] {
            for tri in mesh.indices.chunks_exact(3) {
                let base = tri[0] as usize * VERTEX_STRIDE;
                let normal = Vec3::from_slice(&mesh.vertices[base + 3..base + 6]);
                assert!(triangle_normal(&mesh, tri).dot(normal) > 0.0);
            }
        }
    }

    #[test]
    fn cube_spans_unit_extent() {
        let mesh = cube_mesh();
        assert_eq!(mesh.vertex_count(), 24);
        for chunk in mesh.vertices.chunks_exact(VERTEX_STRIDE) {
            assert!(chunk[..3].iter().all(|c| (c.abs() - 0.5).abs() < 1e-6));
        }
    }

    #[test]
    fn missing_model_falls_back_to_procedural_mesh() {
        let model = load_model_or(Path::new("does/not/exist.obj"), FallbackMesh::Plane(2.0));
        assert_eq!(model.name, "exist");
        assert_eq!(model.parts.len(), 1);
        assert_eq!(model.parts[0].mesh, plane_mesh(2.0));
    }

    #[test]
    fn loads_model_with_material_textures() {
        let dir = tempfile::tempdir().unwrap();
        let mut obj = fs::File::create(dir.path().join("quad.obj")).unwrap();
        write!(
            obj,
            "mtllib quad.mtl\nv 0 0 0\nv 1 0 0\nv 1 1 0\nvt 0 0\nvt 1 0\nvt 1 1\n\
             usemtl Painted\nf 1/1 2/2 3/3\n"
        )
        .unwrap();
        fs::write(
            dir.path().join("quad.mtl"),
            "newmtl Painted\nmap_Kd paint.png\nmap_Ks missing.png\n",
        )
        .unwrap();
        image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 40]))
            .save(dir.path().join("paint.png"))
            .unwrap();

        let model = load_model(&dir.path().join("quad.obj")).unwrap();
        assert_eq!(model.parts.len(), 1);
        let diffuse = model.parts[0].diffuse.as_ref().unwrap();
        assert_eq!((diffuse.width, diffuse.height), (2, 2));
        assert_eq!(&diffuse.rgba[..4], &[10, 20, 30, 40]);
        assert!(model.parts[0].specular.is_none());
    }

    #[test]
    fn skybox_rejects_mismatched_faces_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        for (i, name) in SKYBOX_FACES.iter().enumerate() {
            let size = if i == 3 { 4 } else { 2 };
            fs::write(dir.path().join(name), solid_tga(size)).unwrap();
        }
        assert!(matches!(
            SkyboxData::load(dir.path()),
            Err(AssetError::SkyboxFace { width: 4, .. })
        ));
        let fallback = SkyboxData::load_or(dir.path(), [128, 128, 128, 255]);
        assert_eq!(fallback.size, 1);
        assert_eq!(fallback.faces.len(), 6);
    }
}
