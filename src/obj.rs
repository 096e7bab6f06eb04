use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Floats per interleaved vertex: `position.xyz`, `normal.xyz`, `uv`.
pub const VERTEX_STRIDE: usize = 8;

/// GPU ready mesh buffers produced from an OBJ file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjMesh {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl ObjMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }
}

/// One `usemtl` run of faces.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjPart {
    pub material: Option<String>,
    pub mesh: ObjMesh,
}

/// Parsed OBJ file split into per-material parts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjModel {
    pub material_libraries: Vec<String>,
    pub parts: Vec<ObjPart>,
}

/// Texture references of one `newmtl` block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MtlMaterial {
    pub name: String,
    pub diffuse_map: Option<String>,
    pub specular_map: Option<String>,
}

/// Parses an OBJ file from memory.
///
/// Faces are grouped by the material active when they were declared; each
/// group gets its own deduplicated vertex/index arrays. Texture `v` is
/// flipped so `(0, 0)` is the top-left texel.
pub fn load_obj_from_str(data: &str) -> Result<ObjModel> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut texcoords = Vec::new();
    let mut material_libraries = Vec::new();
    let mut groups: Vec<(Option<String>, Vec<[FaceIndex; 3]>)> = vec![(None, Vec::new())];

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vn" => normals.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
            ),
            "vt" => texcoords.push(
                parse_vec2(parts)
                    .with_context(|| format!("invalid texcoord on line {}", line_no + 1))?,
            ),
            "f" => {
                let polygon = parse_face(parts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                if let Some((_, faces)) = groups.last_mut() {
                    triangulate_face(&polygon, faces);
                }
            }
            "usemtl" => {
                let name = rest_of_line(trimmed, tag);
                groups.push((Some(name), Vec::new()));
            }
            "mtllib" => material_libraries.push(rest_of_line(trimmed, tag)),
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }

    let attributes = Attributes {
        positions: &positions,
        normals: &normals,
        texcoords: &texcoords,
    };
    let mut parts = Vec::new();
    for (material, faces) in groups {
        if faces.is_empty() {
            continue;
        }
        let mut mesh = build_mesh(&attributes, &faces)?;
        if needs_normals(&mesh.vertices) {
            compute_normals(&mut mesh);
        }
        parts.push(ObjPart { material, mesh });
    }

    if parts.is_empty() {
        return Err(anyhow!("OBJ file does not define any faces"));
    }

    Ok(ObjModel {
        material_libraries,
        parts,
    })
}

/// Parses the texture maps out of an MTL file.
pub fn load_mtl_from_str(data: &str) -> Vec<MtlMaterial> {
    let mut materials: Vec<MtlMaterial> = Vec::new();
    for line in data.lines() {
        let trimmed = line.trim();
        let Some(tag) = trimmed.split_whitespace().next() else {
            continue;
        };
        match tag {
            "newmtl" => materials.push(MtlMaterial {
                name: rest_of_line(trimmed, tag),
                ..MtlMaterial::default()
            }),
            "map_Kd" | "map_Ks" => {
                let Some(material) = materials.last_mut() else {
                    continue;
                };
                let path = map_path(trimmed, tag);
                if tag == "map_Kd" {
                    material.diffuse_map = Some(path);
                } else {
                    material.specular_map = Some(path);
                }
            }
            _ => {}
        }
    }
    materials
}

fn rest_of_line(line: &str, tag: &str) -> String {
    line[tag.len()..].trim().to_string()
}

// Texture options such as `-bm 1.0` precede the file name.
fn map_path(line: &str, tag: &str) -> String {
    let rest = rest_of_line(line, tag);
    rest.split_whitespace()
        .last()
        .map(|path| path.replace('\\', "/"))
        .unwrap_or_default()
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let x = parts
        .next()
        .ok_or_else(|| anyhow!("missing vector component"))?
        .parse::<f32>()?;
    let y = parts
        .next()
        .ok_or_else(|| anyhow!("missing vector component"))?
        .parse::<f32>()?;
    let z = parts
        .next()
        .ok_or_else(|| anyhow!("missing vector component"))?
        .parse::<f32>()?;
    Ok(Vec3::new(x, y, z))
}

fn parse_vec2<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec2> {
    let u = parts
        .next()
        .ok_or_else(|| anyhow!("missing texcoord component"))?
        .parse::<f32>()?;
    let v = match parts.next() {
        Some(v) => v.parse::<f32>()?,
        None => 0.0,
    };
    Ok(Vec2::new(u, v))
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<FaceIndex>> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let vt = parse_optional_index(segments.next());
        let vn = parse_optional_index(segments.next());
        indices.push(FaceIndex { v, vt, vn });
    }
    if indices.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(indices)
}

fn parse_optional_index(segment: Option<&str>) -> i32 {
    segment
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(0)
}

fn triangulate_face(polygon: &[FaceIndex], faces: &mut Vec<[FaceIndex; 3]>) {
    if polygon.len() < 3 {
        return;
    }
    for i in 1..(polygon.len() - 1) {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    texcoord: Option<usize>,
    normal: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    v: i32,
    vt: i32,
    vn: i32,
}

struct Attributes<'a> {
    positions: &'a [Vec3],
    normals: &'a [Vec3],
    texcoords: &'a [Vec2],
}

fn build_mesh(attributes: &Attributes<'_>, faces: &[[FaceIndex; 3]]) -> Result<ObjMesh> {
    let mut lookup: HashMap<Key, u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for face in faces {
        for idx in face {
            let position = fix_index(idx.v, attributes.positions.len())
                .ok_or_else(|| anyhow!("invalid vertex index {}", idx.v))?;
            let key = Key {
                position,
                texcoord: fix_index(idx.vt, attributes.texcoords.len()),
                normal: fix_index(idx.vn, attributes.normals.len()),
            };
            let next_index = (vertices.len() / VERTEX_STRIDE) as u32;
            let entry = lookup.entry(key).or_insert_with(|| {
                let p = attributes.positions[key.position];
                let n = key
                    .normal
                    .map(|i| attributes.normals[i])
                    .unwrap_or(Vec3::ZERO);
                let uv = key
                    .texcoord
                    .map(|i| attributes.texcoords[i])
                    .unwrap_or(Vec2::ZERO);
                vertices.extend_from_slice(&[p.x, p.y, p.z, n.x, n.y, n.z, uv.x, 1.0 - uv.y]);
                next_index
            });
            indices.push(*entry);
        }
    }

    Ok(ObjMesh { vertices, indices })
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = index.unsigned_abs() as usize;
        (abs <= len).then_some(len - abs)
    } else {
        None
    }
}

fn needs_normals(vertices: &[f32]) -> bool {
    vertices
        .chunks_exact(VERTEX_STRIDE)
        .any(|chunk| chunk[3] == 0.0 && chunk[4] == 0.0 && chunk[5] == 0.0)
}

fn compute_normals(mesh: &mut ObjMesh) {
    let mut accum = vec![Vec3::ZERO; mesh.vertex_count()];
    let position = |vertices: &[f32], i: usize| {
        Vec3::from_slice(&vertices[i * VERTEX_STRIDE..i * VERTEX_STRIDE + 3])
    };

    for triangle in mesh.indices.chunks_exact(3) {
        let i0 = triangle[0] as usize;
        let i1 = triangle[1] as usize;
        let i2 = triangle[2] as usize;
        let p0 = position(&mesh.vertices, i0);
        let p1 = position(&mesh.vertices, i1);
        let p2 = position(&mesh.vertices, i2);
        let normal = (p1 - p0).cross(p2 - p0);
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }

    for (i, normal) in accum.into_iter().enumerate() {
        let base = i * VERTEX_STRIDE;
        let existing = Vec3::from_slice(&mesh.vertices[base + 3..base + 6]);
        if existing != Vec3::ZERO {
            continue;
        }
        let normal = normal.normalize_or_zero();
        mesh.vertices[base + 3] = normal.x;
        mesh.vertices[base + 4] = normal.y;
        mesh.vertices[base + 5] = normal.z;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_triangle() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let model = load_obj_from_str(obj).unwrap();
        assert_eq!(model.parts.len(), 1);
        let mesh = &model.parts[0].mesh;
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices.len(), 3 * VERTEX_STRIDE);
    }

    #[test]
    fn computes_missing_normals() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let model = load_obj_from_str(obj).unwrap();
        for chunk in model.parts[0].mesh.vertices.chunks_exact(VERTEX_STRIDE) {
            let normal = Vec3::new(chunk[3], chunk[4], chunk[5]);
            assert!((normal - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn splits_parts_by_material_and_flips_v() {
        let obj = "mtllib suit.mtl\n\
            v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
            vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
            vn 0 0 1\n\
            usemtl Body\nf 1/1/1 2/2/1 3/3/1\n\
            usemtl Helmet\nf 1/1/1 3/3/1 4/4/1\n";
        let model = load_obj_from_str(obj).unwrap();
        assert_eq!(model.material_libraries, vec!["suit.mtl".to_string()]);
        let names: Vec<_> = model
            .parts
            .iter()
            .map(|part| part.material.as_deref())
            .collect();
        assert_eq!(names, vec![Some("Body"), Some("Helmet")]);

        let first = &model.parts[0].mesh.vertices;
        // vertex 1 has vt (0, 0) which lands at the bottom of the texture
        assert_eq!(&first[6..8], &[0.0, 1.0]);
    }

    #[test]
    fn quads_are_triangulated() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let model = load_obj_from_str(obj).unwrap();
        assert_eq!(model.parts[0].mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n";
        assert!(load_obj_from_str(obj).is_err());
        assert!(load_obj_from_str("# empty\n").is_err());
    }

    #[test]
    fn parses_mtl_texture_maps() {
        let mtl = "newmtl Body\nKd 1 1 1\nmap_Kd body_dif.png\nmap_Ks -bm 1 body_spec.png\n\
            newmtl Glass\nmap_Kd textures\\glass.png\n";
        let materials = load_mtl_from_str(mtl);
        assert_eq!(materials.len(), 2);
        assert_eq!(materials[0].diffuse_map.as_deref(), Some("body_dif.png"));
        assert_eq!(materials[0].specular_map.as_deref(), Some("body_spec.png"));
        assert_eq!(materials[1].diffuse_map.as_deref(), Some("textures/glass.png"));
        assert_eq!(materials[1].specular_map, None);
    }
}
