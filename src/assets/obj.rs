//! Wavefront OBJ/MTL importer
//!
//! Supports the subset character exports actually use: `v`/`vt`/`vn`,
//! polygonal `f` (fan-triangulated, negative indices allowed), `mtllib`,
//! `usemtl`, and in MTL files `newmtl`/`Kd`/`d`/`Tr`/`map_Kd`. Each material
//! group becomes one mesh.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};

use super::{DiffuseImage, MeshData, ModelData, ModelError, ModelProvider, classify_material};
use crate::renderer::vertex::MeshVertex;
use crate::sim::Aabb;

/// Loads `.obj` files from disk
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjModelProvider;

impl ModelProvider for ObjModelProvider {
    fn load_model(&self, path: &Path) -> Result<ModelData, ModelError> {
        let source = read(path)?;
        let base_dir = path.parent().unwrap_or(Path::new(""));
        let parsed = parse_obj(&source, path)?;

        let mut materials = HashMap::new();
        for lib in &parsed.material_libs {
            let lib_path = base_dir.join(lib);
            match read(&lib_path).and_then(|text| parse_mtl(&text, &lib_path)) {
                Ok(found) => materials.extend(found),
                Err(e) => log::warn!("Ignoring material library: {}", e),
            }
        }

        let model = assemble(parsed, &materials, base_dir, path)?;
        log::info!(
            "Loaded {} ({} meshes, {} triangles)",
            path.display(),
            model.meshes.len(),
            model.meshes.iter().map(|m| m.indices.len() / 3).sum::<usize>()
        );
        Ok(model)
    }
}

fn read(path: &Path) -> Result<String, ModelError> {
    std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// One face corner as resolved zero-based indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Corner {
    position: usize,
    uv: Option<usize>,
    normal: Option<usize>,
}

#[derive(Debug, Default)]
struct Group {
    material: String,
    triangles: Vec<[Corner; 3]>,
}

#[derive(Debug, Default)]
struct ParsedObj {
    positions: Vec<Vec3>,
    uvs: Vec<Vec2>,
    normals: Vec<Vec3>,
    groups: Vec<Group>,
    material_libs: Vec<String>,
}

impl ParsedObj {
    /// Group for `material`, reusing the previous group of the same name
    fn group_mut(&mut self, material: &str) -> &mut Group {
        let index = match self.groups.iter().position(|g| g.material == material) {
            Some(i) => i,
            None => {
                self.groups.push(Group {
                    material: material.to_string(),
                    triangles: Vec::new(),
                });
                self.groups.len() - 1
            }
        };
        &mut self.groups[index]
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Material {
    diffuse: Vec3,
    opacity: f32,
    diffuse_map: Option<String>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse: Vec3::splat(0.8),
            opacity: 1.0,
            diffuse_map: None,
        }
    }
}

fn parse_error(path: &Path, line: usize, message: impl Into<String>) -> ModelError {
    ModelError::Parse {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

fn parse_floats<const N: usize>(
    mut parts: std::str::SplitWhitespace<'_>,
    path: &Path,
    line: usize,
) -> Result<[f32; N], ModelError> {
    let mut out = [0.0; N];
    for slot in &mut out {
        let token = parts
            .next()
            .ok_or_else(|| parse_error(path, line, format!("expected {} numbers", N)))?;
        *slot = token
            .parse()
            .map_err(|_| parse_error(path, line, format!("invalid number '{}'", token)))?;
    }
    Ok(out)
}

/// Resolve a one-based (or negative, relative) OBJ index
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    if index > 0 {
        let i = index as usize - 1;
        (i < len).then_some(i)
    } else if index < 0 {
        let back = index.unsigned_abs() as usize;
        (back <= len).then(|| len - back)
    } else {
        None
    }
}

fn parse_corner(token: &str, obj: &ParsedObj, path: &Path, line: usize) -> Result<Corner, ModelError> {
    let mut fields = token.split('/');
    let bad = || parse_error(path, line, format!("invalid face corner '{}'", token));

    let position = fields
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|i| resolve_index(i, obj.positions.len()))
        .ok_or_else(bad)?;

    let mut optional = |len: usize| -> Result<Option<usize>, ModelError> {
        match fields.next() {
            None | Some("") => Ok(None),
            Some(s) => {
                let i = s.parse::<i64>().map_err(|_| bad())?;
                resolve_index(i, len).map(Some).ok_or_else(bad)
            }
        }
    };
    let uv = optional(obj.uvs.len())?;
    let normal = optional(obj.normals.len())?;

    Ok(Corner {
        position,
        uv,
        normal,
    })
}

fn parse_obj(source: &str, path: &Path) -> Result<ParsedObj, ModelError> {
    let mut obj = ParsedObj::default();
    let mut material = String::new();

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };

        match tag {
            "v" => obj.positions.push(Vec3::from(parse_floats::<3>(parts, path, line)?)),
            "vt" => obj.uvs.push(Vec2::from(parse_floats::<2>(parts, path, line)?)),
            "vn" => obj.normals.push(Vec3::from(parse_floats::<3>(parts, path, line)?)),
            "f" => {
                let corners = parts
                    .map(|token| parse_corner(token, &obj, path, line))
                    .collect::<Result<Vec<_>, _>>()?;
                if corners.len() < 3 {
                    return Err(parse_error(path, line, "face needs at least 3 corners"));
                }
                let group = obj.group_mut(&material);
                for i in 1..corners.len() - 1 {
                    group.triangles.push([corners[0], corners[i], corners[i + 1]]);
                }
            }
            "usemtl" => material = parts.collect::<Vec<_>>().join(" "),
            "mtllib" => obj.material_libs.extend(parts.map(str::to_string)),
            // o, g, s and friends carry nothing we draw
            _ => {}
        }
    }

    Ok(obj)
}

fn parse_mtl(source: &str, path: &Path) -> Result<HashMap<String, Material>, ModelError> {
    let mut materials = HashMap::new();
    let mut current: Option<(String, Material)> = None;

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };

        if tag == "newmtl" {
            if let Some((name, mat)) = current.take() {
                materials.insert(name, mat);
            }
            current = Some((parts.collect::<Vec<_>>().join(" "), Material::default()));
            continue;
        }

        let Some((_, mat)) = current.as_mut() else {
            continue;
        };
        match tag {
            "Kd" => mat.diffuse = Vec3::from(parse_floats::<3>(parts, path, line)?),
            "d" => mat.opacity = parse_floats::<1>(parts, path, line)?[0],
            "Tr" => mat.opacity = 1.0 - parse_floats::<1>(parts, path, line)?[0],
            // Options like -bm come first, the file name is last
            "map_Kd" => mat.diffuse_map = parts.last().map(str::to_string),
            _ => {}
        }
    }

    if let Some((name, mat)) = current {
        materials.insert(name, mat);
    }
    Ok(materials)
}

/// Accumulate face normals into vertices that had none
fn fill_missing_normals(vertices: &mut [MeshVertex], indices: &[u32], missing: &[bool]) {
    let mut accum = vec![Vec3::ZERO; vertices.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let p0 = Vec3::from(vertices[a].position);
        let face = (Vec3::from(vertices[b].position) - p0).cross(Vec3::from(vertices[c].position) - p0);
        // Area weighted
        accum[a] += face;
        accum[b] += face;
        accum[c] += face;
    }
    for (i, vertex) in vertices.iter_mut().enumerate() {
        if missing[i] {
            vertex.normal = accum[i].try_normalize().unwrap_or(Vec3::Y).to_array();
        }
    }
}

fn load_texture(base_dir: &Path, name: &str, cache: &mut HashMap<PathBuf, Option<DiffuseImage>>) -> Option<DiffuseImage> {
    let path = base_dir.join(name);
    cache
        .entry(path.clone())
        .or_insert_with(|| match DiffuseImage::load(&path) {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("Texture {} unavailable, drawing untextured: {}", path.display(), e);
                None
            }
        })
        .clone()
}

fn assemble(
    obj: ParsedObj,
    materials: &HashMap<String, Material>,
    base_dir: &Path,
    path: &Path,
) -> Result<ModelData, ModelError> {
    let mut textures = HashMap::new();
    let mut meshes = Vec::new();
    let mut used_positions = Vec::new();

    for group in obj.groups.iter().filter(|g| !g.triangles.is_empty()) {
        let mut lookup: HashMap<Corner, u32> = HashMap::new();
        let mut vertices = Vec::new();
        let mut missing_normal = Vec::new();
        let mut indices = Vec::with_capacity(group.triangles.len() * 3);

        for corner in group.triangles.iter().flatten() {
            let next = vertices.len() as u32;
            let index = *lookup.entry(*corner).or_insert_with(|| {
                let position = obj.positions[corner.position];
                let uv = corner
                    .uv
                    .map(|i| [obj.uvs[i].x, 1.0 - obj.uvs[i].y])
                    .unwrap_or([0.0, 0.0]);
                let normal = corner.normal.map(|i| obj.normals[i]);
                missing_normal.push(normal.is_none());
                used_positions.push(position);
                vertices.push(MeshVertex::new(
                    position.to_array(),
                    normal.unwrap_or(Vec3::ZERO).to_array(),
                    uv,
                ));
                next
            });
            indices.push(index);
        }

        if missing_normal.iter().any(|&m| m) {
            fill_missing_normals(&mut vertices, &indices, &missing_normal);
        }

        let material = materials.get(&group.material).cloned().unwrap_or_else(|| {
            if !group.material.is_empty() {
                log::warn!("Material '{}' not found, using defaults", group.material);
            }
            Material::default()
        });
        let image = material
            .diffuse_map
            .as_deref()
            .and_then(|name| load_texture(base_dir, name, &mut textures));
        let flags = classify_material(
            &group.material,
            material.diffuse_map.as_deref(),
            image.as_ref(),
            material.opacity,
        );

        meshes.push(MeshData {
            name: group.material.clone(),
            vertices,
            indices,
            material: flags,
            diffuse_color: material.diffuse,
            diffuse_image: image,
        });
    }

    let bounds = Aabb::enclosing(used_positions).ok_or_else(|| ModelError::Empty(path.to_path_buf()))?;
    Ok(ModelData { meshes, bounds })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const QUAD: &str = "\
# a unit quad in the xz plane
v -0.5 0 -0.5
v 0.5 0 -0.5
v 0.5 0 0.5
v -0.5 0 0.5
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 4/4 3/3 2/2
";

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index(1, 3), Some(0));
        assert_eq!(resolve_index(3, 3), Some(2));
        assert_eq!(resolve_index(4, 3), None);
        assert_eq!(resolve_index(-1, 3), Some(2));
        assert_eq!(resolve_index(-3, 3), Some(0));
        assert_eq!(resolve_index(-4, 3), None);
        assert_eq!(resolve_index(0, 3), None);
    }

    #[test]
    fn test_quad_fan_triangulation_and_smooth_normals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.obj");
        fs::write(&path, QUAD).unwrap();

        let model = ObjModelProvider.load_model(&path).unwrap();
        assert_eq!(model.meshes.len(), 1);
        let mesh = &model.meshes[0];
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        for v in &mesh.vertices {
            assert!((Vec3::from(v.normal) - Vec3::Y).length() < 1e-5);
        }
        assert_eq!(mesh.material, crate::assets::MaterialFlags::default());
        assert_eq!(model.bounds.min, Vec3::new(-0.5, 0.0, -0.5));
        assert_eq!(model.bounds.max, Vec3::new(0.5, 0.0, 0.5));
    }

    #[test]
    fn test_texture_v_is_flipped() {
        let obj = parse_obj(QUAD, Path::new("quad.obj")).unwrap();
        let model = assemble(obj, &HashMap::new(), Path::new(""), Path::new("quad.obj")).unwrap();
        let mesh = &model.meshes[0];
        // vt 0 1 on vertex 4
        let v = mesh.vertices.iter().find(|v| v.position == [-0.5, 0.0, 0.5]).unwrap();
        assert_eq!(v.uv, [0.0, 0.0]);
        let v = mesh.vertices.iter().find(|v| v.position == [-0.5, 0.0, -0.5]).unwrap();
        assert_eq!(v.uv, [0.0, 1.0]);
    }

    #[test]
    fn test_materials_split_meshes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("char.mtl"),
            "newmtl Body\nKd 0.2 0.4 0.6\n\nnewmtl Hair_Main\nKd 0.1 0.1 0.1\nmap_Kd hair.png\n\nnewmtl Veil\nd 0.3\n",
        )
        .unwrap();
        image::RgbaImage::from_raw(1, 2, vec![0, 0, 0, 255, 0, 0, 0, 0])
            .unwrap()
            .save(dir.path().join("hair.png"))
            .unwrap();
        let path = dir.path().join("char.obj");
        fs::write(
            &path,
            "mtllib char.mtl\n\
             v 0 0 0\nv 1 0 0\nv 0 2 0\nv 1 2 0\nv 0 1 1\n\
             vn 0 0 1\n\
             usemtl Body\nf 1//1 2//1 3//1\n\
             usemtl Hair_Main\nf 2 4 3\n\
             usemtl Veil\nf 1 2 5\n\
             usemtl Body\nf 3 4 5\n",
        )
        .unwrap();

        let model = ObjModelProvider.load_model(&path).unwrap();
        assert_eq!(model.meshes.len(), 3);

        let body = &model.meshes[0];
        assert_eq!(body.name, "Body");
        assert_eq!(body.indices.len(), 6);
        assert_eq!(body.diffuse_color, Vec3::new(0.2, 0.4, 0.6));
        assert!(!body.material.uses_alpha_test());

        let hair = &model.meshes[1];
        assert!(hair.material.is_hair);
        assert!(hair.material.has_diffuse_texture);
        assert!(hair.material.has_alpha);
        assert_eq!(hair.material.alpha_cutoff, 0.4);
        assert_eq!(hair.diffuse_image.as_ref().map(|i| i.height), Some(2));

        let veil = &model.meshes[2];
        assert!(veil.material.has_alpha);
        assert!(!veil.material.is_hair);
        assert!(!veil.material.has_diffuse_texture);

        assert_eq!(model.bounds.min, Vec3::ZERO);
        assert_eq!(model.bounds.max, Vec3::new(1.0, 2.0, 1.0));
    }

    #[test]
    fn test_missing_texture_degrades_to_untextured() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("m.mtl"), "newmtl skin\nmap_Kd -bm 1 gone.png\n").unwrap();
        let path = dir.path().join("m.obj");
        fs::write(&path, "mtllib m.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl skin\nf 1 2 3\n").unwrap();

        let model = ObjModelProvider.load_model(&path).unwrap();
        let mesh = &model.meshes[0];
        assert!(mesh.diffuse_image.is_none());
        assert!(!mesh.material.has_diffuse_texture);
    }

    #[test]
    fn test_missing_material_library_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.obj");
        fs::write(&path, "mtllib nope.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl x\nf 1 2 3\n").unwrap();
        let model = ObjModelProvider.load_model(&path).unwrap();
        assert_eq!(model.meshes.len(), 1);
    }

    #[test]
    fn test_errors() {
        let err = parse_obj("v 0 0 0\nv 1 0\n", Path::new("bad.obj")).unwrap_err();
        assert!(matches!(err, ModelError::Parse { line: 2, .. }));

        let err = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n", Path::new("bad.obj")).unwrap_err();
        assert!(matches!(err, ModelError::Parse { line: 4, .. }));

        let err = parse_obj("v 0 0 0\nv 1 0 0\nf 1 2\n", Path::new("bad.obj")).unwrap_err();
        assert!(matches!(err, ModelError::Parse { line: 3, .. }));

        let obj = parse_obj("v 0 0 0\n", Path::new("empty.obj")).unwrap();
        let err = assemble(obj, &HashMap::new(), Path::new(""), Path::new("empty.obj")).unwrap_err();
        assert!(matches!(err, ModelError::Empty(_)));

        let err = ObjModelProvider
            .load_model(Path::new("no/such/model.obj"))
            .unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }
}
