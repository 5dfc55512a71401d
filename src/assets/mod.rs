//! Model provider
//!
//! Turns model files into CPU-side meshes the renderer can upload. Each mesh
//! carries material capability flags decided once at load time, so the
//! renderer never inspects material names itself.

pub mod obj;
pub mod texture;

use std::path::{Path, PathBuf};

use glam::Vec3;

use crate::renderer::vertex::MeshVertex;
use crate::sim::Aabb;

pub use obj::ObjModelProvider;
pub use texture::DiffuseImage;

/// Alpha cutoff for materials classified as hair or fur
pub const HAIR_ALPHA_CUTOFF: f32 = 0.4;
/// Alpha cutoff for every other alpha-tested material
pub const DEFAULT_ALPHA_CUTOFF: f32 = 0.5;

/// Errors produced while importing a model
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{0} contains no drawable faces")]
    Empty(PathBuf),
}

/// Material capabilities of one mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialFlags {
    pub has_diffuse_texture: bool,
    /// Texture or material has transparent regions
    pub has_alpha: bool,
    /// Alpha-tested, blended, drawn without depth writes
    pub is_hair: bool,
    pub alpha_cutoff: f32,
}

impl Default for MaterialFlags {
    fn default() -> Self {
        Self {
            has_diffuse_texture: false,
            has_alpha: false,
            is_hair: false,
            alpha_cutoff: DEFAULT_ALPHA_CUTOFF,
        }
    }
}

impl MaterialFlags {
    /// Whether fragments below the cutoff are discarded
    pub fn uses_alpha_test(&self) -> bool {
        self.has_alpha || self.is_hair
    }
}

/// One drawable mesh of an imported model
#[derive(Debug, Clone)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub material: MaterialFlags,
    /// Used when there is no texture
    pub diffuse_color: Vec3,
    pub diffuse_image: Option<DiffuseImage>,
}

/// An imported model ready for upload
#[derive(Debug, Clone)]
pub struct ModelData {
    pub meshes: Vec<MeshData>,
    /// Model-space bounds over all meshes
    pub bounds: Aabb,
}

/// Anything that can turn a path into model data
pub trait ModelProvider {
    fn load_model(&self, path: &Path) -> Result<ModelData, ModelError>;
}

/// Whether a material or texture name looks like hair or fur
pub fn looks_like_hair(name: &str) -> bool {
    let name = name.to_lowercase();
    name.contains("hair") || name.contains("fur")
}

/// Decide material flags for a mesh
///
/// `opacity` is the material's dissolve value (1.0 = opaque). The hair
/// heuristic looks at the material name first, then the texture file name
/// when a texture actually loaded.
pub fn classify_material(
    material_name: &str,
    texture_name: Option<&str>,
    texture: Option<&DiffuseImage>,
    opacity: f32,
) -> MaterialFlags {
    let mut flags = MaterialFlags {
        has_diffuse_texture: texture.is_some(),
        has_alpha: texture.is_some_and(|t| t.has_alpha) || opacity < 0.999,
        ..Default::default()
    };

    let hair_texture = texture.is_some() && texture_name.is_some_and(looks_like_hair);
    if looks_like_hair(material_name) || hair_texture {
        flags.is_hair = true;
        flags.alpha_cutoff = HAIR_ALPHA_CUTOFF;
    }

    flags
}
