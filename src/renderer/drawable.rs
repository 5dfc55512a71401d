//! Scene description handed to both render passes

use glam::{Mat3, Mat4, Quat, Vec3};

use super::vertex::colors;
use crate::consts::*;
use crate::sim::{Aabb, GameState};

/// How the player is drawn this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerAppearance {
    /// No model configured
    Cube,
    /// Imported model with the given model-space bounds
    Model(Aabb),
    /// Model failed to load
    Hidden,
}

/// Something drawn in both passes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Drawable {
    /// Unit cube, scaled by the transform
    ProceduralCube { transform: Mat4, color: Vec3 },
    /// Every mesh of the uploaded player model
    ImportedMesh { transform: Mat4 },
}

impl Drawable {
    pub fn transform(&self) -> Mat4 {
        match self {
            Drawable::ProceduralCube { transform, .. } | Drawable::ImportedMesh { transform } => {
                *transform
            }
        }
    }
}

/// Inverse-transpose of the upper 3x3, for transforming normals
pub fn normal_matrix(model: Mat4) -> Mat3 {
    let m = Mat3::from_mat4(model);
    if m.determinant().abs() < 1e-12 {
        return Mat3::IDENTITY;
    }
    m.inverse().transpose()
}

/// Floor slab, top face at `FLOOR_TOP`
pub fn floor_transform() -> Mat4 {
    let size = Vec3::new(
        ARENA_HALF_EXTENT * 2.0,
        FLOOR_THICKNESS,
        ARENA_HALF_EXTENT * 2.0,
    );
    let center = Vec3::new(0.0, FLOOR_TOP - FLOOR_THICKNESS * 0.5, 0.0);
    Mat4::from_scale_rotation_translation(size, Quat::IDENTITY, center)
}

/// Scale a model to the player's height, centred on x/z, feet on the ground
pub fn fit_model_to_player(bounds: &Aabb, player_pos: Vec3) -> Mat4 {
    let height = bounds.size().y;
    let scale = if height > 1e-6 {
        PLAYER_MODEL_HEIGHT / height
    } else {
        1.0
    };
    let center = bounds.center();
    let anchor = Vec3::new(center.x, bounds.min.y, center.z);
    let feet = player_pos - Vec3::new(0.0, PLAYER_HALF_SIZE, 0.0);
    Mat4::from_translation(feet) * Mat4::from_scale(Vec3::splat(scale)) * Mat4::from_translation(-anchor)
}

/// Floor, player, then falling objects in pool order
pub fn scene_drawables(state: &GameState, player: PlayerAppearance) -> Vec<Drawable> {
    let mut drawables = Vec::with_capacity(state.objects.len() + 2);

    drawables.push(Drawable::ProceduralCube {
        transform: floor_transform(),
        color: Vec3::from_array(colors::FLOOR),
    });

    let p = &state.player;
    match player {
        PlayerAppearance::Cube => drawables.push(Drawable::ProceduralCube {
            transform: Mat4::from_scale_rotation_translation(
                Vec3::splat(PLAYER_HALF_SIZE * 2.0),
                Quat::IDENTITY,
                p.pos,
            ),
            color: p.color,
        }),
        PlayerAppearance::Model(bounds) => drawables.push(Drawable::ImportedMesh {
            transform: fit_model_to_player(&bounds, p.pos),
        }),
        PlayerAppearance::Hidden => {}
    }

    drawables.extend(state.objects.iter().map(|obj| Drawable::ProceduralCube {
        transform: Mat4::from_scale_rotation_translation(
            Vec3::splat(OBJECT_HALF_SIZE * 2.0),
            obj.rotation(),
            obj.pos,
        ),
        color: obj.color,
    }));

    drawables
}
