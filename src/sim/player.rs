//! Player controller

use glam::Vec3;

use super::collision::Aabb;
use crate::clamp_to_arena;
use crate::consts::*;

/// Movement keys held this frame
///
/// Flags are independent: forward + right moves diagonally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveInput {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
}

/// The player's avatar
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub pos: Vec3,
    /// Fixed vertical coordinate (horizontal-only motion)
    pub ground_y: f32,
    pub color: Vec3,
    pub move_speed: f32,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            pos: Vec3::new(0.0, PLAYER_GROUND_Y, 0.0),
            ground_y: PLAYER_GROUND_Y,
            color: Vec3::new(1.0, 0.9, 0.0),
            move_speed: PLAYER_MOVE_SPEED,
        }
    }
}

impl Player {
    /// Move along the camera's facing direction and its strafe axis
    ///
    /// Active directions are summed without re-normalizing, so diagonal
    /// movement is about 1.41x faster than straight movement.
    pub fn update(&mut self, dt: f32, input: &MoveInput, facing: Vec3, up: Vec3) {
        let step = self.move_speed * dt;
        let strafe = facing.cross(up).normalize_or_zero();

        if input.forward {
            self.pos += facing * step;
        }
        if input.back {
            self.pos -= facing * step;
        }
        if input.left {
            self.pos -= strafe * step;
        }
        if input.right {
            self.pos += strafe * step;
        }
    }

    /// Keep the whole player box on the floor slab
    pub fn clamp_to_arena(&mut self) {
        self.pos = clamp_to_arena(self.pos, PLAYER_HALF_SIZE);
    }

    /// Undo any vertical drift picked up from a tilted facing vector
    pub fn snap_to_ground(&mut self) {
        self.pos.y = self.ground_y;
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_center(self.pos, PLAYER_HALF_SIZE)
    }
}
