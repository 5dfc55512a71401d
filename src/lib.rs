//! Drop Dodge - dodge the blocks falling onto a shadow-mapped arena
//!
//! Core modules:
//! - `sim`: Frame-stepped simulation (player, falling objects, collisions, game state)
//! - `renderer`: Two-pass wgpu renderer (light depth pass, lit pass)
//! - `assets`: Model provider (OBJ/MTL import, material classification)
//! - `audio`: Sound effect stub interface
//! - `settings`: User configuration

pub mod assets;
pub mod audio;
pub mod renderer;
pub mod settings;
pub mod sim;

pub use settings::{QualityPreset, Settings};

use glam::Vec3;

/// Game configuration constants
pub mod consts {
    /// Largest frame delta the frontend feeds into the simulation
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Arena floor: square slab, half-extent on X/Z
    pub const ARENA_HALF_EXTENT: f32 = 6.0;
    /// Top surface of the floor slab
    pub const FLOOR_TOP: f32 = -0.5;
    /// Floor slab thickness (render only)
    pub const FLOOR_THICKNESS: f32 = 0.1;
    /// Objects below this height are discarded
    pub const KILL_PLANE_Y: f32 = -6.0;

    /// Gravity and the scale applied to it (objects fall slowly on purpose)
    pub const GRAVITY: f32 = 9.8;
    pub const GRAVITY_SCALE: f32 = 0.2;

    /// Player defaults
    pub const PLAYER_HALF_SIZE: f32 = 0.3;
    pub const PLAYER_GROUND_Y: f32 = 0.5;
    pub const PLAYER_MOVE_SPEED: f32 = 3.0;
    /// Height the imported player model is scaled to
    pub const PLAYER_MODEL_HEIGHT: f32 = 1.2;

    /// Falling object half-size (collision box and rendered cube)
    pub const OBJECT_HALF_SIZE: f32 = 0.25;
    /// Farthest x/z an object's center can be and still touch the slab
    pub const OBJECT_LANDING_REACH: f32 = ARENA_HALF_EXTENT + OBJECT_HALF_SIZE;

    /// Seconds between spawns, re-rolled after every spawn
    pub const SPAWN_INTERVAL_MIN: f32 = 0.4;
    pub const SPAWN_INTERVAL_MAX: f32 = 0.9;
}

/// Height at which a falling object sits when resting on the floor
#[inline]
pub fn rest_on_floor_y() -> f32 {
    consts::FLOOR_TOP + consts::OBJECT_HALF_SIZE
}

/// Whether an object centered at `pos` overlaps the slab on x/z
#[inline]
pub fn over_floor(pos: Vec3) -> bool {
    pos.x.abs() <= consts::OBJECT_LANDING_REACH && pos.z.abs() <= consts::OBJECT_LANDING_REACH
}

/// Clamp a horizontal position so a body of `half_size` stays on the arena
#[inline]
pub fn clamp_to_arena(pos: Vec3, half_size: f32) -> Vec3 {
    let limit = consts::ARENA_HALF_EXTENT - half_size;
    Vec3::new(pos.x.clamp(-limit, limit), pos.y, pos.z.clamp(-limit, limit))
}
