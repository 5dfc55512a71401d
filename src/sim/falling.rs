//! Falling objects: spawning, integration and culling

use glam::{Quat, Vec3};

use super::collision::Aabb;
use super::rng::SpawnRng;
use crate::consts::*;
use crate::{over_floor, rest_on_floor_y};

/// Spawn volume (above the visible play area)
pub const SPAWN_XZ_RANGE: f32 = 4.0;
pub const SPAWN_Y_MIN: f32 = 4.0;
pub const SPAWN_Y_MAX: f32 = 7.0;

/// Initial drift and fall speed
pub const SPAWN_DRIFT_X: f32 = 1.5;
pub const SPAWN_DRIFT_Z: f32 = 1.0;
pub const SPAWN_FALL_MIN: f32 = 1.2;
pub const SPAWN_FALL_MAX: f32 = 3.0;

/// Rotation speed range (rad/s)
pub const SPIN_MIN: f32 = 1.0;
pub const SPIN_MAX: f32 = 6.0;

/// Random axes shorter than this fall back to +Y
const MIN_AXIS_LENGTH: f32 = 1e-4;

/// A falling object
#[derive(Debug, Clone, PartialEq)]
pub struct FallingObject {
    pub pos: Vec3,
    pub vel: Vec3,
    pub color: Vec3,
    /// Cleared on landing or when lost below the kill plane
    pub alive: bool,
    /// Radians, grows without wrapping
    pub angle: f32,
    /// Unit rotation axis
    pub axis: Vec3,
    /// Radians per second
    pub spin_speed: f32,
}

impl FallingObject {
    /// A motionless, non-rotating object at `pos`
    pub fn at(pos: Vec3) -> Self {
        Self {
            pos,
            vel: Vec3::ZERO,
            color: Vec3::ONE,
            alive: true,
            angle: 0.0,
            axis: Vec3::Y,
            spin_speed: 0.0,
        }
    }

    /// Roll a new object in the spawn volume
    pub fn spawn(rng: &mut SpawnRng) -> Self {
        let pos = Vec3::new(
            rng.uniform(-SPAWN_XZ_RANGE, SPAWN_XZ_RANGE),
            rng.uniform(SPAWN_Y_MIN, SPAWN_Y_MAX),
            rng.uniform(-SPAWN_XZ_RANGE, SPAWN_XZ_RANGE),
        );
        let vel = Vec3::new(
            rng.uniform(-SPAWN_DRIFT_X, SPAWN_DRIFT_X),
            -rng.uniform(SPAWN_FALL_MIN, SPAWN_FALL_MAX),
            rng.uniform(-SPAWN_DRIFT_Z, SPAWN_DRIFT_Z),
        );
        // Biased toward bright warm colors
        let color = Vec3::new(
            rng.uniform(0.6, 1.0),
            rng.uniform(0.1, 0.6),
            rng.uniform(0.1, 0.9),
        );
        let angle = rng.uniform_exclusive(0.0, std::f32::consts::TAU);
        let axis = axis_or_up(Vec3::new(
            rng.uniform(-1.0, 1.0),
            rng.uniform(-1.0, 1.0),
            rng.uniform(-1.0, 1.0),
        ));
        let spin_speed = rng.uniform(SPIN_MIN, SPIN_MAX);

        Self {
            pos,
            vel,
            color,
            alive: true,
            angle,
            axis,
            spin_speed,
        }
    }

    /// Damped gravity, semi-implicit Euler, spin
    pub fn integrate(&mut self, dt: f32) {
        self.vel.y -= GRAVITY * dt * GRAVITY_SCALE;
        self.pos += self.vel * dt;
        self.angle += self.spin_speed * dt;
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_center(self.pos, OBJECT_HALF_SIZE)
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_axis_angle(self.axis, self.angle)
    }

    /// Land on the floor if the bottom face reached it
    ///
    /// The height test is the whole rule for any object still over the slab
    /// (center within `OBJECT_LANDING_REACH` on x and z). Objects that
    /// drifted past the edge never land and fall on to the kill plane. A
    /// landed object is snapped onto the floor and marked dead.
    pub fn try_rest_on_floor(&mut self) -> bool {
        if !over_floor(self.pos) || self.pos.y - OBJECT_HALF_SIZE > FLOOR_TOP {
            return false;
        }
        self.pos.y = rest_on_floor_y();
        self.vel.y = 0.0;
        self.alive = false;
        true
    }

    pub fn below_kill_plane(&self) -> bool {
        self.pos.y < KILL_PLANE_Y
    }
}

/// Normalize a random axis, falling back to +Y for near-zero input
pub fn axis_or_up(v: Vec3) -> Vec3 {
    if v.length() < MIN_AXIS_LENGTH {
        Vec3::Y
    } else {
        v.normalize()
    }
}

/// What happened during one integration pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// At least one object overlapped the player
    pub player_hit: bool,
    /// Objects that came to rest on the floor
    pub landed: u32,
    /// Objects that fell below the kill plane
    pub lost: u32,
}

/// Ordered collection of falling objects
///
/// Order is creation order and only affects draw order.
#[derive(Debug, Clone, Default)]
pub struct FallingPool {
    objects: Vec<FallingObject>,
}

impl FallingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roll and append a new object
    pub fn spawn(&mut self, rng: &mut SpawnRng) -> &FallingObject {
        self.push(FallingObject::spawn(rng))
    }

    pub fn push(&mut self, object: FallingObject) -> &FallingObject {
        self.objects.push(object);
        &self.objects[self.objects.len() - 1]
    }

    /// Integrate every live object, test it against the player, then compact
    ///
    /// A collision only reports the hit; the object keeps falling and can
    /// land in the same pass.
    pub fn step(&mut self, dt: f32, player: &Aabb) -> StepReport {
        let mut report = StepReport::default();

        for object in self.objects.iter_mut().filter(|o| o.alive) {
            object.integrate(dt);

            if object.bounds().overlaps(player) {
                report.player_hit = true;
            }

            if object.try_rest_on_floor() {
                report.landed += 1;
                log::debug!("Object landed at ({:.2}, {:.2})", object.pos.x, object.pos.z);
            }

            if object.alive && object.below_kill_plane() {
                object.alive = false;
                report.lost += 1;
            }
        }

        self.compact();
        report
    }

    /// Drop dead objects, keeping survivors in order
    pub fn compact(&mut self) {
        self.objects.retain(|o| o.alive);
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FallingObject> {
        self.objects.iter()
    }

    pub fn as_slice(&self) -> &[FallingObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Countdown to the next spawn with an irregular cadence
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpawnSchedule {
    /// Seconds until the next spawn; zero spawns on the next tick
    pub timer: f32,
}

impl SpawnSchedule {
    /// Count down; on expiry re-roll the interval and report a spawn
    pub fn advance(&mut self, dt: f32, rng: &mut SpawnRng) -> bool {
        self.timer -= dt;
        if self.timer > 0.0 {
            return false;
        }
        self.timer = rng.uniform(SPAWN_INTERVAL_MIN, SPAWN_INTERVAL_MAX);
        true
    }

    pub fn reset(&mut self) {
        self.timer = 0.0;
    }
}
