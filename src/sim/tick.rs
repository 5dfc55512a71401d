//! Per-frame simulation step
//!
//! One `tick` per rendered frame with the frame's delta time.

use glam::Vec3;

use super::player::MoveInput;
use super::state::{GameEvent, GamePhase, GameState};

/// Input for a single tick
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    pub movement: MoveInput,
    /// Camera forward vector
    pub facing: Vec3,
    /// Camera up vector
    pub up: Vec3,
}

impl Default for TickInput {
    fn default() -> Self {
        Self {
            movement: MoveInput::default(),
            facing: Vec3::NEG_Z,
            up: Vec3::Y,
        }
    }
}

/// Advance the game by `dt` seconds
///
/// Order: move player, clamp, snap to ground, spawn, then integrate and cull
/// objects against the already-moved player. Does nothing once dead.
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) {
    if state.phase == GamePhase::Dead {
        return;
    }

    state.events.clear();
    state.survival_time += dt;

    state
        .player
        .update(dt, &input.movement, input.facing, input.up);
    state.player.clamp_to_arena();
    state.player.snap_to_ground();

    state.advance_spawn(dt);

    let player_bounds = state.player.bounds();
    let report = state.objects.step(dt, &player_bounds);

    if report.landed > 0 {
        state.events.push(GameEvent::Landed(report.landed));
    }
    if report.lost > 0 {
        state.events.push(GameEvent::Lost(report.lost));
    }
    if report.player_hit {
        state.kill_player();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::over_floor;
    use crate::sim::{FallingObject, SpawnRng};
    use proptest::prelude::*;

    const DT: f32 = 1.0 / 60.0;

    /// The object a fresh game with `seed` rolls on its first tick, before
    /// it is integrated
    fn first_spawn(seed: u64) -> FallingObject {
        let mut rng = SpawnRng::new(seed);
        // The schedule re-rolls its interval before the object is rolled
        rng.uniform(SPAWN_INTERVAL_MIN, SPAWN_INTERVAL_MAX);
        FallingObject::spawn(&mut rng)
    }

    #[test]
    fn test_first_tick_spawns_immediately() {
        let mut state = GameState::new(12345);
        tick(&mut state, &TickInput::default(), DT);
        assert_eq!(state.objects.len(), 1);
        assert!(state.events.contains(&GameEvent::Spawned));
        assert!((SPAWN_INTERVAL_MIN..=SPAWN_INTERVAL_MAX).contains(&state.spawn.timer));
    }

    #[test]
    fn test_spawned_object_integrates_on_spawn_frame() {
        let rolled = first_spawn(42);
        let mut expected = rolled.clone();
        expected.integrate(0.1);

        let mut state = GameState::new(42);
        tick(&mut state, &TickInput::default(), 0.1);

        assert_eq!(state.objects.as_slice(), &[expected]);
        let object = &state.objects.as_slice()[0];
        assert!(object.pos.y < rolled.pos.y);
        assert!(object.angle > rolled.angle);
    }

    #[test]
    fn test_spawned_object_hits_player_on_spawn_frame() {
        let mut expected = first_spawn(42);
        expected.integrate(0.1);

        let mut state = GameState::new(42);
        // Stand exactly where the first object will be after its first step
        state.player.ground_y = expected.pos.y;
        state.player.pos = expected.pos;
        tick(&mut state, &TickInput::default(), 0.1);

        assert!(state.is_player_dead());
        assert_eq!(state.events.first(), Some(&GameEvent::Spawned));
        assert!(state.events.contains(&GameEvent::PlayerDied));
        // The hit does not remove the object
        assert_eq!(state.objects.len(), 1);
    }

    #[test]
    fn test_spawned_object_culled_on_spawn_frame() {
        let dt = 10.0;
        let mut expected = first_spawn(5);
        expected.integrate(dt);
        let culled = if over_floor(expected.pos) {
            GameEvent::Landed(1)
        } else {
            GameEvent::Lost(1)
        };

        let mut state = GameState::new(5);
        tick(&mut state, &TickInput::default(), dt);

        assert!(state.objects.is_empty());
        assert!(state.events.contains(&GameEvent::Spawned));
        assert!(state.events.contains(&culled));
        assert!(!state.is_player_dead());
    }

    #[test]
    fn test_dead_tick_is_noop() {
        let mut state = GameState::new(77);
        for _ in 0..30 {
            tick(&mut state, &TickInput::default(), DT);
        }
        state.kill_player();

        let player = state.player.clone();
        let objects = state.objects.as_slice().to_vec();
        let timer = state.spawn.timer;
        let events = state.events.clone();

        let input = TickInput {
            movement: MoveInput {
                forward: true,
                right: true,
                ..Default::default()
            },
            ..Default::default()
        };
        for _ in 0..10 {
            tick(&mut state, &input, DT);
        }

        assert_eq!(state.player, player);
        assert_eq!(state.objects.as_slice(), objects.as_slice());
        assert_eq!(state.spawn.timer, timer);
        assert_eq!(state.events, events);
    }

    #[test]
    fn test_collision_uses_moved_player() {
        let mut state = GameState::new(3);
        state.spawn.timer = 10.0;
        // Object sits just out of reach of the starting position
        state
            .objects
            .push(FallingObject::at(Vec3::new(0.0, 0.5, -0.6)));

        let input = TickInput {
            movement: MoveInput {
                forward: true,
                ..Default::default()
            },
            ..Default::default()
        };
        // 3.0 * 0.05 = 0.15 toward -Z closes the 0.05 gap
        tick(&mut state, &input, 0.05);
        assert!(state.is_player_dead());
        assert!(state.events.contains(&GameEvent::PlayerDied));
    }

    #[test]
    fn test_hit_and_landing_in_same_frame() {
        let mut state = GameState::new(4);
        state.spawn.timer = 10.0;
        state.player.ground_y = -0.3;
        state.player.pos.y = -0.3;
        state
            .objects
            .push(FallingObject::at(Vec3::new(0.0, -0.26, 0.0)));

        tick(&mut state, &TickInput::default(), 0.0);

        assert!(state.is_player_dead());
        assert!(state.objects.is_empty());
        assert!(state.events.contains(&GameEvent::Landed(1)));
        assert!(state.events.contains(&GameEvent::PlayerDied));
    }

    #[test]
    fn test_reset_after_death_spawns_next_tick() {
        let mut state = GameState::new(8);
        tick(&mut state, &TickInput::default(), DT);
        state.kill_player();
        state.reset();

        assert!(!state.is_player_dead());
        assert!(state.objects.is_empty());
        tick(&mut state, &TickInput::default(), DT);
        assert_eq!(state.objects.len(), 1);
    }

    #[test]
    fn test_determinism() {
        let mut state1 = GameState::new(99999);
        let mut state2 = GameState::new(99999);

        let inputs = [
            TickInput::default(),
            TickInput {
                movement: MoveInput {
                    left: true,
                    ..Default::default()
                },
                ..Default::default()
            },
            TickInput {
                movement: MoveInput {
                    forward: true,
                    right: true,
                    ..Default::default()
                },
                ..Default::default()
            },
        ];

        for i in 0..600 {
            let input = &inputs[i % inputs.len()];
            tick(&mut state1, input, DT);
            tick(&mut state2, input, DT);
        }

        assert_eq!(state1.phase, state2.phase);
        assert_eq!(state1.player, state2.player);
        assert_eq!(state1.objects.as_slice(), state2.objects.as_slice());
    }

    proptest! {
        #[test]
        fn prop_player_stays_on_arena(
            moves in prop::collection::vec((any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()), 1..200),
            yaw in 0.0f32..std::f32::consts::TAU,
            dt in 0.001f32..0.1,
        ) {
            let mut state = GameState::new(1);
            let facing = Vec3::new(yaw.sin(), -0.5, -yaw.cos()).normalize();
            let limit = ARENA_HALF_EXTENT - PLAYER_HALF_SIZE;

            for (forward, back, left, right) in moves {
                let input = TickInput {
                    movement: MoveInput { forward, back, left, right },
                    facing,
                    up: Vec3::Y,
                };
                tick(&mut state, &input, dt);
                if state.is_player_dead() {
                    state.reset();
                }
                prop_assert!(state.player.pos.x.abs() <= limit + 1e-5);
                prop_assert!(state.player.pos.z.abs() <= limit + 1e-5);
                prop_assert_eq!(state.player.pos.y, PLAYER_GROUND_Y);
            }
        }

        #[test]
        fn prop_live_objects_stay_above_kill_plane(seed in any::<u64>(), frames in 1usize..400) {
            let mut state = GameState::new(seed);
            // Park the player in a corner so runs last
            state.player.pos = Vec3::new(5.7, PLAYER_GROUND_Y, 5.7);
            for _ in 0..frames {
                tick(&mut state, &TickInput::default(), DT);
                for object in state.objects.iter() {
                    prop_assert!(object.alive);
                    prop_assert!(object.pos.y >= KILL_PLANE_Y);
                    prop_assert!((object.axis.length() - 1.0).abs() < 1e-4);
                }
                if state.is_player_dead() {
                    state.reset();
                }
            }
        }
    }
}
