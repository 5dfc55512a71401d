//! Game state and lifecycle
//!
//! The state is the single writer of everything the renderer reads.

use super::falling::{FallingPool, SpawnSchedule};
use super::player::Player;
use super::rng::SpawnRng;

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GamePhase {
    /// Simulation running
    #[default]
    Alive,
    /// Player was hit; frozen until reset
    Dead,
}

/// Things that happened during the most recent tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// A new object appeared overhead
    Spawned,
    /// Objects came to rest on the floor
    Landed(u32),
    /// Objects fell below the kill plane
    Lost(u32),
    /// An object hit the player
    PlayerDied,
}

/// Complete game state
#[derive(Debug, Clone)]
pub struct GameState {
    pub player: Player,
    pub objects: FallingPool,
    pub spawn: SpawnSchedule,
    pub phase: GamePhase,
    /// Seconds survived in the current run
    pub survival_time: f32,
    /// Events produced by the most recent alive tick
    pub events: Vec<GameEvent>,
    rng: SpawnRng,
}

impl GameState {
    /// Create a new game with a fixed seed
    pub fn new(seed: u64) -> Self {
        Self::with_rng(SpawnRng::new(seed))
    }

    /// Create a new game seeded from the clock
    pub fn from_clock() -> Self {
        Self::with_rng(SpawnRng::from_clock())
    }

    fn with_rng(rng: SpawnRng) -> Self {
        log::info!("New game (seed {})", rng.seed());
        Self {
            player: Player::default(),
            objects: FallingPool::new(),
            spawn: SpawnSchedule::default(),
            phase: GamePhase::Alive,
            survival_time: 0.0,
            events: Vec::new(),
            rng,
        }
    }

    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    pub fn is_player_dead(&self) -> bool {
        self.phase == GamePhase::Dead
    }

    /// Mark the player dead (sticky)
    pub fn kill_player(&mut self) {
        if self.phase != GamePhase::Dead {
            self.phase = GamePhase::Dead;
            self.events.push(GameEvent::PlayerDied);
            log::info!("Player hit after {:.1}s", self.survival_time);
        }
    }

    /// Roll one object into the pool
    pub fn spawn_object(&mut self) {
        let object = self.objects.spawn(&mut self.rng);
        log::debug!(
            "Spawned object at ({:.2}, {:.2}, {:.2})",
            object.pos.x,
            object.pos.y,
            object.pos.z
        );
        self.events.push(GameEvent::Spawned);
    }

    /// Start a fresh run: empty pool, immediate spawn, player back home
    pub fn reset(&mut self) {
        self.objects.clear();
        self.spawn.reset();
        self.player = Player::default();
        self.phase = GamePhase::Alive;
        self.survival_time = 0.0;
        self.events.clear();
    }

    /// Count the spawn timer down, spawning when it expires
    pub fn advance_spawn(&mut self, dt: f32) {
        if self.spawn.advance(dt, &mut self.rng) {
            self.spawn_object();
        }
    }
}
