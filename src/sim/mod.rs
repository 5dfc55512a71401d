//! Frame-stepped simulation module
//!
//! All gameplay logic lives here:
//! - Variable timestep supplied by the frontend
//! - Seeded RNG only (clock-seeded by default)
//! - Objects processed in creation order
//! - No rendering or platform dependencies

pub mod collision;
pub mod falling;
pub mod player;
pub mod rng;
pub mod state;
pub mod tick;

pub use collision::Aabb;
pub use falling::{FallingObject, FallingPool, SpawnSchedule, StepReport, axis_or_up};
pub use player::{MoveInput, Player};
pub use rng::SpawnRng;
pub use state::{GameEvent, GamePhase, GameState};
pub use tick::{TickInput, tick};
