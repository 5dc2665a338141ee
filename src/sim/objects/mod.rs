//! World object kinds
//!
//! Each kind lives in its own id-ordered table on the game. Bullets and
//! explosions are transient and not world objects.

pub mod building;
pub mod decal;
pub mod loot;
pub mod obstacle;
pub mod player;

pub use building::Building;
pub use decal::{Decal, SyncedParticle};
pub use loot::Loot;
pub use obstacle::{DoorState, Obstacle};
pub use player::{InputAction, MovementIntent, Player, PlayerDirty, PlayerInput, TouchMovement};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Player,
    Obstacle,
    Building,
    Loot,
    Decal,
    Particle,
}
