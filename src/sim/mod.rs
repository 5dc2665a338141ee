//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only, clock passed in by the runner
//! - Seeded RNG only (one `Pcg32` per game)
//! - Stable iteration order (id-ordered tables and sets)
//! - No I/O; packets leave through the `ClientSink` trait

pub mod bullet;
pub mod catalog;
pub mod collision;
pub mod damage;
pub mod events;
pub mod explosion;
pub mod gas;
pub mod grid;
pub mod hitbox;
pub mod ids;
pub mod interact;
pub mod inventory;
pub mod items;
pub mod map;
pub mod objects;
pub mod snapshot;
pub mod state;
pub mod terrain;
pub mod tick;
pub mod timers;

pub use catalog::Catalog;
pub use collision::{CollisionRecord, LineIntersection};
pub use damage::DamageRecord;
pub use events::{Cancellation, EventBus, EventKind, GameEvent};
pub use gas::{Gas, GasState};
pub use grid::Grid;
pub use hitbox::Hitbox;
pub use ids::ObjectId;
pub use objects::{InputAction, MovementIntent, ObjectKind, PlayerInput, TouchMovement};
pub use snapshot::{ChannelSink, ClientSink, JsonEncoder, PacketEncoder, ServerPacket, UpdatePacket};
pub use state::{Game, GameStatus};
