//! Shrinkzone - server-side simulation core for a top-down battle royale
//!
//! Core modules:
//! - `sim`: Deterministic simulation (hitboxes, grid, entities, gas, tick loop)
//! - `config`: Startup parameters, loaded once per process
//! - `server`: Self-throttling game loop and the matchmaking directory
//! - `error`: Error taxonomy shared by every layer

pub mod config;
pub mod error;
pub mod server;
pub mod sim;

pub use config::{Config, GasMode, SpawnMode};
pub use error::{ConfigError, SendError, SimError};

use glam::Vec2;

/// Quarter-turn orientation (0..=3) used by obstacles, buildings and hitbox transforms
pub type Orientation = u8;

/// Game configuration constants
pub mod consts {
    /// Simulation rate
    pub const TICKS_PER_SECOND: u32 = 30;
    /// Target duration of one tick in milliseconds
    pub const TICK_INTERVAL_MS: u64 = 1000 / TICKS_PER_SECOND as u64;

    /// Side length of one spatial grid cell
    pub const GRID_CELL_SIZE: f32 = 32.0;

    /// Player collider
    pub const PLAYER_RADIUS: f32 = 2.25;
    /// Base movement speed (units/second), overridable from config
    pub const DEFAULT_MOVEMENT_SPEED: f32 = 28.0;
    /// Relaxation passes when pushing a player out of overlapping obstacles
    pub const COLLISION_PASSES: usize = 10;
    /// Spawn protection window
    pub const INVULNERABILITY_MS: u64 = 5000;
    /// Radius inside which doors can be toggled
    pub const DOOR_INTERACT_RADIUS: f32 = 3.5;

    /// Adrenaline bounds and drain
    pub const MIN_ADRENALINE: f32 = 0.0;
    pub const MAX_ADRENALINE: f32 = 100.0;
    pub const ADRENALINE_DRAIN_PER_SEC: f32 = 0.5;

    /// Health regen tiers: (adrenaline threshold, health per second), highest first
    pub const REGEN_TIERS: [(f32, f32); 4] = [(87.5, 3.05), (50.0, 2.36), (25.0, 1.25), (0.0, 0.69)];

    /// Recompute a client's visible set at least this often
    pub const VISIBILITY_REFRESH_TICKS: u32 = 8;
    /// Gas applies damage once every this many ticks
    pub const GAS_DAMAGE_INTERVAL_TICKS: u32 = 30;

    /// Reflective bounce budget for one bullet chain
    pub const MAX_BULLET_REFLECTIONS: u8 = 3;
    /// Angular step of explosion rays (radians)
    pub const EXPLOSION_RAY_STEP: f32 = 0.1;

    /// Loot velocity drag (1/second)
    pub const LOOT_DRAG: f32 = 3.0;
    /// Below this speed loot is considered resting
    pub const LOOT_REST_SPEED: f32 = 0.01;

    /// Delay between the last survivor and teardown
    pub const GAME_TEARDOWN_DELAY_MS: u64 = 1000;

    /// Kill feed and emote buffers are per tick, but cap them anyway
    pub const MAX_EMOTES_PER_TICK: usize = 64;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid can round up to exactly TAU
    if wrapped >= PI { -PI } else { wrapped }
}

/// Angle of the vector pointing from `from` to `to`
#[inline]
pub fn angle_between(from: Vec2, to: Vec2) -> f32 {
    let d = to - from;
    d.y.atan2(d.x)
}

/// Linear interpolation between two scalars
#[inline]
pub fn lerp(start: f32, end: f32, t: f32) -> f32 {
    start + (end - start) * t
}

/// Rotate a local offset by a quarter-turn orientation.
///
/// Orientation 1 maps (x, y) to (y, -x); each further step applies it again.
#[inline]
pub fn rotate_orientation(v: Vec2, orientation: Orientation) -> Vec2 {
    match orientation % 4 {
        0 => v,
        1 => Vec2::new(v.y, -v.x),
        2 => Vec2::new(-v.x, -v.y),
        _ => Vec2::new(-v.y, v.x),
    }
}

/// Undo [`rotate_orientation`]
#[inline]
pub fn unrotate_orientation(v: Vec2, orientation: Orientation) -> Vec2 {
    rotate_orientation(v, (4 - orientation % 4) % 4)
}

/// Place a local offset relative to an anchor with the anchor's orientation
#[inline]
pub fn add_adjust(anchor: Vec2, offset: Vec2, orientation: Orientation) -> Vec2 {
    anchor + rotate_orientation(offset, orientation)
}

/// Rotation angle (radians) that corresponds to an orientation
#[inline]
pub fn orientation_to_rotation(orientation: Orientation) -> f32 {
    -((orientation % 4) as f32) * std::f32::consts::FRAC_PI_2
}
