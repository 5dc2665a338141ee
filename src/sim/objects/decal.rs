//! Cosmetic objects: decals and synced particles
//!
//! Neither collides with anything. Particles are sent once in full; clients
//! simulate the motion themselves and the server only tracks it so late
//! viewers get a matching position.

use glam::Vec2;

use crate::sim::hitbox::Hitbox;
use crate::sim::ids::ObjectId;

/// Visibility radius for cosmetic objects
const COSMETIC_RADIUS: f32 = 3.0;
/// Particle velocity drag (1/second)
const PARTICLE_DRAG: f32 = 1.5;

#[derive(Debug, Clone)]
pub struct Decal {
    pub id: ObjectId,
    pub definition: String,
    pub position: Vec2,
    pub rotation: f32,
}

impl Decal {
    pub fn hitbox(&self) -> Hitbox {
        Hitbox::circle(COSMETIC_RADIUS, self.position)
    }
}

#[derive(Debug, Clone)]
pub struct SyncedParticle {
    pub id: ObjectId,
    pub definition: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub spawned_at: u64,
    pub lifetime_ms: u64,
}

impl SyncedParticle {
    pub fn hitbox(&self) -> Hitbox {
        Hitbox::circle(COSMETIC_RADIUS, self.position)
    }

    pub fn update(&mut self, dt: f32) {
        self.position += self.velocity * dt;
        self.velocity *= (1.0 - PARTICLE_DRAG * dt).max(0.0);
    }

    pub fn expired(&self, now: u64) -> bool {
        now >= self.spawned_at + self.lifetime_ms
    }
}
