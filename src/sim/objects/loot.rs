//! Loot lying on the ground

use glam::Vec2;

use crate::consts::{LOOT_DRAG, LOOT_REST_SPEED};
use crate::sim::catalog::ItemDef;
use crate::sim::hitbox::Hitbox;
use crate::sim::ids::ObjectId;

#[derive(Debug, Clone)]
pub struct Loot {
    pub id: ObjectId,
    pub item: ItemDef,
    pub count: u32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
}

impl Loot {
    pub fn new(id: ObjectId, item: ItemDef, count: u32, position: Vec2) -> Self {
        Self {
            id,
            radius: item.loot_radius(),
            item,
            count,
            position,
            velocity: Vec2::ZERO,
        }
    }

    pub fn hitbox(&self) -> Hitbox {
        Hitbox::circle(self.radius, self.position)
    }

    /// Add an impulse of `speed` units/second along `angle`
    pub fn push(&mut self, angle: f32, speed: f32) {
        self.velocity += Vec2::from_angle(angle) * speed;
    }

    pub fn is_moving(&self) -> bool {
        self.velocity != Vec2::ZERO
    }

    /// Advance by `dt` seconds and bleed off speed. Collision is left to the
    /// caller.
    pub fn integrate(&mut self, dt: f32) {
        self.position += self.velocity * dt;
        self.velocity *= (1.0 - LOOT_DRAG * dt).max(0.0);
        if self.velocity.length() < LOOT_REST_SPEED {
            self.velocity = Vec2::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::catalog::Catalog;

    #[test]
    fn test_pushed_loot_comes_to_rest() {
        let catalog = Catalog::builtin().unwrap();
        let mut loot = Loot::new(ObjectId(1), catalog.item("gauze").unwrap(), 5, Vec2::ZERO);
        loot.push(0.0, 20.0);
        let mut ticks = 0;
        while loot.is_moving() {
            loot.integrate(1.0 / 30.0);
            ticks += 1;
            assert!(ticks < 1000, "loot never stopped");
        }
        assert!(loot.position.x > 0.0);
        assert!(loot.position.y.abs() < 1e-4);
    }
}
