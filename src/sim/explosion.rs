//! Radial explosions
//!
//! Rays are cast from the center at a fixed angular step. Along each ray
//! the hits are walked nearest first: every player and obstacle on the ray
//! is damaged once, and the ray stops at the first collidable obstacle so
//! walls shelter what is behind them.

use std::collections::BTreeSet;
use std::f32::consts::TAU;
use std::sync::Arc;

use glam::Vec2;
use rand::Rng;

use super::Game;
use super::catalog::ExplosionDef;
use super::damage::DamageRecord;
use super::hitbox::Hitbox;
use super::ids::ObjectId;
use super::objects::ObjectKind;
use super::snapshot::ExplosionSnapshot;
use crate::angle_between;
use crate::consts::EXPLOSION_RAY_STEP;
use crate::error::SimError;

/// An explosion waiting for the explosion stage of the tick
#[derive(Debug, Clone)]
pub struct PendingExplosion {
    pub def: Arc<ExplosionDef>,
    pub position: Vec2,
    pub source: Option<ObjectId>,
    pub weapon: Option<String>,
}

/// Damage at `distance` from the center: full inside `min`, linear to zero at `max`
pub fn falloff(def: &ExplosionDef, distance: f32) -> f32 {
    let (min, max) = (def.radius.min, def.radius.max);
    if distance <= min {
        def.damage
    } else if distance >= max || max <= min {
        0.0
    } else {
        def.damage * (max - distance) / (max - min)
    }
}

impl Game {
    pub fn queue_explosion(
        &mut self,
        id: &str,
        position: Vec2,
        source: Option<ObjectId>,
        weapon: Option<String>,
    ) -> Result<(), SimError> {
        let def = self.catalog.explosion(id)?;
        self.pending_explosions.push(PendingExplosion {
            def,
            position,
            source,
            weapon,
        });
        Ok(())
    }

    /// Resolve queued explosions, including any they chain into
    pub(crate) fn process_explosions(&mut self) -> Result<(), SimError> {
        while !self.pending_explosions.is_empty() {
            let batch = std::mem::take(&mut self.pending_explosions);
            for explosion in batch {
                self.explode(explosion)?;
            }
        }
        Ok(())
    }

    /// Records for everything the explosion's rays reach
    pub fn explosion_hits(&self, explosion: &PendingExplosion) -> Vec<DamageRecord> {
        let def = &explosion.def;
        let center = explosion.position;
        let area = Hitbox::circle(def.radius.max, center);

        // (id, hitbox, blocks rays)
        let candidates: Vec<(ObjectId, Hitbox, bool)> = self
            .grid
            .intersects_hitbox(&area)
            .into_iter()
            .filter_map(|id| match self.kinds.get(&id)? {
                ObjectKind::Player => {
                    let p = self.players.get(&id)?;
                    (!p.dead).then(|| (id, p.hitbox(), false))
                }
                ObjectKind::Obstacle => {
                    let o = self.obstacles.get(&id)?;
                    (!o.dead).then(|| (id, o.hitbox.clone(), o.collidable))
                }
                _ => None,
            })
            .collect();

        let mut damaged = BTreeSet::new();
        let mut records = Vec::new();
        let rays = (TAU / EXPLOSION_RAY_STEP).ceil() as usize;
        for i in 0..rays {
            let end = center + Vec2::from_angle(i as f32 * EXPLOSION_RAY_STEP) * def.radius.max;
            let mut hits: Vec<(f32, ObjectId, bool)> = candidates
                .iter()
                .filter_map(|(id, hitbox, blocks)| {
                    let distance = if hitbox.contains_point(center) {
                        0.0
                    } else {
                        hitbox.intersects_line(center, end)?.point.distance(center)
                    };
                    Some((distance, *id, *blocks))
                })
                .collect();
            hits.sort_by(|a, b| a.0.total_cmp(&b.0));

            for (distance, id, blocks) in hits {
                if damaged.insert(id) {
                    let mut amount = falloff(def, distance);
                    if self.kinds.get(&id) == Some(&ObjectKind::Obstacle) {
                        amount *= def.obstacle_multiplier;
                    }
                    if amount > 0.0 {
                        records.push(DamageRecord {
                            target: id,
                            source: explosion.source,
                            weapon: explosion.weapon.clone().or_else(|| Some(def.id.clone())),
                            amount,
                            piercing: false,
                        });
                    }
                }
                if blocks {
                    break;
                }
            }
        }
        records
    }

    fn explode(&mut self, explosion: PendingExplosion) -> Result<(), SimError> {
        let def = Arc::clone(&explosion.def);
        let center = explosion.position;

        for record in self.explosion_hits(&explosion) {
            self.apply_damage(record)?;
        }

        let area = Hitbox::circle(def.radius.max, center);
        let pushed: Vec<ObjectId> = self
            .grid
            .intersects_hitbox(&area)
            .into_iter()
            .filter(|id| self.loot.get(id).is_some_and(|l| l.position.distance(center) < def.radius.max))
            .collect();
        for id in pushed {
            if let Some(loot) = self.loot.get_mut(&id) {
                let distance = loot.position.distance(center);
                let angle = if distance > 0.0 {
                    angle_between(center, loot.position)
                } else {
                    self.rng.random_range(0.0..TAU)
                };
                loot.push(angle, def.loot_push * (1.0 - distance / def.radius.max));
            }
        }

        if let Some(decal) = &def.decal {
            let rotation = self.rng.random_range(0.0..TAU);
            self.spawn_decal(decal, center, rotation)?;
        }
        if let Some(particles) = &def.particles {
            for _ in 0..particles.count {
                let angle = self.rng.random_range(0.0..TAU);
                let speed = particles.speed * self.rng.random_range(0.5f32..1.0);
                self.spawn_particle(
                    &particles.id,
                    center,
                    Vec2::from_angle(angle) * speed,
                    particles.lifetime_ms,
                )?;
            }
        }

        self.explosions.push(ExplosionSnapshot {
            definition: def.id.clone(),
            position: center,
        });
        log::debug!("Game {}: explosion {} at {}", self.id, def.id, center);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::tests::{join_at, test_game};

    fn def(game: &Game) -> Arc<ExplosionDef> {
        game.catalog.explosion("barrel_explosion").unwrap()
    }

    #[test]
    fn test_falloff_is_linear_between_radii() {
        let game = test_game();
        let d = def(&game);
        assert_eq!(falloff(&d, 0.0), d.damage);
        assert_eq!(falloff(&d, d.radius.min), d.damage);
        let mid = (d.radius.min + d.radius.max) / 2.0;
        assert!((falloff(&d, mid) - d.damage / 2.0).abs() < 1e-3);
        assert_eq!(falloff(&d, d.radius.max), 0.0);
    }

    #[test]
    fn test_each_target_damaged_once() {
        let mut game = test_game();
        let (id, _rx) = join_at(&mut game, "a", Vec2::new(105.0, 100.0));
        let explosion = PendingExplosion {
            def: def(&game),
            position: Vec2::splat(100.0),
            source: None,
            weapon: None,
        };
        let records = game.explosion_hits(&explosion);
        assert_eq!(records.iter().filter(|r| r.target == id).count(), 1);
    }

    #[test]
    fn test_wall_shelters_player_behind_it() {
        let mut game = test_game();
        let wall = game.catalog.obstacle("metal_wall").unwrap();
        // 20 wide, 2 thick, between the blast and the player
        game.spawn_obstacle(wall, Vec2::new(100.0, 104.0), 0.0, 0, 1.0)
            .unwrap();
        let (hidden, _rx1) = join_at(&mut game, "hidden", Vec2::new(100.0, 108.0));
        let (exposed, _rx2) = join_at(&mut game, "exposed", Vec2::new(100.0, 94.0));
        let explosion = PendingExplosion {
            def: def(&game),
            position: Vec2::splat(100.0),
            source: None,
            weapon: None,
        };
        let records = game.explosion_hits(&explosion);
        assert!(records.iter().any(|r| r.target == exposed));
        assert!(!records.iter().any(|r| r.target == hidden));
    }

    #[test]
    fn test_explosion_pushes_loot_and_leaves_decal() {
        let mut game = test_game();
        let item = game.catalog.item("gauze").unwrap();
        let loot = game.spawn_loot(item, 1, Vec2::new(110.0, 100.0)).unwrap();
        game.queue_explosion("barrel_explosion", Vec2::splat(100.0), None, None)
            .unwrap();
        game.process_explosions().unwrap();
        assert!(game.loot[&loot].velocity.x > 0.0);
        assert_eq!(game.explosions.len(), 1);
        assert!(!game.decals.is_empty());
        assert!(!game.particles.is_empty());
    }

    #[test]
    fn test_barrels_chain() {
        let mut game = test_game();
        let barrel = game.catalog.obstacle("barrel").unwrap();
        let a = game
            .spawn_obstacle(Arc::clone(&barrel), Vec2::splat(100.0), 0.0, 0, 1.0)
            .unwrap();
        let b = game
            .spawn_obstacle(barrel, Vec2::new(110.0, 100.0), 0.0, 0, 1.0)
            .unwrap();
        let health = game.obstacles[&a].health;
        game.damage_obstacle(a, health, None, false).unwrap();
        game.process_explosions().unwrap();
        assert!(game.obstacles[&b].dead);
        assert_eq!(game.explosions.len(), 2);
    }
}
