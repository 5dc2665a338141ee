//! Bullets
//!
//! A bullet is a ray segment advanced once per tick. Each update sweeps the
//! segment from the last position to the next one, walks every hit along it
//! nearest first and turns them into damage records. Nothing is applied
//! here; the tick applies all records after every bullet has moved.

use std::collections::BTreeSet;
use std::sync::Arc;

use glam::Vec2;

use super::Game;
use super::catalog::GunDef;
use super::collision::reflect_velocity;
use super::damage::DamageRecord;
use super::hitbox::Hitbox;
use super::ids::ObjectId;
use super::objects::ObjectKind;
use super::snapshot::BulletSnapshot;
use crate::consts::MAX_BULLET_REFLECTIONS;
use crate::error::SimError;

/// Nudge applied to a reflected bullet so it starts clear of the surface
const REFLECTION_OFFSET: f32 = 0.05;

#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: u16,
    pub source: ObjectId,
    pub gun: Arc<GunDef>,
    pub initial_position: Vec2,
    pub position: Vec2,
    pub rotation: f32,
    pub velocity: Vec2,
    /// Range left when this segment of the chain was fired
    pub max_distance: f32,
    pub reflection_count: u8,
    /// Obstacle this bullet bounced off, ignored for the rest of its flight
    pub reflected_from: Option<ObjectId>,
    /// Objects already hit; penetrating bullets never hit twice
    pub damaged: BTreeSet<ObjectId>,
    pub dead: bool,
}

/// Bounce off a reflective obstacle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reflection {
    pub position: Vec2,
    pub rotation: f32,
    pub obstacle: ObjectId,
}

/// Outcome of one bullet update
#[derive(Debug, Default)]
pub struct BulletStep {
    pub records: Vec<DamageRecord>,
    pub reflection: Option<Reflection>,
    /// Where the on-hit explosion goes off, if the bullet carries one and died
    pub explosion: Option<Vec2>,
}

struct Hit {
    distance: f32,
    id: ObjectId,
    kind: ObjectKind,
    point: Vec2,
    normal: Vec2,
}

impl Bullet {
    pub fn new(id: u16, source: ObjectId, gun: Arc<GunDef>, position: Vec2, rotation: f32) -> Self {
        let range = gun.bullet.range;
        Self {
            id,
            source,
            initial_position: position,
            position,
            rotation,
            velocity: Vec2::from_angle(rotation) * gun.bullet.speed,
            max_distance: range,
            reflection_count: 0,
            reflected_from: None,
            damaged: BTreeSet::new(),
            dead: false,
            gun,
        }
    }

    /// Continue the chain from a bounce with whatever range is left
    fn reflected(&self, id: u16, reflection: Reflection) -> Self {
        let travelled = self.initial_position.distance(reflection.position);
        let direction = Vec2::from_angle(reflection.rotation);
        let start = reflection.position + direction * REFLECTION_OFFSET;
        Self {
            id,
            source: self.source,
            gun: Arc::clone(&self.gun),
            initial_position: start,
            position: start,
            rotation: reflection.rotation,
            velocity: direction * self.gun.bullet.speed,
            max_distance: (self.max_distance - travelled).max(0.0),
            reflection_count: self.reflection_count + 1,
            reflected_from: Some(reflection.obstacle),
            damaged: BTreeSet::new(),
            dead: false,
        }
    }

    pub fn snapshot(&self) -> BulletSnapshot {
        BulletSnapshot {
            id: self.id,
            source: self.source,
            definition: self.gun.id.clone(),
            position: self.initial_position,
            rotation: self.rotation,
            reflection_count: self.reflection_count,
        }
    }

    fn hits_along(&self, game: &Game, from: Vec2, to: Vec2) -> Vec<Hit> {
        let mut hits: Vec<Hit> = game
            .grid
            .intersects_hitbox(&Hitbox::from_line(from, to))
            .into_iter()
            .filter(|id| !self.damaged.contains(id) && Some(*id) != self.reflected_from)
            .filter_map(|id| {
                let kind = *game.kinds.get(&id)?;
                let hitbox = match kind {
                    ObjectKind::Player => {
                        let player = game.players.get(&id)?;
                        // The shooter is only hittable by its own bounced bullets
                        if player.dead || (id == self.source && self.reflection_count == 0) {
                            return None;
                        }
                        player.hitbox()
                    }
                    ObjectKind::Obstacle => {
                        let obstacle = game.obstacles.get(&id)?;
                        if obstacle.dead || !obstacle.collidable {
                            return None;
                        }
                        obstacle.hitbox.clone()
                    }
                    _ => return None,
                };
                let hit = hitbox.intersects_line(from, to)?;
                Some(Hit {
                    distance: from.distance_squared(hit.point),
                    id,
                    kind,
                    point: hit.point,
                    normal: hit.normal,
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    /// Advance by `dt` seconds against the current world
    pub fn update(&mut self, game: &Game, dt: f32) -> BulletStep {
        let mut step = BulletStep::default();
        if self.dead {
            return step;
        }
        let def = &self.gun.bullet;
        let from = self.position;
        let direction = Vec2::from_angle(self.rotation);
        let mut to = from + self.velocity * dt;
        let mut range_spent = false;
        if to.distance(self.initial_position) >= self.max_distance {
            to = self.initial_position + direction * self.max_distance;
            range_spent = true;
        }

        let damage = def.damage / f32::from(self.reflection_count + 1);
        let mut end = to;
        for hit in self.hits_along(game, from, to) {
            self.damaged.insert(hit.id);
            match hit.kind {
                ObjectKind::Player => {
                    step.records.push(DamageRecord {
                        target: hit.id,
                        source: Some(self.source),
                        weapon: Some(self.gun.id.clone()),
                        amount: damage,
                        piercing: def.piercing,
                    });
                    if !def.penetration.players {
                        self.dead = true;
                        end = hit.point;
                        break;
                    }
                }
                _ => {
                    step.records.push(DamageRecord {
                        target: hit.id,
                        source: Some(self.source),
                        weapon: Some(self.gun.id.clone()),
                        amount: damage * def.obstacle_multiplier,
                        piercing: def.piercing,
                    });
                    let reflects = game
                        .obstacles
                        .get(&hit.id)
                        .is_some_and(|o| o.def.reflects_bullets());
                    if reflects && !def.no_reflect {
                        self.dead = true;
                        end = hit.point;
                        if self.reflection_count < MAX_BULLET_REFLECTIONS {
                            let bounced = if hit.normal == Vec2::ZERO {
                                -direction
                            } else {
                                reflect_velocity(direction, hit.normal)
                            };
                            step.reflection = Some(Reflection {
                                position: hit.point,
                                rotation: bounced.y.atan2(bounced.x),
                                obstacle: hit.id,
                            });
                        }
                        break;
                    }
                    if !def.penetration.obstacles {
                        self.dead = true;
                        end = hit.point;
                        break;
                    }
                }
            }
        }

        self.position = end;
        if !self.dead {
            let inside = end.cmpge(Vec2::ZERO).all() && end.cmple(Vec2::new(game.width, game.height)).all();
            if range_spent || !inside {
                self.dead = true;
            }
        }
        if self.dead && def.on_hit_explosion.is_some() {
            step.explosion = Some(self.position);
        }
        step
    }
}

impl Game {
    /// Fire a bullet and announce it to clients this tick
    pub fn spawn_bullet(&mut self, source: ObjectId, gun: Arc<GunDef>, position: Vec2, rotation: f32) {
        let bullet = Bullet::new(self.next_bullet_id(), source, gun, position, rotation);
        self.new_bullets.push(bullet.snapshot());
        self.bullets.push(bullet);
    }

    /// Move every bullet, collect its damage records, chain reflections and
    /// queue on-hit explosions
    pub(crate) fn update_bullets(&mut self) -> Result<(), SimError> {
        let dt = self.dt();
        let mut bullets = std::mem::take(&mut self.bullets);
        let mut reflected = Vec::new();
        for bullet in &mut bullets {
            let step = bullet.update(self, dt);
            self.damage_records.extend(step.records);
            if let (Some(position), Some(explosion)) = (step.explosion, &bullet.gun.bullet.on_hit_explosion) {
                self.queue_explosion(explosion, position, Some(bullet.source), Some(bullet.gun.id.clone()))?;
            }
            if let Some(reflection) = step.reflection {
                reflected.push(bullet.reflected(self.next_bullet_id(), reflection));
            }
        }
        bullets.retain(|b| !b.dead);
        for bullet in reflected {
            self.new_bullets.push(bullet.snapshot());
            bullets.push(bullet);
        }
        self.bullets = bullets;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::tests::{join_at, test_game};
    use proptest::prelude::*;

    fn gun_with(game: &Game, id: &str, edit: impl FnOnce(&mut GunDef)) -> Arc<GunDef> {
        let mut gun = (*game.catalog.gun(id).unwrap()).clone();
        edit(&mut gun);
        Arc::new(gun)
    }

    #[test]
    fn test_bullet_stops_at_first_player() {
        let mut game = test_game();
        let (a, _rx_a) = join_at(&mut game, "a", Vec2::new(100.0, 100.0));
        let (b, _rx_b) = join_at(&mut game, "b", Vec2::new(105.0, 100.0));
        for id in [a, b] {
            game.players.get_mut(&id).unwrap().radius = 1.0;
        }
        let gun = gun_with(&game, "g19", |g| g.bullet.speed = 300.0);
        let mut bullet = Bullet::new(0, a, gun, Vec2::new(100.0, 100.0), 0.0);
        let dt = game.dt();
        let step = bullet.update(&game, dt);
        assert_eq!(step.records.len(), 1);
        assert_eq!(step.records[0].target, b);
        assert!(bullet.dead);
        assert!((bullet.position.x - 104.0).abs() < 1e-3);
    }

    #[test]
    fn test_penetrating_bullet_hits_each_player_once() {
        let mut game = test_game();
        let (a, _r1) = join_at(&mut game, "a", Vec2::new(100.0, 100.0));
        let (b, _r2) = join_at(&mut game, "b", Vec2::new(106.0, 100.0));
        let (c, _r3) = join_at(&mut game, "c", Vec2::new(112.0, 100.0));
        let gun = gun_with(&game, "mosin", |g| g.bullet.speed = 600.0);
        assert!(gun.bullet.penetration.players);
        let mut bullet = Bullet::new(0, a, gun, Vec2::new(100.0, 100.0), 0.0);
        let dt = game.dt();
        let first = bullet.update(&game, dt);
        let targets: Vec<_> = first.records.iter().map(|r| r.target).collect();
        assert_eq!(targets, vec![b, c]);
        assert!(!bullet.dead);
        let second = bullet.update(&game, dt);
        assert!(second.records.is_empty());
    }

    #[test]
    fn test_range_limits_travel() {
        let mut game = test_game();
        let gun = gun_with(&game, "hp18", |_| {});
        game.spawn_bullet(ObjectId(9000), gun, Vec2::new(20.0, 128.0), 0.0);
        assert_eq!(game.new_bullets.len(), 1);
        for _ in 0..30 {
            game.update_bullets().unwrap();
        }
        assert!(game.bullets.is_empty());
    }

    #[test]
    fn test_metal_reflects_with_reduced_damage() {
        let mut game = test_game();
        let wall = game.catalog.obstacle("metal_wall").unwrap();
        // Rotated a quarter turn: 2 wide, 20 tall, face at x = 109
        let id = game
            .spawn_obstacle(wall, Vec2::new(110.0, 100.0), 0.0, 1, 1.0)
            .unwrap();
        let gun = gun_with(&game, "g19", |_| {});
        game.spawn_bullet(ObjectId(9000), gun, Vec2::new(100.0, 100.0), 0.0);
        for _ in 0..3 {
            game.update_bullets().unwrap();
        }
        assert!(game.damage_records.iter().any(|r| r.target == id));
        let bounced = game.bullets.iter().find(|b| b.reflection_count == 1).unwrap();
        assert!(bounced.velocity.x < 0.0);
        assert_eq!(bounced.reflected_from, Some(id));
    }

    #[test]
    fn test_grenade_round_explodes_on_impact() {
        let mut game = test_game();
        let crate_def = game.catalog.obstacle("regular_crate").unwrap();
        game.spawn_obstacle(crate_def, Vec2::new(110.0, 100.0), 0.0, 0, 1.0)
            .unwrap();
        let gun = gun_with(&game, "m79", |_| {});
        game.spawn_bullet(ObjectId(9000), gun, Vec2::new(100.0, 100.0), 0.0);
        for _ in 0..5 {
            game.update_bullets().unwrap();
        }
        assert_eq!(game.pending_explosions.len(), 1);
        assert_eq!(game.pending_explosions[0].def.id, "m79_explosion");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn test_reflections_terminate_inside_metal_box(angle in 0.0f32..std::f32::consts::TAU) {
            let mut game = test_game();
            let wall = game.catalog.obstacle("metal_wall").unwrap();
            for (position, orientation) in [
                (Vec2::new(100.0, 90.0), 0),
                (Vec2::new(100.0, 110.0), 0),
                (Vec2::new(90.0, 100.0), 1),
                (Vec2::new(110.0, 100.0), 1),
            ] {
                game.spawn_obstacle(Arc::clone(&wall), position, 0.0, orientation, 1.0).unwrap();
            }
            let gun = game.catalog.gun("ak47").unwrap();
            game.spawn_bullet(ObjectId(9000), gun, Vec2::splat(100.0), angle);
            for _ in 0..200 {
                game.update_bullets().unwrap();
                for bullet in &game.bullets {
                    prop_assert!(bullet.reflection_count <= MAX_BULLET_REFLECTIONS);
                }
                if game.bullets.is_empty() {
                    break;
                }
            }
            prop_assert!(game.bullets.is_empty());
        }
    }
}
