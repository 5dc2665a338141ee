//! Map generation and spawn placement
//!
//! Buildings go down first so obstacles and loot can avoid them. Every
//! placement is rejection-sampled against the spawn hitboxes already in the
//! grid and against water.

use std::f32::consts::TAU;
use std::sync::Arc;

use glam::Vec2;
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

use super::Game;
use super::catalog::{BuildingDef, ObstacleDef, RotationMode};
use super::hitbox::Hitbox;
use super::objects::ObjectKind;
use crate::config::SpawnMode;
use crate::consts::PLAYER_RADIUS;
use crate::error::SimError;
use crate::{Orientation, orientation_to_rotation};

const PLACEMENT_ATTEMPTS: usize = 200;
/// Preferred gap between a new player and everyone already alive
const MIN_SPAWN_DISTANCE: f32 = 64.0;

impl Game {
    pub(crate) fn generate_map(&mut self) -> Result<(), SimError> {
        let map = Arc::clone(&self.map);

        for placement in &map.buildings {
            let def = self.catalog.building(&placement.id)?;
            for _ in 0..placement.count {
                match self.find_building_position(&def) {
                    Some((position, orientation)) => {
                        self.spawn_building(Arc::clone(&def), position, orientation)?;
                    }
                    None => log::warn!("No room for building '{}'", def.id),
                }
            }
        }

        for placement in &map.obstacles {
            let def = self.catalog.obstacle(&placement.id)?;
            for _ in 0..placement.count {
                let (rotation, orientation) = self.random_rotation(def.rotation_mode);
                let scale = self.rng.random_range(def.scale.spawn_min..=def.scale.spawn_max);
                match self.find_obstacle_position(&def, orientation, scale) {
                    Some(position) => {
                        self.spawn_obstacle(Arc::clone(&def), position, rotation, orientation, scale)?;
                    }
                    None => log::warn!("No room for obstacle '{}'", def.id),
                }
            }
        }

        for placement in &map.loot {
            for _ in 0..placement.count {
                let position = self.random_land_position(|_, _| true);
                self.spawn_loot_table(&placement.id, position)?;
            }
        }

        // Generation is not a change clients need to hear about separately
        self.full_dirty.clear();
        self.world_changed = false;
        Ok(())
    }

    /// Roll a loot table and spawn what comes up at `position`
    pub(crate) fn spawn_loot_table(&mut self, table_id: &str, position: Vec2) -> Result<(), SimError> {
        let table = self.catalog.loot_table(table_id)?;
        let Ok(weights) = WeightedIndex::new(table.entries.iter().map(|e| e.weight)) else {
            log::warn!("Loot table '{}' has no usable weights", table.id);
            return Ok(());
        };
        for _ in 0..table.rolls {
            let entry = &table.entries[weights.sample(&mut self.rng)];
            if let Some(item_id) = &entry.item {
                let item = self.catalog.item(item_id)?;
                self.drop_item(item, entry.count, position)?;
            }
        }
        Ok(())
    }

    fn random_rotation(&mut self, mode: RotationMode) -> (f32, Orientation) {
        match mode {
            RotationMode::Full => (self.rng.random_range(0.0..TAU), 0),
            RotationMode::Limited => {
                let o = self.rng.random_range(0..4u8);
                (orientation_to_rotation(o), o)
            }
            RotationMode::Binary => {
                let o = self.rng.random_range(0..2u8);
                (orientation_to_rotation(o), o)
            }
            RotationMode::None => (0.0, 0),
        }
    }

    /// Whether `hitbox` overlaps the spawn area of anything already placed
    fn spawn_area_taken(&self, hitbox: &Hitbox) -> bool {
        self.grid.intersects_hitbox(hitbox).into_iter().any(|id| {
            let other = match self.kinds.get(&id) {
                Some(ObjectKind::Obstacle) => self.obstacles.get(&id).map(|o| &o.spawn_hitbox),
                Some(ObjectKind::Building) => self.buildings.get(&id).map(|b| &b.spawn_hitbox),
                _ => None,
            };
            other.is_some_and(|other| other.collides_with(hitbox))
        })
    }

    fn find_building_position(&mut self, def: &BuildingDef) -> Option<(Vec2, Orientation)> {
        for _ in 0..PLACEMENT_ATTEMPTS {
            let orientation = self.rng.random_range(0..4u8);
            let position = self.terrain.grass.random_point(&mut self.rng);
            let hitbox = def.spawn_hitbox.transform(position, 1.0, orientation);
            let (min, max) = hitbox.bounds();
            let on_map = min.cmpge(Vec2::ZERO).all() && max.cmple(Vec2::new(self.width, self.height)).all();
            let dry = ![min, max, Vec2::new(min.x, max.y), Vec2::new(max.x, min.y), position]
                .into_iter()
                .any(|p| self.terrain.is_water(p));
            if on_map && dry && !self.spawn_area_taken(&hitbox) {
                return Some((position, orientation));
            }
        }
        None
    }

    fn find_obstacle_position(&mut self, def: &ObstacleDef, orientation: Orientation, scale: f32) -> Option<Vec2> {
        let template = def.spawn_hitbox.as_ref().unwrap_or(&def.hitbox);
        for _ in 0..PLACEMENT_ATTEMPTS {
            let position = self.terrain.beach.random_point(&mut self.rng);
            if def.avoid_water && self.terrain.is_water(position) {
                continue;
            }
            let hitbox = template.transform(position, scale, orientation);
            if !self.spawn_area_taken(&hitbox) {
                return Some(position);
            }
        }
        None
    }

    /// Random dry point on the grass that passes `accept`
    fn random_land_position(&mut self, accept: impl Fn(&Game, Vec2) -> bool) -> Vec2 {
        let mut position = Vec2::new(self.width, self.height) / 2.0;
        for _ in 0..PLACEMENT_ATTEMPTS {
            position = self.terrain.grass.random_point(&mut self.rng);
            if !self.terrain.is_water(position) && accept(self, position) {
                break;
            }
        }
        position
    }

    /// Where a joining player appears
    pub(crate) fn spawn_position(&mut self) -> Vec2 {
        let spawn = self.config.spawn;
        match spawn {
            SpawnMode::Fixed { position } => position,
            SpawnMode::Center => Vec2::new(self.width, self.height) / 2.0,
            SpawnMode::Radius { position, radius } => Hitbox::circle(radius, position).random_point(&mut self.rng),
            SpawnMode::Random => self.random_land_position(|game, p| {
                !game.spawn_area_taken(&Hitbox::circle(PLAYER_RADIUS, p))
            }),
            SpawnMode::Normal => self.random_land_position(|game, p| {
                !game.spawn_area_taken(&Hitbox::circle(PLAYER_RADIUS, p))
                    && game.living.iter().all(|id| {
                        game.players
                            .get(id)
                            .is_none_or(|other| other.position.distance(p) >= MIN_SPAWN_DISTANCE)
                    })
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sim::catalog::Catalog;

    fn game_on(map: &str, seed: u64) -> Game {
        let config = Config {
            map: map.to_string(),
            seed: Some(seed),
            min_players_to_start: 99,
            ..Config::default()
        };
        Game::new(1, Arc::new(config), Arc::new(Catalog::builtin().unwrap())).unwrap()
    }

    #[test]
    fn test_generated_spawn_areas_do_not_overlap() {
        let game = game_on("main", 7);
        assert!(!game.buildings.is_empty());
        let standalone: Vec<_> = game
            .obstacles
            .values()
            .filter(|o| o.parent_building.is_none())
            .collect();
        assert!(!standalone.is_empty());
        for building in game.buildings.values() {
            for obstacle in &standalone {
                assert!(
                    !building.spawn_hitbox.collides_with(&obstacle.spawn_hitbox),
                    "{} placed inside building {}",
                    obstacle.def.id,
                    building.id
                );
            }
        }
        assert!(!game.loot.is_empty());
        assert!(game.full_dirty.is_empty());
    }

    #[test]
    fn test_same_seed_same_map() {
        let a = game_on("arena", 3);
        let b = game_on("arena", 3);
        let layout = |g: &Game| {
            g.obstacles
                .values()
                .map(|o| (o.def.id.clone(), o.position))
                .collect::<Vec<_>>()
        };
        assert_eq!(layout(&a), layout(&b));
    }

    #[test]
    fn test_fixed_and_center_spawns() {
        let mut game = game_on("debug", 1);
        let mut config = (*game.config).clone();
        config.spawn = SpawnMode::Fixed {
            position: Vec2::new(5.0, 6.0),
        };
        game.config = Arc::new(config.clone());
        assert_eq!(game.spawn_position(), Vec2::new(5.0, 6.0));
        config.spawn = SpawnMode::Center;
        game.config = Arc::new(config);
        assert_eq!(game.spawn_position(), Vec2::splat(128.0));
    }

    #[test]
    fn test_radius_spawn_stays_inside() {
        let mut game = game_on("debug", 1);
        let mut config = (*game.config).clone();
        config.spawn = SpawnMode::Radius {
            position: Vec2::splat(100.0),
            radius: 10.0,
        };
        game.config = Arc::new(config);
        for _ in 0..50 {
            assert!(game.spawn_position().distance(Vec2::splat(100.0)) <= 10.0);
        }
    }
}
