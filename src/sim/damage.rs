//! Damage application
//!
//! Bullets only collect [`DamageRecord`]s while they march; the records are
//! applied together afterwards so every bullet of a tick sees the world as it
//! was before any of them landed. Explosions and melee apply directly.

use std::sync::Arc;

use glam::Vec2;

use super::Game;
use super::catalog::DEATH_MARKER_DECAL;
use super::events::GameEvent;
use super::explosion::PendingExplosion;
use super::ids::ObjectId;
use super::objects::ObjectKind;
use super::snapshot::{GameOverPacket, KillFeedEntry, ServerPacket};
use crate::error::SimError;
use crate::rotate_orientation;

/// One pending hit
#[derive(Debug, Clone, PartialEq)]
pub struct DamageRecord {
    pub target: ObjectId,
    pub source: Option<ObjectId>,
    /// Weapon definition id, for kill credit and the kill feed
    pub weapon: Option<String>,
    pub amount: f32,
    /// Ignores armor on players and impenetrability on obstacles
    pub piercing: bool,
}

impl Game {
    /// Apply every record collected this tick, in collection order
    pub(crate) fn apply_damage_records(&mut self) -> Result<(), SimError> {
        let records = std::mem::take(&mut self.damage_records);
        for record in records {
            self.apply_damage(record)?;
        }
        Ok(())
    }

    pub fn apply_damage(&mut self, record: DamageRecord) -> Result<(), SimError> {
        match self.kinds.get(&record.target) {
            Some(ObjectKind::Player) => self.damage_player(
                record.target,
                record.amount,
                record.source,
                record.weapon,
                record.piercing,
            ),
            Some(ObjectKind::Obstacle) => {
                self.damage_obstacle(record.target, record.amount, record.source, record.piercing)
            }
            // Buildings take no direct damage
            _ => Ok(()),
        }
    }

    /// Hurt a player. Armor absorbs a share unless `piercing`; invulnerable
    /// and dead players ignore it entirely.
    pub fn damage_player(
        &mut self,
        id: ObjectId,
        amount: f32,
        source: Option<ObjectId>,
        weapon: Option<String>,
        piercing: bool,
    ) -> Result<(), SimError> {
        let player = self.players.get(&id).ok_or(SimError::UnknownPlayer(id))?;
        if player.dead || player.invulnerable || amount <= 0.0 {
            return Ok(());
        }
        let amount = if piercing {
            amount
        } else {
            amount * (1.0 - player.inventory.damage_reduction())
        };

        let allowed = self.events.emit(&GameEvent::PlayerDamage {
            player: id,
            source,
            weapon: weapon.clone(),
            amount,
        });
        if !allowed {
            return Ok(());
        }

        let Some(player) = self.players.get_mut(&id) else {
            return Ok(());
        };
        let dealt = amount.min(player.health);
        player.set_health(player.health - amount);
        player.damage_taken += dealt;
        let dead = player.health <= 0.0;
        if let Some(attacker) = source.filter(|s| *s != id).and_then(|s| self.players.get_mut(&s)) {
            attacker.damage_done += dealt;
        }
        if dead {
            self.kill_player(id, source, weapon)?;
        }
        Ok(())
    }

    pub fn kill_player(
        &mut self,
        id: ObjectId,
        source: Option<ObjectId>,
        weapon: Option<String>,
    ) -> Result<(), SimError> {
        let player = self.players.get_mut(&id).ok_or(SimError::UnknownPlayer(id))?;
        if player.dead {
            return Ok(());
        }
        player.dead = true;
        player.attacking = false;
        player.set_health(0.0);
        let position = player.position;
        let name = player.name.clone();
        let joined_at = player.joined_at;

        self.cancel_player_timers(id);
        self.drop_inventory(id, position)?;
        let rotation = self.players.get(&id).map_or(0.0, |p| p.rotation);
        self.spawn_decal(DEATH_MARKER_DECAL, position, rotation)?;

        let killer = source.filter(|s| *s != id);
        let mut killer_name = None;
        if let Some(killer) = killer.and_then(|k| self.players.get_mut(&k)) {
            killer.kills += 1;
            killer_name = Some(killer.name.clone());
            if let Some(weapon) = &weapon {
                for slot in 0..super::inventory::SLOT_COUNT {
                    if let Ok(Some(item)) = killer.inventory.slot_mut(slot)
                        && item.id() == weapon
                    {
                        item.add_kill();
                        killer.dirty.weapons = true;
                        break;
                    }
                }
            }
        }
        self.kill_feed.push(KillFeedEntry {
            victim: id,
            victim_name: name.clone(),
            killer,
            killer_name,
            weapon: weapon.clone(),
        });

        self.grid.remove(id);
        self.living.remove(&id);
        self.full_dirty.remove(&id);
        self.partial_dirty.remove(&id);
        self.deleted.insert(id);
        self.world_changed = true;

        // The victim and whoever watched them follow the killer, or anyone left
        let mut watchers: Vec<ObjectId> = self
            .players
            .get_mut(&id)
            .map(|p| std::mem::take(&mut p.spectators).into_iter().collect())
            .unwrap_or_default();
        watchers.push(id);
        let target = killer
            .filter(|k| self.living.contains(k))
            .or_else(|| self.living.iter().next().copied());
        if let Some(target) = target {
            for watcher in watchers {
                self.spectate(watcher, target);
            }
        }

        if let Some(player) = self.players.get(&id) {
            let packet = ServerPacket::GameOver(GameOverPacket {
                player: id,
                won: false,
                rank: self.living.len() + 1,
                kills: player.kills,
                damage_done: player.damage_done,
                damage_taken: player.damage_taken,
                time_alive_ms: self.now.saturating_sub(joined_at),
            });
            self.send_packet(id, &packet);
        }

        self.events.emit(&GameEvent::PlayerKill {
            victim: id,
            killer,
            weapon: weapon.clone(),
        });
        log::info!(
            "Game {}: '{}' ({}) killed by {:?} with {:?}, {} alive",
            self.id,
            name,
            id,
            killer,
            weapon,
            self.living.len()
        );
        Ok(())
    }

    /// Hurt an obstacle; shrinks it or destroys it
    pub fn damage_obstacle(
        &mut self,
        id: ObjectId,
        amount: f32,
        source: Option<ObjectId>,
        piercing: bool,
    ) -> Result<(), SimError> {
        let Some(obstacle) = self.obstacles.get(&id) else {
            return Err(SimError::missing("obstacle object", id.to_string()));
        };
        if !obstacle.can_be_damaged(piercing) || amount <= 0.0 {
            return Ok(());
        }
        let allowed = self.events.emit(&GameEvent::ObstacleDamage {
            obstacle: id,
            source,
            amount,
        });
        if !allowed {
            return Ok(());
        }
        let destroyed = self
            .obstacles
            .get_mut(&id)
            .is_some_and(|o| o.apply_damage(amount));
        self.update_grid(id);
        self.mark_partial(id);
        if destroyed {
            self.destroy_obstacle(id, source)?;
        }
        Ok(())
    }

    /// Consequences of an obstacle reaching zero health
    fn destroy_obstacle(&mut self, id: ObjectId, source: Option<ObjectId>) -> Result<(), SimError> {
        let Some(obstacle) = self.obstacles.get(&id) else {
            return Ok(());
        };
        let def = Arc::clone(&obstacle.def);
        let position = obstacle.position;
        let loot_at = position + rotate_orientation(def.loot_offset, obstacle.orientation);
        let parent = obstacle.parent_building;
        let wall_area = obstacle.spawn_hitbox.clone();

        if let Some(table) = &def.loot_table {
            self.spawn_loot_table(table, loot_at)?;
        }
        if let Some(explosion) = &def.explosion {
            self.pending_explosions.push(PendingExplosion {
                def: self.catalog.explosion(explosion)?,
                position,
                source,
                weapon: None,
            });
        }

        if def.is_wall
            && let Some(building_id) = parent
        {
            let collapsed = self
                .buildings
                .get_mut(&building_id)
                .is_some_and(|b| b.damage_ceiling());
            if collapsed {
                log::debug!("Game {}: ceiling of {} collapsed", self.id, building_id);
            }
            self.mark_partial(building_id);

            let parts = self
                .buildings
                .get(&building_id)
                .map(|b| b.parts.clone())
                .unwrap_or_default();
            let doors: Vec<ObjectId> = parts
                .into_iter()
                .filter(|part| {
                    self.obstacles.get(part).is_some_and(|o| {
                        !o.dead
                            && o.door
                                .as_ref()
                                .is_some_and(|d| d.open_hitboxes().iter().any(|h| h.collides_with(&wall_area)))
                    })
                })
                .collect();
            for door in doors {
                self.force_destroy_obstacle(door, source)?;
            }
        }

        self.events.emit(&GameEvent::ObstacleDestroy {
            obstacle: id,
            definition: def.id.clone(),
        });
        log::debug!("Game {}: obstacle {} ({}) destroyed", self.id, def.id, id);
        Ok(())
    }

    /// Destroy regardless of indestructibility (doors hanging off a broken wall)
    fn force_destroy_obstacle(&mut self, id: ObjectId, source: Option<ObjectId>) -> Result<(), SimError> {
        let destroyed = self.obstacles.get_mut(&id).is_some_and(|o| {
            let health = o.health;
            o.apply_damage(health.max(1.0))
        });
        if destroyed {
            self.update_grid(id);
            self.mark_partial(id);
            self.destroy_obstacle(id, source)?;
        }
        Ok(())
    }

    /// Send one packet to one client; a failed send drops the connection
    pub(crate) fn send_packet(&mut self, id: ObjectId, packet: &ServerPacket) {
        let bytes = match self.encoder.encode(packet) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Game {}: failed to encode packet for {}: {}", self.id, id, e);
                return;
            }
        };
        if let Some(sink) = self.sinks.get_mut(&id)
            && let Err(e) = sink.send(&bytes)
        {
            log::warn!("Game {}: dropping connection of {}: {}", self.id, id, e);
            self.sinks.remove(&id);
        }
    }

    /// Position where a target can be considered hit, for effects
    pub(crate) fn object_position(&self, id: ObjectId) -> Option<Vec2> {
        match self.kinds.get(&id)? {
            ObjectKind::Player => self.players.get(&id).map(|p| p.position),
            ObjectKind::Obstacle => self.obstacles.get(&id).map(|o| o.position),
            ObjectKind::Building => self.buildings.get(&id).map(|b| b.position),
            ObjectKind::Loot => self.loot.get(&id).map(|l| l.position),
            ObjectKind::Decal => self.decals.get(&id).map(|d| d.position),
            ObjectKind::Particle => self.particles.get(&id).map(|p| p.position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::events::EventKind;
    use crate::sim::state::tests::{join_at, packets, test_game};

    fn crate_at(game: &mut Game, position: Vec2) -> ObjectId {
        let def = game.catalog.obstacle("regular_crate").unwrap();
        game.spawn_obstacle(def, position, 0.0, 0, 1.0).unwrap()
    }

    #[test]
    fn test_obstacle_shrinks_then_breaks() {
        let mut game = test_game();
        let id = crate_at(&mut game, Vec2::splat(100.0));
        let max = game.obstacles[&id].max_health;
        game.damage_obstacle(id, max / 2.0, None, false).unwrap();
        let crate_ = &game.obstacles[&id];
        assert!((crate_.scale - 0.75).abs() < 1e-5);
        assert!(!crate_.dead);

        game.damage_obstacle(id, max / 2.0, None, false).unwrap();
        let crate_ = &game.obstacles[&id];
        assert_eq!(crate_.health, 0.0);
        assert!(crate_.dead);
        assert!(!crate_.collidable);
        assert!(game.partial_dirty.contains(&id) || game.full_dirty.contains(&id));
    }

    #[test]
    fn test_indestructible_ignores_damage() {
        let mut game = test_game();
        let def = game.catalog.obstacle("metal_wall").unwrap();
        let id = game.spawn_obstacle(def, Vec2::splat(50.0), 0.0, 0, 1.0).unwrap();
        let health = game.obstacles[&id].health;
        game.damage_obstacle(id, 1000.0, None, true).unwrap();
        assert_eq!(game.obstacles[&id].health, health);
    }

    #[test]
    fn test_cancelled_damage_is_not_applied() {
        let mut game = test_game();
        let id = crate_at(&mut game, Vec2::splat(100.0));
        game.events.on(EventKind::ObstacleDamage, "shield", |_, c| {
            c.cancel();
            Ok(())
        });
        let health = game.obstacles[&id].health;
        game.damage_obstacle(id, 10.0, None, false).unwrap();
        assert_eq!(game.obstacles[&id].health, health);
    }

    #[test]
    fn test_invulnerable_player_takes_nothing() {
        let mut game = test_game();
        let (id, _rx) = join_at(&mut game, "a", Vec2::splat(100.0));
        game.damage_player(id, 50.0, None, None, true).unwrap();
        assert_eq!(game.players[&id].health, 100.0);
    }

    #[test]
    fn test_armor_reduces_only_non_piercing() {
        let mut game = test_game();
        let (id, _rx) = join_at(&mut game, "a", Vec2::splat(100.0));
        let vest = game.catalog.armor("regular_vest").unwrap();
        let reduction = vest.damage_reduction;
        let player = game.players.get_mut(&id).unwrap();
        player.invulnerable = false;
        player.inventory.equip_armor(vest);

        game.damage_player(id, 20.0, None, None, false).unwrap();
        let expected = 100.0 - 20.0 * (1.0 - reduction);
        assert!((game.players[&id].health - expected).abs() < 1e-4);

        game.damage_player(id, 20.0, None, None, true).unwrap();
        assert!((game.players[&id].health - (expected - 20.0)).abs() < 1e-4);
    }

    #[test]
    fn test_death_credits_killer_and_notifies_victim() {
        let mut game = test_game();
        let (killer, _krx) = join_at(&mut game, "killer", Vec2::splat(60.0));
        let (victim, vrx) = join_at(&mut game, "victim", Vec2::splat(100.0));
        game.players.get_mut(&victim).unwrap().invulnerable = false;

        game.damage_player(victim, 150.0, Some(killer), Some("fists".into()), true)
            .unwrap();

        let v = &game.players[&victim];
        assert!(v.dead);
        assert_eq!(v.spectating, Some(killer));
        assert!(!game.living.contains(&victim));
        assert!(game.deleted.contains(&victim));
        assert!(!game.grid.contains(victim));
        assert_eq!(game.players[&killer].kills, 1);
        assert_eq!(game.kill_feed.len(), 1);
        assert!(game.decals.values().any(|d| d.definition == DEATH_MARKER_DECAL));

        let over = packets(&vrx)
            .into_iter()
            .find_map(|p| match p {
                ServerPacket::GameOver(over) => Some(over),
                _ => None,
            })
            .expect("game over packet");
        assert!(!over.won);
        assert_eq!(over.rank, 2);
    }

    #[test]
    fn test_wall_destruction_collapses_ceiling_and_breaks_doors() {
        let mut game = test_game();
        let def = game.catalog.building("house").unwrap();
        let needed = def.walls_to_destroy as usize;
        let house = game.spawn_building(def, Vec2::splat(128.0), 0).unwrap();
        let walls: Vec<ObjectId> = game.buildings[&house]
            .parts
            .iter()
            .copied()
            .filter(|p| game.obstacles[p].def.is_wall && !game.obstacles[p].def.indestructible)
            .collect();
        assert!(walls.len() >= needed);
        for wall in walls.iter().take(needed) {
            game.damage_obstacle(*wall, 10_000.0, None, true).unwrap();
        }
        assert!(game.buildings[&house].ceiling_dead);

        // Breaking every wall takes any door hinged on them with it
        for wall in &walls {
            game.damage_obstacle(*wall, 10_000.0, None, true).unwrap();
        }
        let doors: Vec<_> = game.buildings[&house]
            .parts
            .iter()
            .filter(|p| game.obstacles[p].is_door())
            .collect();
        assert!(!doors.is_empty());
        assert!(doors.iter().all(|d| game.obstacles[d].dead));
    }
}
