//! Fixed timestep simulation tick
//!
//! One call to [`Game::tick`] advances the match by exactly one step, in a
//! fixed order: timers, loot, particles, bullets, deferred damage,
//! explosions, gas, players, the per-client broadcast, clearing of the
//! per-tick sets, and finally the win check. Later stages see what earlier
//! stages left behind in the same tick.

use std::collections::BTreeSet;

use glam::Vec2;

use super::Game;
use super::events::GameEvent;
use super::hitbox::Hitbox;
use super::ids::ObjectId;
use super::inventory::{Action, InventoryItem};
use super::objects::ObjectKind;
use super::snapshot::{GameOverPacket, ServerPacket, UpdatePacket};
use super::timers::TimerAction;
use crate::consts::{ADRENALINE_DRAIN_PER_SEC, COLLISION_PASSES, GAME_TEARDOWN_DELAY_MS, VISIBILITY_REFRESH_TICKS};
use crate::error::SimError;

/// Kill feed weapon name for gas deaths
const GAS_WEAPON: &str = "gas";

impl Game {
    /// Advance the simulation by one fixed step. `now` is the clock sampled
    /// once at the start of the tick.
    pub fn tick(&mut self, now: u64) -> Result<(), SimError> {
        if self.stopped {
            return Ok(());
        }
        self.now = now;
        self.tick_count += 1;

        self.run_timers()?;
        self.update_loot();
        self.update_particles();
        self.update_bullets()?;
        self.apply_damage_records()?;
        self.process_explosions()?;
        self.gas.tick(now);

        let living: Vec<ObjectId> = self.living.iter().copied().collect();
        for id in living {
            self.update_player(id)?;
        }

        self.broadcast();
        self.clear_tick_state();
        self.check_winner();
        Ok(())
    }

    /// Fire every timer due at the current clock
    pub(crate) fn run_timers(&mut self) -> Result<(), SimError> {
        while let Some(action) = self.timers.pop_due(self.now) {
            match action {
                TimerAction::ActionComplete { player } => self.complete_action(player),
                TimerAction::RecoilExpire { player } => self.expire_recoil(player),
                TimerAction::GunRefire { player } => self.refire(player),
                TimerAction::BurstShot { player, remaining } => self.fire_gun(player, remaining),
                TimerAction::MeleeHit { player } => self.melee_hit(player)?,
                TimerAction::MeleeRefire { player } => self.melee_refire(player),
                TimerAction::RemoveInvulnerability { player } => {
                    if let Some(p) = self.players.get_mut(&player) {
                        p.invulnerable = false;
                        p.invulnerability_timer = None;
                    }
                }
                TimerAction::GasAdvance => self.advance_gas(),
                TimerAction::GameTeardown => {
                    self.stopped = true;
                    log::info!("Game {} torn down after {} ticks", self.id, self.tick_count);
                }
            }
        }
        Ok(())
    }

    /// Hitboxes of every collidable obstacle near `area`
    fn static_colliders(&self, area: &Hitbox) -> Vec<Hitbox> {
        self.grid
            .intersects_hitbox(area)
            .into_iter()
            .filter_map(|id| self.obstacles.get(&id))
            .filter(|o| o.collidable)
            .map(|o| o.hitbox.clone())
            .collect()
    }

    fn clamp_to_map(&self, position: Vec2) -> Vec2 {
        position.clamp(Vec2::ZERO, Vec2::new(self.width, self.height))
    }

    /// Push a moving circle out of `colliders` with a few relaxation passes
    fn relax(body: &mut Hitbox, colliders: &[Hitbox]) {
        for _ in 0..COLLISION_PASSES {
            for collider in colliders {
                if body.collides_with(collider) {
                    body.resolve_collision(collider);
                }
            }
        }
    }

    fn update_loot(&mut self) {
        let dt = self.dt();
        let moving: Vec<ObjectId> = self
            .loot
            .values()
            .filter(|l| l.is_moving())
            .map(|l| l.id)
            .collect();
        for id in moving {
            let Some(loot) = self.loot.get_mut(&id) else {
                continue;
            };
            loot.integrate(dt);
            let mut body = loot.hitbox();
            let colliders = self.static_colliders(&body);
            Self::relax(&mut body, &colliders);
            let position = self.clamp_to_map(body.center());
            if let Some(loot) = self.loot.get_mut(&id) {
                loot.position = position;
            }
            self.update_grid(id);
            self.mark_partial(id);
        }
    }

    fn update_particles(&mut self) {
        let (dt, now) = (self.dt(), self.now);
        let expired: Vec<ObjectId> = self
            .particles
            .values()
            .filter(|p| p.expired(now))
            .map(|p| p.id)
            .collect();
        for id in expired {
            self.remove_object(id);
        }
        let ids: Vec<ObjectId> = self.particles.keys().copied().collect();
        for id in ids {
            if let Some(particle) = self.particles.get_mut(&id) {
                particle.update(dt);
            }
            self.update_grid(id);
        }
    }

    /// Largest zoom bonus of the buildings `body` is inside of
    fn building_zoom(&self, body: &Hitbox) -> Option<f32> {
        self.grid
            .intersects_hitbox(body)
            .into_iter()
            .filter(|id| self.kinds.get(id) == Some(&ObjectKind::Building))
            .filter_map(|id| self.buildings.get(&id))
            .filter(|b| b.contains(body))
            .map(|b| b.def.zoom_bonus)
            .reduce(f32::max)
    }

    /// Movement, collision, regen, attack start, gas damage and zoom for one
    /// living player
    fn update_player(&mut self, id: ObjectId) -> Result<(), SimError> {
        let dt = self.dt();
        let Some(player) = self.players.get(&id).filter(|p| !p.dead) else {
            return Ok(());
        };
        let inv = &player.inventory;
        let speed = self.config.movement_speed
            * player.floor.speed_multiplier()
            * player.recoil.unwrap_or(1.0)
            * player.action.as_ref().map_or(1.0, Action::speed_multiplier)
            * (1.0 + player.adrenaline / 1000.0)
            * inv.active_item().map_or(1.0, InventoryItem::speed_multiplier)
            * inv.equipment_speed_multiplier();
        let (old, radius) = (player.position, player.radius);

        let mut body = Hitbox::circle(radius, old + player.movement_vector() * speed * dt);
        let colliders = self.static_colliders(&body);
        Self::relax(&mut body, &colliders);
        let position = self.clamp_to_map(body.center());
        let moved = position != old;

        let floor = self.terrain.floor_at(position);
        let gas_damage = (self.gas.damage_pulse && self.gas.dps > 0.0 && self.gas.is_in_gas(position))
            .then_some(self.gas.dps);
        let building_zoom = self.building_zoom(&Hitbox::circle(radius, position));

        let Some(player) = self.players.get_mut(&id) else {
            return Ok(());
        };
        let mut invulnerability = None;
        if moved {
            player.position = position;
            player.floor = floor;
            if player.invulnerable {
                player.invulnerable = false;
                invulnerability = player.invulnerability_timer.take();
            }
        }
        let adrenaline = player.adrenaline - ADRENALINE_DRAIN_PER_SEC * dt;
        player.set_adrenaline(adrenaline);
        let regen = player.regen_rate() * dt;
        if regen > 0.0 {
            let health = player.health + regen;
            player.set_health(health);
        }
        let attack = std::mem::take(&mut player.start_attacking);
        player.inside_building = building_zoom.is_some();
        let zoom = player.inventory.scope().zoom + building_zoom.unwrap_or(0.0);
        player.set_zoom(zoom);

        if let Some(handle) = invulnerability {
            self.timers.cancel(handle);
        }
        if moved {
            self.update_grid(id);
            self.mark_partial(id);
        }
        if attack {
            self.use_item(id);
        }
        if let Some(dps) = gas_damage {
            self.damage_player(id, dps, None, Some(GAS_WEAPON.to_string()), true)?;
        }
        Ok(())
    }

    /// Build this tick's packet for `id` and move its visible set forward.
    ///
    /// The visible set is recomputed from the grid every few ticks, or right
    /// away when objects were added or removed anywhere.
    fn update_packet(&mut self, id: ObjectId) -> Option<UpdatePacket> {
        let player = self.players.get(&id)?;
        let refresh = self.world_changed || player.ticks_since_visibility >= VISIBILITY_REFRESH_TICKS;
        let screen = player.screen_hitbox();
        let old = &player.visible;
        let visible = if refresh {
            self.grid.intersects_hitbox(&screen)
        } else {
            old.clone()
        };

        let mut full: BTreeSet<ObjectId> = visible.difference(old).copied().collect();
        full.extend(self.full_dirty.intersection(&visible).copied());
        let mut deleted: BTreeSet<ObjectId> = old.difference(&visible).copied().collect();
        deleted.extend(self.deleted.intersection(old).copied());

        let packet = UpdatePacket {
            tick: self.tick_count,
            player: self.player_data(player),
            full_objects: full.iter().filter_map(|i| self.full_snapshot(*i)).collect(),
            partial_objects: self
                .partial_dirty
                .intersection(&visible)
                .filter(|i| !full.contains(i))
                .filter_map(|i| self.partial_snapshot(*i))
                .collect(),
            deleted: deleted.into_iter().collect(),
            bullets: self
                .new_bullets
                .iter()
                .filter(|b| screen.contains_point(b.position))
                .cloned()
                .collect(),
            explosions: self
                .explosions
                .iter()
                .filter(|e| screen.contains_point(e.position))
                .cloned()
                .collect(),
            emotes: self
                .emotes
                .iter()
                .filter(|e| visible.contains(&e.player))
                .cloned()
                .collect(),
            kill_feed: self.kill_feed.clone(),
            gas: self.gas.dirty.then(|| self.gas.snapshot()),
            gas_progress: self.gas.percentage_dirty.then_some(self.gas.percentage),
            alive_count: self.alive_count(),
        };

        if let Some(player) = self.players.get_mut(&id) {
            player.visible = visible;
            player.ticks_since_visibility = if refresh {
                0
            } else {
                player.ticks_since_visibility + 1
            };
        }
        Some(packet)
    }

    /// Send `packet` to `id` and everyone spectating them
    fn send_to_watchers(&mut self, id: ObjectId, packet: &ServerPacket) {
        self.send_packet(id, packet);
        let spectators: Vec<ObjectId> = self
            .players
            .get(&id)
            .map(|p| p.spectators.iter().copied().collect())
            .unwrap_or_default();
        for spectator in spectators {
            self.send_packet(spectator, packet);
        }
    }

    /// One packet per connected client. Spectators get a copy of the packet
    /// of whoever they watch instead of their own.
    fn broadcast(&mut self) {
        let viewers: Vec<ObjectId> = self
            .connected
            .iter()
            .copied()
            .filter(|id| self.players.get(id).is_some_and(|p| p.spectating.is_none()))
            .collect();
        for id in viewers {
            if let Some(packet) = self.update_packet(id) {
                self.send_to_watchers(id, &ServerPacket::Update(packet));
            }
        }
    }

    fn clear_tick_state(&mut self) {
        self.full_dirty.clear();
        self.partial_dirty.clear();
        self.deleted.clear();
        self.world_changed = false;
        self.new_bullets.clear();
        self.explosions.clear();
        self.emotes.clear();
        self.kill_feed.clear();
        for player in self.players.values_mut() {
            player.reset_dirty();
        }
        self.gas.clear_dirty();
    }

    /// End a started match once at most one player is left alive
    fn check_winner(&mut self) {
        if !self.started || self.over || self.living.len() > 1 {
            return;
        }
        self.over = true;
        self.allow_join = false;
        let winner = self.living.iter().next().copied();

        if let Some(id) = winner
            && let Some(player) = self.players.get_mut(&id)
        {
            player.frozen = true;
            player.attacking = false;
            player.movement = Default::default();
            player.touch = None;
            let packet = ServerPacket::GameOver(GameOverPacket {
                player: id,
                won: true,
                rank: 1,
                kills: player.kills,
                damage_done: player.damage_done,
                damage_taken: player.damage_taken,
                time_alive_ms: self.now.saturating_sub(player.joined_at),
            });
            log::info!("Game {}: '{}' ({}) won with {} kills", self.id, player.name, id, player.kills);
            self.send_to_watchers(id, &packet);
        }

        self.events.emit(&GameEvent::GameEnded { winner });
        self.timers
            .schedule(self.now + GAME_TEARDOWN_DELAY_MS, TimerAction::GameTeardown);
        log::info!("Game {} over", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::INVULNERABILITY_MS;
    use crate::sim::gas::{Gas, GasStage, GasState};
    use crate::sim::inventory::GunItem;
    use crate::sim::objects::{MovementIntent, PlayerInput};
    use crate::sim::state::tests::{join_at, packets, test_game, test_game_with};
    use std::sync::mpsc::Receiver;

    fn updates(rx: &Receiver<Vec<u8>>) -> Vec<UpdatePacket> {
        packets(rx)
            .into_iter()
            .filter_map(|p| match p {
                ServerPacket::Update(u) => Some(u),
                ServerPacket::GameOver(_) => None,
            })
            .collect()
    }

    fn last_update(rx: &Receiver<Vec<u8>>) -> UpdatePacket {
        updates(rx).pop().expect("an update packet")
    }

    fn moving_right() -> PlayerInput {
        PlayerInput {
            movement: MovementIntent {
                right: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_one_tick_of_movement() {
        let mut game = test_game();
        let (id, _rx) = join_at(&mut game, "a", Vec2::ZERO);
        let handle = game.players[&id].invulnerability_timer.unwrap();
        game.apply_input(id, moving_right()).unwrap();
        let dt = game.dt();
        game.tick(game.config.tick_interval_ms()).unwrap();

        let player = &game.players[&id];
        let expected = game.config.movement_speed * dt;
        assert!((player.position.x - expected).abs() < 1e-4);
        assert!(player.position.y.abs() < 1e-6);
        assert!(!player.invulnerable);
        assert!(!game.timers.is_pending(handle));
    }

    #[test]
    fn test_invulnerability_expires_without_moving() {
        let mut game = test_game();
        let (id, _rx) = join_at(&mut game, "a", Vec2::splat(100.0));
        game.tick(33).unwrap();
        assert!(game.players[&id].invulnerable);
        game.tick(INVULNERABILITY_MS).unwrap();
        assert!(!game.players[&id].invulnerable);
    }

    #[test]
    fn test_players_stay_inside_the_map() {
        let mut game = test_game();
        let (id, _rx) = join_at(&mut game, "a", Vec2::new(255.5, 10.0));
        game.apply_input(id, moving_right()).unwrap();
        for i in 1..=10 {
            game.tick(i * 33).unwrap();
        }
        assert_eq!(game.players[&id].position.x, game.width);
    }

    #[test]
    fn test_walls_stop_players() {
        let mut game = test_game();
        let wall = game.catalog.obstacle("metal_wall").unwrap();
        // Vertical wall spanning x 119..121
        game.spawn_obstacle(wall, Vec2::new(120.0, 100.0), 0.0, 1, 1.0)
            .unwrap();
        let (id, _rx) = join_at(&mut game, "a", Vec2::new(110.0, 100.0));
        game.apply_input(id, moving_right()).unwrap();
        for i in 1..=60 {
            game.tick(i * 33).unwrap();
        }
        let player = &game.players[&id];
        assert!(player.position.x <= 119.0 - player.radius + 1e-3);
    }

    /// Swap a fresh wall's shape for `hitbox`
    fn place_collider(game: &mut Game, hitbox: Hitbox) -> ObjectId {
        let wall = game.catalog.obstacle("metal_wall").unwrap();
        let id = game.spawn_obstacle(wall, hitbox.center(), 0.0, 0, 1.0).unwrap();
        let obstacle = game.obstacles.get_mut(&id).unwrap();
        obstacle.hitbox = hitbox.clone();
        obstacle.spawn_hitbox = hitbox;
        game.update_grid(id);
        id
    }

    /// Walk right into `shape` and return the smallest gap seen on any tick
    fn walk_into(shape: Hitbox) -> f32 {
        let mut game = test_game();
        place_collider(&mut game, shape.clone());
        let (id, _rx) = join_at(&mut game, "a", Vec2::new(108.0, 100.0));
        game.apply_input(id, moving_right()).unwrap();
        let mut closest = f32::MAX;
        for i in 1..=45 {
            game.tick(i * 33).unwrap();
            let player = &game.players[&id];
            let gap = Hitbox::circle(player.radius, player.position).distance_to(&shape).distance;
            assert!(gap > -1e-3, "tick {}: player {} overlaps by {}", i, player.position, -gap);
            closest = closest.min(gap);
        }
        closest
    }

    #[test]
    fn test_polygon_obstacles_stop_players() {
        let slanted = Hitbox::polygon(vec![
            Vec2::new(118.0, 94.0),
            Vec2::new(128.0, 100.0),
            Vec2::new(116.0, 106.0),
        ]);
        assert!(walk_into(slanted) < 0.1);
    }

    #[test]
    fn test_group_obstacles_stop_players() {
        let post_and_wall = Hitbox::group(vec![
            Hitbox::circle(2.0, Vec2::new(117.0, 100.0)),
            Hitbox::rect(Vec2::new(119.0, 90.0), Vec2::new(121.0, 110.0)),
        ]);
        assert!(walk_into(post_and_wall) < 0.1);
    }

    #[test]
    fn test_pushed_loot_stops_at_walls() {
        let mut game = test_game();
        let wall = game.catalog.obstacle("metal_wall").unwrap();
        game.spawn_obstacle(wall, Vec2::new(120.0, 100.0), 0.0, 1, 1.0)
            .unwrap();
        let item = game.catalog.item("gauze").unwrap();
        let loot = game.spawn_loot(item, 1, Vec2::new(110.0, 100.0)).unwrap();
        game.loot.get_mut(&loot).unwrap().push(0.0, 40.0);
        for i in 1..=90 {
            game.tick(i * 33).unwrap();
        }
        let loot = &game.loot[&loot];
        assert!(loot.position.x > 110.0);
        assert!(loot.position.x < 119.0);
    }

    #[test]
    fn test_dirty_objects_reach_clients_that_see_them() {
        let mut game = test_game();
        let (a, rx_a) = join_at(&mut game, "a", Vec2::splat(100.0));
        let (_far, rx_far) = join_at(&mut game, "far", Vec2::splat(220.0));
        let item = game.catalog.item("gauze").unwrap();
        let loot = game.spawn_loot(item, 1, Vec2::new(105.0, 100.0)).unwrap();

        game.tick(33).unwrap();
        let first = last_update(&rx_a);
        let full: Vec<ObjectId> = first.full_objects.iter().map(|o| o.id()).collect();
        assert!(full.contains(&loot));
        assert!(full.contains(&a));
        assert!(first.player.id.is_some());
        assert!(first.gas.is_some());
        let far = last_update(&rx_far);
        assert!(!far.full_objects.iter().any(|o| o.id() == loot));
        assert!(game.full_dirty.is_empty());
        assert!(game.partial_dirty.is_empty());
        assert!(game.deleted.is_empty());

        // Nothing changed
        game.tick(66).unwrap();
        let quiet = last_update(&rx_a);
        assert!(quiet.full_objects.is_empty());
        assert!(quiet.partial_objects.is_empty());
        assert_eq!(quiet.player, Default::default());

        game.loot.get_mut(&loot).unwrap().position = Vec2::new(106.0, 100.0);
        game.mark_partial(loot);
        game.tick(99).unwrap();
        let moved = last_update(&rx_a);
        assert!(moved.partial_objects.iter().any(|p| p.id() == loot));

        game.remove_object(loot);
        game.tick(132).unwrap();
        assert!(last_update(&rx_a).deleted.contains(&loot));
        assert!(!last_update(&rx_far).deleted.contains(&loot));
    }

    #[test]
    fn test_objects_leaving_view_are_deleted_for_that_client() {
        let mut game = test_game();
        let (a, rx) = join_at(&mut game, "a", Vec2::splat(60.0));
        let item = game.catalog.item("gauze").unwrap();
        let loot = game.spawn_loot(item, 1, Vec2::splat(64.0)).unwrap();
        game.tick(33).unwrap();
        assert!(last_update(&rx).full_objects.iter().any(|o| o.id() == loot));

        let player = game.players.get_mut(&a).unwrap();
        player.position = Vec2::splat(220.0);
        game.update_grid(a);
        for i in 2..=(VISIBILITY_REFRESH_TICKS as u64 + 2) {
            game.tick(i * 33).unwrap();
        }
        let deleted: Vec<ObjectId> = updates(&rx).into_iter().flat_map(|u| u.deleted).collect();
        assert!(deleted.contains(&loot));
        assert!(!game.players[&a].visible.contains(&loot));
    }

    #[test]
    fn test_spectators_receive_a_copy() {
        let mut game = test_game();
        let (a, rx_a) = join_at(&mut game, "a", Vec2::splat(100.0));
        let (b, rx_b) = join_at(&mut game, "b", Vec2::new(110.0, 100.0));
        game.players.get_mut(&b).unwrap().invulnerable = false;
        game.damage_player(b, 500.0, Some(a), Some("ak47".into()), false)
            .unwrap();
        assert_eq!(game.players[&b].spectating, Some(a));
        packets(&rx_b);

        game.tick(33).unwrap();
        let seen_by_a = last_update(&rx_a);
        let seen_by_b = last_update(&rx_b);
        assert_eq!(seen_by_a, seen_by_b);
        assert_eq!(seen_by_a.player.id, Some(a));
        assert_eq!(seen_by_a.kill_feed.len(), 1);
    }

    #[test]
    fn test_last_player_standing_wins() {
        let mut game = test_game_with(|c| c.min_players_to_start = 2);
        let (a, rx_a) = join_at(&mut game, "a", Vec2::splat(100.0));
        let (b, _rx_b) = join_at(&mut game, "b", Vec2::new(110.0, 100.0));
        assert!(game.started);
        game.players.get_mut(&b).unwrap().invulnerable = false;
        game.damage_player(b, 500.0, Some(a), None, false).unwrap();

        game.tick(33).unwrap();
        assert!(game.over);
        assert!(!game.allow_join);
        assert!(game.players[&a].frozen);
        let won = packets(&rx_a).into_iter().find_map(|p| match p {
            ServerPacket::GameOver(over) => Some(over),
            ServerPacket::Update(_) => None,
        });
        let won = won.expect("game over packet");
        assert!(won.won);
        assert_eq!(won.rank, 1);
        assert_eq!(won.kills, 1);

        // Frozen players ignore input
        game.apply_input(a, moving_right()).unwrap();
        game.tick(66).unwrap();
        assert_eq!(game.players[&a].position, Vec2::splat(100.0));

        game.tick(66 + GAME_TEARDOWN_DELAY_MS).unwrap();
        assert!(game.stopped);
        let ticks = game.tick_count;
        game.tick(5000).unwrap();
        assert_eq!(game.tick_count, ticks);
    }

    #[test]
    fn test_gas_pulse_deals_piercing_damage() {
        let mut game = test_game();
        let stages = vec![
            GasStage {
                state: GasState::Inactive,
                duration: 0.0,
                old_radius: 1.0,
                new_radius: 1.0,
                dps: 0.0,
                prevent_join: false,
            },
            GasStage {
                state: GasState::Waiting,
                duration: 0.0,
                old_radius: 0.01,
                new_radius: 0.01,
                dps: 10.0,
                prevent_join: false,
            },
        ];
        game.gas = Gas::with_stages(game.width, game.height, &game.config.gas, stages);
        game.advance_gas();
        let (id, _rx) = join_at(&mut game, "a", Vec2::splat(40.0));
        let vest = game.catalog.armor("regular_vest").unwrap();
        let player = game.players.get_mut(&id).unwrap();
        player.invulnerable = false;
        player.inventory.equip_armor(vest);

        for i in 1..=29 {
            game.tick(i * 33).unwrap();
        }
        assert_eq!(game.players[&id].health, 100.0);
        game.tick(30 * 33).unwrap();
        assert_eq!(game.players[&id].health, 90.0);
    }

    #[test]
    fn test_building_interior_raises_zoom() {
        let mut game = test_game();
        let house = game.catalog.building("house").unwrap();
        game.spawn_building(house, Vec2::splat(128.0), 0).unwrap();
        let (id, _rx) = join_at(&mut game, "a", Vec2::splat(128.0));
        let base = game.players[&id].inventory.scope().zoom;

        game.tick(33).unwrap();
        let player = &game.players[&id];
        assert!(player.inside_building);
        assert_eq!(player.zoom, base + 16.0);

        let player = game.players.get_mut(&id).unwrap();
        player.position = Vec2::new(128.0, 200.0);
        game.update_grid(id);
        game.tick(66).unwrap();
        let player = &game.players[&id];
        assert!(!player.inside_building);
        assert_eq!(player.zoom, base);
    }

    #[test]
    fn test_adrenaline_drains_and_heals() {
        let mut game = test_game();
        let (id, _rx) = join_at(&mut game, "a", Vec2::splat(100.0));
        let player = game.players.get_mut(&id).unwrap();
        player.adrenaline = 50.0;
        player.health = 50.0;
        game.tick(33).unwrap();
        let player = &game.players[&id];
        assert!(player.adrenaline < 50.0);
        assert!(player.health > 50.0);
    }

    /// Same seed and inputs, byte-identical packets
    #[test]
    fn test_determinism() {
        fn run() -> (Vec<Vec<u8>>, f32) {
            let mut game = test_game();
            let (a, rx) = join_at(&mut game, "a", Vec2::splat(100.0));
            let (b, _rx_b) = join_at(&mut game, "b", Vec2::new(130.0, 100.0));
            let mut gun = GunItem::new(game.catalog.gun("hp18").unwrap());
            gun.ammo = gun.def.capacity;
            let player = game.players.get_mut(&a).unwrap();
            player.inventory.put(0, InventoryItem::Gun(gun)).unwrap();
            player.inventory.set_active(0).unwrap();
            game.players.get_mut(&b).unwrap().invulnerable = false;

            for tick in 1..=30u64 {
                let input = PlayerInput {
                    attacking: tick % 10 == 1,
                    movement: MovementIntent {
                        right: tick < 5,
                        ..Default::default()
                    },
                    ..Default::default()
                };
                game.apply_input(a, input).unwrap();
                game.tick(tick * 33).unwrap();
            }
            (rx.try_iter().collect(), game.players[&b].health)
        }

        let (first, health) = run();
        let (second, _) = run();
        assert_eq!(first.len(), 30);
        assert_eq!(first, second);
        assert!(health < 100.0);
    }
}
