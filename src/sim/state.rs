//! Game world container
//!
//! One [`Game`] is one match. It owns every object table, the spatial grid,
//! the gas, the timer queue and the plugin bus. Nothing in here is shared
//! with other games; the whole struct is driven from a single thread.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::bullet::Bullet;
use super::catalog::{
    BuildingDef, Catalog, DEFAULT_BACKPACK, DEFAULT_MELEE, DEFAULT_SCOPE, ItemDef, MapDef, ObstacleDef,
};
use super::damage::DamageRecord;
use super::events::{EventBus, GameEvent};
use super::explosion::PendingExplosion;
use super::gas::Gas;
use super::grid::Grid;
use super::hitbox::Hitbox;
use super::ids::{IdAllocator, ObjectId};
use super::inventory::{Inventory, InventoryItem, SLOT_COUNT};
use super::objects::{Building, Decal, Loot, ObjectKind, Obstacle, Player, PlayerDirty, SyncedParticle};
use super::snapshot::{
    BulletSnapshot, ClientSink, EmoteSnapshot, ExplosionSnapshot, JsonEncoder, KillFeedEntry, PacketEncoder,
};
use super::terrain::Terrain;
use super::timers::{TimerAction, TimerHandle, TimerQueue};
use crate::config::Config;
use crate::consts::{INVULNERABILITY_MS, VISIBILITY_REFRESH_TICKS};
use crate::error::SimError;
use crate::{Orientation, add_adjust, orientation_to_rotation};

const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;
/// Speed range of items scattered on drop (units/second)
const DROP_PUSH_SPEED: (f32, f32) = (4.0, 10.0);

/// Read-only view polled by matchmaking between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatus {
    pub id: u32,
    pub allow_join: bool,
    pub alive_count: usize,
    pub over: bool,
}

pub struct Game {
    pub id: u32,
    pub config: Arc<Config>,
    pub catalog: Arc<Catalog>,
    pub map: Arc<MapDef>,
    pub(crate) rng: Pcg32,
    /// Simulation clock (ms), sampled once per tick
    pub now: u64,
    pub tick_count: u64,
    pub width: f32,
    pub height: f32,

    pub grid: Grid,
    ids: IdAllocator,
    pub kinds: HashMap<ObjectId, ObjectKind>,
    pub players: BTreeMap<ObjectId, Player>,
    pub obstacles: BTreeMap<ObjectId, Obstacle>,
    pub buildings: BTreeMap<ObjectId, Building>,
    pub loot: BTreeMap<ObjectId, Loot>,
    pub decals: BTreeMap<ObjectId, Decal>,
    pub particles: BTreeMap<ObjectId, SyncedParticle>,
    pub bullets: Vec<Bullet>,
    /// Bullets fired this tick
    pub new_bullets: Vec<BulletSnapshot>,
    pub pending_explosions: Vec<PendingExplosion>,
    /// Explosions resolved this tick
    pub explosions: Vec<ExplosionSnapshot>,
    pub damage_records: Vec<DamageRecord>,

    pub full_dirty: BTreeSet<ObjectId>,
    pub partial_dirty: BTreeSet<ObjectId>,
    pub deleted: BTreeSet<ObjectId>,
    /// Objects were added or removed; every client recomputes visibility
    pub world_changed: bool,
    pub kill_feed: Vec<KillFeedEntry>,
    pub emotes: Vec<EmoteSnapshot>,

    pub gas: Gas,
    pub terrain: Terrain,
    pub timers: TimerQueue<TimerAction>,
    pub events: EventBus,

    pub connected: BTreeSet<ObjectId>,
    pub living: BTreeSet<ObjectId>,
    pub started: bool,
    pub over: bool,
    pub allow_join: bool,
    /// Torn down; the runner stops ticking
    pub stopped: bool,
    next_bullet_id: u16,
    pub(crate) sinks: HashMap<ObjectId, Box<dyn ClientSink>>,
    pub(crate) encoder: Box<dyn PacketEncoder>,
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("id", &self.id)
            .field("map", &self.map.id)
            .field("now", &self.now)
            .field("tick_count", &self.tick_count)
            .field("objects", &self.kinds.len())
            .field("living", &self.living.len())
            .field("started", &self.started)
            .field("over", &self.over)
            .finish_non_exhaustive()
    }
}

impl Game {
    /// Build a match and generate its map
    pub fn new(id: u32, config: Arc<Config>, catalog: Arc<Catalog>) -> Result<Self, SimError> {
        let map = catalog.map(&config.map)?;
        let seed = config.seed.unwrap_or(u64::from(id).wrapping_mul(SEED_MIX));
        let mut rng = Pcg32::seed_from_u64(seed);
        let terrain = Terrain::generate(&map, &mut rng);
        let gas = Gas::new(map.width, map.height, &config.gas);

        let mut game = Self {
            id,
            width: map.width,
            height: map.height,
            grid: Grid::new(map.width, map.height),
            ids: IdAllocator::default(),
            kinds: HashMap::new(),
            players: BTreeMap::new(),
            obstacles: BTreeMap::new(),
            buildings: BTreeMap::new(),
            loot: BTreeMap::new(),
            decals: BTreeMap::new(),
            particles: BTreeMap::new(),
            bullets: Vec::new(),
            new_bullets: Vec::new(),
            pending_explosions: Vec::new(),
            explosions: Vec::new(),
            damage_records: Vec::new(),
            full_dirty: BTreeSet::new(),
            partial_dirty: BTreeSet::new(),
            deleted: BTreeSet::new(),
            world_changed: false,
            kill_feed: Vec::new(),
            emotes: Vec::new(),
            gas,
            terrain,
            timers: TimerQueue::new(),
            events: EventBus::new(),
            connected: BTreeSet::new(),
            living: BTreeSet::new(),
            started: false,
            over: false,
            allow_join: true,
            stopped: false,
            next_bullet_id: 0,
            sinks: HashMap::new(),
            encoder: Box::new(JsonEncoder),
            now: 0,
            tick_count: 0,
            rng,
            map,
            config,
            catalog,
        };
        game.generate_map()?;
        log::info!(
            "Game {} created on map '{}' ({} objects, seed {})",
            id,
            game.map.id,
            game.kinds.len(),
            seed
        );
        Ok(game)
    }

    /// Fixed simulation step (seconds)
    pub fn dt(&self) -> f32 {
        self.config.tick_interval_ms() as f32 / 1000.0
    }

    pub fn alive_count(&self) -> usize {
        self.living.len()
    }

    pub fn status(&self) -> GameStatus {
        GameStatus {
            id: self.id,
            allow_join: self.allow_join,
            alive_count: self.alive_count(),
            over: self.over,
        }
    }

    pub fn set_encoder(&mut self, encoder: Box<dyn PacketEncoder>) {
        self.encoder = encoder;
    }

    pub fn object_count(&self) -> usize {
        self.kinds.len()
    }

    // ---------------------------------------------------------------------
    // Object lifecycle
    // ---------------------------------------------------------------------

    /// Hitbox used for grid registration: the larger of spawn and live hitbox
    pub(crate) fn grid_hitbox(&self, id: ObjectId) -> Option<Hitbox> {
        match self.kinds.get(&id)? {
            ObjectKind::Player => self.players.get(&id).map(Player::hitbox),
            ObjectKind::Obstacle => self.obstacles.get(&id).map(|o| {
                if o.spawn_hitbox.bounding_area() > o.hitbox.bounding_area() {
                    o.spawn_hitbox.clone()
                } else {
                    o.hitbox.clone()
                }
            }),
            ObjectKind::Building => self.buildings.get(&id).map(|b| b.spawn_hitbox.clone()),
            ObjectKind::Loot => self.loot.get(&id).map(Loot::hitbox),
            ObjectKind::Decal => self.decals.get(&id).map(Decal::hitbox),
            ObjectKind::Particle => self.particles.get(&id).map(SyncedParticle::hitbox),
        }
    }

    /// Re-register `id` in the grid after it moved or changed shape
    pub(crate) fn update_grid(&mut self, id: ObjectId) {
        if let Some(hitbox) = self.grid_hitbox(id) {
            self.grid.insert(id, &hitbox);
        }
    }

    /// Record a freshly stored object
    fn track(&mut self, id: ObjectId, kind: ObjectKind) {
        self.kinds.insert(id, kind);
        self.update_grid(id);
        self.mark_full(id);
        self.world_changed = true;
    }

    /// Drop an object from every table and hand its id back
    pub fn remove_object(&mut self, id: ObjectId) {
        let Some(kind) = self.kinds.remove(&id) else {
            return;
        };
        match kind {
            ObjectKind::Player => {
                self.players.remove(&id);
            }
            ObjectKind::Obstacle => {
                self.obstacles.remove(&id);
            }
            ObjectKind::Building => {
                self.buildings.remove(&id);
            }
            ObjectKind::Loot => {
                self.loot.remove(&id);
            }
            ObjectKind::Decal => {
                self.decals.remove(&id);
            }
            ObjectKind::Particle => {
                self.particles.remove(&id);
            }
        }
        self.grid.remove(id);
        self.full_dirty.remove(&id);
        self.partial_dirty.remove(&id);
        self.deleted.insert(id);
        self.world_changed = true;
        self.ids.release(id);
    }

    pub fn mark_partial(&mut self, id: ObjectId) {
        if !self.full_dirty.contains(&id) {
            self.partial_dirty.insert(id);
        }
    }

    pub fn mark_full(&mut self, id: ObjectId) {
        self.partial_dirty.remove(&id);
        self.full_dirty.insert(id);
    }

    pub fn spawn_obstacle(
        &mut self,
        def: Arc<ObstacleDef>,
        position: Vec2,
        rotation: f32,
        orientation: Orientation,
        scale: f32,
    ) -> Result<ObjectId, SimError> {
        let id = self.ids.allocate()?;
        self.obstacles
            .insert(id, Obstacle::new(id, def, position, rotation, orientation, scale));
        self.track(id, ObjectKind::Obstacle);
        Ok(id)
    }

    /// Place a building and every obstacle it is made of
    pub fn spawn_building(
        &mut self,
        def: Arc<BuildingDef>,
        position: Vec2,
        orientation: Orientation,
    ) -> Result<ObjectId, SimError> {
        let id = self.ids.allocate()?;
        let mut building = Building::new(id, Arc::clone(&def), position, orientation);
        for part in &def.obstacles {
            let part_def = self.catalog.obstacle(&part.id)?;
            let part_orientation = (part.orientation + orientation) % 4;
            let part_id = self.spawn_obstacle(
                part_def,
                add_adjust(position, part.position, orientation),
                orientation_to_rotation(part_orientation),
                part_orientation,
                1.0,
            )?;
            if let Some(obstacle) = self.obstacles.get_mut(&part_id) {
                obstacle.parent_building = Some(id);
            }
            building.parts.push(part_id);
        }
        self.buildings.insert(id, building);
        self.track(id, ObjectKind::Building);
        Ok(id)
    }

    pub fn spawn_loot(&mut self, item: ItemDef, count: u32, position: Vec2) -> Result<ObjectId, SimError> {
        let id = self.ids.allocate()?;
        self.loot.insert(id, Loot::new(id, item, count, position));
        self.track(id, ObjectKind::Loot);
        Ok(id)
    }

    /// Spawn loot with a small random push so drops scatter
    pub fn drop_item(&mut self, item: ItemDef, count: u32, position: Vec2) -> Result<ObjectId, SimError> {
        let id = self.spawn_loot(item, count, position)?;
        let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
        let speed = self.rng.random_range(DROP_PUSH_SPEED.0..DROP_PUSH_SPEED.1);
        if let Some(loot) = self.loot.get_mut(&id) {
            loot.push(angle, speed);
        }
        Ok(id)
    }

    pub fn spawn_decal(&mut self, definition: &str, position: Vec2, rotation: f32) -> Result<ObjectId, SimError> {
        let id = self.ids.allocate()?;
        self.decals.insert(
            id,
            Decal {
                id,
                definition: definition.to_string(),
                position,
                rotation,
            },
        );
        self.track(id, ObjectKind::Decal);
        Ok(id)
    }

    pub fn spawn_particle(
        &mut self,
        definition: &str,
        position: Vec2,
        velocity: Vec2,
        lifetime_ms: u64,
    ) -> Result<ObjectId, SimError> {
        let id = self.ids.allocate()?;
        self.particles.insert(
            id,
            SyncedParticle {
                id,
                definition: definition.to_string(),
                position,
                velocity,
                spawned_at: self.now,
                lifetime_ms,
            },
        );
        self.track(id, ObjectKind::Particle);
        Ok(id)
    }

    pub(crate) fn next_bullet_id(&mut self) -> u16 {
        let id = self.next_bullet_id;
        self.next_bullet_id = id.wrapping_add(1);
        id
    }

    // ---------------------------------------------------------------------
    // Players
    // ---------------------------------------------------------------------

    /// Admit a player. `password` grants a configured role when it matches.
    pub fn add_player(
        &mut self,
        name: impl Into<String>,
        password: Option<&str>,
        sink: Box<dyn ClientSink>,
    ) -> Result<ObjectId, SimError> {
        if !self.allow_join {
            return Err(SimError::JoinClosed);
        }
        if self.connected.len() >= self.config.max_players {
            return Err(SimError::GameFull);
        }
        let inventory = Inventory::new(
            self.catalog.melee(DEFAULT_MELEE)?,
            self.catalog.scope(DEFAULT_SCOPE)?,
            self.catalog.backpack(DEFAULT_BACKPACK)?,
        );
        let position = self.spawn_position();
        let id = self.ids.allocate()?;
        let mut player = Player::new(id, name.into(), position, inventory, self.now);
        player.floor = self.terrain.floor_at(position);
        if let Some(role) = password.and_then(|p| self.config.role_for_password(p)) {
            player.is_dev = self.config.roles.get(role).is_some_and(|r| r.is_dev);
            player.role = Some(role.to_string());
        }
        player.invulnerability_timer = Some(self.timers.schedule(
            self.now + INVULNERABILITY_MS,
            TimerAction::RemoveInvulnerability { player: id },
        ));
        let name = player.name.clone();

        self.players.insert(id, player);
        self.track(id, ObjectKind::Player);
        self.living.insert(id);
        self.connected.insert(id);
        self.sinks.insert(id, sink);

        self.events.emit(&GameEvent::PlayerJoin {
            player: id,
            name: name.clone(),
        });
        log::info!("Game {}: '{}' joined as {} at {}", self.id, name, id, position);

        if !self.started && self.living.len() >= self.config.min_players_to_start {
            self.start();
        }
        Ok(id)
    }

    /// Disconnect a player. A living player drops their inventory first.
    pub fn remove_player(&mut self, id: ObjectId) -> Result<(), SimError> {
        let player = self.players.get(&id).ok_or(SimError::UnknownPlayer(id))?;
        let (alive, position, name) = (!player.dead, player.position, player.name.clone());

        self.cancel_player_timers(id);
        if alive {
            self.drop_inventory(id, position)?;
        }
        self.stop_spectating(id);
        let watchers: Vec<ObjectId> = self
            .players
            .get_mut(&id)
            .map(|p| std::mem::take(&mut p.spectators).into_iter().collect())
            .unwrap_or_default();

        self.connected.remove(&id);
        self.living.remove(&id);
        self.sinks.remove(&id);
        self.remove_object(id);

        if let Some(&target) = self.living.iter().next() {
            for watcher in watchers {
                self.spectate(watcher, target);
            }
        }

        self.events.emit(&GameEvent::PlayerLeave { player: id });
        log::info!("Game {}: '{}' ({}) left", self.id, name, id);
        Ok(())
    }

    fn start(&mut self) {
        self.started = true;
        self.events.emit(&GameEvent::GameStarted);
        log::info!("Game {} started with {} players", self.id, self.living.len());
        self.advance_gas();
    }

    /// Move the gas to its next stage and schedule the one after
    pub(crate) fn advance_gas(&mut self) {
        let Some(step) = self.gas.advance(self.now, &mut self.rng) else {
            return;
        };
        if step.prevent_join && self.allow_join {
            self.allow_join = false;
            log::info!("Game {} closed to new players", self.id);
        }
        if let Some(delay) = step.next_in_ms {
            self.timers.schedule(self.now + delay, TimerAction::GasAdvance);
        }
        self.events.emit(&GameEvent::GasAdvance { stage: step.stage });
    }

    /// Point `viewer` at `target`; the next packet of `target` resends its
    /// whole view so the new watcher starts from a complete picture
    pub(crate) fn spectate(&mut self, viewer: ObjectId, target: ObjectId) {
        if viewer == target {
            return;
        }
        self.stop_spectating(viewer);
        let Some(t) = self.players.get_mut(&target) else {
            return;
        };
        t.spectators.insert(viewer);
        t.visible.clear();
        t.ticks_since_visibility = VISIBILITY_REFRESH_TICKS;
        t.dirty = PlayerDirty::all();
        if let Some(v) = self.players.get_mut(&viewer) {
            v.spectating = Some(target);
        }
    }

    fn stop_spectating(&mut self, viewer: ObjectId) {
        let Some(old) = self.players.get_mut(&viewer).and_then(|p| p.spectating.take()) else {
            return;
        };
        if let Some(t) = self.players.get_mut(&old) {
            t.spectators.remove(&viewer);
        }
    }

    pub(crate) fn cancel_player_timers(&mut self, id: ObjectId) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        let handles: Vec<TimerHandle> = [
            player.action.take().map(|a| a.timer),
            player.weapon_timer.take(),
            player.recoil_timer.take(),
            player.invulnerability_timer.take(),
        ]
        .into_iter()
        .flatten()
        .collect();
        player.recoil = None;
        for handle in handles {
            self.timers.cancel(handle);
        }
    }

    /// Scatter everything droppable a player carries at `position`
    pub(crate) fn drop_inventory(&mut self, id: ObjectId, position: Vec2) -> Result<(), SimError> {
        let Some(player) = self.players.get_mut(&id) else {
            return Err(SimError::UnknownPlayer(id));
        };
        let inv = &mut player.inventory;
        let mut drops: Vec<(ItemDef, u32)> = Vec::new();
        let mut magazine_ammo: BTreeMap<String, u32> = BTreeMap::new();

        for slot in 0..SLOT_COUNT {
            let droppable = match inv.slot(slot)? {
                Some(InventoryItem::Melee(m)) => !m.def.no_drop,
                Some(InventoryItem::Gun(_)) => true,
                None => false,
            };
            if !droppable {
                continue;
            }
            match inv.take(slot)? {
                Some(InventoryItem::Gun(gun)) => {
                    if gun.ammo > 0 && !gun.def.infinite_ammo {
                        *magazine_ammo.entry(gun.def.ammo.clone()).or_insert(0) += gun.ammo;
                    }
                    drops.push((ItemDef::Gun(gun.def), 1));
                }
                Some(InventoryItem::Melee(melee)) => drops.push((ItemDef::Melee(melee.def), 1)),
                None => {}
            }
        }

        let mut stacks = inv.take_all_stacks();
        for (ammo, count) in magazine_ammo {
            *stacks.entry(ammo).or_insert(0) += count;
        }
        let stacks: Vec<(String, u32)> = stacks.into_iter().collect();
        if let Some(helmet) = inv.helmet.take() {
            drops.push((ItemDef::Armor(helmet), 1));
        }
        if let Some(vest) = inv.vest.take() {
            drops.push((ItemDef::Armor(vest), 1));
        }
        for scope in inv.scopes() {
            if scope.id != DEFAULT_SCOPE {
                drops.push((ItemDef::Scope(Arc::clone(scope)), 1));
            }
        }
        if inv.backpack.id != DEFAULT_BACKPACK {
            drops.push((ItemDef::Backpack(Arc::clone(&inv.backpack)), 1));
        }
        player.dirty.inventory = true;
        player.dirty.weapons = true;

        for (item_id, count) in stacks {
            let item = self.catalog.item(&item_id)?;
            drops.push((item, count));
        }
        for (item, count) in drops {
            self.drop_item(item, count, position)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sim::snapshot::{ChannelSink, ServerPacket};
    use std::sync::mpsc::{self, Receiver};

    /// Game on the empty debug map that never starts on its own
    pub(crate) fn test_game() -> Game {
        test_game_with(|_| {})
    }

    pub(crate) fn test_game_with(edit: impl FnOnce(&mut Config)) -> Game {
        let mut config = Config {
            map: "debug".to_string(),
            min_players_to_start: 99,
            seed: Some(42),
            ..Config::default()
        };
        edit(&mut config);
        let catalog = Catalog::builtin().expect("builtin catalog");
        Game::new(1, Arc::new(config), Arc::new(catalog)).expect("game")
    }

    /// Join a player and move them to `position`
    pub(crate) fn join_at(game: &mut Game, name: &str, position: Vec2) -> (ObjectId, Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        let id = game.add_player(name, None, Box::new(ChannelSink(tx))).expect("join");
        let player = game.players.get_mut(&id).expect("player");
        player.position = position;
        game.update_grid(id);
        (id, rx)
    }

    pub(crate) fn packets(rx: &Receiver<Vec<u8>>) -> Vec<ServerPacket> {
        rx.try_iter()
            .map(|bytes| serde_json::from_slice(&bytes).expect("decodes"))
            .collect()
    }

    #[test]
    fn test_debug_map_is_empty() {
        let game = test_game();
        assert_eq!(game.object_count(), 0);
        assert_eq!(game.width, 256.0);
    }

    #[test]
    fn test_removed_ids_are_reused_and_reported() {
        let mut game = test_game();
        let catalog = Arc::clone(&game.catalog);
        let a = game
            .spawn_loot(catalog.item("gauze").unwrap(), 1, Vec2::splat(10.0))
            .unwrap();
        assert!(game.full_dirty.contains(&a));
        assert!(game.grid.contains(a));

        game.remove_object(a);
        assert!(game.deleted.contains(&a));
        assert!(!game.full_dirty.contains(&a));
        assert!(!game.grid.contains(a));

        // FIFO reuse hands out fresh ids before recycled ones
        let b = game
            .spawn_loot(catalog.item("gauze").unwrap(), 1, Vec2::splat(10.0))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_building_parts_link_to_parent() {
        let mut game = test_game();
        let def = game.catalog.building("house").unwrap();
        let id = game.spawn_building(def, Vec2::splat(128.0), 1).unwrap();
        let building = &game.buildings[&id];
        assert!(!building.parts.is_empty());
        for part in &building.parts {
            assert_eq!(game.obstacles[part].parent_building, Some(id));
        }
    }

    #[test]
    fn test_join_rules() {
        let mut game = test_game_with(|c| c.max_players = 1);
        let (tx, _rx) = mpsc::channel();
        let id = game.add_player("one", None, Box::new(ChannelSink(tx.clone()))).unwrap();
        assert!(game.players[&id].invulnerable);
        assert!(matches!(
            game.add_player("two", None, Box::new(ChannelSink(tx.clone()))),
            Err(SimError::GameFull)
        ));
        game.allow_join = false;
        game.remove_player(id).unwrap();
        assert!(matches!(
            game.add_player("three", None, Box::new(ChannelSink(tx))),
            Err(SimError::JoinClosed)
        ));
        assert!(matches!(game.remove_player(id), Err(SimError::UnknownPlayer(_))));
    }

    #[test]
    fn test_role_password_grants_role() {
        let mut game = test_game_with(|c| {
            c.roles.insert(
                "dev".into(),
                crate::config::RoleConfig {
                    password: "letmein".into(),
                    is_dev: true,
                },
            );
        });
        let (tx, _rx) = mpsc::channel();
        let id = game.add_player("dev", Some("letmein"), Box::new(ChannelSink(tx))).unwrap();
        assert_eq!(game.players[&id].role.as_deref(), Some("dev"));
        assert!(game.players[&id].is_dev);
    }

    #[test]
    fn test_enough_players_start_the_game() {
        let mut game = test_game_with(|c| c.min_players_to_start = 2);
        join_at(&mut game, "a", Vec2::splat(50.0));
        assert!(!game.started);
        join_at(&mut game, "b", Vec2::splat(60.0));
        assert!(game.started);
        assert_eq!(game.gas.stage, 1);
    }

    #[test]
    fn test_leaving_drops_inventory() {
        let mut game = test_game();
        let (id, _rx) = join_at(&mut game, "a", Vec2::splat(100.0));
        let gun = game.catalog.gun("ak47").unwrap();
        let player = game.players.get_mut(&id).unwrap();
        player
            .inventory
            .put(0, InventoryItem::Gun(crate::sim::inventory::GunItem::new(gun)))
            .unwrap();
        player.inventory.add_stack("gauze", 2);

        game.remove_player(id).unwrap();
        let dropped: BTreeSet<String> = game.loot.values().map(|l| l.item.id().to_string()).collect();
        assert!(dropped.contains("ak47"));
        assert!(dropped.contains("gauze"));
        assert!(!dropped.contains(DEFAULT_MELEE));
        assert!(game.deleted.contains(&id));
    }
}
