//! Reference data
//!
//! Immutable definition tables for every item, obstacle, building, explosion,
//! loot table and map. Loaded once (normally from the embedded
//! `data/catalog.json`) and shared between games through an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::hitbox::Hitbox;
use crate::error::SimError;

const BUILTIN_CATALOG: &str = include_str!("../../data/catalog.json");

fn one() -> f32 {
    1.0
}

fn one_u32() -> u32 {
    1
}

fn default_hit_delay() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FireMode {
    Single,
    Auto,
    /// `shots` rounds `delay_ms` apart, then `cooldown_ms` before the next burst
    Burst {
        shots: u32,
        delay_ms: u64,
        cooldown_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Penetration {
    #[serde(default)]
    pub players: bool,
    #[serde(default)]
    pub obstacles: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulletDef {
    pub damage: f32,
    #[serde(default = "one")]
    pub obstacle_multiplier: f32,
    /// Units per second
    pub speed: f32,
    pub range: f32,
    #[serde(default)]
    pub penetration: Penetration,
    /// Passes through metal instead of bouncing off it
    #[serde(default)]
    pub no_reflect: bool,
    /// Ignores the impenetrable flag of obstacles
    #[serde(default)]
    pub piercing: bool,
    #[serde(default)]
    pub on_hit_explosion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GunDef {
    pub id: String,
    pub ammo: String,
    pub capacity: u32,
    pub reload_ms: u64,
    /// Reload loads one round at a time
    #[serde(default)]
    pub single_reload: bool,
    pub fire_delay_ms: u64,
    pub fire_mode: FireMode,
    #[serde(default = "one_u32")]
    pub pellets: u32,
    /// Full cone angle in radians
    #[serde(default)]
    pub spread: f32,
    #[serde(default = "one")]
    pub recoil_multiplier: f32,
    #[serde(default)]
    pub recoil_duration_ms: u64,
    #[serde(default = "one")]
    pub speed_multiplier: f32,
    #[serde(default)]
    pub barrel_length: f32,
    /// Never consumes ammo
    #[serde(default)]
    pub infinite_ammo: bool,
    pub bullet: BulletDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeleeDef {
    pub id: String,
    pub damage: f32,
    #[serde(default = "one")]
    pub obstacle_multiplier: f32,
    pub radius: f32,
    /// Hit circle center relative to the player, facing +x
    pub offset: Vec2,
    pub cooldown_ms: u64,
    #[serde(default = "default_hit_delay")]
    pub hit_delay_ms: u64,
    #[serde(default)]
    pub auto: bool,
    #[serde(default)]
    pub piercing: bool,
    #[serde(default = "one")]
    pub speed_multiplier: f32,
    /// Never dropped on death
    #[serde(default)]
    pub no_drop: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmmoDef {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealType {
    Health,
    Adrenaline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingDef {
    pub id: String,
    pub heal_type: HealType,
    pub restore: f32,
    pub use_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmorSlot {
    Helmet,
    Vest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmorDef {
    pub id: String,
    pub slot: ArmorSlot,
    pub level: u8,
    pub damage_reduction: f32,
    #[serde(default = "one")]
    pub speed_multiplier: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeDef {
    pub id: String,
    pub zoom: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackpackDef {
    pub id: String,
    pub level: u8,
    /// Carry limit per stackable item id
    pub capacity: HashMap<String, u32>,
    #[serde(default = "one")]
    pub speed_multiplier: f32,
}

/// Any item that can exist as loot
#[derive(Debug, Clone)]
pub enum ItemDef {
    Gun(Arc<GunDef>),
    Melee(Arc<MeleeDef>),
    Ammo(Arc<AmmoDef>),
    Healing(Arc<HealingDef>),
    Armor(Arc<ArmorDef>),
    Scope(Arc<ScopeDef>),
    Backpack(Arc<BackpackDef>),
}

impl ItemDef {
    pub fn id(&self) -> &str {
        match self {
            ItemDef::Gun(d) => &d.id,
            ItemDef::Melee(d) => &d.id,
            ItemDef::Ammo(d) => &d.id,
            ItemDef::Healing(d) => &d.id,
            ItemDef::Armor(d) => &d.id,
            ItemDef::Scope(d) => &d.id,
            ItemDef::Backpack(d) => &d.id,
        }
    }

    /// Stackable items are counted in the inventory rather than slotted
    pub fn is_stackable(&self) -> bool {
        matches!(self, ItemDef::Ammo(_) | ItemDef::Healing(_))
    }

    /// Radius of the loot circle for this item
    pub fn loot_radius(&self) -> f32 {
        match self {
            ItemDef::Gun(_) | ItemDef::Melee(_) => 3.4,
            ItemDef::Ammo(_) => 2.0,
            ItemDef::Healing(_) => 2.5,
            ItemDef::Armor(_) | ItemDef::Backpack(_) | ItemDef::Scope(_) => 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Material {
    Tree,
    Stone,
    Bush,
    Crate,
    Metal,
    Wood,
    Glass,
    Appliance,
}

impl Material {
    pub fn reflects_bullets(self) -> bool {
        matches!(self, Material::Metal | Material::Appliance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationMode {
    /// Any angle (visual only, hitbox is not turned)
    Full,
    /// One of four quarter turns
    Limited,
    /// Unrotated or one quarter turn
    Binary,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScaleDef {
    #[serde(default = "one")]
    pub spawn_min: f32,
    #[serde(default = "one")]
    pub spawn_max: f32,
    pub destroy: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorDef {
    /// Hinge point in the door's local frame
    pub hinge: Vec2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstacleDef {
    pub id: String,
    pub material: Material,
    pub health: f32,
    pub scale: ScaleDef,
    pub hitbox: Hitbox,
    /// Area kept clear at map generation; the hitbox when absent
    #[serde(default)]
    pub spawn_hitbox: Option<Hitbox>,
    #[serde(default)]
    pub rotation_mode: RotationMode,
    #[serde(default)]
    pub indestructible: bool,
    /// Only piercing weapons can damage it
    #[serde(default)]
    pub impenetrable: bool,
    /// Players walk through it (bushes)
    #[serde(default)]
    pub no_collisions: bool,
    /// Structural wall of a building
    #[serde(default)]
    pub is_wall: bool,
    /// Stays collidable when shattered
    #[serde(default)]
    pub is_window: bool,
    #[serde(default)]
    pub door: Option<DoorDef>,
    #[serde(default)]
    pub loot_table: Option<String>,
    #[serde(default)]
    pub loot_offset: Vec2,
    #[serde(default)]
    pub explosion: Option<String>,
    /// Terrain the obstacle may spawn on
    #[serde(default = "default_true")]
    pub avoid_water: bool,
}

impl ObstacleDef {
    pub fn reflects_bullets(&self) -> bool {
        self.material.reflects_bullets()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingPart {
    pub id: String,
    pub position: Vec2,
    #[serde(default)]
    pub orientation: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingDef {
    pub id: String,
    pub spawn_hitbox: Hitbox,
    pub ceiling_hitbox: Hitbox,
    /// Standing inside this raises the player's view
    pub scope_hitbox: Hitbox,
    pub zoom_bonus: f32,
    /// Destroyed walls needed to collapse the ceiling
    pub walls_to_destroy: u32,
    pub obstacles: Vec<BuildingPart>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RadiusRange {
    pub min: f32,
    pub max: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleSpawn {
    pub id: String,
    pub count: u32,
    pub speed: f32,
    pub lifetime_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplosionDef {
    pub id: String,
    pub damage: f32,
    #[serde(default = "one")]
    pub obstacle_multiplier: f32,
    pub radius: RadiusRange,
    /// Speed given to loot caught in the blast
    #[serde(default)]
    pub loot_push: f32,
    #[serde(default)]
    pub decal: Option<String>,
    #[serde(default)]
    pub particles: Option<ParticleSpawn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootEntry {
    /// Item id, or `None` for an empty roll
    pub item: Option<String>,
    #[serde(default = "one_u32")]
    pub count: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootTable {
    pub id: String,
    #[serde(default = "one_u32")]
    pub rolls: u32,
    pub entries: Vec<LootEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    pub id: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDef {
    pub id: String,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub ocean_size: f32,
    #[serde(default)]
    pub beach_size: f32,
    #[serde(default)]
    pub rivers: u32,
    #[serde(default)]
    pub buildings: Vec<Placement>,
    #[serde(default)]
    pub obstacles: Vec<Placement>,
    /// Loot tables rolled at random ground positions
    #[serde(default)]
    pub loot: Vec<Placement>,
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    guns: Vec<GunDef>,
    melees: Vec<MeleeDef>,
    ammo: Vec<AmmoDef>,
    healing: Vec<HealingDef>,
    armor: Vec<ArmorDef>,
    scopes: Vec<ScopeDef>,
    backpacks: Vec<BackpackDef>,
    obstacles: Vec<ObstacleDef>,
    buildings: Vec<BuildingDef>,
    explosions: Vec<ExplosionDef>,
    loot_tables: Vec<LootTable>,
    maps: Vec<MapDef>,
}

fn table<T>(defs: impl IntoIterator<Item = (String, T)>) -> HashMap<String, Arc<T>> {
    defs.into_iter().map(|(id, d)| (id, Arc::new(d))).collect()
}

fn lookup<T>(
    map: &HashMap<String, Arc<T>>,
    kind: &'static str,
    id: &str,
) -> Result<Arc<T>, SimError> {
    map.get(id).cloned().ok_or_else(|| SimError::missing(kind, id))
}

/// Default equipment every player spawns with
pub const DEFAULT_MELEE: &str = "fists";
pub const DEFAULT_SCOPE: &str = "1x_scope";
pub const DEFAULT_BACKPACK: &str = "bag";
pub const DEATH_MARKER_DECAL: &str = "death_marker";

#[derive(Debug, Clone)]
pub struct Catalog {
    guns: HashMap<String, Arc<GunDef>>,
    melees: HashMap<String, Arc<MeleeDef>>,
    ammo: HashMap<String, Arc<AmmoDef>>,
    healing: HashMap<String, Arc<HealingDef>>,
    armor: HashMap<String, Arc<ArmorDef>>,
    scopes: HashMap<String, Arc<ScopeDef>>,
    backpacks: HashMap<String, Arc<BackpackDef>>,
    obstacles: HashMap<String, Arc<ObstacleDef>>,
    buildings: HashMap<String, Arc<BuildingDef>>,
    explosions: HashMap<String, Arc<ExplosionDef>>,
    loot_tables: HashMap<String, Arc<LootTable>>,
    maps: HashMap<String, Arc<MapDef>>,
}

impl Catalog {
    /// The catalog shipped with the crate
    pub fn builtin() -> Result<Self, SimError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Parse and cross-check a catalog.
    ///
    /// Malformed JSON is reported as a missing `catalog`; dangling references
    /// between tables are reported as the first missing definition found.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let raw: RawCatalog = serde_json::from_str(json).map_err(|e| {
            log::error!("Catalog parse error: {}", e);
            SimError::missing("catalog", e.to_string())
        })?;
        let catalog = Self {
            guns: table(raw.guns.into_iter().map(|d| (d.id.clone(), d))),
            melees: table(raw.melees.into_iter().map(|d| (d.id.clone(), d))),
            ammo: table(raw.ammo.into_iter().map(|d| (d.id.clone(), d))),
            healing: table(raw.healing.into_iter().map(|d| (d.id.clone(), d))),
            armor: table(raw.armor.into_iter().map(|d| (d.id.clone(), d))),
            scopes: table(raw.scopes.into_iter().map(|d| (d.id.clone(), d))),
            backpacks: table(raw.backpacks.into_iter().map(|d| (d.id.clone(), d))),
            obstacles: table(raw.obstacles.into_iter().map(|d| (d.id.clone(), d))),
            buildings: table(raw.buildings.into_iter().map(|d| (d.id.clone(), d))),
            explosions: table(raw.explosions.into_iter().map(|d| (d.id.clone(), d))),
            loot_tables: table(raw.loot_tables.into_iter().map(|d| (d.id.clone(), d))),
            maps: table(raw.maps.into_iter().map(|d| (d.id.clone(), d))),
        };
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), SimError> {
        for gun in self.guns.values() {
            self.ammo(&gun.ammo)?;
            if let Some(explosion) = &gun.bullet.on_hit_explosion {
                self.explosion(explosion)?;
            }
        }
        for obstacle in self.obstacles.values() {
            if let Some(table) = &obstacle.loot_table {
                self.loot_table(table)?;
            }
            if let Some(explosion) = &obstacle.explosion {
                self.explosion(explosion)?;
            }
        }
        for building in self.buildings.values() {
            for part in &building.obstacles {
                self.obstacle(&part.id)?;
            }
        }
        for table in self.loot_tables.values() {
            for item in table.entries.iter().filter_map(|e| e.item.as_deref()) {
                self.item(item)?;
            }
        }
        for map in self.maps.values() {
            for p in &map.buildings {
                self.building(&p.id)?;
            }
            for p in &map.obstacles {
                self.obstacle(&p.id)?;
            }
            for p in &map.loot {
                self.loot_table(&p.id)?;
            }
        }
        self.melee(DEFAULT_MELEE)?;
        self.scope(DEFAULT_SCOPE)?;
        self.backpack(DEFAULT_BACKPACK)?;
        Ok(())
    }

    pub fn gun(&self, id: &str) -> Result<Arc<GunDef>, SimError> {
        lookup(&self.guns, "gun", id)
    }

    pub fn melee(&self, id: &str) -> Result<Arc<MeleeDef>, SimError> {
        lookup(&self.melees, "melee", id)
    }

    pub fn ammo(&self, id: &str) -> Result<Arc<AmmoDef>, SimError> {
        lookup(&self.ammo, "ammo", id)
    }

    pub fn healing(&self, id: &str) -> Result<Arc<HealingDef>, SimError> {
        lookup(&self.healing, "healing item", id)
    }

    pub fn armor(&self, id: &str) -> Result<Arc<ArmorDef>, SimError> {
        lookup(&self.armor, "armor", id)
    }

    pub fn scope(&self, id: &str) -> Result<Arc<ScopeDef>, SimError> {
        lookup(&self.scopes, "scope", id)
    }

    pub fn backpack(&self, id: &str) -> Result<Arc<BackpackDef>, SimError> {
        lookup(&self.backpacks, "backpack", id)
    }

    pub fn obstacle(&self, id: &str) -> Result<Arc<ObstacleDef>, SimError> {
        lookup(&self.obstacles, "obstacle", id)
    }

    pub fn building(&self, id: &str) -> Result<Arc<BuildingDef>, SimError> {
        lookup(&self.buildings, "building", id)
    }

    pub fn explosion(&self, id: &str) -> Result<Arc<ExplosionDef>, SimError> {
        lookup(&self.explosions, "explosion", id)
    }

    pub fn loot_table(&self, id: &str) -> Result<Arc<LootTable>, SimError> {
        lookup(&self.loot_tables, "loot table", id)
    }

    pub fn map(&self, id: &str) -> Result<Arc<MapDef>, SimError> {
        lookup(&self.maps, "map", id)
    }

    /// Resolve any lootable item id
    pub fn item(&self, id: &str) -> Result<ItemDef, SimError> {
        if let Some(d) = self.guns.get(id) {
            return Ok(ItemDef::Gun(Arc::clone(d)));
        }
        if let Some(d) = self.melees.get(id) {
            return Ok(ItemDef::Melee(Arc::clone(d)));
        }
        if let Some(d) = self.ammo.get(id) {
            return Ok(ItemDef::Ammo(Arc::clone(d)));
        }
        if let Some(d) = self.healing.get(id) {
            return Ok(ItemDef::Healing(Arc::clone(d)));
        }
        if let Some(d) = self.armor.get(id) {
            return Ok(ItemDef::Armor(Arc::clone(d)));
        }
        if let Some(d) = self.scopes.get(id) {
            return Ok(ItemDef::Scope(Arc::clone(d)));
        }
        if let Some(d) = self.backpacks.get(id) {
            return Ok(ItemDef::Backpack(Arc::clone(d)));
        }
        Err(SimError::missing("item", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = Catalog::builtin().expect("builtin catalog is consistent");
        assert!(catalog.gun("ak47").is_ok());
        assert!(matches!(catalog.item("gauze"), Ok(ItemDef::Healing(_))));
        assert!(catalog.map("main").is_ok());
        assert_eq!(catalog.healing("medikit").unwrap().restore, 100.0);
    }

    #[test]
    fn test_unknown_id_is_missing_reference() {
        let catalog = Catalog::builtin().unwrap();
        match catalog.obstacle("not_a_thing") {
            Err(SimError::MissingReference { kind, id }) => {
                assert_eq!(kind, "obstacle");
                assert_eq!(id, "not_a_thing");
            }
            other => panic!("expected missing reference, got {other:?}"),
        }
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let json = BUILTIN_CATALOG.replace("\"ammo\": \"9mm\"", "\"ammo\": \"9mm_typo\"");
        assert!(matches!(
            Catalog::from_json(&json),
            Err(SimError::MissingReference { kind: "ammo", .. })
        ));
    }
}
