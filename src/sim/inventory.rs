//! Player inventory
//!
//! Three weapon slots (two guns and a melee), counted stacks for ammo and
//! healing items capped by the backpack, armor, scopes, and the single timed
//! action a player may have running.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::catalog::{ArmorDef, ArmorSlot, BackpackDef, GunDef, HealingDef, MeleeDef, ScopeDef};
use super::timers::TimerHandle;
use crate::error::SimError;

pub const GUN_SLOTS: usize = 2;
pub const MELEE_SLOT: usize = 2;
pub const SLOT_COUNT: usize = 3;

#[derive(Debug, Clone)]
pub struct GunItem {
    pub def: Arc<GunDef>,
    pub ammo: u32,
    pub last_use: Option<u64>,
    pub kills: u32,
}

impl GunItem {
    pub fn new(def: Arc<GunDef>) -> Self {
        Self {
            def,
            ammo: 0,
            last_use: None,
            kills: 0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.ammo >= self.def.capacity
    }
}

#[derive(Debug, Clone)]
pub struct MeleeItem {
    pub def: Arc<MeleeDef>,
    pub last_use: Option<u64>,
    pub kills: u32,
}

impl MeleeItem {
    pub fn new(def: Arc<MeleeDef>) -> Self {
        Self {
            def,
            last_use: None,
            kills: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum InventoryItem {
    Gun(GunItem),
    Melee(MeleeItem),
}

impl InventoryItem {
    pub fn id(&self) -> &str {
        match self {
            InventoryItem::Gun(g) => &g.def.id,
            InventoryItem::Melee(m) => &m.def.id,
        }
    }

    pub fn speed_multiplier(&self) -> f32 {
        match self {
            InventoryItem::Gun(g) => g.def.speed_multiplier,
            InventoryItem::Melee(m) => m.def.speed_multiplier,
        }
    }

    pub fn add_kill(&mut self) {
        match self {
            InventoryItem::Gun(g) => g.kills += 1,
            InventoryItem::Melee(m) => m.kills += 1,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ActionKind {
    Reload,
    Heal(Arc<HealingDef>),
}

/// A cancellable timed action (reload or healing)
#[derive(Debug, Clone)]
pub struct Action {
    pub kind: ActionKind,
    pub timer: TimerHandle,
    pub started_at: u64,
    pub duration_ms: u64,
}

impl Action {
    pub fn speed_multiplier(&self) -> f32 {
        match self.kind {
            ActionKind::Reload => 1.0,
            ActionKind::Heal(_) => 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Inventory {
    slots: [Option<InventoryItem>; SLOT_COUNT],
    active: usize,
    last_active: usize,
    items: BTreeMap<String, u32>,
    pub backpack: Arc<BackpackDef>,
    pub helmet: Option<Arc<ArmorDef>>,
    pub vest: Option<Arc<ArmorDef>>,
    scopes: Vec<Arc<ScopeDef>>,
    scope: Arc<ScopeDef>,
}

impl Inventory {
    pub fn new(melee: Arc<MeleeDef>, scope: Arc<ScopeDef>, backpack: Arc<BackpackDef>) -> Self {
        Self {
            slots: [None, None, Some(InventoryItem::Melee(MeleeItem::new(melee)))],
            active: MELEE_SLOT,
            last_active: MELEE_SLOT,
            items: BTreeMap::new(),
            backpack,
            helmet: None,
            vest: None,
            scopes: vec![Arc::clone(&scope)],
            scope,
        }
    }

    fn check_slot(slot: usize) -> Result<(), SimError> {
        if slot < SLOT_COUNT {
            Ok(())
        } else {
            Err(SimError::InvalidSlot(slot))
        }
    }

    pub fn slot(&self, slot: usize) -> Result<Option<&InventoryItem>, SimError> {
        Self::check_slot(slot)?;
        Ok(self.slots[slot].as_ref())
    }

    pub fn slot_mut(&mut self, slot: usize) -> Result<Option<&mut InventoryItem>, SimError> {
        Self::check_slot(slot)?;
        Ok(self.slots[slot].as_mut())
    }

    pub fn active_slot(&self) -> usize {
        self.active
    }

    pub fn last_active_slot(&self) -> usize {
        self.last_active
    }

    pub fn active_item(&self) -> Option<&InventoryItem> {
        self.slots[self.active].as_ref()
    }

    pub fn active_item_mut(&mut self) -> Option<&mut InventoryItem> {
        self.slots[self.active].as_mut()
    }

    /// Switch to `slot`. Returns whether the active slot changed; an empty
    /// slot is not selectable.
    pub fn set_active(&mut self, slot: usize) -> Result<bool, SimError> {
        Self::check_slot(slot)?;
        if slot == self.active || self.slots[slot].is_none() {
            return Ok(false);
        }
        self.last_active = self.active;
        self.active = slot;
        Ok(true)
    }

    /// Put `item` into `slot`, returning whatever was there
    pub fn put(&mut self, slot: usize, item: InventoryItem) -> Result<Option<InventoryItem>, SimError> {
        Self::check_slot(slot)?;
        Ok(self.slots[slot].replace(item))
    }

    /// Empty `slot`. Emptying the active slot falls back to another weapon.
    pub fn take(&mut self, slot: usize) -> Result<Option<InventoryItem>, SimError> {
        Self::check_slot(slot)?;
        let removed = self.slots[slot].take();
        if removed.is_some() && slot == self.active {
            let fallback = [self.last_active, MELEE_SLOT, 0, 1]
                .into_iter()
                .find(|s| self.slots[*s].is_some());
            if let Some(fallback) = fallback {
                self.active = fallback;
            }
        }
        Ok(removed)
    }

    pub fn first_free_gun_slot(&self) -> Option<usize> {
        (0..GUN_SLOTS).find(|s| self.slots[*s].is_none())
    }

    pub fn weapons(&self) -> impl Iterator<Item = (usize, &InventoryItem)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|item| (i, item)))
    }

    pub fn count(&self, id: &str) -> u32 {
        self.items.get(id).copied().unwrap_or(0)
    }

    /// Carry limit for a stackable item under the current backpack
    pub fn capacity(&self, id: &str) -> u32 {
        self.backpack.capacity.get(id).copied().unwrap_or(0)
    }

    /// Add up to the carry limit; returns what did not fit
    pub fn add_stack(&mut self, id: &str, count: u32) -> u32 {
        let held = self.count(id);
        let room = self.capacity(id).saturating_sub(held);
        let added = room.min(count);
        if added > 0 {
            *self.items.entry(id.to_string()).or_insert(0) += added;
        }
        count - added
    }

    /// Remove up to `count`; returns how many were removed
    pub fn remove_stack(&mut self, id: &str, count: u32) -> u32 {
        let Some(held) = self.items.get_mut(id) else {
            return 0;
        };
        let removed = (*held).min(count);
        *held -= removed;
        if *held == 0 {
            self.items.remove(id);
        }
        removed
    }

    /// Every stack held, in id order
    pub fn stacks(&self) -> impl Iterator<Item = (&str, u32)> {
        self.items.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn take_all_stacks(&mut self) -> BTreeMap<String, u32> {
        std::mem::take(&mut self.items)
    }

    /// Equip armor, returning the piece it replaces
    pub fn equip_armor(&mut self, armor: Arc<ArmorDef>) -> Option<Arc<ArmorDef>> {
        match armor.slot {
            ArmorSlot::Helmet => self.helmet.replace(armor),
            ArmorSlot::Vest => self.vest.replace(armor),
        }
    }

    pub fn armor_level(&self, slot: ArmorSlot) -> u8 {
        let piece = match slot {
            ArmorSlot::Helmet => &self.helmet,
            ArmorSlot::Vest => &self.vest,
        };
        piece.as_ref().map_or(0, |a| a.level)
    }

    /// Fraction of non-piercing damage absorbed by armor
    pub fn damage_reduction(&self) -> f32 {
        let helmet = self.helmet.as_ref().map_or(0.0, |a| a.damage_reduction);
        let vest = self.vest.as_ref().map_or(0.0, |a| a.damage_reduction);
        (helmet + vest).min(1.0)
    }

    /// Speed factor from worn equipment
    pub fn equipment_speed_multiplier(&self) -> f32 {
        let armor: f32 = [&self.helmet, &self.vest]
            .into_iter()
            .flatten()
            .map(|a| a.speed_multiplier)
            .product();
        armor * self.backpack.speed_multiplier
    }

    pub fn has_scope(&self, id: &str) -> bool {
        self.scopes.iter().any(|s| s.id == id)
    }

    /// Add a scope; it becomes active when it zooms further than the current one
    pub fn add_scope(&mut self, scope: Arc<ScopeDef>) -> bool {
        if self.has_scope(&scope.id) {
            return false;
        }
        if scope.zoom > self.scope.zoom {
            self.scope = Arc::clone(&scope);
        }
        self.scopes.push(scope);
        true
    }

    pub fn set_scope(&mut self, id: &str) -> bool {
        match self.scopes.iter().find(|s| s.id == id) {
            Some(scope) => {
                self.scope = Arc::clone(scope);
                true
            }
            None => false,
        }
    }

    pub fn scope(&self) -> &Arc<ScopeDef> {
        &self.scope
    }

    pub fn scopes(&self) -> &[Arc<ScopeDef>] {
        &self.scopes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::catalog::{Catalog, DEFAULT_BACKPACK, DEFAULT_MELEE, DEFAULT_SCOPE};

    fn inventory() -> (Catalog, Inventory) {
        let catalog = Catalog::builtin().unwrap();
        let inv = Inventory::new(
            catalog.melee(DEFAULT_MELEE).unwrap(),
            catalog.scope(DEFAULT_SCOPE).unwrap(),
            catalog.backpack(DEFAULT_BACKPACK).unwrap(),
        );
        (catalog, inv)
    }

    #[test]
    fn test_invalid_slot_rejected() {
        let (_, mut inv) = inventory();
        assert!(matches!(inv.set_active(3), Err(SimError::InvalidSlot(3))));
        assert!(matches!(inv.slot(7), Err(SimError::InvalidSlot(7))));
    }

    #[test]
    fn test_empty_slot_not_selectable() {
        let (catalog, mut inv) = inventory();
        assert_eq!(inv.set_active(0).unwrap(), false);
        inv.put(0, InventoryItem::Gun(GunItem::new(catalog.gun("ak47").unwrap())))
            .unwrap();
        assert!(inv.set_active(0).unwrap());
        assert_eq!(inv.active_item().map(InventoryItem::id), Some("ak47"));

        inv.take(0).unwrap();
        assert_eq!(inv.active_slot(), MELEE_SLOT);
    }

    #[test]
    fn test_stacks_capped_by_backpack() {
        let (catalog, mut inv) = inventory();
        assert_eq!(inv.add_stack("gauze", 7), 2);
        assert_eq!(inv.count("gauze"), 5);

        inv.backpack = catalog.backpack("basic_pack").unwrap();
        assert_eq!(inv.add_stack("gauze", 7), 2);
        assert_eq!(inv.count("gauze"), 10);
        assert_eq!(inv.remove_stack("gauze", 12), 10);
        assert_eq!(inv.count("gauze"), 0);
    }

    #[test]
    fn test_better_scope_auto_equips() {
        let (catalog, mut inv) = inventory();
        assert!(inv.add_scope(catalog.scope("4x_scope").unwrap()));
        assert!(inv.add_scope(catalog.scope("2x_scope").unwrap()));
        assert_eq!(inv.scope().id, "4x_scope");
        assert!(!inv.add_scope(catalog.scope("2x_scope").unwrap()));
    }
}
