//! Interaction: picking up loot and toggling doors

use std::sync::Arc;

use super::Game;
use super::catalog::{DEFAULT_BACKPACK, ItemDef};
use super::events::GameEvent;
use super::hitbox::Hitbox;
use super::ids::ObjectId;
use super::inventory::{GUN_SLOTS, GunItem, InventoryItem, MELEE_SLOT, MeleeItem};
use super::objects::ObjectKind;
use crate::angle_between;
use crate::consts::DOOR_INTERACT_RADIUS;
use crate::error::SimError;

/// Speed loot is shoved away with when it cannot be taken
const REJECT_PUSH_SPEED: f32 = 7.0;

impl Game {
    /// Nearest loot the player overlaps or door in reach
    pub fn interaction_target(&self, id: ObjectId) -> Option<ObjectId> {
        let player = self.players.get(&id).filter(|p| !p.dead)?;
        let body = player.hitbox();
        let reach = Hitbox::circle(DOOR_INTERACT_RADIUS, player.position);
        self.grid
            .intersects_hitbox(&reach)
            .into_iter()
            .filter_map(|target| {
                let (position, close) = match self.kinds.get(&target)? {
                    ObjectKind::Loot => {
                        let loot = self.loot.get(&target)?;
                        (loot.position, body.collides_with(&loot.hitbox()))
                    }
                    ObjectKind::Obstacle => {
                        let door = self.obstacles.get(&target).filter(|o| o.is_door() && !o.dead)?;
                        (door.position, door.hitbox.collides_with(&reach))
                    }
                    _ => return None,
                };
                close.then(|| (player.position.distance_squared(position), target))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, target)| target)
    }

    /// `Interact` input
    pub fn interact(&mut self, id: ObjectId) -> Result<(), SimError> {
        let Some(target) = self.interaction_target(id) else {
            return Ok(());
        };
        if !self.events.emit(&GameEvent::Interact { player: id, target }) {
            return Ok(());
        }
        match self.kinds.get(&target) {
            Some(ObjectKind::Loot) => {
                self.pickup_loot(id, target)?;
            }
            Some(ObjectKind::Obstacle) => self.toggle_door(id, target),
            _ => {}
        }
        Ok(())
    }

    pub fn toggle_door(&mut self, player: ObjectId, door: ObjectId) {
        let Some(actor) = self.players.get(&player).map(|p| p.position) else {
            return;
        };
        let toggled = self
            .obstacles
            .get_mut(&door)
            .is_some_and(|o| o.toggle_door(actor));
        if toggled {
            self.update_grid(door);
            self.mark_partial(door);
        }
    }

    /// Try to take `loot_id`. Returns whether anything was taken; loot that
    /// could not be taken (in full or in part) is pushed away.
    pub fn pickup_loot(&mut self, id: ObjectId, loot_id: ObjectId) -> Result<bool, SimError> {
        let Some(loot) = self.loot.get(&loot_id) else {
            return Err(SimError::missing("loot object", loot_id.to_string()));
        };
        let (item, count) = (loot.item.clone(), loot.count);
        let player = self.players.get(&id).ok_or(SimError::UnknownPlayer(id))?;
        if player.dead {
            return Ok(false);
        }
        let position = player.position;

        if !self.events.emit(&GameEvent::LootPickup {
            player: id,
            loot: loot_id,
            item: item.id().to_string(),
        }) {
            return Ok(false);
        }

        let Some(player) = self.players.get_mut(&id) else {
            return Ok(false);
        };
        let inv = &mut player.inventory;
        let mut dropped: Option<ItemDef> = None;
        let mut replaced_active = false;
        let mut left = 0;
        let taken = match &item {
            ItemDef::Gun(def) => {
                let slot = match inv.first_free_gun_slot() {
                    Some(slot) => slot,
                    None if inv.active_slot() < GUN_SLOTS => inv.active_slot(),
                    None => 0,
                };
                let fresh = InventoryItem::Gun(GunItem::new(Arc::clone(def)));
                replaced_active = slot == inv.active_slot() && inv.slot(slot)?.is_some();
                if let Some(InventoryItem::Gun(old)) = inv.put(slot, fresh)? {
                    if old.ammo > 0 && !old.def.infinite_ammo {
                        inv.add_stack(&old.def.ammo, old.ammo);
                    }
                    dropped = Some(ItemDef::Gun(old.def));
                }
                if inv.active_slot() == MELEE_SLOT {
                    inv.set_active(slot)?;
                }
                player.dirty.weapons = true;
                true
            }
            ItemDef::Melee(def) => {
                let fresh = InventoryItem::Melee(MeleeItem::new(Arc::clone(def)));
                replaced_active = inv.active_slot() == MELEE_SLOT;
                if let Some(InventoryItem::Melee(old)) = inv.put(MELEE_SLOT, fresh)? {
                    if !old.def.no_drop {
                        dropped = Some(ItemDef::Melee(old.def));
                    }
                }
                player.dirty.weapons = true;
                true
            }
            ItemDef::Ammo(_) | ItemDef::Healing(_) => {
                left = inv.add_stack(item.id(), count);
                player.dirty.inventory = true;
                left < count
            }
            ItemDef::Armor(def) => {
                if def.level > inv.armor_level(def.slot) {
                    dropped = inv.equip_armor(Arc::clone(def)).map(ItemDef::Armor);
                    player.dirty.inventory = true;
                    true
                } else {
                    false
                }
            }
            ItemDef::Backpack(def) => {
                if def.level > inv.backpack.level {
                    let old = std::mem::replace(&mut inv.backpack, Arc::clone(def));
                    if old.id != DEFAULT_BACKPACK {
                        dropped = Some(ItemDef::Backpack(old));
                    }
                    player.dirty.inventory = true;
                    true
                } else {
                    false
                }
            }
            ItemDef::Scope(def) => {
                let added = inv.add_scope(Arc::clone(def));
                if added {
                    player.dirty.inventory = true;
                }
                added
            }
        };

        if replaced_active {
            self.interrupt_weapon(id);
        }
        if !taken || left > 0 {
            if let Some(loot) = self.loot.get_mut(&loot_id) {
                loot.push(angle_between(position, loot.position), REJECT_PUSH_SPEED);
                if taken {
                    loot.count = left;
                }
            }
            if taken {
                self.mark_full(loot_id);
            }
        } else {
            self.remove_object(loot_id);
        }
        if let Some(old) = dropped {
            self.drop_item(old, 1, position)?;
        }
        if taken {
            self.mark_partial(id);
            log::debug!("Player {} picked up {} x{}", id, item.id(), count - left);
        }
        Ok(taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::events::EventKind;
    use crate::sim::state::tests::{join_at, test_game};
    use glam::Vec2;

    fn loot_at(game: &mut Game, item: &str, count: u32, position: Vec2) -> ObjectId {
        let item = game.catalog.item(item).unwrap();
        game.spawn_loot(item, count, position).unwrap()
    }

    #[test]
    fn test_gun_goes_to_free_slot_and_is_equipped() {
        let mut game = test_game();
        let (id, _rx) = join_at(&mut game, "a", Vec2::splat(100.0));
        let loot = loot_at(&mut game, "ak47", 1, Vec2::splat(100.0));
        game.interact(id).unwrap();
        assert!(!game.loot.contains_key(&loot));
        assert!(game.deleted.contains(&loot));
        let inv = &game.players[&id].inventory;
        assert_eq!(inv.active_slot(), 0);
        assert_eq!(inv.active_item().map(|i| i.id()), Some("ak47"));
    }

    #[test]
    fn test_full_gun_slots_swap_active_gun() {
        let mut game = test_game();
        let (id, _rx) = join_at(&mut game, "a", Vec2::splat(100.0));
        for gun in ["g19", "hp18"] {
            loot_at(&mut game, gun, 1, Vec2::splat(100.0));
            game.interact(id).unwrap();
        }
        loot_at(&mut game, "mosin", 1, Vec2::splat(100.0));
        game.interact(id).unwrap();
        let inv = &game.players[&id].inventory;
        assert_eq!(inv.slot(0).unwrap().map(|i| i.id()), Some("mosin"));
        assert_eq!(inv.slot(1).unwrap().map(|i| i.id()), Some("hp18"));
        // The swapped g19 is back on the ground
        assert!(game.loot.values().any(|l| l.item.id() == "g19"));
    }

    #[test]
    fn test_swapping_active_gun_abandons_reload() {
        let mut game = test_game();
        let (id, _rx) = join_at(&mut game, "a", Vec2::splat(100.0));
        for gun in ["g19", "hp18"] {
            loot_at(&mut game, gun, 1, Vec2::splat(100.0));
            game.interact(id).unwrap();
        }
        game.players.get_mut(&id).unwrap().inventory.add_stack("9mm", 60);
        game.reload(id);
        assert!(game.players[&id].action.is_some());

        loot_at(&mut game, "mosin", 1, Vec2::splat(100.0));
        game.interact(id).unwrap();
        let player = &game.players[&id];
        assert_eq!(player.inventory.active_item().map(|i| i.id()), Some("mosin"));
        assert!(player.action.is_none());
        assert!(player.weapon_timer.is_none());

        game.now += 5000;
        game.run_timers().unwrap();
        match game.players[&id].inventory.slot(0).unwrap() {
            Some(InventoryItem::Gun(g)) => assert_eq!(g.ammo, 0),
            _ => panic!("no gun in slot 0"),
        }
    }

    #[test]
    fn test_stack_overflow_stays_on_ground() {
        let mut game = test_game();
        let (id, _rx) = join_at(&mut game, "a", Vec2::splat(100.0));
        // the default bag carries 5 gauze
        let loot = loot_at(&mut game, "gauze", 8, Vec2::splat(100.0));
        assert!(game.pickup_loot(id, loot).unwrap());
        assert_eq!(game.players[&id].inventory.count("gauze"), 5);
        assert_eq!(game.loot[&loot].count, 3);
        assert!(game.full_dirty.contains(&loot));
        // nothing more fits
        assert!(!game.pickup_loot(id, loot).unwrap());
    }

    #[test]
    fn test_armor_only_upgrades() {
        let mut game = test_game();
        let (id, _rx) = join_at(&mut game, "a", Vec2::splat(100.0));
        let regular = loot_at(&mut game, "regular_helmet", 1, Vec2::splat(100.0));
        assert!(game.pickup_loot(id, regular).unwrap());
        let basic = loot_at(&mut game, "basic_helmet", 1, Vec2::splat(100.0));
        assert!(!game.pickup_loot(id, basic).unwrap());
        assert!(game.loot.contains_key(&basic));
        let helmet = game.players[&id].inventory.helmet.as_ref().map(|h| h.id.clone());
        assert_eq!(helmet.as_deref(), Some("regular_helmet"));
    }

    #[test]
    fn test_better_scope_is_equipped() {
        let mut game = test_game();
        let (id, _rx) = join_at(&mut game, "a", Vec2::splat(100.0));
        let scope = loot_at(&mut game, "4x_scope", 1, Vec2::splat(100.0));
        assert!(game.pickup_loot(id, scope).unwrap());
        assert_eq!(game.players[&id].inventory.scope().id, "4x_scope");
    }

    #[test]
    fn test_cancelled_pickup_leaves_loot() {
        let mut game = test_game();
        let (id, _rx) = join_at(&mut game, "a", Vec2::splat(100.0));
        game.events.on(EventKind::LootPickup, "nope", |_, c| {
            c.cancel();
            Ok(())
        });
        let loot = loot_at(&mut game, "ak47", 1, Vec2::splat(100.0));
        assert!(!game.pickup_loot(id, loot).unwrap());
        assert!(game.loot.contains_key(&loot));
    }

    #[test]
    fn test_interact_toggles_nearby_door() {
        let mut game = test_game();
        let def = game.catalog.obstacle("house_door").unwrap();
        let door = game.spawn_obstacle(def, Vec2::new(100.0, 100.0), 0.0, 0, 1.0).unwrap();
        // Standing by the hinge so the door stays in reach once it swings
        let (id, _rx) = join_at(&mut game, "a", Vec2::new(96.0, 103.0));
        game.interact(id).unwrap();
        let state = game.obstacles[&door].door.as_ref().unwrap();
        assert!(state.open);
        assert_eq!(state.offset, 1);
        assert!(game.partial_dirty.contains(&door));
        game.interact(id).unwrap();
        assert!(!game.obstacles[&door].door.as_ref().unwrap().open);
    }
}
