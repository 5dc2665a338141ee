//! Item use
//!
//! Guns and melee weapons share one entry point, [`Game::use_item`], which
//! applies the weapon's own cooldown before handing off to the unconditional
//! fire or swing path. Reloading and healing are timed [`Action`]s: one per
//! player, cancellable, finished by an `ActionComplete` timer.

use std::sync::Arc;

use glam::Vec2;
use rand::Rng;

use super::Game;
use super::catalog::{DEFAULT_MELEE, FireMode, HealType, HealingDef, ItemDef};
use super::hitbox::Hitbox;
use super::ids::ObjectId;
use super::inventory::{Action, ActionKind, InventoryItem, MELEE_SLOT, MeleeItem};
use super::objects::{InputAction, ObjectKind, PlayerInput};
use super::snapshot::EmoteSnapshot;
use super::timers::TimerAction;
use crate::consts::{MAX_ADRENALINE, MAX_EMOTES_PER_TICK};
use crate::error::SimError;
use crate::normalize_angle;

impl Game {
    /// Apply one client input packet. Runs between ticks; movement takes
    /// effect on the next player update.
    pub fn apply_input(&mut self, id: ObjectId, input: PlayerInput) -> Result<(), SimError> {
        let player = self.players.get_mut(&id).ok_or(SimError::UnknownPlayer(id))?;
        if player.dead || player.frozen {
            return Ok(());
        }
        player.movement = input.movement;
        player.touch = input.touch;
        if input.attacking && !player.attacking {
            player.start_attacking = true;
        }
        player.attacking = input.attacking;
        if input.rotation.is_finite() {
            let rotation = normalize_angle(input.rotation);
            if player.rotation != rotation {
                player.rotation = rotation;
                self.mark_partial(id);
            }
        } else {
            log::warn!("Player {} sent a non-finite rotation", id);
        }

        for action in input.actions {
            match action {
                InputAction::EquipSlot(slot) => self.equip_or_warn(id, slot),
                InputAction::EquipLast => {
                    let slot = self.players.get(&id).map(|p| p.inventory.last_active_slot());
                    if let Some(slot) = slot {
                        self.equip_or_warn(id, slot);
                    }
                }
                InputAction::DropSlot(slot) => {
                    if let Err(SimError::InvalidSlot(slot)) = self.drop_slot(id, slot) {
                        log::warn!("Player {} tried to drop invalid slot {}", id, slot);
                    }
                }
                InputAction::Reload => self.reload(id),
                InputAction::UseItem(item) => self.use_consumable(id, &item),
                InputAction::Interact => self.interact(id)?,
                InputAction::Emote(emote) => {
                    if self.emotes.len() < MAX_EMOTES_PER_TICK {
                        self.emotes.push(EmoteSnapshot { player: id, emote });
                    }
                }
                InputAction::Cancel => self.cancel_action(id),
            }
        }
        Ok(())
    }

    fn equip_or_warn(&mut self, id: ObjectId, slot: usize) {
        if let Err(e) = self.equip_slot(id, slot) {
            log::warn!("Player {} could not equip slot {}: {}", id, slot, e);
        }
    }

    /// Attack with whatever is in hand
    pub fn use_item(&mut self, id: ObjectId) {
        let Some(player) = self.players.get(&id) else {
            return;
        };
        if player.dead {
            return;
        }
        match player.inventory.active_item() {
            Some(InventoryItem::Gun(_)) => self.try_fire(id),
            Some(InventoryItem::Melee(_)) => self.try_swing(id),
            None => {}
        }
    }

    /// Fire if the gun's cooldown has elapsed
    fn try_fire(&mut self, id: ObjectId) {
        let now = self.now;
        let Some(player) = self.players.get(&id) else {
            return;
        };
        let Some(InventoryItem::Gun(gun)) = player.inventory.active_item() else {
            return;
        };
        if gun.ammo == 0 && !gun.def.infinite_ammo {
            self.reload(id);
            return;
        }
        let cooldown = match gun.def.fire_mode {
            FireMode::Burst { cooldown_ms, .. } => cooldown_ms,
            _ => gun.def.fire_delay_ms,
        };
        if gun.last_use.is_some_and(|t| now < t + cooldown) {
            return;
        }
        let shots = match gun.def.fire_mode {
            FireMode::Burst { shots, .. } => shots,
            _ => 1,
        };
        self.cancel_action(id);
        self.fire_gun(id, shots);
    }

    /// Fire one round with no cooldown check. `remaining` counts the shots
    /// left in the current burst, this one included.
    pub(crate) fn fire_gun(&mut self, id: ObjectId, remaining: u32) {
        let now = self.now;
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if player.dead {
            return;
        }
        let (position, rotation, attacking) = (player.position, player.rotation, player.attacking);
        let Some(InventoryItem::Gun(gun)) = player.inventory.active_item_mut() else {
            return;
        };
        let def = Arc::clone(&gun.def);
        if gun.ammo == 0 && !def.infinite_ammo {
            self.reload(id);
            return;
        }
        if !def.infinite_ammo {
            gun.ammo -= 1;
        }
        gun.last_use = Some(now);
        let empty = gun.ammo == 0 && !def.infinite_ammo;
        player.dirty.weapons = true;
        player.recoil = Some(def.recoil_multiplier);
        let old_recoil = player.recoil_timer.take();
        let old_refire = player.weapon_timer.take();
        for handle in [old_recoil, old_refire].into_iter().flatten() {
            self.timers.cancel(handle);
        }

        let muzzle = position + Vec2::from_angle(rotation) * def.barrel_length;
        for _ in 0..def.pellets.max(1) {
            let spread = if def.spread > 0.0 {
                self.rng.random_range(-def.spread / 2.0..=def.spread / 2.0)
            } else {
                0.0
            };
            self.spawn_bullet(id, Arc::clone(&def), muzzle, rotation + spread);
        }

        let recoil_timer = self
            .timers
            .schedule(now + def.recoil_duration_ms, TimerAction::RecoilExpire { player: id });
        let next = match def.fire_mode {
            FireMode::Burst { delay_ms, .. } if remaining > 1 && !empty => Some((
                now + delay_ms,
                TimerAction::BurstShot {
                    player: id,
                    remaining: remaining - 1,
                },
            )),
            FireMode::Auto if attacking && !empty => {
                Some((now + def.fire_delay_ms, TimerAction::GunRefire { player: id }))
            }
            _ => None,
        };
        let weapon_timer = next.map(|(due, action)| self.timers.schedule(due, action));
        if let Some(player) = self.players.get_mut(&id) {
            player.recoil_timer = Some(recoil_timer);
            player.weapon_timer = weapon_timer;
        }
        if empty {
            self.reload(id);
        }
    }

    /// Automatic fire while the trigger stays down
    pub(crate) fn refire(&mut self, id: ObjectId) {
        let holding = self
            .players
            .get(&id)
            .is_some_and(|p| p.attacking && matches!(p.inventory.active_item(), Some(InventoryItem::Gun(_))));
        if holding {
            self.fire_gun(id, 1);
        }
    }

    pub(crate) fn expire_recoil(&mut self, id: ObjectId) {
        if let Some(player) = self.players.get_mut(&id) {
            player.recoil = None;
            player.recoil_timer = None;
        }
    }

    /// Start a swing if the melee cooldown has elapsed; the hit lands after
    /// the weapon's wind-up
    fn try_swing(&mut self, id: ObjectId) {
        let now = self.now;
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        let Some(InventoryItem::Melee(melee)) = player.inventory.active_item_mut() else {
            return;
        };
        if melee.last_use.is_some_and(|t| now < t + melee.def.cooldown_ms) {
            return;
        }
        melee.last_use = Some(now);
        let due = now + melee.def.hit_delay_ms;
        let old = player.weapon_timer.take();
        if let Some(handle) = old {
            self.timers.cancel(handle);
        }
        self.cancel_action(id);
        let handle = self.timers.schedule(due, TimerAction::MeleeHit { player: id });
        if let Some(player) = self.players.get_mut(&id) {
            player.weapon_timer = Some(handle);
        }
    }

    /// Resolve a swing against the nearest valid target
    pub(crate) fn melee_hit(&mut self, id: ObjectId) -> Result<(), SimError> {
        let now = self.now;
        let Some(player) = self.players.get_mut(&id) else {
            return Ok(());
        };
        player.weapon_timer = None;
        if player.dead {
            return Ok(());
        }
        let Some(InventoryItem::Melee(melee)) = player.inventory.active_item() else {
            return Ok(());
        };
        let def = Arc::clone(&melee.def);
        let (position, rotation, attacking) = (player.position, player.rotation, player.attacking);
        let reach = Hitbox::circle(def.radius, position + Vec2::from_angle(rotation).rotate(def.offset));

        let target = self
            .grid
            .intersects_hitbox(&reach)
            .into_iter()
            .filter(|t| *t != id)
            .filter_map(|t| {
                let hitbox = match self.kinds.get(&t)? {
                    ObjectKind::Player => self.players.get(&t).filter(|p| !p.dead)?.hitbox(),
                    ObjectKind::Obstacle => {
                        let o = self.obstacles.get(&t).filter(|o| !o.dead)?;
                        o.hitbox.clone()
                    }
                    _ => return None,
                };
                let record = reach.distance_to(&hitbox);
                record.collided.then_some((record.distance, t))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, t)| t);

        match target.and_then(|t| self.kinds.get(&t).copied().map(|k| (t, k))) {
            Some((t, ObjectKind::Player)) => {
                self.damage_player(t, def.damage, Some(id), Some(def.id.clone()), def.piercing)?;
            }
            Some((t, _)) => {
                self.damage_obstacle(t, def.damage * def.obstacle_multiplier, Some(id), def.piercing)?;
            }
            None => {}
        }

        if def.auto && attacking {
            let due = now + def.cooldown_ms.saturating_sub(def.hit_delay_ms);
            let handle = self.timers.schedule(due, TimerAction::MeleeRefire { player: id });
            if let Some(player) = self.players.get_mut(&id) {
                player.weapon_timer = Some(handle);
            }
        }
        Ok(())
    }

    /// Next swing of an automatic melee weapon
    pub(crate) fn melee_refire(&mut self, id: ObjectId) {
        let holding = self.players.get_mut(&id).is_some_and(|p| {
            p.weapon_timer = None;
            p.attacking && !p.dead
        });
        if holding {
            self.try_swing(id);
        }
    }

    fn start_action(&mut self, id: ObjectId, kind: ActionKind, duration_ms: u64) {
        self.cancel_action(id);
        let now = self.now;
        let timer = self
            .timers
            .schedule(now + duration_ms, TimerAction::ActionComplete { player: id });
        if let Some(player) = self.players.get_mut(&id) {
            player.action = Some(Action {
                kind,
                timer,
                started_at: now,
                duration_ms,
            });
        }
        self.mark_partial(id);
    }

    /// Abort the running action, if any. Safe to call at any time.
    pub fn cancel_action(&mut self, id: ObjectId) {
        let Some(action) = self.players.get_mut(&id).and_then(|p| p.action.take()) else {
            return;
        };
        self.timers.cancel(action.timer);
        self.mark_partial(id);
    }

    /// Start reloading the gun in hand if it can take more rounds
    pub fn reload(&mut self, id: ObjectId) {
        let Some(player) = self.players.get(&id) else {
            return;
        };
        if player.dead || matches!(player.action.as_ref().map(|a| &a.kind), Some(ActionKind::Reload)) {
            return;
        }
        let Some(InventoryItem::Gun(gun)) = player.inventory.active_item() else {
            return;
        };
        if gun.is_full() || gun.def.infinite_ammo || player.inventory.count(&gun.def.ammo) == 0 {
            return;
        }
        let duration = gun.def.reload_ms;
        let old = self.players.get_mut(&id).and_then(|p| p.weapon_timer.take());
        if let Some(handle) = old {
            self.timers.cancel(handle);
        }
        self.start_action(id, ActionKind::Reload, duration);
    }

    /// `UseItem` input: healing items start an action, scopes switch zoom
    fn use_consumable(&mut self, id: ObjectId, item: &str) {
        match self.catalog.item(item) {
            Ok(ItemDef::Healing(def)) => self.use_healing(id, def),
            Ok(ItemDef::Scope(scope)) => {
                if let Some(player) = self.players.get_mut(&id) {
                    if player.inventory.set_scope(&scope.id) {
                        player.dirty.inventory = true;
                    }
                }
            }
            Ok(_) => log::warn!("Player {} tried to use '{}'", id, item),
            Err(e) => log::warn!("Player {} used unknown item: {}", id, e),
        }
    }

    pub fn use_healing(&mut self, id: ObjectId, def: Arc<HealingDef>) {
        let Some(player) = self.players.get(&id) else {
            return;
        };
        if player.dead || player.inventory.count(&def.id) == 0 {
            return;
        }
        let useful = match def.heal_type {
            HealType::Health => player.health < player.max_health,
            HealType::Adrenaline => player.adrenaline < MAX_ADRENALINE,
        };
        let already = matches!(
            player.action.as_ref().map(|a| &a.kind),
            Some(ActionKind::Heal(current)) if current.id == def.id
        );
        if !useful || already {
            return;
        }
        let duration = def.use_time_ms;
        self.start_action(id, ActionKind::Heal(def), duration);
    }

    /// The running action's timer fired
    pub(crate) fn complete_action(&mut self, id: ObjectId) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        let Some(action) = player.action.take() else {
            return;
        };
        let mut reload_again = false;
        match action.kind {
            ActionKind::Reload => {
                let inv = &mut player.inventory;
                let ammo_id = match inv.active_item() {
                    Some(InventoryItem::Gun(gun)) => gun.def.ammo.clone(),
                    _ => String::new(),
                };
                let held = inv.count(&ammo_id);
                if let Some(InventoryItem::Gun(gun)) = inv.active_item_mut() {
                    let wanted = if gun.def.single_reload {
                        1
                    } else {
                        gun.def.capacity.saturating_sub(gun.ammo)
                    };
                    let loaded = wanted.min(held);
                    gun.ammo += loaded;
                    reload_again = gun.def.single_reload && !gun.is_full() && held > loaded;
                    inv.remove_stack(&ammo_id, loaded);
                }
                player.dirty.weapons = true;
                player.dirty.inventory = true;
            }
            ActionKind::Heal(def) => {
                if player.inventory.remove_stack(&def.id, 1) == 1 {
                    match def.heal_type {
                        HealType::Health => player.set_health(player.health + def.restore),
                        HealType::Adrenaline => player.set_adrenaline(player.adrenaline + def.restore),
                    }
                }
                player.dirty.inventory = true;
            }
        }
        let empty = matches!(
            player.inventory.active_item(),
            Some(InventoryItem::Gun(gun)) if gun.ammo == 0
        );
        self.mark_partial(id);
        if reload_again || empty {
            self.reload(id);
        }
    }

    /// Switch the active weapon. Switching abandons a reload and any pending
    /// refire.
    pub fn equip_slot(&mut self, id: ObjectId, slot: usize) -> Result<(), SimError> {
        let player = self.players.get_mut(&id).ok_or(SimError::UnknownPlayer(id))?;
        if player.dead || !player.inventory.set_active(slot)? {
            return Ok(());
        }
        player.dirty.weapons = true;
        self.interrupt_weapon(id);
        self.mark_partial(id);
        Ok(())
    }

    /// The weapon in hand changed: drop any pending refire and reload
    pub(crate) fn interrupt_weapon(&mut self, id: ObjectId) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        let reloading = matches!(player.action.as_ref().map(|a| &a.kind), Some(ActionKind::Reload));
        if let Some(handle) = player.weapon_timer.take() {
            self.timers.cancel(handle);
        }
        if reloading {
            self.cancel_action(id);
        }
    }

    /// Throw the weapon in `slot` on the ground. Magazine rounds go back into
    /// the inventory; whatever does not fit is dropped too.
    pub fn drop_slot(&mut self, id: ObjectId, slot: usize) -> Result<(), SimError> {
        let player = self.players.get_mut(&id).ok_or(SimError::UnknownPlayer(id))?;
        if player.dead {
            return Ok(());
        }
        let droppable = match player.inventory.slot(slot)? {
            Some(InventoryItem::Melee(m)) => !m.def.no_drop,
            Some(InventoryItem::Gun(_)) => true,
            None => false,
        };
        if !droppable {
            return Ok(());
        }
        let was_active = player.inventory.active_slot() == slot;
        let position = player.position;
        let mut drops = Vec::new();
        match player.inventory.take(slot)? {
            Some(InventoryItem::Gun(gun)) => {
                if gun.ammo > 0 && !gun.def.infinite_ammo {
                    let leftover = player.inventory.add_stack(&gun.def.ammo, gun.ammo);
                    if leftover > 0 {
                        drops.push((self.catalog.item(&gun.def.ammo)?, leftover));
                    }
                }
                drops.push((ItemDef::Gun(gun.def), 1));
            }
            Some(InventoryItem::Melee(melee)) => {
                drops.push((ItemDef::Melee(melee.def), 1));
                let fists = MeleeItem::new(self.catalog.melee(DEFAULT_MELEE)?);
                player.inventory.put(MELEE_SLOT, InventoryItem::Melee(fists))?;
            }
            None => {}
        }
        player.dirty.weapons = true;
        player.dirty.inventory = true;
        if was_active {
            let old = player.weapon_timer.take();
            if let Some(handle) = old {
                self.timers.cancel(handle);
            }
            self.cancel_action(id);
        }
        self.mark_partial(id);
        for (item, count) in drops {
            self.drop_item(item, count, position)?;
        }
        Ok(())
    }
}
