//! Player entity

use std::collections::BTreeSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{MAX_ADRENALINE, MIN_ADRENALINE, PLAYER_RADIUS, REGEN_TIERS};
use crate::sim::hitbox::Hitbox;
use crate::sim::ids::ObjectId;
use crate::sim::inventory::{Action, Inventory};
use crate::sim::terrain::FloorType;
use crate::sim::timers::TimerHandle;

const MAX_HEALTH: f32 = 100.0;

/// Keyboard movement flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementIntent {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// Analog stick movement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchMovement {
    pub angle: f32,
    /// 0..=1
    pub magnitude: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputAction {
    EquipSlot(usize),
    /// Previously held weapon
    EquipLast,
    DropSlot(usize),
    Reload,
    /// Start using a healing item, or switch scope
    UseItem(String),
    Interact,
    Emote(String),
    Cancel,
}

/// One input packet from a client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    pub movement: MovementIntent,
    pub touch: Option<TouchMovement>,
    pub attacking: bool,
    pub rotation: f32,
    pub actions: Vec<InputAction>,
}

/// Fields of the player's own view that changed since the last packet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerDirty {
    pub health: bool,
    pub adrenaline: bool,
    pub inventory: bool,
    pub weapons: bool,
    pub zoom: bool,
    /// Whose view is being sent (changes when spectating)
    pub id: bool,
}

impl PlayerDirty {
    pub fn all() -> Self {
        Self {
            health: true,
            adrenaline: true,
            inventory: true,
            weapons: true,
            zoom: true,
            id: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: ObjectId,
    pub name: String,
    pub role: Option<String>,
    pub is_dev: bool,
    pub joined_at: u64,

    pub position: Vec2,
    pub rotation: f32,
    pub radius: f32,
    pub floor: FloorType,

    pub health: f32,
    pub max_health: f32,
    pub adrenaline: f32,

    pub movement: MovementIntent,
    pub touch: Option<TouchMovement>,
    pub attacking: bool,
    /// Attack went from released to held since the last update
    pub start_attacking: bool,

    pub inventory: Inventory,
    pub action: Option<Action>,
    /// Movement multiplier while recoil lasts
    pub recoil: Option<f32>,
    pub recoil_timer: Option<TimerHandle>,
    /// Pending automatic refire, burst shot or melee swing
    pub weapon_timer: Option<TimerHandle>,

    pub invulnerable: bool,
    pub invulnerability_timer: Option<TimerHandle>,

    pub zoom: f32,
    pub inside_building: bool,

    pub dead: bool,
    /// Inputs ignored (game over)
    pub frozen: bool,

    pub kills: u32,
    pub damage_done: f32,
    pub damage_taken: f32,

    pub visible: BTreeSet<ObjectId>,
    pub ticks_since_visibility: u32,
    pub spectating: Option<ObjectId>,
    pub spectators: BTreeSet<ObjectId>,

    pub dirty: PlayerDirty,
}

impl Player {
    pub fn new(id: ObjectId, name: String, position: Vec2, inventory: Inventory, now: u64) -> Self {
        let zoom = inventory.scope().zoom;
        Self {
            id,
            name,
            role: None,
            is_dev: false,
            joined_at: now,
            position,
            rotation: 0.0,
            radius: PLAYER_RADIUS,
            floor: FloorType::Grass,
            health: MAX_HEALTH,
            max_health: MAX_HEALTH,
            adrenaline: MIN_ADRENALINE,
            movement: MovementIntent::default(),
            touch: None,
            attacking: false,
            start_attacking: false,
            inventory,
            action: None,
            recoil: None,
            recoil_timer: None,
            weapon_timer: None,
            invulnerable: true,
            invulnerability_timer: None,
            zoom,
            inside_building: false,
            dead: false,
            frozen: false,
            kills: 0,
            damage_done: 0.0,
            damage_taken: 0.0,
            visible: BTreeSet::new(),
            ticks_since_visibility: 0,
            spectating: None,
            spectators: BTreeSet::new(),
            dirty: PlayerDirty::all(),
        }
    }

    pub fn hitbox(&self) -> Hitbox {
        Hitbox::circle(self.radius, self.position)
    }

    /// Unit-bounded movement direction from the current intent
    pub fn movement_vector(&self) -> Vec2 {
        if let Some(touch) = self.touch {
            return Vec2::from_angle(touch.angle) * touch.magnitude.clamp(0.0, 1.0);
        }
        let m = self.movement;
        let x = (m.right as i8 - m.left as i8) as f32;
        let y = (m.down as i8 - m.up as i8) as f32;
        let v = Vec2::new(x, y);
        if x != 0.0 && y != 0.0 {
            v * std::f32::consts::FRAC_1_SQRT_2
        } else {
            v
        }
    }

    pub fn set_health(&mut self, health: f32) {
        let health = health.clamp(0.0, self.max_health);
        if health != self.health {
            self.health = health;
            self.dirty.health = true;
        }
    }

    pub fn set_adrenaline(&mut self, adrenaline: f32) {
        let adrenaline = adrenaline.clamp(MIN_ADRENALINE, MAX_ADRENALINE);
        if adrenaline != self.adrenaline {
            self.adrenaline = adrenaline;
            self.dirty.adrenaline = true;
        }
    }

    /// Health regenerated per second at the current adrenaline level
    pub fn regen_rate(&self) -> f32 {
        if self.adrenaline <= 0.0 {
            return 0.0;
        }
        REGEN_TIERS
            .iter()
            .find(|(threshold, _)| self.adrenaline >= *threshold)
            .map_or(0.0, |(_, rate)| *rate)
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom != self.zoom {
            self.zoom = zoom;
            self.dirty.zoom = true;
        }
    }

    /// View rectangle used for visibility queries
    pub fn screen_hitbox(&self) -> Hitbox {
        let dim = self.zoom * 2.0 + 8.0;
        Hitbox::from_rect(dim, dim, self.position)
    }

    pub fn reset_dirty(&mut self) {
        self.dirty = PlayerDirty::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::catalog::{Catalog, DEFAULT_BACKPACK, DEFAULT_MELEE, DEFAULT_SCOPE};

    fn player() -> Player {
        let catalog = Catalog::builtin().unwrap();
        let inventory = Inventory::new(
            catalog.melee(DEFAULT_MELEE).unwrap(),
            catalog.scope(DEFAULT_SCOPE).unwrap(),
            catalog.backpack(DEFAULT_BACKPACK).unwrap(),
        );
        Player::new(ObjectId(1), "tester".into(), Vec2::ZERO, inventory, 0)
    }

    #[test]
    fn test_diagonal_movement_is_normalized() {
        let mut p = player();
        p.movement.up = true;
        p.movement.right = true;
        let v = p.movement_vector();
        assert!((v.length() - 1.0).abs() < 1e-6);
        assert!(v.x > 0.0 && v.y < 0.0);
    }

    #[test]
    fn test_opposite_keys_cancel() {
        let mut p = player();
        p.movement.left = true;
        p.movement.right = true;
        assert_eq!(p.movement_vector(), Vec2::ZERO);
    }

    #[test]
    fn test_regen_tiers() {
        let mut p = player();
        assert_eq!(p.regen_rate(), 0.0);
        p.adrenaline = 90.0;
        assert_eq!(p.regen_rate(), REGEN_TIERS[0].1);
        p.adrenaline = 30.0;
        assert_eq!(p.regen_rate(), REGEN_TIERS[2].1);
        p.adrenaline = 5.0;
        assert_eq!(p.regen_rate(), REGEN_TIERS[3].1);
    }

    #[test]
    fn test_health_clamped_and_dirty() {
        let mut p = player();
        p.reset_dirty();
        p.set_health(150.0);
        assert!(!p.dirty.health);
        p.set_health(-5.0);
        assert_eq!(p.health, 0.0);
        assert!(p.dirty.health);
    }
}
