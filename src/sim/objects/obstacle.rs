//! Obstacles: trees, rocks, crates, walls, windows and doors

use std::sync::Arc;

use glam::Vec2;

use crate::sim::catalog::ObstacleDef;
use crate::sim::hitbox::Hitbox;
use crate::sim::ids::ObjectId;
use crate::{Orientation, unrotate_orientation};

#[derive(Debug, Clone)]
pub struct DoorState {
    pub open: bool,
    /// 0 closed, 1 or 3 swung open to either side
    pub offset: Orientation,
    closed: Hitbox,
    open_one: Hitbox,
    open_three: Hitbox,
}

impl DoorState {
    fn new(def: &ObstacleDef, hinge: Vec2, position: Vec2, scale: f32, orientation: Orientation) -> Self {
        let swung = |quarter: Orientation| {
            def.hitbox
                .transform(-hinge, 1.0, 0)
                .transform(hinge, 1.0, quarter)
                .transform(position, scale, orientation)
        };
        Self {
            open: false,
            offset: 0,
            closed: def.hitbox.transform(position, scale, orientation),
            open_one: swung(1),
            open_three: swung(3),
        }
    }

    fn current(&self) -> &Hitbox {
        match self.offset {
            1 => &self.open_one,
            3 => &self.open_three,
            _ => &self.closed,
        }
    }

    /// Both swing positions
    pub fn open_hitboxes(&self) -> [&Hitbox; 2] {
        [&self.open_one, &self.open_three]
    }
}

#[derive(Debug, Clone)]
pub struct Obstacle {
    pub id: ObjectId,
    pub def: Arc<ObstacleDef>,
    pub position: Vec2,
    /// Visual rotation (radians)
    pub rotation: f32,
    pub orientation: Orientation,
    /// Scale at full health
    pub max_scale: f32,
    pub scale: f32,
    pub health: f32,
    pub max_health: f32,
    pub hitbox: Hitbox,
    pub spawn_hitbox: Hitbox,
    pub dead: bool,
    pub collidable: bool,
    pub door: Option<DoorState>,
    pub parent_building: Option<ObjectId>,
}

impl Obstacle {
    pub fn new(
        id: ObjectId,
        def: Arc<ObstacleDef>,
        position: Vec2,
        rotation: f32,
        orientation: Orientation,
        scale: f32,
    ) -> Self {
        let hitbox = def.hitbox.transform(position, scale, orientation);
        let spawn_hitbox = def
            .spawn_hitbox
            .as_ref()
            .unwrap_or(&def.hitbox)
            .transform(position, scale, orientation);
        let door = def
            .door
            .as_ref()
            .map(|door| DoorState::new(&def, door.hinge, position, scale, orientation));
        Self {
            id,
            position,
            rotation,
            orientation,
            max_scale: scale,
            scale,
            health: def.health,
            max_health: def.health,
            hitbox,
            spawn_hitbox,
            dead: false,
            collidable: !def.no_collisions,
            door,
            parent_building: None,
            def,
        }
    }

    /// Whether damage from a weapon with the given piercing flag counts
    pub fn can_be_damaged(&self, piercing: bool) -> bool {
        !self.dead && !self.def.indestructible && (!self.def.impenetrable || piercing)
    }

    /// Subtract health and shrink. Returns `true` when this destroyed it.
    ///
    /// Scale is interpolated linearly between the destroy scale (at zero
    /// health) and the spawn scale (at full health).
    pub fn apply_damage(&mut self, amount: f32) -> bool {
        if self.dead {
            return false;
        }
        self.health -= amount;
        if self.health <= 0.0 {
            self.health = 0.0;
            self.dead = true;
            if !self.def.is_window {
                self.collidable = false;
            }
            return true;
        }
        let destroy = self.def.scale.destroy;
        let scale = destroy + (self.max_scale - destroy) * (self.health / self.max_health);
        let factor = scale / self.scale;
        self.scale = scale;
        self.hitbox.scale(factor);
        false
    }

    pub fn is_door(&self) -> bool {
        self.door.is_some()
    }

    /// Open (away from `actor`) or close a door. Returns `false` for non-doors
    /// and dead doors.
    pub fn toggle_door(&mut self, actor: Vec2) -> bool {
        if self.dead {
            return false;
        }
        let Some(door) = self.door.as_mut() else {
            return false;
        };
        if door.open {
            door.open = false;
            door.offset = 0;
        } else {
            let local = unrotate_orientation(actor - self.position, self.orientation);
            door.open = true;
            door.offset = if local.y > 0.0 { 1 } else { 3 };
        }
        self.hitbox = door.current().clone();
        if self.scale != self.max_scale {
            self.hitbox.scale(self.scale / self.max_scale);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::catalog::Catalog;

    fn obstacle(id: &str, position: Vec2) -> Obstacle {
        let catalog = Catalog::builtin().unwrap();
        Obstacle::new(ObjectId(5), catalog.obstacle(id).unwrap(), position, 0.0, 0, 1.0)
    }

    #[test]
    fn test_damage_shrinks_then_destroys() {
        let mut crate_ = obstacle("regular_crate", Vec2::new(50.0, 50.0));
        assert!(!crate_.apply_damage(40.0));
        // destroy 0.5, half health left
        assert!((crate_.scale - 0.75).abs() < 1e-5);
        assert!(!crate_.dead);
        assert!(crate_.apply_damage(40.0));
        assert!(crate_.dead);
        assert!(!crate_.collidable);
        assert_eq!(crate_.health, 0.0);
    }

    #[test]
    fn test_window_stays_collidable() {
        let mut window = obstacle("house_window", Vec2::new(10.0, 10.0));
        assert!(window.apply_damage(100.0));
        assert!(window.collidable);
    }

    #[test]
    fn test_door_swings_away_from_actor() {
        let mut door = obstacle("house_door", Vec2::new(50.0, 50.0));
        let closed = door.hitbox.clone();

        assert!(door.toggle_door(Vec2::new(50.0, 55.0)));
        let state = door.door.as_ref().unwrap();
        assert_eq!(state.offset, 1);
        let (min, max) = door.hitbox.bounds();
        assert!(max.y <= 50.7 && min.y < 45.0, "door swung toward -y: {min} {max}");

        assert!(door.toggle_door(Vec2::new(50.0, 55.0)));
        assert_eq!(door.hitbox, closed);

        assert!(door.toggle_door(Vec2::new(50.0, 45.0)));
        assert_eq!(door.door.as_ref().unwrap().offset, 3);
    }
}
