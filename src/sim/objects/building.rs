//! Buildings
//!
//! A building is not collidable itself: its walls, doors and furniture are
//! separate obstacles. It owns the ceiling (hidden from players inside) and
//! the scope area that raises the view of anyone standing in it.

use std::sync::Arc;

use glam::Vec2;

use crate::Orientation;
use crate::sim::catalog::BuildingDef;
use crate::sim::hitbox::Hitbox;
use crate::sim::ids::ObjectId;

#[derive(Debug, Clone)]
pub struct Building {
    pub id: ObjectId,
    pub def: Arc<BuildingDef>,
    pub position: Vec2,
    pub orientation: Orientation,
    pub spawn_hitbox: Hitbox,
    pub ceiling_hitbox: Hitbox,
    pub scope_hitbox: Hitbox,
    pub walls_destroyed: u32,
    pub ceiling_dead: bool,
    /// Obstacles spawned as parts of this building
    pub parts: Vec<ObjectId>,
}

impl Building {
    pub fn new(id: ObjectId, def: Arc<BuildingDef>, position: Vec2, orientation: Orientation) -> Self {
        Self {
            id,
            position,
            orientation,
            spawn_hitbox: def.spawn_hitbox.transform(position, 1.0, orientation),
            ceiling_hitbox: def.ceiling_hitbox.transform(position, 1.0, orientation),
            scope_hitbox: def.scope_hitbox.transform(position, 1.0, orientation),
            walls_destroyed: 0,
            ceiling_dead: false,
            parts: Vec::new(),
            def,
        }
    }

    /// Direct damage does nothing; buildings only lose their ceiling
    pub fn damage(&mut self, _amount: f32) {}

    /// A wall of this building was destroyed. Returns `true` when the ceiling
    /// collapsed because of it.
    pub fn damage_ceiling(&mut self) -> bool {
        if self.ceiling_dead {
            return false;
        }
        self.walls_destroyed += 1;
        if self.walls_destroyed >= self.def.walls_to_destroy {
            self.ceiling_dead = true;
            return true;
        }
        false
    }

    pub fn contains(&self, hitbox: &Hitbox) -> bool {
        self.scope_hitbox.collides_with(hitbox)
    }
}
