//! Uniform spatial grid
//!
//! Maps fixed-size world cells to the ids overlapping them. A side table
//! remembers which cells each id occupies so removal only touches those.

use std::collections::{BTreeSet, HashMap};

use glam::Vec2;

use super::hitbox::Hitbox;
use super::ids::ObjectId;
use crate::consts::GRID_CELL_SIZE;

#[derive(Debug, Clone)]
pub struct Grid {
    cell_size: f32,
    /// Highest valid cell coordinate on each axis
    max_x: usize,
    max_y: usize,
    cells: Vec<BTreeSet<ObjectId>>,
    object_cells: HashMap<ObjectId, Vec<usize>>,
}

impl Grid {
    pub fn new(width: f32, height: f32) -> Self {
        Self::with_cell_size(width, height, GRID_CELL_SIZE)
    }

    pub fn with_cell_size(width: f32, height: f32, cell_size: f32) -> Self {
        let max_x = (width.max(0.0) / cell_size).ceil() as usize;
        let max_y = (height.max(0.0) / cell_size).ceil() as usize;
        Self {
            cell_size,
            max_x,
            max_y,
            cells: vec![BTreeSet::new(); (max_x + 1) * (max_y + 1)],
            object_cells: HashMap::new(),
        }
    }

    /// Register `id` in every cell the bounds of `hitbox` cover.
    ///
    /// Stale registrations are dropped first, so this is safe to call every
    /// time an object moves.
    pub fn insert(&mut self, id: ObjectId, hitbox: &Hitbox) {
        self.remove(id);
        let (min, max) = self.cell_range(hitbox);
        let mut occupied = Vec::with_capacity((max.0 - min.0 + 1) * (max.1 - min.1 + 1));
        for y in min.1..=max.1 {
            for x in min.0..=max.0 {
                let index = self.index(x, y);
                self.cells[index].insert(id);
                occupied.push(index);
            }
        }
        self.object_cells.insert(id, occupied);
    }

    pub fn remove(&mut self, id: ObjectId) {
        if let Some(occupied) = self.object_cells.remove(&id) {
            for index in occupied {
                self.cells[index].remove(&id);
            }
        }
    }

    /// Every id sharing a cell with the bounds of `hitbox`, each reported once
    pub fn intersects_hitbox(&self, hitbox: &Hitbox) -> BTreeSet<ObjectId> {
        let (min, max) = self.cell_range(hitbox);
        let mut found = BTreeSet::new();
        for y in min.1..=max.1 {
            for x in min.0..=max.0 {
                found.extend(self.cells[self.index(x, y)].iter().copied());
            }
        }
        found
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.object_cells.contains_key(&id)
    }

    /// Number of registered ids
    pub fn len(&self) -> usize {
        self.object_cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_cells.is_empty()
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * (self.max_x + 1) + x
    }

    fn to_cell(&self, p: Vec2) -> (usize, usize) {
        let x = (p.x / self.cell_size).floor().clamp(0.0, self.max_x as f32) as usize;
        let y = (p.y / self.cell_size).floor().clamp(0.0, self.max_y as f32) as usize;
        (x, y)
    }

    fn cell_range(&self, hitbox: &Hitbox) -> ((usize, usize), (usize, usize)) {
        let (min, max) = hitbox.bounds();
        (self.to_cell(min), self.to_cell(max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_spanning_object_reported_once() {
        let mut grid = Grid::new(256.0, 256.0);
        let wide = Hitbox::rect(Vec2::new(10.0, 10.0), Vec2::new(100.0, 20.0));
        grid.insert(ObjectId(1), &wide);
        let found = grid.intersects_hitbox(&Hitbox::rect(Vec2::ZERO, Vec2::splat(256.0)));
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec![ObjectId(1)]);
    }

    #[test]
    fn test_reinsert_drops_stale_cells() {
        let mut grid = Grid::new(256.0, 256.0);
        grid.insert(ObjectId(3), &Hitbox::circle(1.0, Vec2::new(5.0, 5.0)));
        grid.insert(ObjectId(3), &Hitbox::circle(1.0, Vec2::new(200.0, 200.0)));
        assert!(grid.intersects_hitbox(&Hitbox::circle(1.0, Vec2::new(5.0, 5.0))).is_empty());
        assert!(grid.intersects_hitbox(&Hitbox::circle(1.0, Vec2::new(200.0, 200.0))).contains(&ObjectId(3)));
    }

    #[test]
    fn test_out_of_bounds_is_clamped() {
        let mut grid = Grid::new(64.0, 64.0);
        grid.insert(ObjectId(9), &Hitbox::circle(2.0, Vec2::new(-50.0, 500.0)));
        let found = grid.intersects_hitbox(&Hitbox::circle(1.0, Vec2::new(0.0, 64.0)));
        assert!(found.contains(&ObjectId(9)));
    }

    proptest! {
        #[test]
        fn prop_grid_round_trip(
            x in 0.0f32..500.0, y in 0.0f32..500.0, w in 0.1f32..80.0, h in 0.1f32..80.0,
        ) {
            let mut grid = Grid::new(512.0, 512.0);
            let id = ObjectId(42);
            let hitbox = Hitbox::rect(Vec2::new(x, y), Vec2::new(x + w, y + h));
            grid.insert(id, &hitbox);
            prop_assert!(grid.intersects_hitbox(&hitbox.to_rectangle()).contains(&id));

            grid.remove(id);
            prop_assert!(!grid.contains(id));
            prop_assert!(!grid.intersects_hitbox(&Hitbox::rect(Vec2::ZERO, Vec2::splat(512.0))).contains(&id));
            prop_assert!(grid.cells.iter().all(|cell| !cell.contains(&id)));
        }
    }
}
