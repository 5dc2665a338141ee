//! Terrain
//!
//! Procedural shore and river polygons, baked into a coarse floor lookup
//! grid at generation time so per-tick floor queries are an index.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::catalog::MapDef;
use super::hitbox::Hitbox;

/// Side of one floor lookup cell
const FLOOR_CELL_SIZE: f32 = 8.0;
/// Distance between shoreline vertices
const SHORE_SPACING: f32 = 16.0;
const MAX_SHORE_JITTER: f32 = 8.0;
const RIVER_STEP: f32 = 16.0;
const RIVER_WIDTH: (f32, f32) = (8.0, 14.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FloorType {
    Grass,
    Sand,
    Water,
}

impl FloorType {
    pub fn speed_multiplier(self) -> f32 {
        match self {
            FloorType::Water => 0.7,
            FloorType::Grass | FloorType::Sand => 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct River {
    pub width: f32,
    /// Center line, left to right
    pub points: Vec<Vec2>,
    pub hitbox: Hitbox,
}

#[derive(Debug, Clone)]
pub struct Terrain {
    pub width: f32,
    pub height: f32,
    /// Outer edge of the sand
    pub beach: Hitbox,
    /// Outer edge of the grass
    pub grass: Hitbox,
    pub rivers: Vec<River>,
    cols: usize,
    rows: usize,
    floors: Vec<FloorType>,
}

impl Terrain {
    pub fn generate<R: Rng + ?Sized>(map: &MapDef, rng: &mut R) -> Self {
        let (width, height) = (map.width, map.height);
        let beach = Hitbox::polygon(shoreline(width, height, map.ocean_size, rng));
        let grass = Hitbox::polygon(shoreline(width, height, map.ocean_size + map.beach_size, rng));
        let rivers = (0..map.rivers)
            .map(|_| river(width, height, map.ocean_size + map.beach_size, rng))
            .collect();

        let cols = (width / FLOOR_CELL_SIZE).ceil().max(1.0) as usize;
        let rows = (height / FLOOR_CELL_SIZE).ceil().max(1.0) as usize;
        let mut terrain = Self {
            width,
            height,
            beach,
            grass,
            rivers,
            cols,
            rows,
            floors: Vec::with_capacity(cols * rows),
        };
        for y in 0..rows {
            for x in 0..cols {
                let center = (Vec2::new(x as f32, y as f32) + 0.5) * FLOOR_CELL_SIZE;
                let floor = terrain.classify(center);
                terrain.floors.push(floor);
            }
        }
        terrain
    }

    fn classify(&self, p: Vec2) -> FloorType {
        if self.rivers.iter().any(|r| r.hitbox.contains_point(p)) {
            FloorType::Water
        } else if self.grass.contains_point(p) {
            FloorType::Grass
        } else if self.beach.contains_point(p) {
            FloorType::Sand
        } else {
            FloorType::Water
        }
    }

    /// Floor under `p`; positions off the map read as the nearest edge cell
    pub fn floor_at(&self, p: Vec2) -> FloorType {
        let x = ((p.x / FLOOR_CELL_SIZE).floor().max(0.0) as usize).min(self.cols - 1);
        let y = ((p.y / FLOOR_CELL_SIZE).floor().max(0.0) as usize).min(self.rows - 1);
        self.floors[y * self.cols + x]
    }

    pub fn is_water(&self, p: Vec2) -> bool {
        self.floor_at(p) == FloorType::Water
    }
}

/// Jittered loop around the map, `inset` units in from the edge
fn shoreline<R: Rng + ?Sized>(width: f32, height: f32, inset: f32, rng: &mut R) -> Vec<Vec2> {
    if inset <= 0.0 {
        return vec![
            Vec2::ZERO,
            Vec2::new(width, 0.0),
            Vec2::new(width, height),
            Vec2::new(0.0, height),
        ];
    }
    let jitter = (inset * 0.125).min(MAX_SHORE_JITTER);
    let min = Vec2::splat(inset);
    let max = Vec2::new(width - inset, height - inset);
    let corners = [min, Vec2::new(max.x, min.y), max, Vec2::new(min.x, max.y)];

    let mut points = Vec::new();
    for i in 0..4 {
        let (a, b) = (corners[i], corners[(i + 1) % 4]);
        let edge = b - a;
        let steps = (edge.length() / SHORE_SPACING).ceil().max(1.0) as usize;
        // Outward normal of a clockwise-in-screen-space loop
        let outward = Vec2::new(edge.y, -edge.x).normalize_or_zero();
        for s in 0..steps {
            let t = s as f32 / steps as f32;
            let offset = if jitter > 0.0 { rng.random_range(-jitter..jitter) } else { 0.0 };
            let p = a + edge * t + outward * offset;
            points.push(p.clamp(Vec2::ZERO, Vec2::new(width, height)));
        }
    }
    points
}

/// A river meandering from the left edge to the right edge
fn river<R: Rng + ?Sized>(width: f32, height: f32, margin: f32, rng: &mut R) -> River {
    let river_width = rng.random_range(RIVER_WIDTH.0..RIVER_WIDTH.1);
    let lo = (margin + river_width).min(height * 0.5);
    let hi = (height - margin - river_width).max(height * 0.5);
    let mut p = Vec2::new(0.0, rng.random_range(height * 0.3..height * 0.7));
    let mut angle = 0.0f32;
    let mut points = vec![p];
    while p.x < width {
        angle = (angle + rng.random_range(-0.3f32..0.3)).clamp(-0.6, 0.6);
        p += Vec2::from_angle(angle) * RIVER_STEP;
        p.y = p.y.clamp(lo, hi);
        p.x = p.x.min(width);
        points.push(p);
    }

    let half = river_width * 0.5;
    let normals: Vec<Vec2> = (0..points.len())
        .map(|i| {
            let a = points[i.saturating_sub(1)];
            let b = points[(i + 1).min(points.len() - 1)];
            (b - a).perp().normalize_or_zero()
        })
        .collect();
    let left = points.iter().zip(&normals).map(|(p, n)| *p + *n * half);
    let right = points.iter().zip(&normals).map(|(p, n)| *p - *n * half);
    let outline: Vec<Vec2> = left.chain(right.rev()).collect();

    River {
        width: river_width,
        points,
        hitbox: Hitbox::polygon(outline),
    }
}
