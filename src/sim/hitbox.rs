//! Hitbox shapes
//!
//! A closed sum type over circles, axis-aligned rectangles, polygons and
//! groups of shapes. Every variant supports the same operation table; shape
//! pairs dispatch through exhaustive matches onto [`super::collision`].

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::collision::{
    self, CollisionRecord, LineIntersection, check_circle_circle, check_rect_circle,
    check_rect_rect, closest_point_on_segment, distance_to_polygon_edge, point_in_polygon,
    polygon_edges, segment_intersection,
};
use crate::{Orientation, add_adjust};

/// Attempts made by rejection sampling before falling back to the center
const RANDOM_POINT_ATTEMPTS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Hitbox {
    Circle { position: Vec2, radius: f32 },
    Rect { min: Vec2, max: Vec2 },
    Polygon { points: Vec<Vec2> },
    Group { hitboxes: Vec<Hitbox> },
}

impl Hitbox {
    pub fn circle(radius: f32, position: Vec2) -> Self {
        Hitbox::Circle { position, radius }
    }

    /// Rectangle from two corners in any order
    pub fn rect(a: Vec2, b: Vec2) -> Self {
        Hitbox::Rect {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Rectangle of `width` x `height` centered on `center`
    pub fn from_rect(width: f32, height: f32, center: Vec2) -> Self {
        let half = Vec2::new(width, height) * 0.5;
        Hitbox::Rect {
            min: center - half,
            max: center + half,
        }
    }

    /// Bounding rectangle of a segment
    pub fn from_line(a: Vec2, b: Vec2) -> Self {
        Self::rect(a, b)
    }

    pub fn polygon(points: Vec<Vec2>) -> Self {
        Hitbox::Polygon { points }
    }

    pub fn group(hitboxes: Vec<Hitbox>) -> Self {
        Hitbox::Group { hitboxes }
    }

    /// Overlap test against any other shape
    pub fn collides_with(&self, other: &Hitbox) -> bool {
        use Hitbox::*;
        match (self, other) {
            (Group { hitboxes }, _) => hitboxes.iter().any(|h| h.collides_with(other)),
            (_, Group { hitboxes }) => hitboxes.iter().any(|h| self.collides_with(h)),
            (
                Circle {
                    position: p1,
                    radius: r1,
                },
                Circle {
                    position: p2,
                    radius: r2,
                },
            ) => check_circle_circle(*p1, *r1, *p2, *r2),
            (Circle { position, radius }, Rect { min, max })
            | (Rect { min, max }, Circle { position, radius }) => {
                check_rect_circle(*min, *max, *position, *radius)
            }
            (
                Rect {
                    min: min1,
                    max: max1,
                },
                Rect {
                    min: min2,
                    max: max2,
                },
            ) => check_rect_rect(*min1, *max1, *min2, *max2),
            (Polygon { points }, Circle { position, radius })
            | (Circle { position, radius }, Polygon { points }) => {
                polygon_collides_circle(points, *position, *radius)
            }
            (Polygon { points }, Rect { min, max }) | (Rect { min, max }, Polygon { points }) => {
                polygons_collide(points, &rect_corners(*min, *max))
            }
            (Polygon { points: a }, Polygon { points: b }) => polygons_collide(a, b),
        }
    }

    /// Signed gap to another shape
    pub fn distance_to(&self, other: &Hitbox) -> CollisionRecord {
        use Hitbox::*;
        match (self, other) {
            (Group { hitboxes }, _) => closest_record(hitboxes.iter().map(|h| h.distance_to(other))),
            (_, Group { hitboxes }) => closest_record(hitboxes.iter().map(|h| self.distance_to(h))),
            (
                Circle {
                    position: p1,
                    radius: r1,
                },
                Circle {
                    position: p2,
                    radius: r2,
                },
            ) => collision::distance_between_circles(*p1, *r1, *p2, *r2),
            (Circle { position, radius }, Rect { min, max })
            | (Rect { min, max }, Circle { position, radius }) => {
                collision::distance_to_rectangle(*min, *max, *position, *radius)
            }
            (
                Rect {
                    min: min1,
                    max: max1,
                },
                Rect {
                    min: min2,
                    max: max2,
                },
            ) => collision::rect_rect_distance(*min1, *max1, *min2, *max2),
            (Polygon { points }, Circle { position, radius })
            | (Circle { position, radius }, Polygon { points }) => {
                let edge = distance_to_polygon_edge(*position, points);
                let gap = if point_in_polygon(*position, points) {
                    -edge - radius
                } else {
                    edge - radius
                };
                CollisionRecord {
                    collided: gap < 0.0,
                    distance: gap,
                }
            }
            (Polygon { points }, Rect { min, max }) | (Rect { min, max }, Polygon { points }) => {
                polygon_distance(points, &rect_corners(*min, *max))
            }
            (Polygon { points: a }, Polygon { points: b }) => polygon_distance(a, b),
        }
    }

    /// Nearest entry point of segment `a -> b`, with the surface normal there
    pub fn intersects_line(&self, a: Vec2, b: Vec2) -> Option<LineIntersection> {
        match self {
            Hitbox::Circle { position, radius } => {
                collision::line_intersects_circle(a, b, *position, *radius)
            }
            Hitbox::Rect { min, max } => collision::line_intersects_rect(a, b, *min, *max),
            Hitbox::Polygon { points } => polygon_intersects_line(points, a, b),
            Hitbox::Group { hitboxes } => hitboxes
                .iter()
                .filter_map(|h| h.intersects_line(a, b))
                .min_by(|x, y| a.distance_squared(x.point).total_cmp(&a.distance_squared(y.point))),
        }
    }

    /// Push this circle out of `other`.
    ///
    /// Only circles move; against a group every overlapped child pushes once.
    ///
    /// # Panics
    ///
    /// Rectangles, polygons and groups are static colliders. Asking one of
    /// them to resolve a collision is a programming error.
    pub fn resolve_collision(&mut self, other: &Hitbox) {
        let Hitbox::Circle { position, radius } = self else {
            panic!("resolve_collision is only implemented for moving circles, not {self:?}");
        };
        match other {
            Hitbox::Rect { min, max } => {
                if let Some(hit) = collision::rect_circle_intersection(*min, *max, *position, *radius)
                {
                    *position -= hit.dir * hit.pen;
                }
            }
            Hitbox::Circle {
                position: other_pos,
                radius: other_radius,
            } => {
                if let Some(hit) =
                    collision::circle_circle_intersection(*position, *radius, *other_pos, *other_radius)
                {
                    *position -= hit.dir * hit.pen;
                }
            }
            Hitbox::Polygon { points } => {
                // Nudge toward the nearest outline point (no exact polygon solver)
                let inside = point_in_polygon(*position, points);
                let nearest = polygon_edges(points)
                    .map(|(a, b)| closest_point_on_segment(*position, a, b))
                    .min_by(|x, y| {
                        position.distance_squared(*x).total_cmp(&position.distance_squared(*y))
                    });
                if let Some(nearest) = nearest {
                    let to_edge = nearest - *position;
                    let dist = to_edge.length();
                    if inside {
                        *position = nearest + to_edge.normalize_or_zero() * *radius;
                    } else if dist < *radius {
                        *position -= to_edge.normalize_or_zero() * (*radius - dist);
                    }
                }
            }
            Hitbox::Group { hitboxes } => {
                for child in hitboxes {
                    if self.collides_with(child) {
                        self.resolve_collision(child);
                    }
                }
            }
        }
    }

    /// Copy of this shape placed at `position`, scaled, and turned by `orientation`
    pub fn transform(&self, position: Vec2, scale: f32, orientation: Orientation) -> Hitbox {
        match self {
            Hitbox::Circle {
                position: local,
                radius,
            } => Hitbox::Circle {
                position: add_adjust(position, *local * scale, orientation),
                radius: radius * scale,
            },
            Hitbox::Rect { min, max } => {
                let a = add_adjust(position, *min * scale, orientation);
                let b = add_adjust(position, *max * scale, orientation);
                Hitbox::rect(a, b)
            }
            Hitbox::Polygon { points } => Hitbox::Polygon {
                points: points
                    .iter()
                    .map(|p| add_adjust(position, *p * scale, orientation))
                    .collect(),
            },
            Hitbox::Group { hitboxes } => Hitbox::Group {
                hitboxes: hitboxes
                    .iter()
                    .map(|h| h.transform(position, scale, orientation))
                    .collect(),
            },
        }
    }

    /// Scale in place about the shape's own center
    pub fn scale(&mut self, factor: f32) {
        match self {
            Hitbox::Circle { radius, .. } => *radius *= factor,
            Hitbox::Rect { min, max } => {
                let center = (*min + *max) * 0.5;
                *min = center + (*min - center) * factor;
                *max = center + (*max - center) * factor;
            }
            Hitbox::Polygon { points } => {
                let center = polygon_centroid(points);
                for p in points.iter_mut() {
                    *p = center + (*p - center) * factor;
                }
            }
            Hitbox::Group { hitboxes } => {
                for h in hitboxes {
                    h.scale(factor);
                }
            }
        }
    }

    /// Move the whole shape by `offset`
    pub fn translate(&mut self, offset: Vec2) {
        match self {
            Hitbox::Circle { position, .. } => *position += offset,
            Hitbox::Rect { min, max } => {
                *min += offset;
                *max += offset;
            }
            Hitbox::Polygon { points } => {
                for p in points.iter_mut() {
                    *p += offset;
                }
            }
            Hitbox::Group { hitboxes } => {
                for h in hitboxes {
                    h.translate(offset);
                }
            }
        }
    }

    /// Uniformly distributed point inside the shape
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        match self {
            Hitbox::Circle { position, radius } => {
                let angle = rng.random_range(0.0..std::f32::consts::TAU);
                let r = radius * rng.random::<f32>().sqrt();
                *position + Vec2::from_angle(angle) * r
            }
            Hitbox::Rect { min, max } => Vec2::new(
                random_between(rng, min.x, max.x),
                random_between(rng, min.y, max.y),
            ),
            Hitbox::Polygon { points } => {
                let (min, max) = bounds_of(points.iter().copied());
                for _ in 0..RANDOM_POINT_ATTEMPTS {
                    let p = Vec2::new(random_between(rng, min.x, max.x), random_between(rng, min.y, max.y));
                    if point_in_polygon(p, points) {
                        return p;
                    }
                }
                polygon_centroid(points)
            }
            Hitbox::Group { hitboxes } => {
                if hitboxes.is_empty() {
                    return Vec2::ZERO;
                }
                let i = rng.random_range(0..hitboxes.len());
                hitboxes[i].random_point(rng)
            }
        }
    }

    /// Axis-aligned bounds as `(min, max)`
    pub fn bounds(&self) -> (Vec2, Vec2) {
        match self {
            Hitbox::Circle { position, radius } => {
                (*position - Vec2::splat(*radius), *position + Vec2::splat(*radius))
            }
            Hitbox::Rect { min, max } => (*min, *max),
            Hitbox::Polygon { points } => bounds_of(points.iter().copied()),
            Hitbox::Group { hitboxes } => hitboxes
                .iter()
                .map(Hitbox::bounds)
                .reduce(|(amin, amax), (bmin, bmax)| (amin.min(bmin), amax.max(bmax)))
                .unwrap_or((Vec2::ZERO, Vec2::ZERO)),
        }
    }

    pub fn to_rectangle(&self) -> Hitbox {
        let (min, max) = self.bounds();
        Hitbox::Rect { min, max }
    }

    /// Bounding area, used to pick the larger of two hitboxes
    pub fn bounding_area(&self) -> f32 {
        let (min, max) = self.bounds();
        let size = max - min;
        size.x * size.y
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        match self {
            Hitbox::Circle { position, radius } => point.distance_squared(*position) < radius * radius,
            Hitbox::Rect { min, max } => {
                min.x < point.x && point.x < max.x && min.y < point.y && point.y < max.y
            }
            Hitbox::Polygon { points } => point_in_polygon(point, points),
            Hitbox::Group { hitboxes } => hitboxes.iter().any(|h| h.contains_point(point)),
        }
    }

    pub fn center(&self) -> Vec2 {
        match self {
            Hitbox::Circle { position, .. } => *position,
            _ => {
                let (min, max) = self.bounds();
                (min + max) * 0.5
            }
        }
    }
}

fn random_between<R: Rng + ?Sized>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    if hi > lo { rng.random_range(lo..hi) } else { lo }
}

fn bounds_of(points: impl Iterator<Item = Vec2>) -> (Vec2, Vec2) {
    points
        .fold(None, |acc: Option<(Vec2, Vec2)>, p| match acc {
            None => Some((p, p)),
            Some((min, max)) => Some((min.min(p), max.max(p))),
        })
        .unwrap_or((Vec2::ZERO, Vec2::ZERO))
}

fn rect_corners(min: Vec2, max: Vec2) -> [Vec2; 4] {
    [min, Vec2::new(max.x, min.y), max, Vec2::new(min.x, max.y)]
}

fn polygon_centroid(points: &[Vec2]) -> Vec2 {
    if points.is_empty() {
        return Vec2::ZERO;
    }
    points.iter().copied().sum::<Vec2>() / points.len() as f32
}

fn closest_record(records: impl Iterator<Item = CollisionRecord>) -> CollisionRecord {
    records
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
        .unwrap_or(CollisionRecord {
            collided: false,
            distance: f32::MAX,
        })
}

fn polygon_collides_circle(points: &[Vec2], center: Vec2, radius: f32) -> bool {
    point_in_polygon(center, points) || distance_to_polygon_edge(center, points) < radius
}

fn polygons_collide(a: &[Vec2], b: &[Vec2]) -> bool {
    if a.iter().any(|p| point_in_polygon(*p, b)) || b.iter().any(|p| point_in_polygon(*p, a)) {
        return true;
    }
    polygon_edges(a).any(|(a0, a1)| {
        polygon_edges(b).any(|(b0, b1)| segment_intersection(a0, a1, b0, b1).is_some())
    })
}

/// Gap between two outlines; disjoint polygons are closest at a vertex-edge pair
fn polygon_distance(a: &[Vec2], b: &[Vec2]) -> CollisionRecord {
    if polygons_collide(a, b) {
        return CollisionRecord {
            collided: true,
            distance: 0.0,
        };
    }
    let a_to_b = a.iter().map(|p| distance_to_polygon_edge(*p, b));
    let b_to_a = b.iter().map(|p| distance_to_polygon_edge(*p, a));
    CollisionRecord {
        collided: false,
        distance: a_to_b.chain(b_to_a).fold(f32::MAX, f32::min),
    }
}

fn polygon_intersects_line(points: &[Vec2], a: Vec2, b: Vec2) -> Option<LineIntersection> {
    let dir = (b - a).normalize_or_zero();
    if point_in_polygon(a, points) {
        return Some(LineIntersection {
            point: a,
            normal: -dir,
        });
    }
    polygon_edges(points)
        .filter_map(|(e0, e1)| {
            let t = segment_intersection(a, b, e0, e1)?;
            let mut normal = (e1 - e0).perp().normalize_or_zero();
            if normal.dot(dir) > 0.0 {
                normal = -normal;
            }
            Some((t, LineIntersection {
                point: a + (b - a) * t,
                normal,
            }))
        })
        .min_by(|x, y| x.0.total_cmp(&y.0))
        .map(|(_, hit)| hit)
}
