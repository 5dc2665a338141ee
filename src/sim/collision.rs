//! Collision detection and response primitives
//!
//! Shape-pair math used by [`Hitbox`](super::hitbox::Hitbox). Everything here
//! works on plain points, radii and rectangle corners so it can be tested in
//! isolation.

use glam::Vec2;

const EPSILON: f32 = 1e-6;

/// Penetration of a circle into another shape.
///
/// `dir` points from the circle into the other shape; subtracting
/// `dir * pen` from the circle position separates the two.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResponse {
    pub dir: Vec2,
    pub pen: f32,
}

/// Where a segment first meets a shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineIntersection {
    pub point: Vec2,
    /// Unit surface normal at `point`
    pub normal: Vec2,
}

/// Separation between two shapes.
///
/// `distance` is the signed gap: positive when apart, zero or negative when
/// overlapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionRecord {
    pub collided: bool,
    pub distance: f32,
}

impl CollisionRecord {
    fn from_gap(distance: f32) -> Self {
        Self {
            collided: distance < 0.0,
            distance,
        }
    }
}

#[inline]
pub fn check_circle_circle(p1: Vec2, r1: f32, p2: Vec2, r2: f32) -> bool {
    let r = r1 + r2;
    p1.distance_squared(p2) < r * r
}

#[inline]
pub fn check_rect_circle(min: Vec2, max: Vec2, pos: Vec2, radius: f32) -> bool {
    let closest = pos.clamp(min, max);
    closest.distance_squared(pos) < radius * radius
}

#[inline]
pub fn check_rect_rect(min1: Vec2, max1: Vec2, min2: Vec2, max2: Vec2) -> bool {
    min2.x < max1.x && min1.x < max2.x && min2.y < max1.y && min1.y < max2.y
}

/// Penetration of circle 1 into circle 2
pub fn circle_circle_intersection(
    p1: Vec2,
    r1: f32,
    p2: Vec2,
    r2: f32,
) -> Option<CollisionResponse> {
    let r = r1 + r2;
    let to_other = p2 - p1;
    let dist_sq = to_other.length_squared();
    if dist_sq >= r * r {
        return None;
    }
    let dist = dist_sq.sqrt();
    let dir = if dist > EPSILON { to_other / dist } else { Vec2::X };
    Some(CollisionResponse { dir, pen: r - dist })
}

/// Penetration of a circle into an axis-aligned rectangle
pub fn rect_circle_intersection(
    min: Vec2,
    max: Vec2,
    pos: Vec2,
    radius: f32,
) -> Option<CollisionResponse> {
    let inside = min.x <= pos.x && pos.x <= max.x && min.y <= pos.y && pos.y <= max.y;
    if inside {
        // Center is inside: leave through the closest face
        let half = (max - min) * 0.5;
        let center = min + half;
        let p = pos - center;
        let xp = p.x.abs() - half.x - radius;
        let yp = p.y.abs() - half.y - radius;
        return if xp > yp {
            Some(CollisionResponse {
                dir: Vec2::new(if p.x > 0.0 { -1.0 } else { 1.0 }, 0.0),
                pen: -xp,
            })
        } else {
            Some(CollisionResponse {
                dir: Vec2::new(0.0, if p.y > 0.0 { -1.0 } else { 1.0 }),
                pen: -yp,
            })
        };
    }

    let closest = pos.clamp(min, max);
    let to_rect = closest - pos;
    let dist_sq = to_rect.length_squared();
    if dist_sq >= radius * radius {
        return None;
    }
    let dist = dist_sq.sqrt();
    Some(CollisionResponse {
        dir: to_rect.normalize_or_zero(),
        pen: radius - dist,
    })
}

pub fn distance_between_circles(p1: Vec2, r1: f32, p2: Vec2, r2: f32) -> CollisionRecord {
    CollisionRecord::from_gap(p1.distance(p2) - (r1 + r2))
}

/// Gap between a circle and a rectangle
pub fn distance_to_rectangle(min: Vec2, max: Vec2, pos: Vec2, radius: f32) -> CollisionRecord {
    let inside = min.x <= pos.x && pos.x <= max.x && min.y <= pos.y && pos.y <= max.y;
    if inside {
        let to_edge = (pos.x - min.x)
            .min(max.x - pos.x)
            .min(pos.y - min.y)
            .min(max.y - pos.y);
        return CollisionRecord::from_gap(-to_edge - radius);
    }
    CollisionRecord::from_gap(pos.clamp(min, max).distance(pos) - radius)
}

/// Gap between two rectangles (negative overlap depth when intersecting)
pub fn rect_rect_distance(min1: Vec2, max1: Vec2, min2: Vec2, max2: Vec2) -> CollisionRecord {
    let dx = (min1.x - max2.x).max(min2.x - max1.x);
    let dy = (min1.y - max2.y).max(min2.y - max1.y);
    if dx < 0.0 && dy < 0.0 {
        return CollisionRecord {
            collided: true,
            distance: dx.max(dy),
        };
    }
    CollisionRecord::from_gap(Vec2::new(dx.max(0.0), dy.max(0.0)).length())
}

/// First point where segment `a -> b` enters a circle.
///
/// A segment starting inside the circle reports its start point.
pub fn line_intersects_circle(a: Vec2, b: Vec2, pos: Vec2, radius: f32) -> Option<LineIntersection> {
    let d = b - a;
    let len = d.length().max(EPSILON);
    let dir = d / len;
    let m = a - pos;
    let bb = m.dot(dir);
    let c = m.dot(m) - radius * radius;
    if c <= 0.0 {
        return Some(LineIntersection {
            point: a,
            normal: m.try_normalize().unwrap_or(-dir),
        });
    }
    if bb > 0.0 {
        return None;
    }
    let disc_sq = bb * bb - c;
    if disc_sq < 0.0 {
        return None;
    }
    let t = -bb - disc_sq.sqrt();
    if t > len {
        return None;
    }
    let point = a + dir * t;
    Some(LineIntersection {
        point,
        normal: (point - pos).normalize_or_zero(),
    })
}

/// First point where segment `a -> b` enters an axis-aligned rectangle.
///
/// A segment starting inside the rectangle reports its start point.
pub fn line_intersects_rect(a: Vec2, b: Vec2, min: Vec2, max: Vec2) -> Option<LineIntersection> {
    let d = b - a;
    let len = d.length();
    let dir = if len > EPSILON { d / len } else { Vec2::X };

    let mut tmin = 0.0f32;
    let mut tmax = f32::MAX;
    for axis in 0..2 {
        let (origin, step, lo, hi) = (a[axis], dir[axis], min[axis], max[axis]);
        if step.abs() < EPSILON {
            if origin < lo || origin > hi {
                return None;
            }
        } else {
            let inv = 1.0 / step;
            let t1 = (lo - origin) * inv;
            let t2 = (hi - origin) * inv;
            tmin = tmin.max(t1.min(t2));
            tmax = tmax.min(t1.max(t2));
            if tmin > tmax {
                return None;
            }
        }
    }
    if tmin > len {
        return None;
    }

    let point = a + dir * tmin;
    let half = (max - min) * 0.5;
    let local = point - (min + half);
    let d0 = local.x.abs() - half.x;
    let d1 = local.y.abs() - half.y;
    let normal = if d0 > d1 {
        Vec2::new(local.x.signum(), 0.0)
    } else {
        Vec2::new(0.0, local.y.signum())
    };
    Some(LineIntersection { point, normal })
}

/// Parametric position along `a0 -> a1` where it crosses `b0 -> b1`
pub fn segment_intersection(a0: Vec2, a1: Vec2, b0: Vec2, b1: Vec2) -> Option<f32> {
    let r = a1 - a0;
    let s = b1 - b0;
    let denom = r.perp_dot(s);
    if denom.abs() < EPSILON {
        return None;
    }
    let qp = b0 - a0;
    let t = qp.perp_dot(s) / denom;
    let u = qp.perp_dot(r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(t)
    } else {
        None
    }
}

#[inline]
pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Even-odd ray casting point containment
pub fn point_in_polygon(p: Vec2, points: &[Vec2]) -> bool {
    let mut inside = false;
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (points[i], points[j]);
        if (pi.y > p.y) != (pj.y > p.y) && p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Polygon edges as (start, end) pairs, closing back to the first point
pub fn polygon_edges(points: &[Vec2]) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
    let n = points.len();
    (0..n).map(move |i| (points[i], points[(i + 1) % n]))
}

/// Distance from a point to the polygon outline
pub fn distance_to_polygon_edge(p: Vec2, points: &[Vec2]) -> f32 {
    polygon_edges(points)
        .map(|(a, b)| closest_point_on_segment(p, a, b).distance(p))
        .fold(f32::MAX, f32::min)
}

/// Reflect velocity off a surface
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}
