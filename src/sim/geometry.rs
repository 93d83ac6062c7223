//! Ray queries against convex scene geometry
//!
//! The beam engine only ever asks two questions of the world: "what does this
//! ray hit first?" and "where does this ray hit one particular surface?". Both
//! live behind [`GeometryQuery`] so a host engine can answer them with its own
//! physics; [`Shape`] provides the analytic answers for the built-in scene.

use std::ops::BitOr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::surface::Surface;

/// Identity of a collidable surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(pub u32);

/// Collision layer bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Layer(pub u32);

impl Layer {
    /// Puzzle pieces (mirrors, blocks, splitters)
    pub const TILE: Layer = Layer(1 << 0);
    /// Level walls
    pub const WALL: Layer = Layer(1 << 1);
    /// Decorative geometry beams pass through
    pub const DECOR: Layer = Layer(1 << 2);
    pub const ALL: Layer = Layer(u32::MAX);

    /// True if any bit of `other` is set in `self`
    #[inline]
    pub fn intersects(self, other: Layer) -> bool {
        self.0 & other.0 != 0
    }

    /// True if every bit of `other` is set in `self`
    #[inline]
    pub fn contains(self, other: Layer) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for Layer {
    fn default() -> Self {
        Layer::TILE
    }
}

impl BitOr for Layer {
    type Output = Layer;

    fn bitor(self, rhs: Layer) -> Layer {
        Layer(self.0 | rhs.0)
    }
}

/// Result of a ray query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Distance from the ray origin to the hit point
    pub distance: f32,
    /// World-space hit point
    pub point: Vec3,
    /// Surface normal at the hit point (facing the incoming ray)
    pub normal: Vec3,
    /// Surface that was hit; always present for a reported hit
    pub surface: SurfaceId,
}

/// Ray-intersection queries against scene geometry
pub trait GeometryQuery {
    /// First hit along `dir` within `max_distance`, restricted to `mask`
    fn raycast(&self, origin: Vec3, dir: Vec3, max_distance: f32, mask: Layer) -> Option<RayHit>;

    /// Hit against a single surface only, ignoring layers
    fn raycast_surface(
        &self,
        surface: SurfaceId,
        origin: Vec3,
        dir: Vec3,
        max_distance: f32,
    ) -> Option<RayHit>;

    /// Behaviour of the surface a hit reported
    fn surface(&self, id: SurfaceId) -> Option<&dyn Surface>;
}

/// A convex solid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Sphere { center: Vec3, radius: f32 },
    Aabb { min: Vec3, max: Vec3 },
}

impl Shape {
    /// Axis-aligned box from center and half extents
    pub fn cuboid(center: Vec3, half_extents: Vec3) -> Self {
        let half = half_extents.abs();
        Shape::Aabb {
            min: center - half,
            max: center + half,
        }
    }

    pub fn sphere(center: Vec3, radius: f32) -> Self {
        Shape::Sphere {
            center,
            radius: radius.abs(),
        }
    }

    /// Move the shape by `offset`
    pub fn translate(&mut self, offset: Vec3) {
        match self {
            Shape::Sphere { center, .. } => *center += offset,
            Shape::Aabb { min, max } => {
                *min += offset;
                *max += offset;
            }
        }
    }

    /// Whether `p` lies strictly inside the solid
    pub fn contains_point(&self, p: Vec3) -> bool {
        match *self {
            Shape::Sphere { center, radius } => (p - center).length_squared() < radius * radius,
            Shape::Aabb { min, max } => p.cmpgt(min).all() && p.cmplt(max).all(),
        }
    }

    /// Distance and outward normal of the first surface crossing along the ray.
    ///
    /// Rays starting inside the solid report no hit. `dir` must be unit length.
    pub fn ray_intersect(&self, origin: Vec3, dir: Vec3, max_distance: f32) -> Option<(f32, Vec3)> {
        let (t, normal) = match *self {
            Shape::Sphere { center, radius } => ray_sphere(origin, dir, center, radius)?,
            Shape::Aabb { min, max } => ray_aabb(origin, dir, min, max)?,
        };
        (t <= max_distance).then_some((t, normal))
    }
}

fn ray_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<(f32, Vec3)> {
    let oc = origin - center;
    let c = oc.length_squared() - radius * radius;
    if c < 0.0 {
        return None; // Inside
    }
    let b = oc.dot(dir);
    if b > 0.0 {
        return None; // Pointing away
    }
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()).max(0.0);
    let normal = (origin + dir * t - center).normalize_or_zero();
    Some((t, normal))
}

fn ray_aabb(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_near = f32::NEG_INFINITY;
    let mut t_far = f32::INFINITY;
    let mut normal = Vec3::ZERO;

    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];
        if d.abs() < 1e-12 {
            // Parallel to this slab
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut t0 = (min[axis] - o) * inv;
        let mut t1 = (max[axis] - o) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }

        if t0 > t_near {
            t_near = t0;
            normal = Vec3::ZERO;
            normal[axis] = -d.signum();
        }
        t_far = t_far.min(t1);
        if t_near > t_far {
            return None;
        }
    }

    if t_far < 0.0 || t_near < 0.0 {
        // Behind the ray, or the origin is inside the box
        return None;
    }
    Some((t_near, normal))
}
