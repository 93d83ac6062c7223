//! Collision memory and frame-to-frame hit classification
//!
//! A beam remembers the last hit it resolved. Every tick the fresh ray query
//! is compared against that memory to decide whether anything needs doing:
//! most ticks nothing changed and the beam just keeps its children.

use glam::Vec3;

use super::beam::BeamId;
use super::geometry::{GeometryQuery, RayHit, SurfaceId};
use crate::approx_eq;

/// The last hit a beam resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionMemory {
    pub surface: SurfaceId,
    pub point: Vec3,
    pub normal: Vec3,
}

impl CollisionMemory {
    pub fn from_hit(hit: &RayHit) -> Self {
        Self {
            surface: hit.surface,
            point: hit.point,
            normal: hit.normal,
        }
    }

    /// Same surface, and point and normal within `tolerance`
    pub fn matches(&self, hit: &RayHit, tolerance: f32) -> bool {
        self.surface == hit.surface
            && approx_eq(self.point, hit.point, tolerance)
            && approx_eq(self.normal, hit.normal, tolerance)
    }
}

/// A resolved collision and the children the surface produced for it.
///
/// `Option<ResolvedCollision>` on the beam distinguishes "nothing resolved"
/// (`None`) from "resolved, surface gave zero children" (`Some` with an empty
/// `children`).
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCollision {
    pub memory: CollisionMemory,
    pub children: Vec<BeamId>,
}

/// How this tick's query relates to the remembered collision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionChange {
    /// No hit now, nothing resolved before
    Miss,
    /// A resolved collision no longer exists
    Vanished,
    /// Same hit as the one already resolved
    Unchanged,
    /// A different hit replaces the resolved one
    Replaced,
    /// First hit since the last resolved collision was cleared
    Fresh,
}

impl CollisionChange {
    /// A previously resolved collision must be torn down
    pub fn displaces_previous(self) -> bool {
        matches!(self, CollisionChange::Vanished | CollisionChange::Replaced)
    }

    /// The current hit must be handed to its surface
    pub fn needs_resolution(self) -> bool {
        matches!(self, CollisionChange::Replaced | CollisionChange::Fresh)
    }
}

/// Classify a ray query result against the remembered collision
pub fn classify(
    resolved: Option<&ResolvedCollision>,
    hit: Option<&RayHit>,
    tolerance: f32,
) -> CollisionChange {
    match (resolved, hit) {
        (None, None) => CollisionChange::Miss,
        (Some(_), None) => CollisionChange::Vanished,
        (Some(prev), Some(hit)) if prev.memory.matches(hit, tolerance) => CollisionChange::Unchanged,
        (Some(_), Some(_)) => CollisionChange::Replaced,
        (None, Some(_)) => CollisionChange::Fresh,
    }
}

/// Distance from `hit.point` along `dir` to where the ray leaves the solid.
///
/// Probes back toward the hit from far beyond it against the hit surface
/// alone, so the first thing met is the solid's back face. Only correct for
/// convex solids: a concave surface can report an inner face instead.
pub fn other_side_offset(
    geometry: &dyn GeometryQuery,
    hit: &RayHit,
    dir: Vec3,
    epsilon: f32,
    probe: f32,
) -> f32 {
    let start = hit.point + dir * epsilon;
    let far = start + dir * probe;

    match geometry.raycast_surface(hit.surface, far, -dir, probe) {
        Some(back) => probe - back.distance - epsilon,
        None => {
            log::debug!(
                "No back face found for surface {:?} within {probe}, treating it as paper thin",
                hit.surface
            );
            0.0
        }
    }
}
