//! Surface responses to beam hits
//!
//! Each collidable surface decides what a beam hitting it turns into. The
//! beam itself never knows about mirrors or portals: it resolves a hit, hands
//! it to the surface and adopts whatever child beams come back.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::beam::{Beam, BeamId};
use super::collision::other_side_offset;
use super::geometry::{GeometryQuery, RayHit};
use crate::Settings;
use crate::reflect;

/// Creates beams on behalf of a surface
pub trait BeamSpawner {
    /// Register a new powered beam. Returns `None` once the population cap is hit.
    fn spawn(&mut self, origin: Vec3, direction: Vec3, intensity: u32) -> Option<BeamId>;
}

/// What a surface gets to work with while resolving a hit
pub struct SurfaceContext<'a> {
    pub geometry: &'a dyn GeometryQuery,
    pub spawner: &'a mut dyn BeamSpawner,
    pub settings: &'a Settings,
}

/// Surface behaviour capability
pub trait Surface: fmt::Debug {
    /// Child beams produced by `beam` striking this surface at `hit`
    fn on_beam_collision(&self, beam: &Beam, hit: &RayHit, ctx: &mut SurfaceContext<'_>) -> Vec<BeamId>;

    /// Whether a hit should play the impact spray
    fn triggers_impact_effect(&self) -> bool;
}

/// Solid, non-reflective surface: the beam stops and sprays
#[derive(Debug, Clone, Copy, Default)]
pub struct Absorber;

impl Surface for Absorber {
    fn on_beam_collision(&self, _beam: &Beam, _hit: &RayHit, _ctx: &mut SurfaceContext<'_>) -> Vec<BeamId> {
        Vec::new()
    }

    fn triggers_impact_effect(&self) -> bool {
        true
    }
}

/// Perfect mirror: one reflected child
#[derive(Debug, Clone, Copy, Default)]
pub struct Mirror;

impl Surface for Mirror {
    fn on_beam_collision(&self, beam: &Beam, hit: &RayHit, ctx: &mut SurfaceContext<'_>) -> Vec<BeamId> {
        let Some(intensity) = beam.child_intensity() else {
            return Vec::new();
        };
        let origin = hit.point + hit.normal * ctx.settings.other_side_epsilon;
        let dir = reflect(beam.direction(), hit.normal);
        ctx.spawner.spawn(origin, dir, intensity).into_iter().collect()
    }

    fn triggers_impact_effect(&self) -> bool {
        false
    }
}

/// Half-silvered block: reflects and also transmits through to its far side
#[derive(Debug, Clone, Copy, Default)]
pub struct Splitter;

impl Surface for Splitter {
    fn on_beam_collision(&self, beam: &Beam, hit: &RayHit, ctx: &mut SurfaceContext<'_>) -> Vec<BeamId> {
        let Some(intensity) = beam.child_intensity() else {
            return Vec::new();
        };
        let dir = beam.direction();
        let mut children = Vec::with_capacity(2);

        let reflected_origin = hit.point + hit.normal * ctx.settings.other_side_epsilon;
        children.extend(ctx.spawner.spawn(reflected_origin, reflect(dir, hit.normal), intensity));

        let through = other_side_offset(
            ctx.geometry,
            hit,
            dir,
            ctx.settings.other_side_epsilon,
            ctx.settings.other_side_probe,
        );
        children.extend(ctx.spawner.spawn(hit.point + dir * through, dir, intensity));

        children
    }

    fn triggers_impact_effect(&self) -> bool {
        false
    }
}

/// Re-emits the beam from a fixed exit point
#[derive(Debug, Clone, Copy)]
pub struct Portal {
    pub exit: Vec3,
    pub exit_direction: Vec3,
}

impl Surface for Portal {
    fn on_beam_collision(&self, beam: &Beam, _hit: &RayHit, ctx: &mut SurfaceContext<'_>) -> Vec<BeamId> {
        let Some(intensity) = beam.child_intensity() else {
            return Vec::new();
        };
        ctx.spawner
            .spawn(self.exit, self.exit_direction, intensity)
            .into_iter()
            .collect()
    }

    fn triggers_impact_effect(&self) -> bool {
        false
    }
}

/// Serializable surface description for scene files
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurfaceKind {
    #[default]
    Absorber,
    Mirror,
    Splitter,
    Portal { exit: Vec3, exit_direction: Vec3 },
}

impl SurfaceKind {
    pub fn into_surface(self) -> Box<dyn Surface> {
        match self {
            SurfaceKind::Absorber => Box::new(Absorber),
            SurfaceKind::Mirror => Box::new(Mirror),
            SurfaceKind::Splitter => Box::new(Splitter),
            SurfaceKind::Portal { exit, exit_direction } => Box::new(Portal { exit, exit_direction }),
        }
    }
}
