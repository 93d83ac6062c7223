//! The beam entity
//!
//! A beam is a segment `[start, end]` along a fixed ray. The front advances at
//! the propagation speed until something blocks it; once the beam loses power
//! the tail chases the front at the same speed, and the beam dies when the two
//! meet. Each tick the beam issues one ray query and compares the result with
//! the collision it resolved earlier (see [`super::collision`]).

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::collision::{
    CollisionChange, CollisionMemory, ResolvedCollision, classify, other_side_offset,
};
use super::deferred::DeferredQueue;
use super::effect::{ImpactEffect, SimEvent};
use super::geometry::{GeometryQuery, RayHit};
use super::state::Registry;
use super::surface::SurfaceContext;
use crate::{Settings, reflect};

/// Beam identity, assigned by the driver in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeamId(pub u32);

/// Outcome of processing a beam for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeamStatus {
    Alive,
    /// The segment collapsed; the driver must unregister the beam
    Terminated,
}

/// Everything a beam may touch while it is processed
pub struct TickContext<'a> {
    pub geometry: &'a dyn GeometryQuery,
    pub settings: &'a Settings,
    pub registry: &'a mut Registry,
    pub deferred: &'a mut DeferredQueue,
    pub events: &'a mut Vec<SimEvent>,
}

/// Render/collider view of a beam's segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamSegment {
    pub start: Vec3,
    pub end: Vec3,
    pub center: Vec3,
    pub length: f32,
    /// Zero-length segments are neither drawn nor collidable
    pub enabled: bool,
}

/// A single beam segment
#[derive(Debug, Clone)]
pub struct Beam {
    id: BeamId,
    origin: Vec3,
    direction: Vec3,
    start: f32,
    end: f32,
    powered: bool,
    /// Hops remaining before surfaces stop producing children
    intensity: u32,
    /// `None` until a hit is resolved; see [`ResolvedCollision`]
    resolved: Option<ResolvedCollision>,
    effect: ImpactEffect,
}

impl Beam {
    /// A fresh, powered, zero-length beam
    pub fn new(id: BeamId, origin: Vec3, direction: Vec3, intensity: u32) -> Self {
        Self {
            id,
            origin,
            direction: direction.try_normalize().unwrap_or(Vec3::X),
            start: 0.0,
            end: 0.0,
            powered: true,
            intensity,
            resolved: None,
            effect: ImpactEffect::new(),
        }
    }

    pub fn id(&self) -> BeamId {
        self.id
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn start(&self) -> f32 {
        self.start
    }

    pub fn end(&self) -> f32 {
        self.end
    }

    pub fn length(&self) -> f32 {
        self.end - self.start
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn intensity(&self) -> u32 {
        self.intensity
    }

    /// Intensity for beams a surface creates from this one, `None` when spent
    pub fn child_intensity(&self) -> Option<u32> {
        self.intensity.checked_sub(1)
    }

    /// Children of the resolved collision, `None` if nothing is resolved
    pub fn children(&self) -> Option<&[BeamId]> {
        self.resolved.as_ref().map(|r| r.children.as_slice())
    }

    pub fn collision(&self) -> Option<&CollisionMemory> {
        self.resolved.as_ref().map(|r| &r.memory)
    }

    pub fn effect(&self) -> &ImpactEffect {
        &self.effect
    }

    /// World-space point at offset `t` along the beam
    #[inline]
    pub fn point(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Cut the beam off from its source. The tail starts retracting next tick.
    pub fn depower(&mut self) {
        self.powered = false;
    }

    /// Overwrite the segment bounds, keeping `0 <= start <= end`
    pub fn set_extent(&mut self, start: f32, end: f32) {
        self.start = start.max(0.0);
        self.end = end.max(self.start);
    }

    pub fn segment(&self) -> BeamSegment {
        let start = self.point(self.start);
        let end = self.point(self.end);
        let length = self.length();
        BeamSegment {
            start,
            end,
            center: self.point((self.start + self.end) / 2.0),
            length,
            enabled: length > 0.0,
        }
    }

    /// Advance the beam by one tick of `dt` seconds
    pub fn process(&mut self, dt: f32, ctx: &mut TickContext<'_>) -> BeamStatus {
        let dl = ctx.settings.step_length(dt);
        let (start, end) = (self.start, self.end);

        let hit = ctx.geometry.raycast(
            self.point(start),
            self.direction,
            end - start + dl,
            ctx.settings.collision_mask,
        );

        self.handle_collision(start, end, hit.as_ref(), ctx);

        match hit {
            Some(hit) => self.end = start + hit.distance,
            None => self.end += dl,
        }
        if !self.powered {
            self.start += dl;
        }

        if self.start >= self.end {
            self.terminate(ctx);
            return BeamStatus::Terminated;
        }
        BeamStatus::Alive
    }

    fn handle_collision(&mut self, start: f32, end: f32, hit: Option<&RayHit>, ctx: &mut TickContext<'_>) {
        let change = classify(self.resolved.as_ref(), hit, ctx.settings.match_tolerance);

        let mut displaced = None;
        if change.displaces_previous() {
            self.effect.stop(self.id, ctx.events);
            displaced = self.resolved.take();
        }

        let Some(hit) = hit.filter(|_| change.needs_resolution()) else {
            if let Some(prev) = displaced {
                ctx.deferred.depower_all(&prev.children);
            }
            if change == CollisionChange::Unchanged {
                self.sustain_effect(ctx);
            } else {
                self.effect.stop(self.id, ctx.events);
            }
            return;
        };

        // The obstacle sits inside the part of the ray already lit
        if hit.distance < end - start {
            displaced = self.split(start, end, hit, displaced, ctx);
        }
        if let Some(prev) = displaced {
            ctx.deferred.depower_all(&prev.children);
        }

        self.resolve(hit, ctx);
    }

    /// Split off the lit section beyond a new obstacle as an unpowered remnant.
    ///
    /// The remnant takes over the displaced collision, so whatever hung off the
    /// far end stays fed until the remnant's tail gets there. Returns the
    /// displaced collision if no remnant was created.
    fn split(
        &self,
        start: f32,
        end: f32,
        hit: &RayHit,
        displaced: Option<ResolvedCollision>,
        ctx: &mut TickContext<'_>,
    ) -> Option<ResolvedCollision> {
        let settings = ctx.settings;
        let offset = other_side_offset(
            ctx.geometry,
            hit,
            self.direction,
            settings.other_side_epsilon,
            settings.other_side_probe,
        );
        let new_start = start + hit.distance + offset;
        if new_start > end - settings.min_split_remainder {
            return displaced;
        }

        let Some(remnant) = ctx
            .registry
            .create(self.point(new_start), self.direction, self.intensity)
        else {
            return displaced;
        };
        remnant.end = end - new_start;
        remnant.powered = false;
        remnant.resolved = displaced;

        log::debug!(
            "Beam {:?} split at {:.3}: remnant {:?} covers {:.3}",
            self.id,
            new_start,
            remnant.id,
            remnant.end
        );
        ctx.events.push(SimEvent::BeamSplit {
            parent: self.id,
            remnant: remnant.id,
        });
        None
    }

    /// Hand a new hit to its surface and adopt the children it produces
    fn resolve(&mut self, hit: &RayHit, ctx: &mut TickContext<'_>) {
        let geometry = ctx.geometry;
        let surface = geometry.surface(hit.surface).unwrap_or_else(|| {
            panic!(
                "beam {:?} hit surface {:?} which the geometry cannot identify",
                self.id, hit.surface
            )
        });

        let children = {
            let mut surface_ctx = SurfaceContext {
                geometry,
                spawner: &mut *ctx.registry,
                settings: ctx.settings,
            };
            surface.on_beam_collision(self, hit, &mut surface_ctx)
        };

        self.resolved = Some(ResolvedCollision {
            memory: CollisionMemory::from_hit(hit),
            children,
        });

        if surface.triggers_impact_effect() {
            let spray = reflect(self.direction, hit.normal);
            self.effect.play(self.id, hit.point, spray, ctx.events);
        }
    }

    /// Keep the spray going at a remembered hit. No-op while it already plays
    /// there; a split remnant picks up its inherited spray this way.
    fn sustain_effect(&mut self, ctx: &mut TickContext<'_>) {
        let Some(memory) = self.collision().copied() else {
            return;
        };
        let sprays = ctx
            .geometry
            .surface(memory.surface)
            .is_some_and(|surface| surface.triggers_impact_effect());
        if sprays {
            let spray = reflect(self.direction, memory.normal);
            self.effect.play(self.id, memory.point, spray, ctx.events);
        }
    }

    fn terminate(&mut self, ctx: &mut TickContext<'_>) {
        if let Some(resolved) = self.resolved.take() {
            ctx.deferred.depower_all(&resolved.children);
        }
        self.effect.release(self.id, ctx.events);
        self.start = self.end;
    }
}
