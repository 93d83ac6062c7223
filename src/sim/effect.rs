//! Impact effect handles and simulation events
//!
//! The engine never renders anything. Visual state changes are published as
//! [`SimEvent`]s for whatever presentation layer is attached.

use glam::Vec3;

use super::beam::BeamId;

/// Something the presentation layer may want to react to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    BeamCreated { beam: BeamId, origin: Vec3, direction: Vec3 },
    /// A disconnected remnant was split off `parent`
    BeamSplit { parent: BeamId, remnant: BeamId },
    BeamTerminated { beam: BeamId },
    /// Creation was refused because the population cap was reached
    CreationRefused { origin: Vec3 },
    EffectPlayed { beam: BeamId, point: Vec3, direction: Vec3 },
    EffectStopped { beam: BeamId },
    EffectReleased { beam: BeamId },
}

/// Where an active effect is playing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectPose {
    pub point: Vec3,
    pub direction: Vec3,
}

/// A beam's spray effect at its impact point.
///
/// `play` and `stop` are idempotent: events are emitted only on real changes.
#[derive(Debug, Clone, Default)]
pub struct ImpactEffect {
    active: Option<EffectPose>,
    released: bool,
}

impl ImpactEffect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.active.is_some()
    }

    pub fn pose(&self) -> Option<EffectPose> {
        self.active
    }

    /// Start the effect, or move it if already playing elsewhere
    pub fn play(&mut self, beam: BeamId, point: Vec3, direction: Vec3, events: &mut Vec<SimEvent>) {
        if self.released {
            return;
        }
        let pose = EffectPose { point, direction };
        if self.active == Some(pose) {
            return;
        }
        self.active = Some(pose);
        events.push(SimEvent::EffectPlayed { beam, point, direction });
    }

    pub fn stop(&mut self, beam: BeamId, events: &mut Vec<SimEvent>) {
        if self.active.take().is_some() {
            events.push(SimEvent::EffectStopped { beam });
        }
    }

    /// Give the effect resource back; later calls do nothing
    pub fn release(&mut self, beam: BeamId, events: &mut Vec<SimEvent>) {
        if self.released {
            return;
        }
        self.active = None;
        self.released = true;
        events.push(SimEvent::EffectReleased { beam });
    }
}
