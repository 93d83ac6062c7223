//! World state: the live beam set and its bookkeeping
//!
//! Everything the driver owns lives here: the beams (sorted by id for
//! determinism), the population counter, the deferred-action queue and the
//! event log.

use std::collections::BTreeMap;

use glam::Vec3;

use super::beam::{Beam, BeamId, BeamSegment};
use super::deferred::DeferredQueue;
use super::effect::SimEvent;
use super::scene::{Scene, SceneDesc};
use super::surface::BeamSpawner;
use crate::Settings;

/// Beam admission and the live population count.
///
/// Beams created while a tick is running wait in `pending` and only join the
/// live set once the processing pass is over.
#[derive(Debug)]
pub struct Registry {
    live: usize,
    max_beams: usize,
    next_id: u32,
    pending: Vec<Beam>,
    refused: Vec<Vec3>,
}

impl Registry {
    pub fn new(settings: &Settings) -> Self {
        Self {
            live: 0,
            max_beams: settings.max_beams,
            next_id: 1,
            pending: Vec::new(),
            refused: Vec::new(),
        }
    }

    /// Registered beams, including ones still waiting to join the live set
    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn has_capacity(&self) -> bool {
        self.live < self.max_beams
    }

    /// Register a new powered beam and hand it back for further setup.
    ///
    /// Returns `None` without touching the count once the cap is reached.
    pub fn create(&mut self, origin: Vec3, direction: Vec3, intensity: u32) -> Option<&mut Beam> {
        if !self.has_capacity() {
            log::debug!("Beam cap {} reached, refusing beam at {}", self.max_beams, origin);
            self.refused.push(origin);
            return None;
        }

        let id = BeamId(self.next_id);
        self.next_id += 1;
        self.live += 1;
        self.pending.push(Beam::new(id, origin, direction, intensity));
        self.pending.last_mut()
    }

    /// A live beam was destroyed
    pub(crate) fn release(&mut self) {
        debug_assert!(self.live > 0, "released more beams than were registered");
        self.live = self.live.saturating_sub(1);
    }

    pub(crate) fn take_pending(&mut self) -> Vec<Beam> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn take_refused(&mut self) -> Vec<Vec3> {
        std::mem::take(&mut self.refused)
    }
}

impl BeamSpawner for Registry {
    fn spawn(&mut self, origin: Vec3, direction: Vec3, intensity: u32) -> Option<BeamId> {
        self.create(origin, direction, intensity).map(|beam| beam.id())
    }
}

/// The simulation driver's state
#[derive(Debug)]
pub struct BeamWorld {
    /// Collidable geometry; free to change between ticks
    pub scene: Scene,
    pub(crate) settings: Settings,
    /// Live beams (sorted by id for determinism)
    pub(crate) beams: BTreeMap<BeamId, Beam>,
    pub(crate) registry: Registry,
    pub(crate) deferred: DeferredQueue,
    pub(crate) events: Vec<SimEvent>,
    /// Simulation tick counter
    pub(crate) time_ticks: u64,
}

impl BeamWorld {
    pub fn new(scene: Scene, settings: Settings) -> Self {
        let registry = Registry::new(&settings);
        Self {
            scene,
            settings,
            beams: BTreeMap::new(),
            registry,
            deferred: DeferredQueue::new(),
            events: Vec::new(),
            time_ticks: 0,
        }
    }

    /// Build the scene from its description and switch on every emitter
    pub fn from_desc(desc: &SceneDesc, settings: Settings) -> Self {
        let mut world = Self::new(Scene::from_desc(desc), settings);
        for emitter in &desc.emitters {
            if world.spawn_source(emitter.origin, emitter.direction).is_none() {
                log::warn!("Emitter at {} could not be created", emitter.origin);
            }
        }
        world
    }

    /// Create a beam, inheriting intensity from `template` if given.
    ///
    /// Returns `None` if the population cap is reached; the live count is
    /// unchanged in that case.
    pub fn create_beam(&mut self, origin: Vec3, direction: Vec3, template: Option<BeamId>) -> Option<BeamId> {
        let intensity = template
            .and_then(|id| self.beams.get(&id))
            .map(|t| t.intensity())
            .unwrap_or(self.settings.default_intensity);

        let id = self.registry.create(origin, direction, intensity).map(|b| b.id());
        self.admit_pending();
        id
    }

    /// Switch on a source beam
    pub fn spawn_source(&mut self, origin: Vec3, direction: Vec3) -> Option<BeamId> {
        self.create_beam(origin, direction, None)
    }

    /// Cut a beam off from its source. Returns false if it is not live.
    ///
    /// Only call between ticks; during a tick use the deferred queue.
    pub fn cut_source(&mut self, id: BeamId) -> bool {
        match self.beams.get_mut(&id) {
            Some(beam) => {
                beam.depower();
                true
            }
            None => false,
        }
    }

    /// Move beams created since the last call into the live set
    pub(crate) fn admit_pending(&mut self) -> usize {
        for origin in self.registry.take_refused() {
            self.events.push(SimEvent::CreationRefused { origin });
        }

        let pending = self.registry.take_pending();
        let admitted = pending.len();
        for beam in pending {
            self.events.push(SimEvent::BeamCreated {
                beam: beam.id(),
                origin: beam.origin(),
                direction: beam.direction(),
            });
            self.beams.insert(beam.id(), beam);
        }
        admitted
    }

    pub fn beam(&self, id: BeamId) -> Option<&Beam> {
        self.beams.get(&id)
    }

    pub fn beam_mut(&mut self, id: BeamId) -> Option<&mut Beam> {
        self.beams.get_mut(&id)
    }

    /// Live beams in id order
    pub fn beams(&self) -> impl Iterator<Item = &Beam> {
        self.beams.values()
    }

    /// Segments of every live beam, for rendering
    pub fn segments(&self) -> impl Iterator<Item = (BeamId, BeamSegment)> + '_ {
        self.beams.values().map(|b| (b.id(), b.segment()))
    }

    /// Registered beam count (the capped quantity)
    pub fn live_count(&self) -> usize {
        self.registry.live_count()
    }

    pub fn is_live(&self, id: BeamId) -> bool {
        self.beams.contains_key(&id)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    /// Hand out the events collected since the last call
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }
}
