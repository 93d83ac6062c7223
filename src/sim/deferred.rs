//! Deferred cross-beam mutations
//!
//! A beam must not write another beam's state during the processing pass:
//! the target may not have been processed yet, or may already be gone. Such
//! writes are queued here and applied once the pass is over.

use super::beam::BeamId;

/// A mutation applied after the processing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    /// The beam lost its source
    Depower(BeamId),
}

/// Per-tick queue of deferred actions
#[derive(Debug, Default)]
pub struct DeferredQueue {
    actions: Vec<DeferredAction>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, action: DeferredAction) {
        self.actions.push(action);
    }

    /// Queue a depower for every beam in `children`
    pub fn depower_all(&mut self, children: &[BeamId]) {
        self.actions
            .extend(children.iter().copied().map(DeferredAction::Depower));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Take every queued action in enqueue order
    pub fn drain(&mut self) -> std::vec::Drain<'_, DeferredAction> {
        self.actions.drain(..)
    }
}
