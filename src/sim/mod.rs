//! Deterministic beam simulation
//!
//! All propagation logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Stable iteration order (by beam ID)
//! - Cross-beam writes go through the deferred queue
//! - No rendering or platform dependencies

pub mod beam;
pub mod collision;
pub mod deferred;
pub mod effect;
pub mod geometry;
pub mod scene;
pub mod state;
pub mod surface;
pub mod tick;

pub use beam::{Beam, BeamId, BeamSegment, BeamStatus, TickContext};
pub use collision::{CollisionChange, CollisionMemory, ResolvedCollision, classify, other_side_offset};
pub use deferred::{DeferredAction, DeferredQueue};
pub use effect::{EffectPose, ImpactEffect, SimEvent};
pub use geometry::{GeometryQuery, Layer, RayHit, Shape, SurfaceId};
pub use scene::{EmitterDesc, ObjectDesc, Scene, SceneDesc, SceneObject};
pub use state::{BeamWorld, Registry};
pub use surface::{
    Absorber, BeamSpawner, Mirror, Portal, Splitter, Surface, SurfaceContext, SurfaceKind,
};
pub use tick::{TickStats, tick};
