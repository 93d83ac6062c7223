//! Beamline - finite-speed light beams for 3D puzzle scenes
//!
//! Core modules:
//! - `sim`: Beam propagation, collision classification and the tick driver
//! - `settings`: Data-driven simulation tuning (speed, cap, tolerances)

pub mod settings;
pub mod sim;

pub use settings::{ConfigError, Settings};

use glam::Vec3;

/// Simulation configuration constants (defaults for [`Settings`])
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Beam front/tail propagation speed (units per second)
    pub const BEAM_SPEED: f32 = 5.0;
    /// Maximum number of live beams
    pub const MAX_BEAMS: usize = 1000;
    /// Hops budget for beams created without a template
    pub const DEFAULT_INTENSITY: u32 = 10;

    /// Two hit points/normals closer than this are the same collision
    pub const MATCH_TOLERANCE: f32 = 1e-3;
    /// Split remnants shorter than this are never created
    pub const MIN_SPLIT_REMAINDER: f32 = 0.01;
    /// Nudge past a hit point before probing for the far side of a solid
    pub const OTHER_SIDE_EPSILON: f32 = 1e-4;
    /// How far past the hit the far-side probe starts
    pub const OTHER_SIDE_PROBE: f32 = 1000.0;
}

/// Reflect a direction off a surface with the given normal
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect(dir: Vec3, normal: Vec3) -> Vec3 {
    dir - 2.0 * dir.dot(normal) * normal
}

/// Compare two points with a squared-distance check.
///
/// The boundary is exclusive: points exactly `tolerance` apart are different.
#[inline]
pub fn approx_eq(a: Vec3, b: Vec3, tolerance: f32) -> bool {
    (a - b).length_squared() < tolerance * tolerance
}
