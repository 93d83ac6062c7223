//! Beamline headless runner
//!
//! Loads a scene (or generates a seeded demo scene), runs the fixed-timestep
//! loop for a while and reports what the beams did.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use beamline::consts::*;
use beamline::sim::{BeamWorld, Layer, ObjectDesc, SceneDesc, Shape, SimEvent, SurfaceKind, tick};
use beamline::{ConfigError, Settings};

/// Headless beam simulation runner
#[derive(Parser, Debug)]
#[command(name = "beamline", version)]
#[command(about = "Runs a beam scene at a fixed timestep and reports what the beams did")]
struct Options {
    /// Scene JSON file (omit for a seeded demo scene)
    scene: Option<PathBuf>,

    /// Settings JSON file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Simulated duration in seconds
    #[arg(long, default_value_t = 10.0, value_parser = parse_seconds)]
    seconds: f32,

    /// Demo scene seed
    #[arg(long, default_value_t = 12345)]
    seed: u64,
}

fn parse_seconds(value: &str) -> Result<f32, String> {
    let seconds: f32 = value.parse().map_err(|e| format!("{e}"))?;
    if seconds.is_finite() && seconds > 0.0 {
        Ok(seconds)
    } else {
        Err(format!("duration must be a positive finite number, got {seconds}"))
    }
}

/// A walled room with randomly placed puzzle pieces and one emitter
fn demo_scene(seed: u64) -> SceneDesc {
    let mut rng = Pcg32::seed_from_u64(seed);
    let mut objects = Vec::new();

    // Walls of a 40x40x40 room
    for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
        for side in [-1.0, 1.0] {
            let half = Vec3::splat(20.0) - axis * 19.5;
            objects.push(ObjectDesc {
                shape: Shape::cuboid(axis * 20.0 * side, half),
                layer: Layer::WALL,
                surface: SurfaceKind::Absorber,
            });
        }
    }

    for _ in 0..12 {
        let center = Vec3::new(
            rng.random_range(-15.0..15.0),
            rng.random_range(-3.0..3.0),
            rng.random_range(-15.0..15.0),
        );
        let surface = match rng.random_range(0..4) {
            0 => SurfaceKind::Absorber,
            1 | 2 => SurfaceKind::Mirror,
            _ => SurfaceKind::Splitter,
        };
        let shape = if rng.random_bool(0.5) {
            Shape::sphere(center, rng.random_range(0.5..2.0))
        } else {
            Shape::cuboid(center, Vec3::splat(rng.random_range(0.5..2.0)))
        };
        objects.push(ObjectDesc {
            shape,
            layer: Layer::TILE,
            surface,
        });
    }

    let direction = Vec3::new(rng.random_range(-1.0..1.0), 0.0, rng.random_range(-1.0..1.0));
    SceneDesc {
        objects,
        emitters: vec![beamline::sim::EmitterDesc {
            origin: Vec3::new(0.0, 0.0, -18.0),
            direction: if direction.length_squared() > 0.0 { direction } else { Vec3::Z },
        }],
    }
}

fn load(opts: &Options) -> Result<(SceneDesc, Settings), ConfigError> {
    let settings = match &opts.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let desc = match &opts.scene {
        Some(path) => SceneDesc::load(path)?,
        None => {
            log::info!("No scene given, generating demo scene with seed {}", opts.seed);
            demo_scene(opts.seed)
        }
    };
    Ok((desc, settings))
}

/// Tally of interesting events over a run
#[derive(Debug, Default)]
struct RunSummary {
    created: usize,
    splits: usize,
    terminated: usize,
    refused: usize,
    peak_live: usize,
}

impl RunSummary {
    fn record(&mut self, events: &[SimEvent]) {
        for event in events {
            match event {
                SimEvent::BeamCreated { .. } => self.created += 1,
                SimEvent::BeamSplit { .. } => self.splits += 1,
                SimEvent::BeamTerminated { .. } => self.terminated += 1,
                SimEvent::CreationRefused { .. } => self.refused += 1,
                _ => {}
            }
        }
    }
}

fn run(world: &mut BeamWorld, seconds: f32) -> RunSummary {
    // Render-rate frames feeding the fixed-timestep accumulator
    const FRAME_DT: f32 = 1.0 / 30.0;

    let mut summary = RunSummary::default();
    summary.record(&world.drain_events());

    let mut accumulator = 0.0;
    let mut elapsed = 0.0;
    while elapsed < seconds {
        elapsed += FRAME_DT;
        accumulator += FRAME_DT;

        let mut substeps = 0;
        while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            tick(world, SIM_DT);
            accumulator -= SIM_DT;
            substeps += 1;
        }

        summary.record(&world.drain_events());
        summary.peak_live = summary.peak_live.max(world.live_count());
    }
    summary
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Options::parse();

    let (desc, settings) = match load(&opts) {
        Ok(loaded) => loaded,
        Err(e) => {
            log::error!("Failed to load: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut world = BeamWorld::from_desc(&desc, settings);
    log::info!(
        "Running {} objects, {} emitters for {}s",
        world.scene.len(),
        desc.emitters.len(),
        opts.seconds
    );

    let summary = run(&mut world, opts.seconds);
    log::info!(
        "Done after {} ticks: {} created, {} splits, {} terminated, {} refused, peak {} live, {} live now",
        world.time_ticks(),
        summary.created,
        summary.splits,
        summary.terminated,
        summary.refused,
        summary.peak_live,
        world.live_count()
    );
    for (id, segment) in world.segments().filter(|(_, s)| s.enabled) {
        log::debug!("{:?}: {} -> {} ({:.2})", id, segment.start, segment.end, segment.length);
    }

    ExitCode::SUCCESS
}
