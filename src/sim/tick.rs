//! Fixed timestep simulation tick
//!
//! One tick processes every live beam once in id order, then admits the beams
//! created during the pass, then applies the deferred actions.

use super::beam::{BeamStatus, TickContext};
use super::deferred::DeferredAction;
use super::effect::SimEvent;
use super::state::BeamWorld;

/// What happened during a tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub processed: usize,
    pub terminated: usize,
    /// Beams admitted at the end of the pass
    pub created: usize,
    pub depowered: usize,
}

/// Advance the world by one timestep of `dt` seconds
pub fn tick(world: &mut BeamWorld, dt: f32) -> TickStats {
    let mut stats = TickStats::default();
    if !(dt > 0.0) {
        log::debug!("Skipping tick with non-positive dt {dt}");
        return stats;
    }

    world.time_ticks += 1;

    let mut terminated = Vec::new();
    {
        let mut ctx = TickContext {
            geometry: &world.scene,
            settings: &world.settings,
            registry: &mut world.registry,
            deferred: &mut world.deferred,
            events: &mut world.events,
        };
        for (id, beam) in world.beams.iter_mut() {
            stats.processed += 1;
            if beam.process(dt, &mut ctx) == BeamStatus::Terminated {
                terminated.push(*id);
            }
        }
    }

    for id in terminated {
        world.beams.remove(&id);
        world.registry.release();
        world.events.push(SimEvent::BeamTerminated { beam: id });
        stats.terminated += 1;
    }

    stats.created = world.admit_pending();

    for action in world.deferred.drain() {
        match action {
            DeferredAction::Depower(id) => {
                // The target may have died this tick already
                if let Some(beam) = world.beams.get_mut(&id) {
                    if beam.is_powered() {
                        stats.depowered += 1;
                    }
                    beam.depower();
                }
            }
        }
    }

    if stats.terminated > 0 || stats.created > 0 {
        log::debug!(
            "Tick {}: {} processed, {} terminated, {} created, {} depowered, {} live",
            world.time_ticks,
            stats.processed,
            stats.terminated,
            stats.created,
            stats.depowered,
            world.live_count()
        );
    }

    stats
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use proptest::prelude::*;

    use super::*;
    use crate::Settings;
    use crate::consts::SIM_DT;
    use crate::sim::beam::BeamId;
    use crate::sim::geometry::{Layer, Shape, SurfaceId};
    use crate::sim::scene::Scene;
    use crate::sim::surface::{Absorber, Mirror, Splitter, Surface};

    fn world_with(scene: Scene) -> BeamWorld {
        BeamWorld::new(scene, Settings::default())
    }

    fn block(scene: &mut Scene, x0: f32, x1: f32, surface: Box<dyn Surface>) -> SurfaceId {
        scene.add(
            Shape::Aabb {
                min: Vec3::new(x0, -1.0, -1.0),
                max: Vec3::new(x1, 1.0, 1.0),
            },
            Layer::TILE,
            surface,
        )
    }

    /// Run until `id` has resolved a hit (or give up)
    fn run_until_hit(world: &mut BeamWorld, id: BeamId) {
        for _ in 0..1000 {
            if world.beam(id).is_some_and(|b| b.children().is_some()) {
                return;
            }
            tick(world, SIM_DT);
        }
        panic!("beam {id:?} never hit anything");
    }

    #[test]
    fn test_unobstructed_growth() {
        let mut world = world_with(Scene::new());
        let id = world.spawn_source(Vec3::ZERO, Vec3::X).unwrap();
        let dl = world.settings().step_length(0.1);

        let mut last_end = 0.0;
        for _ in 0..20 {
            tick(&mut world, 0.1);
            let beam = world.beam(id).unwrap();
            assert_eq!(beam.start(), 0.0);
            assert!((beam.end() - last_end - dl).abs() < 1e-4);
            last_end = beam.end();
        }
        assert_eq!(world.time_ticks(), 20);
    }

    #[test]
    fn test_zero_dt_is_skipped() {
        let mut world = world_with(Scene::new());
        let id = world.spawn_source(Vec3::ZERO, Vec3::X).unwrap();
        assert_eq!(tick(&mut world, 0.0), TickStats::default());
        assert!(world.is_live(id));
        assert_eq!(world.time_ticks(), 0);
    }

    #[test]
    fn test_cut_source_beam_decays_against_wall() {
        let mut scene = Scene::new();
        block(&mut scene, 3.0, 4.0, Box::new(Absorber));
        let mut world = world_with(scene);
        let id = world.spawn_source(Vec3::ZERO, Vec3::X).unwrap();
        run_until_hit(&mut world, id);
        assert!((world.beam(id).unwrap().end() - 3.0).abs() < 1e-4);

        world.cut_source(id);
        let before = world.live_count();
        let mut ticks = 0;
        while world.is_live(id) {
            tick(&mut world, SIM_DT);
            ticks += 1;
            assert!(ticks < 200, "beam never died");
        }
        // 3 units at 5 units/s and 60 Hz
        assert!((35..=37).contains(&ticks), "took {ticks} ticks");
        assert_eq!(world.live_count(), before - 1);
        let events = world.drain_events();
        assert!(events.contains(&SimEvent::BeamTerminated { beam: id }));
        assert!(events.contains(&SimEvent::EffectReleased { beam: id }));
    }

    #[test]
    fn test_terminated_parent_depowers_children_same_tick() {
        let mut scene = Scene::new();
        block(&mut scene, 2.0, 3.0, Box::new(Mirror));
        let mut world = world_with(scene);
        let id = world.spawn_source(Vec3::ZERO, Vec3::X).unwrap();
        run_until_hit(&mut world, id);
        let child = world.beam(id).unwrap().children().unwrap()[0];
        assert!(world.beam(child).unwrap().is_powered());

        world.cut_source(id);
        while world.is_live(id) {
            tick(&mut world, SIM_DT);
        }
        // The reflected child lost power in the very tick its parent died
        assert!(!world.beam(child).unwrap().is_powered());
    }

    #[test]
    fn test_new_beams_wait_a_tick() {
        let mut scene = Scene::new();
        block(&mut scene, 0.5, 1.5, Box::new(Mirror));
        let mut world = world_with(scene);
        let id = world.spawn_source(Vec3::ZERO, Vec3::X).unwrap();
        run_until_hit(&mut world, id);

        let child = world.beam(id).unwrap().children().unwrap()[0];
        let beam = world.beam(child).unwrap();
        // Admitted at the end of the tick that created it, never processed yet
        assert_eq!(beam.end(), 0.0);
        assert!((beam.direction() - Vec3::NEG_X).length() < 1e-6);

        let stats = tick(&mut world, SIM_DT);
        assert_eq!(stats.processed, 2);
        assert!(world.beam(child).unwrap().end() > 0.0);
    }

    #[test]
    fn test_idempotent_collision() {
        let mut scene = Scene::new();
        block(&mut scene, 2.0, 3.0, Box::new(Absorber));
        let mut world = world_with(scene);
        let id = world.spawn_source(Vec3::ZERO, Vec3::X).unwrap();
        run_until_hit(&mut world, id);
        world.drain_events();
        let count = world.live_count();

        for _ in 0..30 {
            let stats = tick(&mut world, SIM_DT);
            assert_eq!(stats.created, 0);
        }
        assert_eq!(world.live_count(), count);
        // Effect was not restarted
        assert!(
            !world
                .drain_events()
                .iter()
                .any(|e| matches!(e, SimEvent::EffectPlayed { .. } | SimEvent::EffectStopped { .. }))
        );
        assert!(world.beam(id).unwrap().effect().is_playing());
    }

    #[test]
    fn test_split_leaves_remnant_behind_obstacle() {
        let mut world = world_with(Scene::new());
        let id = world.spawn_source(Vec3::ZERO, Vec3::X).unwrap();
        world.beam_mut(id).unwrap().set_extent(0.0, 10.0);

        // Obstacle appears in the middle of the lit segment
        block(&mut world.scene, 3.0, 4.0, Box::new(Absorber));
        tick(&mut world, SIM_DT);

        let original = world.beam(id).unwrap();
        assert!((original.end() - 3.0).abs() < 1e-3);
        assert!(original.is_powered());

        let remnant = world.beams().find(|b| b.id() != id).expect("no remnant was split off");
        assert!(!remnant.is_powered());
        assert!((remnant.origin().x - 4.0).abs() < 1e-2);
        assert_eq!(remnant.start(), 0.0);
        assert!((remnant.end() - 6.0).abs() < 1e-2);
        assert_eq!(remnant.direction(), Vec3::X);

        let split = SimEvent::BeamSplit {
            parent: id,
            remnant: remnant.id(),
        };
        assert!(world.drain_events().contains(&split));
    }

    #[test]
    fn test_split_too_close_to_end_is_dropped() {
        let mut world = world_with(Scene::new());
        let id = world.spawn_source(Vec3::ZERO, Vec3::X).unwrap();
        world.beam_mut(id).unwrap().set_extent(0.0, 4.005);

        block(&mut world.scene, 3.0, 4.0, Box::new(Absorber));
        tick(&mut world, SIM_DT);

        assert_eq!(world.live_count(), 1);
        assert!((world.beam(id).unwrap().end() - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_split_remnant_keeps_far_children_fed() {
        let mut scene = Scene::new();
        block(&mut scene, 8.0, 9.0, Box::new(Mirror));
        let mut world = world_with(scene);
        let id = world.spawn_source(Vec3::ZERO, Vec3::X).unwrap();
        run_until_hit(&mut world, id);
        let child = world.beam(id).unwrap().children().unwrap()[0];

        block(&mut world.scene, 3.0, 4.0, Box::new(Absorber));
        tick(&mut world, SIM_DT);

        let remnant = world
            .beams()
            .find(|b| b.id() != id && b.id() != child)
            .expect("no remnant")
            .id();
        assert_eq!(world.beam(remnant).unwrap().children(), Some(&[child][..]));
        assert!(world.beam(child).unwrap().is_powered());

        // The mirror child goes dark only once the remnant's tail reaches the mirror
        while world.is_live(remnant) {
            assert!(world.beam(child).unwrap().is_powered());
            tick(&mut world, SIM_DT);
        }
        assert!(!world.beam(child).unwrap().is_powered());
    }

    #[test]
    fn test_split_refused_at_cap_depowers_far_children() {
        let mut scene = Scene::new();
        block(&mut scene, 8.0, 9.0, Box::new(Mirror));
        let settings = Settings {
            max_beams: 2,
            ..Default::default()
        };
        let mut world = BeamWorld::new(scene, settings);
        let id = world.spawn_source(Vec3::ZERO, Vec3::X).unwrap();
        run_until_hit(&mut world, id);
        let child = world.beam(id).unwrap().children().unwrap()[0];
        assert_eq!(world.live_count(), 2);
        world.drain_events();

        // No room for a remnant, so nothing keeps the mirror lit
        block(&mut world.scene, 3.0, 4.0, Box::new(Absorber));
        tick(&mut world, SIM_DT);

        assert_eq!(world.live_count(), 2);
        assert!(!world.beam(child).unwrap().is_powered());
        let events = world.drain_events();
        assert!(events.iter().any(|e| matches!(e, SimEvent::CreationRefused { .. })));
        assert!(!events.iter().any(|e| matches!(e, SimEvent::BeamSplit { .. })));
    }

    #[test]
    fn test_split_remnant_keeps_spraying_on_far_absorber() {
        let mut scene = Scene::new();
        let wall = block(&mut scene, 8.0, 9.0, Box::new(Absorber));
        let mut world = world_with(scene);
        let id = world.spawn_source(Vec3::ZERO, Vec3::X).unwrap();
        run_until_hit(&mut world, id);

        block(&mut world.scene, 3.0, 4.0, Box::new(Absorber));
        tick(&mut world, SIM_DT);
        let remnant = world.beams().find(|b| b.id() != id).expect("no remnant").id();
        assert_eq!(world.beam(remnant).unwrap().collision().map(|c| c.surface), Some(wall));
        world.drain_events();

        tick(&mut world, SIM_DT);
        let effect = world.beam(remnant).unwrap().effect();
        assert!(effect.is_playing());
        let pose = effect.pose().unwrap();
        assert!((pose.point - Vec3::new(8.0, 0.0, 0.0)).length() < 1e-3);
        assert!(
            world
                .drain_events()
                .iter()
                .any(|e| matches!(e, SimEvent::EffectPlayed { beam, .. } if *beam == remnant))
        );
    }

    #[test]
    fn test_moved_obstacle_depowers_children() {
        let mut scene = Scene::new();
        let mirror = block(&mut scene, 2.0, 3.0, Box::new(Mirror));
        let mut world = world_with(scene);
        let id = world.spawn_source(Vec3::ZERO, Vec3::X).unwrap();
        run_until_hit(&mut world, id);
        let child = world.beam(id).unwrap().children().unwrap()[0];

        // Slide the mirror out of the way
        world.scene.translate(mirror, Vec3::new(0.0, 5.0, 0.0));
        tick(&mut world, SIM_DT);

        assert_eq!(world.beam(id).unwrap().children(), None);
        assert!(!world.beam(child).unwrap().is_powered());
    }

    #[test]
    fn test_cap_enforced_during_cascade() {
        let mut scene = Scene::new();
        // Two facing mirrors with a splitter between them breed beams quickly
        scene.add(
            Shape::cuboid(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(0.5, 5.0, 5.0)),
            Layer::WALL,
            Box::new(Mirror),
        );
        scene.add(
            Shape::cuboid(Vec3::new(5.0, 0.0, 0.0), Vec3::new(0.5, 5.0, 5.0)),
            Layer::WALL,
            Box::new(Mirror),
        );
        block(&mut scene, 1.0, 1.2, Box::new(Splitter));
        let settings = Settings {
            max_beams: 6,
            ..Default::default()
        };
        let mut world = BeamWorld::new(scene, settings);
        world.spawn_source(Vec3::ZERO, Vec3::X).unwrap();

        for _ in 0..600 {
            tick(&mut world, SIM_DT);
            assert!(world.live_count() <= 6);
            assert_eq!(world.live_count(), world.beams().count());
        }
        if world.live_count() == 6 {
            assert!(world.spawn_source(Vec3::ZERO, Vec3::Y).is_none());
            assert_eq!(world.live_count(), 6);
        }
    }

    #[test]
    fn test_cap_refusal_leaves_count_alone() {
        let settings = Settings {
            max_beams: 1,
            ..Default::default()
        };
        let mut world = BeamWorld::new(Scene::new(), settings);
        world.spawn_source(Vec3::ZERO, Vec3::X).unwrap();
        assert!(world.spawn_source(Vec3::ZERO, Vec3::Y).is_none());
        assert_eq!(world.live_count(), 1);
        tick(&mut world, SIM_DT);
        assert_eq!(world.live_count(), 1);
    }

    #[test]
    fn test_determinism() {
        let build = || {
            let mut scene = Scene::new();
            block(&mut scene, 2.0, 2.5, Box::new(Splitter));
            scene.add(
                Shape::sphere(Vec3::new(-3.0, 0.0, 0.0), 1.0),
                Layer::TILE,
                Box::new(Mirror),
            );
            let mut world = world_with(scene);
            world.spawn_source(Vec3::ZERO, Vec3::X).unwrap();
            world
        };
        let mut a = build();
        let mut b = build();
        for _ in 0..240 {
            tick(&mut a, SIM_DT);
            tick(&mut b, SIM_DT);
        }
        let seg_a: Vec<_> = a.segments().collect();
        let seg_b: Vec<_> = b.segments().collect();
        assert_eq!(seg_a, seg_b);
    }

    proptest! {
        #[test]
        fn prop_powered_growth_is_linear(dts in prop::collection::vec(0.001f32..0.1, 1..40)) {
            let mut world = world_with(Scene::new());
            let id = world.spawn_source(Vec3::ZERO, Vec3::new(1.0, 2.0, -0.5)).unwrap();
            let speed = world.settings().speed;
            for dt in dts {
                let before = world.beam(id).unwrap().end();
                tick(&mut world, dt);
                let beam = world.beam(id).unwrap();
                prop_assert_eq!(beam.start(), 0.0);
                prop_assert!((beam.end() - before - dt * speed).abs() < 1e-3);
            }
        }

        #[test]
        fn prop_unpowered_length_is_invariant(
            initial in 0.5f32..20.0,
            dts in prop::collection::vec(0.001f32..0.1, 1..40),
        ) {
            let mut world = world_with(Scene::new());
            let id = world.spawn_source(Vec3::ZERO, Vec3::Z).unwrap();
            world.beam_mut(id).unwrap().set_extent(0.0, initial);
            world.cut_source(id);
            for dt in dts {
                let (start, end) = {
                    let beam = world.beam(id).unwrap();
                    (beam.start(), beam.end())
                };
                tick(&mut world, dt);
                let beam = world.beam(id).unwrap();
                let dl = dt * world.settings().speed;
                prop_assert!((beam.start() - start - dl).abs() < 1e-3);
                prop_assert!((beam.end() - end - dl).abs() < 1e-3);
                prop_assert!((beam.length() - initial).abs() < 1e-2);
            }
        }
    }
}
