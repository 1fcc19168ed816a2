/// End-to-end checks of a projectile travelling into a paintable wall
///
/// Runs the real frame order: input, physics step, collision dispatch, scene update,
/// draw, removal sweep.

use glam::{Mat4, Vec3};
use splat_engine::config::{EngineConfig, SpawnerConfigData};
use splat_engine::ecs::entity::{EntityKey, GroupId};
use splat_engine::ecs::init;
use splat_engine::ecs::rendering::{DrawParams, RecordingBackend, RenderContext, UniformValue};
use splat_engine::frame::{InputEvent, Simulation};
use splat_engine::material_library::MaterialLibrary;
use splat_engine::paint::{Paintable, Paintball};

const DT: f32 = 1.0 / 60.0;

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.scene.seed = Some(11);
    config.spawner = SpawnerConfigData {
        speed: 10.0,
        spread: 0.0,
        ..SpawnerConfigData::default()
    };
    config.paint.resolution = 64;
    config
}

struct Rig {
    sim: Simulation,
    backend: RecordingBackend,
    wall: EntityKey,
    spawner: EntityKey,
}

/// Wall at the origin (front face at z = 0.25) and a spawner 3 units in front of it
fn rig() -> Rig {
    let config = config();
    let mut backend = RecordingBackend::new();
    let mut library = MaterialLibrary::new();
    init::load_default_resources(&mut library, &mut backend).unwrap();

    let mut sim = Simulation::new(&config, library);
    let wall = init::create_wall(
        &mut sim.scene,
        &mut sim.physics,
        &mut backend,
        &config.paint,
        Vec3::ZERO,
        Vec3::ZERO,
        Vec3::new(2.0, 2.0, 0.25),
    )
    .unwrap();
    let spawner = init::create_spawner(&mut sim.scene, &mut sim.physics, &config, Vec3::new(0.0, 0.0, 3.0)).unwrap();

    Rig {
        sim,
        backend,
        wall,
        spawner,
    }
}

fn fire(rig: &mut Rig) {
    let spawner = rig.spawner.clone();
    fire_from(rig, &spawner, Vec3::new(0.0, 0.0, 3.0));
}

fn fire_from(rig: &mut Rig, spawner: &EntityKey, origin: Vec3) {
    rig.sim.input.push(InputEvent::Fire {
        spawner: spawner.clone(),
        origin,
        orientation: Vec3::ZERO,
        direction: Vec3::NEG_Z,
    });
}

fn projectiles(rig: &Rig) -> GroupId {
    rig.sim.scene.projectile_group(&rig.spawner).unwrap()
}

fn wall_strokes(rig: &Rig) -> u32 {
    rig.sim
        .scene
        .get(&rig.wall)
        .and_then(|wall| wall.component::<Paintable>())
        .map(Paintable::stroke_count)
        .unwrap()
}

#[test]
fn test_hit_paints_wall_once_and_removes_projectile() {
    let mut rig = rig();
    fire(&mut rig);
    let params = DrawParams::new(Mat4::IDENTITY);

    let mut strokes = 0;
    let mut removed = 0;
    for _ in 0..120 {
        rig.backend.clear();
        let stats = rig.sim.frame(DT, &mut rig.backend, &params).unwrap();
        strokes += stats.strokes;
        removed += stats.removed;
        if stats.strokes > 0 {
            // Painted with the pre-impact travel direction
            let direction = rig
                .backend
                .uniforms("u_paint_direction")
                .into_iter()
                .find_map(|value| match value {
                    UniformValue::Vec3(v) => Some(v),
                    _ => None,
                })
                .unwrap();
            assert!(direction.z < -0.95, "direction {direction}");
            // The projectile is already gone at the end of the hit frame
            assert_eq!(stats.removed, 1);
        }
    }

    assert_eq!(strokes, 1);
    assert_eq!(removed, 1);
    assert_eq!(wall_strokes(&rig), 1);
    assert_eq!(rig.sim.scene.group_len(&projectiles(&rig)), 0);
    // Only the wall body is left
    assert_eq!(rig.sim.physics.body_count(), 1);
}

#[test]
fn test_marked_projectile_keeps_body_until_sweep() {
    let mut rig = rig();
    let sim = &mut rig.sim;
    let ball = sim
        .scene
        .shoot(&mut sim.physics, &rig.spawner, Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::NEG_Z)
        .unwrap()
        .unwrap();
    let body = sim
        .scene
        .get(&ball)
        .and_then(|e| e.component::<Paintball>())
        .map(Paintball::body)
        .unwrap();

    let mut hit = false;
    for _ in 0..120 {
        sim.physics.step(DT);
        sim.physics.detect_collisions(&mut sim.scene);
        if sim.scene.is_marked(&ball) {
            // Marked, but the entity and its body stay alive for the rest of the frame
            assert!(sim.scene.contains(&ball));
            assert!(sim.physics.contains(body));

            let mut render = RenderContext::new(&mut rig.backend, &sim.library);
            assert_eq!(sim.scene.update(DT, &mut sim.physics, &mut render), 1);
            assert!(sim.physics.contains(body));

            assert_eq!(sim.scene.remove_marked(&mut sim.physics), 1);
            assert!(!sim.scene.contains(&ball));
            assert!(!sim.physics.contains(body));
            hit = true;
            break;
        }
        let mut render = RenderContext::new(&mut rig.backend, &sim.library);
        sim.scene.update(DT, &mut sim.physics, &mut render);
    }
    assert!(hit, "projectile never reached the wall");
}

#[test]
fn test_static_wall_is_never_moved_by_physics() {
    let mut rig = rig();
    let params = DrawParams::new(Mat4::IDENTITY);
    let before = *rig.sim.scene.get(&rig.wall).unwrap().world();

    for _ in 0..90 {
        fire(&mut rig);
        rig.sim.frame(DT, &mut rig.backend, &params).unwrap();
    }

    let after = *rig.sim.scene.get(&rig.wall).unwrap().world();
    assert_eq!(before.matrix(), after.matrix());
    assert!(wall_strokes(&rig) > 1);
}

#[test]
fn test_moving_static_wall_teleports_its_body() {
    let mut rig = rig();
    let sim = &mut rig.sim;
    let wall = sim.scene.get_mut(&rig.wall).unwrap();
    wall.set_position(&mut sim.physics, Vec3::new(0.0, 0.0, -5.0), true);
    sim.physics.step(DT);

    // Front face moved from z = 0.25 to z = -4.75
    let (_, distance) = sim
        .physics
        .raycast(Vec3::new(0.0, 0.0, 3.0), Vec3::NEG_Z, 20.0)
        .unwrap();
    assert!((distance - 7.75).abs() < 1e-3, "distance {distance}");
}

#[test]
fn test_spawner_fires_fifteen_times_in_ninety_ticks() {
    let mut rig = rig();
    let params = DrawParams::new(Mat4::IDENTITY);
    let mut shots = 0;
    for _ in 0..90 {
        fire(&mut rig);
        shots += rig.sim.frame(DT, &mut rig.backend, &params).unwrap().shots;
    }
    assert_eq!(shots, 15);
}

#[test]
fn test_projectiles_draw_as_one_instanced_call() {
    let mut rig = rig();
    let params = DrawParams::new(Mat4::IDENTITY);

    // Three shots in flight, none reaching the wall yet
    let mut last = None;
    for _ in 0..13 {
        fire(&mut rig);
        rig.backend.clear();
        last = Some(rig.sim.frame(DT, &mut rig.backend, &params).unwrap());
    }
    let stats = last.unwrap();
    assert_eq!(rig.sim.scene.group_len(&projectiles(&rig)), 3);
    // Wall plus one call for the whole group
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(rig.backend.instanced_draw_calls(), 1);
}

#[test]
fn test_each_spawner_batches_its_own_projectiles() {
    let mut rig = rig();
    let config = config();
    let second = init::create_spawner(&mut rig.sim.scene, &mut rig.sim.physics, &config, Vec3::new(1.0, 0.0, 3.0)).unwrap();
    let params = DrawParams::new(Mat4::IDENTITY);

    let mut last = None;
    for _ in 0..3 {
        fire(&mut rig);
        fire_from(&mut rig, &second, Vec3::new(1.0, 0.0, 3.0));
        rig.backend.clear();
        last = Some(rig.sim.frame(DT, &mut rig.backend, &params).unwrap());
    }

    let first_group = projectiles(&rig);
    let second_group = rig.sim.scene.projectile_group(&second).unwrap();
    assert_ne!(first_group, second_group);
    assert_eq!(rig.sim.scene.group_len(&first_group), 1);
    assert_eq!(rig.sim.scene.group_len(&second_group), 1);
    assert_eq!(rig.sim.scene.group_ids().count(), 2);
    // Wall plus one call per spawner
    assert_eq!(last.unwrap().draw_calls, 3);
    assert_eq!(rig.backend.instanced_draw_calls(), 2);
}
