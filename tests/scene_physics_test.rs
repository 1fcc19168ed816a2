/// Scene and physics working together outside the frame driver

use glam::{Mat4, Vec3};
use splat_engine::config::EngineConfig;
use splat_engine::ecs::components::ComponentKind;
use splat_engine::ecs::entity::Drawable;
use splat_engine::ecs::init;
use splat_engine::ecs::physics::{ColliderShape, PhysicsEngine, RigidBodyCreateInfo, SizeSource};
use splat_engine::ecs::rendering::{DrawParams, RecordingBackend, RenderCommand, RenderContext};
use splat_engine::material_library::MaterialLibrary;
use splat_engine::paint::{Paintable, Paintball, PaintballSettings};
use splat_engine::scene::Scene;
use splat_engine::transform::Transform;

const DT: f32 = 1.0 / 60.0;

fn setup() -> (RecordingBackend, MaterialLibrary, PhysicsEngine, Scene) {
    let mut backend = RecordingBackend::new();
    let mut library = MaterialLibrary::new();
    init::load_default_resources(&mut library, &mut backend).unwrap();
    let config = EngineConfig::default();
    (backend, library, PhysicsEngine::new(&config.physics), Scene::new(Some(2)))
}

fn run(
    frames: usize,
    backend: &mut RecordingBackend,
    library: &MaterialLibrary,
    physics: &mut PhysicsEngine,
    scene: &mut Scene,
) {
    for _ in 0..frames {
        physics.step(DT);
        physics.detect_collisions(scene);
        let mut render = RenderContext::new(&mut *backend, library);
        scene.update(DT, physics, &mut render);
        scene.remove_marked(physics);
    }
}

#[test]
fn test_dynamic_target_settles_on_ground() {
    let (mut backend, library, mut physics, mut scene) = setup();
    let paint = EngineConfig::default().paint;
    let ground = init::create_ground(&mut scene, &mut physics, &mut backend, &paint).unwrap();
    let target = init::create_target(
        &mut scene,
        &mut physics,
        &mut backend,
        &paint,
        Vec3::new(0.0, 3.0, 0.0),
        0.5,
    )
    .unwrap();

    run(180, &mut backend, &library, &mut physics, &mut scene);

    let target = scene.get(&target).unwrap();
    // Radius 0.5 resting on a floor whose top is y = 0
    assert!((target.world().position().y - 0.5).abs() < 0.05);
    assert_eq!(target.world().size(), Vec3::splat(0.5));
    assert_eq!(
        scene.get(&ground).unwrap().world().position(),
        Vec3::new(0.0, -0.5, 0.0)
    );
}

#[test]
fn test_contacts_reach_both_entities() {
    let (mut backend, library, mut physics, mut scene) = setup();
    let paint = EngineConfig::default().paint;
    let settings = PaintballSettings::from_config(&paint, 5.0, Vec3::new(1.0, 0.0, 0.0));

    // Two overlapping paintable balls, each of which paints whatever it touches
    let mut keys = Vec::new();
    for x in [0.0, 0.9] {
        let key = scene.emplace_entity(
            "ball",
            Transform::new(Vec3::new(x, 3.0, 0.0), Vec3::ZERO, Vec3::splat(0.5)),
            Some(Drawable::new("sphere", "paintball")),
        );
        let info = RigidBodyCreateInfo::new(1.0, ColliderShape::Sphere { radius: 1.0 })
            .with_size_source(SizeSource::WorldScale);
        let entity = scene.get_mut(&key).unwrap();
        let body = entity.attach_rigid_body(&mut physics, &info, None).unwrap();
        entity.add_component(Paintable::new(&mut backend, paint.resolution).unwrap(), &mut physics);
        entity.add_component(Paintball::new(body, settings.clone()), &mut physics);
        keys.push(key);
    }

    physics.step(DT);
    assert!(physics.detect_collisions(&mut scene) > 0);
    // Each side reacted: one stroke aimed at the other ball, and itself marked
    assert_eq!(scene.pending_strokes(), 2);
    assert!(keys.iter().all(|key| scene.is_marked(key)));

    let mut render = RenderContext::new(&mut backend, &library);
    assert_eq!(scene.update(DT, &mut physics, &mut render), 2);
    for key in &keys {
        let strokes = scene
            .get(key)
            .and_then(|e| e.component::<Paintable>())
            .map(Paintable::stroke_count);
        assert_eq!(strokes, Some(1));
    }
}

#[test]
fn test_resting_contact_has_no_side_effects() {
    let (mut backend, library, mut physics, mut scene) = setup();
    let paint = EngineConfig::default().paint;
    init::create_ground(&mut scene, &mut physics, &mut backend, &paint).unwrap();

    let crate_key = scene.emplace_entity(
        "crate",
        Transform::new(Vec3::new(0.0, 0.5, 0.0), Vec3::ZERO, Vec3::splat(0.5)),
        Some(Drawable::new("cube", "Default")),
    );
    let info = RigidBodyCreateInfo::new(1.0, ColliderShape::Box { half_extents: Vec3::ONE })
        .with_size_source(SizeSource::WorldScale);
    scene
        .get_mut(&crate_key)
        .unwrap()
        .attach_rigid_body(&mut physics, &info, None)
        .unwrap();

    physics.step(DT);
    let contacts = physics.detect_collisions(&mut scene);
    assert!(contacts > 0);
    // Nothing here paints or removes itself
    assert_eq!(scene.pending_strokes(), 0);
    assert!(!scene.is_marked(&crate_key));
}

#[test]
fn test_replacing_rigid_body_releases_old_one() {
    let (_, _, mut physics, mut scene) = setup();
    let key = scene.emplace_entity("block", Transform::identity(), None);
    let entity = scene.get_mut(&key).unwrap();
    let info = RigidBodyCreateInfo::new(0.0, ColliderShape::Box { half_extents: Vec3::splat(0.5) });

    let first = entity.attach_rigid_body(&mut physics, &info, None).unwrap();
    let second = entity.attach_rigid_body(&mut physics, &info, None).unwrap();
    assert!(!physics.contains(first));
    assert!(physics.contains(second));
    assert_eq!(entity.components().len(), 1);

    assert!(entity.remove_component(ComponentKind::RigidBody, &mut physics));
    assert_eq!(physics.body_count(), 0);
}

#[test]
fn test_paintable_surface_binds_its_texture_when_drawn() {
    let (mut backend, library, mut physics, mut scene) = setup();
    let paint = EngineConfig::default().paint;
    let wall = init::create_wall(
        &mut scene,
        &mut physics,
        &mut backend,
        &paint,
        Vec3::ZERO,
        Vec3::ZERO,
        Vec3::ONE,
    )
    .unwrap();
    let texture = scene
        .get(&wall)
        .and_then(|e| e.component::<Paintable>())
        .map(Paintable::texture)
        .unwrap();

    backend.clear();
    let mut render = RenderContext::new(&mut backend, &library);
    assert_eq!(scene.draw(&mut render, &DrawParams::new(Mat4::IDENTITY)), 1);
    assert!(backend
        .commands()
        .iter()
        .any(|c| matches!(c, RenderCommand::BindTexture { texture: t, .. } if *t == texture)));
}

#[test]
fn test_clear_empties_scene_and_world() {
    let (mut backend, library, mut physics, mut scene) = setup();
    let config = EngineConfig::default();
    init::init_default_scene(&mut scene, &mut physics, &mut backend, &config).unwrap();
    run(5, &mut backend, &library, &mut physics, &mut scene);

    scene.clear(&mut physics);
    assert!(scene.is_empty());
    assert_eq!(physics.body_count(), 0);
}
