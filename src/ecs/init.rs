/// Scene initialization helpers
///
/// Loads the shared render resources and creates the common entities of a paint scene:
/// static surfaces, dynamic targets and projectile spawners.

use glam::Vec3;
use crate::config::{EngineConfig, PaintConfigData};
use crate::ecs::entity::{Drawable, EntityKey};
use crate::ecs::physics::{ColliderShape, PhysicsEngine, RigidBodyCreateInfo, SizeSource};
use crate::ecs::rendering::{RenderBackend, TextureDesc, TextureFormat};
use crate::error::{EngineError, Result};
use crate::material_library::MaterialLibrary;
use crate::paint::{Paintable, Spawner, SPLAT_MASK_TEXTURE};
use crate::scene::Scene;
use crate::transform::Transform;

/// Side length of the splat mask texture
const SPLAT_MASK_SIZE: u32 = 64;

/// Load the programs, models and textures every scene draw or stroke refers to
pub fn load_default_resources(
    library: &mut MaterialLibrary,
    backend: &mut dyn RenderBackend,
) -> Result<()> {
    for program in ["standard", "painter", "depth"] {
        library.register_program(program, backend.load_program(program)?);
    }
    for model in ["cube", "sphere"] {
        library.register_model(model, backend.load_mesh(model)?);
    }
    let mask = backend.create_texture(&TextureDesc {
        width: SPLAT_MASK_SIZE,
        height: SPLAT_MASK_SIZE,
        format: TextureFormat::R8,
        zeroed: false,
    })?;
    library.register_texture(SPLAT_MASK_TEXTURE, mask);

    log::info!("Loaded default render resources");
    Ok(())
}

/// Create a static, paintable box. The collider takes its half extents from the world size.
pub fn create_paintable_box(
    scene: &mut Scene,
    physics: &mut PhysicsEngine,
    backend: &mut dyn RenderBackend,
    paint: &PaintConfigData,
    name: &str,
    transform: Transform,
    material: &str,
) -> Result<EntityKey> {
    let key = scene.emplace_entity(name, transform, Some(Drawable::new("cube", material)));
    let entity = scene
        .get_mut(&key)
        .ok_or_else(|| EngineError::EntityNotFound(key.to_string()))?;

    let info = RigidBodyCreateInfo::new(0.0, ColliderShape::Box { half_extents: Vec3::ONE })
        .with_material(0.8, 0.1)
        .with_size_source(SizeSource::WorldScale);
    entity.attach_rigid_body(physics, &info, None)?;
    entity.add_component(Paintable::new(backend, paint.resolution)?, physics);
    Ok(key)
}

/// Floor slab whose top face sits at y = 0
pub fn create_ground(
    scene: &mut Scene,
    physics: &mut PhysicsEngine,
    backend: &mut dyn RenderBackend,
    paint: &PaintConfigData,
) -> Result<EntityKey> {
    let transform = Transform::new(Vec3::new(0.0, -0.5, 0.0), Vec3::ZERO, Vec3::new(20.0, 0.5, 20.0));
    create_paintable_box(scene, physics, backend, paint, "ground", transform, "ground")
}

pub fn create_wall(
    scene: &mut Scene,
    physics: &mut PhysicsEngine,
    backend: &mut dyn RenderBackend,
    paint: &PaintConfigData,
    position: Vec3,
    orientation: Vec3,
    size: Vec3,
) -> Result<EntityKey> {
    let transform = Transform::new(position, orientation, size);
    create_paintable_box(scene, physics, backend, paint, "wall", transform, "wall")
}

/// Dynamic paintable sphere that reacts to hits
pub fn create_target(
    scene: &mut Scene,
    physics: &mut PhysicsEngine,
    backend: &mut dyn RenderBackend,
    paint: &PaintConfigData,
    position: Vec3,
    radius: f32,
) -> Result<EntityKey> {
    let transform = Transform::new(position, Vec3::ZERO, Vec3::splat(radius));
    let key = scene.emplace_entity("target", transform, Some(Drawable::new("sphere", "Default")));
    let entity = scene
        .get_mut(&key)
        .ok_or_else(|| EngineError::EntityNotFound(key.to_string()))?;

    let info = RigidBodyCreateInfo::new(2.0, ColliderShape::Sphere { radius: 1.0 })
        .with_material(0.6, 0.2)
        .with_size_source(SizeSource::WorldScale);
    entity.attach_rigid_body(physics, &info, None)?;
    entity.add_component(Paintable::new(backend, paint.resolution)?, physics);
    Ok(key)
}

/// Invisible entity carrying a projectile spawner
pub fn create_spawner(
    scene: &mut Scene,
    physics: &mut PhysicsEngine,
    config: &EngineConfig,
    position: Vec3,
) -> Result<EntityKey> {
    // Offset from the scene seed so spawns and id suffixes draw different sequences
    let seed = config.scene.seed.map(|seed| seed.wrapping_add(1));
    let spawner = Spawner::new(&config.spawner, &config.paint, seed)?;

    let key = scene.emplace_entity("spawner", Transform::from_position(position), None);
    let entity = scene
        .get_mut(&key)
        .ok_or_else(|| EngineError::EntityNotFound(key.to_string()))?;
    entity.add_component(spawner, physics);
    Ok(key)
}

/// Keys of the entities created by [`init_default_scene`]
#[derive(Debug, Clone)]
pub struct DefaultScene {
    pub ground: EntityKey,
    pub wall: EntityKey,
    pub target: EntityKey,
    pub spawner: EntityKey,
}

/// Ground, a wall facing +Z, a target sphere resting in front of it and a spawner facing
/// the wall
pub fn init_default_scene(
    scene: &mut Scene,
    physics: &mut PhysicsEngine,
    backend: &mut dyn RenderBackend,
    config: &EngineConfig,
) -> Result<DefaultScene> {
    let ground = create_ground(scene, physics, backend, &config.paint)?;
    let wall = create_wall(
        scene,
        physics,
        backend,
        &config.paint,
        Vec3::new(0.0, 2.5, -6.0),
        Vec3::ZERO,
        Vec3::new(5.0, 2.5, 0.25),
    )?;
    let target = create_target(scene, physics, backend, &config.paint, Vec3::new(3.0, 0.5, -3.0), 0.5)?;
    let spawner = create_spawner(scene, physics, config, Vec3::new(0.0, 1.5, 6.0))?;

    log::info!("Created default scene with {} entities", scene.len());
    Ok(DefaultScene {
        ground,
        wall,
        target,
        spawner,
    })
}
