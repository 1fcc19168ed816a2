use glam::{Mat4, Vec3};
use splat_engine::config::EngineConfig;
use splat_engine::ecs::init;
use splat_engine::ecs::rendering::{DrawParams, RecordingBackend};
use splat_engine::frame::{InputEvent, Simulation};
use splat_engine::material_library::MaterialLibrary;
use splat_engine::paint::Paintable;

const FRAME_DT: f32 = 1.0 / 60.0;
const FRAMES: u32 = 600;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("=== Splat Engine Starting ===");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/engine.json".to_string());
    let config = EngineConfig::load_or_default(&config_path);

    // Headless: commands are recorded instead of submitted to a GPU
    let mut backend = RecordingBackend::new();
    let mut library = MaterialLibrary::new();
    init::load_default_resources(&mut library, &mut backend)?;

    let mut sim = Simulation::new(&config, library);
    let layout = init::init_default_scene(&mut sim.scene, &mut sim.physics, &mut backend, &config)?;

    let eye = Vec3::new(0.0, 3.0, 10.0);
    let view = Mat4::look_at_rh(eye, Vec3::new(0.0, 1.5, -6.0), Vec3::Y);
    let projection = Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);
    let params = DrawParams::new(projection * view);

    let origin = sim
        .scene
        .get(&layout.spawner)
        .map(|spawner| spawner.world().position())
        .unwrap_or(Vec3::ZERO);

    let mut shots = 0;
    let mut strokes = 0;
    for frame in 1..=FRAMES {
        sim.input.push(InputEvent::Fire {
            spawner: layout.spawner.clone(),
            origin,
            orientation: Vec3::ZERO,
            direction: Vec3::NEG_Z,
        });

        backend.clear();
        let stats = sim.frame(FRAME_DT, &mut backend, &params)?;
        shots += stats.shots;
        strokes += stats.strokes;

        if frame % 60 == 0 {
            log::info!(
                "t={:.1}s shots={shots} strokes={strokes} entities={} draw_calls={}",
                frame as f32 * FRAME_DT,
                stats.entities,
                stats.draw_calls
            );
        }
    }

    let wall_strokes = sim
        .scene
        .get(&layout.wall)
        .and_then(|wall| wall.component::<Paintable>())
        .map_or(0, Paintable::stroke_count);
    log::info!("Wall carries {wall_strokes} strokes after {FRAMES} frames");
    log::info!("Shutdown complete.");
    Ok(())
}
