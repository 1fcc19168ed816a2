/// Frame driver: input, physics step, collision dispatch, scene update, draw, removal sweep.

use crate::config::EngineConfig;
use crate::ecs::entity::EntityKey;
use crate::ecs::physics::PhysicsEngine;
use crate::ecs::rendering::{DrawParams, RenderBackend, RenderContext};
use crate::error::{EngineError, Result};
use crate::material_library::MaterialLibrary;
use crate::scene::Scene;
use glam::Vec3;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Ask `spawner` to fire. Ignored while it cools down.
    Fire {
        spawner: EntityKey,
        origin: Vec3,
        /// Euler degrees
        orientation: Vec3,
        direction: Vec3,
    },
}

/// Events collected between frames, drained at the start of the next one
#[derive(Debug, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, InputEvent> {
        self.events.drain(..)
    }
}

/// What happened during one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub shots: usize,
    pub contacts: usize,
    pub strokes: usize,
    pub draw_calls: usize,
    pub removed: usize,
    pub entities: usize,
}

pub struct Simulation {
    pub physics: PhysicsEngine,
    pub scene: Scene,
    pub library: MaterialLibrary,
    pub input: InputQueue,
    frames: u64,
}

impl Simulation {
    pub fn new(config: &EngineConfig, library: MaterialLibrary) -> Self {
        Self {
            physics: PhysicsEngine::new(&config.physics),
            scene: Scene::new(config.scene.seed),
            library,
            input: InputQueue::default(),
            frames: 0,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Run one frame.
    ///
    /// Entities marked during the frame survive until the final sweep, so contacts and
    /// strokes always refer to live entities and bodies.
    pub fn frame(
        &mut self,
        dt: f32,
        backend: &mut dyn RenderBackend,
        params: &DrawParams,
    ) -> Result<FrameStats> {
        let mut stats = FrameStats {
            shots: self.process_input()?,
            ..FrameStats::default()
        };

        self.physics.step(dt);
        stats.contacts = self.physics.detect_collisions(&mut self.scene);

        let mut render = RenderContext::new(backend, &self.library);
        stats.strokes = self.scene.update(dt, &mut self.physics, &mut render);
        stats.draw_calls = self.scene.draw(&mut render, params);

        stats.removed = self.scene.remove_marked(&mut self.physics);
        stats.entities = self.scene.len();
        self.frames += 1;

        log::trace!("Frame {}: {stats:?}", self.frames);
        Ok(stats)
    }

    /// Returns the number of projectiles fired
    fn process_input(&mut self) -> Result<usize> {
        let events: Vec<InputEvent> = self.input.drain().collect();
        let mut shots = 0;
        for event in events {
            match event {
                InputEvent::Fire {
                    spawner,
                    origin,
                    orientation,
                    direction,
                } => match self
                    .scene
                    .shoot(&mut self.physics, &spawner, origin, orientation, direction)
                {
                    Ok(Some(_)) => shots += 1,
                    Ok(None) => {}
                    Err(err @ (EngineError::EntityNotFound(_) | EngineError::MissingComponent { .. })) => {
                        log::warn!("Fire request ignored: {err}");
                    }
                    Err(err) => return Err(err),
                },
            }
        }
        Ok(shots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::rendering::RecordingBackend;
    use glam::Mat4;

    #[test]
    fn test_input_queue_drains_in_order() {
        let mut queue = InputQueue::default();
        for x in 0..3 {
            queue.push(InputEvent::Fire {
                spawner: EntityKey::independent("s"),
                origin: Vec3::new(x as f32, 0.0, 0.0),
                orientation: Vec3::ZERO,
                direction: Vec3::NEG_Z,
            });
        }
        let origins: Vec<f32> = queue
            .drain()
            .map(|InputEvent::Fire { origin, .. }| origin.x)
            .collect();
        assert_eq!(origins, vec![0.0, 1.0, 2.0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_unknown_spawner_does_not_abort_frame() {
        let mut backend = RecordingBackend::new();
        let mut sim = Simulation::new(&EngineConfig::default(), MaterialLibrary::new());
        sim.input.push(InputEvent::Fire {
            spawner: EntityKey::independent("ghost"),
            origin: Vec3::ZERO,
            orientation: Vec3::ZERO,
            direction: Vec3::NEG_Z,
        });
        let stats = sim
            .frame(1.0 / 60.0, &mut backend, &DrawParams::new(Mat4::IDENTITY))
            .unwrap();
        assert_eq!(stats.shots, 0);
        assert_eq!(sim.frame_count(), 1);
    }
}
