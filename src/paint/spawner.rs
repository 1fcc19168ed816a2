/// Rate-limited projectile factory.
///
/// The spawner decides *whether* and *what* to fire; the scene turns the resulting
/// [`ShotPlan`] into an instanced entity with a body and a paintball.

use crate::config::{PaintConfigData, SpawnerConfigData};
use crate::ecs::entity::Drawable;
use crate::ecs::physics::{ColliderShape, RigidBodyCreateInfo, SizeSource};
use crate::error::{EngineError, Result};
use crate::paint::PaintballSettings;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fraction of the interval still counted as elapsed. Absorbs f32 frame steps that round
/// just below their nominal value (1/50 s does) without admitting an early shot.
const COOLDOWN_SLACK: f64 = 1e-6;

/// Everything needed to materialise one projectile
#[derive(Debug, Clone)]
pub struct ShotPlan {
    pub origin: Vec3,
    /// Euler degrees
    pub orientation: Vec3,
    pub size: Vec3,
    pub impulse: Vec3,
    pub body: RigidBodyCreateInfo,
    pub paintball: PaintballSettings,
    pub drawable: Drawable,
}

#[derive(Debug)]
pub struct Spawner {
    config: SpawnerConfigData,
    paint: PaintConfigData,
    /// Seconds left before the next shot, in f64 so small frame steps accumulate without drift
    cooldown: f64,
    shots: u64,
    rng: StdRng,
}

impl Spawner {
    /// A fixed `seed` makes sizes, spread and colours reproducible
    pub fn new(config: &SpawnerConfigData, paint: &PaintConfigData, seed: Option<u64>) -> Result<Self> {
        if !(config.rate.is_finite() && config.rate > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "spawner rate must be positive, got {}",
                config.rate
            )));
        }
        if !(config.size_min > 0.0 && config.size_min <= config.size_max) {
            return Err(EngineError::InvalidConfig(format!(
                "spawner size range [{}, {}] is empty",
                config.size_min, config.size_max
            )));
        }
        if config.mass <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "projectile mass must be positive, got {}",
                config.mass
            )));
        }

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config: config.clone(),
            paint: paint.clone(),
            cooldown: 0.0,
            shots: 0,
            rng,
        })
    }

    /// Seconds between shots
    pub fn interval(&self) -> f32 {
        1.0 / self.config.rate
    }

    pub fn cooldown(&self) -> f32 {
        self.cooldown as f32
    }

    pub fn is_ready(&self) -> bool {
        self.cooldown <= COOLDOWN_SLACK / f64::from(self.config.rate)
    }

    pub fn shots_fired(&self) -> u64 {
        self.shots
    }

    pub(crate) fn update(&mut self, dt: f32) {
        self.cooldown = (self.cooldown - f64::from(dt)).max(0.0);
    }

    /// Plan a shot along `direction` if the cooldown has elapsed, then restart the cooldown
    pub fn shoot(&mut self, origin: Vec3, orientation: Vec3, direction: Vec3) -> Option<ShotPlan> {
        if !self.is_ready() {
            return None;
        }
        self.cooldown = 1.0 / f64::from(self.config.rate);
        self.shots += 1;

        let config = &self.config;
        let multiplier = self.rng.gen_range(config.size_min..=config.size_max);
        let size = config.base_size * multiplier;

        let jitter = Vec3::new(
            self.rng.gen_range(-1.0..=1.0),
            self.rng.gen_range(-1.0..=1.0),
            self.rng.gen_range(-1.0..=1.0),
        );
        let impulse = direction.normalize_or_zero() * config.speed + jitter * config.spread;

        let color = if config.colors.is_empty() {
            Vec3::ONE
        } else {
            Vec3::from(config.colors[self.rng.gen_range(0..config.colors.len())])
        };

        let body = RigidBodyCreateInfo::new(config.mass, ColliderShape::Sphere { radius: 1.0 })
            .with_material(config.friction, config.restitution)
            .with_size_source(SizeSource::WorldScale);

        Some(ShotPlan {
            origin,
            orientation,
            size,
            impulse,
            body,
            paintball: PaintballSettings::from_config(&self.paint, config.lifetime, color),
            drawable: Drawable::new(config.model.clone(), config.material.clone()),
        })
    }
}
