use anyhow::Result;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub physics: PhysicsConfigData,
    #[serde(default)]
    pub spawner: SpawnerConfigData,
    #[serde(default)]
    pub paint: PaintConfigData,
    #[serde(default)]
    pub scene: SceneConfigData,
}

impl EngineConfig {
    /// Load configuration from JSON file
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file with pretty formatting
    pub fn save(&self, path: &str) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_default(path: &str) -> Self {
        Self::load(path).unwrap_or_else(|err| {
            log::info!("No usable config at {path} ({err}), writing defaults");
            let config = Self::default();
            if let Err(err) = config.save(path) {
                log::warn!("Could not save default config to {path}: {err}");
            }
            config
        })
    }
}

/// Rigid-body world settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfigData {
    #[serde(with = "vec3_serde")]
    pub gravity: Vec3,

    /// Contacts whose signed distance is at or above this are not dispatched
    pub contact_threshold: f32,

    /// Collect debug lines after every step
    pub debug_draw: bool,
}

impl Default for PhysicsConfigData {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            contact_threshold: 0.01,
            debug_draw: false,
        }
    }
}

/// Projectile factory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnerConfigData {
    /// Shots per second
    pub rate: f32,
    /// Launch impulse along the aim direction
    pub speed: f32,
    /// Scale of the random unit-cube impulse added to every shot
    pub spread: f32,
    pub size_min: f32,
    pub size_max: f32,

    #[serde(with = "vec3_serde")]
    pub base_size: Vec3,

    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
    /// Seconds before an unspent projectile expires
    pub lifetime: f32,
    pub model: String,
    pub material: String,
    pub colors: Vec<[f32; 3]>,
}

impl Default for SpawnerConfigData {
    fn default() -> Self {
        Self {
            rate: 10.0,
            speed: 20.0,
            spread: 0.5,
            size_min: 0.8,
            size_max: 1.2,
            base_size: Vec3::splat(0.1),
            mass: 1.0,
            friction: 0.5,
            restitution: 0.3,
            lifetime: 5.0,
            model: "sphere".to_string(),
            material: "paintball".to_string(),
            colors: vec![
                [0.95, 0.15, 0.2],
                [0.1, 0.6, 0.95],
                [0.2, 0.85, 0.3],
                [0.98, 0.8, 0.1],
            ],
        }
    }
}

/// Paint texture and stroke settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaintConfigData {
    /// Width and height of every paint texture
    pub resolution: u32,
    /// Half-width of the stroke footprint relative to the projectile's largest extent
    pub splat_scale: f32,
    /// Depth of the paint-space volume on each side of the contact point
    pub reach: f32,

    #[serde(with = "vec3_serde")]
    pub wobble_offset: Vec3,

    /// Off-centre force as a fraction of the projectile's weight
    pub wobble_force_scale: f32,
}

impl Default for PaintConfigData {
    fn default() -> Self {
        Self {
            resolution: 1024,
            splat_scale: 4.0,
            reach: 0.5,
            wobble_offset: Vec3::new(0.0, 0.0, 0.05),
            wobble_force_scale: 0.1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneConfigData {
    /// Fixed seed for id suffixes and spawns; entropy when absent
    pub seed: Option<u64>,
}

/// Custom serialization for Vec3
mod vec3_serde {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Vec3Data {
        x: f32,
        y: f32,
        z: f32,
    }

    pub fn serialize<S>(vec: &Vec3, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Vec3Data {
            x: vec.x,
            y: vec.y,
            z: vec.z,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec3, D::Error>
    where
        D: Deserializer<'de>,
    {
        let data = Vec3Data::deserialize(deserializer)?;
        Ok(Vec3::new(data.x, data.y, data.z))
    }
}
