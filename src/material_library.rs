use crate::ecs::rendering::{MeshHandle, ProgramHandle, TextureHandle};
use crate::material::{Material, MaterialProperties};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Named materials plus the runtime registries of loaded programs, models and textures.
///
/// Only the materials serialize; handles are registered at startup by whoever owns the
/// render backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialLibrary {
    pub materials: HashMap<String, Material>,

    #[serde(skip)]
    programs: HashMap<String, ProgramHandle>,

    #[serde(skip)]
    models: HashMap<String, MeshHandle>,

    #[serde(skip)]
    textures: HashMap<String, TextureHandle>,
}

impl Default for MaterialLibrary {
    fn default() -> Self {
        let mut materials = HashMap::new();

        materials.insert(
            "Default".to_string(),
            Material::new("standard", MaterialProperties::default()),
        );
        materials.insert(
            "ground".to_string(),
            Material::new("standard", MaterialProperties::matte(Vec3::new(0.85, 0.85, 0.8))),
        );
        materials.insert(
            "wall".to_string(),
            Material::new("standard", MaterialProperties::matte(Vec3::new(0.9, 0.9, 0.92))),
        );
        materials.insert(
            "paintball".to_string(),
            Material::new("standard", MaterialProperties::plastic(Vec3::new(1.0, 1.0, 1.0))),
        );

        Self {
            materials,
            programs: HashMap::new(),
            models: HashMap::new(),
            textures: HashMap::new(),
        }
    }
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a material by name
    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    /// Add or update a material
    pub fn set(&mut self, name: impl Into<String>, material: Material) {
        self.materials.insert(name.into(), material);
    }

    /// Remove a material by name
    pub fn remove(&mut self, name: &str) -> Option<Material> {
        // Don't allow removing the default material
        if name == "Default" {
            return None;
        }
        self.materials.remove(name)
    }

    pub fn register_program(&mut self, name: impl Into<String>, handle: ProgramHandle) {
        self.programs.insert(name.into(), handle);
    }

    pub fn register_model(&mut self, name: impl Into<String>, handle: MeshHandle) {
        self.models.insert(name.into(), handle);
    }

    pub fn register_texture(&mut self, name: impl Into<String>, handle: TextureHandle) {
        self.textures.insert(name.into(), handle);
    }

    pub fn program(&self, name: &str) -> Option<ProgramHandle> {
        self.programs.get(name).copied()
    }

    pub fn model(&self, name: &str) -> Option<MeshHandle> {
        self.models.get(name).copied()
    }

    pub fn texture(&self, name: &str) -> Option<TextureHandle> {
        self.textures.get(name).copied()
    }

    /// Get all material names
    pub fn material_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.materials.keys().cloned().collect();
        names.sort();
        names
    }
}
