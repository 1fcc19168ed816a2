use crate::ecs::rendering::{RenderBackend, UniformValue};
use crate::material_library::MaterialLibrary;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Texture unit used for a material's albedo map
pub const ALBEDO_UNIT: u32 = 0;

/// Material properties for PBR rendering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperties {
    /// Base color (albedo) of the material
    pub albedo: Vec3,
    /// Metallic factor (0.0 = dielectric, 1.0 = metal)
    pub metallic: f32,
    /// Roughness factor (0.0 = smooth/glossy, 1.0 = rough/matte)
    pub roughness: f32,
    /// Ambient lighting intensity (0.0 = no ambient, 2.0 = bright ambient)
    pub ambient_strength: f32,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self {
            albedo: Vec3::new(0.8, 0.8, 0.8),
            metallic: 0.2,
            roughness: 0.6,
            ambient_strength: 1.0,
        }
    }
}

impl MaterialProperties {
    /// Create a matte (non-metallic, rough) material
    pub fn matte(color: Vec3) -> Self {
        Self {
            albedo: color,
            metallic: 0.0,
            roughness: 0.9,
            ambient_strength: 1.0,
        }
    }

    /// Create a plastic-like material
    pub fn plastic(color: Vec3) -> Self {
        Self {
            albedo: color,
            metallic: 0.0,
            roughness: 0.3,
            ambient_strength: 1.0,
        }
    }
}

/// Shader reference plus the values it is fed with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Name of the program in the library's program registry
    pub shader: String,
    pub properties: MaterialProperties,
    /// Optional albedo map, by texture name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
}

impl Material {
    pub fn new(shader: impl Into<String>, properties: MaterialProperties) -> Self {
        Self {
            shader: shader.into(),
            properties,
            texture: None,
        }
    }

    pub fn with_texture(mut self, texture: impl Into<String>) -> Self {
        self.texture = Some(texture.into());
        self
    }

    /// Upload this material's uniforms to the currently bound program.
    ///
    /// Returns false when a referenced texture is not registered; the caller skips the draw.
    pub fn apply(&self, backend: &mut dyn RenderBackend, library: &MaterialLibrary) -> bool {
        let texture = match &self.texture {
            Some(name) => match library.texture(name) {
                Some(handle) => Some(handle),
                None => {
                    log::warn!("Material texture `{name}` is not loaded");
                    return false;
                }
            },
            None => None,
        };

        let props = &self.properties;
        backend.set_uniform("u_albedo", UniformValue::Vec3(props.albedo));
        backend.set_uniform("u_metallic", UniformValue::Float(props.metallic));
        backend.set_uniform("u_roughness", UniformValue::Float(props.roughness));
        backend.set_uniform("u_ambient_strength", UniformValue::Float(props.ambient_strength));
        backend.set_uniform("u_has_albedo_map", UniformValue::Bool(texture.is_some()));
        if let Some(handle) = texture {
            backend.bind_texture(ALBEDO_UNIT, handle);
            backend.set_uniform("u_albedo_map", UniformValue::Sampler(ALBEDO_UNIT));
        }
        true
    }
}
