/// Render backend boundary and per-group instance batches.
///
/// The scene never talks to a graphics API directly. It drives a [`RenderBackend`], which a
/// windowed application implements on top of its GPU context. [`RecordingBackend`] is the
/// headless implementation: it keeps every command so tests (and the demo binary) can
/// inspect what a frame would have submitted.

use crate::error::{EngineError, Result};
use crate::material_library::MaterialLibrary;
use glam::{Mat4, Vec3};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8,
    R8,
}

/// Texture creation request. `zeroed` textures start fully transparent black.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub zeroed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAccess {
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryBarrier {
    /// Image stores become visible to later image loads and texture fetches
    ShaderImageAccess,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Vec3(Vec3),
    Float(f32),
    Int(i32),
    Bool(bool),
    /// Texture unit bound for sampling
    Sampler(u32),
    /// Image unit bound for load/store
    Image(u32),
}

/// Everything the scene core needs from a graphics API
pub trait RenderBackend {
    fn load_program(&mut self, name: &str) -> Result<ProgramHandle>;
    fn load_mesh(&mut self, name: &str) -> Result<MeshHandle>;
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle>;
    /// Off-screen target, isolated from the main framebuffer
    fn create_render_target(&mut self, width: u32, height: u32) -> Result<RenderTargetHandle>;

    fn bind_program(&mut self, program: ProgramHandle);
    fn set_uniform(&mut self, name: &str, value: UniformValue);
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);
    fn bind_image_texture(&mut self, unit: u32, texture: TextureHandle, access: ImageAccess);
    fn memory_barrier(&mut self, barrier: MemoryBarrier);
    /// `None` returns to the main render target
    fn bind_render_target(&mut self, target: Option<RenderTargetHandle>);
    /// Replace the per-instance vertex buffer contents
    fn upload_instance_data(&mut self, bytes: &[u8]);
    fn draw_indexed(&mut self, mesh: MeshHandle);
    fn draw_indexed_instanced(&mut self, mesh: MeshHandle, instances: u32);
}

/// Backend plus the name registries needed to resolve drawables
pub struct RenderContext<'a> {
    pub backend: &'a mut dyn RenderBackend,
    pub library: &'a MaterialLibrary,
}

impl<'a> RenderContext<'a> {
    pub fn new(backend: &'a mut dyn RenderBackend, library: &'a MaterialLibrary) -> Self {
        Self { backend, library }
    }
}

/// Per-pass inputs for scene draws
#[derive(Debug, Clone)]
pub struct DrawParams {
    pub view_projection: Mat4,
    /// Replaces every material's shader (depth-only and similar passes)
    pub program_override: Option<String>,
}

impl DrawParams {
    pub fn new(view_projection: Mat4) -> Self {
        Self {
            view_projection,
            program_override: None,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program_override = Some(program.into());
        self
    }
}

/// Id allow-list or deny-list. Matches independent entity ids and instanced group ids.
#[derive(Debug, Clone)]
pub enum DrawFilter {
    Only(HashSet<String>),
    Except(HashSet<String>),
}

impl DrawFilter {
    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(ids.into_iter().map(Into::into).collect())
    }

    pub fn except<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Except(ids.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, id: &str) -> bool {
        match self {
            Self::Only(ids) => ids.contains(id),
            Self::Except(ids) => !ids.contains(id),
        }
    }
}

/// World matrices of one instanced group, packed for a single upload
#[derive(Debug, Default)]
pub struct InstanceBatch {
    matrices: Vec<Mat4>,
}

impl InstanceBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            matrices: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, world: Mat4) {
        self.matrices.push(world);
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// Contiguous byte view of the matrices, column-major
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.matrices)
    }
}

/// A command captured by [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    BindProgram(ProgramHandle),
    SetUniform { name: String, value: UniformValue },
    BindTexture { unit: u32, texture: TextureHandle },
    BindImageTexture { unit: u32, texture: TextureHandle, access: ImageAccess },
    MemoryBarrier(MemoryBarrier),
    BindRenderTarget(Option<RenderTargetHandle>),
    UploadInstances { count: usize },
    Draw { mesh: MeshHandle },
    DrawInstanced { mesh: MeshHandle, instances: u32 },
}

/// Headless backend that hands out sequential handles and records every call
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<RenderCommand>,
    textures: Vec<TextureDesc>,
    next_handle: u32,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Descriptions of every texture created so far, in creation order
    pub fn textures(&self) -> &[TextureDesc] {
        &self.textures
    }

    /// Draw calls of either kind
    pub fn draw_calls(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RenderCommand::Draw { .. } | RenderCommand::DrawInstanced { .. }))
            .count()
    }

    pub fn instanced_draw_calls(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RenderCommand::DrawInstanced { .. }))
            .count()
    }

    /// Every value set for the uniform `name`, oldest first
    pub fn uniforms(&self, name: &str) -> Vec<UniformValue> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RenderCommand::SetUniform { name: n, value } if n == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    fn next(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl RenderBackend for RecordingBackend {
    fn load_program(&mut self, name: &str) -> Result<ProgramHandle> {
        if name.is_empty() {
            return Err(EngineError::Resource("program name is empty".to_string()));
        }
        Ok(ProgramHandle(self.next()))
    }

    fn load_mesh(&mut self, name: &str) -> Result<MeshHandle> {
        if name.is_empty() {
            return Err(EngineError::Resource("mesh name is empty".to_string()));
        }
        Ok(MeshHandle(self.next()))
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(EngineError::Resource(format!(
                "texture size {}x{} is empty",
                desc.width, desc.height
            )));
        }
        self.textures.push(*desc);
        Ok(TextureHandle(self.next()))
    }

    fn create_render_target(&mut self, width: u32, height: u32) -> Result<RenderTargetHandle> {
        if width == 0 || height == 0 {
            return Err(EngineError::Resource(format!(
                "render target size {width}x{height} is empty"
            )));
        }
        Ok(RenderTargetHandle(self.next()))
    }

    fn bind_program(&mut self, program: ProgramHandle) {
        self.commands.push(RenderCommand::BindProgram(program));
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.commands.push(RenderCommand::SetUniform {
            name: name.to_string(),
            value,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.commands.push(RenderCommand::BindTexture { unit, texture });
    }

    fn bind_image_texture(&mut self, unit: u32, texture: TextureHandle, access: ImageAccess) {
        self.commands
            .push(RenderCommand::BindImageTexture { unit, texture, access });
    }

    fn memory_barrier(&mut self, barrier: MemoryBarrier) {
        self.commands.push(RenderCommand::MemoryBarrier(barrier));
    }

    fn bind_render_target(&mut self, target: Option<RenderTargetHandle>) {
        self.commands.push(RenderCommand::BindRenderTarget(target));
    }

    fn upload_instance_data(&mut self, bytes: &[u8]) {
        let count = bytes.len() / std::mem::size_of::<Mat4>();
        self.commands.push(RenderCommand::UploadInstances { count });
    }

    fn draw_indexed(&mut self, mesh: MeshHandle) {
        self.commands.push(RenderCommand::Draw { mesh });
    }

    fn draw_indexed_instanced(&mut self, mesh: MeshHandle, instances: u32) {
        self.commands
            .push(RenderCommand::DrawInstanced { mesh, instances });
    }
}
