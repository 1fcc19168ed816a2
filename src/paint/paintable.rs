use crate::ecs::rendering::{
    ImageAccess, MemoryBarrier, MeshHandle, RenderBackend, RenderContext, RenderTargetHandle,
    TextureDesc, TextureFormat, TextureHandle, UniformValue,
};
use crate::error::Result;
use crate::paint::{PaintStroke, PAINTER_PROGRAM, SPLAT_MASK_TEXTURE};
use glam::Mat4;

/// Image unit the paint texture is bound to while painting
pub const PAINT_IMAGE_UNIT: u32 = 0;
/// Texture unit for the splat mask while painting
pub const SPLAT_MASK_UNIT: u32 = 1;
/// Texture unit for sampling the paint texture in scene draws
pub const PAINTMAP_SAMPLER_UNIT: u32 = 2;

/// Geometry a stroke is rasterised over
#[derive(Debug, Clone, Copy)]
pub struct PaintTarget {
    pub mesh: MeshHandle,
    pub model: Mat4,
}

/// Persistent paint texture of a surface. Strokes accumulate; nothing is ever cleared.
#[derive(Debug)]
pub struct Paintable {
    texture: TextureHandle,
    render_target: RenderTargetHandle,
    resolution: u32,
    strokes: u32,
}

impl Paintable {
    /// Create a transparent `resolution`² texture and the off-screen target painting uses
    pub fn new(backend: &mut dyn RenderBackend, resolution: u32) -> Result<Self> {
        let texture = backend.create_texture(&TextureDesc {
            width: resolution,
            height: resolution,
            format: TextureFormat::Rgba8,
            zeroed: true,
        })?;
        let render_target = backend.create_render_target(resolution, resolution)?;
        Ok(Self {
            texture,
            render_target,
            resolution,
            strokes: 0,
        })
    }

    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    pub fn render_target(&self) -> RenderTargetHandle {
        self.render_target
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Strokes committed so far
    pub fn stroke_count(&self) -> u32 {
        self.strokes
    }

    /// Rasterise `target` with the painter program, splatting `stroke` into the texture.
    ///
    /// The main render target is bound again afterwards. Returns false, leaving the texture
    /// untouched, when the painter program or splat mask is not loaded.
    pub fn update_paintmap(
        &mut self,
        render: &mut RenderContext<'_>,
        target: &PaintTarget,
        stroke: &PaintStroke,
    ) -> bool {
        let Some(program) = render.library.program(PAINTER_PROGRAM) else {
            log::warn!("Painter program `{PAINTER_PROGRAM}` not loaded, stroke dropped");
            return false;
        };
        let Some(mask) = render.library.texture(SPLAT_MASK_TEXTURE) else {
            log::warn!("Splat mask `{SPLAT_MASK_TEXTURE}` not loaded, stroke dropped");
            return false;
        };

        let backend = &mut *render.backend;
        backend.bind_render_target(Some(self.render_target));
        backend.bind_program(program);
        backend.set_uniform("u_model", UniformValue::Mat4(target.model));
        backend.set_uniform("u_paint_space", UniformValue::Mat4(stroke.paint_space));
        backend.set_uniform("u_paint_direction", UniformValue::Vec3(stroke.direction));
        backend.set_uniform("u_paint_color", UniformValue::Vec3(stroke.color));
        backend.set_uniform("u_paintmap_size", UniformValue::Int(self.resolution as i32));

        backend.bind_texture(SPLAT_MASK_UNIT, mask);
        backend.set_uniform("u_splat_mask", UniformValue::Sampler(SPLAT_MASK_UNIT));
        backend.bind_image_texture(PAINT_IMAGE_UNIT, self.texture, ImageAccess::ReadWrite);
        backend.set_uniform("u_paintmap", UniformValue::Image(PAINT_IMAGE_UNIT));

        backend.draw_indexed(target.mesh);
        // Later samples of the paint texture must see these stores
        backend.memory_barrier(MemoryBarrier::ShaderImageAccess);
        backend.bind_render_target(None);

        self.strokes += 1;
        true
    }

    /// Expose the paint texture to the program used for the regular draw
    pub fn bind_for_sampling(&self, backend: &mut dyn RenderBackend) {
        backend.bind_texture(PAINTMAP_SAMPLER_UNIT, self.texture);
        backend.set_uniform("u_paintmap", UniformValue::Sampler(PAINTMAP_SAMPLER_UNIT));
        backend.set_uniform("u_has_paintmap", UniformValue::Bool(true));
    }
}
