/// Paint surfaces, paint projectiles and the projectile factory.

pub mod paintable;
pub mod paintball;
pub mod spawner;

pub use paintable::{PaintTarget, Paintable};
pub use paintball::{Paintball, PaintballSettings};
pub use spawner::{ShotPlan, Spawner};

use crate::ecs::entity::EntityKey;
use glam::{Mat4, Vec3};

/// Program that splats strokes into paint textures
pub const PAINTER_PROGRAM: &str = "painter";
/// Splat footprint sampled by the painter program
pub const SPLAT_MASK_TEXTURE: &str = "splat_mask";

/// One paint application: where it lands, which way it travels, and its colour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintStroke {
    /// World space to the stroke's orthographic clip volume
    pub paint_space: Mat4,
    pub direction: Vec3,
    pub color: Vec3,
}

impl PaintStroke {
    /// Orthographic volume looking along `direction` at `impact`, `half_width` wide on each
    /// side and `reach` deep on each side of the impact point.
    pub fn project(impact: Vec3, direction: Vec3, half_width: f32, reach: f32, color: Vec3) -> Self {
        let forward = direction.try_normalize().unwrap_or(Vec3::NEG_Y);
        let mut right = forward.cross(Vec3::Y);
        if right.length_squared() < 1e-6 {
            right = forward.cross(Vec3::X);
        }
        let right = right.normalize();
        let up = right.cross(forward).normalize();

        let eye = impact - forward * reach;
        let view = Mat4::look_to_rh(eye, forward, up);
        let projection =
            Mat4::orthographic_rh(-half_width, half_width, -half_width, half_width, 0.0, 2.0 * reach);

        Self {
            paint_space: projection * view,
            direction: forward,
            color,
        }
    }
}

/// A stroke produced during collision dispatch, committed once the scene update runs
#[derive(Debug, Clone)]
pub struct PendingStroke {
    pub target: EntityKey,
    pub stroke: PaintStroke,
}
