/// Local TRS transform with Euler-degree orientation.
///
/// Orientation is stored as (pitch, yaw, roll) degrees in (x, y, z) and composed as
/// yaw·pitch·roll (`EulerRot::YXZ`). The physics adapter builds its quaternions through
/// [`euler_rotation`], so visual and physical poses always agree on the order.

use glam::{EulerRot, Mat4, Quat, Vec3};
use std::ops::Mul;

/// Rotation for an orientation given in Euler degrees (x = pitch, y = yaw, z = roll)
pub fn euler_rotation(orientation: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        orientation.y.to_radians(),
        orientation.x.to_radians(),
        orientation.z.to_radians(),
    )
}

/// Inverse of [`euler_rotation`]
pub fn euler_degrees(rotation: Quat) -> Vec3 {
    let (yaw, pitch, roll) = rotation.to_euler(EulerRot::YXZ);
    Vec3::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
}

/// Position, orientation and size plus the derived matrix and axes.
///
/// Every setter refreshes the derived state, so `matrix()` and the axis vectors never lag
/// behind the last write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    position: Vec3,
    orientation: Vec3,
    size: Vec3,
    matrix: Mat4,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
}

impl Transform {
    pub fn new(position: Vec3, orientation: Vec3, size: Vec3) -> Self {
        let mut transform = Self {
            position,
            orientation,
            size,
            matrix: Mat4::IDENTITY,
            forward: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
        };
        transform.recompute();
        transform
    }

    pub fn identity() -> Self {
        Self::new(Vec3::ZERO, Vec3::ZERO, Vec3::ONE)
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Vec3::ZERO, Vec3::ONE)
    }

    /// Decompose an arbitrary affine matrix. Shear is lost.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let mut transform = Self::identity();
        transform.set_matrix(matrix);
        transform
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Euler angles in degrees (x = pitch, y = yaw, z = roll)
    pub fn orientation(&self) -> Vec3 {
        self.orientation
    }

    pub fn size(&self) -> Vec3 {
        self.size
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn rotation(&self) -> Quat {
        euler_rotation(self.orientation)
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.recompute();
    }

    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
        self.recompute();
    }

    pub fn set_orientation(&mut self, orientation: Vec3) {
        self.orientation = orientation;
        self.recompute();
    }

    /// Add `delta` degrees to each Euler angle
    pub fn rotate(&mut self, delta: Vec3) {
        self.orientation += delta;
        self.recompute();
    }

    pub fn set_size(&mut self, size: Vec3) {
        self.size = size;
        self.recompute();
    }

    /// Multiply the current size component-wise
    pub fn scale_by(&mut self, factor: Vec3) {
        self.size *= factor;
        self.recompute();
    }

    /// Overwrite position/orientation/size from an externally supplied matrix
    pub fn set_matrix(&mut self, matrix: Mat4) {
        let (size, rotation, position) = matrix.to_scale_rotation_translation();
        self.position = position;
        self.orientation = euler_degrees(rotation);
        self.size = size;
        self.recompute();
    }

    /// `self ∘ child`: the child's transform expressed in this transform's space
    pub fn compose(&self, child: &Transform) -> Transform {
        Transform::from_matrix(self.matrix * child.matrix)
    }

    fn recompute(&mut self) {
        let rotation = self.rotation();
        self.matrix = Mat4::from_scale_rotation_translation(self.size, rotation, self.position);
        self.forward = (rotation * Vec3::NEG_Z).normalize();
        self.right = (rotation * Vec3::X).normalize();
        self.up = (rotation * Vec3::Y).normalize();
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.compose(&rhs)
    }
}

impl Mul<&Transform> for &Transform {
    type Output = Transform;

    fn mul(self, rhs: &Transform) -> Transform {
        self.compose(rhs)
    }
}
