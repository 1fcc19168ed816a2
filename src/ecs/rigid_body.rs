/// Rigid body component: links an entity's world transform to a physics body.
///
/// Dynamic bodies drive the transform (physics wins). Static and kinematic bodies are driven
/// by it: external transform edits teleport the body.

use crate::ecs::entity::{EntityToken, TransformNode};
use crate::ecs::physics::{CollisionFilter, PhysicsEngine, RigidBodyCreateInfo, SizeSource};
use crate::error::Result;
use crate::transform::{euler_degrees, Transform};
use rapier3d::prelude::RigidBodyHandle;

#[derive(Debug)]
pub struct RigidBody {
    handle: RigidBodyHandle,
    dynamic: bool,
}

impl RigidBody {
    /// Create the body at the node's current world pose
    pub fn new(
        node: &TransformNode,
        owner: EntityToken,
        physics: &mut PhysicsEngine,
        info: &RigidBodyCreateInfo,
        filter: Option<CollisionFilter>,
    ) -> Result<Self> {
        let world = node.world();
        let mut info = info.clone();
        info.shape = match info.size_source {
            SizeSource::Collider => info.shape,
            SizeSource::LocalScale => info.shape.scaled_to(node.local().size()),
            SizeSource::WorldScale => info.shape.scaled_to(world.size()),
        };

        let handle = physics.add_rigid_body(
            world.position(),
            world.orientation(),
            &info,
            filter,
            owner,
        )?;
        Ok(Self {
            handle,
            dynamic: info.is_dynamic(),
        })
    }

    pub fn handle(&self) -> RigidBodyHandle {
        self.handle
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Copy the simulated pose into the world transform. Size is not simulated and is kept.
    pub(crate) fn update(&self, node: &mut TransformNode, physics: &PhysicsEngine) {
        if !self.dynamic {
            return;
        }
        let Some((position, rotation)) = physics.body_pose(self.handle) else {
            return;
        };
        let size = node.world().size();
        node.set_world(Transform::new(position, euler_degrees(rotation), size));
    }

    pub(crate) fn on_transform_update(&self, node: &TransformNode, physics: &mut PhysicsEngine) {
        if self.dynamic {
            return;
        }
        let world = node.world();
        physics.set_body_pose(self.handle, world.position(), world.rotation());
    }

    pub(crate) fn destroy(self, physics: &mut PhysicsEngine) {
        if !physics.remove_rigid_body(self.handle) {
            log::debug!("Rigid body {:?} was already removed", self.handle);
        }
    }
}
