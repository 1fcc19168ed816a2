/// Entities: a local/world transform pair, a parent link and an ordered component list.
///
/// The owning direction is always Scene -> Entity -> Component. Back-references (parent,
/// owning scene, physics user data) are plain keys or tokens that the scene resolves.

use crate::ecs::components::{
    CollisionContext, CollisionPeer, Component, ComponentContext, ComponentKind, ComponentType,
    RemovalQueue,
};
use crate::ecs::physics::{CollisionFilter, Contact, PhysicsEngine, RigidBodyCreateInfo};
use crate::ecs::rigid_body::RigidBody;
use crate::error::Result;
use crate::paint::PendingStroke;
use crate::transform::Transform;
use glam::{Mat4, Vec3};
use rapier3d::prelude::RigidBodyHandle;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of a scene, recorded in every entity it creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneId(u32);

impl SceneId {
    pub(crate) fn allocate() -> Self {
        Self(NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Numeric entity handle stored in physics user data. Never zero, so an unset user data
/// slot never resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityToken(NonZeroU64);

impl EntityToken {
    pub(crate) const FIRST: EntityToken = EntityToken(NonZeroU64::MIN);

    pub fn new(value: u64) -> Option<Self> {
        NonZeroU64::new(value).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub fn to_user_data(self) -> u128 {
        u128::from(self.0.get())
    }

    pub fn from_user_data(data: u128) -> Option<Self> {
        u64::try_from(data).ok().and_then(Self::new)
    }
}

/// Instanced group identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an entity lives in the scene: its unique id plus its instanced group, if any
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub id: String,
    pub group: Option<GroupId>,
}

impl EntityKey {
    pub fn independent(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group: None,
        }
    }

    pub fn instanced(group: GroupId, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group: Some(group),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{group}/{}", self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// Scene bookkeeping carried by every entity
#[derive(Debug, Clone)]
pub struct SceneState {
    pub scene: SceneId,
    pub key: EntityKey,
    pub token: EntityToken,
}

/// Model and material names resolved through the material library at draw time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drawable {
    pub model: String,
    pub material: String,
}

impl Drawable {
    pub fn new(model: impl Into<String>, material: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            material: material.into(),
        }
    }
}

/// Local transform, derived world transform and the parent world it was derived from
#[derive(Debug, Clone)]
pub struct TransformNode {
    local: Transform,
    world: Transform,
    parent_world: Option<Mat4>,
}

impl TransformNode {
    pub fn new(local: Transform) -> Self {
        Self {
            local,
            world: local,
            parent_world: None,
        }
    }

    pub fn local(&self) -> &Transform {
        &self.local
    }

    pub fn world(&self) -> &Transform {
        &self.world
    }

    pub fn parent_world(&self) -> Option<Mat4> {
        self.parent_world
    }

    /// world = parent.world ∘ local, or local for roots
    pub fn refresh_world(&mut self) {
        self.world = match self.parent_world {
            Some(parent) => Transform::from_matrix(parent * self.local.matrix()),
            None => self.local,
        };
    }

    pub(crate) fn set_parent_world(&mut self, parent_world: Option<Mat4>) {
        self.parent_world = parent_world;
        self.refresh_world();
    }

    pub(crate) fn edit_local(&mut self, edit: impl FnOnce(&mut Transform)) {
        edit(&mut self.local);
        self.refresh_world();
    }

    /// Overwrite the world transform; the local transform follows so the parent relation holds
    pub fn set_world(&mut self, world: Transform) {
        self.local = match self.parent_world {
            Some(parent) => Transform::from_matrix(parent.inverse() * world.matrix()),
            None => world,
        };
        self.world = world;
    }

    /// Become a root without moving in world space
    pub(crate) fn detach(&mut self) {
        self.parent_world = None;
        self.local = self.world;
    }
}

/// A positioned object owning its components
pub struct Entity {
    name: String,
    state: SceneState,
    parent: Option<EntityKey>,
    node: TransformNode,
    drawable: Option<Drawable>,
    components: Vec<Component>,
}

impl Entity {
    pub(crate) fn new(
        name: String,
        state: SceneState,
        transform: Transform,
        drawable: Option<Drawable>,
    ) -> Self {
        Self {
            name,
            state,
            parent: None,
            node: TransformNode::new(transform),
            drawable,
            components: Vec::new(),
        }
    }

    /// Name requested at creation; the id may carry a suffix
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.state.key.id
    }

    pub fn key(&self) -> &EntityKey {
        &self.state.key
    }

    pub fn token(&self) -> EntityToken {
        self.state.token
    }

    pub fn scene_state(&self) -> &SceneState {
        &self.state
    }

    pub fn parent(&self) -> Option<&EntityKey> {
        self.parent.as_ref()
    }

    pub fn local(&self) -> &Transform {
        self.node.local()
    }

    pub fn world(&self) -> &Transform {
        self.node.world()
    }

    pub fn node(&self) -> &TransformNode {
        &self.node
    }

    pub fn drawable(&self) -> Option<&Drawable> {
        self.drawable.as_ref()
    }

    pub(crate) fn set_parent(&mut self, parent: Option<EntityKey>, parent_world: Option<Mat4>) {
        self.parent = parent;
        self.node.set_parent_world(parent_world);
    }

    pub(crate) fn detach_parent(&mut self) {
        self.parent = None;
        self.node.detach();
    }

    /// Edit the local transform. With `notify` set, components are told the transform changed
    /// externally (a non-dynamic rigid body teleports to the new pose).
    pub fn modify_transform(
        &mut self,
        physics: &mut PhysicsEngine,
        notify: bool,
        edit: impl FnOnce(&mut Transform),
    ) {
        self.node.edit_local(edit);
        if notify {
            self.on_transform_update(physics);
        }
    }

    pub fn set_position(&mut self, physics: &mut PhysicsEngine, position: Vec3, notify: bool) {
        self.modify_transform(physics, notify, |t| t.set_position(position));
    }

    pub fn translate(&mut self, physics: &mut PhysicsEngine, delta: Vec3, notify: bool) {
        self.modify_transform(physics, notify, |t| t.translate(delta));
    }

    pub fn set_orientation(&mut self, physics: &mut PhysicsEngine, orientation: Vec3, notify: bool) {
        self.modify_transform(physics, notify, |t| t.set_orientation(orientation));
    }

    pub fn rotate(&mut self, physics: &mut PhysicsEngine, delta: Vec3, notify: bool) {
        self.modify_transform(physics, notify, |t| t.rotate(delta));
    }

    pub fn set_size(&mut self, physics: &mut PhysicsEngine, size: Vec3, notify: bool) {
        self.modify_transform(physics, notify, |t| t.set_size(size));
    }

    pub fn scale_by(&mut self, physics: &mut PhysicsEngine, factor: Vec3, notify: bool) {
        self.modify_transform(physics, notify, |t| t.scale_by(factor));
    }

    /// Overwrite the world transform directly
    pub fn set_world_transform(&mut self, physics: &mut PhysicsEngine, world: Transform, notify: bool) {
        self.node.set_world(world);
        if notify {
            self.on_transform_update(physics);
        }
    }

    /// Recompute the world transform, then let every component react to the change
    pub fn on_transform_update(&mut self, physics: &mut PhysicsEngine) {
        self.node.refresh_world();
        for component in &mut self.components {
            component.on_transform_update(&self.node, physics);
        }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn has_component(&self, kind: ComponentKind) -> bool {
        self.components.iter().any(|c| c.kind() == kind)
    }

    pub fn component<T: ComponentType>(&self) -> Option<&T> {
        self.components
            .iter()
            .find(|c| c.kind() == T::KIND)
            .and_then(T::downcast)
    }

    pub fn component_mut<T: ComponentType>(&mut self) -> Option<&mut T> {
        self.components
            .iter_mut()
            .find(|c| c.kind() == T::KIND)
            .and_then(T::downcast_mut)
    }

    /// Attach a component. One of the same kind is replaced in place and destroyed.
    pub fn add_component(&mut self, component: impl Into<Component>, physics: &mut PhysicsEngine) {
        let component = component.into();
        let kind = component.kind();
        match self.components.iter_mut().find(|c| c.kind() == kind) {
            Some(slot) => {
                log::debug!("{}: replacing {kind:?} component", self.state.key);
                std::mem::replace(slot, component).destroy(physics);
            }
            None => self.components.push(component),
        }
    }

    /// Destroy the component of `kind`. Returns false if there was none.
    pub fn remove_component(&mut self, kind: ComponentKind, physics: &mut PhysicsEngine) -> bool {
        match self.components.iter().position(|c| c.kind() == kind) {
            Some(index) => {
                self.components.remove(index).destroy(physics);
                true
            }
            None => false,
        }
    }

    /// Create a physics body from the current world transform and attach it
    pub fn attach_rigid_body(
        &mut self,
        physics: &mut PhysicsEngine,
        info: &RigidBodyCreateInfo,
        filter: Option<CollisionFilter>,
    ) -> Result<RigidBodyHandle> {
        let body = RigidBody::new(&self.node, self.state.token, physics, info, filter)?;
        let handle = body.handle();
        self.add_component(body, physics);
        Ok(handle)
    }

    /// Refresh the world transform from the parent, then update components in insertion order
    pub(crate) fn update(
        &mut self,
        parent_world: Option<Mat4>,
        physics: &mut PhysicsEngine,
        removals: &mut RemovalQueue,
        dt: f32,
    ) {
        self.node.set_parent_world(parent_world);
        let mut ctx = ComponentContext {
            key: &self.state.key,
            physics,
            removals,
        };
        for component in &mut self.components {
            component.update(&mut self.node, &mut ctx, dt);
        }
    }

    pub(crate) fn on_collision(
        &mut self,
        peer: &CollisionPeer,
        contact: &Contact,
        removals: &mut RemovalQueue,
        strokes: &mut Vec<PendingStroke>,
    ) {
        let mut ctx = CollisionContext {
            key: &self.state.key,
            removals,
            strokes,
        };
        for component in &mut self.components {
            component.on_collision(&self.node, peer, contact, &mut ctx);
        }
    }

    /// Tear down every component, releasing physics bodies
    pub(crate) fn destroy(self, physics: &mut PhysicsEngine) {
        log::trace!("Destroying {}", self.state.key);
        for component in self.components {
            component.destroy(physics);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trips_through_user_data() {
        let token = EntityToken::new(42).unwrap();
        assert_eq!(EntityToken::from_user_data(token.to_user_data()), Some(token));
        assert!(EntityToken::from_user_data(0).is_none());
        assert!(EntityToken::from_user_data(u128::MAX).is_none());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(EntityKey::independent("wall").to_string(), "wall");
        assert_eq!(
            EntityKey::instanced(GroupId::new("gun"), "paintball").to_string(),
            "gun/paintball"
        );
    }

    #[test]
    fn test_child_world_follows_parent() {
        let mut node = TransformNode::new(Transform::from_position(Vec3::new(1.0, 0.0, 0.0)));
        let parent = Transform::new(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, 90.0, 0.0), Vec3::ONE);
        node.set_parent_world(Some(parent.matrix()));
        // yaw 90 maps local +X to world -Z
        assert!(node
            .world()
            .position()
            .abs_diff_eq(Vec3::new(0.0, 5.0, -1.0), 1e-4));
    }

    #[test]
    fn test_set_world_keeps_parent_relation() {
        let parent = Transform::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 30.0, 0.0), Vec3::splat(2.0));
        let mut node = TransformNode::new(Transform::identity());
        node.set_parent_world(Some(parent.matrix()));

        let target = Transform::new(Vec3::new(-1.0, 3.0, 4.0), Vec3::new(10.0, 0.0, 0.0), Vec3::splat(2.0));
        node.set_world(target);
        node.refresh_world();
        assert!(node.world().matrix().abs_diff_eq(target.matrix(), 1e-3));
    }

    #[test]
    fn test_detach_preserves_world_pose() {
        let parent = Transform::from_position(Vec3::new(0.0, 10.0, 0.0));
        let mut node = TransformNode::new(Transform::from_position(Vec3::X));
        node.set_parent_world(Some(parent.matrix()));
        node.detach();
        assert!(node.local().position().abs_diff_eq(Vec3::new(1.0, 10.0, 0.0), 1e-5));
        assert!(node.parent_world().is_none());
    }
}
