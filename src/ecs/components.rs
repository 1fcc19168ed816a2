/// Component variants attached to entities and the contexts their hooks receive.
///
/// Components form a closed set: a rigid body, a paint surface, a projectile and a
/// projectile factory. Dispatch is a `match`; typed access goes through [`ComponentType`].

use crate::ecs::entity::{EntityKey, TransformNode};
use crate::ecs::physics::{Contact, PhysicsEngine};
use crate::ecs::rigid_body::RigidBody;
use crate::paint::{Paintable, Paintball, PendingStroke, Spawner};
use std::collections::HashSet;

/// Type tag used for component lookup and replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    RigidBody,
    Paintable,
    Paintball,
    Spawner,
}

impl ComponentKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::RigidBody => "RigidBody",
            Self::Paintable => "Paintable",
            Self::Paintball => "Paintball",
            Self::Spawner => "Spawner",
        }
    }
}

#[derive(Debug)]
pub enum Component {
    RigidBody(RigidBody),
    Paintable(Paintable),
    Paintball(Paintball),
    Spawner(Spawner),
}

/// Entities whose removal was requested this frame. Swept by the scene after rendering.
#[derive(Debug, Default)]
pub struct RemovalQueue {
    keys: HashSet<EntityKey>,
}

impl RemovalQueue {
    /// Returns false if the entity was already marked
    pub fn mark(&mut self, key: &EntityKey) -> bool {
        self.keys.insert(key.clone())
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub(crate) fn drain(&mut self) -> Vec<EntityKey> {
        self.keys.drain().collect()
    }
}

/// Passed to per-frame component updates
pub struct ComponentContext<'a> {
    pub key: &'a EntityKey,
    pub physics: &'a mut PhysicsEngine,
    pub removals: &'a mut RemovalQueue,
}

/// Passed to collision hooks. Physics is read-only while contacts are dispatched, so
/// side effects are queued here instead.
pub struct CollisionContext<'a> {
    pub key: &'a EntityKey,
    pub removals: &'a mut RemovalQueue,
    pub strokes: &'a mut Vec<PendingStroke>,
}

/// What a component learns about the other entity in a contact
#[derive(Debug, Clone)]
pub struct CollisionPeer {
    pub key: EntityKey,
    pub paintable: bool,
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::RigidBody(_) => ComponentKind::RigidBody,
            Self::Paintable(_) => ComponentKind::Paintable,
            Self::Paintball(_) => ComponentKind::Paintball,
            Self::Spawner(_) => ComponentKind::Spawner,
        }
    }

    pub(crate) fn update(&mut self, node: &mut TransformNode, ctx: &mut ComponentContext<'_>, dt: f32) {
        match self {
            Self::RigidBody(body) => body.update(node, ctx.physics),
            Self::Paintable(_) => {}
            Self::Paintball(ball) => ball.update(ctx, dt),
            Self::Spawner(spawner) => spawner.update(dt),
        }
    }

    pub(crate) fn on_transform_update(&mut self, node: &TransformNode, physics: &mut PhysicsEngine) {
        if let Self::RigidBody(body) = self {
            body.on_transform_update(node, physics);
        }
    }

    pub(crate) fn on_collision(
        &mut self,
        node: &TransformNode,
        peer: &CollisionPeer,
        contact: &Contact,
        ctx: &mut CollisionContext<'_>,
    ) {
        if let Self::Paintball(ball) = self {
            ball.on_collision(node, peer, contact, ctx);
        }
    }

    pub(crate) fn destroy(self, physics: &mut PhysicsEngine) {
        if let Self::RigidBody(body) = self {
            body.destroy(physics);
        }
    }
}

/// Typed access into [`Component`]
pub trait ComponentType: Sized {
    const KIND: ComponentKind;

    fn downcast(component: &Component) -> Option<&Self>;
    fn downcast_mut(component: &mut Component) -> Option<&mut Self>;
}

macro_rules! component_type {
    ($ty:ident) => {
        impl ComponentType for $ty {
            const KIND: ComponentKind = ComponentKind::$ty;

            fn downcast(component: &Component) -> Option<&Self> {
                match component {
                    Component::$ty(inner) => Some(inner),
                    _ => None,
                }
            }

            fn downcast_mut(component: &mut Component) -> Option<&mut Self> {
                match component {
                    Component::$ty(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Component {
            fn from(inner: $ty) -> Self {
                Component::$ty(inner)
            }
        }
    };
}

component_type!(RigidBody);
component_type!(Paintable);
component_type!(Paintball);
component_type!(Spawner);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PaintConfigData, SpawnerConfigData};

    #[test]
    fn test_downcast_matches_kind() {
        let spawner = Spawner::new(&SpawnerConfigData::default(), &PaintConfigData::default(), Some(1)).unwrap();
        let component = Component::from(spawner);
        assert_eq!(component.kind(), ComponentKind::Spawner);
        assert_eq!(<Spawner as ComponentType>::KIND, ComponentKind::Spawner);
        assert!(Spawner::downcast(&component).is_some());
        assert!(Paintable::downcast(&component).is_none());
    }

    #[test]
    fn test_removal_queue_marks_once() {
        let mut queue = RemovalQueue::default();
        let key = EntityKey::independent("a");
        assert!(queue.mark(&key));
        assert!(!queue.mark(&key));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain(), vec![key]);
        assert!(queue.is_empty());
    }
}
