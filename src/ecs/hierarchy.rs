/// Parent/child queries over scene entities
///
/// Parents are stored as keys on the child, so every query walks upward. The walk is
/// bounded by the entity count, which keeps a corrupted chain from looping forever.

use crate::ecs::entity::{Entity, EntityKey};
use crate::scene::Scene;

pub struct TransformHierarchy;

impl TransformHierarchy {
    /// Every entity key, parents before their children
    pub fn update_order(scene: &Scene) -> Vec<EntityKey> {
        let mut keyed: Vec<(usize, EntityKey)> = scene
            .entities()
            .map(|entity| (Self::depth(scene, entity.key()), entity.key().clone()))
            .collect();
        keyed.sort_by_key(|(depth, _)| *depth);
        keyed.into_iter().map(|(_, key)| key).collect()
    }

    /// Number of ancestors; 0 for roots
    pub fn depth(scene: &Scene, key: &EntityKey) -> usize {
        let limit = scene.len();
        let mut depth = 0;
        let mut current = scene.get(key).and_then(Entity::parent);
        while let Some(parent) = current {
            depth += 1;
            if depth > limit {
                log::warn!("Parent chain of {key} does not terminate");
                break;
            }
            current = scene.get(parent).and_then(Entity::parent);
        }
        depth
    }

    /// True if `ancestor` appears on the parent chain of `key`
    pub fn is_ancestor(scene: &Scene, ancestor: &EntityKey, key: &EntityKey) -> bool {
        let limit = scene.len();
        let mut current = scene.get(key).and_then(Entity::parent);
        let mut steps = 0;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            steps += 1;
            if steps > limit {
                return false;
            }
            current = scene.get(parent).and_then(Entity::parent);
        }
        false
    }

    pub fn children_of(scene: &Scene, key: &EntityKey) -> Vec<EntityKey> {
        scene
            .entities()
            .filter(|entity| entity.parent() == Some(key))
            .map(|entity| entity.key().clone())
            .collect()
    }

    /// Every entity below `key`, at any depth
    pub fn descendants(scene: &Scene, key: &EntityKey) -> Vec<EntityKey> {
        scene
            .entities()
            .filter(|entity| Self::is_ancestor(scene, key, entity.key()))
            .map(|entity| entity.key().clone())
            .collect()
    }

    /// Entities whose parent no longer exists
    pub fn orphans(scene: &Scene) -> Vec<EntityKey> {
        scene
            .entities()
            .filter(|entity| entity.parent().is_some_and(|parent| !scene.contains(parent)))
            .map(|entity| entity.key().clone())
            .collect()
    }
}
