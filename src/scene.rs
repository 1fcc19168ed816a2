use crate::ecs::components::{CollisionPeer, ComponentKind, RemovalQueue};
use crate::ecs::entity::{Drawable, Entity, EntityKey, EntityToken, GroupId, SceneId, SceneState};
use crate::ecs::hierarchy::TransformHierarchy;
use crate::ecs::physics::{CollisionFilter, CollisionListener, Contact, PhysicsEngine};
use crate::ecs::rendering::{
    DrawFilter, DrawParams, InstanceBatch, MeshHandle, ProgramHandle, RenderContext, UniformValue,
};
use crate::error::{EngineError, Result};
use crate::material::Material;
use crate::material_library::MaterialLibrary;
use crate::paint::{PaintStroke, PaintTarget, Paintable, Paintball, PendingStroke, Spawner};
use crate::transform::Transform;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

/// Owns every entity. Independent entities are drawn one by one; instanced groups share a
/// model and material and are drawn with one call per group.
///
/// Removal is deferred: anything marked during a frame stays alive, physics body included,
/// until [`Scene::remove_marked`] runs after rendering.
pub struct Scene {
    id: SceneId,
    entities: HashMap<String, Entity>,
    groups: HashMap<GroupId, HashMap<String, Entity>>,
    /// Every id in use, independent or instanced
    ids: HashSet<String>,
    tokens: HashMap<EntityToken, EntityKey>,
    next_token: EntityToken,
    removals: RemovalQueue,
    pending_strokes: Vec<PendingStroke>,
    rng: StdRng,
}

impl Scene {
    /// `seed` fixes the suffixes used to keep ids unique
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            id: SceneId::allocate(),
            entities: HashMap::new(),
            groups: HashMap::new(),
            ids: HashSet::new(),
            tokens: HashMap::new(),
            next_token: EntityToken::FIRST,
            removals: RemovalQueue::default(),
            pending_strokes: Vec::new(),
            rng,
        }
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    /// Add an independently drawn entity. The returned id is `name`, or `name_<n>` if taken.
    pub fn emplace_entity(
        &mut self,
        name: &str,
        transform: Transform,
        drawable: Option<Drawable>,
    ) -> EntityKey {
        self.insert(name, None, transform, drawable)
    }

    /// Add an entity to an instanced group, creating the group on first use
    pub fn emplace_instanced_entity(
        &mut self,
        group: &GroupId,
        name: &str,
        transform: Transform,
        drawable: Drawable,
    ) -> EntityKey {
        let mismatch = self
            .groups
            .get(group)
            .and_then(|members| members.values().next())
            .and_then(Entity::drawable)
            .filter(|existing| **existing != drawable)
            .cloned();
        if let Some(existing) = mismatch {
            log::warn!(
                "Group {group} draws {}/{}, ignoring {}/{} requested for `{name}`",
                existing.model,
                existing.material,
                drawable.model,
                drawable.material
            );
        }
        self.insert(name, Some(group.clone()), transform, Some(drawable))
    }

    fn insert(
        &mut self,
        name: &str,
        group: Option<GroupId>,
        transform: Transform,
        drawable: Option<Drawable>,
    ) -> EntityKey {
        let id = self.allocate_id(name);
        let token = self.next_token;
        self.next_token = token.next();

        let key = EntityKey {
            id: id.clone(),
            group: group.clone(),
        };
        let state = SceneState {
            scene: self.id,
            key: key.clone(),
            token,
        };
        let entity = Entity::new(name.to_string(), state, transform, drawable);

        self.ids.insert(id.clone());
        self.tokens.insert(token, key.clone());
        match group {
            Some(group) => {
                self.groups.entry(group).or_default().insert(id, entity);
            }
            None => {
                self.entities.insert(id, entity);
            }
        }
        log::trace!("Emplaced {key}");
        key
    }

    fn allocate_id(&mut self, name: &str) -> String {
        let base = if name.is_empty() { "entity" } else { name };
        if !self.ids.contains(base) {
            return base.to_string();
        }
        loop {
            let candidate = format!("{base}_{}", self.rng.gen_range(0..1_000_000u32));
            if !self.ids.contains(&candidate) {
                return candidate;
            }
        }
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Entity> {
        match &key.group {
            Some(group) => self.groups.get(group)?.get(&key.id),
            None => self.entities.get(&key.id),
        }
    }

    pub fn get_mut(&mut self, key: &EntityKey) -> Option<&mut Entity> {
        lookup_mut(&mut self.entities, &mut self.groups, key)
    }

    /// Look up by id alone, searching independent entities first
    pub fn find(&self, id: &str) -> Option<&Entity> {
        self.entities
            .get(id)
            .or_else(|| self.groups.values().find_map(|members| members.get(id)))
    }

    pub fn key_of(&self, token: EntityToken) -> Option<&EntityKey> {
        self.tokens.get(&token)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.get(key).is_some()
    }

    /// All entities, independent and instanced
    pub fn len(&self) -> usize {
        self.entities.len() + self.groups.values().map(HashMap::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn independent_count(&self) -> usize {
        self.entities.len()
    }

    pub fn group_len(&self, group: &GroupId) -> usize {
        self.groups.get(group).map_or(0, HashMap::len)
    }

    pub fn group_ids(&self) -> impl Iterator<Item = &GroupId> {
        self.groups.keys()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities
            .values()
            .chain(self.groups.values().flat_map(HashMap::values))
    }

    /// Reparent `child` keeping its local transform. `None` makes it a root.
    pub fn set_parent(&mut self, child: &EntityKey, parent: Option<&EntityKey>) -> Result<()> {
        if !self.contains(child) {
            return Err(EngineError::EntityNotFound(child.to_string()));
        }
        let parent_world = match parent {
            Some(parent) => {
                let parent_entity = self
                    .get(parent)
                    .ok_or_else(|| EngineError::EntityNotFound(parent.to_string()))?;
                if parent == child || TransformHierarchy::is_ancestor(self, child, parent) {
                    return Err(EngineError::InvalidParent {
                        child: child.to_string(),
                        parent: parent.to_string(),
                        reason: "would create a cycle",
                    });
                }
                Some(parent_entity.world().matrix())
            }
            None => None,
        };
        if let Some(entity) = self.get_mut(child) {
            entity.set_parent(parent.cloned(), parent_world);
        }
        Ok(())
    }

    /// Request removal at the end of the frame. Returns false for unknown entities.
    pub fn mark_for_removal(&mut self, key: &EntityKey) -> bool {
        if !self.contains(key) {
            return false;
        }
        self.removals.mark(key);
        true
    }

    pub fn is_marked(&self, key: &EntityKey) -> bool {
        self.removals.contains(key)
    }

    /// Destroy every marked entity and its physics body. Children of removed entities
    /// become roots at their current world pose.
    pub fn remove_marked(&mut self, physics: &mut PhysicsEngine) -> usize {
        let mut removed = 0;
        for key in self.removals.drain() {
            if let Some(entity) = self.take(&key) {
                entity.destroy(physics);
                removed += 1;
            }
        }

        if removed > 0 {
            for orphan in TransformHierarchy::orphans(self) {
                if let Some(entity) = self.get_mut(&orphan) {
                    entity.detach_parent();
                }
            }
            log::debug!("Removed {removed} entities, {} remain", self.len());
        }
        removed
    }

    /// Remove everything immediately
    pub fn clear(&mut self, physics: &mut PhysicsEngine) {
        let keys: Vec<EntityKey> = self.entities().map(|e| e.key().clone()).collect();
        for key in &keys {
            self.removals.mark(key);
        }
        self.remove_marked(physics);
        self.pending_strokes.clear();
    }

    fn take(&mut self, key: &EntityKey) -> Option<Entity> {
        let entity = match &key.group {
            Some(group) => {
                let members = self.groups.get_mut(group)?;
                let entity = members.remove(&key.id);
                if members.is_empty() {
                    self.groups.remove(group);
                }
                entity?
            }
            None => self.entities.remove(&key.id)?,
        };
        self.ids.remove(&key.id);
        self.tokens.remove(&entity.token());
        Some(entity)
    }

    /// Fire a projectile from the entity carrying a [`Spawner`].
    ///
    /// Returns `Ok(None)` while the spawner cools down. Projectiles are grouped per spawner.
    pub fn shoot(
        &mut self,
        physics: &mut PhysicsEngine,
        spawner: &EntityKey,
        origin: Vec3,
        orientation: Vec3,
        direction: Vec3,
    ) -> Result<Option<EntityKey>> {
        let entity = self
            .get_mut(spawner)
            .ok_or_else(|| EngineError::EntityNotFound(spawner.to_string()))?;
        let group = projectile_group(entity.token());
        let launcher = entity
            .component_mut::<Spawner>()
            .ok_or_else(|| EngineError::MissingComponent {
                entity: spawner.to_string(),
                component: ComponentKind::Spawner.name(),
            })?;
        let Some(plan) = launcher.shoot(origin, orientation, direction) else {
            return Ok(None);
        };

        let transform = Transform::new(plan.origin, plan.orientation, plan.size);
        let key = self.emplace_instanced_entity(&group, "paintball", transform, plan.drawable);
        let projectile = self
            .get_mut(&key)
            .ok_or_else(|| EngineError::EntityNotFound(key.to_string()))?;

        let body = match projectile.attach_rigid_body(physics, &plan.body, Some(CollisionFilter::PROJECTILE)) {
            Ok(body) => body,
            Err(err) => {
                if let Some(entity) = self.take(&key) {
                    entity.destroy(physics);
                }
                return Err(err);
            }
        };
        projectile.add_component(Paintball::new(body, plan.paintball), physics);
        physics.apply_central_impulse(body, plan.impulse);

        log::trace!("{spawner} fired {key}");
        Ok(Some(key))
    }

    /// Instanced group holding the projectiles fired by `spawner`
    pub fn projectile_group(&self, spawner: &EntityKey) -> Option<GroupId> {
        self.get(spawner).map(|entity| projectile_group(entity.token()))
    }

    /// Update every entity, parents first, then commit the strokes queued by collisions.
    ///
    /// Returns the number of strokes committed.
    pub fn update(
        &mut self,
        dt: f32,
        physics: &mut PhysicsEngine,
        render: &mut RenderContext<'_>,
    ) -> usize {
        for key in TransformHierarchy::update_order(self) {
            let parent_world = self
                .get(&key)
                .and_then(Entity::parent)
                .and_then(|parent| self.get(parent))
                .map(|parent| parent.world().matrix());
            let Scene {
                entities,
                groups,
                removals,
                ..
            } = &mut *self;
            if let Some(entity) = lookup_mut(entities, groups, &key) {
                entity.update(parent_world, physics, removals, dt);
            }
        }
        self.flush_strokes(render)
    }

    /// Strokes queued by collisions and not yet committed
    pub fn pending_strokes(&self) -> usize {
        self.pending_strokes.len()
    }

    fn flush_strokes(&mut self, render: &mut RenderContext<'_>) -> usize {
        let pending = std::mem::take(&mut self.pending_strokes);
        let mut committed = 0;
        for PendingStroke { target, stroke } in pending {
            let Some(entity) = self.get_mut(&target) else {
                log::debug!("Stroke target {target} is gone");
                continue;
            };
            if commit_stroke(entity, render, &stroke) {
                committed += 1;
            }
        }
        committed
    }

    /// Draw independent entities, then one call per instanced group. Returns the draw calls issued.
    pub fn draw(&self, render: &mut RenderContext<'_>, params: &DrawParams) -> usize {
        self.draw_independent(render, params) + self.draw_instanced(render, params)
    }

    pub fn draw_independent(&self, render: &mut RenderContext<'_>, params: &DrawParams) -> usize {
        let mut calls = 0;
        for entity in self.entities.values() {
            if draw_entity(entity, render, params) {
                calls += 1;
            }
        }
        calls
    }

    pub fn draw_instanced(&self, render: &mut RenderContext<'_>, params: &DrawParams) -> usize {
        let mut calls = 0;
        for (group, members) in &self.groups {
            if draw_group(group, members, render, params) {
                calls += 1;
            }
        }
        calls
    }

    /// Draw only what `filter` allows, matching entity ids and group ids
    pub fn draw_filtered(
        &self,
        render: &mut RenderContext<'_>,
        params: &DrawParams,
        filter: &DrawFilter,
    ) -> usize {
        let mut calls = 0;
        for (id, entity) in &self.entities {
            if filter.allows(id) && draw_entity(entity, render, params) {
                calls += 1;
            }
        }
        for (group, members) in &self.groups {
            if filter.allows(group.as_str()) && draw_group(group, members, render, params) {
                calls += 1;
            }
        }
        calls
    }

    fn notify_collision(&mut self, target: &EntityKey, peer: CollisionPeer, contact: &Contact) {
        let Scene {
            entities,
            groups,
            removals,
            pending_strokes,
            ..
        } = &mut *self;
        if let Some(entity) = lookup_mut(entities, groups, target) {
            entity.on_collision(&peer, contact, removals, pending_strokes);
        }
    }

    fn peer_of(&self, key: &EntityKey) -> Option<CollisionPeer> {
        let entity = self.get(key)?;
        Some(CollisionPeer {
            key: key.clone(),
            paintable: entity.has_component(ComponentKind::Paintable),
        })
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CollisionListener for Scene {
    fn on_contact(&mut self, first: EntityToken, second: EntityToken, contact: &Contact) {
        let (Some(a), Some(b)) = (self.key_of(first).cloned(), self.key_of(second).cloned()) else {
            return;
        };
        let (Some(peer_of_a), Some(peer_of_b)) = (self.peer_of(&b), self.peer_of(&a)) else {
            return;
        };
        self.notify_collision(&a, peer_of_a, contact);
        self.notify_collision(&b, peer_of_b, contact);
    }
}

/// Tokens are never reused within a scene, so a spawner's batch cannot be inherited by a later
/// entity that happens to get the same id
fn projectile_group(spawner: EntityToken) -> GroupId {
    GroupId::new(format!("spawner#{}", spawner.get()))
}

fn lookup_mut<'a>(
    entities: &'a mut HashMap<String, Entity>,
    groups: &'a mut HashMap<GroupId, HashMap<String, Entity>>,
    key: &EntityKey,
) -> Option<&'a mut Entity> {
    match &key.group {
        Some(group) => groups.get_mut(group)?.get_mut(&key.id),
        None => entities.get_mut(&key.id),
    }
}

fn commit_stroke(entity: &mut Entity, render: &mut RenderContext<'_>, stroke: &PaintStroke) -> bool {
    let key = entity.key().clone();
    let Some(drawable) = entity.drawable() else {
        log::warn!("{key} has nothing to paint onto");
        return false;
    };
    let Some(mesh) = render.library.model(&drawable.model) else {
        log::warn!("{key}: model `{}` not loaded, stroke dropped", drawable.model);
        return false;
    };
    let target = PaintTarget {
        mesh,
        model: entity.world().matrix(),
    };
    match entity.component_mut::<Paintable>() {
        Some(paintable) => paintable.update_paintmap(render, &target, stroke),
        None => {
            log::debug!("{key} is no longer paintable");
            false
        }
    }
}

/// Resolve the program, mesh and material a drawable needs, warning about whatever is missing
fn resolve<'l>(
    library: &'l MaterialLibrary,
    drawable: &Drawable,
    params: &DrawParams,
    owner: &dyn std::fmt::Display,
) -> Option<(ProgramHandle, MeshHandle, &'l Material)> {
    let Some(material) = library.get(&drawable.material) else {
        log::warn!("{owner}: material `{}` not found, skipping draw", drawable.material);
        return None;
    };
    let Some(mesh) = library.model(&drawable.model) else {
        log::warn!("{owner}: model `{}` not loaded, skipping draw", drawable.model);
        return None;
    };
    let shader = params.program_override.as_deref().unwrap_or(&material.shader);
    let Some(program) = library.program(shader) else {
        log::warn!("{owner}: program `{shader}` not loaded, skipping draw");
        return None;
    };
    Some((program, mesh, material))
}

fn draw_entity(entity: &Entity, render: &mut RenderContext<'_>, params: &DrawParams) -> bool {
    let Some(drawable) = entity.drawable() else {
        return false;
    };
    let library = render.library;
    let Some((program, mesh, material)) = resolve(library, drawable, params, entity.key()) else {
        return false;
    };

    render.backend.bind_program(program);
    render
        .backend
        .set_uniform("u_view_projection", UniformValue::Mat4(params.view_projection));
    render.backend.set_uniform("u_instanced", UniformValue::Bool(false));
    render
        .backend
        .set_uniform("u_model", UniformValue::Mat4(entity.world().matrix()));
    if !material.apply(render.backend, library) {
        return false;
    }
    match entity.component::<Paintable>() {
        Some(paintable) => paintable.bind_for_sampling(render.backend),
        None => render.backend.set_uniform("u_has_paintmap", UniformValue::Bool(false)),
    }
    render.backend.draw_indexed(mesh);
    true
}

fn draw_group(
    group: &GroupId,
    members: &HashMap<String, Entity>,
    render: &mut RenderContext<'_>,
    params: &DrawParams,
) -> bool {
    let Some(drawable) = members.values().find_map(Entity::drawable) else {
        return false;
    };
    let library = render.library;
    let Some((program, mesh, material)) = resolve(library, drawable, params, group) else {
        return false;
    };

    let mut batch = InstanceBatch::with_capacity(members.len());
    for member in members.values() {
        batch.push(member.world().matrix());
    }

    render.backend.bind_program(program);
    render
        .backend
        .set_uniform("u_view_projection", UniformValue::Mat4(params.view_projection));
    render.backend.set_uniform("u_instanced", UniformValue::Bool(true));
    if !material.apply(render.backend, library) {
        return false;
    }
    render.backend.set_uniform("u_has_paintmap", UniformValue::Bool(false));
    render.backend.upload_instance_data(batch.as_bytes());
    render.backend.draw_indexed_instanced(mesh, batch.len() as u32);
    true
}
