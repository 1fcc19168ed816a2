/// Paint projectile: tracks its velocity history, hovers against gravity with a slight
/// off-centre wobble, and turns its first contact into a paint stroke.

use crate::config::PaintConfigData;
use crate::ecs::components::{CollisionContext, CollisionPeer, ComponentContext};
use crate::ecs::entity::{EntityKey, TransformNode};
use crate::ecs::physics::{Contact, PhysicsEngine};
use crate::paint::{PaintStroke, PendingStroke};
use glam::Vec3;
use rapier3d::prelude::RigidBodyHandle;

#[derive(Debug, Clone, PartialEq)]
pub struct PaintballSettings {
    /// Seconds until the projectile removes itself
    pub lifetime: f32,
    pub color: Vec3,
    /// Stroke half-width relative to the projectile's largest extent
    pub splat_scale: f32,
    pub reach: f32,
    /// Body-local point the wobble force is applied at
    pub wobble_offset: Vec3,
    pub wobble_force_scale: f32,
}

impl PaintballSettings {
    pub fn from_config(paint: &PaintConfigData, lifetime: f32, color: Vec3) -> Self {
        Self {
            lifetime,
            color,
            splat_scale: paint.splat_scale,
            reach: paint.reach,
            wobble_offset: paint.wobble_offset,
            wobble_force_scale: paint.wobble_force_scale,
        }
    }
}

#[derive(Debug)]
pub struct Paintball {
    body: RigidBodyHandle,
    settings: PaintballSettings,
    remaining: f32,
    previous_velocity: Vec3,
    current_velocity: Vec3,
    spent: bool,
    body_missing: bool,
}

impl Paintball {
    /// `body` is the rigid body of the same entity
    pub fn new(body: RigidBodyHandle, settings: PaintballSettings) -> Self {
        Self {
            body,
            remaining: settings.lifetime,
            settings,
            previous_velocity: Vec3::ZERO,
            current_velocity: Vec3::ZERO,
            spent: false,
            body_missing: false,
        }
    }

    pub fn body(&self) -> RigidBodyHandle {
        self.body
    }

    pub fn color(&self) -> Vec3 {
        self.settings.color
    }

    pub fn remaining_lifetime(&self) -> f32 {
        self.remaining
    }

    /// Velocity as of the update before last
    pub fn previous_velocity(&self) -> Vec3 {
        self.previous_velocity
    }

    pub fn current_velocity(&self) -> Vec3 {
        self.current_velocity
    }

    /// True once a contact has been handled
    pub fn is_spent(&self) -> bool {
        self.spent
    }

    pub(crate) fn update(&mut self, ctx: &mut ComponentContext<'_>, dt: f32) {
        self.previous_velocity = self.current_velocity;
        match ctx.physics.linear_velocity(self.body) {
            Some(velocity) => self.current_velocity = velocity,
            None => self.report_missing_body(ctx.key),
        }

        self.remaining -= dt;
        if self.remaining <= 0.0 && ctx.removals.mark(ctx.key) {
            log::trace!("{} expired", ctx.key);
        }

        self.stabilize(ctx.physics);
    }

    /// Cancel gravity and push slightly off-centre so the flight path wobbles
    fn stabilize(&self, physics: &mut PhysicsEngine) {
        let Some(mass) = physics.mass(self.body).filter(|mass| *mass > 0.0) else {
            return;
        };
        let weight = physics.gravity() * mass;
        physics.apply_central_force(self.body, -weight);
        physics.apply_force_at_local_offset(
            self.body,
            weight * self.settings.wobble_force_scale,
            self.settings.wobble_offset,
        );
    }

    fn report_missing_body(&mut self, key: &EntityKey) {
        if !self.body_missing {
            self.body_missing = true;
            log::warn!("{key}: paintball has no rigid body, flying without velocity tracking");
        }
    }

    pub(crate) fn on_collision(
        &mut self,
        node: &TransformNode,
        peer: &CollisionPeer,
        contact: &Contact,
        ctx: &mut CollisionContext<'_>,
    ) {
        if self.spent {
            return;
        }
        self.spent = true;

        if peer.paintable {
            let direction = self.impact_direction(node, contact);
            let half_width = node.world().size().max_element() * self.settings.splat_scale;
            let stroke = PaintStroke::project(
                contact.position,
                direction,
                half_width,
                self.settings.reach,
                self.settings.color,
            );
            ctx.strokes.push(PendingStroke {
                target: peer.key.clone(),
                stroke,
            });
        }
        ctx.removals.mark(ctx.key);
    }

    /// Travel direction before the impact. The solver has already bounced the current
    /// velocity by the time contacts are dispatched, so the older sample wins.
    pub fn impact_direction(&self, node: &TransformNode, contact: &Contact) -> Vec3 {
        self.previous_velocity
            .try_normalize()
            .or_else(|| self.current_velocity.try_normalize())
            .or_else(|| (contact.position - node.world().position()).try_normalize())
            .unwrap_or(Vec3::NEG_Y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::RemovalQueue;
    use crate::ecs::entity::EntityToken;
    use crate::ecs::physics::{ColliderShape, RigidBodyCreateInfo};
    use crate::transform::Transform;

    fn settings() -> PaintballSettings {
        PaintballSettings::from_config(&PaintConfigData::default(), 1.0, Vec3::new(0.0, 1.0, 0.0))
    }

    fn spawn(physics: &mut PhysicsEngine) -> RigidBodyHandle {
        let info = RigidBodyCreateInfo::new(1.0, ColliderShape::Sphere { radius: 0.1 });
        physics
            .add_rigid_body(Vec3::ZERO, Vec3::ZERO, &info, None, EntityToken::new(1).unwrap())
            .unwrap()
    }

    fn contact_at(position: Vec3) -> Contact {
        Contact {
            position,
            normal: Vec3::Z,
            impulse: 1.0,
        }
    }

    #[test]
    fn test_velocity_history_shifts_each_update() {
        let mut physics = PhysicsEngine::default();
        let body = spawn(&mut physics);
        let mut ball = Paintball::new(body, settings());
        let key = EntityKey::independent("ball");
        let mut removals = RemovalQueue::default();

        physics.set_linear_velocity(body, Vec3::new(0.0, 0.0, -5.0));
        let mut ctx = ComponentContext { key: &key, physics: &mut physics, removals: &mut removals };
        ball.update(&mut ctx, 0.1);
        ctx.physics.set_linear_velocity(body, Vec3::new(0.0, 0.0, 3.0));
        ball.update(&mut ctx, 0.1);

        assert_eq!(ball.previous_velocity(), Vec3::new(0.0, 0.0, -5.0));
        assert_eq!(ball.current_velocity(), Vec3::new(0.0, 0.0, 3.0));
        assert!(removals.is_empty());
    }

    #[test]
    fn test_expires_after_lifetime() {
        let mut physics = PhysicsEngine::default();
        let body = spawn(&mut physics);
        let mut ball = Paintball::new(body, settings());
        let key = EntityKey::independent("ball");
        let mut removals = RemovalQueue::default();
        let mut ctx = ComponentContext { key: &key, physics: &mut physics, removals: &mut removals };

        ball.update(&mut ctx, 0.6);
        assert!(!ctx.removals.contains(&key));
        ball.update(&mut ctx, 0.6);
        assert!(removals.contains(&key));
    }

    #[test]
    fn test_gravity_is_cancelled() {
        let mut physics = PhysicsEngine::default();
        let body = spawn(&mut physics);
        let mut ball = Paintball::new(
            body,
            PaintballSettings {
                wobble_force_scale: 0.0,
                ..settings()
            },
        );
        let key = EntityKey::independent("ball");
        let mut removals = RemovalQueue::default();
        for _ in 0..30 {
            let mut ctx = ComponentContext { key: &key, physics: &mut physics, removals: &mut removals };
            ball.update(&mut ctx, 1.0 / 60.0);
            physics.step(1.0 / 60.0);
        }
        let velocity = physics.linear_velocity(body).unwrap();
        assert!(velocity.length() < 1e-3, "velocity {velocity}");
    }

    #[test]
    fn test_missing_body_degrades_quietly() {
        let mut physics = PhysicsEngine::default();
        let body = spawn(&mut physics);
        physics.remove_rigid_body(body);
        let mut ball = Paintball::new(body, settings());
        let key = EntityKey::independent("ball");
        let mut removals = RemovalQueue::default();
        let mut ctx = ComponentContext { key: &key, physics: &mut physics, removals: &mut removals };
        ball.update(&mut ctx, 0.1);
        ball.update(&mut ctx, 0.1);
        assert_eq!(ball.current_velocity(), Vec3::ZERO);
        assert!((ball.remaining_lifetime() - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_first_contact_paints_once() {
        let node = TransformNode::new(Transform::new(Vec3::ZERO, Vec3::ZERO, Vec3::splat(0.1)));
        let mut ball = Paintball::new(RigidBodyHandle::invalid(), settings());
        ball.previous_velocity = Vec3::new(0.0, 0.0, -10.0);
        ball.current_velocity = Vec3::new(0.0, 0.0, 4.0);

        let key = EntityKey::independent("ball");
        let peer = CollisionPeer {
            key: EntityKey::independent("wall"),
            paintable: true,
        };
        let mut removals = RemovalQueue::default();
        let mut strokes = Vec::new();
        let mut ctx = CollisionContext { key: &key, removals: &mut removals, strokes: &mut strokes };

        ball.on_collision(&node, &peer, &contact_at(Vec3::new(0.0, 0.0, -0.1)), &mut ctx);
        ball.on_collision(&node, &peer, &contact_at(Vec3::new(0.0, 0.0, -0.1)), &mut ctx);

        assert!(ball.is_spent());
        assert_eq!(strokes.len(), 1);
        assert_eq!(strokes[0].target, peer.key);
        assert_eq!(strokes[0].stroke.direction, Vec3::NEG_Z);
        assert_eq!(strokes[0].stroke.color, Vec3::new(0.0, 1.0, 0.0));
        assert!(removals.contains(&key));
    }

    #[test]
    fn test_unpaintable_peer_still_removes() {
        let node = TransformNode::new(Transform::identity());
        let mut ball = Paintball::new(RigidBodyHandle::invalid(), settings());
        let key = EntityKey::independent("ball");
        let peer = CollisionPeer {
            key: EntityKey::independent("crate"),
            paintable: false,
        };
        let mut removals = RemovalQueue::default();
        let mut strokes = Vec::new();
        let mut ctx = CollisionContext { key: &key, removals: &mut removals, strokes: &mut strokes };
        ball.on_collision(&node, &peer, &contact_at(Vec3::X), &mut ctx);
        assert!(strokes.is_empty());
        assert!(removals.contains(&key));
    }

    #[test]
    fn test_direction_falls_back_to_contact_offset() {
        let node = TransformNode::new(Transform::from_position(Vec3::new(0.0, 1.0, 0.0)));
        let ball = Paintball::new(RigidBodyHandle::invalid(), settings());
        let direction = ball.impact_direction(&node, &contact_at(Vec3::new(2.0, 1.0, 0.0)));
        assert!(direction.abs_diff_eq(Vec3::X, 1e-6));
    }
}
