/// Physics integration with Rapier
///
/// Provides:
/// - Body creation from a {mass, friction, restitution, shape} description
/// - Per-frame stepping with forces that last exactly one step
/// - Contact dispatch back to owning entities through the body's user data

use crate::config::PhysicsConfigData;
use crate::ecs::entity::EntityToken;
use crate::error::{EngineError, Result};
use crate::transform::euler_rotation;
use glam::{Quat, Vec3};
use nalgebra as na;
use rapier3d::pipeline::{DebugColor, DebugRenderBackend, DebugRenderObject, DebugRenderPipeline};
use rapier3d::prelude::*;
use std::collections::HashMap;

/// Collision group bit reserved for projectiles
pub const PROJECTILE_GROUP: u32 = 1 << 1;

/// Collider geometry in body-local space
#[derive(Debug, Clone, PartialEq)]
pub enum ColliderShape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    /// Approximate hull around a vertex cloud
    ConvexHull { points: Vec<Vec3> },
}

impl ColliderShape {
    /// Resize for a transform scale. Models are authored in the unit [-1, 1] cube, so a size
    /// of `s` means half extents of `s`.
    pub fn scaled_to(&self, size: Vec3) -> ColliderShape {
        match self {
            Self::Box { .. } => Self::Box { half_extents: size },
            Self::Sphere { .. } => Self::Sphere {
                radius: size.max_element(),
            },
            Self::ConvexHull { points } => Self::ConvexHull {
                points: points.iter().map(|p| *p * size).collect(),
            },
        }
    }

    fn build(&self) -> Result<ColliderBuilder> {
        match self {
            Self::Box { half_extents } => {
                if half_extents.min_element() <= 0.0 {
                    return Err(EngineError::DegenerateShape(format!(
                        "box half extents {half_extents}"
                    )));
                }
                Ok(ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z))
            }
            Self::Sphere { radius } => {
                if *radius <= 0.0 {
                    return Err(EngineError::DegenerateShape(format!("sphere radius {radius}")));
                }
                Ok(ColliderBuilder::ball(*radius))
            }
            Self::ConvexHull { points } => {
                // A solid hull needs at least a tetrahedron
                if points.len() < 4 {
                    return Err(EngineError::ConvexHull(points.len()));
                }
                let cloud: Vec<Point<Real>> = points.iter().map(|p| vec3_to_point(*p)).collect();
                // Rapier hulls carry no collision margin, so the hull is not inflated
                ColliderBuilder::convex_hull(&cloud).ok_or(EngineError::ConvexHull(points.len()))
            }
        }
    }
}

/// Which transform scale, if any, overrides the collider's own size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeSource {
    #[default]
    Collider,
    LocalScale,
    WorldScale,
}

/// Everything needed to create a rigid body
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBodyCreateInfo {
    /// `<= 0` creates a body the solver never integrates
    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
    pub shape: ColliderShape,
    pub size_source: SizeSource,
    /// Non-dynamic bodies are fixed unless this is set
    pub kinematic: bool,
}

impl RigidBodyCreateInfo {
    pub fn new(mass: f32, shape: ColliderShape) -> Self {
        Self {
            mass,
            friction: 0.5,
            restitution: 0.0,
            shape,
            size_source: SizeSource::Collider,
            kinematic: false,
        }
    }

    pub fn with_material(mut self, friction: f32, restitution: f32) -> Self {
        self.friction = friction;
        self.restitution = restitution;
        self
    }

    pub fn with_size_source(mut self, size_source: SizeSource) -> Self {
        self.size_source = size_source;
        self
    }

    pub fn kinematic(mut self) -> Self {
        self.kinematic = true;
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.mass > 0.0
    }
}

/// Membership and filter bitmasks; two bodies interact when each one's group hits the other's mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionFilter {
    pub group: u32,
    pub mask: u32,
}

impl CollisionFilter {
    /// Projectiles hit everything except other projectiles
    pub const PROJECTILE: CollisionFilter = CollisionFilter {
        group: PROJECTILE_GROUP,
        mask: !PROJECTILE_GROUP,
    };

    fn interaction_groups(&self) -> InteractionGroups {
        InteractionGroups::new(
            Group::from_bits_truncate(self.group),
            Group::from_bits_truncate(self.mask),
        )
    }
}

/// One contact point handed to collision listeners, in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub position: Vec3,
    pub normal: Vec3,
    pub impulse: f32,
}

/// Receives every dispatched contact during [`PhysicsEngine::detect_collisions`]
pub trait CollisionListener {
    fn on_contact(&mut self, first: EntityToken, second: EntityToken, contact: &Contact);
}

/// Segment produced by the debug renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugLine {
    pub start: Vec3,
    pub end: Vec3,
    pub color: [f32; 4],
}

#[derive(Default)]
struct DebugLineCollector {
    lines: Vec<DebugLine>,
}

impl DebugRenderBackend for DebugLineCollector {
    fn draw_line(
        &mut self,
        _object: DebugRenderObject,
        a: Point<Real>,
        b: Point<Real>,
        color: DebugColor,
    ) {
        self.lines.push(DebugLine {
            start: point_to_vec3(&a),
            end: point_to_vec3(&b),
            color,
        });
    }
}

#[derive(Debug, Clone, Copy)]
struct BodyRecord {
    owner: EntityToken,
    mass: f32,
}

/// Physics world wrapper
/// Owns the simulation state and routes contacts back to entities
pub struct PhysicsEngine {
    /// Rapier rigid body set
    pub rigid_body_set: RigidBodySet,

    /// Rapier collider set
    pub collider_set: ColliderSet,

    pub gravity: Vector<Real>,

    pub integration_params: IntegrationParameters,

    pub physics_pipeline: PhysicsPipeline,

    pub island_manager: IslandManager,

    pub broad_phase: DefaultBroadPhase,

    pub narrow_phase: NarrowPhase,

    pub impulse_joint_set: ImpulseJointSet,

    pub multibody_joint_set: MultibodyJointSet,

    pub ccd_solver: CCDSolver,

    /// Query pipeline for raycasts
    pub query_pipeline: QueryPipeline,

    bodies: HashMap<RigidBodyHandle, BodyRecord>,
    contact_threshold: f32,
    debug_pipeline: Option<DebugRenderPipeline>,
    debug_lines: Vec<DebugLine>,
}

impl PhysicsEngine {
    pub fn new(config: &PhysicsConfigData) -> Self {
        let mut engine = Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            gravity: vec3_to_vector(config.gravity),
            integration_params: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            bodies: HashMap::new(),
            contact_threshold: config.contact_threshold,
            debug_pipeline: None,
            debug_lines: Vec::new(),
        };
        engine.set_debug_draw(config.debug_draw);
        engine
    }

    /// Create a body at a world pose. Orientation is in Euler degrees, composed like
    /// [`crate::transform::Transform`].
    pub fn add_rigid_body(
        &mut self,
        position: Vec3,
        orientation: Vec3,
        info: &RigidBodyCreateInfo,
        filter: Option<CollisionFilter>,
        owner: EntityToken,
    ) -> Result<RigidBodyHandle> {
        let mut collider = info
            .shape
            .build()?
            .friction(info.friction)
            .restitution(info.restitution)
            .user_data(owner.to_user_data());
        if let Some(filter) = filter {
            collider = collider.collision_groups(filter.interaction_groups());
        }
        if info.is_dynamic() {
            // Inertia follows from the shape and this mass
            collider = collider.mass(info.mass);
        }

        let builder = if info.is_dynamic() {
            RigidBodyBuilder::dynamic()
        } else if info.kinematic {
            RigidBodyBuilder::kinematic_position_based()
        } else {
            RigidBodyBuilder::fixed()
        };
        let rigid_body = builder
            .position(pose_to_isometry(position, euler_rotation(orientation)))
            .user_data(owner.to_user_data())
            .build();

        let handle = self.rigid_body_set.insert(rigid_body);
        self.collider_set
            .insert_with_parent(collider.build(), handle, &mut self.rigid_body_set);
        self.bodies.insert(
            handle,
            BodyRecord {
                owner,
                mass: info.mass.max(0.0),
            },
        );

        log::trace!("Created body {handle:?} for {owner:?} (mass {})", info.mass);
        Ok(handle)
    }

    /// Destroy a body and its colliders. Returns false if the handle was already gone.
    pub fn remove_rigid_body(&mut self, handle: RigidBodyHandle) -> bool {
        self.bodies.remove(&handle);
        self.rigid_body_set
            .remove(
                handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            )
            .is_some()
    }

    /// Advance the simulation by `dt` seconds
    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.integration_params.dt = dt;

        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,  // No query pipeline modifications
            &(),   // No hooks
            &(),   // No events
        );

        self.query_pipeline.update(&self.collider_set);

        // User forces apply to a single step
        for (_, body) in self.rigid_body_set.iter_mut() {
            if body.is_dynamic() {
                body.reset_forces(false);
                body.reset_torques(false);
            }
        }

        if let Some(pipeline) = self.debug_pipeline.as_mut() {
            let mut collector = DebugLineCollector::default();
            pipeline.render(
                &mut collector,
                &self.rigid_body_set,
                &self.collider_set,
                &self.impulse_joint_set,
                &self.multibody_joint_set,
                &self.narrow_phase,
            );
            self.debug_lines = collector.lines;
        }
    }

    /// Dispatch every contact point of the last step whose distance is below the threshold.
    ///
    /// Each point is reported once, with both owners; pairs whose bodies carry no owner are
    /// skipped. Returns the number of dispatched points.
    pub fn detect_collisions<L: CollisionListener + ?Sized>(&self, listener: &mut L) -> usize {
        let mut dispatched = 0;

        for pair in self.narrow_phase.contact_pairs() {
            let (Some(collider1), Some(collider2)) = (
                self.collider_set.get(pair.collider1),
                self.collider_set.get(pair.collider2),
            ) else {
                continue;
            };
            let (Some(first), Some(second)) =
                (self.collider_owner(collider1), self.collider_owner(collider2))
            else {
                continue;
            };

            for manifold in &pair.manifolds {
                let normal = vector_to_vec3(&manifold.data.normal);
                for point in &manifold.points {
                    if point.dist >= self.contact_threshold {
                        continue;
                    }
                    let world_point = *collider1.position() * point.local_p1;
                    let contact = Contact {
                        position: point_to_vec3(&world_point),
                        normal,
                        impulse: point.data.impulse,
                    };
                    listener.on_contact(first, second, &contact);
                    dispatched += 1;
                }
            }
        }

        dispatched
    }

    /// World position and rotation of a body
    pub fn body_pose(&self, handle: RigidBodyHandle) -> Option<(Vec3, Quat)> {
        let body = self.rigid_body_set.get(handle)?;
        Some((vector_to_vec3(body.translation()), unit_quat_to_quat(body.rotation())))
    }

    /// Teleport a body: new pose, zero velocities, no accumulated forces
    pub fn set_body_pose(&mut self, handle: RigidBodyHandle, position: Vec3, rotation: Quat) -> bool {
        let Some(body) = self.rigid_body_set.get_mut(handle) else {
            return false;
        };
        body.set_position(pose_to_isometry(position, rotation), true);
        body.set_linvel(Vector::zeros(), true);
        body.set_angvel(Vector::zeros(), true);
        body.reset_forces(true);
        body.reset_torques(true);
        true
    }

    pub fn linear_velocity(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.rigid_body_set
            .get(handle)
            .map(|body| vector_to_vec3(body.linvel()))
    }

    pub fn set_linear_velocity(&mut self, handle: RigidBodyHandle, velocity: Vec3) -> bool {
        let Some(body) = self.rigid_body_set.get_mut(handle) else {
            return false;
        };
        body.set_linvel(vec3_to_vector(velocity), true);
        true
    }

    /// Mass the body was created with (0 for non-dynamic bodies)
    pub fn mass(&self, handle: RigidBodyHandle) -> Option<f32> {
        self.bodies.get(&handle).map(|record| record.mass)
    }

    pub fn is_dynamic(&self, handle: RigidBodyHandle) -> bool {
        self.rigid_body_set
            .get(handle)
            .map(|body| body.is_dynamic())
            .unwrap_or(false)
    }

    pub fn owner(&self, handle: RigidBodyHandle) -> Option<EntityToken> {
        self.bodies.get(&handle).map(|record| record.owner)
    }

    pub fn contains(&self, handle: RigidBodyHandle) -> bool {
        self.rigid_body_set.contains(handle)
    }

    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    pub fn gravity(&self) -> Vec3 {
        vector_to_vec3(&self.gravity)
    }

    /// Force through the centre of mass for the next step
    pub fn apply_central_force(&mut self, handle: RigidBodyHandle, force: Vec3) -> bool {
        let Some(body) = self.rigid_body_set.get_mut(handle) else {
            return false;
        };
        body.add_force(vec3_to_vector(force), true);
        true
    }

    /// Force at `offset` (body-local, relative to the centre of mass) for the next step
    pub fn apply_force_at_local_offset(
        &mut self,
        handle: RigidBodyHandle,
        force: Vec3,
        offset: Vec3,
    ) -> bool {
        let Some(body) = self.rigid_body_set.get_mut(handle) else {
            return false;
        };
        let world_offset = body.rotation() * vec3_to_vector(offset);
        let point = *body.center_of_mass() + world_offset;
        body.add_force_at_point(vec3_to_vector(force), point, true);
        true
    }

    /// Instant change of momentum through the centre of mass
    pub fn apply_central_impulse(&mut self, handle: RigidBodyHandle, impulse: Vec3) -> bool {
        let Some(mass) = self.mass(handle).filter(|mass| *mass > 0.0) else {
            return false;
        };
        let Some(body) = self.rigid_body_set.get_mut(handle) else {
            return false;
        };
        // Mass properties may not be synced until the next step, so use the recorded mass
        let velocity = *body.linvel() + vec3_to_vector(impulse / mass);
        body.set_linvel(velocity, true);
        true
    }

    /// Raycast for targeting/line-of-sight checks
    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<(EntityToken, f32)> {
        let direction = direction.try_normalize()?;
        let ray = Ray::new(vec3_to_point(origin), vec3_to_vector(direction));

        let (collider_handle, distance) = self.query_pipeline.cast_ray(
            &self.rigid_body_set,
            &self.collider_set,
            &ray,
            max_distance,
            true,
            QueryFilter::default(),
        )?;

        let collider = self.collider_set.get(collider_handle)?;
        Some((self.collider_owner(collider)?, distance))
    }

    pub fn set_debug_draw(&mut self, enabled: bool) {
        if enabled {
            self.debug_pipeline.get_or_insert_with(DebugRenderPipeline::default);
        } else {
            self.debug_pipeline = None;
            self.debug_lines.clear();
        }
    }

    /// Lines from the most recent step, empty when debug drawing is off
    pub fn debug_lines(&self) -> &[DebugLine] {
        &self.debug_lines
    }

    fn collider_owner(&self, collider: &Collider) -> Option<EntityToken> {
        let body = self.rigid_body_set.get(collider.parent()?)?;
        EntityToken::from_user_data(body.user_data)
    }
}

impl Default for PhysicsEngine {
    fn default() -> Self {
        Self::new(&PhysicsConfigData::default())
    }
}

fn pose_to_isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
    Isometry::from_parts(vec3_to_translation(position), quat_to_unit_quat(rotation))
}

fn vec3_to_translation(v: Vec3) -> Translation<Real> {
    Translation::new(v.x, v.y, v.z)
}

fn vec3_to_point(v: Vec3) -> Point<Real> {
    Point::new(v.x, v.y, v.z)
}

fn vec3_to_vector(v: Vec3) -> Vector<Real> {
    Vector::new(v.x, v.y, v.z)
}

fn vector_to_vec3(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn point_to_vec3(p: &Point<Real>) -> Vec3 {
    Vec3::new(p.x, p.y, p.z)
}

fn quat_to_unit_quat(q: Quat) -> na::UnitQuaternion<Real> {
    na::UnitQuaternion::from_quaternion(na::Quaternion::new(q.w, q.x, q.y, q.z))
}

fn unit_quat_to_quat(q: &na::UnitQuaternion<Real>) -> Quat {
    let coords = q.quaternion().coords;
    Quat::from_xyzw(coords.x, coords.y, coords.z, coords.w)
}
