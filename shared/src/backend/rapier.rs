/*!
Single-precision dynamics backend over `rapier3d`.

Owns the full set/pipeline layout of a Rapier world and translates between
descriptor space and Rapier's builders. Every shape is one rigid body plus
one attached collider; the packed slot handle is mirrored into the
collider's `user_data` so the contact scan can walk back to the owning slot
without touching pointers.

Axis conventions
- Engine capsules are Z-aligned; parry has a Z capsule constructor, so they
  map directly.
- parry cylinders are Y-aligned only, so cylinder colliders are mounted
  under a quarter-turn about X to present the engine's Z-aligned convention.
*/

use rapier3d::prelude::*;

use super::JointFrames;
use crate::contact::RawContact;
use crate::descriptor::{JointKind, ShapeDescriptor, ShapeKind};
use crate::error::ShapeError;
use crate::math::{Iso, Vec3};
use crate::soft::RayHit;

use std::f32::consts::FRAC_PI_2;

/// Backend-native handles for one shape.
#[derive(Clone, Copy, Debug)]
pub struct RapierShape {
    pub body: RigidBodyHandle,
    pub collider: ColliderHandle,
}

pub struct RapierWorld {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
}

impl RapierWorld {
    pub fn new(gravity: Vec3, timestep: f32) -> Self {
        let mut params = IntegrationParameters::default();
        params.dt = timestep;
        Self {
            gravity,
            params,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
        }
    }

    /// Advance the world by one fixed step.
    pub fn step(&mut self, dt: f32) {
        self.params.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            &(),
            &(),
        );
    }

    /// Build one rigid body + collider pair from a descriptor.
    ///
    /// `pose` is the physical (pivot-composed) world pose; `user_data` is the
    /// packed slot handle mirrored into the native body for contact lookup.
    pub fn add_shape(
        &mut self,
        desc: &ShapeDescriptor,
        pose: Iso,
        user_data: u64,
    ) -> Result<RapierShape, ShapeError> {
        let builder = if desc.is_dynamic() {
            RigidBodyBuilder::dynamic()
        } else {
            RigidBodyBuilder::fixed()
        };
        let rb = builder.pose(pose).user_data(user_data as u128).build();
        let body = self.bodies.insert(rb);

        let collider = match collider_from_descriptor(desc) {
            Ok(collider) => collider.user_data(user_data as u128).build(),
            Err(err) => {
                // Roll the half-built body back out before reporting.
                self.remove_shape(RapierShape {
                    body,
                    collider: ColliderHandle::invalid(),
                });
                return Err(err);
            }
        };
        let collider = self.colliders.insert_with_parent(collider, body, &mut self.bodies);

        Ok(RapierShape { body, collider })
    }

    pub fn remove_shape(&mut self, shape: RapierShape) {
        self.bodies.remove(
            shape.body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    /// Build one of the five constraint kinds between two shapes.
    ///
    /// Cone-twist and 6-DOF map onto the generic joint with per-axis angular
    /// limits (twist on the local X of the joint frame, swing on Y/Z); the
    /// hinge uses the revolute axis mask with its native limit pair.
    pub fn add_joint(
        &mut self,
        kind: JointKind,
        shape_a: &RapierShape,
        shape_b: &RapierShape,
        frames: &JointFrames,
        params1: Vec3,
    ) -> ImpulseJointHandle {
        let anchor1 = Point::from(frames.local1.translation.vector);
        let anchor2 = Point::from(frames.local2.translation.vector);
        let axis1 = UnitVector::new_normalize(frames.local1.rotation * Vector::x());
        let axis2 = UnitVector::new_normalize(frames.local2.rotation * Vector::x());

        let joint: GenericJoint = match kind {
            JointKind::ConeTwist => GenericJointBuilder::new(JointAxesMask::LOCKED_SPHERICAL_AXES)
                .local_anchor1(anchor1)
                .local_anchor2(anchor2)
                .local_axis1(axis1)
                .local_axis2(axis2)
                .limits(JointAxis::AngX, [-params1.z, params1.z])
                .limits(JointAxis::AngY, [-params1.x, params1.x])
                .limits(JointAxis::AngZ, [-params1.y, params1.y])
                .build(),
            JointKind::Hinge => GenericJointBuilder::new(JointAxesMask::LOCKED_REVOLUTE_AXES)
                .local_anchor1(anchor1)
                .local_anchor2(anchor2)
                .local_axis1(axis1)
                .local_axis2(axis2)
                .limits(JointAxis::AngX, [params1.x, params1.y])
                .build(),
            JointKind::SixDof => GenericJointBuilder::new(JointAxesMask::LOCKED_SPHERICAL_AXES)
                .local_anchor1(anchor1)
                .local_anchor2(anchor2)
                .local_axis1(axis1)
                .local_axis2(axis2)
                .limits(JointAxis::AngX, [-params1.x, params1.x])
                .limits(JointAxis::AngY, [-params1.y, params1.y])
                .limits(JointAxis::AngZ, [-params1.z, params1.z])
                .build(),
            JointKind::BallSocket => SphericalJointBuilder::new()
                .local_anchor1(anchor1)
                .local_anchor2(anchor2)
                .build()
                .into(),
            JointKind::Fixed => FixedJointBuilder::new()
                .local_frame1(frames.local1)
                .local_frame2(frames.local2)
                .build()
                .into(),
        };

        self.impulse_joints
            .insert(shape_a.body, shape_b.body, joint, true)
    }

    /// Constraints must leave the solver before the native handle is dropped;
    /// removal wakes both attached bodies.
    pub fn remove_joint(&mut self, handle: ImpulseJointHandle) {
        self.impulse_joints.remove(handle, true);
    }

    pub fn pose(&self, shape: &RapierShape) -> Iso {
        self.bodies
            .get(shape.body)
            .map(|rb| *rb.position())
            .unwrap_or_else(Iso::identity)
    }

    pub fn set_pose(&mut self, shape: &RapierShape, pose: Iso) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.set_position(pose, true);
        }
    }

    pub fn lin_velocity(&self, shape: &RapierShape) -> Vec3 {
        self.bodies
            .get(shape.body)
            .map(|rb| *rb.linvel())
            .unwrap_or_else(Vec3::zeros)
    }

    pub fn set_lin_velocity(&mut self, shape: &RapierShape, velocity: Vec3) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.set_linvel(velocity, true);
        }
    }

    pub fn ang_velocity(&self, shape: &RapierShape) -> Vec3 {
        self.bodies
            .get(shape.body)
            .map(|rb| *rb.angvel())
            .unwrap_or_else(Vec3::zeros)
    }

    pub fn set_ang_velocity(&mut self, shape: &RapierShape, velocity: Vec3) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.set_angvel(velocity, true);
        }
    }

    pub fn force(&self, shape: &RapierShape) -> Vec3 {
        self.bodies
            .get(shape.body)
            .map(|rb| rb.user_force())
            .unwrap_or_else(Vec3::zeros)
    }

    pub fn set_force(&mut self, shape: &RapierShape, force: Vec3) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.reset_forces(true);
            rb.add_force(force, true);
        }
    }

    pub fn torque(&self, shape: &RapierShape) -> Vec3 {
        self.bodies
            .get(shape.body)
            .map(|rb| rb.user_torque())
            .unwrap_or_else(Vec3::zeros)
    }

    pub fn set_torque(&mut self, shape: &RapierShape, torque: Vec3) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.reset_torques(true);
            rb.add_torque(torque, true);
        }
    }

    pub fn add_force(&mut self, shape: &RapierShape, force: Vec3) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.add_force(force, true);
        }
    }

    pub fn add_force_at(&mut self, shape: &RapierShape, force: Vec3, world_pos: Vec3) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.add_force_at_point(force, Point::from(world_pos), true);
        }
    }

    /// Clear accumulated force/torque/velocity without destroying the shape.
    pub fn reset(&mut self, shape: &RapierShape) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.reset_forces(true);
            rb.reset_torques(true);
            rb.set_linvel(Vec3::zeros(), true);
            rb.set_angvel(Vec3::zeros(), true);
        }
    }

    /// Disabling removes the pair from simulation *and* from scene queries.
    pub fn set_enabled(&mut self, shape: &RapierShape, enabled: bool) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.set_enabled(enabled);
        }
        if let Some(co) = self.colliders.get_mut(shape.collider) {
            co.set_enabled(enabled);
        }
    }

    pub fn is_active(&self, shape: &RapierShape) -> bool {
        self.bodies
            .get(shape.body)
            .map(|rb| !rb.is_sleeping())
            .unwrap_or(false)
    }

    pub fn set_active(&mut self, shape: &RapierShape, active: bool) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            if active {
                rb.wake_up(true);
            } else {
                rb.sleep();
            }
        }
    }

    /// Object-local ray test against this shape's collider only.
    pub fn cast_ray(&self, shape: &RapierShape, start: Vec3, end: Vec3) -> Option<RayHit> {
        let co = self.colliders.get(shape.collider)?;
        let dir = end - start;
        if dir.norm_squared() <= f32::EPSILON {
            return None;
        }

        let ray = Ray::new(Point::from(start), dir);
        let hit = co
            .shape()
            .cast_ray_and_get_normal(co.position(), &ray, 1.0, true)?;
        Some(RayHit {
            fraction: hit.time_of_impact,
            normal: hit.normal,
            position: start + dir * hit.time_of_impact,
        })
    }

    /// Every currently-touching collider pair, with contact data for the
    /// router. One representative manifold point per pair is enough: the
    /// router works in pair granularity.
    pub fn touching_contacts(&self) -> Vec<RawContact> {
        let mut out = Vec::new();
        for pair in self.narrow_phase.contact_pairs() {
            let (Some(c1), Some(c2)) = (
                self.colliders.get(pair.collider1),
                self.colliders.get(pair.collider2),
            ) else {
                continue;
            };

            let Some((manifold, point)) = pair
                .manifolds
                .iter()
                .find_map(|m| m.points.iter().find(|p| p.dist <= 0.0).map(|p| (m, p)))
            else {
                continue;
            };

            let position = c1.position() * point.local_p1;
            let v1 = self.velocity_at(c1.parent(), &position);
            let v2 = self.velocity_at(c2.parent(), &position);

            out.push(RawContact {
                a: c1.user_data as u64,
                b: c2.user_data as u64,
                position: position.coords,
                normal: manifold.data.normal,
                relative_velocity: v1 - v2,
            });
        }
        out
    }

    fn velocity_at(&self, body: Option<RigidBodyHandle>, point: &Point<Real>) -> Vec3 {
        body.and_then(|h| self.bodies.get(h))
            .map(|rb| rb.velocity_at_point(point))
            .unwrap_or_else(Vec3::zeros)
    }
}

/// Map a descriptor onto a parry collider builder.
///
/// Dynamic triangle meshes are refused: a triangle soup has no well-defined
/// mass distribution, and the engine only ever uses them for static scenery.
fn collider_from_descriptor(desc: &ShapeDescriptor) -> Result<ColliderBuilder, ShapeError> {
    let builder = match desc.kind {
        ShapeKind::Box => ColliderBuilder::cuboid(
            desc.dimensions.x,
            desc.dimensions.y,
            desc.dimensions.z,
        ),
        ShapeKind::Sphere => ColliderBuilder::ball(desc.dimensions.x),
        ShapeKind::Capsule => ColliderBuilder::capsule_z(desc.dimensions.z, desc.dimensions.x),
        ShapeKind::Cylinder => {
            // parry cylinders are Y-aligned; mount under a quarter turn about X
            // so the long axis presents as the engine's +Z.
            ColliderBuilder::cylinder(desc.dimensions.z, desc.dimensions.x)
                .rotation(Vector::x() * FRAC_PI_2)
        }
        ShapeKind::TriangleMesh => {
            if desc.is_dynamic() {
                return Err(ShapeError::UnsupportedKind(desc.kind));
            }
            let points: Vec<Point<Real>> =
                desc.vertices.iter().map(|v| Point::from(*v)).collect();
            ColliderBuilder::trimesh(points, desc.indices.clone())
                .map_err(|_| ShapeError::InvalidDimensions)?
        }
        // Soft meshes never reach the rigid path; the world routes them to
        // the stand-in before backend dispatch.
        ShapeKind::SoftMesh => return Err(ShapeError::UnsupportedKind(desc.kind)),
    };

    Ok(if desc.is_dynamic() {
        builder.mass(desc.mass)
    } else {
        builder
    })
}
