/*!
Double-precision dynamics backend over `rapier3d-f64`.

Structurally a sibling of the single-precision backend, but every native
type is distinct (f64 scalars throughout), so nothing is shared: descriptor
values are widened on the way in and poses/velocities narrowed on the way
out. Worlds that drift kilometers from the origin keep solver precision at
the cost of roughly double the memory traffic.
*/

use rapier3d_f64::prelude::*;

use super::JointFrames;
use crate::contact::RawContact;
use crate::descriptor::{JointKind, ShapeDescriptor, ShapeKind};
use crate::error::ShapeError;
use crate::math::Vec3;
use crate::soft::RayHit;

use std::f64::consts::FRAC_PI_2;

/// Backend-native handles for one shape.
#[derive(Clone, Copy, Debug)]
pub struct Rapier64Shape {
    pub body: RigidBodyHandle,
    pub collider: ColliderHandle,
}

pub struct Rapier64World {
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

impl Rapier64World {
    pub fn new(gravity: Vec3, timestep: f32) -> Self {
        let mut params = IntegrationParameters::default();
        params.dt = timestep as Real;
        Self {
            gravity: widen(gravity),
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

    pub fn step(&mut self, dt: f32) {
        self.params.dt = dt as Real;
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

    pub fn add_shape(
        &mut self,
        desc: &ShapeDescriptor,
        pose: crate::math::Iso,
        user_data: u64,
    ) -> Result<Rapier64Shape, ShapeError> {
        let builder = if desc.is_dynamic() {
            RigidBodyBuilder::dynamic()
        } else {
            RigidBodyBuilder::fixed()
        };
        let rb = builder
            .pose(pose.cast::<Real>())
            .user_data(user_data as u128)
            .build();
        let body = self.bodies.insert(rb);

        let collider = match collider_from_descriptor(desc) {
            Ok(collider) => collider.user_data(user_data as u128).build(),
            Err(err) => {
                self.remove_shape(Rapier64Shape {
                    body,
                    collider: ColliderHandle::invalid(),
                });
                return Err(err);
            }
        };
        let collider = self.colliders.insert_with_parent(collider, body, &mut self.bodies);

        Ok(Rapier64Shape { body, collider })
    }

    pub fn remove_shape(&mut self, shape: Rapier64Shape) {
        self.bodies.remove(
            shape.body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn add_joint(
        &mut self,
        kind: JointKind,
        shape_a: &Rapier64Shape,
        shape_b: &Rapier64Shape,
        frames: &JointFrames,
        params1: Vec3,
    ) -> ImpulseJointHandle {
        let local1 = frames.local1.cast::<Real>();
        let local2 = frames.local2.cast::<Real>();
        let anchor1 = Point::from(local1.translation.vector);
        let anchor2 = Point::from(local2.translation.vector);
        let axis1 = UnitVector::new_normalize(local1.rotation * Vector::x());
        let axis2 = UnitVector::new_normalize(local2.rotation * Vector::x());
        let p = widen(params1);

        let joint: GenericJoint = match kind {
            JointKind::ConeTwist => GenericJointBuilder::new(JointAxesMask::LOCKED_SPHERICAL_AXES)
                .local_anchor1(anchor1)
                .local_anchor2(anchor2)
                .local_axis1(axis1)
                .local_axis2(axis2)
                .limits(JointAxis::AngX, [-p.z, p.z])
                .limits(JointAxis::AngY, [-p.x, p.x])
                .limits(JointAxis::AngZ, [-p.y, p.y])
                .build(),
            JointKind::Hinge => GenericJointBuilder::new(JointAxesMask::LOCKED_REVOLUTE_AXES)
                .local_anchor1(anchor1)
                .local_anchor2(anchor2)
                .local_axis1(axis1)
                .local_axis2(axis2)
                .limits(JointAxis::AngX, [p.x, p.y])
                .build(),
            JointKind::SixDof => GenericJointBuilder::new(JointAxesMask::LOCKED_SPHERICAL_AXES)
                .local_anchor1(anchor1)
                .local_anchor2(anchor2)
                .local_axis1(axis1)
                .local_axis2(axis2)
                .limits(JointAxis::AngX, [-p.x, p.x])
                .limits(JointAxis::AngY, [-p.y, p.y])
                .limits(JointAxis::AngZ, [-p.z, p.z])
                .build(),
            JointKind::BallSocket => SphericalJointBuilder::new()
                .local_anchor1(anchor1)
                .local_anchor2(anchor2)
                .build()
                .into(),
            JointKind::Fixed => FixedJointBuilder::new()
                .local_frame1(local1)
                .local_frame2(local2)
                .build()
                .into(),
        };

        self.impulse_joints
            .insert(shape_a.body, shape_b.body, joint, true)
    }

    pub fn remove_joint(&mut self, handle: ImpulseJointHandle) {
        self.impulse_joints.remove(handle, true);
    }

    pub fn pose(&self, shape: &Rapier64Shape) -> crate::math::Iso {
        self.bodies
            .get(shape.body)
            .map(|rb| rb.position().cast::<f32>())
            .unwrap_or_else(crate::math::Iso::identity)
    }

    pub fn set_pose(&mut self, shape: &Rapier64Shape, pose: crate::math::Iso) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.set_position(pose.cast::<Real>(), true);
        }
    }

    pub fn lin_velocity(&self, shape: &Rapier64Shape) -> Vec3 {
        self.bodies
            .get(shape.body)
            .map(|rb| narrow(*rb.linvel()))
            .unwrap_or_else(Vec3::zeros)
    }

    pub fn set_lin_velocity(&mut self, shape: &Rapier64Shape, velocity: Vec3) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.set_linvel(widen(velocity), true);
        }
    }

    pub fn ang_velocity(&self, shape: &Rapier64Shape) -> Vec3 {
        self.bodies
            .get(shape.body)
            .map(|rb| narrow(*rb.angvel()))
            .unwrap_or_else(Vec3::zeros)
    }

    pub fn set_ang_velocity(&mut self, shape: &Rapier64Shape, velocity: Vec3) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.set_angvel(widen(velocity), true);
        }
    }

    pub fn force(&self, shape: &Rapier64Shape) -> Vec3 {
        self.bodies
            .get(shape.body)
            .map(|rb| narrow(rb.user_force()))
            .unwrap_or_else(Vec3::zeros)
    }

    pub fn set_force(&mut self, shape: &Rapier64Shape, force: Vec3) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.reset_forces(true);
            rb.add_force(widen(force), true);
        }
    }

    pub fn torque(&self, shape: &Rapier64Shape) -> Vec3 {
        self.bodies
            .get(shape.body)
            .map(|rb| narrow(rb.user_torque()))
            .unwrap_or_else(Vec3::zeros)
    }

    pub fn set_torque(&mut self, shape: &Rapier64Shape, torque: Vec3) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.reset_torques(true);
            rb.add_torque(widen(torque), true);
        }
    }

    pub fn add_force(&mut self, shape: &Rapier64Shape, force: Vec3) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.add_force(widen(force), true);
        }
    }

    pub fn add_force_at(&mut self, shape: &Rapier64Shape, force: Vec3, world_pos: Vec3) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.add_force_at_point(widen(force), Point::from(widen(world_pos)), true);
        }
    }

    pub fn reset(&mut self, shape: &Rapier64Shape) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.reset_forces(true);
            rb.reset_torques(true);
            rb.set_linvel(Vector::zeros(), true);
            rb.set_angvel(Vector::zeros(), true);
        }
    }

    pub fn set_enabled(&mut self, shape: &Rapier64Shape, enabled: bool) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            rb.set_enabled(enabled);
        }
        if let Some(co) = self.colliders.get_mut(shape.collider) {
            co.set_enabled(enabled);
        }
    }

    pub fn is_active(&self, shape: &Rapier64Shape) -> bool {
        self.bodies
            .get(shape.body)
            .map(|rb| !rb.is_sleeping())
            .unwrap_or(false)
    }

    pub fn set_active(&mut self, shape: &Rapier64Shape, active: bool) {
        if let Some(rb) = self.bodies.get_mut(shape.body) {
            if active {
                rb.wake_up(true);
            } else {
                rb.sleep();
            }
        }
    }

    pub fn cast_ray(&self, shape: &Rapier64Shape, start: Vec3, end: Vec3) -> Option<RayHit> {
        let co = self.colliders.get(shape.collider)?;
        let dir = widen(end - start);
        if dir.norm_squared() <= Real::EPSILON {
            return None;
        }

        let ray = Ray::new(Point::from(widen(start)), dir);
        let hit = co
            .shape()
            .cast_ray_and_get_normal(co.position(), &ray, 1.0, true)?;
        let fraction = hit.time_of_impact as f32;
        Some(RayHit {
            fraction,
            normal: narrow(hit.normal),
            position: start + (end - start) * fraction,
        })
    }

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
                position: narrow(position.coords),
                normal: narrow(manifold.data.normal),
                relative_velocity: v1 - v2,
            });
        }
        out
    }

    fn velocity_at(&self, body: Option<RigidBodyHandle>, point: &Point<Real>) -> Vec3 {
        body.and_then(|h| self.bodies.get(h))
            .map(|rb| narrow(rb.velocity_at_point(point)))
            .unwrap_or_else(Vec3::zeros)
    }
}

#[inline]
fn widen(v: Vec3) -> Vector<Real> {
    v.cast::<Real>()
}

#[inline]
fn narrow(v: Vector<Real>) -> Vec3 {
    v.cast::<f32>()
}

fn collider_from_descriptor(desc: &ShapeDescriptor) -> Result<ColliderBuilder, ShapeError> {
    let dims = widen(desc.dimensions);
    let builder = match desc.kind {
        ShapeKind::Box => ColliderBuilder::cuboid(dims.x, dims.y, dims.z),
        ShapeKind::Sphere => ColliderBuilder::ball(dims.x),
        ShapeKind::Capsule => ColliderBuilder::capsule_z(dims.z, dims.x),
        ShapeKind::Cylinder => {
            // Same Y-to-Z remount as the single-precision backend.
            ColliderBuilder::cylinder(dims.z, dims.x).rotation(Vector::x() * FRAC_PI_2)
        }
        ShapeKind::TriangleMesh => {
            if desc.is_dynamic() {
                return Err(ShapeError::UnsupportedKind(desc.kind));
            }
            let points: Vec<Point<Real>> = desc
                .vertices
                .iter()
                .map(|v| Point::from(widen(*v)))
                .collect();
            ColliderBuilder::trimesh(points, desc.indices.clone())
                .map_err(|_| ShapeError::InvalidDimensions)?
        }
        ShapeKind::SoftMesh => return Err(ShapeError::UnsupportedKind(desc.kind)),
    };

    Ok(if desc.is_dynamic() {
        builder.mass(desc.mass as Real)
    } else {
        builder
    })
}
