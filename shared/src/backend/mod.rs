/*!
Backend abstraction: a closed variant set dispatched through one
capability surface.

`PhysicsWorld` owns one backend instance (null, single-precision rapier, or
double-precision rapier) plus the backend-agnostic bookkeeping: the shape
and joint slot arenas, the graphical-to-physical pivot per shape, the
enabled/sleep mirrors, and the contact router. Shapes and joints are
addressed by generational handles; the packed handle doubles as the native
body's user data so contacts can be walked back to the owning slot without
pointer casts.

Dispatch is a plain match over `(backend, slot variant)`. The two variants
always correspond because slots are only ever minted by their own world; a
mismatch is a programmer error and asserts in debug builds.

Transform convention: backends store the *physical* pose. Every public
transform accessor composes the shape's fixed graphical-to-physical pivot
back out, because collision geometry center and mesh origin are generally
not coincident.
*/

mod null;
mod rapier;
mod rapier64;

use nalgebra as na;

use crate::arena::{Arena, SlotHandle};
use crate::constants::CONTACT_MIN_SPEED_MPS;
use crate::contact::{ContactEvent, ContactRouter, RawContact};
use crate::descriptor::{JointDescriptor, JointId, ObjectId, ShapeDescriptor, ShapeId, ShapeKind};
use crate::error::{JointError, ShapeError, WorldError};
use crate::math::{Iso, Quat, Transform, Vec3};
use crate::soft::{RayHit, SoftShape};

use null::{NullShape, NullWorld};
use rapier::{RapierShape, RapierWorld};
use rapier64::{Rapier64Shape, Rapier64World};

/// The closed set of backend variants.
///
/// Adding an engine means adding a variant here and a module next to the
/// existing ones; the null variant is a first-class member, not a degenerate
/// subclass, so the fallback path exercises exactly the same dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Null,
    Rapier,
    Rapier64,
}

impl BackendKind {
    /// Case-insensitive lookup from a configuration string. An absent name
    /// selects the null backend; an unknown one is a fatal configuration
    /// error for the caller.
    pub fn from_name(name: Option<&str>) -> Result<Self, crate::error::ConfigError> {
        let Some(name) = name else {
            return Ok(BackendKind::Null);
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "null" => Ok(BackendKind::Null),
            "rapier" => Ok(BackendKind::Rapier),
            "rapier64" | "rapier-f64" => Ok(BackendKind::Rapier64),
            other => Err(crate::error::ConfigError::UnknownBackend(other.to_string())),
        }
    }

    /// Display name reported to the scripting layer.
    pub fn display_name(self) -> &'static str {
        match self {
            BackendKind::Null => "Null",
            BackendKind::Rapier => "Rapier",
            BackendKind::Rapier64 => "Rapier (double precision)",
        }
    }
}

/// World construction options.
#[derive(Clone, Copy, Debug)]
pub struct WorldOptions {
    /// World-space gravity (Z-up convention: usually `(0, 0, -9.81)`).
    pub gravity: Vec3,
    /// Fixed timestep in seconds.
    pub timestep: f32,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, 0.0, crate::constants::GRAVITY_MPS2),
            timestep: crate::constants::TICK_INTERVAL.as_secs_f32(),
        }
    }
}

impl WorldOptions {
    pub fn validate(&self) -> Result<(), WorldError> {
        if !self.gravity.x.is_finite() || !self.gravity.y.is_finite() || !self.gravity.z.is_finite()
        {
            return Err(WorldError::InvalidGravity);
        }
        if !self.timestep.is_finite() || self.timestep <= 0.0 {
            return Err(WorldError::InvalidTimestep);
        }
        Ok(())
    }
}

/// Local attachment frames of a joint, one per connected shape.
///
/// The joint's primary axis (hinge rotation / cone-twist twist) is the local
/// X of each frame; anchors are the frame translations.
pub(crate) struct JointFrames {
    pub local1: Iso,
    pub local2: Iso,
}

/// Resolve the shared world pivot/axis into each body's local frame.
///
/// Both poses must be the shapes' *finalized* physical poses; ragdoll
/// activation guarantees this by building strictly root-to-leaf.
fn joint_frames(pose_a: &Iso, pose_b: &Iso, world_pivot: Vec3, world_axis: Vec3) -> JointFrames {
    let axis = if world_axis.norm_squared() > f32::EPSILON {
        world_axis.normalize()
    } else {
        Vec3::z()
    };
    let rotation = Quat::rotation_between(&Vec3::x(), &axis)
        .unwrap_or_else(|| Quat::from_axis_angle(&na::Vector3::z_axis(), std::f32::consts::PI));
    let world = Iso::from_parts(
        na::Translation3::new(world_pivot.x, world_pivot.y, world_pivot.z),
        rotation,
    );
    JointFrames {
        local1: pose_a.inv_mul(&world),
        local2: pose_b.inv_mul(&world),
    }
}

enum BackendInner {
    Null(NullWorld),
    Rapier(RapierWorld),
    Rapier64(Rapier64World),
}

enum ShapeInner {
    Null(NullShape),
    Rapier(RapierShape),
    Rapier64(Rapier64Shape),
    /// The backend-agnostic soft stand-in, valid under every backend.
    Soft(SoftShape),
}

struct ShapeSlot {
    owner: ObjectId,
    kind: ShapeKind,
    pivot: Transform,
    pivot_inv: Transform,
    enabled: bool,
    /// Sleep flag for variants without a native body (null/soft).
    active: bool,
    inner: ShapeInner,
}

enum JointInner {
    Null,
    Rapier(rapier3d::prelude::ImpulseJointHandle),
    Rapier64(rapier3d_f64::prelude::ImpulseJointHandle),
}

struct JointSlot {
    desc: JointDescriptor,
    inner: JointInner,
}

/// One backend instance for one simulation side.
pub struct PhysicsWorld {
    kind: BackendKind,
    is_server: bool,
    backend: BackendInner,
    shapes: Arena<ShapeSlot>,
    joints: Arena<JointSlot>,
    router: ContactRouter,
    pending: Vec<ContactEvent>,
}

impl PhysicsWorld {
    /// Construct a world for the requested backend. Fails only on invalid
    /// options; the facade handles degrading to [`BackendKind::Null`].
    pub fn try_create(
        kind: BackendKind,
        opts: &WorldOptions,
        is_server: bool,
    ) -> Result<Self, WorldError> {
        opts.validate()?;
        let backend = match kind {
            BackendKind::Null => BackendInner::Null(NullWorld::new()),
            BackendKind::Rapier => {
                BackendInner::Rapier(RapierWorld::new(opts.gravity, opts.timestep))
            }
            BackendKind::Rapier64 => {
                BackendInner::Rapier64(Rapier64World::new(opts.gravity, opts.timestep))
            }
        };
        Ok(Self {
            kind,
            is_server,
            backend,
            shapes: Arena::new(),
            joints: Arena::new(),
            router: ContactRouter::new(CONTACT_MIN_SPEED_MPS),
            pending: Vec::new(),
        })
    }

    /// The null world cannot fail to construct; it is the terminal fallback.
    pub fn create_null(is_server: bool) -> Self {
        Self::try_create(BackendKind::Null, &WorldOptions::default(), is_server)
            .expect("null backend construction is infallible")
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Advance the simulation one fixed step and collect filtered contact
    /// events for this tick.
    pub fn step(&mut self, dt: f32) {
        let raw: Vec<RawContact> = match &mut self.backend {
            BackendInner::Null(world) => {
                world.step(dt);
                Vec::new()
            }
            BackendInner::Rapier(world) => {
                world.step(dt);
                world.touching_contacts()
            }
            BackendInner::Rapier64(world) => {
                world.step(dt);
                world.touching_contacts()
            }
        };

        let shapes = &self.shapes;
        let events = self.router.route(&raw, |user_data| {
            let handle = SlotHandle::unpack(user_data);
            shapes
                .get(handle)
                .filter(|slot| slot.enabled)
                .map(|slot| (ShapeId(handle), slot.owner))
        });
        self.pending.extend(events);
    }

    /// Take the contact events collected by the last step. The side driver
    /// delivers these to the owning bindings before the tick ends.
    pub fn drain_contacts(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Create one collidable shape from a descriptor.
    ///
    /// Soft-mesh descriptors are routed to the backend-agnostic stand-in;
    /// neither wrapped engine has native soft bodies.
    pub fn create_shape(&mut self, desc: &ShapeDescriptor) -> Result<ShapeId, ShapeError> {
        desc.validate()?;
        if desc.kind == ShapeKind::SoftMesh {
            return self.create_shape_soft(desc);
        }

        let pose = desc.transform.mul(&desc.pivot).iso();

        // The slot is minted first so its packed handle can ride along as the
        // native body's user data.
        let handle = self.shapes.insert(ShapeSlot {
            owner: desc.owner,
            kind: desc.kind,
            pivot: desc.pivot,
            pivot_inv: desc.pivot.inverse(),
            enabled: true,
            active: true,
            inner: ShapeInner::Null(NullShape::new(pose)),
        });
        let user_data = handle.pack();

        let inner = match &mut self.backend {
            BackendInner::Null(_) => ShapeInner::Null(NullShape::new(pose)),
            BackendInner::Rapier(world) => match world.add_shape(desc, pose, user_data) {
                Ok(shape) => ShapeInner::Rapier(shape),
                Err(err) => {
                    self.shapes.remove(handle);
                    return Err(err);
                }
            },
            BackendInner::Rapier64(world) => match world.add_shape(desc, pose, user_data) {
                Ok(shape) => ShapeInner::Rapier64(shape),
                Err(err) => {
                    self.shapes.remove(handle);
                    return Err(err);
                }
            },
        };

        if let Some(slot) = self.shapes.get_mut(handle) {
            slot.inner = inner;
        }
        Ok(ShapeId(handle))
    }

    /// Create a soft shape. Always lands on the stand-in; a backend with
    /// native soft bodies would take over here.
    pub fn create_shape_soft(&mut self, desc: &ShapeDescriptor) -> Result<ShapeId, ShapeError> {
        if desc.vertices.is_empty() {
            return Err(ShapeError::EmptySoftMesh);
        }

        // The stand-in stores the physical (pivot-composed) pose like every
        // other variant, so the common accessors compose it back out.
        let mut soft = SoftShape::from_descriptor(desc);
        soft.set_transform(&desc.transform.mul(&desc.pivot));

        let handle = self.shapes.insert(ShapeSlot {
            owner: desc.owner,
            kind: ShapeKind::SoftMesh,
            pivot: desc.pivot,
            pivot_inv: desc.pivot.inverse(),
            enabled: true,
            active: true,
            inner: ShapeInner::Soft(soft),
        });
        Ok(ShapeId(handle))
    }

    /// Destroy a shape and its native body.
    ///
    /// Any joint referencing the shape must have been destroyed first; the
    /// ragdoll teardown order guarantees this structurally.
    pub fn destroy_shape(&mut self, id: ShapeId) {
        debug_assert!(
            !self
                .joints
                .iter()
                .any(|(_, j)| j.desc.shape_a == id || j.desc.shape_b == id),
            "destroying a shape still referenced by a live joint"
        );

        let Some(slot) = self.shapes.remove(id.0) else {
            return;
        };
        match (&mut self.backend, slot.inner) {
            (BackendInner::Rapier(world), ShapeInner::Rapier(shape)) => world.remove_shape(shape),
            (BackendInner::Rapier64(world), ShapeInner::Rapier64(shape)) => {
                world.remove_shape(shape)
            }
            _ => {}
        }
    }

    /// Create a constraint between two live shapes.
    pub fn create_joint(&mut self, desc: &JointDescriptor) -> Result<JointId, JointError> {
        let (pose_a, inner_a) = self.native_ref(desc.shape_a).ok_or(JointError::DeadShape)?;
        let (pose_b, inner_b) = self.native_ref(desc.shape_b).ok_or(JointError::DeadShape)?;
        if matches!(inner_a, NativeShape::Soft) || matches!(inner_b, NativeShape::Soft) {
            return Err(JointError::SoftShape(desc.kind));
        }

        let frames = joint_frames(&pose_a, &pose_b, desc.world_pivot, desc.world_axis);

        let inner = match (&mut self.backend, inner_a, inner_b) {
            (BackendInner::Null(_), _, _) => JointInner::Null,
            (BackendInner::Rapier(world), NativeShape::Rapier(a), NativeShape::Rapier(b)) => {
                JointInner::Rapier(world.add_joint(desc.kind, &a, &b, &frames, desc.params1))
            }
            (
                BackendInner::Rapier64(world),
                NativeShape::Rapier64(a),
                NativeShape::Rapier64(b),
            ) => JointInner::Rapier64(world.add_joint(desc.kind, &a, &b, &frames, desc.params1)),
            _ => return Err(JointError::SoftShape(desc.kind)),
        };

        Ok(JointId(self.joints.insert(JointSlot { desc: *desc, inner })))
    }

    /// Destroy a joint: removed from the owning world before the record is
    /// released, so an in-flight step never sees a dangling constraint.
    pub fn destroy_joint(&mut self, id: JointId) {
        let Some(slot) = self.joints.remove(id.0) else {
            return;
        };
        match (&mut self.backend, slot.inner) {
            (BackendInner::Rapier(world), JointInner::Rapier(handle)) => {
                world.remove_joint(handle)
            }
            (BackendInner::Rapier64(world), JointInner::Rapier64(handle)) => {
                world.remove_joint(handle)
            }
            _ => {}
        }
    }

    pub fn joint_descriptor(&self, id: JointId) -> Option<JointDescriptor> {
        self.joints.get(id.0).map(|slot| slot.desc)
    }

    pub fn shape_owner(&self, id: ShapeId) -> Option<ObjectId> {
        self.shapes.get(id.0).map(|slot| slot.owner)
    }

    pub fn shape_kind(&self, id: ShapeId) -> Option<ShapeKind> {
        self.shapes.get(id.0).map(|slot| slot.kind)
    }

    /// World transform of the *graphical* object: the backend's raw pose with
    /// the pivot composed back out.
    pub fn transform(&self, id: ShapeId) -> Transform {
        let Some(slot) = self.shapes.get(id.0) else {
            return Transform::identity();
        };
        let raw = raw_pose(&self.backend, slot);
        Transform::from_iso(&raw).mul(&slot.pivot_inv)
    }

    pub fn set_transform(&mut self, id: ShapeId, transform: &Transform) {
        let Some(slot) = self.shapes.get_mut(id.0) else {
            return;
        };
        let raw = transform.mul(&slot.pivot);
        match (&mut self.backend, &mut slot.inner) {
            (_, ShapeInner::Soft(soft)) => soft.set_transform(&raw),
            (BackendInner::Null(_), ShapeInner::Null(shape)) => shape.set_pose(raw.iso()),
            (BackendInner::Rapier(world), ShapeInner::Rapier(shape)) => {
                world.set_pose(shape, raw.iso())
            }
            (BackendInner::Rapier64(world), ShapeInner::Rapier64(shape)) => {
                world.set_pose(shape, raw.iso())
            }
            _ => debug_assert!(false, "shape variant does not match backend"),
        }
    }

    pub fn lin_velocity(&self, id: ShapeId) -> Vec3 {
        self.with_native(id, Vec3::zeros(), |world, shape| match (world, shape) {
            (BackendInner::Rapier(w), ShapeInner::Rapier(s)) => w.lin_velocity(s),
            (BackendInner::Rapier64(w), ShapeInner::Rapier64(s)) => w.lin_velocity(s),
            _ => Vec3::zeros(),
        })
    }

    pub fn set_lin_velocity(&mut self, id: ShapeId, velocity: Vec3) {
        self.with_native_mut(id, |world, shape| match (world, shape) {
            (BackendInner::Rapier(w), ShapeInner::Rapier(s)) => w.set_lin_velocity(s, velocity),
            (BackendInner::Rapier64(w), ShapeInner::Rapier64(s)) => w.set_lin_velocity(s, velocity),
            _ => {}
        })
    }

    pub fn ang_velocity(&self, id: ShapeId) -> Vec3 {
        self.with_native(id, Vec3::zeros(), |world, shape| match (world, shape) {
            (BackendInner::Rapier(w), ShapeInner::Rapier(s)) => w.ang_velocity(s),
            (BackendInner::Rapier64(w), ShapeInner::Rapier64(s)) => w.ang_velocity(s),
            _ => Vec3::zeros(),
        })
    }

    pub fn set_ang_velocity(&mut self, id: ShapeId, velocity: Vec3) {
        self.with_native_mut(id, |world, shape| match (world, shape) {
            (BackendInner::Rapier(w), ShapeInner::Rapier(s)) => w.set_ang_velocity(s, velocity),
            (BackendInner::Rapier64(w), ShapeInner::Rapier64(s)) => w.set_ang_velocity(s, velocity),
            _ => {}
        })
    }

    pub fn force(&self, id: ShapeId) -> Vec3 {
        self.with_native(id, Vec3::zeros(), |world, shape| match (world, shape) {
            (BackendInner::Rapier(w), ShapeInner::Rapier(s)) => w.force(s),
            (BackendInner::Rapier64(w), ShapeInner::Rapier64(s)) => w.force(s),
            _ => Vec3::zeros(),
        })
    }

    pub fn set_force(&mut self, id: ShapeId, force: Vec3) {
        self.with_native_mut(id, |world, shape| match (world, shape) {
            (BackendInner::Rapier(w), ShapeInner::Rapier(s)) => w.set_force(s, force),
            (BackendInner::Rapier64(w), ShapeInner::Rapier64(s)) => w.set_force(s, force),
            _ => {}
        })
    }

    pub fn torque(&self, id: ShapeId) -> Vec3 {
        self.with_native(id, Vec3::zeros(), |world, shape| match (world, shape) {
            (BackendInner::Rapier(w), ShapeInner::Rapier(s)) => w.torque(s),
            (BackendInner::Rapier64(w), ShapeInner::Rapier64(s)) => w.torque(s),
            _ => Vec3::zeros(),
        })
    }

    pub fn set_torque(&mut self, id: ShapeId, torque: Vec3) {
        self.with_native_mut(id, |world, shape| match (world, shape) {
            (BackendInner::Rapier(w), ShapeInner::Rapier(s)) => w.set_torque(s, torque),
            (BackendInner::Rapier64(w), ShapeInner::Rapier64(s)) => w.set_torque(s, torque),
            _ => {}
        })
    }

    /// Accumulate a force through the center of mass.
    pub fn add_force(&mut self, id: ShapeId, force: Vec3) {
        self.with_native_mut(id, |world, shape| match (world, shape) {
            (BackendInner::Rapier(w), ShapeInner::Rapier(s)) => w.add_force(s, force),
            (BackendInner::Rapier64(w), ShapeInner::Rapier64(s)) => w.add_force(s, force),
            _ => {}
        })
    }

    /// Accumulate a force applied at a world position; the offset from the
    /// center of mass contributes torque.
    pub fn add_force_at(&mut self, id: ShapeId, force: Vec3, world_pos: Vec3) {
        self.with_native_mut(id, |world, shape| match (world, shape) {
            (BackendInner::Rapier(w), ShapeInner::Rapier(s)) => w.add_force_at(s, force, world_pos),
            (BackendInner::Rapier64(w), ShapeInner::Rapier64(s)) => {
                w.add_force_at(s, force, world_pos)
            }
            _ => {}
        })
    }

    /// Clear accumulated force/torque/velocity without destroying the shape.
    pub fn reset_shape(&mut self, id: ShapeId) {
        self.with_native_mut(id, |world, shape| match (world, shape) {
            (BackendInner::Rapier(w), ShapeInner::Rapier(s)) => w.reset(s),
            (BackendInner::Rapier64(w), ShapeInner::Rapier64(s)) => w.reset(s),
            _ => {}
        })
    }

    /// Toggle collision participation. Always succeeds; disabling also
    /// suppresses ray casts against the shape.
    pub fn set_enabled(&mut self, id: ShapeId, enabled: bool) {
        let Some(slot) = self.shapes.get_mut(id.0) else {
            return;
        };
        slot.enabled = enabled;
        match (&mut self.backend, &mut slot.inner) {
            (BackendInner::Rapier(world), ShapeInner::Rapier(shape)) => {
                world.set_enabled(shape, enabled)
            }
            (BackendInner::Rapier64(world), ShapeInner::Rapier64(shape)) => {
                world.set_enabled(shape, enabled)
            }
            _ => {}
        }
    }

    pub fn is_enabled(&self, id: ShapeId) -> bool {
        self.shapes.get(id.0).map(|slot| slot.enabled).unwrap_or(false)
    }

    /// Sleep-state control, independent of enabled/disabled.
    pub fn set_active(&mut self, id: ShapeId, active: bool) {
        let Some(slot) = self.shapes.get_mut(id.0) else {
            return;
        };
        slot.active = active;
        match (&mut self.backend, &mut slot.inner) {
            (BackendInner::Rapier(world), ShapeInner::Rapier(shape)) => {
                world.set_active(shape, active)
            }
            (BackendInner::Rapier64(world), ShapeInner::Rapier64(shape)) => {
                world.set_active(shape, active)
            }
            _ => {}
        }
    }

    pub fn is_active(&self, id: ShapeId) -> bool {
        let Some(slot) = self.shapes.get(id.0) else {
            return false;
        };
        match (&self.backend, &slot.inner) {
            (BackendInner::Rapier(world), ShapeInner::Rapier(shape)) => world.is_active(shape),
            (BackendInner::Rapier64(world), ShapeInner::Rapier64(shape)) => world.is_active(shape),
            _ => slot.active,
        }
    }

    /// Object-local ray test. Disabled shapes never report hits.
    pub fn cast_ray(&self, id: ShapeId, start: Vec3, end: Vec3) -> Option<RayHit> {
        let slot = self.shapes.get(id.0)?;
        if !slot.enabled {
            return None;
        }
        match (&self.backend, &slot.inner) {
            (_, ShapeInner::Soft(soft)) => soft.cast_ray(start, end),
            (BackendInner::Null(_), ShapeInner::Null(shape)) => shape.cast_ray(start, end),
            (BackendInner::Rapier(world), ShapeInner::Rapier(shape)) => {
                world.cast_ray(shape, start, end)
            }
            (BackendInner::Rapier64(world), ShapeInner::Rapier64(shape)) => {
                world.cast_ray(shape, start, end)
            }
            _ => None,
        }
    }

    /// Number of vertices of a soft shape; zero for rigid shapes.
    pub fn nodes_num(&self, id: ShapeId) -> usize {
        match self.shapes.get(id.0).map(|slot| &slot.inner) {
            Some(ShapeInner::Soft(soft)) => soft.nodes_num(),
            _ => 0,
        }
    }

    /// World position of a soft shape vertex.
    pub fn node_pos(&self, id: ShapeId, index: usize) -> Vec3 {
        match self.shapes.get(id.0).map(|slot| &slot.inner) {
            Some(ShapeInner::Soft(soft)) => soft.node_pos(index),
            _ => {
                debug_assert!(false, "node_pos queried on a rigid shape");
                Vec3::zeros()
            }
        }
    }

    fn with_native<R>(
        &self,
        id: ShapeId,
        default: R,
        f: impl FnOnce(&BackendInner, &ShapeInner) -> R,
    ) -> R {
        match self.shapes.get(id.0) {
            Some(slot) => f(&self.backend, &slot.inner),
            None => default,
        }
    }

    fn with_native_mut(&mut self, id: ShapeId, f: impl FnOnce(&mut BackendInner, &mut ShapeInner)) {
        if let Some(slot) = self.shapes.get_mut(id.0) {
            f(&mut self.backend, &mut slot.inner);
        }
    }

    /// Raw physical pose + copyable native handle, for joint construction.
    fn native_ref(&self, id: ShapeId) -> Option<(Iso, NativeShape)> {
        let slot = self.shapes.get(id.0)?;
        let pose = raw_pose(&self.backend, slot);
        let native = match &slot.inner {
            ShapeInner::Null(_) => NativeShape::Null,
            ShapeInner::Rapier(shape) => NativeShape::Rapier(*shape),
            ShapeInner::Rapier64(shape) => NativeShape::Rapier64(*shape),
            ShapeInner::Soft(_) => NativeShape::Soft,
        };
        Some((pose, native))
    }
}

/// Copyable view of a slot's native handles, used while the backend is
/// borrowed mutably during joint construction.
#[derive(Clone, Copy)]
enum NativeShape {
    Null,
    Rapier(RapierShape),
    Rapier64(Rapier64Shape),
    Soft,
}

fn raw_pose(backend: &BackendInner, slot: &ShapeSlot) -> Iso {
    match (backend, &slot.inner) {
        (_, ShapeInner::Soft(soft)) => soft.transform().iso(),
        (BackendInner::Null(_), ShapeInner::Null(shape)) => shape.pose(),
        (BackendInner::Rapier(world), ShapeInner::Rapier(shape)) => world.pose(shape),
        (BackendInner::Rapier64(world), ShapeInner::Rapier64(shape)) => world.pose(shape),
        _ => {
            debug_assert!(false, "shape variant does not match backend");
            Iso::identity()
        }
    }
}
