/*!
Body binding: one game object's grip on one shape.

Covers both rigid and soft bodies (the descriptor's shape kind routes
construction; everything this module owns (replication, interpolation,
contact recording) is identical for the two.

Per-tick state machine
- *simulate* (server): read the authoritative pose back from the shape and
  raise replication dirty bits for components that moved past the
  datablock's minimum deltas.
- *interpolate* (client): blend from the previous received pose toward the
  newest one over the configured window and push the blended pose into the
  local shape for rendering only; it is never fed back as authoritative
  state.
*/

use crate::backend::PhysicsWorld;
use crate::constants::INTERPOLATION_WINDOW_S;
use crate::contact::ContactEvent;
use crate::descriptor::{BodyData, ObjectId, ShapeDescriptor, ShapeId, ShapeKind};
use crate::mask::{DirtyBit, ReplicationMask};
use crate::math::{Quat, Transform, Vec3};
use crate::wire::{BitReader, BitWriter};

/// Full replicated state of one body.
#[derive(Clone, Copy, Debug)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
    pub lin_velocity: Vec3,
    pub ang_velocity: Vec3,
    pub force: Vec3,
    pub torque: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            lin_velocity: Vec3::zeros(),
            ang_velocity: Vec3::zeros(),
            force: Vec3::zeros(),
            torque: Vec3::zeros(),
        }
    }
}

impl Pose {
    pub fn transform(&self) -> Transform {
        Transform::new(self.position, self.rotation)
    }

    /// Body-level wire block, shared verbatim by ragdoll bone replication.
    ///
    /// Layout: 1 bit enabled; if set, 1 bit active and 1 bit transitioning;
    /// the pose payload follows only while active or transitioning (a body
    /// at rest costs three bits).
    pub fn write(&self, writer: &mut BitWriter, flags: PoseFlags) {
        writer.write_bool(flags.enabled);
        if !flags.enabled {
            return;
        }
        writer.write_bool(flags.active);
        writer.write_bool(flags.transitioning);
        if !flags.active && !flags.transitioning {
            return;
        }
        writer.write_vec3(self.position);
        writer.write_quat(self.rotation);
        writer.write_vec3(self.force);
        writer.write_vec3(self.torque);
        writer.write_vec3(self.lin_velocity);
        writer.write_vec3(self.ang_velocity);
    }

    /// Inverse of [`Pose::write`]. Returns the decoded flags and, when the
    /// payload was present, the pose.
    pub fn read(reader: &mut BitReader<'_>) -> (PoseFlags, Option<Pose>) {
        let enabled = reader.read_bool();
        if !enabled {
            return (PoseFlags::disabled(), None);
        }
        let active = reader.read_bool();
        let transitioning = reader.read_bool();
        let flags = PoseFlags {
            enabled,
            active,
            transitioning,
        };
        if !active && !transitioning {
            return (flags, None);
        }
        let pose = Pose {
            position: reader.read_vec3(),
            rotation: reader.read_quat(),
            force: reader.read_vec3(),
            torque: reader.read_vec3(),
            lin_velocity: reader.read_vec3(),
            ang_velocity: reader.read_vec3(),
        };
        (flags, Some(pose))
    }
}

/// The three gating bits of the wire block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoseFlags {
    pub enabled: bool,
    pub active: bool,
    /// Set for exactly one update when the body falls asleep, so the final
    /// rest pose still reaches clients.
    pub transitioning: bool,
}

impl PoseFlags {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            active: false,
            transitioning: false,
        }
    }
}

/// Client-side interpolation delta: previous/current received pose plus the
/// blend clock.
#[derive(Clone, Copy, Debug)]
struct InterpState {
    prev: Transform,
    next: Transform,
    clock: f32,
    window: f32,
}

impl InterpState {
    fn at(pose: Transform) -> Self {
        Self {
            prev: pose,
            next: pose,
            clock: 0.0,
            window: INTERPOLATION_WINDOW_S,
        }
    }

    fn push(&mut self, target: Transform) {
        self.prev = self.blended();
        self.next = target;
        self.clock = 0.0;
    }

    fn blended(&self) -> Transform {
        if self.window <= f32::EPSILON {
            return self.next;
        }
        self.prev.blend(&self.next, self.clock / self.window)
    }
}

pub struct BodyBinding {
    object: ObjectId,
    data: BodyData,
    shape: Option<ShapeId>,
    /// Last replicated authoritative state (server) / last received (client).
    replicated: Pose,
    flags: PoseFlags,
    mask: ReplicationMask,
    interp: InterpState,
    /// Most significant (highest relative speed) contact of the current tick.
    best_contact: Option<ContactEvent>,
    hard_contact: bool,
}

impl BodyBinding {
    pub fn new(object: ObjectId, data: BodyData) -> Self {
        Self {
            object,
            data,
            shape: None,
            replicated: Pose::default(),
            flags: PoseFlags {
                enabled: true,
                active: true,
                transitioning: false,
            },
            mask: ReplicationMask::default(),
            interp: InterpState::at(Transform::identity()),
            best_contact: None,
            hard_contact: false,
        }
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn shape(&self) -> Option<ShapeId> {
        self.shape
    }

    pub fn is_dirty(&self) -> bool {
        self.mask.any()
    }

    /// Build this object's shape from its datablock at the given spawn
    /// transform.
    ///
    /// An unsupported or invalid geometry kind is recoverable: the object
    /// falls back to a primitive bounding box and keeps running.
    pub fn create_shape(&mut self, world: &mut PhysicsWorld, transform: Transform) {
        let desc = ShapeDescriptor::new(
            self.data.shape,
            self.data.dimensions,
            self.data.mass,
            self.object,
        )
        .with_transform(transform)
        .with_pivot(self.data.pivot);

        match world.create_shape(&desc) {
            Ok(id) => self.shape = Some(id),
            Err(err) => {
                log::warn!(
                    "object {}: shape kind {:?} rejected ({err}); falling back to a bounding box",
                    self.object,
                    self.data.shape
                );
                let fallback = ShapeDescriptor::new(
                    ShapeKind::Box,
                    self.data.dimensions,
                    self.data.mass,
                    self.object,
                )
                .with_transform(transform)
                .with_pivot(self.data.pivot);
                match world.create_shape(&fallback) {
                    Ok(id) => self.shape = Some(id),
                    Err(err) => {
                        log::error!("object {}: bounding-box fallback failed ({err})", self.object);
                        self.shape = None;
                    }
                }
            }
        }
        // Interpolation starts from the spawn pose, not the origin.
        self.interp = InterpState::at(transform);
    }

    /// Build a soft shape from the object's graphical mesh vertices.
    /// `pinned` lists attachment vertex indices; it may be empty.
    pub fn create_shape_soft(
        &mut self,
        world: &mut PhysicsWorld,
        transform: Transform,
        vertices: Vec<Vec3>,
        pinned: Vec<u32>,
    ) {
        let mut desc = ShapeDescriptor::new(
            ShapeKind::SoftMesh,
            self.data.dimensions,
            self.data.mass,
            self.object,
        )
        .with_transform(transform)
        .with_pivot(self.data.pivot);
        desc.vertices = vertices;
        desc.pinned = pinned;

        match world.create_shape_soft(&desc) {
            Ok(id) => self.shape = Some(id),
            Err(err) => {
                log::warn!("object {}: soft shape rejected ({err})", self.object);
                self.shape = None;
            }
        }
        self.interp = InterpState::at(transform);
    }

    pub fn destroy(&mut self, world: &mut PhysicsWorld) {
        if let Some(id) = self.shape.take() {
            world.destroy_shape(id);
        }
    }

    /// Authoritative server tick: read back shape state and raise dirty bits
    /// for anything that moved past the datablock's minimum deltas.
    pub fn server_tick(&mut self, world: &PhysicsWorld) {
        self.best_contact = None;
        self.hard_contact = false;

        let Some(id) = self.shape else {
            return;
        };

        let t = world.transform(id);
        if (t.translation - self.replicated.position).norm() > self.data.min_position_delta {
            self.mask.add(DirtyBit::Position);
        }
        if t.rotation.angle_to(&self.replicated.rotation) > self.data.min_rotation_delta {
            self.mask.add(DirtyBit::Rotation);
        }

        let lin = world.lin_velocity(id);
        let ang = world.ang_velocity(id);
        if (lin - self.replicated.lin_velocity).norm() > self.data.min_velocity_delta
            || (ang - self.replicated.ang_velocity).norm() > self.data.min_velocity_delta
        {
            self.mask.add(DirtyBit::Velocity);
        }

        let force = world.force(id);
        let torque = world.torque(id);
        if (force - self.replicated.force).norm() > f32::EPSILON
            || (torque - self.replicated.torque).norm() > f32::EPSILON
        {
            self.mask.add(DirtyBit::Forces);
        }

        let enabled = world.is_enabled(id);
        let active = world.is_active(id);
        let transitioning = self.flags.active && !active;
        if enabled != self.flags.enabled || active != self.flags.active || transitioning {
            self.mask.add(DirtyBit::Flags);
        }
        self.flags = PoseFlags {
            enabled,
            active,
            transitioning,
        };
    }

    /// Write the current authoritative state and clear the dirty mask.
    pub fn pack_update(&mut self, world: &PhysicsWorld, writer: &mut BitWriter) {
        let pose = match self.shape {
            Some(id) => {
                let t = world.transform(id);
                Pose {
                    position: t.translation,
                    rotation: t.rotation,
                    lin_velocity: world.lin_velocity(id),
                    ang_velocity: world.ang_velocity(id),
                    force: world.force(id),
                    torque: world.torque(id),
                }
            }
            None => self.replicated,
        };

        pose.write(writer, self.flags);
        self.replicated = pose;
        self.mask.clear();
    }

    /// Ingest one authoritative update on the client side. The previous
    /// received pose becomes the blend source; the new one the blend target.
    pub fn unpack_update(&mut self, world: &mut PhysicsWorld, reader: &mut BitReader<'_>) {
        let (flags, pose) = Pose::read(reader);
        self.flags = flags;

        if let Some(id) = self.shape {
            world.set_enabled(id, flags.enabled);
        }
        let Some(pose) = pose else {
            return;
        };

        self.replicated = pose;
        self.interp.push(pose.transform());
    }

    /// Client tick while not locally simulating: advance the blend clock and
    /// push the blended pose into the local shape for rendering.
    pub fn client_tick(&mut self, world: &mut PhysicsWorld, dt: f32) {
        let Some(id) = self.shape else {
            return;
        };
        self.interp.clock = (self.interp.clock + dt).min(self.interp.window);
        world.set_transform(id, &self.interp.blended());
    }

    /// Contact delivery point for the router. Records the most significant
    /// contact of the tick and raises the hard-contact flag used by the
    /// surrounding game logic's damage hooks.
    pub fn on_contact(&mut self, event: ContactEvent) {
        let speed = event.relative_velocity.norm();
        if speed >= self.data.hard_contact_speed {
            self.hard_contact = true;
        }
        let keep = match &self.best_contact {
            Some(best) => speed > best.relative_velocity.norm(),
            None => true,
        };
        if keep {
            self.best_contact = Some(event);
        }
    }

    pub fn best_contact(&self) -> Option<&ContactEvent> {
        self.best_contact.as_ref()
    }

    pub fn had_hard_contact(&self) -> bool {
        self.hard_contact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, PhysicsWorld, WorldOptions};
    use nalgebra as na;

    fn null_world() -> PhysicsWorld {
        PhysicsWorld::try_create(BackendKind::Null, &WorldOptions::default(), true).unwrap()
    }

    fn sample_pose() -> Pose {
        Pose {
            position: Vec3::new(1.0, -2.0, 3.0),
            rotation: Quat::from_euler_angles(0.2, 0.4, -0.6),
            lin_velocity: Vec3::new(0.5, 0.0, -1.5),
            ang_velocity: Vec3::new(0.0, 2.0, 0.0),
            force: Vec3::new(10.0, 0.0, 0.0),
            torque: Vec3::new(0.0, 0.0, 4.0),
        }
    }

    fn active_flags() -> PoseFlags {
        PoseFlags {
            enabled: true,
            active: true,
            transitioning: false,
        }
    }

    #[test]
    fn pose_wire_round_trip() {
        let pose = sample_pose();
        let mut writer = BitWriter::new();
        pose.write(&mut writer, active_flags());
        let bytes = writer.into_bytes();

        let (flags, decoded) = Pose::read(&mut BitReader::new(&bytes));
        let decoded = decoded.expect("payload present");

        assert_eq!(flags, active_flags());
        assert!((decoded.position - pose.position).norm() < 1.0e-6);
        assert!(decoded.rotation.angle_to(&pose.rotation) < 0.01);
        assert!((decoded.lin_velocity - pose.lin_velocity).norm() < 1.0e-6);
        assert!((decoded.ang_velocity - pose.ang_velocity).norm() < 1.0e-6);
        assert!((decoded.force - pose.force).norm() < 1.0e-6);
        assert!((decoded.torque - pose.torque).norm() < 1.0e-6);
    }

    #[test]
    fn disabled_body_costs_one_bit() {
        let mut writer = BitWriter::new();
        sample_pose().write(&mut writer, PoseFlags::disabled());
        assert_eq!(writer.bit_len(), 1);
    }

    #[test]
    fn inactive_body_costs_three_bits() {
        let mut writer = BitWriter::new();
        let flags = PoseFlags {
            enabled: true,
            active: false,
            transitioning: false,
        };
        sample_pose().write(&mut writer, flags);
        assert_eq!(writer.bit_len(), 3);

        let bytes = writer.into_bytes();
        let (decoded_flags, pose) = Pose::read(&mut BitReader::new(&bytes));
        assert_eq!(decoded_flags, flags);
        assert!(pose.is_none());
    }

    #[test]
    fn server_tick_marks_moved_bodies_dirty() {
        let mut world = null_world();
        let mut body = BodyBinding::new(42, BodyData::default());
        body.create_shape(&mut world, Transform::identity());
        assert!(body.shape().is_some());

        // First tick: spawn pose matches the default replicated pose.
        body.server_tick(&world);
        assert!(!body.is_dirty());

        world.set_transform(
            body.shape().unwrap(),
            &Transform::from_translation(Vec3::new(1.0, 0.0, 0.0)),
        );
        body.server_tick(&world);
        assert!(body.is_dirty());
    }

    #[test]
    fn pack_then_unpack_reproduces_the_pose() {
        let mut server_world = null_world();
        let mut server_body = BodyBinding::new(42, BodyData::default());
        server_body.create_shape(&mut server_world, Transform::identity());

        let target = Transform::new(
            Vec3::new(3.0, 1.0, -2.0),
            Quat::from_axis_angle(&na::Vector3::z_axis(), 0.8),
        );
        server_world.set_transform(server_body.shape().unwrap(), &target);
        server_body.server_tick(&server_world);
        assert!(server_body.is_dirty());

        let mut writer = BitWriter::new();
        server_body.pack_update(&server_world, &mut writer);
        assert!(!server_body.is_dirty());
        let bytes = writer.into_bytes();

        let mut client_world =
            PhysicsWorld::try_create(BackendKind::Null, &WorldOptions::default(), false).unwrap();
        let mut client_body = BodyBinding::new(42, BodyData::default());
        client_body.create_shape(&mut client_world, Transform::identity());
        client_body.unpack_update(&mut client_world, &mut BitReader::new(&bytes));

        // After a full interpolation window the client shape sits on the
        // received pose.
        client_body.client_tick(&mut client_world, INTERPOLATION_WINDOW_S);
        let applied = client_world.transform(client_body.shape().unwrap());
        assert!((applied.translation - target.translation).norm() < 1.0e-4);
        assert!(applied.rotation.angle_to(&target.rotation) < 0.01);
    }

    #[test]
    fn client_blend_passes_through_the_midpoint() {
        let mut world =
            PhysicsWorld::try_create(BackendKind::Null, &WorldOptions::default(), false).unwrap();
        let mut body = BodyBinding::new(1, BodyData::default());
        body.create_shape(&mut world, Transform::identity());

        let target = Pose {
            position: Vec3::new(2.0, 0.0, 0.0),
            ..Pose::default()
        };
        let mut writer = BitWriter::new();
        target.write(&mut writer, active_flags());
        let bytes = writer.into_bytes();
        body.unpack_update(&mut world, &mut BitReader::new(&bytes));

        body.client_tick(&mut world, INTERPOLATION_WINDOW_S * 0.5);
        let mid = world.transform(body.shape().unwrap());
        assert!((mid.translation - Vec3::new(1.0, 0.0, 0.0)).norm() < 1.0e-4);
    }

    #[test]
    fn unsupported_shape_kind_falls_back_to_a_bounding_box() {
        let mut world =
            PhysicsWorld::try_create(BackendKind::Rapier, &WorldOptions::default(), true).unwrap();
        // A dynamic triangle mesh is refused by the rapier backends.
        let data = BodyData {
            shape: ShapeKind::TriangleMesh,
            mass: 5.0,
            ..BodyData::default()
        };
        let mut body = BodyBinding::new(9, data);
        body.create_shape(&mut world, Transform::identity());

        let shape = body.shape().expect("fallback shape exists");
        assert_eq!(world.shape_kind(shape), Some(ShapeKind::Box));
    }

    #[test]
    fn soft_binding_exposes_its_vertices() {
        let mut world = null_world();
        let mut body = BodyBinding::new(3, BodyData::default());
        body.create_shape_soft(
            &mut world,
            Transform::from_translation(Vec3::new(1.0, 0.0, 0.0)),
            vec![Vec3::zeros(), Vec3::new(0.0, 0.0, 1.0)],
            vec![],
        );

        let shape = body.shape().expect("soft shape exists");
        assert_eq!(world.nodes_num(shape), 2);
        assert_eq!(world.shape_kind(shape), Some(ShapeKind::SoftMesh));
    }

    #[test]
    fn on_contact_keeps_the_most_significant_contact() {
        let mut body = BodyBinding::new(1, BodyData::default());
        let slow = ContactEvent {
            owner: 1,
            other: Some(2),
            shape: ShapeId(crate::arena::SlotHandle::INVALID),
            position: Vec3::zeros(),
            normal: Vec3::z(),
            relative_velocity: Vec3::new(0.0, 0.0, -1.0),
        };
        let fast = ContactEvent {
            relative_velocity: Vec3::new(0.0, 0.0, -6.0),
            ..slow
        };

        body.on_contact(slow);
        body.on_contact(fast);
        body.on_contact(slow);

        let best = body.best_contact().expect("recorded");
        assert!((best.relative_velocity.norm() - 6.0).abs() < 1.0e-6);
        // 6 m/s exceeds the default hard-contact threshold.
        assert!(body.had_hard_contact());
    }
}
