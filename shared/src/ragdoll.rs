/*!
Ragdoll binding: an articulated shape/joint network mirroring a skeleton.

One [`BoneEntry`] per simulated skeletal node. The entries form a tree
isomorphic to the skeleton's bone hierarchy: every non-root bone's joint
connects its shape to its parent bone's shape, and the root bone has no
joint.

Lifecycle
- Activation walks the datablock root-to-leaf: each bone's world pivot is
  derived from the skeleton's current pose, its shape is created there, and
  non-root bones are jointed to their (already created) parent's shape. A
  joint therefore always observes both shapes' finalized transforms.
- Deactivation mirrors activation leaf-to-root, joints strictly before
  shapes, and restores the skeleton's pre-activation local transforms
  verbatim.

Per-tick reconciliation walks parent-to-child and recomputes each bone's
local transform against its parent's *already updated* world transform, so
a root displacement propagates the whole chain in a single tick instead of
cascading one level per frame. Each bone is marked calculated exactly once,
before its children are visited.
*/

use crate::backend::PhysicsWorld;
use crate::descriptor::{
    JointDescriptor, JointId, ObjectId, RagdollData, ShapeDescriptor, ShapeId,
};
use crate::math::{Quat, Transform, Vec3};
use crate::skeleton::Skeleton;
use crate::wire::{BitReader, BitWriter};

use crate::body::{Pose, PoseFlags};

/// Per-bone record binding a skeletal node to its shape, joint and pivots.
pub struct BoneEntry {
    /// Index into the datablock's bone list.
    pub bone_index: usize,
    /// Skeletal node this bone drives.
    pub node_index: usize,
    /// Index of the parent bone entry; `None` for the root bone.
    pub parent_bone: Option<usize>,
    pub shape: ShapeId,
    /// `None` exactly for the root bone.
    pub joint: Option<JointId>,
    /// Fixed graphical-to-physical pivot and its inverse.
    pub pivot: Transform,
    pub pivot_inv: Transform,
    /// The node's local transform at activation time, restored verbatim on
    /// deactivation.
    saved_local: Transform,
    /// `true`: physics drives the skeleton. `false`: the animated skeleton
    /// drives the (kinematic) shape.
    pub dynamic: bool,
    prev_position: Vec3,
    cur_position: Vec3,
    prev_rotation: Quat,
    cur_rotation: Quat,
}

impl BoneEntry {
    /// Blend between the previous and current reconciled world pose, for
    /// render-side smoothing between fixed ticks.
    pub fn blend_pose(&self, t: f32) -> Transform {
        Transform::new(self.prev_position, self.prev_rotation)
            .blend(&Transform::new(self.cur_position, self.cur_rotation), t)
    }
}

pub struct RagdollBinding {
    object: ObjectId,
    data: RagdollData,
    bones: Vec<BoneEntry>,
    enabled: bool,
    /// Scratch: per-bone "calculated this tick" marks and reconciled worlds.
    calculated: Vec<bool>,
    world_pose: Vec<Transform>,
}

impl RagdollBinding {
    pub fn new(object: ObjectId, data: RagdollData) -> Self {
        Self {
            object,
            data,
            bones: Vec::new(),
            enabled: false,
            calculated: Vec::new(),
            world_pose: Vec::new(),
        }
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn bones(&self) -> &[BoneEntry] {
        &self.bones
    }

    /// Switch one bone between physics-driven and animation-driven.
    pub fn set_bone_dynamic(&mut self, bone: usize, dynamic: bool) {
        if let Some(entry) = self.bones.get_mut(bone) {
            entry.dynamic = dynamic;
        }
    }

    /// Build the whole shape/joint network from the skeleton's current pose.
    ///
    /// Bones whose node or parent entry cannot be resolved are skipped with a
    /// warning; the surviving entries still form a valid tree.
    pub fn activate(&mut self, world: &mut PhysicsWorld, skeleton: &Skeleton) {
        if self.enabled {
            return;
        }

        for (bone_index, bone) in self.data.bones.clone().iter().enumerate() {
            let Some(node_index) = skeleton.find(&bone.node_name) else {
                log::warn!(
                    "ragdoll {}: skeleton has no node {:?}; bone skipped",
                    self.object,
                    bone.node_name
                );
                continue;
            };

            let parent_bone = if bone.is_root() {
                None
            } else {
                match self.find_bone_by_node_name(skeleton, &bone.parent_name) {
                    Some(parent) => Some(parent),
                    None => {
                        log::warn!(
                            "ragdoll {}: parent {:?} of bone {:?} was not created; bone skipped",
                            self.object,
                            bone.parent_name,
                            bone.node_name
                        );
                        continue;
                    }
                }
            };

            let node_world = skeleton.world_transform(node_index);
            let pivot = bone.pivot();

            let desc = ShapeDescriptor::new(bone.shape, bone.size, bone.mass, self.object)
                .with_transform(node_world)
                .with_pivot(pivot);
            let shape = match world.create_shape(&desc) {
                Ok(shape) => shape,
                Err(err) => {
                    log::warn!(
                        "ragdoll {}: bone {:?} shape rejected ({err}); bone skipped",
                        self.object,
                        bone.node_name
                    );
                    continue;
                }
            };

            let joint = match parent_bone {
                None => None,
                Some(parent) => {
                    let parent_shape = self.bones[parent].shape;
                    let axis = node_world.rotation * Vec3::z();
                    let desc = JointDescriptor::new(
                        bone.joint,
                        shape,
                        parent_shape,
                        node_world.translation,
                    )
                    .with_axis(axis)
                    .with_params(bone.params1, bone.params2);

                    match world.create_joint(&desc) {
                        Ok(joint) => Some(joint),
                        Err(err) => {
                            log::warn!(
                                "ragdoll {}: joint for bone {:?} rejected ({err})",
                                self.object,
                                bone.node_name
                            );
                            None
                        }
                    }
                }
            };

            self.bones.push(BoneEntry {
                bone_index,
                node_index,
                parent_bone,
                shape,
                joint,
                pivot,
                pivot_inv: pivot.inverse(),
                saved_local: skeleton.local(node_index),
                dynamic: true,
                prev_position: node_world.translation,
                cur_position: node_world.translation,
                prev_rotation: node_world.rotation,
                cur_rotation: node_world.rotation,
            });
        }

        self.calculated = vec![false; self.bones.len()];
        self.world_pose = vec![Transform::identity(); self.bones.len()];
        self.enabled = !self.bones.is_empty();
    }

    /// Tear the network down, mirroring activation in reverse: leaf-to-root,
    /// each bone's joint before its shape, then restore the skeleton's
    /// pre-activation pose exactly.
    pub fn deactivate(&mut self, world: &mut PhysicsWorld, skeleton: &mut Skeleton) {
        for entry in self.bones.iter().rev() {
            if let Some(joint) = entry.joint {
                world.destroy_joint(joint);
            }
            world.destroy_shape(entry.shape);
        }
        for entry in &self.bones {
            skeleton.set_local(entry.node_index, entry.saved_local);
        }
        self.bones.clear();
        self.calculated.clear();
        self.world_pose.clear();
        self.enabled = false;
    }

    /// Per-tick reconciliation between the constraint network and the
    /// skeleton.
    ///
    /// For every bone, parent first: take the bone's world transform from its
    /// shape (dynamic) or from the animated pose under its *already updated*
    /// parent (kinematic), write the resulting local transform back into the
    /// skeleton, and push kinematic poses into the physics side. Entries are
    /// stored root-first, so a single forward pass visits parents before
    /// children; the calculated marks assert that each bone is computed
    /// exactly once per tick.
    pub fn update_ragdoll(&mut self, world: &mut PhysicsWorld, skeleton: &mut Skeleton) {
        if !self.enabled {
            return;
        }

        self.calculated.fill(false);

        for i in 0..self.bones.len() {
            debug_assert!(!self.calculated[i], "bone {i} reconciled twice in one tick");

            let parent_world = match self.bones[i].parent_bone {
                Some(p) => {
                    debug_assert!(self.calculated[p], "parent of bone {i} not yet reconciled");
                    Some(self.world_pose[p])
                }
                None => None,
            };

            // Mark before any child can observe this bone.
            self.calculated[i] = true;

            let entry = &self.bones[i];
            let bone_world = if entry.dynamic {
                world.transform(entry.shape)
            } else {
                let animated_local = skeleton.local(entry.node_index);
                match parent_world {
                    Some(parent) => parent.mul(&animated_local),
                    None => animated_local,
                }
            };

            let local = match parent_world {
                Some(parent) => parent.inverse().mul(&bone_world),
                None => bone_world,
            };
            skeleton.set_local(entry.node_index, local);

            if !entry.dynamic {
                world.set_transform(entry.shape, &bone_world);
            }

            self.world_pose[i] = bone_world;
            let entry = &mut self.bones[i];
            entry.prev_position = entry.cur_position;
            entry.prev_rotation = entry.cur_rotation;
            entry.cur_position = bone_world.translation;
            entry.cur_rotation = bone_world.rotation;
        }
    }

    /// Batch the whole ragdoll into the wire stream: one shared enabled bit,
    /// then the body-level block per bone in bone-index order. An
    /// all-disabled ragdoll costs one bit.
    pub fn pack_update(&self, world: &PhysicsWorld, writer: &mut BitWriter) {
        writer.write_bool(self.enabled);
        if !self.enabled {
            return;
        }
        for entry in &self.bones {
            let t = world.transform(entry.shape);
            let pose = Pose {
                position: t.translation,
                rotation: t.rotation,
                lin_velocity: world.lin_velocity(entry.shape),
                ang_velocity: world.ang_velocity(entry.shape),
                force: world.force(entry.shape),
                torque: world.torque(entry.shape),
            };
            let flags = PoseFlags {
                enabled: true,
                active: world.is_active(entry.shape),
                transitioning: false,
            };
            pose.write(writer, flags);
        }
    }

    /// Inverse of [`RagdollBinding::pack_update`], applied to the local
    /// (client) shapes. Bone count and order come from this side's activation
    /// and must match the packer's; both derive from the same datablock.
    pub fn unpack_update(&mut self, world: &mut PhysicsWorld, reader: &mut BitReader<'_>) {
        if !reader.read_bool() {
            return;
        }
        for entry in &self.bones {
            let (_, pose) = Pose::read(reader);
            let Some(pose) = pose else {
                continue;
            };
            world.set_transform(entry.shape, &pose.transform());
            world.set_lin_velocity(entry.shape, pose.lin_velocity);
            world.set_ang_velocity(entry.shape, pose.ang_velocity);
        }
    }

    fn find_bone_by_node_name(&self, skeleton: &Skeleton, name: &str) -> Option<usize> {
        let node = skeleton.find(name)?;
        self.bones.iter().position(|b| b.node_index == node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, PhysicsWorld, WorldOptions};
    use crate::descriptor::{JointKind, RagdollBoneData, ShapeKind};

    fn chain_skeleton() -> Skeleton {
        Skeleton::new(vec![
            (
                "pelvis".into(),
                None,
                Transform::from_translation(Vec3::new(0.0, 0.0, 1.0)),
            ),
            (
                "spine".into(),
                Some(0),
                Transform::from_translation(Vec3::new(0.0, 0.0, 0.4)),
            ),
            (
                "head".into(),
                Some(1),
                Transform::from_translation(Vec3::new(0.0, 0.0, 0.3)),
            ),
        ])
    }

    fn bone(node: &str, parent: &str, joint: JointKind) -> RagdollBoneData {
        RagdollBoneData {
            node_name: node.into(),
            parent_name: parent.into(),
            size: Vec3::new(0.08, 0.08, 0.15),
            mass: 2.0,
            offset: Vec3::zeros(),
            rotation: Vec3::zeros(),
            shape: ShapeKind::Capsule,
            joint,
            params1: Vec3::new(0.4, 0.4, 0.2),
            params2: Vec3::zeros(),
        }
    }

    fn chain_data() -> RagdollData {
        RagdollData {
            bones: vec![
                bone("pelvis", "", JointKind::BallSocket),
                bone("spine", "pelvis", JointKind::ConeTwist),
                bone("head", "spine", JointKind::ConeTwist),
            ],
        }
    }

    fn null_world() -> PhysicsWorld {
        PhysicsWorld::try_create(BackendKind::Null, &WorldOptions::default(), true).unwrap()
    }

    #[test]
    fn activation_builds_a_tree_isomorphic_to_the_skeleton() {
        let mut world = null_world();
        let skeleton = chain_skeleton();
        let mut ragdoll = RagdollBinding::new(1, chain_data());

        ragdoll.activate(&mut world, &skeleton);
        assert!(ragdoll.is_enabled());
        assert_eq!(ragdoll.bones().len(), 3);
        assert_eq!(world.shape_count(), 3);
        assert_eq!(world.joint_count(), 2);

        // Root has no joint; every other bone is jointed to its parent.
        assert!(ragdoll.bones()[0].joint.is_none());
        assert!(ragdoll.bones()[1].joint.is_some());
        assert_eq!(ragdoll.bones()[1].parent_bone, Some(0));
        assert_eq!(ragdoll.bones()[2].parent_bone, Some(1));
    }

    #[test]
    fn activation_then_deactivation_restores_the_skeleton_exactly() {
        let mut world = null_world();
        let mut skeleton = chain_skeleton();
        let before: Vec<Transform> = (0..skeleton.len()).map(|i| skeleton.local(i)).collect();

        let mut ragdoll = RagdollBinding::new(1, chain_data());
        ragdoll.activate(&mut world, &skeleton);
        // Reconciliation overwrites skeleton locals while active.
        ragdoll.update_ragdoll(&mut world, &mut skeleton);
        ragdoll.deactivate(&mut world, &mut skeleton);

        assert!(!ragdoll.is_enabled());
        assert_eq!(world.shape_count(), 0);
        assert_eq!(world.joint_count(), 0);
        for (i, saved) in before.iter().enumerate() {
            // Restore is a verbatim copy, so equality is exact.
            assert_eq!(skeleton.local(i), *saved, "node {i} drifted");
        }
    }

    #[test]
    fn reactivation_after_deactivation_works() {
        let mut world = null_world();
        let mut skeleton = chain_skeleton();
        let mut ragdoll = RagdollBinding::new(1, chain_data());

        ragdoll.activate(&mut world, &skeleton);
        ragdoll.deactivate(&mut world, &mut skeleton);
        ragdoll.activate(&mut world, &skeleton);
        assert_eq!(world.shape_count(), 3);
        assert_eq!(world.joint_count(), 2);
    }

    #[test]
    fn root_motion_reaches_the_leaf_in_a_single_tick() {
        // Root bone physics-driven, the rest animation-driven: moving the
        // root's shape must reposition the grandchild through the *updated*
        // middle bone, not last tick's pose.
        let mut world = null_world();
        let mut skeleton = chain_skeleton();
        let mut ragdoll = RagdollBinding::new(1, chain_data());
        ragdoll.activate(&mut world, &skeleton);
        ragdoll.set_bone_dynamic(1, false);
        ragdoll.set_bone_dynamic(2, false);

        let shift = Vec3::new(2.0, 0.0, 0.0);
        world.set_transform(
            ragdoll.bones()[0].shape,
            &Transform::from_translation(Vec3::new(0.0, 0.0, 1.0) + shift),
        );
        ragdoll.update_ragdoll(&mut world, &mut skeleton);

        let head_world = skeleton.world_transform(2);
        let expected = Vec3::new(2.0, 0.0, 1.7); // shifted root + spine + head offsets
        assert!(
            (head_world.translation - expected).norm() < 1.0e-4,
            "leaf lagged: {head_world:?}"
        );
    }

    #[test]
    fn dynamic_bones_drive_the_skeleton_from_physics() {
        let mut world = null_world();
        let mut skeleton = chain_skeleton();
        let mut ragdoll = RagdollBinding::new(1, chain_data());
        ragdoll.activate(&mut world, &skeleton);

        // Pretend the solver moved the spine bone sideways.
        world.set_transform(
            ragdoll.bones()[1].shape,
            &Transform::from_translation(Vec3::new(0.5, 0.0, 1.4)),
        );
        ragdoll.update_ragdoll(&mut world, &mut skeleton);

        let spine_world = skeleton.world_transform(1);
        assert!((spine_world.translation - Vec3::new(0.5, 0.0, 1.4)).norm() < 1.0e-4);
    }

    #[test]
    fn disabled_ragdoll_packs_to_one_bit() {
        let world = null_world();
        let ragdoll = RagdollBinding::new(1, chain_data());

        let mut writer = BitWriter::new();
        ragdoll.pack_update(&world, &mut writer);
        assert_eq!(writer.bit_len(), 1);
    }

    #[test]
    fn ragdoll_pose_batch_round_trips() {
        let mut server_world = null_world();
        let skeleton = chain_skeleton();
        let mut server_ragdoll = RagdollBinding::new(1, chain_data());
        server_ragdoll.activate(&mut server_world, &skeleton);

        let moved = Transform::from_translation(Vec3::new(1.0, -0.5, 2.0));
        server_world.set_transform(server_ragdoll.bones()[1].shape, &moved);

        let mut writer = BitWriter::new();
        server_ragdoll.pack_update(&server_world, &mut writer);
        let bytes = writer.into_bytes();

        let mut client_world =
            PhysicsWorld::try_create(BackendKind::Null, &WorldOptions::default(), false).unwrap();
        let mut client_ragdoll = RagdollBinding::new(1, chain_data());
        client_ragdoll.activate(&mut client_world, &skeleton);
        client_ragdoll.unpack_update(&mut client_world, &mut BitReader::new(&bytes));

        let applied = client_world.transform(client_ragdoll.bones()[1].shape);
        assert!((applied.translation - moved.translation).norm() < 1.0e-4);
    }

    #[test]
    fn missing_node_skips_the_bone_but_keeps_the_rest() {
        let mut world = null_world();
        let skeleton = chain_skeleton();

        let mut data = chain_data();
        data.bones.insert(1, bone("tail", "pelvis", JointKind::Hinge));
        data.bones[1].node_name = "no_such_node".into();

        let mut ragdoll = RagdollBinding::new(1, data);
        ragdoll.activate(&mut world, &skeleton);
        assert_eq!(ragdoll.bones().len(), 3);
        assert_eq!(world.joint_count(), 2);
    }
}
