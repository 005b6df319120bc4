use crate::arena::SlotHandle;
use crate::error::ShapeError;
use crate::math::{Transform, Vec3};

/// Identifier of the game object owning a shape, assigned by the surrounding
/// engine. The contact router reports events in terms of these ids.
pub type ObjectId = u64;

/// Handle to a shape slot inside a [`crate::backend::PhysicsWorld`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShapeId(pub SlotHandle);

/// Handle to a joint slot inside a [`crate::backend::PhysicsWorld`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JointId(pub SlotHandle);

/// Collidable geometry kinds understood by every backend.
///
/// The numeric values are published to the scripting layer; do not reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ShapeKind {
    /// Oriented box; `dimensions` are half-extents (hx, hy, hz).
    Box = 0,
    /// Sphere; `dimensions.x` is the radius.
    Sphere = 1,
    /// Z-aligned capsule; `dimensions.x` is the radius, `dimensions.z` the
    /// half-length of the cylindrical section.
    Capsule = 2,
    /// Z-aligned cylinder; same dimension semantics as `Capsule`.
    Cylinder = 3,
    /// Deformable vertex mesh; geometry comes from `ShapeDescriptor::vertices`.
    SoftMesh = 4,
    /// Static triangle soup; geometry comes from `vertices` + `indices`.
    TriangleMesh = 5,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 6] = [
        ShapeKind::Box,
        ShapeKind::Sphere,
        ShapeKind::Capsule,
        ShapeKind::Cylinder,
        ShapeKind::SoftMesh,
        ShapeKind::TriangleMesh,
    ];

    /// Script-visible constant name for this kind.
    pub fn script_name(self) -> &'static str {
        match self {
            ShapeKind::Box => "$PhysShape::Box",
            ShapeKind::Sphere => "$PhysShape::Sphere",
            ShapeKind::Capsule => "$PhysShape::Capsule",
            ShapeKind::Cylinder => "$PhysShape::Cylinder",
            ShapeKind::SoftMesh => "$PhysShape::SoftMesh",
            ShapeKind::TriangleMesh => "$PhysShape::TriangleMesh",
        }
    }
}

/// Constraint kinds understood by every backend.
///
/// The numeric values are published to the scripting layer; do not reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum JointKind {
    /// Two swing limits (`params1.x`, `params1.y`) and one twist limit
    /// (`params1.z`), all in radians about the joint axis frame.
    ConeTwist = 0,
    /// One rotational degree of freedom about `world_axis`; `params1.x` /
    /// `params1.y` are the lower/upper angle limits in radians.
    Hinge = 1,
    /// Linear axes locked, angular axes limited symmetrically by
    /// `params1.{x,y,z}` radians.
    SixDof = 2,
    /// Free rotation about the pivot, no limits.
    BallSocket = 3,
    /// All six degrees of freedom locked.
    Fixed = 4,
}

impl JointKind {
    pub const ALL: [JointKind; 5] = [
        JointKind::ConeTwist,
        JointKind::Hinge,
        JointKind::SixDof,
        JointKind::BallSocket,
        JointKind::Fixed,
    ];

    /// Script-visible constant name for this kind.
    pub fn script_name(self) -> &'static str {
        match self {
            JointKind::ConeTwist => "$PhysJoint::ConeTwist",
            JointKind::Hinge => "$PhysJoint::Hinge",
            JointKind::SixDof => "$PhysJoint::SixDof",
            JointKind::BallSocket => "$PhysJoint::BallSocket",
            JointKind::Fixed => "$PhysJoint::Fixed",
        }
    }
}

/// How to build one collidable shape. Immutable after shape creation.
///
/// Conventions
/// - `transform` is the initial world transform of the *graphical* object.
/// - `pivot` maps graphical space to physical space (collision geometry
///   center and mesh origin are generally not coincident); the shape stores
///   its inverse and composes it back out of every transform query.
/// - `mass <= 0` builds a static/kinematic body; `mass > 0` a dynamic one.
#[derive(Clone, Debug)]
pub struct ShapeDescriptor {
    pub kind: ShapeKind,
    pub dimensions: Vec3,
    pub mass: f32,
    pub transform: Transform,
    pub pivot: Transform,
    pub owner: ObjectId,
    /// Object-local vertices for `SoftMesh` / `TriangleMesh` kinds.
    pub vertices: Vec<Vec3>,
    /// Triangle indices for `TriangleMesh`.
    pub indices: Vec<[u32; 3]>,
    /// Indices of pinned (attachment) vertices for `SoftMesh`.
    pub pinned: Vec<u32>,
}

impl ShapeDescriptor {
    /// Descriptor with identity transforms and no mesh data.
    pub fn new(kind: ShapeKind, dimensions: Vec3, mass: f32, owner: ObjectId) -> Self {
        Self {
            kind,
            dimensions,
            mass,
            transform: Transform::identity(),
            pivot: Transform::identity(),
            owner,
            vertices: Vec::new(),
            indices: Vec::new(),
            pinned: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_pivot(mut self, pivot: Transform) -> Self {
        self.pivot = pivot;
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.mass > 0.0
    }

    /// Validate geometry parameters. Failure is recoverable: callers fall
    /// back to a primitive bounding shape.
    pub fn validate(&self) -> Result<(), ShapeError> {
        match self.kind {
            ShapeKind::Box => {
                if !finite_positive(self.dimensions.x)
                    || !finite_positive(self.dimensions.y)
                    || !finite_positive(self.dimensions.z)
                {
                    return Err(ShapeError::InvalidDimensions);
                }
            }
            ShapeKind::Sphere => {
                if !finite_positive(self.dimensions.x) {
                    return Err(ShapeError::InvalidDimensions);
                }
            }
            ShapeKind::Capsule | ShapeKind::Cylinder => {
                if !finite_positive(self.dimensions.x) || !finite_positive(self.dimensions.z) {
                    return Err(ShapeError::InvalidDimensions);
                }
            }
            ShapeKind::SoftMesh => {
                if self.vertices.is_empty() {
                    return Err(ShapeError::EmptySoftMesh);
                }
            }
            ShapeKind::TriangleMesh => {
                if self.vertices.is_empty() || self.indices.is_empty() {
                    return Err(ShapeError::InvalidDimensions);
                }
            }
        }
        Ok(())
    }
}

#[inline]
fn finite_positive(x: f32) -> bool {
    x.is_finite() && x > 0.0
}

/// How to build one constraint between two shapes. Immutable after creation.
///
/// The joint resolves both shapes' finalized world transforms at creation
/// time and converts `world_pivot` into each shape's local frame; the limit
/// parameters are applied verbatim per [`JointKind`] semantics.
#[derive(Clone, Copy, Debug)]
pub struct JointDescriptor {
    pub kind: JointKind,
    pub shape_a: ShapeId,
    pub shape_b: ShapeId,
    /// World-space pivot position shared by both attachment frames.
    pub world_pivot: Vec3,
    /// World-space primary axis (hinge rotation / cone-twist twist axis).
    /// Ignored by `BallSocket` and `Fixed`.
    pub world_axis: Vec3,
    pub params1: Vec3,
    pub params2: Vec3,
}

impl JointDescriptor {
    pub fn new(kind: JointKind, shape_a: ShapeId, shape_b: ShapeId, world_pivot: Vec3) -> Self {
        Self {
            kind,
            shape_a,
            shape_b,
            world_pivot,
            world_axis: Vec3::z(),
            params1: Vec3::zeros(),
            params2: Vec3::zeros(),
        }
    }

    pub fn with_axis(mut self, axis: Vec3) -> Self {
        self.world_axis = axis;
        self
    }

    pub fn with_params(mut self, params1: Vec3, params2: Vec3) -> Self {
        self.params1 = params1;
        self.params2 = params2;
        self
    }
}

/// Per-object physics configuration, read from the object's datablock.
///
/// This core treats datablocks as already-parsed structs; the text format
/// belongs to the asset pipeline.
#[derive(Clone, Debug)]
pub struct BodyData {
    pub shape: ShapeKind,
    pub dimensions: Vec3,
    pub mass: f32,
    pub pivot: Transform,
    /// Replication thresholds: a pose component must move at least this far
    /// from the last replicated value before the body is marked dirty.
    pub min_position_delta: f32,
    pub min_rotation_delta: f32,
    pub min_velocity_delta: f32,
    /// Relative contact speed above which the binding raises the
    /// hard-contact flag for the surrounding game logic.
    pub hard_contact_speed: f32,
}

impl Default for BodyData {
    fn default() -> Self {
        Self {
            shape: ShapeKind::Box,
            dimensions: Vec3::new(0.5, 0.5, 0.5),
            mass: 1.0,
            pivot: Transform::identity(),
            min_position_delta: crate::constants::MIN_POSITION_DELTA_M,
            min_rotation_delta: crate::constants::MIN_ROTATION_DELTA_RAD,
            min_velocity_delta: crate::constants::MIN_VELOCITY_DELTA_MPS,
            hard_contact_speed: crate::constants::HARD_CONTACT_SPEED_MPS,
        }
    }
}

/// Per-bone ragdoll topology, read from the object's datablock.
#[derive(Clone, Debug)]
pub struct RagdollBoneData {
    /// Skeletal node this bone drives.
    pub node_name: String,
    /// Parent node name; empty for the root bone.
    pub parent_name: String,
    /// Shape dimensions, same semantics as [`ShapeDescriptor::dimensions`].
    pub size: Vec3,
    pub mass: f32,
    /// Pivot translation from the node origin to the collision center.
    pub offset: Vec3,
    /// Pivot rotation as XYZ Euler angles in radians.
    pub rotation: Vec3,
    pub shape: ShapeKind,
    pub joint: JointKind,
    pub params1: Vec3,
    pub params2: Vec3,
}

impl RagdollBoneData {
    pub fn is_root(&self) -> bool {
        self.parent_name.is_empty()
    }

    /// Pivot transform from node space to collision space.
    pub fn pivot(&self) -> Transform {
        Transform::new(
            self.offset,
            crate::math::Quat::from_euler_angles(self.rotation.x, self.rotation.y, self.rotation.z),
        )
    }
}

/// Whole-ragdoll topology: one entry per simulated bone, root first.
#[derive(Clone, Debug, Default)]
pub struct RagdollData {
    pub bones: Vec<RagdollBoneData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_descriptor_with_positive_extents_validates() {
        let desc = ShapeDescriptor::new(ShapeKind::Box, Vec3::new(0.5, 1.0, 0.25), 2.0, 1);
        assert_eq!(desc.validate(), Ok(()));
        assert!(desc.is_dynamic());
    }

    #[test]
    fn degenerate_dimensions_are_rejected() {
        let zero = ShapeDescriptor::new(ShapeKind::Sphere, Vec3::zeros(), 1.0, 1);
        assert_eq!(zero.validate(), Err(ShapeError::InvalidDimensions));

        let nan = ShapeDescriptor::new(ShapeKind::Capsule, Vec3::new(f32::NAN, 0.0, 1.0), 1.0, 1);
        assert_eq!(nan.validate(), Err(ShapeError::InvalidDimensions));
    }

    #[test]
    fn soft_mesh_requires_vertices() {
        let empty = ShapeDescriptor::new(ShapeKind::SoftMesh, Vec3::zeros(), 1.0, 1);
        assert_eq!(empty.validate(), Err(ShapeError::EmptySoftMesh));

        let mut ok = empty.clone();
        ok.vertices.push(Vec3::zeros());
        assert_eq!(ok.validate(), Ok(()));
    }

    #[test]
    fn zero_mass_is_static() {
        let desc = ShapeDescriptor::new(ShapeKind::Box, Vec3::new(1.0, 1.0, 1.0), 0.0, 1);
        assert!(!desc.is_dynamic());
    }

    #[test]
    fn script_constant_values_are_stable() {
        // These values are part of the scripting contract; a change here is a
        // breaking change for game scripts.
        assert_eq!(ShapeKind::Box as i32, 0);
        assert_eq!(ShapeKind::TriangleMesh as i32, 5);
        assert_eq!(JointKind::ConeTwist as i32, 0);
        assert_eq!(JointKind::Fixed as i32, 4);
    }

    #[test]
    fn root_bone_has_empty_parent() {
        let bone = RagdollBoneData {
            node_name: "pelvis".into(),
            parent_name: String::new(),
            size: Vec3::new(0.1, 0.1, 0.2),
            mass: 8.0,
            offset: Vec3::zeros(),
            rotation: Vec3::zeros(),
            shape: ShapeKind::Capsule,
            joint: JointKind::BallSocket,
            params1: Vec3::zeros(),
            params2: Vec3::zeros(),
        };
        assert!(bone.is_root());
    }
}
