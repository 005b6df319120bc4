pub mod arena;
pub mod backend;
pub mod body;
pub mod constants;
pub mod contact;
pub mod descriptor;
pub mod error;
pub mod facade;
pub mod mask;
pub mod math;
pub mod ragdoll;
pub mod skeleton;
pub mod soft;
pub mod wire;

pub use backend::{BackendKind, PhysicsWorld, WorldOptions};
pub use body::{BodyBinding, Pose, PoseFlags};
pub use constants::{
    CONTACT_MIN_SPEED_MPS, GRAVITY_MPS2, HARD_CONTACT_SPEED_MPS, INTERPOLATION_WINDOW_S,
    TICK_INTERVAL,
};
pub use contact::{ContactEvent, ContactRouter};
pub use descriptor::{
    BodyData, JointDescriptor, JointId, JointKind, ObjectId, RagdollBoneData, RagdollData,
    ShapeDescriptor, ShapeId, ShapeKind,
};
pub use error::{ConfigError, JointError, ShapeError, WorldError};
pub use facade::PhysicsFacade;
pub use math::{Iso, Quat, Transform, Vec3};
pub use ragdoll::{BoneEntry, RagdollBinding};
pub use skeleton::Skeleton;
pub use soft::RayHit;
pub use wire::{BitReader, BitWriter};
