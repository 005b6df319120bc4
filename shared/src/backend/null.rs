/*!
The inert backend.

Implements the full backend surface with do-nothing behavior: transforms are
stored verbatim and handed back, velocities/forces read as zero, ray casts
miss, stepping moves nothing and reports no contacts. It is the safe default
for headless servers, tests, and the fallback when a real backend fails to
construct; gameplay code runs unchanged with physics effectively disabled.
*/

use crate::math::{Iso, Vec3};
use crate::soft::RayHit;

/// Per-shape state mirrored by the inert backend: just the stored pose.
/// Enabled/sleep flags live on the backend-agnostic shape slot.
#[derive(Clone, Debug)]
pub struct NullShape {
    pose: Iso,
}

impl NullShape {
    pub fn new(pose: Iso) -> Self {
        Self { pose }
    }

    pub fn pose(&self) -> Iso {
        self.pose
    }

    pub fn set_pose(&mut self, pose: Iso) {
        self.pose = pose;
    }

    /// Velocity/force state of an inert shape is identically zero; setters
    /// are accepted and discarded.
    pub fn zero(&self) -> Vec3 {
        Vec3::zeros()
    }

    pub fn cast_ray(&self, _start: Vec3, _end: Vec3) -> Option<RayHit> {
        None
    }
}

/// The world counterpart is stateless: stepping is a no-op and the touching
/// set is always empty.
#[derive(Default)]
pub struct NullWorld;

impl NullWorld {
    pub fn new() -> Self {
        Self
    }

    pub fn step(&mut self, _dt: f32) {}
}
