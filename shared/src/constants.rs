use std::time::Duration;

/// Minimum relative contact speed, in meters per second, below which a new
/// contact is discarded by the contact router.
///
/// Resting and sliding contacts re-form constantly at near-zero relative
/// velocity; without this floor they would spam gameplay callbacks every tick.
pub const CONTACT_MIN_SPEED_MPS: f32 = 0.5;

/// Client-side interpolation window in seconds.
///
/// A received authoritative pose is reached `INTERPOLATION_WINDOW_S` after it
/// arrives; until then the rendered pose blends from the previous one.
/// Typical values: one to three server tick intervals.
pub const INTERPOLATION_WINDOW_S: f32 = 0.1;

/// Default fixed simulation timestep.
pub const TICK_INTERVAL: Duration = Duration::from_millis(32);

/// Default minimum position delta (meters) before a body is marked dirty for
/// replication. Datablocks may override per object.
pub const MIN_POSITION_DELTA_M: f32 = 0.002;

/// Default minimum rotation delta (radians) before a body is marked dirty for
/// replication. Datablocks may override per object.
pub const MIN_ROTATION_DELTA_RAD: f32 = 0.004;

/// Default minimum velocity delta (meters per second) before a body is marked
/// dirty for replication.
pub const MIN_VELOCITY_DELTA_MPS: f32 = 0.01;

/// Default relative contact speed (meters per second) above which a body
/// binding forwards the contact to the surrounding game-logic damage hook.
pub const HARD_CONTACT_SPEED_MPS: f32 = 4.0;

/// Radius, in meters, within which a soft-shape vertex counts as hit by a ray.
///
/// Soft meshes have no analytic surface to intersect; the ray test selects the
/// nearest vertex passing within this distance of the ray segment.
pub const SOFT_RAY_VERTEX_RADIUS_M: f32 = 0.1;

/// Default gravity along world -Z (Z-up convention), meters per second squared.
pub const GRAVITY_MPS2: f32 = -9.81;
