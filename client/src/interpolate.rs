//! Client-side replication ingestion and pose interpolation.
//!
//! The client never simulates replicated objects authoritatively: received
//! snapshots land in each binding's interpolation delta, and every frame the
//! rendered pose blends from the previously received pose toward the newest
//! one over the configured window. The blended pose is pushed into the local
//! shape purely for rendering and queries; it is never sent back.
//!
//! Snapshot framing (which bytes belong to which object) is the transport
//! layer's concern; this driver receives already-demultiplexed per-object
//! payloads.

use std::collections::HashMap;

use shared::backend::WorldOptions;
use shared::body::BodyBinding;
use shared::descriptor::{BodyData, ObjectId, RagdollData};
use shared::error::ConfigError;
use shared::facade::PhysicsFacade;
use shared::math::Transform;
use shared::ragdoll::RagdollBinding;
use shared::skeleton::Skeleton;
use shared::wire::BitReader;

pub struct ClientSim {
    facade: PhysicsFacade,
    bodies: HashMap<ObjectId, BodyBinding>,
    ragdolls: HashMap<ObjectId, (RagdollBinding, Skeleton)>,
}

impl ClientSim {
    pub fn new(backend_name: Option<&str>, opts: WorldOptions) -> Result<Self, ConfigError> {
        let mut facade = PhysicsFacade::new();
        facade.init(backend_name)?;
        facade.create_physics(false, &opts);
        log::info!("client simulation ready ({})", facade.display_name());

        Ok(Self {
            facade,
            bodies: HashMap::new(),
            ragdolls: HashMap::new(),
        })
    }

    pub fn facade(&self) -> &PhysicsFacade {
        &self.facade
    }

    pub fn facade_mut(&mut self) -> &mut PhysicsFacade {
        &mut self.facade
    }

    /// Mirror a replicated body locally. The spawn transform is the first
    /// authoritative pose known for the object (usually from the spawn
    /// message itself).
    pub fn add_body(&mut self, object: ObjectId, data: BodyData, spawn: Transform) {
        let world = self.facade.get_physics(false);
        let mut body = BodyBinding::new(object, data);
        body.create_shape(world, spawn);
        self.bodies.insert(object, body);
    }

    pub fn remove_body(&mut self, object: ObjectId) {
        if let Some(mut body) = self.bodies.remove(&object) {
            body.destroy(self.facade.get_physics(false));
        }
    }

    pub fn body(&self, object: ObjectId) -> Option<&BodyBinding> {
        self.bodies.get(&object)
    }

    /// Rendered transform of a replicated body, if it exists.
    pub fn body_transform(&self, object: ObjectId) -> Option<Transform> {
        let body = self.bodies.get(&object)?;
        let world = self.facade.try_get_physics(false)?;
        body.shape().map(|id| world.transform(id))
    }

    pub fn add_ragdoll(&mut self, object: ObjectId, data: RagdollData, skeleton: Skeleton) {
        let world = self.facade.get_physics(false);
        let mut ragdoll = RagdollBinding::new(object, data);
        ragdoll.activate(world, &skeleton);
        self.ragdolls.insert(object, (ragdoll, skeleton));
    }

    pub fn remove_ragdoll(&mut self, object: ObjectId) {
        if let Some((mut ragdoll, mut skeleton)) = self.ragdolls.remove(&object) {
            ragdoll.deactivate(self.facade.get_physics(false), &mut skeleton);
        }
    }

    /// Ingest one authoritative per-object payload.
    pub fn apply_snapshot(&mut self, object: ObjectId, bytes: &[u8]) {
        let mut reader = BitReader::new(bytes);
        if let Some(body) = self.bodies.get_mut(&object) {
            body.unpack_update(self.facade.get_physics(false), &mut reader);
        } else if let Some((ragdoll, _)) = self.ragdolls.get_mut(&object) {
            ragdoll.unpack_update(self.facade.get_physics(false), &mut reader);
        } else {
            log::debug!("snapshot for unknown object {object}, dropped");
        }
    }

    /// Per-frame interpolation: blend every body toward its latest received
    /// pose and reconcile ragdoll skeletons from the applied bone poses.
    pub fn tick(&mut self, dt: f32) {
        let world = self.facade.get_physics(false);
        for body in self.bodies.values_mut() {
            body.client_tick(world, dt);
        }
        for (ragdoll, skeleton) in self.ragdolls.values_mut() {
            ragdoll.update_ragdoll(world, skeleton);
        }
    }
}
