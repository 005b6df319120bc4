//! Authoritative simulation driver for the server side.
//!
//! Owns the server-side physics world (through the facade) and the body and
//! ragdoll bindings of every replicated object. The tick is fixed-step with
//! an accumulator: however irregularly the host calls [`ServerSim::tick`],
//! the world only ever advances in whole timesteps.
//!
//! Per step sequence: step the world, deliver this step's filtered contact
//! events to their owning bindings, read back poses and raise replication
//! dirty bits. After stepping, every dirty body and every enabled ragdoll is
//! packed into one snapshot for the transport layer (which is not this
//! crate's concern).

use std::collections::HashMap;

use shared::backend::WorldOptions;
use shared::body::BodyBinding;
use shared::descriptor::{BodyData, ObjectId, RagdollData};
use shared::error::ConfigError;
use shared::facade::PhysicsFacade;
use shared::math::Transform;
use shared::ragdoll::RagdollBinding;
use shared::skeleton::Skeleton;
use shared::wire::BitWriter;

/// One object's replication payload for this tick.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub object: ObjectId,
    pub bytes: Vec<u8>,
}

pub struct ServerSim {
    facade: PhysicsFacade,
    bodies: HashMap<ObjectId, BodyBinding>,
    ragdolls: HashMap<ObjectId, (RagdollBinding, Skeleton)>,
    timestep: f32,
    accumulator: f32,
}

impl ServerSim {
    /// Select a backend by configuration name and create the server-side
    /// world. An unknown name is fatal; a backend that fails to construct
    /// degrades to the null backend inside the facade.
    pub fn new(backend_name: Option<&str>, opts: WorldOptions) -> Result<Self, ConfigError> {
        let mut facade = PhysicsFacade::new();
        facade.init(backend_name)?;
        facade.create_physics(true, &opts);
        log::info!("server simulation ready ({})", facade.display_name());

        Ok(Self {
            facade,
            bodies: HashMap::new(),
            ragdolls: HashMap::new(),
            timestep: opts.timestep,
            accumulator: 0.0,
        })
    }

    pub fn facade(&self) -> &PhysicsFacade {
        &self.facade
    }

    pub fn facade_mut(&mut self) -> &mut PhysicsFacade {
        &mut self.facade
    }

    /// Spawn a replicated body at the given transform.
    pub fn add_body(&mut self, object: ObjectId, data: BodyData, spawn: Transform) {
        let world = self.facade.get_physics(true);
        let mut body = BodyBinding::new(object, data);
        body.create_shape(world, spawn);
        self.bodies.insert(object, body);
    }

    pub fn remove_body(&mut self, object: ObjectId) {
        if let Some(mut body) = self.bodies.remove(&object) {
            body.destroy(self.facade.get_physics(true));
        }
    }

    pub fn body(&self, object: ObjectId) -> Option<&BodyBinding> {
        self.bodies.get(&object)
    }

    /// Activate a ragdoll for a skinned object. The skeleton snapshot carries
    /// the current animated pose the bones are built from.
    pub fn add_ragdoll(&mut self, object: ObjectId, data: RagdollData, skeleton: Skeleton) {
        let world = self.facade.get_physics(true);
        let mut ragdoll = RagdollBinding::new(object, data);
        ragdoll.activate(world, &skeleton);
        self.ragdolls.insert(object, (ragdoll, skeleton));
    }

    pub fn remove_ragdoll(&mut self, object: ObjectId) {
        if let Some((mut ragdoll, mut skeleton)) = self.ragdolls.remove(&object) {
            ragdoll.deactivate(self.facade.get_physics(true), &mut skeleton);
        }
    }

    pub fn ragdoll(&self, object: ObjectId) -> Option<&RagdollBinding> {
        self.ragdolls.get(&object).map(|(r, _)| r)
    }

    /// Advance the simulation and return this tick's replication snapshots.
    pub fn tick(&mut self, dt: f32) -> Vec<Snapshot> {
        self.accumulator += dt;

        while self.accumulator >= self.timestep {
            self.accumulator -= self.timestep;
            self.step_once();
        }

        self.collect_snapshots()
    }

    fn step_once(&mut self) {
        let world = self.facade.get_physics(true);
        world.step(self.timestep);

        // Contacts are delivered within the same tick they occurred in.
        for event in world.drain_contacts() {
            if let Some(body) = self.bodies.get_mut(&event.owner) {
                body.on_contact(event);
            }
        }

        let world = self.facade.get_physics(true);
        for body in self.bodies.values_mut() {
            body.server_tick(world);
        }
        for (ragdoll, skeleton) in self.ragdolls.values_mut() {
            ragdoll.update_ragdoll(world, skeleton);
        }
    }

    fn collect_snapshots(&mut self) -> Vec<Snapshot> {
        let mut snapshots = Vec::new();

        // Stable object order keeps the output deterministic for a given
        // state, which makes replication regressions diffable.
        let mut body_ids: Vec<ObjectId> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.is_dirty())
            .map(|(id, _)| *id)
            .collect();
        body_ids.sort_unstable();

        for id in body_ids {
            let Some(body) = self.bodies.get_mut(&id) else {
                continue;
            };
            let Some(world) = self.facade.try_get_physics(true) else {
                break;
            };
            let mut writer = BitWriter::new();
            body.pack_update(world, &mut writer);
            snapshots.push(Snapshot {
                object: id,
                bytes: writer.into_bytes(),
            });
        }

        let mut ragdoll_ids: Vec<ObjectId> = self.ragdolls.keys().copied().collect();
        ragdoll_ids.sort_unstable();

        for id in ragdoll_ids {
            let Some((ragdoll, _)) = self.ragdolls.get(&id) else {
                continue;
            };
            let Some(world) = self.facade.try_get_physics(true) else {
                break;
            };
            let mut writer = BitWriter::new();
            ragdoll.pack_update(world, &mut writer);
            snapshots.push(Snapshot {
                object: id,
                bytes: writer.into_bytes(),
            });
        }

        snapshots
    }
}
