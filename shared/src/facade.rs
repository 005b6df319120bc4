/*!
Physics facade: explicit per-side ownership of the backend worlds.

One facade serves a process; it owns at most one [`PhysicsWorld`] per
simulation side (server and client are separate worlds even in a listen
server). The intended ordering is

```text
init -> create_physics(server) -> create_physics(client)
     -> ... simulate ...
     -> destroy_physics(client) -> destroy_physics(server)
```

but every entry point tolerates being reached first: querying an
uninitialized facade lazily performs a null-backend `init` + create, so code
paths that never exercise physics never pay for a real backend.

Failure semantics
- An unrecognized backend name from configuration is the one fatal error.
- A backend that fails to construct degrades to the null backend with a
  logged warning; gameplay continues with physics inert. Null construction
  itself cannot fail.
*/

use crate::backend::{BackendKind, PhysicsWorld, WorldOptions};
use crate::descriptor::{JointKind, ShapeKind};
use crate::error::ConfigError;

#[derive(Default)]
pub struct PhysicsFacade {
    kind: Option<BackendKind>,
    server: Option<PhysicsWorld>,
    client: Option<PhysicsWorld>,
}

impl PhysicsFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the backend from a configuration name (case-insensitive).
    ///
    /// Absent name selects the null backend. Idempotent: a second call keeps
    /// the first selection. An unknown name is a fatal configuration error
    /// and leaves the facade uninitialized.
    pub fn init(&mut self, name: Option<&str>) -> Result<(), ConfigError> {
        if let Some(kind) = self.kind {
            log::debug!("physics already initialized with backend {kind:?}");
            return Ok(());
        }
        let kind = BackendKind::from_name(name)?;
        log::info!("physics backend selected: {}", kind.display_name());
        self.kind = Some(kind);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.kind.is_some()
    }

    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.kind
    }

    /// Display name of the selected backend, for the scripting layer.
    pub fn display_name(&self) -> &'static str {
        self.kind.map(BackendKind::display_name).unwrap_or("Null")
    }

    /// Instantiate the backend world for one side.
    ///
    /// Tries the configured backend first and degrades to the null backend if
    /// construction fails; only the null path is infallible.
    pub fn create_physics(&mut self, is_server: bool, opts: &WorldOptions) {
        if self.side(is_server).is_some() {
            log::warn!(
                "create_physics called twice for the {} side",
                side_name(is_server)
            );
            return;
        }

        let kind = self.kind.unwrap_or(BackendKind::Null);
        let world = match PhysicsWorld::try_create(kind, opts, is_server) {
            Ok(world) => world,
            Err(err) => {
                log::warn!(
                    "failed to create {} backend for the {} side ({err}); \
                     falling back to the null backend",
                    kind.display_name(),
                    side_name(is_server)
                );
                PhysicsWorld::create_null(is_server)
            }
        };

        log::info!(
            "physics world created for the {} side ({})",
            side_name(is_server),
            world.kind().display_name()
        );
        *self.side(is_server) = Some(world);
    }

    /// The side's world, lazily performing a default (null) `init` +
    /// `create_physics` on first use if the facade was never initialized.
    pub fn get_physics(&mut self, is_server: bool) -> &mut PhysicsWorld {
        if self.kind.is_none() {
            // Absent name cannot fail.
            let _ = self.init(None);
        }
        if self.side(is_server).is_none() {
            self.create_physics(is_server, &WorldOptions::default());
        }
        self.side(is_server)
            .as_mut()
            .expect("world was just created")
    }

    /// Non-creating accessor, for code that only observes.
    pub fn try_get_physics(&self, is_server: bool) -> Option<&PhysicsWorld> {
        if is_server {
            self.server.as_ref()
        } else {
            self.client.as_ref()
        }
    }

    /// Release the side's world. Shapes and joints still held by bindings
    /// become stale handles that read benign defaults.
    pub fn destroy_physics(&mut self, is_server: bool) {
        if self.side(is_server).take().is_some() {
            log::info!("physics world destroyed for the {} side", side_name(is_server));
        }
    }

    /// Named numeric constants published to the scripting environment at
    /// `init` time: shape-kind and joint-kind enumerations.
    pub fn script_constants() -> Vec<(&'static str, i32)> {
        let mut out = Vec::new();
        for kind in ShapeKind::ALL {
            out.push((kind.script_name(), kind as i32));
        }
        for kind in JointKind::ALL {
            out.push((kind.script_name(), kind as i32));
        }
        out
    }

    fn side(&mut self, is_server: bool) -> &mut Option<PhysicsWorld> {
        if is_server {
            &mut self.server
        } else {
            &mut self.client
        }
    }
}

fn side_name(is_server: bool) -> &'static str {
    if is_server { "server" } else { "client" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_backend_name_is_fatal_and_leaves_facade_uninitialized() {
        let mut facade = PhysicsFacade::new();
        let err = facade.init(Some("havok")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(_)));
        assert!(!facade.is_initialized());
    }

    #[test]
    fn init_is_idempotent() {
        let mut facade = PhysicsFacade::new();
        facade.init(Some("rapier")).unwrap();
        facade.init(Some("none")).unwrap(); // ignored, first selection wins
        assert_eq!(facade.backend_kind(), Some(BackendKind::Rapier));
    }

    #[test]
    fn absent_name_selects_the_null_backend() {
        let mut facade = PhysicsFacade::new();
        facade.init(None).unwrap();
        assert_eq!(facade.backend_kind(), Some(BackendKind::Null));
    }

    #[test]
    fn construction_failure_falls_back_to_null_without_error() {
        let mut facade = PhysicsFacade::new();
        facade.init(Some("rapier")).unwrap();

        // Invalid options make the configured backend fail to construct.
        let bad = WorldOptions {
            timestep: f32::NAN,
            ..WorldOptions::default()
        };
        facade.create_physics(true, &bad);

        let world = facade.try_get_physics(true).expect("world exists");
        assert_eq!(world.kind(), BackendKind::Null);
    }

    #[test]
    fn querying_an_uninitialized_facade_lazily_creates_a_null_world() {
        let mut facade = PhysicsFacade::new();
        let world = facade.get_physics(true);
        assert_eq!(world.kind(), BackendKind::Null);
        assert!(facade.is_initialized());
    }

    #[test]
    fn sides_are_independent_worlds() {
        let mut facade = PhysicsFacade::new();
        facade.init(Some("none")).unwrap();
        facade.create_physics(true, &WorldOptions::default());
        facade.create_physics(false, &WorldOptions::default());

        assert!(facade.try_get_physics(true).unwrap().is_server());
        assert!(!facade.try_get_physics(false).unwrap().is_server());

        facade.destroy_physics(false);
        assert!(facade.try_get_physics(false).is_none());
        assert!(facade.try_get_physics(true).is_some());
    }

    #[test]
    fn create_physics_twice_keeps_the_first_world() {
        let mut facade = PhysicsFacade::new();
        facade.init(Some("none")).unwrap();
        facade.create_physics(true, &WorldOptions::default());
        facade.get_physics(true).create_shape(
            &crate::descriptor::ShapeDescriptor::new(
                crate::descriptor::ShapeKind::Box,
                crate::math::Vec3::new(0.5, 0.5, 0.5),
                1.0,
                1,
            ),
        )
        .unwrap();

        facade.create_physics(true, &WorldOptions::default());
        assert_eq!(facade.try_get_physics(true).unwrap().shape_count(), 1);
    }

    #[test]
    fn script_constants_cover_all_kinds() {
        let constants = PhysicsFacade::script_constants();
        assert_eq!(constants.len(), ShapeKind::ALL.len() + JointKind::ALL.len());
        assert!(constants.contains(&("$PhysShape::Capsule", 2)));
        assert!(constants.contains(&("$PhysJoint::Hinge", 1)));
    }
}
