use thiserror::Error;

/// Startup configuration errors.
///
/// These indicate a build/deployment mismatch, not a recoverable runtime
/// state; callers are expected to treat them as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Unknown physics backend name: {0:?}")]
    UnknownBackend(String),
}

/// Backend world construction errors.
///
/// Never propagated past the facade: construction failure degrades to the
/// null backend with a logged warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("World options contain a non-finite gravity component")]
    InvalidGravity,

    #[error("World options contain a non-positive or non-finite timestep")]
    InvalidTimestep,
}

/// Shape descriptor validation errors. Recoverable: the binding falls back to
/// a primitive bounding shape and keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("Shape kind {0:?} is not supported by the active backend")]
    UnsupportedKind(crate::descriptor::ShapeKind),

    #[error("Shape dimensions must be finite and positive")]
    InvalidDimensions,

    #[error("Soft shape descriptor carries no vertices")]
    EmptySoftMesh,
}

/// Joint descriptor validation errors. Recoverable: the joint is refused and
/// the caller keeps its previous constraint state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JointError {
    #[error("Joint references a shape that no longer exists")]
    DeadShape,

    #[error("Joint kind {0:?} cannot connect a soft shape")]
    SoftShape(crate::descriptor::JointKind),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{JointKind, ShapeKind};

    #[test]
    fn config_error_names_the_backend() {
        let err = ConfigError::UnknownBackend("havok".into());
        assert!(err.to_string().contains("havok"));
    }

    #[test]
    fn shape_error_display_messages() {
        assert!(
            ShapeError::UnsupportedKind(ShapeKind::TriangleMesh)
                .to_string()
                .contains("TriangleMesh")
        );
        assert_eq!(
            ShapeError::InvalidDimensions.to_string(),
            "Shape dimensions must be finite and positive"
        );
    }

    #[test]
    fn joint_error_display_messages() {
        assert_eq!(
            JointError::DeadShape.to_string(),
            "Joint references a shape that no longer exists"
        );
        assert!(
            JointError::SoftShape(JointKind::Hinge)
                .to_string()
                .contains("Hinge")
        );
    }
}
