use thiserror::Error;

/// Errors raised by scene, physics and paint setup.
///
/// Per-frame paths never return these for configuration problems (those are logged and
/// skipped); they surface from startup-class operations such as body or texture creation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("convex hull could not be built from {0} points")]
    ConvexHull(usize),

    #[error("degenerate collider shape: {0}")]
    DegenerateShape(String),

    #[error("render resource creation failed: {0}")]
    Resource(String),

    #[error("entity `{0}` not found")]
    EntityNotFound(String),

    #[error("entity `{entity}` has no {component} component")]
    MissingComponent {
        entity: String,
        component: &'static str,
    },

    #[error("cannot parent `{child}` to `{parent}`: {reason}")]
    InvalidParent {
        child: String,
        parent: String,
        reason: &'static str,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
