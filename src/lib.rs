pub mod config;
pub mod ecs;
pub mod error;
pub mod frame;
pub mod material;
pub mod material_library;
pub mod paint;
pub mod scene;
pub mod transform;

pub use error::{EngineError, Result};
