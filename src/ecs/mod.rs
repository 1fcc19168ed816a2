/// Entity/component core
///
/// This module provides:
/// - Entities with local/world transforms and parent links
/// - The closed set of component variants and their hooks
/// - The rigid body component and the Rapier-backed physics adapter
/// - The render backend boundary used by scene draws and paint strokes

pub mod components;
pub mod entity;
pub mod hierarchy;
pub mod init;
pub mod physics;
pub mod rendering;
pub mod rigid_body;
