//! Declarative resource shapes mirrored in the backend
//!
//! - component: kinds, spec, status and the stored object
//! - resources: per-slot resource and storage requirements
//! - actions: enroll / re-enroll / restart flags

pub mod actions;
pub mod component;
pub mod resources;

pub use actions::*;
pub use component::*;
pub use resources::*;
