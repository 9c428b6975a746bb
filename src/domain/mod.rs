//! Domain Module
//!
//! Collaborator ports and the per-kind component schemas.

pub mod ports;
pub mod schema;

pub use ports::*;
pub use schema::*;
