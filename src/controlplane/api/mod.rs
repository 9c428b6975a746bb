//! API Module
//!
//! REST surface for creating, reading, updating and deleting components.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
