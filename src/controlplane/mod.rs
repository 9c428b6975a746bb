//! Control Plane Module
//!
//! The component manager and everything around it: the backends it talks
//! to, the HTTP API in front of it and the metrics it records.

pub mod api;
pub mod backends;
pub mod manager;
pub mod metrics;

pub use api::*;
pub use backends::*;
pub use manager::*;
pub use metrics::*;
