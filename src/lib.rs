//! Fabric Deployer
//!
//! A companion API for a Kubernetes operator that runs Hyperledger Fabric
//! components. Requests to create or change a CA, peer or ordering service
//! are validated, written as custom resources, and then polled until the
//! operator reports them deployed (or failed, or out of time). Every reply
//! carries a consolidated view of the component.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      REST API (axum)                             │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                   Component Manager                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────────┐  │
//! │  │  Validation  │  │ Convergence  │  │  Response Assembly     │  │
//! │  │ (versions,   │  │   Poller     │  │ (status, resources,    │  │
//! │  │  resources,  │  │              │  │  connection profile)   │  │
//! │  │  actions)    │  │              │  │                        │  │
//! │  └──────────────┘  └──────┬───────┘  └───────────┬────────────┘  │
//! ├───────────────────────────┴──────────────────────┴───────────────┤
//! │          Resource Store / Artifact Store ports                   │
//! │  ┌─────────────────────────────┐  ┌───────────────────────────┐  │
//! │  │  Kubernetes (custom         │  │  In-memory (standalone    │  │
//! │  │  resources + ConfigMaps)    │  │  mode and tests)          │  │
//! │  └─────────────────────────────┘  └───────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: Deployer configuration and the version registry
//! - [`controlplane`]: Component manager, backends, REST API and metrics
//! - [`crd`]: Resource shapes mirrored in the backend
//! - [`domain`]: Store ports and per-kind component schemas
//! - [`lifecycle`]: Merging, validation, convergence polling and assembly
//! - [`error`]: Error types and handling

pub mod config;
pub mod controlplane;
pub mod crd;
pub mod domain;
pub mod error;
pub mod lifecycle;

// Re-export commonly used types
pub use config::{ConvergenceConfig, DeployerConfig, VersionRegistry};

pub use controlplane::{
    ApiServer, ApiServerConfig, Backends, ComponentManager, CreateComponentRequest,
    DeployerMetrics, MemoryStore, RestRouter, Section,
};

pub use crd::{ComponentKind, ComponentObject, ComponentSpec, ComponentStatus, StatusType};

pub use domain::{ArtifactStore, ResourceRef, ResourceStore};

pub use lifecycle::{ComponentResponse, ConvergencePoller, PollOutcome};

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
