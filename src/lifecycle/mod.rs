//! Component lifecycle engine
//!
//! Kind-independent building blocks used by the component manager:
//! - Resource and storage merging driven by the per-kind schema
//! - Action and replica validation
//! - Convergence polling after a mutation
//! - Response assembly

pub mod actions;
pub mod assembler;
pub mod merge;
pub mod poller;
pub mod quantity;
pub mod replicas;

pub use actions::validate_actions;
pub use assembler::{AggregateAssembler, Assembled, ComponentResponse};
pub use merge::{apply_resource_override, merge_json, merge_resources, merge_storage};
pub use poller::{ConvergencePoller, ConvergenceResult, NodePosition, PollOutcome, PollSettings};
pub use quantity::{total_resources, QuantityTotals, ResourceTotals};
pub use replicas::check_replicas;
