// ============================================================================
// Resource TTL Controller Library
// ============================================================================

pub mod adapter;
pub mod config;
pub mod controller;
pub mod core;
pub mod metrics;
pub mod policy;
pub mod reconcile;
pub mod shutdown;
pub mod store;
pub mod web;

// Re-export main types for convenience
pub use adapter::{AdapterRegistry, ResourceAdapter};
pub use config::{ControllerArgs, ControllerConfig, LogFormat};
pub use core::{
    Annotations, CandidateResource, DeleteOutcome, PolicyEvent, PolicyObject, PolicyRef,
    ResourceKind, Result, TtlError,
};
pub use metrics::{ControllerMetrics, MetricsSnapshot};
pub use policy::TtlPolicy;
pub use reconcile::{Decision, PassOutcome, PassReport, Reconciler, ReconcilerSettings, RetryPolicy};
pub use store::{KubeStore, MemoryStore, ObjectStore, ResourceType};
