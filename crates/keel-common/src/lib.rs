//! Common building blocks for keel: errors, retries, tracing and
//! per-cluster Kubernetes clients

#![deny(missing_docs)]

pub mod cluster;
pub mod error;
pub mod kube_utils;
pub mod retry;
pub mod telemetry;

pub use cluster::{ClusterEndpoint, ClusterRegistry};
pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager used for every patch keel sends to a cluster
pub const FIELD_MANAGER: &str = "keel";
