//! Cluster-facing adapters for the keel migration engine
//!
//! - [`helm`]: release manager over the Helm CLI
//! - [`argocd`]: GitOps controller over Argo CD `Application` resources
//! - [`patcher`]: strategic/merge patches of arbitrary resources
//! - [`reachability`]: API server liveness probe
//! - [`gitops_config`]: whether GitOps is usable at all

#![deny(missing_docs)]

pub mod argocd;
pub mod error;
pub mod gitops_config;
pub mod helm;
pub mod patcher;
pub mod reachability;

pub use argocd::ArgoCdController;
pub use gitops_config::ArgoCdConfigReader;
pub use helm::{HelmCli, HelmReleaseManager};
pub use patcher::KubePatcher;
pub use reachability::{ApiServerProbe, ReachabilityConfig};
