//! Classification of infrastructure errors into engine errors
//!
//! The engine decides on [`BackendError`] variants only, so every
//! status-code or message inspection happens here.

use keel_common::kube_utils::{is_forbidden, is_not_found};
use keel_common::Error;
use keel_migrate::BackendError;

/// Classify a Kubernetes API error for `what`
pub fn from_kube(what: &str, err: kube::Error) -> BackendError {
    if is_not_found(&err) {
        BackendError::NotFound(format!("{}: {}", what, err))
    } else if is_forbidden(&err) {
        BackendError::PermissionDenied(format!("{}: {}", what, err))
    } else {
        BackendError::Other(format!("{}: {}", what, err))
    }
}

/// Classify a shared infra error
pub fn from_common(err: Error) -> BackendError {
    match err {
        Error::Kube { source } => from_kube("kubernetes", source),
        other => BackendError::Other(other.to_string()),
    }
}

/// Messages helm prints when the release itself is absent
const RELEASE_ABSENT: &[&str] = &["release: not found", "release not loaded"];

/// Classify Helm's stderr
///
/// Only helm's own release-absence messages mean `NotFound`. Other "not
/// found" text (a missing credential plugin, an unknown kube context) is a
/// failure to reach the release and stays `Other`. RBAC denials carry the
/// API server's `forbidden` message.
pub fn from_helm_stderr(stderr: &str) -> BackendError {
    let message = stderr.trim().trim_start_matches("Error: ").to_string();
    let lower = message.to_lowercase();
    if RELEASE_ABSENT.iter().any(|m| lower.contains(m)) {
        BackendError::NotFound(message)
    } else if lower.contains("forbidden") || lower.contains("unauthorized") {
        BackendError::PermissionDenied(message)
    } else {
        BackendError::Other(message)
    }
}
