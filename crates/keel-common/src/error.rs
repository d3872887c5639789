//! Error types shared by keel crates
//!
//! Errors carry the cluster or config context that produced them so a
//! failure deep inside a batch can still be traced back to its source.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Infrastructure error shared across keel crates
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Configuration could not be loaded or is invalid
    #[error("config error{}: {message}", path.as_ref().map(|p| format!(" in {p}")).unwrap_or_default())]
    Config {
        /// Description of what's invalid
        message: String,
        /// Config file the problem was found in (if any)
        path: Option<String>,
    },

    /// No endpoint is registered for a cluster id
    #[error("cluster {cluster_id} is not registered")]
    ClusterNotRegistered {
        /// Cluster id that was looked up
        cluster_id: i64,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "create_client", "helm")
        context: String,
    },
}

impl Error {
    /// Create a config error without a file path
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
            path: None,
        }
    }

    /// Create a config error pointing at a config file
    pub fn config_in(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
            path: Some(path.into()),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Config and registration errors need an operator fix. Kubernetes
    /// 4xx responses are permanent, everything else is treated as transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code)
            ),
            Error::Config { .. } => false,
            Error::ClusterNotRegistered { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Internal { context, .. } => Some(context),
            _ => None,
        }
    }
}
