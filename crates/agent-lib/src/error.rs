//! Error types for the health agent library

use crate::models::{HealthSample, HealthStatus};
use thiserror::Error;

/// Result type alias for routine registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Rejected routine registry mutations. The registry is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("could not find routine category '{0}'")]
    UnknownCategory(String),

    #[error("worker '{id}' already registered in category '{category}'")]
    DuplicateWorker { category: String, id: String },
}

/// Verdicts refused by the health debouncer. The window is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealthError {
    /// The first accepted verdict must be healthy
    #[error("status initialized with '{status}'")]
    Initialization { status: HealthStatus },

    /// Failure persisted across the whole retained window
    #[error(
        "status unhealthy for a full window ({capacity} samples): [{}]",
        format_window(.window)
    )]
    PersistentFailure {
        capacity: usize,
        window: Vec<HealthSample>,
    },
}

fn format_window(window: &[HealthSample]) -> String {
    window
        .iter()
        .map(|s| format!("{}:'{}'", s.status, s.message))
        .collect::<Vec<_>>()
        .join(",")
}

/// Failures of the external workload count source
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid provider address '{0}'")]
    InvalidAddress(String),

    #[error("error during info request: {0}")]
    Request(String),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode provider response: {0}")]
    Decode(String),
}

/// Heartbeats that cannot be resolved to a known event kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeartbeatError {
    #[error("unknown heartbeat type '{0}'")]
    UnknownType(String),
}

/// HTTP listener failures. These escalate to the owning process.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind health endpoint on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("health endpoint stopped: {0}")]
    Serve(#[source] std::io::Error),
}

impl ServeError {
    pub(crate) fn bind(host: &str, port: u16, source: std::io::Error) -> Self {
        let addr = if host.contains(':') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        ServeError::Bind {
            addr,
            source,
        }
    }
}
