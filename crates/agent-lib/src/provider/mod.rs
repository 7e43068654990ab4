//! Workload count sources
//!
//! The reconciler only needs the number of workloads currently running on
//! the node. Where that number comes from is behind [`WorkloadCounter`].

mod docker;

pub use docker::{DockerInfoCounter, DEFAULT_DOCKER_API_VERSION, DEFAULT_DOCKER_HOST};

use crate::error::ProviderError;

pub use async_trait::async_trait;

/// Trait for workload count implementations
#[async_trait]
pub trait WorkloadCounter: Send + Sync {
    /// Number of workloads currently running
    async fn running_workloads(&self) -> Result<i64, ProviderError>;
}
