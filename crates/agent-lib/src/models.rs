//! Core data models for the health agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public health status of the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Sentinel status before the first accepted verdict
    Starting,
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Starting => "starting",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded health verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSample {
    pub status: HealthStatus,
    pub message: String,
}

impl HealthSample {
    pub fn new(status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The sample every health window starts with
    pub fn sentinel() -> Self {
        Self::new(HealthStatus::Starting, "Just started")
    }
}

/// A single worker instance within a routine category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerHandle {
    id: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkerHandle {
    pub fn new(id: impl Into<String>, status: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Time between creation and the last refresh
    pub fn uptime(&self) -> chrono::Duration {
        self.updated_at - self.created_at
    }

    /// Refresh from a newer sample of the same worker.
    ///
    /// Only the timestamp is taken over; the status label stays as created.
    pub fn update(&mut self, other: &WorkerHandle) -> Result<(), String> {
        if self.id != other.id {
            return Err(format!(
                "id mismatch (this.id={} != other.id={})",
                self.id, other.id
            ));
        }
        self.updated_at = other.updated_at;
        Ok(())
    }
}
