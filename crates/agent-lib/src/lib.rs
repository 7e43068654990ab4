//! Health aggregation library for the fleet health agent
//!
//! This crate provides the core functionality for:
//! - Tracking live workers per routine category
//! - Tracking freshness of auxiliary vitals signals
//! - Debouncing health verdicts over a bounded window
//! - Reconciling workload counts against routine counts
//! - Presenting health over HTTP, with observability

pub mod api;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod presenter;
pub mod provider;
pub mod reconciler;
pub mod routines;
pub mod vitals;

pub use error::{HealthError, HeartbeatError, ProviderError, RegistryError, ServeError};
pub use health::{HealthDebouncer, HealthWindow};
pub use models::*;
pub use observability::{HealthMetrics, StructuredLogger};
pub use presenter::{StatusPresenter, StatusView};
pub use provider::{DockerInfoCounter, WorkloadCounter};
pub use reconciler::{Heartbeat, HeartbeatKind, Reconciler, ReconcilerBuilder, Verdict};
pub use routines::RoutineRegistry;
pub use vitals::VitalsTracker;
