//! Observability infrastructure for the health agent
//!
//! Provides:
//! - Prometheus metrics (verdicts, workload counts, routine counts, heartbeats)
//! - Structured JSON logging with tracing

use crate::models::HealthStatus;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, register_int_gauge_vec,
    IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<HealthMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct HealthMetricsInner {
    status: IntGauge,
    running_workloads: IntGauge,
    routines: IntGaugeVec,
    vitals_tracked: IntGauge,
    passes: IntCounter,
    provider_errors: IntCounter,
    rejected_verdicts: IntCounterVec,
    heartbeats: IntCounterVec,
}

impl HealthMetricsInner {
    fn new() -> Self {
        Self {
            status: register_int_gauge!(
                "health_agent_status",
                "Current public health (1 healthy, 0 unhealthy, -1 starting)"
            )
            .expect("Failed to register status"),

            running_workloads: register_int_gauge!(
                "health_agent_running_workloads",
                "Workload count reported by the count provider on the last pass"
            )
            .expect("Failed to register running_workloads"),

            routines: register_int_gauge_vec!(
                "health_agent_routines",
                "Live workers per routine category",
                &["category"]
            )
            .expect("Failed to register routines"),

            vitals_tracked: register_int_gauge!(
                "health_agent_vitals_tracked",
                "Number of distinct vitals signals seen"
            )
            .expect("Failed to register vitals_tracked"),

            passes: register_int_counter!(
                "health_agent_reconciliation_passes_total",
                "Total number of reconciliation passes"
            )
            .expect("Failed to register passes"),

            provider_errors: register_int_counter!(
                "health_agent_provider_errors_total",
                "Total number of count provider failures"
            )
            .expect("Failed to register provider_errors"),

            rejected_verdicts: register_int_counter_vec!(
                "health_agent_rejected_verdicts_total",
                "Verdicts refused by the health debouncer",
                &["reason"]
            )
            .expect("Failed to register rejected_verdicts"),

            heartbeats: register_int_counter_vec!(
                "health_agent_heartbeats_total",
                "Heartbeats received, by kind",
                &["kind"]
            )
            .expect("Failed to register heartbeats"),
        }
    }
}

/// Health agent metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct HealthMetrics {
    _private: (),
}

impl Default for HealthMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(HealthMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &HealthMetricsInner {
        GLOBAL_METRICS.get_or_init(HealthMetricsInner::new)
    }

    pub fn set_status(&self, status: HealthStatus) {
        let value = match status {
            HealthStatus::Healthy => 1,
            HealthStatus::Unhealthy => 0,
            HealthStatus::Starting => -1,
        };
        self.inner().status.set(value);
    }

    pub fn set_running_workloads(&self, count: i64) {
        self.inner().running_workloads.set(count);
    }

    pub fn set_routines(&self, category: &str, count: i64) {
        self.inner()
            .routines
            .with_label_values(&[category])
            .set(count);
    }

    pub fn set_vitals_tracked(&self, count: i64) {
        self.inner().vitals_tracked.set(count);
    }

    pub fn inc_passes(&self) {
        self.inner().passes.inc();
    }

    pub fn inc_provider_errors(&self) {
        self.inner().provider_errors.inc();
    }

    pub fn inc_rejected_verdict(&self, reason: &str) {
        self.inner()
            .rejected_verdicts
            .with_label_values(&[reason])
            .inc();
    }

    pub fn inc_heartbeats(&self, kind: &str) {
        self.inner().heartbeats.with_label_values(&[kind]).inc();
    }
}

/// Structured logger for agent events
///
/// Keeps the `event` field stable so log pipelines can key on it.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, addr: &str, health_path: &str) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            addr = %addr,
            health_path = %health_path,
            "Health agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Health agent shutting down"
        );
    }

    /// Log a change of the public health status
    pub fn log_status_change(&self, from: HealthStatus, to: HealthStatus, message: &str) {
        if to.is_healthy() {
            info!(
                event = "health_changed",
                node = %self.node_name,
                from = %from,
                to = %to,
                message = %message,
                "Health status changed"
            );
        } else {
            warn!(
                event = "health_changed",
                node = %self.node_name,
                from = %from,
                to = %to,
                message = %message,
                "Health status changed"
            );
        }
    }

    /// Log a failure that has persisted for the whole window
    pub fn log_persistent_failure(&self, details: &str) {
        error!(
            event = "persistent_failure",
            node = %self.node_name,
            details = %details,
            "Health check failing for the whole retained window"
        );
    }

    /// Log a rejected verdict that is not a persistent failure
    pub fn log_rejected_verdict(&self, status: HealthStatus, reason: &str) {
        warn!(
            event = "verdict_rejected",
            node = %self.node_name,
            status = %status,
            reason = %reason,
            "Health verdict rejected"
        );
    }

    /// Log a count provider failure
    pub fn log_provider_error(&self, error: &str) {
        error!(
            event = "provider_error",
            node = %self.node_name,
            error = %error,
            "Workload count provider failed"
        );
    }

    /// Log a routine registry mutation that was refused
    pub fn log_registry_rejection(&self, category: &str, actor: &str, action: &str, error: &str) {
        warn!(
            event = "routine_rejected",
            node = %self.node_name,
            category = %category,
            actor = %actor,
            action = %action,
            error = %error,
            "Routine heartbeat rejected"
        );
    }
}
