//! Heartbeat routing and periodic reconciliation
//!
//! The reconciler owns the single task that mutates routine and vitals state
//! from heartbeats and, on every tick, compares the node's workload count to
//! the routine counts to produce one health verdict.

mod events;
mod groups;

#[cfg(test)]
mod tests;

pub use events::{Heartbeat, HeartbeatKind, RoutineAction, WatchdogEvent, WireHeartbeat};
pub use groups::{ComparisonGroup, GroupCount, GroupMember};

use crate::error::HealthError;
use crate::health::HealthDebouncer;
use crate::models::HealthStatus;
use crate::observability::{HealthMetrics, StructuredLogger};
use crate::provider::WorkloadCounter;
use crate::routines::RoutineRegistry;
use crate::vitals::VitalsTracker;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// Default reconciliation period
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(2500);

/// Configuration for the reconciliation loop
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Period between passes (default: 2.5 seconds)
    pub interval: Duration,
    /// Enabled comparison groups, in evaluation order
    pub groups: Vec<ComparisonGroup>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_TICK_INTERVAL,
            groups: ComparisonGroup::defaults(),
        }
    }
}

/// The verdict one pass submitted, and what the debouncer made of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: HealthStatus,
    pub message: String,
    pub outcome: Result<(), HealthError>,
}

impl Verdict {
    pub fn accepted(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Routes heartbeats and runs reconciliation passes
pub struct Reconciler {
    registry: Arc<RoutineRegistry>,
    vitals: Arc<VitalsTracker>,
    debouncer: HealthDebouncer,
    counter: Arc<dyn WorkloadCounter>,
    config: ReconcilerConfig,
    metrics: HealthMetrics,
    logger: StructuredLogger,
}

impl Reconciler {
    pub fn new(
        registry: Arc<RoutineRegistry>,
        vitals: Arc<VitalsTracker>,
        debouncer: HealthDebouncer,
        counter: Arc<dyn WorkloadCounter>,
        config: ReconcilerConfig,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            registry,
            vitals,
            debouncer,
            counter,
            config,
            metrics: HealthMetrics::new(),
            logger,
        }
    }

    pub fn registry(&self) -> &Arc<RoutineRegistry> {
        &self.registry
    }

    pub fn vitals(&self) -> &Arc<VitalsTracker> {
        &self.vitals
    }

    pub fn debouncer(&self) -> &HealthDebouncer {
        &self.debouncer
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Run until shutdown is signaled or the heartbeat channel closes.
    ///
    /// Heartbeats and passes share this task, so passes never overlap and
    /// heartbeats are applied in arrival order.
    pub async fn run(
        self,
        mut heartbeats: mpsc::Receiver<Heartbeat>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let groups: Vec<&str> = self.config.groups.iter().map(|g| g.name.as_str()).collect();
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            groups = ?groups,
            "Starting reconciliation loop"
        );

        let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.handle(WatchdogEvent::Tick).await;
                }
                received = heartbeats.recv() => match received {
                    Some(heartbeat) => {
                        self.handle(WatchdogEvent::Heartbeat(heartbeat)).await;
                    }
                    None => {
                        error!("Heartbeat channel closed, stopping reconciliation loop");
                        break;
                    }
                },
                signal = shutdown.recv() => {
                    match signal {
                        Err(RecvError::Closed) => {
                            warn!("Shutdown channel closed, stopping reconciliation loop");
                        }
                        Ok(()) | Err(RecvError::Lagged(_)) => {
                            info!("Shutting down reconciliation loop");
                        }
                    }
                    break;
                }
            }
        }
    }

    /// Dispatch one event. Ticks return the verdict of the pass they ran.
    pub async fn handle(&self, event: WatchdogEvent) -> Option<Verdict> {
        match event {
            WatchdogEvent::Heartbeat(heartbeat) => {
                self.apply_heartbeat(heartbeat).await;
                None
            }
            WatchdogEvent::Tick => Some(self.run_pass().await),
        }
    }

    /// Apply a heartbeat to the routine registry or the vitals tracker
    pub async fn apply_heartbeat(&self, heartbeat: Heartbeat) {
        trace!(
            kind = heartbeat.kind.label(),
            actor = %heartbeat.actor,
            action = %heartbeat.action,
            "Received heartbeat"
        );
        self.metrics.inc_heartbeats(heartbeat.kind.label());

        match &heartbeat.kind {
            HeartbeatKind::Routine { category } => {
                if !self.registry.has_category(category) {
                    debug!(category = %category, "Ignoring heartbeat for unknown routine category");
                    return;
                }

                let result = match RoutineAction::parse(&heartbeat.action) {
                    RoutineAction::Start => {
                        self.registry
                            .add_worker_at(category, &heartbeat.actor, &heartbeat.action, heartbeat.time)
                            .await
                    }
                    RoutineAction::Stop => {
                        self.registry.remove_worker(category, &heartbeat.actor).await
                    }
                    RoutineAction::Beat(_) => self
                        .registry
                        .refresh_worker(category, &heartbeat.actor, heartbeat.time)
                        .await
                        .map(|_| ()),
                };

                if let Err(e) = result {
                    self.logger.log_registry_rejection(
                        category,
                        &heartbeat.actor,
                        &heartbeat.action,
                        &e.to_string(),
                    );
                }
                self.metrics
                    .set_routines(category, self.registry.count(category).await);
            }
            HeartbeatKind::Vitals => {
                self.vitals
                    .upsert(&heartbeat.actor, &heartbeat.action, heartbeat.time);
                self.metrics.set_vitals_tracked(self.vitals.len() as i64);
            }
        }
    }

    /// Compare the workload count with every enabled group and submit one verdict
    pub async fn run_pass(&self) -> Verdict {
        self.metrics.inc_passes();

        let running = match self.counter.running_workloads().await {
            Ok(count) => count,
            Err(e) => {
                let message = e.to_string();
                self.metrics.inc_provider_errors();
                self.logger.log_provider_error(&message);
                return self.submit(HealthStatus::Unhealthy, message).await;
            }
        };
        self.metrics.set_running_workloads(running);

        let mut fragments = vec![format!("RunningContainers:{}", running)];
        for group in &self.config.groups {
            let count = group.count(&self.registry).await;
            fragments.push(count.fragment);
            if count.total != running {
                debug!(
                    group = %group.name,
                    expected = running,
                    actual = count.total,
                    "Routine count does not match running workloads"
                );
                return self
                    .submit(HealthStatus::Unhealthy, fragments.join(" | "))
                    .await;
            }
        }

        self.submit(HealthStatus::Healthy, fragments.join(" | ")).await
    }

    async fn submit(&self, status: HealthStatus, message: String) -> Verdict {
        let previous = self.debouncer.current_health().await;
        let outcome = self.debouncer.set_health(status, message.clone()).await;

        match &outcome {
            Ok(()) => {
                if previous.status != status {
                    self.logger
                        .log_status_change(previous.status, status, &message);
                }
                self.metrics.set_status(status);
            }
            Err(e @ HealthError::PersistentFailure { .. }) => {
                self.metrics.inc_rejected_verdict("persistent_failure");
                self.logger.log_persistent_failure(&e.to_string());
            }
            Err(e @ HealthError::Initialization { .. }) => {
                self.metrics.inc_rejected_verdict("initialization");
                self.logger.log_rejected_verdict(status, &e.to_string());
            }
        }

        Verdict {
            status,
            message,
            outcome,
        }
    }
}

/// Builder for creating the reconciler
pub struct ReconcilerBuilder {
    registry: Option<Arc<RoutineRegistry>>,
    vitals: Option<Arc<VitalsTracker>>,
    debouncer: Option<HealthDebouncer>,
    counter: Option<Arc<dyn WorkloadCounter>>,
    config: ReconcilerConfig,
    node_name: String,
}

impl ReconcilerBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            registry: None,
            vitals: None,
            debouncer: None,
            counter: None,
            config: ReconcilerConfig::default(),
            node_name: "unknown".to_string(),
        }
    }

    /// Set the routine registry (default: the recognized categories, empty)
    pub fn registry(mut self, registry: Arc<RoutineRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the vitals tracker
    pub fn vitals(mut self, vitals: Arc<VitalsTracker>) -> Self {
        self.vitals = Some(vitals);
        self
    }

    /// Set the health debouncer
    pub fn debouncer(mut self, debouncer: HealthDebouncer) -> Self {
        self.debouncer = Some(debouncer);
        self
    }

    /// Set the workload counter
    pub fn counter(mut self, counter: Arc<dyn WorkloadCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Set the reconciliation period
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Replace the comparison groups
    pub fn groups(mut self, groups: Vec<ComparisonGroup>) -> Self {
        self.config.groups = groups;
        self
    }

    /// Disable a comparison group by name
    pub fn skip_group(mut self, name: &str) -> Self {
        self.config.groups.retain(|g| g.name != name);
        self
    }

    /// Set the node name used in structured logs
    pub fn node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = node_name.into();
        self
    }

    /// Build the reconciler
    pub fn build(self) -> Result<Reconciler> {
        let counter = self
            .counter
            .ok_or_else(|| anyhow::anyhow!("Workload counter is required"))?;
        if self.config.interval.is_zero() {
            anyhow::bail!("Reconciliation interval must be positive");
        }

        Ok(Reconciler::new(
            self.registry.unwrap_or_default(),
            self.vitals.unwrap_or_default(),
            self.debouncer.unwrap_or_default(),
            counter,
            self.config,
            StructuredLogger::new(self.node_name),
        ))
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
