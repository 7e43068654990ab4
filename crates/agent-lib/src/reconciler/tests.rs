//! Reconciliation scenarios
//!
//! These tests drive the reconciler with a mock workload counter and check
//! the verdicts it submits and the state the heartbeats leave behind.

use super::*;
use crate::error::ProviderError;
use crate::models::HealthSample;
use crate::provider::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// Mock counter reporting a settable workload count
struct MockCounter {
    running: AtomicI64,
    failing: AtomicBool,
}

impl MockCounter {
    fn new(running: i64) -> Arc<Self> {
        Arc::new(Self {
            running: AtomicI64::new(running),
            failing: AtomicBool::new(false),
        })
    }

    fn set(&self, running: i64) {
        self.running.store(running, Ordering::SeqCst);
    }

    fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl WorkloadCounter for MockCounter {
    async fn running_workloads(&self) -> Result<i64, ProviderError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Request("connection refused".to_string()));
        }
        Ok(self.running.load(Ordering::SeqCst))
    }
}

fn reconciler_with(counter: Arc<MockCounter>, builder: ReconcilerBuilder) -> Reconciler {
    builder
        .counter(counter)
        .node_name("test-node")
        .build()
        .unwrap()
}

fn reconciler(counter: Arc<MockCounter>) -> Reconciler {
    reconciler_with(counter, ReconcilerBuilder::new())
}

mod pass_tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_drive_verdicts() {
        let counter = MockCounter::new(0);
        let reconciler = reconciler(counter.clone());

        let verdict = reconciler.run_pass().await;
        assert_eq!(verdict.status, HealthStatus::Healthy);
        assert!(verdict.accepted());
        assert_eq!(
            verdict.message,
            "RunningContainers:0 | metricsGoRoutines:0 | \
             logsGoRoutine:(0 [logs] + 0 [skipped] + 0 [wrongType])"
        );

        reconciler.registry().add_worker("log", "id1").await.unwrap();
        let verdict = reconciler.run_pass().await;
        assert_eq!(verdict.status, HealthStatus::Unhealthy);
        assert_eq!(
            verdict.message,
            "RunningContainers:0 | metricsGoRoutines:0 | \
             logsGoRoutine:(1 [logs] + 0 [skipped] + 0 [wrongType])"
        );

        counter.set(1);
        let verdict = reconciler.run_pass().await;
        assert_eq!(verdict.status, HealthStatus::Unhealthy);
        assert_eq!(verdict.message, "RunningContainers:1 | metricsGoRoutines:0");
        assert!(verdict.accepted());

        reconciler.registry().add_worker("stats", "id1").await.unwrap();
        let verdict = reconciler.run_pass().await;
        assert_eq!(verdict.status, HealthStatus::Healthy);
        assert_eq!(
            verdict.message,
            "RunningContainers:1 | metricsGoRoutines:1 | \
             logsGoRoutine:(1 [logs] + 0 [skipped] + 0 [wrongType])"
        );
        assert_eq!(
            reconciler.debouncer().current_health().await.status,
            HealthStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_first_mismatch_is_rejected_until_healthy() {
        let counter = MockCounter::new(1);
        let registry = Arc::new(RoutineRegistry::new(["log", "stats"]));
        let reconciler =
            reconciler_with(counter, ReconcilerBuilder::new().registry(registry.clone()));

        let verdict = reconciler.run_pass().await;
        assert_eq!(verdict.status, HealthStatus::Unhealthy);
        assert!(verdict
            .message
            .contains("RunningContainers:1 | metricsGoRoutines:0"));
        assert!(matches!(
            verdict.outcome,
            Err(HealthError::Initialization { .. })
        ));
        assert_eq!(
            reconciler.debouncer().current_health().await,
            HealthSample::sentinel()
        );

        registry.add_worker("stats", "a").await.unwrap();
        registry.add_worker("log", "a").await.unwrap();

        let verdict = reconciler.run_pass().await;
        assert_eq!(verdict.status, HealthStatus::Healthy);
        assert!(verdict.accepted());
    }

    #[tokio::test]
    async fn test_provider_failure_short_circuits() {
        let counter = MockCounter::new(0);
        let reconciler = reconciler(counter.clone());
        reconciler.run_pass().await;

        counter.fail(true);
        let verdict = reconciler.run_pass().await;

        assert_eq!(verdict.status, HealthStatus::Unhealthy);
        assert_eq!(verdict.message, "error during info request: connection refused");
        assert!(verdict.accepted());

        let current = reconciler.debouncer().current_health().await;
        assert_eq!(current.message, verdict.message);
    }

    #[tokio::test]
    async fn test_skipped_group_is_not_evaluated() {
        let counter = MockCounter::new(1);
        let reconciler = reconciler_with(counter, ReconcilerBuilder::new().skip_group("stats"));
        reconciler.registry().add_worker("logSkip", "a").await.unwrap();

        let verdict = reconciler.run_pass().await;
        assert_eq!(verdict.status, HealthStatus::Healthy);
        assert_eq!(
            verdict.message,
            "RunningContainers:1 | logsGoRoutine:(0 [logs] + 1 [skipped] + 0 [wrongType])"
        );
    }

    #[tokio::test]
    async fn test_no_groups_is_healthy() {
        let counter = MockCounter::new(7);
        let reconciler = reconciler_with(
            counter,
            ReconcilerBuilder::new().skip_group("stats").skip_group("logs"),
        );

        let verdict = reconciler.run_pass().await;
        assert_eq!(verdict.status, HealthStatus::Healthy);
        assert_eq!(verdict.message, "RunningContainers:7");
    }

    #[tokio::test]
    async fn test_sustained_failure_keeps_raising() {
        let counter = MockCounter::new(0);
        let reconciler = reconciler(counter.clone());
        assert!(reconciler.run_pass().await.accepted());

        counter.set(2);
        assert!(reconciler.run_pass().await.accepted());
        assert!(reconciler.run_pass().await.accepted());

        // Window is now [healthy, unhealthy, unhealthy].
        for _ in 0..3 {
            let verdict = reconciler.run_pass().await;
            assert!(matches!(
                verdict.outcome,
                Err(HealthError::PersistentFailure { capacity: 3, .. })
            ));
        }

        counter.set(0);
        let verdict = reconciler.run_pass().await;
        assert_eq!(verdict.status, HealthStatus::Healthy);
        assert!(verdict.accepted());
    }

    #[test]
    fn test_builder_requires_counter() {
        assert!(ReconcilerBuilder::new().build().is_err());
    }

    #[test]
    fn test_builder_rejects_zero_interval() {
        let result = ReconcilerBuilder::new()
            .counter(MockCounter::new(0))
            .interval(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }
}

mod heartbeat_tests {
    use super::*;

    #[tokio::test]
    async fn test_start_and_stop_every_category() {
        let reconciler = reconciler(MockCounter::new(0));

        for category in ["log", "logSkip", "stats"] {
            reconciler
                .apply_heartbeat(Heartbeat::routine(category, "id1", "start"))
                .await;
        }
        for category in ["log", "logSkip", "stats"] {
            assert_eq!(reconciler.registry().count(category).await, 1);
        }

        for category in ["log", "logSkip", "stats"] {
            reconciler
                .apply_heartbeat(Heartbeat::routine(category, "id1", "stop"))
                .await;
        }
        for category in ["log", "logSkip", "stats"] {
            assert_eq!(reconciler.registry().count(category).await, 0);
        }
    }

    #[tokio::test]
    async fn test_unknown_category_ignored() {
        let reconciler = reconciler(MockCounter::new(0));

        reconciler
            .apply_heartbeat(Heartbeat::routine("events", "id1", "start"))
            .await;

        assert_eq!(reconciler.registry().count("events").await, -1);
        for category in reconciler.registry().categories() {
            assert_eq!(reconciler.registry().count(&category).await, 0);
        }
    }

    #[tokio::test]
    async fn test_duplicate_start_keeps_count() {
        let reconciler = reconciler(MockCounter::new(0));

        reconciler
            .apply_heartbeat(Heartbeat::routine("log", "id1", "start"))
            .await;
        reconciler
            .apply_heartbeat(Heartbeat::routine("log", "id1", "start"))
            .await;

        assert_eq!(reconciler.registry().count("log").await, 1);
    }

    #[tokio::test]
    async fn test_other_action_refreshes_worker() {
        let reconciler = reconciler(MockCounter::new(0));
        let started = Utc.timestamp_opt(1505927762, 0).unwrap();
        let beat = Utc.timestamp_opt(1505927762 + 30, 0).unwrap();

        reconciler
            .apply_heartbeat(Heartbeat::routine("stats", "id1", "start").at(started))
            .await;
        reconciler
            .apply_heartbeat(Heartbeat::routine("stats", "id1", "running").at(beat))
            .await;
        reconciler
            .apply_heartbeat(Heartbeat::routine("stats", "ghost", "running").at(beat))
            .await;

        let handle = reconciler
            .registry()
            .worker("stats", "id1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handle.updated_at(), beat);
        assert_eq!(handle.status(), "start");
        assert_eq!(reconciler.registry().count("stats").await, 1);
    }

    #[tokio::test]
    async fn test_vitals_heartbeat_upserts() {
        let reconciler = reconciler(MockCounter::new(0));
        let t1 = Utc.timestamp_opt(1505927762, 0).unwrap();
        let t2 = Utc.timestamp_opt(1505927762 + 60, 0).unwrap();

        reconciler
            .apply_heartbeat(Heartbeat::vitals("docker-events", "init", t1))
            .await;
        reconciler
            .apply_heartbeat(Heartbeat::vitals("docker-events", "running", t2))
            .await;

        let record = reconciler.vitals().get("docker-events").unwrap();
        assert_eq!(record.last_state, "running");
        assert_eq!(record.last_seen_at, t2);
    }

    #[tokio::test]
    async fn test_handle_dispatch() {
        let reconciler = reconciler(MockCounter::new(0));

        let none = reconciler
            .handle(WatchdogEvent::Heartbeat(Heartbeat::routine("log", "a", "start")))
            .await;
        assert!(none.is_none());

        let verdict = reconciler.handle(WatchdogEvent::Tick).await.unwrap();
        assert_eq!(verdict.status, HealthStatus::Unhealthy);
    }
}

mod loop_tests {
    use super::*;

    async fn wait_for_status(debouncer: &HealthDebouncer, status: HealthStatus) -> bool {
        for _ in 0..200 {
            if debouncer.current_health().await.status == status {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_run_applies_heartbeats_and_ticks() {
        let counter = MockCounter::new(1);
        let reconciler = reconciler_with(
            counter,
            ReconcilerBuilder::new().interval(Duration::from_millis(20)),
        );
        let registry = reconciler.registry().clone();
        let debouncer = reconciler.debouncer().clone();

        let (tx, rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(reconciler.run(rx, shutdown_rx));

        tx.send(Heartbeat::routine("stats", "c1", "start")).await.unwrap();
        tx.send(Heartbeat::routine("log", "c1", "start")).await.unwrap();

        assert!(wait_for_status(&debouncer, HealthStatus::Healthy).await);
        assert_eq!(registry.count("stats").await, 1);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_when_channel_closes() {
        let reconciler = reconciler_with(
            MockCounter::new(0),
            ReconcilerBuilder::new().interval(Duration::from_secs(60)),
        );

        let (tx, rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(reconciler.run(rx, shutdown_rx));

        drop(tx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_when_shutdown_sender_dropped() {
        let reconciler = reconciler_with(
            MockCounter::new(0),
            ReconcilerBuilder::new().interval(Duration::from_secs(60)),
        );

        let (tx, rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let handle = tokio::spawn(reconciler.run(rx, shutdown_rx));

        drop(shutdown_tx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_start_stop_order_is_preserved() {
        let reconciler = reconciler_with(
            MockCounter::new(0),
            ReconcilerBuilder::new().interval(Duration::from_secs(60)),
        );
        let registry = reconciler.registry().clone();

        let (tx, rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(reconciler.run(rx, shutdown_rx));

        for _ in 0..10 {
            tx.send(Heartbeat::routine("log", "c1", "start")).await.unwrap();
            tx.send(Heartbeat::routine("log", "c1", "stop")).await.unwrap();
        }
        tx.send(Heartbeat::routine("log", "c2", "start")).await.unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        drop(shutdown_tx);

        assert_eq!(registry.list("log").await.unwrap(), vec!["c2"]);
    }
}
