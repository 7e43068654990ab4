//! Read-only status views for the HTTP boundary

use crate::health::HealthDebouncer;
use crate::models::HealthStatus;
use crate::routines::RoutineRegistry;
use crate::vitals::{VitalsSnapshot, VitalsTracker};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

/// Structured health body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub status: HealthStatus,
    pub message: String,
    /// Category to comma-joined, sorted worker ids
    pub routines: BTreeMap<String, String>,
    pub vitals: BTreeMap<String, VitalsSnapshot>,
}

/// Builds views over the registry, the vitals tracker and the debouncer
#[derive(Debug, Clone)]
pub struct StatusPresenter {
    registry: Arc<RoutineRegistry>,
    vitals: Arc<VitalsTracker>,
    debouncer: HealthDebouncer,
}

impl StatusPresenter {
    pub fn new(
        registry: Arc<RoutineRegistry>,
        vitals: Arc<VitalsTracker>,
        debouncer: HealthDebouncer,
    ) -> Self {
        Self {
            registry,
            vitals,
            debouncer,
        }
    }

    pub async fn view(&self) -> StatusView {
        self.view_at(Utc::now()).await
    }

    /// Structured view with vitals ages relative to `now`
    pub async fn view_at(&self, now: DateTime<Utc>) -> StatusView {
        let health = self.debouncer.current_health().await;
        let routines = self
            .registry
            .snapshot()
            .await
            .into_iter()
            .map(|(category, ids)| (category, ids.join(",")))
            .collect();

        StatusView {
            status: health.status,
            message: health.message,
            routines,
            vitals: self.vitals.snapshot(now),
        }
    }

    /// Text view: a health line, then one line per category
    pub async fn text(&self) -> String {
        let health = self.debouncer.current_health().await;
        let mut out = format!("health:{} | msg:{}\n", health.status, health.message);

        for (category, ids) in self.registry.snapshot().await {
            let _ = writeln!(out, "{:<15}: | {:<2} | {}", category, ids.len(), ids.join(","));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn presenter(categories: &[&str]) -> StatusPresenter {
        StatusPresenter::new(
            Arc::new(RoutineRegistry::new(categories.iter().copied())),
            Arc::new(VitalsTracker::new()),
            HealthDebouncer::new(),
        )
    }

    #[tokio::test]
    async fn test_text_view() {
        let presenter = presenter(&["test"]);
        presenter.registry.add_worker("test", "id2").await.unwrap();
        presenter.registry.add_worker("test", "id1").await.unwrap();

        assert_eq!(
            presenter.text().await,
            "health:starting | msg:Just started\n\
             test           : | 2  | id1,id2\n"
        );
    }

    #[tokio::test]
    async fn test_text_view_orders_categories() {
        let presenter = presenter(&["stats", "log", "logSkip"]);
        presenter.registry.add_worker("stats", "s1").await.unwrap();
        presenter.debouncer.set_healthy("all good").await.unwrap();

        let text = presenter.text().await;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "health:healthy | msg:all good",
                "log            : | 0  | ",
                "logSkip        : | 0  | ",
                "stats          : | 1  | s1",
            ]
        );
    }

    #[tokio::test]
    async fn test_structured_view() {
        let presenter = presenter(&["test"]);
        presenter.registry.add_worker("test", "id1").await.unwrap();
        presenter.registry.add_worker("test", "id2").await.unwrap();

        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let t1h = now + Duration::hours(1);
        let t2h = t1h + Duration::hours(1);
        presenter.vitals.upsert("v1", "init", now);
        presenter.vitals.upsert("v1", "running", t1h);

        let view = presenter.view_at(t2h).await;
        assert_eq!(view.status, HealthStatus::Starting);
        assert_eq!(view.message, "Just started");
        assert_eq!(view.routines["test"], "id1,id2");
        assert_eq!(view.vitals["v1"].status, "running");
        assert_eq!(view.vitals["v1"].time_ago, "1h0m0s");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "starting");
        assert_eq!(json["routines"]["test"], "id1,id2");
        assert_eq!(
            json["vitals"]["v1"]["time_updated"],
            "2023-11-14T23:13:20Z"
        );
    }
}
