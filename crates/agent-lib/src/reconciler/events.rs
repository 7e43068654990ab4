//! Events consumed by the reconciler
//!
//! Wire heartbeats are resolved into [`Heartbeat`] once, at the boundary.

use crate::error::HeartbeatError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const ROUTINE_PREFIX: &str = "routine.";
const VITALS_TYPE: &str = "vitals";

/// What a heartbeat is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatKind {
    /// Lifecycle of a worker in a routine category
    Routine { category: String },
    /// Liveness pulse of a named vitals signal
    Vitals,
}

impl HeartbeatKind {
    /// Label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            HeartbeatKind::Routine { .. } => "routine",
            HeartbeatKind::Vitals => "vitals",
        }
    }
}

/// Worker lifecycle transitions carried by routine heartbeats
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutineAction {
    Start,
    Stop,
    /// Any other action, treated as a liveness refresh
    Beat(String),
}

impl RoutineAction {
    pub fn parse(action: &str) -> Self {
        match action {
            "start" => RoutineAction::Start,
            "stop" => RoutineAction::Stop,
            other => RoutineAction::Beat(other.to_string()),
        }
    }
}

/// A resolved heartbeat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    pub kind: HeartbeatKind,
    pub actor: String,
    pub action: String,
    pub time: DateTime<Utc>,
}

impl Heartbeat {
    pub fn routine(
        category: impl Into<String>,
        actor: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            kind: HeartbeatKind::Routine {
                category: category.into(),
            },
            actor: actor.into(),
            action: action.into(),
            time: Utc::now(),
        }
    }

    pub fn vitals(name: impl Into<String>, state: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            kind: HeartbeatKind::Vitals,
            actor: name.into(),
            action: state.into(),
            time,
        }
    }

    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }
}

/// Heartbeat as it travels on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireHeartbeat {
    /// `routine.<category>` or `vitals`
    #[serde(rename = "type")]
    pub kind: String,
    pub actor: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

impl TryFrom<WireHeartbeat> for Heartbeat {
    type Error = HeartbeatError;

    fn try_from(wire: WireHeartbeat) -> Result<Self, Self::Error> {
        let kind = if wire.kind == VITALS_TYPE {
            HeartbeatKind::Vitals
        } else if let Some(category) = wire.kind.strip_prefix(ROUTINE_PREFIX) {
            if category.is_empty() {
                return Err(HeartbeatError::UnknownType(wire.kind));
            }
            HeartbeatKind::Routine {
                category: category.to_string(),
            }
        } else {
            return Err(HeartbeatError::UnknownType(wire.kind));
        };

        Ok(Heartbeat {
            kind,
            actor: wire.actor,
            action: wire.action,
            time: wire.time.unwrap_or_else(Utc::now),
        })
    }
}

/// Everything the reconciler reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchdogEvent {
    Heartbeat(Heartbeat),
    /// Run one reconciliation pass
    Tick,
}
