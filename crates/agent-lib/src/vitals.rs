//! Freshness tracking for auxiliary liveness signals
//!
//! Each vitals name keeps only its latest state and the time it was seen.
//! Ages are computed when a snapshot is taken, never stored.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Latest observation of a named vitals signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VitalsRecord {
    pub name: String,
    pub last_state: String,
    pub last_seen_at: DateTime<Utc>,
}

impl VitalsRecord {
    /// Time elapsed between the last observation and `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_seen_at
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> VitalsSnapshot {
        VitalsSnapshot {
            status: self.last_state.clone(),
            time_updated: format_timestamp(self.last_seen_at),
            time_ago: format_elapsed(self.age(now)),
        }
    }
}

/// Read-time view of a vitals record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitalsSnapshot {
    pub status: String,
    pub time_updated: String,
    pub time_ago: String,
}

/// Thread-safe vitals records keyed by name
#[derive(Debug, Default)]
pub struct VitalsTracker {
    records: DashMap<String, VitalsRecord>,
}

impl VitalsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite the record for `name`
    pub fn upsert(&self, name: &str, state: &str, at: DateTime<Utc>) {
        self.records
            .entry(name.to_string())
            .and_modify(|record| {
                record.last_state = state.to_string();
                record.last_seen_at = at;
            })
            .or_insert_with(|| VitalsRecord {
                name: name.to_string(),
                last_state: state.to_string(),
                last_seen_at: at,
            });
    }

    pub fn get(&self, name: &str) -> Option<VitalsRecord> {
        self.records.get(name).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of every record, with ages relative to `now`
    pub fn snapshot(&self, now: DateTime<Utc>) -> BTreeMap<String, VitalsSnapshot> {
        self.records
            .iter()
            .map(|r| (r.key().clone(), r.value().snapshot(now)))
            .collect()
    }
}

/// RFC 3339 in UTC with up to nanosecond precision. Trailing zeros of the
/// fraction are dropped, and so is the fraction itself when it is zero.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    let secs = at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let nanos = at.nanosecond() % 1_000_000_000;
    if nanos == 0 {
        return secs;
    }

    let fraction = format!("{:09}", nanos);
    let fraction = fraction.trim_end_matches('0');
    format!("{}.{}Z", secs.trim_end_matches('Z'), fraction)
}

/// Render a duration the way operators read it: `1h0m0s`, `2m30.5s`, `150ms`.
pub fn format_elapsed(elapsed: chrono::Duration) -> String {
    let negative = elapsed < chrono::Duration::zero();
    let nanos = elapsed
        .num_nanoseconds()
        .map(|n| n.unsigned_abs() as u128)
        .unwrap_or_else(|| elapsed.num_milliseconds().unsigned_abs() as u128 * 1_000_000);

    let mut out = String::new();
    if negative {
        out.push('-');
    }

    if nanos == 0 {
        out.push_str("0s");
        return out;
    }

    if nanos < 1_000_000_000 {
        let (value, unit, scale) = if nanos < 1_000 {
            (nanos, "ns", 1)
        } else if nanos < 1_000_000 {
            (nanos, "µs", 1_000)
        } else {
            (nanos, "ms", 1_000_000)
        };
        out.push_str(&trim_fraction(value, scale));
        out.push_str(unit);
        return out;
    }

    let total_secs = nanos / 1_000_000_000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs_nanos = nanos % 60_000_000_000;

    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&trim_fraction(secs_nanos, 1_000_000_000));
    out.push('s');
    out
}

/// `value / scale` with trailing fractional zeros dropped
fn trim_fraction(value: u128, scale: u128) -> String {
    let whole = value / scale;
    let frac = value % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let width = scale.to_string().len() - 1;
    let digits = format!("{:0width$}", frac, width = width);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
