//! Debounced health state
//!
//! Keeps a short, fixed-capacity history of health verdicts so a single bad
//! check cannot flip the public status, while a failure that outlasts the
//! whole window keeps being reported until a healthy verdict arrives.

use crate::error::HealthError;
use crate::models::{HealthSample, HealthStatus};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default number of retained verdicts
pub const DEFAULT_WINDOW_CAPACITY: usize = 3;

/// Fixed-capacity FIFO of health samples, never empty
#[derive(Debug, Clone)]
pub struct HealthWindow {
    samples: VecDeque<HealthSample>,
    capacity: usize,
}

impl HealthWindow {
    /// Create a window seeded with the "starting" sentinel
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut samples = VecDeque::with_capacity(capacity);
        samples.push_back(HealthSample::sentinel());
        Self { samples, capacity }
    }

    /// Append a sample, evicting the oldest when full
    pub fn push(&mut self, sample: HealthSample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    /// Still holding only the sentinel
    pub fn is_pristine(&self) -> bool {
        self.samples.len() == 1
    }

    pub fn latest(&self) -> &HealthSample {
        // Never empty: seeded on construction, push only after eviction.
        &self.samples[self.samples.len() - 1]
    }

    pub fn samples(&self) -> impl Iterator<Item = &HealthSample> {
        self.samples.iter()
    }

    /// Oldest sample healthy and every later one unhealthy
    fn failure_persisted(&self) -> bool {
        let mut iter = self.samples.iter();
        match iter.next() {
            Some(oldest) if oldest.status == HealthStatus::Healthy => {
                iter.all(|s| s.status == HealthStatus::Unhealthy)
            }
            _ => false,
        }
    }

    /// Apply one verdict to the window, or refuse it without mutation
    pub fn submit(&mut self, sample: HealthSample) -> Result<(), HealthError> {
        if !sample.status.is_healthy() {
            if self.is_pristine() {
                return Err(HealthError::Initialization {
                    status: sample.status,
                });
            }
            if self.is_full() && self.failure_persisted() {
                return Err(HealthError::PersistentFailure {
                    capacity: self.capacity,
                    window: self.samples.iter().cloned().collect(),
                });
            }
        }
        self.push(sample);
        Ok(())
    }
}

/// Shared anti-flapping health state
#[derive(Debug, Clone)]
pub struct HealthDebouncer {
    window: Arc<RwLock<HealthWindow>>,
}

impl Default for HealthDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthDebouncer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WINDOW_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            window: Arc::new(RwLock::new(HealthWindow::new(capacity))),
        }
    }

    /// Submit a verdict
    pub async fn set_health(
        &self,
        status: HealthStatus,
        message: impl Into<String>,
    ) -> Result<(), HealthError> {
        let mut window = self.window.write().await;
        window.submit(HealthSample::new(status, message))
    }

    pub async fn set_healthy(&self, message: impl Into<String>) -> Result<(), HealthError> {
        self.set_health(HealthStatus::Healthy, message).await
    }

    pub async fn set_unhealthy(&self, message: impl Into<String>) -> Result<(), HealthError> {
        self.set_health(HealthStatus::Unhealthy, message).await
    }

    /// Most recently accepted sample
    pub async fn current_health(&self) -> HealthSample {
        self.window.read().await.latest().clone()
    }

    /// Retained samples, oldest first
    pub async fn history(&self) -> Vec<HealthSample> {
        self.window.read().await.samples().cloned().collect()
    }

    pub async fn capacity(&self) -> usize {
        self.window.read().await.capacity()
    }
}
