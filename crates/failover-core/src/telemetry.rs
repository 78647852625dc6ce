//! Telemetry store collaborator contract (spec §6.1). The engine only ever
//! calls `add_sample`/`recent_samples`; persistence and retention policy are
//! the collaborator's own concern.

use crate::model::Sample;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

pub trait TelemetryStore: Send + Sync {
    fn add_sample(&self, sample: Sample);
    fn recent_samples(&self, member: &str, since: Duration) -> Vec<Sample>;
}

/// Discards every sample; used when no telemetry collaborator is wired up.
pub struct NullTelemetryStore;

impl TelemetryStore for NullTelemetryStore {
    fn add_sample(&self, _sample: Sample) {}
    fn recent_samples(&self, _member: &str, _since: Duration) -> Vec<Sample> {
        Vec::new()
    }
}

/// Bounded in-memory store, useful for tests and for embedders that don't
/// need the real long-term time-series collaborator (out of scope per
/// spec.md §1).
pub struct InMemoryTelemetryStore {
    per_member: Mutex<HashMap<String, Vec<Sample>>>,
    capacity_per_member: usize,
}

impl InMemoryTelemetryStore {
    pub fn new(capacity_per_member: usize) -> Self {
        Self {
            per_member: Mutex::new(HashMap::new()),
            capacity_per_member,
        }
    }
}

impl Default for InMemoryTelemetryStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl TelemetryStore for InMemoryTelemetryStore {
    fn add_sample(&self, sample: Sample) {
        let mut guard = self.per_member.lock();
        let entries = guard.entry(sample.member.clone()).or_default();
        entries.push(sample);
        if entries.len() > self.capacity_per_member {
            let excess = entries.len() - self.capacity_per_member;
            entries.drain(0..excess);
        }
    }

    fn recent_samples(&self, member: &str, since: Duration) -> Vec<Sample> {
        let guard = self.per_member.lock();
        let Some(entries) = guard.get(member) else {
            return Vec::new();
        };
        let cutoff: DateTime<Utc> = Utc::now() - chrono::Duration::from_std(since).unwrap_or_default();
        entries.iter().filter(|s| s.timestamp >= cutoff).cloned().collect()
    }
}
