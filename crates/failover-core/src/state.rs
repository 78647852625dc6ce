//! C2 — Member State Table. Owns all `MemberState` records exclusively;
//! external readers only ever see value-copied snapshots.

use crate::config::EngineConfig;
use crate::model::{IneligibilityCode, Member, MemberState, Metrics, Score};
use crate::ring::RingBuffer;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Per-member instant-score history used to compute the rolling window
/// average. Bounded generously; only samples inside `history_window_s` are
/// ever averaged.
struct InstantHistory {
    samples: RingBuffer<(DateTime<Utc>, f64)>,
}

impl InstantHistory {
    fn new() -> Self {
        Self {
            samples: RingBuffer::new(4096),
        }
    }

    fn push(&mut self, at: DateTime<Utc>, instant: f64) {
        self.samples.push((at, instant));
    }

    fn recent(&self, now: DateTime<Utc>, window_s: f64) -> Vec<f64> {
        if window_s <= 0.0 {
            return Vec::new();
        }
        let cutoff = now - chrono::Duration::milliseconds((window_s * 1000.0) as i64);
        self.samples
            .iter()
            .filter(|(ts, _)| *ts >= cutoff && *ts < now)
            .map(|(_, v)| *v)
            .collect()
    }
}

pub struct StateTable {
    states: HashMap<String, MemberState>,
    history: HashMap<String, InstantHistory>,
    current_primary: Option<String>,
}

impl StateTable {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
            history: HashMap::new(),
            current_primary: None,
        }
    }

    /// Idempotent insert-or-update: upsert the record, recompute its score,
    /// then refresh eligibility. Returns the instant score for the caller to
    /// forward to the telemetry store.
    pub fn update_member(
        &mut self,
        cfg: &EngineConfig,
        member: Member,
        metrics: Metrics,
        now: DateTime<Utc>,
    ) -> (f64, f64, f64) {
        let name = member.name.clone();
        let (instant, components) = crate::scorer::score_instant(cfg, member.class, &metrics);

        let hist = self.history.entry(name.clone()).or_insert_with(InstantHistory::new);
        let recent = hist.recent(now, cfg.history_window_s);
        let window_avg = crate::scorer::window_average(cfg.history_window_s, instant, &recent);
        hist.push(now, instant);

        let entry = self.states.entry(name.clone()).or_insert_with(|| MemberState {
            member: member.clone(),
            metrics: Metrics::default(),
            score: Score::zero(now),
            eligible: false,
            ineligible_reason: Some(IneligibilityCode::Warmup),
            cooldown_until: None,
            up_since: member.up_since,
        });

        entry.member = member;
        entry.metrics = metrics;
        crate::scorer::apply_instant(cfg, &mut entry.score, instant, components, window_avg, now);

        let (eligible, reason) = crate::eligibility::evaluate(cfg, entry, now);
        entry.eligible = eligible;
        entry.ineligible_reason = reason;

        (instant, entry.score.ewma, entry.score.final_score)
    }

    pub fn get(&self, name: &str) -> Option<&MemberState> {
        self.states.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut MemberState> {
        self.states.get_mut(name)
    }

    /// Snapshot copy of every tracked member.
    pub fn snapshot(&self) -> HashMap<String, MemberState> {
        self.states.clone()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.states.keys()
    }

    pub fn current_primary(&self) -> Option<&str> {
        self.current_primary.as_deref()
    }

    pub fn set_current(&mut self, name: Option<String>) {
        self.current_primary = name;
    }

    pub fn set_cooldown(&mut self, name: &str, until: DateTime<Utc>) {
        if let Some(state) = self.states.get_mut(name) {
            state.cooldown_until = Some(until);
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.states.remove(name);
        self.history.remove(name);
        if self.current_primary.as_deref() == Some(name) {
            self.current_primary = None;
        }
    }
}

impl Default for StateTable {
    fn default() -> Self {
        Self::new()
    }
}
