//! C10 — Orchestration Tick and the `Engine` that wires every component
//! together behind one exclusive lock (spec §5). `update_member` is called
//! once per member per tick; `evaluate_switch` runs exactly once after all
//! members have been refreshed.

use crate::arbiter;
use crate::audit::AuditSink;
use crate::config::EngineConfig;
use crate::controller::Controller;
use crate::dominance::{self, DominanceTracker};
use crate::error::{FailoverError, Result};
use crate::model::{
    Class, DecisionEvent, DecisionEventType, DecisionStats, Member, MemberSnapshot, MemberState,
    Metrics, Sample, SwitchEvent, SwitchType, ThresholdSnapshot,
};
use crate::notifier::{self, Notifier};
use crate::obstruction::{self, ObstructionSubEngine};
use crate::preemptive::{self, PreemptiveInputs};
use crate::predictive::PredictiveEngine;
use crate::ring::RingBuffer;
use crate::state::StateTable;
use crate::telemetry::TelemetryStore;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct EngineState {
    table: StateTable,
    dominance: DominanceTracker,
    predictive: PredictiveEngine,
    obstruction: ObstructionSubEngine,
    event_history: RingBuffer<SwitchEvent>,
    last_switch: Option<Instant>,
    rsrp_history: HashMap<String, VecDeque<f64>>,
}

/// The Decision Core. Owns all member/event state; every public method
/// acquires the shared exclusive lock on entry and releases it on return
/// (spec §5).
pub struct Engine {
    cfg: EngineConfig,
    state: RwLock<EngineState>,
    telemetry: Arc<dyn TelemetryStore>,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn Notifier>,
    controller: Arc<dyn Controller>,
}

impl Engine {
    pub fn new(
        cfg: EngineConfig,
        telemetry: Arc<dyn TelemetryStore>,
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn Notifier>,
        controller: Arc<dyn Controller>,
    ) -> Self {
        let predictive = PredictiveEngine::new(&cfg);
        let capacity = cfg.max_event_history;
        Self {
            state: RwLock::new(EngineState {
                table: StateTable::new(),
                dominance: DominanceTracker::new(),
                predictive,
                obstruction: ObstructionSubEngine::new(),
                event_history: RingBuffer::new(capacity),
                last_switch: None,
                rsrp_history: HashMap::new(),
            }),
            cfg,
            telemetry,
            audit,
            notifier,
            controller,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// `UpdateMember`: idempotent upsert, scorer recompute, eligibility
    /// refresh, predictive/obstruction history update, and a telemetry
    /// sample forwarded to the store (spec §4.2).
    #[tracing::instrument(skip(self, metrics), fields(member = %member.name))]
    pub fn update_member(&self, member: Member, metrics: Metrics) {
        let now = Utc::now();
        let name = member.name.clone();
        let class = member.class;

        let mut state = self.state.write();
        let (instant, ewma, final_score) = state.table.update_member(&self.cfg, member, metrics.clone(), now);
        state.predictive.record(&self.cfg, &name, &metrics, final_score, now);
        if class == Class::Starlink {
            state.obstruction.record(&name, &metrics, now);
        }
        if class == Class::Cellular {
            if let Some(rsrp) = metrics.rsrp {
                let history = state.rsrp_history.entry(name.clone()).or_default();
                history.push_back(rsrp);
                if history.len() > 3 {
                    history.pop_front();
                }
            }
        }
        drop(state);

        self.telemetry.add_sample(Sample {
            timestamp: now,
            member: name,
            metrics,
            instant_score: instant,
            ewma_score: ewma,
            final_score,
        });
    }

    pub fn remove_member(&self, name: &str) {
        let mut state = self.state.write();
        state.table.remove(name);
        state.predictive.remove(name);
        state.obstruction.reset_member(name);
        state.rsrp_history.remove(name);
    }

    pub fn get_current_primary(&self) -> Option<String> {
        self.state.read().table.current_primary().map(|s| s.to_string())
    }

    pub fn get_member_states(&self) -> HashMap<String, MemberState> {
        self.state.read().table.snapshot()
    }

    pub fn get_event_history(&self) -> Vec<SwitchEvent> {
        let state = self.state.read();
        state.event_history.newest_first(state.event_history.len()).into_iter().cloned().collect()
    }

    pub fn get_decisions(&self, since: Option<chrono::DateTime<Utc>>, limit: usize) -> Vec<DecisionEvent> {
        self.audit.get_decisions(since, limit)
    }

    pub fn get_decision_stats(&self, since: Option<chrono::DateTime<Utc>>) -> DecisionStats {
        self.audit.get_decision_stats(since)
    }

    /// Hook for a movement signal from an external GPS/accelerometer
    /// collaborator (spec §4.7): resets the obstruction sub-engine's rolling
    /// windows, since prior obstruction history is meaningless after the
    /// dish has been repositioned.
    pub fn on_movement_detected(&self, member: &str) {
        self.state.write().obstruction.reset_member(member);
    }

    /// Persists every per-member online ML model to `ml_model_path`
    /// (spec §6.4's `ml_models.json`). Called periodically by the daemon
    /// and from its shutdown path so trained weights survive a restart.
    pub fn save_models(&self) -> Result<()> {
        self.state.read().predictive.save_models()
    }

    /// Flushes the audit sink's buffered writers. Called from the daemon's
    /// shutdown path so the last decision is durable on disk before exit.
    pub fn flush_audit(&self) {
        self.audit.flush();
    }

    /// `EvaluateSwitch`: the full tick outline from spec §4.5, steps 1-9.
    #[tracing::instrument(skip(self))]
    pub fn evaluate_switch(&self) -> Result<Option<SwitchEvent>> {
        let tick_start = Instant::now();
        let now = Utc::now();
        let now_instant = Instant::now();
        let cfg = &self.cfg;

        let mut state = self.state.write();
        let states = state.table.snapshot();
        let current_name = state.table.current_primary().map(|s| s.to_string());
        let current_state = current_name.as_ref().and_then(|n| states.get(n)).cloned();
        let current_was_tracked = current_name.is_some();

        let decision_id = arbiter::new_decision_id(now);
        let thresholds = threshold_snapshot(cfg);
        let member_snapshots = snapshot_map(&states);

        macro_rules! log_evaluation {
            ($trigger:expr, $extra:expr) => {
                self.audit.log_decision(DecisionEvent {
                    timestamp: now,
                    decision_id: decision_id.clone(),
                    event_type: DecisionEventType::Evaluation,
                    trigger_reason: $trigger.to_string(),
                    from: current_name.clone(),
                    to: None,
                    success: true,
                    error: None,
                    duration_ms: tick_start.elapsed().as_secs_f64() * 1000.0,
                    predictive: false,
                    score_delta: None,
                    member_snapshots: member_snapshots.clone(),
                    thresholds: thresholds.clone(),
                    extra: $extra,
                });
            };
        }

        // Step 1: best eligible member by Final score.
        let Some((best_name, best_score)) = arbiter::select_best(&states) else {
            log_evaluation!("no_eligible_members", HashMap::new());
            return Ok(None);
        };

        // Step 2: already current.
        if current_name.as_deref() == Some(best_name.as_str()) {
            log_evaluation!("maintain_current", HashMap::new());
            return Ok(None);
        }

        // Step 3: cooldown.
        if let Some(last_switch) = state.last_switch {
            let cooldown = Duration::from_secs_f64(cfg.cooldown_s.max(0.0));
            let elapsed = now_instant.saturating_duration_since(last_switch);
            if elapsed < cooldown {
                let remaining = (cooldown - elapsed).as_secs_f64();
                log_evaluation!("cooldown_active", HashMap::from([("remaining_s".to_string(), serde_json::json!(remaining))]));
                return Ok(None);
            }
        }

        // Step 4: delta vs current (no-current treated as delta = best).
        let current_final = current_state.as_ref().map(|s| s.score.final_score).unwrap_or(0.0);
        let delta = if current_state.is_some() { best_score - current_final } else { best_score };

        // Step 5: margin.
        if delta < cfg.switch_margin {
            log_evaluation!("insufficient_margin", HashMap::from([("score_delta".to_string(), serde_json::json!(delta))]));
            return Ok(None);
        }

        // Step 6: dominance — initial selection bypasses duration entirely
        // (spec §9 open question #2, resolved literally).
        if current_state.is_some() {
            state.dominance.observe(&best_name, delta, cfg.switch_margin, false, now_instant);
            let current_is_good = current_state.as_ref().map(|s| s.score.is_good()).unwrap_or(false);
            let required = dominance::required_duration_s(current_is_good, cfg.restore_min_duration_s, cfg.fail_min_duration_s);
            let observed = state.dominance.duration_s(&best_name, now_instant).unwrap_or(0.0);
            if observed < required {
                log_evaluation!(
                    "insufficient_duration",
                    HashMap::from([
                        ("required_s".to_string(), serde_json::json!(required)),
                        ("observed_s".to_string(), serde_json::json!(observed)),
                    ])
                );
                return Ok(None);
            }
        }

        // Step 7: classify.
        let best_state = states.get(&best_name).expect("best_name came from this snapshot").clone();
        let mut switch_type = if current_state.is_none() || !current_state.as_ref().unwrap().score.is_good() {
            SwitchType::Failover
        } else {
            SwitchType::Failback
        };
        let mut reason = arbiter::reason_code(cfg, current_state.as_ref(), &best_state, current_was_tracked).to_string();

        if cfg.enable_predictive {
            if let Some(current) = current_state.as_ref() {
                let recent_latency_30s = state.predictive.recent_points(&current.member.name, now, 30.0);
                let recent_loss_15s = state.predictive.recent_points(&current.member.name, now, 15.0);
                let obstruction_pred = if current.member.class == Class::Starlink {
                    state.obstruction.predict(cfg, &current.member.name, now)
                } else {
                    None
                };
                let obstruction_trend = obstruction_pred.as_ref().map(|p| p.slope);
                let recent_rsrp: Vec<f64> = state
                    .rsrp_history
                    .get(&current.member.name)
                    .map(|h| h.iter().copied().collect())
                    .unwrap_or_default();

                let inputs = PreemptiveInputs {
                    current,
                    recent_latency_30s: &recent_latency_30s,
                    recent_loss_15s: &recent_loss_15s,
                    obstruction_trend_pct_per_min: obstruction_trend,
                    recent_rsrp: &recent_rsrp,
                };
                if let Some(trigger) = preemptive::should_trigger(cfg, &inputs) {
                    switch_type = SwitchType::Predictive;
                    reason = trigger.to_string();
                } else if let Some(pred) = obstruction_pred {
                    if obstruction::should_proactively_failover(cfg, &pred) {
                        switch_type = SwitchType::Predictive;
                        reason = pred.predicted_issue.clone();
                    }
                } else {
                    let ensembled = state.predictive.predict(cfg, &current.member.name);
                    if ensembled.risk >= 0.5 && ensembled.confidence >= cfg.prediction_confidence_threshold {
                        switch_type = SwitchType::Predictive;
                        reason = format!("predictive_{}", ensembled.method);
                    }
                }
            }
        }

        // Step 8: build the event.
        let switch_event = SwitchEvent {
            timestamp: now,
            switch_type,
            from: current_name.clone(),
            to: best_name.clone(),
            reason: reason.clone(),
            score_delta: delta,
            decision_id: decision_id.clone(),
        };

        // Step 9: commit state mutations before calling the controller, so
        // the attempted action is recorded even if the controller fails.
        state.event_history.push(switch_event.clone());
        state.table.set_current(Some(best_name.clone()));
        state.last_switch = Some(now_instant);
        state.dominance.clear();
        if let Some(prev) = &current_name {
            let cooldown_until = now + chrono::Duration::milliseconds((cfg.cooldown_s * 1000.0) as i64);
            state.table.set_cooldown(prev, cooldown_until);
        }
        drop(state);

        let controller_result = self.controller.switch(switch_event.from.as_deref(), &switch_event.to);

        self.audit.log_decision(DecisionEvent {
            timestamp: now,
            decision_id: decision_id.clone(),
            event_type: DecisionEventType::Action,
            trigger_reason: reason,
            from: switch_event.from.clone(),
            to: Some(switch_event.to.clone()),
            success: controller_result.is_ok(),
            error: controller_result.as_ref().err().map(|e| e.to_string()),
            duration_ms: tick_start.elapsed().as_secs_f64() * 1000.0,
            predictive: switch_type == SwitchType::Predictive,
            score_delta: Some(delta),
            member_snapshots,
            thresholds,
            extra: HashMap::new(),
        });

        let notification = notifier::build_notification(&switch_event, &states);
        notifier::dispatch(Arc::clone(&self.notifier), notification);

        if let Err(source) = controller_result {
            return Err(FailoverError::Controller {
                from: switch_event.from.clone(),
                to: switch_event.to.clone(),
                source,
            });
        }

        Ok(Some(switch_event))
    }

    /// Single cycle (spec §4.10 / §2 data flow): ingest every member's
    /// latest metrics, then evaluate exactly once. The caller drives the
    /// cadence; no background work is implicit.
    pub fn tick(&self, updates: Vec<(Member, Metrics)>) -> Result<Option<SwitchEvent>> {
        for (member, metrics) in updates {
            self.update_member(member, metrics);
        }
        self.evaluate_switch()
    }
}

fn member_snapshot(state: &MemberState) -> MemberSnapshot {
    MemberSnapshot {
        metrics: state.metrics.clone(),
        instant: state.score.instant,
        ewma: state.score.ewma,
        window_avg: state.score.window_avg,
        final_score: state.score.final_score,
        components: state.score.components.clone(),
        eligible: state.eligible,
    }
}

fn snapshot_map(states: &HashMap<String, MemberState>) -> HashMap<String, MemberSnapshot> {
    states.iter().map(|(k, v)| (k.clone(), member_snapshot(v))).collect()
}

fn threshold_snapshot(cfg: &EngineConfig) -> ThresholdSnapshot {
    ThresholdSnapshot {
        switch_margin: cfg.switch_margin,
        cooldown_s: cfg.cooldown_s,
        history_window_s: cfg.history_window_s,
        fail_min_duration_s: cfg.fail_min_duration_s,
        restore_min_duration_s: cfg.restore_min_duration_s,
    }
}
