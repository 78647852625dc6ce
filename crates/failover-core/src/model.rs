//! Core data types shared across the scorer, state table, arbiter and
//! predictive engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Category of WAN member, governing class weight and class-specific signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Class {
    Starlink,
    Cellular,
    Wifi,
    Lan,
    Other,
}

impl Class {
    pub fn default_weight(self) -> f64 {
        match self {
            Class::Starlink => 1.0,
            Class::Cellular => 0.8,
            Class::Lan => 0.7,
            Class::Wifi => 0.6,
            Class::Other => 0.5,
        }
    }
}

impl std::fmt::Display for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Class::Starlink => "starlink",
            Class::Cellular => "cellular",
            Class::Wifi => "wifi",
            Class::Lan => "lan",
            Class::Other => "other",
        };
        f.write_str(s)
    }
}

/// Immutable-per-tick descriptor of a WAN interface participating in failover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub class: Class,
    pub iface: String,
    pub enabled: bool,
    pub weight: i32,
    pub policy_tag: String,
    pub up_since: Option<DateTime<Utc>>,
}

impl Member {
    pub fn new(name: impl Into<String>, class: Class, iface: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class,
            iface: iface.into(),
            enabled: true,
            weight: 1,
            policy_tag: String::new(),
            up_since: None,
        }
    }
}

/// One measurement pushed by a collector. All fields optional; an absent
/// field contributes no penalty anywhere downstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub latency_ms: Option<f64>,
    pub packet_loss_pct: Option<f64>,
    pub jitter_ms: Option<f64>,

    // cellular
    pub rsrp: Option<f64>,
    pub rsrq: Option<f64>,
    pub sinr: Option<f64>,
    pub roaming: Option<bool>,

    // wifi
    pub signal_strength: Option<f64>,
    pub snr: Option<f64>,

    // starlink (snr field shared with wifi above)
    pub obstruction_pct: Option<f64>,
    pub fraction_obstructed: Option<f64>,
    pub time_obstructed: Option<f64>,
    pub valid_duration_s: Option<f64>,
    pub patches_valid: Option<u32>,
    pub currently_obstructed: Option<bool>,
    pub prolonged_interval_s: Option<f64>,
    pub is_above_noise_floor: Option<bool>,
    pub is_persistently_low: Option<bool>,
    pub thermal_throttle: Option<bool>,
    pub swupdate_reboot_ready: Option<bool>,
    pub outages: Option<u32>,
}

/// Per-member breakdown of the sub-scoring curves, used in audit records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub latency: f64,
    pub loss: f64,
    pub jitter: f64,
}

/// Blended health score, always within [0,100].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub instant: f64,
    pub ewma: f64,
    pub window_avg: f64,
    pub final_score: f64,
    pub last_update: DateTime<Utc>,
    pub components: ScoreComponents,
    /// Whether `ewma` has been seeded by a first observation yet.
    pub ewma_seeded: bool,
}

impl Score {
    pub fn zero(now: DateTime<Utc>) -> Self {
        Self {
            instant: 0.0,
            ewma: 0.0,
            window_avg: 0.0,
            final_score: 0.0,
            last_update: now,
            components: ScoreComponents::default(),
            ewma_seeded: false,
        }
    }

    /// Recomputes `final_score` from the weighted blend invariant and clamps
    /// every component field to `[0, 100]`.
    pub fn recompute_final(&mut self) {
        self.instant = self.instant.clamp(0.0, 100.0);
        self.ewma = self.ewma.clamp(0.0, 100.0);
        self.window_avg = self.window_avg.clamp(0.0, 100.0);
        self.final_score = (0.30 * self.instant + 0.50 * self.ewma + 0.20 * self.window_avg)
            .clamp(0.0, 100.0);
    }

    pub fn is_good(&self) -> bool {
        self.final_score > 50.0
    }
}

/// Why a member is currently ineligible to be selected as primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibilityCode {
    Disabled,
    Warmup,
    Cooldown,
    Dead,
}

impl std::fmt::Display for IneligibilityCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IneligibilityCode::Disabled => "disabled",
            IneligibilityCode::Warmup => "warmup",
            IneligibilityCode::Cooldown => "cooldown",
            IneligibilityCode::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// Per-member record owned exclusively by the state table. Snapshots handed
/// to callers (`GetMemberStates`) are value copies of this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberState {
    pub member: Member,
    pub metrics: Metrics,
    pub score: Score,
    pub eligible: bool,
    pub ineligible_reason: Option<IneligibilityCode>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub up_since: Option<DateTime<Utc>>,
}

/// Kind of transition recorded by a `SwitchEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchType {
    Failover,
    Failback,
    Predictive,
}

/// Immutable record of a primary change, appended to a bounded ring of the
/// most recent 100 events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchEvent {
    pub timestamp: DateTime<Utc>,
    pub switch_type: SwitchType,
    pub from: Option<String>,
    pub to: String,
    pub reason: String,
    pub score_delta: f64,
    pub decision_id: String,
}

/// Kind of audit record: a no-op evaluation, or one that resulted in a
/// `SwitchEvent` being emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionEventType {
    Evaluation,
    Action,
}

/// Full audit record for one tick's `EvaluateSwitch` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub timestamp: DateTime<Utc>,
    pub decision_id: String,
    pub event_type: DecisionEventType,
    pub trigger_reason: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: f64,
    pub predictive: bool,
    pub score_delta: Option<f64>,
    pub member_snapshots: HashMap<String, MemberSnapshot>,
    pub thresholds: ThresholdSnapshot,
    pub extra: HashMap<String, serde_json::Value>,
}

/// Per-member metrics + quality-factor breakdown embedded in a `DecisionEvent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSnapshot {
    pub metrics: Metrics,
    pub instant: f64,
    pub ewma: f64,
    pub window_avg: f64,
    pub final_score: f64,
    pub components: ScoreComponents,
    pub eligible: bool,
}

/// Thresholds and windows in effect at decision time, embedded for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdSnapshot {
    pub switch_margin: f64,
    pub cooldown_s: f64,
    pub history_window_s: f64,
    pub fail_min_duration_s: f64,
    pub restore_min_duration_s: f64,
}

/// One point in a per-member predictive history ring, bounded to N (default
/// 1000) entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    pub latency: Option<f64>,
    pub loss: Option<f64>,
    pub score: f64,
    pub status: String,
}

/// Sample handed to the telemetry store after every score recompute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub member: String,
    pub metrics: Metrics,
    pub instant_score: f64,
    pub ewma_score: f64,
    pub final_score: f64,
}

/// Output of the predictive ensembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePrediction {
    pub risk: f64,
    pub confidence: f64,
    pub method: String,
    pub horizon: String,
    pub details: HashMap<String, serde_json::Value>,
}

impl FailurePrediction {
    pub fn none() -> Self {
        Self {
            risk: 0.0,
            confidence: 0.0,
            method: "none".to_string(),
            horizon: String::new(),
            details: HashMap::new(),
        }
    }
}

/// Slope-based trend summary for one signal over a member's recent history.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub slope_per_min: f64,
    pub samples: usize,
}

/// A recognized shape in a member's recent score/latency/loss history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    Cyclic,
    Deteriorating,
    Improving,
    None,
}

/// Running mean/std baseline for anomaly z-scoring, EWMA-updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineStats {
    pub mean_latency: f64,
    pub std_latency: f64,
    pub mean_loss: f64,
    pub std_loss: f64,
    pub mean_score: f64,
    pub std_score: f64,
    pub samples: u64,
}

impl Default for BaselineStats {
    fn default() -> Self {
        Self {
            mean_latency: 0.0,
            std_latency: 1.0,
            mean_loss: 0.0,
            std_loss: 1.0,
            mean_score: 100.0,
            std_score: 1.0,
            samples: 0,
        }
    }
}

/// Per-member online linear regression snapshot, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLModel {
    pub member_name: String,
    pub model_type: String,
    pub features: Vec<String>,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub accuracy: f64,
    pub last_trained: DateTime<Utc>,
    #[serde(skip)]
    pub samples_since_train: u32,
}

/// Obstruction/SNR forecast emitted by the Starlink sub-engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstructionPrediction {
    pub predicted_issue: String,
    pub time_to_issue_s: f64,
    pub confidence: f64,
    pub slope: f64,
    pub acceleration: f64,
    pub snr_trend: f64,
    pub trigger_reasons: Vec<String>,
    pub recommended_action: String,
    pub false_positive_risk: f64,
    pub data_quality_score: f64,
}

/// Aggregate decision-history statistics returned by `GetDecisionStats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionStats {
    pub total: u64,
    pub by_type: HashMap<String, u64>,
    pub by_reason: HashMap<String, u64>,
    pub success_rate: f64,
    pub avg_decision_time_ms: f64,
    pub predictive_share: f64,
}

/// Priority tag attached to an outbound notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Info,
    Warning,
    Critical,
}

/// Outbound notification built from a `SwitchEvent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub priority: NotificationPriority,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub context: HashMap<String, serde_json::Value>,
    pub next_steps: Vec<String>,
}

/// Wall-clock-free monotonic instant, used internally for cooldown and
/// dominance timers that must never be serialized.
pub type MonotonicInstant = Instant;
