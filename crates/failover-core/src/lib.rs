//! `failover-core` — the scoring, eligibility, hysteresis and predictive
//! decision engine (C1-C10) for a multi-WAN failover daemon.
//!
//! This crate is the "decision core" described in the design spec: it
//! consumes `Metrics` samples pushed by external collectors, maintains the
//! member state table, arbitrates failover/failback/predictive switches
//! with margin + sustained-dominance hysteresis, and emits a structured
//! audit trail. It never touches the OS network stack and never probes
//! anything itself — collectors, the route controller, GPS/obstruction
//! managers, notification fan-out and long-term telemetry persistence are
//! all modeled as injected collaborator traits (see `controller`,
//! `telemetry`, `audit`, `notifier`).

pub mod arbiter;
pub mod audit;
pub mod config;
pub mod controller;
pub mod dominance;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod model;
pub mod notifier;
pub mod obstruction;
pub mod predictive;
pub mod preemptive;
pub mod regression;
pub mod ring;
pub mod scorer;
pub mod state;
pub mod telemetry;

pub use audit::{AuditSink, FileAuditSink, NullAuditSink};
pub use config::EngineConfig;
pub use controller::{Controller, NullController, RecordingController};
pub use engine::Engine;
pub use error::{FailoverError, Result};
pub use model::{
    BaselineStats, Class, DataPoint, DecisionEvent, DecisionEventType, DecisionStats,
    FailurePrediction, IneligibilityCode, Member, MemberSnapshot, MemberState, Metrics, MLModel,
    Notification, NotificationPriority, ObstructionPrediction, Pattern, Sample, Score,
    ScoreComponents, SwitchEvent, SwitchType, ThresholdSnapshot, TrendAnalysis,
};
pub use notifier::{NullNotifier, Notifier};
pub use telemetry::{InMemoryTelemetryStore, NullTelemetryStore, TelemetryStore};
