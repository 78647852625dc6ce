//! C7 — Predictive Obstruction Sub-engine. Starlink-specific: maintains
//! rolling obstruction/SNR windows, fits slope/acceleration/trend, and
//! emits labeled `ObstructionPrediction`s with false-positive reduction.

use crate::config::EngineConfig;
use crate::model::{Metrics, ObstructionPrediction};
use crate::regression::linear_regression;
use crate::ring::RingBuffer;
use chrono::{DateTime, Timelike, Utc};

const NOISE_FLOOR_DB: f64 = 5.0;
const IMMINENT_TIME_TO_ISSUE_S: f64 = 120.0;

#[derive(Debug, Clone, Copy)]
struct ObstructionSample {
    timestamp: DateTime<Utc>,
    obstruction_pct: f64,
    quality: SampleQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleQuality {
    Good,
    Poor,
    Insufficient,
}

#[derive(Debug, Clone, Copy)]
struct SnrSample {
    timestamp: DateTime<Utc>,
    snr: f64,
    below_noise_floor: bool,
    persistently_low: bool,
}

/// Validates one sample per spec §4.7: `valid_duration_s >= 30` and
/// `patches_valid >= 10` is "good"; otherwise "poor", or "insufficient" when
/// neither field was reported at all.
fn validate_sample(metrics: &Metrics) -> SampleQuality {
    match (metrics.valid_duration_s, metrics.patches_valid) {
        (None, None) => SampleQuality::Insufficient,
        (valid_duration, patches) => {
            let duration_ok = valid_duration.unwrap_or(0.0) >= 30.0;
            let patches_ok = patches.unwrap_or(0) >= 10;
            if duration_ok && patches_ok {
                SampleQuality::Good
            } else {
                SampleQuality::Poor
            }
        }
    }
}

pub struct ObstructionSubEngine {
    per_member: std::collections::HashMap<String, MemberObstruction>,
}

struct MemberObstruction {
    obstruction: RingBuffer<ObstructionSample>,
    snr: RingBuffer<SnrSample>,
}

impl MemberObstruction {
    fn new() -> Self {
        Self {
            obstruction: RingBuffer::new(4096),
            snr: RingBuffer::new(4096),
        }
    }
}

impl Default for ObstructionSubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ObstructionSubEngine {
    pub fn new() -> Self {
        Self {
            per_member: std::collections::HashMap::new(),
        }
    }

    /// Movement hook: resets a member's rolling windows since prior
    /// obstruction history is meaningless after dish repositioning.
    pub fn reset_member(&mut self, name: &str) {
        self.per_member.remove(name);
    }

    pub fn record(&mut self, name: &str, metrics: &Metrics, now: DateTime<Utc>) {
        let entry = self
            .per_member
            .entry(name.to_string())
            .or_insert_with(MemberObstruction::new);

        if let Some(pct) = metrics.obstruction_pct.or(metrics.fraction_obstructed.map(|f| f * 100.0)) {
            entry.obstruction.push(ObstructionSample {
                timestamp: now,
                obstruction_pct: pct,
                quality: validate_sample(metrics),
            });
        }
        if let Some(snr) = metrics.snr {
            entry.snr.push(SnrSample {
                timestamp: now,
                snr,
                below_noise_floor: !metrics.is_above_noise_floor.unwrap_or(true),
                persistently_low: metrics.is_persistently_low.unwrap_or(false),
            });
        }
    }

    /// Runs the full §4.7 pipeline for one member: window trimming, slope +
    /// acceleration, SNR trend, labeled triggers, false-positive reduction.
    pub fn predict(&self, cfg: &EngineConfig, name: &str, now: DateTime<Utc>) -> Option<ObstructionPrediction> {
        let member = self.per_member.get(name)?;
        let cutoff = now - chrono::Duration::milliseconds((cfg.obstruction_window_s * 1000.0) as i64);

        let obstruction_points: Vec<&ObstructionSample> =
            member.obstruction.iter().filter(|s| s.timestamp >= cutoff).collect();
        let snr_points: Vec<&SnrSample> = member.snr.iter().filter(|s| s.timestamp >= cutoff).collect();

        if obstruction_points.len() < 4 && snr_points.len() < 4 {
            return None;
        }

        let t0 = obstruction_points
            .first()
            .map(|s| s.timestamp)
            .or_else(|| snr_points.first().map(|s| s.timestamp))
            .unwrap_or(now);

        let as_minutes = |t: DateTime<Utc>| (t - t0).num_milliseconds() as f64 / 60_000.0;

        let obstruction_series: Vec<(f64, f64)> = obstruction_points
            .iter()
            .map(|s| (as_minutes(s.timestamp), s.obstruction_pct))
            .collect();
        let (slope, _) = linear_regression(&obstruction_series);

        let acceleration = if obstruction_series.len() >= 4 {
            let mid = obstruction_series.len() / 2;
            let (first_half, second_half) = obstruction_series.split_at(mid);
            let (slope1, _) = linear_regression(first_half);
            let (slope2, _) = linear_regression(second_half);
            slope2 - slope1
        } else {
            0.0
        };

        let snr_series: Vec<(f64, f64)> = snr_points.iter().map(|s| (as_minutes(s.timestamp), s.snr)).collect();
        let (snr_trend, _) = linear_regression(&snr_series);

        let mut trigger_reasons = Vec::new();
        let mut predicted_issue = "none".to_string();
        let mut time_to_issue_s = f64::INFINITY;
        let mut recommended_action = "monitor".to_string();

        if acceleration > cfg.obstruction_acceleration_threshold && slope > 0.0 {
            trigger_reasons.push("rapid_obstruction_increase".to_string());
            predicted_issue = "rapid_obstruction_increase".to_string();
            let last_pct = obstruction_points.last().map(|s| s.obstruction_pct).unwrap_or(0.0);
            if slope > 1e-6 {
                time_to_issue_s = ((50.0 - last_pct).max(0.0) / slope * 60.0).min(time_to_issue_s);
            }
            recommended_action = "prepare_failover".to_string();
        }

        if snr_trend < cfg.snr_trend_threshold {
            trigger_reasons.push("snr_critical_decline".to_string());
            if predicted_issue == "none" {
                predicted_issue = "snr_critical_decline".to_string();
            }
            recommended_action = "prepare_failover".to_string();
        }

        let below_count = snr_points.iter().rev().take(5).filter(|s| s.below_noise_floor || s.snr < NOISE_FLOOR_DB).count();
        let persistently_low = snr_points.iter().rev().take(5).any(|s| s.persistently_low);
        if below_count >= 3 || persistently_low {
            trigger_reasons.push("imminent_signal_loss".to_string());
            predicted_issue = "imminent_signal_loss".to_string();
            time_to_issue_s = IMMINENT_TIME_TO_ISSUE_S;
            recommended_action = "immediate_failover".to_string();
        }

        if trigger_reasons.is_empty() {
            return None;
        }

        let good_samples = obstruction_points.iter().filter(|s| s.quality == SampleQuality::Good).count();
        let data_quality_score = if obstruction_points.is_empty() {
            0.5
        } else {
            good_samples as f64 / obstruction_points.len() as f64
        };

        let mut confidence = 0.5 + 0.3 * (trigger_reasons.len() as f64 - 1.0).max(0.0) + 0.2 * data_quality_score;
        confidence = confidence.clamp(0.0, 1.0);

        let mut false_positive_risk = 0.0;
        let variance = variance_of(&obstruction_series);
        if variance > 0.1 {
            false_positive_risk += 0.2;
            confidence -= 0.1;
        }
        let hour = now.hour();
        if (6..=9).contains(&hour) || (17..=20).contains(&hour) {
            false_positive_risk += 0.15;
            confidence -= 0.05;
        }
        if time_to_issue_s.is_finite() && time_to_issue_s < 30.0 {
            false_positive_risk += 0.2;
            confidence -= 0.1;
        }
        false_positive_risk = false_positive_risk.clamp(0.0, 1.0);
        confidence = (confidence * data_quality_score.max(0.3)).clamp(0.0, 1.0);

        let time_to_issue_s = if time_to_issue_s.is_finite() { time_to_issue_s } else { -1.0 };

        Some(ObstructionPrediction {
            predicted_issue,
            time_to_issue_s,
            confidence,
            slope,
            acceleration,
            snr_trend,
            trigger_reasons,
            recommended_action,
            false_positive_risk,
            data_quality_score,
        })
    }
}

fn variance_of(series: &[(f64, f64)]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let mean = series.iter().map(|(_, y)| y).sum::<f64>() / series.len() as f64;
    series.iter().map(|(_, y)| (y - mean).powi(2)).sum::<f64>() / series.len() as f64
}

const CRITICAL_LABELS: [&str; 2] = ["imminent_signal_loss", "snr_critical_decline"];

/// A proactive failover fires only when confidence clears the configured
/// threshold, false-positive risk is acceptably low, and either the label is
/// critical or the issue is imminent (within 5 minutes).
pub fn should_proactively_failover(cfg: &EngineConfig, prediction: &ObstructionPrediction) -> bool {
    if prediction.confidence < cfg.prediction_confidence_threshold || prediction.false_positive_risk > 0.3 {
        return false;
    }
    let is_critical = CRITICAL_LABELS.contains(&prediction.predicted_issue.as_str());
    let imminent = prediction.time_to_issue_s > 0.0 && prediction.time_to_issue_s <= 300.0;
    is_critical || imminent
}
