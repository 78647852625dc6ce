//! Preemptive-switch rule (spec §4.6, "Preemptive-switch rule" bullets):
//! decides whether the *current* primary's own signals already warrant a
//! predictive upgrade, independent of the Predictive Engine's ensembled
//! `FailurePrediction`. Pure function over gathered inputs so it has no
//! dependency on engine locking.

use crate::config::EngineConfig;
use crate::model::{Class, DataPoint, MemberState};
use crate::regression::linear_regression;

pub struct PreemptiveInputs<'a> {
    pub current: &'a MemberState,
    /// Points from the last 30s of this member's predictive history.
    pub recent_latency_30s: &'a [DataPoint],
    /// Points from the last 15s of this member's predictive history.
    pub recent_loss_15s: &'a [DataPoint],
    /// Starlink obstruction slope in pp/min, from the obstruction sub-engine.
    pub obstruction_trend_pct_per_min: Option<f64>,
    /// Last up to 3 cellular RSRP samples, oldest first.
    pub recent_rsrp: &'a [f64],
}

/// Returns the trigger label that fired, or `None` if no preemptive
/// condition is met.
pub fn should_trigger(cfg: &EngineConfig, inputs: &PreemptiveInputs) -> Option<&'static str> {
    let current = inputs.current;

    if current.score.ewma - current.score.instant > cfg.predict_threshold {
        return Some("score_declining");
    }

    if inputs.recent_latency_30s.len() >= 2 {
        let t0 = inputs.recent_latency_30s[0].timestamp;
        let points: Vec<(f64, f64)> = inputs
            .recent_latency_30s
            .iter()
            .filter_map(|p| p.latency.map(|l| (minutes_since(t0, p.timestamp), l)))
            .collect();
        if points.len() >= 2 {
            let (slope, _) = linear_regression(&points);
            if slope > 20.0 {
                return Some("latency_trend_rising");
            }
        }
    }

    if let Some(loss) = current.metrics.packet_loss_pct {
        if loss > 2.0 && !inputs.recent_loss_15s.is_empty() {
            let mean_loss: f64 = inputs.recent_loss_15s.iter().filter_map(|p| p.loss).sum::<f64>()
                / inputs.recent_loss_15s.len() as f64;
            if mean_loss > 0.0 && loss > 2.0 * mean_loss {
                return Some("loss_spike");
            }
        }
    }

    if current.member.class == Class::Starlink {
        if let Some(trend) = inputs.obstruction_trend_pct_per_min {
            if trend > 0.5 {
                return Some("obstruction_trend_rising");
            }
        }
        if let Some(snr) = current.metrics.snr {
            if snr < 8.0 {
                return Some("snr_low");
            }
        }
        if current.metrics.is_persistently_low == Some(true) {
            return Some("persistently_low");
        }
        if current.metrics.thermal_throttle == Some(true) {
            return Some("thermal_throttle");
        }
        if current.metrics.swupdate_reboot_ready == Some(true) {
            return Some("swupdate_reboot_ready");
        }
    }

    if current.member.class == Class::Cellular {
        if let Some(rsrp) = current.metrics.rsrp {
            if rsrp < -110.0 {
                return Some("rsrp_critical");
            }
        }
        if let Some(rsrq) = current.metrics.rsrq {
            if rsrq < -15.0 {
                return Some("rsrq_critical");
            }
        }
        if current.metrics.roaming == Some(true) && inputs.recent_rsrp.len() >= 3 {
            let worsening = inputs.recent_rsrp.windows(2).all(|w| w[1] < w[0] - 5.0);
            if worsening {
                return Some("roaming_rsrp_degrading");
            }
        }
    }

    None
}

fn minutes_since(t0: chrono::DateTime<chrono::Utc>, t: chrono::DateTime<chrono::Utc>) -> f64 {
    (t - t0).num_milliseconds() as f64 / 60_000.0
}
