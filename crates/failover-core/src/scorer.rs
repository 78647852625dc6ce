//! C1 — maps a `Metrics` sample to an instant score in [0,100], then blends
//! it into the EWMA/window/final score carried on a `MemberState`.

use crate::config::EngineConfig;
use crate::model::{Class, Metrics, Score, ScoreComponents};

/// Piecewise-linear monotone non-increasing latency curve.
pub fn latency_score(latency_ms: Option<f64>) -> f64 {
    let Some(l) = latency_ms else { return 100.0 };
    if l <= 50.0 {
        100.0
    } else if l <= 200.0 {
        lerp(l, 50.0, 200.0, 100.0, 80.0)
    } else if l <= 500.0 {
        lerp(l, 200.0, 500.0, 80.0, 60.0)
    } else if l <= 1500.0 {
        lerp(l, 500.0, 1500.0, 60.0, 0.0)
    } else {
        0.0
    }
}

/// Piecewise-linear monotone non-increasing packet-loss curve.
pub fn loss_score(loss_pct: Option<f64>) -> f64 {
    let Some(p) = loss_pct else { return 100.0 };
    if p <= 0.0 {
        100.0
    } else if p <= 1.0 {
        lerp(p, 0.0, 1.0, 100.0, 90.0)
    } else if p <= 5.0 {
        lerp(p, 1.0, 5.0, 90.0, 50.0)
    } else if p <= 10.0 {
        lerp(p, 5.0, 10.0, 50.0, 0.0)
    } else {
        0.0
    }
}

/// Piecewise-linear monotone non-increasing jitter curve.
pub fn jitter_score(jitter_ms: Option<f64>) -> f64 {
    let Some(j) = jitter_ms else { return 100.0 };
    if j <= 5.0 {
        100.0
    } else if j <= 20.0 {
        lerp(j, 5.0, 20.0, 100.0, 80.0)
    } else if j <= 50.0 {
        lerp(j, 20.0, 50.0, 80.0, 60.0)
    } else if j <= 150.0 {
        lerp(j, 50.0, 150.0, 60.0, 0.0)
    } else {
        0.0
    }
}

fn lerp(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    if (x1 - x0).abs() < f64::EPSILON {
        return y0;
    }
    y0 + (y1 - y0) * ((x - x0) / (x1 - x0))
}

/// `ScoreInstant(metrics, member) -> [0,100]`: start at 100, subtract
/// weighted penalties, then apply the class bias blend.
pub fn score_instant(cfg: &EngineConfig, class: Class, metrics: &Metrics) -> (f64, ScoreComponents) {
    let components = ScoreComponents {
        latency: latency_score(metrics.latency_ms),
        loss: loss_score(metrics.packet_loss_pct),
        jitter: jitter_score(metrics.jitter_ms),
    };

    let mut score = 100.0;
    score -= (100.0 - components.latency) * cfg.weight_latency;
    score -= (100.0 - components.loss) * cfg.weight_loss;
    score -= (100.0 - components.jitter) * cfg.weight_jitter;

    let class_weight = cfg.class_weight(class);
    score = score * class_weight + (100.0 - score) * cfg.weight_class;

    (score.clamp(0.0, 100.0), components)
}

/// Updates EWMA (seeded by the first observation) and recomputes `Final`.
/// `window_avg` must already reflect the caller's rolling-window
/// computation (owned by the state table, which has access to history).
pub fn apply_instant(cfg: &EngineConfig, score: &mut Score, instant: f64, components: ScoreComponents, window_avg: f64, now: chrono::DateTime<chrono::Utc>) {
    score.instant = instant.clamp(0.0, 100.0);
    score.components = components;
    score.ewma = if score.ewma_seeded {
        cfg.ewma_alpha * score.instant + (1.0 - cfg.ewma_alpha) * score.ewma
    } else {
        score.ewma_seeded = true;
        score.instant
    };
    score.window_avg = window_avg.clamp(0.0, 100.0);
    score.last_update = now;
    score.recompute_final();
}

/// Window average over samples within `history_window_s`, always including
/// the current instant. Returns `instant` if the window is zero or there is
/// no history.
pub fn window_average(history_window_s: f64, instant: f64, recent_instants: &[f64]) -> f64 {
    if history_window_s <= 0.0 || recent_instants.is_empty() {
        return instant;
    }
    let sum: f64 = recent_instants.iter().sum::<f64>() + instant;
    sum / (recent_instants.len() as f64 + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_curve_known_points() {
        assert_eq!(latency_score(Some(25.0)), 100.0);
        assert!((latency_score(Some(100.0)) - 93.333).abs() < 0.01);
    }

    #[test]
    fn loss_curve_known_point() {
        assert!((loss_score(Some(3.0)) - 70.0).abs() < 0.01);
    }

    #[test]
    fn jitter_curve_known_point() {
        assert!((jitter_score(Some(10.0)) - 86.667).abs() < 0.01);
    }

    #[test]
    fn absent_metric_has_no_penalty() {
        assert_eq!(latency_score(None), 100.0);
        assert_eq!(loss_score(None), 100.0);
        assert_eq!(jitter_score(None), 100.0);
    }

    proptest::proptest! {
        #[test]
        fn latency_curve_monotone(a in 0.0..3000.0f64, b in 0.0..3000.0f64) {
            if a <= b {
                proptest::prop_assert!(latency_score(Some(a)) >= latency_score(Some(b)) - 1e-9);
            }
        }

        #[test]
        fn loss_curve_monotone(a in 0.0..100.0f64, b in 0.0..100.0f64) {
            if a <= b {
                proptest::prop_assert!(loss_score(Some(a)) >= loss_score(Some(b)) - 1e-9);
            }
        }

        #[test]
        fn jitter_curve_monotone(a in 0.0..1000.0f64, b in 0.0..1000.0f64) {
            if a <= b {
                proptest::prop_assert!(jitter_score(Some(a)) >= jitter_score(Some(b)) - 1e-9);
            }
        }
    }
}
