//! (b) Anomaly Predictor — EWMA baseline of latency/loss/score with
//! z-score-based anomaly detection over the last 5 samples.

use crate::model::{BaselineStats, DataPoint};
use serde_json::json;

/// Folds one new observation into the per-member baseline via EWMA(rate).
pub fn update_baseline(baseline: &mut BaselineStats, latency: Option<f64>, loss: Option<f64>, score: f64, rate: f64) {
    if let Some(l) = latency {
        ewma_update(&mut baseline.mean_latency, &mut baseline.std_latency, l, rate);
    }
    if let Some(l) = loss {
        ewma_update(&mut baseline.mean_loss, &mut baseline.std_loss, l, rate);
    }
    ewma_update(&mut baseline.mean_score, &mut baseline.std_score, score, rate);
    baseline.samples += 1;
}

fn ewma_update(mean: &mut f64, std: &mut f64, x: f64, rate: f64) {
    let delta = x - *mean;
    *mean += rate * delta;
    let var = std.powi(2);
    *std = ((1.0 - rate) * (var + rate * delta * delta)).max(0.0).sqrt();
}

fn zscore(mean: f64, std: f64, x: f64) -> f64 {
    if std < 1e-6 {
        0.0
    } else {
        (x - mean) / std
    }
}

/// Per-point combined anomaly score in [0,1]: latency/loss z-scores are
/// "higher is worse"; score's z-score is negated (below-baseline score is
/// the anomalous direction for it).
fn combined_zscore(point: &DataPoint, baseline: &BaselineStats) -> f64 {
    let z_lat = point
        .latency
        .map(|l| zscore(baseline.mean_latency, baseline.std_latency, l))
        .unwrap_or(0.0);
    let z_loss = point
        .loss
        .map(|l| zscore(baseline.mean_loss, baseline.std_loss, l))
        .unwrap_or(0.0);
    let z_score = -zscore(baseline.mean_score, baseline.std_score, point.score);
    ((0.4 * z_lat + 0.4 * z_loss + 0.2 * z_score) / 3.0).clamp(0.0, 1.0)
}

/// Returns `None` unless the average combined anomaly score over the last 5
/// points exceeds `threshold`.
pub fn analyze(points: &[&DataPoint], baseline: &BaselineStats, threshold: f64) -> Option<(f64, f64, serde_json::Value)> {
    if points.is_empty() {
        return None;
    }
    let last5: Vec<f64> = points
        .iter()
        .rev()
        .take(5)
        .map(|p| combined_zscore(p, baseline))
        .collect();
    let avg = last5.iter().sum::<f64>() / last5.len() as f64;
    if avg > threshold {
        Some((
            avg,
            (0.8 * avg).clamp(0.0, 1.0),
            json!({"avg_anomaly_score": avg, "window": last5.len()}),
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_baseline_no_anomaly() {
        let baseline = BaselineStats {
            mean_latency: 30.0,
            std_latency: 5.0,
            mean_loss: 0.1,
            std_loss: 0.2,
            mean_score: 95.0,
            std_score: 2.0,
            samples: 50,
        };
        let points: Vec<DataPoint> = (0..5)
            .map(|_| DataPoint {
                timestamp: chrono::Utc::now(),
                latency: Some(31.0),
                loss: Some(0.1),
                score: 94.0,
                status: "healthy".into(),
            })
            .collect();
        let refs: Vec<&DataPoint> = points.iter().collect();
        assert!(analyze(&refs, &baseline, 0.7).is_none());
    }

    #[test]
    fn score_collapse_flags_anomaly() {
        let baseline = BaselineStats {
            mean_latency: 30.0,
            std_latency: 5.0,
            mean_loss: 0.1,
            std_loss: 0.2,
            mean_score: 95.0,
            std_score: 2.0,
            samples: 50,
        };
        let points: Vec<DataPoint> = (0..5)
            .map(|_| DataPoint {
                timestamp: chrono::Utc::now(),
                latency: Some(800.0),
                loss: Some(8.0),
                score: 10.0,
                status: "degraded".into(),
            })
            .collect();
        let refs: Vec<&DataPoint> = points.iter().collect();
        let result = analyze(&refs, &baseline, 0.3);
        assert!(result.is_some());
    }
}
