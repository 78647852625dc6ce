//! (a) Trend Predictor — linear regression slope of latency/loss/score vs
//! time (in minutes) over a member's recent history.

use crate::model::DataPoint;
use chrono::{DateTime, Utc};
use serde_json::json;

fn minutes_since(t0: DateTime<Utc>, t: DateTime<Utc>) -> f64 {
    (t - t0).num_milliseconds() as f64 / 60_000.0
}

/// Returns `None` when fewer than 10 points are available or no slope
/// exceeds `sensitivity`. Latency/loss increases and score decreases each
/// independently contribute to risk and confidence per spec §4.6(a).
pub fn analyze(points: &[&DataPoint], sensitivity: f64) -> Option<(f64, f64, serde_json::Value)> {
    if points.len() < 10 {
        return None;
    }
    let t0 = points[0].timestamp;

    let lat_points: Vec<(f64, f64)> = points
        .iter()
        .filter_map(|p| p.latency.map(|l| (minutes_since(t0, p.timestamp), l)))
        .collect();
    let loss_points: Vec<(f64, f64)> = points
        .iter()
        .filter_map(|p| p.loss.map(|l| (minutes_since(t0, p.timestamp), l)))
        .collect();
    let score_points: Vec<(f64, f64)> = points
        .iter()
        .map(|p| (minutes_since(t0, p.timestamp), p.score))
        .collect();

    let lat_slope = if lat_points.len() >= 2 {
        crate::regression::linear_regression(&lat_points).0
    } else {
        0.0
    };
    let loss_slope = if loss_points.len() >= 2 {
        crate::regression::linear_regression(&loss_points).0
    } else {
        0.0
    };
    let (score_slope, _) = crate::regression::linear_regression(&score_points);

    let mut risk = 0.0;
    let mut confidence = 0.0;
    if lat_slope > sensitivity {
        risk += 0.3;
        confidence += 0.2;
    }
    if loss_slope > sensitivity {
        risk += 0.4;
        confidence += 0.3;
    }
    if score_slope < -sensitivity {
        risk += 0.3;
        confidence += 0.2;
    }

    if confidence <= 0.0 {
        return None;
    }

    let details = json!({
        "latency_slope_per_min": lat_slope,
        "loss_slope_per_min": loss_slope,
        "score_slope_per_min": score_slope,
    });
    Some((risk.min(1.0), confidence.min(1.0), details))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn point_at(t0: DateTime<Utc>, i: i64, latency: f64, loss: f64, score: f64) -> DataPoint {
        DataPoint {
            timestamp: t0 + Duration::seconds(i * 10),
            latency: Some(latency),
            loss: Some(loss),
            score,
            status: "healthy".into(),
        }
    }

    #[test]
    fn rising_loss_trend_flags_risk() {
        let t0 = Utc::now();
        let owned: Vec<DataPoint> = (0..12)
            .map(|i| point_at(t0, i, 30.0, i as f64 * 0.5, 90.0 - i as f64))
            .collect();
        let refs: Vec<&DataPoint> = owned.iter().collect();
        let result = analyze(&refs, 0.01);
        assert!(result.is_some());
        let (risk, confidence, _) = result.unwrap();
        assert!(risk > 0.0);
        assert!(confidence > 0.0);
    }

    #[test]
    fn flat_history_has_no_trend() {
        let t0 = Utc::now();
        let owned: Vec<DataPoint> = (0..12).map(|i| point_at(t0, i, 30.0, 0.1, 95.0)).collect();
        let refs: Vec<&DataPoint> = owned.iter().collect();
        assert!(analyze(&refs, 0.05).is_none());
    }

    #[test]
    fn too_few_points_returns_none() {
        let t0 = Utc::now();
        let owned: Vec<DataPoint> = (0..5).map(|i| point_at(t0, i, 30.0, 0.1, 95.0)).collect();
        let refs: Vec<&DataPoint> = owned.iter().collect();
        assert!(analyze(&refs, 0.01).is_none());
    }
}
