//! C6 — Predictive Engine. Owns per-member `DataPoint` history, baseline
//! stats, and an online linear model; ensembles the trend/anomaly/pattern/ml
//! predictors into one `FailurePrediction`.

pub mod anomaly;
pub mod ml;
pub mod pattern;
pub mod trend;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::model::{BaselineStats, DataPoint, FailurePrediction, MLModel, Metrics};
use crate::ring::RingBuffer;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

struct MemberPredictive {
    history: RingBuffer<DataPoint>,
    baseline: BaselineStats,
    ml: ml::OnlineLinearModel,
}

impl MemberPredictive {
    fn new(capacity: usize) -> Self {
        Self {
            history: RingBuffer::new(capacity),
            baseline: BaselineStats::default(),
            ml: ml::OnlineLinearModel::default(),
        }
    }
}

pub struct PredictiveEngine {
    per_member: HashMap<String, MemberPredictive>,
    history_capacity: usize,
    model_path: std::path::PathBuf,
}

impl PredictiveEngine {
    pub fn new(cfg: &EngineConfig) -> Self {
        let mut engine = Self {
            per_member: HashMap::new(),
            history_capacity: cfg.max_datapoints_per_member,
            model_path: cfg.ml_model_path.clone(),
        };
        engine.load_models();
        engine
    }

    fn load_models(&mut self) {
        let Ok(data) = std::fs::read_to_string(&self.model_path) else {
            return;
        };
        let Ok(models) = serde_json::from_str::<Vec<MLModel>>(&data) else {
            tracing::warn!(path = %self.model_path.display(), "failed to parse ml_models.json, starting fresh");
            return;
        };
        for snapshot in models {
            let entry = self
                .per_member
                .entry(snapshot.member_name.clone())
                .or_insert_with(|| MemberPredictive::new(self.history_capacity));
            entry.ml = ml::OnlineLinearModel::from_snapshot(snapshot);
        }
    }

    /// Persists every trained per-member model as a JSON array, matching
    /// the `ml_models.json` schema in spec §6.4.
    pub fn save_models(&self) -> Result<()> {
        let snapshots: Vec<MLModel> = self
            .per_member
            .iter()
            .filter_map(|(name, mp)| mp.ml.snapshot(name))
            .collect();
        let json = serde_json::to_string_pretty(&snapshots)
            .map_err(|e| crate::error::FailoverError::Predictive(e.to_string()))?;
        if let Some(parent) = self.model_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(crate::error::FailoverError::AuditIo)?;
            }
        }
        std::fs::write(&self.model_path, json).map_err(crate::error::FailoverError::AuditIo)?;
        Ok(())
    }

    /// Records one observation: pushes to the bounded history ring, updates
    /// the EWMA baseline, and feeds the online ML model once enough history
    /// has accumulated to build its 10-feature design vector.
    #[tracing::instrument(skip(self, cfg, metrics), fields(member = %name))]
    pub fn record(&mut self, cfg: &EngineConfig, name: &str, metrics: &Metrics, final_score: f64, now: DateTime<Utc>) {
        let capacity = self.history_capacity;
        let mp = self
            .per_member
            .entry(name.to_string())
            .or_insert_with(|| MemberPredictive::new(capacity));

        let status = if final_score > 50.0 { "healthy" } else { "degraded" };
        mp.history.push(DataPoint {
            timestamp: now,
            latency: metrics.latency_ms,
            loss: metrics.packet_loss_pct,
            score: final_score,
            status: status.to_string(),
        });
        anomaly::update_baseline(
            &mut mp.baseline,
            metrics.latency_ms,
            metrics.packet_loss_pct,
            final_score,
            cfg.baseline_ewma_rate,
        );

        let points: Vec<&DataPoint> = mp.history.iter().collect();
        if points.len() >= 10 {
            let features = ml::build_features(&points);
            let target = ml::target_for_score(final_score);
            mp.ml.record(features, target);
        }
    }

    /// Ensembles every predictor that fired, weighting by confidence. See
    /// spec §4.6 "Ensembler".
    #[tracing::instrument(skip(self, cfg), fields(member = %name))]
    pub fn predict(&self, cfg: &EngineConfig, name: &str) -> FailurePrediction {
        let Some(mp) = self.per_member.get(name) else {
            return FailurePrediction::none();
        };
        let points: Vec<&DataPoint> = mp.history.iter().collect();
        if points.len() < 10 {
            return FailurePrediction::none();
        }

        let mut results: Vec<(f64, f64, &'static str, serde_json::Value)> = Vec::new();
        if let Some((risk, confidence, details)) = trend::analyze(&points, cfg.trend_sensitivity) {
            results.push((risk, confidence, "trend", details));
        }
        if let Some((risk, confidence, details)) = anomaly::analyze(&points, &mp.baseline, cfg.anomaly_threshold) {
            results.push((risk, confidence, "anomaly", details));
        }
        if let Some((risk, confidence, details)) = pattern::analyze(&points) {
            results.push((risk, confidence, "pattern", details));
        }
        let features = ml::build_features(&points);
        if let Some((risk, confidence)) = mp.ml.predict(&features) {
            results.push((risk, confidence, "ml", ml::details(risk, confidence)));
        }

        if results.is_empty() {
            return FailurePrediction::none();
        }

        let total_confidence: f64 = results.iter().map(|r| r.1).sum();
        let (risk, confidence) = if total_confidence > 1e-9 {
            let risk = results.iter().map(|r| r.0 * r.1).sum::<f64>() / total_confidence;
            let confidence = (total_confidence / results.len() as f64).clamp(0.0, 1.0);
            (risk.clamp(0.0, 1.0), confidence)
        } else {
            (0.0, 0.0)
        };

        let method = if results.len() == 1 {
            results[0].2.to_string()
        } else {
            "ensemble".to_string()
        };

        let mut details = HashMap::new();
        details.insert(
            "methods".to_string(),
            serde_json::json!(results.iter().map(|r| r.2).collect::<Vec<_>>()),
        );
        details.insert("feature_count".to_string(), serde_json::json!(points.len()));
        for (_, _, m, d) in &results {
            details.insert((*m).to_string(), d.clone());
        }

        FailurePrediction {
            risk,
            confidence,
            method,
            horizon: "short_term".to_string(),
            details,
        }
    }

    /// Clones every `DataPoint` within the last `window_s` seconds, used by
    /// the preemptive-switch rule's short-horizon trend checks.
    pub fn recent_points(&self, name: &str, now: DateTime<Utc>, window_s: f64) -> Vec<DataPoint> {
        let Some(mp) = self.per_member.get(name) else {
            return Vec::new();
        };
        let cutoff = now - chrono::Duration::milliseconds((window_s * 1000.0) as i64);
        mp.history.iter().filter(|p| p.timestamp >= cutoff).cloned().collect()
    }

    pub fn history_len(&self, name: &str) -> usize {
        self.per_member.get(name).map(|mp| mp.history.len()).unwrap_or(0)
    }

    pub fn remove(&mut self, name: &str) {
        self.per_member.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metrics;

    #[test]
    fn no_prediction_before_ten_samples() {
        let cfg = EngineConfig::default();
        let mut engine = PredictiveEngine::new(&cfg);
        let now = Utc::now();
        for i in 0..3 {
            engine.record(
                &cfg,
                "wan0",
                &Metrics {
                    latency_ms: Some(30.0),
                    packet_loss_pct: Some(0.1),
                    ..Default::default()
                },
                95.0 - i as f64,
                now + chrono::Duration::seconds(i),
            );
        }
        let pred = engine.predict(&cfg, "wan0");
        assert_eq!(pred.method, "none");
    }

    #[test]
    fn sustained_degradation_fires_ensemble() {
        let cfg = EngineConfig::default();
        let mut engine = PredictiveEngine::new(&cfg);
        let now = Utc::now();
        for i in 0..30 {
            let latency = 30.0 + i as f64 * 20.0;
            let loss = 0.1 + i as f64 * 0.3;
            let score = (95.0 - i as f64 * 3.0).max(5.0);
            engine.record(
                &cfg,
                "wan0",
                &Metrics {
                    latency_ms: Some(latency),
                    packet_loss_pct: Some(loss),
                    ..Default::default()
                },
                score,
                now + chrono::Duration::seconds(i * 10),
            );
        }
        let pred = engine.predict(&cfg, "wan0");
        assert!(pred.risk > 0.0);
        assert!(pred.confidence > 0.0);
    }
}
