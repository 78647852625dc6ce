//! Engine configuration: weights, thresholds, windows and persisted-state
//! paths. Loaded from TOML by the daemon binary; constructible in-process
//! for tests and embedders.

use crate::error::{FailoverError, Result};
use crate::model::Class;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weight_latency: f64,
    pub weight_loss: f64,
    pub weight_jitter: f64,
    pub weight_class: f64,
    pub class_weights: HashMap<Class, f64>,

    pub switch_margin: f64,
    pub min_uptime_s: f64,
    pub cooldown_s: f64,
    pub history_window_s: f64,
    pub fail_min_duration_s: f64,
    pub restore_min_duration_s: f64,

    pub enable_predictive: bool,
    pub predict_threshold: f64,
    pub trend_sensitivity: f64,
    pub anomaly_threshold: f64,
    pub ewma_alpha: f64,
    pub baseline_ewma_rate: f64,

    pub obstruction_window_s: f64,
    pub obstruction_acceleration_threshold: f64,
    pub snr_trend_threshold: f64,
    pub prediction_confidence_threshold: f64,

    pub max_datapoints_per_member: usize,
    pub max_event_history: usize,
    pub max_decision_history: usize,

    pub audit_dir: PathBuf,
    pub audit_enabled: bool,
    pub audit_max_file_bytes: u64,
    pub audit_retention_days: i64,
    pub ml_model_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut class_weights = HashMap::new();
        class_weights.insert(Class::Starlink, 1.0);
        class_weights.insert(Class::Cellular, 0.8);
        class_weights.insert(Class::Lan, 0.7);
        class_weights.insert(Class::Wifi, 0.6);
        class_weights.insert(Class::Other, 0.5);

        Self {
            weight_latency: 0.40,
            weight_loss: 0.40,
            weight_jitter: 0.10,
            weight_class: 0.10,
            class_weights,

            switch_margin: 10.0,
            min_uptime_s: 30.0,
            cooldown_s: 60.0,
            history_window_s: 60.0,
            fail_min_duration_s: 5.0,
            restore_min_duration_s: 15.0,

            enable_predictive: true,
            predict_threshold: 5.0,
            trend_sensitivity: 0.05,
            anomaly_threshold: 0.7,
            ewma_alpha: 0.10,
            baseline_ewma_rate: 0.10,

            obstruction_window_s: 1800.0,
            obstruction_acceleration_threshold: 0.5,
            snr_trend_threshold: -1.0,
            prediction_confidence_threshold: 0.7,

            max_datapoints_per_member: 1000,
            max_event_history: 100,
            max_decision_history: 1000,

            audit_dir: PathBuf::from("./decisions"),
            audit_enabled: true,
            audit_max_file_bytes: 10 * 1024 * 1024,
            audit_retention_days: 30,
            ml_model_path: PathBuf::from("./ml_models.json"),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: EngineConfig =
            toml::from_str(s).map_err(|e| FailoverError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Normalizes the scorer weight tuple if it doesn't sum to 1.0 (§7
    /// "config" error kind) and rejects combinations that cannot be
    /// silently defaulted without surprising an operator.
    pub fn validate(&mut self) -> Result<()> {
        let sum = self.weight_latency + self.weight_loss + self.weight_jitter + self.weight_class;
        if sum <= 0.0 {
            return Err(FailoverError::Config(
                "scorer weights must sum to a positive value".into(),
            ));
        }
        if (sum - 1.0).abs() > 1e-9 {
            tracing::warn!(sum, "scorer weights do not sum to 1.0, normalizing");
            self.weight_latency /= sum;
            self.weight_loss /= sum;
            self.weight_jitter /= sum;
            self.weight_class /= sum;
        }
        if self.history_window_s <= 0.0 && self.enable_predictive {
            return Err(FailoverError::Config(
                "history_window_s must be positive when predictive analysis is enabled".into(),
            ));
        }
        Ok(())
    }

    pub fn class_weight(&self, class: Class) -> f64 {
        self.class_weights
            .get(&class)
            .copied()
            .unwrap_or_else(|| class.default_weight())
    }
}
