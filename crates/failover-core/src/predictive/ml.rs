//! (d) Online ML Predictor — per-member linear regression over a fixed
//! 10-feature design vector, retrained every 20 new samples via ordinary
//! least squares (normal equations solved by Gauss-Jordan elimination; no
//! external linear-algebra crate for a problem this small).

use crate::model::{DataPoint, MLModel};
use crate::regression::r_squared;
use chrono::Utc;
use serde_json::json;

pub const FEATURE_NAMES: [&str; 10] = [
    "latency",
    "loss",
    "score",
    "mean_latency_10",
    "mean_loss_10",
    "mean_score_10",
    "trend_lat",
    "trend_loss",
    "trend_score",
    "std_lat",
];
const N_FEATURES: usize = FEATURE_NAMES.len();
const RETRAIN_EVERY: u32 = 20;
const TRAIN_WINDOW: usize = 500;

#[derive(Debug, Clone)]
pub struct OnlineLinearModel {
    weights: Vec<f64>,
    bias: f64,
    accuracy: f64,
    trained: bool,
    last_trained: chrono::DateTime<Utc>,
    samples_since_train: u32,
    buffer: Vec<(Vec<f64>, f64)>,
}

impl Default for OnlineLinearModel {
    fn default() -> Self {
        Self {
            weights: vec![0.0; N_FEATURES],
            bias: 0.0,
            accuracy: 0.0,
            trained: false,
            last_trained: Utc::now(),
            samples_since_train: 0,
            buffer: Vec::new(),
        }
    }
}

impl OnlineLinearModel {
    pub fn from_snapshot(snapshot: MLModel) -> Self {
        Self {
            weights: snapshot.weights,
            bias: snapshot.bias,
            accuracy: snapshot.accuracy,
            trained: true,
            last_trained: snapshot.last_trained,
            samples_since_train: 0,
            buffer: Vec::new(),
        }
    }

    pub fn snapshot(&self, member_name: &str) -> Option<MLModel> {
        if !self.trained {
            return None;
        }
        Some(MLModel {
            member_name: member_name.to_string(),
            model_type: "online_linear".to_string(),
            features: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            weights: self.weights.clone(),
            bias: self.bias,
            accuracy: self.accuracy,
            last_trained: self.last_trained,
            samples_since_train: self.samples_since_train,
        })
    }

    /// Records one `(features, target)` pair, retraining every 20 new
    /// samples over the trailing `TRAIN_WINDOW` observations.
    pub fn record(&mut self, features: Vec<f64>, target: f64) {
        self.buffer.push((features, target));
        if self.buffer.len() > TRAIN_WINDOW {
            let excess = self.buffer.len() - TRAIN_WINDOW;
            self.buffer.drain(0..excess);
        }
        self.samples_since_train += 1;
        if self.samples_since_train >= RETRAIN_EVERY {
            self.retrain();
            self.samples_since_train = 0;
        }
    }

    fn retrain(&mut self) {
        if self.buffer.len() < N_FEATURES + 1 {
            return;
        }
        let xs: Vec<Vec<f64>> = self.buffer.iter().map(|(f, _)| f.clone()).collect();
        let ys: Vec<f64> = self.buffer.iter().map(|(_, t)| *t).collect();
        let (weights, bias) = fit_linear(&xs, &ys);
        let points: Vec<(f64, f64)> = (0..xs.len())
            .map(|i| (predict_raw(&weights, bias, &xs[i]), ys[i]))
            .map(|(pred, y)| (pred, y))
            .collect();
        // r_squared expects (x,y) with x as the fitted predictor input; here
        // we evaluate goodness-of-fit between prediction and target directly.
        let r2 = r_squared_direct(&points);
        self.weights = weights;
        self.bias = bias;
        self.accuracy = r2;
        self.trained = true;
        self.last_trained = Utc::now();
    }

    /// Predicts risk in [0,1] from the feature vector; confidence is the
    /// model's trailing R². Returns `None` if never trained ("model not
    /// trained" degrades to no-prediction per spec §7).
    pub fn predict(&self, features: &[f64]) -> Option<(f64, f64)> {
        if !self.trained {
            return None;
        }
        let risk = predict_raw(&self.weights, self.bias, features).clamp(0.0, 1.0);
        Some((risk, self.accuracy.clamp(0.0, 1.0)))
    }
}

fn predict_raw(weights: &[f64], bias: f64, features: &[f64]) -> f64 {
    bias + weights.iter().zip(features.iter()).map(|(w, f)| w * f).sum::<f64>()
}

fn r_squared_direct(points: &[(f64, f64)]) -> f64 {
    // Treat prediction as the "fitted line" with slope=1, intercept=0 against
    // target, i.e. plain goodness of fit of prediction vs actual target.
    r_squared(points, 1.0, 0.0)
}

/// Solves the (N_FEATURES+1)-dimensional normal equations `(X^T X) w = X^T y`
/// for `weights` (one per feature) and `bias` (the intercept column of ones).
fn fit_linear(features: &[Vec<f64>], targets: &[f64]) -> (Vec<f64>, f64) {
    let n = features.len();
    let k = N_FEATURES;
    if n == 0 {
        return (vec![0.0; k], 0.0);
    }
    let dim = k + 1;
    let mut ata = vec![vec![0.0; dim]; dim];
    let mut aty = vec![0.0; dim];

    for (row, &y) in features.iter().zip(targets.iter()) {
        let mut x = row.clone();
        x.resize(k, 0.0);
        x.push(1.0);
        for i in 0..dim {
            aty[i] += x[i] * y;
            for j in 0..dim {
                ata[i][j] += x[i] * x[j];
            }
        }
    }
    for i in 0..dim {
        ata[i][i] += 1e-6;
    }

    match gaussian_solve(ata, aty) {
        Some(w) => {
            let bias = w[dim - 1];
            let weights = w[..dim - 1].to_vec();
            (weights, bias)
        }
        None => (vec![0.0; k], 0.0),
    }
}

/// Gauss-Jordan elimination with partial pivoting; returns `None` for a
/// singular system.
fn gaussian_solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let mut pivot = col;
        for r in (col + 1)..n {
            if a[r][col].abs() > a[pivot][col].abs() {
                pivot = r;
            }
        }
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        let pv = a[col][col];
        for j in col..n {
            a[col][j] /= pv;
        }
        b[col] /= pv;
        for r in 0..n {
            if r != col {
                let factor = a[r][col];
                if factor != 0.0 {
                    for j in col..n {
                        a[r][j] -= factor * a[col][j];
                    }
                    b[r] -= factor * b[col];
                }
            }
        }
    }
    Some(b)
}

/// Builds the 10-feature design vector for the latest point in `history`
/// (spec §4.6(d)). Requires at least 10 points in `history`.
pub fn build_features(history: &[&DataPoint]) -> Vec<f64> {
    let latest = history.last().expect("history non-empty when called");
    let last10 = &history[history.len().saturating_sub(10)..];

    let latencies: Vec<f64> = last10.iter().filter_map(|p| p.latency).collect();
    let losses: Vec<f64> = last10.iter().filter_map(|p| p.loss).collect();
    let scores: Vec<f64> = last10.iter().map(|p| p.score).collect();

    let mean_latency_10 = mean(&latencies);
    let mean_loss_10 = mean(&losses);
    let mean_score_10 = mean(&scores);
    let std_lat = std_dev(&latencies, mean_latency_10);

    let t0 = last10[0].timestamp;
    let lat_series: Vec<(f64, f64)> = last10
        .iter()
        .filter_map(|p| p.latency.map(|l| (minutes_since(t0, p.timestamp), l)))
        .collect();
    let loss_series: Vec<(f64, f64)> = last10
        .iter()
        .filter_map(|p| p.loss.map(|l| (minutes_since(t0, p.timestamp), l)))
        .collect();
    let score_series: Vec<(f64, f64)> =
        last10.iter().map(|p| (minutes_since(t0, p.timestamp), p.score)).collect();

    let trend_lat = crate::regression::linear_regression(&lat_series).0;
    let trend_loss = crate::regression::linear_regression(&loss_series).0;
    let trend_score = crate::regression::linear_regression(&score_series).0;

    vec![
        latest.latency.unwrap_or(mean_latency_10),
        latest.loss.unwrap_or(mean_loss_10),
        latest.score,
        mean_latency_10,
        mean_loss_10,
        mean_score_10,
        trend_lat,
        trend_loss,
        trend_score,
        std_lat,
    ]
}

fn minutes_since(t0: chrono::DateTime<Utc>, t: chrono::DateTime<Utc>) -> f64 {
    (t - t0).num_milliseconds() as f64 / 60_000.0
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn std_dev(xs: &[f64], mean_x: f64) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let var = xs.iter().map(|x| (x - mean_x).powi(2)).sum::<f64>() / xs.len() as f64;
    var.sqrt()
}

/// Target per spec §4.6(d): 1.0 if the sample's score was unhealthy.
pub fn target_for_score(score: f64) -> f64 {
    if score < 50.0 {
        1.0
    } else {
        0.0
    }
}

pub fn details(risk: f64, confidence: f64) -> serde_json::Value {
    json!({"risk": risk, "r2": confidence})
}
