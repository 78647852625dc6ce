//! (c) Pattern Predictor — recognizes cyclic, deteriorating, and improving
//! shapes in a member's recent score history.

use crate::model::{DataPoint, Pattern};
use serde_json::json;

const WINDOW: usize = 10;
const MATCH_RATIO: f64 = 0.7;

/// Classifies the shape of the most recent `WINDOW` score samples.
pub fn detect(points: &[&DataPoint]) -> Pattern {
    if points.len() < 5 {
        return Pattern::None;
    }
    let scores: Vec<f64> = points.iter().map(|p| p.score).collect();
    let window = &scores[scores.len().saturating_sub(WINDOW)..];
    let transitions = window.len() - 1;
    if transitions == 0 {
        return Pattern::None;
    }

    let declines = window.windows(2).filter(|w| w[1] < w[0] - 1e-9).count();
    let improves = window.windows(2).filter(|w| w[1] > w[0] + 1e-9).count();
    let decline_ratio = declines as f64 / transitions as f64;
    let improve_ratio = improves as f64 / transitions as f64;

    if decline_ratio >= MATCH_RATIO {
        Pattern::Deteriorating
    } else if improve_ratio >= MATCH_RATIO {
        Pattern::Improving
    } else if is_cyclic(window) {
        Pattern::Cyclic
    } else {
        Pattern::None
    }
}

/// Autocorrelation-proxy: splits the window in half and checks whether the
/// two halves are strongly anti-correlated, the signature of oscillation.
fn is_cyclic(window: &[f64]) -> bool {
    if window.len() < 6 {
        return false;
    }
    let mid = window.len() / 2;
    let (first, second) = window.split_at(mid);
    let n = first.len().min(second.len());
    if n < 2 {
        return false;
    }
    let mean1 = first[..n].iter().sum::<f64>() / n as f64;
    let mean2 = second[..n].iter().sum::<f64>() / n as f64;
    let mut num = 0.0;
    let mut den1 = 0.0;
    let mut den2 = 0.0;
    for i in 0..n {
        let a = first[i] - mean1;
        let b = second[i] - mean2;
        num += a * b;
        den1 += a * a;
        den2 += b * b;
    }
    if den1.abs() < 1e-9 || den2.abs() < 1e-9 {
        return false;
    }
    let corr = num / (den1.sqrt() * den2.sqrt());
    corr < -0.6
}

/// Only a deteriorating pattern feeds the ensembler — risk/confidence are
/// both set to the decline match-ratio per spec §4.6(c).
pub fn analyze(points: &[&DataPoint]) -> Option<(f64, f64, serde_json::Value)> {
    let scores: Vec<f64> = points.iter().map(|p| p.score).collect();
    if scores.len() < 5 {
        return None;
    }
    let window = &scores[scores.len().saturating_sub(WINDOW)..];
    let transitions = window.len() - 1;
    let declines = window.windows(2).filter(|w| w[1] < w[0] - 1e-9).count();
    let decline_ratio = declines as f64 / transitions as f64;

    match detect(points) {
        Pattern::Deteriorating => Some((
            decline_ratio,
            decline_ratio,
            json!({"pattern": "deteriorating", "decline_ratio": decline_ratio}),
        )),
        _ => None,
    }
}
