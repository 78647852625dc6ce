//! C5 — Switch Arbiter decision helpers: best-member selection, decision-ID
//! minting, and reason-code derivation. The stateful tick itself (cooldown,
//! dominance, predictive upgrade, event emission) is orchestrated by
//! `engine::Engine::evaluate_switch`, which calls into these pure helpers.

use crate::config::EngineConfig;
use crate::model::MemberState;
use chrono::{DateTime, Utc};
use rand::RngCore;
use std::collections::HashMap;

/// `best := argmax_{m eligible} Score.Final`. Ties broken by member name for
/// determinism across identical ticks.
pub fn select_best(states: &HashMap<String, MemberState>) -> Option<(String, f64)> {
    states
        .values()
        .filter(|s| s.eligible)
        .map(|s| (s.member.name.clone(), s.score.final_score))
        .fold(None, |acc, (name, score)| match acc {
            None => Some((name, score)),
            Some((best_name, best_score)) => {
                if score > best_score || (score == best_score && name < best_name) {
                    Some((name, score))
                } else {
                    Some((best_name, best_score))
                }
            }
        })
}

/// `"d_" + yyyymmddHHMMSS + "_" + 4-byte-hex-random`.
pub fn new_decision_id(now: DateTime<Utc>) -> String {
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("d_{}_{}", now.format("%Y%m%d%H%M%S"), hex::encode(bytes))
}

/// First-match reason code per spec §4.5: latency improvement, loss
/// reduction, preferred class, falling back to score improvement. When
/// there is no current primary, `initial_selection` is used instead; when
/// the configured current primary has no tracked state, `current_unavailable`.
pub fn reason_code(
    cfg: &EngineConfig,
    current: Option<&MemberState>,
    best: &MemberState,
    current_was_tracked: bool,
) -> &'static str {
    let Some(current) = current else {
        return if current_was_tracked {
            "current_unavailable"
        } else {
            "initial_selection"
        };
    };

    let delta_latency = current.metrics.latency_ms.unwrap_or(0.0) - best.metrics.latency_ms.unwrap_or(0.0);
    if delta_latency > 50.0 {
        return "latency_improvement";
    }

    let delta_loss = current.metrics.packet_loss_pct.unwrap_or(0.0) - best.metrics.packet_loss_pct.unwrap_or(0.0);
    if delta_loss > 1.0 {
        return "loss_reduction";
    }

    let current_class_weight = cfg.class_weight(current.member.class);
    let best_class_weight = cfg.class_weight(best.member.class);
    if best_class_weight > current_class_weight {
        return "preferred_class";
    }

    "score_improvement"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Class, IneligibilityCode, Member, Metrics, Score};

    fn state(name: &str, class: Class, final_score: f64, eligible: bool) -> MemberState {
        let now = Utc::now();
        MemberState {
            member: Member::new(name, class, "eth0"),
            metrics: Metrics::default(),
            score: {
                let mut s = Score::zero(now);
                s.final_score = final_score;
                s
            },
            eligible,
            ineligible_reason: if eligible { None } else { Some(IneligibilityCode::Dead) },
            cooldown_until: None,
            up_since: None,
        }
    }

    #[test]
    fn select_best_ignores_ineligible() {
        let mut states = HashMap::new();
        states.insert("m1".to_string(), state("m1", Class::Lan, 90.0, false));
        states.insert("m2".to_string(), state("m2", Class::Lan, 70.0, true));
        let (name, score) = select_best(&states).unwrap();
        assert_eq!(name, "m2");
        assert_eq!(score, 70.0);
    }

    #[test]
    fn select_best_ties_break_on_name() {
        let mut states = HashMap::new();
        states.insert("zeta".to_string(), state("zeta", Class::Lan, 80.0, true));
        states.insert("alpha".to_string(), state("alpha", Class::Lan, 80.0, true));
        let (name, _) = select_best(&states).unwrap();
        assert_eq!(name, "alpha");
    }

    #[test]
    fn decision_id_has_expected_shape() {
        let now = Utc::now();
        let id = new_decision_id(now);
        assert!(id.starts_with("d_"));
        let parts: Vec<&str> = id.trim_start_matches("d_").split('_').collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 14);
        assert_eq!(parts[1].len(), 8);
    }

    #[test]
    fn reason_code_prefers_latency_then_loss_then_class() {
        let cfg = EngineConfig::default();
        let mut current = state("m1", Class::Cellular, 60.0, true);
        current.metrics.latency_ms = Some(200.0);
        current.metrics.packet_loss_pct = Some(0.5);
        let mut best = state("m2", Class::Starlink, 80.0, true);
        best.metrics.latency_ms = Some(100.0);
        best.metrics.packet_loss_pct = Some(0.5);

        assert_eq!(reason_code(&cfg, Some(&current), &best, true), "latency_improvement");
    }

    #[test]
    fn reason_code_no_current_is_initial_selection() {
        let cfg = EngineConfig::default();
        let best = state("m2", Class::Starlink, 80.0, true);
        assert_eq!(reason_code(&cfg, None, &best, false), "initial_selection");
    }

    #[test]
    fn reason_code_missing_current_state() {
        let cfg = EngineConfig::default();
        let best = state("m2", Class::Starlink, 80.0, true);
        assert_eq!(reason_code(&cfg, None, &best, true), "current_unavailable");
    }
}
