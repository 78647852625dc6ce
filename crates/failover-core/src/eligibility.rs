//! C3 — Eligibility Gate. A member is eligible iff it is enabled, past its
//! warmup window, past any cooldown, and not scoring zero.

use crate::config::EngineConfig;
use crate::model::{IneligibilityCode, MemberState};
use chrono::{DateTime, Utc};

/// Evaluates the four eligibility conditions from spec §4.3, in order, and
/// returns `(eligible, ineligible_reason)`. The reason is `None` iff eligible.
pub fn evaluate(
    cfg: &EngineConfig,
    state: &MemberState,
    now: DateTime<Utc>,
) -> (bool, Option<IneligibilityCode>) {
    if !state.member.enabled {
        return (false, Some(IneligibilityCode::Disabled));
    }

    if let Some(up_since) = state.up_since {
        let uptime = (now - up_since).num_milliseconds() as f64 / 1000.0;
        if uptime < cfg.min_uptime_s {
            return (false, Some(IneligibilityCode::Warmup));
        }
    }

    if let Some(until) = state.cooldown_until {
        if now < until {
            return (false, Some(IneligibilityCode::Cooldown));
        }
    }

    if state.score.final_score <= 0.0 {
        return (false, Some(IneligibilityCode::Dead));
    }

    (true, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Class, Member, Metrics, Score};

    fn base_state(now: DateTime<Utc>) -> MemberState {
        MemberState {
            member: Member::new("wan0", Class::Lan, "eth1"),
            metrics: Metrics::default(),
            score: {
                let mut s = Score::zero(now);
                s.final_score = 80.0;
                s
            },
            eligible: false,
            ineligible_reason: None,
            cooldown_until: None,
            up_since: Some(now - chrono::Duration::seconds(120)),
        }
    }

    #[test]
    fn disabled_member_is_ineligible() {
        let cfg = EngineConfig::default();
        let now = Utc::now();
        let mut state = base_state(now);
        state.member.enabled = false;
        let (eligible, reason) = evaluate(&cfg, &state, now);
        assert!(!eligible);
        assert_eq!(reason, Some(IneligibilityCode::Disabled));
    }

    #[test]
    fn warmup_blocks_recent_up_since() {
        let cfg = EngineConfig::default();
        let now = Utc::now();
        let mut state = base_state(now);
        state.up_since = Some(now - chrono::Duration::seconds(1));
        let (eligible, reason) = evaluate(&cfg, &state, now);
        assert!(!eligible);
        assert_eq!(reason, Some(IneligibilityCode::Warmup));
    }

    #[test]
    fn cooldown_blocks_until_elapsed() {
        let cfg = EngineConfig::default();
        let now = Utc::now();
        let mut state = base_state(now);
        state.cooldown_until = Some(now + chrono::Duration::seconds(5));
        let (eligible, reason) = evaluate(&cfg, &state, now);
        assert!(!eligible);
        assert_eq!(reason, Some(IneligibilityCode::Cooldown));
    }

    #[test]
    fn zero_score_is_dead() {
        let cfg = EngineConfig::default();
        let now = Utc::now();
        let mut state = base_state(now);
        state.score.final_score = 0.0;
        let (eligible, reason) = evaluate(&cfg, &state, now);
        assert!(!eligible);
        assert_eq!(reason, Some(IneligibilityCode::Dead));
    }

    #[test]
    fn healthy_member_is_eligible() {
        let cfg = EngineConfig::default();
        let now = Utc::now();
        let state = base_state(now);
        let (eligible, reason) = evaluate(&cfg, &state, now);
        assert!(eligible);
        assert_eq!(reason, None);
    }
}
