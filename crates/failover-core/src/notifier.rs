//! C9 — Notification Emitter. Formats a `SwitchEvent` plus the current
//! member snapshot map into a priority-tagged `Notification`, and dispatches
//! delivery fire-and-forget within a 30-second deadline.

use crate::model::{MemberState, Notification, NotificationPriority, SwitchEvent, SwitchType};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivery collaborator contract (spec §6.1). Implementations perform their
/// own I/O (webhook POST, MQTT publish, local syslog, ...); the engine only
/// ever calls `dispatch`, never awaits `send` directly.
pub trait Notifier: Send + Sync {
    fn send(&self, notification: Notification) -> BoxFuture<'static, anyhow::Result<()>>;
}

/// Discards every notification; used in tests and disabled deployments.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn send(&self, _notification: Notification) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Dispatches `notification` to `notifier` on the current tokio runtime
/// (fire-and-forget, 30s timeout). If no runtime is available (e.g. a
/// synchronous embedder with no notifier wiring) the notification is
/// dropped with a warning — failure to notify never blocks or fails a
/// switch decision, per spec §4.9.
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: Notification) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                match tokio::time::timeout(DELIVERY_TIMEOUT, notifier.send(notification)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => tracing::warn!(error = %err, "notification delivery failed"),
                    Err(_) => tracing::warn!("notification delivery timed out after 30s"),
                }
            });
        }
        Err(_) => {
            tracing::warn!("no tokio runtime available, dropping notification");
        }
    }
}

fn emoji_for(switch_type: SwitchType) -> &'static str {
    match switch_type {
        SwitchType::Failover => "\u{1F534}",
        SwitchType::Failback => "\u{1F7E2}",
        SwitchType::Predictive => "\u{1F7E1}",
    }
}

fn priority_for(switch_type: SwitchType) -> NotificationPriority {
    match switch_type {
        SwitchType::Predictive => NotificationPriority::Warning,
        SwitchType::Failover => NotificationPriority::Critical,
        SwitchType::Failback => NotificationPriority::Info,
    }
}

fn kind_for(switch_type: SwitchType) -> &'static str {
    match switch_type {
        SwitchType::Failover => "failure",
        SwitchType::Failback => "fix",
        SwitchType::Predictive => "status",
    }
}

fn next_steps_for(switch_type: SwitchType) -> Vec<String> {
    match switch_type {
        SwitchType::Failover => vec![
            "Inspect the previous primary's last metrics for root cause".to_string(),
            "Confirm the controller applied the route change".to_string(),
        ],
        SwitchType::Failback => vec!["Verify the restored primary remains stable before closing out".to_string()],
        SwitchType::Predictive => vec![
            "Review the predictive engine's trigger reasons".to_string(),
            "Watch for a confirming failover in the next few ticks".to_string(),
        ],
    }
}

/// Builds the outbound notification for a `SwitchEvent`, using the member
/// snapshot map (post-switch) to populate per-member context.
pub fn build_notification(
    event: &SwitchEvent,
    members: &std::collections::HashMap<String, MemberState>,
) -> Notification {
    let from = event.from.as_deref().unwrap_or("none");
    let title = format!("{} WAN {:?}", emoji_for(event.switch_type), event.switch_type);
    let message = format!(
        "{from} -> {to} ({reason}, \u{394}={delta:.1})",
        from = from,
        to = event.to,
        reason = event.reason,
        delta = event.score_delta
    );

    let mut context = std::collections::HashMap::new();
    for (name, state) in members {
        let mut member_ctx = serde_json::json!({
            "score": state.score.final_score,
            "eligible": state.eligible,
            "class": state.member.class.to_string(),
        });
        if let Some(obj) = member_ctx.as_object_mut() {
            if let Some(latency) = state.metrics.latency_ms {
                obj.insert("latency_ms".to_string(), serde_json::json!(latency));
            }
            if let Some(loss) = state.metrics.packet_loss_pct {
                obj.insert("loss_pct".to_string(), serde_json::json!(loss));
            }
        }
        context.insert(name.clone(), member_ctx);
    }
    context.insert("decision_id".to_string(), serde_json::json!(event.decision_id));

    Notification {
        priority: priority_for(event.switch_type),
        kind: kind_for(event.switch_type).to_string(),
        title,
        message,
        context,
        next_steps: next_steps_for(event.switch_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Class, Member, Score};
    use chrono::Utc;

    fn member_state(name: &str, score: f64) -> MemberState {
        MemberState {
            member: Member::new(name, Class::Lan, "eth0"),
            metrics: crate::model::Metrics {
                latency_ms: Some(40.0),
                packet_loss_pct: Some(0.2),
                ..Default::default()
            },
            score: {
                let mut s = Score::zero(Utc::now());
                s.final_score = score;
                s
            },
            eligible: true,
            ineligible_reason: None,
            cooldown_until: None,
            up_since: None,
        }
    }

    #[test]
    fn failover_gets_critical_priority_and_fire_emoji() {
        let event = SwitchEvent {
            timestamp: Utc::now(),
            switch_type: SwitchType::Failover,
            from: Some("wan0".to_string()),
            to: "wan1".to_string(),
            reason: "loss_reduction".to_string(),
            score_delta: 15.0,
            decision_id: "d_1".to_string(),
        };
        let mut members = std::collections::HashMap::new();
        members.insert("wan0".to_string(), member_state("wan0", 20.0));
        members.insert("wan1".to_string(), member_state("wan1", 90.0));

        let notification = build_notification(&event, &members);
        assert_eq!(notification.priority, NotificationPriority::Critical);
        assert!(notification.message.contains("wan0 -> wan1"));
        assert!(notification.context.contains_key("wan1"));
    }

    #[test]
    fn predictive_gets_warning_priority() {
        let event = SwitchEvent {
            timestamp: Utc::now(),
            switch_type: SwitchType::Predictive,
            from: Some("wan0".to_string()),
            to: "wan1".to_string(),
            reason: "rapid_obstruction_increase".to_string(),
            score_delta: 12.0,
            decision_id: "d_2".to_string(),
        };
        let members = std::collections::HashMap::new();
        let notification = build_notification(&event, &members);
        assert_eq!(notification.priority, NotificationPriority::Warning);
        assert_eq!(notification.kind, "status");
    }
}
