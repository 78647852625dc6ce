//! Newline-delimited JSON metrics ingestion (spec.md §6.1 "Collector"
//! contract). One JSON object per line on stdin:
//!
//! ```json
//! {"member":"starlink0","class":"starlink","iface":"wan0","metrics":{"latency_ms":30.0}}
//! ```
//!
//! This is a stand-in collector for local testing and demos; a real
//! deployment wires gRPC/AT/UCI/ICMP collectors directly against
//! `Engine::update_member` instead of going through stdin.

use failover_core::{Class, Member, Metrics};
use serde::Deserialize;
use std::io::BufRead;

#[derive(Debug, Deserialize)]
pub struct IngestRecord {
    pub member: String,
    #[serde(default = "default_class")]
    pub class: Class,
    #[serde(default)]
    pub iface: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_weight")]
    pub weight: i32,
    #[serde(default)]
    pub policy_tag: String,
    pub metrics: Metrics,
}

fn default_class() -> Class {
    Class::Other
}

fn default_true() -> bool {
    true
}

fn default_weight() -> i32 {
    1
}

impl IngestRecord {
    pub fn into_member(self, up_since: chrono::DateTime<chrono::Utc>) -> (Member, Metrics) {
        let member = Member {
            name: self.member,
            class: self.class,
            iface: self.iface,
            enabled: self.enabled,
            weight: self.weight,
            policy_tag: self.policy_tag,
            up_since: Some(up_since),
        };
        (member, self.metrics)
    }
}

/// Spawns a blocking OS thread that reads newline-delimited JSON records
/// from `reader` and forwards parsed `IngestRecord`s over `tx`. Runs until
/// the reader hits EOF or a send fails (receiver dropped). Malformed lines
/// are logged and skipped rather than killing the ingest loop (spec.md §7
/// "validation" errors are counted, not surfaced).
pub fn spawn_stdin_reader(tx: tokio::sync::mpsc::UnboundedSender<IngestRecord>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(l) => l,
                Err(err) => {
                    tracing::warn!(error = %err, "stdin read error, stopping ingest");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<IngestRecord>(&line) {
                Ok(record) => {
                    if tx.send(record).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, line, "skipping malformed metrics line");
                }
            }
        }
    });
}
