//! C8 — Decision Logger / Audit. Every evaluation and action is logged to a
//! bounded in-memory ring plus daily-rotated CSV and JSONL files on disk.

use crate::error::{FailoverError, Result};
use crate::model::{DecisionEvent, DecisionStats};
use crate::ring::RingBuffer;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Fixed CSV column order per spec §6.4 (GPS columns are omitted: no GPS
/// collaborator is modeled in this crate, per the out-of-scope boundary in
/// spec.md §1).
const CSV_HEADER: &str = "timestamp,decision_id,type,member,from,to,reason,trigger_reason,success,error,duration_ms,predictive";

pub trait AuditSink: Send + Sync {
    fn log_decision(&self, event: DecisionEvent);

    /// Most recent decisions, newest-first, optionally filtered by `since`.
    fn get_decisions(&self, since: Option<DateTime<Utc>>, limit: usize) -> Vec<DecisionEvent>;

    fn get_decision_stats(&self, since: Option<DateTime<Utc>>) -> DecisionStats;

    /// Flushes any buffered writer to disk. Called from the daemon's
    /// shutdown path; a no-op for sinks with nothing buffered.
    fn flush(&self);
}

/// No-op sink used when `audit_enabled = false`.
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn log_decision(&self, _event: DecisionEvent) {}

    fn get_decisions(&self, _since: Option<DateTime<Utc>>, _limit: usize) -> Vec<DecisionEvent> {
        Vec::new()
    }

    fn get_decision_stats(&self, _since: Option<DateTime<Utc>>) -> DecisionStats {
        DecisionStats::default()
    }

    fn flush(&self) {}
}

struct OpenFiles {
    date: NaiveDate,
    csv: csv::Writer<BufWriter<File>>,
    jsonl: BufWriter<File>,
    csv_path: PathBuf,
}

struct Inner {
    files: Option<OpenFiles>,
    ring: RingBuffer<DecisionEvent>,
}

/// The real §4.8 implementation: CSV (one file per day) + JSONL (one file
/// per day) + an in-memory ring of the most recent 1,000 decisions.
pub struct FileAuditSink {
    dir: PathBuf,
    max_file_bytes: u64,
    retention_days: i64,
    inner: Mutex<Inner>,
}

impl FileAuditSink {
    pub fn new(dir: impl Into<PathBuf>, max_file_bytes: u64, retention_days: i64, ring_capacity: usize) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(FailoverError::AuditIo)?;
        Ok(Self {
            dir,
            max_file_bytes,
            retention_days,
            inner: Mutex::new(Inner {
                files: None,
                ring: RingBuffer::new(ring_capacity),
            }),
        })
    }

    fn csv_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("decisions_{date}.csv"))
    }

    fn jsonl_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("decisions_{date}.jsonl"))
    }

    fn open_for(&self, date: NaiveDate) -> Result<OpenFiles> {
        let csv_path = self.csv_path(date);
        let write_header = !csv_path.exists();
        let csv_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&csv_path)
            .map_err(FailoverError::AuditIo)?;
        let mut csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(csv_file));
        if write_header {
            csv.write_record(CSV_HEADER.split(','))
                .map_err(|e| FailoverError::AuditIo(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        }

        let jsonl_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.jsonl_path(date))
            .map_err(FailoverError::AuditIo)?;
        let jsonl = BufWriter::new(jsonl_file);

        self.purge_old(date);

        Ok(OpenFiles {
            date,
            csv,
            jsonl,
            csv_path,
        })
    }

    /// Deletes decision files older than `retention_days`, relative to
    /// `as_of`. Best-effort: an unreadable directory entry is skipped.
    fn purge_old(&self, as_of: NaiveDate) {
        let cutoff = as_of - chrono::Duration::days(self.retention_days);
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(date) = parse_decision_date(name) {
                if date < cutoff {
                    let _ = std::fs::remove_file(entry.path());
                }
            }
        }
    }

    fn ensure_open(&self, inner: &mut Inner, now: DateTime<Utc>) -> Result<()> {
        let today = now.date_naive();
        let needs_rotation = match &inner.files {
            None => true,
            Some(f) => {
                f.date != today
                    || f.csv_path.metadata().map(|m| m.len()).unwrap_or(0) >= self.max_file_bytes
            }
        };
        if needs_rotation {
            if let Some(mut old) = inner.files.take() {
                let _ = old.csv.flush();
                let _ = old.jsonl.flush();
            }
            inner.files = Some(self.open_for(today)?);
        }
        Ok(())
    }

    fn write_record(&self, inner: &mut Inner, event: &DecisionEvent) -> Result<()> {
        self.ensure_open(inner, event.timestamp)?;
        let files = inner.files.as_mut().expect("ensure_open populates files");

        let member = event.to.clone().or_else(|| event.from.clone()).unwrap_or_default();
        let event_type = format!("{:?}", event.event_type);
        files
            .csv
            .write_record(&[
                event.timestamp.to_rfc3339(),
                event.decision_id.clone(),
                event_type,
                member,
                event.from.clone().unwrap_or_default(),
                event.to.clone().unwrap_or_default(),
                event.trigger_reason.clone(),
                event.trigger_reason.clone(),
                event.success.to_string(),
                event.error.clone().unwrap_or_default(),
                event.duration_ms.to_string(),
                event.predictive.to_string(),
            ])
            .map_err(|e| FailoverError::AuditIo(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        let json = serde_json::to_string(event).map_err(|e| FailoverError::Telemetry(e.to_string()))?;
        writeln!(files.jsonl, "{json}").map_err(FailoverError::AuditIo)?;

        files.csv.flush().map_err(FailoverError::AuditIo)?;
        files.jsonl.flush().map_err(FailoverError::AuditIo)?;
        Ok(())
    }

}

impl AuditSink for FileAuditSink {
    fn log_decision(&self, event: DecisionEvent) {
        let mut inner = self.inner.lock();
        inner.ring.push(event.clone());
        if let Err(err) = self.write_record(&mut inner, &event) {
            tracing::warn!(error = %err, decision_id = %event.decision_id, "audit write failed, decision retained in memory only");
        }
    }

    /// Most recent decisions, newest-first, optionally filtered by `since`.
    fn get_decisions(&self, since: Option<DateTime<Utc>>, limit: usize) -> Vec<DecisionEvent> {
        let inner = self.inner.lock();
        inner
            .ring
            .newest_first(inner.ring.len())
            .into_iter()
            .filter(|e| since.map(|s| e.timestamp >= s).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect()
    }

    fn get_decision_stats(&self, since: Option<DateTime<Utc>>) -> DecisionStats {
        let inner = self.inner.lock();
        let events: Vec<&DecisionEvent> = inner
            .ring
            .iter()
            .filter(|e| since.map(|s| e.timestamp >= s).unwrap_or(true))
            .collect();

        let mut stats = DecisionStats::default();
        stats.total = events.len() as u64;
        if events.is_empty() {
            return stats;
        }

        let mut successes = 0u64;
        let mut predictive_count = 0u64;
        let mut total_duration = 0.0;
        for event in &events {
            *stats.by_type.entry(format!("{:?}", event.event_type)).or_insert(0) += 1;
            *stats.by_reason.entry(event.trigger_reason.clone()).or_insert(0) += 1;
            if event.success {
                successes += 1;
            }
            if event.predictive {
                predictive_count += 1;
            }
            total_duration += event.duration_ms;
        }
        stats.success_rate = successes as f64 / events.len() as f64;
        stats.avg_decision_time_ms = total_duration / events.len() as f64;
        stats.predictive_share = predictive_count as f64 / events.len() as f64;
        stats
    }

    /// Flushes the currently open CSV/JSONL writers, if any. `write_record`
    /// already flushes after every record, so this is a belt-and-suspenders
    /// call for the shutdown path rather than a correction to a bug.
    fn flush(&self) {
        let mut inner = self.inner.lock();
        if let Some(files) = inner.files.as_mut() {
            let _ = files.csv.flush();
            let _ = files.jsonl.flush();
        }
    }
}

fn parse_decision_date(filename: &str) -> Option<NaiveDate> {
    let stem = filename.strip_prefix("decisions_")?;
    let date_part = stem.split('.').next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

pub fn default_audit_dir() -> &'static Path {
    Path::new("./decisions")
}
