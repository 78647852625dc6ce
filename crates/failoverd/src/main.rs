//! Reference entry point for the multi-WAN failover decision core. This
//! binary is a thin demonstration harness (spec.md §1, §2 "ambient
//! layers"): it parses flags, loads `EngineConfig` from TOML, reads
//! newline-delimited JSON metrics samples from stdin, drives the
//! orchestration tick on a fixed interval, and prints `SwitchEvent`s as
//! they occur. Packaging, CLI ergonomics beyond this, and OS network
//! configuration remain out of scope.

mod collaborators;
mod ingest;

use anyhow::Context;
use clap::{Parser, Subcommand};
use collaborators::{ConsoleNotifier, LoggingController};
use failover_core::{
    Engine, EngineConfig, FileAuditSink, InMemoryTelemetryStore, NullAuditSink,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "failoverd", version, about = "Multi-WAN failover decision daemon")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the EngineConfig TOML file. Missing file falls back to
    /// built-in defaults (spec.md §6.3).
    #[arg(long, default_value = "./failoverd.toml")]
    config: PathBuf,

    /// Seconds between orchestration ticks (spec.md §4.10: the engine
    /// itself implies no cadence, the caller drives it).
    #[arg(long, default_value_t = 2.0)]
    tick_interval_s: f64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and validate a config file, then exit (spec SPEC_FULL.md §8
    /// "Config-file hot validation").
    CheckConfig {
        /// Path to the TOML file to validate; defaults to --config.
        path: Option<PathBuf>,
    },
}

fn load_config(path: &PathBuf) -> anyhow::Result<EngineConfig> {
    match std::fs::read_to_string(path) {
        Ok(contents) => EngineConfig::from_toml_str(&contents)
            .with_context(|| format!("invalid config at {}", path.display())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no config file found, using defaults");
            Ok(EngineConfig::default())
        }
        Err(err) => Err(err).with_context(|| format!("reading config at {}", path.display())),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();

    if let Some(Command::CheckConfig { path }) = &args.command {
        let path = path.clone().unwrap_or_else(|| args.config.clone());
        match load_config(&path) {
            Ok(cfg) => {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
                return Ok(());
            }
            Err(err) => {
                eprintln!("config invalid: {err:#}");
                std::process::exit(1);
            }
        }
    }

    run(args).await
}

async fn run(args: Args) -> anyhow::Result<()> {
    let cfg = load_config(&args.config)?;

    let audit: Arc<dyn failover_core::AuditSink> = if cfg.audit_enabled {
        Arc::new(
            FileAuditSink::new(
                cfg.audit_dir.clone(),
                cfg.audit_max_file_bytes,
                cfg.audit_retention_days,
                cfg.max_decision_history,
            )
            .context("initializing audit sink")?,
        )
    } else {
        Arc::new(NullAuditSink)
    };

    let engine = Arc::new(Engine::new(
        cfg,
        Arc::new(InMemoryTelemetryStore::default()),
        audit,
        Arc::new(ConsoleNotifier),
        Arc::new(LoggingController),
    ));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ingest::IngestRecord>();
    ingest::spawn_stdin_reader(tx);

    install_signal_handlers(Arc::clone(&engine));

    let mut first_seen: HashMap<String, chrono::DateTime<chrono::Utc>> = HashMap::new();
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(args.tick_interval_s.max(0.05)));
    let mut stdin_closed = false;
    let mut ticks_since_save = 0u32;
    const SAVE_MODELS_EVERY_N_TICKS: u32 = 20;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = engine.evaluate_switch().map(|maybe_event| {
                    if let Some(event) = maybe_event {
                        println!("{}", serde_json::to_string(&event).unwrap_or_default());
                    }
                }) {
                    tracing::error!(error = %err, "evaluate_switch failed");
                }
                ticks_since_save += 1;
                if ticks_since_save >= SAVE_MODELS_EVERY_N_TICKS {
                    ticks_since_save = 0;
                    if let Err(err) = engine.save_models() {
                        tracing::warn!(error = %err, "failed to persist ml models");
                    }
                }
            }
            maybe_record = rx.recv(), if !stdin_closed => {
                match maybe_record {
                    Some(record) => {
                        let now = chrono::Utc::now();
                        let up_since = *first_seen.entry(record.member.clone()).or_insert(now);
                        let (member, metrics) = record.into_member(up_since);
                        engine.update_member(member, metrics);
                    }
                    None => {
                        tracing::info!("stdin ingest closed, continuing on tick-only mode");
                        stdin_closed = true;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested, flushing audit sink and ml models");
                if let Err(err) = engine.save_models() {
                    tracing::warn!(error = %err, "failed to persist ml models on shutdown");
                }
                engine.flush_audit();
                break;
            }
        }
    }

    Ok(())
}

/// Installs a `SIGUSR1`-triggered decision-stats dump (SPEC_FULL.md §8:
/// a debug aid, not a dashboard). No-op on non-Unix targets.
fn install_signal_handlers(engine: Arc<Engine>) {
    #[cfg(unix)]
    {
        tokio::spawn(async move {
            let Ok(mut stream) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::user_defined1())
            else {
                return;
            };
            loop {
                stream.recv().await;
                let stats = engine.get_decision_stats(None);
                match serde_json::to_string_pretty(&stats) {
                    Ok(json) => eprintln!("{json}"),
                    Err(err) => tracing::warn!(error = %err, "failed to serialize decision stats"),
                }
            }
        });
    }
    #[cfg(not(unix))]
    {
        let _ = engine;
    }
}
