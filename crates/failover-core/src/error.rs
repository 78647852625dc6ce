//! Error types for the decision engine. Only construction-time
//! misconfiguration is fatal; every other variant is recoverable and is
//! either counted, logged, or surfaced without poisoning engine state.

#[derive(Debug, thiserror::Error)]
pub enum FailoverError {
    #[error("invalid metric sample for {member}: {reason}")]
    Validation { member: String, reason: String },

    #[error("audit sink error: {0}")]
    AuditIo(#[source] std::io::Error),

    #[error("telemetry store error: {0}")]
    Telemetry(String),

    #[error("controller failed to switch {from:?} -> {to}: {source}")]
    Controller {
        from: Option<String>,
        to: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("predictive model error: {0}")]
    Predictive(String),
}

pub type Result<T> = std::result::Result<T, FailoverError>;
