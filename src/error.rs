//! Error types for call-notify.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} timed out after {after:?}")]
    Timeout { provider: String, after: Duration },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outbound mail errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),

    #[error("Mail task failed: {0}")]
    Task(String),
}

/// Failures of a single call's processing pipeline.
///
/// Any of these aborts the remaining stages for that call only.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Malformed model output in {stage} stage: {reason}")]
    MalformedModelOutput { stage: &'static str, reason: String },

    #[error("Summarization failed: {0}")]
    Summarization(#[from] LlmError),

    #[error("Routing failed: {0}")]
    RoutingFailure(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}

impl PipelineError {
    /// Name of the stage that produced this error, for log context.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::MalformedModelOutput { stage, .. } => stage,
            Self::Summarization(_) => "summarize",
            Self::RoutingFailure(_) => "route",
            Self::DeliveryFailed(_) => "notify",
        }
    }
}
