//! Configuration types.
//!
//! Everything is read once at startup from environment variables.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::notify::MailConfig;
use crate::pipeline::ClassificationPolicy;

/// Inbound HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
        }
    }
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Model that writes the call summary and classifies the caller.
    pub summary_llm: LlmConfig,
    /// Model that picks recipients.
    pub router_llm: LlmConfig,
    /// Bound on every LLM call.
    pub llm_timeout: Duration,
    pub classification_policy: ClassificationPolicy,
    /// JSON roster file. `None` means the built-in firm roster.
    pub roster_file: Option<PathBuf>,
    pub mail: MailConfig,
    /// Directory for daily-rotated log files, if file logging is enabled.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup.
    pub fn from_source(get: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lookup = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let defaults = ServerConfig::default();
        let server = ServerConfig {
            bind_addr: parse_or(
                "CALL_NOTIFY_BIND_ADDR",
                lookup("CALL_NOTIFY_BIND_ADDR"),
                defaults.bind_addr,
            )?,
            port: parse_or("PORT", lookup("PORT"), defaults.port)?,
        };

        let summary_llm = llm_config(
            &lookup,
            "CALL_NOTIFY_SUMMARY_BACKEND",
            LlmBackend::OpenAi,
            "CALL_NOTIFY_SUMMARY_MODEL",
            "gpt-4o",
        )?;
        let router_llm = llm_config(
            &lookup,
            "CALL_NOTIFY_ROUTER_BACKEND",
            LlmBackend::Anthropic,
            "CALL_NOTIFY_ROUTER_MODEL",
            "claude-3-5-haiku-latest",
        )?;

        let llm_timeout = Duration::from_secs(parse_or(
            "CALL_NOTIFY_LLM_TIMEOUT_SECS",
            lookup("CALL_NOTIFY_LLM_TIMEOUT_SECS"),
            60u64,
        )?);

        // A policy file takes precedence over a named built-in policy.
        let classification_policy = match lookup("CALL_NOTIFY_CLASSIFICATION_POLICY_FILE") {
            Some(path) => ClassificationPolicy::from_file(&PathBuf::from(path))?,
            None => match lookup("CALL_NOTIFY_CLASSIFICATION_POLICY") {
                Some(name) => name.parse()?,
                None => ClassificationPolicy::default(),
            },
        };

        Ok(Self {
            server,
            summary_llm,
            router_llm,
            llm_timeout,
            classification_policy,
            roster_file: lookup("CALL_NOTIFY_ROSTER_FILE").map(PathBuf::from),
            mail: MailConfig::from_source(get)?,
            log_dir: lookup("CALL_NOTIFY_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn llm_config(
    lookup: &dyn Fn(&str) -> Option<String>,
    backend_key: &str,
    default_backend: LlmBackend,
    model_key: &str,
    default_model: &str,
) -> Result<LlmConfig, ConfigError> {
    let backend = match lookup(backend_key) {
        Some(raw) => raw.parse::<LlmBackend>().map_err(|_| ConfigError::InvalidValue {
            key: backend_key.to_string(),
            message: format!("unknown LLM backend '{raw}' (expected anthropic or openai)"),
        })?,
        None => default_backend,
    };

    let key_var = match backend {
        LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        LlmBackend::OpenAi => "OPENAI_API_KEY",
    };
    let api_key = lookup(key_var).ok_or_else(|| ConfigError::MissingEnvVar(key_var.to_string()))?;

    Ok(LlmConfig {
        backend,
        api_key: SecretString::from(api_key),
        model: lookup(model_key).unwrap_or_else(|| default_model.to_string()),
    })
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("could not parse '{raw}'"),
        }),
        None => Ok(default),
    }
}
