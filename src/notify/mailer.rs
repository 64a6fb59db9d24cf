//! SMTP delivery via lettre.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::response::Response;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::error::{ConfigError, MailError};
use crate::notify::{DeliveryReceipt, MailTransport, OutgoingEmail};

// ── Configuration ───────────────────────────────────────────────────

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// TLS from the first byte (usually port 465).
    ImplicitTls,
    /// Plain connection upgraded with STARTTLS (usually port 587).
    StartTls,
    /// No encryption. Local relays and test servers only.
    None,
}

impl SmtpSecurity {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "tls" | "ssl" => Ok(Self::ImplicitTls),
            "false" | "0" | "no" | "starttls" => Ok(Self::StartTls),
            "none" | "plain" | "plaintext" => Ok(Self::None),
            other => Err(ConfigError::InvalidValue {
                key: "EMAIL_SECURE".to_string(),
                message: format!("'{other}' (expected true, false or none)"),
            }),
        }
    }
}

/// SMTP settings, built from environment variables.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub username: Option<String>,
    pub password: SecretString,
    pub from_address: String,
    pub timeout: Duration,
}

impl MailConfig {
    /// Build config from any key lookup. `EMAIL_HOST` and a sender address
    /// (`EMAIL_FROM` or `EMAIL_USER`) are required.
    pub fn from_source(get: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = get("EMAIL_HOST")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("EMAIL_HOST".to_string()))?;

        let port: u16 = match get("EMAIL_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "EMAIL_PORT".to_string(),
                message: format!("'{raw}' is not a port number"),
            })?,
            None => 587,
        };

        let security = match get("EMAIL_SECURE") {
            Some(raw) => SmtpSecurity::parse(&raw)?,
            None => SmtpSecurity::StartTls,
        };

        let username = get("EMAIL_USER").filter(|s| !s.trim().is_empty());
        let password = SecretString::from(get("EMAIL_PASSWORD").unwrap_or_default());

        let from_address = get("EMAIL_FROM")
            .filter(|s| !s.trim().is_empty())
            .or_else(|| username.clone())
            .ok_or_else(|| ConfigError::MissingEnvVar("EMAIL_FROM".to_string()))?;

        let timeout_secs: u64 = get("EMAIL_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(30);

        Ok(Self {
            host,
            port,
            security,
            username,
            password,
            from_address,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// ── Transport ───────────────────────────────────────────────────────

/// lettre-backed `MailTransport`. The SMTP transport is built on first send
/// and reused afterwards.
pub struct SmtpMailer {
    config: MailConfig,
    transport: OnceCell<SmtpTransport>,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            config,
            transport: OnceCell::new(),
        }
    }

    pub fn from_address(&self) -> &str {
        &self.config.from_address
    }

    async fn transport(&self) -> Result<&SmtpTransport, MailError> {
        self.transport
            .get_or_try_init(|| async { build_transport(&self.config) })
            .await
    }
}

fn build_transport(config: &MailConfig) -> Result<SmtpTransport, MailError> {
    let builder = match config.security {
        SmtpSecurity::ImplicitTls => SmtpTransport::relay(&config.host)
            .map_err(|e| MailError::Transport(format!("SMTP relay error: {e}")))?,
        SmtpSecurity::StartTls => SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| MailError::Transport(format!("SMTP relay error: {e}")))?,
        SmtpSecurity::None => SmtpTransport::builder_dangerous(&config.host),
    };

    let mut builder = builder
        .port(config.port)
        .timeout(Some(config.timeout));

    if let Some(username) = &config.username {
        builder = builder.credentials(Credentials::new(
            username.clone(),
            config.password.expose_secret().to_string(),
        ));
    }

    tracing::debug!(
        host = %config.host,
        port = config.port,
        security = ?config.security,
        "SMTP transport initialized"
    );
    Ok(builder.build())
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|e| MailError::InvalidAddress {
        address: address.to_string(),
        reason: format!("{e}"),
    })
}

/// Build the MIME message for `email` with a fresh Message-ID.
pub fn build_message(email: &OutgoingEmail, message_id: &str) -> Result<Message, MailError> {
    let mut builder = Message::builder()
        .from(parse_mailbox(&email.from)?)
        .to(parse_mailbox(&email.to)?);

    for cc in &email.cc {
        builder = builder.cc(parse_mailbox(cc)?);
    }

    builder
        .subject(email.subject.clone())
        .message_id(Some(message_id.to_string()))
        .header(ContentType::TEXT_HTML)
        .body(email.html.clone())
        .map_err(|e| MailError::Build(e.to_string()))
}

/// Reply code and message lines of an SMTP response, on one line.
fn response_text(response: &Response) -> String {
    let lines = response.message().collect::<Vec<_>>().join(" ");
    format!("{} {lines}", response.code())
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, email: OutgoingEmail) -> Result<DeliveryReceipt, MailError> {
        let message_id = format!("<{}@call-notify>", Uuid::new_v4());
        let message = build_message(&email, &message_id)?;
        let transport = self.transport().await?.clone();

        // lettre's SmtpTransport is blocking.
        let response = tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| MailError::Task(e.to_string()))?
            .map_err(|e| MailError::Transport(format!("SMTP send failed: {e}")))?;

        let server_response = response_text(&response);
        tracing::info!(
            to = %email.to,
            message_id = %message_id,
            "Email sent"
        );

        Ok(DeliveryReceipt {
            message_id,
            server_response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_starttls_on_587() {
        let config = MailConfig::from_source(&source(&[
            ("EMAIL_HOST", "smtp.example.com"),
            ("EMAIL_USER", "intake@firm.example"),
            ("EMAIL_PASSWORD", "hunter2"),
        ]))
        .unwrap();

        assert_eq!(config.port, 587);
        assert_eq!(config.security, SmtpSecurity::StartTls);
        assert_eq!(config.from_address, "intake@firm.example");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.password.expose_secret(), "hunter2");
    }

    #[test]
    fn secure_flag_selects_implicit_tls() {
        let config = MailConfig::from_source(&source(&[
            ("EMAIL_HOST", "smtp.example.com"),
            ("EMAIL_PORT", "465"),
            ("EMAIL_SECURE", "true"),
            ("EMAIL_FROM", "Intake <intake@firm.example>"),
        ]))
        .unwrap();

        assert_eq!(config.port, 465);
        assert_eq!(config.security, SmtpSecurity::ImplicitTls);
        assert!(config.username.is_none());
        assert_eq!(config.from_address, "Intake <intake@firm.example>");
    }

    #[test]
    fn missing_host_or_sender_rejected() {
        assert!(matches!(
            MailConfig::from_source(&source(&[("EMAIL_USER", "a@b.com")])),
            Err(ConfigError::MissingEnvVar(key)) if key == "EMAIL_HOST"
        ));
        assert!(matches!(
            MailConfig::from_source(&source(&[("EMAIL_HOST", "smtp.example.com")])),
            Err(ConfigError::MissingEnvVar(key)) if key == "EMAIL_FROM"
        ));
    }

    #[test]
    fn invalid_port_and_security_rejected() {
        assert!(
            MailConfig::from_source(&source(&[
                ("EMAIL_HOST", "smtp.example.com"),
                ("EMAIL_USER", "a@b.com"),
                ("EMAIL_PORT", "smtp"),
            ]))
            .is_err()
        );
        assert!(
            MailConfig::from_source(&source(&[
                ("EMAIL_HOST", "smtp.example.com"),
                ("EMAIL_USER", "a@b.com"),
                ("EMAIL_SECURE", "maybe"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn message_carries_cc_and_html() {
        let email = OutgoingEmail {
            from: "intake@firm.example".into(),
            to: "victoria@firm.example".into(),
            cc: vec!["mike@firm.example".into(), "clay@firm.example".into()],
            subject: "New Call: Jane Doe - other".into(),
            html: "<p>Hello</p>".into(),
        };

        let message = build_message(&email, "<abc@call-notify>").unwrap();
        let envelope = message.envelope();
        assert_eq!(envelope.to().len(), 3);

        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("Cc: "));
        assert!(formatted.contains("text/html"));
        assert!(formatted.contains("<abc@call-notify>"));
    }

    #[test]
    fn invalid_recipient_address_rejected() {
        let email = OutgoingEmail {
            from: "intake@firm.example".into(),
            to: "not an address".into(),
            cc: vec![],
            subject: "x".into(),
            html: "x".into(),
        };
        assert!(matches!(
            build_message(&email, "<id@call-notify>"),
            Err(MailError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn multiline_response_joined() {
        use lettre::transport::smtp::response::{Category, Code, Detail, Severity};

        let response = Response::new(
            Code::new(Severity::PositiveCompletion, Category::MailSystem, Detail::Zero),
            vec!["2.0.0 Ok".into(), "queued as 4F2A1".into()],
        );
        assert_eq!(response_text(&response), "250 2.0.0 Ok queued as 4F2A1");
    }

    #[tokio::test]
    async fn transport_built_once() {
        let mailer = SmtpMailer::new(
            MailConfig::from_source(&source(&[
                ("EMAIL_HOST", "localhost"),
                ("EMAIL_PORT", "2525"),
                ("EMAIL_SECURE", "none"),
                ("EMAIL_FROM", "intake@firm.example"),
            ]))
            .unwrap(),
        );

        assert!(mailer.transport.get().is_none());
        let first = mailer.transport().await.unwrap() as *const SmtpTransport;
        let second = mailer.transport().await.unwrap() as *const SmtpTransport;
        assert_eq!(first, second);
    }
}
