//! Notification composer/sender — turns a routed call into an email.

pub mod mailer;
pub mod report;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MailError, PipelineError};
use crate::pipeline::types::{CallSummary, Recipient};

pub use mailer::{MailConfig, SmtpMailer, SmtpSecurity};
pub use report::{EmailReport, compose};

/// A fully composed email, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub cc: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Proof that a transport accepted an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub message_id: String,
    /// Server reply text, if the transport has one.
    pub server_response: String,
}

/// Outbound mail delivery.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, email: OutgoingEmail) -> Result<DeliveryReceipt, MailError>;
}

/// Composes call reports and hands them to a transport.
pub struct Notifier {
    transport: Arc<dyn MailTransport>,
    from_address: String,
}

impl Notifier {
    pub fn new(transport: Arc<dyn MailTransport>, from_address: impl Into<String>) -> Self {
        Self {
            transport,
            from_address: from_address.into(),
        }
    }

    pub fn from_address(&self) -> &str {
        &self.from_address
    }

    /// Compose and send the report for one call.
    pub async fn send(
        &self,
        recipient: &Recipient,
        summary: &CallSummary,
    ) -> Result<DeliveryReceipt, PipelineError> {
        let EmailReport { subject, html } = compose(recipient, summary);

        info!(
            from = %self.from_address,
            to = %recipient.email,
            cc = %recipient.cc_emails.join(", "),
            subject = %subject,
            "Sending call report"
        );

        let email = OutgoingEmail {
            from: self.from_address.clone(),
            to: recipient.email.clone(),
            cc: recipient.cc_emails.clone(),
            subject,
            html,
        };

        self.transport
            .deliver(email)
            .await
            .map_err(|e| PipelineError::DeliveryFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;

    use crate::pipeline::types::CallerType;

    /// Transport that records emails instead of sending them.
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<OutgoingEmail>>,
        fail: bool,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn deliver(&self, email: OutgoingEmail) -> Result<DeliveryReceipt, MailError> {
            if self.fail {
                return Err(MailError::Transport("connection refused".into()));
            }
            self.sent.lock().unwrap().push(email);
            Ok(DeliveryReceipt {
                message_id: "<test@call-notify>".into(),
                server_response: "250 OK".into(),
            })
        }
    }

    fn summary() -> CallSummary {
        CallSummary {
            date_of_call: "2024-03-05".into(),
            time_of_call: "3:15 PM".into(),
            caller_name: "Jane Doe".into(),
            caller_phone: "Not provided".into(),
            caller_type: CallerType::PotentialNewClient,
            summary: "Car accident.".into(),
            action_items: vec![],
            recording_url: None,
            processed_at: Utc::now(),
        }
    }

    fn recipient() -> Recipient {
        Recipient {
            name: "Victoria".into(),
            email: "victoria@x.com".into(),
            cc_emails: vec!["mike@x.com".into()],
        }
    }

    #[tokio::test]
    async fn send_delivers_composed_report() {
        let transport = Arc::new(RecordingTransport::default());
        let notifier = Notifier::new(transport.clone(), "intake@x.com");

        let receipt = notifier.send(&recipient(), &summary()).await.unwrap();
        assert_eq!(receipt.message_id, "<test@call-notify>");

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "intake@x.com");
        assert_eq!(sent[0].to, "victoria@x.com");
        assert_eq!(sent[0].cc, vec!["mike@x.com"]);
        assert_eq!(
            sent[0].subject,
            "POTENTIAL NEW CLIENT - Jane Doe - 3/5 3:15 PM"
        );
        assert!(sent[0].html.contains("Routed to: Victoria (victoria@x.com)"));
    }

    #[tokio::test]
    async fn transport_error_is_delivery_failure() {
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let notifier = Notifier::new(transport, "intake@x.com");

        let err = notifier.send(&recipient(), &summary()).await.unwrap_err();
        assert!(matches!(err, PipelineError::DeliveryFailed(_)));
        assert_eq!(err.stage(), "notify");
    }
}
