//! Call processor — runs one end-of-call event through every stage.
//!
//! Flow:
//! 1. Extractor (pure, never fails)
//! 2. Summarizer (LLM) → `CallSummary`
//! 3. Router (LLM + roster) → `Recipient`
//! 4. Notifier (email) → `DeliveryReceipt`
//!
//! A failure aborts the remaining stages for that event only.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::PipelineError;
use crate::notify::Notifier;
use crate::pipeline::extractor;
use crate::pipeline::router::RecipientRouter;
use crate::pipeline::summarizer::CallSummarizer;
use crate::pipeline::types::{ExtractedCall, ProcessedCall};

/// Receives pipeline failures after they are logged.
pub trait FailureHook: Send + Sync {
    fn pipeline_failed(&self, call_id: &str, error: &PipelineError);
}

/// Default hook. Failures are already logged by the processor, so this
/// only records a debug marker.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFailureHook;

impl FailureHook for TracingFailureHook {
    fn pipeline_failed(&self, call_id: &str, error: &PipelineError) {
        tracing::debug!(call_id = %call_id, stage = error.stage(), "Failure hook invoked");
    }
}

/// Orchestrates extract → summarize → route → notify for one call.
pub struct CallProcessor {
    summarizer: CallSummarizer,
    router: RecipientRouter,
    notifier: Notifier,
    failure_hook: Arc<dyn FailureHook>,
}

impl CallProcessor {
    pub fn new(summarizer: CallSummarizer, router: RecipientRouter, notifier: Notifier) -> Self {
        Self {
            summarizer,
            router,
            notifier,
            failure_hook: Arc::new(TracingFailureHook),
        }
    }

    /// Replace the failure hook.
    pub fn with_failure_hook(mut self, hook: Arc<dyn FailureHook>) -> Self {
        self.failure_hook = hook;
        self
    }

    /// Process a single end-of-call event through the full pipeline.
    pub async fn process(&self, event: &Value) -> Result<ProcessedCall, PipelineError> {
        let call = extractor::extract(event);
        info!(
            call_id = %call.call_id,
            transcript_chars = call.transcript.len(),
            has_started_at = call.started_at.is_some(),
            "Processing call"
        );

        match self.run_stages(&call).await {
            Ok(processed) => {
                info!(
                    call_id = %processed.call_id,
                    caller_type = %processed.summary.caller_type,
                    recipient = %processed.recipient.email,
                    message_id = %processed.receipt.message_id,
                    "Call processed"
                );
                Ok(processed)
            }
            Err(e) => {
                error!(
                    call_id = %call.call_id,
                    stage = e.stage(),
                    error = %e,
                    "Call processing failed"
                );
                self.failure_hook.pipeline_failed(&call.call_id, &e);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        call: &ExtractedCall,
    ) -> Result<ProcessedCall, PipelineError> {
        let summary = self.summarizer.summarize(call).await?;
        let recipient = self.router.route(&summary).await?;
        let receipt = self.notifier.send(&recipient, &summary).await?;

        Ok(ProcessedCall {
            call_id: call.call_id.clone(),
            summary,
            recipient,
            receipt,
        })
    }

    /// Run the pipeline for `event` on its own task.
    ///
    /// The outcome is logged by `process`; the handle is returned for tests
    /// and shutdown bookkeeping.
    pub fn spawn(self: &Arc<Self>, event: Value) -> JoinHandle<()> {
        let processor = Arc::clone(self);
        tokio::spawn(async move {
            let _ = processor.process(&event).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::error::{LlmError, MailError};
    use crate::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
    use crate::notify::{DeliveryReceipt, MailTransport, OutgoingEmail};
    use crate::pipeline::policy::ClassificationPolicy;
    use crate::pipeline::roster::{Roster, TeamMember};
    use crate::pipeline::types::CallerType;

    /// LLM that always returns the same text, or always fails.
    struct StaticLlm {
        content: Option<String>,
        calls: Mutex<usize>,
    }

    impl StaticLlm {
        fn replying(content: &str) -> Arc<Self> {
            Arc::new(Self {
                content: Some(content.into()),
                calls: Mutex::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                content: None,
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for StaticLlm {
        fn model_name(&self) -> &str {
            "static"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            *self.calls.lock().unwrap() += 1;
            match &self.content {
                Some(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    finish_reason: FinishReason::Stop,
                }),
                None => Err(LlmError::RequestFailed {
                    provider: "static".into(),
                    reason: "unavailable".into(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn deliver(&self, email: OutgoingEmail) -> Result<DeliveryReceipt, MailError> {
            self.sent.lock().unwrap().push(email);
            Ok(DeliveryReceipt {
                message_id: "<1@call-notify>".into(),
                server_response: "250 OK".into(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingHook {
        failures: Mutex<Vec<(String, &'static str)>>,
    }

    impl FailureHook for RecordingHook {
        fn pipeline_failed(&self, call_id: &str, error: &PipelineError) {
            self.failures
                .lock()
                .unwrap()
                .push((call_id.to_string(), error.stage()));
        }
    }

    const SUMMARY_JSON: &str = r#"{
        "dateOfCall": "2024-01-01",
        "timeOfCall": "9:00 AM",
        "callerName": "Jane Doe",
        "callerPhone": "Not provided",
        "callerType": "potential new client",
        "summary": "Jane was rear-ended and wants to hire the firm.",
        "actionItems": ["Call Jane back"]
    }"#;

    fn roster() -> Arc<Roster> {
        Arc::new(
            Roster::new(vec![
                TeamMember::new("Victoria", "victoria@x.com"),
                TeamMember::new("Mike", "mike@x.com"),
            ])
            .unwrap(),
        )
    }

    fn processor(
        summary_llm: Arc<dyn LlmProvider>,
        routing_llm: Arc<dyn LlmProvider>,
        transport: Arc<RecordingTransport>,
        hook: Arc<RecordingHook>,
    ) -> CallProcessor {
        let timeout = Duration::from_secs(5);
        CallProcessor::new(
            CallSummarizer::new(summary_llm, ClassificationPolicy::default(), timeout),
            RecipientRouter::new(routing_llm, roster(), timeout),
            Notifier::new(transport, "intake@x.com"),
        )
        .with_failure_hook(hook)
    }

    fn event() -> Value {
        json!({
            "message": {
                "type": "end-of-call-report",
                "call": { "id": "call-42", "startedAt": "2024-03-05T23:15:00Z" },
                "artifact": { "transcript": "AI: Hello\nUser: I was in an accident." }
            }
        })
    }

    #[tokio::test]
    async fn full_pipeline_sends_one_email() {
        let transport = Arc::new(RecordingTransport::default());
        let hook = Arc::new(RecordingHook::default());
        let processor = processor(
            StaticLlm::replying(SUMMARY_JSON),
            StaticLlm::replying("victoria@x.com,mike@x.com"),
            transport.clone(),
            hook.clone(),
        );

        let processed = processor.process(&event()).await.unwrap();
        assert_eq!(processed.call_id, "call-42");
        assert_eq!(processed.summary.caller_type, CallerType::PotentialNewClient);
        assert_eq!(processed.summary.date_of_call, "2024-03-05");
        assert_eq!(processed.summary.time_of_call, "3:15 PM");
        assert_eq!(processed.recipient.cc_emails, vec!["mike@x.com"]);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "victoria@x.com");
        assert!(sent[0].subject.starts_with("POTENTIAL NEW CLIENT - Jane Doe"));
        assert!(hook.failures.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn summarizer_failure_skips_routing_and_mail() {
        let transport = Arc::new(RecordingTransport::default());
        let hook = Arc::new(RecordingHook::default());
        let routing_llm = StaticLlm::replying("victoria@x.com");
        let processor = processor(
            StaticLlm::failing(),
            routing_llm.clone(),
            transport.clone(),
            hook.clone(),
        );

        let err = processor.process(&event()).await.unwrap_err();
        assert_eq!(err.stage(), "summarize");
        assert_eq!(*routing_llm.calls.lock().unwrap(), 0);
        assert!(transport.sent.lock().unwrap().is_empty());
        assert_eq!(
            *hook.failures.lock().unwrap(),
            vec![("call-42".to_string(), "summarize")]
        );
    }

    #[tokio::test]
    async fn routing_failure_sends_nothing() {
        let transport = Arc::new(RecordingTransport::default());
        let hook = Arc::new(RecordingHook::default());
        let processor = processor(
            StaticLlm::replying(SUMMARY_JSON),
            StaticLlm::replying("nobody in particular"),
            transport.clone(),
            hook.clone(),
        );

        let err = processor.process(&event()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MalformedModelOutput { stage: "route", .. }
        ));
        assert!(transport.sent.lock().unwrap().is_empty());
        assert_eq!(hook.failures.lock().unwrap()[0].1, "route");
    }

    #[tokio::test]
    async fn spawned_pipelines_are_independent() {
        let transport = Arc::new(RecordingTransport::default());
        let hook = Arc::new(RecordingHook::default());
        let processor = Arc::new(processor(
            StaticLlm::replying(SUMMARY_JSON),
            StaticLlm::replying("victoria@x.com"),
            transport.clone(),
            hook.clone(),
        ));

        let mut second = event();
        second["message"]["call"]["id"] = json!("call-43");

        let handles = vec![processor.spawn(event()), processor.spawn(second)];
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(transport.sent.lock().unwrap().len(), 2);
        assert!(hook.failures.lock().unwrap().is_empty());
    }
}
