//! Call summarizer — LLM classification plus field sanitization.
//!
//! Flow:
//! 1. Build a classification prompt around the transcript and policy
//! 2. LLM completion → JSON object
//! 3. Sanitize every field to its sentinel when missing, blank or "null"
//! 4. Override date/time and phone with payload metadata where available

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{LlmError, PipelineError};
use crate::llm::provider::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};
use crate::pipeline::policy::ClassificationPolicy;
use crate::pipeline::types::{
    CallSummary, CallerType, ExtractedCall, NOT_PROVIDED, SUMMARY_FALLBACK, UNKNOWN_CALLER,
};
use crate::timefmt;

/// Temperature for classification (deterministic-ish).
const SUMMARY_TEMPERATURE: f32 = 0.3;

const SUMMARY_MAX_TOKENS: u32 = 1024;

/// Transcripts past this many characters are cut before prompting.
const MAX_TRANSCRIPT_CHARS: usize = 60_000;

/// Produces a `CallSummary` from an extracted call.
pub struct CallSummarizer {
    llm: Arc<dyn LlmProvider>,
    policy: ClassificationPolicy,
    timeout: Duration,
}

impl CallSummarizer {
    pub fn new(llm: Arc<dyn LlmProvider>, policy: ClassificationPolicy, timeout: Duration) -> Self {
        Self {
            llm,
            policy,
            timeout,
        }
    }

    /// Summarize one call.
    ///
    /// Fails only when the model call fails or its output is not a JSON
    /// object; every field-level gap is filled with a sentinel.
    pub async fn summarize(&self, call: &ExtractedCall) -> Result<CallSummary, PipelineError> {
        debug!(
            call_id = %call.call_id,
            transcript_chars = call.transcript.len(),
            policy = self.policy.name(),
            "Summarizing call"
        );

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_summary_system_prompt(&self.policy)),
            ChatMessage::user(build_summary_user_prompt(&call.transcript)),
        ])
        .with_temperature(SUMMARY_TEMPERATURE)
        .with_max_tokens(SUMMARY_MAX_TOKENS);

        let response = tokio::time::timeout(self.timeout, self.llm.complete(request))
            .await
            .map_err(|_| LlmError::Timeout {
                provider: self.llm.model_name().to_string(),
                after: self.timeout,
            })??;

        let truncated = response.finish_reason == FinishReason::Length;
        if truncated {
            warn!(
                call_id = %call.call_id,
                max_tokens = SUMMARY_MAX_TOKENS,
                "Summary response hit the output-token limit"
            );
        }

        let fields = parse_summary_response(&response.content).map_err(|reason| {
            warn!(
                call_id = %call.call_id,
                response_chars = response.content.len(),
                truncated,
                error = %reason,
                "Failed to parse summary response"
            );
            let reason = if truncated {
                format!("{reason} (response truncated at {SUMMARY_MAX_TOKENS} tokens)")
            } else {
                reason
            };
            PipelineError::MalformedModelOutput {
                stage: "summarize",
                reason,
            }
        })?;

        let summary = build_summary(fields, call);
        info!(
            call_id = %call.call_id,
            caller = %summary.caller_name,
            phone = %summary.caller_phone,
            caller_type = %summary.caller_type,
            date = %summary.date_of_call,
            time = %summary.time_of_call,
            "Call summarized"
        );
        Ok(summary)
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_summary_system_prompt(policy: &ClassificationPolicy) -> String {
    format!(
        "You are an assistant for a law firm. Analyze the phone call transcript and extract:\n\
         - Date and time of the call (Pacific Time)\n\
         - The caller's name\n\
         - The caller's phone number\n\
         - The type of caller\n\
         - A brief summary of the call (2-3 sentences)\n\
         - Key action items or follow-up needed\n\n\
         Caller type rules. Use exactly one of these labels:\n\
         {rules}\n\n\
         Respond with ONLY a JSON object in this format:\n\
         {{\n  \
           \"dateOfCall\": \"YYYY-MM-DD\",\n  \
           \"timeOfCall\": \"H:MM AM/PM\",\n  \
           \"callerName\": \"...\",\n  \
           \"callerPhone\": \"...\",\n  \
           \"callerType\": \"current client | potential new client | provider | insurance adjuster | other\",\n  \
           \"summary\": \"...\",\n  \
           \"actionItems\": [\"...\"]\n\
         }}\n\n\
         If the caller's name is not stated, use \"{UNKNOWN_CALLER}\". \
         If no phone number is stated, use \"{NOT_PROVIDED}\".",
        rules = policy.rules()
    )
}

fn build_summary_user_prompt(transcript: &str) -> String {
    let transcript: String = transcript.chars().take(MAX_TRANSCRIPT_CHARS).collect();
    format!("Transcript:\n{transcript}")
}

// ── Response parsing ────────────────────────────────────────────────

/// Parse the model response into its top-level JSON object.
fn parse_summary_response(raw: &str) -> Result<Map<String, Value>, String> {
    let json_str = extract_json_object(raw);
    match serde_json::from_str::<Value>(&json_str) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {}", json_kind(&other))),
        Err(e) => Err(format!("JSON parse error: {e}")),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Extract a JSON object from LLM output (handles markdown wrapping).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    // Already a JSON object
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Wrapped in markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    // Try to find object bounds
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

/// A field's text, or `None` when missing, null, blank or the literal "null".
fn present_text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match fields.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() || text.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(text)
    }
}

fn action_items(fields: &Map<String, Value>) -> Vec<String> {
    match fields.get("actionItems") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() && !s.trim().eq_ignore_ascii_case("null") => {
            vec![s.trim().to_string()]
        }
        _ => Vec::new(),
    }
}

/// Apply sentinels and payload overrides to the model's fields.
fn build_summary(fields: Map<String, Value>, call: &ExtractedCall) -> CallSummary {
    let caller_name = present_text(&fields, "callerName").unwrap_or_else(|| UNKNOWN_CALLER.into());
    let caller_type = CallerType::from_label(present_text(&fields, "callerType").as_deref());
    let summary = present_text(&fields, "summary").unwrap_or_else(|| SUMMARY_FALLBACK.into());

    // Payload timestamp beats whatever the model guessed.
    let (date_of_call, time_of_call) = match call.started_at {
        Some(started_at) => (
            timefmt::pacific_date(started_at),
            timefmt::pacific_time(started_at),
        ),
        None => (
            present_text(&fields, "dateOfCall").unwrap_or_else(|| NOT_PROVIDED.into()),
            present_text(&fields, "timeOfCall").unwrap_or_else(|| NOT_PROVIDED.into()),
        ),
    };

    let caller_phone = present_text(&fields, "callerPhone")
        .filter(|p| !p.eq_ignore_ascii_case(NOT_PROVIDED))
        .or_else(|| call.caller_phone.clone())
        .unwrap_or_else(|| NOT_PROVIDED.into());

    CallSummary {
        date_of_call,
        time_of_call,
        caller_name,
        caller_phone,
        caller_type,
        summary,
        action_items: action_items(&fields),
        recording_url: call.recording_url.clone(),
        processed_at: Utc::now(),
    }
}
