//! Recipient router — picks who gets the call report.
//!
//! The model applies the priority rules and answers with comma-separated
//! addresses. Resolution against the roster is local and deterministic:
//! first address is the primary, the rest become CCs.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::roster::Roster;
use crate::pipeline::types::{CallSummary, CallerType, Recipient};

const ROUTING_TEMPERATURE: f32 = 0.1;

/// Routing answers are a handful of addresses.
const ROUTING_MAX_TOKENS: u32 = 256;

/// Selects recipients for a summarized call.
pub struct RecipientRouter {
    llm: Arc<dyn LlmProvider>,
    roster: Arc<Roster>,
    timeout: Duration,
}

/// Fields of the summary the router needs. Timestamps and payload stay out
/// of the prompt.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoutingView<'a> {
    caller_name: &'a str,
    caller_type: CallerType,
    summary: &'a str,
    action_items: &'a [String],
}

impl<'a> From<&'a CallSummary> for RoutingView<'a> {
    fn from(summary: &'a CallSummary) -> Self {
        Self {
            caller_name: &summary.caller_name,
            caller_type: summary.caller_type,
            summary: &summary.summary,
            action_items: &summary.action_items,
        }
    }
}

impl RecipientRouter {
    pub fn new(llm: Arc<dyn LlmProvider>, roster: Arc<Roster>, timeout: Duration) -> Self {
        Self {
            llm,
            roster,
            timeout,
        }
    }

    /// Route a summarized call to a recipient.
    ///
    /// Model failures are hard failures; no recipient is guessed locally.
    pub async fn route(&self, summary: &CallSummary) -> Result<Recipient, PipelineError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_routing_system_prompt(&self.roster)),
            ChatMessage::user(build_routing_user_prompt(summary)),
        ])
        .with_temperature(ROUTING_TEMPERATURE)
        .with_max_tokens(ROUTING_MAX_TOKENS);

        let response = tokio::time::timeout(self.timeout, self.llm.complete(request))
            .await
            .map_err(|_| {
                PipelineError::RoutingFailure(format!(
                    "{} timed out after {:?}",
                    self.llm.model_name(),
                    self.timeout
                ))
            })?
            .map_err(|e| PipelineError::RoutingFailure(e.to_string()))?;

        debug!(selected = %response.content.trim(), "Routing model answered");

        let recipient = resolve_recipients(&response.content, &self.roster)?;
        info!(
            recipient = %recipient.email,
            name = %recipient.name,
            cc_count = recipient.cc_emails.len(),
            caller_type = %summary.caller_type,
            "Call routed"
        );
        Ok(recipient)
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_routing_system_prompt(roster: &Roster) -> String {
    let members = serde_json::to_string_pretty(roster.members()).unwrap_or_default();
    let default_contact = roster.default_contact();
    let everyone = roster.emails().join(",");

    format!(
        "You are a law firm routing assistant. Based on the call summary, select the \
         appropriate team member(s).\n\n\
         Team members:\n{members}\n\n\
         Routing rules, in priority order. Check the top rules first:\n\
         1. HIGHEST PRIORITY: if the caller type is \"potential new client\", send to ALL team \
         members. This rule always wins, even if the caller mentions a team member by name. \
         Return: {everyone}\n\
         2. If the caller explicitly REQUESTS to speak with a specific team member, or wants to \
         leave a message for them, send to that team member AND {default_name}. Return both \
         addresses separated by a comma.\n\
         3. If the caller is a current client, a provider or an insurance adjuster, send to \
         {default_name}.\n\
         4. If unsure, send to {default_name}.\n\n\
         Important distinctions:\n\
         - \"My name is Clay\" is the caller introducing themselves. It is NOT a request; apply \
         the other rules.\n\
         - \"I need to speak with Clay\" IS a request for a team member; apply rule 2.\n\
         - A potential new client who mentions a name still goes to everyone under rule 1.\n\n\
         Return ONLY the email address(es). For multiple recipients, separate them with commas \
         and no spaces. Do not add any other text.",
        default_name = default_contact.name,
    )
}

fn build_routing_user_prompt(summary: &CallSummary) -> String {
    let view = RoutingView::from(summary);
    let mut prompt = String::with_capacity(512);

    prompt.push_str("Call summary:\n");
    prompt.push_str(&format!("Caller: {}\n", view.caller_name));
    prompt.push_str(&format!("Type: {}\n", view.caller_type));
    prompt.push_str(&format!("Summary: {}\n", view.summary));
    if !view.action_items.is_empty() {
        prompt.push_str("Action items:\n");
        for item in view.action_items {
            prompt.push_str(&format!("- {item}\n"));
        }
    }

    prompt
}

// ── Response resolution ─────────────────────────────────────────────

/// Resolve the model's comma-separated answer into a recipient.
///
/// - First address → primary, matched against the roster; an unknown
///   address falls back to the first roster member
/// - Remaining addresses → CCs, in order, deduplicated, never the primary
/// - No address-like token at all → malformed output
pub fn resolve_recipients(raw: &str, roster: &Roster) -> Result<Recipient, PipelineError> {
    let addresses: Vec<&str> = raw
        .split(',')
        .map(clean_address)
        .filter(|a| a.contains('@'))
        .collect();

    let Some((first, rest)) = addresses.split_first() else {
        return Err(PipelineError::MalformedModelOutput {
            stage: "route",
            reason: format!("no email address in routing response ({} chars)", raw.len()),
        });
    };

    let primary = match roster.find_by_email(first) {
        Some(member) => member,
        None => {
            warn!(
                selected = %first,
                fallback = %roster.members()[0].email,
                "Routing selected an address outside the roster, using first roster member"
            );
            &roster.members()[0]
        }
    };

    let mut cc_emails: Vec<String> = Vec::with_capacity(rest.len());
    for address in rest {
        let canonical = roster
            .find_by_email(address)
            .map(|m| m.email.as_str())
            .unwrap_or(address);
        let duplicate = canonical.eq_ignore_ascii_case(&primary.email)
            || cc_emails.iter().any(|c| c.eq_ignore_ascii_case(canonical));
        if !duplicate {
            cc_emails.push(canonical.to_string());
        }
    }

    Ok(primary.to_recipient(cc_emails))
}

/// Strip whitespace, quoting and markup around one address token.
fn clean_address(token: &str) -> &str {
    token.trim().trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '<' | '>' | '"' | '\'' | '`' | '*' | '.' | ';')
    })
}
