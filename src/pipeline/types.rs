//! Shared types for the call processing pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::notify::DeliveryReceipt;

/// Sentinel for an unknown caller name.
pub const UNKNOWN_CALLER: &str = "Unknown";

/// Sentinel for a missing phone number, date or time.
pub const NOT_PROVIDED: &str = "Not provided";

/// Fallback narrative when the model produced no usable summary.
pub const SUMMARY_FALLBACK: &str = "Summary could not be generated for this call.";

// ── Extraction ──────────────────────────────────────────────────────

/// Normalized view of a raw webhook payload.
///
/// Produced by the extractor; every field except `transcript` and `call_id`
/// tolerates true absence.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedCall {
    /// Upstream call id, or a generated UUID when the payload carries none.
    pub call_id: String,
    pub transcript: String,
    pub started_at: Option<DateTime<Utc>>,
    pub caller_phone: Option<String>,
    pub recording_url: Option<String>,
}

// ── Caller type ─────────────────────────────────────────────────────

/// Closed classification of why someone called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallerType {
    #[serde(rename = "current client")]
    CurrentClient,
    #[serde(rename = "potential new client")]
    PotentialNewClient,
    #[serde(rename = "provider")]
    Provider,
    #[serde(rename = "insurance adjuster")]
    InsuranceAdjuster,
    #[serde(rename = "other")]
    Other,
}

impl CallerType {
    pub const ALL: [CallerType; 5] = [
        Self::CurrentClient,
        Self::PotentialNewClient,
        Self::Provider,
        Self::InsuranceAdjuster,
        Self::Other,
    ];

    /// Human-readable label, also the wire value the model is asked for.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CurrentClient => "current client",
            Self::PotentialNewClient => "potential new client",
            Self::Provider => "provider",
            Self::InsuranceAdjuster => "insurance adjuster",
            Self::Other => "other",
        }
    }

    /// Parse a model-produced label.
    ///
    /// Case, hyphens, underscores and repeated whitespace are ignored; the
    /// result must then equal a known label exactly. Missing, blank,
    /// `"null"` and anything else map to `Other`.
    pub fn from_label(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Other;
        };
        let normalized = raw
            .to_lowercase()
            .replace(['-', '_'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        Self::ALL
            .into_iter()
            .find(|t| t.label() == normalized)
            .unwrap_or(Self::Other)
    }

    pub fn is_potential_new_client(&self) -> bool {
        matches!(self, Self::PotentialNewClient)
    }
}

impl fmt::Display for CallerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Summary ─────────────────────────────────────────────────────────

/// Structured summary of one call. Immutable once produced.
///
/// No field is ever empty-meaning-absent: absence is an explicit sentinel
/// (`"Unknown"`, `"Not provided"`, `Other`, empty list). `recording_url` is
/// the one truly optional field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSummary {
    /// Calendar date, `YYYY-MM-DD` when derived from a payload timestamp.
    pub date_of_call: String,
    /// Pacific local time, `H:MM AM/PM` when derived from a payload timestamp.
    pub time_of_call: String,
    pub caller_name: String,
    pub caller_phone: String,
    pub caller_type: CallerType,
    pub summary: String,
    pub action_items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl CallSummary {
    pub fn has_known_caller(&self) -> bool {
        self.caller_name != UNKNOWN_CALLER
    }
}

// ── Recipient ───────────────────────────────────────────────────────

/// Resolved notification recipient for one call.
///
/// Built fresh per call from a roster entry; never shared between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub name: String,
    pub email: String,
    /// Additional addresses, in model order, never containing `email`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc_emails: Vec<String>,
}

// ── Processed call ──────────────────────────────────────────────────

/// Result of running one call event through every stage.
#[derive(Debug, Clone)]
pub struct ProcessedCall {
    pub call_id: String,
    pub summary: CallSummary,
    pub recipient: Recipient,
    pub receipt: DeliveryReceipt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_type_parses_exact_labels() {
        for t in CallerType::ALL {
            assert_eq!(CallerType::from_label(Some(t.label())), t);
        }
    }

    #[test]
    fn caller_type_ignores_case_and_separators() {
        assert_eq!(
            CallerType::from_label(Some("Potential-New-Client")),
            CallerType::PotentialNewClient
        );
        assert_eq!(
            CallerType::from_label(Some(" current_client ")),
            CallerType::CurrentClient
        );
        assert_eq!(
            CallerType::from_label(Some("INSURANCE   ADJUSTER")),
            CallerType::InsuranceAdjuster
        );
    }

    #[test]
    fn caller_type_decorated_labels_are_other() {
        // A hedged label must never escalate to the whole-roster route.
        for raw in [
            "current client (not a new client)",
            "not a potential new client",
            "new client",
            "Insurance Adjuster (State Farm)",
            "medical provider",
            "existing client",
        ] {
            assert_eq!(CallerType::from_label(Some(raw)), CallerType::Other, "{raw}");
        }
    }

    #[test]
    fn caller_type_missing_or_unknown_is_other() {
        assert_eq!(CallerType::from_label(None), CallerType::Other);
        assert_eq!(CallerType::from_label(Some("")), CallerType::Other);
        assert_eq!(CallerType::from_label(Some("null")), CallerType::Other);
        assert_eq!(CallerType::from_label(Some("vendor")), CallerType::Other);
    }

    #[test]
    fn caller_type_serializes_as_label() {
        let json = serde_json::to_value(CallerType::PotentialNewClient).unwrap();
        assert_eq!(json, "potential new client");
    }

    #[test]
    fn summary_serializes_camel_case() {
        let summary = CallSummary {
            date_of_call: "2024-03-05".into(),
            time_of_call: "3:15 PM".into(),
            caller_name: "Jane Doe".into(),
            caller_phone: NOT_PROVIDED.into(),
            caller_type: CallerType::Other,
            summary: "Asked for directions.".into(),
            action_items: vec![],
            recording_url: None,
            processed_at: Utc::now(),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["dateOfCall"], "2024-03-05");
        assert_eq!(json["callerType"], "other");
        assert!(json["actionItems"].as_array().unwrap().is_empty());
        assert!(json.get("recordingUrl").is_none());
    }

    #[test]
    fn recipient_omits_empty_cc() {
        let recipient = Recipient {
            name: "Victoria".into(),
            email: "victoria@firm.example".into(),
            cc_emails: vec![],
        };
        let json = serde_json::to_string(&recipient).unwrap();
        assert!(!json.contains("ccEmails"));
    }
}
