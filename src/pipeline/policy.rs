//! Caller-type classification policy.
//!
//! The heuristic text that tells the model how to pick a caller type is
//! tuned independently of the code. It lives here as a replaceable value:
//! one of the built-in variants, or free text loaded from a file.

use std::path::Path;
use std::str::FromStr;

use crate::error::ConfigError;

const BALANCED_RULES: &str = "\
- \"current client\": the caller says they already have a case with the firm, references an \
existing case, or asks for a status update on their matter.
- \"potential new client\": the caller describes an injury or accident of their own and wants \
representation or a consultation, and does not mention an existing case with the firm.
- \"provider\": a medical office, clinic, chiropractor or other provider calling about a \
patient, records, bills or liens.
- \"insurance adjuster\": someone calling on behalf of an insurance company about a claim.
- \"other\": anything else, including vendors, wrong numbers, and calls where the purpose is unclear.";

const CONSERVATIVE_RULES: &str = "\
- \"current client\": the caller references an existing case or matter with the firm.
- \"potential new client\": ONLY when the caller explicitly says they were injured or had an \
accident AND explicitly asks to hire the firm or schedule a consultation. Questions about \
services, pricing or general legal information are NOT enough. If there is any doubt, do not \
use this label.
- \"provider\": a medical office or provider calling about a patient, records, bills or liens.
- \"insurance adjuster\": someone calling on behalf of an insurance company about a claim.
- \"other\": anything else, and any call that does not clearly meet one of the rules above.";

const PERMISSIVE_RULES: &str = "\
- \"current client\": the caller references an existing case or matter with the firm.
- \"potential new client\": any caller who is not an existing client and who may need legal \
help, including people asking about services or describing a legal problem.
- \"provider\": a medical office or provider calling about a patient, records, bills or liens.
- \"insurance adjuster\": someone calling on behalf of an insurance company about a claim.
- \"other\": vendors, wrong numbers, and anything else.";

/// Classification rule text embedded in the summarization prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationPolicy {
    name: String,
    rules: String,
}

impl ClassificationPolicy {
    /// Default policy: labels by the caller's stated situation.
    pub fn balanced() -> Self {
        Self::new("balanced", BALANCED_RULES)
    }

    /// Labels "potential new client" only on an explicit request for representation.
    pub fn conservative() -> Self {
        Self::new("conservative", CONSERVATIVE_RULES)
    }

    /// Labels any non-client seeking legal help as a potential new client.
    pub fn permissive() -> Self {
        Self::new("permissive", PERMISSIVE_RULES)
    }

    pub fn new(name: impl Into<String>, rules: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: rules.into(),
        }
    }

    /// Load custom rule text from a file. The policy is named after the file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let rules = std::fs::read_to_string(path)?;
        if rules.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "CALL_NOTIFY_CLASSIFICATION_POLICY_FILE".to_string(),
                message: format!("{} is empty", path.display()),
            });
        }
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "custom".to_string());
        Ok(Self::new(name, rules.trim()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &str {
        &self.rules
    }
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self::balanced()
    }
}

impl FromStr for ClassificationPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "balanced" | "default" => Ok(Self::balanced()),
            "conservative" | "strict" => Ok(Self::conservative()),
            "permissive" => Ok(Self::permissive()),
            other => Err(ConfigError::InvalidValue {
                key: "CALL_NOTIFY_CLASSIFICATION_POLICY".to_string(),
                message: format!(
                    "unknown policy '{other}' (expected balanced, conservative or permissive)"
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_policies_cover_every_caller_type() {
        for policy in [
            ClassificationPolicy::balanced(),
            ClassificationPolicy::conservative(),
            ClassificationPolicy::permissive(),
        ] {
            for label in [
                "current client",
                "potential new client",
                "provider",
                "insurance adjuster",
                "other",
            ] {
                assert!(
                    policy.rules().contains(label),
                    "{} policy missing {label}",
                    policy.name()
                );
            }
        }
    }

    #[test]
    fn policy_parses_by_name() {
        assert_eq!(
            "Conservative".parse::<ClassificationPolicy>().unwrap().name(),
            "conservative"
        );
        assert_eq!(
            "default".parse::<ClassificationPolicy>().unwrap(),
            ClassificationPolicy::balanced()
        );
        assert!("aggressive".parse::<ClassificationPolicy>().is_err());
    }

    #[test]
    fn policy_loads_from_file() {
        let mut file = tempfile::Builder::new()
            .prefix("intake-v7")
            .suffix(".txt")
            .tempfile()
            .unwrap();
        writeln!(file, "- \"other\": everything.").unwrap();

        let policy = ClassificationPolicy::from_file(file.path()).unwrap();
        assert!(policy.name().starts_with("intake-v7"));
        assert_eq!(policy.rules(), "- \"other\": everything.");
    }

    #[test]
    fn empty_policy_file_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(ClassificationPolicy::from_file(file.path()).is_err());
    }
}
