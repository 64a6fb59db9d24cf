//! Team roster — the fixed set of staff eligible to receive call reports.
//!
//! Loaded once at startup and shared read-only. The first member is the
//! firm's default point of contact.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pipeline::types::Recipient;

/// A named team member with a fixed address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    pub email: String,
}

impl TeamMember {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Fresh per-call recipient record for this member.
    pub fn to_recipient(&self, cc_emails: Vec<String>) -> Recipient {
        Recipient {
            name: self.name.clone(),
            email: self.email.clone(),
            cc_emails,
        }
    }
}

/// Immutable, non-empty list of team members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    members: Vec<TeamMember>,
}

impl Roster {
    /// Build a roster. Rejects empty lists, blank fields and duplicate addresses.
    pub fn new(members: Vec<TeamMember>) -> Result<Self, ConfigError> {
        if members.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "roster".to_string(),
                message: "roster must contain at least one member".to_string(),
            });
        }

        for (i, member) in members.iter().enumerate() {
            if member.name.trim().is_empty() || !member.email.contains('@') {
                return Err(ConfigError::InvalidValue {
                    key: "roster".to_string(),
                    message: format!("member {i} needs a name and a valid email"),
                });
            }
            if members[..i]
                .iter()
                .any(|m| m.email.eq_ignore_ascii_case(&member.email))
            {
                return Err(ConfigError::InvalidValue {
                    key: "roster".to_string(),
                    message: format!("duplicate email {}", member.email),
                });
            }
        }

        Ok(Self { members })
    }

    /// Built-in five-member firm roster.
    pub fn default_firm() -> Self {
        Self {
            members: vec![
                TeamMember::new("Victoria Quezada", "victoria@reardonlaw.example"),
                TeamMember::new("Mike", "mike@reardonlaw.example"),
                TeamMember::new("John Reardon", "john@reardonlaw.example"),
                TeamMember::new("Clay Reardon", "clay@reardonlaw.example"),
                TeamMember::new("Kennedy Cervantes", "admin@reardonlaw.example"),
            ],
        }
    }

    /// Load a roster from a JSON array of `{"name", "email"}` objects.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let members: Vec<TeamMember> = serde_json::from_str(&raw).map_err(|e| {
            ConfigError::ParseError(format!("roster file {}: {e}", path.display()))
        })?;
        Self::new(members)
    }

    pub fn members(&self) -> &[TeamMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The firm's default point of contact.
    pub fn default_contact(&self) -> &TeamMember {
        &self.members[0]
    }

    /// Case-insensitive lookup by email.
    pub fn find_by_email(&self, email: &str) -> Option<&TeamMember> {
        let email = email.trim();
        self.members
            .iter()
            .find(|m| m.email.eq_ignore_ascii_case(email))
    }

    /// Every member address, in roster order.
    pub fn emails(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.email.as_str()).collect()
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::default_firm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_roster_has_default_contact_first() {
        let roster = Roster::default_firm();
        assert_eq!(roster.len(), 5);
        assert_eq!(roster.default_contact().name, "Victoria Quezada");
    }

    #[test]
    fn find_by_email_is_case_insensitive() {
        let roster = Roster::default_firm();
        let member = roster.find_by_email(" Clay@ReardonLaw.example ").unwrap();
        assert_eq!(member.name, "Clay Reardon");
        assert!(roster.find_by_email("nobody@elsewhere.example").is_none());
    }

    #[test]
    fn empty_roster_rejected() {
        assert!(Roster::new(vec![]).is_err());
    }

    #[test]
    fn duplicate_email_rejected() {
        let result = Roster::new(vec![
            TeamMember::new("A", "a@x.com"),
            TeamMember::new("B", "A@X.com"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn invalid_email_rejected() {
        assert!(Roster::new(vec![TeamMember::new("A", "not-an-address")]).is_err());
    }

    #[test]
    fn roster_loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "Ana", "email": "ana@firm.example"}}, {{"name": "Ben", "email": "ben@firm.example"}}]"#
        )
        .unwrap();

        let roster = Roster::from_file(file.path()).unwrap();
        assert_eq!(roster.emails(), vec!["ana@firm.example", "ben@firm.example"]);
        assert_eq!(roster.default_contact().name, "Ana");
    }

    #[test]
    fn malformed_roster_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(matches!(
            Roster::from_file(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn to_recipient_copies_member() {
        let roster = Roster::default_firm();
        let recipient = roster
            .default_contact()
            .to_recipient(vec!["mike@reardonlaw.example".into()]);
        assert_eq!(recipient.name, "Victoria Quezada");
        assert_eq!(recipient.cc_emails, vec!["mike@reardonlaw.example"]);
        // The roster itself is untouched.
        assert_eq!(roster, Roster::default_firm());
    }
}
