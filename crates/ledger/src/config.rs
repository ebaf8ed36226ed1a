//! Ledger configuration.
//!
//! Defaults reproduce the plain fold: any withdrawal is accepted, even one
//! that takes the balance below zero.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tally_core::DomainError;

/// Environment variable holding the overdraft policy (`allow` or `deny`).
pub const OVERDRAFT_POLICY_ENV: &str = "TALLY_OVERDRAFT_POLICY";

/// What to do with a withdrawal that would leave the balance negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverdraftPolicy {
    #[default]
    Allow,
    Deny,
}

impl FromStr for OverdraftPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(OverdraftPolicy::Allow),
            "deny" => Ok(OverdraftPolicy::Deny),
            other => Err(DomainError::validation(format!(
                "unknown overdraft policy: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub overdraft: OverdraftPolicy,
}

impl LedgerConfig {
    pub fn with_overdraft(overdraft: OverdraftPolicy) -> Self {
        Self { overdraft }
    }

    /// Read configuration from the process environment.
    ///
    /// Missing or unrecognised values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let overdraft = match lookup(OVERDRAFT_POLICY_ENV) {
            None => OverdraftPolicy::default(),
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                tracing::warn!(%err, "{OVERDRAFT_POLICY_ENV} ignored; using default policy");
                OverdraftPolicy::default()
            }),
        };

        Self { overdraft }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_overdraft() {
        assert_eq!(LedgerConfig::default().overdraft, OverdraftPolicy::Allow);
    }

    #[test]
    fn lookup_reads_policy_case_insensitively() {
        let config = LedgerConfig::from_lookup(|key| {
            (key == OVERDRAFT_POLICY_ENV).then(|| " Deny ".to_string())
        });
        assert_eq!(config.overdraft, OverdraftPolicy::Deny);
    }

    #[test]
    fn unknown_policy_falls_back_to_default() {
        let config = LedgerConfig::from_lookup(|_| Some("sometimes".to_string()));
        assert_eq!(config, LedgerConfig::default());

        let config = LedgerConfig::from_lookup(|_| None);
        assert_eq!(config, LedgerConfig::default());
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let config: LedgerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LedgerConfig::default());

        let config: LedgerConfig = serde_json::from_str(r#"{"overdraft":"deny"}"#).unwrap();
        assert_eq!(config.overdraft, OverdraftPolicy::Deny);
    }
}
