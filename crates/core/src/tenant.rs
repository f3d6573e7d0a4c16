use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One independently configured store served by the system.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Immutable per-tenant configuration snapshot. A refresh always produces a new
/// snapshot; entries are shared behind `Arc` and never mutated in place.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub settings: BTreeMap<String, String>,
    pub schedule: Vec<DayRule>,
    pub prompts: BTreeMap<String, String>,
    pub repair_scope: BTreeMap<String, String>,
}

/// One schedule row as loaded from the backend. Fields stay raw strings; the
/// schedule evaluator owns their (permissive) interpretation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRule {
    pub day: String,
    pub enabled: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl TenantConfig {
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    pub fn prompt(&self, key: &str) -> Option<&str> {
        self.prompts.get(key).map(String::as_str)
    }

    /// Comma-delimited `email_recipients` setting split into trimmed addresses.
    pub fn email_recipients(&self) -> Vec<String> {
        self.setting("email_recipients")
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::TenantConfig;

    #[test]
    fn recipients_are_trimmed_and_empty_entries_dropped() {
        let mut config = TenantConfig::default();
        config.settings.insert(
            "email_recipients".to_owned(),
            " owner@example.com , ,manager@example.com".to_owned(),
        );

        assert_eq!(config.email_recipients(), vec!["owner@example.com", "manager@example.com"]);
    }

    #[test]
    fn missing_recipients_setting_yields_empty_list() {
        assert!(TenantConfig::default().email_recipients().is_empty());
    }
}
