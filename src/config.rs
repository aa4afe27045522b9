//! Run configuration and classifier rule tables.
//!
//! Scalar knobs come from the environment (overridable on the command line);
//! the classifier rules are plain data that can be replaced by a JSON file.
//! Every rule field has a default, so a rules file only needs the keys it
//! wants to change:
//!
//! ```json
//! {
//!   "exclusions": [
//!     { "header": "X-Spam-Report", "contains": "legacy-mx", "reason": "legacy source" },
//!     { "header": "From", "contains": "noreply@alerts.example", "reason": "noisy sender" }
//!   ],
//!   "providers": [{ "tag": "sendgrid", "contains": "sendgrid.net" }]
//! }
//! ```

use crate::error::{StatsError, StatsResult};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Default ceiling for a single captured message.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

/// Knobs that shape a run but not the classification itself.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub max_message_bytes: usize,
    pub rules_path: Option<PathBuf>,
}

impl RunConfig {
    pub fn from_env() -> Self {
        Self {
            max_message_bytes: env_usize("MBOX_STATS_MAX_MESSAGE_BYTES", DEFAULT_MAX_MESSAGE_BYTES),
            rules_path: env_path("MBOX_STATS_RULES"),
        }
    }

    /// Classifier rules from `rules_path`, or the built-in table.
    pub fn load_rules(&self) -> StatsResult<ClassifierConfig> {
        match &self.rules_path {
            Some(path) => ClassifierConfig::from_file(path),
            None => Ok(ClassifierConfig::default()),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            rules_path: None,
        }
    }
}

/// Skip a message when `header` contains `contains`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExclusionRule {
    pub header: String,
    pub contains: String,
    #[serde(default)]
    pub reason: String,
}

/// Attribute a message to `tag` when any relay-chain hop contains `contains`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderRule {
    pub tag: String,
    pub contains: String,
}

/// IPv6 messages whose auth header lacks `marker` are counted under `column`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrustedRelay {
    pub marker: String,
    pub column: String,
}

/// Declarative rule table handed to the classifier at construction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Header written by the receiving system with the verified sending IP.
    pub auth_header: String,
    /// Repeated hop-recording header, oldest first.
    pub relay_chain_header: String,
    pub trusted_relay: Option<TrustedRelay>,
    pub tls_markers: Vec<String>,
    pub exclusions: Vec<ExclusionRule>,
    pub providers: Vec<ProviderRule>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let provider = |tag: &str, contains: &str| ProviderRule {
            tag: tag.to_string(),
            contains: contains.to_string(),
        };

        Self {
            auth_header: "Received-SPF".to_string(),
            relay_chain_header: "Received".to_string(),
            trusted_relay: Some(TrustedRelay {
                marker: "google.com".to_string(),
                column: "v6notgoogle".to_string(),
            }),
            tls_markers: vec!["mx.google.com with ESMTPS".to_string()],
            exclusions: Vec::new(),
            providers: vec![
                provider("mandrill", "mandrillapp.com"),
                provider("sendgrid", "sendgrid.net"),
                provider("aws", "amazonses.com"),
                provider("mailchimp", "mcsv.net"),
                provider("mailchimp", "rsgsv.net"),
            ],
        }
    }
}

impl ClassifierConfig {
    pub fn from_file(path: &Path) -> StatsResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| StatsError::RulesIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| StatsError::RulesFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Provider tags in first-seen order, one per CSV column.
    pub fn provider_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = Vec::new();
        for rule in &self.providers {
            if !tags.contains(&rule.tag.as_str()) {
                tags.push(&rule.tag);
            }
        }
        tags
    }

    pub fn tls_enabled(&self) -> bool {
        !self.tls_markers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_provider_tags_are_deduplicated_in_order() {
        let config = ClassifierConfig::default();
        assert_eq!(
            config.provider_tags(),
            vec!["mandrill", "sendgrid", "aws", "mailchimp"]
        );
    }

    #[test]
    fn test_partial_rules_file_keeps_defaults() {
        let config = ClassifierConfig::from_json(
            r#"{"exclusions":[{"header":"From","contains":"alerts@"}]}"#,
        )
        .unwrap();

        assert_eq!(config.auth_header, "Received-SPF");
        assert_eq!(config.exclusions.len(), 1);
        assert_eq!(config.exclusions[0].reason, "");
        assert_eq!(config.provider_tags().len(), 4);
    }

    #[test]
    fn test_rules_can_disable_overlays() {
        let config = ClassifierConfig::from_json(
            r#"{"trusted_relay":null,"tls_markers":[],"providers":[]}"#,
        )
        .unwrap();

        assert!(config.trusted_relay.is_none());
        assert!(!config.tls_enabled());
        assert!(config.provider_tags().is_empty());
    }

    #[test]
    fn test_missing_rules_file_is_reported() {
        let err = ClassifierConfig::from_file(Path::new("/nonexistent/rules.json")).unwrap_err();
        assert!(matches!(err, StatsError::RulesIo { .. }));
    }
}
