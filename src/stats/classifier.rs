//! Header classification.
//!
//! For one message the classifier runs, in order:
//!
//! 1. **Exclusions**: the first rule whose header contains its substring
//!    skips the message silently.
//! 2. **Address family**: the auth header (`Received-SPF` by default) must
//!    carry an IPv6 or IPv4 address after a marker. Otherwise the message is
//!    unclassifiable and skipped.
//! 3. **Overlays**: TLS delivery and sending provider, both read from the
//!    relay chain (`Received` hops). Each adds at most one count per message
//!    no matter how many hops match.
//!
//! Rule tables come from [`ClassifierConfig`]; nothing deployment-specific is
//! hard-coded here.

use crate::config::{ClassifierConfig, ExclusionRule};
use crate::ingest::parser::ParsedHeaders;
use crate::stats::aggregate::{MonthKey, MonthlyStats};
use crate::stats::patterns::{self, IpFamily};

/// Result of classifying a message that was not excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub family: IpFamily,
    /// Auth header names the trusted relay. Always true when no relay is configured.
    pub via_trusted_relay: bool,
    pub tls: bool,
    pub provider: Option<String>,
}

/// What to do with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<'a> {
    Excluded(&'a ExclusionRule),
    /// Auth header matched neither family. Empty when the header is absent.
    Unclassifiable { header: String },
    Classified(Classification),
}

pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        // Compile the shared matchers up front rather than on the first message.
        patterns::ipv4_regex();
        patterns::ipv6_regex();
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// First exclusion rule matching `headers`.
    pub fn exclusion(&self, headers: &ParsedHeaders) -> Option<&ExclusionRule> {
        self.config.exclusions.iter().find(|rule| {
            headers
                .get_all(&rule.header)
                .any(|value| value.contains(rule.contains.as_str()))
        })
    }

    fn relay_hops<'a>(&'a self, headers: &'a ParsedHeaders) -> impl Iterator<Item = &'a str> + 'a {
        headers.get_all(&self.config.relay_chain_header)
    }

    fn detect_tls(&self, headers: &ParsedHeaders) -> bool {
        self.relay_hops(headers).any(|hop| {
            self.config
                .tls_markers
                .iter()
                .any(|marker| hop.contains(marker.as_str()))
        })
    }

    /// Provider rules are tried in table order; the first one found on any hop wins.
    fn detect_provider(&self, headers: &ParsedHeaders) -> Option<String> {
        self.config
            .providers
            .iter()
            .find(|rule| {
                self.relay_hops(headers)
                    .any(|hop| hop.contains(rule.contains.as_str()))
            })
            .map(|rule| rule.tag.clone())
    }

    pub fn classify(&self, headers: &ParsedHeaders) -> Verdict<'_> {
        if let Some(rule) = self.exclusion(headers) {
            return Verdict::Excluded(rule);
        }

        let auth = headers
            .get_first(&self.config.auth_header)
            .unwrap_or_default();

        let Some(family) = patterns::detect_family(auth) else {
            return Verdict::Unclassifiable {
                header: auth.trim().to_string(),
            };
        };

        let via_trusted_relay = match (&self.config.trusted_relay, family) {
            (Some(relay), IpFamily::V6) => auth.contains(relay.marker.as_str()),
            _ => true,
        };

        Verdict::Classified(Classification {
            family,
            via_trusted_relay,
            tls: self.detect_tls(headers),
            provider: self.detect_provider(headers),
        })
    }

    /// Classify `headers` and fold a successful result into its month.
    pub fn apply<'a>(&'a self, headers: &ParsedHeaders, stats: &mut MonthlyStats) -> Verdict<'a> {
        let verdict = self.classify(headers);
        if let Verdict::Classified(classification) = &verdict {
            stats.record(MonthKey::from_date(&headers.date), classification);
        }
        verdict
    }
}
