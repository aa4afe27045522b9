//! Per-month aggregates.
//!
//! The map of [`MonthKey`] to [`StatisticGroup`] is owned by the driver for
//! the whole run and only touched by the consumer side of the pipeline.

use crate::stats::classifier::Classification;
use crate::stats::patterns::IpFamily;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Aggregation bucket, rendered as e.g. `Mar 2024`.
///
/// Derived from the Date header in the sender's own offset, not UTC.
/// Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn from_date(date: &DateTime<FixedOffset>) -> Self {
        Self::new(date.year(), date.month())
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match NaiveDate::from_ymd_opt(self.year, self.month, 1) {
            Some(first) => write!(f, "{}", first.format("%b %Y")),
            None => write!(f, "{:02}/{}", self.month, self.year),
        }
    }
}

/// Counters for one month.
///
/// `v4 + v6 == total` always holds; `tls` and `providers` are overlays that
/// can apply to either family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatisticGroup {
    pub v6: usize,
    /// IPv6 messages whose auth header does not name the trusted relay.
    pub v6_not_via_trusted_relay: usize,
    pub v4: usize,
    pub tls: usize,
    pub providers: HashMap<String, usize>,
    pub total: usize,
}

impl StatisticGroup {
    /// Fold one classified message into the group.
    pub fn record(&mut self, classification: &Classification) {
        match classification.family {
            IpFamily::V6 => {
                self.v6 += 1;
                if !classification.via_trusted_relay {
                    self.v6_not_via_trusted_relay += 1;
                }
            }
            IpFamily::V4 => self.v4 += 1,
        }

        if classification.tls {
            self.tls += 1;
        }

        if let Some(tag) = &classification.provider {
            *self.providers.entry(tag.clone()).or_insert(0) += 1;
        }

        self.total += 1;
    }

    pub fn provider_count(&self, tag: &str) -> usize {
        self.providers.get(tag).copied().unwrap_or(0)
    }
}

/// All months seen during a run, iterated chronologically.
#[derive(Debug, Clone, Default)]
pub struct MonthlyStats {
    groups: BTreeMap<MonthKey, StatisticGroup>,
}

impl MonthlyStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a classified message under `month`, creating the group on first use.
    pub fn record(&mut self, month: MonthKey, classification: &Classification) {
        self.groups.entry(month).or_default().record(classification);
    }

    pub fn get(&self, month: &MonthKey) -> Option<&StatisticGroup> {
        self.groups.get(month)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MonthKey, &StatisticGroup)> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Sum of `total` across all months.
    pub fn total(&self) -> usize {
        self.groups.values().map(|group| group.total).sum()
    }
}

/// What happened to every message the producer handed over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub scanned: usize,
    pub truncated: usize,
    pub header_failures: usize,
    pub date_failures: usize,
    pub excluded: usize,
    pub unclassifiable: usize,
    pub classified: usize,
}

impl RunSummary {
    /// Messages that did not reach an aggregate.
    pub fn skipped(&self) -> usize {
        self.header_failures + self.date_failures + self.excluded + self.unclassifiable
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} messages: {} classified, {} excluded, {} unclassifiable, {} header errors, {} date errors, {} truncated",
            self.scanned,
            self.classified,
            self.excluded,
            self.unclassifiable,
            self.header_failures,
            self.date_failures,
            self.truncated
        )
    }
}
