//! CSV rendering.
//!
//! Columns follow the rule table, so disabled overlays simply drop out:
//!
//! ```text
//! Date,v6,v6notgoogle,v4,mandrill,sendgrid,aws,mailchimp,tls,Total
//! Mar 2024,120,5,40,3,1,0,2,95,160
//! ```
//!
//! Rows come out in chronological month order.

use crate::config::ClassifierConfig;
use crate::stats::aggregate::{MonthlyStats, StatisticGroup};
use std::io::{self, Write};

enum Column {
    V6,
    V6NotViaTrustedRelay(String),
    V4,
    Provider(String),
    Tls,
}

impl Column {
    fn title(&self) -> &str {
        match self {
            Column::V6 => "v6",
            Column::V6NotViaTrustedRelay(title) => title.as_str(),
            Column::V4 => "v4",
            Column::Provider(tag) => tag.as_str(),
            Column::Tls => "tls",
        }
    }

    fn value(&self, group: &StatisticGroup) -> usize {
        match self {
            Column::V6 => group.v6,
            Column::V6NotViaTrustedRelay(_) => group.v6_not_via_trusted_relay,
            Column::V4 => group.v4,
            Column::Provider(tag) => group.provider_count(tag),
            Column::Tls => group.tls,
        }
    }
}

/// Column layout derived from a rule table.
pub struct CsvReport {
    columns: Vec<Column>,
}

impl CsvReport {
    pub fn new(config: &ClassifierConfig) -> Self {
        let mut columns = vec![Column::V6];
        if let Some(relay) = &config.trusted_relay {
            columns.push(Column::V6NotViaTrustedRelay(relay.column.clone()));
        }
        columns.push(Column::V4);
        columns.extend(
            config
                .provider_tags()
                .into_iter()
                .map(|tag| Column::Provider(tag.to_string())),
        );
        if config.tls_enabled() {
            columns.push(Column::Tls);
        }
        Self { columns }
    }

    pub fn header(&self) -> String {
        let mut line = String::from("Date");
        for column in &self.columns {
            line.push(',');
            line.push_str(column.title());
        }
        line.push_str(",Total");
        line
    }

    pub fn row(&self, label: &str, group: &StatisticGroup) -> String {
        let mut line = label.to_string();
        for column in &self.columns {
            line.push(',');
            line.push_str(&column.value(group).to_string());
        }
        line.push(',');
        line.push_str(&group.total.to_string());
        line
    }

    /// Write the header row and one row per month.
    pub fn write<W: Write>(&self, stats: &MonthlyStats, mut out: W) -> io::Result<()> {
        writeln!(out, "{}", self.header())?;
        for (month, group) in stats.iter() {
            writeln!(out, "{}", self.row(&month.to_string(), group))?;
        }
        out.flush()
    }

    pub fn render(&self, stats: &MonthlyStats) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write(stats, &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}
