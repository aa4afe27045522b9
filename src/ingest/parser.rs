//! Header parsing.
//!
//! Turns one delimited message into [`ParsedHeaders`]: every header in
//! arrival order plus the send timestamp from `Date`. Only the header block is
//! parsed (`mailparse::parse_headers`); bodies are never decoded.
//!
//! The timestamp keeps the sender's stated UTC offset, so month bucketing
//! follows the calendar the sender reported rather than UTC. Dates that are
//! not valid RFC 2822 fall back to `dateparser`, which yields UTC.
//!
//! A message without a usable `Date` never reaches the classifier.

use chrono::{DateTime, FixedOffset};
use mailparse::parse_headers;
use thiserror::Error;

/// Per-message failures. Logged and skipped, never fatal.
#[derive(Debug, Error)]
pub enum ParseHeadersError {
    #[error("failed to parse header block: {0}")]
    Headers(#[from] mailparse::MailParseError),
    #[error("missing Date header")]
    MissingDate,
    #[error("invalid Date header `{raw}`: {error}")]
    InvalidDate { raw: String, error: String },
}

/// Header set of one message, names compared case-insensitively.
#[derive(Debug, Clone)]
pub struct ParsedHeaders {
    headers: Vec<(String, String)>,
    pub date: DateTime<FixedOffset>,
}

impl ParsedHeaders {
    /// First value of `name`, if present.
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// All values of `name` in arrival order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn message_id(&self) -> Option<&str> {
        self.get_first("Message-ID")
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// Remove RFC 822 comments such as the `(PST)` in `-0800 (PST)`.
fn strip_comments(raw: &str) -> String {
    let mut depth = 0usize;
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a `Date` header value, keeping the sender's offset when possible.
pub fn parse_date(raw: &str) -> Result<DateTime<FixedOffset>, ParseHeadersError> {
    let cleaned = strip_comments(raw);
    if cleaned.is_empty() {
        return Err(ParseHeadersError::MissingDate);
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(&cleaned) {
        return Ok(dt);
    }

    match dateparser::parse(&cleaned) {
        Ok(dt) => Ok(dt.fixed_offset()),
        Err(source) => Err(ParseHeadersError::InvalidDate {
            raw: raw.trim().to_string(),
            error: source.to_string(),
        }),
    }
}

/// Parse the header block of `raw` and its `Date`.
pub fn parse_message_headers(raw: &[u8]) -> Result<ParsedHeaders, ParseHeadersError> {
    let (parsed, _body_offset) = parse_headers(raw)?;

    let headers: Vec<(String, String)> = parsed
        .iter()
        .map(|header| (header.get_key(), header.get_value()))
        .collect();

    let raw_date = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("Date"))
        .map(|(_, value)| value.as_str())
        .ok_or(ParseHeadersError::MissingDate)?;
    let date = parse_date(raw_date)?;

    log::trace!("parsed {} headers, date {}", headers.len(), date);

    Ok(ParsedHeaders { headers, date })
}
