//! Address-family matchers for the auth header.
//!
//! An address only counts when it directly follows one of the marker
//! substrings `client-ip=` or `designates `. Each family has one pattern that
//! covers both markers and matches anywhere in the header value.
//!
//! The IPv6 alternation accepts full, compressed (`::`), zone-suffixed
//! link-local (`fe80::1%eth0`) and IPv4-mapped/embedded forms. Because
//! IPv4-mapped addresses also satisfy the IPv6 pattern, callers must test
//! IPv6 before IPv4.
//!
//! Both regexes are compiled once per process and shared read-only.

use regex::Regex;
use std::sync::OnceLock;

const MARKER: &str = r"(?:client-ip=|designates )";

const IPV4_OCTET: &str = r"(?:25[0-5]|(?:2[0-4]|1?[0-9])?[0-9])";

static IPV4_REGEX: OnceLock<Regex> = OnceLock::new();
static IPV6_REGEX: OnceLock<Regex> = OnceLock::new();

/// Address family of the verified sending IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    V4,
    V6,
}

fn ipv6_alternatives() -> String {
    let h = "[0-9a-fA-F]{1,4}";
    let v4 = format!(r"(?:{IPV4_OCTET}\.){{3}}{IPV4_OCTET}");
    [
        format!("(?:{h}:){{7}}{h}"),
        format!("(?:{h}:){{1,7}}:"),
        format!("(?:{h}:){{1,6}}:{h}"),
        format!("(?:{h}:){{1,5}}(?::{h}){{1,2}}"),
        format!("(?:{h}:){{1,4}}(?::{h}){{1,3}}"),
        format!("(?:{h}:){{1,3}}(?::{h}){{1,4}}"),
        format!("(?:{h}:){{1,2}}(?::{h}){{1,5}}"),
        format!("{h}:(?::{h}){{1,6}}"),
        format!(":(?:(?::{h}){{1,7}}|:)"),
        "fe80:(?::[0-9a-fA-F]{0,4}){0,4}%[0-9a-zA-Z]+".to_string(),
        format!("::(?:ffff(?::0{{1,4}})?:)?{v4}"),
        format!("(?:{h}:){{1,4}}:{v4}"),
    ]
    .join("|")
}

/// Compiled IPv4 matcher (`client-ip=` or `designates ` + dotted quad).
pub fn ipv4_regex() -> &'static Regex {
    IPV4_REGEX.get_or_init(|| {
        Regex::new(&format!(r"{MARKER}\d{{1,3}}\.\d{{1,3}}\.\d{{1,3}}\.\d{{1,3}}"))
            .expect("Invalid IPv4 marker regex")
    })
}

/// Compiled IPv6 matcher (`client-ip=` or `designates ` + any textual IPv6).
pub fn ipv6_regex() -> &'static Regex {
    IPV6_REGEX.get_or_init(|| {
        Regex::new(&format!("{MARKER}(?:{})", ipv6_alternatives()))
            .expect("Invalid IPv6 marker regex")
    })
}

/// Classify the auth header value, IPv6 first.
pub fn detect_family(header: &str) -> Option<IpFamily> {
    if ipv6_regex().is_match(header) {
        Some(IpFamily::V6)
    } else if ipv4_regex().is_match(header) {
        Some(IpFamily::V4)
    } else {
        None
    }
}
