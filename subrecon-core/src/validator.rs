//! Syntactic domain acceptance and normalization.
//!
//! Sources emit all kinds of junk: wildcard labels, raw IPs, synthetic
//! numeric TLDs. Everything that reaches a report passes through
//! [`normalize`] and [`is_valid`] first.

use std::net::IpAddr;

use once_cell::sync::Lazy;
use regex::Regex;

/// A single DNS label after IDN encoding: alphanumeric edges, inner hyphens,
/// at most 63 octets.
pub(crate) const LABEL_PATTERN: &str = "[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?";

static LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{LABEL_PATTERN}$")).expect("label pattern compiles"));

/// Lowercases, trims surrounding whitespace, and strips a single leading
/// `*.` wildcard label. No other transformation.
pub fn normalize(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    match lowered.strip_prefix("*.") {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

/// Whether `domain` is acceptable as a DNS name.
///
/// Rejects the empty string, anything longer than 253 octets, IP literals,
/// names that fail IDN encoding, malformed labels, single-label names, and
/// synthetic numeric TLDs (a last label with a digit is only allowed in
/// punycode form).
pub fn is_valid(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }
    if domain.parse::<IpAddr>().is_ok() {
        return false;
    }
    let ascii = match idna::domain_to_ascii(domain) {
        Ok(ascii) => ascii,
        Err(_) => return false,
    };
    let labels: Vec<&str> = ascii.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    if labels.iter().any(|label| !LABEL_RE.is_match(label)) {
        return false;
    }
    let Some(tld) = labels.last() else {
        return false;
    };
    if tld.len() < 2 {
        return false;
    }
    tld.starts_with("xn--") || !tld.bytes().any(|byte| byte.is_ascii_digit())
}

/// A single apex target, carrying the IDN-encoded ASCII form used for
/// scoping and cache keys alongside the normalized input form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub ascii: String,
    pub original: String,
}

impl Target {
    /// Builds a target from raw user input, or `None` when the input does
    /// not survive [`normalize`] + [`is_valid`].
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = normalize(input);
        if !is_valid(&normalized) {
            return None;
        }
        let ascii = idna::domain_to_ascii(&normalized).ok()?;
        Some(Self {
            ascii,
            original: normalized,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_strips_wildcard() {
        assert_eq!(normalize("  Example.COM "), "example.com");
        assert_eq!(normalize("*.staging.example.com"), "staging.example.com");
        // Only a single leading wildcard label is stripped.
        assert_eq!(normalize("*.*.example.com"), "*.example.com");
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(!is_valid(""));
        let oversized = format!("{}.com", "a".repeat(250));
        assert!(!is_valid(&oversized));
    }

    #[test]
    fn rejects_ip_literals() {
        assert!(!is_valid("1.2.3.4"));
        assert!(!is_valid("2001:db8::1"));
    }

    #[test]
    fn rejects_malformed_labels() {
        assert!(!is_valid("a..b.com"));
        assert!(!is_valid("-bad.com"));
        assert!(!is_valid("bad-.com"));
        assert!(!is_valid("justonelabel"));
    }

    #[test]
    fn rejects_numeric_tld() {
        assert!(!is_valid("foo.1"));
        assert!(!is_valid("foo.123"));
    }

    #[test]
    fn accepts_regular_and_punycoded_names() {
        assert!(is_valid("a.b.co"));
        assert!(is_valid("xn--bcher-kva.example"));
        assert!(is_valid("sub.domain-with-dash.example.com"));
    }

    #[test]
    fn target_parse_encodes_idn() {
        let target = Target::parse("bücher.example").expect("idn target parses");
        assert_eq!(target.ascii, "xn--bcher-kva.example");
        assert_eq!(target.original, "bücher.example");
    }

    #[test]
    fn target_parse_rejects_invalid_input() {
        assert!(Target::parse("1.2.3.4").is_none());
        assert!(Target::parse("").is_none());
    }
}
