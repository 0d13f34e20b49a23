//! Built-in discovery sources.
//!
//! The registry is an explicit list compiled into the binary: four passive
//! enumeration tools and four passive APIs. Tools that are not installed
//! are gated out by the loader, so the list can stay maximal.

use std::collections::BTreeSet;

use serde_json::Value;

use super::{ApiAuth, ApiPayload, ParseError, PayloadFormat, SourceDescriptor};

/// Every source known to the engine, tools first.
pub fn builtin_sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::tool("subfinder", subfinder_command),
        SourceDescriptor::tool("assetfinder", assetfinder_command),
        SourceDescriptor::tool("amass", amass_command),
        SourceDescriptor::tool("findomain", findomain_command),
        SourceDescriptor::api(
            "crtsh",
            "https://crt.sh/?q=%25.{domain}&output=json",
            PayloadFormat::Json,
            parse_crtsh,
        ),
        SourceDescriptor::api(
            "hackertarget",
            "https://api.hackertarget.com/hostsearch/?q={domain}",
            PayloadFormat::Text,
            parse_hackertarget,
        ),
        SourceDescriptor::api(
            "alienvault",
            "https://otx.alienvault.com/api/v1/indicators/domain/{domain}/passive_dns",
            PayloadFormat::Json,
            parse_alienvault,
        ),
        SourceDescriptor::api(
            "chaos",
            "https://dns.projectdiscovery.io/dns/{domain}/subdomains",
            PayloadFormat::Json,
            parse_chaos,
        )
        .with_auth(ApiAuth::BearerEnv {
            var: "CHAOS_API_KEY".to_string(),
        }),
    ]
}

fn subfinder_command(domain: &str) -> Vec<String> {
    ["subfinder", "-silent", "-d", domain]
        .into_iter()
        .map(String::from)
        .collect()
}

fn assetfinder_command(domain: &str) -> Vec<String> {
    ["assetfinder", "--subs-only", domain]
        .into_iter()
        .map(String::from)
        .collect()
}

fn amass_command(domain: &str) -> Vec<String> {
    ["amass", "enum", "-passive", "-d", domain]
        .into_iter()
        .map(String::from)
        .collect()
}

fn findomain_command(domain: &str) -> Vec<String> {
    ["findomain", "--quiet", "-t", domain]
        .into_iter()
        .map(String::from)
        .collect()
}

/// crt.sh certificate transparency search. Entries carry `name_value`
/// blocks with one name per line.
fn parse_crtsh(payload: ApiPayload) -> Result<BTreeSet<String>, ParseError> {
    let ApiPayload::Json(value) = payload else {
        return Err(ParseError::shape("expected a JSON payload"));
    };
    let entries = value
        .as_array()
        .ok_or_else(|| ParseError::shape("expected a JSON array of certificates"))?;
    let mut names = BTreeSet::new();
    for entry in entries {
        if let Some(block) = entry.get("name_value").and_then(Value::as_str) {
            names.extend(
                block
                    .lines()
                    .map(|line| line.trim().to_string())
                    .filter(|line| !line.is_empty()),
            );
        }
    }
    Ok(names)
}

/// hackertarget hostsearch. Plain text, `host,ip` per line; errors are
/// reported in-band as an `error ...` body.
fn parse_hackertarget(payload: ApiPayload) -> Result<BTreeSet<String>, ParseError> {
    let ApiPayload::Text(body) = payload else {
        return Err(ParseError::shape("expected a text payload"));
    };
    if body.trim_start().starts_with("error") {
        return Err(ParseError::shape("hackertarget returned an error body"));
    }
    Ok(body
        .lines()
        .filter_map(|line| line.split(',').next())
        .map(|host| host.trim().to_string())
        .filter(|host| !host.is_empty())
        .collect())
}

/// AlienVault OTX passive DNS records.
fn parse_alienvault(payload: ApiPayload) -> Result<BTreeSet<String>, ParseError> {
    let ApiPayload::Json(value) = payload else {
        return Err(ParseError::shape("expected a JSON payload"));
    };
    let records = value
        .get("passive_dns")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::shape("missing passive_dns array"))?;
    let mut names = BTreeSet::new();
    for record in records {
        if let Some(hostname) = record.get("hostname").and_then(Value::as_str) {
            let hostname = hostname.trim().trim_start_matches('.');
            if !hostname.is_empty() {
                names.insert(hostname.to_string());
            }
        }
    }
    Ok(names)
}

/// ProjectDiscovery Chaos. The payload lists bare prefixes next to the apex
/// they belong to.
fn parse_chaos(payload: ApiPayload) -> Result<BTreeSet<String>, ParseError> {
    let ApiPayload::Json(value) = payload else {
        return Err(ParseError::shape("expected a JSON payload"));
    };
    let apex = value
        .get("domain")
        .and_then(Value::as_str)
        .ok_or_else(|| ParseError::shape("missing domain field"))?;
    let prefixes = value
        .get("subdomains")
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::shape("missing subdomains array"))?;
    Ok(prefixes
        .iter()
        .filter_map(Value::as_str)
        .map(|prefix| format!("{prefix}.{apex}"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_names_are_unique() {
        let sources = builtin_sources();
        let names: BTreeSet<_> = sources.iter().map(|s| s.name.clone()).collect();
        assert_eq!(names.len(), sources.len());
        for source in &sources {
            assert!(source.check_contract().is_ok(), "{} violates", source.name);
        }
    }

    #[test]
    fn crtsh_splits_multiline_name_values() {
        let payload = ApiPayload::Json(json!([
            {"name_value": "a.example.com\nb.example.com"},
            {"name_value": "*.c.example.com"},
            {"issuer": "no names here"},
        ]));
        let names = parse_crtsh(payload).expect("parses");
        assert!(names.contains("a.example.com"));
        assert!(names.contains("b.example.com"));
        assert!(names.contains("*.c.example.com"));
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn crtsh_rejects_non_array_payloads() {
        let payload = ApiPayload::Json(json!({"unexpected": true}));
        assert!(parse_crtsh(payload).is_err());
    }

    #[test]
    fn hackertarget_takes_host_column() {
        let payload = ApiPayload::Text("a.example.com,1.2.3.4\nb.example.com,5.6.7.8\n".into());
        let names = parse_hackertarget(payload).expect("parses");
        assert_eq!(names.len(), 2);
        assert!(names.contains("a.example.com"));
    }

    #[test]
    fn hackertarget_error_body_is_a_parse_failure() {
        let payload = ApiPayload::Text("error check your search parameter".into());
        assert!(parse_hackertarget(payload).is_err());
    }

    #[test]
    fn alienvault_reads_hostnames() {
        let payload = ApiPayload::Json(json!({
            "passive_dns": [
                {"hostname": "a.example.com"},
                {"hostname": ".b.example.com"},
                {"address": "1.2.3.4"},
            ]
        }));
        let names = parse_alienvault(payload).expect("parses");
        assert_eq!(names.len(), 2);
        assert!(names.contains("b.example.com"));
    }

    #[test]
    fn chaos_joins_prefixes_with_the_apex() {
        let payload = ApiPayload::Json(json!({
            "domain": "example.com",
            "subdomains": ["www", "mail"],
        }));
        let names = parse_chaos(payload).expect("parses");
        assert!(names.contains("www.example.com"));
        assert!(names.contains("mail.example.com"));
    }
}
