//! API source execution with retry.

use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::task::JoinError;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::progress::SourceStatus;
use crate::sources::{ApiAuth, ApiPayload, ApiSource, ParseError, PayloadFormat};

/// Why a single API attempt failed. Every variant is retryable.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("transport: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("http status {0}")]
    Status(StatusCode),
    #[error("body decode: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("parse contract: {0}")]
    Parse(#[from] ParseError),
    #[error("parse worker died: {0}")]
    Worker(#[from] JoinError),
}

/// Runs one API source against one target. The shared client bounds each
/// attempt with the per-task and connect timeouts; cancellation drops the
/// in-flight request and reports `Timeout`.
pub(crate) async fn run_api(
    name: &str,
    api: &ApiSource,
    target: &str,
    client: &Client,
    config: &EngineConfig,
    cancel: &CancellationToken,
) -> (BTreeSet<String>, SourceStatus) {
    tokio::select! {
        outcome = attempt_with_retries(name, api, target, client, config) => outcome,
        _ = cancel.cancelled() => {
            debug!(source = name, "api cancelled");
            (BTreeSet::new(), SourceStatus::Timeout)
        }
    }
}

async fn attempt_with_retries(
    name: &str,
    api: &ApiSource,
    target: &str,
    client: &Client,
    config: &EngineConfig,
) -> (BTreeSet<String>, SourceStatus) {
    for attempt in 0..=config.retries {
        if attempt > 0 {
            sleep(backoff_delay(config.backoff_base(), attempt - 1)).await;
        }
        match attempt_once(api, target, client).await {
            Ok(found) => {
                debug!(source = name, attempt, count = found.len(), "api attempt succeeded");
                return (super::sift(found), SourceStatus::Completed);
            }
            Err(err) => {
                warn!(source = name, attempt, error = %err, "api attempt failed");
            }
        }
    }
    (BTreeSet::new(), SourceStatus::Failed)
}

/// Delay before attempt `k + 1`: the configured base doubled `k` times.
fn backoff_delay(base: Duration, k: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(k))
}

async fn attempt_once(
    api: &ApiSource,
    target: &str,
    client: &Client,
) -> Result<BTreeSet<String>, AttemptError> {
    let url = api.url_template.replace("{domain}", target);
    let mut request = client.get(&url);
    match &api.auth {
        Some(ApiAuth::BearerEnv { var }) => {
            if let Ok(token) = std::env::var(var) {
                request = request.bearer_auth(token);
            }
        }
        Some(ApiAuth::Header { name, value }) => {
            request = request.header(name.as_str(), value.as_str());
        }
        None => {}
    }

    let response = request.send().await.map_err(AttemptError::Transport)?;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(AttemptError::Status(status));
    }

    let payload = match api.format {
        PayloadFormat::Json => {
            ApiPayload::Json(response.json().await.map_err(AttemptError::Decode)?)
        }
        PayloadFormat::Text => {
            ApiPayload::Text(response.text().await.map_err(AttemptError::Decode)?)
        }
    };

    // Parsers are plugin code of unknown cost; keep them off the async
    // workers.
    let parse = api.parse;
    let parsed = tokio::task::spawn_blocking(move || parse(payload)).await??;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{PayloadFormat, SourceDescriptor, SourceKind};
    use serde_json::Value;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_half(descriptor: SourceDescriptor) -> ApiSource {
        match descriptor.kind {
            SourceKind::Api(api) => api,
            SourceKind::Tool(_) => panic!("expected an api descriptor"),
        }
    }

    fn parse_subdomains(payload: ApiPayload) -> Result<BTreeSet<String>, ParseError> {
        let ApiPayload::Json(value) = payload else {
            return Err(ParseError::shape("expected json"));
        };
        let list = value
            .get("subdomains")
            .and_then(Value::as_array)
            .ok_or_else(|| ParseError::shape("missing subdomains"))?;
        Ok(list
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect())
    }

    fn parse_lines(payload: ApiPayload) -> Result<BTreeSet<String>, ParseError> {
        let ApiPayload::Text(body) = payload else {
            return Err(ParseError::shape("expected text"));
        };
        Ok(body.lines().map(String::from).collect())
    }

    fn reject_everything(_payload: ApiPayload) -> Result<BTreeSet<String>, ParseError> {
        Err(ParseError::shape("not a set"))
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            retries: 3,
            backoff_base_ms: 5,
            ..EngineConfig::default()
        }
    }

    fn descriptor(server_uri: &str, format: PayloadFormat, parse: crate::sources::ParseFn) -> ApiSource {
        api_half(SourceDescriptor::api(
            "mock",
            format!("{server_uri}/v1/{{domain}}"),
            format,
            parse,
        ))
    }

    #[tokio::test]
    async fn json_success_yields_completed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "subdomains": ["a.example.com", "evil.org"]
            })))
            .mount(&server)
            .await;

        let api = descriptor(&server.uri(), PayloadFormat::Json, parse_subdomains);
        let client = crate::http::build_client(&fast_config());
        let cancel = CancellationToken::new();
        let (found, status) = run_api(
            "mock",
            &api,
            "example.com",
            &client,
            &fast_config(),
            &cancel,
        )
        .await;

        assert_eq!(status, SourceStatus::Completed);
        // Both names are syntactically valid; scoping happens downstream.
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn text_payloads_reach_the_parser() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("a.example.com\nb.example.com\n"),
            )
            .mount(&server)
            .await;

        let api = descriptor(&server.uri(), PayloadFormat::Text, parse_lines);
        let client = crate::http::build_client(&fast_config());
        let cancel = CancellationToken::new();
        let (found, status) = run_api(
            "mock",
            &api,
            "example.com",
            &client,
            &fast_config(),
            &cancel,
        )
        .await;

        assert_eq!(status, SourceStatus::Completed);
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn empty_set_success_is_still_completed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"subdomains": []})),
            )
            .mount(&server)
            .await;

        let api = descriptor(&server.uri(), PayloadFormat::Json, parse_subdomains);
        let client = crate::http::build_client(&fast_config());
        let cancel = CancellationToken::new();
        let (found, status) = run_api(
            "mock",
            &api,
            "example.com",
            &client,
            &fast_config(),
            &cancel,
        )
        .await;

        assert_eq!(status, SourceStatus::Completed);
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "subdomains": ["a.example.com"]
            })))
            .mount(&server)
            .await;

        let api = descriptor(&server.uri(), PayloadFormat::Json, parse_subdomains);
        let client = crate::http::build_client(&fast_config());
        let cancel = CancellationToken::new();
        let (found, status) = run_api(
            "mock",
            &api,
            "example.com",
            &client,
            &fast_config(),
            &cancel,
        )
        .await;

        assert_eq!(status, SourceStatus::Completed);
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn persistent_server_errors_exhaust_the_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&server)
            .await;

        let api = descriptor(&server.uri(), PayloadFormat::Json, parse_subdomains);
        let client = crate::http::build_client(&fast_config());
        let cancel = CancellationToken::new();
        let (found, status) = run_api(
            "mock",
            &api,
            "example.com",
            &client,
            &fast_config(),
            &cancel,
        )
        .await;

        assert_eq!(status, SourceStatus::Failed);
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn parse_contract_violations_retry_then_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(4)
            .mount(&server)
            .await;

        let api = descriptor(&server.uri(), PayloadFormat::Json, reject_everything);
        let client = crate::http::build_client(&fast_config());
        let cancel = CancellationToken::new();
        let (_, status) = run_api(
            "mock",
            &api,
            "example.com",
            &client,
            &fast_config(),
            &cancel,
        )
        .await;

        assert_eq!(status, SourceStatus::Failed);
    }

    #[tokio::test]
    async fn undecodable_json_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("this is not json"))
            .expect(4)
            .mount(&server)
            .await;

        let api = descriptor(&server.uri(), PayloadFormat::Json, parse_subdomains);
        let client = crate::http::build_client(&fast_config());
        let cancel = CancellationToken::new();
        let (_, status) = run_api(
            "mock",
            &api,
            "example.com",
            &client,
            &fast_config(),
            &cancel,
        )
        .await;

        assert_eq!(status, SourceStatus::Failed);
    }

    #[tokio::test]
    async fn literal_auth_header_is_sent_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("x-api-key", "sekrit"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"subdomains": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut api = descriptor(&server.uri(), PayloadFormat::Json, parse_subdomains);
        api.auth = Some(ApiAuth::Header {
            name: "x-api-key".to_string(),
            value: "sekrit".to_string(),
        });
        let client = crate::http::build_client(&fast_config());
        let cancel = CancellationToken::new();
        let (_, status) = run_api(
            "mock",
            &api,
            "example.com",
            &client,
            &fast_config(),
            &cancel,
        )
        .await;

        assert_eq!(status, SourceStatus::Completed);
    }

    #[tokio::test]
    async fn unset_bearer_env_omits_the_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"subdomains": []})),
            )
            .mount(&server)
            .await;

        let mut api = descriptor(&server.uri(), PayloadFormat::Json, parse_subdomains);
        api.auth = Some(ApiAuth::BearerEnv {
            var: "SUBRECON_TEST_UNSET_TOKEN".to_string(),
        });
        let client = crate::http::build_client(&fast_config());
        let cancel = CancellationToken::new();
        let (_, status) = run_api(
            "mock",
            &api,
            "example.com",
            &client,
            &fast_config(),
            &cancel,
        )
        .await;

        // No Authorization header was required by the mock; the request
        // must still succeed without one.
        assert_eq!(status, SourceStatus::Completed);
        let requests = server.received_requests().await.unwrap_or_default();
        assert!(requests
            .iter()
            .all(|request| !request.headers.contains_key("authorization")));
    }

    #[test]
    fn backoff_doubles_from_the_base() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 0), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(4));
    }
}
