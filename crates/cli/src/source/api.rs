//! HTTP API source.
//!
//! GETs `base_url/endpoint` with `start_date` / `end_date` query params and a
//! bearer token resolved from the environment (never from the config file).
//! 429 and 5xx responses are retried with exponential backoff; other 4xx
//! responses fail immediately.

use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use tally_recon::config::ApiSourceConfig;
use tally_recon::{DataSource, ReconError, Record};
use tracing::{debug, info, warn};
use url::Url;

use super::{filter_by_date, select_records};

const USER_AGENT: &str = concat!("tally/", env!("CARGO_PKG_VERSION"));
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BODY_PREVIEW: usize = 200;

pub struct ApiSource {
    name: String,
    url: Url,
    token: Option<String>,
    date_field: Option<String>,
    date_format: String,
    records_path: Option<String>,
    retries: u32,
    backoff: Duration,
    http: reqwest::blocking::Client,
}

/// Read a bearer token from `var`. Missing or blank is an error.
fn resolve_token(source: &str, var: &str) -> Result<String, ReconError> {
    let value = std::env::var(var).map_err(|_| {
        ReconError::source_unavailable(source, format!("environment variable {var} not set (needed for API token)"))
    })?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ReconError::source_unavailable(
            source,
            format!("environment variable {var} is empty (needed for API token)"),
        ));
    }
    Ok(trimmed.to_string())
}

fn endpoint_url(base_url: &str, endpoint: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    ))
}

/// Short human message from an error response body.
fn error_message(body: &str, status: u16) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.get("error")
            .and_then(|e| e.get("message").or(Some(e)))
            .or_else(|| v.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    });
    match message {
        Some(m) => m,
        None if body.trim().is_empty() => format!("HTTP {status}"),
        None => body.chars().take(MAX_BODY_PREVIEW).collect(),
    }
}

impl ApiSource {
    pub fn from_config(config: &ApiSourceConfig) -> Result<Self, ReconError> {
        let url = endpoint_url(&config.base_url, &config.endpoint).map_err(|e| {
            ReconError::invalid(format!("{}: invalid API URL: {e}", config.name))
        })?;

        let token = match &config.token_env {
            Some(var) => Some(resolve_token(&config.name, var)?),
            None => None,
        };

        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ReconError::source_unavailable(&config.name, format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            name: config.name.clone(),
            url,
            token,
            date_field: config.date_field.clone(),
            date_format: config.date_format.clone(),
            records_path: config.records_path.clone(),
            retries: config.retries,
            backoff: INITIAL_BACKOFF,
            http,
        })
    }

    #[cfg(test)]
    fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn unavailable(&self, message: impl Into<String>) -> ReconError {
        ReconError::source_unavailable(&self.name, message)
    }

    /// GET the endpoint with `query`, retrying 429 / 5xx / network errors.
    fn get_json(&self, query: &[(&str, String)]) -> Result<serde_json::Value, ReconError> {
        let mut backoff = self.backoff;

        for attempt in 0..=self.retries {
            let mut request = self
                .http
                .get(self.url.clone())
                .header(reqwest::header::ACCEPT, "application/json")
                .query(query);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let response = match request.send() {
                Ok(response) => response,
                Err(e) => {
                    if attempt == self.retries {
                        return Err(self.unavailable(format!(
                            "request failed after {} attempts: {e}",
                            attempt + 1
                        )));
                    }
                    warn!(source = %self.name, attempt = attempt + 1, retries = self.retries, error = %e, "request failed, retrying");
                    thread::sleep(backoff);
                    backoff *= 2;
                    continue;
                }
            };

            let status = response.status().as_u16();

            if status == 429 || status >= 500 {
                if attempt == self.retries {
                    let what = if status == 429 { "rate limited" } else { "upstream error" };
                    return Err(self.unavailable(format!(
                        "{what} after {} attempts (HTTP {status})",
                        attempt + 1
                    )));
                }
                let wait = if status == 429 {
                    response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .map(Duration::from_secs)
                        .unwrap_or(backoff)
                } else {
                    backoff
                };
                warn!(source = %self.name, attempt = attempt + 1, retries = self.retries, status, wait_ms = wait.as_millis() as u64, "retrying request");
                thread::sleep(wait);
                backoff *= 2;
                continue;
            }

            let body = response
                .text()
                .map_err(|e| self.unavailable(format!("cannot read response body: {e}")))?;

            if status >= 400 {
                let what = if status == 401 || status == 403 { "auth failed" } else { "request rejected" };
                return Err(self.unavailable(format!("{what} (HTTP {status}): {}", error_message(&body, status))));
            }

            let trimmed = body.trim_start_matches('\u{feff}');
            return serde_json::from_str(trimmed).map_err(|e| {
                let preview: String = trimmed.chars().take(MAX_BODY_PREVIEW).collect();
                self.unavailable(format!("invalid JSON response: {e} (body: {preview})"))
            });
        }

        Err(self.unavailable("no request attempted"))
    }
}

impl DataSource for ApiSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_transactions(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Record>, ReconError> {
        let query = [
            ("start_date", start.format("%Y-%m-%d").to_string()),
            ("end_date", end.format("%Y-%m-%d").to_string()),
        ];
        let doc = self.get_json(&query)?;
        let records = select_records(&self.name, &doc, self.records_path.as_deref())?;

        let kept = match &self.date_field {
            Some(field) => filter_by_date(&self.name, records, field, &self.date_format, start, end),
            None => records,
        };
        info!(source = %self.name, url = %self.url, count = kept.len(), "loaded API transactions");
        Ok(kept)
    }

    /// Keys of the first record of a `limit=1` request.
    fn list_fields(&self) -> Vec<String> {
        let fields = self
            .get_json(&[("limit", "1".to_string())])
            .and_then(|doc| select_records(&self.name, &doc, self.records_path.as_deref()));
        match fields {
            Ok(records) => records
                .first()
                .map(|r| r.field_names().map(str::to_string).collect())
                .unwrap_or_default(),
            Err(e) => {
                debug!(source = %self.name, error = %e, "cannot list API fields");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tally_recon::Value;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn config(base_url: String) -> ApiSourceConfig {
        ApiSourceConfig {
            name: "gateway".into(),
            base_url,
            endpoint: "/v1/transactions".into(),
            token_env: None,
            date_field: None,
            date_format: "%Y-%m-%d".into(),
            records_path: Some("data".into()),
            timeout_secs: 5,
            retries: 2,
        }
    }

    fn source(config: &ApiSourceConfig) -> ApiSource {
        ApiSource::from_config(config)
            .unwrap()
            .with_backoff(Duration::from_millis(1))
    }

    #[test]
    fn url_joining() {
        let url = endpoint_url("https://api.example.com/", "/v1/tx").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/tx");
        let url = endpoint_url("https://api.example.com/base", "tx").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/base/tx");
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(error_message(r#"{"error": {"message": "bad key"}}"#, 401), "bad key");
        assert_eq!(error_message(r#"{"error": "nope"}"#, 400), "nope");
        assert_eq!(error_message(r#"{"message": "missing"}"#, 404), "missing");
        assert_eq!(error_message("", 500), "HTTP 500");
        assert_eq!(error_message("plain text", 418), "plain text");
    }

    #[test]
    fn fetch_sends_dates_and_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/transactions")
                .query_param("start_date", "2026-01-01")
                .query_param("end_date", "2026-01-31")
                .header("authorization", "Bearer tok_123");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({
                    "data": [
                        {"id": "tx_1", "amount": 12.5, "date": "2026-01-04"},
                        {"id": "tx_2", "amount": 3, "date": "2026-01-09"}
                    ]
                }));
        });

        std::env::set_var("TALLY_TEST_TOKEN_FETCH", "tok_123");
        let mut cfg = config(server.base_url());
        cfg.token_env = Some("TALLY_TEST_TOKEN_FETCH".into());

        let records = source(&cfg)
            .fetch_transactions(date("2026-01-01"), date("2026-01-31"))
            .unwrap();
        mock.assert();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("amount"), Some(&Value::Float(12.5)));
        assert_eq!(records[1].get("amount"), Some(&Value::Integer(3)));
    }

    #[test]
    fn date_field_filters_client_side() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/transactions");
            then.status(200).json_body(serde_json::json!({
                "data": [
                    {"id": "tx_1", "created": "2026-01-04T10:00:00"},
                    {"id": "tx_2", "created": "2025-12-30T23:59:59"}
                ]
            }));
        });

        let mut cfg = config(server.base_url());
        cfg.date_field = Some("created".into());
        cfg.date_format = "%Y-%m-%dT%H:%M:%S".into();
        let records = source(&cfg)
            .fetch_transactions(date("2026-01-01"), date("2026-01-31"))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("id"), Some(&Value::from("tx_1")));
    }

    #[test]
    fn retries_then_gives_up_on_server_errors() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/v1/transactions");
            then.status(503).body("maintenance");
        });

        let err = source(&config(server.base_url()))
            .fetch_transactions(date("2026-01-01"), date("2026-01-31"))
            .unwrap_err();
        assert!(matches!(err, ReconError::SourceUnavailable { .. }));
        assert!(err.to_string().contains("upstream error after 3 attempts"));
        mock.assert_calls(3);
    }

    #[test]
    fn rate_limit_respects_retry_after() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/v1/transactions");
            then.status(429).header("retry-after", "0");
        });

        let err = source(&config(server.base_url()))
            .fetch_transactions(date("2026-01-01"), date("2026-01-31"))
            .unwrap_err();
        assert!(err.to_string().contains("rate limited"));
        mock.assert_calls(3);
    }

    #[test]
    fn auth_failure_is_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/v1/transactions");
            then.status(401)
                .json_body(serde_json::json!({"error": {"message": "Invalid token"}}));
        });

        let err = source(&config(server.base_url()))
            .fetch_transactions(date("2026-01-01"), date("2026-01-31"))
            .unwrap_err();
        assert!(err.to_string().contains("auth failed (HTTP 401): Invalid token"));
        mock.assert_calls(1);
    }

    #[test]
    fn list_fields_requests_one_record() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/v1/transactions").query_param("limit", "1");
            then.status(200)
                .json_body(serde_json::json!({"data": [{"id": "tx_1", "amount": 1}]}));
        });

        let fields = source(&config(server.base_url())).list_fields();
        mock.assert();
        assert_eq!(fields, vec!["amount", "id"]);
    }

    #[test]
    fn list_fields_is_best_effort() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/transactions");
            then.status(404);
        });
        assert!(source(&config(server.base_url())).list_fields().is_empty());
    }

    #[test]
    fn missing_token_variable() {
        let mut cfg = config("https://api.example.com".into());
        cfg.token_env = Some("TALLY_TEST_TOKEN_UNSET".into());
        std::env::remove_var("TALLY_TEST_TOKEN_UNSET");
        let err = ApiSource::from_config(&cfg).err().unwrap();
        assert!(err.to_string().contains("TALLY_TEST_TOKEN_UNSET not set"));
    }
}
