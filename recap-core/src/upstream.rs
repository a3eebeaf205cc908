//! Email summary sources
//!
//! Provides an `EmailSource` trait with implementations for:
//! - **Webhook** — calls the upstream automation webhook and normalizes its body
//! - **Fallback** — wraps another source and recovers from its failures with
//!   the configured `FailurePolicy` (empty list or a fixed sample list)
//! - **Unconfigured** — used when no upstream URL is set; always fails

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::config::{FailurePolicy, UpstreamConfig};
use crate::models::EmailSummary;
use crate::normalize;

// ============================================================================
// EmailSource trait
// ============================================================================

/// Abstraction over where email summaries come from.
#[async_trait]
pub trait EmailSource: Send + Sync {
    /// Fetch and normalize the current email summaries. `now` is the capture
    /// time used for synthesized ids and default timestamps.
    async fn fetch(&self, now: DateTime<Utc>) -> Result<Vec<EmailSummary>, UpstreamError>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream webhook responded with status {code}")]
    Status { code: u16 },

    #[error("No upstream webhook URL configured")]
    NotConfigured,
}

/// Build the source described by `config`, always wrapped in the fallback
/// policy so callers never see upstream failures.
pub fn create_source(config: &UpstreamConfig) -> Result<Box<dyn EmailSource>, UpstreamError> {
    let inner: Box<dyn EmailSource> = match config.url.as_deref().filter(|u| !u.is_empty()) {
        Some(url) => Box::new(WebhookEmailSource::new(
            url.to_string(),
            config.token.clone(),
            Duration::from_secs(config.timeout_seconds),
        )?),
        None => {
            tracing::warn!("No upstream webhook URL configured — email summaries will use the failure policy");
            Box::new(UnconfiguredEmailSource)
        }
    };

    Ok(Box::new(FallbackEmailSource::new(inner, config.on_failure)))
}

// ============================================================================
// WebhookEmailSource
// ============================================================================

/// Calls the upstream webhook with `GET` and normalizes whatever it returns.
#[derive(Debug, Clone)]
pub struct WebhookEmailSource {
    client: Client,
    url: String,
    token: Option<String>,
}

impl WebhookEmailSource {
    pub fn new(
        url: String,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// Issue the request and return the raw body of a successful response.
    pub async fn fetch_body(&self) -> Result<String, UpstreamError> {
        tracing::info!("Calling upstream email webhook");

        let mut request = self
            .client
            .get(&self.url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::info!(status = status.as_u16(), "Upstream webhook responded");

        if !status.is_success() {
            return Err(UpstreamError::Status {
                code: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl EmailSource for WebhookEmailSource {
    async fn fetch(&self, now: DateTime<Utc>) -> Result<Vec<EmailSummary>, UpstreamError> {
        let body = self.fetch_body().await?;
        let summaries = normalize::normalize_body(&body, now);
        tracing::info!(count = summaries.len(), "Normalized email summaries");
        Ok(summaries)
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

// ============================================================================
// UnconfiguredEmailSource
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct UnconfiguredEmailSource;

#[async_trait]
impl EmailSource for UnconfiguredEmailSource {
    async fn fetch(&self, _now: DateTime<Utc>) -> Result<Vec<EmailSummary>, UpstreamError> {
        Err(UpstreamError::NotConfigured)
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

// ============================================================================
// FallbackEmailSource
// ============================================================================

/// Wraps another source. On any error, logs a warning and returns the
/// policy result instead.
pub struct FallbackEmailSource {
    inner: Box<dyn EmailSource>,
    policy: FailurePolicy,
}

impl FallbackEmailSource {
    pub fn new(inner: Box<dyn EmailSource>, policy: FailurePolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl EmailSource for FallbackEmailSource {
    async fn fetch(&self, now: DateTime<Utc>) -> Result<Vec<EmailSummary>, UpstreamError> {
        match self.inner.fetch(now).await {
            Ok(summaries) => Ok(summaries),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    source = self.inner.name(),
                    policy = ?self.policy,
                    "Email source failed — returning failure-policy result"
                );
                Ok(match self.policy {
                    FailurePolicy::Empty => Vec::new(),
                    FailurePolicy::Sample => sample_summaries(now),
                })
            }
        }
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

/// Fixed sample list returned under `FailurePolicy::Sample`.
pub fn sample_summaries(now: DateTime<Utc>) -> Vec<EmailSummary> {
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    vec![
        EmailSummary {
            id: "sample-1".to_string(),
            subject: "Weekly team sync notes".to_string(),
            sender: "team-lead@example.com".to_string(),
            summary: "Action items from the weekly sync: finalize the release checklist \
                      and review open pull requests before Friday."
                .to_string(),
            timestamp: timestamp.clone(),
            url: None,
        },
        EmailSummary {
            id: "sample-2".to_string(),
            subject: "Your monthly invoice is ready".to_string(),
            sender: "billing@example.com".to_string(),
            summary: "The invoice for this month is available in the billing portal. \
                      Payment is due within 30 days."
                .to_string(),
            timestamp,
            url: Some("https://example.com/billing".to_string()),
        },
    ]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn test_source(server: &MockServer, token: Option<&str>) -> WebhookEmailSource {
        WebhookEmailSource::new(
            format!("{}/webhook/emails", server.uri()),
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .expect("Failed to create source")
    }

    fn config_for(server: &MockServer, policy: FailurePolicy) -> UpstreamConfig {
        UpstreamConfig {
            url: Some(format!("{}/webhook/emails", server.uri())),
            token: None,
            timeout_seconds: 5,
            on_failure: policy,
        }
    }

    #[tokio::test]
    async fn test_fetch_normalizes_container_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/webhook/emails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "emails": [
                    {"messageId": "m1", "Subject": "Invoice", "From": "billing@x.com"},
                    {"title": "Hello", "sender": "ann@x.com", "content": "hi there"}
                ]
            })))
            .mount(&server)
            .await;

        let summaries = test_source(&server, None).fetch(now()).await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, "m1");
        assert_eq!(summaries[0].subject, "Invoice");
        assert_eq!(summaries[1].summary, "hi there");
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer tok-123"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let summaries = test_source(&server, Some("tok-123")).fetch(now()).await.unwrap();
        assert!(summaries.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_empty_and_invalid_bodies_are_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let source = test_source(&server, None);
        assert!(source.fetch(now()).await.unwrap().is_empty());
        assert!(source.fetch(now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let result = test_source(&server, None).fetch(now()).await;
        match result {
            Err(UpstreamError::Status { code }) => assert_eq!(code, 502),
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fallback_empty_policy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = create_source(&config_for(&server, FailurePolicy::Empty)).unwrap();
        let result = source.fetch(now()).await;
        assert!(result.is_ok(), "Fallback should not propagate errors");
        assert!(result.unwrap().is_empty());
        assert_eq!(source.name(), "fallback");
    }

    #[tokio::test]
    async fn test_fallback_sample_policy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = create_source(&config_for(&server, FailurePolicy::Sample)).unwrap();
        let summaries = source.fetch(now()).await.unwrap();
        assert_eq!(summaries, sample_summaries(now()));
        assert_eq!(summaries.len(), 2);
    }

    #[tokio::test]
    async fn test_fallback_passes_success_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"from": "a@b.com", "subject": "Hi"})),
            )
            .mount(&server)
            .await;

        let source = create_source(&config_for(&server, FailurePolicy::Sample)).unwrap();
        let summaries = source.fetch(now()).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].id.starts_with("email-single-"));
    }

    #[tokio::test]
    async fn test_unconfigured_source_uses_policy() {
        let config = UpstreamConfig::default();
        let source = create_source(&config).unwrap();
        assert!(source.fetch(now()).await.unwrap().is_empty());

        let err = UnconfiguredEmailSource.fetch(now()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::NotConfigured));
    }
}
