//! HTTP webhook sink.
//!
//! POSTs every record as `{"kind": ..., "data": ...}` JSON to a single URL,
//! optionally with a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::instrument;

use quizcraft_core::certificate::Certificate;
use quizcraft_core::traits::{
    AnalyticsEvent, AnalyticsSink, CertificateSink, ResultEnvelope, ResultSink,
};

use crate::error::SinkError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Delivers results, certificates, and events to an HTTP endpoint.
pub struct WebhookSink {
    url: String,
    token: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl std::fmt::Debug for WebhookSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSink")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Serialize)]
struct Payload<'a, T> {
    kind: &'a str,
    data: &'a T,
}

impl WebhookSink {
    pub fn new(url: &str, token: Option<String>) -> Result<Self, SinkError> {
        Self::with_timeout(url, token, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(url: &str, token: Option<String>, timeout_secs: u64) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SinkError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.to_string(),
            token: token.filter(|t| !t.is_empty()),
            timeout_secs,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    #[instrument(skip(self, data), fields(url = %self.url))]
    async fn post<T: Serialize + Sync>(&self, kind: &str, data: &T) -> Result<(), SinkError> {
        let mut req = self
            .client
            .post(&self.url)
            .header("content-type", "application/json");
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        let response = req
            .json(&Payload { kind, data })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SinkError::Timeout(self.timeout_secs)
                } else {
                    SinkError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5)
                * 1000;
            return Err(SinkError::RateLimited {
                retry_after_ms: retry_after,
            });
        }
        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::AuthenticationFailed(body));
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Http {
                status,
                message: body,
            });
        }

        tracing::debug!(status, "webhook accepted {kind}");
        Ok(())
    }
}

#[async_trait]
impl ResultSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn record_result(&self, envelope: &ResultEnvelope) -> anyhow::Result<()> {
        Ok(self.post("result", envelope).await?)
    }
}

#[async_trait]
impl CertificateSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn record_certificate(&self, certificate: &Certificate) -> anyhow::Result<()> {
        Ok(self.post("certificate", certificate).await?)
    }
}

#[async_trait]
impl AnalyticsSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn track(&self, event: &AnalyticsEvent) -> anyhow::Result<()> {
        Ok(self.post(event.kind.as_str(), event).await?)
    }
}
