//! HTTP metric source.

use async_trait::async_trait;
use habit_core::{DateRange, Error, MetricFetchError, MetricKind, MetricSource, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::ProviderConfig;

/// Provider response body.
#[derive(Debug, Deserialize)]
struct MetricResponse {
    value: f64,
}

/// Fetches metrics from the provider over HTTP.
///
/// `GET {base_url}/v1/metrics/{name}?start=..&end=..` with RFC 3339 bounds,
/// answered by `{"value": <number>}`.
#[derive(Clone)]
pub struct HttpMetricSource {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpMetricSource {
    /// Creates a new provider client.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn metric_url(&self, metric: MetricKind) -> String {
        format!(
            "{}/v1/metrics/{}",
            self.config.base_url.trim_end_matches('/'),
            metric.name()
        )
    }
}

#[async_trait]
impl MetricSource for HttpMetricSource {
    async fn fetch(&self, metric: MetricKind, range: DateRange) -> std::result::Result<f64, MetricFetchError> {
        let mut request = self.client.get(self.metric_url(metric)).query(&[
            ("start", range.start().to_rfc3339()),
            ("end", range.end().to_rfc3339()),
        ]);

        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MetricFetchError::new(metric, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetricFetchError::new(
                metric,
                format!("provider returned {status}"),
            ));
        }

        let body: MetricResponse = response
            .json()
            .await
            .map_err(|e| MetricFetchError::new(metric, format!("invalid response body: {e}")))?;

        if !body.value.is_finite() || body.value < 0.0 {
            return Err(MetricFetchError::new(
                metric,
                format!("provider returned out-of-range value {}", body.value),
            ));
        }

        debug!(metric = %metric, value = body.value, "Provider returned metric");
        Ok(body.value)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
