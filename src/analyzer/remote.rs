//! HTTP client for the remote text-analysis collaborator.

use async_trait::async_trait;
use serde::Serialize;

use super::TextAnalyzer;
use crate::error::StyleError;
use crate::features::FeatureVector;

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    samples: &'a [String],
}

/// Text analyzer backed by a remote HTTP service.
///
/// Sends `POST {base_url}/analyze` with `{"samples": [...]}` and expects a
/// [`FeatureVector`] JSON object back. Timeouts and retries belong to the
/// caller's `reqwest::Client` configuration; this client surfaces every
/// transport or decode failure as [`StyleError::Analyzer`].
pub struct HttpTextAnalyzer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTextAnalyzer {
    /// Create an analyzer client against `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Create an analyzer client with a preconfigured `reqwest::Client`
    /// (custom timeouts, proxies, ...).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl TextAnalyzer for HttpTextAnalyzer {
    async fn analyze(&self, samples: &[String]) -> Result<FeatureVector, StyleError> {
        let url = format!("{}/analyze", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&AnalyzeRequest { samples })
            .send()
            .await
            .map_err(|e| StyleError::Analyzer(e.into()))?;

        let response = response
            .error_for_status()
            .map_err(|e| StyleError::Analyzer(e.into()))?;

        response
            .json::<FeatureVector>()
            .await
            .map_err(|e| StyleError::Analyzer(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_analyzer_surfaces_analyzer_error() {
        // Nothing listens on this port; the request must fail fast as an
        // AnalyzerFailure rather than panic or hang.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(250))
            .build()
            .unwrap();
        let analyzer = HttpTextAnalyzer::with_client(client, "http://127.0.0.1:9");
        let err = analyzer
            .analyze(&["hello".to_string()])
            .await
            .expect_err("expected a transport failure");
        assert!(matches!(err, StyleError::Analyzer(_)));
    }
}
