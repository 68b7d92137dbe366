//! Remote analysis engine client.
//!
//! Defines the [`RemoteAnalysisClient`] trait (the wire contract the
//! orchestrator and the quiz pass-through consume) and its HTTP
//! implementation [`HttpEngineClient`].
//!
//! # Wire Contract
//!
//! | Method | Path | Body | Success response |
//! |--------|------|------|------------------|
//! | `POST` | `/analyze` | multipart, one `file` field | `{summary, keywords[], sentiment, fullText}` |
//! | `POST` | `/generate-quiz` | JSON `{text}` | `{questions: [{question, answer}]}` |
//!
//! Every call carries the inbound request's correlation id in the
//! `X-Request-ID` header.
//!
//! # Failure Classification
//!
//! - transport failure, timeout, or cancellation → [`EngineError::Unavailable`]
//! - any non-2xx status → [`EngineError::BadStatus`]
//! - 2xx with an undecodable body → [`EngineError::Decode`]
//!
//! There is no retry: a failed call is terminal for the file that made it.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use doclens_core::error::EngineError;
use doclens_core::models::{AnalysisData, QuizResponse};

use crate::config::EngineConfig;

/// Header carrying the correlation id on inbound and outbound requests.
pub const CORRELATION_ID_HEADER: &str = "X-Request-ID";

/// Operations offered by the remote analysis engine.
///
/// Implementations are shared by every request for the life of the
/// process, so they must be `Send + Sync` and must not need `&mut self`.
#[async_trait]
pub trait RemoteAnalysisClient: Send + Sync {
    /// Analyze one file's raw bytes.
    async fn analyze(
        &self,
        content: Vec<u8>,
        file_name: &str,
        correlation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<AnalysisData, EngineError>;

    /// Generate quiz questions from a text blob.
    async fn generate_quiz(
        &self,
        text: &str,
        correlation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<QuizResponse, EngineError>;
}

/// HTTP implementation of [`RemoteAnalysisClient`].
///
/// Built once at startup; the inner `reqwest::Client` pools connections
/// and is safe to share across tasks.
pub struct HttpEngineClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpEngineClient {
    /// Build a client for `config.base_url` with `config.timeout_secs` as the
    /// per-call timeout.
    pub fn new(config: &EngineConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send `request` and decode a success body, honoring `cancel` while
    /// waiting for both the response head and the body.
    async fn execute<T: DeserializeOwned>(
        &self,
        mut request: reqwest::RequestBuilder,
        correlation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<T, EngineError> {
        if !correlation_id.is_empty() {
            request = request.header(CORRELATION_ID_HEADER, correlation_id);
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(EngineError::Unavailable("request cancelled".to_string()));
            }
            result = request.send() => {
                result.map_err(|e| EngineError::Unavailable(e.to_string()))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::BadStatus {
                status: status.as_u16(),
            });
        }

        let body = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(EngineError::Unavailable("request cancelled".to_string()));
            }
            result = response.bytes() => {
                result.map_err(|e| EngineError::Unavailable(e.to_string()))?
            }
        };

        serde_json::from_slice(&body).map_err(|e| EngineError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RemoteAnalysisClient for HttpEngineClient {
    async fn analyze(
        &self,
        content: Vec<u8>,
        file_name: &str,
        correlation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<AnalysisData, EngineError> {
        let part = reqwest::multipart::Part::bytes(content).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let request = self.client.post(self.url("/analyze")).multipart(form);
        self.execute(request, correlation_id, cancel).await
    }

    async fn generate_quiz(
        &self,
        text: &str,
        correlation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<QuizResponse, EngineError> {
        let request = self
            .client
            .post(self.url("/generate-quiz"))
            .json(&serde_json::json!({ "text": text }));
        self.execute(request, correlation_id, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = EngineConfig {
            base_url: "http://engine:8000/".to_string(),
            timeout_secs: 5,
        };
        let client = HttpEngineClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://engine:8000");
        assert_eq!(client.url("/analyze"), "http://engine:8000/analyze");
    }
}
