//! OpenAI-compatible HTTP embedding client.

use super::provider::EmbeddingProvider;
use super::types::{EmbeddingRequest, EmbeddingResponse};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;

/// HTTP client for an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct EmbeddingClient {
    http_client: reqwest::Client,
    model: String,
    base_url: String,
    api_key: String,
    dimensions: usize,
}

impl EmbeddingClient {
    pub fn builder() -> EmbeddingClientBuilder {
        EmbeddingClientBuilder::new()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn execute(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let endpoint = format!("{}/v1/embeddings", self.base_url);
        let response = self
            .http_client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                Error::embedding_with_context(
                    format!("Embedding request failed: {}", e),
                    ErrorContext::new().with_source("embeddings"),
                )
            })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            Error::embedding_with_context(
                format!("Failed to read response: {}", e),
                ErrorContext::new().with_source("embeddings"),
            )
        })?;
        if !status.is_success() {
            return Err(Error::embedding(format!(
                "Embedding API error ({}): {}",
                status, body
            )));
        }
        let json: serde_json::Value = serde_json::from_str(&body)?;
        EmbeddingResponse::from_openai_format(&json)
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request =
            EmbeddingRequest::new(&self.model, text).with_dimensions(self.dimensions);
        let response = self.execute(request).await?;
        response
            .first()
            .map(|e| e.vector.clone())
            .ok_or_else(|| Error::embedding("Embeddings response contained no vectors"))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

pub struct EmbeddingClientBuilder {
    model: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    dimensions: Option<usize>,
    timeout_secs: u64,
}

impl EmbeddingClientBuilder {
    pub fn new() -> Self {
        Self {
            model: None,
            api_key: None,
            base_url: None,
            dimensions: None,
            timeout_secs: 60,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<EmbeddingClient> {
        let model = self
            .model
            .ok_or_else(|| Error::configuration("Embedding model must be specified"))?;
        let api_key = self
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_default();
        let base_url = self
            .base_url
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        // Default matches text-embedding-3-small.
        let dimensions = self.dimensions.unwrap_or(1536);
        if dimensions == 0 {
            return Err(Error::configuration_with_context(
                "Embedding dimensions must be greater than zero",
                ErrorContext::new().with_field_path("dimensions"),
            ));
        }
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {}", e)))?;
        Ok(EmbeddingClient {
            http_client,
            model,
            base_url,
            api_key,
            dimensions,
        })
    }
}

impl Default for EmbeddingClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embed_parses_openai_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "object": "list",
                    "data": [{"object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3]}],
                    "model": "text-embedding-3-small",
                    "usage": {"prompt_tokens": 3, "total_tokens": 3}
                }"#,
            )
            .create_async()
            .await;

        let client = EmbeddingClient::builder()
            .model("text-embedding-3-small")
            .api_key("test-key")
            .base_url(server.url())
            .dimensions(3)
            .build()
            .unwrap();

        let vector = client.embed("hello").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_embed_api_error_propagates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(500)
            .with_body("upstream down")
            .create_async()
            .await;

        let client = EmbeddingClient::builder()
            .model("text-embedding-3-small")
            .api_key("test-key")
            .base_url(server.url())
            .build()
            .unwrap();

        let err = client.embed("hello").await.unwrap_err();
        assert!(matches!(err, crate::Error::Embedding { .. }));
    }

    #[test]
    fn test_builder_requires_model() {
        assert!(EmbeddingClient::builder().build().is_err());
    }

    #[test]
    fn test_builder_rejects_zero_dimensions() {
        let result = EmbeddingClient::builder()
            .model("text-embedding-3-small")
            .dimensions(0)
            .build();
        assert!(result.is_err());
    }
}
