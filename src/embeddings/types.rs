//! Embedding request/response types.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A single embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub index: usize,
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn new(index: usize, vector: Vec<f32>) -> Self {
        Self { index, vector }
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// Request body for an OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub input: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

impl EmbeddingRequest {
    pub fn new(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            input: text.into(),
            model: model.into(),
            dimensions: None,
        }
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

/// Parsed embeddings response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub embeddings: Vec<Embedding>,
    pub model: String,
}

impl EmbeddingResponse {
    pub fn first(&self) -> Option<&Embedding> {
        self.embeddings.first()
    }

    pub fn from_openai_format(data: &serde_json::Value) -> Result<Self> {
        let embeddings = data["data"]
            .as_array()
            .ok_or_else(|| Error::embedding("Missing 'data' array in embeddings response"))?
            .iter()
            .map(|item| {
                let index = item["index"].as_u64().unwrap_or(0) as usize;
                let vector: Vec<f32> = item["embedding"]
                    .as_array()
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| v.as_f64().map(|f| f as f32))
                            .collect()
                    })
                    .unwrap_or_default();
                Embedding::new(index, vector)
            })
            .collect();
        let model = data["model"].as_str().unwrap_or("unknown").to_string();
        Ok(Self { embeddings, model })
    }
}
