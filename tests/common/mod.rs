//! Shared test fixtures: a deterministic embedding stub with hand-crafted
//! vectors so similarity relationships are exact and controllable.

#![allow(dead_code)]

use async_trait::async_trait;
use semantic_redis::{EmbeddingProvider, Error, Result};
use std::collections::HashMap;

pub struct StubEmbeddings {
    dimensions: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl StubEmbeddings {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: HashMap::new(),
        }
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimensions, "stub vector dimension");
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| Error::embedding(format!("no stub vector for '{}'", text)))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
