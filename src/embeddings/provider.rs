//! Embedding provider seam.

use crate::Result;
use async_trait::async_trait;

/// Produces a fixed-length float vector for a text input.
///
/// The output dimension is fixed per provider instance and drives the vector
/// field schema of the store index. Provider failures (network, model) are
/// propagated unchanged by the engines.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text into a vector of `dimensions()` floats.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Output dimension of this provider instance.
    fn dimensions(&self) -> usize;
}
