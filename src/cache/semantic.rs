//! Semantic cache engine.

use crate::index::IndexLifecycle;
use crate::naming::{prefix_problem, KeySpace};
use crate::query::{best_match, Filter, KnnQuery};
use crate::store::{purge_matching, IndexSchema, VectorFieldSpec, VectorStore};
use crate::{EmbeddingProvider, Error, ErrorContext, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const PROMPT_FIELD: &str = "prompt";
const SCOPE_FIELD: &str = "scope";
const RESPONSE_FIELD: &str = "response";
const VECTOR_FIELD: &str = "vector";

/// Candidates fetched per lookup; only the best is ever returned.
const LOOKUP_LIMIT: usize = 5;

/// Configuration for [`SemanticCache`].
#[derive(Debug, Clone)]
pub struct SemanticCacheConfig {
    /// Prefix for every key this cache stores.
    pub key_prefix: String,
    /// Entry time-to-live. `None` means entries persist until [`SemanticCache::clear`].
    pub ttl: Option<Duration>,
    /// Minimum similarity score for a lookup hit. Lower bound, not a distance.
    pub similarity_threshold: f32,
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: "semantic-cache".to_string(),
            ttl: None,
            similarity_threshold: 0.2,
        }
    }
}

impl SemanticCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(problem) = prefix_problem(&self.key_prefix) {
            problems.push(problem);
        }
        if !self.similarity_threshold.is_finite()
            || !(-1.0..=1.0).contains(&self.similarity_threshold)
        {
            problems.push("similarity_threshold must be a finite value in [-1, 1]".to_string());
        }
        if let Some(ttl) = self.ttl {
            if ttl.is_zero() {
                problems.push("ttl must be greater than zero when set".to_string());
            }
        }
        problems
    }
}

/// Semantic cache over a vector store.
///
/// Construction validates the configuration but never touches the store; the
/// vector index is ensured lazily before searches and writes.
pub struct SemanticCache {
    store: Arc<dyn VectorStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    keys: KeySpace,
    index: IndexLifecycle,
    config: SemanticCacheConfig,
}

impl std::fmt::Debug for SemanticCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticCache")
            .field("store", &"<dyn VectorStore>")
            .field("embeddings", &"<dyn EmbeddingProvider>")
            .field("config", &self.config)
            .finish()
    }
}

impl SemanticCache {
    /// Fails fast with the enumerated configuration problems, if any.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        config: SemanticCacheConfig,
    ) -> Result<Self> {
        let problems = config.problems();
        if !problems.is_empty() {
            return Err(Error::configuration_with_context(
                problems.join("; "),
                ErrorContext::new().with_source("semantic_cache"),
            ));
        }
        let keys = KeySpace::new(&config.key_prefix);
        let schema = IndexSchema {
            key_prefix: keys.schema_prefix(),
            text_fields: vec![PROMPT_FIELD.to_string(), RESPONSE_FIELD.to_string()],
            tag_fields: vec![SCOPE_FIELD.to_string()],
            vector: VectorFieldSpec {
                field: VECTOR_FIELD.to_string(),
                dimensions: embeddings.dimensions(),
            },
        };
        let index = IndexLifecycle::new(keys.index_name(), schema);
        Ok(Self {
            store,
            embeddings,
            keys,
            index,
            config,
        })
    }

    /// Look up a cached response for a semantically similar prompt under the
    /// given scope.
    ///
    /// Only the single best-scoring candidate is considered; it must meet the
    /// configured similarity threshold. Search failures (e.g. a missing
    /// index) degrade to a miss rather than an error.
    pub async fn lookup<T: DeserializeOwned>(
        &self,
        prompt: &str,
        scope: &str,
    ) -> Result<Option<T>> {
        validate_non_empty(prompt, "prompt")?;
        validate_non_empty(scope, "scope")?;

        let vector = self.embeddings.embed(prompt).await?;
        self.index.ensure_ready(self.store.as_ref()).await;

        let query = KnnQuery::new(vector, LOOKUP_LIMIT)
            .with_vector_field(VECTOR_FIELD)
            .with_filter(Filter::tag(SCOPE_FIELD, scope));
        let documents = match self.store.search(self.index.name(), &query).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!(error = %e, "cache lookup search failed; treating as miss");
                return Ok(None);
            }
        };

        let Some(best) = best_match(&documents, self.config.similarity_threshold) else {
            return Ok(None);
        };
        debug!(key = %best.key, score = best.score, "semantic cache hit");

        let raw = best
            .fields
            .get(RESPONSE_FIELD)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                Error::cache_with_context(
                    "Cached entry is missing its response payload",
                    ErrorContext::new().with_field_path(RESPONSE_FIELD),
                )
            })?;
        let response = serde_json::from_str(raw).map_err(|e| {
            Error::cache(format!("Failed to deserialize cached response: {}", e))
        })?;
        Ok(Some(response))
    }

    /// Store a response under a fresh time-salted key. Re-inserting the same
    /// prompt never overwrites a prior entry; it adds another candidate.
    pub async fn update<T: Serialize>(&self, prompt: &str, scope: &str, response: &T) -> Result<()> {
        validate_non_empty(prompt, "prompt")?;
        validate_non_empty(scope, "scope")?;

        let vector = self.embeddings.embed(prompt).await?;
        let payload = serde_json::to_string(response)
            .map_err(|e| Error::cache(format!("Failed to serialize response: {}", e)))?;

        self.index.ensure_ready(self.store.as_ref()).await;

        let key = self.keys.cache_key(scope, prompt);
        let document = json!({
            PROMPT_FIELD: prompt,
            SCOPE_FIELD: scope,
            RESPONSE_FIELD: payload,
            VECTOR_FIELD: vector,
        });
        self.store
            .put_document(&key, &document)
            .await
            .map_err(|e| Error::cache(format!("Failed to store cache entry: {}", e)))?;

        if let Some(ttl) = self.config.ttl {
            self.store
                .set_ttl(&key, ttl)
                .await
                .map_err(|e| Error::cache(format!("Failed to set entry TTL: {}", e)))?;
        }
        Ok(())
    }

    /// Delete every entry under this cache's prefix, reporting whether
    /// anything was deleted.
    pub async fn clear(&self) -> Result<bool> {
        purge_matching(self.store.as_ref(), &self.keys.all_pattern()).await
    }
}

fn validate_non_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation_with_context(
            format!("{} must not be empty", field),
            ErrorContext::new().with_field_path(field),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SemanticCacheConfig::default();
        assert_eq!(config.key_prefix, "semantic-cache");
        assert_eq!(config.similarity_threshold, 0.2);
        assert!(config.ttl.is_none());
    }

    #[test]
    fn test_config_rejects_bad_prefix() {
        assert!(!SemanticCacheConfig::new().with_key_prefix("").problems().is_empty());
        assert!(!SemanticCacheConfig::new().with_key_prefix("a:b").problems().is_empty());
        assert!(!SemanticCacheConfig::new().with_key_prefix("a*").problems().is_empty());
    }

    #[test]
    fn test_config_rejects_bad_threshold() {
        assert!(!SemanticCacheConfig::new()
            .with_similarity_threshold(f32::NAN)
            .problems()
            .is_empty());
        assert!(!SemanticCacheConfig::new()
            .with_similarity_threshold(1.5)
            .problems()
            .is_empty());
        assert!(SemanticCacheConfig::new()
            .with_similarity_threshold(0.6)
            .problems()
            .is_empty());
    }

    #[test]
    fn test_config_enumerates_all_problems() {
        let problems = SemanticCacheConfig::new()
            .with_key_prefix("")
            .with_similarity_threshold(2.0)
            .problems();
        assert_eq!(problems.len(), 2);
    }
}
