//! Lazy, best-effort vector index lifecycle management.
//!
//! Engine construction never touches the store: the index is ensured lazily
//! before searches and writes, so an unreachable store degrades reads to
//! empty results instead of failing construction. Readiness is exposed as a
//! flag rather than raised as an error on the read path.

use crate::store::{IndexSchema, VectorStore};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Idempotent "ensure the index is ready" gate, invoked before every search.
pub struct IndexLifecycle {
    name: String,
    schema: IndexSchema,
    ready: AtomicBool,
}

impl IndexLifecycle {
    pub fn new(name: impl Into<String>, schema: IndexSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            ready: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// Whether a previous `ensure_ready` confirmed the index.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Confirm the index exists, creating it if absent. Failures are logged
    /// and leave the lifecycle not ready; they never propagate. A missing
    /// index self-heals on a later call once the store is reachable.
    ///
    /// Concurrent callers may both observe the index as absent and race on
    /// creation; the loser's "index already exists" failure is benign and
    /// resolves on the next call.
    pub async fn ensure_ready(&self, store: &dyn VectorStore) -> bool {
        if self.ready.load(Ordering::Relaxed) {
            return true;
        }
        match store.index_exists(&self.name).await {
            Ok(true) => {
                self.ready.store(true, Ordering::Relaxed);
                true
            }
            Ok(false) => match store.create_index(&self.name, &self.schema).await {
                Ok(()) => {
                    debug!(index = %self.name, "created vector index");
                    self.ready.store(true, Ordering::Relaxed);
                    true
                }
                Err(e) => {
                    warn!(index = %self.name, error = %e, "failed to create vector index");
                    false
                }
            },
            Err(e) => {
                warn!(index = %self.name, error = %e, "failed to list vector indexes");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryVectorStore, VectorFieldSpec};

    fn schema() -> IndexSchema {
        IndexSchema {
            key_prefix: "sc:".into(),
            text_fields: vec!["prompt".into()],
            tag_fields: vec!["scope".into()],
            vector: VectorFieldSpec {
                field: "vector".into(),
                dimensions: 4,
            },
        }
    }

    #[tokio::test]
    async fn test_ensure_ready_creates_missing_index() {
        let store = InMemoryVectorStore::new();
        let lifecycle = IndexLifecycle::new("sc-index", schema());
        assert!(!lifecycle.is_ready());

        assert!(lifecycle.ensure_ready(&store).await);
        assert!(lifecycle.is_ready());
        assert!(store.index_exists("sc-index").await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_ready_is_idempotent() {
        let store = InMemoryVectorStore::new();
        let lifecycle = IndexLifecycle::new("sc-index", schema());
        assert!(lifecycle.ensure_ready(&store).await);
        // Second call takes the fast path and stays ready.
        assert!(lifecycle.ensure_ready(&store).await);
    }

    #[tokio::test]
    async fn test_ensure_ready_adopts_existing_index() {
        let store = InMemoryVectorStore::new();
        store.create_index("sc-index", &schema()).await.unwrap();

        let lifecycle = IndexLifecycle::new("sc-index", schema());
        assert!(lifecycle.ensure_ready(&store).await);
    }
}
