//! Vector store abstraction and implementations.
//!
//! The engines drive the store exclusively through [`VectorStore`]:
//! index lifecycle, JSON document writes with optional TTL, cursor-paginated
//! key scans, and k-NN search returning similarity-ranked documents.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`VectorStore`] | Trait the engines depend on |
//! | [`RedisVectorStore`] | Redis implementation (RedisJSON + RediSearch) |
//! | [`InMemoryVectorStore`] | Brute-force reference implementation for tests and embedded use |
//! | [`purge_matching`] | Prefix-scoped bulk delete over a cursor-paginated scan |

mod memory;
mod redis;

pub use memory::InMemoryVectorStore;
pub use redis::RedisVectorStore;

use crate::query::KnnQuery;
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Cursor value that both starts a scan and signals its completion.
pub const SCAN_CURSOR_START: &str = "0";

/// One page of a cursor-paginated key scan. A page may be empty mid-scan;
/// only the cursor decides termination.
#[derive(Debug, Clone)]
pub struct ScanPage {
    pub cursor: String,
    pub keys: Vec<String>,
}

impl ScanPage {
    pub fn is_complete(&self) -> bool {
        self.cursor == SCAN_CURSOR_START
    }
}

/// A stored document without score, as returned by non-vector listings.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub key: String,
    pub fields: serde_json::Value,
}

/// A search hit: document fields plus its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub key: String,
    pub score: f32,
    pub fields: serde_json::Value,
}

/// Vector field declaration. Metric is cosine, element type 32-bit float.
#[derive(Debug, Clone)]
pub struct VectorFieldSpec {
    pub field: String,
    pub dimensions: usize,
}

/// Schema for a vector index scoped to one key prefix.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    /// Only documents whose key starts with this prefix are indexed.
    pub key_prefix: String,
    /// Full-text fields.
    pub text_fields: Vec<String>,
    /// Exact-match filterable fields.
    pub tag_fields: Vec<String>,
    pub vector: VectorFieldSpec,
}

/// Persists JSON documents with a vector field and executes k-NN queries.
///
/// Individual document writes and deletes are applied atomically by the
/// store; no multi-document transaction is assumed. Retry policy, if any,
/// belongs to implementations, not to the engines.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn index_exists(&self, name: &str) -> Result<bool>;

    /// Create a vector index. Fails if an index with this name already exists.
    async fn create_index(&self, name: &str, schema: &IndexSchema) -> Result<()>;

    async fn put_document(&self, key: &str, document: &serde_json::Value) -> Result<()>;

    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Delete the given keys, returning how many existed.
    async fn delete_keys(&self, keys: &[String]) -> Result<usize>;

    /// One step of a cursor-paginated key scan. Pass [`SCAN_CURSOR_START`] to
    /// begin; a returned cursor of [`SCAN_CURSOR_START`] ends the cycle.
    async fn scan(&self, cursor: &str, pattern: &str) -> Result<ScanPage>;

    /// k-NN search, ranked descending by cosine-similarity score.
    async fn search(&self, index: &str, query: &KnnQuery) -> Result<Vec<ScoredDocument>>;

    /// Non-vector listing with an optional exact-match filter.
    async fn query(
        &self,
        index: &str,
        filter: Option<&crate::query::Filter>,
        limit: usize,
    ) -> Result<Vec<StoredDocument>>;
}

/// Delete every key matching `pattern`, reporting whether anything was
/// deleted.
///
/// Explicit {cursor, deleted-anything} state machine: each round trip scans
/// one page and deletes its batch; the single exit condition is the store's
/// terminal cursor. An empty batch mid-scan does not terminate the loop.
pub async fn purge_matching(store: &dyn VectorStore, pattern: &str) -> Result<bool> {
    let mut cursor = SCAN_CURSOR_START.to_string();
    let mut deleted_any = false;
    loop {
        let page = store.scan(&cursor, pattern).await?;
        if !page.keys.is_empty() {
            deleted_any |= store.delete_keys(&page.keys).await? > 0;
        }
        if page.is_complete() {
            break;
        }
        cursor = page.cursor;
    }
    Ok(deleted_any)
}
