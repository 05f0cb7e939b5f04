//! In-memory vector store.
//!
//! Brute-force cosine scoring over a sorted keyspace. Used by the crate's own
//! tests and suitable for embedded or test deployments. Scan cursors are
//! ordered-key positions, so keys deleted between pages do not break an
//! in-flight scan.

use super::{IndexSchema, ScanPage, ScoredDocument, StoredDocument, VectorStore, SCAN_CURSOR_START};
use crate::embeddings::cosine_similarity;
use crate::query::{Filter, KnnQuery};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

const DEFAULT_SCAN_PAGE_SIZE: usize = 64;

#[derive(Clone)]
struct StoredEntry {
    fields: serde_json::Value,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

#[derive(Default)]
struct Inner {
    documents: BTreeMap<String, StoredEntry>,
    indexes: HashMap<String, IndexSchema>,
}

pub struct InMemoryVectorStore {
    inner: Arc<RwLock<Inner>>,
    scan_page_size: usize,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
        }
    }

    /// Keys examined per scan page. Small values force multi-page scans.
    pub fn with_scan_page_size(mut self, page_size: usize) -> Self {
        self.scan_page_size = page_size.max(1);
        self
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn index_exists(&self, name: &str) -> Result<bool> {
        Ok(self.lock_read().indexes.contains_key(name))
    }

    async fn create_index(&self, name: &str, schema: &IndexSchema) -> Result<()> {
        let mut inner = self.lock_write();
        if inner.indexes.contains_key(name) {
            return Err(Error::store(format!("Index already exists: {}", name)));
        }
        inner.indexes.insert(name.to_string(), schema.clone());
        Ok(())
    }

    async fn put_document(&self, key: &str, document: &serde_json::Value) -> Result<()> {
        self.lock_write().documents.insert(
            key.to_string(),
            StoredEntry {
                fields: document.clone(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<()> {
        if let Some(entry) = self.lock_write().documents.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<usize> {
        let mut inner = self.lock_write();
        let mut deleted = 0;
        for key in keys {
            if let Some(entry) = inner.documents.remove(key) {
                if !entry.is_expired() {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    async fn scan(&self, cursor: &str, pattern: &str) -> Result<ScanPage> {
        let after = match cursor {
            SCAN_CURSOR_START => None,
            other => Some(
                other
                    .strip_prefix("after:")
                    .ok_or_else(|| Error::store(format!("Invalid scan cursor: {}", other)))?
                    .to_string(),
            ),
        };

        let inner = self.lock_read();
        let range = match &after {
            Some(key) => inner
                .documents
                .range::<String, _>((std::ops::Bound::Excluded(key.clone()), std::ops::Bound::Unbounded)),
            None => inner.documents.range::<String, _>(..),
        };

        // Examine a bounded window of the keyspace per page, like a real
        // cursor scan: a page may match zero keys without being terminal.
        let mut examined = 0;
        let mut last_examined = None;
        let mut keys = Vec::new();
        for (key, entry) in range {
            if examined >= self.scan_page_size {
                break;
            }
            examined += 1;
            last_examined = Some(key.clone());
            if !entry.is_expired() && pattern_matches(pattern, key) {
                keys.push(key.clone());
            }
        }

        let cursor = if examined < self.scan_page_size {
            SCAN_CURSOR_START.to_string()
        } else {
            match last_examined {
                Some(key) => format!("after:{}", key),
                None => SCAN_CURSOR_START.to_string(),
            }
        };
        Ok(ScanPage { cursor, keys })
    }

    async fn search(&self, index: &str, query: &KnnQuery) -> Result<Vec<ScoredDocument>> {
        let inner = self.lock_read();
        let schema = inner
            .indexes
            .get(index)
            .ok_or_else(|| Error::store(format!("Unknown index: {}", index)))?;

        let mut hits: Vec<ScoredDocument> = inner
            .documents
            .iter()
            .filter(|(key, entry)| key.starts_with(&schema.key_prefix) && !entry.is_expired())
            .filter(|(_, entry)| passes_filter(&entry.fields, query.filter.as_ref()))
            .filter_map(|(key, entry)| {
                let vector = extract_vector(&entry.fields, &query.vector_field)?;
                let score = cosine_similarity(&query.vector, &vector).ok()?;
                Some(ScoredDocument {
                    key: key.clone(),
                    score,
                    fields: entry.fields.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn query(
        &self,
        index: &str,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<StoredDocument>> {
        let inner = self.lock_read();
        let schema = inner
            .indexes
            .get(index)
            .ok_or_else(|| Error::store(format!("Unknown index: {}", index)))?;

        Ok(inner
            .documents
            .iter()
            .filter(|(key, entry)| key.starts_with(&schema.key_prefix) && !entry.is_expired())
            .filter(|(_, entry)| passes_filter(&entry.fields, filter))
            .take(limit)
            .map(|(key, entry)| StoredDocument {
                key: key.clone(),
                fields: entry.fields.clone(),
            })
            .collect())
    }
}

fn passes_filter(fields: &serde_json::Value, filter: Option<&Filter>) -> bool {
    match filter {
        None => true,
        Some(Filter::Tag { field, value }) => {
            fields.get(field).and_then(|v| v.as_str()) == Some(value.as_str())
        }
    }
}

fn extract_vector(fields: &serde_json::Value, vector_field: &str) -> Option<Vec<f32>> {
    fields.get(vector_field)?.as_array().map(|arr| {
        arr.iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect()
    })
}

/// Glob match supporting `*` wildcards, the subset Redis MATCH uses for this
/// key space.
fn pattern_matches(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }
    let mut remainder = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match remainder.strip_prefix(part) {
                Some(rest) => remainder = rest,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return remainder.ends_with(part);
        } else {
            match remainder.find(part) {
                Some(pos) => remainder = &remainder[pos + part.len()..],
                None => return false,
            }
        }
    }
    // Pattern ends with '*', any remainder is fine.
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{purge_matching, VectorFieldSpec};
    use serde_json::json;

    fn schema(prefix: &str, dimensions: usize) -> IndexSchema {
        IndexSchema {
            key_prefix: format!("{}:", prefix),
            text_fields: vec!["prompt".into()],
            tag_fields: vec!["scope".into()],
            vector: VectorFieldSpec {
                field: "vector".into(),
                dimensions,
            },
        }
    }

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("sc:*", "sc:gpt:abc"));
        assert!(pattern_matches("sr:weather:*", "sr:weather:abc"));
        assert!(!pattern_matches("sr:weather:*", "sr:sports:abc"));
        assert!(pattern_matches("exact", "exact"));
        assert!(!pattern_matches("exact", "exactly"));
    }

    #[tokio::test]
    async fn test_create_index_twice_fails() {
        let store = InMemoryVectorStore::new();
        store.create_index("idx", &schema("sc", 2)).await.unwrap();
        assert!(store.index_exists("idx").await.unwrap());
        assert!(store.create_index("idx", &schema("sc", 2)).await.is_err());
    }

    #[tokio::test]
    async fn test_search_on_missing_index_fails() {
        let store = InMemoryVectorStore::new();
        let result = store.search("nope", &KnnQuery::new(vec![1.0], 5)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_search_ranks_by_cosine_and_honors_filter() {
        let store = InMemoryVectorStore::new();
        store.create_index("idx", &schema("sc", 2)).await.unwrap();
        store
            .put_document("sc:a:1", &json!({"scope": "a", "vector": [1.0, 0.0]}))
            .await
            .unwrap();
        store
            .put_document("sc:a:2", &json!({"scope": "a", "vector": [0.6, 0.8]}))
            .await
            .unwrap();
        store
            .put_document("sc:b:1", &json!({"scope": "b", "vector": [1.0, 0.0]}))
            .await
            .unwrap();

        let query = KnnQuery::new(vec![1.0, 0.0], 5).with_filter(Filter::tag("scope", "a"));
        let hits = store.search("idx", &query).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].key, "sc:a:1");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_ttl_expiry_hides_documents() {
        let store = InMemoryVectorStore::new();
        store.create_index("idx", &schema("sc", 2)).await.unwrap();
        store
            .put_document("sc:a:1", &json!({"scope": "a", "vector": [1.0, 0.0]}))
            .await
            .unwrap();
        store
            .set_ttl("sc:a:1", Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let hits = store
            .search("idx", &KnnQuery::new(vec![1.0, 0.0], 5))
            .await
            .unwrap();
        assert!(hits.is_empty());

        let page = store.scan(SCAN_CURSOR_START, "sc:*").await.unwrap();
        assert!(page.keys.is_empty());
    }

    #[tokio::test]
    async fn test_scan_resumes_across_pages() {
        let store = InMemoryVectorStore::new().with_scan_page_size(2);
        for i in 0..5 {
            store
                .put_document(&format!("sc:a:{}", i), &json!({"i": i}))
                .await
                .unwrap();
        }

        let mut cursor = SCAN_CURSOR_START.to_string();
        let mut collected = Vec::new();
        let mut pages = 0;
        loop {
            let page = store.scan(&cursor, "sc:*").await.unwrap();
            collected.extend(page.keys.clone());
            pages += 1;
            if page.is_complete() {
                break;
            }
            cursor = page.cursor;
        }
        assert!(pages > 1);
        assert_eq!(collected.len(), 5);
    }

    #[tokio::test]
    async fn test_scan_page_may_be_empty_mid_scan() {
        let store = InMemoryVectorStore::new().with_scan_page_size(2);
        // First window of the keyspace matches nothing; the match is later.
        store.put_document("aa:1", &json!({})).await.unwrap();
        store.put_document("ab:2", &json!({})).await.unwrap();
        store.put_document("zz:3", &json!({})).await.unwrap();

        let first = store.scan(SCAN_CURSOR_START, "zz:*").await.unwrap();
        assert!(first.keys.is_empty());
        assert!(!first.is_complete());

        let second = store.scan(&first.cursor, "zz:*").await.unwrap();
        assert_eq!(second.keys, vec!["zz:3".to_string()]);
    }

    #[tokio::test]
    async fn test_purge_matching_deletes_across_pages() {
        let store = InMemoryVectorStore::new().with_scan_page_size(2);
        for i in 0..7 {
            store
                .put_document(&format!("sr:weather:{}", i), &json!({"i": i}))
                .await
                .unwrap();
        }
        store.put_document("sr:sports:0", &json!({})).await.unwrap();

        let deleted = purge_matching(&store, "sr:weather:*").await.unwrap();
        assert!(deleted);

        let page = store.scan(SCAN_CURSOR_START, "sr:weather:*").await.unwrap();
        assert!(page.keys.is_empty());
        // Unrelated keys survive.
        let page = store.scan(SCAN_CURSOR_START, "sr:sports:*").await.unwrap();
        assert_eq!(page.keys.len(), 1);

        // Nothing left to delete on the second pass.
        let deleted = purge_matching(&store, "sr:weather:*").await.unwrap();
        assert!(!deleted);
    }
}
