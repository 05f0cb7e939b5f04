//! Redis vector store implementation.
//!
//! Documents are RedisJSON values indexed by a RediSearch vector index
//! (`FT.CREATE ... ON JSON`). k-NN queries use query dialect 2 with the
//! query vector passed as a `$BLOB` parameter of little-endian f32 bytes.

use super::{IndexSchema, ScanPage, ScoredDocument, StoredDocument, VectorStore};
use crate::query::{escape_tag, Filter, KnnQuery, SCORE_ALIAS};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

const SCAN_COUNT: usize = 100;

/// Redis-backed [`VectorStore`] using RedisJSON and RediSearch.
#[derive(Clone)]
pub struct RedisVectorStore {
    connection: ConnectionManager,
}

impl fmt::Debug for RedisVectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisVectorStore")
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisVectorStore {
    /// Connect to Redis, e.g. `redis://127.0.0.1:6379`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| store_err(format!("Failed to create Redis client: {}", e)))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| store_err(format!("Failed to connect to Redis: {}", e)))?;
        Ok(Self { connection })
    }
}

fn store_err(message: String) -> Error {
    Error::store_with_context(message, ErrorContext::new().with_source("redis"))
}

#[async_trait]
impl VectorStore for RedisVectorStore {
    async fn index_exists(&self, name: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let names: Vec<String> = redis::cmd("FT._LIST")
            .query_async(&mut conn)
            .await
            .map_err(|e| store_err(format!("Failed to list indexes: {}", e)))?;
        Ok(names.iter().any(|n| n == name))
    }

    async fn create_index(&self, name: &str, schema: &IndexSchema) -> Result<()> {
        let mut cmd = redis::cmd("FT.CREATE");
        cmd.arg(name)
            .arg("ON")
            .arg("JSON")
            .arg("PREFIX")
            .arg(1)
            .arg(&schema.key_prefix)
            .arg("SCHEMA");
        for field in &schema.text_fields {
            cmd.arg(format!("$.{}", field)).arg("AS").arg(field).arg("TEXT");
        }
        for field in &schema.tag_fields {
            cmd.arg(format!("$.{}", field)).arg("AS").arg(field).arg("TAG");
        }
        let vector = &schema.vector;
        cmd.arg(format!("$.{}", vector.field))
            .arg("AS")
            .arg(&vector.field)
            .arg("VECTOR")
            .arg("HNSW")
            .arg(6)
            .arg("TYPE")
            .arg("FLOAT32")
            .arg("DIM")
            .arg(vector.dimensions)
            .arg("DISTANCE_METRIC")
            .arg("COSINE");

        let mut conn = self.connection.clone();
        cmd.query_async::<()>(&mut conn)
            .await
            .map_err(|e| store_err(format!("Failed to create index '{}': {}", name, e)))
    }

    async fn put_document(&self, key: &str, document: &serde_json::Value) -> Result<()> {
        let payload = serde_json::to_string(document)?;
        let mut conn = self.connection.clone();
        redis::cmd("JSON.SET")
            .arg(key)
            .arg("$")
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| store_err(format!("Failed to write document '{}': {}", key, e)))
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| store_err(format!("Failed to set TTL for '{}': {}", key, e)))
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        let deleted: i64 = redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_err(format!("Failed to delete keys: {}", e)))?;
        Ok(deleted as usize)
    }

    async fn scan(&self, cursor: &str, pattern: &str) -> Result<ScanPage> {
        let cursor: u64 = cursor
            .parse()
            .map_err(|_| store_err(format!("Invalid scan cursor: {}", cursor)))?;
        let mut conn = self.connection.clone();
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_COUNT)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_err(format!("Failed to scan '{}': {}", pattern, e)))?;
        Ok(ScanPage {
            cursor: next_cursor.to_string(),
            keys,
        })
    }

    async fn search(&self, index: &str, query: &KnnQuery) -> Result<Vec<ScoredDocument>> {
        let mut conn = self.connection.clone();
        let reply: redis::Value = redis::cmd("FT.SEARCH")
            .arg(index)
            .arg(query.to_query_expression())
            .arg("PARAMS")
            .arg(2)
            .arg("BLOB")
            .arg(query.vector_blob())
            .arg("SORTBY")
            .arg(SCORE_ALIAS)
            .arg("DESC")
            .arg("RETURN")
            .arg(2)
            .arg(SCORE_ALIAS)
            .arg("$")
            .arg("LIMIT")
            .arg(0)
            .arg(query.limit)
            .arg("DIALECT")
            .arg(2)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_err(format!("Search against '{}' failed: {}", index, e)))?;

        let documents = parse_search_reply(reply)?;
        documents
            .into_iter()
            .map(|(key, props)| {
                let score = props
                    .get(SCORE_ALIAS)
                    .and_then(|s| s.parse::<f32>().ok())
                    .ok_or_else(|| store_err(format!("Missing score for document '{}'", key)))?;
                let fields = parse_root_json(&key, &props)?;
                Ok(ScoredDocument { key, score, fields })
            })
            .collect()
    }

    async fn query(
        &self,
        index: &str,
        filter: Option<&Filter>,
        limit: usize,
    ) -> Result<Vec<StoredDocument>> {
        let expression = match filter {
            Some(Filter::Tag { field, value }) => format!("@{}:{{{}}}", field, escape_tag(value)),
            None => "*".to_string(),
        };
        let mut conn = self.connection.clone();
        let reply: redis::Value = redis::cmd("FT.SEARCH")
            .arg(index)
            .arg(expression)
            .arg("RETURN")
            .arg(1)
            .arg("$")
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .arg("DIALECT")
            .arg(2)
            .query_async(&mut conn)
            .await
            .map_err(|e| store_err(format!("Query against '{}' failed: {}", index, e)))?;

        let documents = parse_search_reply(reply)?;
        documents
            .into_iter()
            .map(|(key, props)| {
                let fields = parse_root_json(&key, &props)?;
                Ok(StoredDocument { key, fields })
            })
            .collect()
    }
}

/// Parse an FT.SEARCH reply: `[total, key1, [prop, value, ...], key2, ...]`.
fn parse_search_reply(reply: redis::Value) -> Result<Vec<(String, HashMap<String, String>)>> {
    let items = match reply {
        redis::Value::Array(items) => items,
        other => {
            return Err(store_err(format!(
                "Unexpected search reply shape: {:?}",
                other
            )))
        }
    };
    let mut results = Vec::new();
    let mut iter = items.into_iter();
    // First element is the total hit count.
    let _total = iter.next();
    while let Some(key_value) = iter.next() {
        let key = value_as_string(&key_value)
            .ok_or_else(|| store_err("Search reply key is not a string".to_string()))?;
        let props = match iter.next() {
            Some(redis::Value::Array(pairs)) => property_pairs(pairs),
            Some(other) => {
                return Err(store_err(format!(
                    "Unexpected properties shape for '{}': {:?}",
                    key, other
                )))
            }
            None => HashMap::new(),
        };
        results.push((key, props));
    }
    Ok(results)
}

fn property_pairs(pairs: Vec<redis::Value>) -> HashMap<String, String> {
    let mut props = HashMap::new();
    let mut iter = pairs.into_iter();
    while let (Some(name), Some(value)) = (iter.next(), iter.next()) {
        if let (Some(name), Some(value)) = (value_as_string(&name), value_as_string(&value)) {
            props.insert(name, value);
        }
    }
    props
}

fn parse_root_json(key: &str, props: &HashMap<String, String>) -> Result<serde_json::Value> {
    let raw = props
        .get("$")
        .ok_or_else(|| store_err(format!("Missing JSON payload for document '{}'", key)))?;
    serde_json::from_str(raw).map_err(Error::from)
}

fn value_as_string(value: &redis::Value) -> Option<String> {
    match value {
        redis::Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        redis::Value::SimpleString(s) => Some(s.clone()),
        redis::Value::Int(i) => Some(i.to_string()),
        redis::Value::Double(d) => Some(d.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> redis::Value {
        redis::Value::BulkString(s.as_bytes().to_vec())
    }

    #[test]
    fn test_parse_search_reply_with_scores() {
        let reply = redis::Value::Array(vec![
            redis::Value::Int(2),
            bulk("sc:a:1"),
            redis::Value::Array(vec![
                bulk("score"),
                bulk("0.91"),
                bulk("$"),
                bulk(r#"{"prompt":"hi","scope":"a"}"#),
            ]),
            bulk("sc:a:2"),
            redis::Value::Array(vec![
                bulk("score"),
                bulk("0.42"),
                bulk("$"),
                bulk(r#"{"prompt":"yo","scope":"a"}"#),
            ]),
        ]);

        let documents = parse_search_reply(reply).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].0, "sc:a:1");
        assert_eq!(documents[0].1.get("score").unwrap(), "0.91");
        let fields = parse_root_json("sc:a:1", &documents[0].1).unwrap();
        assert_eq!(fields["scope"], "a");
    }

    #[test]
    fn test_parse_search_reply_empty() {
        let reply = redis::Value::Array(vec![redis::Value::Int(0)]);
        assert!(parse_search_reply(reply).unwrap().is_empty());
    }

    #[test]
    fn test_parse_search_reply_rejects_non_array() {
        assert!(parse_search_reply(redis::Value::Int(3)).is_err());
    }
}
