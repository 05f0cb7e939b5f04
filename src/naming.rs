//! Key derivation and index naming policy.
//!
//! Every stored document's key is `prefix:scopeOrRouteName:digest`. Cache
//! keys salt the digest with the current time so identical prompts never
//! collide: the cache is an insert-only log of candidates, not a map keyed
//! by prompt. Router reference keys carry no salt, so re-adding identical
//! reference text derives the same key.

use std::time::{SystemTime, UNIX_EPOCH};

/// Deterministic key and index naming for one engine's slice of the key space.
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Name of the vector index covering this key space.
    pub fn index_name(&self) -> String {
        format!("{}-index", self.prefix)
    }

    /// Key prefix declared on the index schema. Only documents whose key
    /// starts with this prefix are indexed.
    pub fn schema_prefix(&self) -> String {
        format!("{}:", self.prefix)
    }

    /// Time-salted cache entry key: unique per (prompt, scope, insertion time).
    pub fn cache_key(&self, scope: &str, prompt: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let digest = digest_hex(&format!("{prompt}{scope}{nanos}"));
        format!("{}:{}:{}", self.prefix, scope, digest)
    }

    /// Stable route reference key: identical reference text derives the same key.
    pub fn reference_key(&self, route_name: &str, reference: &str) -> String {
        format!("{}:{}:{}", self.prefix, route_name, digest_hex(reference))
    }

    /// Scan pattern covering every key under this prefix.
    pub fn all_pattern(&self) -> String {
        format!("{}:*", self.prefix)
    }

    /// Scan pattern covering one scope's or route's keys.
    pub fn member_pattern(&self, name: &str) -> String {
        format!("{}:{}:*", self.prefix, name)
    }
}

/// Fixed-length lowercase hex digest of a fast hash. Not used for anything
/// cryptographic; collision risk is accepted.
fn digest_hex(input: &str) -> String {
    blake3::hash(input.as_bytes()).to_hex().to_string()
}

/// Key prefixes become scan patterns and key segments, so separator and
/// wildcard characters are rejected at configuration time.
pub(crate) fn prefix_problem(prefix: &str) -> Option<String> {
    if prefix.is_empty() {
        return Some("key_prefix must not be empty".to_string());
    }
    if prefix.contains(':') || prefix.contains('*') {
        return Some("key_prefix must not contain ':' or '*'".to_string());
    }
    None
}
