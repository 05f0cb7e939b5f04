//! Semantic cache for language-model responses.
//!
//! Retrieves a previously computed response when a semantically similar
//! prompt was seen before under the same scope. Entries are an insert-only
//! log of candidates: identical prompts coexist as separate entries, each
//! with its own time-salted key.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`SemanticCache`] | The cache engine |
//! | [`SemanticCacheConfig`] | Prefix, optional TTL, similarity threshold |

mod semantic;

pub use semantic::{SemanticCache, SemanticCacheConfig};
