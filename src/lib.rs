//! # semantic-redis
//!
//! Semantic cache and semantic router for LLM workloads, layered on top of a
//! vector-search-capable key/value store.
//!
//! ## Overview
//!
//! Both components are thin façades over the store's vector index and share
//! one similarity-indexed lookup protocol: embedding generation, lazy index
//! lifecycle management, score-threshold filtering, per-route aggregation,
//! and prefix-scoped bulk key-space cleanup.
//!
//! - **Semantic cache**: stores (prompt, scope) → response pairs and serves a
//!   previously computed response when a semantically similar prompt arrives
//!   under the same scope. Entries are an insert-only log of candidates, not
//!   a map keyed by prompt: identical prompts coexist as separate entries.
//! - **Semantic router**: stores named routes, each defined by reference
//!   utterances, a per-route similarity threshold, and metadata, and routes
//!   free text to the set of matching routes ranked by score.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use semantic_redis::{
//!     EmbeddingClient, RedisVectorStore, SemanticCache, SemanticCacheConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> semantic_redis::Result<()> {
//!     let store = Arc::new(RedisVectorStore::connect("redis://127.0.0.1:6379").await?);
//!     let embeddings = Arc::new(
//!         EmbeddingClient::builder()
//!             .model("text-embedding-3-small")
//!             .dimensions(1536)
//!             .build()?,
//!     );
//!
//!     let cache = SemanticCache::new(store, embeddings, SemanticCacheConfig::default())?;
//!     cache.update("Capital of France?", "gpt-4o", &"Paris".to_string()).await?;
//!     let hit: Option<String> = cache.lookup("What is France's capital?", "gpt-4o").await?;
//!     println!("{hit:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Semantic cache engine and configuration |
//! | [`router`] | Semantic router engine, routes, and match results |
//! | [`store`] | Vector store trait, in-memory and Redis implementations |
//! | [`query`] | k-NN query construction and result filtering |
//! | [`index`] | Lazy, best-effort vector index lifecycle management |
//! | [`naming`] | Key derivation and index naming policy |
//! | [`embeddings`] | Embedding provider trait and OpenAI-compatible client |
//!
//! ## Score semantics
//!
//! Scores are cosine similarity: higher means more similar, and thresholds
//! are lower bounds. A document qualifies when `score >= threshold`. Do not
//! confuse scores with distances.

pub mod cache;
pub mod embeddings;
pub mod index;
pub mod naming;
pub mod query;
pub mod router;
pub mod store;

// Re-export main types for convenience
pub use cache::{SemanticCache, SemanticCacheConfig};
pub use embeddings::{EmbeddingClient, EmbeddingClientBuilder, EmbeddingProvider};
pub use query::{Filter, KnnQuery};
pub use router::{Route, RouteMatch, RouterConfig, SemanticRouter};
pub use store::{
    InMemoryVectorStore, RedisVectorStore, ScanPage, ScoredDocument, StoredDocument, VectorStore,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
