//! Embedding generation for the cache and router engines.
//!
//! This module provides:
//! - The [`EmbeddingProvider`] seam the engines depend on
//! - An OpenAI-compatible HTTP client implementation
//! - Vector operations used by the in-memory store

mod client;
mod provider;
mod types;
mod vectors;

pub use client::{EmbeddingClient, EmbeddingClientBuilder};
pub use provider::EmbeddingProvider;
pub use types::{Embedding, EmbeddingRequest, EmbeddingResponse};
pub use vectors::{cosine_similarity, dot_product, magnitude, normalize_vector};
