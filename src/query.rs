//! k-NN query construction and result filtering.
//!
//! Scores are cosine similarity: higher = more similar, thresholds are lower
//! bounds. A document qualifies when `score >= threshold`.

use crate::store::ScoredDocument;

/// Exact-match filter clause, prepended to the k-NN expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Exact tag match on a scalar field, e.g. the cache's scope filter.
    Tag { field: String, value: String },
}

impl Filter {
    pub fn tag(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Tag {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A k-nearest-neighbor query against one vector index.
#[derive(Debug, Clone)]
pub struct KnnQuery {
    pub filter: Option<Filter>,
    pub vector: Vec<f32>,
    pub limit: usize,
    pub vector_field: String,
}

/// Alias under which the similarity score is returned and sorted.
pub const SCORE_ALIAS: &str = "score";

impl KnnQuery {
    pub fn new(vector: Vec<f32>, limit: usize) -> Self {
        Self {
            filter: None,
            vector,
            limit,
            vector_field: "vector".to_string(),
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_vector_field(mut self, field: impl Into<String>) -> Self {
        self.vector_field = field.into();
        self
    }

    /// Render the RediSearch query expression. The caller supplies the query
    /// vector separately as the `$BLOB` parameter and requests dialect 2.
    pub fn to_query_expression(&self) -> String {
        let prelude = match &self.filter {
            Some(Filter::Tag { field, value }) => {
                format!("(@{}:{{{}}})", field, escape_tag(value))
            }
            None => "*".to_string(),
        };
        format!(
            "{}=>[KNN {} @{} $BLOB AS {}]",
            prelude, self.limit, self.vector_field, SCORE_ALIAS
        )
    }

    /// Query vector as little-endian f32 bytes for the `$BLOB` parameter.
    pub fn vector_blob(&self) -> Vec<u8> {
        self.vector
            .iter()
            .flat_map(|f| f.to_le_bytes())
            .collect()
    }
}

/// Escape characters RediSearch treats as tag syntax.
pub fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_alphanumeric() || c == '_' {
            escaped.push(c);
        } else {
            escaped.push('\\');
            escaped.push(c);
        }
    }
    escaped
}

/// Cache-level result rule: take only the single best-scoring document and
/// gate it on one global threshold. No aggregation across documents.
pub fn best_match(documents: &[ScoredDocument], threshold: f32) -> Option<&ScoredDocument> {
    let best = documents.first()?;
    if best.score >= threshold {
        Some(best)
    } else {
        None
    }
}
