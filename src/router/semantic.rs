//! Semantic router engine.

use crate::index::IndexLifecycle;
use crate::naming::{prefix_problem, KeySpace};
use crate::query::{Filter, KnnQuery};
use crate::store::{purge_matching, IndexSchema, ScoredDocument, VectorFieldSpec, VectorStore};
use crate::{EmbeddingProvider, Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

const NAME_FIELD: &str = "name";
const REFERENCE_FIELD: &str = "reference";
const THRESHOLD_FIELD: &str = "threshold";
const METADATA_FIELD: &str = "metadata";
const VECTOR_FIELD: &str = "vector";

/// Upper bound when projecting route names across the whole index.
const LIST_LIMIT: usize = 10_000;
/// Upper bound when reassembling one route's reference documents.
const GET_LIMIT: usize = 1_000;

/// A named destination: reference utterances defining its semantic region
/// and a threshold defining its admission boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    pub references: Vec<String>,
    /// Minimum similarity score a query must reach to match this route.
    pub distance_threshold: f32,
    /// Replicated identically onto every reference document of the route.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Route {
    pub fn new(
        name: impl Into<String>,
        references: Vec<String>,
        distance_threshold: f32,
    ) -> Self {
        Self {
            name: name.into(),
            references,
            distance_threshold,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.name.trim().is_empty() {
            problems.push("route name must not be empty".to_string());
        }
        if self.name.contains(':') || self.name.contains('*') {
            problems.push("route name must not contain ':' or '*'".to_string());
        }
        if self.references.is_empty() {
            problems.push("route must have at least one reference".to_string());
        }
        if self.references.iter().any(|r| r.trim().is_empty()) {
            problems.push("route references must not be empty".to_string());
        }
        if !self.distance_threshold.is_finite()
            || !(-1.0..=1.0).contains(&self.distance_threshold)
        {
            problems.push("distance_threshold must be a finite value in [-1, 1]".to_string());
        }
        problems
    }
}

/// Routing result: one entry per qualifying route. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub name: String,
    /// Maximum score among the route's qualifying reference documents.
    pub score: f32,
    /// Metadata of the winning document.
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Configuration for [`SemanticRouter`].
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Prefix for every key this router stores.
    pub key_prefix: String,
    /// Default number of candidates fetched and routes returned by `route`.
    pub max_results: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            key_prefix: "semantic-router".to_string(),
            max_results: 5,
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(problem) = prefix_problem(&self.key_prefix) {
            problems.push(problem);
        }
        if self.max_results == 0 {
            problems.push("max_results must be at least 1".to_string());
        }
        problems
    }
}

/// Semantic router over a vector store.
///
/// Route lifecycle: absent → present on the first successful [`add_route`]
/// (a second call with the same name is a no-op returning `false`) → absent
/// again on [`remove_route`]. Reference documents of one route are written
/// independently with no cross-document atomicity: a failure mid-loop leaves
/// the documents already written in place.
///
/// [`add_route`]: SemanticRouter::add_route
/// [`remove_route`]: SemanticRouter::remove_route
pub struct SemanticRouter {
    store: Arc<dyn VectorStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    keys: KeySpace,
    index: IndexLifecycle,
    config: RouterConfig,
}

impl SemanticRouter {
    /// Fails fast with the enumerated configuration problems, if any.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        config: RouterConfig,
    ) -> Result<Self> {
        let problems = config.problems();
        if !problems.is_empty() {
            return Err(Error::configuration_with_context(
                problems.join("; "),
                ErrorContext::new().with_source("semantic_router"),
            ));
        }
        let keys = KeySpace::new(&config.key_prefix);
        let schema = IndexSchema {
            key_prefix: keys.schema_prefix(),
            text_fields: vec![
                REFERENCE_FIELD.to_string(),
                THRESHOLD_FIELD.to_string(),
                METADATA_FIELD.to_string(),
            ],
            tag_fields: vec![NAME_FIELD.to_string()],
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

    /// Add a route, writing one document per reference utterance.
    ///
    /// Returns `Ok(false)` without writing anything when a route with this
    /// name already has documents. References are embedded one at a time;
    /// concurrent callers adding the same name may both pass the existence
    /// check, which is accepted (at-least-one-wins, duplicates possible).
    pub async fn add_route(&self, route: &Route) -> Result<bool> {
        let problems = route.problems();
        if !problems.is_empty() {
            return Err(Error::validation_with_context(
                problems.join("; "),
                ErrorContext::new().with_source("semantic_router"),
            ));
        }

        if self.route_exists(&route.name).await? {
            return Ok(false);
        }

        self.index.ensure_ready(self.store.as_ref()).await;

        let metadata = serde_json::to_value(&route.metadata)
            .map_err(|e| Error::routing(format!("Failed to serialize route metadata: {}", e)))?;

        for reference in &route.references {
            let vector = self.embeddings.embed(reference).await?;
            let key = self.keys.reference_key(&route.name, reference);
            let document = json!({
                NAME_FIELD: route.name,
                REFERENCE_FIELD: reference,
                VECTOR_FIELD: vector,
                THRESHOLD_FIELD: route.distance_threshold,
                METADATA_FIELD: metadata,
            });
            // No rollback of references already written if a later one fails.
            self.store.put_document(&key, &document).await.map_err(|e| {
                Error::routing(format!(
                    "Failed to store reference for route '{}': {}",
                    route.name, e
                ))
            })?;
        }
        debug!(route = %route.name, references = route.references.len(), "route added");
        Ok(true)
    }

    /// Remove a route and every one of its reference documents, reporting
    /// whether anything was deleted.
    pub async fn remove_route(&self, name: &str) -> Result<bool> {
        validate_route_name(name)?;
        purge_matching(self.store.as_ref(), &self.keys.member_pattern(name)).await
    }

    /// Route text to the set of matching routes, ranked by descending score,
    /// using the configured result limit.
    pub async fn route(&self, text: &str) -> Result<Vec<RouteMatch>> {
        self.route_with_limit(text, self.config.max_results).await
    }

    /// Route text with an explicit candidate/result limit.
    ///
    /// A non-matching query yields an empty list, never an error; search
    /// failures (e.g. a missing index) also degrade to an empty list.
    pub async fn route_with_limit(&self, text: &str, limit: usize) -> Result<Vec<RouteMatch>> {
        if text.trim().is_empty() {
            return Err(Error::validation_with_context(
                "text must not be empty",
                ErrorContext::new().with_field_path("text"),
            ));
        }
        if limit == 0 {
            return Err(Error::validation_with_context(
                "limit must be at least 1",
                ErrorContext::new().with_field_path("limit"),
            ));
        }

        let vector = self.embeddings.embed(text).await?;
        self.index.ensure_ready(self.store.as_ref()).await;

        let query = KnnQuery::new(vector, limit).with_vector_field(VECTOR_FIELD);
        let documents = match self.store.search(self.index.name(), &query).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!(error = %e, "routing search failed; returning no matches");
                return Ok(Vec::new());
            }
        };
        Ok(aggregate_route_matches(&documents))
    }

    /// Distinct route names currently stored. Store errors degrade to an
    /// empty list.
    pub async fn list_routes(&self) -> Vec<String> {
        self.index.ensure_ready(self.store.as_ref()).await;
        match self.store.query(self.index.name(), None, LIST_LIMIT).await {
            Ok(documents) => {
                let names: BTreeSet<String> = documents
                    .iter()
                    .filter_map(|doc| doc.fields.get(NAME_FIELD).and_then(|v| v.as_str()))
                    .map(str::to_string)
                    .collect();
                names.into_iter().collect()
            }
            Err(e) => {
                warn!(error = %e, "listing routes failed; returning empty list");
                Vec::new()
            }
        }
    }

    /// Reassemble a route from its stored reference documents, or `None` if
    /// no documents carry this name.
    ///
    /// The threshold is taken from the last document examined and metadata
    /// from the first parseable one; with the shared-threshold/metadata
    /// invariant intact, all documents agree and the order is irrelevant.
    pub async fn get_route(&self, name: &str) -> Result<Option<Route>> {
        validate_route_name(name)?;
        self.index.ensure_ready(self.store.as_ref()).await;

        let filter = Filter::tag(NAME_FIELD, name);
        let documents = self
            .store
            .query(self.index.name(), Some(&filter), GET_LIMIT)
            .await
            .map_err(|e| Error::routing(format!("Failed to retrieve route '{}': {}", name, e)))?;
        if documents.is_empty() {
            return Ok(None);
        }

        let mut references = Vec::new();
        let mut threshold = 0.0f32;
        let mut metadata: Option<HashMap<String, serde_json::Value>> = None;
        for doc in &documents {
            if let Some(reference) = doc.fields.get(REFERENCE_FIELD).and_then(|v| v.as_str()) {
                references.push(reference.to_string());
            }
            if let Some(value) = doc.fields.get(THRESHOLD_FIELD).and_then(|v| v.as_f64()) {
                threshold = value as f32;
            }
            if metadata.is_none() {
                metadata = doc
                    .fields
                    .get(METADATA_FIELD)
                    .and_then(|v| serde_json::from_value(v.clone()).ok());
            }
        }

        Ok(Some(Route {
            name: name.to_string(),
            references,
            distance_threshold: threshold,
            metadata: metadata.unwrap_or_default(),
        }))
    }

    /// Whether any document carries this route name. Store errors are
    /// treated as "does not exist".
    pub async fn route_exists(&self, name: &str) -> Result<bool> {
        validate_route_name(name)?;
        self.index.ensure_ready(self.store.as_ref()).await;

        let filter = Filter::tag(NAME_FIELD, name);
        match self.store.query(self.index.name(), Some(&filter), 1).await {
            Ok(documents) => Ok(!documents.is_empty()),
            Err(e) => {
                warn!(route = %name, error = %e, "existence check failed; assuming absent");
                Ok(false)
            }
        }
    }

    /// Delete every document under this router's prefix, reporting whether
    /// anything was deleted.
    pub async fn clear(&self) -> Result<bool> {
        purge_matching(self.store.as_ref(), &self.keys.all_pattern()).await
    }
}

fn validate_route_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation_with_context(
            "route name must not be empty",
            ErrorContext::new().with_field_path("name"),
        ));
    }
    Ok(())
}

/// Aggregate scored documents into route-level matches.
///
/// Each document qualifies against its own embedded threshold. Per route,
/// the maximum score wins; the first qualifying document seeds the entry and
/// is replaced only by a strictly greater score. Routes with no qualifying
/// document are absent from the result. Output is sorted by descending score.
fn aggregate_route_matches(documents: &[ScoredDocument]) -> Vec<RouteMatch> {
    let mut best: HashMap<String, RouteMatch> = HashMap::new();
    for doc in documents {
        let Some(name) = doc.fields.get(NAME_FIELD).and_then(|v| v.as_str()) else {
            continue;
        };
        let Some(threshold) = doc.fields.get(THRESHOLD_FIELD).and_then(|v| v.as_f64()) else {
            continue;
        };
        if (doc.score as f64) < threshold {
            continue;
        }
        let entry = best.entry(name.to_string());
        match entry {
            std::collections::hash_map::Entry::Occupied(mut occupied) => {
                if doc.score > occupied.get().score {
                    occupied.insert(to_match(name, doc));
                }
            }
            std::collections::hash_map::Entry::Vacant(vacant) => {
                vacant.insert(to_match(name, doc));
            }
        }
    }
    let mut matches: Vec<RouteMatch> = best.into_values().collect();
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    matches
}

fn to_match(name: &str, doc: &ScoredDocument) -> RouteMatch {
    let metadata = doc
        .fields
        .get(METADATA_FIELD)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    RouteMatch {
        name: name.to_string(),
        score: doc.score,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(name: &str, score: f32, threshold: f32) -> ScoredDocument {
        ScoredDocument {
            key: format!("sr:{}:x", name),
            score,
            fields: json!({
                "name": name,
                "reference": "ref",
                "threshold": threshold,
                "metadata": {"team": name},
            }),
        }
    }

    #[test]
    fn test_aggregate_keeps_max_score_per_route() {
        let documents = vec![
            doc("weather", 0.8, 0.5),
            doc("weather", 0.95, 0.5),
            doc("weather", 0.7, 0.5),
        ];
        let matches = aggregate_route_matches(&documents);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "weather");
        assert_eq!(matches[0].score, 0.95);
    }

    #[test]
    fn test_aggregate_uses_per_document_threshold() {
        // Same score, different embedded thresholds: only the lenient route matches.
        let documents = vec![doc("strict", 0.5, 0.9), doc("lenient", 0.5, 0.1)];
        let matches = aggregate_route_matches(&documents);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "lenient");
    }

    #[test]
    fn test_aggregate_threshold_is_inclusive() {
        let documents = vec![doc("edge", 0.6, 0.6)];
        assert_eq!(aggregate_route_matches(&documents).len(), 1);
    }

    #[test]
    fn test_aggregate_sorts_descending_and_dedupes() {
        let documents = vec![
            doc("sports", 0.7, 0.1),
            doc("weather", 0.9, 0.1),
            doc("sports", 0.65, 0.1),
        ];
        let matches = aggregate_route_matches(&documents);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].name, "weather");
        assert_eq!(matches[1].name, "sports");
        assert_eq!(matches[1].score, 0.7);
    }

    #[test]
    fn test_aggregate_first_qualifying_document_seeds_entry() {
        let mut first = doc("weather", 0.8, 0.1);
        first.fields["metadata"] = json!({"origin": "first"});
        let mut tied = doc("weather", 0.8, 0.1);
        tied.fields["metadata"] = json!({"origin": "second"});

        let matches = aggregate_route_matches(&[first, tied]);
        assert_eq!(matches.len(), 1);
        // Equal score does not displace the seeded entry.
        assert_eq!(matches[0].metadata["origin"], json!("first"));
    }

    #[test]
    fn test_aggregate_skips_malformed_documents() {
        let malformed = ScoredDocument {
            key: "sr:x:1".into(),
            score: 0.9,
            fields: json!({"reference": "no name or threshold"}),
        };
        assert!(aggregate_route_matches(&[malformed]).is_empty());
    }

    #[test]
    fn test_route_validation_problems() {
        let route = Route::new("", vec![], 2.0);
        let problems = route.problems();
        assert_eq!(problems.len(), 3);

        let route = Route::new("ok", vec!["ref".into()], 0.7);
        assert!(route.problems().is_empty());
    }

    #[test]
    fn test_router_config_validation() {
        assert!(RouterConfig::new().problems().is_empty());
        assert!(!RouterConfig::new().with_max_results(0).problems().is_empty());
        assert!(!RouterConfig::new().with_key_prefix("a:b").problems().is_empty());
    }
}
