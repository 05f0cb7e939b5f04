//! Semantic router: classify free text into named destinations by
//! similarity to reference utterances.
//!
//! Each route stores one document per reference utterance; every document of
//! a route carries the route's threshold and metadata. Routing aggregates
//! matching documents per route, keeping the maximum score.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`SemanticRouter`] | The router engine |
//! | [`RouterConfig`] | Prefix and result limit |
//! | [`Route`] | Named destination: references, threshold, metadata |
//! | [`RouteMatch`] | Query result: route name, aggregated score, metadata |

mod semantic;

pub use semantic::{Route, RouteMatch, RouterConfig, SemanticRouter};
