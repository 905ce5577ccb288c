//! Typed query, aggregation and mapping expressions for Elasticsearch and
//! OpenSearch
//!
//! Application code builds requests as expression trees, compiles them with
//! a version-aware compiler into the engine's JSON wire protocol, and decodes
//! the JSON responses back into typed results.
//!
//! # Components
//!
//! - [`query`]: query expressions (`bool`, `term`, `match`, `function_score`,
//!   ...), sorts, rescorers and node handles for editing a built query
//! - [`aggs`]: metric and bucket aggregations with typed results
//! - [`search`]: the search builder, prepared snapshots and decoded hits
//! - [`mapping`]: document mapping definitions
//! - [`bulk`]: bulk actions and bulk responses
//! - [`compile`]: the compiler set producing [`compile::Request`]s
//! - [`features`]: engine version detection and the feature gate
//!
//! # Example
//!
//! ```
//! use quarry::compile::SearchQueryCompiler;
//! use quarry::search::SearchQuery;
//! use quarry::types::{Double, Field, Integer};
//! use serde_json::json;
//!
//! let status = Field::new("status", Integer);
//! let rank = Field::new("rank", Double);
//!
//! let mut search = SearchQuery::new();
//! search.filter(status.eq(0)).filter(rank.gte(90.0));
//!
//! let body = SearchQueryCompiler::default().search_body(&search);
//! assert_eq!(
//!     body,
//!     json!({"query": {"bool": {"filter": [
//!         {"term": {"status": 0}},
//!         {"range": {"rank": {"gte": 90.0}}}
//!     ]}}})
//! );
//! ```
//!
//! The core performs no I/O; `quarry-client` executes compiled requests.

pub mod aggs;
pub mod bulk;
pub mod compile;
pub mod error;
pub mod expression;
pub mod features;
pub mod json;
pub mod mapping;
pub mod query;
pub mod search;
pub mod types;

pub use error::Error;
pub use expression::{NamedExpression, Script};
pub use features::{Distribution, FeatureSet, Version};
pub use query::QueryExpression;
pub use search::{PreparedSearchQuery, SearchQuery, SearchQueryResult};

pub type Result<T> = std::result::Result<T, Error>;
