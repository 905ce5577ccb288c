//! Async client executing `quarry` requests
//!
//! [`Cluster`] pairs a [`Transport`] with the compiler set matching the
//! engine's version, resolved once per session:
//!
//! ```no_run
//! use quarry::types::{Field, Integer};
//! use quarry::SearchQuery;
//! use quarry_client::{ClientConfig, Cluster};
//!
//! # async fn run() -> quarry_client::Result<()> {
//! let cluster = Cluster::connect(&ClientConfig::new("http://localhost:9200"))?;
//!
//! let status = Field::new("status", Integer);
//! let mut search = SearchQuery::new();
//! search.filter(status.eq(0)).size(10);
//!
//! let result = cluster.search(&["posts"], &search.prepare()).await?;
//! println!("{} hits", result.hits.hits.len());
//! # Ok(())
//! # }
//! ```
//!
//! [`HttpTransport`] speaks HTTP through `reqwest`; tests and embedders can
//! supply any other [`Transport`].

pub mod cluster;
pub mod config;
pub mod error;
pub mod transport;

pub use cluster::{Cluster, EngineInfo};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use transport::{HttpTransport, Transport, TransportResponse};
