//! Embedded full-text search engine on an ordered LSM key-value store.
//!
//! Text is tokenized and hashed into `(token, record, prev)` triples
//! kept in an ordered store; searches enumerate the postings of a probe
//! token and verify candidates with secondary seeks. A small query
//! language (`AND`/`OR`/`NOT`, facets, `IN` lists, quoted phrases)
//! compiles to the same executor.

pub mod analysis;
pub mod core;
pub mod engine;
pub mod index;
pub mod query;
pub mod search;
pub mod storage;

pub use crate::core::cancel::CancellationToken;
pub use crate::core::config::{IndexOptions, StoreOptions};
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::engine::SearchEngine;
pub use crate::index::positional::{IndexStats, PositionalIndex};
pub use crate::query::ast::{NodeKind, QueryNode, SearchQuery};
pub use crate::search::simple::SimpleSearchRequest;
