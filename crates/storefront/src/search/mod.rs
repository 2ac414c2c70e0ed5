//! Full-text search over the local catalog
//!
//! The index is derived data: it is rebuilt wholesale from the relational
//! tables after a successful sync and queried through FTS5 `MATCH`.

mod fts_maintainer;
pub mod query;

pub use fts_maintainer::{SearchIndexMaintainer, SearchMatches};
pub use query::build_match_expression;
