//! Stream plumbing for the join layer
//!
//! - `observe_query` turns a generation counter into a stream of query results
//! - `combine_latest` merges two streams, re-emitting whenever either side emits

mod combine_latest;
mod observe;

pub use combine_latest::{combine_latest, combine_latest3};
pub use observe::{observe_query, watch_stream};
