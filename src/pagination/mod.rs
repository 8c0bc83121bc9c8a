//! Pagination module
//!
//! Follows `@odata.nextLink` continuations and streams flattened rows.
//!
//! # Overview
//!
//! - `ODataPage` - Items and continuation of one response
//! - `RowSink` - Consumer side; returning `false` stops the scan
//! - `RowStreamer` - Fetch, flatten, emit, repeat until done or stopped

mod streamer;
mod types;

pub use streamer::RowStreamer;
pub use types::{NextPage, ODataPage, RowSink, StreamSummary, NEXT_LINK};

#[cfg(test)]
mod tests;
