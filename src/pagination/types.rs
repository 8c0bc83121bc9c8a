//! Pagination types and traits
//!
//! Defines the page shape, the consumer-side sink and per-scan counters.

use crate::error::{Error, Result};
use crate::types::{JsonValue, Row};

/// Field holding the continuation link in a collection response
pub const NEXT_LINK: &str = "@odata.nextLink";

/// One page of a Graph response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ODataPage {
    /// Items on this page
    pub items: Vec<JsonValue>,
    /// Continuation link, if more pages exist
    pub next_link: Option<String>,
}

impl ODataPage {
    /// Split a response body into items and continuation
    ///
    /// Collections carry their items in `value`. Singleton endpoints return
    /// the object itself, which becomes a one-item page; a singleton body
    /// that does carry a `value` array is read as a collection.
    pub fn from_body(body: JsonValue, singleton: bool) -> Result<Self> {
        let JsonValue::Object(mut object) = body else {
            return Err(Error::decode("response body is not a JSON object"));
        };

        let next_link = match object.remove(NEXT_LINK) {
            Some(JsonValue::String(link)) if !link.is_empty() => Some(link),
            _ => None,
        };

        match object.remove("value") {
            Some(JsonValue::Array(items)) => Ok(Self { items, next_link }),
            Some(other) if singleton => {
                object.insert("value".to_string(), other);
                Ok(Self {
                    items: vec![JsonValue::Object(object)],
                    next_link: None,
                })
            }
            None if singleton => Ok(Self {
                items: vec![JsonValue::Object(object)],
                next_link: None,
            }),
            Some(_) => Err(Error::decode("'value' in collection response is not an array")),
            None => Err(Error::decode("collection response has no 'value' array")),
        }
    }

    /// Whether another page follows
    pub fn has_next(&self) -> bool {
        self.next_link.is_some()
    }
}

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Fetch this URL next
    Continue(String),
    /// No more pages
    Done,
}

impl NextPage {
    /// Next step after a page
    pub fn after(page: &ODataPage) -> Self {
        page.next_link
            .clone()
            .map_or(Self::Done, Self::Continue)
    }

    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Receives flattened rows from a scan
///
/// `emit` returns `false` once the consumer needs no more rows. The streamer
/// also polls `wants_more` before fetching each page, which lets limits and
/// cancellation flags stop a scan between pages.
pub trait RowSink {
    /// Accept one row; `false` stops the scan
    fn emit(&mut self, row: Row) -> bool;

    /// Whether rows are still wanted
    fn wants_more(&self) -> bool {
        true
    }
}

impl<F> RowSink for F
where
    F: FnMut(Row) -> bool,
{
    fn emit(&mut self, row: Row) -> bool {
        self(row)
    }
}

/// Counters for one streamed scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Pages fetched
    pub pages: usize,
    /// Raw items received
    pub items: usize,
    /// Rows handed to the sink
    pub rows: usize,
    /// The consumer stopped the scan
    pub stopped: bool,
    /// An ignorable provider error ended the scan
    pub ignored_error: Option<String>,
}

impl StreamSummary {
    /// Create new counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fetched page
    pub fn add_page(&mut self, items: usize) {
        self.pages += 1;
        self.items += items;
    }

    /// Record an emitted row
    pub fn add_row(&mut self) {
        self.rows += 1;
    }
}
