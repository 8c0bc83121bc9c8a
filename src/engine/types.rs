//! Engine types
//!
//! Scan requests, scan statistics and the row sink that enforces limits.

use crate::auth::CredentialKind;
use crate::pagination::{RowSink, StreamSummary};
use crate::query::PredicateSet;
use crate::types::Row;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Parameters of one `list` call
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    /// Predicates to push down or evaluate locally
    pub predicates: PredicateSet,
    /// Columns to return; empty means all
    pub columns: Vec<String>,
    /// Stop after this many rows
    pub limit: Option<usize>,
    /// Requested page size, clamped to the table maximum
    pub page_size: Option<u64>,
    /// Set to `true` to stop the scan between rows
    pub cancel: Option<Arc<AtomicBool>>,
}

impl ListRequest {
    /// Request every row and column
    pub fn new() -> Self {
        Self::default()
    }

    /// Set predicates
    #[must_use]
    pub fn with_predicates(mut self, predicates: PredicateSet) -> Self {
        self.predicates = predicates;
        self
    }

    /// Set the returned columns
    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Set a row limit
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Attach a cancellation flag
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Page size to request: the explicit size, else the row limit
    pub fn effective_page_size(&self) -> Option<u64> {
        self.page_size.or(self.limit.map(|l| l as u64))
    }
}

/// Statistics from one scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    /// Table scanned
    pub table: String,
    /// `$filter` sent, if any
    pub filter: Option<String>,
    /// Predicates evaluated locally
    pub residual_predicates: usize,
    /// Pages fetched
    pub pages: usize,
    /// Items received from the provider
    pub items: usize,
    /// Rows delivered
    pub rows: usize,
    /// The scan ended early on a limit, cancellation or consumer stop
    pub stopped: bool,
    /// Ignorable provider error that ended the scan
    pub ignored_error: Option<String>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl ScanStats {
    /// Stats for a scan of `table`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Copy counters from the streamer
    pub fn record(&mut self, summary: StreamSummary) {
        self.pages = summary.pages;
        self.items = summary.items;
        self.stopped = summary.stopped;
        self.ignored_error = summary.ignored_error;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// Outcome of a connection check
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    /// Strategy the resolver selected
    pub credential: CredentialKind,
    /// Tenant of the connection, when known
    pub tenant_id: Option<String>,
    /// Graph base URL
    pub graph_endpoint: String,
}

/// Sink wrapper that enforces a row limit and a cancellation flag
pub(crate) struct LimitedSink<'a> {
    inner: &'a mut dyn RowSink,
    remaining: Option<usize>,
    cancel: Option<&'a AtomicBool>,
    delivered: usize,
}

impl<'a> LimitedSink<'a> {
    pub(crate) fn new(inner: &'a mut dyn RowSink, request: &'a ListRequest) -> Self {
        Self {
            inner,
            remaining: request.limit,
            cancel: request.cancel.as_deref(),
            delivered: 0,
        }
    }

    pub(crate) fn delivered(&self) -> usize {
        self.delivered
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

impl RowSink for LimitedSink<'_> {
    fn emit(&mut self, row: Row) -> bool {
        if self.cancelled() || self.remaining == Some(0) {
            return false;
        }
        self.delivered += 1;
        let more = self.inner.emit(row);
        match self.remaining.as_mut() {
            Some(remaining) => {
                *remaining -= 1;
                more && *remaining > 0
            }
            None => more,
        }
    }

    fn wants_more(&self) -> bool {
        !self.cancelled() && self.remaining != Some(0) && self.inner.wants_more()
    }
}
