//! Row streamer
//!
//! Walks `@odata.nextLink` continuations and hands each flattened item to a
//! [`RowSink`] until the collection is exhausted or the sink stops.

use super::types::{NextPage, ODataPage, RowSink, StreamSummary};
use crate::error::Result;
use crate::http::{HttpClient, RequestConfig};
use crate::table::IgnoreErrors;
use crate::types::{JsonValue, Row};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Streams the rows of one Graph collection
pub struct RowStreamer<'a> {
    client: &'a HttpClient,
    ignore: &'a IgnoreErrors,
    singleton: bool,
    headers: HashMap<String, String>,
}

impl<'a> RowStreamer<'a> {
    /// Create a streamer over `client`, ending quietly on `ignore`d errors
    pub fn new(client: &'a HttpClient, ignore: &'a IgnoreErrors) -> Self {
        Self {
            client,
            ignore,
            singleton: false,
            headers: HashMap::new(),
        }
    }

    /// Read the endpoint as a single object
    #[must_use]
    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    /// Header sent with every page request
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Stream all rows starting at `url`
    ///
    /// `first` carries the query options of the first request. Continuation
    /// links already embed them, so later pages reuse only the headers.
    /// `transform` flattens an item into a row, or returns `None` to skip it.
    /// Ignorable provider errors end the scan quietly only on the first page;
    /// once rows have been fetched they propagate.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn stream<F>(
        &self,
        url: &str,
        first: RequestConfig,
        mut transform: F,
        sink: &mut dyn RowSink,
    ) -> Result<StreamSummary>
    where
        F: FnMut(JsonValue) -> Result<Option<Row>>,
    {
        let mut summary = StreamSummary::new();
        let mut next = NextPage::Continue(url.to_string());
        let mut config = self.with_headers(first);

        while let NextPage::Continue(page_url) = next {
            if !sink.wants_more() {
                summary.stopped = true;
                break;
            }

            let body: JsonValue = match self.client.get_json_with_config(&page_url, config).await {
                Ok(body) => body,
                Err(e) if summary.pages == 0 && self.ignore.matches(&e) => {
                    debug!(error = %e, "ignorable provider error, ending scan");
                    summary.ignored_error = Some(e.to_string());
                    break;
                }
                Err(e) => return Err(e),
            };

            let page = ODataPage::from_body(body, self.singleton)?;
            next = NextPage::after(&page);
            summary.add_page(page.items.len());
            debug!(
                page = summary.pages,
                items = page.items.len(),
                has_next = !next.is_done(),
                "fetched page"
            );

            for item in page.items {
                let Some(row) = transform(item)? else {
                    continue;
                };
                summary.add_row();
                if !sink.emit(row) {
                    summary.stopped = true;
                    return Ok(summary);
                }
            }

            config = self.with_headers(RequestConfig::new());
        }

        Ok(summary)
    }

    fn with_headers(&self, mut config: RequestConfig) -> RequestConfig {
        for (key, value) in &self.headers {
            config = config.header(key, value);
        }
        config
    }
}
