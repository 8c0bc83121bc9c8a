//! Execution engine module
//!
//! Binds one resolved credential to one Graph client and runs table scans
//! and key lookups over it.
//!
//! # Overview
//!
//! The engine module provides:
//! - `Connection` - Credential resolved once, client shared by every call
//! - `ListRequest` - Predicates, projection, limit and cancellation of a scan
//! - `ScanStats` - Counters reported after each scan

mod types;

pub use types::{CheckReport, ListRequest, ScanStats};

use crate::auth::{Credential, CredentialKind, CredentialResolver, TokenEndpoints};
use crate::config::{ConnectionConfig, Environment};
use crate::decode::{FlattenContext, RowFlattener};
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use crate::pagination::{RowSink, RowStreamer};
use crate::query::{build_filter, clamp_page_size, project, Operator, PredicateSet, Projection};
use crate::table::{ColumnSource, SyntheticKind, TableDefinition};
use crate::template::{self, TemplateContext};
use crate::types::{JsonValue, Row};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use std::time::Instant;
use tracing::{debug, info, instrument};
use types::LimitedSink;
use url::Url;

/// An authenticated connection to Microsoft Graph
pub struct Connection {
    client: HttpClient,
    credential: CredentialKind,
    tenant_id: Option<String>,
    graph_endpoint: String,
}

impl Connection {
    /// Resolve a credential from `config` and `env` and connect
    pub fn connect(config: &ConnectionConfig, env: &dyn Environment) -> Result<Self> {
        Self::connect_with(config, env, &CredentialResolver::new())
    }

    /// Connect with a specific resolver
    pub fn connect_with(
        config: &ConnectionConfig,
        env: &dyn Environment,
        resolver: &CredentialResolver,
    ) -> Result<Self> {
        let merged = config.clone().with_environment(env);
        merged.validate()?;
        let credential = resolver.resolve_config(&merged)?;
        Self::from_credential(&merged, credential)
    }

    /// Connect with an already resolved credential
    pub fn from_credential(config: &ConnectionConfig, credential: Credential) -> Result<Self> {
        let graph_endpoint = config.graph_endpoint();
        let http = HttpClientConfig::from_settings(&config.http, format!("{graph_endpoint}/"));
        let tenant_id = credential
            .tenant_id()
            .map(str::to_string)
            .or_else(|| config.tenant_id.clone());
        let kind = credential.kind();

        info!(credential = %kind, graph = %graph_endpoint, "Connected");

        Ok(Self {
            client: HttpClient::with_auth(http, credential, TokenEndpoints::from_config(config))?,
            credential: kind,
            tenant_id,
            graph_endpoint,
        })
    }

    /// The credential strategy in use
    pub fn credential_kind(&self) -> CredentialKind {
        self.credential
    }

    /// The Graph base URL
    pub fn graph_endpoint(&self) -> &str {
        &self.graph_endpoint
    }

    /// The underlying HTTP client
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Stream the rows of `table` into `sink`
    #[instrument(skip_all, fields(table = %table.name))]
    pub async fn list(
        &self,
        table: &TableDefinition,
        request: &ListRequest,
        sink: &mut dyn RowSink,
    ) -> Result<ScanStats> {
        let start = Instant::now();
        let mut stats = ScanStats::new(&table.name);

        let predicates = lift_filter_column(table, &request.predicates);
        let plan = build_filter(table, &predicates)?;
        let projection = project(table, &request.columns)?;

        let output: Vec<String> = if request.columns.is_empty() {
            table.columns.iter().map(|c| c.name.clone()).collect()
        } else {
            request.columns.clone()
        };
        let extras: Vec<String> = plan
            .residual
            .iter()
            .map(|q| q.column.clone())
            .filter(|c| !output.contains(c))
            .fold(Vec::new(), |mut acc, c| {
                if !acc.contains(&c) {
                    acc.push(c);
                }
                acc
            });
        // Residual columns are fetched too, then dropped after evaluation
        let fetch_projection = if extras.is_empty() {
            projection
        } else {
            merge(projection, project(table, &extras)?)
        };
        let fetched: Vec<&str> = output.iter().chain(&extras).map(String::as_str).collect();

        let context = FlattenContext::new()
            .with_tenant(self.tenant().await)
            .with_filter(plan.filter.clone());
        let flattener = RowFlattener::with_columns(table, &fetched, context)?;

        let mut first = RequestConfig::new();
        let mut streamer = RowStreamer::new(&self.client, &table.ignore_errors)
            .singleton(table.singleton);

        if let Some(filter) = &plan.filter {
            first = first.query("$filter", filter);
            if table.advanced_query {
                first = first.query("$count", "true");
                streamer = streamer.header("ConsistencyLevel", "eventual");
            }
        }
        if let Some(select) = fetch_projection.select_param() {
            first = first.query("$select", select);
        }
        if let Some(expand) = fetch_projection.expand_param() {
            first = first.query("$expand", expand);
        }
        if table.supports_top && !table.singleton {
            if let Some(top) = clamp_page_size(request.effective_page_size(), table.page_size_max) {
                first = first.query("$top", top.to_string());
            }
        }

        debug!(
            filter = plan.filter.as_deref().unwrap_or(""),
            residual = plan.residual.len(),
            "Planned scan"
        );

        let transform = |item: JsonValue| -> Result<Option<Row>> {
            let row = flattener.flatten(&item)?;
            if !plan.accepts(&row) {
                return Ok(None);
            }
            if extras.is_empty() {
                return Ok(Some(row));
            }
            Ok(Some(
                row.into_iter()
                    .filter(|(name, _)| !extras.contains(name))
                    .collect(),
            ))
        };

        let mut limited = LimitedSink::new(sink, request);
        let summary = streamer
            .stream(&table_url(table), first, transform, &mut limited)
            .await?;

        stats.rows = limited.delivered();
        stats.filter = plan.filter.clone();
        stats.residual_predicates = plan.residual.len();
        stats.record(summary);
        stats.set_duration(start.elapsed().as_millis() as u64);

        info!(
            pages = stats.pages,
            rows = stats.rows,
            stopped = stats.stopped,
            duration_ms = stats.duration_ms,
            "Scan complete"
        );

        Ok(stats)
    }

    /// Collect the rows of `table`
    pub async fn list_rows(&self, table: &TableDefinition, request: &ListRequest) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        let mut sink = |row: Row| {
            rows.push(row);
            true
        };
        self.list(table, request, &mut sink).await?;
        Ok(rows)
    }

    /// Fetch one object by key
    ///
    /// Returns `None` when the object does not exist or the table treats the
    /// error as an empty result.
    #[instrument(skip_all, fields(table = %table.name))]
    pub async fn get<S: AsRef<str>>(
        &self,
        table: &TableDefinition,
        key: &str,
        columns: &[S],
    ) -> Result<Option<Row>> {
        if !table.supports_get() {
            return Err(Error::invalid_table(
                &table.name,
                "singleton tables have no key lookup",
            ));
        }

        let path = object_url(table, key)?;
        let projection = project(table, columns)?;
        let mut config = RequestConfig::new();
        if let Some(select) = projection.select_param() {
            config = config.query("$select", select);
        }
        if let Some(expand) = projection.expand_param() {
            config = config.query("$expand", expand);
        }

        let item: JsonValue = match self.client.get_json_with_config(&path, config).await {
            Ok(item) => item,
            Err(e) if e.is_not_found() || table.ignore_errors.matches(&e) => {
                debug!(error = %e, "Object not found");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let context = FlattenContext::new().with_tenant(self.tenant().await);
        let flattener = RowFlattener::with_columns(table, columns, context)?;
        flattener.flatten(&item).map(Some)
    }

    /// Acquire a token and report what the connection resolved to
    pub async fn check(&self) -> Result<CheckReport> {
        let auth = self
            .client
            .authenticator()
            .ok_or_else(|| Error::auth("connection has no authenticator"))?;
        let token = auth.token().await?;

        Ok(CheckReport {
            credential: self.credential,
            tenant_id: self.tenant_id.clone().or_else(|| token_tenant(&token)),
            graph_endpoint: self.graph_endpoint.clone(),
        })
    }

    /// Tenant for `tenant_id` columns
    ///
    /// Credentials without a configured tenant read it from the token.
    async fn tenant(&self) -> Option<String> {
        if let Some(tenant) = &self.tenant_id {
            return Some(tenant.clone());
        }
        let token = self.client.authenticator()?.token().await.ok()?;
        token_tenant(&token)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("credential", &self.credential)
            .field("tenant_id", &self.tenant_id)
            .field("graph_endpoint", &self.graph_endpoint)
            .finish_non_exhaustive()
    }
}

/// Collection URL relative to the Graph base
pub fn table_url(table: &TableDefinition) -> String {
    format!(
        "{}/{}",
        table.api_version.as_str(),
        table.endpoint.trim_matches('/')
    )
}

/// Object URL relative to the Graph base, with the key percent-encoded
pub fn object_url(table: &TableDefinition, key: &str) -> Result<String> {
    if key.is_empty() {
        return Err(Error::predicate("key cannot be empty"));
    }

    let mut encoder = Url::parse("http://localhost/")?;
    encoder
        .path_segments_mut()
        .map_err(|()| Error::Other("cannot encode key".to_string()))?
        .push(key);
    let encoded = encoder.path().trim_start_matches('/').to_string();

    let path = template::render(
        &table.get_endpoint_template(),
        &TemplateContext::for_key(encoded),
    )?;
    Ok(format!(
        "{}/{}",
        table.api_version.as_str(),
        path.trim_start_matches('/')
    ))
}

/// Move an equality qual on the `filter` column into the raw filter
fn lift_filter_column(table: &TableDefinition, predicates: &PredicateSet) -> PredicateSet {
    if predicates.raw().is_some() {
        return predicates.clone();
    }

    let is_filter_column = |name: &str| {
        table
            .column(name)
            .is_some_and(|c| c.source() == ColumnSource::Synthetic(SyntheticKind::Filter))
    };

    let mut lifted = predicates.clone();
    if let Some(position) = lifted.quals.iter().position(|q| {
        q.operator == Operator::Eq && q.value.is_string() && is_filter_column(&q.column)
    }) {
        let qual = lifted.quals.remove(position);
        if let JsonValue::String(filter) = qual.value {
            lifted.raw_filter = Some(filter);
        }
    }
    lifted
}

fn merge(mut base: Projection, extra: Projection) -> Projection {
    for field in extra.select {
        if !base.select.contains(&field) {
            base.select.push(field);
        }
    }
    for clause in extra.expand {
        if !base.expand.contains(&clause) {
            base.expand.push(clause);
        }
    }
    base
}

/// `tid` claim of an access token, read without verification
fn token_tenant(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: JsonValue = serde_json::from_slice(&bytes).ok()?;
    claims.get("tid")?.as_str().map(str::to_string)
}
