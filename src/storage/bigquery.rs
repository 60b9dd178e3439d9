//! BigQuery REST backend
//!
//! Submits standard-SQL queries with named STRING parameters through
//! `jobs.query`, then polls `jobs.getQueryResults` until the job completes,
//! following `pageToken` until every row is fetched.
//!
//! The [`QueryBackend`] contract is blocking. Calls are made from the blocking
//! worker pool and drive the async HTTP client through the runtime handle
//! captured at construction; calling [`QueryBackend::submit`] from an async
//! task would panic.

use crate::core::backend::{JobHandle, QueryBackend, QueryParameters, Row};
use crate::core::error::QueryError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
const DEFAULT_WAIT: Duration = Duration::from_secs(10);

struct BigQueryInner {
    client: reqwest::Client,
    base_url: String,
    project: String,
    location: Option<String>,
    access_token: String,
    wait: Duration,
    handle: Handle,
}

/// Query backend talking to the BigQuery v2 REST API
#[derive(Clone)]
pub struct BigQueryBackend {
    inner: Arc<BigQueryInner>,
}

impl BigQueryBackend {
    /// Create a backend for `project` authenticating with a bearer token
    pub fn new(
        project: impl Into<String>,
        access_token: impl Into<String>,
        handle: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(BigQueryInner {
                client: reqwest::Client::new(),
                base_url: DEFAULT_BASE_URL.to_string(),
                project: project.into(),
                location: None,
                access_token: access_token.into(),
                wait: DEFAULT_WAIT,
                handle,
            }),
        }
    }

    /// Read the bearer token from the environment variable `token_env`
    pub fn from_env(
        project: impl Into<String>,
        token_env: &str,
        handle: Handle,
    ) -> anyhow::Result<Self> {
        let token = std::env::var(token_env)
            .map_err(|_| anyhow::anyhow!("environment variable {} is not set", token_env))?;
        Ok(Self::new(project, token, handle))
    }

    /// Dataset location sent with every request
    pub fn with_location(self, location: impl Into<String>) -> Self {
        self.rebuild(|inner| inner.location = Some(location.into()))
    }

    /// Override the API root, e.g. for an emulator
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        self.rebuild(|inner| inner.base_url = base_url.into().trim_end_matches('/').to_string())
    }

    /// Server-side wait per request before a poll returns incomplete
    pub fn with_wait(self, wait: Duration) -> Self {
        self.rebuild(|inner| inner.wait = wait)
    }

    fn rebuild(self, update: impl FnOnce(&mut BigQueryInner)) -> Self {
        let mut inner = match Arc::try_unwrap(self.inner) {
            Ok(inner) => inner,
            Err(shared) => BigQueryInner {
                client: shared.client.clone(),
                base_url: shared.base_url.clone(),
                project: shared.project.clone(),
                location: shared.location.clone(),
                access_token: shared.access_token.clone(),
                wait: shared.wait,
                handle: shared.handle.clone(),
            },
        };
        update(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl BigQueryInner {
    fn queries_url(&self) -> String {
        format!("{}/projects/{}/queries", self.base_url, self.project)
    }

    async fn post_query(&self, request: &QueryRequest<'_>) -> Result<QueryResponse, QueryError> {
        let response = self
            .client
            .post(self.queries_url())
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await
            .map_err(|e| QueryError::backend(format!("jobs.query request failed: {}", e)))?;
        read_response(response).await
    }

    async fn get_results(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, QueryError> {
        let mut query: Vec<(&str, String)> = vec![("timeoutMs", self.wait.as_millis().to_string())];
        if let Some(location) = job.location.as_ref().or(self.location.as_ref()) {
            query.push(("location", location.clone()));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/{}", self.queries_url(), job.job_id))
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                QueryError::backend(format!("jobs.getQueryResults request failed: {}", e))
            })?;
        read_response(response).await
    }

    async fn collect_rows(&self, first: QueryResponse) -> Result<Vec<Row>, QueryError> {
        let mut page = first;

        while !page.job_complete {
            let job = page
                .job_reference
                .clone()
                .ok_or_else(|| QueryError::backend("incomplete job without a job reference"))?;
            tracing::debug!(job_id = %job.job_id, "waiting for query job");
            page = self.get_results(&job, None).await?;
            if page.job_reference.is_none() {
                page.job_reference = Some(job);
            }
        }

        let columns = page.column_names();
        let mut rows = decode_rows(&columns, &page.rows)?;

        while let Some(token) = page.page_token.take() {
            let job = page
                .job_reference
                .clone()
                .ok_or_else(|| QueryError::backend("paged result without a job reference"))?;
            page = self.get_results(&job, Some(&token)).await?;
            if page.job_reference.is_none() {
                page.job_reference = Some(job);
            }
            rows.extend(decode_rows(&columns, &page.rows)?);
        }

        Ok(rows)
    }
}

async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, QueryError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or(body);
        return Err(QueryError::backend(format!("{}: {}", status, message)));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| QueryError::backend(format!("unreadable response: {}", e)))
}

impl QueryBackend for BigQueryBackend {
    fn submit(
        &self,
        query: &str,
        parameters: &QueryParameters,
    ) -> Result<Box<dyn JobHandle>, QueryError> {
        let request = QueryRequest::new(query, parameters, &self.inner);
        let first = self.inner.handle.block_on(self.inner.post_query(&request))?;

        Ok(Box::new(BigQueryJob {
            inner: self.inner.clone(),
            first,
        }))
    }
}

/// A submitted job; waiting drives polling and paging
struct BigQueryJob {
    inner: Arc<BigQueryInner>,
    first: QueryResponse,
}

impl JobHandle for BigQueryJob {
    fn wait(self: Box<Self>) -> Result<Vec<Row>, QueryError> {
        let BigQueryJob { inner, first } = *self;
        inner.handle.block_on(inner.collect_rows(first))
    }
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    parameter_mode: &'static str,
    query_parameters: Vec<NamedParameter>,
    timeout_ms: u64,
    request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
}

impl<'a> QueryRequest<'a> {
    fn new(query: &'a str, parameters: &QueryParameters, inner: &'a BigQueryInner) -> Self {
        Self {
            query,
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            query_parameters: parameters
                .iter()
                .map(|(name, value)| NamedParameter {
                    name: name.clone(),
                    parameter_type: ParameterType {
                        kind: value.type_name(),
                    },
                    parameter_value: ParameterValue {
                        value: value.as_str().to_string(),
                    },
                })
                .collect(),
            timeout_ms: inner.wait.as_millis() as u64,
            request_id: uuid::Uuid::new_v4().to_string(),
            location: inner.location.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NamedParameter {
    name: String,
    parameter_type: ParameterType,
    parameter_value: ParameterValue,
}

#[derive(Debug, Serialize)]
struct ParameterType {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ParameterValue {
    value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

/// Shared shape of `jobs.query` and `jobs.getQueryResults` responses
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_reference: Option<JobReference>,
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    #[serde(default)]
    page_token: Option<String>,
}

impl QueryResponse {
    fn column_names(&self) -> Vec<String> {
        self.schema
            .as_ref()
            .map(|schema| schema.fields.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<TableField>,
}

#[derive(Debug, Deserialize)]
struct TableField {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn decode_rows(columns: &[String], rows: &[TableRow]) -> Result<Vec<Row>, QueryError> {
    rows.iter()
        .map(|row| {
            if row.f.len() != columns.len() {
                return Err(QueryError::backend(format!(
                    "row has {} cells but the schema has {} columns",
                    row.f.len(),
                    columns.len()
                )));
            }
            let mut decoded = Row::new();
            for (column, cell) in columns.iter().zip(&row.f) {
                decoded.insert(column.clone(), cell_text(&cell.v));
            }
            Ok(decoded)
        })
        .collect()
}

/// Cells arrive as strings or null; nested records are kept as JSON text
fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
