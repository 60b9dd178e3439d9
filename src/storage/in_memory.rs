//! In-memory query backend for testing and development
//!
//! Tables are keyed by the exact query text. A submitted query returns every
//! registered row that has a column named after each bound parameter holding
//! an equal value, which is enough to emulate `WHERE id = @id` style lookups.
//! A row without such a column never matches, so fixtures for a query like
//! `WHERE authorId = @id` must carry an `id` column.

use crate::core::backend::{JobHandle, QueryBackend, QueryParameters, Row};
use crate::core::error::QueryError;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// In-memory backend implementation
///
/// Uses RwLock for thread-safe access. Clones share the same tables and
/// counters.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
    failures: Arc<RwLock<HashMap<String, QueryError>>>,
    executions: Arc<RwLock<HashMap<String, usize>>>,
    latency: Arc<RwLock<Duration>>,
}

impl InMemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Load tables from a fixtures document: `{ "<query>": [ {column: value} ] }`
    pub fn from_fixtures_json(json: &str) -> anyhow::Result<Self> {
        let tables: IndexMap<String, Vec<Row>> = serde_json::from_str(json)?;
        let backend = Self::new();
        for (query, rows) in tables {
            backend.insert_rows(&query, rows);
        }
        Ok(backend)
    }

    /// Load tables from a fixtures file
    pub fn from_fixtures_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_fixtures_json(&content)
    }

    /// Simulated job latency applied to every query
    pub fn with_latency(self, latency: Duration) -> Self {
        if let Ok(mut current) = self.latency.write() {
            *current = latency;
        }
        self
    }

    /// Append rows to the table for `query`
    pub fn insert_rows(&self, query: &str, rows: Vec<Row>) {
        if let Ok(mut tables) = self.tables.write() {
            tables.entry(query.to_string()).or_default().extend(rows);
        }
    }

    /// Make every future submission of `query` fail with `error`
    pub fn fail_query(&self, query: &str, error: QueryError) {
        if let Ok(mut failures) = self.failures.write() {
            failures.insert(query.to_string(), error);
        }
    }

    /// Number of times `query` was submitted
    pub fn executions(&self, query: &str) -> usize {
        self.executions
            .read()
            .map(|e| e.get(query).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of submissions across all queries
    pub fn total_executions(&self) -> usize {
        self.executions
            .read()
            .map(|e| e.values().sum())
            .unwrap_or(0)
    }

    fn record_execution(&self, query: &str) -> Result<(), QueryError> {
        let mut executions = self
            .executions
            .write()
            .map_err(|e| QueryError::backend(format!("Failed to acquire write lock: {}", e)))?;
        *executions.entry(query.to_string()).or_insert(0) += 1;
        Ok(())
    }
}

fn row_matches(row: &Row, parameters: &QueryParameters) -> bool {
    parameters.iter().all(|(name, value)| {
        row.get(name).ok().flatten() == Some(value.as_str())
    })
}

impl QueryBackend for InMemoryBackend {
    fn submit(
        &self,
        query: &str,
        parameters: &QueryParameters,
    ) -> Result<Box<dyn JobHandle>, QueryError> {
        self.record_execution(query)?;

        let failure = self
            .failures
            .read()
            .map_err(|e| QueryError::backend(format!("Failed to acquire read lock: {}", e)))?
            .get(query)
            .cloned();

        let rows = match failure {
            Some(error) => Err(error),
            None => {
                let tables = self.tables.read().map_err(|e| {
                    QueryError::backend(format!("Failed to acquire read lock: {}", e))
                })?;
                Ok(tables
                    .get(query)
                    .map(|rows| {
                        rows.iter()
                            .filter(|row| row_matches(row, parameters))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default())
            }
        };

        let latency = self.latency.read().map(|l| *l).unwrap_or_default();

        Ok(Box::new(InMemoryJob { rows, latency }))
    }
}

/// Job handle returned by [`InMemoryBackend`]
struct InMemoryJob {
    rows: Result<Vec<Row>, QueryError>,
    latency: Duration,
}

impl JobHandle for InMemoryJob {
    fn wait(self: Box<Self>) -> Result<Vec<Row>, QueryError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::QueryParameter;

    const SQL: &str = "SELECT id, title FROM books WHERE id = @id";

    fn id_param(id: &str) -> QueryParameters {
        let mut params = QueryParameters::new();
        params.insert("id".to_string(), QueryParameter::String(id.to_string()));
        params
    }

    fn run(backend: &InMemoryBackend, query: &str, params: &QueryParameters) -> Vec<Row> {
        backend
            .submit(query, params)
            .expect("submit should succeed")
            .wait()
            .expect("wait should succeed")
    }

    #[test]
    fn test_filters_rows_by_parameter() {
        let backend = InMemoryBackend::new();
        backend.insert_rows(
            SQL,
            vec![
                Row::new().with("id", "b1").with("title", "Dune"),
                Row::new().with("id", "b2").with("title", "Emma"),
            ],
        );

        let rows = run(&backend, SQL, &id_param("b2"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("title"), Ok(Some("Emma")));
    }

    #[test]
    fn test_unknown_query_returns_no_rows() {
        let backend = InMemoryBackend::new();
        assert!(run(&backend, "SELECT 1", &QueryParameters::new()).is_empty());
    }

    #[test]
    fn test_counts_executions_per_query() {
        let backend = InMemoryBackend::new();
        run(&backend, SQL, &id_param("b1"));
        run(&backend, SQL, &id_param("b2"));
        run(&backend, "SELECT 1", &QueryParameters::new());

        assert_eq!(backend.executions(SQL), 2);
        assert_eq!(backend.executions("SELECT 1"), 1);
        assert_eq!(backend.total_executions(), 3);

        // clones share counters
        let clone = backend.clone();
        run(&clone, SQL, &id_param("b1"));
        assert_eq!(backend.executions(SQL), 3);
    }

    #[test]
    fn test_failure_injection() {
        let backend = InMemoryBackend::new();
        backend.fail_query(SQL, QueryError::backend("table not found"));

        let err = backend
            .submit(SQL, &id_param("b1"))
            .expect("submit records the job")
            .wait()
            .expect_err("job should fail");
        assert_eq!(err, QueryError::backend("table not found"));
        assert_eq!(backend.executions(SQL), 1);
    }

    #[test]
    fn test_fixtures_json() {
        let json = r#"{
            "SELECT id, title FROM books WHERE id = @id": [
                {"id": "b1", "title": "Dune"},
                {"id": "b2", "title": null}
            ]
        }"#;
        let backend = InMemoryBackend::from_fixtures_json(json).expect("fixtures should load");

        let rows = run(&backend, SQL, &id_param("b2"));
        assert_eq!(rows[0].get("title"), Ok(None));
    }

    #[test]
    fn test_row_without_parameter_column_never_matches() {
        let query = "SELECT id, title FROM books WHERE authorId = @id";
        let backend = InMemoryBackend::new();
        backend.insert_rows(
            query,
            vec![
                Row::new().with("title", "Dune"),
                Row::new().with("id", "a1").with("title", "Dune Messiah"),
            ],
        );

        let rows = run(&backend, query, &id_param("a2"));
        assert!(rows.is_empty());

        let rows = run(&backend, query, &id_param("a1"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("title"), Ok(Some("Dune Messiah")));
    }
}
