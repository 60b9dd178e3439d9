//! Query backend abstraction
//!
//! The backend is a black box that accepts a parameterized query, runs it as a
//! job and hands back result rows. Both calls block the calling thread; callers
//! are expected to run them on a worker pool (see [`crate::core::dispatch`]).

use crate::core::error::QueryError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A named query parameter value
///
/// Only string parameters are bound today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "UPPERCASE")]
pub enum QueryParameter {
    String(String),
}

impl QueryParameter {
    /// Backend type name of the parameter (`STRING`, ...)
    pub fn type_name(&self) -> &'static str {
        match self {
            QueryParameter::String(_) => "STRING",
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            QueryParameter::String(s) => s,
        }
    }
}

impl fmt::Display for QueryParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryParameter::String(s) => write!(f, "{}", s),
        }
    }
}

/// Named parameters, kept sorted by name
pub type QueryParameters = BTreeMap<String, QueryParameter>;

/// One result row
///
/// Cells are addressed by column name. `None` is a SQL `NULL`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    cells: IndexMap<String, Option<String>>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style cell insertion
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.cells.insert(column.into(), Some(value.into()));
        self
    }

    pub fn with_null(mut self, column: impl Into<String>) -> Self {
        self.cells.insert(column.into(), None);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Option<String>) {
        self.cells.insert(column.into(), value);
    }

    /// String value of a named column
    ///
    /// Fails with [`QueryError::MissingColumn`] if the row has no such column.
    pub fn get(&self, column: &str) -> Result<Option<&str>, QueryError> {
        self.cells
            .get(column)
            .map(|cell| cell.as_deref())
            .ok_or_else(|| QueryError::MissingColumn {
                column: column.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(k, v)| (k.into(), Some(v.into())))
                .collect(),
        }
    }
}

/// A submitted backend job
pub trait JobHandle: Send {
    /// Block until the job completes and return every result row
    fn wait(self: Box<Self>) -> Result<Vec<Row>, QueryError>;
}

/// A query backend
///
/// Implementations are shared read-only across all concurrent resolver
/// invocations.
pub trait QueryBackend: Send + Sync {
    /// Submit a query with named parameters
    fn submit(
        &self,
        query: &str,
        parameters: &QueryParameters,
    ) -> Result<Box<dyn JobHandle>, QueryError>;
}

/// A job whose rows are already known when it is submitted
pub struct CompletedJob {
    rows: Result<Vec<Row>, QueryError>,
}

impl CompletedJob {
    pub fn new(rows: Result<Vec<Row>, QueryError>) -> Self {
        Self { rows }
    }
}

impl JobHandle for CompletedJob {
    fn wait(self: Box<Self>) -> Result<Vec<Row>, QueryError> {
        self.rows
    }
}
