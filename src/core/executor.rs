//! Blocking execution of parameterized backend queries

use crate::core::backend::{QueryBackend, QueryParameters, Row};
use crate::core::error::QueryError;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default threshold above which a query is logged as slow
pub const DEFAULT_SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(1000);

/// Runs queries against a backend and maps the result rows
///
/// `execute` blocks until the backend job has completed. A job typically
/// needs tens of milliseconds to start and can take seconds when cold, so it
/// must never be called from the request-serving threads directly.
#[derive(Clone)]
pub struct QueryExecutor {
    backend: Arc<dyn QueryBackend>,
    slow_threshold: Duration,
}

impl QueryExecutor {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self {
            backend,
            slow_threshold: DEFAULT_SLOW_QUERY_THRESHOLD,
        }
    }

    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    pub fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    /// Run `query` with `parameters` and map every row with `mapper`
    ///
    /// No retries: a rejected or interrupted job surfaces as an error, and
    /// errors raised by `mapper` propagate unchanged.
    pub fn execute<T, F>(
        &self,
        query: &str,
        parameters: &QueryParameters,
        mapper: F,
    ) -> Result<Vec<T>, QueryError>
    where
        F: Fn(&Row) -> Result<T, QueryError>,
    {
        let started = Instant::now();

        let rows = self.backend.submit(query, parameters)?.wait()?;

        let elapsed = started.elapsed();
        let duration_ms = elapsed.as_millis() as u64;
        let params = render_parameters(parameters);
        if is_slow(elapsed, self.slow_threshold) {
            tracing::warn!(
                duration_ms,
                rows = rows.len(),
                "slow query ran in {} ms: {}, params: [{}]",
                duration_ms,
                query,
                params
            );
        } else {
            tracing::info!(
                duration_ms,
                rows = rows.len(),
                "query ran in {} ms: {}, params: [{}]",
                duration_ms,
                query,
                params
            );
        }

        rows.iter().map(mapper).collect()
    }
}

/// A query is slow only when it ran strictly longer than `threshold`
fn is_slow(elapsed: Duration, threshold: Duration) -> bool {
    elapsed > threshold
}

/// Render parameters as `name=value` pairs sorted by name and joined by `|`
pub fn render_parameters(parameters: &QueryParameters) -> String {
    parameters
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("|")
}
