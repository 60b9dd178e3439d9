//! Moves blocking resolvers off the request-serving threads
//!
//! [`AsyncDispatcher::wrap`] turns a [`BlockingResolver`] into a
//! [`FieldResolver`]: every call schedules the blocking work on the worker
//! pool straight away and returns a shareable future. A failure inside the
//! blocking resolver never escapes as an error; it is logged with the field's
//! descriptor and the future settles to [`FieldOutcome::Degraded`], which the
//! schema engine renders as `null` so sibling fields still resolve.

use crate::core::context::CallContext;
use crate::core::descriptor::FieldDescriptor;
use crate::core::error::QueryError;
use crate::core::resolver::{BlockingResolver, Record, record_to_json};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Result of resolving one field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    /// The field produced a value
    Resolved(Value),

    /// The query ran and returned no rows
    Empty,

    /// The query failed; the field degrades to `null`
    Degraded { code: &'static str, message: String },
}

impl FieldOutcome {
    /// Value to place in the response: the resolved value or `null`
    pub fn into_value(self) -> Value {
        match self {
            FieldOutcome::Resolved(value) => value,
            FieldOutcome::Empty | FieldOutcome::Degraded { .. } => Value::Null,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, FieldOutcome::Degraded { .. })
    }

    /// Wrap an already-known outcome as a field future
    pub fn ready(self) -> FieldFuture {
        futures::future::ready(self).boxed().shared()
    }
}

impl From<QueryError> for FieldOutcome {
    fn from(err: QueryError) -> Self {
        FieldOutcome::Degraded {
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}

/// A field result that may still be in flight; clones observe the same result
pub type FieldFuture = Shared<BoxFuture<'static, FieldOutcome>>;

/// A non-blocking resolver as bound into the schema
pub type FieldResolver = Arc<dyn Fn(CallContext) -> FieldFuture + Send + Sync>;

/// Schedules blocking resolvers onto the runtime's blocking worker pool
#[derive(Clone)]
pub struct AsyncDispatcher {
    handle: Handle,
}

impl AsyncDispatcher {
    /// Dispatch onto the runtime behind `handle`
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Dispatch onto the runtime the caller is running in
    pub fn from_current() -> anyhow::Result<Self> {
        Ok(Self::new(Handle::try_current()?))
    }

    /// Wrap `resolver` so each call runs it exactly once on the worker pool
    pub fn wrap(&self, descriptor: &FieldDescriptor, resolver: BlockingResolver) -> FieldResolver {
        let handle = self.handle.clone();
        let descriptor = Arc::new(descriptor.clone());

        Arc::new(move |ctx: CallContext| {
            let resolver = resolver.clone();
            let descriptor = descriptor.clone();
            let task = handle.spawn_blocking(move || resolver(&ctx));

            async move {
                let result = match task.await {
                    Ok(result) => result,
                    Err(join_error) => Err(QueryError::interrupted(join_error.to_string())),
                };
                settle(&descriptor, result)
            }
            .boxed()
            .shared()
        })
    }
}

fn settle(
    descriptor: &FieldDescriptor,
    result: Result<Option<Record>, QueryError>,
) -> FieldOutcome {
    match result {
        Ok(Some(record)) => FieldOutcome::Resolved(record_to_json(record)),
        Ok(None) => FieldOutcome::Empty,
        Err(err) => {
            tracing::error!(
                type_name = descriptor.type_name(),
                field_name = descriptor.field_name(),
                code = err.error_code(),
                "Exception {} with query: {}; field resolves to null",
                err,
                descriptor
            );
            FieldOutcome::from(err)
        }
    }
}
