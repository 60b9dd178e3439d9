//! Server host holding the state every exposure serves from
//!
//! The host is transport-agnostic: it owns the executable schema (and with it
//! every bound resolver and field cache) for the life of the process.

use super::exposure::graphql::{ExecutableSchema, GraphQLExecutor};
use std::sync::Arc;

/// Host context containing all request-serving state
pub struct ServerHost {
    schema: Arc<ExecutableSchema>,
    executor: GraphQLExecutor,
}

impl ServerHost {
    pub fn new(schema: ExecutableSchema) -> Self {
        let schema = Arc::new(schema);
        Self {
            executor: GraphQLExecutor::new(schema.clone()),
            schema,
        }
    }

    pub fn schema(&self) -> &Arc<ExecutableSchema> {
        &self.schema
    }

    pub fn executor(&self) -> &GraphQLExecutor {
        &self.executor
    }
}
