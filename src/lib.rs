//! # bqgraph
//!
//! A metadata-driven GraphQL server whose fields are resolved by
//! parameterized queries against a columnar backend such as BigQuery.
//!
//! ## Features
//!
//! - **Declarative wiring**: each field is described by a JSON descriptor
//!   (type, field, SQL, result columns, parameter binding); no per-field code
//! - **Non-blocking dispatch**: blocking backend queries run on a dedicated
//!   worker pool, never on the request-serving threads
//! - **Partial results**: a failing field is logged and resolves to `null`
//!   while its siblings still resolve
//! - **Per-field caching**: `@cache(ms: ...)` in the SDL memoizes a field's
//!   results for a fixed time
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bqgraph::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     ServerBuilder::new()
//!         .with_backend(InMemoryBackend::from_fixtures_file("fixtures.json")?)
//!         .load_descriptors("wirings.json")?
//!         .load_schema("schema.graphqls")?
//!         .serve("127.0.0.1:8080")
//!         .await
//! }
//! ```
//!
//! A descriptor in `wirings.json`:
//!
//! ```json
//! [{
//!   "typeName": "Query",
//!   "fieldName": "bookById",
//!   "sql": "SELECT id, title, authorId FROM books WHERE id = @id",
//!   "mapperCsv": "id,title,authorId",
//!   "gqlAttr": "id",
//!   "sqlParam": "id"
//! }]
//! ```

pub mod config;
pub mod core;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        backend::{JobHandle, QueryBackend, QueryParameter, QueryParameters, Row},
        cache::{CacheDirective, CacheKeyStrategy, FieldCache},
        context::{Arguments, CallContext},
        descriptor::{FieldDescriptor, load_descriptors},
        directive::{DirectiveWiring, FieldWiringEnvironment},
        dispatch::{AsyncDispatcher, FieldFuture, FieldOutcome, FieldResolver},
        error::{Error, QueryError},
        executor::QueryExecutor,
        resolver::{BlockingResolver, Record, ResolverFactory},
    };

    // === Storage ===
    pub use crate::storage::InMemoryBackend;
    #[cfg(feature = "bigquery")]
    pub use crate::storage::BigQueryBackend;

    // === Config ===
    pub use crate::config::{BackendConfig, BackendKind, GatewayConfig, ServerConfig};

    // === Server ===
    pub use crate::server::{
        ExecutableSchema, GraphQLExecutor, RuntimeWiring, ServerBuilder, ServerHost,
    };

    // === External dependencies ===
    pub use anyhow::Result;
    pub use serde::{Deserialize, Serialize};
}
