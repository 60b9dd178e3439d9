//! Core resolution pipeline: descriptors, query execution, resolver
//! construction, async dispatch and per-field caching

pub mod backend;
pub mod cache;
pub mod context;
pub mod descriptor;
pub mod directive;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod resolver;

#[cfg(test)]
pub(crate) mod log_capture;

pub use backend::{CompletedJob, JobHandle, QueryBackend, QueryParameter, QueryParameters, Row};
pub use cache::{CACHE_DIRECTIVE, CacheDirective, CacheKeyStrategy, FieldCache};
pub use context::{Arguments, CallContext};
pub use descriptor::{FieldDescriptor, descriptors_from_json_str, load_descriptors};
pub use directive::{DirectiveArguments, DirectiveWiring, FieldWiringEnvironment};
pub use dispatch::{AsyncDispatcher, FieldFuture, FieldOutcome, FieldResolver};
pub use error::{ConfigError, Error, MetadataError, QueryError, RequestError, SchemaError};
pub use executor::QueryExecutor;
pub use resolver::{BlockingResolver, Record, ResolverFactory, RowMapper};
