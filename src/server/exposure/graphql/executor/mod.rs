//! GraphQL executor module
//!
//! Executes request documents against an [`ExecutableSchema`](super::ExecutableSchema):
//! - `core`: operation selection and request orchestration
//! - `field_resolver`: selection set and field resolution
//! - `utils`: value and argument conversion

mod core;
mod field_resolver;
pub(crate) mod utils;

pub use core::GraphQLExecutor;
