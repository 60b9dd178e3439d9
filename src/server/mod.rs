//! Server module: schema wiring, GraphQL execution and HTTP exposure
//!
//! [`ServerBuilder`] loads field descriptors, wires them into the schema and
//! produces an axum router serving:
//! - `POST /graphql`, `GET /graphql/playground`, `GET /graphql/schema`
//! - `GET /health`

pub mod builder;
pub mod exposure;
pub mod host;
pub mod wiring;

pub use builder::ServerBuilder;
pub use exposure::graphql::{ExecutableSchema, GraphQLExecutor, RuntimeWiring};
pub use exposure::{GraphQLExposure, health_routes};
pub use host::ServerHost;
pub use wiring::wire_descriptors;
