//! Query backend implementations

#[cfg(feature = "bigquery")]
pub mod bigquery;
pub mod in_memory;

#[cfg(feature = "bigquery")]
pub use bigquery::BigQueryBackend;
pub use in_memory::InMemoryBackend;
