//! API exposure
//!
//! Each exposure consumes a `ServerHost` and produces a Router.

pub mod graphql;

pub use graphql::GraphQLExposure;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

/// Build health check routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
}

/// Health check endpoint handler
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "bqgraph"
    }))
}
