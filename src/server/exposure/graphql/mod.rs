//! GraphQL API exposure
//!
//! Serves the executable schema over HTTP:
//! - `POST /graphql`: execute a query
//! - `GET /graphql/playground`: interactive playground
//! - `GET /graphql/schema`: the SDL the schema was built from

mod executor;
mod schema;

pub use executor::GraphQLExecutor;
pub use schema::{
    AppliedDirective, ArgumentDef, ExecutableSchema, FieldDef, ObjectDef, RuntimeWiring,
};

use crate::server::host::ServerHost;
use async_graphql::http::{GraphQLPlaygroundConfig, playground_source};
use axum::{
    Router,
    extract::{Extension, Json as AxumJson},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQLRequestBody {
    query: String,
    #[serde(default)]
    variables: Option<HashMap<String, Value>>,
    #[serde(default)]
    operation_name: Option<String>,
}

/// GraphQL API exposure implementation
pub struct GraphQLExposure;

impl GraphQLExposure {
    /// Build the GraphQL router from a host
    ///
    /// ```rust,ignore
    /// let host = Arc::new(builder.build_host()?);
    /// let app = GraphQLExposure::build_router(host);
    /// ```
    pub fn build_router(host: Arc<ServerHost>) -> Router {
        Router::new()
            .route("/graphql", post(graphql_handler))
            .route("/graphql/playground", get(graphql_playground))
            .route("/graphql/schema", get(graphql_schema))
            .layer(Extension(host))
    }
}

/// Handler for GraphQL queries
async fn graphql_handler(
    Extension(host): Extension<Arc<ServerHost>>,
    AxumJson(request): AxumJson<GraphQLRequestBody>,
) -> Response {
    let result = host
        .executor()
        .execute_operation(
            &request.query,
            request.variables,
            request.operation_name.as_deref(),
        )
        .await;

    match result {
        Ok(response) => AxumJson(response).into_response(),
        Err(e) => {
            tracing::debug!(error = %e, "rejected GraphQL request");
            e.into_response()
        }
    }
}

/// Handler for GraphQL playground UI
async fn graphql_playground() -> impl IntoResponse {
    Html(playground_source(GraphQLPlaygroundConfig::new("/graphql")))
}

/// Handler for GraphQL schema SDL export
async fn graphql_schema(Extension(host): Extension<Arc<ServerHost>>) -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        host.schema().sdl().to_string(),
    )
}
