//! ServerBuilder for fluent API to build HTTP servers

use super::exposure::graphql::ExecutableSchema;
use super::exposure::{GraphQLExposure, health_routes};
use super::host::ServerHost;
use super::wiring::wire_descriptors;
use crate::config::{BackendKind, GatewayConfig};
use crate::core::backend::QueryBackend;
use crate::core::descriptor::{FieldDescriptor, load_descriptors};
use crate::core::directive::DirectiveWiring;
use crate::core::dispatch::AsyncDispatcher;
use crate::core::executor::{DEFAULT_SLOW_QUERY_THRESHOLD, QueryExecutor};
use crate::core::resolver::ResolverFactory;
use crate::storage::InMemoryBackend;
use anyhow::{Context, Result};
use axum::Router;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Builder for the GraphQL server
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_backend(InMemoryBackend::from_fixtures_file("fixtures.json")?)
///     .load_descriptors("wirings.json")?
///     .load_schema("schema.graphqls")?
///     .build()?;
/// ```
pub struct ServerBuilder {
    backend: Option<Arc<dyn QueryBackend>>,
    descriptors: Vec<FieldDescriptor>,
    schema_sdl: Option<String>,
    slow_query_threshold: Duration,
    dispatcher: Option<AsyncDispatcher>,
    directives: Vec<Arc<dyn DirectiveWiring>>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            backend: None,
            descriptors: Vec::new(),
            schema_sdl: None,
            slow_query_threshold: DEFAULT_SLOW_QUERY_THRESHOLD,
            dispatcher: None,
            directives: Vec::new(),
            custom_routes: Vec::new(),
        }
    }

    /// Prepare a builder from process configuration
    ///
    /// Loads the descriptor metadata, the SDL and the configured backend.
    /// Must be called inside a tokio runtime when the backend needs one.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let backend = backend_from_config(config)?;
        Self::new()
            .with_shared_backend(backend)
            .with_slow_query_threshold(config.backend.slow_query_threshold())
            .load_descriptors(&config.wirings_file)?
            .load_schema(&config.schema_file)
    }

    /// Set the query backend (required)
    pub fn with_backend(self, backend: impl QueryBackend + 'static) -> Self {
        self.with_shared_backend(Arc::new(backend))
    }

    pub fn with_shared_backend(mut self, backend: Arc<dyn QueryBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Add field descriptors
    pub fn with_descriptors(mut self, descriptors: Vec<FieldDescriptor>) -> Self {
        self.descriptors.extend(descriptors);
        self
    }

    /// Add field descriptors from a metadata file
    pub fn load_descriptors(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let descriptors = load_descriptors(path)
            .with_context(|| format!("failed to load field descriptors from {}", path.display()))?;
        tracing::info!(
            "Loaded {} field descriptors from {}",
            descriptors.len(),
            path.display()
        );
        Ok(self.with_descriptors(descriptors))
    }

    /// Set the schema SDL (required)
    pub fn with_schema_sdl(mut self, sdl: impl Into<String>) -> Self {
        self.schema_sdl = Some(sdl.into());
        self
    }

    /// Read the schema SDL from a file
    pub fn load_schema(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let sdl = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read schema from {}", path.display()))?;
        Ok(self.with_schema_sdl(sdl))
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    /// Dispatch blocking resolvers onto a specific runtime
    ///
    /// Defaults to the runtime `build_host` is called from.
    pub fn with_dispatcher(mut self, dispatcher: AsyncDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Register an additional directive handler
    pub fn with_directive(mut self, directive: Arc<dyn DirectiveWiring>) -> Self {
        self.directives.push(directive);
        self
    }

    /// Add custom routes to the server
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the transport-agnostic host
    pub fn build_host(self) -> Result<ServerHost> {
        let backend = self
            .backend
            .ok_or_else(|| anyhow::anyhow!("QueryBackend is required. Call .with_backend()"))?;
        let sdl = self
            .schema_sdl
            .ok_or_else(|| anyhow::anyhow!("Schema is required. Call .with_schema_sdl()"))?;
        let dispatcher = match self.dispatcher {
            Some(dispatcher) => dispatcher,
            None => AsyncDispatcher::from_current()
                .context("ServerBuilder must be built inside a tokio runtime")?,
        };

        let executor = QueryExecutor::new(backend).with_slow_threshold(self.slow_query_threshold);
        let factory = ResolverFactory::new(executor);

        let mut wiring = wire_descriptors(&self.descriptors, &factory, &dispatcher);
        for directive in self.directives {
            wiring = wiring.directive(directive);
        }

        let schema = ExecutableSchema::build(&sdl, wiring).context("failed to build schema")?;
        tracing::info!(
            "Schema ready with {} wired fields (query type {})",
            self.descriptors.len(),
            schema.query_type()
        );

        Ok(ServerHost::new(schema))
    }

    /// Build the router: GraphQL endpoints, health checks and custom routes
    pub fn build(mut self) -> Result<Router> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let host = Arc::new(self.build_host()?);

        let mut app = health_routes().merge(GraphQLExposure::build_router(host));
        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        Ok(app.layer(TraceLayer::new_for_http()))
    }

    /// Serve the application with graceful shutdown
    ///
    /// Handles SIGTERM and SIGINT (Ctrl+C).
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Instantiate the backend named by the configuration
fn backend_from_config(config: &GatewayConfig) -> Result<Arc<dyn QueryBackend>> {
    match config.backend.kind {
        BackendKind::InMemory => {
            let backend = match &config.backend.fixtures {
                Some(path) => InMemoryBackend::from_fixtures_file(path).with_context(|| {
                    format!("failed to load fixtures from {}", path.display())
                })?,
                None => {
                    tracing::warn!(
                        "in-memory backend has no fixtures; every query returns no rows"
                    );
                    InMemoryBackend::new()
                }
            };
            Ok(Arc::new(backend))
        }
        BackendKind::Bigquery => bigquery_backend(config),
    }
}

#[cfg(feature = "bigquery")]
fn bigquery_backend(config: &GatewayConfig) -> Result<Arc<dyn QueryBackend>> {
    use crate::storage::BigQueryBackend;

    let project = config
        .backend
        .project
        .clone()
        .ok_or_else(|| anyhow::anyhow!("backend.project is required for the bigquery backend"))?;
    let handle = tokio::runtime::Handle::try_current()
        .context("the bigquery backend must be created inside a tokio runtime")?;

    let mut backend = BigQueryBackend::from_env(project, &config.backend.access_token_env, handle)?;
    if let Some(location) = &config.backend.location {
        backend = backend.with_location(location.clone());
    }
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "bigquery"))]
fn bigquery_backend(_config: &GatewayConfig) -> Result<Arc<dyn QueryBackend>> {
    anyhow::bail!("BigQuery support is not enabled. Enable the 'bigquery' feature to use it.")
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
