//! Per-field TTL caching driven by the `@cache` directive
//!
//! ```graphql
//! type Query {
//!   bookById(id: ID): Book @cache(ms: 15000)
//! }
//!
//! type Book {
//!   author: Author @cache(ms: 60000, key: "authorId")
//! }
//! ```
//!
//! Each annotated field gets its own expiring cache, created once while the
//! schema is wired and owned by the wrapping resolver for the life of the
//! process. Entries hold the field's future rather than its value, so a hit
//! can be served while the first call is still running.
//!
//! There is no single-flight guarantee: two calls that both miss before either
//! has stored its future each run the backend query.

use crate::core::context::{Arguments, CallContext, render_value};
use crate::core::directive::{DirectiveWiring, FieldWiringEnvironment};
use crate::core::dispatch::{FieldFuture, FieldResolver};
use crate::core::error::SchemaError;
use mini_moka::sync::Cache;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Name of the caching directive in the SDL
pub const CACHE_DIRECTIVE: &str = "cache";

/// How a cache key is derived from a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKeyStrategy {
    /// Every call argument contributes to the key
    AllArguments,

    /// Only the named identifier contributes, read from the parent entity when
    /// there is one and from the call arguments otherwise
    Identifier(String),
}

impl CacheKeyStrategy {
    /// Cache key for `ctx`, or `None` when the call cannot be keyed
    pub fn derive_key(&self, ctx: &CallContext) -> Option<String> {
        match self {
            CacheKeyStrategy::AllArguments => Some(arguments_cache_key(ctx.arguments())),
            CacheKeyStrategy::Identifier(name) => ctx
                .lookup(name)
                .map(|value| format!("{}|{}", name, render_value(value))),
        }
    }
}

/// Key over all arguments: `name|value` pairs in descending name order, joined by `,`
///
/// The written order of the arguments does not matter.
pub fn arguments_cache_key(arguments: &Arguments) -> String {
    let mut pairs: Vec<(&String, &Value)> = arguments.iter().collect();
    pairs.sort_by(|a, b| b.0.cmp(a.0));
    pairs
        .into_iter()
        .map(|(name, value)| format!("{}|{}", name, render_value(value)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Expiring store of in-flight or completed field futures for one field
#[derive(Clone)]
pub struct FieldCache {
    coordinate: Arc<str>,
    ttl: Duration,
    strategy: CacheKeyStrategy,
    store: Cache<String, FieldFuture>,
}

impl FieldCache {
    /// Create the cache for one field; capacity is unbounded
    pub fn new(coordinate: impl Into<String>, ttl: Duration, strategy: CacheKeyStrategy) -> Self {
        let coordinate: String = coordinate.into();
        Self {
            coordinate: coordinate.into(),
            ttl,
            strategy,
            store: Cache::builder().time_to_live(ttl).build(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn strategy(&self) -> &CacheKeyStrategy {
        &self.strategy
    }

    /// Serve a call from the cache, or run `resolver` and store its future
    pub fn get_or_resolve(&self, resolver: &FieldResolver, ctx: CallContext) -> FieldFuture {
        let Some(key) = self.strategy.derive_key(&ctx) else {
            tracing::debug!(field = %self.coordinate, "no cache key for call, bypassing cache");
            return resolver(ctx);
        };

        if let Some(future) = self.store.get(&key) {
            tracing::debug!(field = %self.coordinate, key = %key, "cache hit");
            return future;
        }

        tracing::debug!(field = %self.coordinate, key = %key, "cache miss");
        let future = resolver(ctx);
        self.store.insert(key, future.clone());
        future
    }

    /// Interpose this cache in front of `resolver`
    pub fn wrap(self, resolver: FieldResolver) -> FieldResolver {
        Arc::new(move |ctx: CallContext| self.get_or_resolve(&resolver, ctx))
    }
}

/// The `@cache(ms: Int!, key: String)` directive handler
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheDirective;

impl CacheDirective {
    pub fn new() -> Self {
        Self
    }
}

impl DirectiveWiring for CacheDirective {
    fn name(&self) -> &str {
        CACHE_DIRECTIVE
    }

    fn on_field(
        &self,
        env: FieldWiringEnvironment<'_>,
    ) -> Result<Option<FieldResolver>, SchemaError> {
        let ms = env
            .arguments
            .get("ms")
            .and_then(Value::as_i64)
            .ok_or_else(|| env.invalid(CACHE_DIRECTIVE, "argument 'ms' must be an integer"))?;
        if ms <= 0 {
            return Err(env.invalid(CACHE_DIRECTIVE, "argument 'ms' must be positive"));
        }

        let strategy = match env.arguments.get("key") {
            None | Some(Value::Null) => CacheKeyStrategy::AllArguments,
            Some(Value::String(name)) if !name.is_empty() => {
                CacheKeyStrategy::Identifier(name.clone())
            }
            Some(_) => {
                return Err(env.invalid(
                    CACHE_DIRECTIVE,
                    "argument 'key' must be a non-empty string",
                ));
            }
        };

        let coordinate = format!("{}.{}", env.type_name, env.field_name);

        let Some(resolver) = env.resolver else {
            tracing::warn!(
                field = %coordinate,
                "@cache on a field without a wired resolver has no effect"
            );
            return Ok(None);
        };

        if !env.root && strategy == CacheKeyStrategy::AllArguments {
            tracing::warn!(
                field = %coordinate,
                "@cache without 'key' on a nested field is keyed by its own arguments only; \
                 parents share entries unless a key such as key: \"id\" is given"
            );
        }

        tracing::info!(
            field = %coordinate,
            ttl_ms = ms,
            strategy = ?strategy,
            "caching field results"
        );

        let cache = FieldCache::new(coordinate, Duration::from_millis(ms as u64), strategy);
        Ok(Some(cache.wrap(resolver)))
    }
}
