//! Binds field descriptors into a runtime wiring
//!
//! Every descriptor becomes a blocking resolver from the [`ResolverFactory`],
//! wrapped by the [`AsyncDispatcher`] and bound at its `(type, field)`
//! coordinate. The `@cache` directive handler is always registered, so any
//! cached field in the SDL is wrapped once while the schema is built.

use super::exposure::graphql::RuntimeWiring;
use crate::core::cache::CacheDirective;
use crate::core::descriptor::FieldDescriptor;
use crate::core::dispatch::AsyncDispatcher;
use crate::core::resolver::ResolverFactory;
use std::sync::Arc;

/// Build the runtime wiring for `descriptors`
pub fn wire_descriptors(
    descriptors: &[FieldDescriptor],
    factory: &ResolverFactory,
    dispatcher: &AsyncDispatcher,
) -> RuntimeWiring {
    let mut wiring = RuntimeWiring::new().directive(Arc::new(CacheDirective::new()));

    for descriptor in descriptors {
        tracing::info!(
            type_name = descriptor.type_name(),
            field_name = descriptor.field_name(),
            "wiring field: {}",
            descriptor
        );
        let blocking = factory.build_resolver(descriptor);
        let resolver = dispatcher.wrap(descriptor, blocking);
        wiring = wiring.resolver(descriptor.type_name(), descriptor.field_name(), resolver);
    }

    wiring
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::executor::QueryExecutor;
    use crate::storage::InMemoryBackend;

    #[tokio::test]
    async fn test_every_descriptor_is_bound() {
        let descriptors = vec![
            FieldDescriptor::new("Query", "bookById", "SELECT 1", "id", "id", "id")
                .expect("valid descriptor"),
            FieldDescriptor::new("Book", "author", "SELECT 2", "id", "authorId", "id")
                .expect("valid descriptor"),
        ];
        let factory = ResolverFactory::new(QueryExecutor::new(Arc::new(InMemoryBackend::new())));
        let dispatcher = AsyncDispatcher::from_current().expect("inside runtime");

        let wiring = wire_descriptors(&descriptors, &factory, &dispatcher);

        assert_eq!(wiring.resolver_count(), 2);
        assert!(wiring.has_resolver("Query", "bookById"));
        assert!(wiring.has_resolver("Book", "author"));
        assert!(!wiring.has_resolver("Book", "title"));
    }
}
