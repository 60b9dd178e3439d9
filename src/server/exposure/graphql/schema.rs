//! Executable schema: SDL object types bound to field resolvers
//!
//! The SDL is parsed with `graphql-parser` and indexed into object types,
//! their fields, output types and argument defaults. Resolvers come from a
//! [`RuntimeWiring`]; after binding, every registered [`DirectiveWiring`] is
//! applied to each field carrying its directive and may replace that field's
//! resolver.

use super::executor::utils::gql_value_to_json;
use crate::core::directive::{DirectiveArguments, DirectiveWiring, FieldWiringEnvironment};
use crate::core::dispatch::FieldResolver;
use crate::core::error::SchemaError;
use graphql_parser::schema::{
    Definition, Directive, Field, Type, TypeDefinition, TypeExtension, parse_schema,
};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_QUERY_TYPE: &str = "Query";

/// Resolver and directive bindings to apply to an SDL document
#[derive(Default)]
pub struct RuntimeWiring {
    resolvers: HashMap<(String, String), FieldResolver>,
    directives: HashMap<String, Arc<dyn DirectiveWiring>>,
}

impl RuntimeWiring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `resolver` to `type_name.field_name`, replacing any earlier binding
    pub fn resolver(
        mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        resolver: FieldResolver,
    ) -> Self {
        self.resolvers
            .insert((type_name.into(), field_name.into()), resolver);
        self
    }

    /// Register a directive handler under its own name
    pub fn directive(mut self, handler: Arc<dyn DirectiveWiring>) -> Self {
        self.directives.insert(handler.name().to_string(), handler);
        self
    }

    pub fn has_resolver(&self, type_name: &str, field_name: &str) -> bool {
        self.resolvers
            .contains_key(&(type_name.to_string(), field_name.to_string()))
    }

    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }
}

/// One argument declared on a schema field
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentDef {
    pub name: String,
    pub default_value: Option<Value>,
}

/// Applied directive, arguments converted to JSON
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedDirective {
    pub name: String,
    pub arguments: DirectiveArguments,
}

/// One field of an object type
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,

    /// Named output type with list and non-null wrappers removed
    pub type_name: String,

    pub is_list: bool,
    pub arguments: Vec<ArgumentDef>,
    pub directives: Vec<AppliedDirective>,
}

/// An object type and its fields in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDef {
    pub name: String,
    pub fields: IndexMap<String, FieldDef>,
}

/// Parsed SDL with resolvers bound, ready for execution
pub struct ExecutableSchema {
    sdl: String,
    query_type: String,
    objects: IndexMap<String, ObjectDef>,
    resolvers: HashMap<(String, String), FieldResolver>,
}

impl ExecutableSchema {
    /// Parse `sdl`, bind the wiring's resolvers and apply its directives
    pub fn build(sdl: &str, wiring: RuntimeWiring) -> Result<Self, SchemaError> {
        let document =
            parse_schema::<String>(sdl).map_err(|e| SchemaError::Parse(e.to_string()))?;

        let mut query_type: Option<String> = None;
        let mut objects: IndexMap<String, ObjectDef> = IndexMap::new();

        for definition in &document.definitions {
            match definition {
                Definition::SchemaDefinition(schema) => {
                    query_type = schema.query.clone();
                }
                Definition::TypeDefinition(TypeDefinition::Object(object)) => {
                    let entry = objects
                        .entry(object.name.clone())
                        .or_insert_with(|| ObjectDef {
                            name: object.name.clone(),
                            fields: IndexMap::new(),
                        });
                    for field in &object.fields {
                        entry.fields.insert(field.name.clone(), field_def(field));
                    }
                }
                Definition::TypeExtension(TypeExtension::Object(extension)) => {
                    let entry = objects
                        .entry(extension.name.clone())
                        .or_insert_with(|| ObjectDef {
                            name: extension.name.clone(),
                            fields: IndexMap::new(),
                        });
                    for field in &extension.fields {
                        entry.fields.insert(field.name.clone(), field_def(field));
                    }
                }
                _ => {}
            }
        }

        let query_type = query_type.unwrap_or_else(|| DEFAULT_QUERY_TYPE.to_string());
        if !objects.contains_key(&query_type) {
            return Err(SchemaError::UnknownType {
                type_name: query_type,
            });
        }

        let RuntimeWiring {
            mut resolvers,
            directives,
        } = wiring;

        for (type_name, field_name) in resolvers.keys() {
            let object = objects
                .get(type_name)
                .ok_or_else(|| SchemaError::UnknownType {
                    type_name: type_name.clone(),
                })?;
            if !object.fields.contains_key(field_name) {
                return Err(SchemaError::UnknownField {
                    type_name: type_name.clone(),
                    field_name: field_name.clone(),
                });
            }
        }

        for object in objects.values() {
            for field in object.fields.values() {
                for applied in &field.directives {
                    let Some(handler) = directives.get(&applied.name) else {
                        continue;
                    };
                    let key = (object.name.clone(), field.name.clone());
                    let replacement = handler.on_field(FieldWiringEnvironment {
                        type_name: &object.name,
                        field_name: &field.name,
                        root: object.name == query_type,
                        arguments: &applied.arguments,
                        resolver: resolvers.get(&key).cloned(),
                    })?;
                    if let Some(resolver) = replacement {
                        resolvers.insert(key, resolver);
                    }
                }
            }
        }

        Ok(Self {
            sdl: sdl.to_string(),
            query_type,
            objects,
            resolvers,
        })
    }

    /// The SDL this schema was built from
    pub fn sdl(&self) -> &str {
        &self.sdl
    }

    pub fn query_type(&self) -> &str {
        &self.query_type
    }

    pub fn object(&self, type_name: &str) -> Option<&ObjectDef> {
        self.objects.get(type_name)
    }

    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDef> {
        self.objects
            .get(type_name)
            .and_then(|object| object.fields.get(field_name))
    }

    pub fn resolver(&self, type_name: &str, field_name: &str) -> Option<&FieldResolver> {
        self.resolvers
            .get(&(type_name.to_string(), field_name.to_string()))
    }
}

impl std::fmt::Debug for ExecutableSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutableSchema")
            .field("query_type", &self.query_type)
            .field("objects", &self.objects.keys().collect::<Vec<_>>())
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

fn field_def(field: &Field<'_, String>) -> FieldDef {
    let (type_name, is_list) = unwrap_type(&field.field_type);
    let no_variables = HashMap::new();

    FieldDef {
        name: field.name.clone(),
        type_name,
        is_list,
        arguments: field
            .arguments
            .iter()
            .map(|input| ArgumentDef {
                name: input.name.clone(),
                default_value: input
                    .default_value
                    .as_ref()
                    .map(|value| gql_value_to_json(value, &no_variables)),
            })
            .collect(),
        directives: field
            .directives
            .iter()
            .map(|directive| applied_directive(directive, &no_variables))
            .collect(),
    }
}

fn applied_directive(
    directive: &Directive<'_, String>,
    no_variables: &HashMap<String, Value>,
) -> AppliedDirective {
    AppliedDirective {
        name: directive.name.clone(),
        arguments: directive
            .arguments
            .iter()
            .map(|(name, value)| (name.clone(), gql_value_to_json(value, no_variables)))
            .collect(),
    }
}

fn unwrap_type(field_type: &Type<'_, String>) -> (String, bool) {
    match field_type {
        Type::NamedType(name) => (name.clone(), false),
        Type::NonNullType(inner) => unwrap_type(inner),
        Type::ListType(inner) => (unwrap_type(inner).0, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::CacheDirective;
    use crate::core::context::CallContext;
    use crate::core::dispatch::FieldOutcome;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SDL: &str = r#"
        directive @cache(ms: Int!, key: String) on FIELD_DEFINITION

        type Query {
            bookById(id: ID, format: String = "short"): Book @cache(ms: 15000)
            books: [Book!]!
        }

        type Book {
            id: ID!
            title: String
            authorId: ID
        }

        extend type Book {
            author: Author
        }

        type Author {
            id: ID!
            lastName: String
        }
    "#;

    fn counting() -> (FieldResolver, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let resolver: FieldResolver = Arc::new(move |_ctx: CallContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            FieldOutcome::Resolved(json!({"id": "b1"})).ready()
        });
        (resolver, calls)
    }

    #[test]
    fn test_indexes_types_fields_and_defaults() {
        let schema = ExecutableSchema::build(SDL, RuntimeWiring::new()).expect("valid schema");

        assert_eq!(schema.query_type(), "Query");
        let book_by_id = schema.field("Query", "bookById").expect("field exists");
        assert_eq!(book_by_id.type_name, "Book");
        assert!(!book_by_id.is_list);
        assert_eq!(book_by_id.arguments[1].default_value, Some(json!("short")));
        assert_eq!(book_by_id.directives[0].name, "cache");
        assert_eq!(book_by_id.directives[0].arguments.get("ms"), Some(&json!(15000)));

        let books = schema.field("Query", "books").expect("field exists");
        assert_eq!(books.type_name, "Book");
        assert!(books.is_list);

        // extensions merge into the extended type
        assert!(schema.field("Book", "author").is_some());
        assert!(schema.field("Book", "title").is_some());
    }

    #[test]
    fn test_schema_definition_sets_query_type() {
        let sdl = "schema { query: Root } type Root { ping: String }";
        let schema = ExecutableSchema::build(sdl, RuntimeWiring::new()).expect("valid schema");
        assert_eq!(schema.query_type(), "Root");
    }

    #[test]
    fn test_missing_query_type_rejected() {
        let err = ExecutableSchema::build("type Book { id: ID }", RuntimeWiring::new())
            .expect_err("no Query type");
        assert!(matches!(err, SchemaError::UnknownType { .. }));
    }

    #[test]
    fn test_parse_error() {
        let err = ExecutableSchema::build("type Query {", RuntimeWiring::new())
            .expect_err("truncated SDL");
        assert!(matches!(err, SchemaError::Parse(_)));
    }

    #[test]
    fn test_wiring_unknown_coordinates_rejected() {
        let (resolver, _) = counting();
        let err = ExecutableSchema::build(
            SDL,
            RuntimeWiring::new().resolver("Publisher", "name", resolver.clone()),
        )
        .expect_err("unknown type");
        assert!(matches!(err, SchemaError::UnknownType { .. }));

        let err = ExecutableSchema::build(
            SDL,
            RuntimeWiring::new().resolver("Book", "isbn", resolver),
        )
        .expect_err("unknown field");
        assert!(matches!(err, SchemaError::UnknownField { .. }));
    }

    #[test]
    fn test_directive_replaces_resolver() {
        let (resolver, calls) = counting();
        let wiring = RuntimeWiring::new()
            .resolver("Query", "bookById", resolver)
            .directive(Arc::new(CacheDirective::new()));
        let schema = ExecutableSchema::build(SDL, wiring).expect("valid schema");

        let bound = schema.resolver("Query", "bookById").expect("resolver bound");
        let mut args = crate::core::context::Arguments::new();
        args.insert("id".to_string(), json!("b1"));
        let _ = bound(CallContext::root(args.clone()));
        let _ = bound(CallContext::root(args));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregistered_directive_ignored() {
        let (resolver, calls) = counting();
        let wiring = RuntimeWiring::new().resolver("Query", "bookById", resolver);
        let schema = ExecutableSchema::build(SDL, wiring).expect("valid schema");

        let bound = schema.resolver("Query", "bookById").expect("resolver bound");
        let _ = bound(CallContext::root(Default::default()));
        let _ = bound(CallContext::root(Default::default()));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalid_directive_fails_build() {
        let sdl = "type Query { bookById(id: ID): String @cache(ms: 0) }";
        let (resolver, _) = counting();
        let wiring = RuntimeWiring::new()
            .resolver("Query", "bookById", resolver)
            .directive(Arc::new(CacheDirective::new()));

        let err = ExecutableSchema::build(sdl, wiring).expect_err("zero ttl");
        assert!(matches!(err, SchemaError::InvalidDirective { .. }));
    }
}
