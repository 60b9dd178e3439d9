//! Turns field descriptors into blocking resolver functions

use crate::core::backend::{QueryParameter, QueryParameters, Row};
use crate::core::context::{CallContext, render_value};
use crate::core::descriptor::FieldDescriptor;
use crate::core::error::QueryError;
use crate::core::executor::QueryExecutor;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

/// One mapped result row: configured column name to its string value
pub type Record = IndexMap<String, Option<String>>;

/// A resolver that blocks on the backend
pub type BlockingResolver =
    Arc<dyn Fn(&CallContext) -> Result<Option<Record>, QueryError> + Send + Sync>;

/// Maps backend rows to [`Record`]s using a fixed list of column names
#[derive(Debug, Clone)]
pub struct RowMapper {
    columns: Arc<[String]>,
}

impl RowMapper {
    pub fn new(columns: &[String]) -> Self {
        Self {
            columns: columns.into(),
        }
    }

    /// Copy every configured column out of `row`, in configured order
    ///
    /// Fails on the first configured column the row does not carry.
    pub fn map(&self, row: &Row) -> Result<Record, QueryError> {
        let mut record = Record::with_capacity(self.columns.len());
        for column in self.columns.iter() {
            let value = row.get(column)?;
            record.insert(column.clone(), value.map(str::to_string));
        }
        Ok(record)
    }
}

/// Convert a record into the JSON object handed to the schema engine
pub fn record_to_json(record: Record) -> Value {
    let object: Map<String, Value> = record
        .into_iter()
        .map(|(k, v)| (k, v.map_or(Value::Null, Value::String)))
        .collect();
    Value::Object(object)
}

/// Builds resolvers that run a descriptor's query for a single row
#[derive(Clone)]
pub struct ResolverFactory {
    executor: QueryExecutor,
}

impl ResolverFactory {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Build the blocking resolver for `descriptor`
    ///
    /// The resolver binds the descriptor's source argument (read from the
    /// parent entity when there is one, from the call arguments otherwise) to
    /// its destination parameter as a string, runs the query and returns the
    /// first row, or `None` when the result set is empty.
    pub fn build_resolver(&self, descriptor: &FieldDescriptor) -> BlockingResolver {
        let executor = self.executor.clone();
        let mapper = RowMapper::new(descriptor.column_mapping());
        let query = descriptor.query_text().to_string();
        let source = descriptor.source_argument().to_string();
        let destination = descriptor.destination_parameter().to_string();

        Arc::new(move |ctx: &CallContext| -> Result<Option<Record>, QueryError> {
            let parameters = resolve_query_parameters(ctx, &source, &destination)?;
            let records = executor.execute(&query, &parameters, |row| mapper.map(row))?;
            Ok(records.into_iter().next())
        })
    }
}

/// Build the one-entry parameter map for a call
pub fn resolve_query_parameters(
    ctx: &CallContext,
    source: &str,
    destination: &str,
) -> Result<QueryParameters, QueryError> {
    let value = ctx.lookup(source).ok_or_else(|| QueryError::MissingArgument {
        name: source.to_string(),
    })?;

    let mut parameters = QueryParameters::new();
    parameters.insert(
        destination.to_string(),
        QueryParameter::String(render_value(value)),
    );
    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::Arguments;
    use crate::storage::InMemoryBackend;
    use serde_json::json;

    const BOOK_SQL: &str = "SELECT id, title, authorId FROM books WHERE id = @id";
    const AUTHOR_SQL: &str = "SELECT id, firstName, lastName FROM authors WHERE id = @id";

    fn book_descriptor() -> FieldDescriptor {
        FieldDescriptor::new("Query", "bookById", BOOK_SQL, "id,title,authorId", "id", "id")
            .expect("valid descriptor")
    }

    fn backend() -> Arc<InMemoryBackend> {
        let backend = InMemoryBackend::new();
        backend.insert_rows(
            BOOK_SQL,
            vec![
                Row::new()
                    .with("id", "b1")
                    .with("title", "Dune")
                    .with("authorId", "a1"),
                Row::new()
                    .with("id", "b2")
                    .with("title", "Emma")
                    .with("authorId", "a2"),
            ],
        );
        backend.insert_rows(
            AUTHOR_SQL,
            vec![
                Row::new()
                    .with("id", "a1")
                    .with("firstName", "Frank")
                    .with("lastName", "Herbert"),
            ],
        );
        Arc::new(backend)
    }

    fn id_args(id: &str) -> Arguments {
        let mut args = Arguments::new();
        args.insert("id".to_string(), json!(id));
        args
    }

    #[test]
    fn test_root_field_resolves_first_row() {
        let backend = backend();
        let factory = ResolverFactory::new(QueryExecutor::new(backend.clone()));
        let resolver = factory.build_resolver(&book_descriptor());

        let record = resolver(&CallContext::root(id_args("b1")))
            .expect("resolution should succeed")
            .expect("book should exist");

        let json = serde_json::to_string(&record_to_json(record)).expect("serialize");
        assert_eq!(json, r#"{"id":"b1","title":"Dune","authorId":"a1"}"#);
        assert_eq!(backend.executions(BOOK_SQL), 1);
    }

    #[test]
    fn test_empty_result_is_none() {
        let factory = ResolverFactory::new(QueryExecutor::new(backend()));
        let resolver = factory.build_resolver(&book_descriptor());

        let result = resolver(&CallContext::root(id_args("missing")))
            .expect("empty result is not an error");
        assert!(result.is_none());
    }

    #[test]
    fn test_nested_field_reads_parent_attribute() {
        let descriptor = FieldDescriptor::new(
            "Book",
            "author",
            AUTHOR_SQL,
            "id,firstName,lastName",
            "authorId",
            "id",
        )
        .expect("valid descriptor");
        let factory = ResolverFactory::new(QueryExecutor::new(backend()));
        let resolver = factory.build_resolver(&descriptor);

        let mut parent = Map::new();
        parent.insert("id".to_string(), json!("b1"));
        parent.insert("authorId".to_string(), json!("a1"));

        let record = resolver(&CallContext::with_parent(parent, Arguments::new()))
            .expect("resolution should succeed")
            .expect("author should exist");
        assert_eq!(record.get("lastName"), Some(&Some("Herbert".to_string())));
    }

    #[test]
    fn test_missing_column_fails_without_partial_record() {
        let descriptor = FieldDescriptor::new(
            "Query",
            "bookById",
            BOOK_SQL,
            "id,title,isbn",
            "id",
            "id",
        )
        .expect("valid descriptor");
        let factory = ResolverFactory::new(QueryExecutor::new(backend()));
        let resolver = factory.build_resolver(&descriptor);

        let err = resolver(&CallContext::root(id_args("b1"))).expect_err("isbn is not returned");
        assert_eq!(
            err,
            QueryError::MissingColumn {
                column: "isbn".to_string()
            }
        );
    }

    #[test]
    fn test_missing_argument_is_an_error() {
        let factory = ResolverFactory::new(QueryExecutor::new(backend()));
        let resolver = factory.build_resolver(&book_descriptor());

        let err = resolver(&CallContext::root(Arguments::new())).expect_err("no id argument");
        assert!(matches!(err, QueryError::MissingArgument { .. }));
    }

    #[test]
    fn test_non_string_argument_bound_as_string() {
        let ctx = CallContext::root({
            let mut args = Arguments::new();
            args.insert("id".to_string(), json!(7));
            args
        });
        let params = resolve_query_parameters(&ctx, "id", "bookId").expect("params");
        assert_eq!(
            params.get("bookId"),
            Some(&QueryParameter::String("7".to_string()))
        );
    }

    #[test]
    fn test_row_mapper_null_cell() {
        let mapper = RowMapper::new(&["id".to_string(), "subtitle".to_string()]);
        let record = mapper
            .map(&Row::new().with("id", "b1").with_null("subtitle"))
            .expect("null cell maps");
        assert_eq!(record_to_json(record), json!({"id": "b1", "subtitle": null}));
    }
}
