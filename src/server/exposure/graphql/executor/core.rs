//! Core GraphQL executor orchestration

use graphql_parser::query::{
    Definition, Document, FragmentDefinition, OperationDefinition, VariableDefinition, parse_query,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use super::field_resolver::{ExecutionContext, resolve_selection_set};
use super::utils::gql_value_to_json;
use crate::core::error::RequestError;
use crate::server::exposure::graphql::schema::ExecutableSchema;

/// GraphQL executor that executes queries against an executable schema
#[derive(Debug, Clone)]
pub struct GraphQLExecutor {
    schema: Arc<ExecutableSchema>,
}

impl GraphQLExecutor {
    pub fn new(schema: Arc<ExecutableSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Arc<ExecutableSchema> {
        &self.schema
    }

    /// Execute a GraphQL query and return the result as JSON
    pub async fn execute(
        &self,
        query: &str,
        variables: Option<HashMap<String, Value>>,
    ) -> Result<Value, RequestError> {
        self.execute_operation(query, variables, None).await
    }

    /// Execute the operation named `operation_name`, or the only one in the document
    pub async fn execute_operation(
        &self,
        query: &str,
        variables: Option<HashMap<String, Value>>,
        operation_name: Option<&str>,
    ) -> Result<Value, RequestError> {
        let doc = parse_query::<String>(query)
            .map_err(|e| RequestError::Parse(e.to_string()))?
            .into_static();

        let result = self
            .execute_document(&doc, variables.unwrap_or_default(), operation_name)
            .await?;

        Ok(json!({
            "data": result
        }))
    }

    /// Execute a parsed GraphQL document
    async fn execute_document(
        &self,
        doc: &Document<'static, String>,
        variables: HashMap<String, Value>,
        operation_name: Option<&str>,
    ) -> Result<Value, RequestError> {
        let operation = select_operation(doc, operation_name)?;

        let (selections, definitions) = match operation {
            OperationDefinition::Query(query) => (
                query.selection_set.items.as_slice(),
                query.variable_definitions.as_slice(),
            ),
            OperationDefinition::SelectionSet(selection_set) => {
                (selection_set.items.as_slice(), &[][..])
            }
            OperationDefinition::Mutation(_) => {
                return Err(RequestError::UnsupportedOperation("Mutation"));
            }
            OperationDefinition::Subscription(_) => {
                return Err(RequestError::UnsupportedOperation("Subscription"));
            }
        };

        let variables = apply_variable_defaults(definitions, variables);
        let fragments: HashMap<&str, &FragmentDefinition<'static, String>> = doc
            .definitions
            .iter()
            .filter_map(|def| match def {
                Definition::Fragment(fragment) => Some((fragment.name.as_str(), fragment)),
                Definition::Operation(_) => None,
            })
            .collect();

        let ctx = ExecutionContext {
            schema: &self.schema,
            fragments,
            variables: &variables,
        };

        let query_type = self.schema.query_type();
        ctx.validate(query_type, selections)?;

        let data = resolve_selection_set(&ctx, query_type, selections, None).await?;
        Ok(Value::Object(data))
    }
}

fn select_operation<'d>(
    doc: &'d Document<'static, String>,
    operation_name: Option<&str>,
) -> Result<&'d OperationDefinition<'static, String>, RequestError> {
    let mut operations = doc.definitions.iter().filter_map(|def| match def {
        Definition::Operation(op) => Some(op),
        Definition::Fragment(_) => None,
    });

    match operation_name {
        Some(wanted) => operations
            .find(|op| operation_name_of(op) == Some(wanted))
            .ok_or_else(|| RequestError::UnknownOperation(wanted.to_string())),
        None => operations.next().ok_or(RequestError::NoOperation),
    }
}

fn operation_name_of<'d>(operation: &'d OperationDefinition<'static, String>) -> Option<&'d str> {
    match operation {
        OperationDefinition::Query(query) => query.name.as_deref(),
        OperationDefinition::Mutation(mutation) => mutation.name.as_deref(),
        OperationDefinition::Subscription(subscription) => subscription.name.as_deref(),
        OperationDefinition::SelectionSet(_) => None,
    }
}

/// Fill in declared defaults for variables the request did not supply
fn apply_variable_defaults(
    definitions: &[VariableDefinition<'static, String>],
    mut variables: HashMap<String, Value>,
) -> HashMap<String, Value> {
    for definition in definitions {
        if variables.contains_key(&definition.name) {
            continue;
        }
        if let Some(default) = &definition.default_value {
            let value = gql_value_to_json(default, &HashMap::new());
            variables.insert(definition.name.clone(), value);
        }
    }
    variables
}
