//! Selection set and field resolution

use super::utils::{
    coerce_leaf, field_arguments, is_included, response_key, type_condition_applies,
};
use crate::core::context::CallContext;
use crate::core::error::RequestError;
use crate::server::exposure::graphql::schema::ExecutableSchema;
use futures::future::{BoxFuture, FutureExt, join_all};
use graphql_parser::query::{Field, FragmentDefinition, Selection};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-request state shared by every field of one operation
pub(super) struct ExecutionContext<'a> {
    pub schema: &'a ExecutableSchema,
    pub fragments: HashMap<&'a str, &'a FragmentDefinition<'static, String>>,
    pub variables: &'a HashMap<String, Value>,
}

impl<'a> ExecutionContext<'a> {
    /// Flatten fragments and drop skipped selections, keeping document order
    fn collect_fields(
        &self,
        type_name: &str,
        selections: &'a [Selection<'static, String>],
        out: &mut Vec<&'a Field<'static, String>>,
    ) -> Result<(), RequestError> {
        for selection in selections {
            match selection {
                Selection::Field(field) => {
                    if is_included(&field.directives, self.variables) {
                        out.push(field);
                    }
                }
                Selection::InlineFragment(inline) => {
                    if is_included(&inline.directives, self.variables)
                        && type_condition_applies(inline.type_condition.as_ref(), type_name)
                    {
                        self.collect_fields(type_name, &inline.selection_set.items, out)?;
                    }
                }
                Selection::FragmentSpread(spread) => {
                    let fragment: &'a FragmentDefinition<'static, String> = self
                        .fragments
                        .get(spread.fragment_name.as_str())
                        .copied()
                        .ok_or_else(|| {
                            RequestError::UnknownFragment(spread.fragment_name.clone())
                        })?;
                    if is_included(&spread.directives, self.variables)
                        && type_condition_applies(Some(&fragment.type_condition), type_name)
                    {
                        self.collect_fields(type_name, &fragment.selection_set.items, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Check every selected field exists before anything is dispatched
    pub fn validate(
        &self,
        type_name: &str,
        selections: &'a [Selection<'static, String>],
    ) -> Result<(), RequestError> {
        let mut fields = Vec::new();
        self.collect_fields(type_name, selections, &mut fields)?;

        for field in fields {
            if field.name == "__typename" {
                continue;
            }
            let definition =
                self.schema
                    .field(type_name, &field.name)
                    .ok_or_else(|| RequestError::UnknownField {
                        type_name: type_name.to_string(),
                        field_name: field.name.clone(),
                    })?;
            if !field.selection_set.items.is_empty()
                && self.schema.object(&definition.type_name).is_some()
            {
                self.validate(&definition.type_name, &field.selection_set.items)?;
            }
        }
        Ok(())
    }
}

/// Resolve a selection set against `type_name`
///
/// Sibling fields are started together and awaited as a group, so their
/// backend queries run concurrently.
pub(super) fn resolve_selection_set<'a>(
    ctx: &'a ExecutionContext<'a>,
    type_name: &'a str,
    selections: &'a [Selection<'static, String>],
    parent: Option<Arc<Map<String, Value>>>,
) -> BoxFuture<'a, Result<Map<String, Value>, RequestError>> {
    async move {
        let mut fields = Vec::new();
        ctx.collect_fields(type_name, selections, &mut fields)?;

        let resolved = join_all(
            fields
                .iter()
                .map(|&field| resolve_field(ctx, type_name, field, parent.clone())),
        )
        .await;

        let mut result = Map::new();
        for (field, value) in fields.iter().zip(resolved) {
            result.insert(response_key(field).to_string(), value?);
        }
        Ok(result)
    }
    .boxed()
}

/// Resolve one field: bound resolver first, parent attribute otherwise
fn resolve_field<'a>(
    ctx: &'a ExecutionContext<'a>,
    type_name: &'a str,
    field: &'a Field<'static, String>,
    parent: Option<Arc<Map<String, Value>>>,
) -> BoxFuture<'a, Result<Value, RequestError>> {
    async move {
        if field.name == "__typename" {
            return Ok(Value::String(type_name.to_string()));
        }

        let definition =
            ctx.schema
                .field(type_name, &field.name)
                .ok_or_else(|| RequestError::UnknownField {
                    type_name: type_name.to_string(),
                    field_name: field.name.clone(),
                })?;

        let value = match ctx.schema.resolver(type_name, &field.name) {
            Some(resolver) => {
                let arguments = field_arguments(field, definition, ctx.variables);
                let call = match &parent {
                    Some(attributes) => CallContext::with_parent((**attributes).clone(), arguments),
                    None => CallContext::root(arguments),
                };
                resolver(call).await.into_value()
            }
            None => parent
                .as_ref()
                .and_then(|attributes| attributes.get(&field.name).cloned())
                .unwrap_or(Value::Null),
        };

        complete_value(ctx, &definition.type_name, field, value).await
    }
    .boxed()
}

/// Apply the field's sub-selection to a resolved value
///
/// Lists complete item by item; leaves are coerced to their declared scalar.
fn complete_value<'a>(
    ctx: &'a ExecutionContext<'a>,
    type_name: &'a str,
    field: &'a Field<'static, String>,
    value: Value,
) -> BoxFuture<'a, Result<Value, RequestError>> {
    async move {
        match value {
            Value::Array(items) => {
                let completed = join_all(
                    items
                        .into_iter()
                        .map(|item| complete_value(ctx, type_name, field, item)),
                )
                .await;
                Ok(Value::Array(completed.into_iter().collect::<Result<_, _>>()?))
            }
            Value::Object(attributes) if !field.selection_set.items.is_empty() => {
                let object = resolve_selection_set(
                    ctx,
                    type_name,
                    &field.selection_set.items,
                    Some(Arc::new(attributes)),
                )
                .await?;
                Ok(Value::Object(object))
            }
            other => Ok(coerce_leaf(type_name, other)),
        }
    }
    .boxed()
}
