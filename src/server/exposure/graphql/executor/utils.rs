//! Utility functions for GraphQL execution

use crate::core::context::Arguments;
use crate::server::exposure::graphql::schema::FieldDef;
use graphql_parser::query::{Directive, Field, TypeCondition, Value as GqlValue};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Convert GraphQL value to JSON, substituting variables
///
/// Unbound variables convert to `null`.
pub fn gql_value_to_json(
    value: &GqlValue<'_, String>,
    variables: &HashMap<String, Value>,
) -> Value {
    match value {
        GqlValue::Null => Value::Null,
        GqlValue::Int(i) => json!(i.as_i64().unwrap_or(0)),
        GqlValue::Float(f) => json!(f),
        GqlValue::String(s) => json!(s),
        GqlValue::Boolean(b) => json!(b),
        GqlValue::Enum(e) => json!(e),
        GqlValue::List(list) => Value::Array(
            list.iter()
                .map(|item| gql_value_to_json(item, variables))
                .collect(),
        ),
        GqlValue::Object(obj) => {
            let mut map = serde_json::Map::new();
            for (k, v) in obj {
                map.insert(k.clone(), gql_value_to_json(v, variables));
            }
            Value::Object(map)
        }
        GqlValue::Variable(name) => variables.get(name).cloned().unwrap_or(Value::Null),
    }
}

/// Arguments of a field call in written order, then declared defaults
///
/// An argument bound to a variable the request did not supply is treated as
/// absent, so its default (if any) applies.
pub fn field_arguments(
    field: &Field<'_, String>,
    definition: &FieldDef,
    variables: &HashMap<String, Value>,
) -> Arguments {
    let mut arguments = Arguments::new();

    for (name, value) in &field.arguments {
        if matches!(value, GqlValue::Variable(variable) if !variables.contains_key(variable)) {
            continue;
        }
        arguments.insert(name.clone(), gql_value_to_json(value, variables));
    }

    for declared in &definition.arguments {
        if arguments.contains_key(&declared.name) {
            continue;
        }
        if let Some(default) = &declared.default_value {
            arguments.insert(declared.name.clone(), default.clone());
        }
    }

    arguments
}

/// Evaluate `@skip(if:)` and `@include(if:)`
pub fn is_included(
    directives: &[Directive<'_, String>],
    variables: &HashMap<String, Value>,
) -> bool {
    directives.iter().all(|directive| {
        let condition = directive
            .arguments
            .iter()
            .find(|(name, _)| name.as_str() == "if")
            .map(|(_, value)| gql_value_to_json(value, variables))
            .and_then(|value| value.as_bool());
        match (directive.name.as_str(), condition) {
            ("skip", Some(true)) => false,
            ("include", Some(false)) => false,
            _ => true,
        }
    })
}

/// Whether a fragment's type condition matches `type_name`
pub fn type_condition_applies(
    condition: Option<&TypeCondition<'_, String>>,
    type_name: &str,
) -> bool {
    match condition {
        None => true,
        Some(TypeCondition::On(name)) => name == type_name,
    }
}

/// Coerce a backend string to the field's declared built-in scalar
///
/// Cells arrive as text. A cell that does not parse as the declared scalar
/// becomes `null`; other types pass through unchanged.
pub fn coerce_leaf(type_name: &str, value: Value) -> Value {
    let Value::String(text) = value else {
        return value;
    };
    match type_name {
        "Int" => text.trim().parse::<i64>().map(Value::from).unwrap_or(Value::Null),
        "Float" => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::Null, Value::Number),
        "Boolean" => match text.trim() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Null,
        },
        _ => Value::String(text),
    }
}

/// Key under which a field appears in the response
pub fn response_key<'a>(field: &'a Field<'_, String>) -> &'a str {
    field.alias.as_deref().unwrap_or(field.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::exposure::graphql::schema::ArgumentDef;
    use graphql_parser::query::{Definition, OperationDefinition, Selection, parse_query};

    fn first_field(query: &str) -> Field<'static, String> {
        let doc = parse_query::<String>(query)
            .expect("valid query")
            .into_static();
        let Some(Definition::Operation(OperationDefinition::SelectionSet(set))) =
            doc.definitions.into_iter().next()
        else {
            panic!("expected an anonymous selection set");
        };
        match set.items.into_iter().next() {
            Some(Selection::Field(field)) => field,
            _ => panic!("expected a field"),
        }
    }

    fn book_by_id_def() -> FieldDef {
        FieldDef {
            name: "bookById".to_string(),
            type_name: "Book".to_string(),
            is_list: false,
            arguments: vec![
                ArgumentDef {
                    name: "id".to_string(),
                    default_value: None,
                },
                ArgumentDef {
                    name: "format".to_string(),
                    default_value: Some(json!("short")),
                },
            ],
            directives: vec![],
        }
    }

    #[test]
    fn test_arguments_literals_and_defaults() {
        let field = first_field(r#"{ bookById(id: "b1") { id } }"#);
        let args = field_arguments(&field, &book_by_id_def(), &HashMap::new());

        assert_eq!(args.get("id"), Some(&json!("b1")));
        assert_eq!(args.get("format"), Some(&json!("short")));
        assert_eq!(args.keys().collect::<Vec<_>>(), vec!["id", "format"]);
    }

    #[test]
    fn test_arguments_variables() {
        let field = first_field(r#"{ bookById(id: $id, format: $format) { id } }"#);
        let mut variables = HashMap::new();
        variables.insert("id".to_string(), json!("b2"));

        let args = field_arguments(&field, &book_by_id_def(), &variables);
        assert_eq!(args.get("id"), Some(&json!("b2")));
        // unsupplied variable falls back to the declared default
        assert_eq!(args.get("format"), Some(&json!("short")));
    }

    #[test]
    fn test_value_conversion() {
        let field =
            first_field(r#"{ f(a: 1, b: 1.5, c: true, d: RED, e: [1, "x"], g: {h: null}) }"#);
        let values: Vec<Value> = field
            .arguments
            .iter()
            .map(|(_, v)| gql_value_to_json(v, &HashMap::new()))
            .collect();
        assert_eq!(
            values,
            vec![
                json!(1),
                json!(1.5),
                json!(true),
                json!("RED"),
                json!([1, "x"]),
                json!({"h": null}),
            ]
        );
    }

    #[test]
    fn test_skip_and_include() {
        let mut variables = HashMap::new();
        variables.insert("hide".to_string(), json!(true));

        let skipped = first_field(r#"{ a @skip(if: $hide) }"#);
        assert!(!is_included(&skipped.directives, &variables));

        let included = first_field(r#"{ a @include(if: true) }"#);
        assert!(is_included(&included.directives, &variables));

        let excluded = first_field(r#"{ a @include(if: false) }"#);
        assert!(!is_included(&excluded.directives, &variables));
    }

    #[test]
    fn test_coerce_leaf() {
        assert_eq!(coerce_leaf("Int", json!("223")), json!(223));
        assert_eq!(coerce_leaf("Int", json!("many")), Value::Null);
        assert_eq!(coerce_leaf("Float", json!("1.5")), json!(1.5));
        assert_eq!(coerce_leaf("Boolean", json!("true")), json!(true));
        assert_eq!(coerce_leaf("ID", json!("b1")), json!("b1"));
        assert_eq!(coerce_leaf("String", json!("223")), json!("223"));
        assert_eq!(coerce_leaf("Int", Value::Null), Value::Null);
    }

    #[test]
    fn test_response_key_prefers_alias() {
        assert_eq!(response_key(&first_field("{ first: bookById { id } }")), "first");
        assert_eq!(response_key(&first_field("{ bookById { id } }")), "bookById");
    }
}
