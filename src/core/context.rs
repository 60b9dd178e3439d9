//! Call context handed to every field resolver

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Arguments supplied to a field call, in the order they were written
pub type Arguments = IndexMap<String, Value>;

/// Where a resolver reads its inputs from
///
/// Root fields (on `Query`) only have call arguments. Nested fields also
/// carry the already-resolved parent object, whose attributes take the place
/// of arguments when looking up a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum CallContext {
    Root {
        arguments: Arguments,
    },
    HasParent {
        attributes: Map<String, Value>,
        arguments: Arguments,
    },
}

impl CallContext {
    pub fn root(arguments: Arguments) -> Self {
        CallContext::Root { arguments }
    }

    pub fn with_parent(attributes: Map<String, Value>, arguments: Arguments) -> Self {
        CallContext::HasParent {
            attributes,
            arguments,
        }
    }

    /// The field's own call arguments, regardless of variant
    pub fn arguments(&self) -> &Arguments {
        match self {
            CallContext::Root { arguments } => arguments,
            CallContext::HasParent { arguments, .. } => arguments,
        }
    }

    /// Look up a parameter source by name
    ///
    /// With a parent present the name is read from the parent's attributes,
    /// otherwise from the call arguments. Nulls count as absent.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let value = match self {
            CallContext::Root { arguments } => arguments.get(name),
            CallContext::HasParent { attributes, .. } => attributes.get(name),
        };
        value.filter(|v| !v.is_null())
    }
}

/// Render a JSON value the way it is bound as a string parameter or cache key
///
/// Strings are rendered raw, everything else as JSON text.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
