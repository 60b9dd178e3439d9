//! Schema directive hooks
//!
//! A [`DirectiveWiring`] is registered with the schema engine under a
//! directive name. While the executable schema is built, the engine calls
//! [`DirectiveWiring::on_field`] once for every field carrying that
//! directive, passing the resolver wired so far; the handler may return a
//! replacement resolver.

use crate::core::dispatch::FieldResolver;
use crate::core::error::SchemaError;
use indexmap::IndexMap;
use serde_json::Value;

/// Directive arguments as written in the SDL, converted to JSON
pub type DirectiveArguments = IndexMap<String, Value>;

/// Everything a directive handler may inspect about the annotated field
pub struct FieldWiringEnvironment<'a> {
    pub type_name: &'a str,
    pub field_name: &'a str,
    /// Whether `type_name` is the schema's query root
    pub root: bool,
    pub arguments: &'a DirectiveArguments,
    pub resolver: Option<FieldResolver>,
}

impl FieldWiringEnvironment<'_> {
    /// Build a [`SchemaError::InvalidDirective`] for this field
    pub fn invalid(&self, directive: &str, reason: impl Into<String>) -> SchemaError {
        SchemaError::InvalidDirective {
            directive: directive.to_string(),
            type_name: self.type_name.to_string(),
            field_name: self.field_name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Handler for one schema directive
pub trait DirectiveWiring: Send + Sync {
    /// Directive name without the `@`
    fn name(&self) -> &str;

    /// Called once per annotated field at wiring time
    ///
    /// Returns the resolver to bind for the field from now on.
    fn on_field(
        &self,
        env: FieldWiringEnvironment<'_>,
    ) -> Result<Option<FieldResolver>, SchemaError>;
}
