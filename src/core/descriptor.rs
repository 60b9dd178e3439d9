//! Field descriptors: the metadata that binds a schema field to a query
//!
//! Descriptors are loaded once at startup from a JSON document such as:
//!
//! ```json
//! [
//!   {
//!     "typeName": "Query",
//!     "fieldName": "bookById",
//!     "sql": "SELECT id, title, authorId FROM books WHERE id = @id",
//!     "mapperCsv": "id,title,authorId",
//!     "gqlAttr": "id",
//!     "sqlParam": "id"
//!   }
//! ]
//! ```
//!
//! The backend does not describe its result columns, so `mapperCsv` is the
//! explicit contract naming them, in output order.

use crate::core::error::MetadataError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Wire form of a descriptor, exactly as it appears in the metadata file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawDescriptor {
    type_name: String,
    field_name: String,
    sql: String,
    mapper_csv: String,
    gql_attr: String,
    sql_param: String,
}

/// Immutable description of one resolvable field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    type_name: String,
    field_name: String,
    query_text: String,
    column_mapping: Vec<String>,
    source_argument: String,
    destination_parameter: String,
}

impl FieldDescriptor {
    /// Build a descriptor, validating it the same way the metadata loader does
    pub fn new(
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        query_text: impl Into<String>,
        mapper_csv: &str,
        source_argument: impl Into<String>,
        destination_parameter: impl Into<String>,
    ) -> Result<Self, MetadataError> {
        Self::from_raw(
            0,
            RawDescriptor {
                type_name: type_name.into(),
                field_name: field_name.into(),
                sql: query_text.into(),
                mapper_csv: mapper_csv.to_string(),
                gql_attr: source_argument.into(),
                sql_param: destination_parameter.into(),
            },
        )
    }

    fn from_raw(index: usize, raw: RawDescriptor) -> Result<Self, MetadataError> {
        let invalid = |reason: &str| MetadataError::Invalid {
            index,
            reason: reason.to_string(),
        };

        if raw.type_name.trim().is_empty() {
            return Err(invalid("typeName must not be empty"));
        }
        if raw.field_name.trim().is_empty() {
            return Err(invalid("fieldName must not be empty"));
        }
        if raw.sql.trim().is_empty() {
            return Err(invalid("sql must not be empty"));
        }
        if raw.gql_attr.trim().is_empty() {
            return Err(invalid("gqlAttr must not be empty"));
        }
        if raw.sql_param.trim().is_empty() {
            return Err(invalid("sqlParam must not be empty"));
        }

        let column_mapping = parse_mapper_csv(&raw.mapper_csv).map_err(|r| invalid(&r))?;

        Ok(Self {
            type_name: raw.type_name,
            field_name: raw.field_name,
            query_text: raw.sql,
            column_mapping,
            source_argument: raw.gql_attr,
            destination_parameter: raw.sql_param,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    /// Result column names, in the order they appear in the resolved mapping
    pub fn column_mapping(&self) -> &[String] {
        &self.column_mapping
    }

    pub fn source_argument(&self) -> &str {
        &self.source_argument
    }

    pub fn destination_parameter(&self) -> &str {
        &self.destination_parameter
    }

    /// `Type.field` coordinate used in logs
    pub fn coordinate(&self) -> String {
        format!("{}.{}", self.type_name, self.field_name)
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} [{} -> @{}] columns=[{}] sql=\"{}\"",
            self.type_name,
            self.field_name,
            self.source_argument,
            self.destination_parameter,
            self.column_mapping.join(","),
            self.query_text
        )
    }
}

fn parse_mapper_csv(csv: &str) -> Result<Vec<String>, String> {
    let columns: Vec<String> = csv.split(',').map(|c| c.trim().to_string()).collect();

    if columns.iter().all(|c| c.is_empty()) {
        return Err("mapperCsv must name at least one column".to_string());
    }
    if columns.iter().any(|c| c.is_empty()) {
        return Err(format!("mapperCsv '{}' contains an empty column name", csv));
    }

    Ok(columns)
}

/// Parse and validate a metadata document
///
/// Any malformed entry fails the whole load; there is no partial result.
pub fn descriptors_from_json_str(json: &str) -> Result<Vec<FieldDescriptor>, MetadataError> {
    let raw: Vec<RawDescriptor> = serde_json::from_str(json)?;

    let mut seen = HashSet::new();
    let mut descriptors = Vec::with_capacity(raw.len());

    for (index, entry) in raw.into_iter().enumerate() {
        let descriptor = FieldDescriptor::from_raw(index, entry)?;

        if !seen.insert(descriptor.coordinate()) {
            return Err(MetadataError::Invalid {
                index,
                reason: format!("duplicate wiring for {}", descriptor.coordinate()),
            });
        }

        descriptors.push(descriptor);
    }

    Ok(descriptors)
}

/// Load and validate a metadata file
pub fn load_descriptors(path: impl AsRef<Path>) -> Result<Vec<FieldDescriptor>, MetadataError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| MetadataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    descriptors_from_json_str(&content)
}
