// Validation of the fetched JSON descriptor

use crate::errors::SchemaError;
use tracing::error;

/// The single required field of the descriptor object.
pub const STATEMENT_FIELD: &str = "sql_statement_to_execute";

/// The job decoded from the fetched object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlJob {
    pub statement: String,
}

/// Extract the SQL statement from the decoded descriptor.
///
/// Only `sql_statement_to_execute` is inspected; unknown fields are ignored
/// (permissive schema). Absence is a hard validation failure.
pub fn extract_statement(json: &serde_json::Value) -> Result<SqlJob, SchemaError> {
    let value = json.get(STATEMENT_FIELD).ok_or_else(|| {
        error!(
            field = STATEMENT_FIELD,
            "Downloaded object did not include the required key"
        );
        SchemaError::MissingField(STATEMENT_FIELD.to_string())
    })?;

    let statement = value.as_str().ok_or_else(|| {
        error!(field = STATEMENT_FIELD, "Required key is not a string");
        SchemaError::NotAString(STATEMENT_FIELD.to_string())
    })?;

    Ok(SqlJob {
        statement: statement.to_string(),
    })
}
