// Error handling framework

use thiserror::Error;

/// Event interpretation errors. These are fatal: an event that carries no
/// recognizable location is malformed, as opposed to an event whose location
/// simply belongs to a different storage endpoint (a non-fatal skip, modeled
/// as `event::Resolution::Skip` rather than an error).
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Malformed event message: {0}")]
    MalformedMessage(String),

    #[error("Event data contains neither 'url' nor 'blobUrl'")]
    MissingLocationField,

    #[error("Location '{0}' has no container/path structure after the endpoint")]
    MissingPathStructure(String),
}

/// Fetched-object schema errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Downloaded object did not include the key '{0}'")]
    MissingField(String),

    #[error("Field '{0}' is not a string")]
    NotAString(String),
}

/// Object retrieval errors
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Aborting object fetch as argument '{0}' is missing")]
    MissingArgument(&'static str),

    #[error("Object store client error: {0}")]
    Client(String),

    #[error("Failed to retrieve object '{0}': {1}")]
    Transport(String, String),

    #[error("Object '{0}' is not valid JSON: {1}")]
    InvalidJson(String, String),
}

/// Secret vault errors
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("No vault name or URI configured")]
    NotConfigured,

    #[error("Failed to acquire ambient identity token: {0}")]
    Token(String),

    #[error("Vault request for secret '{name}' failed: {reason}")]
    Transport { name: String, reason: String },

    #[error("Vault returned status {status} for secret '{name}'")]
    Status { name: String, status: u16 },

    #[error("Unexpected vault response for secret '{name}': {reason}")]
    InvalidResponse { name: String, reason: String },
}

/// Credential resolution errors
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("No credential strategy configured: set a password, a private key, or a vault secret name")]
    MissingConfiguration,

    #[error("Secret '{name}' could not be retrieved: {reason}")]
    SecretNotFound { name: String, reason: String },

    #[error("Private key decode failed: {0}")]
    KeyDecodeFailed(String),
}

/// Statement execution errors. `StatementFailed` is only surfaced after the
/// session close attempt has completed.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Failed to open warehouse session: {0}")]
    SessionOpenFailed(String),

    #[error("Statement execution failed: {0}")]
    StatementFailed(String),

    #[error("Failed to close warehouse session: {0}")]
    SessionCloseFailed(String),
}

/// Secret provisioning errors
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Derived secret name '{0}' is not valid for the secret store")]
    InvalidSecretName(String),

    #[error("Failed to write secret '{name}': {reason}")]
    StoreFailed { name: String, reason: String },
}

/// Queue-related errors
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to connect to queue: {0}")]
    Connection(String),

    #[error("Failed to create stream: {0}")]
    StreamCreation(String),

    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    #[error("Failed to create consumer: {0}")]
    ConsumerCreation(String),

    #[error("Failed to consume message: {0}")]
    ConsumeFailed(String),

    #[error("Failed to acknowledge message: {0}")]
    AckFailed(String),
}

/// Umbrella error over the pipeline stages
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl PipelineError {
    /// Stage label used for failure metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Event(_) => "event",
            PipelineError::Fetch(_) => "fetch",
            PipelineError::Schema(_) => "schema",
            PipelineError::Credential(_) => "credential",
            PipelineError::Execution(_) => "execution",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_error_display() {
        let err = EventError::MissingLocationField;
        assert!(err.to_string().contains("blobUrl"));
    }

    #[test]
    fn test_schema_error_names_the_missing_field() {
        let err = SchemaError::MissingField("sql_statement_to_execute".to_string());
        assert!(err.to_string().contains("sql_statement_to_execute"));
    }

    #[test]
    fn test_pipeline_error_stage_labels() {
        let err: PipelineError = EventError::MissingLocationField.into();
        assert_eq!(err.stage(), "event");

        let err: PipelineError = ExecutionError::StatementFailed("boom".to_string()).into();
        assert_eq!(err.stage(), "execution");
    }

    #[test]
    fn test_vault_error_does_not_leak_values() {
        let err = VaultError::Status {
            name: "sf-password".to_string(),
            status: 403,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("sf-password"));
        assert!(rendered.contains("403"));
    }
}
