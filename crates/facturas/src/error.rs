use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FacturasError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Poll error: {0}")]
    Poll(#[from] PollError),

    #[error("Attachment error: {0}")]
    Attachment(#[from] AttachmentError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Local checks on a candidate file, raised before any network call.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Solo se permiten archivos PDF: '{0}'")]
    InvalidFileType(String),

    #[error("El archivo debe ser un PDF válido (tipo declarado: {0})")]
    InvalidMediaType(String),

    #[error("El archivo '{0}' está vacío")]
    EmptyFile(String),

    #[error("El archivo '{name}' pesa {size} bytes, el máximo es {max}")]
    FileTooLarge { name: String, size: u64, max: u64 },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The upload could not be accepted; no job exists and nothing is polling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("Error de conexión al servidor: {0}")]
    Network(String),

    #[error("Upload rejected ({status}): {detail}")]
    BackendRejected { status: u16, detail: String },

    #[error("Invalid upload response: {0}")]
    InvalidResponse(String),
}

/// A single status check failed. Polling absorbs these and retries on the next tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("Status request failed: {0}")]
    Network(String),

    #[error("Status request returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Failed to decode status response: {0}")]
    Decode(String),
}

impl PollError {
    /// Whether the failure is likely to clear up by itself. Polling retries
    /// either way; this only decides how loudly it is logged.
    pub fn is_transient(&self) -> bool {
        match self {
            PollError::Network(_) => true,
            PollError::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            PollError::Decode(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error("Error de conexión al servidor: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Response body is not a PDF document")]
    NotPdf,
}

pub type Result<T> = std::result::Result<T, FacturasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_error_transience() {
        assert!(PollError::Network("reset".to_string()).is_transient());
        assert!(PollError::Status { status: 503, detail: String::new() }.is_transient());
        assert!(PollError::Status { status: 429, detail: String::new() }.is_transient());
        assert!(!PollError::Status { status: 404, detail: String::new() }.is_transient());
        assert!(!PollError::Decode("eof".to_string()).is_transient());
    }

    #[test]
    fn test_validation_messages_are_user_facing() {
        let err = ValidationError::InvalidFileType("notas.txt".to_string());
        assert!(err.to_string().starts_with("Solo se permiten archivos PDF"));

        let err: FacturasError = SubmissionError::Network("refused".to_string()).into();
        assert!(err.to_string().contains("Error de conexión al servidor"));
    }
}
