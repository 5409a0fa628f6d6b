//! Client-side checks on a file before it is sent to the backend.

use std::fmt;
use std::path::Path;

use crate::config::ClientConfig;
use crate::error::ValidationError;
use crate::sanitize::redact_path;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// A file picked by the user, not yet checked.
#[derive(Clone)]
pub struct CandidateFile {
    pub name: String,
    /// Media type declared by whoever picked the file, if any.
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, media_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.map(|m| m.to_string()),
            bytes,
        }
    }

    /// Reads a file from disk. The declared media type is guessed from the
    /// extension, the same way a browser file picker would fill it in.
    pub async fn from_path(path: &Path) -> Result<Self, ValidationError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ValidationError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;

        let name = redact_path(path);
        let media_type = mime_guess::from_path(path)
            .first_raw()
            .map(|m| m.to_string());

        Ok(Self {
            name,
            media_type,
            bytes,
        })
    }
}

impl fmt::Debug for CandidateFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateFile")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A file that passed [`validate_file`]. Only this type can be submitted.
#[derive(Clone)]
pub struct ValidFile {
    name: String,
    bytes: Vec<u8>,
}

impl ValidFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ValidFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Limits applied by [`validate_file_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRules {
    pub max_bytes: u64,
    pub require_pdf_media_type: bool,
}

impl Default for FileRules {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for FileRules {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_bytes: config.max_file_bytes,
            require_pdf_media_type: config.require_pdf_media_type,
        }
    }
}

impl FileRules {
    /// Contract attachments always insist on a declared PDF media type.
    pub fn strict(self) -> Self {
        Self {
            require_pdf_media_type: true,
            ..self
        }
    }
}

fn has_pdf_extension(name: &str) -> bool {
    name.to_lowercase().ends_with(".pdf")
}

fn is_pdf_media_type(media_type: &str) -> bool {
    media_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(PDF_MEDIA_TYPE))
        .unwrap_or(false)
}

/// Validates a candidate file with the default rules.
pub fn validate_file(file: CandidateFile) -> Result<ValidFile, ValidationError> {
    validate_file_with(file, &FileRules::default())
}

/// Validates a candidate file. The extension check runs first, so a file
/// with the wrong extension always reports `InvalidFileType`.
pub fn validate_file_with(
    file: CandidateFile,
    rules: &FileRules,
) -> Result<ValidFile, ValidationError> {
    if !has_pdf_extension(&file.name) {
        return Err(ValidationError::InvalidFileType(file.name));
    }

    if rules.require_pdf_media_type {
        match file.media_type.as_deref() {
            Some(media_type) if is_pdf_media_type(media_type) => {}
            other => {
                return Err(ValidationError::InvalidMediaType(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        }
    }

    if file.bytes.is_empty() {
        return Err(ValidationError::EmptyFile(file.name));
    }

    let size = file.bytes.len() as u64;
    if size > rules.max_bytes {
        return Err(ValidationError::FileTooLarge {
            name: file.name,
            size,
            max: rules.max_bytes,
        });
    }

    Ok(ValidFile {
        name: file.name,
        bytes: file.bytes,
    })
}
