//! Upload job state and the backend wire formats it is built from.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Message used when the backend reports `ERROR` without saying why.
pub const UNKNOWN_JOB_ERROR: &str = "Error desconocido al procesar la factura";

/// Processing status of an upload job.
///
/// Statuses the client does not know are kept as `Unknown` so a newer
/// backend can add intermediate states without breaking polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UploadStatus {
    Uploading,
    Processing,
    Completed,
    Error,
    Unknown(String),
}

impl UploadStatus {
    /// Position in the forward-only state machine. `None` for unknown values.
    pub fn rank(&self) -> Option<u8> {
        match self {
            UploadStatus::Uploading => Some(0),
            UploadStatus::Processing => Some(1),
            UploadStatus::Completed | UploadStatus::Error => Some(2),
            UploadStatus::Unknown(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Error)
    }

    pub fn as_str(&self) -> &str {
        match self {
            UploadStatus::Uploading => "UPLOADING",
            UploadStatus::Processing => "PROCESSING",
            UploadStatus::Completed => "COMPLETED",
            UploadStatus::Error => "ERROR",
            UploadStatus::Unknown(raw) => raw,
        }
    }
}

impl From<String> for UploadStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "UPLOADING" => UploadStatus::Uploading,
            "PROCESSING" => UploadStatus::Processing,
            "COMPLETED" => UploadStatus::Completed,
            "ERROR" => UploadStatus::Error,
            _ => UploadStatus::Unknown(raw),
        }
    }
}

impl From<UploadStatus> for String {
    fn from(status: UploadStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStatus::Uploading => write!(f, "Subiendo"),
            UploadStatus::Processing => write!(f, "Procesando"),
            UploadStatus::Completed => write!(f, "Completado"),
            UploadStatus::Error => write!(f, "Error"),
            UploadStatus::Unknown(raw) => write!(f, "Desconocido ({})", raw),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts a JSON number or a decimal string (`"150000.00"`).
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Null(()),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid valor '{}': {}", s, e))),
        Raw::Null(()) => Ok(0.0),
    }
}

/// Summary of the invoice the backend created from an uploaded PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacturaSummary {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub numero_factura: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub proveedor_nombre: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub proveedor_nit: String,
    #[serde(default, deserialize_with = "number_or_string")]
    pub valor: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub estado: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub oficinas_count: u32,
}

impl FacturaSummary {
    /// The invoice value as Colombian pesos, e.g. `$ 150.000`.
    pub fn formatted_valor(&self) -> String {
        format_cop(self.valor)
    }
}

/// Formats an amount as COP with no decimals and `.` thousands separators.
/// Zero and non-finite values render as `-`.
pub fn format_cop(value: f64) -> String {
    if !value.is_finite() || value == 0.0 {
        return "-".to_string();
    }

    let rounded = value.abs().round() as u64;
    let digits = rounded.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if value < 0.0 {
        format!("-$ {}", grouped)
    } else {
        format!("$ {}", grouped)
    }
}

/// Body of a successful `POST /facturas/upload-pdf`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadAccepted {
    #[serde(default)]
    pub upload_id: Option<String>,
}

/// Body of a non-2xx response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub detail: serde_json::Value,
}

impl ErrorDetail {
    /// The detail as text. Validation failures come back as a JSON array,
    /// which is rendered compactly.
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Body of `GET /facturas/upload-status/{upload_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadStatusResponse {
    pub upload_id: String,
    pub status: UploadStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub filename: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub processed_at: Option<String>,
    #[serde(default)]
    pub factura: Option<FacturaSummary>,
}

/// One in-flight or finished upload as tracked by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadJob {
    pub id: String,
    pub filename: String,
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<FacturaSummary>,
}

impl UploadJob {
    /// The job as it exists right after the backend accepted the file.
    pub fn accepted(id: &str, filename: &str) -> Self {
        Self {
            id: id.to_string(),
            filename: filename.to_string(),
            status: UploadStatus::Uploading,
            error_message: None,
            created_at: None,
            processed_at: None,
            result: None,
        }
    }

    /// Builds a job from a status response, keeping `result` only when
    /// completed and `error_message` only when failed.
    pub fn from_response(response: UploadStatusResponse) -> Self {
        let UploadStatusResponse {
            upload_id,
            status,
            filename,
            error_message,
            created_at,
            processed_at,
            factura,
        } = response;

        let result = match status {
            UploadStatus::Completed => {
                if factura.is_none() {
                    log::warn!("Upload {} completed without an invoice summary", upload_id);
                }
                factura
            }
            _ => None,
        };

        let error_message = match status {
            UploadStatus::Error => Some(
                error_message
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| UNKNOWN_JOB_ERROR.to_string()),
            ),
            _ => None,
        };

        Self {
            id: upload_id,
            filename,
            status,
            error_message,
            created_at,
            processed_at,
            result,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
