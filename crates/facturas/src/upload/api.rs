//! Transport to the facturas backend.
//!
//! [`UploadApi`] is the seam the coordinator polls through; [`HttpUploadApi`]
//! is the reqwest implementation used in production.

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, StatusCode, Url};
use tracing::Instrument;

use crate::config::{validate_config, ClientConfig};
use crate::error::{ConfigError, PollError, SubmissionError};
use crate::sanitize::{hash_filename, redact_url, truncate_detail};
use crate::upload::file::{ValidFile, PDF_MEDIA_TYPE};
use crate::upload::model::{ErrorDetail, UploadAccepted, UploadStatusResponse};

/// Backend operations needed by the upload workflow.
#[async_trait]
pub trait UploadApi: Send + Sync + 'static {
    /// Sends the file and returns the backend-assigned upload id.
    async fn submit(&self, file: &ValidFile) -> Result<String, SubmissionError>;

    /// Fetches the current status of an upload.
    async fn fetch_status(&self, upload_id: &str) -> Result<UploadStatusResponse, PollError>;
}

/// Creates an HTTP client with the configured timeouts.
pub(crate) fn create_http_client(config: &ClientConfig) -> Result<Client, ConfigError> {
    Client::builder()
        .connect_timeout(config.connect_timeout())
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| ConfigError::Validation {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Parses and checks the configured base URL.
pub(crate) fn parse_base_url(config: &ClientConfig) -> Result<Url, ConfigError> {
    validate_config(config)?;
    Url::parse(config.base_url()).map_err(|e| ConfigError::InvalidUrl {
        url: config.api_url.clone(),
        reason: e.to_string(),
    })
}

/// Appends percent-encoded path segments to the base URL.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Human-readable reason from a non-2xx body: the `detail` field when the
/// body is the backend's JSON error, otherwise the truncated raw body, and
/// the status text when the body is empty.
pub(crate) fn rejection_detail(status: StatusCode, body: &str) -> String {
    if let Ok(error) = serde_json::from_str::<ErrorDetail>(body) {
        return truncate_detail(&error.message());
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        truncate_detail(body)
    }
}

/// reqwest implementation of [`UploadApi`].
pub struct HttpUploadApi {
    client: Client,
    base_url: Url,
}

impl HttpUploadApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let base_url = parse_base_url(config)?;
        info!("Using facturas API at {}", redact_url(base_url.as_str()));

        Ok(Self {
            client: create_http_client(config)?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn upload_url(&self) -> Url {
        endpoint(&self.base_url, &["facturas", "upload-pdf"])
    }

    pub fn status_url(&self, upload_id: &str) -> Url {
        endpoint(&self.base_url, &["facturas", "upload-status", upload_id])
    }
}

#[async_trait]
impl UploadApi for HttpUploadApi {
    async fn submit(&self, file: &ValidFile) -> Result<String, SubmissionError> {
        let span = tracing::info_span!(
            "upload.submit",
            file = %hash_filename(file.name()),
            bytes = file.len()
        );

        async {
            let part = reqwest::multipart::Part::bytes(file.bytes().to_vec())
                .file_name(file.name().to_string())
                .mime_str(PDF_MEDIA_TYPE)
                .map_err(|e| SubmissionError::Network(format!("Invalid multipart part: {}", e)))?;
            let form = reqwest::multipart::Form::new().part("file", part);

            let response = self
                .client
                .post(self.upload_url())
                .multipart(form)
                .send()
                .await
                .map_err(|e| SubmissionError::Network(describe_transport_error(&e)))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| SubmissionError::Network(describe_transport_error(&e)))?;

            if !status.is_success() {
                let detail = rejection_detail(status, &body);
                tracing::warn!(status = status.as_u16(), %detail, "Upload rejected by backend");
                return Err(SubmissionError::BackendRejected {
                    status: status.as_u16(),
                    detail,
                });
            }

            let accepted: UploadAccepted = serde_json::from_str(&body)
                .map_err(|e| SubmissionError::InvalidResponse(e.to_string()))?;

            match accepted.upload_id.map(|id| id.trim().to_string()) {
                Some(id) if !id.is_empty() => {
                    tracing::info!(upload_id = %id, "Upload accepted");
                    Ok(id)
                }
                _ => Err(SubmissionError::InvalidResponse(
                    "response has no upload_id".to_string(),
                )),
            }
        }
        .instrument(span)
        .await
    }

    async fn fetch_status(&self, upload_id: &str) -> Result<UploadStatusResponse, PollError> {
        let span = tracing::debug_span!("upload.poll", upload_id = %upload_id);

        async {
            let response = self
                .client
                .get(self.status_url(upload_id))
                .send()
                .await
                .map_err(|e| PollError::Network(describe_transport_error(&e)))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| PollError::Network(describe_transport_error(&e)))?;

            if !status.is_success() {
                return Err(PollError::Status {
                    status: status.as_u16(),
                    detail: rejection_detail(status, &body),
                });
            }

            let parsed: UploadStatusResponse =
                serde_json::from_str(&body).map_err(|e| PollError::Decode(e.to_string()))?;
            debug!("Upload {} reported status {}", upload_id, parsed.status.as_str());
            Ok(parsed)
        }
        .instrument(span)
        .await
    }
}

pub(crate) fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("could not connect: {}", e)
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(url: &str) -> HttpUploadApi {
        let config = ClientConfig {
            api_url: url.to_string(),
            ..ClientConfig::default()
        };
        HttpUploadApi::new(&config).expect("should create api")
    }

    #[test]
    fn test_endpoints_from_base_url() {
        let api = api("http://localhost:8000/api/");
        assert_eq!(
            api.upload_url().as_str(),
            "http://localhost:8000/api/facturas/upload-pdf"
        );
        assert_eq!(
            api.status_url("abc123").as_str(),
            "http://localhost:8000/api/facturas/upload-status/abc123"
        );
    }

    #[test]
    fn test_status_url_encodes_id() {
        let api = api("http://localhost:8000/api");
        assert_eq!(
            api.status_url("a b/c").as_str(),
            "http://localhost:8000/api/facturas/upload-status/a%20b%2Fc"
        );
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let config = ClientConfig {
            api_url: "localhost".to_string(),
            ..ClientConfig::default()
        };
        assert!(HttpUploadApi::new(&config).is_err());
    }

    #[test]
    fn test_rejection_detail_from_json() {
        let detail = rejection_detail(
            StatusCode::BAD_REQUEST,
            r#"{"detail": "Factura duplicada"}"#,
        );
        assert_eq!(detail, "Factura duplicada");
    }

    #[test]
    fn test_rejection_detail_from_plain_body() {
        let detail = rejection_detail(StatusCode::BAD_GATEWAY, "<html>Bad Gateway</html>");
        assert_eq!(detail, "<html>Bad Gateway</html>");
    }

    #[test]
    fn test_rejection_detail_empty_body() {
        let detail = rejection_detail(StatusCode::SERVICE_UNAVAILABLE, "  ");
        assert_eq!(detail, "Service Unavailable");
    }
}
