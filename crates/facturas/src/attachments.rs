//! Contract PDF attachments: a single request each way, no job tracking.

use log::{info, warn};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::error::{AttachmentError, ConfigError, FacturasError, SubmissionError, ValidationError};
use crate::upload::api::{create_http_client, describe_transport_error, endpoint, parse_base_url, rejection_detail};
use crate::upload::file::{validate_file_with, CandidateFile, FileRules, ValidFile, PDF_MEDIA_TYPE};
use crate::upload::model::ErrorDetail;

/// Detail for a 404 whose body carries none.
pub const CONTRACT_NOT_FOUND: &str = "Contrato no encontrado";

/// Body of a successful contract PDF upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttachmentStored {
    pub message: String,
    /// Storage path relative to the backend's contracts directory.
    pub path: String,
}

fn is_pdf_bytes(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

fn contract_rejection_detail(status: StatusCode, body: &str) -> String {
    if status == StatusCode::NOT_FOUND && serde_json::from_str::<ErrorDetail>(body).is_err() {
        return CONTRACT_NOT_FOUND.to_string();
    }
    rejection_detail(status, body)
}

pub struct ContractAttachmentClient {
    client: Client,
    base_url: Url,
    rules: FileRules,
}

impl ContractAttachmentClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            client: create_http_client(config)?,
            base_url: parse_base_url(config)?,
            rules: FileRules::from(config).strict(),
        })
    }

    pub fn upload_url(&self, contrato_id: i64) -> Url {
        endpoint(
            &self.base_url,
            &["contratos", &contrato_id.to_string(), "upload-pdf"],
        )
    }

    pub fn pdf_url(&self, contrato_id: i64) -> Url {
        endpoint(&self.base_url, &["contratos", &contrato_id.to_string(), "pdf"])
    }

    /// Contract files must also declare `application/pdf`.
    pub fn validate(&self, file: CandidateFile) -> Result<ValidFile, ValidationError> {
        validate_file_with(file, &self.rules)
    }

    /// Validates and uploads in one step.
    pub async fn attach(
        &self,
        contrato_id: i64,
        file: CandidateFile,
    ) -> Result<AttachmentStored, FacturasError> {
        let file = self.validate(file)?;
        Ok(self.upload_contract_pdf(contrato_id, &file).await?)
    }

    pub async fn upload_contract_pdf(
        &self,
        contrato_id: i64,
        file: &ValidFile,
    ) -> Result<AttachmentStored, SubmissionError> {
        let part = reqwest::multipart::Part::bytes(file.bytes().to_vec())
            .file_name(file.name().to_string())
            .mime_str(PDF_MEDIA_TYPE)
            .map_err(|e| SubmissionError::Network(format!("Invalid multipart part: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.upload_url(contrato_id))
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
            let detail = contract_rejection_detail(status, &body);
            warn!("Contract {} PDF rejected ({}): {}", contrato_id, status, detail);
            return Err(SubmissionError::BackendRejected {
                status: status.as_u16(),
                detail,
            });
        }

        let stored: AttachmentStored = serde_json::from_str(&body)
            .map_err(|e| SubmissionError::InvalidResponse(e.to_string()))?;
        info!("Contract {} PDF stored at {}", contrato_id, stored.path);
        Ok(stored)
    }

    /// Downloads the contract PDF for preview.
    pub async fn fetch_contract_pdf(&self, contrato_id: i64) -> Result<Vec<u8>, AttachmentError> {
        let response = self
            .client
            .get(self.pdf_url(contrato_id))
            .send()
            .await
            .map_err(|e| AttachmentError::Network(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = contract_rejection_detail(status, &body);
            return Err(if status == StatusCode::NOT_FOUND {
                AttachmentError::NotFound(detail)
            } else {
                AttachmentError::Status {
                    status: status.as_u16(),
                    detail,
                }
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AttachmentError::Network(describe_transport_error(&e)))?;

        if !is_pdf_bytes(&bytes) {
            return Err(AttachmentError::NotPdf);
        }

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ContractAttachmentClient {
        ContractAttachmentClient::new(&ClientConfig::default()).expect("should create client")
    }

    #[test]
    fn test_contract_urls() {
        let client = client();
        assert_eq!(
            client.upload_url(42).as_str(),
            "http://localhost:8000/api/contratos/42/upload-pdf"
        );
        assert_eq!(
            client.pdf_url(42).as_str(),
            "http://localhost:8000/api/contratos/42/pdf"
        );
    }

    #[test]
    fn test_contract_files_need_pdf_media_type() {
        let client = client();

        let file = CandidateFile::new("contrato.pdf", None, b"%PDF-1.5".to_vec());
        assert!(matches!(
            client.validate(file),
            Err(ValidationError::InvalidMediaType(_))
        ));

        let file = CandidateFile::new("contrato.pdf", Some(PDF_MEDIA_TYPE), b"%PDF-1.5".to_vec());
        assert!(client.validate(file).is_ok());
    }

    #[test]
    fn test_missing_contract_detail() {
        assert_eq!(
            contract_rejection_detail(StatusCode::NOT_FOUND, ""),
            CONTRACT_NOT_FOUND
        );
        assert_eq!(
            contract_rejection_detail(StatusCode::NOT_FOUND, "<html>Not Found</html>"),
            CONTRACT_NOT_FOUND
        );
        assert_eq!(
            contract_rejection_detail(StatusCode::NOT_FOUND, r#"{"detail": "Contrato 7 eliminado"}"#),
            "Contrato 7 eliminado"
        );
        assert_eq!(
            contract_rejection_detail(StatusCode::BAD_REQUEST, ""),
            "Bad Request"
        );
    }

    #[test]
    fn test_pdf_magic() {
        assert!(is_pdf_bytes(b"%PDF-1.7\n..."));
        assert!(!is_pdf_bytes(b"<html>"));
        assert!(!is_pdf_bytes(b""));
    }
}
