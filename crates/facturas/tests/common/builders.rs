//! Builders for backend responses and test files.

#![allow(dead_code)]

use facturas::upload::file::PDF_MEDIA_TYPE;
use facturas::{CandidateFile, FacturaSummary, UploadStatus, UploadStatusResponse, ValidFile};

/// A small PDF-looking payload.
pub const PDF_BYTES: &[u8] = b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

/// Builder for `UploadStatusResponse` values.
pub struct StatusBuilder {
    upload_id: String,
    status: UploadStatus,
    filename: String,
    error_message: Option<String>,
    processed_at: Option<String>,
    factura: Option<FacturaSummary>,
}

impl StatusBuilder {
    pub fn new(upload_id: &str, status: UploadStatus) -> Self {
        Self {
            upload_id: upload_id.to_string(),
            status,
            filename: "invoice.pdf".to_string(),
            error_message: None,
            processed_at: None,
            factura: None,
        }
    }

    pub fn error_message(mut self, message: &str) -> Self {
        self.error_message = Some(message.to_string());
        self
    }

    pub fn processed_at(mut self, at: &str) -> Self {
        self.processed_at = Some(at.to_string());
        self
    }

    pub fn factura(mut self, factura: FacturaSummary) -> Self {
        self.factura = Some(factura);
        self
    }

    pub fn build(self) -> UploadStatusResponse {
        UploadStatusResponse {
            upload_id: self.upload_id,
            status: self.status,
            filename: self.filename,
            error_message: self.error_message,
            created_at: Some("2026-01-10T09:00:00".to_string()),
            processed_at: self.processed_at,
            factura: self.factura,
        }
    }
}

pub fn uploading(id: &str) -> UploadStatusResponse {
    StatusBuilder::new(id, UploadStatus::Uploading).build()
}

pub fn processing(id: &str) -> UploadStatusResponse {
    StatusBuilder::new(id, UploadStatus::Processing).build()
}

pub fn completed(id: &str, factura: FacturaSummary) -> UploadStatusResponse {
    StatusBuilder::new(id, UploadStatus::Completed)
        .processed_at("2026-01-10T09:00:04")
        .factura(factura)
        .build()
}

pub fn failed(id: &str, message: &str) -> UploadStatusResponse {
    StatusBuilder::new(id, UploadStatus::Error)
        .error_message(message)
        .build()
}

pub fn acme_summary() -> FacturaSummary {
    FacturaSummary {
        id: 7,
        numero_factura: "FAC-001".to_string(),
        proveedor_nombre: "ACME S.A.S.".to_string(),
        proveedor_nit: "900111222-3".to_string(),
        valor: 150000.0,
        estado: "ASIGNADA".to_string(),
        oficinas_count: 2,
    }
}

pub fn pdf_candidate(name: &str) -> CandidateFile {
    CandidateFile::new(name, Some(PDF_MEDIA_TYPE), PDF_BYTES.to_vec())
}

pub fn valid_pdf(name: &str) -> ValidFile {
    facturas::validate_file(pdf_candidate(name)).expect("test file should be valid")
}
