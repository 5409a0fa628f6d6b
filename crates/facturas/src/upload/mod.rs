//! Asynchronous invoice upload: validation, submission, status polling.

pub mod api;
pub mod coordinator;
pub mod file;
pub mod model;

pub use api::{HttpUploadApi, UploadApi};
pub use coordinator::{PollSettings, UploadCoordinator, UploadOutcome, UploadSnapshot};
pub use file::{validate_file, validate_file_with, CandidateFile, FileRules, ValidFile};
pub use model::{
    format_cop, FacturaSummary, UploadJob, UploadStatus, UploadStatusResponse, UNKNOWN_JOB_ERROR,
};
