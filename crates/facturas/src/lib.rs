pub mod attachments;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod logging;
pub mod sanitize;
pub mod upload;

pub use attachments::{AttachmentStored, ContractAttachmentClient};
pub use broadcast::{UploadEvent, UploadEventBroadcaster, UploadEventKind};
pub use config::{load_config, ClientConfig};
pub use error::{
    AttachmentError, ConfigError, FacturasError, PollError, Result, SubmissionError,
    ValidationError,
};
pub use logging::{init_logging, LogFormat};
pub use upload::{
    format_cop, validate_file, CandidateFile, FacturaSummary, HttpUploadApi, PollSettings,
    UploadApi, UploadCoordinator, UploadJob, UploadOutcome, UploadSnapshot, UploadStatus,
    UploadStatusResponse, ValidFile,
};
