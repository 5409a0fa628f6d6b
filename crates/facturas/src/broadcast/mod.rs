//! Broadcasting of upload workflow events to the presentation layer.

pub mod upload_events;

pub use upload_events::{UploadEvent, UploadEventBroadcaster, UploadEventKind};
