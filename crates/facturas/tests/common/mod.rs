//! Shared test utilities for facturas integration tests.
//!
//! This module provides:
//! - `FakeUploadApi`, a scripted in-memory backend
//! - Builders for status responses and candidate files

pub mod builders;
pub mod fake;

pub use builders::*;
pub use fake::{FakeUploadApi, Step};
