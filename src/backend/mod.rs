//! Backend Service Layer
//!
//! Everything the client knows about the OCR backend lives here: the wire
//! types of its JSON API, a blocking HTTP client, and the worker-thread job
//! handles the GUI polls for completions.

pub mod client;
pub mod jobs;
pub mod types;

pub use client::{BackendClient, BackendError, OcrParams};
pub use jobs::{spawn, JobHandle};
pub use types::{
    AckResponse, BatchResponse, HealthResponse, ModelInfoResponse, OcrResponse, PdfResponse,
    ProgressResponse, ProgressStatus, PromptType, TtsResponse,
};
