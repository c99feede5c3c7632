//! HTTP client for the OCR backend
//!
//! Thin, synchronous wrapper over reqwest: every method drives one request
//! to completion on the client's own tokio runtime. Callers that must not
//! block (the GUI) run these methods on worker threads via `jobs::spawn`.

use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::debug;

use super::types::{
    AckResponse, BatchResponse, HealthResponse, ModelInfoResponse, OcrResponse, PdfResponse,
    ProgressResponse, PromptType, TtsResponse,
};

/// Poll requests get a short deadline of their own; a hung progress fetch
/// must not outlive several tick intervals.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors surfaced by backend calls
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not read input file: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
}

/// OCR submission parameters shared by the single, batch, and PDF endpoints
#[derive(Debug, Clone)]
pub struct OcrParams {
    pub prompt_type: PromptType,
    pub base_size: u32,
    pub image_size: u32,
    pub crop_mode: bool,
    pub ocr_engine: String,
}

pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
    runtime: Runtime,
}

impl BackendClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        let runtime = Runtime::new()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            runtime,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn health(&self) -> Result<HealthResponse, BackendError> {
        self.runtime.block_on(async {
            let resp = self
                .http
                .get(self.url("/health"))
                .timeout(POLL_TIMEOUT)
                .send()
                .await?;
            read_json(resp).await
        })
    }

    pub fn model_info(&self) -> Result<ModelInfoResponse, BackendError> {
        self.runtime.block_on(async {
            let resp = self
                .http
                .get(self.url("/model_info"))
                .timeout(POLL_TIMEOUT)
                .send()
                .await?;
            read_json(resp).await
        })
    }

    /// Fetch the current progress snapshot; the polling source for both
    /// model loading and live OCR token updates.
    pub fn progress(&self) -> Result<ProgressResponse, BackendError> {
        self.runtime.block_on(async {
            let resp = self
                .http
                .get(self.url("/progress"))
                .timeout(POLL_TIMEOUT)
                .send()
                .await?;
            read_json(resp).await
        })
    }

    /// Kick off model loading on the backend; progress arrives via
    /// `progress()`.
    pub fn load_model(&self, ocr_engine: &str, force_cpu: bool) -> Result<AckResponse, BackendError> {
        self.runtime.block_on(async {
            let resp = self
                .http
                .post(self.url("/load_model"))
                .json(&json!({ "ocr_engine": ocr_engine, "force_cpu": force_cpu }))
                .send()
                .await?;
            read_json(resp).await
        })
    }

    /// Submit one image for OCR. Blocks until the backend finishes.
    pub fn ocr(&self, image: &Path, params: &OcrParams) -> Result<OcrResponse, BackendError> {
        let part = file_part(image)?;
        debug!("Submitting {} to /ocr", image.display());

        self.runtime.block_on(async {
            let form = params_form(params).part("image", part);
            let resp = self
                .http
                .post(self.url("/ocr"))
                .multipart(form)
                .send()
                .await?;
            read_json(resp).await
        })
    }

    /// Submit several images as one atomic batch request.
    pub fn ocr_batch(&self, images: &[std::path::PathBuf], params: &OcrParams) -> Result<BatchResponse, BackendError> {
        let mut parts = Vec::with_capacity(images.len());
        for image in images {
            parts.push(file_part(image)?);
        }
        debug!("Submitting {} image(s) to /ocr_batch", images.len());

        self.runtime.block_on(async {
            let mut form = params_form(params);
            for part in parts {
                form = form.part("images", part);
            }
            let resp = self
                .http
                .post(self.url("/ocr_batch"))
                .multipart(form)
                .send()
                .await?;
            read_json(resp).await
        })
    }

    /// Submit a PDF; the backend rasterizes and processes each page.
    pub fn ocr_pdf(&self, pdf: &Path, params: &OcrParams) -> Result<PdfResponse, BackendError> {
        let part = file_part(pdf)?;
        debug!("Submitting {} to /ocr_pdf", pdf.display());

        self.runtime.block_on(async {
            let form = params_form(params).part("pdf", part);
            let resp = self
                .http
                .post(self.url("/ocr_pdf"))
                .multipart(form)
                .send()
                .await?;
            read_json(resp).await
        })
    }

    /// Synthesize speech for the given text; playback is the caller's
    /// concern, only the audio URL is returned.
    pub fn tts(&self, text: &str, tts_engine: &str) -> Result<TtsResponse, BackendError> {
        self.runtime.block_on(async {
            let resp = self
                .http
                .post(self.url("/tts"))
                .json(&json!({ "text": text, "tts_engine": tts_engine }))
                .send()
                .await?;
            read_json(resp).await
        })
    }
}

/// Shared multipart fields for every OCR submission
fn params_form(params: &OcrParams) -> multipart::Form {
    multipart::Form::new()
        .text("prompt_type", params.prompt_type.as_str())
        .text("base_size", params.base_size.to_string())
        .text("image_size", params.image_size.to_string())
        .text("crop_mode", params.crop_mode.to_string())
        .text("ocr_engine", params.ocr_engine.clone())
}

fn file_part(path: &Path) -> Result<multipart::Part, BackendError> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(multipart::Part::bytes(bytes).file_name(name))
}

/// Error body the backend attaches to non-success statuses
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, BackendError> {
    let status = resp.status();
    if !status.is_success() {
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) if !body.message.is_empty() => body.message,
            _ => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        };
        return Err(BackendError::Status {
            status: status.as_u16(),
            message,
        });
    }
    Ok(resp.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client = BackendClient::new("http://127.0.0.1:5000/", Duration::from_secs(10)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:5000");
        assert_eq!(client.url("/health"), "http://127.0.0.1:5000/health");
    }

    #[test]
    fn test_status_error_display() {
        let err = BackendError::Status {
            status: 500,
            message: "Failed to load model".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "backend returned HTTP 500: Failed to load model"
        );
    }

    #[test]
    fn test_file_part_missing_file() {
        let result = file_part(Path::new("/nonexistent/image.png"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }
}
