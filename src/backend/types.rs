//! Wire types for the OCR backend's JSON API

use serde::{Deserialize, Serialize};

use crate::overlay::ViewMode;

/// Prompt preset sent with every OCR submission. The backend maps each to a
/// model prompt and an output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    /// Convert the document to markdown (grounded)
    #[default]
    Document,
    /// Plain text recognition (grounded)
    Ocr,
    /// Free OCR without grounding
    Free,
    /// Parse a figure
    Figure,
    /// Describe the image
    Describe,
}

impl PromptType {
    pub const ALL: [PromptType; 5] = [
        PromptType::Document,
        PromptType::Ocr,
        PromptType::Free,
        PromptType::Figure,
        PromptType::Describe,
    ];

    /// Form value understood by the backend
    pub fn as_str(self) -> &'static str {
        match self {
            PromptType::Document => "document",
            PromptType::Ocr => "ocr",
            PromptType::Free => "free",
            PromptType::Figure => "figure",
            PromptType::Describe => "describe",
        }
    }

    /// Human-readable name for the mode selector
    pub fn display_name(self) -> &'static str {
        match self {
            PromptType::Document => "Document to Markdown",
            PromptType::Ocr => "Plain Text",
            PromptType::Free => "Free OCR",
            PromptType::Figure => "Parse Figure",
            PromptType::Describe => "Describe Image",
        }
    }

    /// How results of this prompt are presented and interacted with.
    /// Only the grounded prompts produce annotation markup.
    pub fn view_mode(self) -> ViewMode {
        match self {
            PromptType::Document => ViewMode::Document,
            PromptType::Ocr => ViewMode::PlainText,
            PromptType::Free | PromptType::Figure | PromptType::Describe => ViewMode::Other,
        }
    }
}

/// `GET /health`
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub gpu_available: bool,
    #[serde(default)]
    pub tesseract_available: bool,
    #[serde(default)]
    pub deepseek_available: bool,
}

/// Backend lifecycle stage reported by `GET /progress`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Idle,
    Loading,
    Processing,
    Loaded,
    Error,
}

/// `GET /progress`: the polling source for live updates. During model
/// loading `stage`/`progress_percent` describe load progress; during OCR
/// `raw_token_stream` accumulates the model's output so far.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressResponse {
    pub status: ProgressStatus,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub progress_percent: f32,
    #[serde(default)]
    pub chars_generated: u64,
    #[serde(default)]
    pub raw_token_stream: String,
}

/// `POST /ocr`
#[derive(Debug, Clone, Deserialize)]
pub struct OcrResponse {
    pub status: String,
    #[serde(default)]
    pub prompt_type: String,
    #[serde(default)]
    pub result: String,
    /// Raw model output including grounding markup, when captured
    pub raw_tokens: Option<String>,
    /// Server-side path of the pre-rendered boxes image, when produced
    pub boxes_image_path: Option<String>,
}

impl OcrResponse {
    /// The text the annotation pipeline should settle on: the raw token
    /// stream when the backend captured one, otherwise the result file.
    pub fn annotation_text(&self) -> &str {
        match self.raw_tokens.as_deref() {
            Some(tokens) if !tokens.is_empty() => tokens,
            _ => &self.result,
        }
    }
}

/// One item of a `POST /ocr_batch` response
#[derive(Debug, Clone, Deserialize)]
pub struct BatchItem {
    pub index: u32,
    #[serde(default)]
    pub text: String,
    pub boxes_image_path: Option<String>,
}

/// `POST /ocr_batch`
#[derive(Debug, Clone, Deserialize)]
pub struct BatchResponse {
    pub status: String,
    #[serde(default)]
    pub prompt_type: String,
    #[serde(default)]
    pub items: Vec<BatchItem>,
    #[serde(default)]
    pub combined_text: String,
}

/// One page of a `POST /ocr_pdf` response
#[derive(Debug, Clone, Deserialize)]
pub struct PdfPage {
    pub page: u32,
    #[serde(default)]
    pub text: String,
    pub boxes_image_path: Option<String>,
}

/// `POST /ocr_pdf`
#[derive(Debug, Clone, Deserialize)]
pub struct PdfResponse {
    pub status: String,
    #[serde(default)]
    pub prompt_type: String,
    #[serde(default)]
    pub pages: Vec<PdfPage>,
    #[serde(default)]
    pub combined_text: String,
}

/// `GET /model_info`
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfoResponse {
    pub model_name: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub gpu_available: bool,
    pub gpu_name: Option<String>,
    #[serde(default)]
    pub device_preference: String,
}

/// `POST /tts`
#[derive(Debug, Clone, Deserialize)]
pub struct TtsResponse {
    pub status: String,
    pub audio_url: Option<String>,
    pub message: Option<String>,
}

/// Generic `{status, message}` acknowledgement
#[derive(Debug, Clone, Deserialize)]
pub struct AckResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_type_form_values() {
        assert_eq!(PromptType::Document.as_str(), "document");
        assert_eq!(PromptType::Ocr.as_str(), "ocr");
        assert_eq!(PromptType::Describe.as_str(), "describe");
    }

    #[test]
    fn test_prompt_type_view_modes() {
        assert_eq!(PromptType::Document.view_mode(), ViewMode::Document);
        assert_eq!(PromptType::Ocr.view_mode(), ViewMode::PlainText);
        assert_eq!(PromptType::Free.view_mode(), ViewMode::Other);
        assert_eq!(PromptType::Figure.view_mode(), ViewMode::Other);
        assert_eq!(PromptType::Describe.view_mode(), ViewMode::Other);
    }

    #[test]
    fn test_decode_health() {
        let json = r#"{
            "status": "ok",
            "model_loaded": true,
            "gpu_available": false,
            "tesseract_available": true,
            "deepseek_available": true
        }"#;
        let health: HealthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(health.status, "ok");
        assert!(health.model_loaded);
        assert!(!health.gpu_available);
    }

    #[test]
    fn test_decode_progress_during_ocr() {
        let json = r#"{
            "status": "processing",
            "stage": "ocr",
            "message": "Generating OCR...",
            "progress_percent": 50,
            "chars_generated": 1234,
            "raw_token_stream": "<|ref|>title<|/ref|>",
            "timestamp": 1730000000.5
        }"#;
        let progress: ProgressResponse = serde_json::from_str(json).unwrap();
        assert_eq!(progress.status, ProgressStatus::Processing);
        assert_eq!(progress.chars_generated, 1234);
        assert!(progress.raw_token_stream.starts_with("<|ref|>"));
    }

    #[test]
    fn test_decode_progress_with_missing_fields() {
        let progress: ProgressResponse = serde_json::from_str(r#"{"status": "idle"}"#).unwrap();
        assert_eq!(progress.status, ProgressStatus::Idle);
        assert!(progress.raw_token_stream.is_empty());
        assert_eq!(progress.progress_percent, 0.0);
    }

    #[test]
    fn test_ocr_response_prefers_raw_tokens() {
        let with_tokens = OcrResponse {
            status: "success".to_string(),
            prompt_type: "document".to_string(),
            result: "# Title".to_string(),
            raw_tokens: Some("<|ref|>title<|/ref|><|det|>[[0,0,1,1]]<|/det|>Title".to_string()),
            boxes_image_path: None,
        };
        assert!(with_tokens.annotation_text().starts_with("<|ref|>"));

        let without = OcrResponse {
            raw_tokens: Some(String::new()),
            ..with_tokens.clone()
        };
        assert_eq!(without.annotation_text(), "# Title");
    }

    #[test]
    fn test_decode_batch_response() {
        let json = r#"{
            "status": "success",
            "prompt_type": "document",
            "items": [
                {"index": 1, "text": "page one", "boxes_image_path": "batch_1/result_with_boxes.jpg"},
                {"index": 2, "text": "page two", "boxes_image_path": null}
            ],
            "combined_text": "page one\n\npage two"
        }"#;
        let batch: BatchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(batch.items.len(), 2);
        assert_eq!(batch.items[1].text, "page two");
        assert!(batch.items[1].boxes_image_path.is_none());
    }

    #[test]
    fn test_decode_pdf_response() {
        let json = r#"{
            "status": "success",
            "prompt_type": "document",
            "pages": [{"page": 1, "text": "hello", "boxes_image_path": null}],
            "combined_text": "hello"
        }"#;
        let pdf: PdfResponse = serde_json::from_str(json).unwrap();
        assert_eq!(pdf.pages.len(), 1);
        assert_eq!(pdf.combined_text, "hello");
    }

    #[test]
    fn test_decode_tts_response() {
        let json = r#"{"status": "success", "audio_url": "/outputs/tts_1.mp3"}"#;
        let tts: TtsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(tts.audio_url.as_deref(), Some("/outputs/tts_1.mp3"));
    }
}
