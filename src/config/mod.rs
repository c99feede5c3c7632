//! Application Configuration
//!
//! User settings and preferences stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::backend::PromptType;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend connection settings
    pub backend: BackendSettings,
    /// OCR submission parameters
    pub ocr: OcrSettings,
    /// Polling cadence
    pub polling: PollingSettings,
    /// Overlay appearance
    pub overlay: OverlaySettings,
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL of the OCR backend
    pub base_url: String,
    /// Timeout for OCR submissions, in seconds. Inference on CPU can take
    /// minutes per page.
    pub request_timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: 600,
        }
    }
}

/// OCR submission parameters, mirrored into every request form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Default prompt preset
    pub prompt_type: PromptType,
    /// Model base resolution
    pub base_size: u32,
    /// Model tile resolution
    pub image_size: u32,
    /// Whether the backend may crop the page into tiles
    pub crop_mode: bool,
    /// OCR engine identifier ("deepseek" or "tesseract")
    pub ocr_engine: String,
    /// TTS engine identifier for read-aloud
    pub tts_engine: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            prompt_type: PromptType::Document,
            base_size: 1024,
            image_size: 640,
            crop_mode: true,
            ocr_engine: "deepseek".to_string(),
            tts_engine: "edge".to_string(),
        }
    }
}

/// Polling cadence for the two progress timers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    /// Interval for live token/box updates during OCR, in milliseconds
    pub token_interval_ms: u64,
    /// Interval for model-load progress, in milliseconds
    pub model_interval_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            token_interval_ms: 200,
            model_interval_ms: 500,
        }
    }
}

/// Overlay appearance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlaySettings {
    /// Alpha of the filled region behind each annotation (0-255)
    pub fill_alpha: u8,
    /// Whether label chips are drawn above the boxes
    pub show_chips: bool,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            fill_alpha: 40,
            show_chips: true,
        }
    }
}

/// Get the configuration directory, creating it if needed
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("dev", "ocr-studio", "OcrStudio")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.backend.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.backend.request_timeout_secs, 600);

        assert_eq!(config.ocr.prompt_type, PromptType::Document);
        assert_eq!(config.ocr.base_size, 1024);
        assert_eq!(config.ocr.image_size, 640);
        assert!(config.ocr.crop_mode);
        assert_eq!(config.ocr.ocr_engine, "deepseek");

        assert_eq!(config.polling.token_interval_ms, 200);
        assert_eq!(config.polling.model_interval_ms, 500);

        assert_eq!(config.overlay.fill_alpha, 40);
        assert!(config.overlay.show_chips);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.backend.base_url, parsed.backend.base_url);
        assert_eq!(config.ocr.prompt_type, parsed.ocr.prompt_type);
        assert_eq!(config.polling.token_interval_ms, parsed.polling.token_interval_ms);
        assert_eq!(config.overlay.fill_alpha, parsed.overlay.fill_alpha);
    }

    #[test]
    fn test_prompt_type_serializes_snake_case() {
        let mut config = AppConfig::default();
        config.ocr.prompt_type = PromptType::Ocr;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("prompt_type = \"ocr\""));

        config.ocr.prompt_type = PromptType::Describe;
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("prompt_type = \"describe\""));
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.backend.base_url = "http://10.0.0.2:5000".to_string();
        config.polling.token_interval_ms = 100;

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();

        let loaded = load_config(temp_file.path()).unwrap();
        assert_eq!(loaded.backend.base_url, "http://10.0.0.2:5000");
        assert_eq!(loaded.polling.token_interval_ms, 100);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
