//! OCR Studio - Desktop client for a local DeepSeek-OCR backend
//!
//! Submits images and PDFs to the backend over HTTP and renders results as
//! they stream in: detected regions appear on an overlay over the document
//! while the model is still generating.

mod annotate;
mod backend;
mod config;
mod gui;
mod live;
mod overlay;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::AppConfig;

/// OCR Studio - live document recognition viewer
#[derive(Parser, Debug)]
#[command(name = "ocr-studio")]
#[command(about = "Desktop client for a local DeepSeek-OCR backend")]
struct Args {
    /// Backend base URL (overrides the configured value)
    #[arg(long)]
    backend_url: Option<String>,

    /// Image or PDF to open at startup
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("OCR Studio starting...");

    let mut config = load_or_create_config();
    if let Some(url) = args.backend_url {
        config.backend.base_url = url;
    }
    info!("Backend: {}", config.backend.base_url);

    if let Err(e) = gui::run(config, args.input) {
        tracing::error!("GUI error: {}", e);
    }

    info!("OCR Studio shutdown complete");

    Ok(())
}

/// Load configuration from file or create the default one
fn load_or_create_config() -> AppConfig {
    if let Ok(config_dir) = config::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!("Loaded configuration from {:?}", config_path);
                return config;
            }
        } else {
            let config = AppConfig::default();
            if config::save_config(&config, &config_path).is_ok() {
                info!("Wrote default configuration to {:?}", config_path);
            }
            return config;
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}
