//! Application entry point and orchestration
//!
//! Owns the backend client, the live update controller, and every in-flight
//! background job. The egui update loop is the scheduler: each frame pumps
//! finished jobs, fires due poll ticks, and repaints.

use eframe::egui;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::backend::{
    self, AckResponse, BackendClient, BackendError, BatchResponse, HealthResponse,
    ModelInfoResponse, OcrParams, OcrResponse, PdfResponse, ProgressResponse, ProgressStatus,
    PromptType, TtsResponse,
};
use crate::config::AppConfig;
use crate::live::{LiveUpdateController, Stage, Ticker};

use super::viewer::viewer_ui;

/// File extensions accepted as image input
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp", "tif", "tiff"];

/// The loaded document preview
pub struct Document {
    pub texture: egui::TextureHandle,
    /// Original pixel dimensions; the projection target for the overlay
    pub size: [usize; 2],
    pub path: PathBuf,
}

/// What the next submission will send
#[derive(Debug, Clone)]
enum Source {
    /// One or more images; the first one is previewed
    Images(Vec<PathBuf>),
    /// A single PDF (no local preview; pages are rasterized server-side)
    Pdf(PathBuf),
}

/// The in-flight OCR request, tagged with its operation epoch
enum Submission {
    Image(backend::JobHandle<Result<OcrResponse, BackendError>>),
    Batch(backend::JobHandle<Result<BatchResponse, BackendError>>),
    Pdf(backend::JobHandle<Result<PdfResponse, BackendError>>),
}

pub struct StudioApp {
    config: AppConfig,
    client: Arc<BackendClient>,
    controller: LiveUpdateController,

    source: Option<Source>,
    document: Option<Document>,
    pending_paths: Vec<PathBuf>,
    prompt_type: PromptType,

    submission: Option<(u64, Submission)>,
    poll_job: Option<(u64, backend::JobHandle<Result<ProgressResponse, BackendError>>)>,
    health_job: Option<backend::JobHandle<Result<HealthResponse, BackendError>>>,
    model_info_job: Option<backend::JobHandle<Result<ModelInfoResponse, BackendError>>>,
    load_model_job: Option<backend::JobHandle<Result<AckResponse, BackendError>>>,
    model_poll_job: Option<backend::JobHandle<Result<ProgressResponse, BackendError>>>,
    tts_job: Option<backend::JobHandle<Result<TtsResponse, BackendError>>>,

    /// Model loading runs on its own coarser ticker, independent from the
    /// token poll inside the controller.
    model_ticker: Ticker,
    model_loading: bool,
    model_progress: Option<ProgressResponse>,

    health: Option<HealthResponse>,
    model_name: Option<String>,
    audio_url: Option<String>,
    boxes_url: Option<String>,
    notice: Option<String>,
    chars_generated: u64,
    show_raw_stream: bool,
}

impl StudioApp {
    pub fn new(config: AppConfig, startup_input: Option<PathBuf>) -> anyhow::Result<Self> {
        let client = Arc::new(BackendClient::new(
            &config.backend.base_url,
            Duration::from_secs(config.backend.request_timeout_secs),
        )?);

        let controller = LiveUpdateController::new(
            Duration::from_millis(config.polling.token_interval_ms),
            config.overlay.fill_alpha,
        );
        let model_ticker = Ticker::new(Duration::from_millis(config.polling.model_interval_ms));
        let prompt_type = config.ocr.prompt_type;

        let mut app = Self {
            config,
            client,
            controller,
            source: None,
            document: None,
            pending_paths: startup_input.into_iter().collect(),
            prompt_type,
            submission: None,
            poll_job: None,
            health_job: None,
            model_info_job: None,
            load_model_job: None,
            model_poll_job: None,
            tts_job: None,
            model_ticker,
            model_loading: false,
            model_progress: None,
            health: None,
            model_name: None,
            audio_url: None,
            boxes_url: None,
            notice: None,
            chars_generated: 0,
            show_raw_stream: false,
        };
        app.refresh_health();
        Ok(app)
    }

    fn ocr_params(&self) -> OcrParams {
        OcrParams {
            prompt_type: self.prompt_type,
            base_size: self.config.ocr.base_size,
            image_size: self.config.ocr.image_size,
            crop_mode: self.config.ocr.crop_mode,
            ocr_engine: self.config.ocr.ocr_engine.clone(),
        }
    }

    /// Projection target for the overlay: the document's own pixel grid
    fn target_dims(&self) -> (f32, f32) {
        match &self.document {
            Some(doc) => (doc.size[0] as f32, doc.size[1] as f32),
            None => (crate::annotate::COORD_MAX, crate::annotate::COORD_MAX),
        }
    }

    fn is_busy(&self) -> bool {
        self.submission.is_some() || self.controller.is_busy()
    }

    // ---- document loading -------------------------------------------------

    fn process_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });
        if !dropped.is_empty() {
            self.pending_paths.extend(dropped);
        }

        if self.pending_paths.is_empty() {
            return;
        }
        let paths = std::mem::take(&mut self.pending_paths);
        self.open_paths(ctx, paths);
    }

    fn open_paths(&mut self, ctx: &egui::Context, paths: Vec<PathBuf>) {
        if self.is_busy() {
            self.notice = Some("An OCR operation is already running".to_string());
            return;
        }

        let pdfs: Vec<&PathBuf> = paths.iter().filter(|p| has_extension(p, &["pdf"])).collect();
        let images: Vec<PathBuf> = paths
            .iter()
            .filter(|p| has_extension(p, IMAGE_EXTENSIONS))
            .cloned()
            .collect();

        let source = if !images.is_empty() {
            Source::Images(images)
        } else if let Some(pdf) = pdfs.first() {
            Source::Pdf((*pdf).clone())
        } else {
            self.notice = Some("No supported image or PDF among the dropped files".to_string());
            return;
        };

        // New document invalidates everything from the previous operation.
        self.controller.reset();
        self.audio_url = None;
        self.boxes_url = None;
        self.chars_generated = 0;
        self.document = None;

        if let Source::Images(images) = &source {
            match load_preview(ctx, &images[0]) {
                Ok(document) => self.document = Some(document),
                Err(e) => {
                    self.notice = Some(format!("Could not load {}: {}", images[0].display(), e));
                    return;
                }
            }
        }

        info!("Opened {:?}", source);
        self.source = Some(source);
        self.notice = None;
    }

    // ---- submission + polling --------------------------------------------

    fn submit(&mut self) {
        if self.is_busy() {
            warn!("Submission rejected: an operation is already in flight");
            return;
        }
        let Some(source) = self.source.clone() else {
            return;
        };

        let params = self.ocr_params();
        let epoch = self
            .controller
            .start(self.prompt_type.view_mode(), Instant::now());
        self.audio_url = None;
        self.boxes_url = None;
        self.chars_generated = 0;

        let client = self.client.clone();
        let submission = match source {
            Source::Images(paths) if paths.len() == 1 => Submission::Image(backend::spawn(
                "ocr",
                move || client.ocr(&paths[0], &params),
            )),
            Source::Images(paths) => Submission::Batch(backend::spawn("ocr-batch", move || {
                client.ocr_batch(&paths, &params)
            })),
            Source::Pdf(path) => {
                Submission::Pdf(backend::spawn("ocr-pdf", move || client.ocr_pdf(&path, &params)))
            }
        };
        self.submission = Some((epoch, submission));
    }

    fn drive_polling(&mut self, now: Instant) {
        if self.poll_job.is_none() && self.controller.poll_due(now) {
            let epoch = self.controller.epoch();
            let client = self.client.clone();
            self.poll_job = Some((epoch, backend::spawn("progress", move || client.progress())));
        }

        if self.model_loading && self.model_poll_job.is_none() && self.model_ticker.due(now) {
            let client = self.client.clone();
            self.model_poll_job = Some(backend::spawn("model-progress", move || client.progress()));
        }
    }

    fn pump_jobs(&mut self) {
        let dims = self.target_dims();

        // Live token poll for the in-flight OCR operation.
        if let Some((epoch, mut job)) = self.poll_job.take() {
            match job.try_take() {
                Some(Ok(progress)) => {
                    if epoch == self.controller.epoch() {
                        self.chars_generated = progress.chars_generated;
                    }
                    if progress.status == ProgressStatus::Processing
                        && !progress.raw_token_stream.is_empty()
                    {
                        self.controller
                            .apply_partial(epoch, &progress.raw_token_stream, dims);
                    }
                }
                Some(Err(_)) => self.controller.note_poll_failure(epoch),
                None => self.poll_job = Some((epoch, job)),
            }
        }

        // The OCR submission itself. Each arm reduces the response to the
        // text the pipeline settles on, plus an optional server-rendered
        // boxes image.
        if let Some((epoch, submission)) = self.submission.take() {
            let settled = match submission {
                Submission::Image(mut job) => match job.try_take() {
                    Some(result) => Some(result.map(|r| {
                        info!("OCR finished: {} ({})", r.status, r.prompt_type);
                        (r.annotation_text().to_string(), r.boxes_image_path.clone())
                    })),
                    None => {
                        self.submission = Some((epoch, Submission::Image(job)));
                        None
                    }
                },
                Submission::Batch(mut job) => match job.try_take() {
                    Some(result) => Some(result.map(|r| {
                        info!(
                            "Batch OCR finished: {} ({}), {} item(s)",
                            r.status,
                            r.prompt_type,
                            r.items.len()
                        );
                        for item in &r.items {
                            debug!("Batch item {}: {} chars", item.index, item.text.len());
                        }
                        (r.combined_text, None)
                    })),
                    None => {
                        self.submission = Some((epoch, Submission::Batch(job)));
                        None
                    }
                },
                Submission::Pdf(mut job) => match job.try_take() {
                    Some(result) => Some(result.map(|r| {
                        info!(
                            "PDF OCR finished: {} ({}), {} page(s)",
                            r.status,
                            r.prompt_type,
                            r.pages.len()
                        );
                        for page in &r.pages {
                            debug!("PDF page {}: {} chars", page.page, page.text.len());
                        }
                        (r.combined_text, None)
                    })),
                    None => {
                        self.submission = Some((epoch, Submission::Pdf(job)));
                        None
                    }
                },
            };

            match settled {
                Some(Ok((text, boxes))) => {
                    self.boxes_url = boxes.map(|p| {
                        absolute_url(self.client.base_url(), &format!("/outputs/{}", p))
                    });
                    self.controller.settle_success(epoch, &text, dims);
                }
                Some(Err(e)) => self.controller.settle_failure(epoch, &e.to_string()),
                None => {}
            }
        }

        // Health + model info.
        if let Some(mut job) = self.health_job.take() {
            match job.try_take() {
                Some(Ok(health)) => {
                    if health.model_loaded && self.model_name.is_none() && self.model_info_job.is_none() {
                        let client = self.client.clone();
                        self.model_info_job =
                            Some(backend::spawn("model-info", move || client.model_info()));
                    }
                    self.health = Some(health);
                }
                Some(Err(e)) => {
                    self.health = None;
                    self.notice = Some(format!("Backend unreachable: {}", e));
                }
                None => self.health_job = Some(job),
            }
        }

        if let Some(mut job) = self.model_info_job.take() {
            match job.try_take() {
                Some(Ok(info)) => {
                    info!(
                        "Model {} (loaded: {}, device: {}, gpu: {})",
                        info.model_name,
                        info.model_loaded,
                        info.device_preference,
                        info.gpu_name.as_deref().unwrap_or("none")
                    );
                    self.model_name = Some(info.model_name);
                }
                Some(Err(_)) => {}
                None => self.model_info_job = Some(job),
            }
        }

        // Model loading: the request itself plus its coarse progress poll.
        if let Some(mut job) = self.load_model_job.take() {
            match job.try_take() {
                Some(result) => {
                    self.model_loading = false;
                    self.model_ticker.stop();
                    self.model_progress = None;
                    match result {
                        Ok(ack) if ack.status == "success" => {
                            info!("Model load finished: {}", ack.message);
                            self.refresh_health();
                        }
                        Ok(ack) => self.notice = Some(format!("Model load failed: {}", ack.message)),
                        Err(e) => self.notice = Some(format!("Model load failed: {}", e)),
                    }
                }
                None => self.load_model_job = Some(job),
            }
        }

        if let Some(mut job) = self.model_poll_job.take() {
            match job.try_take() {
                Some(Ok(progress)) => match progress.status {
                    ProgressStatus::Loading => {
                        debug!(
                            "Model load progress: {} {}%",
                            progress.stage, progress.progress_percent
                        );
                        self.model_progress = Some(progress);
                    }
                    ProgressStatus::Error => {
                        self.notice = Some(format!("Model load error: {}", progress.message));
                        self.model_loading = false;
                        self.model_ticker.stop();
                        self.model_progress = None;
                    }
                    _ => {}
                },
                Some(Err(_)) => {} // transient, next tick retries
                None => self.model_poll_job = Some(job),
            }
        }

        // Read-aloud.
        if let Some(mut job) = self.tts_job.take() {
            match job.try_take() {
                Some(Ok(tts)) => {
                    if tts.status == "success" {
                        self.audio_url = tts
                            .audio_url
                            .map(|url| absolute_url(self.client.base_url(), &url));
                    } else {
                        self.notice = Some(
                            tts.message
                                .unwrap_or_else(|| "Speech synthesis failed".to_string()),
                        );
                    }
                }
                Some(Err(e)) => self.notice = Some(format!("Speech synthesis failed: {}", e)),
                None => self.tts_job = Some(job),
            }
        }
    }

    fn refresh_health(&mut self) {
        if self.health_job.is_none() {
            let client = self.client.clone();
            self.health_job = Some(backend::spawn("health", move || client.health()));
        }
    }

    fn start_model_load(&mut self) {
        if self.model_loading {
            return;
        }
        self.model_loading = true;
        self.model_progress = None;
        self.model_ticker.start(Instant::now());

        let client = self.client.clone();
        let engine = self.config.ocr.ocr_engine.clone();
        self.load_model_job = Some(backend::spawn("load-model", move || {
            client.load_model(&engine, false)
        }));
    }

    fn start_read_aloud(&mut self) {
        if self.tts_job.is_some() || self.controller.live_text().is_empty() {
            return;
        }
        let client = self.client.clone();
        let text = self.controller.live_text().to_string();
        let engine = self.config.ocr.tts_engine.clone();
        self.tts_job = Some(backend::spawn("tts", move || client.tts(&text, &engine)));
    }

    fn clear_document(&mut self) {
        self.controller.reset();
        self.source = None;
        self.document = None;
        self.audio_url = None;
        self.boxes_url = None;
        self.chars_generated = 0;
        self.notice = None;
    }

    // ---- panels -----------------------------------------------------------

    fn controls_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            egui::ComboBox::from_id_salt("prompt_type")
                .selected_text(self.prompt_type.display_name())
                .show_ui(ui, |ui| {
                    for prompt in PromptType::ALL {
                        ui.selectable_value(&mut self.prompt_type, prompt, prompt.display_name());
                    }
                });

            let can_run = self.source.is_some() && !self.is_busy();
            if ui.add_enabled(can_run, egui::Button::new("Run OCR")).clicked() {
                self.submit();
            }

            if ui
                .add_enabled(!self.model_loading, egui::Button::new("Load Model"))
                .clicked()
            {
                self.start_model_load();
            }

            let can_speak = !self.controller.live_text().is_empty() && self.tts_job.is_none();
            if ui
                .add_enabled(can_speak, egui::Button::new("Read Aloud"))
                .clicked()
            {
                self.start_read_aloud();
            }

            if ui
                .add_enabled(self.source.is_some() && !self.is_busy(), egui::Button::new("Clear"))
                .clicked()
            {
                self.clear_document();
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                self.health_ui(ui);
            });
        });

        if self.model_loading {
            ui.horizontal(|ui| {
                ui.spinner();
                let (fraction, message) = match &self.model_progress {
                    Some(p) => (p.progress_percent / 100.0, p.message.clone()),
                    None => (0.0, "Contacting backend...".to_string()),
                };
                ui.add(egui::ProgressBar::new(fraction).desired_width(240.0).show_percentage());
                ui.label(message);
            });
        }
    }

    fn health_ui(&self, ui: &mut egui::Ui) {
        match &self.health {
            Some(health) => {
                let gpu = if health.gpu_available { "GPU" } else { "CPU" };
                let model = if health.model_loaded {
                    self.model_name.as_deref().unwrap_or("model loaded")
                } else {
                    "model not loaded"
                };
                ui.label(
                    egui::RichText::new(format!("Backend: {} · {} · {}", health.status, gpu, model))
                        .color(egui::Color32::from_rgb(111, 207, 151)),
                )
                .on_hover_text(format!(
                    "deepseek: {} · tesseract: {}",
                    health.deepseek_available, health.tesseract_available
                ));
            }
            None => {
                ui.label(
                    egui::RichText::new("Backend: offline").color(egui::Color32::from_rgb(235, 87, 87)),
                );
            }
        }
    }

    fn status_ui(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let stage = match self.controller.stage() {
                Stage::Idle => "Idle",
                Stage::Polling => "Recognizing...",
                Stage::Settling => "Finalizing...",
                Stage::Done => "Done",
                Stage::Failed => "Failed",
            };
            ui.label(stage);

            if let Some(document) = &self.document {
                if let Some(name) = document.path.file_name() {
                    ui.label(name.to_string_lossy().to_string());
                }
            }

            if self.controller.stage() == Stage::Polling && self.chars_generated > 0 {
                ui.label(format!("{} chars generated", self.chars_generated));
            }

            let regions = self.controller.overlay().cursor();
            if regions > 0 {
                ui.label(format!("{} region(s)", regions));
            }

            if let Some(error) = self.controller.error() {
                ui.label(egui::RichText::new(error).color(egui::Color32::from_rgb(235, 87, 87)));
            }

            if let Some(notice) = &self.notice {
                ui.label(egui::RichText::new(notice).color(egui::Color32::from_rgb(242, 201, 76)));
            }

            if let Some(url) = &self.audio_url {
                ui.hyperlink_to("Audio", url.clone());
            }

            if let Some(url) = &self.boxes_url {
                ui.hyperlink_to("Boxes image", url.clone());
            }
        });
    }

    fn text_panel_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading(match self.prompt_type {
                PromptType::Document => "Markdown",
                PromptType::Ocr => "Recognized Text",
                _ => "Output",
            });
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.checkbox(&mut self.show_raw_stream, "Raw stream");
            });
        });
        ui.separator();

        egui::ScrollArea::vertical().auto_shrink(false).show(ui, |ui| {
            let mut text = if self.show_raw_stream {
                self.controller.last_raw_text()
            } else {
                self.controller.live_text()
            };
            ui.add(
                egui::TextEdit::multiline(&mut text)
                    .desired_width(f32::INFINITY)
                    .font(egui::TextStyle::Monospace),
            );
        });
    }

    fn viewer_panel_ui(&mut self, ui: &mut egui::Ui) {
        let show_chips = self.config.overlay.show_chips;
        if let Some(document) = &self.document {
            viewer_ui(ui, &mut self.controller, document, show_chips);
        } else if let Some(Source::Pdf(path)) = &self.source {
            ui.centered_and_justified(|ui| {
                ui.label(format!("PDF ready: {}", path.display()));
            });
        } else {
            ui.centered_and_justified(|ui| {
                ui.label("Drop an image or PDF here, or pass a file on the command line");
            });
        }
    }
}

impl eframe::App for StudioApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        self.process_dropped_files(ctx);
        self.pump_jobs();
        self.drive_polling(now);

        // Keep frames coming while anything is in flight.
        if self.is_busy() || self.model_loading || self.tts_job.is_some() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            self.controls_ui(ui);
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.add_space(2.0);
            self.status_ui(ui);
            ui.add_space(2.0);
        });

        egui::SidePanel::right("text_panel")
            .resizable(true)
            .default_width(420.0)
            .show(ctx, |ui| {
                self.text_panel_ui(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.viewer_panel_ui(ui);
        });
    }
}

/// Load an image file into a texture for the viewer
fn load_preview(ctx: &egui::Context, path: &Path) -> anyhow::Result<Document> {
    use anyhow::Context as _;

    let image = image::open(path)
        .with_context(|| format!("Failed to decode image {:?}", path))?
        .to_rgba8();
    let size = [image.width() as usize, image.height() as usize];

    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, image.as_raw());
    let texture = ctx.load_texture("document", color_image, egui::TextureOptions::LINEAR);

    Ok(Document {
        texture,
        size,
        path: path.to_path_buf(),
    })
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|ext| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Resolve a backend-relative URL against the base URL
fn absolute_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/'))
    }
}

/// Run the application window (blocking)
pub fn run(config: AppConfig, startup_input: Option<PathBuf>) -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([900.0, 600.0])
            .with_title("OCR Studio"),
        ..Default::default()
    };

    eframe::run_native(
        "OCR Studio",
        options,
        Box::new(move |_cc| match StudioApp::new(config, startup_input) {
            Ok(app) => Ok(Box::new(app) as Box<dyn eframe::App>),
            Err(e) => Err(e.into()),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_extension_case_insensitive() {
        assert!(has_extension(Path::new("scan.PNG"), IMAGE_EXTENSIONS));
        assert!(has_extension(Path::new("doc.jpeg"), IMAGE_EXTENSIONS));
        assert!(!has_extension(Path::new("doc.pdf"), IMAGE_EXTENSIONS));
        assert!(has_extension(Path::new("doc.pdf"), &["pdf"]));
        assert!(!has_extension(Path::new("Makefile"), IMAGE_EXTENSIONS));
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(
            absolute_url("http://127.0.0.1:5000", "/outputs/tts_1.mp3"),
            "http://127.0.0.1:5000/outputs/tts_1.mp3"
        );
        assert_eq!(
            absolute_url("http://127.0.0.1:5000/", "outputs/tts_1.mp3"),
            "http://127.0.0.1:5000/outputs/tts_1.mp3"
        );
        assert_eq!(
            absolute_url("http://127.0.0.1:5000", "http://elsewhere/a.mp3"),
            "http://elsewhere/a.mp3"
        );
    }
}
