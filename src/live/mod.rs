//! Live Update Controller
//!
//! Owns the state machine for one in-flight OCR operation: a fixed-interval
//! poll against the backend's progress endpoint races a single long-running
//! OCR request, and each poll's partial token stream is pushed through the
//! annotation pipeline into the overlay. When the request resolves, the
//! authoritative final text replaces everything a poll may have missed.
//!
//! Every operation gets a fresh epoch; poll results carrying an older epoch
//! (or arriving after settlement) are discarded before touching any state.

pub mod ticker;

pub use ticker::Ticker;

use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::annotate::{annotate, scan, Annotation, AnnotationKind};
use crate::overlay::{OverlayModel, ViewMode};

/// Lifecycle stage of the current OCR operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Polling,
    Settling,
    Done,
    Failed,
}

/// State machine driving the annotation pipeline for one operation
pub struct LiveUpdateController {
    stage: Stage,
    epoch: u64,
    mode: ViewMode,
    ticker: Ticker,
    overlay: OverlayModel,
    last_raw_text: String,
    live_text: String,
    error: Option<String>,
}

impl LiveUpdateController {
    pub fn new(poll_interval: Duration, fill_alpha: u8) -> Self {
        Self {
            stage: Stage::Idle,
            epoch: 0,
            mode: ViewMode::Document,
            ticker: Ticker::new(poll_interval),
            overlay: OverlayModel::new(fill_alpha),
            last_raw_text: String::new(),
            live_text: String::new(),
            error: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Generation token for the current operation
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether an operation is currently in flight
    pub fn is_busy(&self) -> bool {
        matches!(self.stage, Stage::Polling | Stage::Settling)
    }

    pub fn overlay(&self) -> &OverlayModel {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut OverlayModel {
        &mut self.overlay
    }

    /// Content of the text panel
    pub fn live_text(&self) -> &str {
        &self.live_text
    }

    /// Raw markup most recently fed through the pipeline
    pub fn last_raw_text(&self) -> &str {
        &self.last_raw_text
    }

    /// User-visible failure message, present only in `Failed`
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Begin a new operation: fresh epoch, empty overlay, ticker running.
    /// Returns the epoch that tags this operation's callbacks.
    pub fn start(&mut self, mode: ViewMode, now: Instant) -> u64 {
        self.epoch += 1;
        self.stage = Stage::Polling;
        self.mode = mode;
        self.overlay.clear();
        self.last_raw_text.clear();
        self.live_text.clear();
        self.error = None;
        self.ticker.start(now);

        info!("OCR operation started (epoch {})", self.epoch);
        self.epoch
    }

    /// Whether a progress fetch should be fired now
    pub fn poll_due(&mut self, now: Instant) -> bool {
        self.stage == Stage::Polling && self.ticker.due(now)
    }

    /// Feed one poll's partial token stream through the pipeline.
    ///
    /// Stale results (older epoch, or arriving after settlement) are
    /// discarded without touching overlay or text state.
    pub fn apply_partial(&mut self, epoch: u64, raw: &str, target: (f32, f32)) {
        if !self.accepts(epoch) {
            debug!("Discarding stale poll result (epoch {} != {})", epoch, self.epoch);
            return;
        }

        let annotations = annotate(&scan(raw), raw, false);
        self.overlay
            .render_incremental(&annotations, target.0, target.1, self.mode);
        self.live_text = panel_text(self.mode, raw, &annotations);
        self.last_raw_text.clear();
        self.last_raw_text.push_str(raw);
    }

    /// A progress fetch failed; transient, retried on the next tick.
    pub fn note_poll_failure(&self, epoch: u64) {
        debug!("Progress poll failed (epoch {}), will retry next tick", epoch);
    }

    /// The owning OCR request resolved successfully: stop polling and
    /// re-render everything from the authoritative final text.
    pub fn settle_success(&mut self, epoch: u64, final_text: &str, target: (f32, f32)) {
        if !self.accepts(epoch) {
            debug!("Discarding stale settlement (epoch {} != {})", epoch, self.epoch);
            return;
        }

        self.stage = Stage::Settling;
        self.ticker.stop();

        let annotations = annotate(&scan(final_text), final_text, true);
        self.overlay
            .render_full(&annotations, target.0, target.1, self.mode);
        self.live_text = panel_text(self.mode, final_text, &annotations);
        self.last_raw_text.clear();
        self.last_raw_text.push_str(final_text);

        self.stage = Stage::Done;
        info!(
            "OCR operation settled (epoch {}): {} annotation(s)",
            self.epoch,
            annotations.len()
        );
    }

    /// The owning OCR request failed: stop polling, clear all visual and
    /// text state, surface the message.
    pub fn settle_failure(&mut self, epoch: u64, message: &str) {
        if !self.accepts(epoch) {
            debug!("Discarding stale failure (epoch {} != {})", epoch, self.epoch);
            return;
        }

        self.stage = Stage::Settling;
        self.ticker.stop();
        self.overlay.clear();
        self.live_text.clear();
        self.last_raw_text.clear();
        self.error = Some(message.to_string());
        self.stage = Stage::Failed;

        error!("OCR operation failed (epoch {}): {}", self.epoch, message);
    }

    /// Abandon the current operation and return to `Idle` (new document
    /// loaded or view cleared). The ticker is stopped on this path too.
    pub fn reset(&mut self) {
        self.ticker.stop();
        self.stage = Stage::Idle;
        self.overlay.clear();
        self.last_raw_text.clear();
        self.live_text.clear();
        self.error = None;
    }

    /// A callback may mutate state only for the current epoch while the
    /// operation is still polling.
    fn accepts(&self, epoch: u64) -> bool {
        epoch == self.epoch && self.stage == Stage::Polling
    }
}

/// Text panel content for the given mode: plain text mode shows recognized
/// spans joined by newlines, every other mode shows the raw text verbatim.
fn panel_text(mode: ViewMode, raw: &str, annotations: &[Annotation]) -> String {
    match mode {
        ViewMode::PlainText => annotations
            .iter()
            .filter(|a| a.kind == AnnotationKind::TextSpan)
            .map(|a| a.label.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        ViewMode::Document | ViewMode::Other => raw.to_string(),
    }
}
