//! Overlay Presentation Model
//!
//! Maintains the visual elements drawn over the document image as an
//! append-only list keyed by annotation index. A render cursor tracks how
//! many annotations have already been materialized; incremental passes only
//! build elements for annotations past the cursor, so already-drawn regions
//! are never re-diffed. The egui layer repaints the retained list every
//! frame but never constructs elements itself.

use egui::Color32;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::annotate::{project, Annotation, AnnotationKind, PixelBox};

/// How long the "copied" confirmation stays on a label chip
const COPY_FLASH: Duration = Duration::from_millis(1000);

/// Maximum characters of recognized text shown on a text-span chip
const CHIP_PREVIEW_CHARS: usize = 30;

/// Presentation mode of the current document, derived from the prompt type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Raw text recognition: text spans are the payload
    PlainText,
    /// Structured document conversion: tagged blocks carry trailing text
    Document,
    /// Free-form prompts with no grounding semantics
    Other,
}

/// Fill/stroke palette for the known structural tags. Tags outside this
/// table get a deliberately loud highlight so unexpected output is visible.
const TAG_COLORS: &[(&str, Color32)] = &[
    ("title", Color32::from_rgb(235, 87, 87)),
    ("sub_title", Color32::from_rgb(242, 153, 74)),
    ("text", Color32::from_rgb(47, 128, 237)),
    ("table", Color32::from_rgb(39, 174, 96)),
    ("image", Color32::from_rgb(155, 81, 224)),
    ("image_caption", Color32::from_rgb(187, 107, 217)),
    ("figure", Color32::from_rgb(86, 204, 242)),
    ("caption", Color32::from_rgb(111, 207, 151)),
    ("formula", Color32::from_rgb(242, 201, 76)),
    ("list", Color32::from_rgb(82, 196, 202)),
];

/// Text spans are recognized content, not structure
const TEXT_SPAN_COLOR: Color32 = Color32::from_rgb(0, 200, 120);

/// Highlight for tags missing from the color table
const UNKNOWN_TAG_COLOR: Color32 = Color32::from_rgb(255, 0, 255);

fn tag_color(label: &str) -> Color32 {
    let trimmed = label.trim();
    TAG_COLORS
        .iter()
        .find(|(tag, _)| *tag == trimmed)
        .map(|(_, color)| *color)
        .unwrap_or(UNKNOWN_TAG_COLOR)
}

fn with_alpha(color: Color32, alpha: u8) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
}

/// One materialized annotation, ready to paint
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayElement {
    /// Index of the annotation this element was built from
    pub index: usize,
    /// Projected bounds in target pixel space
    pub rect: PixelBox,
    /// Filled region color
    pub fill: Color32,
    /// Border color
    pub stroke: Color32,
    /// Label chip content: tag name, or a truncated text preview
    pub chip: String,
    /// Text copied to the clipboard on activation, if interactive
    pub copy_text: Option<String>,
    /// Whether the element renders disabled ("not yet ready")
    pub dimmed: bool,
}

/// Retained overlay state for one OCR operation
pub struct OverlayModel {
    elements: Vec<OverlayElement>,
    cursor: usize,
    fill_alpha: u8,
    copied: Option<(usize, Instant)>,
}

impl OverlayModel {
    pub fn new(fill_alpha: u8) -> Self {
        Self {
            elements: Vec::new(),
            cursor: 0,
            fill_alpha,
            copied: None,
        }
    }

    /// Number of annotations already materialized
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn elements(&self) -> &[OverlayElement] {
        &self.elements
    }

    /// Drop all visual state and reset the cursor
    pub fn clear(&mut self) {
        self.elements.clear();
        self.cursor = 0;
        self.copied = None;
    }

    /// Materialize annotations past the cursor. Already-rendered elements
    /// are left untouched. Returns the number of new elements. All
    /// annotations in one pass are projected with the same dimensions.
    pub fn render_incremental(
        &mut self,
        annotations: &[Annotation],
        target_width: f32,
        target_height: f32,
        mode: ViewMode,
    ) -> usize {
        if annotations.len() < self.cursor {
            // Only a full re-render may shrink the set; incremental input
            // grows by append.
            warn!(
                "Annotation list shrank under incremental render ({} < {}), ignoring pass",
                annotations.len(),
                self.cursor
            );
            return 0;
        }

        let added = annotations.len() - self.cursor;
        for (index, annotation) in annotations.iter().enumerate().skip(self.cursor) {
            self.elements.push(build_element(
                index,
                annotation,
                target_width,
                target_height,
                mode,
                self.fill_alpha,
            ));
        }
        self.cursor = annotations.len();

        if added > 0 {
            debug!("Overlay grew by {} element(s), cursor now {}", added, self.cursor);
        }
        added
    }

    /// Clear everything and re-render from index 0. Used when the
    /// authoritative final annotation set may differ from what incremental
    /// polls produced.
    pub fn render_full(
        &mut self,
        annotations: &[Annotation],
        target_width: f32,
        target_height: f32,
        mode: ViewMode,
    ) {
        self.clear();
        self.render_incremental(annotations, target_width, target_height, mode);
    }

    /// Record a copy activation so the chip can flash confirmation
    pub fn mark_copied(&mut self, index: usize) {
        self.copied = Some((index, Instant::now()));
    }

    /// Whether the chip at `index` should currently show the confirmation
    pub fn copy_flash(&self, index: usize) -> bool {
        match self.copied {
            Some((i, at)) => i == index && at.elapsed() < COPY_FLASH,
            None => false,
        }
    }
}

/// Build the visual element for one annotation under the given mode
fn build_element(
    index: usize,
    annotation: &Annotation,
    target_width: f32,
    target_height: f32,
    mode: ViewMode,
    fill_alpha: u8,
) -> OverlayElement {
    let rect = project(annotation.bounds, target_width, target_height);

    let base_color = match annotation.kind {
        AnnotationKind::TypeTag => tag_color(&annotation.label),
        AnnotationKind::TextSpan => TEXT_SPAN_COLOR,
    };

    let chip = match annotation.kind {
        AnnotationKind::TypeTag => annotation.label.trim().to_string(),
        AnnotationKind::TextSpan => preview(&annotation.label),
    };

    let (copy_text, dimmed) = match (mode, annotation.kind) {
        // Plain text: the recognized spans themselves are the payload.
        (ViewMode::PlainText, AnnotationKind::TextSpan) => {
            (Some(annotation.label.clone()), false)
        }
        // Document: a tagged block is copyable once its trailing text has
        // settled; until then it renders disabled.
        (ViewMode::Document, AnnotationKind::TypeTag) => {
            if annotation.is_final && !annotation.trailing_text.is_empty() {
                (Some(annotation.trailing_text.clone()), false)
            } else {
                (None, true)
            }
        }
        _ => (None, false),
    };

    let (fill, stroke) = if dimmed {
        (with_alpha(base_color, fill_alpha / 2), Color32::from_gray(128))
    } else {
        (with_alpha(base_color, fill_alpha), base_color)
    };

    OverlayElement {
        index,
        rect,
        fill,
        stroke,
        chip,
        copy_text,
        dimmed,
    }
}

/// Truncated chip preview for recognized text, ellipsized past the limit
fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= CHIP_PREVIEW_CHARS {
        trimmed.to_string()
    } else {
        let mut preview: String = trimmed.chars().take(CHIP_PREVIEW_CHARS).collect();
        preview.push('…');
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{annotate, scan};

    const ALPHA: u8 = 40;

    fn annotations(raw: &str, stream_ended: bool) -> Vec<Annotation> {
        annotate(&scan(raw), raw, stream_ended)
    }

    const TWO_RECORDS: &str = "<|ref|>title<|/ref|><|det|>[[0,0,100,50]]<|/det|>FOO\
                               <|ref|>Hello<|/ref|><|det|>[[0,0,999,999]]<|/det|>BAR";

    #[test]
    fn test_incremental_only_appends_past_cursor() {
        let mut model = OverlayModel::new(ALPHA);

        let first = annotations("<|ref|>title<|/ref|><|det|>[[0,0,100,50]]<|/det|>FOO", false);
        let added = model.render_incremental(&first, 999.0, 999.0, ViewMode::Document);
        assert_eq!(added, 1);
        assert_eq!(model.cursor(), 1);

        // Stream grew by one annotation; the first element must not be rebuilt.
        let both = annotations(TWO_RECORDS, false);
        let before = model.elements()[0].clone();
        let added = model.render_incremental(&both, 999.0, 999.0, ViewMode::Document);
        assert_eq!(added, 1);
        assert_eq!(model.cursor(), 2);
        assert_eq!(model.elements()[0], before);
    }

    #[test]
    fn test_incremental_noop_when_nothing_new() {
        let mut model = OverlayModel::new(ALPHA);
        let anns = annotations(TWO_RECORDS, false);

        model.render_incremental(&anns, 999.0, 999.0, ViewMode::Document);
        let added = model.render_incremental(&anns, 999.0, 999.0, ViewMode::Document);
        assert_eq!(added, 0);
        assert_eq!(model.elements().len(), 2);
    }

    #[test]
    fn test_cursor_never_exceeds_annotation_count() {
        let mut model = OverlayModel::new(ALPHA);
        let anns = annotations(TWO_RECORDS, true);

        model.render_incremental(&anns, 999.0, 999.0, ViewMode::Document);
        assert_eq!(model.cursor(), anns.len());

        // A shrunken list is rejected rather than corrupting the cursor.
        let added = model.render_incremental(&anns[..1], 999.0, 999.0, ViewMode::Document);
        assert_eq!(added, 0);
        assert_eq!(model.cursor(), anns.len());
    }

    #[test]
    fn test_full_render_is_deterministic() {
        let anns = annotations(TWO_RECORDS, true);

        let mut a = OverlayModel::new(ALPHA);
        let mut b = OverlayModel::new(ALPHA);
        a.render_full(&anns, 640.0, 480.0, ViewMode::Document);
        b.render_full(&anns, 640.0, 480.0, ViewMode::Document);

        assert_eq!(a.elements(), b.elements());
    }

    #[test]
    fn test_full_render_replaces_partial_state() {
        let mut model = OverlayModel::new(ALPHA);
        let partial = annotations(TWO_RECORDS, false);
        model.render_incremental(&partial, 999.0, 999.0, ViewMode::Document);

        let final_set = annotations(TWO_RECORDS, true);
        model.render_full(&final_set, 999.0, 999.0, ViewMode::Document);

        assert_eq!(model.elements().len(), 2);
        assert_eq!(model.cursor(), 2);
        // The first block's trailing text has settled, so it is now copyable.
        assert_eq!(model.elements()[0].copy_text.as_deref(), Some("FOO"));
    }

    #[test]
    fn test_plain_text_mode_interaction() {
        let mut model = OverlayModel::new(ALPHA);
        let anns = annotations(TWO_RECORDS, true);
        model.render_full(&anns, 999.0, 999.0, ViewMode::PlainText);

        // Type tags are inert in plain text mode.
        assert!(model.elements()[0].copy_text.is_none());
        assert!(!model.elements()[0].dimmed);
        // Text spans copy their own label.
        assert_eq!(model.elements()[1].copy_text.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_document_mode_dims_unsettled_tags() {
        let mut model = OverlayModel::new(ALPHA);
        let raw = "<|ref|>title<|/ref|><|det|>[[0,0,100,50]]<|/det|>Hello";
        let anns = annotations(raw, false);
        model.render_full(&anns, 999.0, 999.0, ViewMode::Document);

        let element = &model.elements()[0];
        assert!(element.copy_text.is_none());
        assert!(element.dimmed);
        assert_eq!(element.stroke, Color32::from_gray(128));
    }

    #[test]
    fn test_other_mode_nothing_interactive() {
        let mut model = OverlayModel::new(ALPHA);
        let anns = annotations(TWO_RECORDS, true);
        model.render_full(&anns, 999.0, 999.0, ViewMode::Other);

        assert!(model.elements().iter().all(|e| e.copy_text.is_none()));
    }

    #[test]
    fn test_unknown_tag_gets_highlight_color() {
        // "header" is not in the tag vocabulary, so a tag-colored element
        // for it falls through to the loud highlight.
        assert_eq!(tag_color("header"), UNKNOWN_TAG_COLOR);
        assert_eq!(tag_color("title"), Color32::from_rgb(235, 87, 87));
    }

    #[test]
    fn test_chip_preview_truncation() {
        assert_eq!(preview("short text"), "short text");

        let long = "a".repeat(45);
        let chip = preview(&long);
        assert_eq!(chip.chars().count(), CHIP_PREVIEW_CHARS + 1);
        assert!(chip.ends_with('…'));

        // Multi-byte characters must not be split.
        let kana = "あ".repeat(40);
        let chip = preview(&kana);
        assert_eq!(chip.chars().count(), CHIP_PREVIEW_CHARS + 1);
    }

    #[test]
    fn test_copy_flash_window() {
        let mut model = OverlayModel::new(ALPHA);
        let anns = annotations(TWO_RECORDS, true);
        model.render_full(&anns, 999.0, 999.0, ViewMode::Document);

        assert!(!model.copy_flash(0));
        model.mark_copied(0);
        assert!(model.copy_flash(0));
        assert!(!model.copy_flash(1));
    }
}
