//! Completion tracking
//!
//! Decides which annotations are final and attaches the free text that
//! follows each region in the stream. A region's trailing text is only
//! trustworthy once something proves the span is closed: either a later
//! region has started, or the stream itself has ended.

use super::{is_structure_tag, Annotation, AnnotationKind, RawMatch};

/// Build annotations from scanner matches over the same raw text.
///
/// For every match except the last, the trailing text is the trimmed text
/// strictly between it and the next match, and the span is closed by
/// construction. The last match's span is only closed once `stream_ended`
/// is true; while the stream is open more text may still be appended to it.
/// An ended stream with empty trailing text is still not final: there is
/// nothing to show.
///
/// Pure function: identical inputs yield identical output.
pub fn annotate(matches: &[RawMatch], raw: &str, stream_ended: bool) -> Vec<Annotation> {
    let mut annotations = Vec::with_capacity(matches.len());

    for (i, m) in matches.iter().enumerate() {
        let (span, closed) = match matches.get(i + 1) {
            Some(next) => (&raw[m.end..next.start], true),
            None => (&raw[m.end..], stream_ended),
        };
        let trailing = span.trim();

        let kind = if is_structure_tag(&m.label) {
            AnnotationKind::TypeTag
        } else {
            AnnotationKind::TextSpan
        };

        annotations.push(Annotation {
            label: m.label.clone(),
            kind,
            bounds: m.bounds,
            trailing_text: trailing.to_string(),
            is_final: closed && !trailing.is_empty(),
        });
    }

    annotations
}
