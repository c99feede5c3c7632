//! Grounding markup scanner
//!
//! Finds every fully-closed marker sequence in a raw token stream. The
//! stream is usually still being written when we scan it: an unterminated
//! sequence at the tail is simply not matched yet and will be picked up on
//! a later pass once its closing marker arrives.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use super::NormBox;

/// One fully-closed marker sequence found in the raw stream
#[derive(Debug, Clone, PartialEq)]
pub struct RawMatch {
    /// Content between the reference markers
    pub label: String,
    /// Normalized bounding box parsed from the detection payload
    pub bounds: NormBox,
    /// Byte offset of the opening reference marker
    pub start: usize,
    /// Byte offset one past the closing detection marker
    pub end: usize,
}

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Marker spellings must match the backend byte-for-byte.
        Regex::new(r"<\|ref\|>([^<]*)<\|/ref\|><\|det\|>\[\[(.*?)\]\]<\|/det\|>")
            .expect("marker pattern is valid")
    })
}

/// Scan the raw stream for all closed marker sequences, left to right.
///
/// Records with anything other than exactly four finite coordinate values
/// are dropped. Safe to call on partial text; single pass over the input.
pub fn scan(raw: &str) -> Vec<RawMatch> {
    let mut matches = Vec::new();

    for caps in marker_pattern().captures_iter(raw) {
        let whole = caps.get(0).expect("group 0 is the whole match");
        let label = &caps[1];
        let coords = &caps[2];

        match parse_coords(coords) {
            Some(bounds) => matches.push(RawMatch {
                label: label.to_string(),
                bounds,
                start: whole.start(),
                end: whole.end(),
            }),
            None => {
                debug!("Dropping annotation '{}' with malformed coordinates: [[{}]]", label, coords);
            }
        }
    }

    matches
}

/// Parse a comma-separated coordinate list into a box.
///
/// Tokens that fail to parse as finite floats are dropped; the record is
/// accepted only if exactly four values remain.
fn parse_coords(list: &str) -> Option<NormBox> {
    let values: Vec<f32> = list
        .split(',')
        .filter_map(|token| token.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .collect();

    match values[..] {
        [x1, y1, x2, y2] => Some(NormBox { x1, y1, x2, y2 }),
        _ => None,
    }
}
