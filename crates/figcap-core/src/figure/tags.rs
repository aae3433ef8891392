//! Tolerant parsing of `[CROP: ...]` tags and `[FIG_CAPTURE: ...]` references.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

lazy_static! {
    // [CROP: ymin, xmin, ymax, xmax | Caption]
    pub static ref CROP_TAG: Regex = Regex::new(
        r"(?i)\[\s*CROP\s*:\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*(?:\|\s*([^\]]*?)\s*)?\]"
    ).unwrap();

    // [FIG_CAPTURE: imageId | Caption]
    pub static ref FIG_CAPTURE: Regex = Regex::new(
        r"\[FIG_CAPTURE:\s*([^\]|]+?)\s*\|\s*([^\]]*?)\s*\]"
    ).unwrap();
}

/// A `[CROP: ...]` tag located in the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropTag {
    /// Position in parse order.
    pub index: usize,
    /// Parsed rectangle, labeled with the tag text and caption.
    pub rect: Rect,
    /// Byte offset of the tag start.
    pub start: usize,
    /// Byte offset one past the tag end.
    pub end: usize,
}

/// An embedded figure reference found in rewritten text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureRef {
    pub image_id: String,
    pub caption: String,
}

/// Extracts crop tags from annotated OCR output.
#[derive(Debug, Clone)]
pub struct CropTagParser {
    default_caption: String,
}

impl CropTagParser {
    /// Create a parser with the `"Figure"` default caption.
    pub fn new() -> Self {
        Self {
            default_caption: "Figure".to_string(),
        }
    }

    /// Set the caption used when a tag carries none.
    pub fn with_default_caption(mut self, caption: impl Into<String>) -> Self {
        self.default_caption = caption.into();
        self
    }

    /// Parse every crop tag in `text`, in source order.
    pub fn parse(&self, text: &str) -> Vec<CropTag> {
        let mut tags = Vec::new();

        for caps in CROP_TAG.captures_iter(text) {
            let Some(full_match) = caps.get(0) else {
                continue;
            };

            let coords: Vec<f64> = (1..=4)
                .filter_map(|i| caps.get(i))
                .filter_map(|m| m.as_str().parse::<f64>().ok())
                .collect();

            let [ymin, xmin, ymax, xmax] = coords[..] else {
                continue;
            };

            let desc = caps
                .get(5)
                .map(|m| m.as_str().trim())
                .filter(|s| !s.is_empty())
                .unwrap_or(self.default_caption.as_str());

            tags.push(CropTag {
                index: tags.len(),
                rect: Rect::new(ymin, xmin, ymax, xmax).with_label(full_match.as_str(), desc),
                start: full_match.start(),
                end: full_match.end(),
            });
        }

        tags
    }
}

impl Default for CropTagParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse crop tags with the default caption.
pub fn parse_crop_tags(text: &str) -> Vec<CropTag> {
    CropTagParser::new().parse(text)
}

/// Format an embedded figure reference.
///
/// Brackets are dropped from the caption so the reference stays well formed
/// and never contains crop tag syntax.
pub fn figure_reference(image_id: &str, caption: &str) -> String {
    format!("[FIG_CAPTURE: {} | {}]", image_id, strip_brackets(caption))
}

/// `caption` without `[` or `]`.
pub(crate) fn strip_brackets(caption: &str) -> String {
    caption.replace(['[', ']'], "")
}

/// Collect all figure references in `text`.
pub fn figure_references(text: &str) -> Vec<FigureRef> {
    FIG_CAPTURE
        .captures_iter(text)
        .map(|caps| FigureRef {
            image_id: caps[1].to_string(),
            caption: caps[2].to_string(),
        })
        .collect()
}
