//! Rewriting of annotated text once every tag has a decision.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::tags::{figure_reference, strip_brackets, CropTag, CROP_TAG};

/// What happens to one parsed tag in the output text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TagDecision {
    /// Replaced by a reference to the stored image.
    KeptPrimary { image_id: String, caption: String },
    /// Same figure as a primary tag; deleted.
    KeptSecondary,
    /// Deleted, or replaced by a plain caption when the crop itself failed.
    Discarded { fallback: Option<String> },
}

/// Plain-text stand-in for a figure whose crop could not be produced.
pub fn fallback_caption(caption: &str) -> String {
    format!("[Figure: {}]", strip_brackets(caption))
}

/// Rewrite `source` by tag span.
///
/// `tags` must come from parsing `source`. Every tag is substituted at its own
/// byte range, so verbatim duplicates are handled independently. Tags without
/// a decision are copied through and removed by the cleanup pass.
///
/// Cleanup only touches text copied from `source`: each run of copied text
/// between two insertions is stripped until no crop tag remains, including
/// tags formed by joining text around a deleted tag or reaching into the
/// next insertion.
pub fn rewrite(source: &str, tags: &[CropTag], decisions: &BTreeMap<usize, TagDecision>) -> String {
    let mut spans: Vec<&CropTag> = tags.iter().collect();
    spans.sort_by_key(|t| t.start);

    let mut out = String::with_capacity(source.len());
    let mut copied = String::new();
    let mut cursor = 0;

    for tag in spans {
        if tag.start < cursor || tag.end > source.len() {
            continue;
        }

        copied.push_str(&source[cursor..tag.start]);
        cursor = tag.end;

        let insertion = match decisions.get(&tag.index) {
            Some(TagDecision::KeptPrimary { image_id, caption }) => {
                figure_reference(image_id, caption)
            }
            Some(TagDecision::Discarded {
                fallback: Some(text),
            }) => text.clone(),
            Some(TagDecision::KeptSecondary) | Some(TagDecision::Discarded { fallback: None }) => {
                continue;
            }
            None => {
                copied.push_str(&source[tag.start..tag.end]);
                continue;
            }
        };

        out.push_str(&strip_before(&copied, &insertion));
        out.push_str(&insertion);
        copied.clear();
    }

    copied.push_str(&source[cursor..]);
    out.push_str(&strip_crop_tags(&copied));
    out
}

/// Strip `copied`, then cut any dangling tag start that would close inside `next`.
fn strip_before(copied: &str, next: &str) -> String {
    let mut text = strip_crop_tags(copied);

    loop {
        let joined = format!("{}{}", text, next);
        let boundary = text.len();
        let spanning = CROP_TAG
            .find_iter(&joined)
            .find(|m| m.start() < boundary && m.end() > boundary)
            .map(|m| m.start());

        match spanning {
            Some(start) => {
                warn!("Dropping dangling crop tag text before an inserted reference");
                text.truncate(start);
            }
            None => return text,
        }
    }
}

/// Remove every crop tag in `text`, repeating until none remains.
pub fn strip_crop_tags(text: &str) -> String {
    let mut out = text.to_string();
    let mut removed = 0;

    while CROP_TAG.is_match(&out) {
        removed += CROP_TAG.find_iter(&out).count();
        out = CROP_TAG.replace_all(&out, "").into_owned();
    }

    if removed > 0 {
        warn!("Stripped {} crop tag(s) without a decision", removed);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::tags::{figure_references, parse_crop_tags};
    use pretty_assertions::assert_eq;

    fn primary(id: &str, caption: &str) -> TagDecision {
        TagDecision::KeptPrimary {
            image_id: id.to_string(),
            caption: caption.to_string(),
        }
    }

    #[test]
    fn test_primary_and_secondary() {
        let text = "A [CROP:100,100,200,200|Circuit A] B [CROP:105,210,205,310|Circuit A] C";
        let tags = parse_crop_tags(text);
        let decisions = BTreeMap::from([
            (0, primary("img1", "Circuit A")),
            (1, TagDecision::KeptSecondary),
        ]);

        let out = rewrite(text, &tags, &decisions);
        assert_eq!(out, "A [FIG_CAPTURE: img1 | Circuit A] B  C");
    }

    #[test]
    fn test_discarded_leaves_no_residue() {
        let text = "x [CROP:1,2,3,4|tiny] y";
        let tags = parse_crop_tags(text);
        let decisions = BTreeMap::from([(0, TagDecision::Discarded { fallback: None })]);

        let out = rewrite(text, &tags, &decisions);
        assert_eq!(out, "x  y");
        assert!(!out.contains(&tags[0].rect.full_tag));
    }

    #[test]
    fn test_fallback_caption() {
        let text = "[CROP:1,2,300,400|Graph]";
        let tags = parse_crop_tags(text);
        let decisions = BTreeMap::from([(
            0,
            TagDecision::Discarded {
                fallback: Some(fallback_caption("Graph")),
            },
        )]);

        assert_eq!(rewrite(text, &tags, &decisions), "[Figure: Graph]");
    }

    #[test]
    fn test_undecided_tags_stripped() {
        let text = "a [CROP:1,2,3,4] b [CROP:5,6,7,8|z] c";
        let tags = parse_crop_tags(text);
        let decisions = BTreeMap::from([(0, primary("img", "Figure"))]);

        let out = rewrite(text, &tags, &decisions);
        assert_eq!(out, "a [FIG_CAPTURE: img | Figure] b  c");
    }

    #[test]
    fn test_duplicate_verbatim_tags_rewritten_by_span() {
        let text = "[CROP:1,2,3,4] mid [CROP:1,2,3,4]";
        let tags = parse_crop_tags(text);
        let decisions = BTreeMap::from([
            (0, primary("first", "Figure")),
            (1, TagDecision::Discarded { fallback: None }),
        ]);

        let out = rewrite(text, &tags, &decisions);
        assert_eq!(out, "[FIG_CAPTURE: first | Figure] mid ");
        assert_eq!(figure_references(&out).len(), 1);
    }

    #[test]
    fn test_no_tags() {
        let text = "plain notes";
        assert_eq!(rewrite(text, &[], &BTreeMap::new()), text);
    }

    #[test]
    fn test_cleanup_repeats_until_no_tag_left() {
        let text = "[CR[CR[CROP:1,2,3,4]OP:1,2,3,4]OP:1,2,3,4]";
        let tags = parse_crop_tags(text);
        assert_eq!(tags.len(), 1);
        let decisions = BTreeMap::from([(0, TagDecision::Discarded { fallback: None })]);

        let out = rewrite(text, &tags, &decisions);
        assert_eq!(out, "");
        assert!(CROP_TAG.find(&out).is_none());
    }

    #[test]
    fn test_cleanup_leaves_reference_intact() {
        let text = "[CR[CROP:5,6,7,8]OP:1,2,3,4|note [CROP:100,100,300,300|Fig] tail";
        let tags = parse_crop_tags(text);
        assert_eq!(tags.len(), 2);
        let decisions = BTreeMap::from([
            (0, TagDecision::Discarded { fallback: None }),
            (1, primary("img", "Fig")),
        ]);

        let out = rewrite(text, &tags, &decisions);
        assert_eq!(out, "[FIG_CAPTURE: img | Fig] tail");
        assert!(CROP_TAG.find(&out).is_none());
        assert_eq!(figure_references(&out).len(), 1);
    }

    #[test]
    fn test_caption_with_tag_syntax_keeps_reference() {
        let text = "[CROP:100,100,300,300|see [crop:1,2,3,4]";
        let tags = parse_crop_tags(text);
        assert_eq!(tags[0].rect.desc, "see [crop:1,2,3,4");
        let decisions = BTreeMap::from([(0, primary("img_1", &tags[0].rect.desc))]);

        let out = rewrite(text, &tags, &decisions);
        let refs = figure_references(&out);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].image_id, "img_1");
        assert!(CROP_TAG.find(&out).is_none());
    }

    #[test]
    fn test_strip_crop_tags() {
        assert_eq!(strip_crop_tags("a[crop: 1,2,3,4 | q]b"), "ab");
        assert_eq!(strip_crop_tags("[FIG_CAPTURE: x | y]"), "[FIG_CAPTURE: x | y]");
    }
}
