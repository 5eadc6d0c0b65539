//! Canvas label text for items.
//!
//! # Invariants
//! - Labels are plain text; markup in the stored description is dropped.
//! - A truncated label never ends inside a word and always ends in `...`.

use crate::model::identity::Identity;
use once_cell::sync::Lazy;
use regex::Regex;

static HEAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(head|style|script)\b.*?</(head|style|script)\s*>")
        .expect("valid head regex")
});
static BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*(br|/p|/div|/li|/h[1-6])\b[^>]*>").expect("valid break regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid space regex"));

const ELLIPSIS: &str = "...";

/// Converts stored rich text to collapsed plain text.
pub fn plain_text(description: &str) -> String {
    let without_head = HEAD_RE.replace_all(description, " ");
    let with_breaks = BREAK_RE.replace_all(&without_head, " ");
    let without_tags = TAG_RE.replace_all(&with_breaks, "");
    let decoded = decode_entities(&without_tags);
    SPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Label shown on the canvas for one item.
///
/// Descriptions longer than `max_chars` are cut to `max_chars`, the
/// trailing partial word is dropped (unless it is the only word), trailing
/// spaces are removed and `...` is appended. An empty description yields
/// the identity in parentheses, e.g. `(R1)`.
pub fn derive_item_label(description: &str, identity: Identity, max_chars: usize) -> String {
    let text = plain_text(description);
    if text.is_empty() {
        return format!("({identity})");
    }
    if text.chars().count() <= max_chars {
        return text;
    }

    let cut: String = text.chars().take(max_chars).collect();
    let kept = match cut.rfind(' ') {
        Some(boundary) if !cut.ends_with(' ') => &cut[..boundary],
        _ => cut.as_str(),
    };
    let mut label = kept.trim_end().to_string();
    label.push_str(ELLIPSIS);
    label
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
