//! Status HTML → normalized request text.
//!
//! Mastodon delivers status bodies as HTML with mentions and hashtags wrapped
//! in links. Before the text reaches the parameter compiler it is flattened,
//! stripped of mentions/hashtags, whitespace-collapsed, and NFC-normalized.

use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::sync::LazyLock;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

/// Applied in order; each match is replaced by a single space.
static STRIPPERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"@[a-zA-Z0-9._-]+", r"#\w+", r"[ \r\n\t]+"]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("valid stripper pattern"))
        .collect()
});

/// Convert status HTML to plain text, keeping line structure.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    collect_text(&fragment.root_element(), &mut out);
    out.trim().to_string()
}

fn collect_text(element: &ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let tag = el.name();
                if tag == "br" {
                    out.push('\n');
                    continue;
                }
                let is_block = matches!(
                    tag,
                    "p" | "div" | "li" | "ul" | "ol" | "blockquote" | "pre" | "h1" | "h2" | "h3"
                );
                if is_block {
                    out.push('\n');
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_text(&child_ref, out);
                }
                if is_block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Strip mentions, hashtags, and redundant whitespace from plain text, then
/// normalize to Unicode canonical composed form.
pub fn strip_and_normalize(text: &str) -> String {
    let mut content = text.to_string();
    for stripper in STRIPPERS.iter() {
        content = stripper.replace_all(&content, " ").trim().to_string();
    }
    content.nfc().collect()
}

/// Full pipeline from raw status HTML to compiler input.
pub fn extract_and_normalize(html: &str) -> String {
    debug!("html: {html}");
    let text = html_to_text(html);
    debug!("text: {text}");
    let normalized = strip_and_normalize(&text);
    debug!("text (stripped): {normalized}");
    normalized
}
