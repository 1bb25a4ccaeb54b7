//! Main-content extraction and the content-sufficiency check.
//!
//! Extraction reduces raw HTML to the primary content container by probing
//! semantic selectors in priority order, falling back to `<body>`. The
//! sufficiency check strips `<script>` and `<style>` subtrees and measures
//! the remaining visible text.

use anyhow::Result;
use scraper::{Html, Node, Selector};
use std::sync::LazyLock;

/// Input ceiling to bound parser memory on hostile pages (10 MB).
const MAX_HTML_SIZE: usize = 10 * 1024 * 1024;

// Hardcoded selectors should never fail to parse; a failure here is a bug.
static CONTENT_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "main",
        "article",
        "[role='main']",
        "#main-content",
        ".main-content",
        "#content",
        ".content",
        ".post-content",
        ".entry-content",
        "[itemprop='articleBody']",
        ".article-body",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("BUG: hardcoded CSS selector is invalid"))
    .collect()
});

static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("BUG: hardcoded CSS selector is invalid"));

/// Extract the primary content container from an HTML page.
///
/// Probes semantic containers in priority order (`<main>`, `<article>`,
/// `[role=main]`, common content ids/classes), falls back to `<body>`, and
/// as a last resort returns the input unchanged.
pub fn extract_main_content(html: &str) -> Result<String> {
    if html.len() > MAX_HTML_SIZE {
        anyhow::bail!(
            "HTML input too large: {} bytes (maximum {} bytes)",
            html.len(),
            MAX_HTML_SIZE
        );
    }

    let document = Html::parse_document(html);

    for selector in CONTENT_SELECTORS.iter() {
        if let Some(element) = document.select(selector).next() {
            return Ok(element.html());
        }
    }

    if let Some(body) = document.select(&BODY_SELECTOR).next() {
        return Ok(body.html());
    }

    Ok(html.to_string())
}

/// Visible text of a document: every text node outside `<script>` and
/// `<style>` subtrees, whitespace runs collapsed to single spaces, trimmed.
#[must_use]
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();

    for node in document.tree.nodes() {
        if let Node::Text(text) = node.value() {
            let hidden = node.ancestors().any(|a| {
                matches!(
                    a.value(),
                    Node::Element(el) if el.name().eq_ignore_ascii_case("script")
                        || el.name().eq_ignore_ascii_case("style")
                )
            });
            if !hidden {
                raw.push_str(text);
                raw.push(' ');
            }
        }
    }

    let mut out = String::with_capacity(raw.len());
    for word in raw.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Whether a page carries enough visible text to be worth saving.
///
/// A minimum of 0 still rejects pages whose visible text is empty.
#[must_use]
pub fn has_sufficient_content(html: &str, min_length: usize) -> bool {
    let text = visible_text(html);
    !text.is_empty() && text.len() >= min_length
}
