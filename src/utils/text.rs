// src/utils/text.rs

//! HTML text extraction helpers.
//!
//! Parsed documents are not `Send`, so every helper takes raw HTML and
//! returns owned data.

use scraper::{ElementRef, Html, Selector};

use super::resolve;

/// Elements whose text never reaches the screen.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that start a new line of rendered text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "details", "dialog", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table",
    "tbody", "thead", "tfoot", "tr", "ul",
];

/// Table cells stay on their row's line.
const CELL_ELEMENTS: &[&str] = &["td", "th"];

/// Collapse runs of whitespace into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the visible text of the `<body>`, roughly as a browser lays it out.
///
/// Inline content is joined without separators, so `<span>14</span>:<span>30</span>`
/// reads `14:30`. Block elements and `<br>` break lines.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut raw = String::new();
    push_rendered(body, &mut raw);

    raw.lines()
        .map(normalize_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_rendered(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            // Source newlines are layout-neutral inside a text node.
            out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };

        let name = child.value().name();
        if HIDDEN_ELEMENTS.contains(&name) {
            continue;
        }
        if name == "br" {
            out.push('\n');
            continue;
        }

        let block = BLOCK_ELEMENTS.contains(&name);
        if block {
            out.push('\n');
        }
        push_rendered(child, out);
        if block {
            out.push('\n');
        } else if CELL_ELEMENTS.contains(&name) {
            out.push(' ');
        }
    }
}

/// Whether any of `labels` contains `needle`, ignoring case and spacing.
pub fn label_matches<'a>(needle: &str, labels: impl IntoIterator<Item = &'a str>) -> bool {
    let needle = normalize_whitespace(needle).to_lowercase();
    !needle.is_empty()
        && labels
            .into_iter()
            .any(|label| normalize_whitespace(label).to_lowercase().contains(&needle))
}

/// Find the first link whose accessible name contains `needle`
/// (case-insensitive) and return its absolute URL.
///
/// The name covers the link text, its `title` and `aria-label`, and the
/// `alt` text of images inside it.
pub fn find_link_by_text(html: &str, base_url: &str, needle: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").ok()?;
    let images = Selector::parse("img[alt]").ok()?;

    document.select(&selector).find_map(|anchor| {
        let text = anchor.text().collect::<String>();
        let labels = [anchor.value().attr("title"), anchor.value().attr("aria-label")]
            .into_iter()
            .flatten()
            .chain(anchor.select(&images).filter_map(|img| img.value().attr("alt")))
            .chain(std::iter::once(text.as_str()));

        if label_matches(needle, labels) {
            let href = anchor.value().attr("href")?;
            resolve(base_url, href)
        } else {
            None
        }
    })
}
