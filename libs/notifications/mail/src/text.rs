//! Plain text derived from html bodies
//!
//! Uses the scraper crate to walk the parsed html and keep only the text,
//! with block elements on their own lines.

use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));
static LINE_PADDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*\n[ \t]*").expect("static regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex"));

/// Elements whose content never reaches the text body
const SKIPPED: &[&str] = &["head", "img", "script", "style", "title"];

/// Elements rendered on their own lines
const BLOCKS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "div", "dl", "dt", "dd", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol",
    "p", "pre", "section", "table", "tr", "ul",
];

/// Convert html into plain text.
///
/// Images are dropped entirely (no alt text) and the result is trimmed.
/// Links keep their target after the link text. The conversion is
/// deterministic for a given input.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    walk(fragment.root_element(), &mut out);

    let out = LINE_PADDING.replace_all(&out, "\n");
    let out = BLANK_LINES.replace_all(&out, "\n\n");
    out.trim().to_string()
}

fn walk(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(&WHITESPACE.replace_all(text, " "));
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };

        let name = child.value().name();
        if SKIPPED.contains(&name) {
            continue;
        }
        match name {
            "br" => out.push('\n'),
            "td" | "th" => {
                walk(child, out);
                out.push(' ');
            }
            "a" => {
                let start = out.len();
                walk(child, out);
                let label = out[start..].trim().to_string();
                if let Some(href) = child.value().attr("href") {
                    if !href.starts_with('#') && !href.is_empty() && label != href {
                        out.push_str(&format!(" ({href})"));
                    }
                }
            }
            _ if BLOCKS.contains(&name) => {
                out.push_str("\n\n");
                if name == "li" {
                    out.push_str("* ");
                }
                walk(child, out);
                out.push_str("\n\n");
            }
            _ => walk(child, out),
        }
    }
}
