//! Text conversions: markdown rendering and html stripping

use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use std::sync::OnceLock;

/// Render CommonMark (with tables and strikethrough) to html
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Tags that start a new line
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "header", "hr", "li", "main", "nav", "ol", "section",
    "table", "tbody", "thead", "tfoot", "tr", "ul",
];

/// Tags whose content is never text
const SKIPPED_TAGS: &[&str] = &["script", "style", "head", "template"];

static TAG_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Comments, or an opening/closing tag with its name captured
fn tag_pattern() -> &'static Regex {
    TAG_PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<!--.*?-->|<(/?)([A-Za-z][A-Za-z0-9]*)\b[^>]*>")
            .expect("tag pattern is a valid regex")
    })
}

/// Strip html down to readable plain text.
///
/// Headings are upper-cased and separated by blank lines, paragraphs are
/// separated by blank lines, other block elements and `<br>` end a line.
/// Entities are decoded and runs of whitespace collapse to one space,
/// except inside `<pre>` where text is kept as written.
pub fn html_to_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut heading = 0usize;
    let mut pre = 0usize;
    let mut skipped = 0usize;
    let mut cursor = 0;

    for caps in tag_pattern().captures_iter(input) {
        let Some(whole) = caps.get(0) else { continue };
        if skipped == 0 {
            push_text(&mut out, &input[cursor..whole.start()], heading > 0, pre > 0);
        }
        cursor = whole.end();

        // Comment
        let Some(name) = caps.get(2) else { continue };
        let name = name.as_str().to_ascii_lowercase();
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());

        if SKIPPED_TAGS.contains(&name.as_str()) {
            skipped = if closing {
                skipped.saturating_sub(1)
            } else {
                skipped + 1
            };
            continue;
        }
        if skipped > 0 {
            continue;
        }

        match name.as_str() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                heading = if closing {
                    heading.saturating_sub(1)
                } else {
                    heading + 1
                };
                end_line(&mut out, 2);
            }
            "pre" => {
                pre = if closing {
                    pre.saturating_sub(1)
                } else {
                    pre + 1
                };
                end_line(&mut out, 1);
            }
            "p" => end_line(&mut out, 2),
            "br" => {
                trim_trailing_spaces(&mut out);
                out.push('\n');
            }
            tag if BLOCK_TAGS.contains(&tag) => end_line(&mut out, 1),
            _ => {}
        }
    }
    if skipped == 0 {
        push_text(&mut out, &input[cursor..], heading > 0, pre > 0);
    }

    out.trim().to_string()
}

fn push_text(out: &mut String, raw: &str, upper: bool, preformatted: bool) {
    if raw.is_empty() {
        return;
    }
    let decoded = html_escape::decode_html_entities(raw);
    if preformatted {
        if upper {
            out.push_str(&decoded.to_uppercase());
        } else {
            out.push_str(&decoded);
        }
        return;
    }
    for word_or_space in split_whitespace_runs(&decoded) {
        match word_or_space {
            Chunk::Space => {
                if !out.is_empty() && !out.ends_with([' ', '\n']) {
                    out.push(' ');
                }
            }
            Chunk::Word(word) if upper => out.push_str(&word.to_uppercase()),
            Chunk::Word(word) => out.push_str(word),
        }
    }
}

enum Chunk<'a> {
    Space,
    Word(&'a str),
}

fn split_whitespace_runs(text: &str) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                chunks.push(Chunk::Word(&text[s..i]));
            }
            if !matches!(chunks.last(), Some(Chunk::Space)) {
                chunks.push(Chunk::Space);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        chunks.push(Chunk::Word(&text[s..]));
    }
    chunks
}

fn trim_trailing_spaces(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
}

/// Make `out` end with `newlines` line breaks, unless nothing was written yet
fn end_line(out: &mut String, newlines: usize) {
    trim_trailing_spaces(out);
    if out.is_empty() {
        return;
    }
    let present = out.chars().rev().take_while(|c| *c == '\n').count();
    for _ in present..newlines {
        out.push('\n');
    }
}
