//! Format conversion engine
//!
//! Pure bytes-in, bytes-out conversion between supported formats. The
//! engine never touches storage; callers hand it a payload, the payload's
//! format and the requested target.
//!
//! ## Dispatch
//!
//! ```text
//! (source, target) ──► legal? (Format::targets) ──► rule (CONVERSIONS) ──► bytes
//!                          │ no                         │ source == target
//!                          ▼                            ▼
//!                  UnsupportedConversion            identity
//! ```
//!
//! `json → text/plain` is a passthrough: a JSON document already is a valid
//! plain-text rendering of itself.

pub mod raster;
pub mod text;

use crate::error::{Error, Result};
use crate::format::Format;
use bytes::Bytes;

/// How one (source, target) pair is converted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Bytes returned unchanged
    Identity,
    MarkdownToHtml,
    MarkdownToText,
    HtmlToText,
    /// Original bytes reinterpreted as the target type
    Passthrough,
    /// Decode and re-encode with the image codecs
    Raster,
}

impl Rule {
    /// CPU-heavy rules that should leave the async executor
    pub fn is_blocking(self) -> bool {
        matches!(self, Rule::Raster)
    }
}

/// Non-identity conversions
static CONVERSIONS: &[(Format, Format, Rule)] = &[
    (Format::Markdown, Format::Html, Rule::MarkdownToHtml),
    (Format::Markdown, Format::Plain, Rule::MarkdownToText),
    (Format::Html, Format::Plain, Rule::HtmlToText),
    (Format::Json, Format::Plain, Rule::Passthrough),
    (Format::Png, Format::Jpeg, Rule::Raster),
    (Format::Png, Format::Webp, Rule::Raster),
    (Format::Png, Format::Gif, Rule::Raster),
    (Format::Jpeg, Format::Png, Rule::Raster),
    (Format::Jpeg, Format::Webp, Rule::Raster),
    (Format::Jpeg, Format::Gif, Rule::Raster),
    (Format::Webp, Format::Png, Rule::Raster),
    (Format::Webp, Format::Jpeg, Rule::Raster),
    (Format::Webp, Format::Gif, Rule::Raster),
    (Format::Gif, Format::Png, Rule::Raster),
    (Format::Gif, Format::Jpeg, Rule::Raster),
    (Format::Gif, Format::Webp, Rule::Raster),
];

/// Look up the rule for a pair, rejecting pairs outside the legal table
pub fn rule_for(from: Format, to: Format) -> Result<Rule> {
    let unsupported = || Error::UnsupportedConversion {
        from: from.to_string(),
        to: to.to_string(),
    };
    if !from.can_convert_to(to) {
        return Err(unsupported());
    }
    if from == to {
        return Ok(Rule::Identity);
    }
    CONVERSIONS
        .iter()
        .find(|(source, target, _)| *source == from && *target == to)
        .map(|(_, _, rule)| *rule)
        .ok_or_else(unsupported)
}

/// Resolve a file-extension-style target token, e.g. `md` or `jpg`
pub fn resolve_extension(ext: &str) -> Result<Format> {
    Format::from_extension(ext).ok_or_else(|| Error::UnknownTarget(format!(".{}", ext)))
}

/// Resolve an explicit target media type
pub fn resolve_media_type(value: &str) -> Result<Format> {
    Format::from_media_type(value).ok_or_else(|| Error::UnknownTarget(value.to_string()))
}

/// Convert `data` from `from` to `to` on the current thread
pub fn convert(data: Bytes, from: Format, to: Format) -> Result<Bytes> {
    let rule = rule_for(from, to)?;
    apply(rule, data, from, to)
}

/// Convert `data`, running raster work on the blocking thread pool
pub async fn convert_async(data: Bytes, from: Format, to: Format) -> Result<Bytes> {
    let rule = rule_for(from, to)?;
    if !rule.is_blocking() {
        return apply(rule, data, from, to);
    }
    tokio::task::spawn_blocking(move || apply(rule, data, from, to))
        .await
        .map_err(|e| Error::Conversion(format!("conversion task failed: {}", e)))?
}

fn apply(rule: Rule, data: Bytes, from: Format, to: Format) -> Result<Bytes> {
    tracing::debug!(from = %from, to = %to, rule = ?rule, size = data.len(), "Converting");
    match rule {
        Rule::Identity | Rule::Passthrough => Ok(data),
        Rule::MarkdownToHtml => Ok(text::markdown_to_html(utf8(&data, from)?).into()),
        Rule::MarkdownToText => {
            let html = text::markdown_to_html(utf8(&data, from)?);
            Ok(text::html_to_text(&html).into())
        }
        Rule::HtmlToText => Ok(text::html_to_text(utf8(&data, from)?).into()),
        Rule::Raster => raster::transcode(&data, from, to).map(Bytes::from),
    }
}

fn utf8(data: &[u8], format: Format) -> Result<&str> {
    std::str::from_utf8(data)
        .map_err(|e| Error::Conversion(format!("{} payload is not valid UTF-8: {}", format, e)))
}
