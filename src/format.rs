//! Supported formats and their lookup tables
//!
//! Every format the service accepts is a variant of [`Format`]. The media
//! type, extension and legal conversion targets of each format live in the
//! static tables below, so adding a format is a table edit.

use serde::{Deserialize, Serialize};

/// A supported fragment format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "text/plain")]
    Plain,
    #[serde(rename = "text/markdown")]
    Markdown,
    #[serde(rename = "text/html")]
    Html,
    #[serde(rename = "application/json")]
    Json,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/webp")]
    Webp,
    #[serde(rename = "image/gif")]
    Gif,
}

/// (format, base media type, canonical extension)
static FORMATS: &[(Format, &str, &str)] = &[
    (Format::Plain, "text/plain", "txt"),
    (Format::Markdown, "text/markdown", "md"),
    (Format::Html, "text/html", "html"),
    (Format::Json, "application/json", "json"),
    (Format::Png, "image/png", "png"),
    (Format::Jpeg, "image/jpeg", "jpg"),
    (Format::Webp, "image/webp", "webp"),
    (Format::Gif, "image/gif", "gif"),
];

/// Extensions accepted on input in addition to the canonical ones
static EXTENSION_ALIASES: &[(&str, Format)] = &[("jpeg", Format::Jpeg)];

const IMAGES: &[Format] = &[Format::Png, Format::Jpeg, Format::Webp, Format::Gif];

/// Legal conversion targets by source format
static LEGAL_TARGETS: &[(Format, &[Format])] = &[
    (Format::Plain, &[Format::Plain]),
    (Format::Markdown, &[Format::Markdown, Format::Html, Format::Plain]),
    (Format::Html, &[Format::Html, Format::Plain]),
    (Format::Json, &[Format::Json, Format::Plain]),
    (Format::Png, IMAGES),
    (Format::Jpeg, IMAGES),
    (Format::Webp, IMAGES),
    (Format::Gif, IMAGES),
];

impl Format {
    /// All supported formats, in table order
    pub fn all() -> impl Iterator<Item = Format> {
        FORMATS.iter().map(|(format, _, _)| *format)
    }

    /// Base media type, e.g. `text/markdown`
    pub fn media_type(self) -> &'static str {
        Self::entry(self).1
    }

    /// Canonical file extension, e.g. `md`
    pub fn extension(self) -> &'static str {
        Self::entry(self).2
    }

    /// True for the `text/*` formats
    pub fn is_text(self) -> bool {
        self.media_type().starts_with("text/")
    }

    pub fn is_image(self) -> bool {
        self.media_type().starts_with("image/")
    }

    /// Formats this one may be converted to on read
    pub fn targets(self) -> &'static [Format] {
        LEGAL_TARGETS
            .iter()
            .find(|(source, _)| *source == self)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    pub fn can_convert_to(self, target: Format) -> bool {
        self.targets().contains(&target)
    }

    /// Resolve a media type, ignoring parameters and case.
    ///
    /// Returns `None` when the value does not parse or is not supported.
    pub fn from_media_type(value: &str) -> Option<Format> {
        let essence = base_media_type(value)?;
        FORMATS
            .iter()
            .find(|(_, media_type, _)| *media_type == essence)
            .map(|(format, _, _)| *format)
    }

    /// Resolve a file extension (without the dot), ignoring case
    pub fn from_extension(ext: &str) -> Option<Format> {
        let ext = ext.to_ascii_lowercase();
        FORMATS
            .iter()
            .find(|(_, _, canonical)| *canonical == ext)
            .map(|(format, _, _)| *format)
            .or_else(|| {
                EXTENSION_ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == ext)
                    .map(|(_, format)| *format)
            })
    }

    fn entry(self) -> &'static (Format, &'static str, &'static str) {
        // FORMATS has one row per variant
        FORMATS
            .iter()
            .find(|(format, _, _)| *format == self)
            .unwrap_or(&FORMATS[0])
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.media_type())
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_media_type(s).ok_or_else(|| format!("unsupported media type: {}", s))
    }
}

/// Parse a media type and return its lower-cased `type/subtype`.
///
/// Parameters such as `charset` are dropped. Returns `None` if the value is
/// not a syntactically valid media type.
pub fn base_media_type(value: &str) -> Option<String> {
    let parsed: mime::Mime = value.trim().parse().ok()?;
    Some(parsed.essence_str().to_ascii_lowercase())
}

/// True if `value` parses as a media type whose base type is supported
pub fn is_supported_type(value: &str) -> bool {
    Format::from_media_type(value).is_some()
}
