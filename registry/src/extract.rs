//! Embedded citekey syntax in a record's `extra` field.
//!
//! Two legacy notations are recognized, tried in this order:
//!
//! ```text
//! bibtex: <key>             primary: marker, whitespace, non-whitespace run
//! biblatexcitekey[<key>]    secondary: marker and bracket, no nesting
//! ```
//!
//! Only the first match of the highest-priority notation counts.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

/// Marker of the primary notation, also used when writing keys.
pub const PRIMARY_MARKER: &str = "bibtex:";

/// Marker of the bracketed secondary notation.
pub const SECONDARY_MARKER: &str = "biblatexcitekey[";

static PRIMARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"bibtex:\s+(\S+)").expect("primary citekey pattern"));

static SECONDARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"biblatexcitekey\[([^\]]+)\]").expect("secondary citekey pattern"));

/// Which notation a key was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Primary,
    Secondary,
}

/// Result of locating an embedded key. `span` covers marker and key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddedKey<'a> {
    NoMatch,
    Primary { key: &'a str, span: Range<usize> },
    Secondary { key: &'a str, span: Range<usize> },
}

impl<'a> EmbeddedKey<'a> {
    pub fn key(&self) -> Option<&'a str> {
        match self {
            EmbeddedKey::NoMatch => None,
            EmbeddedKey::Primary { key, .. } | EmbeddedKey::Secondary { key, .. } => Some(*key),
        }
    }

    pub fn syntax(&self) -> Option<Syntax> {
        match self {
            EmbeddedKey::NoMatch => None,
            EmbeddedKey::Primary { .. } => Some(Syntax::Primary),
            EmbeddedKey::Secondary { .. } => Some(Syntax::Secondary),
        }
    }
}

fn match_primary(text: &str) -> Option<EmbeddedKey<'_>> {
    let caps = PRIMARY_RE.captures(text)?;
    let (whole, key) = (caps.get(0)?, caps.get(1)?);
    Some(EmbeddedKey::Primary {
        key: key.as_str(),
        span: whole.range(),
    })
}

fn match_secondary(text: &str) -> Option<EmbeddedKey<'_>> {
    let caps = SECONDARY_RE.captures(text)?;
    let (whole, key) = (caps.get(0)?, caps.get(1)?);
    Some(EmbeddedKey::Secondary {
        key: key.as_str(),
        span: whole.range(),
    })
}

/// Locate the embedded key in `text`.
pub fn find(text: &str) -> EmbeddedKey<'_> {
    match_primary(text)
        .or_else(|| match_secondary(text))
        .unwrap_or(EmbeddedKey::NoMatch)
}

/// Output of [`extract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// The embedded key, if any.
    pub key: Option<String>,
    /// Input with the matched span removed and trimmed, or the untouched
    /// input when nothing matched.
    pub remaining: String,
}

/// Pull the embedded citekey out of `text`.
pub fn extract(text: &str) -> Extraction {
    match find(text) {
        EmbeddedKey::NoMatch => Extraction {
            key: None,
            remaining: text.to_string(),
        },
        EmbeddedKey::Primary { key, span } | EmbeddedKey::Secondary { key, span } => {
            let mut remaining = String::with_capacity(text.len() - span.len());
            remaining.push_str(&text[..span.start]);
            remaining.push_str(&text[span.end..]);
            Extraction {
                key: Some(key.to_string()),
                remaining: remaining.trim().to_string(),
            }
        }
    }
}

/// Remove every embedded key from `text`, plus a bare primary marker left
/// at the end.
///
/// Cutting one match out can splice two fragments into a new match, so
/// extraction repeats until nothing is found. A trailing marker with no key
/// would capture the marker appended by [`embed`].
pub fn strip(text: &str) -> String {
    let mut ex = extract(text);
    while ex.key.is_some() {
        ex = extract(&ex.remaining);
    }
    let mut residual = ex.remaining.trim_end();
    while let Some(rest) = residual.strip_suffix(PRIMARY_MARKER) {
        residual = rest.trim_end();
    }
    residual.to_string()
}

/// Append `key` in primary notation to `residual`, separated by a newline
/// when `residual` has content.
pub fn embed(residual: &str, key: &str) -> String {
    let residual = residual.trim_end();
    if residual.is_empty() {
        format!("{PRIMARY_MARKER} {key}")
    } else {
        format!("{residual}\n{PRIMARY_MARKER} {key}")
    }
}

/// True if `key` would survive a write/extract cycle unchanged.
pub fn is_embeddable(key: &str) -> bool {
    !key.is_empty() && !key.chars().any(char::is_whitespace)
}
