//! Logical page numbering
//!
//! Datasheets carry their own document-relative page number, and the place it
//! is printed varies by issuing organization. Two conventions are supported:
//! an inline "第 N 页/张" marker split across tokens, and a "页码:" header
//! marker. The logical number (not the physical index) drives section
//! boundaries in both engines.

use serde::Deserialize;

use crate::token::Token;

/// Page-numbering convention of one document class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PageNumbering {
    /// Inline "第 N 页" / "第 N 张" marker; the section's first page is a
    /// cover page and is not scanned
    #[serde(rename = "default")]
    Inline,
    /// "页码:" header marker; every page is scanned
    #[serde(rename = "header")]
    Header,
}

impl PageNumbering {
    /// Whether the section's logical page 1 is a cover page to skip entirely
    pub fn has_cover_page(self) -> bool {
        matches!(self, PageNumbering::Inline)
    }

    /// Resolve the logical page number from one page's token stream
    ///
    /// Returns `None` when no marker is present or its number does not parse;
    /// such pages belong to the current section.
    pub fn logical_page(self, tokens: &[Token]) -> Option<u32> {
        match self {
            PageNumbering::Inline => logical_page_inline(tokens),
            PageNumbering::Header => logical_page_header(tokens),
        }
    }
}

/// Parse the leading ASCII digit run of a string
fn leading_digits(text: &str) -> Option<u32> {
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Inline convention: a "第" token, the number token, then a token starting
/// with "页" or "张"
fn logical_page_inline(tokens: &[Token]) -> Option<u32> {
    for (i, token) in tokens.iter().enumerate() {
        if token.text != "第" {
            continue;
        }
        let Some(checkpoint) = tokens.get(i + 2) else {
            continue;
        };
        if matches!(checkpoint.text.chars().next(), Some('页') | Some('张')) {
            return tokens.get(i + 1)?.text.trim().parse().ok();
        }
    }
    None
}

/// Header convention: a token starting with "页码" followed by a colon; the
/// number is either appended to the same token or starts the next one
fn logical_page_header(tokens: &[Token]) -> Option<u32> {
    for (i, token) in tokens.iter().enumerate() {
        let mut chars = token.text.chars();
        if !(chars.next() == Some('页') && chars.next() == Some('码')) {
            continue;
        }
        if !matches!(chars.next(), Some(':') | Some('：')) {
            continue;
        }
        let rest = chars.as_str();
        if rest.is_empty() {
            return tokens.get(i + 1).and_then(|t| leading_digits(&t.text));
        }
        return leading_digits(rest);
    }
    None
}
