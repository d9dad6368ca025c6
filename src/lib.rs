//! Rule-driven parameter extraction and writeback for equipment datasheets
//!
//! This crate provides:
//! - A declarative rule compiler turning JSON style configurations into
//!   positional matchers over per-page token streams
//! - A single-pass consume-and-skip extraction engine producing one populated
//!   parameter registry per document section
//! - Its mirror, a writeback engine computing insertion geometry from the
//!   same token stream
//! - A tolerance-band matcher assigning catalog rows to extracted targets,
//!   and fixed-layout selection-table export

pub mod config;
pub mod extractor;
pub mod matcher;
pub mod pagination;
pub mod params;
pub mod pdf;
pub mod selector;
pub mod tables;
pub mod tabular;
pub mod token;
pub mod writeback;

pub use config::{StyleLibrary, ToleranceConfig};
pub use extractor::{extract_document, SectionQueue, MAX_SECTIONS};
pub use matcher::{CompiledStyle, MatchOutcome};
pub use pagination::PageNumbering;
pub use params::{CandidateGroup, CatalogRecord, ParamGroup, ParamValue, SheetData};
pub use selector::CatalogSelector;
pub use tabular::{MemoryWorkbook, TabularSink, TabularSource};
pub use token::{Color, PageTextSink, PageTokenSource, Point, TextStyle, Token};
pub use writeback::write_back_document;

use std::path::Path;

/// Extract every section of a PDF datasheet with one of a library's styles
///
/// Convenience wrapper composing the lopdf adapter with the extraction
/// engine.
pub fn extract_file<P: AsRef<Path>>(
    pdf_path: P,
    library: &StyleLibrary,
    style_index: usize,
) -> Result<Vec<SheetData>, DatasheetError> {
    let style = library
        .get(style_index)
        .ok_or_else(|| DatasheetError::Config(format!("no style at index {}", style_index)))?;
    let doc = pdf::PdfFile::open(pdf_path)?;
    extractor::extract_document(&doc, style)
}

/// Write pending catalog records back into a copy of a PDF datasheet
///
/// Opens `src_path`, inserts every locatable value, and saves the result to
/// `dest_path`. Returns the targets with their written-slot lists filled in.
pub fn write_back_file<P: AsRef<Path>, Q: AsRef<Path>>(
    src_path: P,
    dest_path: Q,
    library: &StyleLibrary,
    style_index: usize,
    targets: Vec<CatalogRecord>,
) -> Result<Vec<CatalogRecord>, DatasheetError> {
    let style = library
        .get(style_index)
        .ok_or_else(|| DatasheetError::Config(format!("no style at index {}", style_index)))?;
    let mut doc = pdf::PdfFile::open(src_path)?;
    let targets = writeback::write_back_document(&mut doc, style, targets)?;
    doc.save(dest_path)?;
    Ok(targets)
}

#[derive(Debug, thiserror::Error)]
pub enum DatasheetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF error: {0}")]
    Pdf(String),
    #[error("invalid style configuration: {0}")]
    Config(String),
    #[error("tabular access error: {0}")]
    Tabular(String),
    #[error("no write data pending")]
    NoWriteData,
    #[error("document has {0} sections, more than the supported {max}", max = extractor::MAX_SECTIONS)]
    TooManySections(usize),
}

impl From<lopdf::Error> for DatasheetError {
    fn from(e: lopdf::Error) -> Self {
        DatasheetError::Pdf(e.to_string())
    }
}
