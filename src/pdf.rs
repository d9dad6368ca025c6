//! lopdf-backed page token source and text sink
//!
//! Best-effort adapter so the engines can run against real PDF files: walks
//! content streams to produce word tokens with estimated bounding boxes, and
//! appends positioned text operations for writeback. Coordinates are native
//! page space (origin bottom-left, y grows upward); style offsets are
//! configured per document class and follow that axis.

use std::collections::HashSet;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, StringFormat};

use crate::token::{PageTextSink, PageTokenSource, Point, TextStyle, Token};
use crate::DatasheetError;

const LATIN_FONT_KEY: &[u8] = b"Fds0";
const CJK_FONT_KEY: &[u8] = b"Fds1";

/// An open PDF document serving as both token source and text sink
pub struct PdfFile {
    doc: Document,
    pages: Vec<ObjectId>,
    fonts_added: HashSet<(ObjectId, bool)>,
}

impl PdfFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatasheetError> {
        Self::from_document(Document::load(path)?)
    }

    pub fn from_bytes(buffer: &[u8]) -> Result<Self, DatasheetError> {
        Self::from_document(Document::load_mem(buffer)?)
    }

    fn from_document(doc: Document) -> Result<Self, DatasheetError> {
        let pages = doc.get_pages().values().copied().collect();
        Ok(PdfFile {
            doc,
            pages,
            fonts_added: HashSet::new(),
        })
    }

    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<(), DatasheetError> {
        self.doc.save(path)?;
        Ok(())
    }

    fn page_id(&self, page: usize) -> Result<ObjectId, DatasheetError> {
        self.pages
            .get(page)
            .copied()
            .ok_or_else(|| DatasheetError::Pdf(format!("page {} out of range", page)))
    }

    /// Register the insertion font on a page's resources, once per page
    fn ensure_font(&mut self, page_id: ObjectId, cjk: bool) -> Result<Vec<u8>, DatasheetError> {
        let key = if cjk { CJK_FONT_KEY } else { LATIN_FONT_KEY };
        if self.fonts_added.contains(&(page_id, cjk)) {
            return Ok(key.to_vec());
        }

        let font = if cjk {
            // standard CID keyed font; viewers substitute a CJK face
            let descendant = self.doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "CIDFontType0",
                "BaseFont" => "STSong-Light",
                "CIDSystemInfo" => dictionary! {
                    "Registry" => Object::string_literal("Adobe"),
                    "Ordering" => Object::string_literal("GB1"),
                    "Supplement" => 2,
                },
            });
            dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => "STSong-Light",
                "Encoding" => "UniGB-UCS2-H",
                "DescendantFonts" => vec![Object::Reference(descendant)],
            }
        } else {
            dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
            }
        };
        let font_id = self.doc.add_object(font);

        let resources = self
            .doc
            .get_or_create_resources(page_id)
            .map_err(|e| DatasheetError::Pdf(e.to_string()))?
            .as_dict_mut()
            .map_err(|e| DatasheetError::Pdf(e.to_string()))?;
        if resources.get(b"Font").is_err() {
            resources.set("Font", lopdf::Dictionary::new());
        }
        // indirect font dictionaries are not followed here
        let fonts = resources
            .get_mut(b"Font")
            .and_then(|o| o.as_dict_mut())
            .map_err(|e| DatasheetError::Pdf(e.to_string()))?;
        fonts.set(key, font_id);

        self.fonts_added.insert((page_id, cjk));
        Ok(key.to_vec())
    }
}

impl PageTokenSource for PdfFile {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_tokens(&self, page: usize) -> Result<Vec<Token>, DatasheetError> {
        let page_id = self.page_id(page)?;
        collect_page_tokens(&self.doc, page_id)
    }
}

impl PageTextSink for PdfFile {
    fn insert_text(
        &mut self,
        page: usize,
        at: Point,
        text: &str,
        style: &TextStyle,
    ) -> Result<(), DatasheetError> {
        let page_id = self.page_id(page)?;
        let font_key = self.ensure_font(page_id, style.cjk)?;

        let content_data = self
            .doc
            .get_page_content(page_id)
            .map_err(|e| DatasheetError::Pdf(e.to_string()))?;
        let mut content =
            Content::decode(&content_data).map_err(|e| DatasheetError::Pdf(e.to_string()))?;

        let text_obj = if style.cjk {
            Object::String(utf16_be_bytes(text), StringFormat::Hexadecimal)
        } else {
            Object::string_literal(text)
        };
        content.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(font_key), Object::Real(style.font_size)],
            ),
            Operation::new(
                "rg",
                vec![
                    Object::Real(style.color.0),
                    Object::Real(style.color.1),
                    Object::Real(style.color.2),
                ],
            ),
            Operation::new("Td", vec![Object::Real(at.x), Object::Real(at.y)]),
            Operation::new("Tj", vec![text_obj]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ]);

        let data = content
            .encode()
            .map_err(|e| DatasheetError::Pdf(e.to_string()))?;
        self.doc
            .change_page_content(page_id, data)
            .map_err(|e| DatasheetError::Pdf(e.to_string()))?;
        Ok(())
    }
}

/// UTF-16BE bytes for a CID-keyed (UCS-2) text string
fn utf16_be_bytes(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
}

/// Multiply two 2D transformation matrices in `[a, b, c, d, e, f]` form
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

/// Helper to get f32 from an operand
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Effective font size under the current text matrix
fn effective_font_size(base_size: f32, text_matrix: &[f32; 6]) -> f32 {
    let scale_x = (text_matrix[0].powi(2) + text_matrix[1].powi(2)).sqrt();
    let scale_y = (text_matrix[2].powi(2) + text_matrix[3].powi(2)).sqrt();
    base_size * scale_x.max(scale_y)
}

/// Decode a text operand using the page's font encodings, with UTF-16BE and
/// Latin-1 fallbacks
fn decode_text_operand(
    obj: &Object,
    doc: &Document,
    fonts: &std::collections::BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    current_font: &str,
) -> Option<String> {
    if let Object::String(bytes, _) = obj {
        if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
            if let Ok(encoding) = font_dict.get_font_encoding(doc) {
                if let Ok(text) = Document::decode_text(&encoding, bytes) {
                    return Some(text);
                }
            }
        }

        if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
            let utf16: Vec<u16> = bytes[2..]
                .chunks_exact(2)
                .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                .collect();
            return Some(String::from_utf16_lossy(&utf16));
        }

        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}

/// Estimated horizontal advance of one character
fn char_width(c: char, size: f32) -> f32 {
    if c.is_ascii() {
        size * 0.5
    } else {
        size
    }
}

/// Split a positioned text run into whitespace-delimited word tokens with
/// proportionally estimated boxes
fn push_word_tokens(text: &str, x: f32, y: f32, size: f32, out: &mut Vec<Token>) {
    let mut cursor = x;
    let mut word_start = x;
    let mut word = String::new();

    for c in text.chars() {
        if c.is_whitespace() {
            if !word.is_empty() {
                out.push(Token {
                    left: word_start,
                    top: y + size,
                    right: cursor,
                    bottom: y,
                    text: std::mem::take(&mut word),
                });
            }
            cursor += char_width(c, size);
        } else {
            if word.is_empty() {
                word_start = cursor;
            }
            word.push(c);
            cursor += char_width(c, size);
        }
    }
    if !word.is_empty() {
        out.push(Token {
            left: word_start,
            top: y + size,
            right: cursor,
            bottom: y,
            text: word,
        });
    }
}

/// Walk one page's content stream and emit word tokens in stream order
fn collect_page_tokens(doc: &Document, page_id: ObjectId) -> Result<Vec<Token>, DatasheetError> {
    let mut tokens = Vec::new();

    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| DatasheetError::Pdf(e.to_string()))?;
    let content =
        Content::decode(&content_data).map_err(|e| DatasheetError::Pdf(e.to_string()))?;

    // graphics and text state tracking
    let mut ctm = [1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0];
    let mut ctm_stack: Vec<[f32; 6]> = Vec::new();
    let mut current_font = String::new();
    let mut current_font_size: f32 = 12.0;
    let mut text_matrix = [1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0];
    let mut line_matrix = [1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0];
    let mut in_text_block = false;

    let emit = |text: String, text_matrix: &[f32; 6], ctm: &[f32; 6], size: f32,
                out: &mut Vec<Token>| {
        if text.trim().is_empty() {
            return;
        }
        let rendered_size = effective_font_size(size, text_matrix);
        let combined = multiply_matrices(text_matrix, ctm);
        push_word_tokens(&text, combined[4], combined[5], rendered_size, out);
    };

    for op in &content.operations {
        match op.operator.as_str() {
            "q" => {
                ctm_stack.push(ctm);
            }
            "Q" => {
                if let Some(saved) = ctm_stack.pop() {
                    ctm = saved;
                }
            }
            "cm" => {
                if op.operands.len() >= 6 {
                    let new_matrix = [
                        get_number(&op.operands[0]).unwrap_or(1.0),
                        get_number(&op.operands[1]).unwrap_or(0.0),
                        get_number(&op.operands[2]).unwrap_or(0.0),
                        get_number(&op.operands[3]).unwrap_or(1.0),
                        get_number(&op.operands[4]).unwrap_or(0.0),
                        get_number(&op.operands[5]).unwrap_or(0.0),
                    ];
                    ctm = multiply_matrices(&new_matrix, &ctm);
                }
            }
            "BT" => {
                in_text_block = true;
                text_matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
                line_matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
            }
            "ET" => {
                in_text_block = false;
            }
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Ok(name) = op.operands[0].as_name() {
                        current_font = String::from_utf8_lossy(name).to_string();
                    }
                    if let Ok(size) = op.operands[1].as_f32() {
                        current_font_size = size;
                    } else if let Ok(size) = op.operands[1].as_i64() {
                        current_font_size = size as f32;
                    }
                }
            }
            "Td" | "TD" => {
                if op.operands.len() >= 2 {
                    line_matrix[4] += get_number(&op.operands[0]).unwrap_or(0.0);
                    line_matrix[5] += get_number(&op.operands[1]).unwrap_or(0.0);
                    text_matrix = line_matrix;
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    for (i, operand) in op.operands.iter().take(6).enumerate() {
                        text_matrix[i] =
                            get_number(operand).unwrap_or(if i == 0 || i == 3 { 1.0 } else { 0.0 });
                    }
                    line_matrix = text_matrix;
                }
            }
            "T*" => {
                line_matrix[5] -= current_font_size * 1.2;
                text_matrix = line_matrix;
            }
            "Tj" => {
                if in_text_block && !op.operands.is_empty() {
                    if let Some(text) =
                        decode_text_operand(&op.operands[0], doc, &fonts, &current_font)
                    {
                        emit(text, &text_matrix, &ctm, current_font_size, &mut tokens);
                    }
                }
            }
            "TJ" => {
                if in_text_block && !op.operands.is_empty() {
                    if let Ok(array) = op.operands[0].as_array() {
                        let mut combined_text = String::new();
                        for item in array {
                            if let Some(text) =
                                decode_text_operand(item, doc, &fonts, &current_font)
                            {
                                combined_text.push_str(&text);
                            }
                        }
                        emit(
                            combined_text,
                            &text_matrix,
                            &ctm,
                            current_font_size,
                            &mut tokens,
                        );
                    }
                }
            }
            "'" => {
                line_matrix[5] -= current_font_size * 1.2;
                text_matrix = line_matrix;
                if !op.operands.is_empty() {
                    if let Some(text) =
                        decode_text_operand(&op.operands[0], doc, &fonts, &current_font)
                    {
                        emit(text, &text_matrix, &ctm, current_font_size, &mut tokens);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(tokens)
}
