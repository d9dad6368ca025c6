//! Integration tests for the datasheet extraction library

use datasheet_extractor::selector::CATALOG_SHEET;
use datasheet_extractor::tables::{write_selection, SELECTION_SHEET};
use datasheet_extractor::{
    extract_document, write_back_document, CandidateGroup, CatalogRecord, CatalogSelector,
    DatasheetError, MemoryWorkbook, PageTextSink, PageTokenSource, ParamGroup, ParamValue, Point,
    SheetData, StyleLibrary, TabularSink, TextStyle, Token,
};

// Helper to create test tokens laid out left to right
fn make_token(text: &str, index: usize) -> Token {
    let left = index as f32 * 60.0;
    Token {
        left,
        top: 710.0,
        right: left + 50.0,
        bottom: 700.0,
        text: text.to_string(),
    }
}

/// Token source + recording text sink, like one open document
struct FakeDocument {
    pages: Vec<Vec<Token>>,
    inserted: Vec<(usize, Point, String, TextStyle)>,
}

impl FakeDocument {
    fn new(pages: &[&[&str]]) -> Self {
        FakeDocument {
            pages: pages
                .iter()
                .map(|texts| {
                    texts
                        .iter()
                        .enumerate()
                        .map(|(i, t)| make_token(t, i))
                        .collect()
                })
                .collect(),
            inserted: Vec::new(),
        }
    }
}

impl PageTokenSource for FakeDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_tokens(&self, page: usize) -> Result<Vec<Token>, DatasheetError> {
        Ok(self.pages[page].clone())
    }
}

impl PageTextSink for FakeDocument {
    fn insert_text(
        &mut self,
        page: usize,
        at: Point,
        text: &str,
        style: &TextStyle,
    ) -> Result<(), DatasheetError> {
        self.inserted.push((page, at, text.to_string(), *style));
        Ok(())
    }
}

/// A realistic style file: header page numbering, matchers for the tag
/// number, rated flow and lift, one locator on the catalog flow slot
const STYLE_JSON: &str = r#"{
    "pump": { "flow_gap": 5.0, "lift_gap": 2.0 },
    "styles": [
        { "name": "测试格式",
          "settings": {
            "page_num": "header",
            "extract": { "matchers": [
                [ { "type": "list", "pre": ["设备位号"] },
                  null, null, null, null, null, null, null ],
                [ null, null, null, null, null, null, null, null, null,
                  null, null, null, null, null, null, null, null,
                  { "type": "list", "pre": [["额定流量", "设计流量"]] },
                  null,
                  { "type": "list", "pre": ["扬程"], "post": ["m"] },
                  null ]
            ] },
            "writeback": {
                "matchers": [ null, null, null, null, null,
                    { "pre": ["额定流量"], "offset": 10.0 } ],
                "font_size": 9.0, "h_pos": 2.0, "v_pos": 0.0,
                "font_color": "blue"
            } } }
    ]
}"#;

const TAG_NUMBER: (ParamGroup, usize) = (ParamGroup::General, 0);
const RATED_FLOW: (ParamGroup, usize) = (ParamGroup::Medium, 17);
const LIFT: (ParamGroup, usize) = (ParamGroup::Medium, 19);
const CATALOG_FLOW: usize = 5;

// ============================================================================
// Extraction Tests
// ============================================================================

#[test]
fn test_extract_with_compiled_config() {
    let library = StyleLibrary::from_json(STYLE_JSON).unwrap();
    let doc = FakeDocument::new(&[&[
        "页码:1",
        "设备位号",
        "P-101A",
        "额定流量:",
        "120.5",
        "扬程",
        "45",
        "m",
    ]]);

    let sections = extract_document(&doc, library.get(0).unwrap()).unwrap();
    assert_eq!(sections.len(), 1);
    let sheet = &sections[0];
    assert_eq!(
        sheet.slot(TAG_NUMBER).value(),
        Some(&ParamValue::Text("P-101A".to_string()))
    );
    assert_eq!(
        sheet.slot(RATED_FLOW).value(),
        Some(&ParamValue::Number(120.5))
    );
    assert_eq!(sheet.slot(LIFT).value(), Some(&ParamValue::Number(45.0)));
}

#[test]
fn test_extract_set_prefix_alternative() {
    let library = StyleLibrary::from_json(STYLE_JSON).unwrap();
    let doc = FakeDocument::new(&[&["页码:1", "设计流量", "98.6"]]);

    let sections = extract_document(&doc, library.get(0).unwrap()).unwrap();
    assert_eq!(
        sections[0].slot(RATED_FLOW).value(),
        Some(&ParamValue::Number(98.6))
    );
}

#[test]
fn test_extract_two_sections_across_pages() {
    let library = StyleLibrary::from_json(STYLE_JSON).unwrap();
    let doc = FakeDocument::new(&[
        &["页码:1", "额定流量", "100"],
        &["页码:2", "扬程", "50", "m"],
        &["页码:1", "额定流量", "200"],
    ]);

    let sections = extract_document(&doc, library.get(0).unwrap()).unwrap();
    assert_eq!(sections.len(), 2);
    assert_eq!(
        sections[0].slot(RATED_FLOW).value(),
        Some(&ParamValue::Number(100.0))
    );
    assert_eq!(sections[0].slot(LIFT).value(), Some(&ParamValue::Number(50.0)));
    assert_eq!(
        sections[1].slot(RATED_FLOW).value(),
        Some(&ParamValue::Number(200.0))
    );
    assert!(sections[1].slot(LIFT).value().is_none());
}

#[test]
fn test_compilation_is_behaviorally_idempotent() {
    let doc_pages: &[&[&str]] = &[&["页码:1", "额定流量", "120.5", "扬程", "45", "m"]];
    let a = StyleLibrary::from_json(STYLE_JSON).unwrap();
    let b = StyleLibrary::from_json(STYLE_JSON).unwrap();

    let doc = FakeDocument::new(doc_pages);
    let sections_a = extract_document(&doc, a.get(0).unwrap()).unwrap();
    let sections_b = extract_document(&doc, b.get(0).unwrap()).unwrap();

    assert_eq!(sections_a.len(), sections_b.len());
    assert_eq!(sections_a[0].found(), sections_b[0].found());
    assert_eq!(
        sections_a[0].slot(RATED_FLOW).value(),
        sections_b[0].slot(RATED_FLOW).value()
    );
}

// ============================================================================
// Round-Trip Tests
// ============================================================================

#[test]
fn test_extract_then_write_back_round_trip() {
    let library = StyleLibrary::from_json(STYLE_JSON).unwrap();
    let style = library.get(0).unwrap();

    let mut doc = FakeDocument::new(&[&["页码:1", "额定流量", "120.5"]]);
    let sections = extract_document(&doc, style).unwrap();
    let (flow, _) = sections[0].flow_lift_target();
    assert_eq!(flow, Some(120.5));

    // selection produced one catalog record carrying the flow value
    let mut record = CatalogRecord::new();
    record
        .slot_mut(CATALOG_FLOW)
        .set_value(ParamValue::Number(flow.unwrap()));

    let targets = write_back_document(&mut doc, style, vec![record]).unwrap();
    assert_eq!(doc.inserted.len(), 1);

    let (page, at, text, style_used) = &doc.inserted[0];
    assert_eq!(*page, 0);
    // the anchor is the "额定流量" token at index 1 (left 60, right 110)
    assert!((at.x - 120.0).abs() < f32::EPSILON);
    assert!((at.y - 705.0).abs() < f32::EPSILON);
    assert_eq!(text, "120.5");
    assert!((style_used.font_size - 9.0).abs() < f32::EPSILON);
    assert_eq!(targets[0].written(), &[CATALOG_FLOW]);
}

#[test]
fn test_write_back_skips_unset_slots() {
    let library = StyleLibrary::from_json(STYLE_JSON).unwrap();
    let style = library.get(0).unwrap();
    let mut doc = FakeDocument::new(&[&["页码:1", "额定流量", "120.5"]]);

    // locator present and anchorable, but the slot was never populated
    let targets = write_back_document(&mut doc, style, vec![CatalogRecord::new()]).unwrap();
    assert!(doc.inserted.is_empty());
    assert!(targets[0].written().is_empty());
}

#[test]
fn test_write_back_without_targets_is_reported() {
    let library = StyleLibrary::from_json(STYLE_JSON).unwrap();
    let mut doc = FakeDocument::new(&[&["页码:1"]]);
    let err = write_back_document(&mut doc, library.get(0).unwrap(), vec![]).unwrap_err();
    assert!(matches!(err, DatasheetError::NoWriteData));
}

// ============================================================================
// Catalog Matching Tests
// ============================================================================

fn catalog_row(wb: &mut MemoryWorkbook, row: u32, id: &str, flow: f64, lift: f64) {
    wb.set_cell(CATALOG_SHEET, "A", row, ParamValue::Text(id.to_string()))
        .unwrap();
    wb.set_cell(CATALOG_SHEET, "F", row, ParamValue::Number(flow))
        .unwrap();
    wb.set_cell(CATALOG_SHEET, "G", row, ParamValue::Number(lift))
        .unwrap();
}

#[test]
fn test_extracted_targets_match_catalog_within_windows() {
    let library = StyleLibrary::from_json(STYLE_JSON).unwrap();
    let doc = FakeDocument::new(&[&["页码:1", "额定流量", "100", "扬程", "50", "m"]]);
    let sections = extract_document(&doc, library.get(0).unwrap()).unwrap();

    let mut wb = MemoryWorkbook::new();
    catalog_row(&mut wb, 9, "1", 104.0, 51.0);
    catalog_row(&mut wb, 10, "2", 106.0, 51.0);
    catalog_row(&mut wb, 11, "3", 104.0, 53.0);

    let selector = CatalogSelector::new(library.tolerance());
    let mut groups = Vec::new();
    selector
        .assign_candidates(&wb, &sections, &mut groups, None)
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].records().len(), 1);
    assert_eq!(
        groups[0].records()[0].slot(CATALOG_FLOW).value(),
        Some(&ParamValue::Number(104.0))
    );
}

// ============================================================================
// Selection Export Tests
// ============================================================================

#[test]
fn test_extraction_to_selection_table_pipeline() {
    let library = StyleLibrary::from_json(STYLE_JSON).unwrap();
    let doc = FakeDocument::new(&[&[
        "页码:1",
        "设备位号",
        "P-101A",
        "额定流量",
        "120.5",
    ]]);
    let sections = extract_document(&doc, library.get(0).unwrap()).unwrap();

    let mut group = CandidateGroup::new(0);
    group.add_record().slot_mut(3).set_value("50-160".into());
    group.set_selected(Some(0));

    let mut wb = MemoryWorkbook::new();
    write_selection(&mut wb, &sections, Some(&[group])).unwrap();

    assert_eq!(
        wb.value(SELECTION_SHEET, "B", 8),
        Some(&ParamValue::Text("P-101A".to_string()))
    );
    assert_eq!(
        wb.value(SELECTION_SHEET, "R", 8),
        Some(&ParamValue::Number(120.5))
    );
    assert_eq!(
        wb.value(SELECTION_SHEET, "X", 8),
        Some(&ParamValue::Text("50-160".to_string()))
    );
    assert_eq!(wb.formula(SELECTION_SHEET, "AA", 8), Some("=MAX(R8, S8)"));
}

// ============================================================================
// Data Model Tests
// ============================================================================

#[test]
fn test_sheet_registry_shape() {
    let sheet = SheetData::new();
    assert_eq!(sheet.slot(RATED_FLOW).name(), "介质额定流量");
    assert_eq!(sheet.slot(RATED_FLOW).unit(), Some("m³/h"));
    assert!(sheet.found().is_empty());
}

#[test]
fn test_style_library_names() {
    let library = StyleLibrary::from_json(STYLE_JSON).unwrap();
    assert_eq!(library.style_names(), vec!["测试格式"]);
    assert!((library.tolerance().lift_gap - 2.0).abs() < f64::EPSILON);
}
