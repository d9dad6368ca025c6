//! Extraction engine
//!
//! Drives compiled extraction matchers over a document's pages in physical
//! order. Section boundaries come from the logical page number: every page 1
//! starts a fresh parameter registry and re-arms the full matcher queue. The
//! scan itself is a single pass per page with consume-and-skip semantics.

use log::debug;

use crate::matcher::{CompiledStyle, MatchOutcome, Matcher};
use crate::params::{SheetData, SlotId};
use crate::token::{PageTokenSource, Token};
use crate::DatasheetError;

/// Maximum number of document sections one pass may produce
pub const MAX_SECTIONS: usize = 8;

/// Forward cursor over per-section work items, shared by both engines
///
/// Extraction appends a fresh item at each section boundary
/// (`next_for_read`); writeback walks pre-built targets in the same forward
/// order (`next_for_write`). Both directions only ever move forward; a write
/// queue that runs out of targets goes quiet instead of wrapping around.
#[derive(Debug)]
pub struct SectionQueue<T> {
    items: Vec<T>,
    cursor: Option<usize>,
}

impl<T> SectionQueue<T> {
    /// Empty queue for the reading (extraction) direction
    pub fn new() -> Self {
        SectionQueue {
            items: Vec::new(),
            cursor: None,
        }
    }

    /// Queue over pre-built targets for the writing direction
    pub fn with_items(items: Vec<T>) -> Self {
        SectionQueue {
            items,
            cursor: None,
        }
    }

    /// Start a new section while reading: append `item` and make it current
    pub fn next_for_read(&mut self, item: T) {
        self.items.push(item);
        self.cursor = Some(self.items.len() - 1);
    }

    /// Advance to the next pending target while writing
    ///
    /// Returns `None` once the targets are exhausted; the queue stays
    /// exhausted from then on.
    pub fn next_for_write(&mut self) -> Option<&mut T> {
        let next = match self.cursor {
            None => 0,
            Some(current) => current + 1,
        };
        self.cursor = Some(next);
        self.items.get_mut(next)
    }

    /// The section the engines are currently working on
    pub fn current_mut(&mut self) -> Option<&mut T> {
        let cursor = self.cursor?;
        self.items.get_mut(cursor)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> Default for SectionQueue<T> {
    fn default() -> Self {
        SectionQueue::new()
    }
}

/// One queued extraction rule; `consumed` retires it for the section
struct ActiveRule<'a> {
    slot: SlotId,
    rule: &'a Matcher,
    consumed: bool,
}

/// Per-section matcher queue with the consume-and-skip page scan
///
/// The queue is index-stable: fired rules are marked consumed rather than
/// removed, so a rule fires at most once per section.
pub struct SectionScanner<'a> {
    rules: Vec<ActiveRule<'a>>,
}

impl<'a> SectionScanner<'a> {
    pub fn new(style: &'a CompiledStyle) -> Self {
        let rules = style
            .matchers
            .iter()
            .map(|(slot, rule)| ActiveRule {
                slot: *slot,
                rule,
                consumed: false,
            })
            .collect();
        SectionScanner { rules }
    }

    /// Re-arm every rule for a new section
    pub fn reset(&mut self) {
        for rule in &mut self.rules {
            rule.consumed = false;
        }
    }

    /// All declared parameters found; remaining pages need no scanning
    pub fn is_done(&self) -> bool {
        self.rules.iter().all(|r| r.consumed)
    }

    /// Scan one page's tokens against the live rules
    ///
    /// Positions inside a consumed run are never re-evaluated; a consuming
    /// match also stops further rules at its start position, so a later rule
    /// with a longer prefix cannot double-fire there.
    pub fn scan_page(&mut self, words: &[Token], sheet: &mut SheetData) {
        let mut skip = 0usize;
        for i in 0..words.len() {
            if skip > 0 {
                skip -= 1;
                continue;
            }
            let window = &words[i..];
            for entry in &mut self.rules {
                if entry.consumed {
                    continue;
                }
                let Some(outcome) = entry.rule.try_match(window, sheet.slot_mut(entry.slot))
                else {
                    continue;
                };
                entry.consumed = true;
                sheet.mark_found(entry.slot);
                if let MatchOutcome::Consumed(n) = outcome {
                    skip = n;
                    break;
                }
            }
        }
    }
}

/// Extract every section of a document into populated registries
///
/// Pages must be presented in physical order; the logical page number decides
/// section boundaries. Inline-numbered documents treat each section's page 1
/// as a cover page and do not scan it.
pub fn extract_document<S>(
    source: &S,
    style: &CompiledStyle,
) -> Result<Vec<SheetData>, DatasheetError>
where
    S: PageTokenSource + ?Sized,
{
    let mut sections: SectionQueue<SheetData> = SectionQueue::new();
    let mut scanner = SectionScanner::new(style);

    for page in 0..source.page_count() {
        let words = source.page_tokens(page)?;
        if style.page_num.logical_page(&words) == Some(1) {
            sections.next_for_read(SheetData::new());
            scanner.reset();
            debug!("page {}: section {} starts", page, sections.len());
            if style.page_num.has_cover_page() {
                continue;
            }
        }
        let Some(sheet) = sections.current_mut() else {
            continue;
        };
        if scanner.is_done() {
            continue;
        }
        scanner.scan_page(&words, sheet);
    }

    let sections = sections.into_items();
    if sections.len() > MAX_SECTIONS {
        return Err(DatasheetError::TooManySections(sections.len()));
    }
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{Pattern, WriteStyle};
    use crate::pagination::PageNumbering;
    use crate::params::{medium, ParamGroup, ParamValue};
    use crate::token::Color;

    fn make_token(text: &str) -> Token {
        Token {
            left: 0.0,
            top: 0.0,
            right: 10.0,
            bottom: 10.0,
            text: text.to_string(),
        }
    }

    struct FakeSource {
        pages: Vec<Vec<Token>>,
    }

    impl FakeSource {
        fn new(pages: &[&[&str]]) -> Self {
            FakeSource {
                pages: pages
                    .iter()
                    .map(|texts| texts.iter().map(|t| make_token(t)).collect())
                    .collect(),
            }
        }
    }

    impl PageTokenSource for FakeSource {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_tokens(&self, page: usize) -> Result<Vec<Token>, DatasheetError> {
            Ok(self.pages[page].clone())
        }
    }

    fn list_rule(pre: &[&str], skip: bool) -> Matcher {
        Matcher::List {
            pre: pre
                .iter()
                .map(|t| Some(Pattern::Literal(t.to_string())))
                .collect(),
            post: vec![],
            to_join: 0,
            skip,
        }
    }

    fn style_with(matchers: Vec<(SlotId, Matcher)>) -> CompiledStyle {
        CompiledStyle {
            page_num: PageNumbering::Header,
            matchers,
            locators: vec![],
            write_style: WriteStyle {
                font_size: 9.0,
                h_bias: 0.0,
                v_bias: 0.0,
                color: Color(0.0, 0.0, 0.0),
            },
        }
    }

    const RATED_FLOW: SlotId = (ParamGroup::Medium, medium::RATED_FLOW);
    const LIFT: SlotId = (ParamGroup::Medium, medium::LIFT);

    #[test]
    fn test_extracts_from_single_page() {
        let style = style_with(vec![
            (RATED_FLOW, list_rule(&["额定流量"], true)),
            (LIFT, list_rule(&["扬程"], true)),
        ]);
        let source = FakeSource::new(&[&["页码:1", "额定流量", "120.5", "扬程", "45"]]);

        let sections = extract_document(&source, &style).unwrap();
        assert_eq!(sections.len(), 1);
        let sheet = &sections[0];
        assert_eq!(
            sheet.slot(RATED_FLOW).value(),
            Some(&ParamValue::Number(120.5))
        );
        assert_eq!(sheet.slot(LIFT).value(), Some(&ParamValue::Number(45.0)));
        assert_eq!(sheet.found(), &[RATED_FLOW, LIFT]);
    }

    #[test]
    fn test_two_page_one_signals_make_two_sections() {
        let style = style_with(vec![(RATED_FLOW, list_rule(&["额定流量"], true))]);
        let source = FakeSource::new(&[
            &["页码:1", "额定流量", "100"],
            &["页码:1", "额定流量", "200"],
        ]);

        let sections = extract_document(&source, &style).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(
            sections[0].slot(RATED_FLOW).value(),
            Some(&ParamValue::Number(100.0))
        );
        assert_eq!(
            sections[1].slot(RATED_FLOW).value(),
            Some(&ParamValue::Number(200.0))
        );
    }

    #[test]
    fn test_match_continues_on_later_page_of_section() {
        let style = style_with(vec![(LIFT, list_rule(&["扬程"], true))]);
        let source = FakeSource::new(&[
            &["页码:1", "扬程", "N/A"],
            &["页码:2", "扬程", "45"],
        ]);

        let sections = extract_document(&source, &style).unwrap();
        assert_eq!(sections.len(), 1);
        // the page-1 text fails coercion, the page-2 occurrence lands
        assert_eq!(
            sections[0].slot(LIFT).value(),
            Some(&ParamValue::Number(45.0))
        );
    }

    #[test]
    fn test_cover_page_is_skipped_for_inline_numbering() {
        let mut style = style_with(vec![(RATED_FLOW, list_rule(&["额定流量"], true))]);
        style.page_num = PageNumbering::Inline;
        let source = FakeSource::new(&[
            // cover page carries the value but must not be scanned
            &["第", "1", "页", "额定流量", "999"],
            &["第", "2", "页", "额定流量", "120.5"],
        ]);

        let sections = extract_document(&source, &style).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(
            sections[0].slot(RATED_FLOW).value(),
            Some(&ParamValue::Number(120.5))
        );
    }

    #[test]
    fn test_pages_before_first_section_contribute_nothing() {
        let style = style_with(vec![(RATED_FLOW, list_rule(&["额定流量"], true))]);
        let source = FakeSource::new(&[
            &["额定流量", "999"],
            &["页码:1", "额定流量", "120.5"],
        ]);

        let sections = extract_document(&source, &style).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(
            sections[0].slot(RATED_FLOW).value(),
            Some(&ParamValue::Number(120.5))
        );
    }

    #[test]
    fn test_skip_run_hides_tokens_from_other_rules() {
        const TAG: SlotId = (ParamGroup::General, crate::params::general::TAG_NUMBER);
        // first rule consumes "泵 扬程" and captures "45"; second rule would
        // match the "扬程" inside the consumed run and must never see it
        let style = style_with(vec![
            (LIFT, list_rule(&["泵", "扬程"], true)),
            (TAG, list_rule(&["扬程"], true)),
        ]);
        let source = FakeSource::new(&[&["页码:1", "泵", "扬程", "45", "备注"]]);

        let sections = extract_document(&source, &style).unwrap();
        let sheet = &sections[0];
        assert_eq!(sheet.slot(LIFT).value(), Some(&ParamValue::Number(45.0)));
        assert!(sheet.slot(TAG).value().is_none());
        assert_eq!(sheet.found(), &[LIFT]);
    }

    #[test]
    fn test_value_token_position_is_reexamined() {
        const TAG: SlotId = (ParamGroup::General, crate::params::general::TAG_NUMBER);
        // the captured value token sits one past the consumed run and stays
        // visible to other rules
        let style = style_with(vec![
            (LIFT, list_rule(&["泵", "扬程"], true)),
            (TAG, list_rule(&["45"], true)),
        ]);
        let source = FakeSource::new(&[&["页码:1", "泵", "扬程", "45", "P-101"]]);

        let sections = extract_document(&source, &style).unwrap();
        let sheet = &sections[0];
        assert_eq!(sheet.slot(LIFT).value(), Some(&ParamValue::Number(45.0)));
        assert_eq!(
            sheet.slot(TAG).value(),
            Some(&ParamValue::Text("P-101".to_string()))
        );
    }

    #[test]
    fn test_fired_rule_never_fires_again_in_section() {
        let style = style_with(vec![(RATED_FLOW, list_rule(&["额定流量"], true))]);
        let source = FakeSource::new(&[&[
            "页码:1",
            "额定流量",
            "120.5",
            "额定流量",
            "999",
        ]]);

        let sections = extract_document(&source, &style).unwrap();
        assert_eq!(
            sections[0].slot(RATED_FLOW).value(),
            Some(&ParamValue::Number(120.5))
        );
        assert_eq!(sections[0].found().len(), 1);
    }

    #[test]
    fn test_too_many_sections_is_an_error() {
        let style = style_with(vec![(RATED_FLOW, list_rule(&["额定流量"], true))]);
        let pages: Vec<Vec<Token>> = (0..MAX_SECTIONS + 1)
            .map(|_| vec![make_token("页码:1")])
            .collect();
        let source = FakeSource { pages };

        let err = extract_document(&source, &style).unwrap_err();
        assert!(matches!(
            err,
            DatasheetError::TooManySections(n) if n == MAX_SECTIONS + 1
        ));
    }

    #[test]
    fn test_section_queue_write_direction() {
        let mut queue = SectionQueue::with_items(vec!["a", "b"]);
        assert!(queue.current_mut().is_none());
        assert_eq!(queue.next_for_write(), Some(&mut "a"));
        assert_eq!(queue.current_mut(), Some(&mut "a"));
        assert_eq!(queue.next_for_write(), Some(&mut "b"));
        assert_eq!(queue.next_for_write(), None);
        // exhausted stays exhausted
        assert!(queue.current_mut().is_none());
        assert_eq!(queue.next_for_write(), None);
    }
}
