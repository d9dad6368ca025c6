//! Writeback engine
//!
//! Structural mirror of the extraction engine: instead of capturing values it
//! locates each slot's configured anchor in the token stream, computes the
//! insertion point, and emits a positioned text command to the page sink.
//! Targets are consumed in the same forward section order extraction produced
//! them, one per logical-page-1 boundary.

use log::debug;

use crate::extractor::SectionQueue;
use crate::matcher::{CompiledStyle, Locator, MatchOutcome, WriteStyle};
use crate::params::{CatalogRecord, ParamSlot, ParamValue};
use crate::token::{PageTextSink, PageTokenSource, TextStyle, Token};
use crate::DatasheetError;

/// One queued locator; `consumed` retires it for the section
struct ActiveLocator<'a> {
    slot: usize,
    rule: &'a Locator,
    consumed: bool,
}

/// Per-section locator queue with the consume-and-skip page scan
pub struct SectionWriter<'a> {
    locators: Vec<ActiveLocator<'a>>,
}

impl<'a> SectionWriter<'a> {
    pub fn new(style: &'a CompiledStyle) -> Self {
        let locators = style
            .locators
            .iter()
            .map(|(slot, rule)| ActiveLocator {
                slot: *slot,
                rule,
                consumed: false,
            })
            .collect();
        SectionWriter { locators }
    }

    /// Re-arm every locator for a new section
    pub fn reset(&mut self) {
        for locator in &mut self.locators {
            locator.consumed = false;
        }
    }

    /// Every locator has fired; remaining pages need no scanning
    pub fn is_done(&self) -> bool {
        self.locators.iter().all(|l| l.consumed)
    }

    /// Scan one page, inserting every anchored slot value
    ///
    /// A slot that was never populated is not a writeback candidate even when
    /// its anchor is present on the page.
    pub fn write_page<K>(
        &mut self,
        page: usize,
        words: &[Token],
        target: &mut CatalogRecord,
        sink: &mut K,
        style: &WriteStyle,
    ) -> Result<(), DatasheetError>
    where
        K: PageTextSink + ?Sized,
    {
        let mut skip = 0usize;
        for i in 0..words.len() {
            if skip > 0 {
                skip -= 1;
                continue;
            }
            let window = &words[i..];
            for entry in &mut self.locators {
                if entry.consumed {
                    continue;
                }
                let slot = target.slot(entry.slot);
                if slot.value().is_none() {
                    continue;
                }
                let Some((at, outcome)) = entry.rule.try_locate(window, style) else {
                    continue;
                };
                let text = render_value(slot, entry.rule.cjk());
                sink.insert_text(
                    page,
                    at,
                    &text,
                    &TextStyle {
                        font_size: style.font_size,
                        color: style.color,
                        cjk: entry.rule.cjk(),
                    },
                )?;
                entry.consumed = true;
                target.mark_written(entry.slot);
                if let MatchOutcome::Consumed(n) = outcome {
                    skip = n;
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Render a slot value as insertion text
///
/// Unit-tagged numbers are rounded to 3 decimals; CJK insertions go out
/// verbatim.
fn render_value(slot: &ParamSlot, cjk: bool) -> String {
    match slot.value() {
        Some(ParamValue::Text(t)) => t.clone(),
        Some(ParamValue::Number(n)) => {
            if slot.unit().is_some() && !cjk {
                let rounded = (n * 1000.0).round() / 1000.0;
                format!("{}", rounded)
            } else {
                format!("{}", n)
            }
        }
        None => String::new(),
    }
}

/// Write every pending target back into the document
///
/// `doc` serves as both token source and text sink, the way a single open
/// document does. Targets are consumed in forward order, one per section
/// boundary; returns them with their `written` slot lists filled in. An empty
/// target list is the reported no-pending-data condition.
pub fn write_back_document<D>(
    doc: &mut D,
    style: &CompiledStyle,
    targets: Vec<CatalogRecord>,
) -> Result<Vec<CatalogRecord>, DatasheetError>
where
    D: PageTokenSource + PageTextSink,
{
    if targets.is_empty() {
        return Err(DatasheetError::NoWriteData);
    }

    let mut queue = SectionQueue::with_items(targets);
    let mut writer = SectionWriter::new(style);

    for page in 0..doc.page_count() {
        let words = doc.page_tokens(page)?;
        if style.page_num.logical_page(&words) == Some(1) {
            if queue.next_for_write().is_none() {
                debug!("write targets exhausted at page {}", page);
            }
            writer.reset();
            if style.page_num.has_cover_page() {
                continue;
            }
        }
        if writer.is_done() {
            continue;
        }
        let Some(target) = queue.current_mut() else {
            continue;
        };
        writer.write_page(page, &words, target, doc, &style.write_style)?;
    }

    Ok(queue.into_items())
}
