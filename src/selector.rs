//! Tolerance-band catalog matching
//!
//! Reconciles each extracted section's flow/lift target against the catalog
//! master list, collecting every row that falls inside the configured
//! symmetric windows as a candidate record for that section.

use log::debug;

use crate::config::ToleranceConfig;
use crate::params::{CandidateGroup, ParamValue, SheetData, CATALOG_SLOTS};
use crate::tabular::TabularSource;
use crate::DatasheetError;

/// Sheet name of the catalog master list
pub const CATALOG_SHEET: &str = "总单";

/// 0-based column positions of the numeric matching keys
const FLOW_COLUMN: usize = 5;
const LIFT_COLUMN: usize = 6;

/// Rows to skip before the catalog body starts
const DEFAULT_START_ROW: u32 = 8;

/// Assigns catalog rows to extraction targets within tolerance windows
#[derive(Debug, Clone)]
pub struct CatalogSelector {
    tolerance: ToleranceConfig,
}

impl CatalogSelector {
    pub fn new(tolerance: ToleranceConfig) -> Self {
        CatalogSelector { tolerance }
    }

    /// Scan the catalog and distribute matching rows over the targets
    ///
    /// `groups` is resized to one candidate group per extracted section and
    /// every existing candidate list is cleared first, so repeated loads are
    /// safe. Scanning stops at the first row with an empty identity column or
    /// at table end. Rows without parseable flow and lift are skipped. A row
    /// may match several targets and a target may collect several rows.
    pub fn assign_candidates<S>(
        &self,
        source: &S,
        sheets: &[SheetData],
        groups: &mut Vec<CandidateGroup>,
        start_row: Option<u32>,
    ) -> Result<(), DatasheetError>
    where
        S: TabularSource + ?Sized,
    {
        let targets: Vec<(Option<f64>, Option<f64>)> =
            sheets.iter().map(SheetData::flow_lift_target).collect();

        groups.truncate(sheets.len());
        for group in groups.iter_mut() {
            group.reset();
        }
        while groups.len() < sheets.len() {
            groups.push(CandidateGroup::new(groups.len()));
        }

        let start_row = start_row.unwrap_or(DEFAULT_START_ROW);
        let last_row = source.row_count(CATALOG_SHEET)?;
        let mut scanned = 0usize;

        for row_no in (start_row + 1)..=last_row {
            let row = source.row(CATALOG_SHEET, row_no)?;
            // empty identity column is the end-of-table sentinel
            if matches!(row.first(), None | Some(None)) {
                break;
            }
            scanned += 1;
            self.check_row(&row, &targets, groups);
        }
        debug!("catalog scan: {} rows against {} targets", scanned, targets.len());
        Ok(())
    }

    fn check_row(
        &self,
        row: &[Option<ParamValue>],
        targets: &[(Option<f64>, Option<f64>)],
        groups: &mut [CandidateGroup],
    ) {
        let flow = numeric_cell(row, FLOW_COLUMN);
        let lift = numeric_cell(row, LIFT_COLUMN);
        let (Some(flow), Some(lift)) = (flow, lift) else {
            return;
        };

        for (i, (flow_target, lift_target)) in targets.iter().enumerate() {
            // a section without any flow value is excluded from matching
            let Some(flow_target) = flow_target else {
                continue;
            };
            if !within(flow, *flow_target, self.tolerance.flow_gap) {
                continue;
            }
            if let Some(lift_target) = lift_target {
                if !within(lift, *lift_target, self.tolerance.lift_gap) {
                    continue;
                }
            }

            let record = groups[i].add_record();
            for (slot, cell) in row.iter().take(CATALOG_SLOTS).enumerate() {
                if let Some(value) = cell {
                    record.slot_mut(slot).set_value(value.clone());
                }
            }
        }
    }
}

/// Exclusive symmetric window check
fn within(value: f64, target: f64, gap: f64) -> bool {
    value > target - gap && value < target + gap
}

fn numeric_cell(row: &[Option<ParamValue>], column: usize) -> Option<f64> {
    row.get(column)?.as_ref()?.as_f64()
}
