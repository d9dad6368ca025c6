//! Selection-table export and read-back
//!
//! Extracted sheets, and the catalog records selected for them, land in two
//! fixed-layout spreadsheets: the selection table and the equipment summary.
//! The column maps below mirror those layouts; a handful of cells are driven
//! by injected formulas (derived values, material lookups) instead of direct
//! writes.

use crate::params::{
    catalog, CandidateGroup, CatalogRecord, ParamGroup, ParamSlot, ParamValue, SheetData, SlotId,
    CATALOG_SLOTS,
};
use crate::tabular::{TabularSink, TabularSource};
use crate::DatasheetError;

/// Sheet receiving the full selection layout
pub const SELECTION_SHEET: &str = "设备选型表 ";
/// Sheet receiving the condensed equipment summary
pub const SUMMARY_SHEET: &str = "设备一览表";

/// First data row of both layouts
const ROW_BASE: u32 = 8;

/// Extraction-group columns, indexed like the parameter tables; `None` slots
/// have no cell in the layout
const GENERAL_COLUMNS: [Option<&str>; 8] = [
    Some("B"),
    Some("C"),
    Some("D"),
    None,
    None,
    None,
    None,
    None,
];

const MEDIUM_COLUMNS: [Option<&str>; 21] = [
    Some("E"),
    Some("F"),
    Some("G"),
    Some("H"),
    None,
    Some("I"),
    Some("J"),
    Some("K"),
    None,
    Some("L"),
    Some("M"),
    Some("N"),
    Some("O"),
    Some("P"),
    None,
    Some("Q"),
    Some("R"),
    Some("S"),
    None,
    Some("T"),
    Some("U"),
];

const PUMP_COLUMNS: [Option<&str>; 11] = [
    Some("W"),
    None,
    Some("Y"),
    Some("Z"),
    None,
    None,
    Some("AC"),
    None,
    Some("AE"),
    Some("AF"),
    Some("AG"),
];

const DRIVER_COLUMNS: [Option<&str>; 4] = [Some("AH"), Some("AK"), Some("AL"), Some("AM")];

/// Catalog-record columns by slot index
const CATALOG_COLUMNS: [Option<&str>; CATALOG_SLOTS] = [
    None,
    None,
    None,
    Some("X"),
    Some("AN"),
    None,
    None,
    Some("AC"),
    None,
    None,
    None,
    None,
    Some("AO"),
    None,
    None,
    None,
    None,
    None,
    None,
    Some("AV"),
    Some("AW"),
    Some("AX"),
    Some("AY"),
    Some("AZ"),
    Some("BA"),
    Some("BB"),
    Some("BC"),
    None,
    None,
    None,
    None,
    Some("BH"),
    Some("BI"),
    Some("BJ"),
    Some("BK"),
    Some("BL"),
    Some("BM"),
    Some("BN"),
    Some("BO"),
    Some("BP"),
    Some("BQ"),
    Some("BR"),
    Some("BS"),
    Some("BT"),
    Some("BU"),
    Some("BV"),
    Some("BW"),
    Some("BX"),
    Some("BY"),
    Some("BZ"),
    Some("CA"),
    Some("CB"),
    Some("CC"),
    Some("CD"),
    Some("CE"),
    Some("CF"),
    Some("CG"),
    Some("CH"),
    Some("CI"),
    Some("CJ"),
    Some("CK"),
    None,
    None,
];

/// Columns carrying injected formulas, in write order
const FORMULA_COLUMNS: [&str; 13] = [
    "AA", "AB", "AD", "AP", "AQ", "AR", "AS", "AT", "AU", "BD", "BE", "BF", "BG",
];

/// Formula template for one derived column, instantiated per data row
fn formula(column: &str, row: u32) -> String {
    match column {
        "AA" => format!("=MAX(R{0}, S{0})", row),
        "AB" => format!("=T{}", row),
        "AD" => format!("=AA{0}*AB{0}*I{0}/102/3600/AC{0}*100", row),
        "AP" => format!("=VLOOKUP(Z{},材质!B1:M15,2,0)", row),
        "AQ" => format!("=VLOOKUP(Z{},材质!D1:E15,2,0)", row),
        "AR" => format!("=VLOOKUP(Z{},材质!F1:G15,2,0)", row),
        "AS" => format!("=VLOOKUP(Z{},材质!H1:I15,2,0)", row),
        "AT" => format!("=VLOOKUP(Z{},材质!J1:K15,2,0)", row),
        "AU" => format!("=VLOOKUP(Z{},材质!L1:M15,2,0)", row),
        "BD" => format!("=BC{}*0.7", row),
        "BE" => format!("=BC{}*1.1", row),
        "BF" => format!("=BC{}*0.3", row),
        "BG" => format!("=BC{}*1.2", row),
        other => unreachable!("no formula template for column {}", other),
    }
}

/// Formula column shadowing a catalog slot's direct column, where one exists
fn derived_column(slot: usize) -> Option<&'static str> {
    match slot {
        catalog::FLOW => Some("AA"),
        catalog::LIFT => Some("AB"),
        catalog::SHAFT_POWER => Some("AD"),
        catalog::CASING_MATERIAL => Some("AP"),
        catalog::IMPELLER_MATERIAL => Some("AQ"),
        catalog::SHAFT_MATERIAL => Some("AR"),
        catalog::CASING_RING_MATERIAL => Some("AS"),
        catalog::IMPELLER_RING_MATERIAL => Some("AT"),
        catalog::DIFFUSER_MATERIAL => Some("AU"),
        catalog::PREFERRED_RANGE_START => Some("BD"),
        catalog::PREFERRED_RANGE_END => Some("BE"),
        catalog::ALLOWED_RANGE_START => Some("BF"),
        catalog::ALLOWED_RANGE_END => Some("BG"),
        _ => None,
    }
}

fn extract_column(id: SlotId) -> Option<&'static str> {
    match id.0 {
        ParamGroup::General => GENERAL_COLUMNS[id.1],
        ParamGroup::Medium => MEDIUM_COLUMNS[id.1],
        ParamGroup::Pump => PUMP_COLUMNS[id.1],
        ParamGroup::Driver => DRIVER_COLUMNS[id.1],
    }
}

/// Cell representation of a slot value: unit-tagged slots export as numbers,
/// the rest verbatim; a unit-tagged value that will not coerce exports nothing
fn cell_value(slot: &ParamSlot) -> Option<ParamValue> {
    let value = slot.value()?;
    if slot.unit().is_some() {
        value.as_f64().map(ParamValue::Number)
    } else {
        Some(value.clone())
    }
}

fn write_record_cell<K>(
    sink: &mut K,
    sheet: &str,
    record: &CatalogRecord,
    slot: usize,
    row: u32,
) -> Result<(), DatasheetError>
where
    K: TabularSink + ?Sized,
{
    let Some(column) = CATALOG_COLUMNS[slot] else {
        return Ok(());
    };
    if let Some(value) = cell_value(record.slot(slot)) {
        sink.set_cell(sheet, column, row, value)?;
    }
    Ok(())
}

/// Write extracted sheets plus selected records into the selection table
pub fn write_selection<K>(
    sink: &mut K,
    sheets: &[SheetData],
    groups: Option<&[CandidateGroup]>,
) -> Result<(), DatasheetError>
where
    K: TabularSink + ?Sized,
{
    write_table(sink, sheets, groups, SELECTION_SHEET)
}

/// Write the condensed layout into the equipment summary
pub fn write_summary<K>(
    sink: &mut K,
    sheets: &[SheetData],
    groups: Option<&[CandidateGroup]>,
) -> Result<(), DatasheetError>
where
    K: TabularSink + ?Sized,
{
    write_table(sink, sheets, groups, SUMMARY_SHEET)
}

fn write_table<K>(
    sink: &mut K,
    sheets: &[SheetData],
    groups: Option<&[CandidateGroup]>,
    sheet_name: &str,
) -> Result<(), DatasheetError>
where
    K: TabularSink + ?Sized,
{
    sink.insert_rows(sheet_name, ROW_BASE, sheets.len() as u32)?;

    for (i, data) in sheets.iter().enumerate() {
        let row = ROW_BASE + i as u32;

        // only discovered fields are exported, in discovery order
        for id in data.found() {
            let Some(column) = extract_column(*id) else {
                continue;
            };
            if let Some(value) = cell_value(data.slot(*id)) {
                sink.set_cell(sheet_name, column, row, value)?;
            }
        }

        let Some(record) = groups
            .and_then(|g| g.get(i))
            .and_then(CandidateGroup::selected_record)
        else {
            continue;
        };

        if sheet_name == SUMMARY_SHEET {
            for &column in &FORMULA_COLUMNS[0..3] {
                sink.set_formula(sheet_name, column, row, &formula(column, row))?;
            }
            write_record_cell(sink, sheet_name, record, catalog::MODEL, row)?;
            write_record_cell(sink, sheet_name, record, catalog::EFFICIENCY, row)?;
            continue;
        }

        for &column in &FORMULA_COLUMNS {
            sink.set_formula(sheet_name, column, row, &formula(column, row))?;
        }
        for slot in 0..CATALOG_SLOTS {
            write_record_cell(sink, sheet_name, record, slot, row)?;
        }
    }
    Ok(())
}

/// Read `count` rows of a previously written selection table back into
/// catalog records, preferring the derived-formula columns where defined
pub fn read_selection<S>(source: &S, count: usize) -> Result<Vec<CatalogRecord>, DatasheetError>
where
    S: TabularSource + ?Sized,
{
    let mut records = Vec::with_capacity(count);
    for i in 0..count {
        let row = ROW_BASE + i as u32;
        let mut record = CatalogRecord::new();
        for slot in 0..CATALOG_SLOTS {
            let Some(column) = derived_column(slot).or(CATALOG_COLUMNS[slot]) else {
                continue;
            };
            if let Some(value) = source.cell(SELECTION_SHEET, column, row)? {
                record.slot_mut(slot).set_value(value);
            }
        }
        records.push(record);
    }
    Ok(records)
}
