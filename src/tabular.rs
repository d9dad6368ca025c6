//! Tabular collaborator interface
//!
//! The spreadsheet engine is an external collaborator; the crate only
//! programs against these traits. Cells are addressed by sheet name, column
//! letter, and 1-based row number; formulas are injected as raw strings.
//! `MemoryWorkbook` is a self-contained implementation for tests and
//! embedders without a spreadsheet backend.

use std::collections::HashMap;

use crate::params::ParamValue;
use crate::DatasheetError;

/// Read access to a spreadsheet
pub trait TabularSource {
    /// One cell's computed value, `None` when empty or not computable
    fn cell(&self, sheet: &str, column: &str, row: u32)
        -> Result<Option<ParamValue>, DatasheetError>;

    /// One whole row in column order, with `None` gaps; empty past the end
    fn row(&self, sheet: &str, row: u32) -> Result<Vec<Option<ParamValue>>, DatasheetError>;

    /// Highest populated 1-based row number
    fn row_count(&self, sheet: &str) -> Result<u32, DatasheetError>;
}

/// Write access to a spreadsheet
pub trait TabularSink {
    fn set_cell(
        &mut self,
        sheet: &str,
        column: &str,
        row: u32,
        value: ParamValue,
    ) -> Result<(), DatasheetError>;

    /// Inject a raw formula string, e.g. `=MAX(R9, S9)`
    fn set_formula(
        &mut self,
        sheet: &str,
        column: &str,
        row: u32,
        formula: &str,
    ) -> Result<(), DatasheetError>;

    /// Insert `count` empty rows before row `at`, shifting existing rows down
    fn insert_rows(&mut self, sheet: &str, at: u32, count: u32) -> Result<(), DatasheetError>;
}

/// Convert a column letter run ("A", "Z", "AA", "CK") to a 1-based index
pub fn column_index(column: &str) -> Result<u32, DatasheetError> {
    if column.is_empty() {
        return Err(DatasheetError::Tabular("empty column address".to_string()));
    }
    let mut index = 0u32;
    for c in column.chars() {
        if !c.is_ascii_uppercase() {
            return Err(DatasheetError::Tabular(format!(
                "bad column address: {}",
                column
            )));
        }
        index = index * 26 + (c as u32 - 'A' as u32 + 1);
    }
    Ok(index)
}

#[derive(Debug, Clone)]
enum Cell {
    Value(ParamValue),
    Formula(String),
}

#[derive(Debug, Clone, Default)]
struct Sheet {
    // keyed by (1-based column index, 1-based row)
    cells: HashMap<(u32, u32), Cell>,
}

impl Sheet {
    fn max_row(&self) -> u32 {
        self.cells.keys().map(|(_, row)| *row).max().unwrap_or(0)
    }

    fn max_column(&self) -> u32 {
        self.cells.keys().map(|(col, _)| *col).max().unwrap_or(0)
    }
}

/// In-memory workbook implementing both tabular traits
///
/// Formula cells read back as empty through `TabularSource` (nothing computes
/// them here); tests inspect them via [`MemoryWorkbook::formula`].
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: HashMap<String, Sheet>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        MemoryWorkbook::default()
    }

    fn sheet(&self, name: &str) -> Result<&Sheet, DatasheetError> {
        self.sheets
            .get(name)
            .ok_or_else(|| DatasheetError::Tabular(format!("no sheet named {:?}", name)))
    }

    fn sheet_mut(&mut self, name: &str) -> &mut Sheet {
        self.sheets.entry(name.to_string()).or_default()
    }

    /// Direct value inspection (tests and fixtures)
    pub fn value(&self, sheet: &str, column: &str, row: u32) -> Option<&ParamValue> {
        let sheet = self.sheets.get(sheet)?;
        match sheet.cells.get(&(column_index(column).ok()?, row))? {
            Cell::Value(v) => Some(v),
            Cell::Formula(_) => None,
        }
    }

    /// Direct formula inspection (tests)
    pub fn formula(&self, sheet: &str, column: &str, row: u32) -> Option<&str> {
        let sheet = self.sheets.get(sheet)?;
        match sheet.cells.get(&(column_index(column).ok()?, row))? {
            Cell::Formula(f) => Some(f),
            Cell::Value(_) => None,
        }
    }
}

impl TabularSource for MemoryWorkbook {
    fn cell(
        &self,
        sheet: &str,
        column: &str,
        row: u32,
    ) -> Result<Option<ParamValue>, DatasheetError> {
        let sheet = self.sheet(sheet)?;
        let col = column_index(column)?;
        Ok(match sheet.cells.get(&(col, row)) {
            Some(Cell::Value(v)) => Some(v.clone()),
            _ => None,
        })
    }

    fn row(&self, sheet: &str, row: u32) -> Result<Vec<Option<ParamValue>>, DatasheetError> {
        let sheet = self.sheet(sheet)?;
        let width = sheet.max_column();
        Ok((1..=width)
            .map(|col| match sheet.cells.get(&(col, row)) {
                Some(Cell::Value(v)) => Some(v.clone()),
                _ => None,
            })
            .collect())
    }

    fn row_count(&self, sheet: &str) -> Result<u32, DatasheetError> {
        Ok(self.sheet(sheet)?.max_row())
    }
}

impl TabularSink for MemoryWorkbook {
    fn set_cell(
        &mut self,
        sheet: &str,
        column: &str,
        row: u32,
        value: ParamValue,
    ) -> Result<(), DatasheetError> {
        let col = column_index(column)?;
        self.sheet_mut(sheet).cells.insert((col, row), Cell::Value(value));
        Ok(())
    }

    fn set_formula(
        &mut self,
        sheet: &str,
        column: &str,
        row: u32,
        formula: &str,
    ) -> Result<(), DatasheetError> {
        let col = column_index(column)?;
        self.sheet_mut(sheet)
            .cells
            .insert((col, row), Cell::Formula(formula.to_string()));
        Ok(())
    }

    fn insert_rows(&mut self, sheet: &str, at: u32, count: u32) -> Result<(), DatasheetError> {
        let sheet = self.sheet_mut(sheet);
        let shifted: HashMap<(u32, u32), Cell> = sheet
            .cells
            .drain()
            .map(|((col, row), cell)| {
                let row = if row >= at { row + count } else { row };
                ((col, row), cell)
            })
            .collect();
        sheet.cells = shifted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A").unwrap(), 1);
        assert_eq!(column_index("Z").unwrap(), 26);
        assert_eq!(column_index("AA").unwrap(), 27);
        assert_eq!(column_index("CK").unwrap(), 89);
        assert!(column_index("").is_err());
        assert!(column_index("a1").is_err());
    }

    #[test]
    fn test_cell_round_trip() {
        let mut wb = MemoryWorkbook::new();
        wb.set_cell("总单", "F", 9, ParamValue::Number(104.0)).unwrap();
        assert_eq!(
            wb.cell("总单", "F", 9).unwrap(),
            Some(ParamValue::Number(104.0))
        );
        assert_eq!(wb.cell("总单", "G", 9).unwrap(), None);
        assert!(wb.cell("缺失", "A", 1).is_err());
    }

    #[test]
    fn test_row_view_has_gaps() {
        let mut wb = MemoryWorkbook::new();
        wb.set_cell("总单", "A", 9, ParamValue::Text("P01".to_string()))
            .unwrap();
        wb.set_cell("总单", "C", 9, ParamValue::Number(2.0)).unwrap();
        let row = wb.row("总单", 9).unwrap();
        assert_eq!(row.len(), 3);
        assert_eq!(row[0], Some(ParamValue::Text("P01".to_string())));
        assert_eq!(row[1], None);
        assert_eq!(row[2], Some(ParamValue::Number(2.0)));
    }

    #[test]
    fn test_insert_rows_shifts_down() {
        let mut wb = MemoryWorkbook::new();
        wb.set_cell("s", "A", 8, ParamValue::Number(1.0)).unwrap();
        wb.set_cell("s", "A", 7, ParamValue::Number(2.0)).unwrap();
        wb.insert_rows("s", 8, 2).unwrap();
        assert_eq!(wb.cell("s", "A", 7).unwrap(), Some(ParamValue::Number(2.0)));
        assert_eq!(wb.cell("s", "A", 8).unwrap(), None);
        assert_eq!(wb.cell("s", "A", 10).unwrap(), Some(ParamValue::Number(1.0)));
    }

    #[test]
    fn test_formula_reads_back_empty() {
        let mut wb = MemoryWorkbook::new();
        wb.set_formula("s", "AA", 9, "=MAX(R9, S9)").unwrap();
        assert_eq!(wb.cell("s", "AA", 9).unwrap(), None);
        assert_eq!(wb.formula("s", "AA", 9), Some("=MAX(R9, S9)"));
    }
}
