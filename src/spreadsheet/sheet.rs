use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::FormulaResult;
use crate::spreadsheet::style::StyleId;
use std::collections::BTreeMap;

/// One worksheet: a sparse grid of cells addressed by 0-based (row, column).
#[derive(Clone, Debug, Default)]
pub struct Sheet {
    /// Sheet name
    pub name: String,
    /// Cells keyed by (row, column), in row-major order
    cells: BTreeMap<(usize, usize), Cell>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Sheet {
            name: name.to_owned(),
            cells: BTreeMap::new(),
        }
    }

    /// Returns true if the sheet contains no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Cell at a position. Reads are side-effect free and repeatable.
    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut Cell> {
        self.cells.get_mut(&(row, col))
    }

    /// Cell at a position, created blank with the default style if absent.
    pub fn create_cell(&mut self, row: usize, col: usize) -> &mut Cell {
        self.cells
            .entry((row, col))
            .or_insert_with(|| Cell::new(row, col))
    }

    /// Stores a cell at its own position, replacing what was there.
    pub fn insert(&mut self, cell: Cell) {
        self.cells.insert((cell.row, cell.col), cell);
    }

    pub fn remove(&mut self, row: usize, col: usize) -> Option<Cell> {
        self.cells.remove(&(row, col))
    }

    pub fn set_string(&mut self, row: usize, col: usize, value: &str) -> &mut Cell {
        let cell = self.create_cell(row, col);
        cell.set_content(CellType::String, value);
        cell
    }

    pub fn set_number(&mut self, row: usize, col: usize, value: f64) -> &mut Cell {
        let cell = self.create_cell(row, col);
        cell.set_content(CellType::Numeric, &value.to_string());
        cell
    }

    pub fn set_boolean(&mut self, row: usize, col: usize, value: bool) -> &mut Cell {
        let cell = self.create_cell(row, col);
        cell.set_content(CellType::Boolean, if value { "1" } else { "0" });
        cell
    }

    pub fn set_blank(&mut self, row: usize, col: usize) -> &mut Cell {
        let cell = self.create_cell(row, col);
        cell.set_content(CellType::Blank, "");
        cell
    }

    /// Stores a formula together with its last calculated value.
    pub fn set_formula(&mut self, row: usize, col: usize, formula: &str, result: FormulaResult, cached: &str) -> &mut Cell {
        let cell = self.create_cell(row, col);
        cell.set_content(result.into(), cached);
        cell.kind = CellType::Formula(result);
        cell.formula = Some(formula.trim_start_matches('=').to_owned());
        cell
    }

    pub fn set_style(&mut self, row: usize, col: usize, style: StyleId) {
        self.create_cell(row, col).style = style;
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    /// Used range as (first row, first column, last row, last column), all inclusive.
    pub fn dimensions(&self) -> Option<(usize, usize, usize, usize)> {
        let first_row = self.cells.keys().next()?.0;
        let last_row = self.cells.keys().next_back()?.0;
        let first_col = self.cells.keys().map(|(_, col)| *col).min()?;
        let last_col = self.cells.keys().map(|(_, col)| *col).max()?;
        Some((first_row, first_col, last_row, last_col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_initial() {
        let sheet = Sheet::new("Data");
        assert!(sheet.is_empty());
        assert_eq!(sheet.dimensions(), None);
        assert_eq!(sheet.get(0, 0), None);
    }

    #[test]
    fn sheet_update() {
        let mut sheet = Sheet::new("Data");
        sheet.set_string(1, 1, "a");
        sheet.set_number(1, 3, 2.5);
        sheet.set_blank(3, 1);
        sheet.set_boolean(3, 3, true);

        assert_eq!(sheet.len(), 4);
        assert_eq!(sheet.dimensions(), Some((1, 1, 3, 3)));
        assert_eq!(sheet.get(1, 3).map(|cell| cell.value.as_str()), Some("2.5"));
        assert_eq!(sheet.get(3, 1).map(|cell| cell.kind), Some(CellType::Blank));

        let positions: Vec<(usize, usize)> = sheet.cells().map(|cell| (cell.row, cell.col)).collect();
        assert_eq!(positions, vec![(1, 1), (1, 3), (3, 1), (3, 3)]);
    }

    #[test]
    fn overwriting_keeps_style_and_drops_formula() {
        let mut sheet = Sheet::new("Data");
        sheet.set_formula(0, 0, "=SUM(B1:B3)", FormulaResult::Numeric, "6");
        sheet.set_style(0, 0, StyleId(2));
        assert_eq!(sheet.get(0, 0).and_then(|cell| cell.formula.clone()), Some("SUM(B1:B3)".to_owned()));
        assert_eq!(sheet.get(0, 0).map(|cell| cell.kind), Some(CellType::Formula(FormulaResult::Numeric)));

        sheet.set_string(0, 0, "total");
        let cell = sheet.get(0, 0).unwrap();
        assert_eq!(cell.kind, CellType::String);
        assert_eq!(cell.formula, None);
        assert_eq!(cell.style, StyleId(2));
    }
}
