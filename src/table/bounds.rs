//! Locating a table inside its sheet.
use crate::error::SheetTableError;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::MAX_COLUMNS;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Workbook;
use crate::table::normalizer::CellNormalizer;
use crate::table::HeaderSpec;
use crate::table::TableError;
use crate::table::TableGeometry;
use crate::table::MARKER_SCAN_ROWS;
use tracing::debug;

/// Resolved, 0-based origin and extent of a table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TableBounds {
    /// First table row, header included
    pub row: usize,
    pub col: usize,
    pub column_count: usize,
}

/// Turns a 1-based [`TableGeometry`] into 0-based grid positions, scanning the
/// sheet for whatever the geometry leaves open.
pub struct TableBoundsResolver<'a> {
    workbook: &'a Workbook,
    sheet: &'a Sheet,
    normalizer: &'a CellNormalizer,
}

impl<'a> TableBoundsResolver<'a> {
    pub fn new(workbook: &'a Workbook, sheet: &'a Sheet, normalizer: &'a CellNormalizer) -> Self {
        TableBoundsResolver {
            workbook,
            sheet,
            normalizer,
        }
    }

    pub fn resolve(
        &self,
        geometry: &TableGeometry,
        header: &HeaderSpec,
        ignores_configured_size: bool,
    ) -> Result<TableBounds, SheetTableError> {
        let row = self.resolve_start_row(geometry, header)?;
        let col = geometry.start_column() - 1;
        let column_count = self.resolve_column_count(geometry, row, col, ignores_configured_size)?;
        Ok(TableBounds { row, col, column_count })
    }

    /// 0-based first row of the table: the declared one, or the first of the
    /// first [`MARKER_SCAN_ROWS`] rows whose column A holds the marker label.
    pub fn resolve_start_row(&self, geometry: &TableGeometry, header: &HeaderSpec) -> Result<usize, SheetTableError> {
        if let Some(start_row) = geometry.start_row() {
            return Ok(start_row - 1);
        }

        let label = header.marker_label()?;
        for row in 0..MARKER_SCAN_ROWS {
            let value = self.normalizer.normalize_string(self.workbook, self.sheet.get(row, 0), 0);
            if matches!(value, Ok(Some(value)) if value == label) {
                debug!(sheet = %self.sheet.name, label, row, "found table marker");
                return Ok(row);
            }
        }
        Err(TableError::MarkerNotFound {
            sheet: self.sheet.name.to_owned(),
            label: label.to_owned(),
            rows: MARKER_SCAN_ROWS,
        })?
    }

    /// Number of table columns: the declared count unless `ignores_configured_size`,
    /// otherwise the run of non-empty cells going right from (`row`, `col`).
    pub fn resolve_column_count(
        &self,
        geometry: &TableGeometry,
        row: usize,
        col: usize,
        ignores_configured_size: bool,
    ) -> Result<usize, SheetTableError> {
        if let Some(column_count) = geometry.column_count().filter(|_| !ignores_configured_size) {
            return Ok(column_count);
        }

        let column_count = (col..MAX_COLUMNS)
            .take_while(|&current| {
                !self
                    .normalizer
                    .is_empty_cell(self.workbook, self.sheet.get(row, current), current - col)
            })
            .count();
        if column_count == 0 {
            Err(TableError::ZeroColumnSize {
                sheet: self.sheet.name.to_owned(),
                position: index_to_reference(row, col),
            })?;
        }
        debug!(sheet = %self.sheet.name, row, col, column_count, "discovered table width");
        Ok(column_count)
    }
}
