//! Reading tables, eagerly or as a stream.
//!
//! Both modes resolve the bounds and validate the header before the first body
//! row is produced. Without a declared row count the body ends at the first
//! row whose cells are all empty; that row is never returned.
use crate::error::SheetTableError;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Workbook;
use crate::table::bounds::TableBounds;
use crate::table::bounds::TableBoundsResolver;
use crate::table::header::HeaderValidator;
use crate::table::normalizer::CellData;
use crate::table::normalizer::CellNormalizer;
use crate::table::HeaderSpec;
use crate::table::Row;
use crate::table::TableData;
use crate::table::TableError;
use crate::table::TableGeometry;
use crate::table::TableOptions;
use crate::table::MAX_BODY_ROWS;
use std::path::Path;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct TableReader {
    geometry: TableGeometry,
    header: HeaderSpec,
    options: TableOptions,
}

impl TableReader {
    pub fn new(geometry: TableGeometry, header: HeaderSpec, options: TableOptions) -> Result<Self, SheetTableError> {
        header.validate(&geometry)?;
        Ok(TableReader {
            geometry,
            header,
            options,
        })
    }

    pub fn geometry(&self) -> &TableGeometry {
        &self.geometry
    }

    pub fn header(&self) -> &HeaderSpec {
        &self.header
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    /// Locates the table in a workbook and validates its header.
    pub fn resolve<'a>(&self, workbook: &'a Workbook) -> Result<ResolvedTable<'a>, SheetTableError> {
        let sheet = workbook.require_sheet(self.geometry.sheet_name())?;
        let normalizer = CellNormalizer::from_options(&self.options);
        let bounds = TableBoundsResolver::new(workbook, sheet, &normalizer).resolve(&self.geometry, &self.header, false)?;

        let validator = HeaderValidator::new(&sheet.name, &self.header, self.options.ignores_additional_columns);
        let header_lines = validator.number_of_header_lines();
        let mut table = ResolvedTable {
            workbook,
            sheet,
            normalizer,
            bounds,
            body_row: bounds.row + header_lines,
            row_count: self.geometry.row_count(),
        };
        let header_rows = (0..header_lines)
            .map(|line| table.read_row::<String>(bounds.row + line))
            .collect::<Result<Vec<_>, _>>()?;
        validator.validate(&header_rows)?;

        // the header may be wider than the expected labels when tolerated
        if self.geometry.column_count().is_none() {
            table.bounds.column_count = validator.body_column_count(bounds.column_count);
        }
        debug!(
            sheet = %sheet.name,
            row = table.bounds.row,
            col = table.bounds.col,
            column_count = table.bounds.column_count,
            "resolved table"
        );
        Ok(table)
    }

    /// Reads every body row.
    pub fn read<'a, T: CellData<'a>>(&self, workbook: &'a Workbook) -> Result<TableData<T>, SheetTableError> {
        let table = self.resolve(workbook)?;
        let header_rows = table.header_rows()?;
        let mut rows = Vec::new();
        while let Some(row) = table.fetch_row(rows.len())? {
            rows.push(row);
        }
        debug!(sheet = %table.sheet.name, rows = rows.len(), "read table");
        Ok(TableData::new(header_rows, rows))
    }

    /// Streams the body rows. The first row is fetched before returning, so
    /// configuration and header problems surface here.
    pub fn iterate<'a, T: CellData<'a>>(&self, workbook: &'a Workbook) -> Result<TableRows<'a, T>, SheetTableError> {
        let table = self.resolve(workbook)?;
        let header_rows = table.header_rows()?;
        let lookahead = match table.fetch_row(0)? {
            Some(row) => Lookahead::Buffered(row),
            None => Lookahead::Done,
        };
        Ok(TableRows {
            table,
            header_rows,
            offset: 0,
            lookahead,
        })
    }

    /// Opens a spreadsheet file, reads the table as strings and releases the file.
    pub fn read_file<P: AsRef<Path>>(&self, path: P) -> Result<TableData<String>, SheetTableError> {
        let workbook = Workbook::open(path)?;
        self.read(&workbook)
    }
}

/// A table located in a workbook, with a validated header.
///
/// Row reads are side-effect free, so any body row can be fetched again.
pub struct ResolvedTable<'a> {
    workbook: &'a Workbook,
    sheet: &'a Sheet,
    normalizer: CellNormalizer,
    bounds: TableBounds,
    body_row: usize,
    row_count: Option<usize>,
}

impl<'a> ResolvedTable<'a> {
    pub fn bounds(&self) -> TableBounds {
        self.bounds
    }

    pub fn sheet(&self) -> &'a Sheet {
        self.sheet
    }

    /// 0-based grid row of the first body row.
    pub fn body_row(&self) -> usize {
        self.body_row
    }

    pub fn header_rows<T: CellData<'a>>(&self) -> Result<Vec<Row<T>>, SheetTableError> {
        (self.bounds.row..self.body_row).map(|row| self.read_row(row)).collect()
    }

    fn read_row<T: CellData<'a>>(&self, row: usize) -> Result<Row<T>, SheetTableError> {
        (0..self.bounds.column_count)
            .map(|column| {
                let cell = self.sheet.get(row, self.bounds.col + column);
                T::normalize(&self.normalizer, self.workbook, cell, column)
            })
            .collect()
    }

    /// Body row at `offset`, or `None` past the end of the table.
    pub fn fetch_row<T: CellData<'a>>(&self, offset: usize) -> Result<Option<Row<T>>, SheetTableError> {
        if let Some(row_count) = self.row_count {
            if offset >= row_count {
                return Ok(None);
            }
            return self.read_row(self.body_row + offset).map(Some);
        }

        let row = self.read_row::<T>(self.body_row + offset)?;
        let is_empty = row
            .iter()
            .enumerate()
            .all(|(column, value)| T::is_empty(&self.normalizer, value.as_ref(), column));
        if is_empty {
            return Ok(None);
        }
        if offset >= MAX_BODY_ROWS {
            Err(TableError::RowScanLimitExceeded {
                sheet: self.sheet.name.to_owned(),
                limit: MAX_BODY_ROWS,
            })?;
        }
        Ok(Some(row))
    }
}

enum Lookahead<T> {
    Buffered(Row<T>),
    Failed(SheetTableError),
    Done,
}

/// Single-pass stream of body rows, reading one row ahead so that
/// [`TableRows::has_next`] is known without consuming anything.
pub struct TableRows<'a, T> {
    table: ResolvedTable<'a>,
    header_rows: Vec<Row<T>>,
    offset: usize,
    lookahead: Lookahead<T>,
}

impl<'a, T: CellData<'a>> TableRows<'a, T> {
    pub fn has_next(&self) -> bool {
        !matches!(self.lookahead, Lookahead::Done)
    }

    pub fn header_rows(&self) -> &[Row<T>] {
        &self.header_rows
    }

    fn advance(&mut self) -> Lookahead<T> {
        self.offset += 1;
        match self.table.fetch_row(self.offset) {
            Ok(Some(row)) => Lookahead::Buffered(row),
            Ok(None) => {
                debug!(sheet = %self.table.sheet.name, rows = self.offset, "table stream exhausted");
                Lookahead::Done
            }
            Err(error) => Lookahead::Failed(error),
        }
    }
}

impl<'a, T: CellData<'a>> Iterator for TableRows<'a, T> {
    type Item = Result<Row<T>, SheetTableError>;

    fn next(&mut self) -> Option<Self::Item> {
        match std::mem::replace(&mut self.lookahead, Lookahead::Done) {
            Lookahead::Buffered(row) => {
                self.lookahead = self.advance();
                Some(Ok(row))
            }
            Lookahead::Failed(error) => Some(Err(error)),
            Lookahead::Done => None,
        }
    }
}
