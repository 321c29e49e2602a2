//! # Tables inside free-form sheets
//!
//! A table is a rectangular region of one sheet: an optional one-line header
//! followed by body rows. Its origin and width may be declared or discovered,
//! its header is validated before any body row is trusted, and its body ends
//! either after a declared number of rows or at the first all-empty row.
//!
//! Geometry in this module is 1-based, like the row numbers and column letters
//! a spreadsheet user sees. Grid access is 0-based; the conversion happens once,
//! in [`bounds::TableBoundsResolver`].
pub mod bounds;
pub mod header;
pub mod normalizer;
pub mod reader;
pub mod writer;

use crate::error::SheetTableError;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::style::StyleId;
use crate::table::normalizer::DateTimeFormat;
use std::collections::HashMap;
use thiserror::Error;

/// Rows examined in column A when looking for a table's marker label.
pub const MARKER_SCAN_ROWS: usize = 100;

/// Body rows scanned for the empty terminator before giving up.
pub const MAX_BODY_ROWS: usize = 10_000;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Sheet name must not be empty")]
    EmptySheetName,

    #[error("Invalid {name} '{value}'")]
    InvalidGeometry { name: &'static str, value: String },

    #[error("Header labels must not be empty")]
    EmptyHeader,

    #[error("Sheet '{sheet}': a table without header needs an explicit start row")]
    MissingStartRow { sheet: String },

    #[error("A table without header has no marker label")]
    UndefinedMarkerLabel,

    #[error("Sheet '{sheet}': marker label '{label}' not found in the first {rows} rows of column A")]
    MarkerNotFound { sheet: String, label: String, rows: usize },

    #[error("Sheet '{sheet}': table column size is zero at '{position}'")]
    ZeroColumnSize { sheet: String, position: String },

    #[error("Sheet '{sheet}': header mismatch at column {column}, found '{found}', expected '{expected}'")]
    HeaderMismatch {
        sheet: String,
        column: usize,
        found: String,
        expected: String,
    },

    #[error("Sheet '{sheet}': header has {found} columns, expected {expected}")]
    HeaderSizeMismatch { sheet: String, found: usize, expected: usize },

    #[error("Unknown cell type '{kind}' at '{position}'")]
    UnknownCellType { position: String, kind: &'static str },

    #[error("Sheet '{sheet}': no empty row found within {limit} body rows")]
    RowScanLimitExceeded { sheet: String, limit: usize },

    #[error("Sheet '{sheet}': {rows} rows do not fit a table of {limit} rows")]
    RowCountExceeded { sheet: String, rows: usize, limit: usize },

    #[error("Sheet '{sheet}': row {row} has {columns} values, the table has {limit} columns")]
    RowWidthExceeded {
        sheet: String,
        row: usize,
        columns: usize,
        limit: usize,
    },
}

/// Where a table lives in its sheet. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableGeometry {
    sheet_name: String,
    start_row: Option<usize>,
    start_column: usize,
    row_count: Option<usize>,
    column_count: Option<usize>,
}

impl TableGeometry {
    /// Geometry with a known first column (1-based) and a discovered start row.
    pub fn new(sheet_name: &str, start_column: usize) -> Result<Self, SheetTableError> {
        if sheet_name.is_empty() {
            Err(TableError::EmptySheetName)?;
        }
        Ok(TableGeometry {
            sheet_name: sheet_name.to_owned(),
            start_row: None,
            start_column: positive("start column", start_column)?,
            row_count: None,
            column_count: None,
        })
    }

    /// Geometry anchored at an `A1`-style reference such as `B3`.
    pub fn anchored(sheet_name: &str, anchor: &str) -> Result<Self, SheetTableError> {
        let (row, col) = reference_to_index(anchor).ok_or_else(|| TableError::InvalidGeometry {
            name: "anchor",
            value: anchor.to_owned(),
        })?;
        TableGeometry::new(sheet_name, col + 1)?.with_start_row(row + 1)
    }

    pub fn with_start_row(mut self, start_row: usize) -> Result<Self, SheetTableError> {
        self.start_row = Some(positive("start row", start_row)?);
        Ok(self)
    }

    pub fn with_row_count(mut self, row_count: usize) -> Result<Self, SheetTableError> {
        self.row_count = Some(positive("row count", row_count)?);
        Ok(self)
    }

    pub fn with_column_count(mut self, column_count: usize) -> Result<Self, SheetTableError> {
        self.column_count = Some(positive("column count", column_count)?);
        Ok(self)
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// 1-based start row; `None` when discovered by marker label.
    pub fn start_row(&self) -> Option<usize> {
        self.start_row
    }

    pub fn start_column(&self) -> usize {
        self.start_column
    }

    /// Body rows; `None` when the body ends at the first all-empty row.
    pub fn row_count(&self) -> Option<usize> {
        self.row_count
    }

    /// Columns; `None` when discovered from the first table row.
    pub fn column_count(&self) -> Option<usize> {
        self.column_count
    }
}

fn positive(name: &'static str, value: usize) -> Result<usize, SheetTableError> {
    if value == 0 {
        Err(TableError::InvalidGeometry {
            name,
            value: value.to_string(),
        })?;
    }
    Ok(value)
}

/// Shape of a table's header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderSpec {
    /// No header: every table row is a body row.
    FreeForm,
    /// One header row holding these labels, left to right.
    OneLine(Vec<String>),
}

impl HeaderSpec {
    pub fn one_line<I, S>(labels: I) -> Result<Self, SheetTableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            Err(TableError::EmptyHeader)?;
        }
        Ok(HeaderSpec::OneLine(labels))
    }

    pub fn number_of_header_lines(&self) -> usize {
        match self {
            HeaderSpec::FreeForm => 0,
            HeaderSpec::OneLine(_) => 1,
        }
    }

    pub fn labels(&self) -> &[String] {
        match self {
            HeaderSpec::FreeForm => &[],
            HeaderSpec::OneLine(labels) => labels,
        }
    }

    /// Label of the table's top-left cell, used to discover its start row.
    pub fn marker_label(&self) -> Result<&str, SheetTableError> {
        match self.labels().first() {
            Some(label) => Ok(label.as_str()),
            None => Err(TableError::UndefinedMarkerLabel)?,
        }
    }

    pub(crate) fn validate(&self, geometry: &TableGeometry) -> Result<(), SheetTableError> {
        match self {
            HeaderSpec::OneLine(labels) if labels.is_empty() => Err(TableError::EmptyHeader)?,
            HeaderSpec::FreeForm if geometry.start_row.is_none() => Err(TableError::MissingStartRow {
                sheet: geometry.sheet_name.to_owned(),
            })?,
            _ => Ok(()),
        }
    }
}

/// What a blank cell, or a cell holding an empty string, normalizes to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum NoDataPolicy {
    /// No value
    #[default]
    AsAbsent,
    /// An empty string
    AsEmptyString,
}

impl NoDataPolicy {
    pub fn sentinel(&self) -> Option<String> {
        match self {
            NoDataPolicy::AsAbsent => None,
            NoDataPolicy::AsEmptyString => Some(String::new()),
        }
    }
}

/// Options shared by readers and writers.
#[derive(Clone, Debug, Default)]
pub struct TableOptions {
    pub no_data: NoDataPolicy,
    /// Patterns used to render date-formatted numeric cells
    pub date_time_format: DateTimeFormat,
    /// Allow the sheet's header row to be wider than the expected labels
    pub ignores_additional_columns: bool,
}

#[derive(Clone, Debug, Default)]
pub struct WriterOptions {
    pub table: TableOptions,
    /// Styles applied verbatim to whole table columns (0-based table column)
    pub column_styles: HashMap<usize, StyleId>,
}

/// One table row: one value per table column, `None` for no data.
pub type Row<T> = Vec<Option<T>>;

/// Rows read from a table, with its header rows kept apart.
#[derive(Clone, Debug, PartialEq)]
pub struct TableData<T> {
    header_rows: Vec<Row<T>>,
    rows: Vec<Row<T>>,
}

impl<T> TableData<T> {
    pub fn new(header_rows: Vec<Row<T>>, rows: Vec<Row<T>>) -> Self {
        TableData { header_rows, rows }
    }

    pub fn header_rows(&self) -> &[Row<T>] {
        &self.header_rows
    }

    /// Body rows, header excluded.
    pub fn rows(&self) -> &[Row<T>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row<T>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Builds one record per body row with a caller-supplied factory.
    pub fn map_rows<R, F>(&self, factory: F) -> Vec<R>
    where
        F: FnMut(&[Option<T>]) -> R,
    {
        self.rows.iter().map(Vec::as_slice).map(factory).collect()
    }

    /// Like [`TableData::map_rows`], stopping at the first record the factory rejects.
    pub fn try_map_rows<R, E, F>(&self, factory: F) -> Result<Vec<R>, E>
    where
        F: FnMut(&[Option<T>]) -> Result<R, E>,
    {
        self.rows.iter().map(Vec::as_slice).map(factory).collect()
    }
}

impl<T> IntoIterator for TableData<T> {
    type Item = Row<T>;
    type IntoIter = std::vec::IntoIter<Row<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
