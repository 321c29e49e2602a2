//! # Grid access
//!
//! In-memory workbook model used by the table reader and writer: sheets of sparse
//! cells, a bounded style table and the workbook's date system. Workbooks are
//! loaded from XLSX packages with `zip` + `quick-xml` and saved with
//! `rust_xlsxwriter`. Every cell read is side-effect free, so the same row can be
//! fetched any number of times.
pub mod cell;
pub(crate) mod excel;
pub(crate) mod export;
pub mod format;
pub mod reference;
pub mod sheet;
pub mod style;
pub(crate) mod xlsx;

use crate::error::SheetTableError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::format::NumberFormat;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::style::Style;
use crate::spreadsheet::style::StyleId;
use crate::spreadsheet::style::StyleTable;
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors raised by the grid layer.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Cannot detect file format for '{0}'")]
    InvalidFileFormat(String),

    #[error("Missing part '{0}' in spreadsheet package")]
    FileError(String),

    #[error("Sheet '{sheet}' not found in '{file}'")]
    SheetNotFound { file: String, sheet: String },

    #[error("Too many cell styles: the format allows at most {limit}")]
    TooManyStyles { limit: usize },

    #[error("Invalid cell value at '{position}': {message}")]
    CellValueError { position: String, message: String },
}

/// A workbook: the grid handle the table reader and writer operate on.
#[derive(Clone, Debug, Default)]
pub struct Workbook {
    /// Path the workbook was opened from; empty for a fresh workbook
    pub name: String,
    /// Whether date serials count from 1904-01-01 instead of 1900-01-01
    pub is_1904: bool,
    sheets: Vec<Sheet>,
    styles: StyleTable,
}

impl Workbook {
    /// Creates an empty workbook with no sheets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a spreadsheet file. Supports `.xlsx` and `.xlsm`.
    ///
    /// The whole package is read into memory; no file handle outlives this call.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Workbook, SheetTableError> {
        let path = path.as_ref();
        let file_name = path.to_string_lossy().to_string();
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(|extension| extension.to_ascii_lowercase());
        let workbook = match extension.as_deref() {
            Some("xlsx") | Some("xlsm") => xlsx::load(&file_name)?,
            _ => Err(SpreadsheetError::InvalidFileFormat(file_name))?,
        };
        debug!(file = %workbook.name, sheets = workbook.sheets.len(), styles = workbook.styles.len(), "opened workbook");
        Ok(workbook)
    }

    /// Writes the workbook as an XLSX file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SheetTableError> {
        export::save(self, path.as_ref())?;
        debug!(file = %path.as_ref().display(), sheets = self.sheets.len(), "saved workbook");
        Ok(())
    }

    pub(crate) fn from_parts(name: &str, is_1904: bool, sheets: Vec<Sheet>, styles: StyleTable) -> Self {
        Workbook {
            name: name.to_owned(),
            is_1904,
            sheets,
            styles,
        }
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.name.as_str()).collect()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|sheet| sheet.name == name)
    }

    /// Returns the named sheet, appending an empty one if it does not exist.
    pub fn add_sheet(&mut self, name: &str) -> &mut Sheet {
        let index = match self.sheets.iter().position(|sheet| sheet.name == name) {
            Some(index) => index,
            None => {
                self.sheets.push(Sheet::new(name));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[index]
    }

    /// A sheet together with the style table, for writes that allocate styles.
    pub(crate) fn sheet_and_styles_mut(&mut self, name: &str) -> Option<(&mut Sheet, &mut StyleTable)> {
        let sheet = self.sheets.iter_mut().find(|sheet| sheet.name == name)?;
        Some((sheet, &mut self.styles))
    }

    /// Sheet by name, or `SheetNotFound` naming this workbook.
    pub fn require_sheet(&self, name: &str) -> Result<&Sheet, SheetTableError> {
        self.sheet(name).ok_or_else(|| self.sheet_not_found(name))
    }

    pub(crate) fn sheet_not_found(&self, name: &str) -> SheetTableError {
        SpreadsheetError::SheetNotFound {
            file: self.name.to_owned(),
            sheet: name.to_owned(),
        }
        .into()
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    pub fn style(&self, id: StyleId) -> &Style {
        self.styles.get(id)
    }

    /// Number of allocated style objects, the default style included.
    pub fn style_count(&self) -> usize {
        self.styles.len()
    }

    /// Allocates a new style object.
    pub fn add_style(&mut self, style: Style) -> Result<StyleId, SheetTableError> {
        self.styles.add(style)
    }

    /// Allocates a fresh copy of a style, typically one owned by another workbook.
    pub fn clone_style(&mut self, style: &Style) -> Result<StyleId, SheetTableError> {
        self.styles.add(style.clone())
    }

    /// Display format of a cell.
    pub fn number_format(&self, cell: &Cell) -> &NumberFormat {
        &self.styles.get(cell.style).number_format
    }
}

/// A cell together with the workbook that owns it: the native cell handle
/// produced by the pass-through table reader.
#[derive(Copy, Clone)]
pub struct CellHandle<'a> {
    workbook: &'a Workbook,
    cell: &'a Cell,
}

impl<'a> CellHandle<'a> {
    pub fn new(workbook: &'a Workbook, cell: &'a Cell) -> Self {
        CellHandle { workbook, cell }
    }

    pub fn workbook(&self) -> &'a Workbook {
        self.workbook
    }

    pub fn cell(&self) -> &'a Cell {
        self.cell
    }

    pub fn style(&self) -> &'a Style {
        self.workbook.style(self.cell.style)
    }

    pub fn number_format(&self) -> &'a NumberFormat {
        self.workbook.number_format(self.cell)
    }
}

impl fmt::Debug for CellHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellHandle")
            .field("workbook", &self.workbook.name)
            .field("cell", self.cell)
            .finish()
    }
}

impl PartialEq for CellHandle<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.workbook, other.workbook) && self.cell == other.cell
    }
}
