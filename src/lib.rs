//! # Sheet Tables
//!
//! Locate, validate, read and write rectangular tables embedded in free-form
//! spreadsheet sheets.
//!
//! ## Features
//!
//! - **Table discovery**: find a table by the label of its top-left header cell,
//!   and its width by scanning the header row
//! - **Header validation**: reject tables whose header differs from the expected
//!   labels, optionally tolerating extra trailing columns
//! - **Cell normalization**: blank and empty cells follow a configurable no-data
//!   policy; date-formatted numbers render with a date pattern, other numbers with
//!   their display format
//! - **Eager and streaming reads**: the body ends after a declared row count or at
//!   the first all-empty row
//! - **Style-bounded writes**: one style per table column, however many rows are
//!   written
//! - **XLSX files**: workbooks are loaded and saved as `.xlsx`
//!
//! ## Example
//!
//! ```no_run
//! use sheet_tables::{HeaderSpec, TableGeometry, TableOptions, TableReader};
//!
//! # fn main() -> Result<(), sheet_tables::SheetTableError> {
//! let geometry = TableGeometry::new("Staff", 1)?;
//! let header = HeaderSpec::one_line(["ID", "Name"])?;
//! let reader = TableReader::new(geometry, header, TableOptions::default())?;
//! for row in reader.read_file("staff.xlsx")?.rows() {
//!     println!("{row:?}");
//! }
//! # Ok(())
//! # }
//! ```
mod error;
mod helpers;
pub mod spreadsheet;
pub mod table;

pub use crate::error::SheetTableError;
pub use crate::helpers::xml::XmlError;
pub use crate::spreadsheet::CellHandle;
pub use crate::spreadsheet::SpreadsheetError;
pub use crate::spreadsheet::Workbook;
pub use crate::table::bounds::TableBoundsResolver;
pub use crate::table::header::HeaderValidator;
pub use crate::table::normalizer::CellData;
pub use crate::table::normalizer::CellNormalizer;
pub use crate::table::normalizer::DateTimeFormat;
pub use crate::table::reader::TableReader;
pub use crate::table::reader::TableRows;
pub use crate::table::writer::TableWriter;
pub use crate::table::writer::WritableCell;
pub use crate::table::HeaderSpec;
pub use crate::table::NoDataPolicy;
pub use crate::table::Row;
pub use crate::table::TableData;
pub use crate::table::TableError;
pub use crate::table::TableGeometry;
pub use crate::table::TableOptions;
pub use crate::table::WriterOptions;
