//! Conversion of raw grid cells into table values.
use crate::error::SheetTableError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::CellHandle;
use crate::spreadsheet::Workbook;
use crate::table::NoDataPolicy;
use crate::table::TableError;
use crate::table::TableOptions;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use tracing::warn;

/// Date/time patterns for date-formatted numeric cells: one default plus
/// per-column overrides, keyed by 0-based table column.
///
/// Patterns use spreadsheet-style tokens (`yyyy-MM-dd HH:mm:ss`, `'literal'`).
#[derive(Clone, Debug, PartialEq)]
pub struct DateTimeFormat {
    pattern: String,
    columns: HashMap<usize, String>,
    // chrono renderings of the patterns above
    compiled: String,
    compiled_columns: HashMap<usize, String>,
}

impl DateTimeFormat {
    pub const DEFAULT_PATTERN: &'static str = "yyyy-MM-dd";

    pub fn new(pattern: &str) -> Self {
        DateTimeFormat {
            pattern: pattern.to_owned(),
            columns: HashMap::new(),
            compiled: to_chrono_pattern(pattern),
            compiled_columns: HashMap::new(),
        }
    }

    pub fn with_column(mut self, column: usize, pattern: &str) -> Self {
        self.columns.insert(column, pattern.to_owned());
        self.compiled_columns.insert(column, to_chrono_pattern(pattern));
        self
    }

    /// Pattern in effect for a table column.
    pub fn pattern(&self, column: usize) -> &str {
        self.columns.get(&column).unwrap_or(&self.pattern)
    }

    pub fn format(&self, column: usize, datetime: &NaiveDateTime) -> String {
        let pattern = self.compiled_columns.get(&column).unwrap_or(&self.compiled);
        datetime.format(pattern).to_string()
    }
}

impl Default for DateTimeFormat {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATTERN)
    }
}

/// Translates a spreadsheet-style date pattern into a `chrono` format string.
fn to_chrono_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut output = String::with_capacity(pattern.len() * 2);
    let mut index = 0usize;
    while index < chars.len() {
        let letter = chars[index];
        let mut run = 1usize;
        while index + run < chars.len() && chars[index + run] == letter {
            run += 1;
        }

        if letter == '\'' {
            if run >= 2 {
                // '' is an escaped quote
                output.push_str(&"'".repeat(run / 2));
                index += run / 2 * 2;
                continue;
            }
            index += 1;
            while index < chars.len() {
                if chars[index] == '\'' {
                    if chars.get(index + 1) != Some(&'\'') {
                        break;
                    }
                    output.push('\'');
                    index += 2;
                    continue;
                }
                push_literal(&mut output, chars[index]);
                index += 1;
            }
            index += 1;
            continue;
        }

        let token = match (letter, run) {
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1) => "%-d",
            ('d', _) => "%d",
            ('H', 1) => "%-H",
            ('H', _) => "%H",
            ('h', 1) => "%-I",
            ('h', _) => "%I",
            ('m', 1) => "%-M",
            ('m', _) => "%M",
            ('s', 1) => "%-S",
            ('s', _) => "%S",
            ('S', _) => "%3f",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('a', _) => "%p",
            _ => {
                for _ in 0..run {
                    push_literal(&mut output, letter);
                }
                index += run;
                continue;
            }
        };
        output.push_str(token);
        index += run;
    }
    output
}

fn push_literal(output: &mut String, character: char) {
    if character == '%' {
        output.push_str("%%");
    } else {
        output.push(character);
    }
}

/// Turns one grid cell into a string under a no-data policy and date pattern.
#[derive(Clone, Debug, Default)]
pub struct CellNormalizer {
    no_data: NoDataPolicy,
    date_time_format: DateTimeFormat,
}

impl CellNormalizer {
    pub fn new(no_data: NoDataPolicy, date_time_format: DateTimeFormat) -> Self {
        CellNormalizer {
            no_data,
            date_time_format,
        }
    }

    pub fn from_options(options: &TableOptions) -> Self {
        Self::new(options.no_data, options.date_time_format.clone())
    }

    pub fn no_data(&self) -> NoDataPolicy {
        self.no_data
    }

    /// String value of a cell; `column` is the 0-based table column, used to pick the
    /// date pattern.
    ///
    /// Blank cells and empty strings yield the no-data sentinel. Date-formatted
    /// numbers are rendered with the date pattern, other numbers with the cell's
    /// own display format. Boolean and error cells are rejected.
    pub fn normalize_string(
        &self,
        workbook: &Workbook,
        cell: Option<&Cell>,
        column: usize,
    ) -> Result<Option<String>, SheetTableError> {
        self.render(workbook, cell, column, true)
    }

    /// A cell is empty when absent or when its string form is absent or empty.
    /// Cells that cannot be rendered as strings count as data.
    ///
    /// Emits no data-quality warnings: scans look at the same cells the reads do.
    pub fn is_empty_cell(&self, workbook: &Workbook, cell: Option<&Cell>, column: usize) -> bool {
        match self.render(workbook, cell, column, false) {
            Ok(value) => value.map(|value| value.is_empty()).unwrap_or(true),
            Err(_) => false,
        }
    }

    fn render(
        &self,
        workbook: &Workbook,
        cell: Option<&Cell>,
        column: usize,
        reports_precision: bool,
    ) -> Result<Option<String>, SheetTableError> {
        let cell = match cell {
            Some(cell) => cell,
            None => return Ok(self.no_data.sentinel()),
        };
        match cell.kind.effective() {
            CellType::Blank => Ok(self.no_data.sentinel()),
            CellType::String if cell.value.is_empty() => Ok(self.no_data.sentinel()),
            CellType::String => Ok(Some(cell.value.to_owned())),
            CellType::Numeric => {
                let number_format = workbook.number_format(cell);
                if number_format.is_date_time() {
                    let datetime = cell.to_datetime(workbook.is_1904)?;
                    Ok(Some(self.date_time_format.format(column, &datetime)))
                } else {
                    let value = cell.to_double()?;
                    let displayed = number_format.format(value);
                    if reports_precision {
                        check_precision(cell, &displayed, value);
                    }
                    Ok(Some(displayed))
                }
            }
            kind => Err(TableError::UnknownCellType {
                position: cell.reference(),
                kind: kind.as_str(),
            })?,
        }
    }
}

/// Displayed numbers that differ from the stored value beyond trailing zero
/// padding (`1.50` for `1.5`, `3.0` for `3`) are a data-quality signal,
/// never an error.
fn check_precision(cell: &Cell, displayed: &str, value: f64) {
    let full = value.to_string();
    if trim_zero_fraction(displayed) != trim_zero_fraction(&full) {
        warn!(
            position = %cell.reference(),
            displayed,
            value = %full,
            "displayed number differs from the stored value"
        );
    }
}

fn trim_zero_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// Value types a table can be read into.
pub trait CellData<'a>: Sized {
    fn normalize(
        normalizer: &CellNormalizer,
        workbook: &'a Workbook,
        cell: Option<&'a Cell>,
        column: usize,
    ) -> Result<Option<Self>, SheetTableError>;

    /// Whether a normalized value counts as no data when looking for the empty
    /// row that ends a table.
    fn is_empty(normalizer: &CellNormalizer, value: Option<&Self>, column: usize) -> bool;
}

impl<'a> CellData<'a> for String {
    fn normalize(
        normalizer: &CellNormalizer,
        workbook: &'a Workbook,
        cell: Option<&'a Cell>,
        column: usize,
    ) -> Result<Option<Self>, SheetTableError> {
        normalizer.normalize_string(workbook, cell, column)
    }

    fn is_empty(_: &CellNormalizer, value: Option<&Self>, _: usize) -> bool {
        value.map(String::is_empty).unwrap_or(true)
    }
}

/// Pass-through values: the cell itself, whatever its type.
impl<'a> CellData<'a> for CellHandle<'a> {
    fn normalize(
        _: &CellNormalizer,
        workbook: &'a Workbook,
        cell: Option<&'a Cell>,
        _: usize,
    ) -> Result<Option<Self>, SheetTableError> {
        Ok(cell.map(|cell| CellHandle::new(workbook, cell)))
    }

    fn is_empty(normalizer: &CellNormalizer, value: Option<&Self>, column: usize) -> bool {
        match value {
            None => true,
            Some(handle) => normalizer.is_empty_cell(handle.workbook(), Some(handle.cell()), column),
        }
    }
}
