use crate::error::SheetTableError;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::style::StyleId;
use crate::spreadsheet::SpreadsheetError;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use std::fmt::Display;

/// Cached result type of a formula cell.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FormulaResult {
    #[default]
    Blank,
    String,
    Numeric,
    Boolean,
    Error,
}

/// Raw type of a grid cell.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CellType {
    #[default]
    Blank,
    /// Shared, inline or formula-string text
    String,
    /// Plain numbers, and dates stored as serial numbers
    Numeric,
    /// `1` or `0`
    Boolean,
    /// Error literal such as `#DIV/0!`
    Error,
    /// Formula with the type of its last calculated value
    Formula(FormulaResult),
}

impl CellType {
    /// Type used for value handling: formulas are transparent.
    pub fn effective(self) -> CellType {
        match self {
            CellType::Formula(result) => result.into(),
            kind => kind,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Blank => "blank",
            CellType::String => "string",
            CellType::Numeric => "numeric",
            CellType::Boolean => "boolean",
            CellType::Error => "error",
            CellType::Formula(_) => "formula",
        }
    }
}

impl From<FormulaResult> for CellType {
    fn from(result: FormulaResult) -> Self {
        match result {
            FormulaResult::Blank => CellType::Blank,
            FormulaResult::String => CellType::String,
            FormulaResult::Numeric => CellType::Numeric,
            FormulaResult::Boolean => CellType::Boolean,
            FormulaResult::Error => CellType::Error,
        }
    }
}

/// Days between the 1900 and 1904 date systems.
pub(crate) const DAYS_1904_OFFSET: f64 = 1_462.0;

/// Serial of 10000-01-01, the first day past Excel's calendar.
const MAX_DATE_SERIAL: f64 = 2_958_466.0;

/// Converts an Excel serial number to a date-time.
/// Handles the Lotus 1-2-3 leap year bug of the 1900 date system.
///
/// Returns `None` for negative serials and for serials past 9999-12-31.
pub fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..MAX_DATE_SERIAL).contains(&serial) {
        return None;
    }
    let mut days = serial.trunc() as i64;
    let mut milliseconds = (serial.fract() * 86_400_000f64).round() as i64;
    if milliseconds >= 86_400_000 {
        days += 1;
        milliseconds -= 86_400_000;
    }
    let offset = if is_1904 {
        DAYS_1904_OFFSET as i64
    } else if days < 60 {
        1
    } else {
        0
    };
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let elapsed = Duration::try_days(days.checked_add(offset)?)?
        .checked_add(&Duration::try_milliseconds(milliseconds)?)?;
    epoch.checked_add_signed(elapsed)
}

/// A single grid cell: position, raw type, raw value and style.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cell {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
    pub kind: CellType,
    /// Raw value text: the string itself, the numeric literal, `1`/`0` for booleans
    pub value: String,
    /// Formula text without the leading `=`
    pub formula: Option<String>,
    pub style: StyleId,
}

impl Cell {
    pub fn new(row: usize, col: usize) -> Self {
        Cell {
            row,
            col,
            ..Default::default()
        }
    }

    /// Excel-style reference, e.g. `B3`.
    pub fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    pub fn is_blank(&self) -> bool {
        self.kind.effective() == CellType::Blank
    }

    pub fn to_double(&self) -> Result<f64, SheetTableError> {
        self.value.trim().parse::<f64>().map_err(|_| {
            SpreadsheetError::CellValueError {
                position: self.reference(),
                message: format!("'{}' is not a number", self.value),
            }
            .into()
        })
    }

    /// Date-time value of a numeric cell.
    pub fn to_datetime(&self, is_1904: bool) -> Result<NaiveDateTime, SheetTableError> {
        let serial = self.to_double()?;
        serial_to_datetime(serial, is_1904).ok_or_else(|| {
            SpreadsheetError::CellValueError {
                position: self.reference(),
                message: format!("'{}' is not a valid date serial", self.value),
            }
            .into()
        })
    }

    /// Replaces the content, dropping any formula. The style is kept.
    pub(crate) fn set_content(&mut self, kind: CellType, value: &str) {
        self.kind = kind.effective();
        self.value.clear();
        self.value.push_str(value);
        self.formula = None;
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind.effective() {
            CellType::Boolean => write!(f, "{}", if self.value == "1" { "TRUE" } else { "FALSE" }),
            _ => write!(f, "{}", self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn numeric(value: &str) -> Cell {
        Cell {
            kind: CellType::Numeric,
            value: value.to_owned(),
            ..Cell::new(0, 0)
        }
    }

    #[test]
    fn converts_serials_in_both_date_systems() {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(serial_to_datetime(36548.0, false), Some(date(2000, 1, 23)));
        assert_eq!(serial_to_datetime(1.0, false), Some(date(1900, 1, 1)));
        assert_eq!(serial_to_datetime(61.0, false), Some(date(1900, 3, 1)));
        assert_eq!(serial_to_datetime(36548.0 - 1462.0, true), Some(date(2000, 1, 23)));
        assert_eq!(serial_to_datetime(-1.0, false), None);
    }

    #[test]
    fn rejects_serials_past_the_calendar() {
        let last = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(serial_to_datetime(2_958_465.0, false), Some(last));
        assert_eq!(serial_to_datetime(2_958_466.0, false), None);
        assert_eq!(serial_to_datetime(1e15, false), None);
        assert_eq!(serial_to_datetime(1e300, true), None);
        assert_eq!(serial_to_datetime(f64::INFINITY, false), None);

        let error = numeric("1e15").to_datetime(false).unwrap_err();
        assert!(matches!(
            error,
            SheetTableError::SpreadsheetError(SpreadsheetError::CellValueError { ref position, .. }) if position == "A1"
        ));
    }

    #[test]
    fn converts_time_fraction() {
        let datetime = numeric("45352.75").to_datetime(false).unwrap();
        assert_eq!(datetime.date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(datetime.time(), NaiveTime::from_hms_opt(18, 0, 0).unwrap());
    }

    #[test]
    fn rejects_non_numeric_values() {
        let error = numeric("abc").to_datetime(false).unwrap_err();
        assert!(error.to_string().contains("A1"));
    }

    #[test]
    fn formulas_are_transparent() {
        assert_eq!(CellType::Formula(FormulaResult::Numeric).effective(), CellType::Numeric);
        assert_eq!(CellType::String.effective(), CellType::String);

        let mut cell = Cell {
            kind: CellType::Formula(FormulaResult::String),
            value: "x".to_owned(),
            formula: Some("A1&\"\"".to_owned()),
            style: StyleId(3),
            ..Cell::new(1, 1)
        };
        cell.set_content(cell.kind, "y");
        assert_eq!(cell.kind, CellType::String);
        assert_eq!(cell.formula, None);
        assert_eq!(cell.style, StyleId(3));
        assert_eq!(cell.to_string(), "y");
    }
}
