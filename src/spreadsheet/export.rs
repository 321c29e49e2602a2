//! XLSX serialisation through `rust_xlsxwriter`.
//!
//! Files are always written in the 1900 date system; numeric cells carrying a
//! date format are rebased when the source workbook counts from 1904.
use crate::error::SheetTableError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::DAYS_1904_OFFSET;
use crate::spreadsheet::format::FIRST_CUSTOM_FORMAT_ID;
use crate::spreadsheet::style::HorizontalAlign;
use crate::spreadsheet::style::Style;
use crate::spreadsheet::style::StyleId;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::Workbook;
use rust_xlsxwriter::ColNum;
use rust_xlsxwriter::Color;
use rust_xlsxwriter::Format;
use rust_xlsxwriter::FormatAlign;
use rust_xlsxwriter::FormatPattern;
use rust_xlsxwriter::Formula;
use rust_xlsxwriter::RowNum;
use rust_xlsxwriter::Worksheet;
use std::collections::HashMap;
use std::path::Path;

/// Writes every sheet of `workbook` to `path`, in sheet order.
///
/// Each style id is translated to a [`Format`] once and shared by all cells
/// carrying it.
pub(super) fn save(workbook: &Workbook, path: &Path) -> Result<(), SheetTableError> {
    let mut output = rust_xlsxwriter::Workbook::new();
    let mut formats = HashMap::<StyleId, Format>::new();
    for sheet in workbook.sheets() {
        let worksheet = output.add_worksheet();
        worksheet.set_name(&sheet.name)?;
        for cell in sheet.cells() {
            let format = formats
                .entry(cell.style)
                .or_insert_with(|| to_format(workbook.style(cell.style)));
            write_cell(worksheet, workbook, cell, format)?;
        }
    }
    output.save(path)?;
    Ok(())
}

/// Grid position in `rust_xlsxwriter` units. Positions that do not fit are
/// cell errors rather than silently wrapped.
fn to_position(cell: &Cell) -> Result<(RowNum, ColNum), SheetTableError> {
    match (RowNum::try_from(cell.row), ColNum::try_from(cell.col)) {
        (Ok(row), Ok(col)) => Ok((row, col)),
        _ => Err(SpreadsheetError::CellValueError {
            position: cell.reference(),
            message: format!("position ({}, {}) is outside the writable grid", cell.row, cell.col),
        }
        .into()),
    }
}

/// Writes one cell by kind. Formulas keep their cached result; blank cells
/// are written only to carry a style.
fn write_cell(worksheet: &mut Worksheet, workbook: &Workbook, cell: &Cell, format: &Format) -> Result<(), SheetTableError> {
    let (row, col) = to_position(cell)?;
    if let Some(formula) = &cell.formula {
        let formula = Formula::new(formula).set_result(cell.to_string());
        worksheet.write_formula_with_format(row, col, formula, format)?;
        return Ok(());
    }
    match cell.kind.effective() {
        CellType::Blank if cell.style != StyleId::default() => {
            worksheet.write_blank(row, col, format)?;
        }
        CellType::Blank => (),
        CellType::Numeric => {
            let mut value = cell.to_double()?;
            if workbook.is_1904 && workbook.number_format(cell).is_date_time() {
                value += DAYS_1904_OFFSET;
            }
            worksheet.write_number_with_format(row, col, value, format)?;
        }
        CellType::Boolean => {
            worksheet.write_boolean_with_format(row, col, cell.value == "1", format)?;
        }
        _ => {
            worksheet.write_string_with_format(row, col, &cell.value, format)?;
        }
    }
    Ok(())
}

/// Translates a style into an XLSX cell format. Builtin number formats keep
/// their index so readers classify them the same way; custom ones are written
/// by code.
fn to_format(style: &Style) -> Format {
    let mut format = Format::new();
    let number_format = &style.number_format;
    if !number_format.is_general() {
        format = match u8::try_from(number_format.id) {
            Ok(id) if number_format.id < FIRST_CUSTOM_FORMAT_ID && id > 0 => format.set_num_format_index(id),
            _ => format.set_num_format(&number_format.code),
        };
    }
    if style.font.bold {
        format = format.set_bold();
    }
    if style.font.italic {
        format = format.set_italic();
    }
    if let Some(size) = style.font.size {
        format = format.set_font_size(size);
    }
    if let Some(name) = &style.font.name {
        format = format.set_font_name(name);
    }
    if let Some(color) = style.font.color {
        format = format.set_font_color(Color::RGB(color));
    }
    if let Some(fill) = style.fill {
        format = format
            .set_pattern(FormatPattern::Solid)
            .set_background_color(Color::RGB(fill));
    }
    if let Some(align) = style.align {
        format = format.set_align(match align {
            HorizontalAlign::Left => FormatAlign::Left,
            HorizontalAlign::Center => FormatAlign::Center,
            HorizontalAlign::Right => FormatAlign::Right,
        });
    }
    format
}
