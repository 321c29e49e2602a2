//! Office Open XML spreadsheet loader.
//!
//! An XLSX file is a ZIP package of XML parts. The loader reads, in order,
//! `xl/workbook.xml` (sheet list and date system), `xl/sharedStrings.xml`,
//! `xl/styles.xml` and every worksheet part. The shared strings and styles
//! parts are optional.
use crate::error::ResultMessage;
use crate::error::SheetTableError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::FormulaResult;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::format::NumberFormat;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::row_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::style::parse_rgb;
use crate::spreadsheet::style::Font;
use crate::spreadsheet::style::HorizontalAlign;
use crate::spreadsheet::style::Style;
use crate::spreadsheet::style::StyleId;
use crate::spreadsheet::style::StyleTable;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::Workbook;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::ZipArchive;

// Workbook and shared strings
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");
const TAG_TEXT: QName = QName(b"t");

// Styles
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_FONTS: QName = QName(b"fonts");
const TAG_FONT: QName = QName(b"font");
const TAG_BOLD: QName = QName(b"b");
const TAG_ITALIC: QName = QName(b"i");
const TAG_FONT_SIZE: QName = QName(b"sz");
const TAG_FONT_NAME: QName = QName(b"name");
const TAG_COLOR: QName = QName(b"color");
const TAG_FILLS: QName = QName(b"fills");
const TAG_FILL: QName = QName(b"fill");
const TAG_PATTERN_FILL: QName = QName(b"patternFill");
const TAG_FOREGROUND_COLOR: QName = QName(b"fgColor");
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");
const TAG_FORMAT_INDEX: QName = QName(b"xf");
const TAG_ALIGNMENT: QName = QName(b"alignment");

// Worksheets
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_FORMULA: QName = QName(b"f");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

/// Loads a whole XLSX workbook into memory.
pub(super) fn load(file_name: &str) -> Result<Workbook, SheetTableError> {
    let file = File::open(file_name)
        .map_err(SheetTableError::from)
        .with_prefix(file_name)?;
    let mut zip = ZipArchive::new(BufReader::new(file))?;
    load_archive(file_name, &mut zip)
}

/// Loads a workbook from an opened package; `file_name` is kept as the
/// workbook name for error messages.
pub(super) fn load_archive<RS: Read + Seek>(
    file_name: &str,
    zip: &mut ZipArchive<RS>,
) -> Result<Workbook, SheetTableError> {
    let (sheet_paths, is_1904) = load_workbook(zip)?;
    let shared_strings = load_shared_strings(zip)?;
    let styles = load_styles(zip)?;

    let mut sheets = Vec::with_capacity(sheet_paths.len());
    for (sheet_name, zip_path) in &sheet_paths {
        let sheet = load_sheet(zip, sheet_name, zip_path, &shared_strings).with_prefix(sheet_name)?;
        sheets.push(sheet);
    }
    Ok(Workbook::from_parts(file_name, is_1904, sheets, styles))
}

/// Worksheet names with their part paths, and the date system flag.
fn load_workbook<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<(Vec<(String, String)>, bool), SheetTableError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip
        .xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Shared string table, indexed by the `v` of `t="s"` cells. Rich text runs
/// are flattened to their text.
fn load_shared_strings<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<String>, SheetTableError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Builds the style table from `cellXfs`, resolving number formats, fonts and fills.
fn load_styles<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<StyleTable, SheetTableError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(StyleTable::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<u32, String>::new();

    let mut fonts_context = false;
    let mut fonts = Vec::<Font>::new();
    let mut font = Font::default();

    let mut fills_context = false;
    let mut fills = Vec::<Option<u32>>::new();
    let mut fill = None::<u32>;
    let mut solid_fill = false;

    let mut format_indexes_context = false;
    let mut styles = Vec::<Style>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.parse_attribute_value::<u32>("numFmtId")?;
            let code = event.get_attribute_value("formatCode")?;
            if let Some((id, code)) = id.zip(code) {
                custom_formats.insert(id, code.to_string());
            }
        }

        Event::Start(event) if event.name() == TAG_FONTS => fonts_context = true,
        Event::End(event) if event.name() == TAG_FONTS => fonts_context = false,
        Event::Start(event) if fonts_context && event.name() == TAG_FONT => font = Font::default(),
        Event::End(event) if fonts_context && event.name() == TAG_FONT => fonts.push(std::mem::take(&mut font)),
        Event::Start(event) if fonts_context && event.name() == TAG_BOLD => {
            font.bold = is_enabled(event.get_attribute_value("val")?);
        }
        Event::Start(event) if fonts_context && event.name() == TAG_ITALIC => {
            font.italic = is_enabled(event.get_attribute_value("val")?);
        }
        Event::Start(event) if fonts_context && event.name() == TAG_FONT_SIZE => {
            font.size = event.parse_attribute_value::<f64>("val")?;
        }
        Event::Start(event) if fonts_context && event.name() == TAG_FONT_NAME => {
            font.name = event.get_attribute_value("val")?.map(|name| name.to_string());
        }
        Event::Start(event) if fonts_context && event.name() == TAG_COLOR => {
            font.color = event.get_attribute_value("rgb")?.and_then(|rgb| parse_rgb(&rgb));
        }

        Event::Start(event) if event.name() == TAG_FILLS => fills_context = true,
        Event::End(event) if event.name() == TAG_FILLS => fills_context = false,
        Event::Start(event) if fills_context && event.name() == TAG_FILL => fill = None,
        Event::End(event) if fills_context && event.name() == TAG_FILL => fills.push(fill.take()),
        Event::Start(event) if fills_context && event.name() == TAG_PATTERN_FILL => {
            solid_fill = event.get_attribute_value("patternType")?.map(|kind| kind == "solid").unwrap_or(false);
        }
        Event::Start(event) if fills_context && solid_fill && event.name() == TAG_FOREGROUND_COLOR => {
            fill = event.get_attribute_value("rgb")?.and_then(|rgb| parse_rgb(&rgb));
        }

        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let format_id = event.parse_attribute_value::<u32>("numFmtId")?.unwrap_or(0);
            let number_format = match custom_formats.get(&format_id) {
                Some(code) => NumberFormat::custom(format_id, code),
                None => NumberFormat::builtin(format_id),
            };
            let font_id = event.parse_attribute_value::<usize>("fontId")?.unwrap_or(0);
            let fill_id = event.parse_attribute_value::<usize>("fillId")?.unwrap_or(0);
            styles.push(Style {
                number_format,
                font: fonts.get(font_id).cloned().unwrap_or_default(),
                fill: fills.get(fill_id).copied().flatten(),
                align: None,
            });
        }
        Event::Start(event) if format_indexes_context && event.name() == TAG_ALIGNMENT => {
            if let Some(style) = styles.last_mut() {
                style.align = event.get_attribute_value("horizontal")?.and_then(|value| HorizontalAlign::parse(&value));
            }
        }
    });

    Ok(StyleTable::from_styles(styles))
}

/// Boolean style flags such as `<b/>` are on unless `val` says otherwise.
fn is_enabled(value: Option<Cow<str>>) -> bool {
    value.map(|value| value != "0" && value != "false").unwrap_or(true)
}

/// Reads every cell of one worksheet part, styled blanks included.
fn load_sheet<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    sheet_name: &str,
    zip_path: &str,
    shared_strings: &[String],
) -> Result<Sheet, SheetTableError> {
    let mut sheet = Sheet::new(sheet_name);
    let mut reader = zip
        .xml_reader(zip_path)?
        .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_string()))?;

    let mut row_count = 0usize;
    let mut col_count = 0usize;
    let mut cell = Cell::default();
    let mut kind = String::new();
    let mut value = None::<String>;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_ROW => {
            if let Some(row) = event.get_attribute_value("r")?.and_then(|row| row_to_index(&row)) {
                row_count = row;
            }
            col_count = 0;
        }
        Event::End(event) if event.name() == TAG_ROW => row_count += 1,
        Event::Start(event) if event.name() == TAG_CELL => {
            let (row, col) = event.get_attribute_value("r")?
                .and_then(|reference| reference_to_index(&reference))
                .unwrap_or((row_count, col_count));
            col_count = col + 1;
            cell = Cell::new(row, col);
            cell.style = StyleId(event.parse_attribute_value::<usize>("s")?.unwrap_or(0));
            kind = event.get_attribute_value("t")?.map(|t| t.to_string()).unwrap_or_default();
            value = None;
        }
        Event::Start(event) if event.name() == TAG_FORMULA => {
            let formula = read_string_value(&mut reader, TAG_FORMULA, true)?;
            cell.formula = Some(formula).filter(|formula| !formula.is_empty());
        }
        Event::Start(event) if event.name() == TAG_INLINE_STRING => {
            value = Some(read_string_value(&mut reader, TAG_INLINE_STRING, false)?);
        }
        Event::Start(event) if event.name() == TAG_VALUE => {
            value = Some(read_string_value(&mut reader, TAG_VALUE, true)?);
        }
        Event::End(event) if event.name() == TAG_CELL => {
            let mut current = std::mem::take(&mut cell);
            let result = match value.take() {
                None => FormulaResult::Blank,
                Some(text) => {
                    let (result, text) = match kind.as_str() {
                        "s" => {
                            let index = text.trim().parse::<usize>()?;
                            let string = shared_strings.get(index).ok_or_else(|| SpreadsheetError::CellValueError {
                                position: current.reference(),
                                message: format!("shared string {index} does not exist"),
                            })?;
                            (FormulaResult::String, string.to_owned())
                        }
                        "inlineStr" | "str" | "d" => (FormulaResult::String, text),
                        "b" => (FormulaResult::Boolean, text),
                        "e" => (FormulaResult::Error, text),
                        _ => (FormulaResult::Numeric, text),
                    };
                    current.value = text;
                    result
                }
            };
            current.kind = if current.formula.is_some() {
                CellType::Formula(result)
            } else {
                result.into()
            };
            sheet.insert(current);
        }
    });
    Ok(sheet)
}

/// Reads text content up to `end_tag`, skipping phonetic annotations.
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, SheetTableError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;

    const WORKBOOK: &str = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<workbookPr date1904="1"/>
<sheets><sheet name="Data" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;

    const SHARED_STRINGS: &str = r#"<sst><si><t>ID</t></si><si><r><t>Na</t></r><r><t>me</t></r><rPh><t>ネーム</t></rPh></si></sst>"#;

    const STYLES: &str = r#"<styleSheet>
<numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd"/></numFmts>
<fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><color rgb="FFFF0000"/><sz val="12"/></font></fonts>
<fills count="3"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill><fill><patternFill patternType="solid"><fgColor rgb="FFFFFF00"/></patternFill></fill></fills>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0"/></cellStyleXfs>
<cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0"/><xf numFmtId="164" fontId="1" fillId="2"><alignment horizontal="center"/></xf><xf numFmtId="14"/></cellXfs>
</styleSheet>"#;

    const SHEET: &str = r#"<worksheet><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
<row r="2"><c r="A2"><v>1</v></c><c r="B2" t="inlineStr"><is><t>a &amp; b</t></is></c><c r="C2" s="1"/></row>
<row r="4"><c r="A4" s="2"><f>A2+1</f><v>2</v></c><c r="B4" t="b"><v>1</v></c><c r="C4" t="e"><v>#N/A</v></c></row>
</sheetData></worksheet>"#;

    fn package(parts: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        ZipArchive::new(writer.finish().unwrap()).unwrap()
    }

    fn sample() -> Workbook {
        let mut zip = package(&[
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/sharedStrings.xml", SHARED_STRINGS),
            ("xl/styles.xml", STYLES),
            ("xl/worksheets/sheet1.xml", SHEET),
        ]);
        load_archive("sample.xlsx", &mut zip).unwrap()
    }

    #[test]
    fn loads_workbook_structure() {
        let workbook = sample();
        assert_eq!(workbook.name, "sample.xlsx");
        assert!(workbook.is_1904);
        assert_eq!(workbook.sheet_names(), vec!["Data"]);
        assert_eq!(workbook.style_count(), 3);
    }

    #[test]
    fn loads_cell_values() {
        let workbook = sample();
        let sheet = workbook.sheet("Data").unwrap();
        let value = |row, col| sheet.get(row, col).map(|cell| (cell.kind, cell.value.as_str()));

        assert_eq!(value(0, 0), Some((CellType::String, "ID")));
        assert_eq!(value(0, 1), Some((CellType::String, "Name")));
        assert_eq!(value(1, 0), Some((CellType::Numeric, "1")));
        assert_eq!(value(1, 1), Some((CellType::String, "a & b")));
        assert_eq!(value(1, 2), Some((CellType::Blank, "")));
        assert_eq!(value(2, 0), None);
        assert_eq!(value(3, 0), Some((CellType::Formula(FormulaResult::Numeric), "2")));
        assert_eq!(value(3, 1), Some((CellType::Boolean, "1")));
        assert_eq!(value(3, 2), Some((CellType::Error, "#N/A")));
        assert_eq!(sheet.get(3, 0).and_then(|cell| cell.formula.as_deref()), Some("A2+1"));
    }

    #[test]
    fn loads_cell_styles() {
        let workbook = sample();
        let sheet = workbook.sheet("Data").unwrap();

        let styled_blank = sheet.get(1, 2).unwrap();
        let style = workbook.style(styled_blank.style);
        assert_eq!(style.number_format, NumberFormat::custom(164, "yyyy-mm-dd"));
        assert!(style.font.bold);
        assert_eq!(style.font.color, Some(0xFF0000));
        assert_eq!(style.font.size, Some(12.0));
        assert_eq!(style.fill, Some(0xFFFF00));
        assert_eq!(style.align, Some(HorizontalAlign::Center));

        let formula = sheet.get(3, 0).unwrap();
        assert!(workbook.number_format(formula).is_date_time());
        assert!(workbook.style(StyleId(0)).fill.is_none());
    }

    #[test]
    fn reports_missing_parts() {
        let mut zip = package(&[("xl/_rels/workbook.xml.rels", RELS)]);
        let error = load_archive("broken.xlsx", &mut zip).unwrap_err();
        assert!(error.to_string().contains("xl/workbook.xml"));
    }
}
