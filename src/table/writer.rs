//! Writing tables into template or fresh workbooks.
//!
//! XLSX caps the number of cell formats in a file, so styles are resolved once
//! per table column and shared by every row written to it.
use crate::error::SheetTableError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::DAYS_1904_OFFSET;
use crate::spreadsheet::reference::MAX_COLUMNS;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::style::Style;
use crate::spreadsheet::style::StyleId;
use crate::spreadsheet::style::StyleTable;
use crate::spreadsheet::CellHandle;
use crate::spreadsheet::Workbook;
use crate::table::bounds::TableBoundsResolver;
use crate::table::header::HeaderValidator;
use crate::table::normalizer::CellNormalizer;
use crate::table::HeaderSpec;
use crate::table::Row;
use crate::table::TableError;
use crate::table::TableGeometry;
use crate::table::WriterOptions;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Values a table can be written from.
pub trait WritableCell {
    /// Copies the value, never a formula, into the destination cell.
    fn write_value(&self, destination: &mut Cell, destination_is_1904: bool) -> Result<(), SheetTableError>;

    /// Style to carry over to the destination column, if any.
    fn source_style(&self) -> Option<&Style>;
}

impl WritableCell for String {
    fn write_value(&self, destination: &mut Cell, _: bool) -> Result<(), SheetTableError> {
        destination.set_content(CellType::String, self);
        Ok(())
    }

    fn source_style(&self) -> Option<&Style> {
        None
    }
}

impl WritableCell for CellHandle<'_> {
    fn write_value(&self, destination: &mut Cell, destination_is_1904: bool) -> Result<(), SheetTableError> {
        let source = self.cell();
        let kind = source.kind.effective();
        let source_is_1904 = self.workbook().is_1904;
        if kind == CellType::Numeric && source_is_1904 != destination_is_1904 && self.number_format().is_date_time() {
            let offset = if source_is_1904 { DAYS_1904_OFFSET } else { -DAYS_1904_OFFSET };
            let serial = source.to_double()? + offset;
            destination.set_content(kind, &serial.to_string());
        } else {
            destination.set_content(kind, &source.value);
        }
        Ok(())
    }

    fn source_style(&self) -> Option<&Style> {
        Some(self.style()).filter(|style| !style.is_default())
    }
}

/// Style handles per 0-based table column, for one write.
struct StyleCache<'o> {
    overrides: &'o HashMap<usize, StyleId>,
    columns: HashMap<usize, StyleId>,
}

impl<'o> StyleCache<'o> {
    fn new(overrides: &'o HashMap<usize, StyleId>) -> Self {
        StyleCache {
            overrides,
            columns: HashMap::new(),
        }
    }

    /// Style for a column: decided by its first styled write, then reused.
    /// `None` keeps whatever style the destination cell already has.
    fn resolve(
        &mut self,
        style_table: &mut StyleTable,
        column: usize,
        source: Option<&Style>,
    ) -> Result<Option<StyleId>, SheetTableError> {
        if let Some(style) = self.columns.get(&column) {
            return Ok(Some(*style));
        }
        let style = match (self.overrides.get(&column), source) {
            (Some(style), _) => *style,
            (None, Some(source)) => style_table.add(source.clone())?,
            (None, None) => return Ok(None),
        };
        self.columns.insert(column, style);
        Ok(Some(style))
    }
}

#[derive(Clone, Debug)]
pub struct TableWriter {
    geometry: TableGeometry,
    header: HeaderSpec,
    options: WriterOptions,
}

impl TableWriter {
    pub fn new(geometry: TableGeometry, header: HeaderSpec, options: WriterOptions) -> Result<Self, SheetTableError> {
        header.validate(&geometry)?;
        Ok(TableWriter {
            geometry,
            header,
            options,
        })
    }

    /// Writes body rows into an existing table of a template workbook, after
    /// checking that the table's header has the expected shape.
    pub fn write_into<C: WritableCell>(&self, workbook: &mut Workbook, rows: &[Row<C>]) -> Result<(), SheetTableError> {
        let sheet_name = self.geometry.sheet_name();
        let sheet = workbook
            .sheet(sheet_name)
            .ok_or_else(|| workbook.sheet_not_found(sheet_name))?;
        let row = self.check_header(workbook, sheet)?;
        self.write_rows(workbook, row + self.header.number_of_header_lines(), rows)
    }

    /// Writes the header labels and body rows into a fresh workbook. The table
    /// starts at row 1 unless the geometry says otherwise.
    pub fn write_new<C: WritableCell>(&self, rows: &[Row<C>]) -> Result<Workbook, SheetTableError> {
        let mut workbook = Workbook::new();
        let row = self.geometry.start_row().unwrap_or(1) - 1;
        let col = self.geometry.start_column() - 1;
        let sheet = workbook.add_sheet(self.geometry.sheet_name());
        for (column, label) in self.header.labels().iter().enumerate() {
            sheet.set_string(row, col + column, label);
        }
        self.write_rows(&mut workbook, row + self.header.number_of_header_lines(), rows)?;
        Ok(workbook)
    }

    /// Fills a copy of `template` (or a fresh workbook) and saves it to `destination`.
    pub fn write_file<C: WritableCell, P: AsRef<Path>>(
        &self,
        template: Option<&Path>,
        destination: P,
        rows: &[Row<C>],
    ) -> Result<(), SheetTableError> {
        let workbook = match template {
            Some(template) => {
                let mut workbook = Workbook::open(template)?;
                self.write_into(&mut workbook, rows)?;
                workbook
            }
            None => self.write_new(rows)?,
        };
        workbook.save(destination)
    }

    /// Resolves the table's first row and validates its current header.
    fn check_header(&self, workbook: &Workbook, sheet: &Sheet) -> Result<usize, SheetTableError> {
        let normalizer = CellNormalizer::from_options(&self.options.table);
        let resolver = TableBoundsResolver::new(workbook, sheet, &normalizer);
        let row = resolver.resolve_start_row(&self.geometry, &self.header)?;
        if self.header.number_of_header_lines() > 0 {
            let col = self.geometry.start_column() - 1;
            let width = resolver.resolve_column_count(&self.geometry, row, col, true)?;
            let header_row = (0..width)
                .map(|column| normalizer.normalize_string(workbook, sheet.get(row, col + column), column))
                .collect::<Result<Row<String>, _>>()?;
            HeaderValidator::new(&sheet.name, &self.header, self.options.table.ignores_additional_columns)
                .validate(&[header_row])?;
        }
        Ok(row)
    }

    /// Columns a body row may fill: the declared count, else the header labels,
    /// else whatever remains of the sheet right of the start column.
    fn table_width(&self, col: usize) -> usize {
        match (self.geometry.column_count(), &self.header) {
            (Some(column_count), _) => column_count,
            (None, HeaderSpec::OneLine(labels)) => labels.len(),
            (None, HeaderSpec::FreeForm) => MAX_COLUMNS.saturating_sub(col),
        }
    }

    fn write_rows<C: WritableCell>(&self, workbook: &mut Workbook, body_row: usize, rows: &[Row<C>]) -> Result<(), SheetTableError> {
        let sheet_name = self.geometry.sheet_name();
        if let Some(limit) = self.geometry.row_count() {
            if rows.len() > limit {
                Err(TableError::RowCountExceeded {
                    sheet: sheet_name.to_owned(),
                    rows: rows.len(),
                    limit,
                })?;
            }
        }

        let col = self.geometry.start_column() - 1;
        let width = self.table_width(col);
        if let Some((row, values)) = rows.iter().enumerate().find(|(_, values)| values.len() > width) {
            Err(TableError::RowWidthExceeded {
                sheet: sheet_name.to_owned(),
                row,
                columns: values.len(),
                limit: width,
            })?;
        }

        let is_1904 = workbook.is_1904;
        let styles_before = workbook.style_count();
        let Some((sheet, style_table)) = workbook.sheet_and_styles_mut(sheet_name) else {
            return Err(workbook.sheet_not_found(sheet_name));
        };
        let mut styles = StyleCache::new(&self.options.column_styles);
        for (offset, row) in rows.iter().enumerate() {
            for (column, value) in row.iter().enumerate() {
                let style = styles.resolve(style_table, column, value.as_ref().and_then(WritableCell::source_style))?;
                let (grid_row, grid_col) = (body_row + offset, col + column);
                let target = match (value, style) {
                    (None, None) => {
                        if let Some(cell) = sheet.get_mut(grid_row, grid_col) {
                            cell.set_content(CellType::Blank, "");
                        }
                        continue;
                    }
                    _ => sheet.create_cell(grid_row, grid_col),
                };
                match value {
                    Some(value) => value.write_value(target, is_1904)?,
                    None => target.set_content(CellType::Blank, ""),
                }
                if let Some(style) = style {
                    target.style = style;
                }
            }
        }
        debug!(
            sheet = sheet_name,
            rows = rows.len(),
            styles = workbook.style_count() - styles_before,
            "wrote table"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::FormulaResult;
    use crate::spreadsheet::format::NumberFormat;
    use crate::spreadsheet::SpreadsheetError;
    use crate::table::reader::TableReader;
    use crate::table::TableData;
    use crate::table::TableOptions;

    fn strings(values: &[Option<&str>]) -> Row<String> {
        values.iter().map(|value| value.map(str::to_owned)).collect()
    }

    fn template(labels: &[&str]) -> Workbook {
        let mut workbook = Workbook::new();
        workbook.name = "template.xlsx".to_owned();
        let sheet = workbook.add_sheet("Data");
        sheet.set_string(0, 0, "Report");
        for (column, label) in labels.iter().enumerate() {
            sheet.set_string(2, column, label);
        }
        workbook
    }

    #[test]
    fn round_trips_through_a_file() -> Result<(), SheetTableError> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("people.xlsx");
        let geometry = TableGeometry::anchored("People", "B2")?;
        let header = HeaderSpec::one_line(["ID", "Name", "City"])?;
        let rows = vec![
            strings(&[Some("1"), Some("Ann"), Some("Oslo")]),
            strings(&[Some("2"), None, Some("Rome")]),
            strings(&[Some("3"), Some("Cid"), None]),
        ];

        let writer = TableWriter::new(geometry.clone(), header.clone(), WriterOptions::default())?;
        writer.write_file(None, &path, &rows)?;

        let reader = TableReader::new(geometry, header, TableOptions::default())?;
        let data = reader.read_file(&path)?;
        assert_eq!(data.header_rows(), &[strings(&[Some("ID"), Some("Name"), Some("City")])]);
        assert_eq!(data.into_rows(), rows);
        Ok(())
    }

    #[test]
    fn fills_a_template_file() -> Result<(), SheetTableError> {
        let directory = tempfile::tempdir()?;
        let template_path = directory.path().join("template.xlsx");
        let output_path = directory.path().join("output.xlsx");
        template(&["ID", "Name"]).save(&template_path)?;

        let writer = TableWriter::new(
            TableGeometry::new("Data", 1)?,
            HeaderSpec::one_line(["ID", "Name"])?,
            WriterOptions::default(),
        )?;
        writer.write_file(Some(&template_path), &output_path, &[strings(&[Some("7"), Some("Eve")])])?;

        let workbook = Workbook::open(&output_path)?;
        let sheet = workbook.sheet("Data").unwrap();
        assert_eq!(sheet.get(0, 0).map(|cell| cell.value.as_str()), Some("Report"));
        assert_eq!(sheet.get(3, 1).map(|cell| cell.value.as_str()), Some("Eve"));
        Ok(())
    }

    #[test]
    fn refuses_a_mismatching_header() {
        let mut workbook = template(&["ID", "Nme"]);
        let writer = TableWriter::new(
            TableGeometry::new("Data", 1).unwrap(),
            HeaderSpec::one_line(["ID", "Name"]).unwrap(),
            WriterOptions::default(),
        )
        .unwrap();
        match writer.write_into(&mut workbook, &[strings(&[Some("1"), Some("Ann")])]) {
            Err(SheetTableError::TableError(TableError::HeaderMismatch { column, found, expected, .. })) => {
                assert_eq!((column, found.as_str(), expected.as_str()), (1, "Nme", "Name"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(workbook.sheet("Data").unwrap().get(3, 0).is_none());
    }

    #[test]
    fn refuses_a_missing_sheet() {
        let mut workbook = template(&["ID"]);
        let writer = TableWriter::new(
            TableGeometry::new("Other", 1).unwrap(),
            HeaderSpec::one_line(["ID"]).unwrap(),
            WriterOptions::default(),
        )
        .unwrap();
        match writer.write_into::<String>(&mut workbook, &[]) {
            Err(SheetTableError::SpreadsheetError(SpreadsheetError::SheetNotFound { file, sheet })) => {
                assert_eq!((file.as_str(), sheet.as_str()), ("template.xlsx", "Other"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn extra_template_columns_need_tolerance() {
        let rows = [strings(&[Some("1"), Some("2")])];
        let write = |ignores_additional_columns| {
            let options = WriterOptions {
                table: TableOptions {
                    ignores_additional_columns,
                    ..Default::default()
                },
                ..Default::default()
            };
            let writer = TableWriter::new(
                TableGeometry::new("Data", 1).unwrap(),
                HeaderSpec::one_line(["A", "B"]).unwrap(),
                options,
            )
            .unwrap();
            writer.write_into(&mut template(&["A", "B", "C"]), &rows)
        };
        assert!(matches!(
            write(false),
            Err(SheetTableError::TableError(TableError::HeaderSizeMismatch { found: 3, expected: 2, .. }))
        ));
        assert!(write(true).is_ok());
    }

    #[test]
    fn allocates_one_style_per_column() {
        let mut source = Workbook::new();
        let date = source.add_style(Style::with_number_format(NumberFormat::builtin(14))).unwrap();
        let sheet = source.add_sheet("Source");
        for row in 0..10_000 {
            sheet.set_number(row, 0, 36548.0 + row as f64).style = date;
        }
        let sheet = source.sheet("Source").unwrap();
        let rows: Vec<Row<CellHandle>> = sheet
            .cells()
            .map(|cell| vec![Some(CellHandle::new(&source, cell))])
            .collect();

        let writer = TableWriter::new(
            TableGeometry::new("Data", 1).unwrap(),
            HeaderSpec::one_line(["Joined"]).unwrap(),
            WriterOptions::default(),
        )
        .unwrap();
        let workbook = writer.write_new(&rows).unwrap();
        assert_eq!(workbook.style_count(), 2);

        let reader = TableReader::new(
            TableGeometry::new("Data", 1).unwrap(),
            HeaderSpec::one_line(["Joined"]).unwrap(),
            TableOptions::default(),
        )
        .unwrap();
        let data: TableData<String> = reader.read(&workbook).unwrap();
        assert_eq!(data.len(), 10_000);
        assert_eq!(data.rows()[0], strings(&[Some("2000-01-23")]));
    }

    #[test]
    fn column_overrides_are_reused_verbatim() {
        let mut workbook = template(&["ID", "Name"]);
        let bold = workbook.add_style(Style::default()).unwrap();
        let styles_before = workbook.style_count();
        let writer = TableWriter::new(
            TableGeometry::new("Data", 1).unwrap(),
            HeaderSpec::one_line(["ID", "Name"]).unwrap(),
            WriterOptions {
                column_styles: HashMap::from([(1, bold)]),
                ..Default::default()
            },
        )
        .unwrap();
        let rows = [strings(&[Some("1"), Some("Ann")]), strings(&[Some("2"), None])];
        writer.write_into(&mut workbook, &rows).unwrap();

        let sheet = workbook.sheet("Data").unwrap();
        assert_eq!(workbook.style_count(), styles_before);
        assert_eq!(sheet.get(3, 1).map(|cell| cell.style), Some(bold));
        assert_eq!(sheet.get(4, 1).map(|cell| cell.style), Some(bold));
        assert_eq!(sheet.get(4, 1).map(Cell::is_blank), Some(true));
        assert_eq!(sheet.get(3, 0).map(|cell| cell.style), Some(StyleId::default()));
    }

    #[test]
    fn copies_values_not_formulas() {
        let mut source = Workbook::new();
        source.is_1904 = true;
        let date = source.add_style(Style::with_number_format(NumberFormat::builtin(14))).unwrap();
        let sheet = source.add_sheet("Source");
        sheet.set_formula(0, 0, "B1*2", FormulaResult::Numeric, "42");
        sheet.set_number(0, 1, 35086.0).style = date;
        let sheet = source.sheet("Source").unwrap();
        let rows = vec![vec![
            sheet.get(0, 0).map(|cell| CellHandle::new(&source, cell)),
            sheet.get(0, 1).map(|cell| CellHandle::new(&source, cell)),
        ]];

        let writer = TableWriter::new(
            TableGeometry::new("Data", 1).unwrap().with_start_row(1).unwrap(),
            HeaderSpec::FreeForm,
            WriterOptions::default(),
        )
        .unwrap();
        let workbook = writer.write_new(&rows).unwrap();
        let sheet = workbook.sheet("Data").unwrap();
        let value = sheet.get(0, 0).unwrap();
        assert_eq!((value.kind, value.value.as_str(), value.formula.as_deref()), (CellType::Numeric, "42", None));
        let joined = sheet.get(0, 1).unwrap();
        assert_eq!(joined.value, "36548");
        assert!(workbook.number_format(joined).is_date_time());
    }

    #[test]
    fn refuses_rows_beyond_the_declared_count() {
        let writer = TableWriter::new(
            TableGeometry::new("Data", 1).unwrap().with_row_count(1).unwrap(),
            HeaderSpec::one_line(["ID"]).unwrap(),
            WriterOptions::default(),
        )
        .unwrap();
        let rows = [strings(&[Some("1")]), strings(&[Some("2")])];
        assert!(matches!(
            writer.write_new(&rows),
            Err(SheetTableError::TableError(TableError::RowCountExceeded { rows: 2, limit: 1, .. }))
        ));
    }

    #[test]
    fn refuses_rows_wider_than_the_table() {
        let mut workbook = template(&["ID", "Name"]);
        let writer = TableWriter::new(
            TableGeometry::new("Data", 1).unwrap(),
            HeaderSpec::one_line(["ID", "Name"]).unwrap(),
            WriterOptions::default(),
        )
        .unwrap();
        let rows = [
            strings(&[Some("1"), Some("Ann")]),
            strings(&[Some("2"), Some("Bob"), Some("extra")]),
        ];
        match writer.write_into(&mut workbook, &rows) {
            Err(SheetTableError::TableError(TableError::RowWidthExceeded { row, columns, limit, .. })) => {
                assert_eq!((row, columns, limit), (1, 3, 2));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(workbook.sheet("Data").unwrap().get(3, 0).is_none());

        let declared = TableWriter::new(
            TableGeometry::new("Data", 2).unwrap().with_start_row(1).unwrap().with_column_count(1).unwrap(),
            HeaderSpec::FreeForm,
            WriterOptions::default(),
        )
        .unwrap();
        assert!(matches!(
            declared.write_new(&[strings(&[Some("1"), Some("2")])]),
            Err(SheetTableError::TableError(TableError::RowWidthExceeded { limit: 1, .. }))
        ));
        assert!(declared.write_new(&[strings(&[Some("1")])]).is_ok());
    }
}
