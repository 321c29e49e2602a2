use crate::error::SheetTableError;
use crate::table::HeaderSpec;
use crate::table::Row;
use crate::table::TableError;

/// Checks a table's header rows against the expected [`HeaderSpec`].
pub struct HeaderValidator<'a> {
    sheet_name: &'a str,
    spec: &'a HeaderSpec,
    ignores_additional_columns: bool,
}

impl<'a> HeaderValidator<'a> {
    /// `sheet_name` only names the sheet in errors.
    pub fn new(sheet_name: &'a str, spec: &'a HeaderSpec, ignores_additional_columns: bool) -> Self {
        HeaderValidator {
            sheet_name,
            spec,
            ignores_additional_columns,
        }
    }

    pub fn number_of_header_lines(&self) -> usize {
        self.spec.number_of_header_lines()
    }

    /// Width of the body given the width found in the sheet: extra columns
    /// beyond the labels are dropped when they are tolerated.
    pub fn body_column_count(&self, found: usize) -> usize {
        match self.spec {
            HeaderSpec::OneLine(labels) if self.ignores_additional_columns => labels.len(),
            _ => found,
        }
    }

    /// Compares the header row with the expected labels, position by position.
    pub fn validate(&self, header_rows: &[Row<String>]) -> Result<(), SheetTableError> {
        let labels = match self.spec {
            HeaderSpec::FreeForm => return Ok(()),
            HeaderSpec::OneLine(labels) => labels,
        };
        let row = header_rows.first().map(Vec::as_slice).unwrap_or_default();

        if !self.ignores_additional_columns && row.len() != labels.len() {
            Err(TableError::HeaderSizeMismatch {
                sheet: self.sheet_name.to_owned(),
                found: row.len(),
                expected: labels.len(),
            })?;
        }

        for (column, expected) in labels.iter().enumerate() {
            let found = row.get(column).cloned().flatten().unwrap_or_default();
            if &found != expected {
                Err(TableError::HeaderMismatch {
                    sheet: self.sheet_name.to_owned(),
                    column,
                    found,
                    expected: expected.to_owned(),
                })?;
            }
        }
        Ok(())
    }

    /// Splits the leading header rows off the table rows.
    pub fn strip_header<T>(&self, mut rows: Vec<Row<T>>) -> (Vec<Row<T>>, Vec<Row<T>>) {
        let header_lines = self.number_of_header_lines().min(rows.len());
        let body = rows.split_off(header_lines);
        (rows, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Row<String> {
        values.iter().map(|value| Some(value.to_string())).collect()
    }

    #[test]
    fn reports_the_first_mismatching_column() {
        let spec = HeaderSpec::one_line(["ID", "Name"]).unwrap();
        let validator = HeaderValidator::new("Data", &spec, false);
        assert!(validator.validate(&[row(&["ID", "Name"])]).is_ok());

        match validator.validate(&[row(&["ID", "Nme"])]) {
            Err(SheetTableError::TableError(TableError::HeaderMismatch {
                sheet,
                column,
                found,
                expected,
            })) => {
                assert_eq!(sheet, "Data");
                assert_eq!(column, 1);
                assert_eq!(found, "Nme");
                assert_eq!(expected, "Name");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn tolerates_extra_columns_only_when_asked() {
        let spec = HeaderSpec::one_line(["A", "B"]).unwrap();
        let wide = [row(&["A", "B", "C"])];

        let strict = HeaderValidator::new("Data", &spec, false);
        assert!(matches!(
            strict.validate(&wide),
            Err(SheetTableError::TableError(TableError::HeaderSizeMismatch { found: 3, expected: 2, .. }))
        ));
        assert_eq!(strict.body_column_count(3), 3);

        let tolerant = HeaderValidator::new("Data", &spec, true);
        assert!(tolerant.validate(&wide).is_ok());
        assert_eq!(tolerant.body_column_count(3), 2);
        assert!(matches!(
            tolerant.validate(&[row(&["A"])]),
            Err(SheetTableError::TableError(TableError::HeaderMismatch { column: 1, .. }))
        ));
    }

    #[test]
    fn free_form_tables_have_no_header() {
        let validator = HeaderValidator::new("Data", &HeaderSpec::FreeForm, false);
        assert_eq!(validator.number_of_header_lines(), 0);
        assert!(validator.validate(&[]).is_ok());

        let (header, body) = validator.strip_header(vec![row(&["1"]), row(&["2"])]);
        assert!(header.is_empty());
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn strips_one_header_line() {
        let spec = HeaderSpec::one_line(["A"]).unwrap();
        let validator = HeaderValidator::new("Data", &spec, false);
        let (header, body) = validator.strip_header(vec![row(&["A"]), row(&["1"]), row(&["2"])]);
        assert_eq!(header, vec![row(&["A"])]);
        assert_eq!(body, vec![row(&["1"]), row(&["2"])]);
    }
}
