use sheetpull_error::{PullError, Result};
use sheetpull_http::google::sheets::ValueRange;

/// Raw rows returned for a sheet range, with every cell rendered as text.
///
/// Rows may be ragged, the api drops trailing empty cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetValueRange {
    pub rows: Vec<Vec<String>>,
}

impl SheetValueRange {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        SheetValueRange { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl From<ValueRange> for SheetValueRange {
    fn from(range: ValueRange) -> Self {
        let rows = range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_text).collect())
            .collect();
        SheetValueRange { rows }
    }
}

/// Render a single cell as text.
///
/// Strings pass through untouched, no coercion happens in either direction.
fn cell_to_text(cell: serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Text table with named columns.
///
/// Every row has exactly as many cells as there are columns. Column names are
/// not required to be unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table, checking that every row matches the column count.
    ///
    /// Rows are not padded here, see `try_from_value_range` for the lenient
    /// version.
    pub fn try_new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if columns.is_empty() {
            return Err(PullError::EmptySheetRange);
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(PullError::MalformedRow {
                    row: idx + 2,
                    expected: columns.len(),
                    got: row.len(),
                });
            }
        }
        Ok(Table { columns, rows })
    }

    /// Convert a value range, using the first row as the header.
    ///
    /// Short rows are padded with empty strings up to the header width. Rows
    /// wider than the header are rejected with `MalformedRow`, where `row` is
    /// the 1-based position in the range (the header is row 1).
    ///
    /// A range without any rows, or with an empty header row, is an
    /// `EmptySheetRange` error.
    pub fn try_from_value_range(range: SheetValueRange) -> Result<Self> {
        let mut rows = range.rows.into_iter();
        let columns = match rows.next() {
            Some(header) if !header.is_empty() => header,
            _ => return Err(PullError::EmptySheetRange),
        };
        let width = columns.len();

        let rows = rows
            .enumerate()
            .map(|(idx, mut row)| {
                if row.len() > width {
                    return Err(PullError::MalformedRow {
                        row: idx + 2,
                        expected: width,
                        got: row.len(),
                    });
                }
                row.resize(width, String::new());
                Ok(row)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Table { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Iterate over the values of a single column.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |row| row[idx].as_str())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sheetpull_error::ErrorKind;

    use super::*;

    fn range(rows: &[&[&str]]) -> SheetValueRange {
        SheetValueRange::new(
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn header_and_rows() {
        let table = Table::try_from_value_range(range(&[
            &["id", "name"],
            &["1", "Alice"],
            &["2", "Bob"],
        ]))
        .unwrap();

        assert_eq!(&["id", "name"], table.columns());
        assert_eq!(2, table.num_rows());
        assert_eq!(vec!["1", "Alice"], table.rows()[0]);
        assert_eq!(vec!["Alice", "Bob"], table.column_values(1).collect::<Vec<_>>());
    }

    #[test]
    fn row_count_matches_data_rows() {
        for n in [0, 1, 7, 100] {
            let mut rows = vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]];
            for i in 0..n {
                rows.push(vec![i.to_string(), "x".to_string(), "y".to_string()]);
            }
            let table = Table::try_from_value_range(SheetValueRange::new(rows)).unwrap();
            assert_eq!(n, table.num_rows());
            assert_eq!(&["a", "b", "c"], table.columns());
        }
    }

    #[test]
    fn header_only() {
        let table = Table::try_from_value_range(range(&[&["c1", "c2"]])).unwrap();
        assert_eq!(2, table.num_columns());
        assert_eq!(0, table.num_rows());
    }

    #[test]
    fn empty_range() {
        let err = Table::try_from_value_range(SheetValueRange::default()).unwrap_err();
        assert_eq!(ErrorKind::EmptySheetRange, err.kind());
    }

    #[test]
    fn empty_header_row() {
        let err = Table::try_from_value_range(range(&[&[]])).unwrap_err();
        assert_eq!(ErrorKind::EmptySheetRange, err.kind());
    }

    #[test]
    fn short_rows_padded() {
        let table =
            Table::try_from_value_range(range(&[&["c1", "c2"], &["a"], &[], &["b", "c"]]))
                .unwrap();
        assert_eq!(vec!["a", ""], table.rows()[0]);
        assert_eq!(vec!["", ""], table.rows()[1]);
        assert_eq!(vec!["b", "c"], table.rows()[2]);
    }

    #[test]
    fn long_rows_rejected() {
        let err = Table::try_from_value_range(range(&[&["c1", "c2"], &["a", "b"], &["a", "b", "c"]]))
            .unwrap_err();
        assert_eq!(ErrorKind::MalformedRow, err.kind());
        match err {
            PullError::MalformedRow { row, expected, got } => {
                assert_eq!(3, row);
                assert_eq!(2, expected);
                assert_eq!(3, got);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_headers_kept() {
        let table = Table::try_from_value_range(range(&[&["a", "a"], &["1", "2"]])).unwrap();
        assert_eq!(&["a", "a"], table.columns());
    }

    #[test]
    fn cells_rendered_as_text() {
        let value_range = ValueRange {
            range: Some("Sheet1!A1:C2".to_string()),
            major_dimension: Some("ROWS".to_string()),
            values: vec![
                vec![json!("n"), json!("b"), json!("s")],
                vec![json!(1.5), json!(true), json!(null)],
                vec![json!("007"), json!("1e3")],
            ],
        };

        let range = SheetValueRange::from(value_range);
        assert_eq!(vec!["1.5", "true", ""], range.rows[1]);
        // No numeric coercion of strings.
        assert_eq!(vec!["007", "1e3"], range.rows[2]);
    }

    #[test]
    fn try_new_checks_width() {
        let err = Table::try_new(
            vec!["a".to_string()],
            vec![vec!["1".to_string(), "2".to_string()]],
        )
        .unwrap_err();
        assert_eq!(ErrorKind::MalformedRow, err.kind());
    }
}
