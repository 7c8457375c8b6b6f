//! The in-memory table.
//!
//! A [`Dataset`] owns an optional list of header names and a list of rows. The width of the
//! table is fixed by whichever comes first: the headers, or the first appended row of a
//! headerless dataset. Every later row, header list and column must match it.

use std::ops::Index;

use crate::error::{TabularError, TabularResult};
use crate::types::{coerce_cell, Cell, Schema};

/// An ordered sequence of cells.
pub type Row = Vec<Cell>;

/// In-memory tabular dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    title: Option<String>,
    headers: Option<Vec<String>>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Create an empty, headerless dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dataset with headers and no rows.
    pub fn with_headers<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: None,
            headers: Some(headers.into_iter().map(Into::into).collect()),
            rows: Vec::new(),
        }
    }

    /// Optional dataset title (used as the sheet name / HTML caption).
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    /// Header names, or `None` for a headerless dataset.
    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    /// Set or replace the headers.
    ///
    /// Accepted when the dataset has no rows, or when `names` has exactly as many entries as
    /// every existing row. Otherwise fails with [`TabularError::WidthMismatch`] and leaves the
    /// dataset unchanged; rows are never truncated or padded.
    pub fn set_headers<I, S>(&mut self, names: I) -> TabularResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if let Some(first) = self.rows.first() {
            if first.len() != names.len() {
                return Err(TabularError::WidthMismatch {
                    expected: first.len(),
                    found: names.len(),
                });
            }
        }
        self.headers = Some(names);
        Ok(())
    }

    /// Drop the headers, making the dataset headerless. Rows are kept.
    pub fn clear_headers(&mut self) {
        self.headers = None;
    }

    /// Number of rows. O(1).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns. O(1).
    ///
    /// This is the header count when headers are set, otherwise the width of the rows
    /// (0 for an empty headerless dataset).
    pub fn column_count(&self) -> usize {
        self.width().unwrap_or(0)
    }

    /// Fixed width of the table, if any.
    fn width(&self) -> Option<usize> {
        match &self.headers {
            Some(h) => Some(h.len()),
            None => self.rows.first().map(Vec::len),
        }
    }

    fn check_width(&self, found: usize) -> TabularResult<()> {
        match self.width() {
            Some(expected) if expected != found => Err(TabularError::WidthMismatch { expected, found }),
            _ => Ok(()),
        }
    }

    /// Append a row at the end.
    ///
    /// Fails with [`TabularError::WidthMismatch`] if the row does not match the dataset width;
    /// in that case nothing is inserted.
    pub fn append_row<I, C>(&mut self, cells: I) -> TabularResult<()>
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        let row: Row = cells.into_iter().map(Into::into).collect();
        self.check_width(row.len())?;
        self.rows.push(row);
        Ok(())
    }

    /// Insert a row before `index` (`index == row_count()` appends).
    pub fn insert_row<I, C>(&mut self, index: usize, cells: I) -> TabularResult<()>
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        if index > self.rows.len() {
            return Err(TabularError::RowOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        let row: Row = cells.into_iter().map(Into::into).collect();
        self.check_width(row.len())?;
        self.rows.insert(index, row);
        Ok(())
    }

    /// Remove and return the row at `index`.
    pub fn delete_row(&mut self, index: usize) -> TabularResult<Row> {
        if index >= self.rows.len() {
            return Err(TabularError::RowOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        Ok(self.rows.remove(index))
    }

    /// Append a column; `cells` must have one entry per existing row.
    ///
    /// On a headered dataset the new header is appended too. On a headerless dataset `header`
    /// must be `None`.
    pub fn append_column<I, C>(&mut self, header: Option<&str>, cells: I) -> TabularResult<()>
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        let cells: Vec<Cell> = cells.into_iter().map(Into::into).collect();
        if cells.len() != self.rows.len() {
            return Err(TabularError::WidthMismatch {
                expected: self.rows.len(),
                found: cells.len(),
            });
        }
        match (&mut self.headers, header) {
            (Some(headers), Some(name)) => headers.push(name.to_string()),
            (None, None) => {}
            (Some(_), None) => {
                return Err(TabularError::SchemaMismatch {
                    message: "a header name is required on a headered dataset".to_string(),
                });
            }
            (None, Some(name)) => {
                return Err(TabularError::SchemaMismatch {
                    message: format!("cannot add header '{name}' to a headerless dataset"),
                });
            }
        }
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.push(cell);
        }
        Ok(())
    }

    /// Remove the first column whose header is `name`, returning its cells.
    pub fn delete_column(&mut self, name: &str) -> TabularResult<Vec<Cell>> {
        let idx = self
            .index_of(name)
            .ok_or_else(|| TabularError::ColumnNotFound(name.to_string()))?;
        if let Some(headers) = &mut self.headers {
            headers.remove(idx);
        }
        Ok(self.rows.iter_mut().map(|row| row.remove(idx)).collect())
    }

    /// Index of the first header equal to `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.headers.as_ref()?.iter().position(|h| h == name)
    }

    /// Row at `index`.
    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// All rows, in order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Cells of the column at `index`, top to bottom.
    pub fn column_at(&self, index: usize) -> Option<Vec<&Cell>> {
        if index >= self.column_count() {
            return None;
        }
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// Cells of the column named `name`, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        self.column_at(self.index_of(name)?)
    }

    /// Row-dict projection: one header → cell mapping per row, in row order.
    ///
    /// The iterator is lazy and `Clone`; calling `to_dicts` again starts over from the
    /// dataset's current contents. A headerless dataset yields empty mappings.
    pub fn to_dicts(&self) -> RowDicts<'_> {
        RowDicts {
            headers: self.headers.as_deref().unwrap_or(&[]),
            rows: self.rows.iter(),
        }
    }

    /// Coerce columns named by `schema` into their declared types.
    ///
    /// Every schema field must exist as a header. The dataset is only modified when every
    /// cell converts; on error it is left as it was.
    pub fn apply_schema(&mut self, schema: &Schema) -> TabularResult<()> {
        let mut col_idxs = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            match self.index_of(&field.name) {
                Some(idx) => col_idxs.push(idx),
                None => {
                    return Err(TabularError::SchemaMismatch {
                        message: format!(
                            "missing required column '{}'. headers={:?}",
                            field.name,
                            self.headers.as_deref().unwrap_or(&[])
                        ),
                    });
                }
            }
        }

        let mut converted = self.rows.clone();
        for (row_idx0, row) in converted.iter_mut().enumerate() {
            // 1-based for users; +1 again because the header is row 1.
            let user_row = row_idx0 + 2;
            for (field, &idx) in schema.fields.iter().zip(col_idxs.iter()) {
                row[idx] = coerce_cell(user_row, &field.name, field.column_type, &row[idx])?;
            }
        }
        self.rows = converted;
        Ok(())
    }

    /// Build a dataset from parts already known to be rectangular.
    pub(crate) fn from_parts(headers: Option<Vec<String>>, rows: Vec<Row>) -> Self {
        debug_assert!({
            let width = headers.as_ref().map(Vec::len).or_else(|| rows.first().map(Vec::len));
            rows.iter().all(|r| Some(r.len()) == width)
        });
        Self {
            title: None,
            headers,
            rows,
        }
    }
}

/// Iterator returned by [`Dataset::to_dicts`].
#[derive(Debug, Clone)]
pub struct RowDicts<'a> {
    headers: &'a [String],
    rows: std::slice::Iter<'a, Row>,
}

impl<'a> Iterator for RowDicts<'a> {
    type Item = RowDict<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let cells = self.rows.next()?;
        Some(RowDict {
            headers: self.headers,
            cells,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for RowDicts<'_> {}

/// A row viewed as a header → cell mapping.
#[derive(Debug, Clone, Copy)]
pub struct RowDict<'a> {
    headers: &'a [String],
    cells: &'a [Cell],
}

impl<'a> RowDict<'a> {
    /// Cell under the first header equal to `name`.
    pub fn get(&self, name: &str) -> Option<&'a Cell> {
        let idx = self.headers.iter().position(|h| h == name)?;
        self.cells.get(idx)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// `(header, cell)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Cell)> + 'a {
        self.headers.iter().map(String::as_str).zip(self.cells.iter())
    }

    pub fn len(&self) -> usize {
        self.headers.len().min(self.cells.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Index<&str> for RowDict<'_> {
    type Output = Cell;

    /// # Panics
    ///
    /// Panics if `name` is not a header, like indexing a `HashMap` with a missing key.
    fn index(&self, name: &str) -> &Cell {
        match self.get(name) {
            Some(cell) => cell,
            None => panic!("no column named '{name}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnType, Field};

    fn people() -> Dataset {
        let mut ds = Dataset::with_headers(["Name", "Age", "City", "Phone"]);
        ds.append_row(vec![
            Cell::from("Alice"),
            Cell::from(24),
            Cell::from("New York"),
            Cell::from("+1-212-555-0187"),
        ])
        .unwrap();
        ds.append_row(vec![
            Cell::from("Bob"),
            Cell::from(30),
            Cell::from("Los Angeles"),
            Cell::from("+1-310-555-0143"),
        ])
        .unwrap();
        ds
    }

    #[test]
    fn append_row_with_wrong_arity_leaves_dataset_unchanged() {
        let mut ds = people();
        let before = ds.clone();
        let err = ds.append_row(["Carol", "Chicago"]).unwrap_err();
        assert!(matches!(err, TabularError::WidthMismatch { expected: 4, found: 2 }));
        assert_eq!(ds, before);
    }

    #[test]
    fn first_row_fixes_width_of_headerless_dataset() {
        let mut ds = Dataset::new();
        assert_eq!(ds.column_count(), 0);
        ds.append_row([1, 2, 3]).unwrap();
        assert_eq!(ds.column_count(), 3);
        assert!(ds.append_row([1, 2]).is_err());
        assert_eq!(ds.row_count(), 1);
    }

    #[test]
    fn set_headers_rejects_mismatched_width() {
        let mut ds = Dataset::new();
        ds.append_row(["a", "b"]).unwrap();
        let err = ds.set_headers(["x", "y", "z"]).unwrap_err();
        assert!(matches!(err, TabularError::WidthMismatch { expected: 2, found: 3 }));
        assert_eq!(ds.headers(), None);

        ds.set_headers(["x", "y"]).unwrap();
        assert_eq!(ds.headers().unwrap(), ["x", "y"]);
        // Re-setting with the same width is allowed.
        ds.set_headers(["left", "right"]).unwrap();
        assert_eq!(ds.index_of("right"), Some(1));
    }

    #[test]
    fn insert_and_delete_rows() {
        let mut ds = people();
        ds.insert_row(0, ["Eva", "28", "Phoenix", "+1-602-555-0179"])
            .unwrap();
        assert_eq!(ds.row(0).unwrap()[0], Cell::from("Eva"));
        assert!(matches!(
            ds.insert_row(9, ["a", "b", "c", "d"]),
            Err(TabularError::RowOutOfRange { index: 9, len: 3 })
        ));

        let removed = ds.delete_row(1).unwrap();
        assert_eq!(removed[0], Cell::from("Alice"));
        assert_eq!(ds.row_count(), 2);
        assert!(ds.delete_row(2).is_err());
    }

    #[test]
    fn column_mutations() {
        let mut ds = people();
        ds.append_column(Some("Active"), [true, false]).unwrap();
        assert_eq!(ds.column_count(), 5);
        assert_eq!(ds.column("Active").unwrap(), vec![&Cell::from(true), &Cell::from(false)]);

        assert!(matches!(
            ds.append_column(Some("Short"), [1]),
            Err(TabularError::WidthMismatch { expected: 2, found: 1 })
        ));

        let ages = ds.delete_column("Age").unwrap();
        assert_eq!(ages, vec![Cell::from(24), Cell::from(30)]);
        assert_eq!(ds.headers().unwrap(), ["Name", "City", "Phone", "Active"]);
        assert!(matches!(
            ds.delete_column("Age"),
            Err(TabularError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn to_dicts_projects_rows_and_restarts() {
        let mut ds = people();
        let dicts = ds.to_dicts();
        let names: Vec<String> = dicts.clone().map(|d| d["Name"].to_text()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        // A clone of the iterator replays from the same state.
        assert_eq!(dicts.count(), 2);

        ds.append_row(["Charlie", "22", "Chicago", "+1-312-555-0198"])
            .unwrap();
        let phones: Vec<String> = ds
            .to_dicts()
            .map(|d| d.get("Phone").unwrap().to_text())
            .collect();
        assert_eq!(phones.len(), 3);
        assert_eq!(phones[2], "+1-312-555-0198");

        let first = ds.to_dicts().next().unwrap();
        assert_eq!(
            first.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            vec!["Name", "Age", "City", "Phone"]
        );
        assert!(first.get("Email").is_none());
    }

    #[test]
    fn headerless_dicts_are_empty() {
        let mut ds = Dataset::new();
        ds.append_row([1, 2]).unwrap();
        let d = ds.to_dicts().next().unwrap();
        assert!(d.is_empty());
    }

    #[test]
    fn apply_schema_is_atomic() {
        let mut ds = Dataset::with_headers(["Name", "Age"]);
        ds.append_row(["Alice", "24"]).unwrap();
        ds.append_row(["Bob", "thirty"]).unwrap();
        let before = ds.clone();

        let schema = crate::types::Schema::new(vec![Field::new("Age", ColumnType::Number)]);
        let err = ds.apply_schema(&schema).unwrap_err();
        assert!(err.to_string().contains("row 3"));
        assert_eq!(ds, before);

        ds.delete_row(1).unwrap();
        ds.apply_schema(&schema).unwrap();
        assert_eq!(ds.row(0).unwrap()[1], Cell::Number(24.0));
    }

    #[test]
    fn apply_schema_requires_columns() {
        let mut ds = people();
        let schema = crate::types::Schema::new(vec![Field::new("Email", ColumnType::Text)]);
        let err = ds.apply_schema(&schema).unwrap_err();
        assert!(err.to_string().contains("missing required column 'Email'"));
    }
}
