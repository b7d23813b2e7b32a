use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single value in a query result.
///
/// Warehouse results are loosely typed: a numeric column can come back as
/// text, a period column as a timestamp string. `Cell` keeps the raw shape
/// and defers interpretation to the computation that consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Interpret this cell as a number. Cells that cannot be coerced are
    /// treated as missing, never as a computation error — a malformed single
    /// cell must not abort a whole KPI row.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Null => None,
            Cell::Number(v) if v.is_finite() => Some(*v),
            Cell::Number(_) => None,
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        match v {
            Some(v) => Cell::Number(v),
            None => Cell::Null,
        }
    }
}

/// A tabular query result: named columns over rows of cells.
///
/// No fixed schema — callers name the columns they need per call, and an
/// unknown column name fails fast with [`Error::MissingColumn`] so that
/// integration bugs surface in testing instead of rendering blank dashboards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// An empty, zero-column table — the "no data available" substitute for
    /// a failed upstream query.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from column names and rows. Short rows are padded with
    /// nulls; long rows are truncated to the column count.
    pub fn from_rows<I, R>(columns: &[&str], rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = Cell>,
    {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|r| {
                let mut row: Vec<Cell> = r.into_iter().take(width).collect();
                row.resize(width, Cell::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a required column, or a fail-fast error naming what was
    /// available.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::missing_column(name, &self.columns))
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.rows[row][col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_number_coercion() {
        assert_eq!(Cell::Number(42.0).as_number(), Some(42.0));
        assert_eq!(Cell::Text("42".into()).as_number(), Some(42.0));
        assert_eq!(Cell::Text(" 3.5 ".into()).as_number(), Some(3.5));
        assert_eq!(Cell::Text("n/a".into()).as_number(), None);
        assert_eq!(Cell::Text("".into()).as_number(), None);
        assert_eq!(Cell::Null.as_number(), None);
        assert_eq!(Cell::Number(f64::NAN).as_number(), None);
        assert_eq!(Cell::Text("inf".into()).as_number(), None);
    }

    #[test]
    fn test_column_index() {
        let t = Table::from_rows(&["week", "value"], vec![vec![Cell::from("2024-01-01"), Cell::from(1.0)]]);
        assert_eq!(t.column_index("value").unwrap(), 1);

        let err = t.column_index("nope").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("nope"), "{msg}");
        assert!(msg.contains("week, value"), "{msg}");
    }

    #[test]
    fn test_from_rows_pads_and_truncates() {
        let t = Table::from_rows(
            &["a", "b"],
            vec![
                vec![Cell::from(1.0)],
                vec![Cell::from(1.0), Cell::from(2.0), Cell::from(3.0)],
            ],
        );
        assert_eq!(t.cell(0, 1), &Cell::Null);
        assert_eq!(t.rows()[1].len(), 2);
    }

    #[test]
    fn test_empty_table() {
        let t = Table::empty();
        assert!(t.is_empty());
        assert!(t.columns().is_empty());
        assert!(t.column_index("anything").is_err());
    }
}
