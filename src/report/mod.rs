//! Report model
//!
//! Rows produced by the mappers are [`Record`]s: ordered column/value pairs.
//! Records are aggregated into [`Sheet`]s and sheets into a [`Report`], which
//! the [`xlsx`] exporter writes to disk.
//!
//! - [`xlsx`] - Workbook writer
//! - [`summary`] - Console summary printer

pub mod summary;
pub mod xlsx;

use crate::flatten;
use chrono::{DateTime, TimeZone};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub use xlsx::write_xlsx;

/// Timestamp format embedded in output file names
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H%M%S";

/// One spreadsheet cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Convert a JSON value. Lists are joined, objects kept as compact JSON.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Cell::Empty,
            Some(Value::Bool(b)) => Cell::Bool(*b),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => Cell::Number(n.as_f64().unwrap_or_default()),
            },
            Some(other) => Cell::Text(flatten::render(other)),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> bool {
        matches!(self, Cell::Bool(true))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<&String> for Cell {
    fn from(s: &String) -> Self {
        Cell::Text(s.clone())
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Int(i)
    }
}

impl From<usize> for Cell {
    fn from(i: usize) -> Self {
        Cell::Int(i as i64)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Empty)
    }
}

/// One flattened resource: ordered column/value pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Cell)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a row with the `Account` column
    pub fn for_account(account: &str) -> Self {
        Self::new().with("Account", account)
    }

    /// Set a column, replacing an existing value in place
    pub fn with(mut self, column: &str, value: impl Into<Cell>) -> Self {
        self.set(column, value);
        self
    }

    /// Copy the value at `path` of `item` into `column`
    pub fn json(self, column: &str, item: &Value, path: &str) -> Self {
        let cell = Cell::from_json(flatten::lookup(item, path));
        self.with(column, cell)
    }

    /// Like [`Record::json`] with a text default for absent values
    pub fn json_or(self, column: &str, item: &Value, path: &str, default: &str) -> Self {
        let cell = match flatten::lookup(item, path) {
            Some(v) => Cell::from_json(Some(v)),
            None => Cell::Text(default.to_string()),
        };
        self.with(column, cell)
    }

    pub fn set(&mut self, column: &str, value: impl Into<Cell>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(c, _)| c == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.fields.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    /// Display text of a column, empty when absent
    pub fn text(&self, column: &str) -> String {
        self.get(column).map(|c| c.to_string()).unwrap_or_default()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn fields(&self) -> &[(String, Cell)] {
        &self.fields
    }
}

/// A named table of rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Build a sheet whose columns are the union of the records' columns in
    /// first-seen order. Cells a record does not have are left empty.
    pub fn from_records(name: &str, records: &[Record]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for column in record.columns() {
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
        }

        let rows = records
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| r.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        Self {
            name: name.to_string(),
            columns,
            rows,
        }
    }

    /// Build a sheet with a fixed column order
    pub fn with_columns(name: &str, columns: &[&str], records: &[Record]) -> Self {
        let rows = records
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| r.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Cell at `row` in `column`
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Occurrences of each distinct value in `column`, most frequent first.
    /// Empty cells are not counted.
    pub fn value_counts(&self, column: &str) -> Vec<(String, usize)> {
        let Some(idx) = self.column_index(column) else {
            return Vec::new();
        };

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for row in &self.rows {
            if let Some(cell) = row.get(idx).filter(|c| !c.is_empty()) {
                *counts.entry(cell.to_string()).or_default() += 1;
            }
        }

        let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    /// Group by `keys` and count rows per group into a new sheet with
    /// columns `keys + [count_column]`, ordered by key. Rows with an empty
    /// key are dropped.
    pub fn count_by(&self, name: &str, keys: &[&str], count_column: &str) -> Sheet {
        let indices: Option<Vec<usize>> = keys.iter().map(|k| self.column_index(k)).collect();
        let mut columns: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        columns.push(count_column.to_string());

        let Some(indices) = indices else {
            return Sheet {
                name: name.to_string(),
                columns,
                rows: Vec::new(),
            };
        };

        let mut groups: BTreeMap<Vec<String>, (Vec<Cell>, usize)> = BTreeMap::new();
        for row in &self.rows {
            let cells: Vec<Cell> = indices
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default())
                .collect();
            if cells.iter().any(Cell::is_empty) {
                continue;
            }
            let key = cells.iter().map(|c| c.to_string()).collect();
            groups.entry(key).or_insert((cells, 0)).1 += 1;
        }

        let rows = groups
            .into_values()
            .map(|(mut cells, count)| {
                cells.push(Cell::from(count));
                cells
            })
            .collect();

        Sheet {
            name: name.to_string(),
            columns,
            rows,
        }
    }

    /// Rows whose `column` satisfies `pred`, as a new sheet
    pub fn filter_by<F>(&self, name: &str, column: &str, pred: F) -> Sheet
    where
        F: Fn(&Cell) -> bool,
    {
        let rows = match self.column_index(column) {
            Some(idx) => self
                .rows
                .iter()
                .filter(|row| row.get(idx).map(&pred).unwrap_or(false))
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        Sheet {
            name: name.to_string(),
            columns: self.columns.clone(),
            rows,
        }
    }
}

/// One output workbook
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub file_prefix: String,
    pub sheets: Vec<Sheet>,
}

impl Report {
    pub fn new(file_prefix: &str) -> Self {
        Self {
            file_prefix: file_prefix.to_string(),
            sheets: Vec::new(),
        }
    }

    pub fn push(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    pub fn push_if_not_empty(&mut self, sheet: Sheet) {
        if !sheet.is_empty() {
            self.sheets.push(sheet);
        }
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// `<prefix>_<YYYY_MM_DD_HHMMSS>.xlsx`
    pub fn file_name<Tz: TimeZone>(&self, generated_at: &DateTime<Tz>) -> String
    where
        Tz::Offset: fmt::Display,
    {
        format!(
            "{}_{}.xlsx",
            self.file_prefix,
            generated_at.format(FILE_TIMESTAMP_FORMAT)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use serde_json::json;

    fn record(account: &str, status: &str) -> Record {
        Record::for_account(account).with("Status", status)
    }

    #[test]
    fn test_record_set_replaces_in_place() {
        let r = Record::for_account("int")
            .with("Status", "old")
            .with("Other", 1i64)
            .with("Status", "new");
        assert_eq!(r.columns().collect::<Vec<_>>(), vec!["Account", "Status", "Other"]);
        assert_eq!(r.text("Status"), "new");
    }

    #[test]
    fn test_record_json_or_defaults() {
        let item = json!({"Engine": "postgres", "Port": 5432});
        let r = Record::new()
            .json("Engine", &item, "Engine")
            .json("Port", &item, "Port")
            .json_or("DBName", &item, "DBName", "N/A")
            .json("Missing", &item, "Missing");
        assert_eq!(r.get("Port"), Some(&Cell::Int(5432)));
        assert_eq!(r.text("DBName"), "N/A");
        assert_eq!(r.get("Missing"), Some(&Cell::Empty));
    }

    #[test]
    fn test_from_records_unions_columns() {
        let records = vec![
            Record::for_account("a").with("X", 1i64),
            Record::for_account("b").with("Y", "y"),
        ];
        let sheet = Sheet::from_records("S", &records);
        assert_eq!(sheet.columns, vec!["Account", "X", "Y"]);
        assert_eq!(sheet.cell(1, "X"), Some(&Cell::Empty));
        assert_eq!(sheet.cell(1, "Y"), Some(&Cell::Text("y".into())));
    }

    #[test]
    fn test_with_columns_fixes_order() {
        let records = vec![Record::new().with("B", "b").with("A", "a")];
        let sheet = Sheet::with_columns("S", &["A", "B", "C"], &records);
        assert_eq!(sheet.columns, vec!["A", "B", "C"]);
        assert_eq!(sheet.rows[0], vec![Cell::from("a"), Cell::from("b"), Cell::Empty]);
    }

    #[test]
    fn test_value_counts_orders_by_frequency() {
        let records = vec![record("a", "ISSUED"), record("a", "EXPIRED"), record("b", "ISSUED")];
        let sheet = Sheet::from_records("S", &records);
        assert_eq!(
            sheet.value_counts("Status"),
            vec![("ISSUED".to_string(), 2), ("EXPIRED".to_string(), 1)]
        );
        assert!(sheet.value_counts("Nope").is_empty());
    }

    #[test]
    fn test_count_by_groups_and_sorts() {
        let records = vec![
            record("b", "ISSUED"),
            record("a", "ISSUED"),
            record("a", "ISSUED"),
            record("a", ""),
        ];
        let sheet = Sheet::from_records("S", &records).count_by("Summary", &["Account", "Status"], "Count");
        assert_eq!(sheet.columns, vec!["Account", "Status", "Count"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0], vec![Cell::from("a"), Cell::from("ISSUED"), Cell::Int(2)]);
        assert_eq!(sheet.rows[1], vec![Cell::from("b"), Cell::from("ISSUED"), Cell::Int(1)]);
    }

    #[test]
    fn test_filter_by() {
        let records = vec![record("a", "Expired"), record("a", "Valid")];
        let sheet = Sheet::from_records("S", &records)
            .filter_by("F", "Status", |c| c.to_string().contains("Expired"));
        assert_eq!(sheet.name, "F");
        assert_eq!(sheet.len(), 1);
    }

    #[test]
    fn test_report_file_name_has_timestamp() {
        let report = Report::new("ami_inventory");
        let at = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(report.file_name(&at), "ami_inventory_2026_03_04_050607.xlsx");
    }

    #[test]
    fn test_cell_from_json() {
        assert_eq!(Cell::from_json(Some(&json!(true))), Cell::Bool(true));
        assert_eq!(Cell::from_json(Some(&json!(1.5))), Cell::Number(1.5));
        assert_eq!(Cell::from_json(Some(&json!(["a", "b"]))), Cell::Text("a, b".into()));
        assert_eq!(Cell::from_json(None), Cell::Empty);
    }
}
