#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Deduplicating CSV store for extracted task orders.
//!
//! The store is a single CSV file whose header is exactly
//! [`Field::headers`]. It holds one row per task order number, sorted by
//! start date (newest first). Records enter it only through
//! [`merge::merge`], which never rewrites an existing row.
//!
//! Writes go to a sibling `.tmp` file that is synced and then renamed over
//! the store, so an interrupted write leaves the previous store intact.

pub mod merge;

use std::cmp::Reverse;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use task_orders_models::{DateValue, Field, FieldValue, TaskOrder, ValueKind, coerce};

pub use merge::{MergeOptions, MergeOutcome, UnkeyedPolicy, merge};

/// Errors that can occur while reading or writing the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The CSV encoding is invalid.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The header does not match the store schema.
    #[error("Store header does not match schema: found [{}]", found.join(", "))]
    SchemaMismatch {
        /// Header found in the file.
        found: Vec<String>,
    },

    /// A cell cannot be read back as its column's type.
    #[error("Malformed store row {row}, column '{column}': {message}")]
    Malformed {
        /// 1-based data row.
        row: usize,
        /// Column of the bad cell.
        column: Field,
        /// What is wrong with it.
        message: String,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// The ordered table of stored task orders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    rows: Vec<TaskOrder>,
}

impl Store {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the store at `path`, or an empty store if the file does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be read, its header does
    /// not match the schema, or a cell is malformed.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No store at {}; starting empty", path.display());
                return Ok(Self::new());
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let store = Self::from_reader(file)?;
        log::debug!("Loaded {} rows from {}", store.len(), path.display());
        Ok(store)
    }

    /// Reads a store from CSV.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the CSV is invalid, its header does not
    /// match the schema, or a cell is malformed.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Ok(Self::new());
        }
        if !headers.iter().eq(Field::headers()) {
            return Err(StoreError::SchemaMismatch {
                found: headers.iter().map(str::to_owned).collect(),
            });
        }

        let mut rows = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result?;
            rows.push(parse_row(index + 1, &record)?);
        }

        Ok(Self { rows })
    }

    /// Writes the header and every row as CSV.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if writing fails.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<W, StoreError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(Field::headers())?;
        for row in &self.rows {
            writer.write_record(row.cells())?;
        }
        writer.flush().map_err(csv::Error::from)?;
        writer
            .into_inner()
            .map_err(|e| StoreError::Csv(csv::Error::from(e.into_error())))
    }

    /// Persists the store to `path` atomically.
    ///
    /// The CSV is written to `<path>.tmp`, synced to disk, and renamed over
    /// `path`. Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any step fails; the previous file at
    /// `path` is left untouched in that case.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp = tmp_path(path);
        let result = self.write_tmp(&tmp).and_then(|()| {
            std::fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
        });

        if result.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        result?;

        log::debug!("Wrote {} rows to {}", self.len(), path.display());
        Ok(())
    }

    fn write_tmp(&self, tmp: &Path) -> Result<(), StoreError> {
        let file = File::create(tmp).map_err(|e| StoreError::io(tmp, e))?;
        let file = self.write_to(file)?;
        file.sync_all().map_err(|e| StoreError::io(tmp, e))
    }

    /// Rows in store order.
    #[must_use]
    pub fn rows(&self) -> &[TaskOrder] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether a row with task order number `key` exists.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.rows
            .iter()
            .any(|row| row.task_order_number() == Some(key))
    }

    /// Appends a row without any checks.
    pub(crate) fn push(&mut self, record: TaskOrder) {
        self.rows.push(record);
    }

    /// Sorts rows by start date, newest first.
    ///
    /// Rows whose start date is missing or unparseable go last, keeping
    /// their relative order.
    pub fn sort_by_start_date_desc(&mut self) {
        self.rows.sort_by_key(|row| Reverse(row.start_date()));
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn parse_row(row: usize, record: &csv::StringRecord) -> Result<TaskOrder, StoreError> {
    let mut task_order = TaskOrder::new();

    for (field, cell) in Field::ALL.iter().zip(record.iter()) {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        let value = if field.kind() == ValueKind::Date {
            FieldValue::Date(DateValue::parse_lenient(cell))
        } else {
            coerce(*field, cell).map_err(|e| StoreError::Malformed {
                row,
                column: *field,
                message: e.message,
            })?
        };
        task_order.insert(*field, value);
    }

    Ok(task_order)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    const HEADER: &str = "Contractor,Task Order #,Total Amount,Feeder ID,Feeder Total Miles,# of Work Orders,Task Order Start Date,Task Order End Date\n";

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("task_orders_store_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn row(key: &str, start: &str) -> TaskOrder {
        TaskOrder::new()
            .with(Field::TaskOrderNumber, FieldValue::Text(key.to_owned()))
            .with(Field::StartDate, FieldValue::Date(DateValue::parse_lenient(start)))
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = scratch("missing");
        let store = Store::load(&dir.join("task_orders.csv")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn empty_store_saves_header_only() {
        let dir = scratch("header_only");
        let path = dir.join("nested").join("task_orders.csv");
        Store::new().save(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), HEADER);
        assert!(!tmp_path(&path).exists());
        assert!(Store::load(&path).unwrap().is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rows_survive_save_and_load() {
        let dir = scratch("reload");
        let path = dir.join("task_orders.csv");

        let mut store = Store::new();
        store.push(
            row("TO-1", "01/15/2024")
                .with(
                    Field::Contractor,
                    FieldValue::Text("Ceres Environmental Services, Inc.".to_owned()),
                )
                .with(Field::TotalAmount, coerce(Field::TotalAmount, "12,500.00").unwrap())
                .with(Field::FeederTotalMiles, FieldValue::Decimal(3.5))
                .with(Field::WorkOrderCount, FieldValue::Integer(7)),
        );
        store.push(row("TO-2", "13/45/24"));
        store.save(&path).unwrap();

        let loaded = Store::load(&path).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(
            loaded.rows()[1].get(Field::StartDate),
            Some(&FieldValue::Date(DateValue::Raw("13/45/24".to_owned())))
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_foreign_header() {
        let csv = "Task Order #,Contractor\nTO-1,Acme\n";
        assert!(matches!(
            Store::from_reader(csv.as_bytes()),
            Err(StoreError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn rejects_malformed_numeric_cell() {
        let csv = format!("{HEADER},TO-1,lots,,,,,\n");
        assert!(matches!(
            Store::from_reader(csv.as_bytes()),
            Err(StoreError::Malformed {
                row: 1,
                column: Field::TotalAmount,
                ..
            })
        ));
    }

    #[test]
    fn rejects_short_rows() {
        let csv = format!("{HEADER}Acme,TO-1\n");
        assert!(matches!(
            Store::from_reader(csv.as_bytes()),
            Err(StoreError::Csv(_))
        ));
    }

    #[test]
    fn sorts_newest_first_with_unparseable_and_missing_last() {
        let mut store = Store::new();
        store.push(row("A", "01/15/2023"));
        store.push(row("B", "garbage"));
        store.push(row("C", "06/01/2024"));
        store.push(TaskOrder::new().with(Field::TaskOrderNumber, FieldValue::Text("D".to_owned())));
        store.push(row("E", "02/29/2024"));
        store.sort_by_start_date_desc();

        let keys: Vec<&str> = store
            .rows()
            .iter()
            .filter_map(TaskOrder::task_order_number)
            .collect();
        assert_eq!(keys, vec!["C", "E", "A", "B", "D"]);

        let dates: Vec<NaiveDate> = store.rows().iter().filter_map(TaskOrder::start_date).collect();
        assert!(dates.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn contains_matches_exact_keys() {
        let mut store = Store::new();
        store.push(row("TO-2024-001", "01/15/2024"));
        assert!(store.contains("TO-2024-001"));
        assert!(!store.contains("TO-2024-00"));
        assert!(!store.contains(""));
    }
}
