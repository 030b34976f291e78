use crate::cancel::CancellationToken;
use crate::value::{ErrorKind, ErrorValue, Record, Value};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Storage abstraction for tables that `Patch` can write to.
///
/// Implementations own locking, durability and atomicity of the row update. `Patch` issues at most
/// one `update` per call, always with a fully merged change-record.
#[async_trait]
pub trait MutableTable: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Applies `changes` to the row identified by `base` and returns the updated row.
    ///
    /// Domain failures (missing row, rejected column, ...) are reported as [`ErrorValue`]s and
    /// surface unchanged as the result of the `Patch` call.
    async fn update(
        &self,
        base: &Record,
        changes: &Record,
        cancel: &CancellationToken,
    ) -> Result<Record, ErrorValue>;
}

/// Row-oriented table held in memory.
#[derive(Debug)]
pub struct InMemoryTable {
    name: String,
    columns: Vec<String>,
    column_index: HashMap<String, usize>,
    read_only: BTreeSet<String>,
    rows: RwLock<Vec<Vec<Value>>>,
    update_calls: AtomicUsize,
}

impl InMemoryTable {
    pub fn new(name: impl Into<String>, columns: Vec<impl Into<String>>) -> Self {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let column_index = columns
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.clone(), idx))
            .collect();

        Self {
            name: name.into(),
            columns,
            column_index,
            read_only: BTreeSet::new(),
            rows: RwLock::new(Vec::new()),
            update_calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_read_only<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read_only.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Appends a row; values are matched to columns by position.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), ErrorValue> {
        if row.len() != self.columns.len() {
            return Err(ErrorValue::with_message(
                ErrorKind::Value,
                format!(
                    "schema mismatch for {}: expected {} values, got {}",
                    self.name,
                    self.columns.len(),
                    row.len()
                ),
            ));
        }
        self.rows.get_mut().push(row);
        Ok(())
    }

    pub async fn rows(&self) -> Vec<Record> {
        let rows = self.rows.read().await;
        rows.iter().map(|row| self.to_record(row)).collect()
    }

    /// Number of `update` calls received, whether or not they succeeded.
    pub fn update_count(&self) -> usize {
        self.update_calls.load(Ordering::Relaxed)
    }

    fn to_record(&self, row: &[Value]) -> Record {
        self.columns
            .iter()
            .cloned()
            .zip(row.iter().cloned())
            .collect()
    }

    fn row_matches(&self, row: &[Value], base: &Record) -> bool {
        base.iter().all(|(name, value)| {
            self.column_index
                .get(name)
                .and_then(|&idx| row.get(idx))
                .is_some_and(|cell| cell == value)
        })
    }

    fn validate_changes(&self, changes: &Record) -> Result<Vec<(usize, Value)>, ErrorValue> {
        let mut writes = Vec::with_capacity(changes.len());
        for (name, value) in changes.iter() {
            let Some(&idx) = self.column_index.get(name) else {
                return Err(ErrorValue::with_message(
                    ErrorKind::Value,
                    format!("unknown column {}[{name}]", self.name),
                ));
            };
            if self.read_only.contains(name) {
                return Err(ErrorValue::with_message(
                    ErrorKind::ReadOnly,
                    format!("column {}[{name}] is read-only", self.name),
                ));
            }
            writes.push((idx, value.clone()));
        }
        Ok(writes)
    }
}

#[async_trait]
impl MutableTable for InMemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn update(
        &self,
        base: &Record,
        changes: &Record,
        _cancel: &CancellationToken,
    ) -> Result<Record, ErrorValue> {
        self.update_calls.fetch_add(1, Ordering::Relaxed);
        let writes = self.validate_changes(changes)?;

        let mut rows = self.rows.write().await;
        let Some(row) = rows.iter_mut().find(|row| self.row_matches(row, base)) else {
            return Err(ErrorValue::with_message(
                ErrorKind::NotFound,
                format!("no row in {} matches {base}", self.name),
            ));
        };
        for (idx, value) in writes {
            row[idx] = value;
        }
        log::debug!("updated row in {} with {} field(s)", self.name, changes.len());
        Ok(self.to_record(row))
    }
}
