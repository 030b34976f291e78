use crate::backend::MutableTable;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Null,
    Div0,
    Value,
    Ref,
    Name,
    Num,
    NA,
    /// No row in the target table matched the base record.
    NotFound,
    /// A write targeted a column the data source refuses to update.
    ReadOnly,
    /// The data source rejected the write because the row changed underneath it.
    Conflict,
}

impl ErrorKind {
    pub fn as_code(self) -> &'static str {
        match self {
            ErrorKind::Null => "#NULL!",
            ErrorKind::Div0 => "#DIV/0!",
            ErrorKind::Value => "#VALUE!",
            ErrorKind::Ref => "#REF!",
            ErrorKind::Name => "#NAME?",
            ErrorKind::Num => "#NUM!",
            ErrorKind::NA => "#N/A",
            ErrorKind::NotFound => "#NOTFOUND!",
            ErrorKind::ReadOnly => "#READONLY!",
            ErrorKind::Conflict => "#CONFLICT!",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// An error flowing through evaluation as an ordinary value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    pub kind: ErrorKind,
    pub message: Option<String>,
}

impl ErrorValue {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} {message}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for ErrorValue {}

/// Record value with unique, case-sensitive field names.
///
/// Fields keep insertion order for display and iteration; equality ignores order.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
    field_index: HashMap<String, usize>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let idx = self.field_index.get(name).copied()?;
        self.fields.get(idx).map(|(_, value)| value)
    }

    /// Sets `name` to `value`, returning the previous value.
    ///
    /// Overwriting keeps the field at its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        let name = name.into();
        if let Some(&idx) = self.field_index.get(&name) {
            return Some(std::mem::replace(&mut self.fields[idx].1, value));
        }
        self.field_index.insert(name.clone(), self.fields.len());
        self.fields.push((name, value));
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Whether every field of `other` is present here with an equal value.
    pub fn matches(&self, other: &Record) -> bool {
        other
            .iter()
            .all(|(name, value)| self.get(name).is_some_and(|v| v == value))
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.matches(other)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (name, value)) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

/// Runtime handle to a table.
///
/// A `Mutable` table forwards updates to its backend. A `Snapshot` is a plain list of rows
/// (e.g. the result of a table literal) and cannot be patched.
#[derive(Clone)]
pub enum TableValue {
    Mutable(Arc<dyn MutableTable>),
    Snapshot(Arc<Vec<Record>>),
}

impl TableValue {
    pub fn mutable(&self) -> Option<&Arc<dyn MutableTable>> {
        match self {
            TableValue::Mutable(table) => Some(table),
            TableValue::Snapshot(_) => None,
        }
    }
}

impl fmt::Debug for TableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableValue::Mutable(table) => f.debug_tuple("Mutable").field(&table.name()).finish(),
            TableValue::Snapshot(rows) => f.debug_tuple("Snapshot").field(&rows.len()).finish(),
        }
    }
}

impl PartialEq for TableValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TableValue::Mutable(a), TableValue::Mutable(b)) => Arc::ptr_eq(a, b),
            (TableValue::Snapshot(a), TableValue::Snapshot(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Blank,
    Number(f64),
    Text(String),
    Bool(bool),
    Error(ErrorValue),
    Record(Record),
    Table(TableValue),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Blank => "blank",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Bool(_) => "boolean",
            Value::Error(_) => "error",
            Value::Record(_) => "record",
            Value::Table(_) => "table",
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}

impl From<ErrorValue> for Value {
    fn from(value: ErrorValue) -> Self {
        Value::Error(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Blank => f.write_str(""),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Error(e) => write!(f, "{e}"),
            Value::Record(r) => write!(f, "{r}"),
            Value::Table(t) => match t {
                TableValue::Mutable(table) => write!(f, "<table {}>", table.name()),
                TableValue::Snapshot(rows) => write!(f, "<table of {} rows>", rows.len()),
            },
        }
    }
}

/// A value that is produced on demand.
///
/// `force` consumes the producer, so it runs at most once.
pub struct DeferredValue {
    producer: Box<dyn FnOnce() -> BoxFuture<'static, Value> + Send>,
}

impl DeferredValue {
    pub fn new<F>(producer: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'static, Value> + Send + 'static,
    {
        Self {
            producer: Box::new(producer),
        }
    }

    /// Wraps an already-computed value.
    pub fn ready(value: Value) -> Self {
        Self::new(move || Box::pin(async move { value }))
    }

    pub async fn force(self) -> Value {
        (self.producer)().await
    }
}

impl fmt::Debug for DeferredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeferredValue(..)")
    }
}
