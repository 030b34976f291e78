#![allow(dead_code)]

use formula_patch::{
    CancellationToken, DataSourceTag, DeferredValue, ErrorValue, FormulaType, InMemoryTable,
    MutableTable, Record, RecordType, TableType, TableValue, Value,
};
use std::sync::{Arc, Mutex};

pub fn people_tag() -> DataSourceTag {
    DataSourceTag::new("People").with_read_only(["Id"])
}

pub fn people_row_type() -> RecordType {
    RecordType::new()
        .with_field("Id", FormulaType::Number)
        .with_field("Name", FormulaType::Text)
        .with_field("Age", FormulaType::Number)
        .with_data_source(people_tag())
}

pub fn people_table_type() -> FormulaType {
    FormulaType::Table(TableType::new(people_row_type()))
}

pub fn people_table() -> Arc<InMemoryTable> {
    let mut table = InMemoryTable::new("People", vec!["Id", "Name", "Age"]).with_read_only(["Id"]);
    table
        .push_row(vec![1.into(), "Alice".into(), 30.into()])
        .unwrap();
    table
        .push_row(vec![2.into(), "Bob".into(), 40.into()])
        .unwrap();
    Arc::new(table)
}

pub fn record(fields: &[(&str, Value)]) -> Value {
    Value::Record(fields.iter().cloned().collect())
}

pub fn deferred_table(table: Arc<dyn MutableTable>) -> DeferredValue {
    DeferredValue::ready(Value::Table(TableValue::Mutable(table)))
}

/// Table backend that records the order in which it is touched.
#[derive(Debug)]
pub struct RecordingTable {
    pub events: Arc<Mutex<Vec<String>>>,
    pub result: Result<Record, ErrorValue>,
}

impl RecordingTable {
    pub fn new(events: Arc<Mutex<Vec<String>>>, result: Result<Record, ErrorValue>) -> Self {
        Self { events, result }
    }
}

#[async_trait::async_trait]
impl MutableTable for RecordingTable {
    fn name(&self) -> &str {
        "Recording"
    }

    async fn update(
        &self,
        base: &Record,
        changes: &Record,
        _cancel: &CancellationToken,
    ) -> Result<Record, ErrorValue> {
        self.events
            .lock()
            .unwrap()
            .push(format!("update {base} with {changes}"));
        self.result.clone()
    }
}
