use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::types::{FormulaType, TypeSystem};
use std::collections::BTreeSet;

/// What the first argument of a `Patch` call was bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgBinding {
    /// A named variable, e.g. a collection created by the host.
    Variable { name: String, mutable: bool },
    /// A connected data source.
    DataSource { name: String, writable: bool },
    /// Any other expression (function call, table literal, ...).
    Expression,
}

impl ArgBinding {
    pub fn is_mutable(&self) -> bool {
        match self {
            ArgBinding::Variable { mutable, .. } => *mutable,
            ArgBinding::DataSource { writable, .. } => *writable,
            ArgBinding::Expression => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            ArgBinding::Variable { name, .. } => format!("variable '{name}'"),
            ArgBinding::DataSource { name, .. } => format!("data source '{name}'"),
            ArgBinding::Expression => "this expression".to_string(),
        }
    }
}

/// Checks that the call writes to something mutable and leaves read-only columns alone.
///
/// Runs independently of signature checking. The base record (argument 1) is only used to locate
/// the row and may mention read-only columns. Read-only columns are those declared by the data
/// sources `types` associates with the table.
pub fn validate_semantics(
    types: &dyn TypeSystem,
    target: &ArgBinding,
    arg_types: &[FormulaType],
    sink: &mut dyn DiagnosticSink,
) {
    if !target.is_mutable() {
        sink.emit(Diagnostic::error(
            0,
            DiagnosticKind::NotMutable,
            format!("{} cannot be modified", target.describe()),
        ));
    }

    let Some(table_type) = arg_types.first().filter(|ty| types.is_table(ty)) else {
        return;
    };
    let sources = types.associated_data_sources(table_type);
    let read_only: BTreeSet<&str> = sources
        .iter()
        .flat_map(|tag| tag.read_only_columns.iter().map(String::as_str))
        .collect();
    if read_only.is_empty() {
        return;
    }

    for (idx, arg_type) in arg_types.iter().enumerate().skip(2) {
        let Some(record) = arg_type.as_record() else {
            continue;
        };
        for field in record.field_names().filter(|f| read_only.contains(f)) {
            sink.emit(
                Diagnostic::error(
                    idx,
                    DiagnosticKind::ReadOnlyField,
                    format!("column '{field}' is read-only and cannot be changed"),
                )
                .with_field(field),
            );
        }
    }
}
