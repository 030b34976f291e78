//! Type checking and evaluation of `Patch`, the merge-update function of the formula language.
//!
//! `Patch(table, base, change, ...)` finds the row of `table` matching `base`, merges every
//! change-record into one (later records win) and asks the table to apply it.
mod backend;
mod cancel;
mod config;
mod diagnostics;
mod function;
mod invoke;
mod merge;
mod semantic;
mod signature;
mod types;
mod value;

pub use crate::backend::{InMemoryTable, MutableTable};
pub use crate::cancel::{CancellationToken, Cancelled};
pub use crate::config::PatchFeatures;
pub use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Diagnostics, Severity};
pub use crate::function::PatchFunction;
pub use crate::invoke::{invoke_patch, PatchArgs, PatchCall, PatchError, PatchResult, PatchState};
pub use crate::merge::{merge_records, MergeError};
pub use crate::semantic::{validate_semantics, ArgBinding};
pub use crate::signature::{check_signature, CheckContext, CoercionMap, SignatureCheck};
pub use crate::types::{
    DataSourceTag, FormulaType, RecordType, StructuralTypeSystem, TableType, TypeSystem,
    UnionConflict,
};
pub use crate::value::{DeferredValue, ErrorKind, ErrorValue, Record, TableValue, Value};
