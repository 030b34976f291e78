//! Runtime half of `Patch`.
//!
//! A call moves through [`PatchState`] one step at a time:
//!
//! 1. argument 0 (the table) is forced on its own, so any effect needed to produce the table
//!    reference is committed before anything else happens;
//! 2. a Blank/Error table or base record ends the call with that value;
//! 3. the change-records are merged (later arguments win);
//! 4. the merged record is handed to the table's [`MutableTable::update`].
//!
//! Cancellation is checked before each step. Once it is observed no merge or update happens.
use crate::backend::MutableTable;
use crate::cancel::{CancellationToken, Cancelled};
use crate::merge::{merge_records, MergeError};
use crate::value::{DeferredValue, TableValue, Value};
use std::sync::Arc;

pub type PatchResult<T> = Result<T, PatchError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    /// A change-record was not a record.
    #[error("internal error: {0}")]
    NotARecord(#[from] MergeError),

    #[error("internal error: base record is a {found}, expected a record")]
    BaseNotARecord { found: &'static str },

    #[error("internal error: argument 0 is a {found}, expected a table")]
    NotATable { found: &'static str },

    #[error("internal error: table is not mutable")]
    TableNotMutable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
    Init,
    Arg0Ready,
    Arg1Checked,
    Merged,
    Delegated,
    Done,
}

/// Arguments of one `Patch` call.
///
/// The table is deferred; every other argument has already been evaluated.
#[derive(Debug)]
pub struct PatchArgs {
    pub table: DeferredValue,
    pub base: Value,
    pub changes: Vec<Value>,
}

impl PatchArgs {
    pub fn new(table: DeferredValue, base: Value, changes: Vec<Value>) -> Self {
        Self {
            table,
            base,
            changes,
        }
    }
}

/// Drives a single `Patch` invocation.
#[derive(Debug)]
pub struct PatchCall {
    state: PatchState,
}

impl Default for PatchCall {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchCall {
    pub fn new() -> Self {
        Self {
            state: PatchState::Init,
        }
    }

    /// Last state reached; a short-circuited call stays in the state it stopped at.
    pub fn state(&self) -> PatchState {
        self.state
    }

    fn advance(&mut self, next: PatchState) {
        log::trace!("Patch: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub async fn run(&mut self, args: PatchArgs, cancel: &CancellationToken) -> PatchResult<Value> {
        let PatchArgs {
            table,
            base,
            changes,
        } = args;

        cancel.check()?;
        let table = table.force().await;
        self.advance(PatchState::Arg0Ready);

        let table = match table {
            Value::Blank | Value::Error(_) => return Ok(table),
            Value::Table(table) => table,
            other @ (Value::Number(_)
            | Value::Text(_)
            | Value::Bool(_)
            | Value::Record(_)) => {
                log::warn!("Patch invoked with a {} as its table", other.kind_name());
                return Err(PatchError::NotATable {
                    found: other.kind_name(),
                });
            }
        };

        let base = match base {
            Value::Blank | Value::Error(_) => return Ok(base),
            Value::Record(record) => record,
            other @ (Value::Number(_) | Value::Text(_) | Value::Bool(_) | Value::Table(_)) => {
                log::warn!("Patch invoked with a {} as its base record", other.kind_name());
                return Err(PatchError::BaseNotARecord {
                    found: other.kind_name(),
                });
            }
        };
        self.advance(PatchState::Arg1Checked);

        cancel.check()?;
        let changes = merge_records(&changes, 2)?;
        self.advance(PatchState::Merged);

        cancel.check()?;
        let target = mutable_table(&table)?;
        let result = target.update(&base, &changes, cancel).await;
        self.advance(PatchState::Delegated);

        let value = match result {
            Ok(row) => Value::Record(row),
            Err(err) => {
                log::debug!("Patch on {} failed: {err}", target.name());
                Value::Error(err)
            }
        };
        self.advance(PatchState::Done);
        Ok(value)
    }
}

fn mutable_table(table: &TableValue) -> PatchResult<Arc<dyn MutableTable>> {
    table
        .mutable()
        .cloned()
        .ok_or(PatchError::TableNotMutable)
}

/// Convenience wrapper around [`PatchCall::run`] for callers that don't inspect the state.
pub async fn invoke_patch(args: PatchArgs, cancel: &CancellationToken) -> PatchResult<Value> {
    PatchCall::new().run(args, cancel).await
}
