//! Static checking of `Patch(table, base, change, ...)` argument types.
//!
//! Argument 0 must be a table; everything after it must be a record whose field names exist in the
//! table's row type. All bad arguments are reported in one pass: only a non-table argument 0 (or an
//! unusable argument count) stops the check early.
use crate::config::PatchFeatures;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::types::{FormulaType, RecordType, TypeSystem};
use std::collections::BTreeMap;

/// Argument position to the type that argument must be converted to before use.
pub type CoercionMap = BTreeMap<usize, FormulaType>;

/// Everything the signature checker needs besides the argument types.
pub struct CheckContext<'a> {
    pub types: &'a dyn TypeSystem,
    pub features: &'a PatchFeatures,
    pub sink: &'a mut dyn DiagnosticSink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureCheck {
    pub valid: bool,
    /// The merged row type. Only meaningful when `valid` is `true`.
    pub return_type: FormulaType,
    pub coercions: CoercionMap,
}

impl SignatureCheck {
    fn invalid() -> Self {
        Self {
            valid: false,
            return_type: FormulaType::Error,
            coercions: CoercionMap::new(),
        }
    }
}

pub fn check_signature(arg_types: &[FormulaType], cx: &mut CheckContext<'_>) -> SignatureCheck {
    if !cx.features.accepts_arity(arg_types.len()) {
        let expected = match cx.features.max_arity() {
            Some(max) => format!("{} to {max}", PatchFeatures::MIN_ARITY),
            None => format!("at least {}", PatchFeatures::MIN_ARITY),
        };
        cx.sink.emit(Diagnostic::error(
            arg_types.len().saturating_sub(1),
            DiagnosticKind::InvalidArity,
            format!("Patch expects {expected} arguments, got {}", arg_types.len()),
        ));
        return SignatureCheck::invalid();
    }

    let table_type = match &arg_types[0] {
        FormulaType::Table(table) if cx.types.is_table(&arg_types[0]) => table,
        _ => {
            cx.sink.emit(Diagnostic::error(
                0,
                DiagnosticKind::NeedsTable,
                "Patch needs a valid table reference as its first argument",
            ));
            return SignatureCheck::invalid();
        }
    };

    let table_tags = cx.types.associated_data_sources(&arg_types[0]);
    let row_type = FormulaType::Record(table_type.row().clone());
    let mut return_type = if table_type.is_error() {
        FormulaType::Record(RecordType::new())
    } else {
        row_type.clone()
    };

    let mut valid = true;
    let mut coercions = CoercionMap::new();

    for (idx, arg_type) in arg_types.iter().enumerate().skip(1) {
        if !cx.types.is_record(arg_type) {
            cx.sink.emit(Diagnostic::error(
                idx,
                DiagnosticKind::NeedsRecord,
                format!("expected a record, found {arg_type}"),
            ));
            valid = false;
            continue;
        }

        let mut safe_to_union = true;
        if let Err(missing) = cx
            .types
            .check_field_names(arg_type, &row_type, cx.features)
        {
            for field in missing {
                cx.sink.emit(
                    Diagnostic::error(
                        idx,
                        DiagnosticKind::UnknownField,
                        format!("the table has no column named '{field}'"),
                    )
                    .with_field(field),
                );
            }
            valid = false;
            safe_to_union = false;
        }

        let exact = cx.types.accepts(&row_type, arg_type, true, cx.features);
        let union_with = if !exact && cx.features.allow_coercion {
            match cx
                .types
                .try_get_coercion_target(arg_type, &row_type, cx.features)
            {
                Some(target) => {
                    if &target != arg_type {
                        log::debug!("Patch argument {idx} coerced from {arg_type} to {target}");
                        coercions.insert(idx, target.clone());
                    }
                    Some(target)
                }
                None => {
                    // Missing columns were already reported by the field name check.
                    if safe_to_union {
                        cx.sink.emit(Diagnostic::error(
                            idx,
                            DiagnosticKind::CoercionFailed,
                            format!("{arg_type} cannot be converted to the table's row type"),
                        ));
                    }
                    valid = false;
                    None
                }
            }
        } else {
            Some(arg_type.clone())
        };

        let Some(union_with) = union_with.filter(|_| safe_to_union) else {
            continue;
        };
        return_type = match cx.types.union(&return_type, &union_with, cx.features) {
            Ok(merged) => merged,
            Err(conflict) => {
                for field in &conflict.fields {
                    cx.sink.emit(
                        Diagnostic::error(
                            idx,
                            DiagnosticKind::IncompatibleRecord,
                            format!("column '{field}' has a type incompatible with the table"),
                        )
                        .with_field(field.clone()),
                    );
                }
                if conflict.fields.is_empty() {
                    cx.sink.emit(Diagnostic::error(
                        idx,
                        DiagnosticKind::IncompatibleRecord,
                        format!("{union_with} is incompatible with the table's row type"),
                    ));
                }
                valid = false;
                conflict.partial
            }
        };
    }

    if let FormulaType::Record(record) = &mut return_type {
        record.add_data_sources(&table_tags);
    }

    SignatureCheck {
        valid,
        return_type,
        coercions,
    }
}
