use crate::value::{Record, Value};

/// A non-record value reached the merger.
///
/// Signature checking rejects such calls, so this indicates an inconsistency between the checked
/// call and the values it was invoked with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("argument {arg_index} is a {found}, expected a record")]
pub struct MergeError {
    pub arg_index: usize,
    pub found: &'static str,
}

/// Merges record values in order into a single record.
///
/// Later records overwrite fields written by earlier ones; names compare exactly. `first_index` is
/// the argument position of the first record and is only used for error reporting.
pub fn merge_records<'a, I>(records: I, first_index: usize) -> Result<Record, MergeError>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut merged = Record::new();
    for (offset, value) in records.into_iter().enumerate() {
        let Value::Record(record) = value else {
            return Err(MergeError {
                arg_index: first_index + offset,
                found: value.kind_name(),
            });
        };
        for (name, field) in record.iter() {
            merged.insert(name, field.clone());
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(fields: &[(&str, Value)]) -> Value {
        Value::Record(fields.iter().cloned().collect())
    }

    #[test]
    fn later_records_win() {
        let a = record(&[("a", 1.into()), ("b", 2.into())]);
        let b = record(&[("b", 3.into()), ("c", 4.into())]);
        let merged = merge_records([&a, &b], 2).unwrap();

        let expected: Record = [("a", 1.into()), ("b", 3.into()), ("c", 4.into())]
            .into_iter()
            .collect();
        assert_eq!(merged, expected);
        assert_eq!(merged.field_names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn names_are_case_sensitive() {
        let a = record(&[("name", "x".into())]);
        let b = record(&[("Name", "y".into())]);
        let merged = merge_records([&a, &b], 2).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn no_records_merge_to_empty() {
        let merged = merge_records(std::iter::empty(), 2).unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn non_record_reports_its_position() {
        let a = record(&[("a", 1.into())]);
        let err = merge_records([&a, &Value::Blank], 2).unwrap_err();
        assert_eq!(
            err,
            MergeError {
                arg_index: 3,
                found: "blank"
            }
        );
    }
}
