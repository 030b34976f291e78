//! Static types for `Patch` and the capability the checker uses to compare them.
//!
//! Record and table types are structural: a record type is a set of named, typed fields plus the
//! data sources it descends from. A table type is a record type (its row) with table-ness. The
//! [`TypeSystem`] trait answers the acceptance, coercion and union questions the signature checker
//! asks; [`StructuralTypeSystem`] is the implementation used when the host has no type system of
//! its own.
use crate::config::PatchFeatures;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifies the data source a record or table type descends from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataSourceTag {
    pub name: String,
    /// Columns the data source refuses to write.
    pub read_only_columns: BTreeSet<String>,
}

impl DataSourceTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            read_only_columns: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_read_only<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read_only_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordType {
    fields: BTreeMap<String, FormulaType>,
    data_sources: BTreeSet<DataSourceTag>,
}

impl RecordType {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, ty: FormulaType) -> Self {
        self.fields.insert(name.into(), ty);
        self
    }

    #[must_use]
    pub fn with_data_source(mut self, tag: DataSourceTag) -> Self {
        self.data_sources.insert(tag);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FormulaType> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FormulaType)> {
        self.fields.iter().map(|(name, ty)| (name.as_str(), ty))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn data_sources(&self) -> &BTreeSet<DataSourceTag> {
        &self.data_sources
    }

    pub fn add_data_sources<'a>(&mut self, tags: impl IntoIterator<Item = &'a DataSourceTag>) {
        self.data_sources.extend(tags.into_iter().cloned());
    }

    pub(crate) fn insert_field(&mut self, name: impl Into<String>, ty: FormulaType) {
        self.fields.insert(name.into(), ty);
    }
}

impl<K: Into<String>> FromIterator<(K, FormulaType)> for RecordType {
    fn from_iter<I: IntoIterator<Item = (K, FormulaType)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            data_sources: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableType {
    row: RecordType,
    is_error: bool,
}

impl TableType {
    pub fn new(row: RecordType) -> Self {
        Self {
            row,
            is_error: false,
        }
    }

    /// A table type produced by a failed binding; its row carries no usable schema.
    pub fn error() -> Self {
        Self {
            row: RecordType::new(),
            is_error: true,
        }
    }

    pub fn row(&self) -> &RecordType {
        &self.row
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormulaType {
    Blank,
    Boolean,
    Number,
    Decimal,
    Text,
    Date,
    DateTime,
    Time,
    Record(RecordType),
    Table(TableType),
    Error,
}

impl FormulaType {
    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, FormulaType)>) -> Self {
        FormulaType::Record(fields.into_iter().collect())
    }

    pub fn table<K: Into<String>>(fields: impl IntoIterator<Item = (K, FormulaType)>) -> Self {
        FormulaType::Table(TableType::new(fields.into_iter().collect()))
    }

    pub fn as_record(&self) -> Option<&RecordType> {
        match self {
            FormulaType::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableType> {
        match self {
            FormulaType::Table(table) => Some(table),
            _ => None,
        }
    }

    /// Row type for tables, the record itself for records.
    fn row_like(&self) -> Option<&RecordType> {
        match self {
            FormulaType::Record(record) => Some(record),
            FormulaType::Table(table) => Some(&table.row),
            _ => None,
        }
    }
}

fn fmt_fields(f: &mut fmt::Formatter<'_>, record: &RecordType) -> fmt::Result {
    f.write_str("{")?;
    for (idx, (name, ty)) in record.fields().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{name}: {ty}")?;
    }
    f.write_str("}")
}

impl fmt::Display for FormulaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaType::Blank => f.write_str("Blank"),
            FormulaType::Boolean => f.write_str("Boolean"),
            FormulaType::Number => f.write_str("Number"),
            FormulaType::Decimal => f.write_str("Decimal"),
            FormulaType::Text => f.write_str("Text"),
            FormulaType::Date => f.write_str("Date"),
            FormulaType::DateTime => f.write_str("DateTime"),
            FormulaType::Time => f.write_str("Time"),
            FormulaType::Record(record) => fmt_fields(f, record),
            FormulaType::Table(table) if table.is_error => f.write_str("Table<error>"),
            FormulaType::Table(table) => {
                f.write_str("[")?;
                fmt_fields(f, &table.row)?;
                f.write_str("]")
            }
            FormulaType::Error => f.write_str("Error"),
        }
    }
}

/// Two types could not be unified.
///
/// `partial` is the best-effort union, with conflicting fields typed [`FormulaType::Error`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("conflicting types for field(s) {}", .fields.join(", "))]
pub struct UnionConflict {
    pub partial: FormulaType,
    /// Dotted paths of the conflicting fields; empty when two scalars conflict.
    pub fields: Vec<String>,
}

/// Structural type questions asked while checking a call.
pub trait TypeSystem {
    fn is_table(&self, ty: &FormulaType) -> bool;

    fn is_record(&self, ty: &FormulaType) -> bool;

    /// Whether a value of type `source` may be used where `target` is expected without
    /// conversion. `exact` disallows any widening.
    fn accepts(
        &self,
        target: &FormulaType,
        source: &FormulaType,
        exact: bool,
        features: &PatchFeatures,
    ) -> bool;

    /// The type `source` must be converted to in order to be used as `target`, if any.
    fn try_get_coercion_target(
        &self,
        source: &FormulaType,
        target: &FormulaType,
        features: &PatchFeatures,
    ) -> Option<FormulaType>;

    fn union(
        &self,
        a: &FormulaType,
        b: &FormulaType,
        features: &PatchFeatures,
    ) -> Result<FormulaType, UnionConflict>;

    /// Checks that every field name of `source` exists in `target`.
    ///
    /// On failure returns the dotted paths of the missing fields.
    fn check_field_names(
        &self,
        source: &FormulaType,
        target: &FormulaType,
        features: &PatchFeatures,
    ) -> Result<(), Vec<String>>;

    fn associated_data_sources(&self, ty: &FormulaType) -> BTreeSet<DataSourceTag>;
}

/// Default structural [`TypeSystem`].
///
/// Record acceptance is partial: a target accepts a source record when every field the source
/// declares exists in the target with an accepting type.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralTypeSystem;

impl StructuralTypeSystem {
    fn record_accepts(
        &self,
        target: &RecordType,
        source: &RecordType,
        exact: bool,
        features: &PatchFeatures,
    ) -> bool {
        source.fields().all(|(name, source_ty)| {
            target
                .field(name)
                .is_some_and(|target_ty| self.accepts(target_ty, source_ty, exact, features))
        })
    }

    fn coerce_record(
        &self,
        source: &RecordType,
        target: &RecordType,
        features: &PatchFeatures,
    ) -> Option<RecordType> {
        let mut out = RecordType::new();
        out.add_data_sources(&source.data_sources);
        for (name, source_ty) in source.fields() {
            let target_ty = target.field(name)?;
            let coerced = self.try_get_coercion_target(source_ty, target_ty, features)?;
            out.insert_field(name, coerced);
        }
        Some(out)
    }

    fn union_record(
        &self,
        a: &RecordType,
        b: &RecordType,
        features: &PatchFeatures,
    ) -> (RecordType, Vec<String>) {
        let mut out = a.clone();
        out.add_data_sources(&b.data_sources);
        let mut conflicts = Vec::new();
        for (name, b_ty) in b.fields() {
            let merged = match out.field(name) {
                None => b_ty.clone(),
                Some(a_ty) => match self.union(a_ty, b_ty, features) {
                    Ok(ty) => ty,
                    Err(conflict) => {
                        if conflict.fields.is_empty() {
                            conflicts.push(name.to_string());
                        } else {
                            conflicts.extend(
                                conflict.fields.iter().map(|inner| format!("{name}.{inner}")),
                            );
                        }
                        conflict.partial
                    }
                },
            };
            out.insert_field(name, merged);
        }
        (out, conflicts)
    }

    fn missing_field_names(
        &self,
        source: &RecordType,
        target: &RecordType,
        prefix: &str,
        missing: &mut Vec<String>,
    ) {
        for (name, source_ty) in source.fields() {
            let path = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}.{name}")
            };
            let Some(target_ty) = target.field(name) else {
                missing.push(path);
                continue;
            };
            if let (Some(inner_source), Some(inner_target)) =
                (source_ty.row_like(), target_ty.row_like())
            {
                self.missing_field_names(inner_source, inner_target, &path, missing);
            }
        }
    }
}

fn scalar_coercible(source: &FormulaType, target: &FormulaType) -> bool {
    use FormulaType::*;
    matches!(
        (source, target),
        (Text, Number | Decimal | Boolean | Date | DateTime | Time)
            | (Number | Decimal | Boolean | Date | DateTime | Time, Text)
            | (Number | Decimal, Boolean)
            | (Boolean, Number | Decimal)
            | (Number | Decimal, Date | DateTime)
            | (Date, DateTime)
            | (DateTime, Date)
    )
}

impl TypeSystem for StructuralTypeSystem {
    fn is_table(&self, ty: &FormulaType) -> bool {
        matches!(ty, FormulaType::Table(_))
    }

    fn is_record(&self, ty: &FormulaType) -> bool {
        matches!(ty, FormulaType::Record(_))
    }

    fn accepts(
        &self,
        target: &FormulaType,
        source: &FormulaType,
        exact: bool,
        features: &PatchFeatures,
    ) -> bool {
        use FormulaType::*;
        match (target, source) {
            (Record(t), Record(s)) => self.record_accepts(t, s, exact, features),
            (Table(t), Table(s)) => self.record_accepts(&t.row, &s.row, exact, features),
            (Date | DateTime, Date | DateTime) if features.legacy_date_time => true,
            (Error, _) | (_, Error) => false,
            (t, s) if t == s => true,
            _ if exact => false,
            (_, Blank) => true,
            (Number | Decimal, Number | Decimal) => true,
            _ => false,
        }
    }

    fn try_get_coercion_target(
        &self,
        source: &FormulaType,
        target: &FormulaType,
        features: &PatchFeatures,
    ) -> Option<FormulaType> {
        match (source, target) {
            (FormulaType::Record(s), FormulaType::Record(t)) => {
                self.coerce_record(s, t, features).map(FormulaType::Record)
            }
            (FormulaType::Table(s), FormulaType::Table(t)) => self
                .coerce_record(&s.row, &t.row, features)
                .map(|row| FormulaType::Table(TableType::new(row))),
            (s, t) if self.accepts(t, s, false, features) => Some(s.clone()),
            (s, t) if scalar_coercible(s, t) => Some(t.clone()),
            _ => None,
        }
    }

    fn union(
        &self,
        a: &FormulaType,
        b: &FormulaType,
        features: &PatchFeatures,
    ) -> Result<FormulaType, UnionConflict> {
        use FormulaType::*;
        match (a, b) {
            (Record(x), Record(y)) => {
                let (merged, fields) = self.union_record(x, y, features);
                if fields.is_empty() {
                    Ok(Record(merged))
                } else {
                    Err(UnionConflict {
                        partial: Record(merged),
                        fields,
                    })
                }
            }
            (Table(x), Table(y)) => {
                let (merged, fields) = self.union_record(&x.row, &y.row, features);
                let table = Table(TableType {
                    row: merged,
                    is_error: x.is_error || y.is_error,
                });
                if fields.is_empty() {
                    Ok(table)
                } else {
                    Err(UnionConflict {
                        partial: table,
                        fields,
                    })
                }
            }
            (x, y) if x == y => Ok(x.clone()),
            (Blank, y) => Ok(y.clone()),
            (x, Blank) => Ok(x.clone()),
            (Number | Decimal, Number | Decimal) => Ok(a.clone()),
            (Date | DateTime, Date | DateTime) if features.legacy_date_time => Ok(a.clone()),
            _ => Err(UnionConflict {
                partial: Error,
                fields: Vec::new(),
            }),
        }
    }

    fn check_field_names(
        &self,
        source: &FormulaType,
        target: &FormulaType,
        _features: &PatchFeatures,
    ) -> Result<(), Vec<String>> {
        let (Some(source), Some(target)) = (source.row_like(), target.row_like()) else {
            return Ok(());
        };
        let mut missing = Vec::new();
        self.missing_field_names(source, target, "", &mut missing);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    fn associated_data_sources(&self, ty: &FormulaType) -> BTreeSet<DataSourceTag> {
        ty.row_like()
            .map(|record| record.data_sources.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn people() -> FormulaType {
        FormulaType::Record(
            RecordType::new()
                .with_field("Name", FormulaType::Text)
                .with_field("Age", FormulaType::Number),
        )
    }

    #[test]
    fn partial_records_are_accepted() {
        let ts = StructuralTypeSystem;
        let features = PatchFeatures::default();
        let change = FormulaType::record([("Age", FormulaType::Number)]);
        assert!(ts.accepts(&people(), &change, true, &features));

        let extra = FormulaType::record([("Height", FormulaType::Number)]);
        assert!(!ts.accepts(&people(), &extra, false, &features));
    }

    #[test]
    fn blank_fields_are_accepted_only_when_not_exact() {
        let ts = StructuralTypeSystem;
        let features = PatchFeatures::default();
        let change = FormulaType::record([("Age", FormulaType::Blank)]);
        assert!(ts.accepts(&people(), &change, false, &features));
        assert!(!ts.accepts(&people(), &change, true, &features));
    }

    #[test]
    fn coercion_target_keeps_only_source_fields() {
        let ts = StructuralTypeSystem;
        let features = PatchFeatures::default();
        let change = FormulaType::record([("Age", FormulaType::Text)]);
        assert_eq!(
            ts.try_get_coercion_target(&change, &people(), &features),
            Some(FormulaType::record([("Age", FormulaType::Number)]))
        );

        let bad = FormulaType::record([("Age", FormulaType::Record(RecordType::new()))]);
        assert_eq!(ts.try_get_coercion_target(&bad, &people(), &features), None);
    }

    #[test]
    fn legacy_date_time_makes_dates_interchangeable() {
        let ts = StructuralTypeSystem;
        let legacy = PatchFeatures {
            legacy_date_time: true,
            ..PatchFeatures::default()
        };
        assert!(ts.accepts(&FormulaType::DateTime, &FormulaType::Date, true, &legacy));
        assert!(!ts.accepts(
            &FormulaType::DateTime,
            &FormulaType::Date,
            true,
            &PatchFeatures::default()
        ));
    }

    #[test]
    fn union_reports_nested_conflicts_by_path() {
        let ts = StructuralTypeSystem;
        let features = PatchFeatures::default();
        let a = FormulaType::record([(
            "Address",
            FormulaType::record([("City", FormulaType::Text)]),
        )]);
        let b = FormulaType::record([(
            "Address",
            FormulaType::record([("City", FormulaType::Boolean)]),
        )]);
        let err = ts.union(&a, &b, &features).unwrap_err();
        assert_eq!(err.fields, vec!["Address.City".to_string()]);
    }

    #[test]
    fn union_keeps_data_sources_from_both_sides() {
        let ts = StructuralTypeSystem;
        let features = PatchFeatures::default();
        let a = FormulaType::Record(
            RecordType::new()
                .with_field("Id", FormulaType::Number)
                .with_data_source(DataSourceTag::new("People")),
        );
        let b = FormulaType::record([("Name", FormulaType::Text)]);
        let merged = ts.union(&a, &b, &features).unwrap();
        let tags = ts.associated_data_sources(&merged);
        assert_eq!(tags.len(), 1);
        assert_eq!(merged.as_record().unwrap().len(), 2);
    }

    #[test]
    fn field_name_check_lists_missing_paths() {
        let ts = StructuralTypeSystem;
        let features = PatchFeatures::default();
        let change = FormulaType::record([
            ("Nmae", FormulaType::Text),
            ("Age", FormulaType::Number),
        ]);
        assert_eq!(
            ts.check_field_names(&change, &people(), &features),
            Err(vec!["Nmae".to_string()])
        );
    }
}
