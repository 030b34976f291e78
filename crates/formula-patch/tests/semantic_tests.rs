mod common;

use formula_patch::{
    validate_semantics, ArgBinding, DataSourceTag, DiagnosticKind, Diagnostics, FormulaType,
    PatchFeatures, StructuralTypeSystem, TypeSystem, UnionConflict,
};
use std::collections::BTreeSet;
use pretty_assertions::assert_eq;

use common::{people_table_type, people_tag};

fn people_source() -> ArgBinding {
    ArgBinding::DataSource {
        name: "People".into(),
        writable: true,
    }
}

#[test]
fn writable_data_source_with_plain_changes_is_clean() {
    let mut diagnostics = Diagnostics::new();
    validate_semantics(
        &StructuralTypeSystem,
        &people_source(),
        &[
            people_table_type(),
            FormulaType::record([("Id", FormulaType::Number)]),
            FormulaType::record([("Age", FormulaType::Number)]),
        ],
        &mut diagnostics,
    );
    assert!(diagnostics.is_empty());
}

#[test]
fn immutable_targets_are_rejected() {
    let targets = [
        ArgBinding::Variable {
            name: "Snapshot".into(),
            mutable: false,
        },
        ArgBinding::DataSource {
            name: "Archive".into(),
            writable: false,
        },
        ArgBinding::Expression,
    ];

    for target in targets {
        let mut diagnostics = Diagnostics::new();
        validate_semantics(
            &StructuralTypeSystem,
            &target,
            &[people_table_type()],
            &mut diagnostics,
        );
        assert_eq!(diagnostics.kinds(), vec![DiagnosticKind::NotMutable]);
        assert_eq!(diagnostics.iter().next().unwrap().arg_index, 0);
    }

    let mutable = ArgBinding::Variable {
        name: "Orders".into(),
        mutable: true,
    };
    let mut diagnostics = Diagnostics::new();
    validate_semantics(
        &StructuralTypeSystem,
        &mutable,
        &[people_table_type()],
        &mut diagnostics,
    );
    assert!(diagnostics.is_empty());
}

#[test]
fn read_only_column_in_change_record_is_reported() {
    let mut diagnostics = Diagnostics::new();
    validate_semantics(
        &StructuralTypeSystem,
        &people_source(),
        &[
            people_table_type(),
            // The base record may name read-only columns: it only locates the row.
            FormulaType::record([("Id", FormulaType::Number)]),
            FormulaType::record([("Id", FormulaType::Number), ("Age", FormulaType::Number)]),
        ],
        &mut diagnostics,
    );

    assert_eq!(diagnostics.kinds(), vec![DiagnosticKind::ReadOnlyField]);
    let diag = diagnostics.iter().next().unwrap();
    assert_eq!(diag.arg_index, 2);
    assert_eq!(diag.field.as_deref(), Some("Id"));
}

#[test]
fn every_change_record_is_checked() {
    let mut diagnostics = Diagnostics::new();
    validate_semantics(
        &StructuralTypeSystem,
        &ArgBinding::Expression,
        &[
            people_table_type(),
            FormulaType::record([("Id", FormulaType::Number)]),
            FormulaType::record([("Id", FormulaType::Number)]),
            FormulaType::Text,
            FormulaType::record([("Id", FormulaType::Text)]),
        ],
        &mut diagnostics,
    );

    assert_eq!(
        diagnostics.kinds(),
        vec![
            DiagnosticKind::NotMutable,
            DiagnosticKind::ReadOnlyField,
            DiagnosticKind::ReadOnlyField,
        ]
    );
    let positions: Vec<_> = diagnostics.iter().map(|d| d.arg_index).collect();
    assert_eq!(positions, vec![0, 2, 4]);
}

#[test]
fn non_table_target_only_checks_mutability() {
    let mut diagnostics = Diagnostics::new();
    validate_semantics(
        &StructuralTypeSystem,
        &people_source(),
        &[
            FormulaType::Number,
            FormulaType::record([("Id", FormulaType::Number)]),
            FormulaType::record([("Id", FormulaType::Number)]),
        ],
        &mut diagnostics,
    );
    assert!(diagnostics.is_empty());
}

/// Type system that tracks data sources outside the types themselves.
struct CatalogTypes {
    sources: BTreeSet<DataSourceTag>,
}

impl TypeSystem for CatalogTypes {
    fn is_table(&self, ty: &FormulaType) -> bool {
        StructuralTypeSystem.is_table(ty)
    }

    fn is_record(&self, ty: &FormulaType) -> bool {
        StructuralTypeSystem.is_record(ty)
    }

    fn accepts(
        &self,
        target: &FormulaType,
        source: &FormulaType,
        exact: bool,
        features: &PatchFeatures,
    ) -> bool {
        StructuralTypeSystem.accepts(target, source, exact, features)
    }

    fn try_get_coercion_target(
        &self,
        source: &FormulaType,
        target: &FormulaType,
        features: &PatchFeatures,
    ) -> Option<FormulaType> {
        StructuralTypeSystem.try_get_coercion_target(source, target, features)
    }

    fn union(
        &self,
        a: &FormulaType,
        b: &FormulaType,
        features: &PatchFeatures,
    ) -> Result<FormulaType, UnionConflict> {
        StructuralTypeSystem.union(a, b, features)
    }

    fn check_field_names(
        &self,
        source: &FormulaType,
        target: &FormulaType,
        features: &PatchFeatures,
    ) -> Result<(), Vec<String>> {
        StructuralTypeSystem.check_field_names(source, target, features)
    }

    fn associated_data_sources(&self, ty: &FormulaType) -> BTreeSet<DataSourceTag> {
        if self.is_table(ty) {
            self.sources.clone()
        } else {
            BTreeSet::new()
        }
    }
}

#[test]
fn read_only_columns_come_from_the_type_system() {
    // The table type itself carries no data source.
    let untagged = FormulaType::table([
        ("Id", FormulaType::Number),
        ("Name", FormulaType::Text),
    ]);
    let arg_types = [
        untagged,
        FormulaType::record([("Id", FormulaType::Number)]),
        FormulaType::record([("Id", FormulaType::Number), ("Name", FormulaType::Text)]),
    ];

    let mut diagnostics = Diagnostics::new();
    validate_semantics(
        &StructuralTypeSystem,
        &people_source(),
        &arg_types,
        &mut diagnostics,
    );
    assert!(diagnostics.is_empty());

    let catalog = CatalogTypes {
        sources: BTreeSet::from([people_tag()]),
    };
    let mut diagnostics = Diagnostics::new();
    validate_semantics(&catalog, &people_source(), &arg_types, &mut diagnostics);
    assert_eq!(diagnostics.kinds(), vec![DiagnosticKind::ReadOnlyField]);
    let diag = diagnostics.iter().next().unwrap();
    assert_eq!(diag.arg_index, 2);
    assert_eq!(diag.field.as_deref(), Some("Id"));
}
