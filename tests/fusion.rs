use assert_matches::assert_matches;

use kira_tox21::clarify::derive_labels;
use kira_tox21::domain::{AssayId, Label};
use kira_tox21::error::KiraError;
use kira_tox21::extract::RawRow;
use kira_tox21::fusion::{AssayTable, FusedTable, fuse};

fn table(column: &str, entries: &[(&str, Label)]) -> AssayTable {
    AssayTable::new(
        column,
        entries
            .iter()
            .map(|(compound, label)| (compound.to_string(), *label))
            .collect(),
    )
}

#[test]
fn two_assay_scenario() {
    let a: AssayId = "tox21-ar-bla-agonist-p1".parse().unwrap();
    let b: AssayId = "tox21-ar-bla-antagonist-p1".parse().unwrap();
    let table_a = derive_labels(
        &a,
        &[
            RawRow::new("c1", Some("active agonist")),
            RawRow::new("c2", Some("inactive")),
        ],
    );
    let table_b = derive_labels(
        &b,
        &[
            RawRow::new("c1", Some("active antagonist")),
            RawRow::new("c3", None),
        ],
    );
    assert_eq!(table_b.get("c3"), Some(Label::Missing));

    let fused = fuse(vec![table_a, table_b]).unwrap();

    assert_eq!(fused.columns(), &["ar-bla-agonist-p1", "ar-bla-antagonist-p1"]);
    assert_eq!(fused.len(), 3);
    assert_eq!(
        fused.row("c1").unwrap().labels,
        vec![Label::Active, Label::Active]
    );
    assert_eq!(
        fused.row("c2").unwrap().labels,
        vec![Label::Inactive, Label::Missing]
    );
    assert_eq!(
        fused.row("c3").unwrap().labels,
        vec![Label::Missing, Label::Missing]
    );
}

#[test]
fn union_of_identifiers_is_kept() {
    let fused = fuse(vec![
        table("a", &[("c1", Label::Active), ("c2", Label::Inactive)]),
        table("b", &[("c3", Label::Inactive)]),
        table("c", &[("c2", Label::Active), ("c4", Label::Missing)]),
    ])
    .unwrap();

    let mut compounds = fused.compounds().collect::<Vec<_>>();
    compounds.sort();
    assert_eq!(compounds, vec!["c1", "c2", "c3", "c4"]);
    assert_eq!(fused.get("c1", "b"), Some(Label::Missing));
    assert_eq!(fused.get("c1", "c"), Some(Label::Missing));
    assert_eq!(fused.get("c2", "a"), Some(Label::Inactive));
    assert_eq!(fused.get("c2", "b"), Some(Label::Missing));
    assert_eq!(fused.get("c2", "c"), Some(Label::Active));
    assert_eq!(fused.get("c3", "a"), Some(Label::Missing));
    assert_eq!(fused.get("c4", "c"), Some(Label::Missing));
    assert_eq!(fused.get("c9", "a"), None);
    assert_eq!(fused.get("c1", "zz"), None);
}

#[test]
fn rows_keep_first_seen_order() {
    let fused = fuse(vec![
        table("a", &[("c2", Label::Active), ("c1", Label::Active)]),
        table("b", &[("c3", Label::Inactive), ("c1", Label::Inactive)]),
    ])
    .unwrap();
    assert_eq!(fused.compounds().collect::<Vec<_>>(), vec!["c2", "c1", "c3"]);
}

#[test]
fn join_order_does_not_change_row_or_value_sets() {
    let tables = vec![
        table("a", &[("c1", Label::Active), ("c2", Label::Inactive)]),
        table("b", &[("c2", Label::Missing), ("c3", Label::Active)]),
        table("c", &[("c4", Label::Inactive)]),
    ];
    let mut reversed = tables.clone();
    reversed.reverse();

    let forward = fuse(tables).unwrap();
    let backward = fuse(reversed).unwrap();

    assert_eq!(forward.len(), backward.len());
    for compound in forward.compounds() {
        for column in forward.columns() {
            assert_eq!(
                forward.get(compound, column),
                backward.get(compound, column)
            );
        }
    }
}

#[test]
fn empty_assay_adds_all_missing_column() {
    let fused = fuse(vec![
        table("a", &[("c1", Label::Active), ("c2", Label::Inactive)]),
        AssayTable::empty("b"),
    ])
    .unwrap();

    assert_eq!(fused.columns(), &["a", "b"]);
    assert_eq!(fused.len(), 2);
    assert_eq!(fused.get("c1", "b"), Some(Label::Missing));
    assert_eq!(fused.get("c2", "b"), Some(Label::Missing));
}

#[test]
fn empty_first_assay_still_contributes_column() {
    let fused = fuse(vec![
        AssayTable::empty("a"),
        table("b", &[("c1", Label::Active)]),
    ])
    .unwrap();
    assert_eq!(fused.columns(), &["a", "b"]);
    assert_eq!(
        fused.row("c1").unwrap().labels,
        vec![Label::Missing, Label::Active]
    );
}

#[test]
fn duplicate_label_column_is_a_conflict() {
    let err = fuse(vec![
        table("ahr-p1", &[("c1", Label::Active)]),
        table("ahr-p1", &[("c2", Label::Inactive)]),
    ])
    .unwrap_err();
    assert_matches!(err, KiraError::FusionConflict(column) if column == "ahr-p1");
}

#[test]
fn compound_column_name_is_reserved() {
    let err = FusedTable::default()
        .join(table("smiles", &[("c1", Label::Active)]))
        .unwrap_err();
    assert_matches!(err, KiraError::FusionConflict(_));
}

#[test]
fn fusing_nothing_is_empty() {
    let fused = fuse(Vec::new()).unwrap();
    assert!(fused.is_empty());
    assert!(fused.columns().is_empty());
}
