//! Per-assay label derivation.
//!
//! Rows are grouped by compound identifier and each group collapses to one
//! [`Label`]: active when any outcome contains the assay's active marker,
//! inactive otherwise, and missing as soon as one outcome in the group is not
//! text at all.

use std::collections::BTreeMap;

use crate::domain::{AssayId, Label};
use crate::extract::RawRow;
use crate::fusion::AssayTable;

pub fn derive_labels(assay: &AssayId, rows: &[RawRow]) -> AssayTable {
    let marker = assay.kind().active_marker();

    let mut groups: BTreeMap<&str, Vec<Option<&str>>> = BTreeMap::new();
    for row in rows {
        groups
            .entry(row.compound_id.as_str())
            .or_default()
            .push(row.outcome.as_deref());
    }

    let labels = groups
        .into_iter()
        .map(|(compound, outcomes)| (compound.to_string(), classify(&outcomes, marker)))
        .collect();
    AssayTable::new(assay.column_name(), labels)
}

fn classify(outcomes: &[Option<&str>], marker: &str) -> Label {
    if outcomes.iter().any(Option::is_none) {
        return Label::Missing;
    }
    if outcomes.iter().flatten().any(|outcome| outcome.contains(marker)) {
        Label::Active
    } else {
        Label::Inactive
    }
}
