//! Per-assay label tables and their fusion into one wide table.
//!
//! The fused table keeps one row per compound ever seen and one label column
//! per joined assay. Rows appear in first-seen order: compounds of the first
//! table, then compounds new to each later table.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::domain::{COMPOUND_COLUMN, Label};
use crate::error::KiraError;

/// Two-column table: compound identifier and one assay's label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssayTable {
    label_column: String,
    entries: Vec<(String, Label)>,
}

impl AssayTable {
    /// `entries` must hold each compound identifier at most once.
    pub fn new(label_column: impl Into<String>, entries: Vec<(String, Label)>) -> Self {
        Self {
            label_column: label_column.into(),
            entries,
        }
    }

    pub fn empty(label_column: impl Into<String>) -> Self {
        Self::new(label_column, Vec::new())
    }

    pub fn label_column(&self) -> &str {
        &self.label_column
    }

    pub fn entries(&self) -> &[(String, Label)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, compound: &str) -> Option<Label> {
        self.entries
            .iter()
            .find(|(id, _)| id == compound)
            .map(|(_, label)| *label)
    }

    pub fn counts(&self) -> LabelCounts {
        LabelCounts::from_labels(self.entries.iter().map(|(_, label)| *label))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelCounts {
    pub active: usize,
    pub inactive: usize,
    pub missing: usize,
}

impl LabelCounts {
    pub fn from_labels(labels: impl IntoIterator<Item = Label>) -> Self {
        let mut counts = Self::default();
        for label in labels {
            match label {
                Label::Active => counts.active += 1,
                Label::Inactive => counts.inactive += 1,
                Label::Missing => counts.missing += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusedRow {
    pub compound: String,
    /// Indexed like [`FusedTable::columns`].
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, Default)]
pub struct FusedTable {
    columns: Vec<String>,
    rows: Vec<FusedRow>,
    index: HashMap<String, usize>,
}

impl FusedTable {
    /// Full outer join on the compound identifier.
    pub fn join(mut self, table: AssayTable) -> Result<Self, KiraError> {
        let AssayTable {
            label_column,
            entries,
        } = table;
        if label_column == COMPOUND_COLUMN || self.columns.contains(&label_column) {
            return Err(KiraError::FusionConflict(label_column));
        }

        let width = self.columns.len() + 1;
        self.columns.push(label_column);
        for row in &mut self.rows {
            row.labels.push(Label::Missing);
        }

        let mut added = 0usize;
        for (compound, label) in entries {
            match self.index.get(&compound) {
                Some(&position) => self.rows[position].labels[width - 1] = label,
                None => {
                    let mut labels = vec![Label::Missing; width];
                    labels[width - 1] = label;
                    self.index.insert(compound.clone(), self.rows.len());
                    self.rows.push(FusedRow { compound, labels });
                    added += 1;
                }
            }
        }
        debug!(
            columns = width,
            rows = self.rows.len(),
            added,
            "joined assay table"
        );
        Ok(self)
    }

    /// Label columns, in join order. The compound column is implicit.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[FusedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn compounds(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.compound.as_str())
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// `None` when either the compound or the column is unknown.
    pub fn get(&self, compound: &str, column: &str) -> Option<Label> {
        let column = self.column_index(column)?;
        let row = self.index.get(compound)?;
        Some(self.rows[*row].labels[column])
    }

    pub fn row(&self, compound: &str) -> Option<&FusedRow> {
        self.index.get(compound).map(|position| &self.rows[*position])
    }
}

/// Left fold of `tables` into one fused table, in iteration order.
pub fn fuse<I>(tables: I) -> Result<FusedTable, KiraError>
where
    I: IntoIterator<Item = AssayTable>,
{
    tables
        .into_iter()
        .try_fold(FusedTable::default(), FusedTable::join)
}
