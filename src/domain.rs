use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::TOX21_ASSAYS;
use crate::error::KiraError;

pub const CATALOG_PREFIX: &str = "tox21-";

/// Join key shared by every per-assay table and the fused table.
pub const COMPOUND_COLUMN: &str = "smiles";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssayId(String);

impl AssayId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> AssayKind {
        if self.0.contains("antagonist") {
            AssayKind::Antagonist
        } else if self.0.contains("agonist") {
            AssayKind::Agonist
        } else {
            AssayKind::Other
        }
    }

    pub fn column_name(&self) -> String {
        self.0
            .strip_prefix(CATALOG_PREFIX)
            .unwrap_or(&self.0)
            .to_string()
    }
}

impl fmt::Display for AssayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AssayId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if !TOX21_ASSAYS.contains(&normalized) {
            return Err(KiraError::AssayNotFound(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

impl TryFrom<String> for AssayId {
    type Error = KiraError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AssayId> for String {
    fn from(value: AssayId) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssayKind {
    Agonist,
    Antagonist,
    Other,
}

impl AssayKind {
    /// Case-sensitive substring marking an active outcome. The trailing space
    /// in the fallback is part of the match.
    pub fn active_marker(self) -> &'static str {
        match self {
            AssayKind::Antagonist => "active antagonist",
            AssayKind::Agonist => "active agonist",
            AssayKind::Other => "active ",
        }
    }
}

impl fmt::Display for AssayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssayKind::Agonist => write!(f, "agonist"),
            AssayKind::Antagonist => write!(f, "antagonist"),
            AssayKind::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Active,
    Inactive,
    Missing,
}

impl Label {
    pub fn value(self) -> Option<i8> {
        match self {
            Label::Active => Some(1),
            Label::Inactive => Some(0),
            Label::Missing => None,
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, Label::Missing)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(value) => write!(f, "{value}"),
            None => Ok(()),
        }
    }
}

impl Serialize for Label {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Parquet => write!(f, "parquet"),
        }
    }
}

/// What the orchestrator does when an assay cannot be retrieved or extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    #[default]
    Abort,
    Substitute,
}
