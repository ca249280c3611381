use std::io::{Cursor, Read};

use regex::Regex;
use tracing::debug;
use zip::ZipArchive;

use crate::error::KiraError;

pub const COMPOUND_FIELD: &str = "SMILES";
pub const OUTCOME_FIELD: &str = "ASSAY_OUTCOME";

/// Published archives spell the member `*aggregrated.txt`.
const AGGREGATED_MEMBER: &str = r"aggreg(r)?ated\.txt$";

/// Cell values read as "no value", following the pandas `read_csv` defaults.
const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// One row of an aggregated results table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub compound_id: String,
    /// `None` when the run produced no categorical outcome.
    pub outcome: Option<String>,
}

impl RawRow {
    pub fn new(compound_id: &str, outcome: Option<&str>) -> Self {
        Self {
            compound_id: compound_id.to_string(),
            outcome: outcome.map(str::to_string),
        }
    }
}

pub fn extract_rows(archive: &[u8]) -> Result<Vec<RawRow>, KiraError> {
    let mut archive = open_archive(archive)?;
    let member = find_aggregated_member(&archive)?;
    debug!(%member, "parsing aggregated results");
    let entry = archive
        .by_name(&member)
        .map_err(|err| KiraError::ArchiveFormat(err.to_string()))?;
    parse_table(entry)
}

/// Checks that `archive` is a zip holding an aggregated results member,
/// without parsing the table.
pub fn check_archive(archive: &[u8]) -> Result<(), KiraError> {
    let archive = open_archive(archive)?;
    find_aggregated_member(&archive).map(|_| ())
}

fn open_archive(archive: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, KiraError> {
    ZipArchive::new(Cursor::new(archive)).map_err(|err| KiraError::ArchiveFormat(err.to_string()))
}

fn find_aggregated_member<R: Read + std::io::Seek>(
    archive: &ZipArchive<R>,
) -> Result<String, KiraError> {
    let pattern =
        Regex::new(AGGREGATED_MEMBER).map_err(|err| KiraError::ArchiveFormat(err.to_string()))?;
    archive
        .file_names()
        .find(|name| pattern.is_match(name))
        .map(str::to_string)
        .ok_or_else(|| {
            KiraError::ArchiveFormat("no aggregated results member in archive".to_string())
        })
}

/// Parses tab-delimited aggregated results into rows.
///
/// The table must be valid UTF-8. An outcome column whose values are all
/// numeric carries no categorical outcome, so every outcome reads as absent.
pub fn parse_table<R: Read>(reader: R) -> Result<Vec<RawRow>, KiraError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|err| KiraError::ArchiveFormat(err.to_string()))?
        .iter()
        .map(|field| field.trim().to_string())
        .collect::<Vec<_>>();
    let compound_idx = column_index(&headers, COMPOUND_FIELD)?;
    let outcome_idx = column_index(&headers, OUTCOME_FIELD)?;

    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for record in reader.records() {
        let record = record.map_err(|err| KiraError::ArchiveFormat(err.to_string()))?;
        let Some(compound_id) = cell(record.get(compound_idx)) else {
            dropped += 1;
            continue;
        };
        rows.push(RawRow {
            compound_id,
            outcome: cell(record.get(outcome_idx)),
        });
    }
    if dropped > 0 {
        debug!(dropped, "skipped rows without a compound identifier");
    }

    if is_numeric_column(rows.iter().filter_map(|row| row.outcome.as_deref())) {
        debug!(rows = rows.len(), "numeric outcome column read as absent");
        for row in &mut rows {
            row.outcome = None;
        }
    }
    Ok(rows)
}

fn column_index(headers: &[String], name: &str) -> Result<usize, KiraError> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| KiraError::ArchiveFormat(format!("missing column {name}")))
}

fn cell(raw: Option<&str>) -> Option<String> {
    let value = raw?;
    if NA_TOKENS.contains(&value) {
        return None;
    }
    Some(value.to_string())
}

/// True when at least one value is present and every value parses as a number.
fn is_numeric_column<'a>(mut values: impl Iterator<Item = &'a str>) -> bool {
    let mut seen = false;
    let numeric = values.all(|value| {
        seen = true;
        value.trim().parse::<f64>().is_ok()
    });
    seen && numeric
}
