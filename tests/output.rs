use std::fs::File;
use std::io::Read;

use arrow_array::{Array, Int8Array, StringArray};
use camino::Utf8PathBuf;
use flate2::read::GzDecoder;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tempfile::TempDir;

use kira_tox21::domain::{Label, OutputFormat};
use kira_tox21::fusion::{AssayTable, FusedTable, fuse};
use kira_tox21::output::{write_csv, write_table};

fn scenario() -> FusedTable {
    fuse([
        AssayTable::new(
            "ar-bla-agonist-p1",
            vec![
                ("c1".to_string(), Label::Active),
                ("c2".to_string(), Label::Inactive),
            ],
        ),
        AssayTable::new(
            "ar-bla-antagonist-p1",
            vec![
                ("c1".to_string(), Label::Active),
                ("c3".to_string(), Label::Missing),
            ],
        ),
    ])
    .unwrap()
}

const EXPECTED_CSV: &str = "smiles,ar-bla-agonist-p1,ar-bla-antagonist-p1\n\
    c1,1,1\n\
    c2,0,\n\
    c3,,\n";

fn out_path(dir: &TempDir, name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
}

#[test]
fn csv_leaves_missing_labels_empty() {
    let mut buffer = Vec::new();
    write_csv(&scenario(), &mut buffer).unwrap();
    assert_eq!(String::from_utf8(buffer).unwrap(), EXPECTED_CSV);
}

#[test]
fn write_table_csv_reports_shape() {
    let dir = TempDir::new().unwrap();
    let path = out_path(&dir, "nested/tox21.csv");
    let info = write_table(&scenario(), &path, OutputFormat::Csv).unwrap();

    assert!(!info.gzip);
    assert_eq!(info.rows, 3);
    assert_eq!(info.columns, 3);
    assert_eq!(std::fs::read_to_string(path).unwrap(), EXPECTED_CSV);
}

#[test]
fn gz_suffix_compresses_csv() {
    let dir = TempDir::new().unwrap();
    let path = out_path(&dir, "tox21.csv.gz");
    let info = write_table(&scenario(), &path, OutputFormat::Csv).unwrap();
    assert!(info.gzip);

    let mut decoded = String::new();
    GzDecoder::new(File::open(path).unwrap())
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, EXPECTED_CSV);
}

#[test]
fn parquet_keeps_nulls_for_missing_labels() {
    let dir = TempDir::new().unwrap();
    let path = out_path(&dir, "tox21.parquet");
    write_table(&scenario(), &path, OutputFormat::Parquet).unwrap();

    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path).unwrap())
        .unwrap()
        .build()
        .unwrap();
    let batches = reader.collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];

    let schema = batch.schema();
    let names = schema
        .fields()
        .iter()
        .map(|field| field.name().as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec!["smiles", "ar-bla-agonist-p1", "ar-bla-antagonist-p1"]
    );

    let smiles = batch
        .column(0)
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(smiles.value(2), "c3");

    let antagonist = batch
        .column(2)
        .as_any()
        .downcast_ref::<Int8Array>()
        .unwrap();
    assert_eq!(antagonist.value(0), 1);
    assert!(antagonist.is_null(1));
    assert!(antagonist.is_null(2));
}

#[test]
fn existing_file_is_replaced() {
    let dir = TempDir::new().unwrap();
    let path = out_path(&dir, "tox21.csv");
    std::fs::write(&path, "old contents").unwrap();

    write_table(&scenario(), &path, OutputFormat::Csv).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), EXPECTED_CSV);
}
