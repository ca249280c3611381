use std::io::{self, Write};
use std::sync::Arc;

use arrow_array::{ArrayRef, Int8Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use camino::Utf8Path;
use flate2::Compression;
use flate2::write::GzEncoder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression as ParquetCompression;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::catalog::CatalogEntry;
use crate::domain::{COMPOUND_COLUMN, OutputFormat};
use crate::error::KiraError;
use crate::fusion::FusedTable;
use crate::pipeline::{ProgressEvent, ProgressSink, RunSummary};
use crate::store::Metadata;

#[derive(Debug, Clone, Serialize)]
pub struct OutputInfo {
    pub path: String,
    pub format: OutputFormat,
    pub gzip: bool,
    pub rows: usize,
    pub columns: usize,
}

/// Writes `table` to `path`, replacing any existing file only once the write succeeded.
pub fn write_table(
    table: &FusedTable,
    path: &Utf8Path,
    format: OutputFormat,
) -> Result<OutputInfo, KiraError> {
    let gzip = matches!(format, OutputFormat::Csv) && path.extension() == Some("gz");
    let mut temp = temp_beside(path)?;
    match format {
        OutputFormat::Csv if gzip => {
            let mut encoder = GzEncoder::new(temp.as_file_mut(), Compression::default());
            write_csv(table, &mut encoder)?;
            encoder
                .finish()
                .map_err(|err| KiraError::Output(err.to_string()))?;
        }
        OutputFormat::Csv => write_csv(table, temp.as_file_mut())?,
        OutputFormat::Parquet => write_parquet(table, temp.as_file_mut())?,
    }
    temp.persist(path.as_std_path())
        .map_err(|err| KiraError::Output(format!("{path}: {err}")))?;

    Ok(OutputInfo {
        path: path.to_string(),
        format,
        gzip,
        rows: table.len(),
        columns: table.columns().len() + 1,
    })
}

/// Header is the compound column then one column per assay; missing labels are empty fields.
pub fn write_csv<W: Write>(table: &FusedTable, writer: W) -> Result<(), KiraError> {
    let mut writer = csv::Writer::from_writer(writer);
    let header = std::iter::once(COMPOUND_COLUMN).chain(table.columns().iter().map(String::as_str));
    writer
        .write_record(header)
        .map_err(|err| KiraError::Output(err.to_string()))?;
    for row in table.rows() {
        let mut record = Vec::with_capacity(row.labels.len() + 1);
        record.push(row.compound.clone());
        record.extend(row.labels.iter().map(|label| label.to_string()));
        writer
            .write_record(&record)
            .map_err(|err| KiraError::Output(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| KiraError::Output(err.to_string()))
}

pub fn write_parquet<W: Write + Send>(table: &FusedTable, writer: W) -> Result<(), KiraError> {
    let batch = record_batch(table)?;
    let props = WriterProperties::builder()
        .set_compression(ParquetCompression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(writer, batch.schema(), Some(props))
        .map_err(|err| KiraError::Output(err.to_string()))?;
    writer
        .write(&batch)
        .map_err(|err| KiraError::Output(err.to_string()))?;
    writer
        .close()
        .map_err(|err| KiraError::Output(err.to_string()))?;
    Ok(())
}

/// Arrow view of the fused table: a non-null `Utf8` key and nullable `Int8` labels.
pub fn record_batch(table: &FusedTable) -> Result<RecordBatch, KiraError> {
    let mut fields = vec![Field::new(COMPOUND_COLUMN, DataType::Utf8, false)];
    fields.extend(
        table
            .columns()
            .iter()
            .map(|column| Field::new(column.as_str(), DataType::Int8, true)),
    );
    let schema = Arc::new(Schema::new(fields));

    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.columns().len() + 1);
    arrays.push(Arc::new(StringArray::from_iter_values(table.compounds())));
    for idx in 0..table.columns().len() {
        let labels = table
            .rows()
            .iter()
            .map(|row| row.labels[idx].value())
            .collect::<Vec<_>>();
        arrays.push(Arc::new(Int8Array::from(labels)));
    }

    RecordBatch::try_new(schema, arrays).map_err(|err| KiraError::Output(err.to_string()))
}

fn temp_beside(path: &Utf8Path) -> Result<NamedTempFile, KiraError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    std::fs::create_dir_all(parent.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    tempfile::Builder::new()
        .prefix(".kira-tox21-out")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| KiraError::Filesystem(err.to_string()))
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub output: OutputInfo,
    pub summary: RunSummary,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_build(result: &BuildResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_catalog(entries: &[CatalogEntry]) -> io::Result<()> {
        Self::print_json(&entries)
    }

    pub fn print_cache(entries: &[Metadata]) -> io::Result<()> {
        Self::print_json(&entries)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, event: ProgressEvent) {
        tracing::debug!(
            stage = event.stage.label(),
            processed = event.processed,
            total = event.total,
            "{}",
            event.message
        );
    }
}

