use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::clarify::derive_labels;
use crate::domain::{AssayId, OnError};
use crate::error::KiraError;
use crate::extract::extract_rows;
use crate::fusion::{AssayTable, FusedTable, LabelCounts};
use crate::tripod::AssayClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Derive,
    Fold,
    Substitute,
    Finish,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Fetch => "Fetch",
            Stage::Derive => "Derive",
            Stage::Fold => "Fold",
            Stage::Substitute => "Substitute",
            Stage::Finish => "Finish",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub assay: Option<AssayId>,
    /// Assays folded so far.
    pub processed: usize,
    pub total: usize,
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

/// Cooperative cancellation flag, checked between assays.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub on_error: OnError,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssaySummary {
    pub assay: AssayId,
    pub column: String,
    pub compounds: usize,
    pub labels: LabelCounts,
    pub substituted: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub compounds: usize,
    pub assays: usize,
    pub columns: Vec<AssaySummary>,
    pub substituted: Vec<AssayId>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub table: FusedTable,
    pub summary: RunSummary,
}

pub struct Pipeline<C: AssayClient> {
    client: C,
    options: RunOptions,
}

impl<C: AssayClient> Pipeline<C> {
    pub fn new(client: C, options: RunOptions) -> Self {
        Self { client, options }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Retrieves, extracts and labels one assay.
    pub fn assay_table(&self, assay: &AssayId) -> Result<AssayTable, KiraError> {
        let archive = self.client.fetch(assay)?;
        debug!(assay = assay.as_str(), bytes = archive.len(), "archive retrieved");
        let rows = extract_rows(&archive)?;
        debug!(assay = assay.as_str(), rows = rows.len(), "rows extracted");
        Ok(derive_labels(assay, &rows))
    }

    pub fn run(
        &self,
        catalog: &Catalog,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<RunReport, KiraError> {
        let started = Instant::now();
        let total = catalog.len();
        let mut fused = FusedTable::default();
        let mut columns = Vec::with_capacity(total);
        let mut substituted = Vec::new();

        for (processed, assay) in catalog.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(processed, total, "run cancelled");
                return Err(KiraError::Cancelled);
            }

            let assay_started = Instant::now();
            sink.event(ProgressEvent {
                stage: Stage::Fetch,
                assay: Some(assay.clone()),
                processed,
                total,
                message: format!("fetching {assay}"),
                elapsed: None,
            });

            let (table, was_substituted) = match self.assay_table(assay) {
                Ok(table) => (table, false),
                Err(err) if self.can_substitute(&err) => {
                    warn!(assay = assay.as_str(), error = %err, "substituting missing column");
                    sink.event(ProgressEvent {
                        stage: Stage::Substitute,
                        assay: Some(assay.clone()),
                        processed,
                        total,
                        message: format!("{assay}: {err}; column left missing"),
                        elapsed: Some(assay_started.elapsed()),
                    });
                    substituted.push(assay.clone());
                    (AssayTable::empty(assay.column_name()), true)
                }
                Err(err) => return Err(err.for_assay(assay.as_str())),
            };

            sink.event(ProgressEvent {
                stage: Stage::Derive,
                assay: Some(assay.clone()),
                processed,
                total,
                message: format!("{assay}: {} compounds labelled", table.len()),
                elapsed: Some(assay_started.elapsed()),
            });

            let summary = AssaySummary {
                assay: assay.clone(),
                column: table.label_column().to_string(),
                compounds: table.len(),
                labels: table.counts(),
                substituted: was_substituted,
                elapsed_ms: 0,
            };
            fused = fused
                .join(table)
                .map_err(|err| err.for_assay(assay.as_str()))?;
            let elapsed = assay_started.elapsed();
            info!(
                assay = assay.as_str(),
                compounds = fused.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "assay folded"
            );
            sink.event(ProgressEvent {
                stage: Stage::Fold,
                assay: Some(assay.clone()),
                processed: processed + 1,
                total,
                message: format!("{assay} folded; {} compounds", fused.len()),
                elapsed: Some(elapsed),
            });
            columns.push(AssaySummary {
                elapsed_ms: elapsed.as_millis() as u64,
                ..summary
            });
        }

        let elapsed = started.elapsed();
        sink.event(ProgressEvent {
            stage: Stage::Finish,
            assay: None,
            processed: total,
            total,
            message: format!(
                "{} compounds across {} assays",
                fused.len(),
                fused.columns().len()
            ),
            elapsed: Some(elapsed),
        });

        let summary = RunSummary {
            compounds: fused.len(),
            assays: fused.columns().len(),
            columns,
            substituted,
            elapsed_ms: elapsed.as_millis() as u64,
        };
        Ok(RunReport {
            table: fused,
            summary,
        })
    }

    fn can_substitute(&self, err: &KiraError) -> bool {
        matches!(self.options.on_error, OnError::Substitute)
            && matches!(
                err.root(),
                KiraError::TripodHttp(_)
                    | KiraError::TripodStatus { .. }
                    | KiraError::ArchiveFormat(_)
            )
    }
}

/// Builds the fused table for `catalog` with default options and no progress output.
pub fn run<C: AssayClient>(client: C, catalog: &Catalog) -> Result<FusedTable, KiraError> {
    let pipeline = Pipeline::new(client, RunOptions::default());
    pipeline
        .run(catalog, &NoopSink, &CancelToken::new())
        .map(|report| report.table)
}
