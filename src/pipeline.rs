//! Monthly pipeline driver. Each (year, month) batch runs
//! read → filter → write independently; one month failing never stops the
//! others, and every outcome lands in the run report.

use anyhow::{ensure, Result};
use rayon::prelude::*;
use tracing::{error, info, info_span};

use crate::clean;
use crate::error::EtlError;
use crate::store::{TableSink, TableSource};

/// What happened to one batch.
#[derive(Debug)]
pub enum BatchOutcome {
    /// Fully filtered table handed to the sink.
    Written { rows_in: usize, rows_out: usize },
    /// Batch ended in the FAILED state; nothing was written.
    Failed(EtlError),
}

#[derive(Debug)]
pub struct BatchReport {
    pub year: i32,
    pub month: u32,
    pub outcome: BatchOutcome,
}

impl BatchReport {
    pub fn is_written(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Written { .. })
    }
}

/// Aggregated per-run status, ordered by month.
#[derive(Debug, Default)]
pub struct RunReport {
    pub batches: Vec<BatchReport>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.batches.iter().filter(|b| b.is_written()).count()
    }

    pub fn failed(&self) -> usize {
        self.batches.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// Months that produced output, in ascending order.
    pub fn written_months(&self) -> Vec<u32> {
        self.batches
            .iter()
            .filter(|b| b.is_written())
            .map(|b| b.month)
            .collect()
    }
}

/// Run the pipeline for every month in the inclusive range
/// `[start_month, end_month]` of `year`. Batches are independent, so they
/// run on the rayon pool; the report is assembled in month order either
/// way.
pub fn run<S, K>(
    source: &S,
    sink: &K,
    year: i32,
    start_month: u32,
    end_month: u32,
) -> Result<RunReport>
where
    S: TableSource + Sync,
    K: TableSink + Sync,
{
    ensure!(
        (1..=12).contains(&start_month) && (1..=12).contains(&end_month),
        "months must be within 1-12, got {start_month}-{end_month}"
    );
    ensure!(
        start_month <= end_month,
        "start month {start_month} is after end month {end_month}"
    );

    let months: Vec<u32> = (start_month..=end_month).collect();
    let mut batches: Vec<BatchReport> = months
        .par_iter()
        .map(|&month| run_batch(source, sink, year, month))
        .collect();
    batches.sort_by_key(|b| b.month);

    let report = RunReport { batches };
    info!(
        year,
        succeeded = report.succeeded(),
        failed = report.failed(),
        "run complete"
    );
    Ok(report)
}

// One batch walks PENDING → READ → FILTERED → WRITTEN; any error short-
// circuits to FAILED for this month only. The sink only ever sees the
// fully filtered table.
fn run_batch<S, K>(source: &S, sink: &K, year: i32, month: u32) -> BatchReport
where
    S: TableSource,
    K: TableSink,
{
    let span = info_span!("batch", year, month);
    let _guard = span.enter();

    let failed = |err: EtlError| {
        error!(%err, "batch failed");
        BatchReport {
            year,
            month,
            outcome: BatchOutcome::Failed(err),
        }
    };

    let raw = match source.read(year, month) {
        Ok(table) => table,
        Err(err) => return failed(err),
    };
    let rows_in = raw.n_rows();

    let cleaned = match clean::clean_month(&raw, year, month) {
        Ok(table) => table,
        Err(missing) => return failed(EtlError::schema(year, month, missing)),
    };

    if let Err(err) = sink.write(year, month, &cleaned) {
        return failed(err);
    }

    info!(rows_in, rows_out = cleaned.n_rows(), "batch written");
    BatchReport {
        year,
        month,
        outcome: BatchOutcome::Written {
            rows_in,
            rows_out: cleaned.n_rows(),
        },
    }
}
