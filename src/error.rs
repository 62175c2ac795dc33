//! Error taxonomy for the pipeline. Every variant carries the batch key
//! (year, month) so a failure is diagnosable from its message alone.

use thiserror::Error;

/// A filter stage could not find a column it operates on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("stage {stage}: column `{column}` missing")]
pub struct MissingColumn {
    pub stage: &'static str,
    pub column: String,
}

impl MissingColumn {
    pub fn new(stage: &'static str, column: impl Into<String>) -> Self {
        Self {
            stage,
            column: column.into(),
        }
    }
}

/// Per-batch failure. Errors never cross batch boundaries; the driver
/// records one of these per failed month and keeps going.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Input missing or unreadable. Recoverable by retry or skip.
    #[error("source unavailable for {year}-{month:02}: {reason}")]
    SourceUnavailable {
        year: i32,
        month: u32,
        reason: String,
    },

    /// An expected column was absent. Not retried; indicates upstream
    /// format drift.
    #[error("schema error for {year}-{month:02} in {stage}: column `{column}` missing")]
    SchemaError {
        year: i32,
        month: u32,
        stage: &'static str,
        column: String,
    },

    /// Output store unreachable. Retryable.
    #[error("sink unavailable for {year}-{month:02}: {reason}")]
    SinkUnavailable {
        year: i32,
        month: u32,
        reason: String,
    },
}

impl EtlError {
    pub fn source(year: i32, month: u32, reason: impl Into<String>) -> Self {
        EtlError::SourceUnavailable {
            year,
            month,
            reason: reason.into(),
        }
    }

    pub fn sink(year: i32, month: u32, reason: impl Into<String>) -> Self {
        EtlError::SinkUnavailable {
            year,
            month,
            reason: reason.into(),
        }
    }

    pub fn schema(year: i32, month: u32, missing: MissingColumn) -> Self {
        EtlError::SchemaError {
            year,
            month,
            stage: missing.stage,
            column: missing.column,
        }
    }
}
