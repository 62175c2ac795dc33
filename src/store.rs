//! Source and sink collaborators. The pipeline only ever sees the two
//! traits; the CSV directory implementations cover the local-extract
//! layout the monthly feeds arrive in.

use std::fs::File;
use std::path::PathBuf;

use csv::{ReaderBuilder, WriterBuilder};
use tracing::{debug, info};

use crate::clean::{DROPOFF, PASSENGER_COUNT, PICKUP, RAW_DROPOFF, RAW_PICKUP};
use crate::error::EtlError;
use crate::table::Table;

/// The three columns a source must expose; anything else it holds is
/// dropped at the boundary.
pub const CONTRACT_COLUMNS: [&str; 3] = [RAW_PICKUP, RAW_DROPOFF, PASSENGER_COUNT];

/// Order of columns in persisted output.
pub const OUTPUT_COLUMNS: [&str; 3] = [PICKUP, DROPOFF, PASSENGER_COUNT];

/// Yields one month's raw table.
pub trait TableSource {
    fn read(&self, year: i32, month: u32) -> Result<Table, EtlError>;
}

/// Persists one month's cleaned table, overwriting any prior output for
/// the same key.
pub trait TableSink {
    fn write(&self, year: i32, month: u32, table: &Table) -> Result<(), EtlError>;
}

/// Reads `yellow_tripdata_{year}-{MM}.csv` extracts from a directory.
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn month_path(&self, year: i32, month: u32) -> PathBuf {
        self.dir
            .join(format!("yellow_tripdata_{year}-{month:02}.csv"))
    }
}

impl TableSource for CsvDirSource {
    fn read(&self, year: i32, month: u32) -> Result<Table, EtlError> {
        let path = self.month_path(year, month);
        let file = File::open(&path)
            .map_err(|e| EtlError::source(year, month, format!("{}: {e}", path.display())))?;
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

        let headers = rdr
            .headers()
            .map_err(|e| EtlError::source(year, month, format!("reading header row: {e}")))?
            .clone();
        // project onto the contract columns; a missing one is a reader
        // failure, not a stage failure
        let mut indices = Vec::with_capacity(CONTRACT_COLUMNS.len());
        for name in CONTRACT_COLUMNS {
            let idx = headers.iter().position(|h| h == name).ok_or_else(|| {
                EtlError::source(year, month, format!("column `{name}` absent in source"))
            })?;
            indices.push(idx);
        }

        let mut table = Table::new(CONTRACT_COLUMNS.iter().map(|s| s.to_string()).collect());
        for (i, record) in rdr.records().enumerate() {
            let record = record
                .map_err(|e| EtlError::source(year, month, format!("record {i}: {e}")))?;
            let row = indices
                .iter()
                .map(|&idx| record.get(idx).unwrap_or_default().to_string())
                .collect();
            table.push_row(row);
        }
        debug!(year, month, rows = table.n_rows(), path = %path.display(), "read source table");
        Ok(table)
    }
}

/// Writes `clean_yellow_trip_data_{year}-{MM}.csv` files into a directory,
/// truncating any previous file for the same month so re-runs are
/// idempotent.
pub struct CsvDirSink {
    dir: PathBuf,
}

impl CsvDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn month_path(&self, year: i32, month: u32) -> PathBuf {
        self.dir
            .join(format!("clean_yellow_trip_data_{year}-{month:02}.csv"))
    }
}

impl TableSink for CsvDirSink {
    fn write(&self, year: i32, month: u32, table: &Table) -> Result<(), EtlError> {
        // fixed output column order, no index column
        let ordered = table.select(&OUTPUT_COLUMNS).ok_or_else(|| {
            EtlError::sink(year, month, "cleaned table missing an output column")
        })?;

        let path = self.month_path(year, month);
        let file = File::create(&path)
            .map_err(|e| EtlError::sink(year, month, format!("{}: {e}", path.display())))?;
        let mut wtr = WriterBuilder::new().from_writer(file);

        wtr.write_record(ordered.headers())
            .map_err(|e| EtlError::sink(year, month, format!("writing header row: {e}")))?;
        for row in ordered.rows() {
            wtr.write_record(row)
                .map_err(|e| EtlError::sink(year, month, format!("writing row: {e}")))?;
        }
        wtr.flush()
            .map_err(|e| EtlError::sink(year, month, format!("flushing output: {e}")))?;
        info!(year, month, rows = ordered.n_rows(), path = %path.display(), "wrote cleaned table");
        Ok(())
    }
}

/// Read a previously written cleaned table back from the sink directory.
/// Used by the period-query step after a run.
pub fn read_clean_csv(sink: &CsvDirSink, year: i32, month: u32) -> Result<Table, EtlError> {
    let path = sink.month_path(year, month);
    let file = File::open(&path)
        .map_err(|e| EtlError::source(year, month, format!("{}: {e}", path.display())))?;
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| EtlError::source(year, month, format!("reading header row: {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut table = Table::new(headers);
    for (i, record) in rdr.records().enumerate() {
        let record =
            record.map_err(|e| EtlError::source(year, month, format!("record {i}: {e}")))?;
        table.push_row(record.iter().map(|c| c.to_string()).collect());
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_raw(dir: &TempDir, year: i32, month: u32, body: &str) -> Result<()> {
        let path = dir
            .path()
            .join(format!("yellow_tripdata_{year}-{month:02}.csv"));
        let mut f = File::create(path)?;
        f.write_all(body.as_bytes())?;
        Ok(())
    }

    #[test]
    fn reads_contract_columns_and_ignores_extras() -> Result<()> {
        let dir = TempDir::new()?;
        write_raw(
            &dir,
            2021,
            1,
            "VendorID,tpep_pickup_datetime,tpep_dropoff_datetime,passenger_count,trip_distance\n\
             1,2021-01-05 08:00:00,2021-01-05 08:25:00,2,4.2\n\
             2,2021-01-06 09:00:00,2021-01-06 09:10:00,1,1.1\n",
        )?;

        let source = CsvDirSource::new(dir.path());
        let table = source.read(2021, 1)?;
        assert_eq!(
            table.headers(),
            &[
                RAW_PICKUP.to_string(),
                RAW_DROPOFF.to_string(),
                PASSENGER_COUNT.to_string()
            ]
        );
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.rows()[0][2], "2");
        Ok(())
    }

    #[test]
    fn missing_file_is_source_unavailable() -> Result<()> {
        let dir = TempDir::new()?;
        let source = CsvDirSource::new(dir.path());
        let err = source.read(2021, 3).unwrap_err();
        assert!(matches!(
            err,
            EtlError::SourceUnavailable { year: 2021, month: 3, .. }
        ));
        Ok(())
    }

    #[test]
    fn missing_contract_column_is_source_unavailable() -> Result<()> {
        let dir = TempDir::new()?;
        write_raw(
            &dir,
            2021,
            1,
            "tpep_pickup_datetime,passenger_count\n2021-01-05 08:00:00,2\n",
        )?;
        let source = CsvDirSource::new(dir.path());
        let err = source.read(2021, 1).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(RAW_DROPOFF), "got: {msg}");
        Ok(())
    }

    #[test]
    fn sink_writes_fixed_column_order_and_overwrites() -> Result<()> {
        let dir = TempDir::new()?;
        let sink = CsvDirSink::new(dir.path());

        // cleaned table with columns deliberately out of output order
        let table = Table::from_rows(
            vec![
                PASSENGER_COUNT.to_string(),
                PICKUP.to_string(),
                DROPOFF.to_string(),
            ],
            vec![vec![
                "2".to_string(),
                "2021-01-05 08:00:00".to_string(),
                "2021-01-05 08:25:00".to_string(),
            ]],
        );
        sink.write(2021, 1, &table)?;

        let first = std::fs::read_to_string(sink.month_path(2021, 1))?;
        assert!(first.starts_with("pickup_datetime,dropoff_datetime,passenger_count\n"));

        // second write for the same key replaces, never appends
        sink.write(2021, 1, &table)?;
        let second = std::fs::read_to_string(sink.month_path(2021, 1))?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn clean_csv_round_trips_through_the_sink() -> Result<()> {
        let dir = TempDir::new()?;
        let sink = CsvDirSink::new(dir.path());
        let table = Table::from_rows(
            OUTPUT_COLUMNS.iter().map(|s| s.to_string()).collect(),
            vec![vec![
                "2021-01-05 08:00:00".to_string(),
                "2021-01-05 08:25:00".to_string(),
                "2".to_string(),
            ]],
        );
        sink.write(2021, 1, &table)?;
        let back = read_clean_csv(&sink, 2021, 1)?;
        assert_eq!(back, table);
        Ok(())
    }
}
