//! The record-filter stages. Each stage is a pure function: it reads one
//! table, returns a new filtered table, and touches nothing else. The
//! driver composes them in the canonical order via [`clean_month`].

use chrono::{Datelike, NaiveDateTime};
use tracing::{debug, warn};

use crate::error::MissingColumn;
use crate::table::Table;

/// Column names as they arrive in the raw extracts.
pub const RAW_PICKUP: &str = "tpep_pickup_datetime";
pub const RAW_DROPOFF: &str = "tpep_dropoff_datetime";

/// Column names after [`rename_columns`].
pub const PICKUP: &str = "pickup_datetime";
pub const DROPOFF: &str = "dropoff_datetime";
pub const PASSENGER_COUNT: &str = "passenger_count";

/// A trip shorter than this is likely a meter mistake.
pub const MIN_TRIP_SECONDS: i64 = 5;
/// 12-hour shifts are the standard for NY cabs; anything longer is junk.
pub const MAX_TRIP_SECONDS: i64 = 43_200;

/// Parse a datetime cell. Extracts use `YYYY-MM-DD HH:MM:SS`; ISO `T`
/// separators are accepted as well.
pub fn parse_datetime(cell: &str) -> Option<NaiveDateTime> {
    let s = cell.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Last calendar day of a month under the pipeline's fixed rule: February
/// is always 28 (leap years deliberately not handled), the 30-day months
/// are {04, 06, 09, 11}, everything else is 31.
pub fn last_day_of_month(month: u32) -> u32 {
    match month {
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Keep rows whose `passenger_count` parses and is `>= 0`. Empty or
/// unparseable cells fail the predicate and are dropped. An empty result
/// is a valid output, not an error.
pub fn remove_negative_passenger_count(table: &Table) -> Result<Table, MissingColumn> {
    let idx = table
        .column_index(PASSENGER_COUNT)
        .ok_or_else(|| MissingColumn::new("remove_negative_passenger_count", PASSENGER_COUNT))?;

    let out = table.retain_rows(|row| passenger_count_is_valid(&row[idx]));
    debug!(
        rows_in = table.n_rows(),
        rows_out = out.n_rows(),
        "removed negative passenger counts"
    );
    Ok(out)
}

/// Numeric value of a `passenger_count` cell. Extracts with nulls come
/// through pandas-style as floats ("1.0"), so whole floats parse too;
/// anything else is `None`. Consumers of cleaned tables use this same
/// rule so no cell the stages admit is dropped downstream.
pub fn parse_passenger_count(cell: &str) -> Option<f64> {
    let s = cell.trim();
    if let Ok(n) = s.parse::<i64>() {
        return Some(n as f64);
    }
    match s.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 => Some(f),
        _ => None,
    }
}

fn passenger_count_is_valid(cell: &str) -> bool {
    parse_passenger_count(cell).is_some_and(|n| n >= 0.0)
}

/// Rename the `tpep_*` datetime columns to their short names. All other
/// columns pass through untouched. Fails when either source column is
/// absent.
pub fn rename_columns(table: &Table) -> Result<Table, MissingColumn> {
    let mut out = table.clone();
    for (from, to) in [(RAW_PICKUP, PICKUP), (RAW_DROPOFF, DROPOFF)] {
        if !out.rename_header(from, to) {
            return Err(MissingColumn::new("rename_columns", from));
        }
    }
    Ok(out)
}

/// Keep rows whose `pickup_datetime` falls inside the declared calendar
/// month: `[year-month-01, year-month-<last_day>]`, both bounds inclusive
/// of the full day. Comparison is on parsed values, never on strings.
/// Rows with an unparseable pickup are dropped.
pub fn remove_outliers(table: &Table, year: i32, month: u32) -> Result<Table, MissingColumn> {
    let idx = table
        .column_index(PICKUP)
        .ok_or_else(|| MissingColumn::new("remove_outliers", PICKUP))?;
    let last_day = last_day_of_month(month);

    let mut unparseable = 0usize;
    let out = table.retain_rows(|row| match parse_datetime(&row[idx]) {
        Some(dt) => dt.year() == year && dt.month() == month && dt.day() <= last_day,
        None => {
            unparseable += 1;
            false
        }
    });
    if unparseable > 0 {
        warn!(
            year,
            month, unparseable, "dropped rows with unparseable pickup_datetime"
        );
    }
    debug!(
        year,
        month,
        rows_in = table.n_rows(),
        rows_out = out.n_rows(),
        "removed out-of-month pickups"
    );
    Ok(out)
}

/// Keep rows where the trip duration in whole seconds is strictly between
/// [`MIN_TRIP_SECONDS`] and [`MAX_TRIP_SECONDS`]. The duration is scratch;
/// it never appears in the output. A dropoff before the pickup gives a
/// negative duration and falls below the floor, which is the intended
/// behavior.
pub fn remove_extremely_short_and_long_rides(table: &Table) -> Result<Table, MissingColumn> {
    let pickup = table
        .column_index(PICKUP)
        .ok_or_else(|| MissingColumn::new("remove_extremely_short_and_long_rides", PICKUP))?;
    let dropoff = table
        .column_index(DROPOFF)
        .ok_or_else(|| MissingColumn::new("remove_extremely_short_and_long_rides", DROPOFF))?;

    let mut unparseable = 0usize;
    let out = table.retain_rows(|row| {
        match (parse_datetime(&row[pickup]), parse_datetime(&row[dropoff])) {
            (Some(p), Some(d)) => {
                let seconds = (d - p).num_seconds();
                seconds > MIN_TRIP_SECONDS && seconds < MAX_TRIP_SECONDS
            }
            _ => {
                unparseable += 1;
                false
            }
        }
    });
    if unparseable > 0 {
        warn!(unparseable, "dropped rows with unparseable trip datetimes");
    }
    debug!(
        rows_in = table.n_rows(),
        rows_out = out.n_rows(),
        "removed extremely short and long rides"
    );
    Ok(out)
}

/// The canonical per-month pipeline: rename, then drop negative passenger
/// counts, out-of-month pickups, and out-of-bounds durations.
pub fn clean_month(table: &Table, year: i32, month: u32) -> Result<Table, MissingColumn> {
    let renamed = rename_columns(table)?;
    let positive = remove_negative_passenger_count(&renamed)?;
    let in_month = remove_outliers(&positive, year, month)?;
    remove_extremely_short_and_long_rides(&in_month)
}
