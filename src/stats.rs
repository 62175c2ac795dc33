//! Post-run queries over cleaned tables.

use chrono::NaiveDateTime;

use crate::clean::{parse_datetime, parse_passenger_count, PASSENGER_COUNT, PICKUP};
use crate::error::MissingColumn;
use crate::table::Table;

/// Mean passenger count across every row, in any of the given tables,
/// whose `pickup_datetime` lies inside `[period_start, period_end]`
/// (inclusive). Returns `Ok(None)` when no row falls in the period.
pub fn average_passenger_count<'a, I>(
    tables: I,
    period_start: NaiveDateTime,
    period_end: NaiveDateTime,
) -> Result<Option<f64>, MissingColumn>
where
    I: IntoIterator<Item = &'a Table>,
{
    let mut total = 0f64;
    let mut rows = 0u64;

    for table in tables {
        let pickup = table
            .column_index(PICKUP)
            .ok_or_else(|| MissingColumn::new("average_passenger_count", PICKUP))?;
        let count = table
            .column_index(PASSENGER_COUNT)
            .ok_or_else(|| MissingColumn::new("average_passenger_count", PASSENGER_COUNT))?;

        for row in table.rows() {
            let Some(dt) = parse_datetime(&row[pickup]) else {
                continue;
            };
            if dt < period_start || dt > period_end {
                continue;
            }
            // same numeric rule the cleaning stage admits cells under
            if let Some(n) = parse_passenger_count(&row[count]) {
                total += n;
                rows += 1;
            }
        }
    }

    if rows == 0 {
        Ok(None)
    } else {
        Ok(Some(total / rows as f64))
    }
}
