//! Per-day pricing.
//!
//! A seat covers one traveler for every calendar day of the trip, both
//! endpoints included.

use chrono::NaiveDate;

use tripcover_store::Trip;

use crate::error::{CoreError, Result};

/// Calendar days from `start` to `end`, counting both.  Zero when `end`
/// precedes `start`; callers validate ranges with [`validate_date_range`].
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        return 0;
    }
    (end - start).num_days() + 1
}

/// Price of one seat on `trip`.
pub fn seat_cost(trip: &Trip) -> i64 {
    trip.rate_cents
        .saturating_mul(days_inclusive(trip.start_date, trip.end_date))
}

/// Price of covering `headcount` travelers for the whole range.
pub fn quote(rate_cents: i64, start: NaiveDate, end: NaiveDate, headcount: u32) -> i64 {
    rate_cents
        .saturating_mul(days_inclusive(start, end))
        .saturating_mul(i64::from(headcount))
}

pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end < start {
        return Err(CoreError::validation(format!(
            "end date {end} is before start date {start}"
        )));
    }
    Ok(())
}

pub fn validate_rate(rate_cents: i64) -> Result<()> {
    if rate_cents <= 0 {
        return Err(CoreError::validation(format!(
            "rate must be positive, got {rate_cents} cents"
        )));
    }
    Ok(())
}

/// Render cents as dollars, e.g. `$8.75` or `-$3.00`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}
