//! Equal-width date histograms.
//!
//! Splits the span `[first, last]` of a date series into `n` intervals of equal
//! duration and accumulates the counts of the points falling in each one. The
//! last boundary is always exactly the last date so rounding never leaves a
//! point outside the histogram.

use crate::core::literal::{midnight_utc, parse_date_time};
use crate::core::{Row, Scalar};
use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::str::FromStr;

/// One dated observation, e.g. "12 people born on this day".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatePoint {
    pub date: DateTime<FixedOffset>,
    pub count: u64,
}

impl DatePoint {
    pub fn new(date: DateTime<FixedOffset>, count: u64) -> Self {
        Self { date, count }
    }

    /// Read a point from the `date` and `count` columns of a flattened row.
    ///
    /// A string date is read from its first ten characters as `YYYY-MM-DD`;
    /// endpoints deliver `xsd:date` values that way.
    pub fn from_row(index: usize, row: &Row) -> Result<Self> {
        let date = match row.get("date") {
            Some(Scalar::DateTime(dt)) => *dt,
            Some(Scalar::String(s)) => parse_date_prefix(s)?,
            Some(other) => {
                return Err(Error::InvalidArgument(format!(
                    "row {}: date column holds a {}",
                    index,
                    other.kind()
                )))
            }
            None => return Err(missing(index, "date")),
        };

        let count = match row.get("count") {
            Some(Scalar::Integer(n)) => u64::try_from(*n).map_err(|_| {
                Error::InvalidArgument(format!("row {}: negative count {}", index, n))
            })?,
            Some(Scalar::String(s)) => s.trim().parse::<u64>().map_err(|e| {
                Error::InvalidArgument(format!("row {}: count {:?}: {}", index, s, e))
            })?,
            Some(other) => {
                return Err(Error::InvalidArgument(format!(
                    "row {}: count column holds a {}",
                    index,
                    other.kind()
                )))
            }
            None => return Err(missing(index, "count")),
        };

        Ok(Self { date, count })
    }
}

fn missing(row: usize, column: &str) -> Error {
    Error::MissingColumn { row, column: column.to_string() }
}

fn parse_date_prefix(raw: &str) -> Result<DateTime<FixedOffset>> {
    let prefix = raw.get(..10).unwrap_or(raw);
    match NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
        Ok(date) => Ok(midnight_utc(date)),
        Err(_) => parse_date_time(raw),
    }
}

/// Read every row of a statistics result set as a [`DatePoint`].
pub fn points_from_rows(rows: &[Row]) -> Result<Vec<DatePoint>> {
    rows.iter().enumerate().map(|(index, row)| DatePoint::from_row(index, row)).collect()
}

/// How points sitting exactly on a boundary are counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryMode {
    /// `[lower, upper]` for every bin: a point on an interior boundary counts
    /// in both neighbouring bins.
    #[default]
    Inclusive,
    /// `[lower, upper)` for every bin except the last, which is closed.
    HalfOpen,
}

impl FromStr for BoundaryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "inclusive" => Ok(BoundaryMode::Inclusive),
            "half-open" | "half_open" | "halfopen" => Ok(BoundaryMode::HalfOpen),
            other => Err(Error::Config(format!("unknown boundary mode '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bin {
    pub label: String,
    pub lower_bound: DateTime<FixedOffset>,
    pub upper_bound: DateTime<FixedOffset>,
    pub count: u64,
}

impl Bin {
    fn contains(&self, date: &DateTime<FixedOffset>, mode: BoundaryMode, last: bool) -> bool {
        match mode {
            BoundaryMode::Inclusive => self.lower_bound <= *date && *date <= self.upper_bound,
            BoundaryMode::HalfOpen if last => {
                self.lower_bound <= *date && *date <= self.upper_bound
            }
            BoundaryMode::HalfOpen => self.lower_bound <= *date && *date < self.upper_bound,
        }
    }
}

/// Bin `points` into `n` equal-width intervals.
///
/// Points need not be sorted. Empty input yields no bins. When every point
/// has the same date all bins collapse onto that instant and each of them
/// counts every point in inclusive mode.
pub fn bin(mut points: Vec<DatePoint>, n: NonZeroU32, mode: BoundaryMode) -> Result<Vec<Bin>> {
    if points.is_empty() {
        return Ok(Vec::new());
    }
    points.sort_by_key(|p| p.date);

    let first = points[0].date;
    let last = points[points.len() - 1].date;
    let boundaries = boundaries(first, last, n)?;

    let mut bins: Vec<Bin> = boundaries
        .windows(2)
        .map(|pair| Bin {
            label: format!("{} - {}", pair[0].year(), pair[1].year()),
            lower_bound: pair[0],
            upper_bound: pair[1],
            count: 0,
        })
        .collect();

    let last_index = bins.len() - 1;
    for point in &points {
        for (i, bin) in bins.iter_mut().enumerate() {
            if bin.contains(&point.date, mode, i == last_index) {
                bin.count += point.count;
                if mode == BoundaryMode::HalfOpen {
                    break;
                }
            }
        }
    }

    tracing::debug!(points = points.len(), bins = bins.len(), ?mode, "built date histogram");
    Ok(bins)
}

/// `n + 1` boundaries from `first` to `last`, the final one exactly `last`.
fn boundaries(
    first: DateTime<FixedOffset>,
    last: DateTime<FixedOffset>,
    n: NonZeroU32,
) -> Result<Vec<DateTime<FixedOffset>>> {
    let steps = i32::try_from(n.get())
        .map_err(|_| Error::InvalidArgument(format!("too many bins: {}", n)))?;
    let step: TimeDelta = (last - first) / steps;

    let mut boundaries: Vec<DateTime<FixedOffset>> =
        (0..steps).map(|i| first + step * i).collect();
    boundaries.push(last);
    Ok(boundaries)
}
