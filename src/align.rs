use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::period::{parse_period, Granularity};
use crate::series::{Point, TimeSeries};
use crate::table::Table;

/// How multiple rows landing in the same bucket combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    /// Additive count metrics: sum the present values. Null cells contribute
    /// nothing; a bucket where every cell is null stays a gap.
    #[default]
    Sum,
    /// Snapshot metrics: the last row seen for the bucket wins, null or not.
    LatestWins,
}

/// A value column to extract, with its per-column aggregation rule.
#[derive(Debug, Clone, Copy)]
pub struct ValueColumn<'a> {
    pub name: &'a str,
    pub aggregate: Aggregate,
}

impl<'a> ValueColumn<'a> {
    pub fn summed(name: &'a str) -> Self {
        Self {
            name,
            aggregate: Aggregate::Sum,
        }
    }

    pub fn latest(name: &'a str) -> Self {
        Self {
            name,
            aggregate: Aggregate::LatestWins,
        }
    }
}

/// Alignment policy: bucket granularity and the evaluation date that decides
/// which bucket is still incomplete.
#[derive(Debug, Clone, Copy)]
pub struct AlignOptions {
    pub granularity: Granularity,
    pub as_of: NaiveDate,
}

impl AlignOptions {
    /// Evaluate as of today.
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            as_of: chrono::Local::now().date_naive(),
        }
    }

    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = date;
        self
    }
}

/// Normalize raw query rows into canonical per-column series.
///
/// Rows may arrive in any order and may include the current, not-yet-complete
/// bucket. Each output series is sorted ascending by period, holds one point
/// per bucket, and excludes every bucket at or past the start of the ongoing
/// one — WoW/MoM comparisons are only meaningful across completed periods.
///
/// Returns one series per entry in `columns`, tagged with the column name as
/// its category. A missing period or value column fails fast with
/// [`crate::Error::MissingColumn`]; rows whose period cell does not parse are
/// skipped. An empty table (or one whose rows are all in the current bucket)
/// yields empty series — "no data yet" is a value, not an error.
pub fn align(
    table: &Table,
    period_column: &str,
    columns: &[ValueColumn<'_>],
    options: &AlignOptions,
) -> Result<Vec<TimeSeries>> {
    let period_idx = table.column_index(period_column)?;
    let value_idxs: Vec<usize> = columns
        .iter()
        .map(|c| table.column_index(c.name))
        .collect::<Result<_>>()?;

    let cutoff = options.granularity.cutoff(options.as_of);
    let mut buckets: Vec<BTreeMap<NaiveDate, Option<f64>>> =
        vec![BTreeMap::new(); columns.len()];

    for row in table.rows() {
        let period_cell = &row[period_idx];
        let raw = match period_cell.as_text() {
            Some(s) => s,
            None => {
                log::debug!("skipping row with non-text period cell: {period_cell:?}");
                continue;
            }
        };
        let period = match parse_period(raw) {
            Ok(d) => options.granularity.truncate(d),
            Err(e) => {
                log::debug!("skipping row with unparseable period '{raw}': {e}");
                continue;
            }
        };
        if period >= cutoff {
            continue;
        }

        for (slot, (column, idx)) in columns.iter().zip(&value_idxs).enumerate() {
            let value = row[*idx].as_number();
            let bucket = buckets[slot].entry(period).or_insert(None);
            match column.aggregate {
                Aggregate::Sum => {
                    if let Some(v) = value {
                        *bucket = Some(bucket.unwrap_or(0.0) + v);
                    }
                }
                Aggregate::LatestWins => {
                    *bucket = value;
                }
            }
        }
    }

    Ok(columns
        .iter()
        .zip(buckets)
        .map(|(column, bucket)| TimeSeries {
            category: Some(column.name.to_string()),
            points: bucket
                .into_iter()
                .map(|(period, value)| Point::new(period, value))
                .collect(),
        })
        .collect())
}

/// Align a single value column with the default (sum) aggregation.
pub fn align_column(
    table: &Table,
    period_column: &str,
    value_column: &str,
    options: &AlignOptions,
) -> Result<TimeSeries> {
    let mut series = align(
        table,
        period_column,
        &[ValueColumn::summed(value_column)],
        options,
    )?;
    Ok(series.remove(0))
}
