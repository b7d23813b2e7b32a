use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::date_util::{month_start, week_start};
use crate::error::{Error, Result};

static RE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").unwrap());
static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());

/// The bucket size a dashboard view compares across: weekly for WoW,
/// monthly for MoM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Week,
    Month,
}

impl Granularity {
    /// Snap a date to the start of its bucket: Monday for weeks, the first
    /// of the month for months.
    pub fn truncate(&self, d: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Week => week_start(d),
            Granularity::Month => month_start(d),
        }
    }

    /// Start of the bucket containing `as_of` — the still-accumulating
    /// current period. Buckets at or past this cutoff are incomplete and
    /// excluded from period-over-period comparisons.
    pub fn cutoff(&self, as_of: NaiveDate) -> NaiveDate {
        self.truncate(as_of)
    }
}

impl std::str::FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "week" | "weekly" | "wow" => Ok(Granularity::Week),
            "month" | "monthly" | "mom" => Ok(Granularity::Month),
            other => Err(Error::PeriodParse(format!(
                "unrecognized granularity: {other}"
            ))),
        }
    }
}

/// Parse a period cell into a date.
///
/// Warehouse results carry period keys as `DATE` or `TIMESTAMP` text
/// (`2024-01-08`, `2024-01-08 00:00:00`) or as month keys (`2024-01`).
pub fn parse_period(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    if let Some(caps) = RE_DATE.captures(s) {
        let year: i32 = caps[1].parse().unwrap();
        let month: u32 = caps[2].parse().unwrap();
        let day: u32 = caps[3].parse().unwrap();
        return NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| Error::PeriodParse(format!("invalid date: {s}")));
    }

    if let Some(caps) = RE_MONTH.captures(s) {
        let year: i32 = caps[1].parse().unwrap();
        let month: u32 = caps[2].parse().unwrap();
        return NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| Error::PeriodParse(format!("invalid month: {s}")));
    }

    Err(Error::PeriodParse(format!("unrecognized period: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_period("2024-01-08").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
    }

    #[test]
    fn test_parse_timestamp_prefix() {
        assert_eq!(
            parse_period("2024-01-08 13:45:00").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
        assert_eq!(
            parse_period("2024-01-08T00:00:00Z").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
    }

    #[test]
    fn test_parse_month_key() {
        assert_eq!(
            parse_period("2024-03").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_period("garbage").is_err());
        assert!(parse_period("2024-13-01").is_err());
        assert!(parse_period("2024-00").is_err());
        assert!(parse_period("").is_err());
    }

    #[test]
    fn test_truncate_week() {
        let wed = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(
            Granularity::Week.truncate(wed),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
    }

    #[test]
    fn test_truncate_month() {
        let d = NaiveDate::from_ymd_opt(2024, 7, 23).unwrap();
        assert_eq!(
            Granularity::Month.truncate(d),
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
        );
    }

    #[test]
    fn test_cutoff_is_current_bucket_start() {
        // as_of Thursday 2024-01-11: anything from Monday 2024-01-08 on is
        // still accumulating
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap();
        assert_eq!(
            Granularity::Week.cutoff(as_of),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
        assert_eq!(
            Granularity::Month.cutoff(as_of),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_granularity_from_str() {
        assert_eq!("week".parse::<Granularity>().unwrap(), Granularity::Week);
        assert_eq!("Monthly".parse::<Granularity>().unwrap(), Granularity::Month);
        assert!("daily".parse::<Granularity>().is_err());
    }
}
