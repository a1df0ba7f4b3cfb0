//! Calendar helpers: ISO date parsing, inclusive date ranges and the
//! day/month/year bucketing used by the period aggregator.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Parse an ISO-8601 date string into a calendar date.
///
/// Accepts a plain `YYYY-MM-DD` date, an RFC 3339 timestamp (normalised to
/// UTC before the date is taken) or a naive `YYYY-MM-DDTHH:MM:SS[.fff]`
/// timestamp.
pub fn parse_iso_date(input: &str) -> Result<NaiveDate, String> {
    let trimmed = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.date());
    }

    Err(format!("invalid ISO date '{}'", input))
}

/// Inclusive calendar date range; either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, String> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(format!("startDate {} is after endDate {}", s, e));
            }
        }
        Ok(Self { start, end })
    }

    /// Range without bounds; matches every date.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Closed range `[start, end]`.
    pub fn between(start: NaiveDate, end: NaiveDate) -> Result<Self, String> {
        Self::new(Some(start), Some(end))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Aggregation granularity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Day,
    Month,
    Year,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Month => "month",
            Period::Year => "year",
        }
    }

    /// Bucket a snapshot date falls into for this granularity.
    pub fn bucket_for(&self, date: NaiveDate) -> PeriodBucket {
        let start = match self {
            Period::Day => date,
            Period::Month => date.with_day(1).unwrap_or(date),
            Period::Year => date.with_ordinal(1).unwrap_or(date),
        };
        PeriodBucket {
            period: *self,
            start,
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" => Ok(Period::Day),
            "month" | "monthly" => Ok(Period::Month),
            "year" | "yearly" => Ok(Period::Year),
            other => Err(format!(
                "Unknown period '{}': expected day, month or year",
                other
            )),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-grouping key: the granularity plus the first calendar day it covers.
///
/// Ordering follows `start`, so buckets of one granularity sort chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodBucket {
    pub period: Period,
    pub start: NaiveDate,
}

impl PeriodBucket {
    /// Label used on the wire: `2024-01-05`, `2024-01` or `2024`.
    pub fn label(&self) -> String {
        match self.period {
            Period::Day => self.start.format("%Y-%m-%d").to_string(),
            Period::Month => self.start.format("%Y-%m").to_string(),
            Period::Year => self.start.format("%Y").to_string(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.period.bucket_for(date) == *self
    }
}

impl fmt::Display for PeriodBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for PeriodBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_plain_date() {
        assert_eq!(parse_iso_date("2024-01-05").unwrap(), d(2024, 1, 5));
        assert_eq!(parse_iso_date(" 2024-01-05 ").unwrap(), d(2024, 1, 5));
    }

    #[test]
    fn test_parse_rfc3339_normalises_to_utc() {
        assert_eq!(
            parse_iso_date("2024-01-05T00:00:00.000Z").unwrap(),
            d(2024, 1, 5)
        );
        assert_eq!(
            parse_iso_date("2024-01-05T01:30:00+02:00").unwrap(),
            d(2024, 1, 4)
        );
    }

    #[test]
    fn test_parse_naive_datetime() {
        assert_eq!(
            parse_iso_date("2024-03-10T12:00:00").unwrap(),
            d(2024, 3, 10)
        );
    }

    #[test]
    fn test_parse_invalid_date() {
        assert!(parse_iso_date("2024-13-01").is_err());
        assert!(parse_iso_date("yesterday").is_err());
        assert!(parse_iso_date("").is_err());
    }

    #[test]
    fn test_date_range_inclusive() {
        let range = DateRange::between(d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        assert!(range.contains(d(2024, 1, 1)));
        assert!(range.contains(d(2024, 1, 31)));
        assert!(!range.contains(d(2023, 12, 31)));
        assert!(!range.contains(d(2024, 2, 1)));
    }

    #[test]
    fn test_date_range_open_bounds() {
        let from = DateRange::new(Some(d(2024, 1, 1)), None).unwrap();
        assert!(from.contains(d(2030, 1, 1)));
        assert!(!from.contains(d(2023, 1, 1)));
        assert!(DateRange::unbounded().contains(d(1970, 1, 1)));
        assert!(DateRange::unbounded().is_unbounded());
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        assert!(DateRange::between(d(2024, 2, 1), d(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_period_from_str() {
        assert_eq!("day".parse::<Period>().unwrap(), Period::Day);
        assert_eq!("Month".parse::<Period>().unwrap(), Period::Month);
        assert_eq!("YEAR".parse::<Period>().unwrap(), Period::Year);
        assert!("week".parse::<Period>().is_err());
    }

    #[test]
    fn test_bucket_labels() {
        let date = d(2024, 2, 17);
        assert_eq!(Period::Day.bucket_for(date).label(), "2024-02-17");
        assert_eq!(Period::Month.bucket_for(date).label(), "2024-02");
        assert_eq!(Period::Year.bucket_for(date).label(), "2024");
    }

    #[test]
    fn test_bucket_ordering_is_chronological() {
        let mut buckets = vec![
            Period::Month.bucket_for(d(2024, 3, 2)),
            Period::Month.bucket_for(d(2023, 12, 30)),
            Period::Month.bucket_for(d(2024, 1, 15)),
        ];
        buckets.sort();
        let labels: Vec<String> = buckets.iter().map(|b| b.label()).collect();
        assert_eq!(labels, vec!["2023-12", "2024-01", "2024-03"]);
    }

    #[test]
    fn test_bucket_serializes_as_label() {
        let bucket = Period::Year.bucket_for(d(2024, 6, 1));
        assert_eq!(serde_json::to_string(&bucket).unwrap(), "\"2024\"");
    }

    #[test]
    fn test_bucket_contains() {
        let bucket = Period::Month.bucket_for(d(2024, 1, 10));
        assert!(bucket.contains(d(2024, 1, 31)));
        assert!(!bucket.contains(d(2024, 2, 1)));
    }
}
