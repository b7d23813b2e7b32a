use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One bucket of a time series. A `None` value is a gap — preserved, not
/// coerced to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub period: NaiveDate,
    pub value: Option<f64>,
}

impl Point {
    pub fn new(period: NaiveDate, value: Option<f64>) -> Self {
        Self { period, value }
    }
}

/// An ordered sequence of (period, value) points, optionally tagged with the
/// category it represents within a multi-category dataset.
///
/// Invariant: points are sorted ascending by period and unique per period
/// before any derived computation. [`crate::align::align`] produces series
/// in this form; hand-built series should call [`TimeSeries::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub category: Option<String>,
    pub points: Vec<Point>,
}

impl TimeSeries {
    pub fn new(category: Option<String>) -> Self {
        Self {
            category,
            points: Vec::new(),
        }
    }

    pub fn from_points(category: Option<String>, points: Vec<Point>) -> Self {
        let mut s = Self { category, points };
        s.normalize();
        s
    }

    /// Sort ascending by period and drop duplicate periods (last write wins).
    pub fn normalize(&mut self) {
        self.points.sort_by_key(|p| p.period);
        // dedup_by keeps the first of each run, so walk from the back
        let mut seen_from_end: Vec<Point> = Vec::with_capacity(self.points.len());
        for p in self.points.drain(..).rev() {
            if seen_from_end.last().map(|q: &Point| q.period) != Some(p.period) {
                seen_from_end.push(p);
            }
        }
        seen_from_end.reverse();
        self.points = seen_from_end;
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&Point> {
        self.points.last()
    }

    /// Values in period order.
    pub fn values(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.points.iter().map(|p| p.value)
    }

    /// (period, value) pairs with gaps skipped, in period order.
    pub fn present(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().filter_map(|p| p.value.map(|v| (p.period, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let s = TimeSeries::from_points(
            None,
            vec![
                Point::new(d("2024-01-15"), Some(2.0)),
                Point::new(d("2024-01-01"), Some(1.0)),
                Point::new(d("2024-01-15"), Some(3.0)),
            ],
        );
        assert_eq!(s.len(), 2);
        assert_eq!(s.points[0].period, d("2024-01-01"));
        // duplicate period: last write wins
        assert_eq!(s.points[1].value, Some(3.0));
    }

    #[test]
    fn test_present_skips_gaps() {
        let s = TimeSeries::from_points(
            Some("direct".into()),
            vec![
                Point::new(d("2024-01-01"), Some(1.0)),
                Point::new(d("2024-01-08"), None),
                Point::new(d("2024-01-15"), Some(3.0)),
            ],
        );
        let present: Vec<_> = s.present().collect();
        assert_eq!(present, vec![(d("2024-01-01"), 1.0), (d("2024-01-15"), 3.0)]);
        // but the gap is still a point
        assert_eq!(s.len(), 3);
    }
}
