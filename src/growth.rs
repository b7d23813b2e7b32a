use serde::{Deserialize, Serialize};

use crate::series::{Point, TimeSeries};

/// Period-over-period percent growth for an entire series.
///
/// Each output point carries `(current - previous) / previous * 100`
/// relative to its immediate predecessor. The first point, any point whose
/// predecessor is a gap or zero, and gap points themselves are all `None` —
/// the strict adjacent-pair rule, so growth is never interpolated across
/// missing weeks.
pub fn growth_series(series: &TimeSeries) -> TimeSeries {
    let points = series
        .points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let rate = if i == 0 {
                None
            } else {
                match (series.points[i - 1].value, point.value) {
                    (Some(prev), Some(current)) if prev != 0.0 => {
                        Some((current - prev) / prev * 100.0)
                    }
                    _ => None,
                }
            };
            Point::new(point.period, rate)
        })
        .collect();

    TimeSeries {
        category: series.category.clone(),
        points,
    }
}

/// Absolute period-over-period change (net adds), same adjacency rule as
/// [`growth_series`] minus the zero-denominator concern.
pub fn net_change_series(series: &TimeSeries) -> TimeSeries {
    let points = series
        .points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let change = if i == 0 {
                None
            } else {
                match (series.points[i - 1].value, point.value) {
                    (Some(prev), Some(current)) => Some(current - prev),
                    _ => None,
                }
            };
            Point::new(point.period, change)
        })
        .collect();

    TimeSeries {
        category: series.category.clone(),
        points,
    }
}

/// Aggregate growth statistics for a summary table row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrowthSummary {
    /// Completed periods with a defined net change.
    pub periods: usize,
    pub avg_net_change: Option<f64>,
    pub avg_growth_pct: Option<f64>,
    pub total_net_change: Option<f64>,
    /// Periods whose net change was strictly positive.
    pub positive_periods: usize,
}

impl GrowthSummary {
    /// Share of defined periods with positive growth, as a percentage.
    pub fn success_rate(&self) -> Option<f64> {
        if self.periods == 0 {
            None
        } else {
            Some(self.positive_periods as f64 / self.periods as f64 * 100.0)
        }
    }
}

/// Summarize a metric's growth across its whole history.
pub fn growth_summary(series: &TimeSeries) -> GrowthSummary {
    let changes: Vec<f64> = net_change_series(series)
        .points
        .iter()
        .filter_map(|p| p.value)
        .collect();
    let rates: Vec<f64> = growth_series(series)
        .points
        .iter()
        .filter_map(|p| p.value)
        .collect();

    let periods = changes.len();
    if periods == 0 {
        return GrowthSummary::default();
    }

    let total: f64 = changes.iter().sum();
    GrowthSummary {
        periods,
        avg_net_change: Some(total / periods as f64),
        avg_growth_pct: if rates.is_empty() {
            None
        } else {
            Some(rates.iter().sum::<f64>() / rates.len() as f64)
        },
        total_net_change: Some(total),
        positive_periods: changes.iter().filter(|c| **c > 0.0).count(),
    }
}
