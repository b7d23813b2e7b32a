use serde::{Deserialize, Serialize};

use crate::series::TimeSeries;

/// Headline KPI value with its period-over-period comparison.
///
/// Every field is optional: an empty series, a single completed period, or a
/// zero prior value each leave the fields they cannot support as `None`. The
/// rendering layer decides how to present a missing value (typically "—")
/// and whether a positive delta is good or bad — the calculation itself is
/// direction-agnostic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaResult {
    pub latest: Option<f64>,
    pub previous: Option<f64>,
    pub absolute_delta: Option<f64>,
    pub percent_delta: Option<f64>,
}

impl DeltaResult {
    pub fn has_data(&self) -> bool {
        self.latest.is_some()
    }
}

/// Latest value and WoW/MoM delta versus the immediately preceding period.
///
/// Gap points (value `None`) are ignored: latest and previous are the last
/// two *present* values in period order, matching how the dashboards drop
/// null cells before comparing. `percent_delta` is `None` whenever the prior
/// value is missing or exactly zero — never `inf` or `NaN`.
pub fn latest_with_delta(series: &TimeSeries) -> DeltaResult {
    let present: Vec<f64> = series.present().map(|(_, v)| v).collect();

    let (latest, previous) = match present.as_slice() {
        [] => (None, None),
        [only] => (Some(*only), None),
        [.., prev, last] => (Some(*last), Some(*prev)),
    };

    let absolute_delta = match (latest, previous) {
        (Some(l), Some(p)) => Some(l - p),
        _ => None,
    };
    let percent_delta = match (absolute_delta, previous) {
        (Some(d), Some(p)) if p != 0.0 => Some(d / p * 100.0),
        _ => None,
    };

    DeltaResult {
        latest,
        previous,
        absolute_delta,
        percent_delta,
    }
}
