use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::align::{align_column, AlignOptions};
use crate::delta::{latest_with_delta, DeltaResult};
use crate::error::Result;
use crate::series::{Point, TimeSeries};
use crate::table::Table;

/// Fixed, ordered category labels for one dashboard view.
///
/// The order drives legend/stack order and the color slot assigned to each
/// label, so a category keeps its color across renders. Built once when the
/// raw rows are classified; read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorySet {
    labels: Vec<String>,
}

impl CategorySet {
    fn build(order: &[&str], seen: &[String], drop_uncategorized: bool) -> Self {
        let mut labels: Vec<String> = order.iter().map(|s| s.to_string()).collect();
        if !drop_uncategorized {
            for label in seen {
                if !labels.iter().any(|l| l == label) {
                    labels.push(label.clone());
                }
            }
        }
        Self { labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Stable color/identity slot for a label, by display position.
    pub fn color_slot(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// How to pivot a long-format table on its category dimension.
#[derive(Debug, Clone, Copy)]
pub struct PivotSpec<'a> {
    pub period_column: &'a str,
    pub category_column: &'a str,
    pub value_column: &'a str,
    /// Fixed display/stack order. Labels present in data but absent here are
    /// appended at the end in first-seen order unless `drop_uncategorized`.
    pub category_order: &'a [&'a str],
    pub drop_uncategorized: bool,
    /// Derive a `total` pseudo-category summed across the real categories.
    pub include_total: bool,
    pub options: AlignOptions,
}

impl<'a> PivotSpec<'a> {
    pub fn new(
        period_column: &'a str,
        category_column: &'a str,
        value_column: &'a str,
        category_order: &'a [&'a str],
        options: AlignOptions,
    ) -> Self {
        Self {
            period_column,
            category_column,
            value_column,
            category_order,
            drop_uncategorized: false,
            include_total: false,
            options,
        }
    }

    pub fn drop_uncategorized(mut self) -> Self {
        self.drop_uncategorized = true;
        self
    }

    pub fn with_total(mut self) -> Self {
        self.include_total = true;
        self
    }
}

/// One KPI widget's worth of output: a category and its delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryKpi {
    pub category: String,
    pub delta: DeltaResult,
}

/// A long-format chart row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRow {
    pub period: NaiveDate,
    pub category: String,
    pub value: Option<f64>,
}

/// Per-category breakdown of one metric: ordered KPIs for the metric row and
/// aligned series for the chart.
///
/// KPIs are always computed over the full category set; the chart-side
/// selection filter is applied afterwards by [`Pivot::chart_table`] and never
/// feeds back into the KPI values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pivot {
    pub categories: CategorySet,
    pub kpis: Vec<CategoryKpi>,
    /// Delta over the per-period sum across all real categories, when
    /// requested. Missing category values are zero-filled per period; a
    /// period where every category is a gap stays a gap.
    pub total: Option<DeltaResult>,
    series: Vec<TimeSeries>,
}

impl Pivot {
    pub fn kpi(&self, category: &str) -> Option<&DeltaResult> {
        self.kpis
            .iter()
            .find(|k| k.category == category)
            .map(|k| &k.delta)
    }

    /// Aligned series per category, in display order.
    pub fn series(&self) -> &[TimeSeries] {
        &self.series
    }

    /// Long-format rows for charting, restricted to the selected categories.
    ///
    /// `None` means no filter is applied (full category set). `Some(&[])`
    /// means nothing is selected and the chart is deliberately empty — a
    /// distinct state, not a fallback to "everything".
    pub fn chart_table(&self, selection: Option<&[&str]>) -> Vec<ChartRow> {
        let selected = |label: &str| match selection {
            None => true,
            Some(labels) => labels.contains(&label),
        };

        let mut rows = Vec::new();
        for series in &self.series {
            let label = series.category.as_deref().unwrap_or_default();
            if !selected(label) {
                continue;
            }
            for point in &series.points {
                rows.push(ChartRow {
                    period: point.period,
                    category: label.to_string(),
                    value: point.value,
                });
            }
        }
        rows.sort_by(|a, b| {
            a.period.cmp(&b.period).then_with(|| {
                self.categories
                    .color_slot(&a.category)
                    .cmp(&self.categories.color_slot(&b.category))
            })
        });
        rows
    }
}

/// Classify long-format rows by category and compute per-category KPIs plus
/// chart series.
///
/// Every label in `category_order` gets a KPI even with zero matching rows
/// (all fields `None` — it renders as "—", not an error). Labels found in
/// the data but missing from the order are appended in first-seen order, or
/// excluded entirely when `drop_uncategorized` is set.
pub fn pivot(table: &Table, spec: &PivotSpec<'_>) -> Result<Pivot> {
    let period_idx = table.column_index(spec.period_column)?;
    let category_idx = table.column_index(spec.category_column)?;
    let value_idx = table.column_index(spec.value_column)?;

    // First pass: category labels in first-seen order.
    let mut seen: Vec<String> = Vec::new();
    for row in table.rows() {
        match row[category_idx].as_text() {
            Some(label) => {
                if !seen.iter().any(|l| l == label) {
                    seen.push(label.to_string());
                }
            }
            None => log::debug!(
                "skipping row with non-text category cell: {:?}",
                row[category_idx]
            ),
        }
    }
    let categories = CategorySet::build(spec.category_order, &seen, spec.drop_uncategorized);

    // Second pass: one sub-table per category, aligned independently so each
    // KPI is an isolated application of the delta calculator.
    let mut series = Vec::with_capacity(categories.len());
    let mut kpis = Vec::with_capacity(categories.len());
    for label in categories.labels() {
        let mut sub = Table::new(vec![
            spec.period_column.to_string(),
            spec.value_column.to_string(),
        ]);
        for row in table.rows() {
            if row[category_idx].as_text() == Some(label) {
                sub.push_row(vec![row[period_idx].clone(), row[value_idx].clone()]);
            }
        }
        let mut aligned = align_column(&sub, spec.period_column, spec.value_column, &spec.options)?;
        aligned.category = Some(label.clone());
        kpis.push(CategoryKpi {
            category: label.clone(),
            delta: latest_with_delta(&aligned),
        });
        series.push(aligned);
    }

    let total = spec
        .include_total
        .then(|| latest_with_delta(&total_series(&series)));

    Ok(Pivot {
        categories,
        kpis,
        total,
        series,
    })
}

/// Per-period sum across category series. Zero-fills a category that is
/// missing in a period where another category has a value; keeps the period
/// a gap when no category has one.
fn total_series(series: &[TimeSeries]) -> TimeSeries {
    let mut buckets: BTreeMap<NaiveDate, Option<f64>> = BTreeMap::new();
    for s in series {
        for point in &s.points {
            let bucket = buckets.entry(point.period).or_insert(None);
            if let Some(v) = point.value {
                *bucket = Some(bucket.unwrap_or(0.0) + v);
            }
        }
    }
    TimeSeries {
        category: Some("total".to_string()),
        points: buckets
            .into_iter()
            .map(|(period, value)| Point::new(period, value))
            .collect(),
    }
}
