pub mod align;
pub mod date_util;
pub mod delta;
pub mod error;
pub mod growth;
pub mod period;
pub mod pivot;
pub mod series;
pub mod table;
pub mod warehouse;

pub use align::{align, align_column, Aggregate, AlignOptions, ValueColumn};
pub use delta::{latest_with_delta, DeltaResult};
pub use error::{Error, Result};
pub use growth::{growth_series, growth_summary, net_change_series, GrowthSummary};
pub use period::Granularity;
pub use pivot::{pivot, CategoryKpi, CategorySet, ChartRow, Pivot, PivotSpec};
pub use series::{Point, TimeSeries};
pub use table::{Cell, Table};
pub use warehouse::{CachedRunner, QueryRunner, Warehouse};

use chrono::NaiveDate;

/// Main entry point for a set of dashboard views sharing one query runner.
///
/// Each method degrades an upstream query failure to an empty table — logged
/// for operators, rendered as "no data available" — so one failing metric
/// never blanks a whole page. Configuration mistakes (a column name that is
/// not in the result) still fail fast.
pub struct Dashboard {
    runner: Box<dyn QueryRunner>,
    as_of: NaiveDate,
}

impl Dashboard {
    pub fn new(runner: Box<dyn QueryRunner>) -> Self {
        Self {
            runner,
            as_of: chrono::Local::now().date_naive(),
        }
    }

    /// Pin the evaluation date (the "now" of the completed-period cutoff).
    pub fn with_as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = date;
        self
    }

    pub fn align_options(&self, granularity: Granularity) -> AlignOptions {
        AlignOptions::new(granularity).as_of(self.as_of)
    }

    /// Fetch a table, substituting an empty one when the warehouse call
    /// fails. Empty tables flow through every computation as "no data yet".
    pub async fn table(&self, sql: &str) -> Table {
        match self.runner.run_query(sql).await {
            Ok(table) => table,
            Err(e) => {
                log::warn!("query failed, rendering as no data: {e}");
                Table::empty()
            }
        }
    }

    /// One KPI card: latest value and delta for a single value column.
    pub async fn kpi(
        &self,
        sql: &str,
        period_column: &str,
        value_column: &str,
        granularity: Granularity,
    ) -> Result<DeltaResult> {
        let series = self.series(sql, period_column, value_column, granularity).await?;
        Ok(latest_with_delta(&series))
    }

    /// A KPI row: one delta per value column, in the given order.
    pub async fn kpis(
        &self,
        sql: &str,
        period_column: &str,
        columns: &[ValueColumn<'_>],
        granularity: Granularity,
    ) -> Result<Vec<CategoryKpi>> {
        let table = self.table(sql).await;
        if table.is_empty() && table.columns().is_empty() {
            // failed or empty upstream: every card renders as "—"
            return Ok(columns
                .iter()
                .map(|c| CategoryKpi {
                    category: c.name.to_string(),
                    delta: DeltaResult::default(),
                })
                .collect());
        }
        let series = align(&table, period_column, columns, &self.align_options(granularity))?;
        Ok(series
            .iter()
            .map(|s| CategoryKpi {
                category: s.category.clone().unwrap_or_default(),
                delta: latest_with_delta(s),
            })
            .collect())
    }

    /// An aligned single-column series, for trend charts.
    pub async fn series(
        &self,
        sql: &str,
        period_column: &str,
        value_column: &str,
        granularity: Granularity,
    ) -> Result<TimeSeries> {
        let table = self.table(sql).await;
        if table.is_empty() && table.columns().is_empty() {
            return Ok(TimeSeries::new(Some(value_column.to_string())));
        }
        align_column(&table, period_column, value_column, &self.align_options(granularity))
    }

    /// Period-over-period growth % series for one value column.
    pub async fn growth(
        &self,
        sql: &str,
        period_column: &str,
        value_column: &str,
        granularity: Granularity,
    ) -> Result<TimeSeries> {
        let series = self.series(sql, period_column, value_column, granularity).await?;
        Ok(growth_series(&series))
    }

    /// Category breakdown for a long-format result.
    pub async fn pivot(&self, sql: &str, spec: &PivotSpec<'_>) -> Result<Pivot> {
        let table = self.table(sql).await;
        if table.is_empty() && table.columns().is_empty() {
            // synthesize the expected shape so every ordered category still
            // renders a placeholder KPI
            let placeholder = Table::new(vec![
                spec.period_column.to_string(),
                spec.category_column.to_string(),
                spec.value_column.to_string(),
            ]);
            return pivot::pivot(&placeholder, spec);
        }
        pivot::pivot(&table, spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    async fn dashboard() -> Dashboard {
        let wh = Warehouse::open_memory().await.unwrap();
        wh.execute_batch(
            "CREATE TABLE weekly_metrics (week TEXT, installs INTEGER, upgrades INTEGER);
             INSERT INTO weekly_metrics VALUES ('2024-01-22', 100, 10);
             INSERT INTO weekly_metrics VALUES ('2024-01-29', 140, 8);
             INSERT INTO weekly_metrics VALUES ('2024-02-05', 7, 1);",
        )
        .await
        .unwrap();
        Dashboard::new(Box::new(wh)).with_as_of(d("2024-02-07"))
    }

    #[tokio::test]
    async fn test_kpi_excludes_current_week() {
        let dash = dashboard().await;
        let kpi = dash
            .kpi("SELECT week, installs FROM weekly_metrics", "week", "installs", Granularity::Week)
            .await
            .unwrap();
        // the 2024-02-05 row is the in-progress week
        assert_eq!(kpi.latest, Some(140.0));
        assert_eq!(kpi.previous, Some(100.0));
        assert_eq!(kpi.absolute_delta, Some(40.0));
        assert_eq!(kpi.percent_delta, Some(40.0));
    }

    #[tokio::test]
    async fn test_kpi_row_orders_by_column() {
        let dash = dashboard().await;
        let kpis = dash
            .kpis(
                "SELECT week, installs, upgrades FROM weekly_metrics",
                "week",
                &[ValueColumn::summed("installs"), ValueColumn::summed("upgrades")],
                Granularity::Week,
            )
            .await
            .unwrap();
        assert_eq!(kpis[0].category, "installs");
        assert_eq!(kpis[1].category, "upgrades");
        assert_eq!(kpis[1].delta.absolute_delta, Some(-2.0));
    }

    #[tokio::test]
    async fn test_failed_query_degrades_to_placeholders() {
        let dash = dashboard().await;
        let kpis = dash
            .kpis(
                "SELECT nope FROM missing_table",
                "week",
                &[ValueColumn::summed("installs")],
                Granularity::Week,
            )
            .await
            .unwrap();
        assert_eq!(kpis.len(), 1);
        assert!(!kpis[0].delta.has_data());
    }

    #[tokio::test]
    async fn test_misnamed_column_still_fails_fast() {
        let dash = dashboard().await;
        let err = dash
            .kpi("SELECT week, installs FROM weekly_metrics", "week", "instals", Granularity::Week)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn { .. }));
    }

    #[tokio::test]
    async fn test_growth_from_warehouse() {
        let dash = dashboard().await;
        let g = dash
            .growth("SELECT week, installs FROM weekly_metrics", "week", "installs", Granularity::Week)
            .await
            .unwrap();
        assert_eq!(g.values().collect::<Vec<_>>(), vec![None, Some(40.0)]);
    }

    #[tokio::test]
    async fn test_pivot_on_failed_query_keeps_category_row() {
        let dash = dashboard().await;
        let spec = PivotSpec::new(
            "week",
            "upgrade_path",
            "upgrades",
            &["direct", "free_trial"],
            dash.align_options(Granularity::Week),
        );
        let p = dash.pivot("SELECT broken", &spec).await.unwrap();
        assert_eq!(p.kpis.len(), 2);
        assert!(p.kpis.iter().all(|k| !k.delta.has_data()));
    }
}
