use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use shopmetrics::{
    growth_summary, Dashboard, DeltaResult, Granularity, PivotSpec, ValueColumn, Warehouse,
};

#[derive(Parser)]
#[command(name = "shopmetrics", about = "Dashboard metrics over a local warehouse snapshot")]
struct Cli {
    /// Database path (default: ~/.shopmetrics/shopmetrics.db)
    #[arg(long)]
    db: Option<String>,

    /// Evaluation date for the completed-period cutoff (default: today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    as_of: Option<NaiveDate>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load or refresh the warehouse snapshot from a SQL script
    Exec {
        /// Path to a .sql file, or '-' for stdin
        file: String,
    },
    /// Latest value and WoW/MoM delta for one or more value columns
    Kpi {
        /// Query producing a period column plus the value columns
        sql: String,
        /// Name of the period column
        #[arg(long, default_value = "week")]
        period_column: String,
        /// Value columns to report
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<String>,
        /// week or month
        #[arg(long, default_value = "week")]
        granularity: Granularity,
        /// Take the last row per bucket instead of summing
        #[arg(long)]
        latest_wins: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Per-category KPIs and chart rows for a long-format query
    Pivot {
        /// Query producing (period, category, value) rows
        sql: String,
        #[arg(long, default_value = "week")]
        period_column: String,
        #[arg(long, default_value = "category")]
        category_column: String,
        #[arg(long, default_value = "value")]
        value_column: String,
        /// Fixed category display order
        #[arg(long, value_delimiter = ',')]
        order: Vec<String>,
        /// Restrict the chart rows to these categories (KPIs are unaffected)
        #[arg(long, value_delimiter = ',')]
        select: Option<Vec<String>>,
        /// Exclude categories not named in --order
        #[arg(long)]
        drop_uncategorized: bool,
        /// Add a total pseudo-category
        #[arg(long)]
        total: bool,
        #[arg(long, default_value = "week")]
        granularity: Granularity,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Output chart rows as CSV
        #[arg(long)]
        csv: bool,
    },
    /// Period-over-period growth series for a value column
    Growth {
        sql: String,
        #[arg(long, default_value = "week")]
        period_column: String,
        #[arg(long, default_value = "value")]
        value_column: String,
        #[arg(long, default_value = "week")]
        granularity: Granularity,
        /// Print summary statistics instead of the series
        #[arg(long)]
        summary: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show warehouse status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let warehouse = match &cli.db {
        Some(path) => Warehouse::open_at(path).await?,
        None => Warehouse::open().await?,
    };

    let mut dash = Dashboard::new(Box::new(warehouse.clone()));
    if let Some(as_of) = cli.as_of {
        dash = dash.with_as_of(as_of);
    }

    match cli.command {
        Commands::Exec { file } => {
            let sql = if file == "-" {
                std::io::read_to_string(std::io::stdin())?
            } else {
                std::fs::read_to_string(&file)?
            };
            warehouse.execute_batch(&sql).await?;
            eprintln!("Loaded {file}");
        }
        Commands::Kpi {
            sql,
            period_column,
            columns,
            granularity,
            latest_wins,
            json,
        } => {
            let columns: Vec<ValueColumn> = columns
                .iter()
                .map(|name| {
                    if latest_wins {
                        ValueColumn::latest(name)
                    } else {
                        ValueColumn::summed(name)
                    }
                })
                .collect();
            let kpis = dash.kpis(&sql, &period_column, &columns, granularity).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&kpis)?);
            } else {
                for kpi in &kpis {
                    println!("{:<32} {}", kpi.category, format_delta(&kpi.delta));
                }
            }
        }
        Commands::Pivot {
            sql,
            period_column,
            category_column,
            value_column,
            order,
            select,
            drop_uncategorized,
            total,
            granularity,
            json,
            csv,
        } => {
            let order_refs: Vec<&str> = order.iter().map(|s| s.as_str()).collect();
            let mut spec = PivotSpec::new(
                &period_column,
                &category_column,
                &value_column,
                &order_refs,
                dash.align_options(granularity),
            );
            if drop_uncategorized {
                spec = spec.drop_uncategorized();
            }
            if total {
                spec = spec.with_total();
            }
            let result = dash.pivot(&sql, &spec).await?;

            let select_refs: Option<Vec<&str>> =
                select.as_ref().map(|s| s.iter().map(|c| c.as_str()).collect());
            let chart = result.chart_table(select_refs.as_deref());

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "kpis": result.kpis,
                        "total": result.total,
                        "chart": chart,
                    }))?
                );
            } else if csv {
                println!("period,category,value");
                for row in &chart {
                    println!(
                        "{},{},{}",
                        row.period,
                        row.category,
                        row.value.map_or(String::new(), |v| v.to_string())
                    );
                }
            } else {
                for kpi in &result.kpis {
                    println!("{:<32} {}", kpi.category, format_delta(&kpi.delta));
                }
                if let Some(total) = &result.total {
                    println!("{:<32} {}", "total", format_delta(total));
                }
            }
        }
        Commands::Growth {
            sql,
            period_column,
            value_column,
            granularity,
            summary,
            json,
        } => {
            let series = dash
                .series(&sql, &period_column, &value_column, granularity)
                .await?;
            if summary {
                let stats = growth_summary(&series);
                if json {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    println!("periods:          {}", stats.periods);
                    println!("avg net change:   {}", format_opt(stats.avg_net_change));
                    println!("avg growth:       {}%", format_opt(stats.avg_growth_pct));
                    println!("total net change: {}", format_opt(stats.total_net_change));
                    println!(
                        "positive periods: {}/{} ({}%)",
                        stats.positive_periods,
                        stats.periods,
                        format_opt(stats.success_rate())
                    );
                }
            } else {
                let growth = shopmetrics::growth_series(&series);
                if json {
                    println!("{}", serde_json::to_string_pretty(&growth)?);
                } else {
                    for point in &growth.points {
                        match point.value {
                            Some(v) => println!("{}  {v:+.2}%", point.period),
                            None => println!("{}  —", point.period),
                        }
                    }
                }
            }
        }
        Commands::Status => {
            print_status(&warehouse).await?;
        }
    }

    Ok(())
}

fn format_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "—".to_string(), |v| format!("{v:.2}"))
}

fn format_delta(delta: &DeltaResult) -> String {
    match delta.latest {
        None => "—".to_string(),
        Some(latest) => match (delta.absolute_delta, delta.percent_delta) {
            (Some(abs), Some(pct)) => format!("{latest:.0} ({abs:+.0}, {pct:+.1}%)"),
            (Some(abs), None) => format!("{latest:.0} ({abs:+.0})"),
            _ => format!("{latest:.0}"),
        },
    }
}

async fn print_status(warehouse: &Warehouse) -> anyhow::Result<()> {
    use shopmetrics::QueryRunner;

    let tables = warehouse
        .run_query("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
        .await?;
    if tables.is_empty() {
        println!("Warehouse is empty. Load a snapshot with 'shopmetrics exec <file.sql>'.");
        return Ok(());
    }
    for row in tables.rows() {
        if let Some(name) = row[0].as_text() {
            let count = warehouse
                .run_query(&format!("SELECT COUNT(*) AS n FROM \"{name}\""))
                .await?;
            let n = count.cell(0, 0).as_number().unwrap_or(0.0);
            println!("{name:<40} {n:>10.0} rows");
        }
    }
    Ok(())
}
