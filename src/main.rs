use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::{PgPool, PgPoolOptions};

mod db;
mod error;
mod export;
mod filters;
mod matcher;
mod metrics;
mod models;
mod report;
mod snapshot;
mod tabulate;
mod timeline;

use export::ExportFormat;
use filters::{MetricsQuery, ReportQuery, Selection};
use models::Dataset;
use tabulate::ReportYear;

#[derive(Parser)]
#[command(name = "alo-analytics")]
#[command(about = "Counselor performance analytics for the ALO study-abroad CRM", long_about = None)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,
    /// Log debug output (overridden by ALO_LOG)
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
    /// Read records from a JSON snapshot instead of Postgres
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,
    /// Rows fetched per collection
    #[arg(long, env = "ALO_FETCH_LIMIT", default_value_t = 500, global = true)]
    limit: usize,
}

#[derive(Args)]
struct ScopeArgs {
    /// Counselor id, or "all"
    #[arg(long, default_value = "all")]
    counselor: Selection,
    /// Intake label such as "September 2026", or "all"
    #[arg(long, default_value = "all")]
    intake: Selection,
}

#[derive(Clone, Copy, ValueEnum)]
enum MatchKind {
    Courses,
    Scholarships,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo counseling team
    Seed,
    /// Import records from a JSON snapshot into Postgres
    Import {
        #[arg(long)]
        json: PathBuf,
    },
    /// Per-counselor performance metrics
    Metrics {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, default_value_t = 30)]
        since_days: i64,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Export the monthly application matrix as a spreadsheet
    Monthly {
        #[arg(long)]
        year: ReportYear,
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, value_enum, default_value_t = ExportFormat::Xlsx)]
        format: ExportFormat,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Generate a markdown performance report
    Report {
        #[arg(long)]
        year: ReportYear,
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, default_value_t = 30)]
        since_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Rank courses or scholarships for a student
    Match {
        #[arg(long)]
        student: String,
        #[arg(long, value_enum, default_value_t = MatchKind::Courses)]
        kind: MatchKind,
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("ALO_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

async fn connect(source: &SourceArgs) -> anyhow::Result<PgPool> {
    let database_url = source
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_dataset(source: &SourceArgs) -> anyhow::Result<Dataset> {
    match &source.snapshot {
        Some(path) => snapshot::load(path),
        None => {
            let pool = connect(source).await?;
            db::fetch_dataset(&pool, source.limit).await
        }
    }
}

fn metrics_query(scope: &ScopeArgs, since_days: i64) -> MetricsQuery {
    MetricsQuery {
        counselor: scope.counselor.clone(),
        window_days: since_days,
        intake: scope.intake.clone(),
        as_of: chrono::Utc::now().naive_utc(),
    }
}

fn report_query(scope: &ScopeArgs) -> ReportQuery {
    ReportQuery {
        counselor: scope.counselor.clone(),
        intake: scope.intake.clone(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&cli.source).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&cli.source).await?;
            let inserted = db::seed(&pool).await?;
            println!("Seed data inserted ({inserted} rows).");
        }
        Commands::Import { json } => {
            let pool = connect(&cli.source).await?;
            let inserted = db::import_snapshot(&pool, &json).await?;
            println!("Inserted {inserted} records from {}.", json.display());
        }
        Commands::Metrics {
            scope,
            since_days,
            json,
        } => {
            let dataset = load_dataset(&cli.source).await?;
            let query = metrics_query(&scope, since_days);
            let counselors = metrics::aggregate(&dataset, &query);
            let summary = metrics::summarize(&counselors);

            if json {
                let body = serde_json::json!({
                    "counselors": counselors,
                    "summary": summary,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
                return Ok(());
            }

            if counselors.is_empty() {
                println!("No counselors matched this filter.");
                return Ok(());
            }

            println!("Counselors by conversion rate (last {since_days} days):");
            for counselor in metrics::leaderboard(&counselors) {
                let response = counselor
                    .avg_response_time
                    .map(|hours| format!("{hours:.1}h"))
                    .unwrap_or_else(|| "no data".to_string());
                println!(
                    "- {} ({}) conversion {}%, applications {} ({}% successful), tasks {}%, response {}",
                    counselor.counselor_name,
                    counselor.counselor_id,
                    counselor.conversion_rate,
                    counselor.applications_managed,
                    counselor.application_success_rate,
                    counselor.task_completion_rate,
                    response
                );
            }
            if let Some(top) = summary.top_performer {
                println!("Top performer: {top}");
            }
            if let Some(fastest) = summary.fastest_responder {
                println!("Fastest responder: {fastest}");
            }
        }
        Commands::Monthly {
            year,
            scope,
            format,
            out_dir,
        } => {
            let dataset = load_dataset(&cli.source).await?;
            let applications = filters::scoped_applications(&dataset, &report_query(&scope));
            let monthly = tabulate::tabulate(applications, year);
            let path = export::export(&monthly, format, &out_dir)?;
            println!("Monthly report written to {}.", path.display());
        }
        Commands::Report {
            year,
            scope,
            since_days,
            out,
        } => {
            let dataset = load_dataset(&cli.source).await?;
            let query = metrics_query(&scope, since_days);
            let counselors = metrics::aggregate(&dataset, &query);
            let applications = filters::scoped_applications(&dataset, &report_query(&scope));
            let monthly = tabulate::tabulate(applications, year);
            let report = report::build_report(&query, &counselors, &monthly);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Match { student, kind, top } => {
            let dataset = load_dataset(&cli.source).await?;
            let profile = dataset
                .student(&student)
                .with_context(|| format!("student {student} not found"))?;
            let results = match kind {
                MatchKind::Courses => matcher::rank(&dataset.courses, profile, top),
                MatchKind::Scholarships => matcher::rank(&dataset.scholarships, profile, top),
            };

            if results.is_empty() {
                println!("Nothing to match against.");
                return Ok(());
            }

            for result in results {
                println!("- {} ({}) score {}", result.name, result.id, result.score);
            }
        }
    }

    Ok(())
}
