use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use tripclean::clean::parse_datetime;
use tripclean::pipeline::{self, BatchOutcome};
use tripclean::stats::average_passenger_count;
use tripclean::store::{read_clean_csv, CsvDirSink, CsvDirSource};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Cleans monthly yellow taxi trip CSV extracts"
)]
struct Args {
    /// Year of the extracts to process
    #[arg(long)]
    year: i32,

    /// First month of the inclusive range (1-12)
    #[arg(long, default_value_t = 1)]
    start_month: u32,

    /// Last month of the inclusive range (1-12)
    #[arg(long, default_value_t = 12)]
    end_month: u32,

    /// Directory holding yellow_tripdata_{year}-{MM}.csv extracts
    #[arg(long, default_value = "./data/raw")]
    input: PathBuf,

    /// Directory to write clean_yellow_trip_data_{year}-{MM}.csv into
    #[arg(long, default_value = "./data/clean")]
    output: PathBuf,

    /// Report average passenger count from this datetime (YYYY-MM-DD HH:MM:SS)
    #[arg(long, requires = "avg_end")]
    avg_start: Option<String>,

    /// ...through this datetime, inclusive
    #[arg(long, requires = "avg_start")]
    avg_end: Option<String>,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let args = Args::parse();
    info!(
        year = args.year,
        start = args.start_month,
        end = args.end_month,
        "startup"
    );

    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating output directory {}", args.output.display()))?;

    let source = CsvDirSource::new(&args.input);
    let sink = CsvDirSink::new(&args.output);
    let report = pipeline::run(&source, &sink, args.year, args.start_month, args.end_month)?;

    for batch in &report.batches {
        match &batch.outcome {
            BatchOutcome::Written { rows_in, rows_out } => {
                info!(
                    year = batch.year,
                    month = batch.month,
                    rows_in,
                    rows_out,
                    "batch ok"
                );
            }
            BatchOutcome::Failed(err) => {
                error!(year = batch.year, month = batch.month, %err, "batch failed");
            }
        }
    }

    if let (Some(start), Some(end)) = (&args.avg_start, &args.avg_end) {
        report_average(&sink, &report.written_months(), args.year, start, end)?;
    }

    if !report.all_succeeded() {
        bail!(
            "{} of {} batches failed",
            report.failed(),
            report.batches.len()
        );
    }
    info!("all batches written");
    Ok(())
}

fn report_average(
    sink: &CsvDirSink,
    months: &[u32],
    year: i32,
    start: &str,
    end: &str,
) -> Result<()> {
    let start = parse_datetime(start)
        .with_context(|| format!("invalid --avg-start `{start}`, expected YYYY-MM-DD HH:MM:SS"))?;
    let end = parse_datetime(end)
        .with_context(|| format!("invalid --avg-end `{end}`, expected YYYY-MM-DD HH:MM:SS"))?;

    let mut tables = Vec::with_capacity(months.len());
    for &month in months {
        tables.push(read_clean_csv(sink, year, month)?);
    }

    match average_passenger_count(tables.iter(), start, end)? {
        Some(avg) => info!(%start, %end, average = avg, "average passenger count"),
        None => info!(%start, %end, "no trips in the requested period"),
    }
    Ok(())
}
