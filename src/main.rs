use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

mod client;
mod config;
mod error;
mod logging;
mod metrics;
mod models;
mod pipeline;
mod report;
mod windows;

use crate::config::RunConfig;
use crate::error::ReportError;
use crate::models::SiteFailure;

#[derive(Parser)]
#[command(name = "analytics-digest")]
#[command(about = "Weekly and monthly analytics digest for configured properties", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch metrics for every site and write the spreadsheet
    Run {
        #[arg(long, default_value = crate::config::DEFAULT_CONFIG)]
        config: PathBuf,
        /// Overrides the output path from the config file
        #[arg(long)]
        out: Option<PathBuf>,
        /// Reference date used instead of today (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Print the week and month windows a run would query
    Windows {
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Validate the config file and list its sites
    Check {
        #[arg(long, default_value = crate::config::DEFAULT_CONFIG)]
        config: PathBuf,
    },
}

fn print_failures(failures: &[SiteFailure]) {
    for failure in failures {
        match failure.window {
            Some(window) => println!("- skipped {} ({window}): {}", failure.site, failure.error),
            None => println!("- skipped {}: {}", failure.site, failure.error),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, out, today } => {
            let mut run_config = RunConfig::from_path(&config)?;
            if let Some(out) = out {
                run_config.output = out;
            }
            logging::init(&run_config.log_file)?;
            let log_file = run_config.log_file.clone();

            let source = client::GoogleAnalyticsClient::new();
            let today = today.unwrap_or_else(windows::today);
            match pipeline::run(run_config, &source, today).await {
                Ok(outcome) => {
                    println!(
                        "Report written to {} ({} sites, {} skipped).",
                        outcome.output.display(),
                        outcome.records.len(),
                        outcome.failures.len()
                    );
                    print_failures(&outcome.failures);
                }
                Err(e) => match e.downcast_ref::<ReportError>() {
                    Some(ReportError::NoValidResults(failures)) => {
                        println!("No site returned data; report not written.");
                        print_failures(failures);
                        println!("See {} for details.", log_file.display());
                    }
                    _ => return Err(e),
                },
            }
        }
        Commands::Windows { today } => {
            let (week, month) = windows::report_windows(today.unwrap_or_else(windows::today));
            println!("Previous week: {} to {}", week.start_date, week.end_date);
            println!("Last month:    {} to {}", month.start_date, month.end_date);
        }
        Commands::Check { config } => {
            let run_config = RunConfig::from_path(&config)?;
            if run_config.sites.is_empty() {
                println!("No sites configured in {}.", config.display());
                return Ok(());
            }

            println!("Configured sites:");
            for site in &run_config.sites {
                let key_state = if site.key_file.exists() {
                    "key found"
                } else {
                    "key missing"
                };
                println!(
                    "- {} (property {}, {}: {})",
                    site.name,
                    site.property_id,
                    site.key_file.display(),
                    key_state
                );
            }
            println!("Report path: {}", run_config.output.display());
        }
    }

    Ok(())
}
