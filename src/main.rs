use std::{fs::File, path::PathBuf, sync::Arc};

use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tea_ledger::{
    config::{self, AppConfig},
    core::{billing, report},
    errors::Result,
    models::NewConsumption,
    store::repository::Repository,
    summary::SummaryStats,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tea-ledger")]
#[command(about = "Office tea and snack billing")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print company and employee bills for a date range
    Bill {
        /// First day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// Last day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
        /// Also write both ledgers to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Print the gap-fill tally for one day
    Tally {
        /// Day to tally, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Print a short written summary of a date range
    Summary {
        /// First day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// Last day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
    },
    /// Record a consumption now
    Record {
        /// Employee id
        #[arg(long)]
        employee: String,
        /// Item id
        #[arg(long)]
        item: String,
        /// Units consumed
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },
    /// Move snack units of one item onto the company for a day
    Adjust {
        /// Day of the adjustment (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Employee id
        #[arg(long)]
        employee: String,
        /// Item id
        #[arg(long)]
        item: String,
        /// Units to move; 0 clears the adjustment
        #[arg(long)]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Non-fatal, env vars can be set externally
    dotenv().ok();

    let args = Args::parse();
    let app_config = config::load_app_configuration()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;
    let backend = app_config.build_backend().await?;
    let repository = Repository::load(Arc::clone(&backend), app_config.tally_calculator()).await;

    match args.command {
        Commands::Bill { from, to, csv } => bill(&repository, from, to, csv),
        Commands::Tally { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            print!("{}", report::format_tally(date, &repository.tally(date)));
            Ok(())
        }
        Commands::Summary { from, to } => summarize(&repository, &app_config, from, to).await,
        Commands::Record {
            employee,
            item,
            quantity,
        } => {
            let record = repository.add_consumption(NewConsumption {
                employee_id: employee,
                item_id: item,
                quantity,
                timestamp: Utc::now(),
            })?;
            repository.flush().await;
            println!(
                "Recorded {} x {} for {} ({})",
                record.quantity,
                record.item_name,
                record.employee_id,
                report::format_money(record.line_total())
            );
            Ok(())
        }
        Commands::Adjust {
            date,
            employee,
            item,
            count,
        } => {
            repository.set_adjustment(date, &employee, &item, count);
            repository.flush().await;
            println!("Adjustment for {employee} on {date}: {item} x {count}");
            Ok(())
        }
    }
}

fn bill(
    repository: &Repository,
    from: NaiveDate,
    to: NaiveDate,
    csv: Option<PathBuf>,
) -> Result<()> {
    let result = repository.bill(from, to);
    print!("{}", report::format_billing_summary(&result));

    if let Some(path) = csv {
        let file = File::create(&path)?;
        report::write_billing_csv(&result, file)?;
        info!("Wrote CSV to {}", path.display());
    }
    Ok(())
}

async fn summarize(
    repository: &Repository,
    app_config: &AppConfig,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<()> {
    let snapshot = repository.snapshot();
    let records = billing::records_in_range(&snapshot.consumption, from, to, &Local);
    let result = repository.bill(from, to);
    let stats = SummaryStats::from_billing(from, to, &records, &result, &snapshot.employees);

    let client = app_config.summary_client()?;
    println!("{}", client.summarize(&stats).await);
    Ok(())
}
