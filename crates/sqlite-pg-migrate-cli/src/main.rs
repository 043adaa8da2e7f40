//! sqlite-pg-migrate CLI - batch migration of the movie catalogue from SQLite
//! to PostgreSQL.
//!
//! Every migration setting comes from the environment (or `./.env`); the
//! flags below only control presentation.

use std::process::ExitCode;

use clap::Parser;
use sqlite_pg_migrate::error::EXIT_VERIFY_ERROR;
use sqlite_pg_migrate::{Config, MigrateError, MigrationResult, Orchestrator};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "sqlite-pg-migrate")]
#[command(about = "Batch migration of the movie catalogue from SQLite to PostgreSQL")]
#[command(
    long_about = "Batch migration of the movie catalogue from SQLite to PostgreSQL.\n\n\
    Reads SQLITE_DB_PATH, POSTGRES_HOST, POSTGRES_PORT, POSTGRES_DBNAME, POSTGRES_USER, \
    POSTGRES_PASSWORD, POSTGRES_SCHEMA and BATCH_SIZE from the environment, falling back \
    to a .env file in the working directory."
)]
#[command(version)]
struct Cli {
    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Skip the post-migration consistency check
    #[arg(long)]
    skip_verify: bool,

    /// Log format: text or json
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    verbosity: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: source {}, batch size {}",
        config.source.path.display(),
        config.migration.batch_size
    );

    let orchestrator = Orchestrator::new(config).await?;
    let outcome = migrate(&orchestrator, cli.skip_verify).await;
    orchestrator.close().await;
    let result = outcome?;

    if cli.output_json {
        println!("{}", result.to_json()?);
    } else {
        print_summary(&result);
    }

    let verified = result
        .verification
        .as_ref()
        .map_or(true, |v| v.is_consistent());
    if verified {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_VERIFY_ERROR))
    }
}

async fn migrate(
    orchestrator: &Orchestrator,
    skip_verify: bool,
) -> Result<MigrationResult, MigrateError> {
    let mut result = orchestrator.run().await?;
    if !skip_verify {
        result.verification = Some(orchestrator.verify().await?);
    }
    Ok(result)
}

fn print_summary(result: &MigrationResult) {
    let status_msg = if result.pages_failed > 0 {
        "Migration completed with errors!"
    } else {
        "Migration completed!"
    };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!("  Tables: {}", result.tables_total);
    println!("  Rows read: {}", result.rows_read);
    println!("  Rows inserted: {}", result.rows_inserted);
    if result.pages_failed > 0 {
        println!("  Failed pages: {}", result.pages_failed);
    }
    for table in &result.tables {
        println!(
            "    {:<18} {:>8} read {:>8} inserted {:>4} failed pages",
            table.table, table.rows_read, table.rows_inserted, table.pages_failed
        );
    }

    if let Some(ref verification) = result.verification {
        println!(
            "  Verification: {}/{} tables consistent",
            verification.tables_consistent, verification.tables_checked
        );
        for failure in &verification.failures {
            println!("    {}", failure.message);
        }
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
