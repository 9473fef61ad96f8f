//! Load the transaction CSV into the SQLite database.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use spend_insights::config::Config;
use spend_insights::db::import::import_csv;
use spend_insights::db::sqlite::connect;
use spend_insights::error::Result;

#[derive(Parser)]
#[command(name = "import", about = "Load the credit card transaction CSV into SQLite")]
struct Args {
    /// Path to credit_card_transaction.csv.
    path: PathBuf,

    /// Delete existing transactions before loading.
    #[arg(long, default_value_t = false)]
    replace: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(&cfg, args).await {
        error!("Import failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: &Config, args: Args) -> Result<()> {
    let started = Instant::now();
    let pool = connect(&cfg.db_path).await?;
    info!(db_path = %cfg.db_path, csv = %args.path.display(), replace = args.replace, "Import starting");

    let stats = import_csv(&pool, &args.path, args.replace).await?;
    info!(
        rows = stats.rows_read,
        skipped = stats.rows_skipped,
        users = stats.users,
        transactions = stats.transactions,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Import complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_path_and_replace_flag() {
        let a = Args::try_parse_from(["import", "data.csv", "--replace"]).unwrap();
        assert_eq!(a.path, PathBuf::from("data.csv"));
        assert!(a.replace);
        assert!(!Args::try_parse_from(["import", "data.csv"]).unwrap().replace);
    }

    #[test]
    fn rejects_missing_path_and_unknown_flags() {
        assert!(Args::try_parse_from(["import"]).is_err());
        assert!(Args::try_parse_from(["import", "--force", "data.csv"]).is_err());
        assert!(Args::try_parse_from(["import", "a.csv", "b.csv"]).is_err());
    }
}
