// Transaction Feed CLI
//
// Reads a feed (header line first) from --file or stdin, ingests it into the
// configured account and prints the run report to stdout.
//
//   RUST_LOG=debug transaction-feed --file feed.txt --account-number 123456

use anyhow::{Context, Result};
use log::{error, info};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::process;

use transaction_feed::{
    write_report, Config, IngestionPipeline, LogNotifier, NotifierSet, OutboxNotifier,
    SqliteStore,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse_args();

    if let Err(e) = run(&config) {
        error!("Ingestion for account {} failed: {:#}", config.account_number, e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(config: &Config) -> Result<()> {
    let store = SqliteStore::open(&config.db)?;

    let mut notifier = NotifierSet::new().with(LogNotifier::new(config.account_number.clone()));
    if let Some(outbox) = &config.outbox {
        notifier = notifier.with(OutboxNotifier::new(outbox.clone(), config.account_number.clone()));
    }

    let reader: Box<dyn BufRead> = match &config.file {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open feed {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut lines = reader.lines();

    // Header line carries no records
    if let Some(header) = lines.next() {
        let header = header.context("Failed to read feed header")?;
        info!("Skipping feed header {:?}", header);
    }

    let pipeline = IngestionPipeline::new(&store, &store, &notifier)
        .with_retry(config.retry_policy())
        .with_cancel_token(config.cancel_token());

    let stats = pipeline.run(&config.account_number, lines)?;

    info!(
        "Database now holds {} transactions",
        store.count_transactions()?
    );

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_report(&stats, &mut handle).context("Failed to write report")?;

    Ok(())
}
