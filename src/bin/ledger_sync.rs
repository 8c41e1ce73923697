use std::{
    process::ExitCode,
    sync::{Arc, Mutex},
    time::Duration,
};

use clap::{Parser, Subcommand};
use rusqlite::Connection;
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ledger_sync::{
    CacheQueryFacade, Error, SQLiteTransactionCache, TransactionFilter, TransactionSide,
    TransactionStatus,
    bank::HttpBankClient,
    config::{BankConfig, SyncConfig},
    initialize_db,
    sync::{CursorStrategy, SyncCoordinator, SyncScheduler},
};

/// Mirror completed bank transactions into a local SQLite cache.
///
/// The bank credentials are read from the BANK_API_LOGIN and
/// BANK_API_SECRET_KEY environment variables.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the SQLite cache database.
    #[arg(long, env = "LEDGER_SYNC_DB_PATH")]
    db_path: String,

    /// The minimum number of minutes between two automatic syncs.
    #[arg(long, default_value_t = 60)]
    cooldown_minutes: u64,

    /// Drop the transaction on the watermark from incremental fetches instead
    /// of upserting it again.
    #[arg(long)]
    exclude_boundary: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync new transactions from the bank.
    Sync {
        /// Fetch the full history instead of only what is new.
        #[arg(long)]
        force: bool,
    },
    /// Sync only if the cooldown has passed since the last sync.
    Auto,
    /// List cached transactions, most recent first.
    List {
        /// Only transactions that occurred at or after this RFC 3339 date-time.
        #[arg(long, value_parser = parse_date_time)]
        from: Option<OffsetDateTime>,
        /// Only transactions that occurred at or before this RFC 3339 date-time.
        #[arg(long, value_parser = parse_date_time)]
        to: Option<OffsetDateTime>,
        /// Only transactions with this status, e.g. "completed".
        #[arg(long, value_parser = parse_status)]
        status: Option<TransactionStatus>,
        /// Only "credit" or "debit" transactions.
        #[arg(long, value_parser = parse_side)]
        side: Option<TransactionSide>,
        /// Only transactions in this currency, e.g. "EUR".
        #[arg(long)]
        currency: Option<String>,
        /// Only transactions of this bank account.
        #[arg(long)]
        bank_account_id: Option<String>,
        /// Only transactions whose label contains this text.
        #[arg(long)]
        label: Option<String>,
        /// Show at most this many transactions.
        #[arg(long)]
        limit: Option<u64>,
        /// Skip this many transactions.
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
    /// Show one cached transaction.
    Show {
        /// The bank's ID for the transaction.
        remote_id: String,
    },
    /// Sync, then show one transaction.
    Refresh {
        /// The bank's ID for the transaction.
        remote_id: String,
    },
    /// Summarise the cache.
    Stats,
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    let args = Args::parse();

    match run(args).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            if error.requires_reauthentication() {
                tracing::error!("{error}. Check BANK_API_LOGIN and BANK_API_SECRET_KEY.");
            } else {
                tracing::error!("{error}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<String, Error> {
    let sync_config = SyncConfig {
        cooldown: Duration::from_secs(args.cooldown_minutes * 60),
        cursor_strategy: if args.exclude_boundary {
            CursorStrategy::BoundaryId
        } else {
            CursorStrategy::Watermark
        },
    };
    let bank_config = BankConfig::from_env()?;
    tracing::debug!("Using {bank_config:?} and {sync_config:?}");

    let conn = Connection::open(&args.db_path)?;
    initialize_db(&conn)?;
    let cache = SQLiteTransactionCache::new(Arc::new(Mutex::new(conn)));
    let bank = HttpBankClient::new(&bank_config)?;

    let coordinator = Arc::new(
        SyncCoordinator::new(Arc::new(bank), Arc::new(cache))
            .with_cursor_strategy(sync_config.cursor_strategy),
    );
    let facade = CacheQueryFacade::new(coordinator.clone());

    match args.command {
        Command::Sync { force } => to_json(&coordinator.sync(force).await?),
        Command::Auto => {
            let scheduler = SyncScheduler::new(coordinator).with_cooldown(sync_config.cooldown);
            to_json(&scheduler.auto_sync().await?)
        }
        Command::List {
            from,
            to,
            status,
            side,
            currency,
            bank_account_id,
            label,
            limit,
            offset,
        } => {
            let filter = TransactionFilter {
                from,
                to,
                status,
                side,
                currency,
                bank_account_id,
                label_contains: label,
                limit,
                offset,
            };
            to_json(&facade.list_cached(&filter)?)
        }
        Command::Show { remote_id } => to_json(&facade.get_cached(&remote_id)?),
        Command::Refresh { remote_id } => to_json(&facade.refresh(&remote_id).await?),
        Command::Stats => to_json(&facade.stats()?),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, Error> {
    serde_json::to_string_pretty(value)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))
}

fn parse_date_time(text: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(text, &Rfc3339).map_err(|error| error.to_string())
}

fn parse_status(text: &str) -> Result<TransactionStatus, String> {
    TransactionStatus::parse(text).map_err(|error| error.to_string())
}

fn parse_side(text: &str) -> Result<TransactionSide, String> {
    TransactionSide::parse(text).map_err(|error| error.to_string())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
