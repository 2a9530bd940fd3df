//! # Channel Harvester CLI (`harvest`)
//!
//! ## Usage
//!
//! ```bash
//! harvest --config ./config/harvest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest init` | Create the SQLite database and run schema migrations |
//! | `harvest run <channel>` | Harvest a channel's history into the configured sinks |
//! | `harvest get <object_id>` | Print a stored record |
//! | `harvest stats` | Record counts and recent runs |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use channel_harvester::ingest::RunFlags;
use channel_harvester::logging::{self, LogFormat};
use channel_harvester::progress::ProgressMode;
use channel_harvester::{config, get, ingest, migrate, stats};

/// Channel Harvester CLI: harvest channel history into a store and an
/// embedding service.
#[derive(Parser)]
#[command(
    name = "harvest",
    about = "Channel Harvester: batch a Slack channel's history into a datastore and an embedding service",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/harvest.toml")]
    config: PathBuf,

    /// Progress on stderr. Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    /// Log output format on stderr. Verbosity follows `RUST_LOG`.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file with the `records` and `runs`
    /// tables. Running it again is safe.
    Init,

    /// Harvest a channel.
    ///
    /// Walks the channel history (first page plus `harvest.max_extra_pages`),
    /// resolves threads, and dispatches batches of at most 25 records to the
    /// store and the embedding sink. Failures are reported, never fatal.
    Run {
        /// Channel id (e.g. `C0123456789`).
        channel: String,

        /// Fetch and batch without writing or embedding anything.
        #[arg(long)]
        dry_run: bool,

        /// Skip the persistence sink.
        #[arg(long)]
        no_store: bool,

        /// Skip the embedding sink.
        #[arg(long)]
        no_embed: bool,
    },

    /// Print a stored record by object id.
    Get {
        object_id: String,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show record counts and recent runs.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_format);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Run {
            channel,
            dry_run,
            no_store,
            no_embed,
        } => {
            let flags = RunFlags {
                dry_run,
                no_store,
                no_embed,
            };
            let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_harvest(&cfg, &channel, flags, progress).await?;
        }
        Commands::Get { object_id, json } => {
            get::run_get(&cfg, &object_id, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
