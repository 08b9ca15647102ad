//! # Newswire CLI (`newswire`)
//!
//! ## Usage
//!
//! ```bash
//! newswire --config ./config/newswire.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `newswire init` | Create the SQLite database and run schema migrations |
//! | `newswire sources` | List provider adapters and whether they have credentials |
//! | `newswire fetch <source\|all>` | Run ingestion once |
//! | `newswire schedule` | Run ingestion periodically until interrupted |
//! | `newswire serve [--schedule]` | Start the HTTP API, optionally with the scheduler |
//! | `newswire articles` | List stored articles with filters |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use newswire::app::{self, App, ArticleFilters};
use newswire::{config, migrate, sources, telemetry};

/// Newswire: fetch, normalize and store news from several providers.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/newswire.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "newswire",
    about = "Newswire: a news aggregation ingestion pipeline",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/newswire.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// List provider adapters and their credential status.
    Sources,

    /// Run one ingestion for a source.
    Fetch {
        /// `newsapi`, `opennws`, `newscred`, or `all`.
        source: String,
    },

    /// Run ingestion for every scheduled source on a fixed interval.
    ///
    /// Interval and sources come from `[scheduler]`. Stops on Ctrl-C after
    /// in-flight runs complete.
    Schedule,

    /// Start the read-only HTTP API.
    Serve {
        /// Also run the scheduler in this process.
        #[arg(long)]
        schedule: bool,
    },

    /// List stored articles, newest first.
    Articles {
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        author: Option<String>,
        /// Publication day (YYYY-MM-DD, UTC).
        #[arg(long)]
        published_at: Option<String>,
        /// Case-insensitive substring of the title.
        #[arg(long)]
        title: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Print the page as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    telemetry::init_tracing(&cfg.logging);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            let app = App::open(cfg).await?;
            sources::list_sources(&app.registry);
        }
        Commands::Fetch { source } => {
            let app = App::open(cfg).await?;
            app::run_fetch(&app, &source).await?;
        }
        Commands::Schedule => {
            let app = App::open(cfg).await?;
            app::run_schedule(&app).await?;
        }
        Commands::Serve { schedule } => {
            let app = App::open(cfg).await?;
            app::run_serve(&app, schedule).await?;
        }
        Commands::Articles {
            source,
            category,
            author,
            published_at,
            title,
            page,
            json,
        } => {
            let app = App::open(cfg).await?;
            let filters = ArticleFilters {
                source,
                category,
                author,
                published_at,
                title,
                page,
            };
            app::run_articles(&app, filters, json).await?;
        }
    }

    Ok(())
}
