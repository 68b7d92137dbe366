//! # Doclens CLI (`doclens`)
//!
//! ## Usage
//!
//! ```bash
//! doclens --config ./config/doclens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `doclens init` | Create the SQLite database and run schema migrations |
//! | `doclens serve` | Start the HTTP API |
//! | `doclens analyze <paths>…` | Analyze local files as one batch |
//! | `doclens quiz <path>` | Generate a quiz from a text file |
//!
//! Log verbosity follows `RUST_LOG`, defaulting to `doclens=info`.

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doclens::analyze::{Analyzer, RequestContext};
use doclens::config::{self, Config};
use doclens::engine::HttpEngineClient;
use doclens::source::{FileContent, UploadedFile};
use doclens::sqlite_store::SqliteStore;
use doclens::{db, migrate, quiz, server};
use doclens_core::models::Scope;

/// Doclens: batch document analysis with content deduplication.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(name = "doclens", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/doclens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Analyze local files as one request and print the results as JSON.
    ///
    /// Files previously analyzed by the same owner in the same collection
    /// are served from the database without calling the engine.
    Analyze {
        /// Files to analyze.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Owner id the documents are recorded under.
        #[arg(long)]
        owner: String,

        /// Collection to scope deduplication to.
        #[arg(long)]
        collection: Option<i64>,
    },

    /// Generate a quiz from the contents of a text file.
    Quiz {
        /// UTF-8 text file.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doclens=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Analyze {
            paths,
            owner,
            collection,
        } => {
            run_analyze(&cfg, paths, owner, collection).await?;
        }
        Commands::Quiz { path } => {
            let text = tokio::fs::read_to_string(&path).await?;
            let engine = HttpEngineClient::new(&cfg.engine)?;
            let cid = uuid::Uuid::new_v4().to_string();
            let quiz = quiz::generate_quiz(
                &engine,
                &text,
                cfg.limits.quiz_max_chars,
                &cid,
                &CancellationToken::new(),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&quiz)?);
        }
    }

    Ok(())
}

async fn run_analyze(
    cfg: &Config,
    paths: Vec<PathBuf>,
    owner: String,
    collection: Option<i64>,
) -> anyhow::Result<()> {
    if paths.len() > cfg.limits.max_files {
        bail!("at most {} files per request", cfg.limits.max_files);
    }

    let pool = db::connect(cfg).await?;
    migrate::apply(&pool).await?;
    let engine = Arc::new(HttpEngineClient::new(&cfg.engine)?);
    let analyzer = Analyzer::new(
        Arc::new(SqliteStore::new(pool)),
        engine,
        cfg.limits.allow_list(),
    );

    let files = paths
        .iter()
        .map(|path| {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            UploadedFile::new(file_name, FileContent::new(path))
        })
        .collect();

    let ctx = RequestContext {
        correlation_id: uuid::Uuid::new_v4().to_string(),
        owner,
        scope: Scope::from_collection(collection),
    };

    // Ctrl-C cancels in-flight reads and engine calls.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let outcome = analyzer.analyze_files(&ctx, files, &cancel).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "results": outcome.results,
            "correlationId": ctx.correlation_id,
        }))?
    );

    if outcome.degraded {
        bail!("analysis service unavailable");
    }
    Ok(())
}
