//! # course-rag CLI (`crag`)
//!
//! ## Usage
//!
//! ```bash
//! crag --config ./config/crag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `crag init` | Create the SQLite database and schema |
//! | `crag ingest` | Load course documents from a folder |
//! | `crag ask "<question>"` | Answer one question with the course tools |
//! | `crag search "<query>"` | Run the content search tool directly |
//! | `crag courses` | Show the indexed course catalog |
//! | `crag serve` | Start the HTTP server |
//!
//! Diagnostics go to stderr through `tracing` (filter with `RUST_LOG`);
//! command output goes to stdout.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use course_rag::{config, ingest, migrate, rag, search, server, stats};

/// course-rag: question answering over course materials.
#[derive(Parser)]
#[command(
    name = "crag",
    about = "Question answering over course materials with a tool-calling LLM",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/crag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it more than once is safe.
    Init,

    /// Ingest course documents.
    ///
    /// Courses whose title is already indexed are skipped; files that fail
    /// to parse are reported and skipped.
    Ingest {
        /// Folder to load (defaults to `[documents].root`).
        #[arg(long)]
        folder: Option<PathBuf>,

        /// Drop the existing index before loading.
        #[arg(long)]
        clear: bool,
    },

    /// Ask one question.
    Ask {
        question: String,

        /// Session id to attach the exchange to.
        #[arg(long)]
        session: Option<String>,
    },

    /// Search course content.
    Search {
        query: String,

        /// Course name (fuzzy; resolved against the catalog).
        #[arg(long)]
        course: Option<String>,

        /// Lesson number filter.
        #[arg(long)]
        lesson: Option<u32>,
    },

    /// List indexed courses.
    Courses,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { folder, clear } => {
            ingest::run_ingest(&cfg, folder, clear).await?;
        }
        Commands::Ask { question, session } => {
            rag::run_ask(&cfg, &question, session).await?;
        }
        Commands::Search {
            query,
            course,
            lesson,
        } => {
            search::run_search(&cfg, &query, course.as_deref(), lesson).await?;
        }
        Commands::Courses => {
            stats::run_courses(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
