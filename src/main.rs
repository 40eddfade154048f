//! # resume-search CLI
//!
//! Indexes resume records into Azure AI Search and queries them.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `resume-search init-index` | Create or update the search index schema |
//! | `resume-search fetch` | Copy resume records from MongoDB into the staging directory |
//! | `resume-search index` | Embed staged records and upload them |
//! | `resume-search project <file>` | Show the searchable fields of one staged record |
//! | `resume-search search "<query>"` | Search indexed resumes |
//! | `resume-search serve` | Start the HTTP API |
//! | `resume-search completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! resume-search --config ./config/resume-search.toml init-index
//! resume-search fetch
//! resume-search index --progress human
//! resume-search index --only 64f1c0ffee0000000000abcd
//! resume-search search "ICU nurse with pediatric experience" --mode hybrid --top 10
//! ```

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use resume_search::config;
use resume_search::ingest::{self, IndexArgs};
use resume_search::models::SearchMode;
use resume_search::progress::ProgressMode;
use resume_search::projector::project;
use resume_search::search;
use resume_search::server;
use resume_search::source::read_one;

/// Index resumes into a vector search service and query them.
#[derive(Parser)]
#[command(name = "resume-search", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/resume-search.toml")]
    config: PathBuf,

    /// More log output (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the search index definition.
    InitIndex,

    /// Query the resume database and write each record to the staging
    /// directory as `<id>.json`.
    ///
    /// Staged files whose record is no longer returned are removed.
    Fetch,

    /// Embed staged records and upload them to the search index.
    ///
    /// Exits non-zero when any record failed; the report lists the failed
    /// ids for a rerun with `--only`.
    Index {
        /// Project records and report counts without calling any service.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of records to process.
        #[arg(long)]
        limit: Option<usize>,

        /// Only process these record ids.
        #[arg(long, num_args = 1..)]
        only: Vec<String>,

        /// Progress output on stderr: `off`, `human`, or `json`.
        /// Defaults to `human` when stderr is a terminal.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Print the searchable fields of one staged record as JSON.
    Project {
        /// Path to a staged `<id>.json` file.
        file: PathBuf,
    },

    /// Search indexed resumes.
    Search {
        query: String,

        /// `vector` or `hybrid` (default from `[search].default_mode`).
        #[arg(long)]
        mode: Option<String>,

        /// Number of results (default from `[search].default_top`).
        #[arg(long)]
        top: Option<usize>,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't need a config file
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "resume-search", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Project { file } => {
            let record = read_one(file)?;
            let projected = project(&record.resume());
            println!("{}", serde_json::to_string_pretty(&projected)?);
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::InitIndex => {
            ingest::run_init_index(&cfg).await?;
        }
        Commands::Fetch => {
            ingest::run_fetch(&cfg).await?;
        }
        Commands::Index {
            dry_run,
            limit,
            only,
            progress,
        } => {
            let progress = match progress {
                Some(p) => Some(p.parse::<ProgressMode>().map_err(anyhow::Error::msg)?),
                None => None,
            };
            let args = IndexArgs {
                dry_run,
                limit,
                only,
                progress,
            };
            let report = ingest::run_index(&cfg, &args).await?;
            if !report.is_success() {
                bail!("{} record(s) failed to index", report.failures.len());
            }
        }
        Commands::Search { query, mode, top } => {
            let mode = mode.map(|m| m.parse::<SearchMode>()).transpose()?;
            search::run_search(&cfg, &query, mode, top).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } | Commands::Project { .. } => {}
    }

    Ok(())
}
