//! # docqa CLI
//!
//! The `docqa` binary talks to a document question-answering service:
//! upload documents, ingest web pages, and ask questions with streamed
//! answers.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa ask "<question>"` | Ask one question and stream the answer |
//! | `docqa chat` | Interactive question loop |
//! | `docqa files` | List uploaded documents and ingested web pages |
//! | `docqa delete <name>` | Delete one document |
//! | `docqa clear` | Delete every document |
//! | `docqa upload <path>...` | Upload documents |
//! | `docqa ingest <url>` | Ingest a web page |
//! | `docqa new-session` | Start a fresh conversation on the service |

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use docqa_client::{ask, config, files, ingest, logging};

/// docqa: ask questions about your documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without one, a service on `http://127.0.0.1:8000` is assumed.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Ask questions about your documents and watch the answers stream in",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question.
    ///
    /// Loads the document list first; without documents or web sources the
    /// question is refused unless entertainment mode is on.
    Ask {
        question: String,

        /// Entertainment mode: answer without requiring documents.
        #[arg(long)]
        entertainment: bool,
    },

    /// Interactive chat. `/new` starts a new session, `/files` lists
    /// documents, `/quit` exits.
    Chat {
        #[arg(long)]
        entertainment: bool,
    },

    /// List uploaded documents and ingested web pages.
    Files,

    /// Delete one document by name.
    Delete { name: String },

    /// Delete every document.
    Clear,

    /// Upload documents (at most 3 in total).
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Scrape and index a web page.
    Ingest { url: String },

    /// Drop the service-side conversation context.
    NewSession,
}

fn load(path: &std::path::Path) -> anyhow::Result<config::Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(config::Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = load(&cli.config)?;
    logging::init_tracing(cli.verbose, &cfg.log.filter);

    match cli.command {
        Commands::Ask {
            question,
            entertainment,
        } => {
            ask::run_ask(&cfg, &question, entertainment || cfg.chat.entertainment).await?;
        }
        Commands::Chat { entertainment } => {
            ask::run_chat(&cfg, entertainment || cfg.chat.entertainment).await?;
        }
        Commands::Files => {
            files::run_files(&cfg).await?;
        }
        Commands::Delete { name } => {
            files::run_delete(&cfg, &name).await?;
        }
        Commands::Clear => {
            files::run_clear(&cfg).await?;
        }
        Commands::Upload { paths } => {
            files::run_upload(&cfg, &paths).await?;
        }
        Commands::Ingest { url } => {
            ingest::run_ingest(&cfg, &url).await?;
        }
        Commands::NewSession => {
            files::run_new_session(&cfg).await?;
        }
    }

    Ok(())
}
