//! # Golf Coach CLI (`coach`)
//!
//! ## Usage
//!
//! ```bash
//! coach --config ./config/coach.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `coach serve` | Start the HTTP server (chat endpoint + access gate) |
//! | `coach rank "<question>"` | Show which library entries a question retrieves |
//! | `coach ask "<question>"` | Run the full pipeline once and print the answer |
//!
//! Log verbosity follows `RUST_LOG` (default `info`). Logs go to stderr so
//! command output on stdout stays clean.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use golf_coach::chat::ChatService;
use golf_coach::config;
use golf_coach::search::rank_entries;
use golf_coach::server;

/// Golf Coach — grounded answers from a curated golf library.
#[derive(Parser)]
#[command(
    name = "coach",
    about = "Golf Coach — grounded answers from a curated golf library",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/coach.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind`, serves the chat endpoint at
    /// `[server].chat_path`, and gates `[auth].protected_prefix`.
    Serve,

    /// Rank the library against a question without calling the model.
    Rank { question: String },

    /// Answer one question through the full pipeline.
    Ask { question: String },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Rank { question } => {
            let chat = ChatService::from_config(Arc::new(cfg));
            let library = chat.load_library().await?;
            let ranked = rank_entries(&question, &library, &chat.config().retrieval);
            if ranked.is_empty() {
                println!("No results.");
            }
            for s in &ranked {
                println!("{:>3}  {}  {}", s.score, s.entry.id, s.entry.title);
            }
        }
        Commands::Ask { question } => {
            let question = question.trim();
            if question.is_empty() {
                anyhow::bail!("Missing question");
            }
            let chat = ChatService::from_config(Arc::new(cfg));
            let response = chat.answer(question).await?;
            println!("{}", response.answer);
            if !response.citations.is_empty() {
                println!();
                println!("Citations: {}", response.citations.join(", "));
            }
        }
    }

    Ok(())
}
