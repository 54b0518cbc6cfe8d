//! # Email Intel CLI (`eint`)
//!
//! ## Usage
//!
//! ```bash
//! eint --config ./config/eint.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `eint init` | Create the SQLite profile store |
//! | `eint validate <email>` | Format check and domain reputation |
//! | `eint collect <email> [--force]` | Collect, merge and store a profile |
//! | `eint show <email>` | Print the stored profile |
//! | `eint academic <email>` | Academic search and extraction |
//! | `eint pdf <email>` | PDF documents mentioning the address |
//! | `eint pdf-file <path> --email <email>` | Analyze a local PDF |
//! | `eint twin <email>` | Digital twin from academic analysis |
//! | `eint search <email>` | Ranked search hits with statistics |
//!
//! Results are printed as pretty JSON on stdout; logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use email_intel::config::{self, Config};
use email_intel::pdf::summarize_pdfs;
use email_intel::store::SqliteProfileStore;
use email_intel::validate::parse_email;
use email_intel::Pipeline;

/// Email Intel: multi-source aggregation and scoring for an email address.
#[derive(Parser)]
#[command(name = "eint", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Built-in defaults are used when the file does not exist.
    #[arg(long, global = true, default_value = "./config/eint.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the profile database. Safe to run repeatedly.
    Init,

    /// Validate an address and report its domain reputation. No network.
    Validate { email: String },

    /// Collect, merge and store the profile for an address.
    Collect {
        email: String,

        /// Ignore the stored profile and rebuild from scratch.
        #[arg(long)]
        force: bool,
    },

    /// Print the stored profile.
    Show { email: String },

    /// Academic search, extraction and confidence scores.
    Academic { email: String },

    /// Find and analyze PDF documents mentioning the address.
    Pdf { email: String },

    /// Analyze a local PDF for an address.
    PdfFile {
        path: PathBuf,

        #[arg(long)]
        email: String,
    },

    /// Synthesize a digital twin from academic analysis.
    Twin { email: String },

    /// Ranked search hits and collection statistics.
    Search { email: String },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,email_intel=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::minimal())
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn pipeline(cfg: &Config) -> anyhow::Result<Pipeline> {
    let store = SqliteProfileStore::open(&cfg.db.path).await?;
    Pipeline::builder(cfg.clone()).store(Arc::new(store)).build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    // Needs neither config nor store.
    if let Commands::Validate { email } = &cli.command {
        let report = match parse_email(email) {
            Ok(address) => serde_json::json!({ "valid": true, "info": address.info() }),
            Err(e) => serde_json::json!({ "valid": false, "error": e.to_string() }),
        };
        return print_json(&report);
    }

    let cfg = load(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = SqliteProfileStore::open(&cfg.db.path).await?;
            store.close().await;
            println!("Profile store initialized at {}", cfg.db.path.display());
        }
        Commands::Validate { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
        Commands::Collect { email, force } => {
            let profile = pipeline(&cfg).await?.collect_profile(&email, force).await?;
            print_json(&profile)?;
        }
        Commands::Show { email } => {
            let profile = pipeline(&cfg)
                .await?
                .profile(&email)
                .await?
                .with_context(|| format!("No stored profile for {email}; run `eint collect` first"))?;
            print_json(&serde_json::json!({
                "summary": profile.summary(),
                "profile": profile,
            }))?;
        }
        Commands::Academic { email } => {
            let facts = pipeline(&cfg).await?.analyze_academic(&email).await?;
            print_json(&facts)?;
        }
        Commands::Pdf { email } => {
            let documents = pipeline(&cfg).await?.analyze_pdf(&email).await?;
            let summary = summarize_pdfs(&documents, cfg.pdf.max_authors, cfg.pdf.max_institutions);
            print_json(&serde_json::json!({
                "documents": documents,
                "summary": summary,
            }))?;
        }
        Commands::PdfFile { path, email } => {
            let document = pipeline(&cfg)
                .await?
                .analyze_pdf_file(&path, &email)
                .await?;
            print_json(&document)?;
        }
        Commands::Twin { email } => {
            let twin = pipeline(&cfg).await?.digital_twin(&email).await?;
            print_json(&serde_json::json!({
                "summary": twin.summary(),
                "twin": twin,
            }))?;
        }
        Commands::Search { email } => {
            let run = pipeline(&cfg).await?.search(&email).await?;
            print_json(&run)?;
        }
    }

    Ok(())
}
