//! Repofolio CLI - builds and refreshes a GitHub portfolio snapshot.

mod commands;
mod config;
mod progress;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::pipeline::Mode;

#[derive(Parser)]
#[command(name = "repofolio")]
#[command(version)]
#[command(about = "Aggregate a GitHub account into a portfolio snapshot")]
#[command(
    long_about = "Repofolio lists a GitHub user's repositories, enriches them with topics, \
README, languages and a screenshot, and writes the result as a JSON snapshot for a static \
site. Later runs check the snapshot for staleness and refresh only what changed."
)]
#[command(after_long_help = r#"EXAMPLES
    Build the snapshot from scratch:
        $ repofolio full --username octocat

    See which repositories changed since the last snapshot:
        $ repofolio check

    Refresh only the changed repositories:
        $ repofolio update

    Refresh specific repositories:
        $ repofolio update hello-world spoon-knife

    Print one README without touching the snapshot:
        $ repofolio readme hello-world --read-only

    Generate shell completions:
        $ repofolio completions bash > ~/.local/share/bash-completion/completions/repofolio

CONFIGURATION
    Repofolio reads configuration from:
      1. ~/.config/repofolio/config.toml (or $XDG_CONFIG_HOME/repofolio/config.toml)
      2. ./repofolio.toml
      3. Environment variables (REPOFOLIO_* prefix, e.g., REPOFOLIO_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    REPOFOLIO_USERNAME         GitHub account to aggregate (legacy: GITHUB_USERNAME)
    REPOFOLIO_TOKEN            GitHub personal access token (legacy: GITHUB_TOKEN)
    REPOFOLIO_EXCLUDE_TOPICS   Comma-separated topics to hide (legacy: EXCLUDE_TOPICS)
    REPOFOLIO_SNAPSHOT_PATH    Snapshot file (default: public/data/repos.json)
    REPOFOLIO_READ_ONLY        Never write the snapshot or images
"#)]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every pipeline command.
#[derive(Debug, Clone, clap::Args)]
struct GlobalOptions {
    /// GitHub account to aggregate (overrides config)
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Comma-separated topics whose repositories are hidden (overrides config)
    #[arg(short = 'x', long, global = true)]
    exclude_topics: Option<String>,

    /// Snapshot file path (overrides config)
    #[arg(short, long, global = true)]
    snapshot: Option<PathBuf>,

    /// Directory for mirrored screenshots (overrides config)
    #[arg(long, global = true)]
    images_dir: Option<PathBuf>,

    /// Never write the snapshot or screenshots
    #[arg(short = 'r', long, global = true)]
    read_only: bool,

    /// Keep remote screenshot URLs instead of downloading them
    #[arg(long, global = true)]
    no_mirror: bool,
}

impl GlobalOptions {
    fn overrides(&self) -> config::Overrides {
        config::Overrides {
            username: self.username.clone(),
            exclude_topics: self.exclude_topics.clone(),
            snapshot_path: self.snapshot.clone(),
            images_dir: self.images_dir.clone(),
            read_only: self.read_only,
            no_mirror: self.no_mirror,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, enrich and filter every repository, then replace the snapshot
    Full,
    /// Compare a fresh listing against the snapshot
    Check,
    /// Re-fetch repositories and patch them into the snapshot
    ///
    /// With no names, updates the repositories that `check` reports as changed.
    Update {
        /// Repository names
        names: Vec<String>,
    },
    /// Print the README of one repository
    Readme {
        /// Repository name
        name: String,
    },
    /// Drop cached API responses
    Clear,
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

impl Commands {
    fn into_mode(self) -> Option<Mode> {
        match self {
            Self::Full => Some(Mode::Full),
            Self::Check => Some(Mode::Check),
            Self::Update { names } => Some(Mode::Update(names)),
            Self::Readme { name } => Some(Mode::Readme(name)),
            Self::Clear => Some(Mode::Clear),
            Self::Completions { .. } => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Structured logging only when not attached to a TTY; bars otherwise
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("repofolio=info,repofolio_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        commands::meta::handle_completions(*shell)?;
        return Ok(());
    }

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();
    let pipeline_config = config.to_pipeline_config(&cli.options.overrides());

    if let Some(mode) = cli.command.into_mode() {
        commands::pipeline::handle_mode(mode, pipeline_config).await?;
    }

    Ok(())
}
