//! macro-kit command line.
//!
//! `macro-kit helper` runs the automation helper on stdin/stdout. Every
//! other subcommand is an orchestrator that starts a helper and talks to it.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Fallback log filter when `RUST_LOG` is unset.
const LOG_ENV: &str = "MACRO_KIT_LOG";

#[derive(Parser)]
#[command(name = "macro-kit")]
#[command(about = "Record and replay desktop input macros")]
#[command(version)]
struct Cli {
    /// Project root containing `.macro-kit/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Run the helper inside this process instead of as a subprocess.
    #[arg(long, global = true)]
    in_process: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the helper protocol on stdin and stdout.
    Helper {
        /// Refuse all OS access even when built with native support.
        #[arg(long)]
        no_native: bool,
    },
    /// Ask the helper which OS permissions it holds.
    Permissions,
    /// List the scenarios found under `.macro-kit/scenarios/`.
    List,
    /// Replay a scenario by name or id.
    Play {
        scenario: String,

        /// Budget for each pixel wait, in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Record a new scenario until the overlay is closed or Ctrl-C.
    ///
    /// While recording, type `delay <ms>`, `ref <scenario>` or `stop` on
    /// stdin to add steps that have no overlay gesture.
    Record {
        name: String,

        /// Write the scenario JSON here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;
    init_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Helper { no_native } => commands::helper(&cli.root, no_native).await,
        Commands::Permissions => commands::permissions(&cli.root, cli.in_process).await,
        Commands::List => commands::list(&cli.root).await,
        Commands::Play {
            scenario,
            timeout_ms,
        } => commands::play(&cli.root, cli.in_process, &scenario, timeout_ms).await,
        Commands::Record { name, output } => {
            commands::record(&cli.root, cli.in_process, &name, output.as_deref()).await
        }
    }
}

/// Logs always go to stderr. In `helper` mode stdout is the protocol channel.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_ENV))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .try_init();
}
