//! api-inliner CLI - fetch API data at build time and inline it into a static site.

use std::path::PathBuf;

use anyhow::Result;
use api_inliner_core::BuildMode;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "api-inliner")]
#[command(about = "Fetch API data at build time and inline it into a static site")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to inliner.toml config file
    #[arg(short, long, default_value = "inliner.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and page
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Build the static site with API data inlined
    Build {
        /// Output directory (defaults to config or "dist")
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Build mode; development skips fetching
        #[arg(short, long, value_enum, default_value_t = ModeArg::Production)]
        mode: ModeArg,
    },

    /// Fetch endpoints and write artifacts without building pages
    Fetch {
        /// Output directory (defaults to config or "dist")
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Build mode; development skips fetching
        #[arg(short, long, value_enum, default_value_t = ModeArg::Production)]
        mode: ModeArg,

        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Preview a built site
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Directory to serve
        #[arg(short, long, default_value = "dist")]
        dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Production,
    Development,
}

impl From<ModeArg> for BuildMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Production => BuildMode::Production,
            ModeArg::Development => BuildMode::Development,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(&cli.config, yes).await?;
        }
        Commands::Build { output, mode } => {
            commands::build::run(&cli.config, output, mode.into()).await?;
        }
        Commands::Fetch { output, mode, json } => {
            commands::fetch::run(&cli.config, output, mode.into(), json).await?;
        }
        Commands::Serve { port, dir } => {
            commands::serve::run(port, dir).await?;
        }
    }

    Ok(())
}
