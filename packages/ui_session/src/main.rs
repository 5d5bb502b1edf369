use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

use ui_session::{ClientConfig, FileConfig};

mod cli;

#[derive(Parser)]
#[command(name = "ui-session")]
#[command(about = "Live session client for server-driven component UIs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Custom data directory (defaults to <config dir>/ui-session)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and drive a session from stdin
    Run(RunArgs),

    /// Print the savable components of a JSON component forest
    Extract(ExtractArgs),
}

#[derive(Parser)]
struct RunArgs {
    /// WebSocket URL of the orchestration service
    #[arg(long)]
    url: Option<String>,

    /// Bearer token (overrides config and UI_SESSION_AUTH__TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Chat to load once connected
    #[arg(long)]
    chat: Option<String>,
}

#[derive(Parser)]
struct ExtractArgs {
    /// File holding a component forest (array) or a single component
    file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.debug {
        "ui_session=debug,component_tree=debug,info"
    } else {
        "ui_session=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    match cli.command {
        Commands::Run(args) => {
            let data_dir = ui_session::config::data_dir(cli.data_dir)?;
            let mut file_config: FileConfig = ui_session::load_config(&data_dir)
                .extract()
                .context("failed to load configuration")?;
            if let Some(url) = args.url {
                file_config.server.url = url;
            }
            if args.token.is_some() {
                file_config.auth.token = args.token;
            }

            let config = ClientConfig::from_file(&file_config);
            cli::run_command(config, file_config.auth.token, args.chat).await
        }
        Commands::Extract(args) => cli::extract_command(&args.file),
    }
}
