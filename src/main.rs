use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use switchboard_config::SwitchboardConfig;
use switchboard_mcp::{McpConnector, Router};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Expose many MCP tool suites as one top-level tool each", long_about = None)]
struct Cli {
    /// Configuration file; skips the working-directory lookup
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory to look for configuration in
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    dir: PathBuf,

    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP on stdin/stdout (default)
    Serve,

    /// Write a starter switchboard.yaml
    Init {
        /// Directory to write into (defaults to --dir)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long, action = clap::ArgAction::SetTrue)]
        force: bool,
    },

    /// Print the top-level tools without contacting any suite
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    init_logging(cli.verbose)?;

    match cli.command.take().unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = load_config(&cli)?;
            let router = Router::new(&config, Arc::new(McpConnector))?;
            info!(
                "Serving {} suites over stdio",
                router.list_top_level_tools().len()
            );

            switchboard_server::serve(router).await?;

            // Stdin is read on a blocking thread the runtime would wait for
            std::process::exit(0);
        }
        Commands::Init { dir, force } => {
            let dir = dir.unwrap_or(cli.dir);
            let path = switchboard_config::init(&dir, force)?;
            eprintln!("Created {}", path.display());
        }
        Commands::Tools => {
            let config = load_config(&cli)?;
            for tool in switchboard_mcp::list_top_level_tools(&config)? {
                println!("{:<24} {}", tool.name, tool.description);
            }
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<SwitchboardConfig> {
    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {:?}", path);
            SwitchboardConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?
        }
        None => switchboard_config::get_config(&cli.dir)
            .with_context(|| format!("failed to load configuration from {}", cli.dir.display()))?,
    };
    Ok(config)
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose { "debug" } else { "info" };

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
