//! exomap - Main Entry Point

use clap::Parser;
use exomap::cli::{cmd_build, cmd_info, cmd_serve, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exomap=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Build(args)) => {
            cmd_build(&args).await?;
        }
        Some(Commands::Serve(args)) => {
            cmd_serve(args.serve_config()).await?;
        }
        Some(Commands::Info { data }) => {
            cmd_info(&data)?;
        }
        None => {
            // Default: build with top-level flags
            cmd_build(&cli.build).await?;
        }
    }

    Ok(())
}
