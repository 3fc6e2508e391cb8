//! `compgen`: generate React components from a prompt.

mod generate;
mod server;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use compgen_pipeline::observability::init_observability;
use compgen_pipeline::{AppConfig, ExportStatus, normalize};

#[derive(Parser, Debug)]
#[command(name = "compgen", version, about = "Stream a React component from a prompt")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one generation and print the normalized component.
    Generate(generate::GenerateArgs),
    /// Normalize raw model output from a file.
    Normalize { file: PathBuf },
    /// Serve `POST /api/generate` over HTTP.
    Serve {
        /// Overrides `COMPGEN_BIND`.
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;
    init_observability();

    match cli.command {
        Command::Generate(args) => generate::run(args, &config).await,
        Command::Normalize { file } => {
            let code = normalize_file(&file).await?;
            println!("{code}");
            Ok(())
        }
        Command::Serve { bind } => server::serve(&config, bind.unwrap_or(config.bind)).await,
    }
}

async fn normalize_file(path: &std::path::Path) -> Result<String> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let component = normalize(&raw)?;
    if let ExportStatus::Missing = component.export() {
        tracing::warn!(file = %path.display(), "no default export could be discovered");
    }
    Ok(component.into_code())
}
