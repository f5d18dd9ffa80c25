//! Wickr Enterprise KOTS installer CLI.
//!
//! Installs the Wickr Enterprise KOTS application into an EKS cluster, or
//! renders the KOTS config values document on its own.

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::config::ConfigCommand;
use commands::install::InstallCommand;

/// Wickr Enterprise KOTS installer.
#[derive(Parser)]
#[command(
    name = "kots-install",
    version,
    about = "Install Wickr Enterprise into an EKS cluster with KOTS",
    long_about = "Install Wickr Enterprise into an existing EKS cluster.\n\n\
                  Fetches the license and pinned CA from S3, builds the KOTS\n\
                  config values from CloudFormation outputs, stages a verified\n\
                  kubectl-kots plugin and runs `kubectl kots install`."
)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the application into the configured cluster.
    Install(InstallCommand),

    /// Render the KOTS config values document without installing.
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match cli.command {
        Commands::Install(cmd) => cmd.run().await,
        Commands::Config(cmd) => cmd.run().await,
    }
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("info,kots_install=debug")
        } else {
            EnvFilter::new("warn,kots_install=info")
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_format_flag() {
        let cli = Cli::parse_from(["kots-install", "--log-format", "json", "config", "--ca-file", "ca.pem"]);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Commands::Config(_)));
    }
}
