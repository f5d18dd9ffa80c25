use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use kots_install::config::DEFAULT_REGION;
use kots_install::{build_config_values, AwsCli, ConfigSources, StackLookup, SystemRunner};

/// Render the KOTS config values document
#[derive(Args, Debug)]
pub struct ConfigCommand {
    /// AWS region of the stacks (falls back to AWS_DEFAULT_REGION)
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Suffix appended to every CloudFormation stack name
    #[arg(long, env = "STACK_SUFFIX", default_value = "", allow_hyphen_values = true)]
    stack_suffix: String,

    /// PEM file embedded as the pinned CA certificate (required; no CA bundle
    /// ships with the binary)
    #[arg(long, value_name = "FILE")]
    ca_file: PathBuf,

    /// Write the document here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

impl ConfigCommand {
    pub async fn run(&self) -> Result<()> {
        let region = self.region();
        let ca_pem = tokio::fs::read(&self.ca_file)
            .await
            .with_context(|| format!("Failed to read {}", self.ca_file.display()))?;

        let aws = AwsCli::new(Arc::new(SystemRunner::new()), &region);
        let sources = ConfigSources {
            stacks: StackLookup::new(&aws, &self.stack_suffix),
            secrets: &aws,
            region: &region,
        };
        let values = build_config_values(&sources, &ca_pem)
            .await
            .context("Failed to build config values")?;

        if let Some(path) = &self.output {
            values.write_to(path).await?;
            info!(path = %path.display(), "Wrote config values");
        } else {
            println!("{}", values.to_json()?);
        }
        Ok(())
    }

    fn region(&self) -> String {
        self.region
            .clone()
            .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigCommand,
    }

    #[test]
    fn test_explicit_region_wins() {
        let cli = TestCli::parse_from(["kots-install", "--region", "ap-south-1", "--ca-file", "ca.pem"]);
        assert_eq!(cli.config.region(), "ap-south-1");
        assert_eq!(cli.config.ca_file, PathBuf::from("ca.pem"));
        assert!(cli.config.output.is_none());
    }

    #[test]
    fn test_hyphenated_stack_suffix() {
        let cli = TestCli::parse_from([
            "kots-install",
            "--ca-file",
            "ca.pem",
            "--stack-suffix",
            "-staging",
        ]);
        assert_eq!(cli.config.stack_suffix, "-staging");
        assert_eq!(cli.config.ca_file, PathBuf::from("ca.pem"));
    }
}
