use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::{info, warn};

use kots_install::config::{DEFAULT_APP_SLUG, DEFAULT_NAMESPACE, DEFAULT_REGION};
use kots_install::{
    AwsCli, Collaborators, InstallerConfig, InvocationContext, KotsDownloader, KotsRelease,
    ObjectLocationConfig, Orchestrator, RunOutcome, SystemRunner,
};

/// Install Wickr Enterprise into an EKS cluster
#[derive(Args, Debug)]
pub struct InstallCommand {
    /// AWS region of the cluster and its stacks
    #[arg(long, env = "REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// Role assumed when generating the kubeconfig
    #[arg(long, env = "CLUSTER_ROLE_ARN")]
    cluster_role_arn: String,

    /// EKS cluster to install into
    #[arg(long, env = "CLUSTER_NAME")]
    cluster_name: String,

    /// Secret holding the KOTS admin password
    #[arg(long, env = "KOTS_SECRET_NAME")]
    kots_secret_name: String,

    /// Bucket holding the license
    #[arg(long, env = "LICENSE_BUCKET")]
    license_bucket: String,

    /// Key of the license object
    #[arg(long, env = "LICENSE_KEY")]
    license_key: String,

    /// Bucket holding the pinned CA certificate
    #[arg(long, env = "CA_BUCKET")]
    ca_bucket: String,

    /// Key of the pinned CA certificate object
    #[arg(long, env = "CA_KEY")]
    ca_key: String,

    /// Suffix appended to every CloudFormation stack name
    #[arg(long, env = "STACK_SUFFIX", default_value = "", allow_hyphen_values = true)]
    stack_suffix: String,

    /// Directory for generated files
    #[arg(long, env = "SCRATCH_DIR", default_value = "/tmp")]
    scratch_dir: PathBuf,

    /// Directories searched for kubectl and aws ahead of PATH
    #[arg(
        long = "tool-path",
        env = "TOOL_PATHS",
        value_delimiter = ':',
        default_values = ["/opt/kubectl", "/opt/awscli"]
    )]
    tool_paths: Vec<PathBuf>,

    /// KOTS application slug
    #[arg(long, env = "KOTS_APP_SLUG", default_value = DEFAULT_APP_SLUG)]
    app_slug: String,

    /// Namespace to install into
    #[arg(long, env = "KOTS_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Triggering event, logged with the invocation (JSON)
    #[arg(long, env = "KOTS_INSTALL_EVENT", default_value = "{}")]
    event: String,

    /// Exit successfully when the cluster does not exist
    #[arg(long)]
    allow_missing_cluster: bool,
}

impl InstallCommand {
    pub async fn run(&self) -> Result<()> {
        let config = self.to_config();
        let event = self.event()?;
        let context = InvocationContext::new();

        let runner = Arc::new(
            SystemRunner::with_search_paths(&config.search_paths())
                .context("Invalid tool search path")?,
        );
        let aws = Arc::new(
            AwsCli::new(runner.clone(), &config.region).with_program(&config.aws_program),
        );
        let installer = Arc::new(KotsDownloader::new(KotsRelease::pinned()?)?);

        let orchestrator = Orchestrator::new(config, Collaborators::from_aws(aws, installer, runner));
        let outcome = orchestrator
            .run(&event, &context)
            .await
            .with_context(|| {
                format!(
                    "Installation into cluster {} failed (invocation {})",
                    self.cluster_name, context.invocation_id
                )
            })?;

        finish(outcome, &self.region, self.allow_missing_cluster)
    }

    fn to_config(&self) -> InstallerConfig {
        let mut config = InstallerConfig::with_defaults(
            &self.cluster_name,
            &self.cluster_role_arn,
            &self.kots_secret_name,
            ObjectLocationConfig {
                bucket: self.license_bucket.clone(),
                key: self.license_key.clone(),
            },
            ObjectLocationConfig {
                bucket: self.ca_bucket.clone(),
                key: self.ca_key.clone(),
            },
        );
        config.region.clone_from(&self.region);
        config.stack_suffix.clone_from(&self.stack_suffix);
        config.scratch_dir.clone_from(&self.scratch_dir);
        config.tool_paths.clone_from(&self.tool_paths);
        config.app_slug.clone_from(&self.app_slug);
        config.namespace.clone_from(&self.namespace);
        config
    }

    fn event(&self) -> Result<serde_json::Value> {
        serde_json::from_str(&self.event).context("Invocation event is not valid JSON")
    }
}

/// Map the run outcome to the process result.
fn finish(outcome: RunOutcome, region: &str, allow_missing_cluster: bool) -> Result<()> {
    match outcome {
        RunOutcome::Installed { cluster } => {
            info!(cluster = %cluster, "Wickr Enterprise installed");
            Ok(())
        }
        RunOutcome::TargetNotFound { cluster, available } if allow_missing_cluster => {
            warn!(cluster = %cluster, available = ?available, "Cluster not found, skipping install");
            Ok(())
        }
        RunOutcome::TargetNotFound { cluster, available } => {
            bail!(
                "Cluster {cluster} not found in {region} (available: {})",
                available.join(", ")
            )
        }
    }
}
