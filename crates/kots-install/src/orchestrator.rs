//! Installer orchestration.
//!
//! A run is a single pass:
//! 1. Find the target cluster
//! 2. Download the license
//! 3. Build and write the config values document
//! 4. Download, verify and stage the kots plugin
//! 5. Generate a kubeconfig for the cluster
//! 6. Run `kubectl kots install`
//!
//! Steps run once, in order, and the first failure aborts the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::aws::{
    AwsCli, ClusterLister, ObjectFetcher, ObjectLocation, SecretReader, StackOutputResolver,
};
use crate::config::InstallerConfig;
use crate::error::{InstallError, InstallResult};
use crate::kots::KotsInstall;
use crate::kots_config::{build_config_values, ConfigSources, ConfigValues};
use crate::kubeconfig::{materialize_kubeconfig, KubeconfigRequest};
use crate::process::ProcessRunner;
use crate::release::InstallerSource;
use crate::stack::StackLookup;

/// Per-invocation metadata, logged alongside the triggering event.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Unique invocation ID.
    pub invocation_id: Uuid,
    /// When the invocation started.
    pub started_at: DateTime<Utc>,
}

impl InvocationContext {
    /// Context for an invocation starting now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The application was installed into `cluster`.
    Installed { cluster: String },
    /// The configured cluster was not in the listing; nothing was done.
    TargetNotFound {
        cluster: String,
        available: Vec<String>,
    },
}

/// External collaborators used by the orchestrator.
#[derive(Clone)]
pub struct Collaborators {
    pub clusters: Arc<dyn ClusterLister>,
    pub objects: Arc<dyn ObjectFetcher>,
    pub secrets: Arc<dyn SecretReader>,
    pub stacks: Arc<dyn StackOutputResolver>,
    pub installer: Arc<dyn InstallerSource>,
    pub runner: Arc<dyn ProcessRunner>,
}

impl Collaborators {
    /// Use `aws` for every AWS capability.
    #[must_use]
    pub fn from_aws(
        aws: Arc<AwsCli>,
        installer: Arc<dyn InstallerSource>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            clusters: aws.clone(),
            objects: aws.clone(),
            secrets: aws.clone(),
            stacks: aws,
            installer,
            runner,
        }
    }
}

/// Drives a single installation.
pub struct Orchestrator {
    config: InstallerConfig,
    deps: Collaborators,
}

impl Orchestrator {
    /// Create an orchestrator.
    #[must_use]
    pub fn new(config: InstallerConfig, deps: Collaborators) -> Self {
        Self { config, deps }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Run the installation.
    ///
    /// # Errors
    ///
    /// Returns the first step failure. A missing target cluster is not an
    /// error; it is reported as [`RunOutcome::TargetNotFound`].
    pub async fn run(
        &self,
        event: &serde_json::Value,
        context: &InvocationContext,
    ) -> InstallResult<RunOutcome> {
        info!(
            invocation_id = %context.invocation_id,
            started_at = %context.started_at,
            event = %event,
            "Installer invoked"
        );

        let clusters = self.list_clusters().await?;
        let Some(cluster) = find_target(&clusters, &self.config.cluster_name) else {
            warn!(
                cluster = %self.config.cluster_name,
                available = ?clusters,
                "Target cluster not found, nothing to install"
            );
            return Ok(RunOutcome::TargetNotFound {
                cluster: self.config.cluster_name.clone(),
                available: clusters,
            });
        };
        let cluster = cluster.to_string();
        info!(cluster = %cluster, "Found target cluster");

        self.prepare_scratch().await?;
        self.fetch_license().await?;
        self.build_config().await?;
        self.acquire_installer().await?;
        let admin_password = self.admin_password().await?;
        let kubeconfig = self.materialize_kubeconfig(&cluster).await?;
        self.invoke_installer(&admin_password, &kubeconfig).await?;

        info!(cluster = %cluster, invocation_id = %context.invocation_id, "Installation complete");
        Ok(RunOutcome::Installed { cluster })
    }

    /// List cluster names.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::PlatformQuery`] if the listing fails.
    pub async fn list_clusters(&self) -> InstallResult<Vec<String>> {
        let clusters = self
            .deps
            .clusters
            .list_clusters()
            .await
            .map_err(InstallError::PlatformQuery)?;
        info!(count = clusters.len(), "Listed clusters");
        Ok(clusters)
    }

    /// Create the scratch directory if needed.
    async fn prepare_scratch(&self) -> InstallResult<()> {
        let dir = &self.config.scratch_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| InstallError::Scratch {
                path: dir.clone(),
                source,
            })
    }

    /// Copy the license to scratch space.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::StorageFetch`] on any storage or I/O failure.
    pub async fn fetch_license(&self) -> InstallResult<PathBuf> {
        let location = ObjectLocation::from(&self.config.license);
        let path = self.config.license_path();

        self.deps
            .objects
            .download(&location, &path)
            .await
            .map_err(|source| InstallError::StorageFetch {
                bucket: location.bucket.clone(),
                key: location.key.clone(),
                source,
            })?;

        info!(object = %location, path = %path.display(), "Downloaded license");
        Ok(path)
    }

    /// Build the config values document and write it to scratch space.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::StorageFetch`] if the CA cannot be fetched,
    /// [`InstallError::ConfigResolution`] if a value cannot be resolved, or
    /// [`InstallError::Scratch`] if the document cannot be written.
    pub async fn build_config(&self) -> InstallResult<ConfigValues> {
        let ca_location = ObjectLocation::from(&self.config.ca);
        let ca_pem = self
            .deps
            .objects
            .get_object(&ca_location)
            .await
            .map_err(|source| InstallError::StorageFetch {
                bucket: ca_location.bucket.clone(),
                key: ca_location.key.clone(),
                source,
            })?;

        let sources = ConfigSources {
            stacks: StackLookup::new(self.deps.stacks.as_ref(), &self.config.stack_suffix),
            secrets: self.deps.secrets.as_ref(),
            region: &self.config.region,
        };
        let values = build_config_values(&sources, &ca_pem).await?;
        values.write_to(&self.config.config_values_path()).await?;
        Ok(values)
    }

    /// Download and stage the kots plugin.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Integrity`] on digest mismatch or
    /// [`InstallError::InstallerAcquisition`] on any other failure.
    pub async fn acquire_installer(&self) -> InstallResult<PathBuf> {
        self.deps.installer.acquire(&self.config.scratch_dir).await
    }

    /// Read the KOTS admin password.
    async fn admin_password(&self) -> InstallResult<String> {
        self.deps
            .secrets
            .secret_string(&self.config.kots_secret_name)
            .await
            .map_err(|source| InstallError::SecretFetch {
                secret_id: self.config.kots_secret_name.clone(),
                source,
            })
    }

    /// Generate the kubeconfig for `cluster`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::CredentialMaterialization`] on failure.
    pub async fn materialize_kubeconfig(&self, cluster: &str) -> InstallResult<PathBuf> {
        let path = self.config.kubeconfig_path(cluster);
        let request = KubeconfigRequest {
            aws_program: &self.config.aws_program,
            region: &self.config.region,
            cluster,
            role_arn: &self.config.cluster_role_arn,
            path: &path,
        };
        materialize_kubeconfig(self.deps.runner.as_ref(), &request).await
    }

    /// Run `kubectl kots install`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::InstallInvocation`] on failure.
    pub async fn invoke_installer(&self, admin_password: &str, kubeconfig: &Path) -> InstallResult<()> {
        let license = self.config.license_path();
        let config_values = self.config.config_values_path();
        let install = KotsInstall {
            kubectl_program: &self.config.kubectl_program,
            app_slug: &self.config.app_slug,
            namespace: &self.config.namespace,
            license_path: &license,
            config_values_path: &config_values,
            kubeconfig_path: kubeconfig,
        };
        install.invoke(self.deps.runner.as_ref(), admin_password).await
    }
}

/// Find `name` in `clusters`.
#[must_use]
pub fn find_target<'a>(clusters: &'a [String], name: &str) -> Option<&'a str> {
    clusters.iter().map(String::as_str).find(|c| *c == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_target() {
        let clusters = vec!["dev".to_string(), "wickr".to_string()];
        assert_eq!(find_target(&clusters, "wickr"), Some("wickr"));
        assert_eq!(find_target(&clusters, "wick"), None);
        assert_eq!(find_target(&[], "wickr"), None);
    }

    #[test]
    fn test_invocation_context_is_unique() {
        let a = InvocationContext::new();
        let b = InvocationContext::default();
        assert_ne!(a.invocation_id, b.invocation_id);
    }
}
