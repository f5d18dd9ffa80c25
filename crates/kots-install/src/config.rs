//! Installer configuration types.
//!
//! The configuration is assembled once (from CLI flags or the environment)
//! and handed to the orchestrator; nothing reads the environment afterwards.

use std::path::PathBuf;

use crate::aws::{ObjectLocation, DEFAULT_AWS_PROGRAM};

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default KOTS application slug.
pub const DEFAULT_APP_SLUG: &str = "wickr-enterprise-ha";

/// Default namespace the application is installed into.
pub const DEFAULT_NAMESPACE: &str = "wickr";

/// File name of the generated config values document.
pub const CONFIG_VALUES_FILE: &str = "kots_config.json";

/// File name of the downloaded license.
pub const LICENSE_FILE: &str = "kots_license.yaml";

/// Full installer configuration.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    // Target identity
    /// AWS region of the cluster and its stacks.
    pub region: String,
    /// Name of the EKS cluster to install into.
    pub cluster_name: String,
    /// Role assumed when generating the kubeconfig.
    pub cluster_role_arn: String,
    /// Suffix appended to every stack name (e.g. "-staging").
    pub stack_suffix: String,

    // Inputs
    /// Secret holding the KOTS admin (shared) password.
    pub kots_secret_name: String,
    /// Location of the license object.
    pub license: ObjectLocationConfig,
    /// Location of the pinned CA certificate object.
    pub ca: ObjectLocationConfig,

    // Installer
    /// KOTS application slug.
    pub app_slug: String,
    /// Namespace to install into.
    pub namespace: String,

    // Local environment
    /// Scratch directory for generated files.
    pub scratch_dir: PathBuf,
    /// Directories searched for `kubectl` and `aws` ahead of `PATH`.
    pub tool_paths: Vec<PathBuf>,
    /// `aws` CLI program.
    pub aws_program: String,
    /// `kubectl` program.
    pub kubectl_program: String,
}

/// Serializable bucket/key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocationConfig {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
}

impl From<&ObjectLocationConfig> for ObjectLocation {
    fn from(value: &ObjectLocationConfig) -> Self {
        ObjectLocation::new(&value.bucket, &value.key)
    }
}

impl InstallerConfig {
    /// Create config with defaults for everything but the target identity and inputs.
    #[must_use]
    pub fn with_defaults(
        cluster_name: impl Into<String>,
        cluster_role_arn: impl Into<String>,
        kots_secret_name: impl Into<String>,
        license: ObjectLocationConfig,
        ca: ObjectLocationConfig,
    ) -> Self {
        Self {
            region: DEFAULT_REGION.into(),
            cluster_name: cluster_name.into(),
            cluster_role_arn: cluster_role_arn.into(),
            stack_suffix: String::new(),
            kots_secret_name: kots_secret_name.into(),
            license,
            ca,
            app_slug: DEFAULT_APP_SLUG.into(),
            namespace: DEFAULT_NAMESPACE.into(),
            scratch_dir: PathBuf::from("/tmp"),
            tool_paths: vec!["/opt/kubectl".into(), "/opt/awscli".into()],
            aws_program: DEFAULT_AWS_PROGRAM.into(),
            kubectl_program: "kubectl".into(),
        }
    }

    /// Get the config values document path.
    #[must_use]
    pub fn config_values_path(&self) -> PathBuf {
        self.scratch_dir.join(CONFIG_VALUES_FILE)
    }

    /// Get the license path.
    #[must_use]
    pub fn license_path(&self) -> PathBuf {
        self.scratch_dir.join(LICENSE_FILE)
    }

    /// Get the kubeconfig path for `cluster`.
    #[must_use]
    pub fn kubeconfig_path(&self, cluster: &str) -> PathBuf {
        self.scratch_dir.join(cluster).join("kubeconfig")
    }

    /// Directories children search for tools, scratch last so the staged
    /// `kubectl-kots` plugin is found.
    #[must_use]
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.tool_paths.clone();
        paths.push(self.scratch_dir.clone());
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(key: &str) -> ObjectLocationConfig {
        ObjectLocationConfig {
            bucket: "assets".into(),
            key: key.into(),
        }
    }

    fn config() -> InstallerConfig {
        InstallerConfig::with_defaults(
            "wickr",
            "arn:aws:iam::1:role/admin",
            "wickr/kots",
            location("license"),
            location("ca"),
        )
    }

    #[test]
    fn test_config_defaults() {
        let config = config();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.stack_suffix, "");
        assert_eq!(config.app_slug, "wickr-enterprise-ha");
        assert_eq!(config.namespace, "wickr");
        assert_eq!(config.scratch_dir, PathBuf::from("/tmp"));
        assert_eq!(config.aws_program, "aws");
        assert_eq!(config.kubectl_program, "kubectl");
    }

    #[test]
    fn test_paths() {
        let config = config();
        assert_eq!(
            config.config_values_path(),
            PathBuf::from("/tmp/kots_config.json")
        );
        assert_eq!(config.license_path(), PathBuf::from("/tmp/kots_license.yaml"));
        assert_eq!(
            config.kubeconfig_path("wickr"),
            PathBuf::from("/tmp/wickr/kubeconfig")
        );
    }

    #[test]
    fn test_search_paths_end_with_scratch() {
        let paths = config().search_paths();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/opt/kubectl"),
                PathBuf::from("/opt/awscli"),
                PathBuf::from("/tmp"),
            ]
        );
    }

    #[test]
    fn test_object_location_conversion() {
        let loc: ObjectLocation = (&location("license.yaml")).into();
        assert_eq!(loc.uri(), "s3://assets/license.yaml");
    }
}
