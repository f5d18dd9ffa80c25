//! Kubeconfig generation for the target cluster.
//!
//! The kubeconfig is generated with `aws eks update-kubeconfig` under the
//! cluster admin role and lives only in the scratch directory.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{InstallError, InstallResult};
use crate::process::{CommandSpec, ProcessRunner};

/// Inputs for [`materialize_kubeconfig`].
#[derive(Debug, Clone)]
pub struct KubeconfigRequest<'a> {
    /// `aws` CLI program.
    pub aws_program: &'a str,
    /// Region of the cluster.
    pub region: &'a str,
    /// Cluster name.
    pub cluster: &'a str,
    /// Role assumed by the generated credentials.
    pub role_arn: &'a str,
    /// Where to write the kubeconfig.
    pub path: &'a Path,
}

impl KubeconfigRequest<'_> {
    /// The `aws eks update-kubeconfig` command line.
    #[must_use]
    pub fn command(&self) -> CommandSpec {
        CommandSpec::new(self.aws_program)
            .args(["eks", "update-kubeconfig"])
            .args(["--role-arn", self.role_arn])
            .args(["--name", self.cluster])
            .arg("--kubeconfig")
            .arg(self.path.display().to_string())
            .args(["--region", self.region])
    }
}

/// Generate a kubeconfig for the cluster and restrict it to the owner.
///
/// # Errors
///
/// Returns [`InstallError::CredentialMaterialization`] if the CLI cannot be
/// started, exits non-zero, or the file cannot be secured.
pub async fn materialize_kubeconfig(
    runner: &dyn ProcessRunner,
    request: &KubeconfigRequest<'_>,
) -> InstallResult<PathBuf> {
    let fail = |message: String| InstallError::CredentialMaterialization {
        cluster: request.cluster.to_string(),
        message,
    };

    if let Some(parent) = request.path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| fail(format!("failed to create {}: {e}", parent.display())))?;
    }

    let output = runner
        .run(&request.command())
        .await
        .map_err(|e| fail(e.to_string()))?;

    if !output.success() {
        return Err(fail(format!(
            "update-kubeconfig failed with {}: {}",
            output.status_text(),
            output.stderr_lossy()
        )));
    }

    restrict_to_owner(request.path)
        .await
        .map_err(|e| fail(format!("failed to secure {}: {e}", request.path.display())))?;

    info!(
        cluster = request.cluster,
        path = %request.path.display(),
        "Generated kubeconfig"
    );
    Ok(request.path.to_path_buf())
}

#[cfg(unix)]
async fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    tokio::fs::metadata(path).await.map(|_| ())
}
