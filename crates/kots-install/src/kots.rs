//! `kubectl kots install` invocation.

use std::path::Path;

use tracing::info;

use crate::error::{InstallError, InstallResult};
use crate::process::{CommandSpec, ProcessRunner};

/// Arguments for a `kubectl kots install` run.
#[derive(Debug, Clone)]
pub struct KotsInstall<'a> {
    /// `kubectl` program.
    pub kubectl_program: &'a str,
    /// Application slug.
    pub app_slug: &'a str,
    /// Namespace to install into.
    pub namespace: &'a str,
    /// License file.
    pub license_path: &'a Path,
    /// Config values document.
    pub config_values_path: &'a Path,
    /// Kubeconfig for the target cluster.
    pub kubeconfig_path: &'a Path,
}

impl KotsInstall<'_> {
    /// The command line, with the admin password marked secret.
    #[must_use]
    pub fn command(&self, admin_password: &str) -> CommandSpec {
        CommandSpec::new(self.kubectl_program)
            .args(["kots", "install", self.app_slug])
            .arg("--shared-password")
            .secret_arg(admin_password)
            .arg("--license-file")
            .arg(self.license_path.display().to_string())
            .arg("--config-values")
            .arg(self.config_values_path.display().to_string())
            .args(["--namespace", self.namespace])
            .args(["--skip-preflights", "--no-port-forward"])
            .arg("--kubeconfig")
            .arg(self.kubeconfig_path.display().to_string())
    }

    /// Run the install.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::InstallInvocation`] if `kubectl` cannot be
    /// started or exits non-zero.
    pub async fn invoke(&self, runner: &dyn ProcessRunner, admin_password: &str) -> InstallResult<()> {
        let command = self.command(admin_password);
        info!(app = self.app_slug, namespace = self.namespace, "Running kots install");

        let output = runner
            .run(&command)
            .await
            .map_err(|e| InstallError::InstallInvocation(e.to_string()))?;

        for (stream, text) in [("stdout", output.stdout_lossy()), ("stderr", output.stderr_lossy())] {
            let text = text.trim();
            if !text.is_empty() {
                info!(stream, output = %text, "kots install output");
            }
        }

        if !output.success() {
            return Err(InstallError::InstallInvocation(format!(
                "`{command}` failed with {}: {}",
                output.status_text(),
                output.stderr_lossy()
            )));
        }

        info!(app = self.app_slug, "kots install finished");
        Ok(())
    }
}
