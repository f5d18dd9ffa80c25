//! AWS collaborators implemented on top of the `aws` CLI.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::models::{DescribeStacksOutput, GetSecretValueOutput, ListClustersOutput, StackOutput};
use super::traits::{
    AwsError, ClusterLister, ObjectFetcher, ObjectLocation, SecretReader, StackOutputResolver,
};
use crate::process::{CommandSpec, ProcessOutput, ProcessRunner};

/// Default CLI program name.
pub const DEFAULT_AWS_PROGRAM: &str = "aws";

/// AWS client driving the `aws` CLI.
#[derive(Clone)]
pub struct AwsCli {
    /// Runner used to spawn the CLI.
    runner: Arc<dyn ProcessRunner>,
    /// CLI program name or path.
    program: String,
    /// AWS region passed to every call.
    region: String,
}

impl AwsCli {
    /// Create a client for `region`.
    #[must_use]
    pub fn new(runner: Arc<dyn ProcessRunner>, region: impl Into<String>) -> Self {
        Self {
            runner,
            program: DEFAULT_AWS_PROGRAM.to_string(),
            region: region.into(),
        }
    }

    /// Use a different CLI program.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Start a `aws <service> <operation>` command.
    fn command(&self, service: &str, operation: &str) -> CommandSpec {
        CommandSpec::new(&self.program).args([service, operation])
    }

    /// Run a command, failing on non-zero exit.
    async fn execute(&self, command: CommandSpec) -> Result<ProcessOutput, AwsError> {
        let command = command.args(["--region", self.region.as_str()]);
        let output = self.runner.run(&command).await?;

        if !output.success() {
            return Err(AwsError::CommandFailed {
                command: command.to_string(),
                status: output.status_text(),
                stderr: output.stderr_lossy(),
            });
        }

        Ok(output)
    }

    /// Run a command with JSON output and parse it.
    async fn execute_json<T: DeserializeOwned>(&self, command: CommandSpec) -> Result<T, AwsError> {
        let output = self.execute(command.args(["--output", "json"])).await?;
        serde_json::from_slice(&output.stdout).map_err(AwsError::Parse)
    }
}

#[async_trait]
impl ClusterLister for AwsCli {
    async fn list_clusters(&self) -> Result<Vec<String>, AwsError> {
        let response: ListClustersOutput = self
            .execute_json(self.command("eks", "list-clusters"))
            .await?;
        debug!(clusters = ?response.clusters, "Listed EKS clusters");
        Ok(response.clusters)
    }
}

#[async_trait]
impl ObjectFetcher for AwsCli {
    async fn get_object(&self, location: &ObjectLocation) -> Result<Vec<u8>, AwsError> {
        let command = self
            .command("s3", "cp")
            .args([location.uri(), "-".to_string()]);
        let output = self.execute(command).await?;
        debug!(object = %location, bytes = output.stdout.len(), "Fetched object");
        Ok(output.stdout)
    }

    async fn download(&self, location: &ObjectLocation, dest: &Path) -> Result<(), AwsError> {
        let command = self
            .command("s3", "cp")
            .args([location.uri(), dest.display().to_string()])
            .arg("--only-show-errors");
        self.execute(command).await?;
        debug!(object = %location, dest = %dest.display(), "Downloaded object");
        Ok(())
    }
}

#[async_trait]
impl SecretReader for AwsCli {
    async fn secret_string(&self, secret_id: &str) -> Result<String, AwsError> {
        let command = self
            .command("secretsmanager", "get-secret-value")
            .args(["--secret-id", secret_id]);
        let response: GetSecretValueOutput = self.execute_json(command).await?;
        response
            .secret_string
            .ok_or_else(|| AwsError::NotFound(format!("secret {secret_id} has no string value")))
    }
}

#[async_trait]
impl StackOutputResolver for AwsCli {
    async fn stack_outputs(&self, stack_name: &str) -> Result<Option<Vec<StackOutput>>, AwsError> {
        let command = self
            .command("cloudformation", "describe-stacks")
            .args(["--stack-name", stack_name]);
        let response: DescribeStacksOutput = self.execute_json(command).await?;

        let stack = response
            .stacks
            .into_iter()
            .next()
            .ok_or_else(|| AwsError::NotFound(format!("stack {stack_name}")))?;

        debug!(
            stack = %stack.stack_name,
            outputs = stack.outputs.as_ref().map_or(0, Vec::len),
            "Described stack"
        );
        Ok(stack.outputs)
    }
}
