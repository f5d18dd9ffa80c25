//! Capability traits and common types for AWS collaborators.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use super::models::StackOutput;
use crate::process::ProcessError;

/// Errors returned by AWS collaborators.
#[derive(Error, Debug)]
pub enum AwsError {
    /// The CLI could not be started.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The CLI ran but exited unsuccessfully.
    #[error("`{command}` failed with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The CLI output could not be parsed.
    #[error("failed to parse aws output: {0}")]
    Parse(#[from] serde_json::Error),

    /// Local file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Location of an S3 object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
}

impl ObjectLocation {
    /// Create a new object location.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// `s3://bucket/key` URI.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// Lists managed Kubernetes clusters.
#[async_trait]
pub trait ClusterLister: Send + Sync {
    /// Names of all clusters visible in the configured region.
    async fn list_clusters(&self) -> Result<Vec<String>, AwsError>;
}

/// Fetches objects from storage.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// Read an object into memory.
    async fn get_object(&self, location: &ObjectLocation) -> Result<Vec<u8>, AwsError>;

    /// Copy an object to a local file, replacing it if present.
    async fn download(&self, location: &ObjectLocation, dest: &Path) -> Result<(), AwsError> {
        let bytes = self.get_object(location).await?;
        tokio::fs::write(dest, bytes).await?;
        Ok(())
    }
}

/// Reads secret payloads.
#[async_trait]
pub trait SecretReader: Send + Sync {
    /// The string payload of `secret_id` (name or ARN).
    async fn secret_string(&self, secret_id: &str) -> Result<String, AwsError>;
}

/// Reads infrastructure stack outputs.
#[async_trait]
pub trait StackOutputResolver: Send + Sync {
    /// Outputs published by `stack_name`.
    ///
    /// Returns `Ok(None)` when the stack exists but declares no outputs.
    async fn stack_outputs(&self, stack_name: &str) -> Result<Option<Vec<StackOutput>>, AwsError>;
}
