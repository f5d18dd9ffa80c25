//! Error types for the installer.
//!
//! Each variant names the step that failed. Nothing is retried; the first
//! error aborts the run and is returned to the caller.

use std::path::PathBuf;

use thiserror::Error;

use crate::aws::AwsError;

/// Errors that can occur during an installer run.
#[derive(Debug, Error)]
pub enum InstallError {
    /// Listing clusters failed.
    #[error("failed to list clusters: {0}")]
    PlatformQuery(#[source] AwsError),

    /// Fetching an object from storage failed.
    #[error("failed to fetch s3://{bucket}/{key}: {source}")]
    StorageFetch {
        bucket: String,
        key: String,
        #[source]
        source: AwsError,
    },

    /// A configuration value could not be resolved.
    #[error("config resolution failed: {0}")]
    ConfigResolution(String),

    /// Reading a secret failed.
    #[error("failed to read secret {secret_id}: {source}")]
    SecretFetch {
        secret_id: String,
        #[source]
        source: AwsError,
    },

    /// Downloaded installer does not match the pinned digest.
    #[error("checksum mismatch for installer archive: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    /// Downloading or staging the installer failed.
    #[error("failed to acquire installer: {0}")]
    InstallerAcquisition(String),

    /// Generating the kubeconfig failed.
    #[error("failed to materialize kubeconfig for cluster {cluster}: {message}")]
    CredentialMaterialization { cluster: String, message: String },

    /// The installer exited unsuccessfully or could not be started.
    #[error("kots install failed: {0}")]
    InstallInvocation(String),

    /// Writing a file to the scratch directory failed.
    #[error("failed to write {}: {source}", path.display())]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias used throughout the crate.
pub type InstallResult<T> = Result<T, InstallError>;
