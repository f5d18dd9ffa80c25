//! Wickr Enterprise KOTS installer.
//!
//! Installs the Wickr Enterprise application into an existing EKS cluster:
//! fetches the license and CA from S3, builds a KOTS `ConfigValues` document
//! from CloudFormation outputs, stages a checksum-verified `kubectl-kots`
//! plugin and runs `kubectl kots install` against a freshly generated
//! kubeconfig.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use kots_install::{
//!     AwsCli, Collaborators, InstallerConfig, InvocationContext, KotsDownloader, KotsRelease,
//!     Orchestrator, SystemRunner,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config: InstallerConfig = load();
//!     let runner = Arc::new(SystemRunner::with_search_paths(&config.search_paths())?);
//!     let aws = Arc::new(AwsCli::new(runner.clone(), &config.region));
//!     let installer = Arc::new(KotsDownloader::new(KotsRelease::pinned()?)?);
//!     let orchestrator = Orchestrator::new(config, Collaborators::from_aws(aws, installer, runner));
//!     orchestrator.run(&serde_json::json!({}), &InvocationContext::new()).await?;
//!     Ok(())
//! }
//! ```

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]
// Error enums carry their step context; boxing would only add indirection
#![allow(clippy::result_large_err)]

pub mod aws;
pub mod config;
pub mod error;
pub mod kots;
pub mod kots_config;
pub mod kubeconfig;
pub mod orchestrator;
pub mod process;
pub mod release;
pub mod stack;

pub use aws::{AwsCli, AwsError, ClusterLister, ObjectFetcher, ObjectLocation, SecretReader, StackOutputResolver};
pub use config::{InstallerConfig, ObjectLocationConfig};
pub use error::{InstallError, InstallResult};
pub use kots_config::{build_config_values, ConfigSources, ConfigValue, ConfigValues};
pub use orchestrator::{Collaborators, InvocationContext, Orchestrator, RunOutcome};
pub use process::{CommandSpec, ProcessError, ProcessOutput, ProcessRunner, SystemRunner};
pub use release::{InstallerSource, KotsDownloader, KotsRelease};
pub use stack::StackLookup;
