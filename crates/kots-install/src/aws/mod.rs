//! AWS collaborators.
//!
//! The installer needs four narrow capabilities from AWS:
//!
//! - **EKS** - list clusters ([`ClusterLister`])
//! - **S3** - fetch the license and CA objects ([`ObjectFetcher`])
//! - **Secrets Manager** - read the admin and database secrets ([`SecretReader`])
//! - **CloudFormation** - read stack outputs ([`StackOutputResolver`])
//!
//! [`AwsCli`] implements all four on top of the `aws` CLI, which is already
//! required for `eks update-kubeconfig` and handles credential resolution
//! and request signing.

mod cli;
mod models;
mod traits;

pub use cli::{AwsCli, DEFAULT_AWS_PROGRAM};
pub use models::*;
pub use traits::{
    AwsError, ClusterLister, ObjectFetcher, ObjectLocation, SecretReader, StackOutputResolver,
};
