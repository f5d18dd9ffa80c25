//! KOTS `ConfigValues` document.
//!
//! The document feeds `kubectl kots install --config-values`. Values come
//! from the deployment's CloudFormation stack outputs, the database secret,
//! the pinned CA certificate and a handful of literals.

use std::collections::BTreeMap;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aws::SecretReader;
use crate::error::{InstallError, InstallResult};
use crate::stack::StackLookup;

/// `apiVersion` of the document.
pub const API_VERSION: &str = "kots.io/v1beta1";

/// `kind` of the document.
pub const KIND: &str = "ConfigValues";

/// File name the pinned certificate is presented under.
pub const PINNED_CERT_FILENAME: &str = "pinned-cert.pem";

// Stack base names
const ACM_STACK: &str = "WickrAcm";
const ALB_STACK: &str = "WickrAlb";
const RDS_STACK: &str = "WickrRds";
const S3_STACK: &str = "WickrS3";
const EKS_STACK: &str = "WickrEks";

/// A single config value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_plaintext: Option<String>,
}

impl ConfigValue {
    /// Plain `value` entry.
    #[must_use]
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// `valuePlaintext` entry, encrypted by KOTS on import.
    #[must_use]
    pub fn plaintext(value: impl Into<String>) -> Self {
        Self {
            value_plaintext: Some(value.into()),
            ..Self::default()
        }
    }

    /// File entry with a base64 `value`.
    #[must_use]
    pub fn file(filename: impl Into<String>, base64_value: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            value: Some(base64_value.into()),
            ..Self::default()
        }
    }
}

/// `spec` section of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValuesSpec {
    /// Values keyed by config item name.
    pub values: BTreeMap<String, ConfigValue>,
}

/// The full document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigValues {
    pub api_version: String,
    pub kind: String,
    pub spec: ConfigValuesSpec,
}

impl Default for ConfigValues {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            spec: ConfigValuesSpec::default(),
        }
    }
}

impl ConfigValues {
    /// Set `name`, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, value: ConfigValue) {
        self.spec.values.insert(name.into(), value);
    }

    /// Look up `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.spec.values.get(name)
    }

    /// Serialize as compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Write the document to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Scratch`] if the file cannot be written.
    pub async fn write_to(&self, path: &Path) -> InstallResult<()> {
        let json = self
            .to_json()
            .map_err(|e| InstallError::ConfigResolution(format!("failed to serialize config values: {e}")))?;

        tokio::fs::write(path, json)
            .await
            .map_err(|source| InstallError::Scratch {
                path: path.to_path_buf(),
                source,
            })?;

        info!(path = %path.display(), values = self.spec.values.len(), "Wrote config values");
        Ok(())
    }
}

/// Database secret payload.
#[derive(Deserialize)]
struct DatabaseSecret {
    password: String,
}

/// Where config values are read from.
#[derive(Clone, Copy)]
pub struct ConfigSources<'a> {
    /// Stack output lookup (already suffixed).
    pub stacks: StackLookup<'a>,
    /// Secret reader for the database secret.
    pub secrets: &'a dyn SecretReader,
    /// AWS region of the deployment.
    pub region: &'a str,
}

/// Build the `ConfigValues` document.
///
/// # Errors
///
/// Returns [`InstallError::ConfigResolution`] if any stack output or the
/// database secret cannot be resolved.
pub async fn build_config_values(sources: &ConfigSources<'_>, ca_pem: &[u8]) -> InstallResult<ConfigValues> {
    let stacks = sources.stacks;
    let region = sources.region;

    let mysql_password = database_password(sources).await?;
    let autoscaler_enabled = stacks
        .resolve(EKS_STACK, "ClusterAutoscalerEnabled", Some("0"))
        .await?;
    let autoscaler_account = if autoscaler_enabled == "1" {
        "cluster-autoscaler"
    } else {
        ""
    };

    let mut config = ConfigValues::default();
    config.insert(
        "hostname",
        ConfigValue::value(stacks.resolve(ACM_STACK, "DomainName", None).await?),
    );
    config.insert("certificate_type", ConfigValue::value("certificate_type_acm"));
    config.insert(
        "acm_arn",
        ConfigValue::value(stacks.resolve(ACM_STACK, "CertificateArn", None).await?),
    );
    config.insert(
        "ingress_controller_service_type",
        ConfigValue::value("ingress_controller_service_type_clusterip"),
    );
    config.insert(
        "ingress_controller_target_group_binding_arn",
        ConfigValue::value(stacks.resolve(ALB_STACK, "AlbTargetGroupArn", None).await?),
    );
    config.insert("pinned_certificate_enabled", ConfigValue::value("1"));
    config.insert(
        "pinned_certificate",
        ConfigValue::file(PINNED_CERT_FILENAME, STANDARD.encode(ca_pem)),
    );
    config.insert(
        "mysql_host",
        ConfigValue::value(stacks.resolve(RDS_STACK, "DatabaseEndpoint", None).await?),
    );
    config.insert(
        "mysql_reader_host",
        ConfigValue::value(stacks.resolve(RDS_STACK, "DatabaseEndpointRO", Some("")).await?),
    );
    config.insert("mysql_user", ConfigValue::value("admin"));
    config.insert("mysql_password", ConfigValue::plaintext(mysql_password));
    config.insert(
        "s3_bucket",
        ConfigValue::value(stacks.resolve(S3_STACK, "UploadBucketName", None).await?),
    );
    config.insert("s3_region", ConfigValue::value(region));
    config.insert("s3_endpoint", ConfigValue::value(format!("s3.{region}.amazonaws.com")));
    config.insert("fileproxy_service_account_name", ConfigValue::value("fileproxy"));
    config.insert("cluster_autoscaler_enabled", ConfigValue::value(autoscaler_enabled));
    config.insert(
        "cluster_autoscaler_service_account",
        ConfigValue::value(autoscaler_account),
    );
    config.insert(
        "cluster_name",
        ConfigValue::value(
            stacks
                .resolve(EKS_STACK, "WickrEnterpriseEksClusterName", None)
                .await?,
        ),
    );
    config.insert("cluster_aws_region", ConfigValue::value(region));
    config.insert(
        "cluster_cloud_provider",
        ConfigValue::value("cluster_cloud_provider_aws"),
    );

    debug!(values = config.spec.values.len(), "Built config values");
    Ok(config)
}

/// Read the database password from the secret published by the RDS stack.
async fn database_password(sources: &ConfigSources<'_>) -> InstallResult<String> {
    let secret_arn = sources
        .stacks
        .resolve(RDS_STACK, "DatabaseSecretArn", None)
        .await?;

    let payload = sources
        .secrets
        .secret_string(&secret_arn)
        .await
        .map_err(|e| InstallError::ConfigResolution(format!("could not read database secret: {e}")))?;

    let secret: DatabaseSecret = serde_json::from_str(&payload).map_err(|e| {
        InstallError::ConfigResolution(format!("database secret has no password field: {e}"))
    })?;

    Ok(secret.password)
}
