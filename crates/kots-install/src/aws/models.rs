//! `aws --output json` response models.

use serde::{Deserialize, Serialize};

// ============================================================================
// EKS types
// ============================================================================

/// `aws eks list-clusters` output.
#[derive(Debug, Clone, Deserialize)]
pub struct ListClustersOutput {
    /// Cluster names.
    #[serde(default)]
    pub clusters: Vec<String>,
}

// ============================================================================
// CloudFormation types
// ============================================================================

/// `aws cloudformation describe-stacks` output.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeStacksOutput {
    /// Matching stacks.
    #[serde(default)]
    pub stacks: Vec<Stack>,
}

/// A CloudFormation stack.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stack {
    /// Stack name.
    pub stack_name: String,
    /// Published outputs, absent when the stack declares none.
    pub outputs: Option<Vec<StackOutput>>,
}

/// A single stack output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackOutput {
    /// Output key.
    pub output_key: String,
    /// Output value.
    pub output_value: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StackOutput {
    /// Create an output without a description.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            output_key: key.into(),
            output_value: value.into(),
            description: None,
        }
    }
}

// ============================================================================
// Secrets Manager types
// ============================================================================

/// `aws secretsmanager get-secret-value` output.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetSecretValueOutput {
    /// Secret name.
    pub name: Option<String>,
    /// String payload; binary secrets leave this unset.
    pub secret_string: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_stacks_parsing() {
        let json = r#"{
            "Stacks": [{
                "StackId": "arn:aws:cloudformation:us-east-1:1:stack/WickrAcm/abc",
                "StackName": "WickrAcm",
                "StackStatus": "CREATE_COMPLETE",
                "Outputs": [
                    {"OutputKey": "DomainName", "OutputValue": "example.com"},
                    {"OutputKey": "CertificateArn", "OutputValue": "arn:acm:1", "Description": "cert"}
                ]
            }]
        }"#;

        let parsed: DescribeStacksOutput = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.stacks.len(), 1);
        let outputs = parsed.stacks[0].outputs.as_ref().unwrap();
        assert_eq!(outputs[0], StackOutput::new("DomainName", "example.com"));
        assert_eq!(outputs[1].description.as_deref(), Some("cert"));
    }

    #[test]
    fn test_stack_without_outputs() {
        let json = r#"{"Stacks": [{"StackName": "WickrS3"}]}"#;
        let parsed: DescribeStacksOutput = serde_json::from_str(json).unwrap();
        assert!(parsed.stacks[0].outputs.is_none());
    }

    #[test]
    fn test_secret_value_parsing() {
        let json = r#"{"ARN": "arn:sm:1", "Name": "wickr/kots", "SecretString": "s3cret"}"#;
        let parsed: GetSecretValueOutput = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.name.as_deref(), Some("wickr/kots"));
        assert_eq!(parsed.secret_string.as_deref(), Some("s3cret"));
    }
}
