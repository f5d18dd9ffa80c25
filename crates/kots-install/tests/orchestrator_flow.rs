//! End-to-end orchestrator runs against in-memory collaborators.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use kots_install::aws::StackOutput;
use kots_install::{
    AwsError, ClusterLister, Collaborators, CommandSpec, InstallError, InstallResult,
    InstallerConfig, InstallerSource, InvocationContext, ObjectFetcher, ObjectLocation,
    ObjectLocationConfig, Orchestrator, ProcessError, ProcessOutput, ProcessRunner, RunOutcome,
    SecretReader, StackOutputResolver,
};

type CallLog = Arc<Mutex<Vec<String>>>;

fn record(log: &CallLog, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

struct FakeAws {
    log: CallLog,
    clusters: Option<Vec<String>>,
    objects: HashMap<String, Vec<u8>>,
    stacks: HashMap<String, Vec<StackOutput>>,
    secrets: HashMap<String, String>,
}

impl FakeAws {
    fn new(log: CallLog, clusters: &[&str]) -> Self {
        let mut aws = Self {
            log,
            clusters: Some(clusters.iter().map(ToString::to_string).collect()),
            objects: HashMap::new(),
            stacks: HashMap::new(),
            secrets: HashMap::new(),
        };
        aws.objects
            .insert("licenses/wickr.yaml".into(), b"apiVersion: kots.io/v1beta1\n".to_vec());
        aws.objects.insert("certs/ca.pem".into(), b"CA".to_vec());
        for (stack, key, value) in [
            ("WickrRds-staging", "DatabaseSecretArn", "arn:aws:secretsmanager:db"),
            ("WickrRds-staging", "DatabaseEndpoint", "db.internal"),
            ("WickrAcm-staging", "DomainName", "example.com"),
            ("WickrAcm-staging", "CertificateArn", "arn:acm:cert"),
            ("WickrAlb-staging", "AlbTargetGroupArn", "arn:elb:tg"),
            ("WickrS3-staging", "UploadBucketName", "uploads"),
            ("WickrEks-staging", "WickrEnterpriseEksClusterName", "wickr"),
            ("WickrEks-staging", "ClusterAutoscalerEnabled", "1"),
        ] {
            aws.stacks
                .entry(stack.to_string())
                .or_default()
                .push(StackOutput::new(key, value));
        }
        aws.secrets
            .insert("arn:aws:secretsmanager:db".into(), r#"{"password":"p1"}"#.into());
        aws.secrets.insert("wickr/kots".into(), "admin-pw".into());
        aws
    }

    fn object(&self, location: &ObjectLocation) -> Result<Vec<u8>, AwsError> {
        self.objects
            .get(&format!("{}/{}", location.bucket, location.key))
            .cloned()
            .ok_or_else(|| AwsError::NotFound(location.uri()))
    }
}

#[async_trait]
impl ClusterLister for FakeAws {
    async fn list_clusters(&self) -> Result<Vec<String>, AwsError> {
        record(&self.log, "list_clusters");
        self.clusters
            .clone()
            .ok_or_else(|| AwsError::NotFound("eks".into()))
    }
}

#[async_trait]
impl ObjectFetcher for FakeAws {
    async fn get_object(&self, location: &ObjectLocation) -> Result<Vec<u8>, AwsError> {
        record(&self.log, format!("get_object:{}/{}", location.bucket, location.key));
        self.object(location)
    }

    async fn download(&self, location: &ObjectLocation, dest: &Path) -> Result<(), AwsError> {
        record(&self.log, format!("download:{}/{}", location.bucket, location.key));
        let bytes = self.object(location)?;
        tokio::fs::write(dest, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl SecretReader for FakeAws {
    async fn secret_string(&self, secret_id: &str) -> Result<String, AwsError> {
        record(&self.log, format!("secret:{secret_id}"));
        self.secrets
            .get(secret_id)
            .cloned()
            .ok_or_else(|| AwsError::NotFound(secret_id.to_string()))
    }
}

#[async_trait]
impl StackOutputResolver for FakeAws {
    async fn stack_outputs(&self, stack_name: &str) -> Result<Option<Vec<StackOutput>>, AwsError> {
        self.stacks
            .get(stack_name)
            .cloned()
            .map(Some)
            .ok_or_else(|| AwsError::NotFound(stack_name.to_string()))
    }
}

struct FakeInstaller {
    log: CallLog,
    corrupt: bool,
}

#[async_trait]
impl InstallerSource for FakeInstaller {
    async fn acquire(&self, dest_dir: &Path) -> InstallResult<PathBuf> {
        record(&self.log, "acquire");
        if self.corrupt {
            return Err(InstallError::Integrity {
                expected: "a".repeat(64),
                actual: "b".repeat(64),
            });
        }
        let path = dest_dir.join("kubectl-kots");
        tokio::fs::write(&path, b"#!/bin/sh\n").await.unwrap();
        Ok(path)
    }
}

/// Writes the kubeconfig `aws eks update-kubeconfig` would produce.
struct FakeRunner {
    log: CallLog,
    install_password: Mutex<Option<String>>,
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, command: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        let args = command.arguments();
        if args.iter().any(|a| a == "update-kubeconfig") {
            record(&self.log, "update-kubeconfig");
            let path = command.value_after("--kubeconfig").unwrap();
            std::fs::write(path, "apiVersion: v1\nkind: Config\n").unwrap();
        } else if args.first().map(String::as_str) == Some("kots") {
            record(&self.log, "kots install");
            *self.install_password.lock().unwrap() =
                command.value_after("--shared-password").map(str::to_string);
        } else {
            record(&self.log, format!("unexpected:{command}"));
        }
        Ok(ProcessOutput::ok(""))
    }
}

struct Harness {
    log: CallLog,
    runner: Arc<FakeRunner>,
    orchestrator: Orchestrator,
    _scratch: tempfile::TempDir,
}

fn harness(aws: impl FnOnce(CallLog) -> FakeAws, corrupt: bool) -> Harness {
    let scratch = tempfile::tempdir().unwrap();
    let log = CallLog::default();

    let mut config = InstallerConfig::with_defaults(
        "wickr",
        "arn:aws:iam::1:role/admin",
        "wickr/kots",
        ObjectLocationConfig {
            bucket: "licenses".into(),
            key: "wickr.yaml".into(),
        },
        ObjectLocationConfig {
            bucket: "certs".into(),
            key: "ca.pem".into(),
        },
    );
    config.stack_suffix = "-staging".into();
    config.scratch_dir = scratch.path().join("work");

    let aws = Arc::new(aws(log.clone()));
    let runner = Arc::new(FakeRunner {
        log: log.clone(),
        install_password: Mutex::new(None),
    });
    let deps = Collaborators {
        clusters: aws.clone(),
        objects: aws.clone(),
        secrets: aws.clone(),
        stacks: aws,
        installer: Arc::new(FakeInstaller {
            log: log.clone(),
            corrupt,
        }),
        runner: runner.clone(),
    };

    Harness {
        log,
        runner,
        orchestrator: Orchestrator::new(config, deps),
        _scratch: scratch,
    }
}

fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn present_cluster_runs_every_step_in_order() {
    let h = harness(|log| FakeAws::new(log, &["dev", "wickr"]), false);

    let outcome = h
        .orchestrator
        .run(&json!({"RequestType": "Create"}), &InvocationContext::new())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Installed {
            cluster: "wickr".into()
        }
    );
    assert_eq!(
        calls(&h.log),
        [
            "list_clusters",
            "download:licenses/wickr.yaml",
            "get_object:certs/ca.pem",
            "secret:arn:aws:secretsmanager:db",
            "acquire",
            "secret:wickr/kots",
            "update-kubeconfig",
            "kots install",
        ]
    );
    assert_eq!(
        h.runner.install_password.lock().unwrap().as_deref(),
        Some("admin-pw")
    );

    let config = h.orchestrator.config();
    let license = std::fs::read_to_string(config.license_path()).unwrap();
    assert!(license.starts_with("apiVersion"));

    let values: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(config.config_values_path()).unwrap())
            .unwrap();
    assert_eq!(values["spec"]["values"]["mysql_password"]["valuePlaintext"], "p1");
    assert_eq!(values["spec"]["values"]["hostname"]["value"], "example.com");
    assert_eq!(values["spec"]["values"]["pinned_certificate"]["value"], "Q0E=");
    assert_eq!(
        values["spec"]["values"]["cluster_autoscaler_service_account"]["value"],
        "cluster-autoscaler"
    );

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mode = std::fs::metadata(config.kubeconfig_path("wickr"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test]
async fn absent_cluster_is_reported_and_nothing_else_runs() {
    let h = harness(|log| FakeAws::new(log, &["dev", "prod"]), false);

    let outcome = h
        .orchestrator
        .run(&json!({}), &InvocationContext::new())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::TargetNotFound {
            cluster: "wickr".into(),
            available: vec!["dev".into(), "prod".into()],
        }
    );
    assert_eq!(calls(&h.log), ["list_clusters"]);
    assert!(!h.orchestrator.config().config_values_path().exists());
}

#[tokio::test]
async fn cluster_listing_failure_is_a_platform_error() {
    let h = harness(
        |log| {
            let mut aws = FakeAws::new(log, &[]);
            aws.clusters = None;
            aws
        },
        false,
    );

    let err = h
        .orchestrator
        .run(&json!({}), &InvocationContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::PlatformQuery(_)));
    assert_eq!(calls(&h.log), ["list_clusters"]);
}

#[tokio::test]
async fn integrity_failure_stops_before_credentials() {
    let h = harness(|log| FakeAws::new(log, &["wickr"]), true);

    let err = h
        .orchestrator
        .run(&json!({}), &InvocationContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::Integrity { .. }));
    let calls = calls(&h.log);
    assert_eq!(calls.last().map(String::as_str), Some("acquire"));
    assert!(!calls.iter().any(|c| c == "update-kubeconfig" || c == "kots install"));
}

#[tokio::test]
async fn missing_stack_output_aborts_before_download() {
    let h = harness(
        |log| {
            let mut aws = FakeAws::new(log, &["wickr"]);
            aws.stacks.remove("WickrAcm-staging");
            aws
        },
        false,
    );

    let err = h
        .orchestrator
        .run(&json!({}), &InvocationContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::ConfigResolution(_)));
    assert!(err.to_string().contains("WickrAcm-staging"));
    assert!(!calls(&h.log).iter().any(|c| c == "acquire"));
}
