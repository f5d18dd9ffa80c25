//! KOTS release download and verification.
//!
//! The `kots` kubectl plugin is too large to ship with the handler, so each
//! run downloads the pinned release archive, verifies its SHA-256 while
//! streaming, and stages the plugin binary as `kubectl-kots` in the scratch
//! directory.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{InstallError, InstallResult};

/// Pinned KOTS version.
pub const KOTS_VERSION: &str = "1.108.12";

/// SHA-256 of the pinned `kots_linux_amd64.tar.gz`.
pub const KOTS_SHA256: &str = "ef861e5f60da31ee48121c6974aa60cf846653cf34f4155c3d54dcd55cb0f5ad";

/// Release asset name.
pub const KOTS_ASSET: &str = "kots_linux_amd64.tar.gz";

/// Default release download base URL.
pub const KOTS_RELEASES_URL: &str = "https://github.com/replicatedhq/kots/releases/download";

/// Archive entry holding the plugin binary.
pub const ARCHIVE_ENTRY: &str = "kots";

/// Name the plugin is staged under so `kubectl kots` finds it.
pub const PLUGIN_BINARY: &str = "kubectl-kots";

/// Length of a hex-encoded SHA-256 digest.
const SHA256_HEX_LEN: usize = 64;

/// Connect timeout for the release host. The body itself is not time-limited.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// A pinned KOTS release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KotsRelease {
    /// Version without the leading `v`.
    pub version: String,
    /// Release asset name.
    pub asset: String,
    /// Expected lowercase hex SHA-256 of the asset.
    pub sha256: String,
}

impl KotsRelease {
    /// Create a release, validating the expected digest.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::InstallerAcquisition`] unless `sha256` is
    /// exactly 64 hex characters.
    pub fn new(
        version: impl Into<String>,
        asset: impl Into<String>,
        sha256: impl Into<String>,
    ) -> InstallResult<Self> {
        let sha256 = sha256.into().to_ascii_lowercase();
        if sha256.len() != SHA256_HEX_LEN || !sha256.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InstallError::InstallerAcquisition(format!(
                "expected digest must be {SHA256_HEX_LEN} hex characters, got {sha256:?}"
            )));
        }

        Ok(Self {
            version: version.into(),
            asset: asset.into(),
            sha256,
        })
    }

    /// The release this installer is pinned to.
    ///
    /// # Errors
    ///
    /// Returns an error if the pinned digest is malformed.
    pub fn pinned() -> InstallResult<Self> {
        Self::new(KOTS_VERSION, KOTS_ASSET, KOTS_SHA256)
    }

    /// Download URL under `base_url`.
    #[must_use]
    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}/v{}/{}",
            base_url.trim_end_matches('/'),
            self.version,
            self.asset
        )
    }
}

/// Provides the installer binary.
#[async_trait]
pub trait InstallerSource: Send + Sync {
    /// Stage the installer binary in `dest_dir` and return its path.
    async fn acquire(&self, dest_dir: &Path) -> InstallResult<PathBuf>;
}

/// Downloads a [`KotsRelease`] over HTTPS.
#[derive(Debug, Clone)]
pub struct KotsDownloader {
    /// HTTP client.
    client: reqwest::Client,
    /// Release to download.
    release: KotsRelease,
    /// Release download base URL.
    base_url: String,
}

impl KotsDownloader {
    /// Create a downloader for `release`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(release: KotsRelease) -> InstallResult<Self> {
        Self::with_connect_timeout(release, Duration::from_secs(CONNECT_TIMEOUT_SECS))
    }

    /// Create a downloader that gives up if the host cannot be reached within
    /// `connect_timeout`. Transferring the archive has no deadline.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_connect_timeout(release: KotsRelease, connect_timeout: Duration) -> InstallResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| InstallError::InstallerAcquisition(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            release,
            base_url: KOTS_RELEASES_URL.to_string(),
        })
    }

    /// Use a different download base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Stream the archive to `archive_path`, returning its hex SHA-256.
    async fn download(&self, archive_path: &Path) -> InstallResult<String> {
        let url = self.release.url(&self.base_url);
        info!(url = %url, "Downloading kots release");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| InstallError::InstallerAcquisition(format!("GET {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InstallError::InstallerAcquisition(format!(
                "GET {url} returned {status}"
            )));
        }

        let mut file = tokio::fs::File::create(archive_path)
            .await
            .map_err(|e| acquisition_io("create", archive_path, &e))?;
        let mut hasher = Sha256::new();
        let mut size = 0usize;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| InstallError::InstallerAcquisition(format!("reading {url} failed: {e}")))?;
            hasher.update(&chunk);
            size += chunk.len();
            file.write_all(&chunk)
                .await
                .map_err(|e| acquisition_io("write", archive_path, &e))?;
        }
        file.flush()
            .await
            .map_err(|e| acquisition_io("flush", archive_path, &e))?;

        debug!(bytes = size, "Download complete");
        Ok(hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl InstallerSource for KotsDownloader {
    async fn acquire(&self, dest_dir: &Path) -> InstallResult<PathBuf> {
        let archive_path = dest_dir.join(&self.release.asset);
        let binary_path = dest_dir.join(PLUGIN_BINARY);

        // Never reuse a binary staged by an earlier run.
        remove_if_exists(&binary_path).await?;

        let actual = match self.download(&archive_path).await {
            Ok(digest) => digest,
            Err(e) => {
                let _ = tokio::fs::remove_file(&archive_path).await;
                return Err(e);
            }
        };

        if actual != self.release.sha256 {
            warn!(expected = %self.release.sha256, actual = %actual, "Checksum mismatch");
            let _ = tokio::fs::remove_file(&archive_path).await;
            return Err(InstallError::Integrity {
                expected: self.release.sha256.clone(),
                actual,
            });
        }

        let archive = archive_path.clone();
        let dest = dest_dir.to_path_buf();
        let staged = tokio::task::spawn_blocking(move || stage_binary(&archive, &dest))
            .await
            .map_err(|e| InstallError::InstallerAcquisition(format!("extraction task failed: {e}")))?;

        let _ = tokio::fs::remove_file(&archive_path).await;
        let staged = staged?;

        info!(
            version = %self.release.version,
            path = %staged.display(),
            "Staged kots plugin"
        );
        Ok(staged)
    }
}

/// Extract [`ARCHIVE_ENTRY`] from the tarball and stage it as [`PLUGIN_BINARY`].
fn stage_binary(archive_path: &Path, dest_dir: &Path) -> InstallResult<PathBuf> {
    let file = File::open(archive_path).map_err(|e| acquisition_io("open", archive_path, &e))?;
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));

    let extracted = dest_dir.join(ARCHIVE_ENTRY);
    let mut found = false;

    let entries = archive
        .entries()
        .map_err(|e| InstallError::InstallerAcquisition(format!("failed to read archive: {e}")))?;
    for entry in entries {
        let mut entry = entry
            .map_err(|e| InstallError::InstallerAcquisition(format!("failed to read archive entry: {e}")))?;
        let is_target = entry
            .path()
            .is_ok_and(|p| &*p == Path::new(ARCHIVE_ENTRY));
        if is_target {
            entry
                .unpack(&extracted)
                .map_err(|e| acquisition_io("extract", &extracted, &e))?;
            found = true;
            break;
        }
    }

    if !found {
        return Err(InstallError::InstallerAcquisition(format!(
            "archive has no entry named {ARCHIVE_ENTRY}"
        )));
    }

    let binary = dest_dir.join(PLUGIN_BINARY);
    std::fs::rename(&extracted, &binary).map_err(|e| acquisition_io("rename", &extracted, &e))?;
    make_executable(&binary)?;
    Ok(binary)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> InstallResult<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| acquisition_io("chmod", path, &e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> InstallResult<()> {
    Ok(())
}

async fn remove_if_exists(path: &Path) -> InstallResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed previously staged binary");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(acquisition_io("remove", path, &e)),
    }
}

fn acquisition_io(action: &str, path: &Path, err: &std::io::Error) -> InstallError {
    InstallError::InstallerAcquisition(format!("failed to {action} {}: {err}", path.display()))
}
