//! The install pipeline: resolve → download → install.
//!
//! ```text
//! Idle -> Resolving -> Downloading -> Installing -> Done
//!            \             \              \
//!             +-------------+--------------+--> Failed
//! ```
//!
//! Stages run strictly one after another and nothing is retried. The target
//! directory is created only once the artifact is fully on disk, so a failed
//! resolve or download never leaves a directory behind. A failed extraction
//! leaves the directory in place for inspection.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{BearerCredential, GravityConfig};
use crate::downloader::Downloader;
use crate::http::{HttpClient, HttpClientConfig};
use crate::installer::ArchiveInstaller;
use crate::registry::{Registry, LATEST_TAG};
use crate::{GravityError, Result};

/// File name of the downloaded artifact inside the temporary directory
const ARCHIVE_FILE_NAME: &str = "package.tgz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Resolving,
    Downloading,
    Installing,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Resolving => "resolving",
            Stage::Downloading => "downloading",
            Stage::Installing => "installing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Progress notifications emitted while the pipeline runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Stage(Stage),
    Resolved { version: String, tarball: String },
    Downloading { downloaded: u64, total: u64 },
    Extracting { target_dir: PathBuf },
}

/// Validated input: an application name whose folder does not exist yet.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    app_name: String,
    target_dir: PathBuf,
}

impl InstallRequest {
    /// Validate `app_name` relative to `base_dir`.
    pub fn new(app_name: &str, base_dir: &Path) -> Result<Self> {
        if app_name.trim().is_empty() {
            return Err(GravityError::Usage("application name must not be empty".to_string()));
        }

        let target_dir = base_dir.join(app_name);

        // symlink_metadata so that dangling symlinks also count as taken
        if target_dir.symlink_metadata().is_ok() {
            return Err(GravityError::TargetExists {
                path: PathBuf::from(app_name),
            });
        }

        Ok(Self {
            app_name: app_name.to_string(),
            target_dir,
        })
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    pub version: String,
    pub target_dir: PathBuf,
}

pub struct Pipeline {
    registry: Registry,
    downloader: Downloader,
    package: String,
    tag: String,
}

impl Pipeline {
    pub fn new(http_client: Arc<HttpClient>, registry_url: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            registry: Registry::new(Arc::clone(&http_client), registry_url),
            downloader: Downloader::new(http_client),
            package: package.into(),
            tag: LATEST_TAG.to_string(),
        }
    }

    /// Wire a pipeline from the user's config.
    ///
    /// The license key, when present, is bound to the registry host.
    pub fn from_config(config: &GravityConfig, http_config: HttpClientConfig) -> Result<Self> {
        let mut http_config = http_config;
        if let Some(key) = config.license_key() {
            http_config = http_config.with_credential(BearerCredential::for_registry(config.registry_url(), key)?);
        }

        let http_client = HttpClient::with_config(http_config)?;
        Ok(Self::new(Arc::new(http_client), config.registry_url(), config.package()))
    }

    /// Resolve a dist-tag other than `latest`
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn registry_url(&self) -> &str {
        self.registry.base_url()
    }

    pub async fn run(&self, request: InstallRequest) -> Result<Installed> {
        self.run_with_progress(request, |_| {}).await
    }

    pub async fn run_with_progress<F>(&self, request: InstallRequest, on_event: F) -> Result<Installed>
    where
        F: Fn(&PipelineEvent),
    {
        let mut stage = Stage::Idle;

        enter(&mut stage, Stage::Resolving, &on_event);
        let resolved = self
            .registry
            .resolve_tag(&self.package, &self.tag)
            .await
            .map_err(|e| fail(stage, e.into(), &on_event))?;

        on_event(&PipelineEvent::Resolved {
            version: resolved.version.clone(),
            tarball: resolved.tarball.clone(),
        });

        enter(&mut stage, Stage::Downloading, &on_event);
        let temp_dir = tempfile::Builder::new()
            .prefix("gravity-")
            .tempdir()
            .map_err(|e| fail(stage, e.into(), &on_event))?;
        let archive_path = temp_dir.path().join(ARCHIVE_FILE_NAME);

        // On error the TempDir guard is dropped here, removing the directory
        self.downloader
            .download(
                &resolved.tarball,
                &archive_path,
                Some(|downloaded, total| on_event(&PipelineEvent::Downloading { downloaded, total })),
            )
            .await
            .map_err(|e| fail(stage, e.into(), &on_event))?;

        enter(&mut stage, Stage::Installing, &on_event);
        let target_dir = request.target_dir();
        if let Err(e) = tokio::fs::create_dir(target_dir).await {
            let err = if e.kind() == std::io::ErrorKind::AlreadyExists {
                GravityError::TargetExists {
                    path: PathBuf::from(request.app_name()),
                }
            } else {
                GravityError::Io(e)
            };
            return Err(fail(stage, err, &on_event));
        }

        on_event(&PipelineEvent::Extracting {
            target_dir: target_dir.to_path_buf(),
        });
        let extracted = ArchiveInstaller::install(&archive_path, target_dir).await;

        let temp_path = temp_dir.path().to_path_buf();
        if let Err(e) = temp_dir.close() {
            log::warn!("Could not remove temporary directory {}: {}", temp_path.display(), e);
        }

        extracted.map_err(|e| fail(stage, e, &on_event))?;

        enter(&mut stage, Stage::Done, &on_event);
        Ok(Installed {
            version: resolved.version,
            target_dir: target_dir.to_path_buf(),
        })
    }
}

fn enter<F: Fn(&PipelineEvent)>(stage: &mut Stage, next: Stage, on_event: &F) {
    log::debug!("Pipeline {} -> {}", stage, next);
    *stage = next;
    on_event(&PipelineEvent::Stage(next));
}

fn fail<F: Fn(&PipelineEvent)>(stage: Stage, err: GravityError, on_event: &F) -> GravityError {
    log::debug!("Pipeline failed while {}: {}", stage, err);
    on_event(&PipelineEvent::Stage(Stage::Failed));
    err
}
