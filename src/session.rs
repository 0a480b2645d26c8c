//! Session state shared by every command.
//!
//! A session owns the loaded dataset and the archive preload. The dataset
//! is read once on a blocking thread; the archive is read in the
//! background and only awaited by the download command.

use crate::config::Config;
use crate::error::AssetError;
use crate::models::Dataset;
use crate::store;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Progress of the background archive read.
#[derive(Debug, Clone)]
pub enum ArchiveState {
    Loading,
    Ready(Arc<Vec<u8>>),
    Missing(PathBuf),
    Failed(String),
}

/// Handle on the background archive read.
#[derive(Debug, Clone)]
pub struct ArchivePreload {
    rx: watch::Receiver<ArchiveState>,
}

impl ArchivePreload {
    /// Start reading `path` in the background.
    pub fn spawn(path: PathBuf) -> Self {
        let (tx, rx) = watch::channel(ArchiveState::Loading);

        tokio::spawn(async move {
            let state = match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    info!("Archive loaded: {} ({} bytes)", path.display(), bytes.len());
                    ArchiveState::Ready(Arc::new(bytes))
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("Archive not found: {}", path.display());
                    ArchiveState::Missing(path)
                }
                Err(e) => {
                    warn!("Failed to read archive {}: {}", path.display(), e);
                    ArchiveState::Failed(e.to_string())
                }
            };
            // Nobody listening is fine.
            let _ = tx.send(state);
        });

        Self { rx }
    }

    /// An already settled preload.
    #[cfg(test)]
    pub fn settled(state: ArchiveState) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self { rx }
    }

    /// Wait up to `timeout` for the read to finish.
    pub async fn wait(&self, timeout: Duration) -> Result<Arc<Vec<u8>>, AssetError> {
        let mut rx = self.rx.clone();
        let waited =
            tokio::time::timeout(timeout, rx.wait_for(|s| !matches!(s, ArchiveState::Loading)))
                .await;

        let state = match waited {
            Err(_) => return Err(AssetError::ArchiveNotReady(timeout)),
            Ok(Err(_)) => {
                return Err(AssetError::ArchiveUnreadable(
                    "background read stopped".to_string(),
                ))
            }
            Ok(Ok(state)) => state.clone(),
        };

        match state {
            ArchiveState::Ready(bytes) => Ok(bytes),
            ArchiveState::Missing(path) => Err(AssetError::ArchiveMissing(path.display().to_string())),
            ArchiveState::Failed(e) => Err(AssetError::ArchiveUnreadable(e)),
            ArchiveState::Loading => Err(AssetError::ArchiveNotReady(timeout)),
        }
    }
}

/// Everything a command handler can see.
pub struct Session {
    pub config: Config,
    pub dataset: Arc<Dataset>,
    pub archive: ArchivePreload,
}

impl Session {
    /// Load the dataset and start the archive preload.
    pub async fn open(config: Config, show_progress: bool) -> Result<Self> {
        let archive = ArchivePreload::spawn(config.data.archive.clone());
        let dataset = load_with_spinner(&config.data.database, show_progress).await?;

        Ok(Self {
            config,
            dataset: Arc::new(dataset),
            archive,
        })
    }

    #[cfg(test)]
    pub fn from_parts(config: Config, dataset: Dataset, archive: ArchivePreload) -> Self {
        Self {
            config,
            dataset: Arc::new(dataset),
            archive,
        }
    }
}

async fn load_with_spinner(path: &Path, show_progress: bool) -> Result<Dataset> {
    let spinner = if show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Loading {}", path.display()));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let owned = path.to_path_buf();
    let dataset = blocking_with_spinner(spinner, move || store::load_dataset(&owned)).await;
    debug!("Dataset load finished");
    dataset
}

/// Run `work` on a blocking thread. The spinner is cleared however the
/// work ends, including a panic.
async fn blocking_with_spinner<T, F>(spinner: Option<ProgressBar>, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let joined = tokio::task::spawn_blocking(work).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    joined.context("Dataset loader panicked")?
}
