use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::DownloadConfig;
use crate::error::{Result, TransubError};

const REMOTE_PREFIX: &str = "https://";

/// A resolved media input: where it lives and whether this run owns the file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    pub path: PathBuf,
    pub transient: bool,
}

/// Fetches a remote URL into a local audio file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PathBuf>;
}

/// Factory for creating downloader instances
pub struct DownloaderFactory;

impl DownloaderFactory {
    /// Create the default downloader implementation (yt-dlp based)
    pub fn create_default(config: DownloadConfig) -> Box<dyn Downloader> {
        Box::new(YtDlpDownloader::new(config))
    }
}

/// yt-dlp based downloader extracting the best audio track as WAV.
pub struct YtDlpDownloader {
    config: DownloadConfig,
}

impl YtDlpDownloader {
    pub fn new(config: DownloadConfig) -> Self {
        Self { config }
    }

    /// Check if the downloader binary is available
    pub async fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.config.binary_path)
            .arg("--version")
            .output()
            .await
            .map_err(|e| TransubError::Download(format!("Downloader not found: {}", e)))?;

        if output.status.success() {
            info!("Downloader is available");
            Ok(())
        } else {
            Err(TransubError::Download("Downloader version check failed".to_string()))
        }
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn fetch(&self, url: &str) -> Result<PathBuf> {
        info!("Downloading from the internet: {}", url);

        let template = format!("{}/%(id)s.%(ext)s", self.config.output_dir);
        let output = Command::new(&self.config.binary_path)
            .arg("-f").arg("bestaudio/best")
            .arg("-x")
            .arg("--audio-format").arg("wav")
            .arg("-o").arg(&template)
            .arg("--no-simulate")
            .arg("--print").arg("after_move:filepath")
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                TransubError::Download(format!(
                    "Failed to execute {}: {}",
                    self.config.binary_path, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransubError::Download(format!(
                "Download failed: {}",
                stderr.trim()
            )));
        }

        // yt-dlp prints the final audio path as the last line of stdout
        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(|line| PathBuf::from(line.trim()))
            .ok_or_else(|| {
                TransubError::Download("Downloader reported no output file".to_string())
            })?;

        debug!("Downloaded: {}", path.display());
        Ok(path)
    }
}

/// Decide whether the input is a local path or a remote URL.
/// Remote inputs go through the downloader and come back marked transient.
pub async fn resolve_source(input: &str, downloader: &dyn Downloader) -> Result<MediaSource> {
    if !input.starts_with(REMOTE_PREFIX) {
        return Ok(MediaSource {
            path: PathBuf::from(input),
            transient: false,
        });
    }

    let path = downloader.fetch(input).await?;
    Ok(MediaSource {
        path,
        transient: true,
    })
}

/// Remove a transient artifact once the pipeline is done with it.
/// Missing files are tolerated; failures are logged and never abort the run.
pub async fn cleanup_source(source: &MediaSource) {
    if !source.transient {
        return;
    }

    info!("Removing transient artifact: {}", source.path.display());
    match tokio::fs::remove_file(&source.path).await {
        Ok(()) => debug!("{} removed", source.path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", source.path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[tokio::test]
    async fn test_local_path_passes_through_untouched() {
        let mut downloader = MockDownloader::new();
        downloader.expect_fetch().times(0);

        let source = resolve_source("talk.mp4", &downloader).await.unwrap();
        assert_eq!(source.path, PathBuf::from("talk.mp4"));
        assert!(!source.transient);
    }

    #[tokio::test]
    async fn test_remote_url_is_fetched_and_marked_transient() {
        let mut downloader = MockDownloader::new();
        downloader
            .expect_fetch()
            .withf(|url| url == "https://example.com/watch?v=abc")
            .times(1)
            .returning(|_| Ok(PathBuf::from("/tmp/abc.wav")));

        let source = resolve_source("https://example.com/watch?v=abc", &downloader)
            .await
            .unwrap();
        assert_eq!(source.path, PathBuf::from("/tmp/abc.wav"));
        assert!(source.transient);
    }

    #[tokio::test]
    async fn test_download_failure_is_fatal() {
        let mut downloader = MockDownloader::new();
        downloader
            .expect_fetch()
            .returning(|_| Err(TransubError::Download("unreachable".to_string())));

        let result = resolve_source("https://example.com/gone", &downloader).await;
        assert!(matches!(result, Err(TransubError::Download(_))));
    }

    #[tokio::test]
    async fn test_cleanup_removes_transient_artifact() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("abc.wav");
        std::fs::write(&artifact, b"audio").unwrap();

        let source = MediaSource {
            path: artifact.clone(),
            transient: true,
        };
        cleanup_source(&source).await;
        assert!(!artifact.exists());
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_file() {
        let source = MediaSource {
            path: PathBuf::from("/nonexistent/abc.wav"),
            transient: true,
        };
        // Idempotent delete: a second run over the same artifact must not fail
        cleanup_source(&source).await;
    }

    #[tokio::test]
    async fn test_cleanup_never_touches_local_inputs() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("talk.mp4");
        std::fs::write(&input, b"video").unwrap();

        let source = MediaSource {
            path: input.clone(),
            transient: false,
        };
        cleanup_source(&source).await;
        assert!(input.exists());
    }
}
