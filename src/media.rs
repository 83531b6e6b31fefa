use std::path::Path;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, TransubError};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// ffprobe-backed reader for media metadata.
pub struct MediaProber {
    config: MediaConfig,
}

impl MediaProber {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    /// Total playable duration of a media file, in seconds.
    pub async fn duration_seconds(&self, media_path: &Path) -> Result<f64> {
        debug!("Probing duration of {}", media_path.display());

        let output = Command::new(&self.config.binary_path)
            .arg("-v").arg("quiet")
            .arg("-print_format").arg("json")
            .arg("-show_format")
            .arg(media_path)
            .output()
            .await
            .map_err(|e| TransubError::Media(format!("Failed to execute ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransubError::Media(format!("ffprobe failed: {}", stderr.trim())));
        }

        let probe: ProbeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| TransubError::Media(format!("Failed to parse ffprobe output: {}", e)))?;

        let duration = probe.format.duration.ok_or_else(|| {
            TransubError::Media(format!("No duration reported for {}", media_path.display()))
        })?;

        duration
            .trim()
            .parse::<f64>()
            .map_err(|e| TransubError::Media(format!("Invalid duration '{}': {}", duration, e)))
    }

    /// Check if ffprobe is available
    pub async fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.config.binary_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| TransubError::Media(format!("ffprobe not found: {}", e)))?;

        if output.status.success() {
            info!("ffprobe is available");
            Ok(())
        } else {
            Err(TransubError::Media("ffprobe version check failed".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_output_parses_duration() {
        let json = r#"{"format": {"filename": "talk.mp4", "duration": "6.000000", "size": "12345"}}"#;
        let probe: ProbeOutput = serde_json::from_str(json).unwrap();
        assert_eq!(probe.format.duration.as_deref(), Some("6.000000"));
    }

    #[test]
    fn test_probe_output_tolerates_missing_duration() {
        let json = r#"{"format": {"filename": "stream"}}"#;
        let probe: ProbeOutput = serde_json::from_str(json).unwrap();
        assert!(probe.format.duration.is_none());
    }
}
