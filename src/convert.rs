use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ConvertConfig;
use crate::error::{Result, TransubError};

/// Converts raw text between Chinese script variants.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScriptConvert: Send + Sync {
    async fn convert(&self, text: &str) -> Result<String>;
}

/// Factory for creating script converter instances
pub struct ScriptConverterFactory;

impl ScriptConverterFactory {
    /// Create the default converter implementation (OpenCC based)
    pub fn create_default(config: ConvertConfig) -> Box<dyn ScriptConvert> {
        Box::new(OpenCcConverter::new(config))
    }
}

/// OpenCC based converter. The Taiwan profile rewrites both character forms
/// and regional vocabulary.
pub struct OpenCcConverter {
    config: ConvertConfig,
}

impl OpenCcConverter {
    pub fn new(config: ConvertConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ScriptConvert for OpenCcConverter {
    async fn convert(&self, text: &str) -> Result<String> {
        debug!("Converting {} bytes with profile {}", text.len(), self.config.profile);

        let mut child = Command::new(&self.config.binary_path)
            .arg("-c").arg(&self.config.profile)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TransubError::Conversion(format!(
                    "Failed to execute {}: {}",
                    self.config.binary_path, e
                ))
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            TransubError::Conversion("Failed to open converter stdin".to_string())
        })?;
        stdin
            .write_all(text.as_bytes())
            .await
            .map_err(|e| TransubError::Conversion(format!("Failed to feed converter: {}", e)))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TransubError::Conversion(format!("Converter failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransubError::Conversion(format!(
                "Converter exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| TransubError::Conversion(format!("Converter produced invalid UTF-8: {}", e)))
    }
}

/// Convert a whole subtitle file between script variants.
///
/// Operates on the raw SRT text; the converter is format-agnostic and timing
/// lines are numeric, so they pass through untouched.
pub async fn convert_subtitle_file(
    converter: &dyn ScriptConvert,
    input_path: &Path,
    output_path: &Path,
) -> Result<()> {
    info!(
        "Converting Simplified Chinese to Traditional Chinese: {}",
        output_path.display()
    );

    let text = tokio::fs::read_to_string(input_path).await.map_err(|e| {
        TransubError::Conversion(format!("Failed to read {}: {}", input_path.display(), e))
    })?;

    let converted = converter.convert(&text).await?;

    tokio::fs::write(output_path, converted).await.map_err(|e| {
        TransubError::Conversion(format!("Failed to write {}: {}", output_path.display(), e))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_convert_subtitle_file_writes_converted_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("talk.zh.srt");
        let output = dir.path().join("talk.zh-tw.srt");
        std::fs::write(&input, "1\n00:00:00,000 --> 00:00:02,000\n软件\n\n").unwrap();

        let mut converter = MockScriptConvert::new();
        converter
            .expect_convert()
            .times(1)
            .returning(|text| Ok(text.replace("软件", "軟體")));

        convert_subtitle_file(&converter, &input, &output)
            .await
            .unwrap();

        let converted = std::fs::read_to_string(&output).unwrap();
        assert!(converted.contains("軟體"));
        // Timing lines pass through the text transform untouched
        assert!(converted.contains("00:00:00,000 --> 00:00:02,000"));
    }

    #[tokio::test]
    async fn test_missing_input_file_is_an_error() {
        let dir = tempdir().unwrap();
        let converter = MockScriptConvert::new();

        let result = convert_subtitle_file(
            &converter,
            &dir.path().join("missing.srt"),
            &dir.path().join("out.srt"),
        )
        .await;

        assert!(matches!(result, Err(TransubError::Conversion(_))));
    }
}
