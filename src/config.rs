use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, TransubError};

fn default_fallback_language() -> String {
    "en".to_string()
}

fn default_wrap_width() -> usize {
    42
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub recognizer: RecognizerConfig,
    pub translate: TranslateConfig,
    pub download: DownloadConfig,
    pub convert: ConvertConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerConfig {
    /// Path to the recognition binary (whisper-ctranslate2)
    pub binary_path: String,
    /// Model identifier passed to the engine
    pub model: String,
    /// Compute device (cuda, cpu, auto)
    pub device: String,
    /// Floating point precision for inference
    pub compute_type: String,
    /// Minimum silence duration for VAD filtering (milliseconds)
    pub vad_min_silence_ms: u64,
    /// Language reported when the engine prints no detection line
    #[serde(default = "default_fallback_language")]
    pub fallback_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    /// LLM model to use for translation
    pub model: String,
    /// Maximum line width when re-wrapping translated subtitles
    #[serde(default = "default_wrap_width")]
    pub wrap_width: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Path to the downloader binary (yt-dlp)
    pub binary_path: String,
    /// Directory for downloaded audio artifacts
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Path to the opencc binary
    pub binary_path: String,
    /// OpenCC conversion profile (Taiwan standard with vocabulary substitution)
    pub profile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to the ffprobe binary
    pub binary_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recognizer: RecognizerConfig {
                binary_path: "whisper-ctranslate2".to_string(),
                model: "large-v2".to_string(),
                device: "cuda".to_string(),
                compute_type: "float16".to_string(),
                vad_min_silence_ms: 500,
                fallback_language: "en".to_string(),
            },
            translate: TranslateConfig {
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3.2:3b".to_string(),
                wrap_width: 42,
            },
            download: DownloadConfig {
                binary_path: "yt-dlp".to_string(),
                output_dir: "/tmp".to_string(),
            },
            convert: ConvertConfig {
                binary_path: "opencc".to_string(),
                profile: "s2twp.json".to_string(),
            },
            media: MediaConfig {
                binary_path: "ffprobe".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TransubError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| TransubError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TransubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TransubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(parsed.recognizer.model, "large-v2");
        assert_eq!(parsed.recognizer.vad_min_silence_ms, 500);
        assert_eq!(parsed.translate.endpoint, "http://localhost:11434");
        assert_eq!(parsed.convert.profile, "s2twp.json");
    }

    #[test]
    fn test_missing_optional_fields_use_defaults() {
        let toml_str = r#"
            [recognizer]
            binary_path = "whisper-ctranslate2"
            model = "medium"
            device = "cpu"
            compute_type = "int8"
            vad_min_silence_ms = 300

            [translate]
            endpoint = "http://localhost:11434"
            model = "llama3.2:3b"

            [download]
            binary_path = "yt-dlp"
            output_dir = "/tmp"

            [convert]
            binary_path = "opencc"
            profile = "s2twp.json"

            [media]
            binary_path = "ffprobe"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.recognizer.fallback_language, "en");
        assert_eq!(config.translate.wrap_width, 42);
    }
}
