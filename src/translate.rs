use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::{ConvertConfig, TranslateConfig};
use crate::convert::{convert_subtitle_file, ScriptConvert, ScriptConverterFactory};
use crate::error::{Result, TransubError};
use crate::subtitle::SubtitleDocument;

/// Destination tags that translate as base Chinese and then convert the
/// script to the Taiwan standard.
const TRADITIONAL_CHINESE_ALIASES: [&str; 2] = ["zh-tw", "zh_tw"];

/// Destination language after alias normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageTarget {
    pub raw_tag: String,
    pub translation_tag: String,
    pub needs_script_conversion: bool,
}

impl LanguageTarget {
    /// Normalize a user-supplied destination tag. Alias matching is
    /// case-insensitive; unrecognized tags pass through unchanged.
    pub fn parse(raw_tag: &str) -> Self {
        let lowered = raw_tag.to_lowercase();
        if TRADITIONAL_CHINESE_ALIASES.contains(&lowered.as_str()) {
            Self {
                raw_tag: raw_tag.to_string(),
                translation_tag: "zh".to_string(),
                needs_script_conversion: true,
            }
        } else {
            Self {
                raw_tag: raw_tag.to_string(),
                translation_tag: raw_tag.to_string(),
                needs_script_conversion: false,
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub response: String,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub text: String,
}

/// Main trait for translation operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate one subtitle line from the source to the target language
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String>;

    /// Release the translation session; must run on every exit path
    async fn release(&self) -> Result<()>;
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    /// Create the default translator implementation (Ollama based)
    pub fn create_default(config: TranslateConfig) -> Box<dyn Translator> {
        Box::new(OllamaTranslator::new(config))
    }
}

pub struct OllamaTranslator {
    client: Client,
    config: TranslateConfig,
}

impl OllamaTranslator {
    pub fn new(config: TranslateConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300)) // 5 minute timeout
            .build()
            .expect("HTTP client creation should not fail");

        Self { client, config }
    }

    fn build_translation_prompt(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> String {
        let source_name = language_code_to_name(source_language);
        let target_name = language_code_to_name(target_language);

        format!(
            "You are a professional translator.\n\
             \n\
             CRITICAL: You must translate the text from {} to {} ONLY. Do not translate to any other language.\n\
             The target language is: {} (language code: {})\n\
             \n\
             Return ONLY the translation in JSON format as {{\"text\":\"your {} translation here\"}}.\n\
             Do not include any explanations, alternatives, or text in other languages.\n\
             \n\
             Text to translate:\n\
             {}",
            source_name, target_name, target_name, target_language, target_name, text
        )
    }
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String> {
        let request = TranslationRequest {
            model: self.config.model.clone(),
            prompt: self.build_translation_prompt(text, source_language, target_language),
            stream: false,
            format: "json".to_string(),
        };

        let url = format!("{}/api/generate", self.config.endpoint);

        debug!("Sending translation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TransubError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TransubError::Translation(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let translation_response: TranslationResponse = response
            .json()
            .await
            .map_err(|e| TransubError::Translation(format!("Failed to parse response: {}", e)))?;

        let raw_response = translation_response.response.trim().to_string();

        if raw_response.is_empty() {
            return Err(TransubError::Translation(
                "Empty translation received".to_string(),
            ));
        }

        if let Ok(result) = serde_json::from_str::<TranslationResult>(&raw_response) {
            return Ok(result.text.trim().to_string());
        }

        Ok(raw_response)
    }

    async fn release(&self) -> Result<()> {
        // Unload the model so the session does not linger on the server
        let request = json!({
            "model": self.config.model,
            "keep_alive": 0
        });

        let url = format!("{}/api/generate", self.config.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                TransubError::Translation(format!("Failed to release translator session: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(TransubError::Translation(format!(
                "Failed to release translator session: HTTP {}",
                response.status()
            )));
        }

        debug!("Translator session released");
        Ok(())
    }
}

/// Check if Ollama is available and the model is loaded
pub async fn check_ollama_availability(endpoint: &str, model: &str) -> Result<()> {
    let client = Client::new();
    let url = format!("{}/api/show", endpoint);

    let request = json!({
        "name": model
    });

    let response = client
        .post(&url)
        .json(&request)
        .send()
        .await
        .map_err(|e| TransubError::Translation(format!("Failed to connect to Ollama: {}", e)))?;

    if response.status().is_success() {
        info!("Ollama model '{}' is available", model);
        Ok(())
    } else {
        Err(TransubError::Translation(format!(
            "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
            model, model
        )))
    }
}

fn language_code_to_name(code: &str) -> String {
    let name = match code.to_lowercase().as_str() {
        "en" => "English",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "ru" => "Russian",
        "it" => "Italian",
        "pt" => "Portuguese",
        "nl" => "Dutch",
        "tr" => "Turkish",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "th" => "Thai",
        "vi" => "Vietnamese",
        // The engine may already report a name rather than a code
        _ => return code.to_string(),
    };
    name.to_string()
}

/// `<base>.<lang>.srt` next to the transcript.
pub fn translated_output_path(subtitle_path: &Path, translation_tag: &str) -> PathBuf {
    subtitle_path.with_extension(format!("{}.srt", translation_tag))
}

/// `<base>.zh-tw.srt` for the script-converted variant.
pub fn converted_output_path(subtitle_path: &Path) -> PathBuf {
    subtitle_path.with_extension("zh-tw.srt")
}

/// Drives translation of a persisted subtitle file, plus the optional
/// Traditional Chinese conversion branch.
pub struct TranslationRouter {
    translate_config: TranslateConfig,
    convert_config: ConvertConfig,
}

impl TranslationRouter {
    pub fn new(translate_config: TranslateConfig, convert_config: ConvertConfig) -> Self {
        Self {
            translate_config,
            convert_config,
        }
    }

    /// Translate a subtitle file into the destination language, returning the
    /// path of the last file written.
    pub async fn translate_file(
        &self,
        subtitle_path: &Path,
        source_language: &str,
        raw_target: &str,
    ) -> Result<PathBuf> {
        check_ollama_availability(&self.translate_config.endpoint, &self.translate_config.model)
            .await?;

        let translator = TranslatorFactory::create_default(self.translate_config.clone());
        let converter = ScriptConverterFactory::create_default(self.convert_config.clone());

        self.translate_file_with(
            translator.as_ref(),
            converter.as_ref(),
            subtitle_path,
            source_language,
            raw_target,
        )
        .await
    }

    pub(crate) async fn translate_file_with(
        &self,
        translator: &dyn Translator,
        converter: &dyn ScriptConvert,
        subtitle_path: &Path,
        source_language: &str,
        raw_target: &str,
    ) -> Result<PathBuf> {
        let target = LanguageTarget::parse(raw_target);
        info!(
            "Translating subtitle from [{}] to [{}]",
            source_language, target.translation_tag
        );

        // The session must be released whatever happens in between
        let outcome = self
            .run_translation(translator, subtitle_path, source_language, &target)
            .await;
        if let Err(e) = translator.release().await {
            warn!("Failed to release translator session: {}", e);
        }
        let translated_path = outcome?;

        if target.needs_script_conversion {
            let converted_path = converted_output_path(subtitle_path);
            convert_subtitle_file(converter, &translated_path, &converted_path).await?;
            return Ok(converted_path);
        }

        Ok(translated_path)
    }

    async fn run_translation(
        &self,
        translator: &dyn Translator,
        subtitle_path: &Path,
        source_language: &str,
        target: &LanguageTarget,
    ) -> Result<PathBuf> {
        let mut document = SubtitleDocument::load(subtitle_path).await?;
        let total_segments = document.segments.len();

        for (idx, segment) in document.segments.iter_mut().enumerate() {
            debug!("Translating segment {}/{}", idx + 1, total_segments);
            segment.text = translator
                .translate(&segment.text, source_language, &target.translation_tag)
                .await?;
        }

        document.wrap_lines(self.translate_config.wrap_width);

        let output_path = translated_output_path(subtitle_path, &target.translation_tag);
        document.save(&output_path).await?;

        info!("Translated subtitle written to {}", output_path.display());
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::MockScriptConvert;
    use tempfile::tempdir;

    fn router() -> TranslationRouter {
        TranslationRouter::new(
            TranslateConfig {
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3.2:3b".to_string(),
                wrap_width: 42,
            },
            ConvertConfig {
                binary_path: "opencc".to_string(),
                profile: "s2twp.json".to_string(),
            },
        )
    }

    fn write_transcript(dir: &Path) -> PathBuf {
        let path = dir.join("talk.srt");
        std::fs::write(
            &path,
            "1\n00:00:00,000 --> 00:00:02,000\nHi\n\n\
             2\n00:00:02,000 --> 00:00:05,000\nThere\n\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_taiwan_aliases_normalize_to_base_chinese() {
        for raw in ["zh-tw", "zh_tw", "ZH-TW", "Zh_Tw"] {
            let target = LanguageTarget::parse(raw);
            assert_eq!(target.translation_tag, "zh", "alias {}", raw);
            assert!(target.needs_script_conversion, "alias {}", raw);
            assert_eq!(target.raw_tag, raw);
        }
    }

    #[test]
    fn test_other_tags_pass_through_unchanged() {
        let target = LanguageTarget::parse("fr");
        assert_eq!(target.translation_tag, "fr");
        assert!(!target.needs_script_conversion);

        let target = LanguageTarget::parse("zh");
        assert_eq!(target.translation_tag, "zh");
        assert!(!target.needs_script_conversion);
    }

    #[test]
    fn test_output_path_naming_scheme() {
        let transcript = Path::new("talk.srt");
        assert_eq!(
            translated_output_path(transcript, "zh"),
            PathBuf::from("talk.zh.srt")
        );
        assert_eq!(
            converted_output_path(transcript),
            PathBuf::from("talk.zh-tw.srt")
        );
    }

    #[tokio::test]
    async fn test_translation_writes_translated_document() {
        let dir = tempdir().unwrap();
        let transcript = write_transcript(dir.path());

        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .times(2)
            .returning(|text, _, _| Ok(format!("[fr] {}", text)));
        translator.expect_release().times(1).returning(|| Ok(()));

        let mut converter = MockScriptConvert::new();
        converter.expect_convert().times(0);

        let output = router()
            .translate_file_with(&translator, &converter, &transcript, "en", "fr")
            .await
            .unwrap();

        assert_eq!(output, dir.path().join("talk.fr.srt"));
        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.contains("[fr] Hi"));
        assert!(content.contains("[fr] There"));
        // The original transcript is left untouched
        let original = std::fs::read_to_string(&transcript).unwrap();
        assert!(original.contains("Hi"));
        assert!(!original.contains("[fr]"));
    }

    #[tokio::test]
    async fn test_conversion_branch_runs_for_taiwan_target() {
        let dir = tempdir().unwrap();
        let transcript = write_transcript(dir.path());

        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .withf(|_, _, target| target == "zh")
            .times(2)
            .returning(|_, _, _| Ok("软件".to_string()));
        translator.expect_release().times(1).returning(|| Ok(()));

        let mut converter = MockScriptConvert::new();
        converter
            .expect_convert()
            .times(1)
            .returning(|text| Ok(text.replace("软件", "軟體")));

        let output = router()
            .translate_file_with(&translator, &converter, &transcript, "en", "zh-tw")
            .await
            .unwrap();

        assert_eq!(output, dir.path().join("talk.zh-tw.srt"));
        assert!(dir.path().join("talk.zh.srt").exists());
        let converted = std::fs::read_to_string(&output).unwrap();
        assert!(converted.contains("軟體"));
    }

    #[tokio::test]
    async fn test_translator_released_even_when_translation_fails() {
        let dir = tempdir().unwrap();
        let transcript = write_transcript(dir.path());

        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .returning(|_, _, _| Err(TransubError::Translation("service down".to_string())));
        translator.expect_release().times(1).returning(|| Ok(()));

        let mut converter = MockScriptConvert::new();
        converter.expect_convert().times(0);

        let result = router()
            .translate_file_with(&translator, &converter, &transcript, "en", "zh-tw")
            .await;

        assert!(matches!(result, Err(TransubError::Translation(_))));
        // No translated or converted file appears on the failure path
        assert!(!dir.path().join("talk.zh.srt").exists());
        assert!(!dir.path().join("talk.zh-tw.srt").exists());
    }

    #[tokio::test]
    async fn test_release_failure_does_not_mask_success() {
        let dir = tempdir().unwrap();
        let transcript = write_transcript(dir.path());

        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .times(2)
            .returning(|text, _, _| Ok(text.to_string()));
        translator
            .expect_release()
            .times(1)
            .returning(|| Err(TransubError::Translation("already gone".to_string())));

        let mut converter = MockScriptConvert::new();
        converter.expect_convert().times(0);

        let output = router()
            .translate_file_with(&translator, &converter, &transcript, "en", "fr")
            .await
            .unwrap();
        assert!(output.exists());
    }
}
