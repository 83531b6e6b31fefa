use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Config;
use crate::download::{cleanup_source, resolve_source, Downloader, DownloaderFactory};
use crate::error::Result;
use crate::media::MediaProber;
use crate::recognize::{collect_segments, AudioProgressBar, Recognizer, RecognizerFactory};
use crate::subtitle::SubtitleDocument;
use crate::translate::TranslationRouter;

/// Sequences the pipeline: resolve, recognize, emit, translate and
/// optionally convert, then clean up.
pub struct Pipeline {
    config: Config,
    downloader: Box<dyn Downloader>,
    recognizer: Box<dyn Recognizer>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        let downloader = DownloaderFactory::create_default(config.download.clone());
        let prober = MediaProber::new(config.media.clone());
        let recognizer = RecognizerFactory::create_default(config.recognizer.clone(), prober);

        Self {
            config,
            downloader,
            recognizer,
        }
    }

    /// Full pipeline: one media input in, transcript plus translated
    /// subtitle files out.
    ///
    /// A transient download is removed only after the whole run succeeds;
    /// failing in recognition or translation leaves the artifact on disk.
    pub async fn process(&self, input: &str, target_language: &str) -> Result<()> {
        let source = resolve_source(input, self.downloader.as_ref()).await?;

        let transcript_path = transcript_output_path(&source.path);
        let detected_language = self
            .transcribe_to(&source.path, None, &transcript_path)
            .await?;

        let router =
            TranslationRouter::new(self.config.translate.clone(), self.config.convert.clone());
        router
            .translate_file(&transcript_path, &detected_language, target_language)
            .await?;

        cleanup_source(&source).await;

        info!("Pipeline completed for {}", input);
        Ok(())
    }

    /// Transcription-only mode: recognize and emit, no translation.
    pub async fn transcribe(&self, input: &Path, output: &Path) -> Result<()> {
        self.transcribe_to(input, None, output).await?;
        Ok(())
    }

    async fn transcribe_to(
        &self,
        media_path: &Path,
        language_hint: Option<&str>,
        output_path: &Path,
    ) -> Result<String> {
        info!("Transcribing to subtitle: {}", media_path.display());

        let session = self.recognizer.recognize(media_path, language_hint).await?;

        let mut progress = AudioProgressBar::new(session.duration);
        let (segments, detected_language) = collect_segments(session, &mut progress).await?;
        progress.finish();

        SubtitleDocument::from_segments(segments)
            .save(output_path)
            .await?;

        Ok(detected_language)
    }
}

/// `<base>.srt` next to the input media file.
pub fn transcript_output_path(media_path: &Path) -> PathBuf {
    media_path.with_extension("srt")
}
