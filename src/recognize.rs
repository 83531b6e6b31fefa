use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::RecognizerConfig;
use crate::error::{Result, TransubError};
use crate::media::MediaProber;

// Timestamped segment line as printed by the engine, e.g.
// [00:07.000 --> 00:10.240]  So in college, ...
static SEGMENT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[\s*([0-9:.,]+)\s*-->\s*([0-9:.,]+)\]\s?(.*)$").unwrap()
});

static DETECTION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Detected language '([^']+)' with probability ([0-9.]+)").unwrap()
});

/// One timed unit of recognized text, offsets in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// A single recognition run: stream of segments plus aggregate metadata.
///
/// The segment receiver is read-once and forward-only; the engine cannot
/// rewind, so the stream must be consumed by exactly one accumulator pass.
pub struct RecognitionSession {
    pub segments: mpsc::Receiver<Result<Segment>>,
    pub duration: f64,
    pub language: String,
    pub language_probability: f32,
}

/// Main trait for speech recognition operations
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Start recognizing a media file, optionally with a source language hint
    async fn recognize(
        &self,
        media_path: &Path,
        language: Option<&str>,
    ) -> Result<RecognitionSession>;
}

/// Factory for creating recognizer instances
pub struct RecognizerFactory;

impl RecognizerFactory {
    /// Create the default recognizer implementation (whisper-ctranslate2 based)
    pub fn create_default(config: RecognizerConfig, prober: MediaProber) -> Box<dyn Recognizer> {
        Box::new(WhisperRecognizer::new(config, prober))
    }
}

/// whisper-ctranslate2 based recognizer.
///
/// The engine prints segments to stdout as they are decoded; a reader task
/// feeds them into a bounded channel so the consumer sees a lazy stream
/// instead of waiting for the whole transcription.
pub struct WhisperRecognizer {
    config: RecognizerConfig,
    prober: MediaProber,
}

impl WhisperRecognizer {
    pub fn new(config: RecognizerConfig, prober: MediaProber) -> Self {
        Self { config, prober }
    }
}

#[async_trait]
impl Recognizer for WhisperRecognizer {
    async fn recognize(
        &self,
        media_path: &Path,
        language: Option<&str>,
    ) -> Result<RecognitionSession> {
        info!(
            "Transcribing {} with model '{}' on {}",
            media_path.display(),
            self.config.model,
            self.config.device
        );

        let duration = self.prober.duration_seconds(media_path).await?;

        // The engine insists on writing subtitle files; point it at a scratch
        // directory and keep only the stdout stream
        let scratch = tempfile::tempdir()
            .map_err(|e| TransubError::Recognition(format!("Failed to create temp dir: {}", e)))?;

        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg(media_path)
            .arg("--model").arg(&self.config.model)
            .arg("--device").arg(&self.config.device)
            .arg("--compute_type").arg(&self.config.compute_type)
            .arg("--vad_filter").arg("True")
            .arg("--vad_min_silence_duration_ms").arg(self.config.vad_min_silence_ms.to_string())
            .arg("--output_dir").arg(scratch.path())
            .arg("--verbose").arg("True");

        if let Some(lang) = language {
            cmd.arg("--language").arg(lang);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Executing recognition command: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| {
            TransubError::Recognition(format!(
                "Failed to execute {}: {}",
                self.config.binary_path, e
            ))
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            TransubError::Recognition("Failed to capture engine stdout".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            TransubError::Recognition("Failed to capture engine stderr".to_string())
        })?;

        // Drain stderr separately so the child never blocks on a full pipe
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = BufReader::new(stderr).read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();

        // With a language hint the engine skips detection; otherwise scan the
        // leading output for the detection line. A segment line arriving first
        // is buffered and replayed into the stream below.
        let mut pending: Option<Segment> = None;
        let (detected_language, language_probability) = match language {
            Some(tag) => (tag.to_string(), 1.0),
            None => {
                let mut detected = None;
                while let Some(line) = lines.next_line().await.map_err(|e| {
                    TransubError::Recognition(format!("Failed to read engine output: {}", e))
                })? {
                    if let Some(hit) = parse_detection_line(&line) {
                        detected = Some(hit);
                        break;
                    }
                    if let Some(segment) = parse_segment_line(&line) {
                        pending = Some(segment);
                        break;
                    }
                }
                detected.unwrap_or_else(|| {
                    warn!(
                        "Engine reported no language, falling back to '{}'",
                        self.config.fallback_language
                    );
                    (self.config.fallback_language.clone(), 0.0)
                })
            }
        };

        debug!(
            "Detected language '{}' with probability {}",
            detected_language, language_probability
        );

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            // Keep the scratch directory alive until the engine exits
            let _scratch = scratch;

            if let Some(segment) = pending {
                if tx.send(Ok(segment)).await.is_err() {
                    return;
                }
            }

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(segment) = parse_segment_line(&line) {
                            if tx.send(Ok(segment)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx
                            .send(Err(TransubError::Recognition(format!(
                                "Failed to read engine output: {}",
                                e
                            ))))
                            .await;
                        return;
                    }
                }
            }

            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    let stderr_output = stderr_task.await.unwrap_or_default();
                    let _ = tx
                        .send(Err(TransubError::Recognition(format!(
                            "Engine exited with {}: {}",
                            status,
                            stderr_output.trim()
                        ))))
                        .await;
                }
                Err(e) => {
                    let _ = tx
                        .send(Err(TransubError::Recognition(format!(
                            "Failed to wait for engine: {}",
                            e
                        ))))
                        .await;
                }
            }
        });

        Ok(RecognitionSession {
            segments: rx,
            duration,
            language: detected_language,
            language_probability,
        })
    }
}

/// Observer for recognition progress, measured in audio seconds.
pub trait ProgressSink {
    fn advance(&mut self, seconds: f64);
}

/// Progress bar over the audio timeline, tracked in milliseconds.
pub struct AudioProgressBar {
    bar: ProgressBar,
}

impl AudioProgressBar {
    pub fn new(total_seconds: f64) -> Self {
        let bar = ProgressBar::new((total_seconds * 1000.0) as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% audio ({eta})")
                .unwrap()
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for AudioProgressBar {
    fn advance(&mut self, seconds: f64) {
        self.bar.inc((seconds.max(0.0) * 1000.0) as u64);
    }
}

/// Drain a recognition session into an ordered segment list.
///
/// Single pass over the read-once stream. Each segment is appended in
/// emission order and moves the progress cursor to its end time; silence
/// after the last segment is reported as one final delta so the progress
/// total always reaches the session duration. Returns the segments together
/// with the detected source language for downstream translation routing.
pub async fn collect_segments(
    mut session: RecognitionSession,
    progress: &mut dyn ProgressSink,
) -> Result<(Vec<Segment>, String)> {
    let mut segments = Vec::new();
    let mut cursor = 0.0_f64;

    while let Some(item) = session.segments.recv().await {
        let segment = item?;
        progress.advance((segment.end - cursor).max(0.0));
        cursor = segment.end;
        segments.push(segment);
    }

    // Account for trailing silence the engine never covered
    if cursor < session.duration {
        progress.advance(session.duration - cursor);
    }

    info!(
        "Recognized {} segments in language '{}'",
        segments.len(),
        session.language
    );

    Ok((segments, session.language))
}

fn parse_clock(raw: &str) -> Option<f64> {
    let mut parts = raw.split(':').rev();
    let seconds: f64 = parts.next()?.replace(',', ".").parse().ok()?;
    let minutes: f64 = match parts.next() {
        Some(v) => v.parse().ok()?,
        None => 0.0,
    };
    let hours: f64 = match parts.next() {
        Some(v) => v.parse().ok()?,
        None => 0.0,
    };
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn parse_segment_line(line: &str) -> Option<Segment> {
    let caps = SEGMENT_LINE.captures(line.trim())?;
    let start = parse_clock(&caps[1])?;
    let end = parse_clock(&caps[2])?;
    let text = caps[3].trim().to_string();
    if end <= start || text.is_empty() {
        return None;
    }
    Some(Segment { start, end, text })
}

fn parse_detection_line(line: &str) -> Option<(String, f32)> {
    let caps = DETECTION_LINE.captures(line)?;
    let probability = caps[2].parse().ok()?;
    Some((caps[1].to_string(), probability))
}
