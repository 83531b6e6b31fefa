use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::fs;
use tracing::info;

use crate::error::{Result, TransubError};
use crate::recognize::Segment;

static TIMESTAMP_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2}):(\d{2}):(\d{2}),(\d{3}) --> (\d{2}):(\d{2}):(\d{2}),(\d{3})$").unwrap()
});

/// An ordered subtitle document backed by the SRT text format.
///
/// Translation always builds a new document; a persisted original is never
/// mutated in place.
#[derive(Debug, Clone, Default)]
pub struct SubtitleDocument {
    pub segments: Vec<Segment>,
}

impl SubtitleDocument {
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Load an SRT file into a document.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|e| {
            TransubError::Subtitle(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let segments = parse_srt(&content)?;
        Ok(Self { segments })
    }

    /// Persist the document as SRT, overwriting any existing file.
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!("Writing subtitle file: {}", path.display());

        let mut srt_content = String::new();
        for (index, segment) in self.segments.iter().enumerate() {
            srt_content.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                index + 1,
                format_srt_time(segment.start),
                format_srt_time(segment.end),
                segment.text.trim()
            ));
        }

        fs::write(path, srt_content).await.map_err(|e| {
            TransubError::Subtitle(format!("Failed to write {}: {}", path.display(), e))
        })?;

        Ok(())
    }

    /// Re-wrap segment text to the given line width.
    /// Formatting only: timing and segment count are untouched.
    pub fn wrap_lines(&mut self, width: usize) {
        for segment in &mut self.segments {
            segment.text = wrap_text(&segment.text, width);
        }
    }
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm)
pub fn format_srt_time(seconds: f64) -> String {
    let total_milliseconds = (seconds * 1000.0).round() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

fn parse_srt(content: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut times: Option<(f64, f64)> = None;
    let mut text = String::new();

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            if let Some((start, end)) = times.take() {
                if !text.is_empty() {
                    segments.push(Segment {
                        start,
                        end,
                        text: std::mem::take(&mut text),
                    });
                }
            }
            text.clear();
            continue;
        }

        match times {
            None => {
                // Sequence numbers are regenerated on save; parse and drop them
                if trimmed.parse::<usize>().is_ok() {
                    continue;
                }
                if let Some(caps) = TIMESTAMP_LINE.captures(trimmed) {
                    times = Some((timestamp_seconds(&caps, 1), timestamp_seconds(&caps, 5)));
                }
            }
            Some(_) => {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(trimmed);
            }
        }
    }

    if let Some((start, end)) = times {
        if !text.is_empty() {
            segments.push(Segment { start, end, text });
        }
    }

    if segments.is_empty() {
        return Err(TransubError::Subtitle(
            "No subtitle entries found".to_string(),
        ));
    }

    Ok(segments)
}

fn timestamp_seconds(caps: &regex::Captures, start_idx: usize) -> f64 {
    let field = |idx: usize| -> u64 {
        caps.get(start_idx + idx)
            .map_or(0, |m| m.as_str().parse().unwrap_or(0))
    };
    let millis = (field(0) * 3600 + field(1) * 60 + field(2)) * 1000 + field(3);
    millis as f64 / 1000.0
}

fn wrap_text(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > width {
            // No break opportunities inside the word (common for CJK text);
            // fall back to splitting on character boundaries
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            for chunk in chars.chunks(width) {
                lines.push(chunk.iter().collect());
            }
            continue;
        }

        let current_len = current.chars().count();
        if current.is_empty() {
            current.push_str(word);
        } else if current_len + 1 + word_len <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}
