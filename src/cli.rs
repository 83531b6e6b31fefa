use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcribe a media file or URL and translate the resulting subtitles
    Process {
        /// Input media file path or https:// URL
        #[arg(short, long)]
        input: String,

        /// Target language for translation
        #[arg(short, long, default_value = "zh-tw")]
        lang: String,
    },

    /// Transcribe a local media file to an SRT subtitle file
    Transcribe {
        /// Input media file path
        #[arg(short, long)]
        input: PathBuf,

        /// Output subtitle file path
        #[arg(short, long, default_value = "output.srt")]
        output: PathBuf,
    },
}
