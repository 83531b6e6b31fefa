use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Subtitle error: {0}")]
    Subtitle(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Script conversion error: {0}")]
    Conversion(String),

    #[error("Media probing error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TransubError>;
