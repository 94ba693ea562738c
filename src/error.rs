use thiserror::Error;

/// Missing or unreadable configuration. Always fatal, raised before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Failure while resolving an image post's text. Never leaves the classifier.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),

    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("temp file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ocr failed: {0}")]
    Ocr(String),
}

/// Write failure for a single record.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("encoding comments: {0}")]
    Encode(#[from] serde_json::Error),
}
