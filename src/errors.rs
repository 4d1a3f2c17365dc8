use thiserror::Error;

#[derive(Error, Debug)]
pub enum NewsRecError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Article not found: {0}")]
    ArticleNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Quota exceeded on provider {0}")]
    QuotaExceeded(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NewsRecError {
    /// Whether this error is the rate/usage-limit signal the provider
    /// fallback reacts to, as opposed to a generic oracle failure.
    #[must_use]
    pub const fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded(_))
    }
}

pub type Result<T> = std::result::Result<T, NewsRecError>;
