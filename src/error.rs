use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Universe unavailable: {0}")]
    UniverseUnavailable(String),

    #[error("Fetch failed for {symbol}: {cause}")]
    Fetch { symbol: String, cause: String },

    #[error("Store write failed: {0}")]
    Store(String),
}

impl AppError {
    /// Wrap a per-symbol failure. These are recoverable: the batch
    /// skips the symbol and continues.
    pub fn fetch(symbol: &str, cause: impl std::fmt::Display) -> Self {
        AppError::Fetch {
            symbol: symbol.to_string(),
            cause: cause.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Io(format!("CSV error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

// Alias for convenience
pub type Error = AppError;
