use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the stem-analyzer library
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("External service error: {0}")]
    ExternalService(#[from] ExternalServiceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{branch} timed out after {seconds}s")]
    Timeout { branch: String, seconds: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Failures turning a file into PCM samples
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Audio file not found: {path}")]
    Missing { path: String },

    #[error("Audio file is empty: {path}")]
    Empty { path: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio file is too large: {path} ({size_mb:.1} MB, limit {limit_mb} MB)")]
    TooLarge {
        path: String,
        size_mb: f64,
        limit_mb: u64,
    },

    #[error("Failed to decode {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

/// A detector could not produce a usable result
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Signal is empty")]
    EmptySignal,

    #[error("Signal contains non-finite samples")]
    NonFiniteSignal,

    #[error("FFT processing failed: {reason}")]
    Fft { reason: String },

    #[error("Invalid analysis parameters: {details}")]
    InvalidParameters { details: String },
}

/// Results cache failures
///
/// Only `Storage` and `LockTimeout` ever leave the cache; `Corrupt` is
/// recovered internally as a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache storage failure at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt cache file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Timed out waiting for cache lock {}", path.display())]
    LockTimeout { path: PathBuf },
}

/// Failures reported by the separation and download collaborators
#[derive(Error, Debug)]
pub enum ExternalServiceError {
    #[error("{service} is not available: {reason}")]
    Unavailable { service: String, reason: String },

    #[error("Stem separation failed: {message}")]
    Separation { message: String },

    #[error("Download failed: {message}")]
    Download { message: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using AnalyzerError
pub type Result<T> = std::result::Result<T, AnalyzerError>;

impl AnalyzerError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    pub fn timeout<S: Into<String>>(branch: S, seconds: u64) -> Self {
        Self::Timeout {
            branch: branch.into(),
            seconds,
        }
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // IO errors might be temporary
            Self::Io(_) => true,
            Self::Timeout { .. } => true,
            Self::Cache(CacheError::LockTimeout { .. }) => true,
            Self::ExternalService(ExternalServiceError::Download { .. }) => true,
            // Most other errors are permanent
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Decode(DecodeError::Missing { path }) => {
                format!("Could not find audio file '{}'.", path)
            }
            Self::Decode(DecodeError::UnsupportedFormat { format }) => {
                format!(
                    "Audio format '{}' is not supported. Try WAV, MP3, FLAC, OGG or AAC.",
                    format
                )
            }
            Self::Decode(DecodeError::Corrupt { path, .. }) => {
                format!(
                    "Could not decode audio file '{}'. Please check it is a valid audio file.",
                    path
                )
            }
            Self::Timeout { branch, seconds } => {
                format!("Processing took too long: {} did not finish within {}s.", branch, seconds)
            }
            Self::ExternalService(ExternalServiceError::Unavailable { service, .. }) => {
                format!("'{}' could not be started. Is it installed and on PATH?", service)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
