//! Error types for capture configuration

use std::num::ParseIntError;

use thiserror::Error;

/// Configuration problems detected before the ingestor is usable.
///
/// Ingestion itself never fails; every variant here is raised while loading
/// or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("storage charset is not configured")]
    MissingCharset,

    #[error("unknown storage charset: {0}")]
    UnknownCharset(String),

    #[error("storage charset {0} is not ASCII-compatible")]
    UnsupportedCharset(&'static str),

    #[error("invalid SMTP port: {value:?}")]
    InvalidPort {
        value: String,
        #[source]
        source: ParseIntError,
    },
}
