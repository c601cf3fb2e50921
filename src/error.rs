//! Error types for the genuinely fallible boundaries of the engine.
//!
//! Ingest, search, and clear are total functions per design — they never
//! return `Result`. Only configuration loading and CLI parsing can fail, so
//! this enum stays small: one variant per real failure mode, thiserror-derived,
//! without importing variants the core paths never produce.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogriaError {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
