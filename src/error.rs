use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse profile: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    #[error("profile not found: {}", .0.display())]
    ProfileNotFound(PathBuf),

    #[error("could not locate the home directory")]
    NoHomeDir,

    #[error("line {line}: malformed frame: {source}")]
    Frame {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: invalid timestamp {value}")]
    Timestamp { line: usize, value: f64 },
}
