//! Error types surfaced at the library boundary.

use std::path::PathBuf;

/// Errors that stop a phase before it starts.
#[derive(thiserror::Error, Debug)]
pub enum MirrorError {
    #[error("input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse config {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MirrorResult<T> = Result<T, MirrorError>;
