//! Error type shared by the shell services.
//!
//! The host stringifies these with `format!` when an effect fails and logs
//! them; nothing at the webview boundary sees this type.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize window state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no per-user {0} directory on this platform")]
    NoUserDirectory(&'static str),

    #[error("screen lock inhibition failed: {0}")]
    Inhibit(String),

    #[error("certificate import failed: {0}")]
    Certificate(String),
}

pub type Result<T, E = ShellError> = std::result::Result<T, E>;
