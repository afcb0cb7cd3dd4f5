//! Error types for garnet-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while turning config files into collectors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Directory listing or file read failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse error on load; includes the offending file and serde_json's line/column.
    #[error("failed to parse collector config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("collector config at {path} has a zero interval")]
    InvalidInterval { path: PathBuf },

    #[error("collector config at {path} has an empty command")]
    EmptyCommand { path: PathBuf },

    /// Two files resolved to the same collector name.
    #[error("duplicate collector name '{name}' (second definition at {path})")]
    DuplicateName { name: String, path: PathBuf },
}
