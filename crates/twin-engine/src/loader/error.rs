use std::path::PathBuf;

use thiserror::Error;

/// Why a background load failed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("embedded asset '{0}' is not registered")]
    UnknownAsset(String),

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("model import failed: {0}")]
    Import(String),

    #[error("loader job panicked: {0}")]
    Panicked(String),

    #[error("loader is shut down")]
    LoaderClosed,
}
