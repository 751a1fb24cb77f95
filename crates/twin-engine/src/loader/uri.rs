use std::path::{Path, PathBuf};

use super::{EmbeddedAssets, LoadError};

/// Where a resource's bytes come from.
///
/// - `res:<key>`: an [`EmbeddedAssets`] entry
/// - `file:<path>` / `file://<path>`: a local file URL
/// - anything else: a plain filesystem path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    Embedded(String),
    File(PathBuf),
    Path(PathBuf),
}

impl ResourceUri {
    pub fn parse(source: &str) -> Self {
        if let Some(key) = source.strip_prefix("res:") {
            return Self::Embedded(key.trim_start_matches('/').to_owned());
        }
        if let Some(rest) = source.strip_prefix("file:") {
            let rest = rest
                .strip_prefix("//localhost")
                .or_else(|| rest.strip_prefix("//"))
                .unwrap_or(rest);
            return Self::File(PathBuf::from(strip_drive_slash(rest)));
        }
        Self::Path(PathBuf::from(source))
    }

    /// Filesystem location, if this URI refers to one.
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::Embedded(_) => None,
            Self::File(p) | Self::Path(p) => Some(p),
        }
    }

    pub fn read_bytes(&self, assets: &EmbeddedAssets) -> Result<Vec<u8>, LoadError> {
        match self {
            Self::Embedded(key) => assets
                .get(key)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| LoadError::UnknownAsset(key.clone())),
            Self::File(path) | Self::Path(path) => std::fs::read(path).map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    LoadError::NotFound(path.clone())
                } else {
                    LoadError::Io {
                        path: path.clone(),
                        source,
                    }
                }
            }),
        }
    }
}

// "/C:/textures/a.png" → "C:/textures/a.png"
fn strip_drive_slash(path: &str) -> &str {
    let bytes = path.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':' {
        &path[1..]
    } else {
        path
    }
}
