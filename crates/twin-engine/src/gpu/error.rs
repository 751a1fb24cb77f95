use thiserror::Error;

use super::ResourceHandle;

/// Failures reported by a [`GpuBackend`](super::GpuBackend).
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("unknown resource handle {0:?}")]
    UnknownHandle(ResourceHandle),

    #[error("bitmap {width}x{height} carries {len} bytes, expected {expected}")]
    InvalidBitmap {
        width: u32,
        height: u32,
        len: usize,
        expected: usize,
    },

    #[error("zero-sized {0} requested")]
    ZeroSize(&'static str),

    #[error("no eye pass is active")]
    NoActivePass,

    #[error("an eye pass is already active")]
    PassActive,

    #[error("backend failure: {0}")]
    Backend(String),
}
