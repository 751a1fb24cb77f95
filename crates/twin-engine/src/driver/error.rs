use thiserror::Error;

use crate::gpu::{AdapterId, GpuError};

use super::DriverState;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("operation requires state {expected:?}, driver is {actual:?}")]
    InvalidState { expected: DriverState, actual: DriverState },

    #[error("HMD is attached to adapter {hmd:x?}, renderer uses {render:x?}")]
    AdapterMismatch { hmd: AdapterId, render: AdapterId },

    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error("frame submission failed: {0}")]
    Submit(String),
}
