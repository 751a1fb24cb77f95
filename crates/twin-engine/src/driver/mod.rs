//! Stereo frame loop.
//!
//! [`FrameDriver`] owns the HMD session and the eye swap chains and walks
//! the scene through one frame: update once, render once per eye, submit.

mod error;
mod frame;

pub use error::DriverError;
pub use frame::{DriverConfig, DriverState, FrameDriver, FrameOutcome, FrameStats};
