//! Core engine-facing contracts.
//!
//! This module defines the interface between the window runtime and the
//! application: scene setup once, then one callback per frame between frame
//! driver iterations, where node kinematics may be changed safely.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, SetupCtx};
