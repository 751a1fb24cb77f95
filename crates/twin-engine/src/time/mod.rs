//! Time subsystem.
//!
//! Provides the monotonic simulation clock used by the frame driver.
//! Call `tick()` (or `tick_at()` in tests) once per video frame.

mod sim_clock;

pub use sim_clock::{FrameTime, SimClock};
