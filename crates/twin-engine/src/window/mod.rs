//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop, the mirror window and its GPU backend, the
//! loader pool and the scene, and drives the frame driver once per redraw.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
