//! Twin engine crate.
//!
//! Stereo forward renderer for head-mounted displays: a scene node tree whose
//! GPU resources are staged from any thread and applied on the render thread,
//! a background loader pool, skeletal animation, and the frame driver that
//! renders both eyes and submits them to an HMD session.

pub mod gpu;
pub mod window;
pub mod time;
pub mod core;

pub mod logging;
pub mod math;
pub mod resource;
pub mod loader;
pub mod anim;
pub mod scene;
pub mod render;
pub mod hmd;
pub mod driver;

#[cfg(test)]
pub(crate) mod testing;
