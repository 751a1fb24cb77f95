//! Math helpers shared by the node tree, the frame driver and HMD sessions.
//!
//! Conventions: right-handed, +Y up, cameras look down −Z, angles exposed to
//! users are degrees, clip-space depth is `[0, 1]` (wgpu).

mod pose;
mod projection;

pub use pose::{yaw_quat, FovPort, Pose};
pub use projection::{eye_view, fov_projection, EyeViewMatrix};
