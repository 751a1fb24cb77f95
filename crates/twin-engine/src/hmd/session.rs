use thiserror::Error;

use crate::gpu::{AdapterId, ResourceHandle};
use crate::math::{FovPort, Pose};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    /// Render order.
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    pub fn index(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }
}

/// Session flags polled once per frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SessionStatus {
    /// The application has focus on the headset and should render.
    pub is_visible: bool,
    /// The runtime asks the application to exit.
    pub should_quit: bool,
    /// The user asked to reset the tracking origin.
    pub should_recenter: bool,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            is_visible: true,
            should_quit: false,
            should_recenter: false,
        }
    }
}

/// Lens description of one eye.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EyeRenderDesc {
    pub fov: FovPort,
    /// Eye pose relative to the head centre.
    pub hmd_to_eye: Pose,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HmdInfo {
    pub product_name: String,
    pub manufacturer: String,
    /// Native panel resolution, both eyes.
    pub resolution: (u32, u32),
    pub refresh_rate: f32,
}

/// Image of one eye handed to the compositor.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EyeLayerImage {
    pub target: ResourceHandle,
    pub size: (u32, u32),
    pub fov: FovPort,
    /// Pose the image was rendered with.
    pub render_pose: Pose,
}

/// Single projection layer with both eyes, indexed by [`Eye::index`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EyeLayer {
    pub eyes: [EyeLayerImage; 2],
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// The frame was dropped; keep rendering.
    #[error("frame dropped by the compositor: {0}")]
    Transient(String),

    /// The session is lost (display disconnected, runtime gone).
    #[error("session lost: {0}")]
    Fatal(String),
}

/// Headset runtime contract. All calls happen on the render thread.
pub trait HmdSession {
    fn info(&self) -> HmdInfo;

    /// Adapter the headset is attached to; `None` accepts any adapter.
    fn adapter(&self) -> Option<AdapterId>;

    fn recommended_target_size(&self, eye: Eye) -> (u32, u32);

    fn eye_render_desc(&self, eye: Eye) -> EyeRenderDesc;

    /// Predicted tracked eye poses for `frame_index`, relative to the
    /// tracking origin.
    fn eye_poses(&mut self, frame_index: u64, hmd_to_eye: [Pose; 2]) -> [Pose; 2];

    fn status(&mut self) -> SessionStatus;

    /// Makes the current head pose the tracking origin.
    fn recenter(&mut self);

    fn submit_frame(&mut self, frame_index: u64, layer: &EyeLayer) -> Result<(), SubmitError>;

    /// Ends the session. Further calls are not expected.
    fn end(&mut self);
}
