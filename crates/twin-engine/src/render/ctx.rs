use glam::{Mat4, Vec3};

use crate::gpu::GpuBackend;
use crate::hmd::Eye;
use crate::time::FrameTime;

/// View published for the eye currently being rendered.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EyeView {
    pub eye: Eye,
    pub view: Mat4,
    pub proj: Mat4,
    /// Eye position in world space.
    pub position: Vec3,
}

impl EyeView {
    pub fn view_proj(&self) -> Mat4 {
        self.proj * self.view
    }
}

/// Render-thread context handed to the render broadcast, once per eye.
pub struct RenderCtx<'a> {
    pub gpu: &'a mut dyn GpuBackend,
    pub eye: &'a EyeView,
    pub time: FrameTime,
}
