use std::num::NonZeroU64;

use glam::Mat4;

use crate::render::{EyeUniforms, MaterialParams};
use crate::resource::{Bitmap, BufferTarget, BufferUsage, TextureFilter, TextureWrap};

use super::GpuError;

/// Opaque native object name handed out by a backend.
///
/// Zero is never a valid handle; "not allocated" is `Option::<ResourceHandle>::None`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ResourceHandle(NonZeroU64);

impl ResourceHandle {
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

/// Identity of a physical adapter, used to check that the HMD runtime and the
/// renderer agree on the GPU.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AdapterId {
    pub vendor: u32,
    pub device: u32,
}

/// Complete specification of a buffer's storage.
#[derive(Debug, Copy, Clone)]
pub struct BufferSpec<'a> {
    pub target: BufferTarget,
    pub usage: BufferUsage,
    pub data: &'a [u8],
}

/// Sampler state attached to a texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct SamplerSpec {
    pub filter: TextureFilter,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
}

/// Per-eye pass parameters supplied when an eye target is bound.
#[derive(Debug, Clone)]
pub struct EyePass {
    pub clear: [f32; 4],
    pub uniforms: EyeUniforms,
}

/// Indexed draw using the currently bound vertex/index buffers and texture slot 0.
#[derive(Debug, Clone, Copy)]
pub struct DrawIndexed<'a> {
    pub base_index: u32,
    pub index_count: u32,
    pub base_vertex: i32,
    pub model: Mat4,
    /// Final bone matrices; empty for rigid geometry.
    pub bones: &'a [Mat4],
    pub material: MaterialParams,
}

/// Render-thread GPU interface.
///
/// Creation calls allocate a handle; `specify_buffer`/`upload_texture`
/// (re)define storage in place under the same handle. Bind calls set the
/// state captured by the next `draw_indexed`. Destroy calls on unknown
/// handles are ignored.
pub trait GpuBackend {
    fn adapter(&self) -> AdapterId;

    fn create_buffer(&mut self, label: &str) -> Result<ResourceHandle, GpuError>;
    fn specify_buffer(&mut self, handle: ResourceHandle, spec: &BufferSpec<'_>) -> Result<(), GpuError>;
    fn bind_buffer(&mut self, handle: ResourceHandle, target: BufferTarget);
    fn destroy_buffer(&mut self, handle: ResourceHandle);

    fn create_texture(&mut self, label: &str) -> Result<ResourceHandle, GpuError>;
    fn upload_texture(&mut self, handle: ResourceHandle, bitmap: &Bitmap) -> Result<(), GpuError>;
    fn configure_sampler(&mut self, handle: ResourceHandle, sampler: &SamplerSpec) -> Result<(), GpuError>;
    fn bind_texture(&mut self, handle: ResourceHandle, slot: u32);
    /// Leaves `slot` with the backend's neutral (white) texture.
    fn unbind_texture(&mut self, slot: u32);
    fn destroy_texture(&mut self, handle: ResourceHandle);

    /// Allocates an off-screen color + depth target.
    fn create_render_target(&mut self, label: &str, width: u32, height: u32) -> Result<ResourceHandle, GpuError>;
    fn destroy_render_target(&mut self, handle: ResourceHandle);

    /// Binds and clears `target`; draws recorded until `end_eye_pass` land in it.
    fn begin_eye_pass(&mut self, target: ResourceHandle, pass: &EyePass) -> Result<(), GpuError>;
    fn draw_indexed(&mut self, draw: &DrawIndexed<'_>);
    /// Unbinds the eye target and flushes the recorded draws.
    fn end_eye_pass(&mut self) -> Result<(), GpuError>;
}
