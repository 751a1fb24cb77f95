//! GPU seam.
//!
//! Everything above this module talks to the GPU through [`GpuBackend`],
//! always from the render thread. [`WgpuBackend`] is the production
//! implementation; it owns the wgpu instance/adapter/device/queue and the
//! window surface used for the mirror view.

mod backend;
mod error;
mod init;
mod surface;
mod wgpu_backend;

pub use backend::{AdapterId, BufferSpec, DrawIndexed, EyePass, GpuBackend, ResourceHandle, SamplerSpec};
pub use error::GpuError;
pub use init::{GpuInit, MirrorSurface};
pub use surface::SurfaceErrorAction;
pub use wgpu_backend::{MirrorOutcome, WgpuBackend};
