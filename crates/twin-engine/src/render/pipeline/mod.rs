//! wgpu pipelines used by [`WgpuBackend`](crate::gpu::WgpuBackend).

mod mesh;
mod mirror;

pub(crate) use mesh::{MeshDraw, MeshPipeline, EYE_COLOR_FORMAT, EYE_DEPTH_FORMAT};
pub(crate) use mirror::MirrorPipeline;
