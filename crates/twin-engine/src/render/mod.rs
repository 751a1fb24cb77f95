//! Stereo forward renderer.
//!
//! Node behaviors record indexed draws through [`RenderCtx`]; the wgpu
//! backend collects them per eye in a [`EyeDrawList`] and encodes one
//! forward pass per eye target.
//!
//! Convention:
//! - right-handed world, +Y up, cameras look down −Z;
//! - one directional, up to four point and four spot lights per frame.

mod ctx;
mod list;
pub(crate) mod pipeline;
mod uniforms;

pub use ctx::{EyeView, RenderCtx};
pub use list::{DrawKey, EyeDrawList, RecordedDraw};
pub use uniforms::{DrawUniforms, EyeUniforms, FrameUniforms, GpuLight, MaterialParams, MAX_BONES};
