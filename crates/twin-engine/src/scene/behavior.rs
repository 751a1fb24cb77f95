use crate::gpu::GpuBackend;
use crate::loader::LoaderHandle;
use crate::render::RenderCtx;
use crate::time::FrameTime;

use super::{LightSet, NodeState};

/// Render-thread context handed to init, update and shutdown broadcasts.
pub struct NodeCtx<'a> {
    pub gpu: &'a mut dyn GpuBackend,
    pub time: FrameTime,
    pub loader: &'a LoaderHandle,
    /// Lights published for the current frame. Cleared before each update.
    pub lights: &'a mut LightSet,
}

/// Per-node logic attached to a scene node.
///
/// Every hook has an empty default so a behavior only implements what it
/// needs. All hooks run on the render thread.
pub trait NodeBehavior {
    /// Called once, at the first init point after the node becomes live.
    fn on_init(&mut self, _node: &NodeState, _ctx: &mut NodeCtx<'_>) {}

    /// Called once per frame after the node's kinematics and world
    /// transform were updated.
    fn on_update(&mut self, _node: &NodeState, _ctx: &mut NodeCtx<'_>) {}

    /// Called once per eye with that eye's view published in `ctx`.
    fn on_render(&mut self, _node: &NodeState, _ctx: &mut RenderCtx<'_>) {}

    /// Called exactly once before the node is destroyed. Release GPU
    /// objects here.
    fn on_shutdown(&mut self, _ctx: &mut NodeCtx<'_>) {}
}
