use winit::window::Window;

use crate::driver::{FrameDriver, FrameOutcome, FrameStats};
use crate::loader::LoaderHandle;
use crate::scene::{NodeId, NodeState, SceneTree};

/// Context passed to [`App::setup`](super::App::setup).
pub struct SetupCtx<'a> {
    pub window: &'a Window,
    pub tree: &'a mut SceneTree,
    pub loader: &'a LoaderHandle,
    pub driver: &'a mut FrameDriver,
}

/// Per-frame context passed to [`App::on_frame`](super::App::on_frame).
///
/// The tree is between frames here: no broadcast is running, so nodes may be
/// spawned, moved, detached or removed freely.
pub struct FrameCtx<'a> {
    pub window: &'a Window,
    pub tree: &'a mut SceneTree,
    pub loader: &'a LoaderHandle,
    pub driver: &'a mut FrameDriver,
    /// Outcome of the previous frame; `None` before the first one.
    pub last_outcome: Option<FrameOutcome>,
}

impl FrameCtx<'_> {
    pub fn stats(&self) -> FrameStats {
        self.driver.stats()
    }

    /// Shorthand for `tree.node_mut(id)`.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeState> {
        self.tree.node_mut(id)
    }

    /// Recenters the HMD session before the next frame samples poses.
    pub fn recenter(&mut self) {
        self.driver.request_recenter();
    }
}
