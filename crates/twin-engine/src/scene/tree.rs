use glam::Mat4;
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::render::RenderCtx;

use super::{NodeBehavior, NodeCtx, NodeState};

new_key_type! {
    /// Identifier of a node in a [`SceneTree`]. Stale ids are detected.
    pub struct NodeId;
}

/// Structural edits rejected by the tree.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    #[error("unknown or removed node {0:?}")]
    UnknownNode(NodeId),

    #[error("the root node cannot be attached, detached or removed")]
    RootImmutable,

    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    Cycle { child: NodeId, parent: NodeId },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Phase {
    /// Not yet initialized.
    Created,
    Initialized,
    /// Shutdown delivered; only destruction remains.
    ShutDown,
}

struct Slot {
    name: String,
    state: NodeState,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    behavior: Option<Box<dyn NodeBehavior>>,
    phase: Phase,
    /// Removed and waiting for the next flush.
    doomed: bool,
}

/// Arena-backed node tree with a single root.
///
/// Structural edits are allowed between broadcasts. `remove` is deferred:
/// the subtree is detached at once and destroyed at the next
/// [`flush_removed`](Self::flush_removed), after its initialized nodes got
/// their shutdown.
pub struct SceneTree {
    nodes: SlotMap<NodeId, Slot>,
    root: NodeId,
    removed: Vec<NodeId>,
    order: Vec<NodeId>,
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneTree {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Slot {
            name: "root".to_owned(),
            state: NodeState::default(),
            parent: None,
            children: Vec::new(),
            behavior: None,
            phase: Phase::Created,
            doomed: false,
        });
        Self {
            nodes,
            root,
            removed: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes in the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Creates a detached node.
    pub fn create(&mut self, name: impl Into<String>, state: NodeState, behavior: Option<Box<dyn NodeBehavior>>) -> NodeId {
        self.nodes.insert(Slot {
            name: name.into(),
            state,
            parent: None,
            children: Vec::new(),
            behavior,
            phase: Phase::Created,
            doomed: false,
        })
    }

    /// Creates a node and attaches it as the last child of `parent`.
    pub fn spawn(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        state: NodeState,
        behavior: Option<Box<dyn NodeBehavior>>,
    ) -> Result<NodeId, TreeError> {
        self.check(parent)?;
        let id = self.create(name, state, behavior);
        self.attach(id, parent)?;
        Ok(id)
    }

    /// Moves `child` (with its subtree) to the end of `parent`'s children.
    pub fn attach(&mut self, child: NodeId, parent: NodeId) -> Result<(), TreeError> {
        if child == self.root {
            return Err(TreeError::RootImmutable);
        }
        self.check(child)?;
        self.check(parent)?;

        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(TreeError::Cycle { child, parent });
            }
            cursor = self.nodes[id].parent;
        }

        self.unlink(child);
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
        Ok(())
    }

    /// Detaches `id` from its parent. The subtree stops receiving broadcasts
    /// but keeps its state; attaching it again does not re-run init.
    pub fn detach(&mut self, id: NodeId) -> Result<(), TreeError> {
        if id == self.root {
            return Err(TreeError::RootImmutable);
        }
        self.check(id)?;
        self.unlink(id);
        Ok(())
    }

    /// Detaches `id` and schedules its subtree for destruction.
    pub fn remove(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.detach(id)?;
        self.nodes[id].doomed = true;
        self.removed.push(id);
        Ok(())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|slot| !slot.doomed)
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeState> {
        self.live_slot(id).map(|slot| &slot.state)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeState> {
        self.nodes
            .get_mut(id)
            .filter(|slot| !slot.doomed)
            .map(|slot| &mut slot.state)
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.live_slot(id).map(|slot| slot.name.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.live_slot(id).and_then(|slot| slot.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.live_slot(id).map_or(&[], |slot| slot.children.as_slice())
    }

    /// First node named `name` in pre-order, live nodes only.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        let mut order = Vec::new();
        self.collect_live(&mut order);
        order.into_iter().find(|&id| self.nodes[id].name == name)
    }

    /// True if the parent chain of `id` reaches the root.
    pub fn is_live(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = match self.nodes.get(current) {
                Some(slot) if !slot.doomed => slot.parent,
                _ => return false,
            };
        }
        false
    }

    /// Delivers `on_init` to live nodes that have not been initialized,
    /// root to leaf. Returns the number of nodes initialized.
    pub fn init_pending(&mut self, ctx: &mut NodeCtx<'_>) -> usize {
        let order = self.live_order();
        let mut count = 0;
        for &id in &order {
            let slot = &mut self.nodes[id];
            if slot.phase != Phase::Created {
                continue;
            }
            slot.phase = Phase::Initialized;
            count += 1;
            log::trace!("init '{}'", slot.name);
            if let Some(behavior) = slot.behavior.as_mut() {
                behavior.on_init(&slot.state, ctx);
            }
        }
        self.order = order;
        count
    }

    /// Integrates kinematics, refreshes world transforms and delivers
    /// `on_update`, pre-order over live initialized nodes. Returns the number
    /// of nodes visited.
    pub fn update(&mut self, ctx: &mut NodeCtx<'_>) -> usize {
        let order = self.live_order();
        let dt = ctx.time.dt;
        let mut count = 0;
        for &id in &order {
            let parent_world = self.nodes[id]
                .parent
                .and_then(|p| self.nodes.get(p))
                .map_or(Mat4::IDENTITY, |p| p.state.world_transform());

            let slot = &mut self.nodes[id];
            if slot.phase != Phase::Initialized {
                continue;
            }
            slot.state.integrate(dt);
            slot.state.refresh_world(parent_world);
            count += 1;
            if let Some(behavior) = slot.behavior.as_mut() {
                behavior.on_update(&slot.state, ctx);
            }
        }
        self.order = order;
        count
    }

    /// Delivers `on_render`, pre-order over live initialized nodes.
    pub fn render(&mut self, ctx: &mut RenderCtx<'_>) -> usize {
        let order = self.live_order();
        let mut count = 0;
        for &id in &order {
            let slot = &mut self.nodes[id];
            if slot.phase != Phase::Initialized {
                continue;
            }
            count += 1;
            if let Some(behavior) = slot.behavior.as_mut() {
                behavior.on_render(&slot.state, ctx);
            }
        }
        self.order = order;
        count
    }

    /// Destroys subtrees scheduled by [`remove`](Self::remove), delivering
    /// `on_shutdown` to their initialized nodes first (children before
    /// parents).
    pub fn flush_removed(&mut self, ctx: &mut NodeCtx<'_>) -> usize {
        let mut destroyed = 0;
        for top in std::mem::take(&mut self.removed) {
            let mut doomed = Vec::new();
            self.collect_subtree(top, &mut doomed);
            for &id in doomed.iter().rev() {
                self.shut_down(id, ctx);
            }
            for id in doomed {
                if let Some(slot) = self.nodes.remove(id) {
                    log::debug!("node '{}' destroyed", slot.name);
                    destroyed += 1;
                }
            }
        }
        destroyed
    }

    /// Delivers `on_shutdown` to every initialized live node (children
    /// before parents), then to initialized nodes left detached, subtree by
    /// subtree in the same order. Each node is shut down at most once, so
    /// repeated calls are no-ops.
    pub fn shutdown(&mut self, ctx: &mut NodeCtx<'_>) -> usize {
        let order = self.live_order();
        let mut count = 0;
        for &id in order.iter().rev() {
            count += usize::from(self.shut_down(id, ctx));
        }

        let mut tops: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|&(id, slot)| id != self.root && slot.parent.is_none())
            .map(|(id, _)| id)
            .collect();
        tops.sort_unstable();

        let mut subtree = Vec::new();
        for top in tops {
            subtree.clear();
            self.collect_subtree(top, &mut subtree);
            for &id in subtree.iter().rev() {
                count += usize::from(self.shut_down(id, ctx));
            }
        }
        count
    }

    fn shut_down(&mut self, id: NodeId, ctx: &mut NodeCtx<'_>) -> bool {
        let Some(slot) = self.nodes.get_mut(id) else {
            return false;
        };
        if slot.phase != Phase::Initialized {
            return false;
        }
        slot.phase = Phase::ShutDown;
        log::trace!("shutdown '{}'", slot.name);
        if let Some(behavior) = slot.behavior.as_mut() {
            behavior.on_shutdown(ctx);
        }
        true
    }

    fn live_slot(&self, id: NodeId) -> Option<&Slot> {
        self.nodes.get(id).filter(|slot| !slot.doomed)
    }

    fn check(&self, id: NodeId) -> Result<(), TreeError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(TreeError::UnknownNode(id))
        }
    }

    fn unlink(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|&c| c != id);
            }
        }
    }

    /// Pre-order ids of live nodes, reusing the scratch buffer.
    fn live_order(&mut self) -> Vec<NodeId> {
        let mut order = std::mem::take(&mut self.order);
        self.collect_live(&mut order);
        order
    }

    fn collect_live(&self, out: &mut Vec<NodeId>) {
        out.clear();
        self.collect_subtree(self.root, out);
    }

    fn collect_subtree(&self, top: NodeId, out: &mut Vec<NodeId>) {
        let mut stack = vec![top];
        while let Some(id) = stack.pop() {
            let Some(slot) = self.nodes.get(id) else { continue };
            out.push(id);
            stack.extend(slot.children.iter().rev());
        }
    }
}
