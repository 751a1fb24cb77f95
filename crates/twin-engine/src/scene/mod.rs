//! Scene node tree.
//!
//! Nodes live in an arena owned by [`SceneTree`]. Only nodes whose parent
//! chain reaches the root are *live* and receive lifecycle broadcasts:
//! `init` once, `update` once per frame, `render` once per eye, `shutdown`
//! once. Drawables and lights are node behaviors.

mod behavior;
mod geometry;
mod light;
mod mesh;
mod node;
mod tree;

pub use behavior::{NodeBehavior, NodeCtx};
pub use geometry::{cube, plane, MeshEntry, MeshGeometry, SkinnedVertex, VertexBoneData, BONES_PER_VERTEX};
pub use light::{
    Attenuation, Light, LightKind, LightNode, LightProps, LightSet, ResolvedLight, MAX_POINT_LIGHTS, MAX_SPOT_LIGHTS,
};
pub use mesh::{MeshEvent, MeshProps, SkinnedMesh, StaticMesh};
pub use node::NodeState;
pub use tree::{NodeId, SceneTree, TreeError};
