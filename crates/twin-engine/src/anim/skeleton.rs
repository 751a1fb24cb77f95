use glam::Mat4;

/// Node of an imported scene hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportNode {
    pub name: String,
    /// Static transform relative to the parent, used when no channel animates the node.
    pub transform: Mat4,
    pub children: Vec<ImportNode>,
}

impl ImportNode {
    pub fn new(name: impl Into<String>, transform: Mat4) -> Self {
        Self {
            name: name.into(),
            transform,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: ImportNode) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first search by name.
    pub fn find(&self, name: &str) -> Option<&ImportNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

/// Influence of a bone on one vertex of its mesh.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VertexWeight {
    pub vertex: u32,
    pub weight: f32,
}

/// Bone of an imported mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportBone {
    pub name: String,
    /// Mesh space → bone space (inverse bind) transform.
    pub offset: Mat4,
    pub weights: Vec<VertexWeight>,
}
