use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Bone influences stored per vertex.
pub const BONES_PER_VERTEX: usize = 4;

/// Interleaved vertex shared by rigid and skinned meshes (64 bytes).
///
/// Rigid geometry leaves all weights at zero; the shader then skips skinning.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SkinnedVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
    pub bone_ids: [u32; BONES_PER_VERTEX],
    pub weights: [f32; BONES_PER_VERTEX],
}

impl SkinnedVertex {
    pub fn rigid(position: Vec3, uv: Vec2, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            uv: uv.to_array(),
            normal: normal.to_array(),
            bone_ids: [0; BONES_PER_VERTEX],
            weights: [0.0; BONES_PER_VERTEX],
        }
    }

    pub fn with_bones(mut self, bones: VertexBoneData) -> Self {
        self.bone_ids = bones.ids;
        self.weights = bones.weights;
        self
    }
}

/// Up to four bone influences of one vertex.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct VertexBoneData {
    pub ids: [u32; BONES_PER_VERTEX],
    pub weights: [f32; BONES_PER_VERTEX],
}

impl VertexBoneData {
    /// Stores the influence in the first empty slot. A fifth influence is
    /// dropped with a warning and `false` is returned.
    pub fn add(&mut self, bone: u32, weight: f32) -> bool {
        match self.weights.iter().position(|&w| w == 0.0) {
            Some(slot) => {
                self.ids[slot] = bone;
                self.weights[slot] = weight;
                true
            }
            None => {
                log::warn!("vertex already has {BONES_PER_VERTEX} bone influences; dropping bone {bone} ({weight})");
                false
            }
        }
    }
}

/// One draw range inside a [`MeshGeometry`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MeshEntry {
    pub base_index: u32,
    pub index_count: u32,
    pub base_vertex: i32,
    /// Index into the model's materials.
    pub material: Option<usize>,
}

/// Vertices and indices of every primitive of a model, concatenated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshGeometry {
    pub vertices: Vec<SkinnedVertex>,
    pub indices: Vec<u32>,
    pub entries: Vec<MeshEntry>,
}

impl MeshGeometry {
    /// Appends a primitive. Indices are relative to its own vertices.
    pub fn push(&mut self, vertices: &[SkinnedVertex], indices: &[u32], material: Option<usize>) {
        self.entries.push(MeshEntry {
            base_index: self.indices.len() as u32,
            index_count: indices.len() as u32,
            base_vertex: self.vertices.len() as i32,
            material,
        });
        self.vertices.extend_from_slice(vertices);
        self.indices.extend_from_slice(indices);
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Axis-aligned cube of edge `size` centred on the origin, 24 vertices
/// with per-face normals, counter-clockwise front faces.
pub fn cube(size: f32) -> MeshGeometry {
    let h = size * 0.5;
    // (normal, tangent u, tangent v) per face.
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = (normal + u * su + v * sv) * h;
            let uv = Vec2::new((su + 1.0) * 0.5, (1.0 - sv) * 0.5);
            vertices.push(SkinnedVertex::rigid(position, uv, normal));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    let mut geometry = MeshGeometry::default();
    geometry.push(&vertices, &indices, Some(0));
    geometry
}

/// Horizontal square of edge `size` facing +Y, texture repeated `uv_repeat`
/// times along each axis.
pub fn plane(size: f32, uv_repeat: f32) -> MeshGeometry {
    let h = size * 0.5;
    let corners = [
        (Vec3::new(-h, 0.0, h), Vec2::new(0.0, uv_repeat)),
        (Vec3::new(h, 0.0, h), Vec2::new(uv_repeat, uv_repeat)),
        (Vec3::new(h, 0.0, -h), Vec2::new(uv_repeat, 0.0)),
        (Vec3::new(-h, 0.0, -h), Vec2::ZERO),
    ];
    let vertices: Vec<_> = corners
        .iter()
        .map(|&(p, uv)| SkinnedVertex::rigid(p, uv, Vec3::Y))
        .collect();

    let mut geometry = MeshGeometry::default();
    geometry.push(&vertices, &[0, 1, 2, 0, 2, 3], Some(0));
    geometry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_64_bytes() {
        assert_eq!(std::mem::size_of::<SkinnedVertex>(), 64);
    }

    // ── bone slots ──────────────────────────────────────────────────────

    #[test]
    fn bone_data_fills_first_empty_slot() {
        let mut data = VertexBoneData::default();
        assert!(data.add(3, 0.5));
        assert!(data.add(7, 0.25));
        assert_eq!(data.ids[..2], [3, 7]);
        assert_eq!(data.weights[..2], [0.5, 0.25]);
    }

    #[test]
    fn fifth_influence_is_dropped() {
        let mut data = VertexBoneData::default();
        for bone in 0..4 {
            assert!(data.add(bone, 0.25));
        }
        assert!(!data.add(9, 0.1));
        assert_eq!(data.ids, [0, 1, 2, 3]);
    }

    // ── builders ────────────────────────────────────────────────────────

    #[test]
    fn push_offsets_entries() {
        let mut geometry = plane(1.0, 1.0);
        let cube = cube(1.0);
        geometry.push(&cube.vertices, &cube.indices, None);

        assert_eq!(geometry.entries[1].base_vertex, 4);
        assert_eq!(geometry.entries[1].base_index, 6);
        assert_eq!(geometry.entries[1].index_count, 36);
        assert_eq!(geometry.index_bytes().len(), 42 * 4);
    }

    #[test]
    fn cube_faces_wind_counter_clockwise_outward() {
        let cube = cube(2.0);
        for tri in cube.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from(cube.vertices[i as usize].position));
            let n = Vec3::from(cube.vertices[tri[0] as usize].normal);
            assert!((b - a).cross(c - a).dot(n) > 0.0);
            assert!((a.dot(n) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn plane_faces_up() {
        let plane = plane(4.0, 2.0);
        let [a, b, c] = [0, 1, 2].map(|i| Vec3::from(plane.vertices[plane.indices[i] as usize].position));
        assert!((b - a).cross(c - a).dot(Vec3::Y) > 0.0);
    }
}
