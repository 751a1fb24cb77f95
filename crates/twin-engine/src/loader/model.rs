use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};
use gltf::animation::util::ReadOutputs;
use gltf::animation::Interpolation;

use crate::anim::{AnimationClip, Channel, ImportBone, ImportNode, QuatKey, SkeletalAnimator, VectorKey, VertexWeight};
use crate::render::MAX_BONES;
use crate::resource::{Bitmap, PixelFormat};
use crate::scene::{MeshGeometry, SkinnedVertex, VertexBoneData};

use super::{EmbeddedAssets, LoadError, ResourceUri};

/// Name of the identity node every imported hierarchy hangs from.
const ROOT_NAME: &str = "<model>";

/// Material of an imported model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMaterial {
    pub name: String,
    /// Multiplied with the texture; the whole colour when there is none.
    pub base_color: Vec4,
    pub texture: Option<Bitmap>,
}

/// A model imported and flattened on a loader worker, ready for upload.
///
/// Rigid primitives have their node transforms baked into the vertices;
/// skinned primitives stay in bind space and are posed by the animator.
#[derive(Debug, Clone)]
pub struct PreparedModel {
    pub geometry: MeshGeometry,
    /// Present when the model has at least one skin.
    pub animator: Option<SkeletalAnimator>,
    pub materials: Vec<ModelMaterial>,
}

/// Imports a glTF/GLB model.
///
/// Local paths go through the file importer so relative buffer and image
/// references resolve; other sources must be self-contained.
pub fn import_model(uri: &ResourceUri, assets: &EmbeddedAssets) -> Result<PreparedModel, LoadError> {
    let imported = match uri.local_path() {
        Some(path) => {
            if !path.exists() {
                return Err(LoadError::NotFound(path.to_path_buf()));
            }
            gltf::import(path)
        }
        None => gltf::import_slice(uri.read_bytes(assets)?),
    };
    let (document, buffers, images) = imported.map_err(|e| LoadError::Import(e.to_string()))?;
    build_model(&document, &buffers, &images)
}

pub(crate) fn build_model(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    images: &[gltf::image::Data],
) -> Result<PreparedModel, LoadError> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| LoadError::Import("document contains no scene".to_owned()))?;

    let mut builder = Builder {
        buffers,
        geometry: MeshGeometry::default(),
        bones: Vec::new(),
    };
    let mut root = ImportNode::new(ROOT_NAME, Mat4::IDENTITY);
    for node in scene.nodes() {
        root.children.push(builder.visit(&node, Mat4::IDENTITY));
    }

    let Builder {
        mut geometry, bones, ..
    } = builder;
    if geometry.is_empty() {
        return Err(LoadError::Import("model contains no triangle geometry".to_owned()));
    }

    if bones.len() > MAX_BONES {
        log::warn!(
            "model has {} bones but only {MAX_BONES} can be skinned; vertices bound to the rest stay in bind pose",
            bones.len()
        );
    }

    let animator = (!bones.is_empty()).then(|| {
        let mut animator = SkeletalAnimator::new(root);
        let mut influences = vec![VertexBoneData::default(); geometry.vertices.len()];
        for bone in &bones {
            let id = animator.register_bone(&bone.name, bone.offset);
            if id >= MAX_BONES {
                continue;
            }
            let id = id as u32;
            for w in &bone.weights {
                if let Some(slot) = influences.get_mut(w.vertex as usize) {
                    slot.add(id, w.weight);
                }
            }
        }
        for (vertex, data) in geometry.vertices.iter_mut().zip(influences) {
            *vertex = vertex.with_bones(data);
        }
        for (index, animation) in document.animations().enumerate() {
            animator.add_clip(import_clip(index, &animation, buffers));
        }
        animator
    });

    let materials = import_materials(document, images);
    log::debug!(
        "imported model: {} vertices, {} entries, {} bones, {} materials",
        geometry.vertices.len(),
        geometry.entries.len(),
        bones.len(),
        materials.len()
    );

    Ok(PreparedModel {
        geometry,
        animator,
        materials,
    })
}

struct Builder<'a> {
    buffers: &'a [gltf::buffer::Data],
    geometry: MeshGeometry,
    /// Registration order defines the bone ids.
    bones: Vec<ImportBone>,
}

impl Builder<'_> {
    fn visit(&mut self, node: &gltf::Node<'_>, parent_global: Mat4) -> ImportNode {
        let local = Mat4::from_cols_array_2d(&node.transform().matrix());
        let global = parent_global * local;
        let mut import = ImportNode::new(node_name(node), local);

        if let Some(mesh) = node.mesh() {
            let joints = node.skin().map(|skin| self.skin_bones(&skin));
            for primitive in mesh.primitives() {
                self.primitive(&primitive, global, joints.as_deref());
            }
        }
        for child in node.children() {
            import.children.push(self.visit(&child, global));
        }
        import
    }

    /// Maps each joint slot of `skin` to a bone, registering new bones.
    fn skin_bones(&mut self, skin: &gltf::Skin<'_>) -> Vec<usize> {
        let buffers = self.buffers;
        let reader = skin.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));
        let inverse_binds: Vec<Mat4> = reader
            .read_inverse_bind_matrices()
            .map(|it| it.map(|m| Mat4::from_cols_array_2d(&m)).collect())
            .unwrap_or_default();

        skin.joints()
            .enumerate()
            .map(|(slot, joint)| {
                let name = node_name(&joint);
                if let Some(existing) = self.bones.iter().position(|b| b.name == name) {
                    return existing;
                }
                self.bones.push(ImportBone {
                    name,
                    offset: inverse_binds.get(slot).copied().unwrap_or(Mat4::IDENTITY),
                    weights: Vec::new(),
                });
                self.bones.len() - 1
            })
            .collect()
    }

    fn primitive(&mut self, primitive: &gltf::Primitive<'_>, global: Mat4, joints: Option<&[usize]>) {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!("skipping primitive with mode {:?}", primitive.mode());
            return;
        }

        let buffers = self.buffers;
        let reader = primitive.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));
        let Some(positions) = reader.read_positions() else {
            log::warn!("skipping primitive without positions");
            return;
        };
        let positions: Vec<Vec3> = positions.map(Vec3::from).collect();
        let count = positions.len();
        let normals: Vec<Vec3> = reader
            .read_normals()
            .map(|it| it.map(Vec3::from).collect())
            .unwrap_or_else(|| vec![Vec3::Y; count]);
        let uvs: Vec<Vec2> = reader
            .read_tex_coords(0)
            .map(|it| it.into_f32().map(Vec2::from).collect())
            .unwrap_or_default();
        let indices: Vec<u32> = reader
            .read_indices()
            .map(|it| it.into_u32().collect())
            .unwrap_or_else(|| (0..count as u32).collect());

        let normal_matrix = Mat3::from_mat4(global).inverse().transpose();
        let vertices: Vec<SkinnedVertex> = (0..count)
            .map(|i| {
                let normal = normals.get(i).copied().unwrap_or(Vec3::Y);
                let (p, n) = if joints.is_some() {
                    (positions[i], normal)
                } else {
                    (global.transform_point3(positions[i]), (normal_matrix * normal).normalize_or_zero())
                };
                SkinnedVertex::rigid(p, uvs.get(i).copied().unwrap_or(Vec2::ZERO), n)
            })
            .collect();

        let base_vertex = self.geometry.vertices.len() as u32;
        if let (Some(joints), Some(ids), Some(weights)) = (joints, reader.read_joints(0), reader.read_weights(0)) {
            for (i, (ids, weights)) in ids.into_u16().zip(weights.into_f32()).enumerate() {
                for (joint, weight) in ids.into_iter().zip(weights) {
                    if weight <= 0.0 {
                        continue;
                    }
                    let Some(&bone) = joints.get(usize::from(joint)) else {
                        log::warn!("vertex {i} references joint {joint} outside its skin");
                        continue;
                    };
                    self.bones[bone].weights.push(VertexWeight {
                        vertex: base_vertex + i as u32,
                        weight,
                    });
                }
            }
        }

        self.geometry.push(&vertices, &indices, primitive.material().index());
    }
}

fn node_name(node: &gltf::Node<'_>) -> String {
    node.name()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("node{}", node.index()))
}

/// glTF keys are in seconds, so clips run at one tick per second.
fn import_clip(index: usize, animation: &gltf::Animation<'_>, buffers: &[gltf::buffer::Data]) -> AnimationClip {
    let mut channels: Vec<(usize, Channel)> = Vec::new();
    let mut duration = 0.0f32;

    for channel in animation.channels() {
        let node = channel.target().node();
        let reader = channel.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));
        let (Some(inputs), Some(outputs)) = (reader.read_inputs(), reader.read_outputs()) else {
            continue;
        };
        let times: Vec<f32> = inputs.collect();
        duration = times.iter().copied().fold(duration, f32::max);
        let cubic = channel.sampler().interpolation() == Interpolation::CubicSpline;

        let slot = match channels.iter().position(|(i, _)| *i == node.index()) {
            Some(slot) => slot,
            None => {
                channels.push((node.index(), static_channel(&node)));
                channels.len() - 1
            }
        };
        let target = &mut channels[slot].1;

        match outputs {
            ReadOutputs::Translations(values) => {
                target.positions = vector_keys(&times, spline_values(values.map(Vec3::from).collect(), cubic));
            }
            ReadOutputs::Scales(values) => {
                target.scales = vector_keys(&times, spline_values(values.map(Vec3::from).collect(), cubic));
            }
            ReadOutputs::Rotations(values) => {
                let values = spline_values(values.into_f32().map(Quat::from_array).collect(), cubic);
                target.rotations = times
                    .iter()
                    .zip(values)
                    .map(|(&time, value)| QuatKey {
                        time,
                        value: value.normalize(),
                    })
                    .collect();
            }
            ReadOutputs::MorphTargetWeights(_) => {
                log::debug!("ignoring morph target animation on '{}'", node_name(&node));
            }
        }
    }

    AnimationClip {
        name: animation
            .name()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("animation{index}")),
        ticks_per_second: 1.0,
        duration,
        channels: channels.into_iter().map(|(_, channel)| channel).collect(),
    }
}

/// Channel holding the node's static transform as single keys.
fn static_channel(node: &gltf::Node<'_>) -> Channel {
    let (translation, rotation, scale) = node.transform().decomposed();
    Channel {
        node_name: node_name(node),
        positions: vec![VectorKey {
            time: 0.0,
            value: Vec3::from(translation),
        }],
        rotations: vec![QuatKey {
            time: 0.0,
            value: Quat::from_array(rotation),
        }],
        scales: vec![VectorKey {
            time: 0.0,
            value: Vec3::from(scale),
        }],
    }
}

/// Cubic-spline outputs are (in-tangent, value, out-tangent) triplets;
/// only the values are kept.
fn spline_values<T: Copy>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.chunks_exact(3).map(|triplet| triplet[1]).collect()
    } else {
        values
    }
}

fn vector_keys(times: &[f32], values: Vec<Vec3>) -> Vec<VectorKey> {
    times
        .iter()
        .zip(values)
        .map(|(&time, value)| VectorKey { time, value })
        .collect()
}

fn import_materials(document: &gltf::Document, images: &[gltf::image::Data]) -> Vec<ModelMaterial> {
    document
        .materials()
        .enumerate()
        .map(|(index, material)| {
            let pbr = material.pbr_metallic_roughness();
            let texture = pbr
                .base_color_texture()
                .and_then(|info| images.get(info.texture().source().index()))
                .and_then(bitmap_from_gltf);
            ModelMaterial {
                name: material
                    .name()
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("material{index}")),
                base_color: Vec4::from(pbr.base_color_factor()),
                texture,
            }
        })
        .collect()
}

fn bitmap_from_gltf(image: &gltf::image::Data) -> Option<Bitmap> {
    use gltf::image::Format;

    let format = match image.format {
        Format::R8 => PixelFormat::R8,
        Format::R8G8 => PixelFormat::Rg8,
        Format::R8G8B8A8 => PixelFormat::Rgba8,
        Format::R8G8B8 => return Some(Bitmap::from_rgb(image.width, image.height, &image.pixels)),
        other => {
            log::warn!("unsupported texture format {other:?}; material left untextured");
            return None;
        }
    };
    Some(Bitmap {
        width: image.width,
        height: image.height,
        format,
        pixels: image.pixels.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One triangle under an unnamed, translated node with a red material.
    const RIGID: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "translation": [0.0, 0.0, -2.0] }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }] }],
        "materials": [{ "pbrMetallicRoughness": { "baseColorFactor": [1.0, 0.0, 0.0, 1.0] } }],
        "buffers": [{ "byteLength": 44, "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAABAAIAAAA=" }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 6 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    }"#;

    /// Triangle skinned to "hip" and an unnamed child joint one unit above
    /// it; the child's translation is animated from y = 1 to y = 3 over two
    /// seconds.
    const SKINNED: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0, 1] }],
        "nodes": [
            { "name": "body", "mesh": 0, "skin": 0 },
            { "name": "hip", "children": [2] },
            { "translation": [0.0, 1.0, 0.0] }
        ],
        "skins": [{ "joints": [1, 2], "inverseBindMatrices": 3 }],
        "meshes": [{ "primitives": [{
            "attributes": { "POSITION": 0, "JOINTS_0": 1, "WEIGHTS_0": 2 },
            "indices": 6
        }] }],
        "animations": [{
            "name": "raise",
            "channels": [{ "sampler": 0, "target": { "node": 2, "path": "translation" } }],
            "samplers": [{ "input": 4, "output": 5, "interpolation": "LINEAR" }]
        }],
        "buffers": [{ "byteLength": 264, "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAABAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAAAAAACAPwAAgD8AAAAAAAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAIC/AAAAAAAAgD8AAAAAAAAAQAAAAAAAAIA/AAAAAAAAAAAAAEBAAAAAAAAAAQACAAAA" }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 12 },
            { "buffer": 0, "byteOffset": 48, "byteLength": 48 },
            { "buffer": 0, "byteOffset": 96, "byteLength": 128 },
            { "buffer": 0, "byteOffset": 224, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 232, "byteLength": 24 },
            { "buffer": 0, "byteOffset": 256, "byteLength": 6 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5121, "count": 3, "type": "VEC4" },
            { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4" },
            { "bufferView": 3, "componentType": 5126, "count": 2, "type": "MAT4" },
            { "bufferView": 4, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0.0], "max": [2.0] },
            { "bufferView": 5, "componentType": 5126, "count": 2, "type": "VEC3" },
            { "bufferView": 6, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    }"#;

    /// `SKINNED` plus a rigid prop reusing the triangle, two units back.
    const SKINNED_WITH_PROP: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0, 1, 3] }],
        "nodes": [
            { "name": "body", "mesh": 0, "skin": 0 },
            { "name": "hip", "children": [2] },
            { "translation": [0.0, 1.0, 0.0] },
            { "name": "prop", "mesh": 1, "translation": [0.0, 0.0, -2.0] }
        ],
        "skins": [{ "joints": [1, 2], "inverseBindMatrices": 3 }],
        "meshes": [
            { "primitives": [{ "attributes": { "POSITION": 0, "JOINTS_0": 1, "WEIGHTS_0": 2 }, "indices": 6 }] },
            { "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 6 }] }
        ],
        "buffers": [{ "byteLength": 264, "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAABAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAAAAAACAPwAAgD8AAAAAAAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAIC/AAAAAAAAgD8AAAAAAAAAQAAAAAAAAIA/AAAAAAAAAAAAAEBAAAAAAAAAAQACAAAA" }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 12 },
            { "buffer": 0, "byteOffset": 48, "byteLength": 48 },
            { "buffer": 0, "byteOffset": 96, "byteLength": 128 },
            { "buffer": 0, "byteOffset": 224, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 232, "byteLength": 24 },
            { "buffer": 0, "byteOffset": 256, "byteLength": 6 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5121, "count": 3, "type": "VEC4" },
            { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4" },
            { "bufferView": 3, "componentType": 5126, "count": 2, "type": "MAT4" },
            { "bufferView": 4, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0.0], "max": [2.0] },
            { "bufferView": 5, "componentType": 5126, "count": 2, "type": "VEC3" },
            { "bufferView": 6, "componentType": 5123, "count": 3, "type": "SCALAR" }
        ]
    }"#;

    /// A triangle skinned to a flat skeleton of `MAX_BONES + 1` joints.
    /// Vertex 0 is bound to the last joint, the others to the first.
    fn oversized_skeleton() -> &'static str {
        let joints = MAX_BONES + 1;
        let joint_nodes: Vec<String> = (0..joints).map(|i| format!(r#"{{ "name": "j{i}" }}"#)).collect();
        let joint_ids: Vec<String> = (1..=joints).map(|i| i.to_string()).collect();
        let json = format!(
            r#"{{
            "asset": {{ "version": "2.0" }},
            "scene": 0,
            "scenes": [{{ "nodes": [0, {ids}] }}],
            "nodes": [{{ "name": "body", "mesh": 0, "skin": 0 }}, {nodes}],
            "skins": [{{ "joints": [{ids}] }}],
            "meshes": [{{ "primitives": [{{
                "attributes": {{ "POSITION": 0, "JOINTS_0": 1, "WEIGHTS_0": 2 }},
                "indices": 3
            }}] }}],
            "buffers": [{{ "byteLength": 102, "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAZAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAAAAAAABAAIA" }}],
            "bufferViews": [
                {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
                {{ "buffer": 0, "byteOffset": 36, "byteLength": 12 }},
                {{ "buffer": 0, "byteOffset": 48, "byteLength": 48 }},
                {{ "buffer": 0, "byteOffset": 96, "byteLength": 6 }}
            ],
            "accessors": [
                {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
                {{ "bufferView": 1, "componentType": 5121, "count": 3, "type": "VEC4" }},
                {{ "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4" }},
                {{ "bufferView": 3, "componentType": 5123, "count": 3, "type": "SCALAR" }}
            ]
        }}"#,
            ids = joint_ids.join(", "),
            nodes = joint_nodes.join(", "),
        );
        Box::leak(json.into_boxed_str())
    }

    fn import(json: &'static str) -> PreparedModel {
        let assets = EmbeddedAssets::new().with("model.gltf", json.as_bytes());
        import_model(&ResourceUri::parse("res:model.gltf"), &assets).expect("fixture imports")
    }

    // ── rigid geometry ──────────────────────────────────────────────────

    #[test]
    fn rigid_node_transform_is_baked() {
        let model = import(RIGID);
        assert!(model.animator.is_none());
        assert_eq!(model.geometry.vertices.len(), 3);
        assert_eq!(model.geometry.indices, vec![0, 1, 2]);
        assert_eq!(model.geometry.vertices[1].position, [1.0, 0.0, -2.0]);
        assert_eq!(model.geometry.entries[0].material, Some(0));
    }

    #[test]
    fn material_base_color_is_imported() {
        let model = import(RIGID);
        assert_eq!(model.materials.len(), 1);
        assert_eq!(model.materials[0].name, "material0");
        assert_eq!(model.materials[0].base_color, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert!(model.materials[0].texture.is_none());
    }

    // ── skins & animation ───────────────────────────────────────────────

    #[test]
    fn joints_become_bones_in_skin_order() {
        let model = import(SKINNED);
        let animator = model.animator.expect("skinned model has an animator");
        assert_eq!(animator.bone_index("hip"), Some(0));
        assert_eq!(animator.bone_index("node2"), Some(1));

        let v = &model.geometry.vertices;
        assert_eq!((v[0].bone_ids[0], v[0].weights[0]), (0, 1.0));
        assert_eq!((v[2].bone_ids[0], v[2].weights[0]), (1, 1.0));
        // Skinned vertices stay in bind space.
        assert_eq!(v[2].position, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn rigid_parts_of_a_skinned_model_are_baked_without_weights() {
        let model = import(SKINNED_WITH_PROP);
        assert!(model.animator.is_some());
        assert_eq!(model.geometry.entries.len(), 2);

        let v = &model.geometry.vertices;
        assert_eq!(v.len(), 6);
        assert_eq!(v[2].weights[0], 1.0);
        for prop in &v[3..] {
            assert_eq!(prop.weights, [0.0; 4]);
        }
        assert_eq!(v[4].position, [1.0, 0.0, -2.0]);
        assert_eq!(v[5].position, [0.0, 1.0, -2.0]);
    }

    #[test]
    fn influences_past_the_bone_limit_are_dropped() {
        let model = import(oversized_skeleton());
        let animator = model.animator.expect("animator");
        assert_eq!(animator.bone_count(), MAX_BONES + 1);

        let v = &model.geometry.vertices;
        assert_eq!(v[0].weights, [0.0; 4]);
        assert_eq!((v[1].bone_ids[0], v[1].weights[0]), (0, 1.0));
    }

    #[test]
    fn missing_attributes_are_filled_from_the_node() {
        let model = import(SKINNED);
        let animator = model.animator.expect("animator");
        let clip = &animator.clips()[0];
        assert_eq!(clip.name, "raise");
        assert_eq!(clip.ticks_per_second, 1.0);
        assert_eq!(clip.duration, 2.0);

        let channel = &clip.channels[0];
        assert_eq!(channel.node_name, "node2");
        assert_eq!(channel.positions.len(), 2);
        assert_eq!(channel.rotations.len(), 1);
        assert_eq!(channel.scales[0].value, Vec3::ONE);
    }

    #[test]
    fn sampled_palette_follows_the_animation() {
        let model = import(SKINNED);
        let mut animator = model.animator.expect("animator");

        let palette = animator.sample(1.0);
        assert!(palette[0].abs_diff_eq(Mat4::IDENTITY, 1e-5));
        // Child sits at y = 2 at t = 1; its bind pose was y = 1.
        let moved = palette[1].transform_point3(Vec3::ZERO);
        assert!((moved - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-5);
    }

    // ── failures ────────────────────────────────────────────────────────

    #[test]
    fn garbage_is_an_import_error() {
        let assets = EmbeddedAssets::new().with("bad.gltf", b"not a model");
        let err = import_model(&ResourceUri::parse("res:bad.gltf"), &assets).unwrap_err();
        assert!(matches!(err, LoadError::Import(_)));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = import_model(&ResourceUri::parse("/definitely/not/here.glb"), &EmbeddedAssets::new()).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[test]
    fn spline_keeps_middle_values() {
        assert_eq!(spline_values(vec![0, 1, 2, 3, 4, 5], true), vec![1, 4]);
        assert_eq!(spline_values(vec![0, 1, 2], false), vec![0, 1, 2]);
    }
}
