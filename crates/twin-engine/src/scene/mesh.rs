use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender, unbounded};
use glam::{Mat4, Vec4};

use crate::anim::SkeletalAnimator;
use crate::gpu::{DrawIndexed, GpuBackend, SamplerSpec};
use crate::loader::{import_model, Completion, LoaderHandle, PreparedModel};
use crate::render::{MaterialParams, RenderCtx};
use crate::resource::{
    Buffer, BufferTarget, ChangeFeed, ResourceStatus, SourceState, Texture, TextureFilter, TextureProps, TextureWrap,
};

use super::{MeshEntry, MeshGeometry, NodeBehavior, NodeCtx, NodeState};

/// Property change notifications of a mesh.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshEvent {
    SourceChanged(String),
    StatusChanged(ResourceStatus),
    SpecularChanged { intensity: f32, power: f32 },
}

#[derive(Debug)]
struct Pending {
    source: SourceState,
    specular_intensity: f32,
    specular_power: f32,
}

#[derive(Debug)]
struct Shared {
    pending: Mutex<Pending>,
    feed: ChangeFeed<MeshEvent>,
    loader: LoaderHandle,
    completions: Sender<Completion<PreparedModel>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request(&self, source: String, generation: u64) {
        self.loader
            .submit(&source, generation, self.completions.clone(), import_model);
    }
}

/// Thread-safe property handle of a [`SkinnedMesh`].
#[derive(Debug, Clone)]
pub struct MeshProps {
    shared: Arc<Shared>,
}

impl MeshProps {
    /// Requests an import of `source`. Status becomes `Loading` before this
    /// returns; the previous model keeps drawing until the new one is ready.
    pub fn set_source(&self, source: &str) {
        let (request, status) = {
            let mut pending = self.shared.lock();
            let before = pending.source.generation();
            let request = pending.source.set_source(source);
            if pending.source.generation() == before {
                return;
            }
            (request, pending.source.status())
        };

        self.shared.feed.publish(&[
            MeshEvent::SourceChanged(source.to_owned()),
            MeshEvent::StatusChanged(status),
        ]);
        if let Some(generation) = request {
            self.shared.request(source.to_owned(), generation);
        }
    }

    pub fn reload(&self) {
        let request = {
            let mut pending = self.shared.lock();
            pending
                .source
                .reload()
                .map(|generation| (pending.source.source().to_owned(), generation))
        };
        if let Some((source, generation)) = request {
            self.shared
                .feed
                .publish(&[MeshEvent::StatusChanged(ResourceStatus::Loading)]);
            self.shared.request(source, generation);
        }
    }

    pub fn set_specular(&self, intensity: f32, power: f32) {
        let changed = {
            let mut pending = self.shared.lock();
            let changed = pending.specular_intensity != intensity || pending.specular_power != power;
            pending.specular_intensity = intensity;
            pending.specular_power = power;
            changed
        };
        if changed {
            self.shared
                .feed
                .publish(&[MeshEvent::SpecularChanged { intensity, power }]);
        }
    }

    pub fn source(&self) -> String {
        self.shared.lock().source.source().to_owned()
    }

    pub fn status(&self) -> ResourceStatus {
        self.shared.lock().source.status()
    }

    pub fn specular(&self) -> (f32, f32) {
        let pending = self.shared.lock();
        (pending.specular_intensity, pending.specular_power)
    }

    pub fn revision(&self) -> u64 {
        self.shared.feed.revision()
    }

    pub fn subscribe(&self) -> Receiver<MeshEvent> {
        self.shared.feed.subscribe()
    }
}

/// Behavior drawing an imported, optionally skinned model.
///
/// Imports run on the loader; the render thread swaps GPU objects in during
/// `update` once a model for the current generation arrives.
pub struct SkinnedMesh {
    label: String,
    shared: Arc<Shared>,
    completions: Receiver<Completion<PreparedModel>>,
    staged: Option<(u64, PreparedModel)>,
    drawable: Option<Drawable>,
    animator: Option<SkeletalAnimator>,
    specular: (f32, f32),
}

impl SkinnedMesh {
    pub fn new(label: impl Into<String>, loader: LoaderHandle) -> Self {
        let (tx, rx) = unbounded();
        let defaults = MaterialParams::default();
        Self {
            label: label.into(),
            shared: Arc::new(Shared {
                pending: Mutex::new(Pending {
                    source: SourceState::default(),
                    specular_intensity: defaults.specular_intensity,
                    specular_power: defaults.specular_power,
                }),
                feed: ChangeFeed::new(),
                loader,
                completions: tx,
            }),
            completions: rx,
            staged: None,
            drawable: None,
            animator: None,
            specular: (defaults.specular_intensity, defaults.specular_power),
        }
    }

    pub fn props(&self) -> MeshProps {
        MeshProps {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn status(&self) -> ResourceStatus {
        self.shared.lock().source.status()
    }

    /// Bone palette sampled during the last update; empty for rigid models.
    pub fn palette(&self) -> &[Mat4] {
        self.animator.as_ref().map_or(&[], |a| a.palette())
    }

    /// Drains finished imports. Returns the number accepted.
    pub fn pump(&mut self) -> usize {
        let mut accepted = 0;
        let mut events = Vec::new();

        for done in self.completions.try_iter() {
            let mut pending = self.shared.lock();
            if !pending.source.is_current(done.generation) {
                log::debug!(
                    "mesh '{}': discarding stale import of '{}' (generation {})",
                    self.label,
                    done.source,
                    done.generation
                );
                continue;
            }

            accepted += 1;
            let status = match done.result {
                Ok(model) => {
                    self.staged = Some((done.generation, model));
                    ResourceStatus::Processing
                }
                Err(err) => {
                    log::error!("mesh '{}': failed to import '{}': {err}", self.label, done.source);
                    ResourceStatus::Error
                }
            };
            if pending.source.set_status(status) {
                events.push(MeshEvent::StatusChanged(status));
            }
        }

        self.shared.feed.publish(&events);
        accepted
    }

    fn install(&mut self, model: PreparedModel, ctx: &mut NodeCtx<'_>) {
        if let Some(mut old) = self.drawable.take() {
            old.release(ctx.gpu);
        }

        let materials = model
            .materials
            .into_iter()
            .enumerate()
            .map(|(i, material)| DrawMaterial {
                base_color: material.base_color,
                texture: material.texture.map(|bitmap| {
                    Texture::from_bitmap(
                        format!("{} material {i}", self.label),
                        ctx.loader.clone(),
                        bitmap,
                        SamplerSpec {
                            filter: TextureFilter::Anisotropic,
                            wrap_s: TextureWrap::Repeat,
                            wrap_t: TextureWrap::Repeat,
                        },
                    )
                }),
            })
            .collect();

        self.drawable = Some(Drawable::new(&self.label, &model.geometry, materials));
        self.animator = model.animator;
        log::info!(
            "mesh '{}': model ready ({} entries, {} bones)",
            self.label,
            model.geometry.entries.len(),
            self.animator.as_ref().map_or(0, SkeletalAnimator::bone_count)
        );
    }
}

impl NodeBehavior for SkinnedMesh {
    fn on_update(&mut self, _node: &NodeState, ctx: &mut NodeCtx<'_>) {
        self.pump();

        if let Some((generation, model)) = self.staged.take() {
            if self.shared.lock().source.is_current(generation) {
                self.install(model, ctx);
                let ready = {
                    let mut pending = self.shared.lock();
                    if pending.source.is_current(generation) {
                        pending.source.set_status(ResourceStatus::Ready)
                    } else {
                        false
                    }
                };
                if ready {
                    self.shared
                        .feed
                        .publish(&[MeshEvent::StatusChanged(ResourceStatus::Ready)]);
                }
            } else {
                log::debug!("mesh '{}': dropping staged import of generation {generation}", self.label);
            }
        }
        self.specular = {
            let pending = self.shared.lock();
            (pending.specular_intensity, pending.specular_power)
        };

        if let Some(drawable) = self.drawable.as_mut() {
            if drawable.apply(ctx.gpu) == Some(ResourceStatus::Error) {
                let failed = self.shared.lock().source.set_status(ResourceStatus::Error);
                if failed {
                    self.shared
                        .feed
                        .publish(&[MeshEvent::StatusChanged(ResourceStatus::Error)]);
                }
            }
        }
        if let Some(animator) = self.animator.as_mut() {
            animator.sample(ctx.time.t);
        }
    }

    fn on_render(&mut self, node: &NodeState, ctx: &mut RenderCtx<'_>) {
        let Some(drawable) = self.drawable.as_ref() else { return };
        let (specular_intensity, specular_power) = self.specular;
        let bones = self.animator.as_ref().map_or(&[][..], |a| a.palette());
        drawable.draw(node.world_transform(), bones, specular_intensity, specular_power, ctx.gpu);
    }

    fn on_shutdown(&mut self, ctx: &mut NodeCtx<'_>) {
        if let Some(mut drawable) = self.drawable.take() {
            drawable.release(ctx.gpu);
        }
        self.animator = None;
    }
}

/// Behavior drawing procedurally built geometry with one material.
pub struct StaticMesh {
    drawable: Drawable,
    specular_intensity: f32,
    specular_power: f32,
}

impl StaticMesh {
    pub fn new(label: &str, geometry: &MeshGeometry) -> Self {
        let defaults = MaterialParams::default();
        Self {
            drawable: Drawable::new(
                label,
                geometry,
                vec![DrawMaterial {
                    base_color: Vec4::ONE,
                    texture: None,
                }],
            ),
            specular_intensity: defaults.specular_intensity,
            specular_power: defaults.specular_power,
        }
    }

    pub fn with_texture(mut self, texture: Texture) -> Self {
        self.drawable.materials[0].texture = Some(texture);
        self
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.drawable.materials[0].base_color = color;
        self
    }

    pub fn with_specular(mut self, intensity: f32, power: f32) -> Self {
        self.specular_intensity = intensity;
        self.specular_power = power;
        self
    }

    pub fn texture(&self) -> Option<TextureProps> {
        self.drawable.materials[0].texture.as_ref().map(Texture::props)
    }
}

impl NodeBehavior for StaticMesh {
    fn on_update(&mut self, _node: &NodeState, ctx: &mut NodeCtx<'_>) {
        self.drawable.apply(ctx.gpu);
    }

    fn on_render(&mut self, node: &NodeState, ctx: &mut RenderCtx<'_>) {
        self.drawable
            .draw(node.world_transform(), &[], self.specular_intensity, self.specular_power, ctx.gpu);
    }

    fn on_shutdown(&mut self, ctx: &mut NodeCtx<'_>) {
        self.drawable.release(ctx.gpu);
    }
}

struct DrawMaterial {
    base_color: Vec4,
    texture: Option<Texture>,
}

/// GPU side of a mesh: one vertex and one index buffer shared by every
/// entry, plus per-material textures.
struct Drawable {
    vertices: Buffer,
    indices: Buffer,
    entries: Vec<MeshEntry>,
    materials: Vec<DrawMaterial>,
}

impl Drawable {
    fn new(label: &str, geometry: &MeshGeometry, materials: Vec<DrawMaterial>) -> Self {
        let vertices = Buffer::with_target(format!("{label} vertices"), BufferTarget::Vertex);
        vertices.props().set_data(geometry.vertex_bytes());
        let indices = Buffer::with_target(format!("{label} indices"), BufferTarget::Index);
        indices.props().set_data(geometry.index_bytes());
        Self {
            vertices,
            indices,
            entries: geometry.entries.clone(),
            materials,
        }
    }

    /// Applies every resource. Returns `Some(Error)` if geometry failed.
    fn apply(&mut self, gpu: &mut dyn GpuBackend) -> Option<ResourceStatus> {
        let mut touched = self.vertices.apply(gpu);
        touched |= self.indices.apply(gpu);
        for texture in self.materials.iter_mut().filter_map(|m| m.texture.as_mut()) {
            texture.apply(gpu);
        }

        let failed = [self.vertices.status(), self.indices.status()].contains(&ResourceStatus::Error);
        match (touched, failed) {
            (_, true) => Some(ResourceStatus::Error),
            (true, false) => Some(ResourceStatus::Ready),
            (false, false) => None,
        }
    }

    fn draw(&self, model: Mat4, bones: &[Mat4], specular_intensity: f32, specular_power: f32, gpu: &mut dyn GpuBackend) {
        if self.vertices.handle().is_none() || self.indices.handle().is_none() {
            return;
        }
        self.vertices.bind(gpu);
        self.indices.bind(gpu);

        for entry in &self.entries {
            let material = entry.material.and_then(|i| self.materials.get(i));
            match material.and_then(|m| m.texture.as_ref()).filter(|t| t.handle().is_some()) {
                Some(texture) => texture.bind(gpu, 0),
                None => gpu.unbind_texture(0),
            }
            gpu.draw_indexed(&DrawIndexed {
                base_index: entry.base_index,
                index_count: entry.index_count,
                base_vertex: entry.base_vertex,
                model,
                bones,
                material: MaterialParams {
                    base_color: material.map_or(Vec4::ONE, |m| m.base_color),
                    specular_intensity,
                    specular_power,
                },
            });
        }
    }

    fn release(&mut self, gpu: &mut dyn GpuBackend) {
        self.vertices.release(gpu);
        self.indices.release(gpu);
        for texture in self.materials.iter_mut().filter_map(|m| m.texture.as_mut()) {
            texture.release(gpu);
        }
    }
}
