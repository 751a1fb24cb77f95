use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::gpu::{GpuBackend, GpuError, ResourceHandle, SamplerSpec};
use crate::loader::{decode_image, Completion, LoaderHandle};

use super::{Aspects, Bitmap, ChangeFeed, DirtyMask, ResourceStatus, SourceState};

/// Minification/magnification filtering.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum TextureFilter {
    Nearest,
    Linear,
    #[default]
    Anisotropic,
}

/// Wrap mode along one texture axis.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum TextureWrap {
    Repeat,
    #[default]
    ClampToEdge,
    /// Falls back to `ClampToEdge` where the adapter lacks border support.
    ClampToBorder,
}

/// Property change notifications of a texture.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureEvent {
    SourceChanged(String),
    StatusChanged(ResourceStatus),
    FilterChanged(TextureFilter),
    WrapSChanged(TextureWrap),
    WrapTChanged(TextureWrap),
}

#[derive(Debug, Default)]
struct Pending {
    source: SourceState,
    filter: TextureFilter,
    wrap_s: TextureWrap,
    wrap_t: TextureWrap,
    bitmap: Option<Bitmap>,
}

#[derive(Debug)]
struct Shared {
    pending: Mutex<Pending>,
    dirty: DirtyMask,
    feed: ChangeFeed<TextureEvent>,
    loader: LoaderHandle,
    completions: Sender<Completion<Bitmap>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops a bitmap accepted under an older generation so `apply` cannot
    /// upload it after a newer request.
    fn discard_staged(&self, pending: &mut Pending) {
        if pending.bitmap.take().is_some() {
            self.dirty.clear(Aspects::DATA);
        }
    }

    fn request(&self, source: String, generation: u64) {
        self.loader
            .submit(&source, generation, self.completions.clone(), |uri, assets| {
                decode_image(&uri.read_bytes(assets)?)
            });
    }
}

/// Thread-safe property handle of a [`Texture`].
#[derive(Debug, Clone)]
pub struct TextureProps {
    shared: Arc<Shared>,
}

impl TextureProps {
    /// Requests a load of `source`. Status becomes `Loading` before this returns.
    ///
    /// Re-setting the current source does nothing; use [`reload`](Self::reload)
    /// to retry after an error.
    pub fn set_source(&self, source: &str) {
        let (request, status) = {
            let mut pending = self.shared.lock();
            let before = pending.source.generation();
            let request = pending.source.set_source(source);
            if pending.source.generation() == before {
                return;
            }
            self.shared.discard_staged(&mut pending);
            (request, pending.source.status())
        };

        self.shared.feed.publish(&[
            TextureEvent::SourceChanged(source.to_owned()),
            TextureEvent::StatusChanged(status),
        ]);
        if let Some(generation) = request {
            self.shared.request(source.to_owned(), generation);
        }
    }

    /// Re-requests the current source. No-op without a source.
    pub fn reload(&self) {
        let request = {
            let mut pending = self.shared.lock();
            let generation = pending.source.reload();
            if generation.is_some() {
                self.shared.discard_staged(&mut pending);
            }
            generation.map(|generation| (pending.source.source().to_owned(), generation))
        };
        if let Some((source, generation)) = request {
            self.shared
                .feed
                .publish(&[TextureEvent::StatusChanged(ResourceStatus::Loading)]);
            self.shared.request(source, generation);
        }
    }

    /// Stages an already decoded bitmap, superseding any in-flight load.
    pub fn set_bitmap(&self, bitmap: Bitmap) {
        {
            let mut pending = self.shared.lock();
            pending.source.supersede();
            pending.bitmap = Some(bitmap);
            self.shared.dirty.mark(Aspects::DATA);
        }
        self.shared
            .feed
            .publish(&[TextureEvent::StatusChanged(ResourceStatus::Processing)]);
    }

    pub fn set_filter(&self, filter: TextureFilter) {
        self.stage(|p| {
            (p.filter != filter).then(|| {
                p.filter = filter;
                (Aspects::FILTER, TextureEvent::FilterChanged(filter))
            })
        });
    }

    pub fn set_wrap_s(&self, wrap: TextureWrap) {
        self.stage(|p| {
            (p.wrap_s != wrap).then(|| {
                p.wrap_s = wrap;
                (Aspects::WRAP_S, TextureEvent::WrapSChanged(wrap))
            })
        });
    }

    pub fn set_wrap_t(&self, wrap: TextureWrap) {
        self.stage(|p| {
            (p.wrap_t != wrap).then(|| {
                p.wrap_t = wrap;
                (Aspects::WRAP_T, TextureEvent::WrapTChanged(wrap))
            })
        });
    }

    pub fn source(&self) -> String {
        self.shared.lock().source.source().to_owned()
    }

    pub fn status(&self) -> ResourceStatus {
        self.shared.lock().source.status()
    }

    pub fn generation(&self) -> u64 {
        self.shared.lock().source.generation()
    }

    pub fn filter(&self) -> TextureFilter {
        self.shared.lock().filter
    }

    pub fn wrap_s(&self) -> TextureWrap {
        self.shared.lock().wrap_s
    }

    pub fn wrap_t(&self) -> TextureWrap {
        self.shared.lock().wrap_t
    }

    pub fn revision(&self) -> u64 {
        self.shared.feed.revision()
    }

    pub fn subscribe(&self) -> Receiver<TextureEvent> {
        self.shared.feed.subscribe()
    }

    fn stage(&self, f: impl FnOnce(&mut Pending) -> Option<(Aspects, TextureEvent)>) {
        let event = {
            let mut pending = self.shared.lock();
            let change = f(&mut pending);
            if let Some((aspect, _)) = &change {
                self.shared.dirty.mark(*aspect);
            }
            change.map(|(_, event)| event)
        };
        if let Some(event) = event {
            self.shared.feed.publish(&[event]);
        }
    }
}

/// Render-thread owner of a GPU texture.
#[derive(Debug)]
pub struct Texture {
    label: String,
    shared: Arc<Shared>,
    completions: Receiver<Completion<Bitmap>>,
    handle: Option<ResourceHandle>,
    sampler_applied: bool,
}

impl Texture {
    pub fn new(label: impl Into<String>, loader: LoaderHandle) -> Self {
        let (tx, rx) = unbounded();
        Self {
            label: label.into(),
            shared: Arc::new(Shared {
                pending: Mutex::default(),
                dirty: DirtyMask::new(),
                feed: ChangeFeed::new(),
                loader,
                completions: tx,
            }),
            completions: rx,
            handle: None,
            sampler_applied: false,
        }
    }

    /// Texture initialized with a decoded bitmap and sampler state.
    pub fn from_bitmap(label: impl Into<String>, loader: LoaderHandle, bitmap: Bitmap, sampler: SamplerSpec) -> Self {
        let texture = Self::new(label, loader);
        let props = texture.props();
        props.set_filter(sampler.filter);
        props.set_wrap_s(sampler.wrap_s);
        props.set_wrap_t(sampler.wrap_t);
        props.set_bitmap(bitmap);
        texture
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn props(&self) -> TextureProps {
        TextureProps {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn handle(&self) -> Option<ResourceHandle> {
        self.handle
    }

    pub fn status(&self) -> ResourceStatus {
        self.shared.lock().source.status()
    }

    pub fn is_dirty(&self) -> bool {
        !self.shared.dirty.is_clean()
    }

    /// Drains finished loads. Stale generations are discarded; the current
    /// one either stages its bitmap (`Processing`) or fails (`Error`).
    ///
    /// Returns the number of completions accepted.
    pub fn pump(&mut self) -> usize {
        let mut accepted = 0;
        let mut events = Vec::new();

        for done in self.completions.try_iter() {
            let mut pending = self.shared.lock();
            if !pending.source.is_current(done.generation) {
                log::debug!(
                    "texture '{}': discarding stale load of '{}' (generation {}, current {})",
                    self.label,
                    done.source,
                    done.generation,
                    pending.source.generation()
                );
                continue;
            }

            accepted += 1;
            let status = match done.result {
                Ok(bitmap) => {
                    pending.bitmap = Some(bitmap);
                    self.shared.dirty.mark(Aspects::DATA);
                    ResourceStatus::Processing
                }
                Err(err) => {
                    log::error!("texture '{}': failed to load '{}': {err}", self.label, done.source);
                    ResourceStatus::Error
                }
            };
            if pending.source.set_status(status) {
                events.push(TextureEvent::StatusChanged(status));
            }
        }

        self.shared.feed.publish(&events);
        accepted
    }

    /// Drains completions, then realizes staged changes. Returns `false`
    /// when nothing was dirty.
    ///
    /// Storage is uploaded before sampler state is configured.
    pub fn apply(&mut self, gpu: &mut dyn GpuBackend) -> bool {
        self.pump();
        if self.shared.dirty.is_clean() {
            return false;
        }

        let shared = Arc::clone(&self.shared);
        let status_event = {
            let mut pending = shared.lock();
            let bits = shared.dirty.get();
            let mut status = pending.source.status();

            match self.ensure_handle(gpu) {
                Ok(handle) => {
                    if bits.contains(Aspects::DATA) {
                        if let Some(bitmap) = pending.bitmap.take() {
                            status = match upload(gpu, handle, &bitmap) {
                                Ok(()) => {
                                    log::debug!(
                                        "texture '{}': uploaded {}x{} {:?}",
                                        self.label,
                                        bitmap.width,
                                        bitmap.height,
                                        bitmap.format
                                    );
                                    ResourceStatus::Ready
                                }
                                Err(err) => {
                                    log::error!("texture '{}': upload failed: {err}", self.label);
                                    ResourceStatus::Error
                                }
                            };
                        }
                    }

                    if bits.intersects(Aspects::SAMPLER) || !self.sampler_applied {
                        let sampler = SamplerSpec {
                            filter: pending.filter,
                            wrap_s: pending.wrap_s,
                            wrap_t: pending.wrap_t,
                        };
                        match gpu.configure_sampler(handle, &sampler) {
                            Ok(()) => self.sampler_applied = true,
                            Err(err) => {
                                log::error!("texture '{}': sampler update failed: {err}", self.label);
                                status = ResourceStatus::Error;
                            }
                        }
                    }
                }
                Err(err) => {
                    log::error!("texture '{}': {err}", self.label);
                    status = ResourceStatus::Error;
                }
            }

            shared.dirty.clear(bits);
            pending
                .source
                .set_status(status)
                .then_some(TextureEvent::StatusChanged(status))
        };

        if let Some(event) = status_event {
            shared.feed.publish(&[event]);
        }
        true
    }

    /// Binds the texture to `slot`. No-op while unallocated.
    pub fn bind(&self, gpu: &mut dyn GpuBackend, slot: u32) {
        if let Some(handle) = self.handle {
            gpu.bind_texture(handle, slot);
        }
    }

    /// Destroys the native texture. Subsequent calls are no-ops.
    pub fn release(&mut self, gpu: &mut dyn GpuBackend) {
        if let Some(handle) = self.handle.take() {
            gpu.destroy_texture(handle);
            self.sampler_applied = false;
            log::debug!("texture '{}': released", self.label);
        }
    }

    fn ensure_handle(&mut self, gpu: &mut dyn GpuBackend) -> Result<ResourceHandle, GpuError> {
        if let Some(handle) = self.handle {
            return Ok(handle);
        }
        let handle = gpu.create_texture(&self.label)?;
        log::debug!("texture '{}': allocated {:?}", self.label, handle);
        self.handle = Some(handle);
        Ok(handle)
    }
}

fn upload(gpu: &mut dyn GpuBackend, handle: ResourceHandle, bitmap: &Bitmap) -> Result<(), GpuError> {
    if !bitmap.is_well_formed() {
        return Err(GpuError::InvalidBitmap {
            width: bitmap.width,
            height: bitmap.height,
            len: bitmap.pixels.len(),
            expected: bitmap.expected_len(),
        });
    }
    gpu.upload_texture(handle, bitmap)
}
